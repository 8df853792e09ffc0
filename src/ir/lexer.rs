//! Lexer for the textual IR format

use crate::ir::{Span, Spanned};
use chumsky::prelude::*;
use std::fmt;

/// Token definition
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Token<'src> {
    Num(i64),
    Ident(&'src str),
    /// SSA value reference: `%name`
    Value(&'src str),
    /// Block label: `bb3`
    Label(u32),
    Op(&'src str),
    Ctrl(char),
    // Keywords
    Fn,
    Phi,
    Call,
    Br,
    Cbr,
    Switch,
    Ret,
    Unreachable,
    Default,
    True,
    False,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Num(n) => write!(f, "{n}"),
            Token::Ident(s) => write!(f, "{s}"),
            Token::Value(s) => write!(f, "%{s}"),
            Token::Label(n) => write!(f, "bb{n}"),
            Token::Op(s) => write!(f, "{s}"),
            Token::Ctrl(c) => write!(f, "{c}"),
            Token::Fn => write!(f, "fn"),
            Token::Phi => write!(f, "phi"),
            Token::Call => write!(f, "call"),
            Token::Br => write!(f, "br"),
            Token::Cbr => write!(f, "cbr"),
            Token::Switch => write!(f, "switch"),
            Token::Ret => write!(f, "ret"),
            Token::Unreachable => write!(f, "unreachable"),
            Token::Default => write!(f, "default"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
        }
    }
}

/// Lexer
pub fn lexer<'src>()
-> impl Parser<'src, &'src str, Vec<Spanned<Token<'src>>>, extra::Err<Rich<'src, char, Span>>> {
    // A parser for (possibly negative) numbers
    let num = just('-')
        .or_not()
        .then(text::int(10))
        .to_slice()
        .from_str()
        .unwrapped()
        .map(Token::Num);

    // A parser for identifier-shaped character runs
    let ident_chars = any()
        .filter(|c: &char| c.is_ascii_alphabetic() || *c == '_')
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
                .repeated(),
        )
        .to_slice();

    // SSA value references: %name
    let value = just('%').ignore_then(ident_chars).map(Token::Value);

    // Identifiers, keywords and block labels
    let ident = ident_chars.map(|ident: &str| {
        if let Some(digits) = ident.strip_prefix("bb") {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(n) = digits.parse() {
                    return Token::Label(n);
                }
            }
        }
        match ident {
            "fn" => Token::Fn,
            "phi" => Token::Phi,
            "call" => Token::Call,
            "br" => Token::Br,
            "cbr" => Token::Cbr,
            "switch" => Token::Switch,
            "ret" => Token::Ret,
            "unreachable" => Token::Unreachable,
            "default" => Token::Default,
            "true" => Token::True,
            "false" => Token::False,
            _ => Token::Ident(ident),
        }
    });

    // A parser for operators
    let op = just("->").map(Token::Op);

    // A parser for control characters
    let ctrl = one_of("(){}[],:=<>").map(Token::Ctrl);

    let token = num.or(value).or(op).or(ctrl).or(ident);

    let comment = just("//")
        .then(any().and_is(just('\n').not()).repeated())
        .padded();

    token
        .map_with(|tok, e| (tok, e.span()))
        .padded_by(comment.repeated())
        .padded()
        // If we encounter an error, skip and attempt to lex the next character as a token instead
        .recover_with(skip_then_retry_until(any().ignored(), end()))
        .repeated()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token<'_>> {
        lexer()
            .parse(src)
            .into_result()
            .unwrap()
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_lex_values_and_labels() {
        let toks = lex("%x bb0 bb12 bbq");
        assert_eq!(
            toks,
            vec![
                Token::Value("x"),
                Token::Label(0),
                Token::Label(12),
                Token::Ident("bbq"),
            ]
        );
    }

    #[test]
    fn test_lex_instruction_line() {
        let toks = lex("%t: i1 = eq %i, %n");
        assert_eq!(
            toks,
            vec![
                Token::Value("t"),
                Token::Ctrl(':'),
                Token::Ident("i1"),
                Token::Ctrl('='),
                Token::Ident("eq"),
                Token::Value("i"),
                Token::Ctrl(','),
                Token::Value("n"),
            ]
        );
    }

    #[test]
    fn test_lex_negative_number_and_comment() {
        let toks = lex("const -42 // trailing comment\nret");
        assert_eq!(toks, vec![Token::Ident("const"), Token::Num(-42), Token::Ret]);
    }
}
