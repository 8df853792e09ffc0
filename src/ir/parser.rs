//! Parser for the textual IR format
//!
//! Parsing happens in two stages: a chumsky token-stream parser builds a
//! raw name-based form, then a resolution step allocates value and block
//! IDs (phi nodes may reference values defined later in the function, so
//! destinations are declared before operands are resolved).

use crate::ir::builder::FunctionBuilder;
use crate::ir::instr::{BinaryOp, Instr, Terminator, UnaryOp};
use crate::ir::lexer::{Token, lexer};
use crate::ir::module::{IrFunction, IrModule};
use crate::ir::phi::PhiNode;
use crate::ir::report::render_errors;
use crate::ir::types::{BlockId, IrType, ValueId};
use crate::ir::{Span, Spanned};
use chumsky::{input::ValueInput, prelude::*};
use std::collections::HashMap;

/// A value reference before resolution
type VRef<'src> = Spanned<&'src str>;

#[derive(Debug)]
enum RawRhs<'src> {
    Const(i64),
    Copy(VRef<'src>),
    Binary(BinaryOp, VRef<'src>, VRef<'src>),
    Unary(UnaryOp, VRef<'src>),
    Load(VRef<'src>),
    Call(&'src str, Vec<VRef<'src>>),
    Phi(Vec<(Spanned<u32>, VRef<'src>)>),
}

#[derive(Debug)]
enum RawInstr<'src> {
    Assign {
        dst: VRef<'src>,
        ty: IrType,
        rhs: RawRhs<'src>,
    },
    Store {
        addr: VRef<'src>,
        value: VRef<'src>,
    },
    CallVoid {
        callee: &'src str,
        args: Vec<VRef<'src>>,
    },
}

#[derive(Debug, Clone)]
enum RawTerm<'src> {
    Br(Spanned<u32>),
    Cbr(VRef<'src>, Spanned<u32>, Spanned<u32>),
    Switch(VRef<'src>, Vec<(i64, Spanned<u32>)>, Spanned<u32>),
    Ret(Option<VRef<'src>>),
    Unreachable,
}

#[derive(Debug)]
struct RawBlock<'src> {
    label: Spanned<u32>,
    instrs: Vec<RawInstr<'src>>,
    terminator: RawTerm<'src>,
}

#[derive(Debug)]
struct RawFunction<'src> {
    name: &'src str,
    params: Vec<(VRef<'src>, IrType)>,
    return_type: IrType,
    blocks: Vec<RawBlock<'src>>,
}

/// Type parser
fn type_parser<'tokens, 'src: 'tokens, I>()
-> impl Parser<'tokens, I, IrType, extra::Err<Rich<'tokens, Token<'src>, Span>>> + Clone
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = Span>,
{
    recursive(|ty| {
        let prim = select! {
            Token::Ident("i1") => IrType::Bool,
            Token::Ident("bool") => IrType::Bool,
            Token::Ident("void") => IrType::Void,
            Token::Ident("i8") => IrType::Int { bits: 8, signed: true },
            Token::Ident("i16") => IrType::Int { bits: 16, signed: true },
            Token::Ident("i32") => IrType::Int { bits: 32, signed: true },
            Token::Ident("i64") => IrType::Int { bits: 64, signed: true },
            Token::Ident("u8") => IrType::Int { bits: 8, signed: false },
            Token::Ident("u16") => IrType::Int { bits: 16, signed: false },
            Token::Ident("u32") => IrType::Int { bits: 32, signed: false },
            Token::Ident("u64") => IrType::Int { bits: 64, signed: false },
        }
        .labelled("type");

        let ptr = just(Token::Ident("ptr"))
            .ignore_then(ty.delimited_by(just(Token::Ctrl('<')), just(Token::Ctrl('>'))))
            .map(|pointee| IrType::Ptr(Box::new(pointee)));

        ptr.or(prim)
    })
}

/// Function parser
fn function_parser<'tokens, 'src: 'tokens, I>()
-> impl Parser<'tokens, I, RawFunction<'src>, extra::Err<Rich<'tokens, Token<'src>, Span>>>
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = Span>,
{
    let value = select! { Token::Value(name) => name }
        .map_with(|name, e| (name, e.span()))
        .labelled("value")
        .boxed();

    let label = select! { Token::Label(n) => n }
        .map_with(|n, e| (n, e.span()))
        .labelled("block label")
        .boxed();

    let ident = select! { Token::Ident(name) => name }.labelled("identifier");

    let comma = just(Token::Ctrl(','));
    let colon = just(Token::Ctrl(':'));

    let binop = select! {
        Token::Ident("add") => BinaryOp::Add,
        Token::Ident("sub") => BinaryOp::Sub,
        Token::Ident("mul") => BinaryOp::Mul,
        Token::Ident("and") => BinaryOp::And,
        Token::Ident("or") => BinaryOp::Or,
        Token::Ident("xor") => BinaryOp::Xor,
        Token::Ident("shl") => BinaryOp::Shl,
        Token::Ident("lshr") => BinaryOp::LShr,
        Token::Ident("ashr") => BinaryOp::AShr,
        Token::Ident("eq") => BinaryOp::Eq,
        Token::Ident("ne") => BinaryOp::Ne,
        Token::Ident("lt") => BinaryOp::Lt,
        Token::Ident("le") => BinaryOp::Le,
        Token::Ident("gt") => BinaryOp::Gt,
        Token::Ident("ge") => BinaryOp::Ge,
    };

    let unop = select! {
        Token::Ident("not") => UnaryOp::Not,
        Token::Ident("neg") => UnaryOp::Neg,
    };

    let args = value
        .clone()
        .separated_by(comma.clone())
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::Ctrl('(')), just(Token::Ctrl(')')));

    let konst = just(Token::Ident("const"))
        .ignore_then(choice((
            select! { Token::Num(n) => n },
            just(Token::True).to(1),
            just(Token::False).to(0),
        )))
        .map(RawRhs::Const);

    let copy = just(Token::Ident("copy"))
        .ignore_then(value.clone())
        .map(RawRhs::Copy);

    let load = just(Token::Ident("load"))
        .ignore_then(value.clone())
        .map(RawRhs::Load);

    let call_rhs = just(Token::Call)
        .ignore_then(ident.clone())
        .then(args.clone())
        .map(|(callee, args)| RawRhs::Call(callee, args));

    let phi = just(Token::Phi)
        .ignore_then(
            label
                .clone()
                .then_ignore(colon.clone())
                .then(value.clone())
                .delimited_by(just(Token::Ctrl('[')), just(Token::Ctrl(']')))
                .separated_by(comma.clone())
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map(RawRhs::Phi);

    let unary = unop.then(value.clone()).map(|(op, v)| RawRhs::Unary(op, v));

    let binary = binop
        .then(value.clone())
        .then_ignore(comma.clone())
        .then(value.clone())
        .map(|((op, lhs), rhs)| RawRhs::Binary(op, lhs, rhs));

    let rhs = choice((konst, copy, load, phi, call_rhs, unary, binary)).labelled("instruction");

    let assign = value
        .clone()
        .then_ignore(colon.clone())
        .then(type_parser())
        .then_ignore(just(Token::Ctrl('=')))
        .then(rhs)
        .map(|((dst, ty), rhs)| RawInstr::Assign { dst, ty, rhs });

    let store = just(Token::Ident("store"))
        .ignore_then(value.clone())
        .then_ignore(comma.clone())
        .then(value.clone())
        .map(|(addr, value)| RawInstr::Store { addr, value });

    let call_void = just(Token::Call)
        .ignore_then(ident.clone())
        .then(args)
        .map(|(callee, args)| RawInstr::CallVoid { callee, args });

    let instr = choice((assign, store, call_void));

    let case = select! { Token::Num(n) => n }
        .then_ignore(colon.clone())
        .then(label.clone())
        .delimited_by(just(Token::Ctrl('[')), just(Token::Ctrl(']')));

    let terminator = choice((
        just(Token::Br).ignore_then(label.clone()).map(RawTerm::Br),
        just(Token::Cbr)
            .ignore_then(value.clone())
            .then_ignore(comma.clone())
            .then(label.clone())
            .then_ignore(comma.clone())
            .then(label.clone())
            .map(|((cond, t), f)| RawTerm::Cbr(cond, t, f)),
        just(Token::Switch)
            .ignore_then(value.clone())
            .then_ignore(comma.clone())
            .then(case.then_ignore(comma.clone()).repeated().collect::<Vec<_>>())
            .then_ignore(just(Token::Default))
            .then(label.clone())
            .map(|((value, cases), default)| RawTerm::Switch(value, cases, default)),
        just(Token::Ret)
            .ignore_then(value.clone().or_not())
            .map(RawTerm::Ret),
        just(Token::Unreachable).to(RawTerm::Unreachable),
    ))
    .labelled("terminator");

    let block = label
        .clone()
        .then_ignore(colon.clone())
        .then(instr.repeated().collect::<Vec<_>>())
        .then(terminator)
        .map(|((label, instrs), terminator)| RawBlock {
            label,
            instrs,
            terminator,
        });

    let param = value
        .then(colon.ignore_then(type_parser()))
        .map(|(name, ty)| (name, ty));

    just(Token::Fn)
        .ignore_then(ident)
        .then(
            param
                .separated_by(comma)
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::Ctrl('(')), just(Token::Ctrl(')'))),
        )
        .then_ignore(just(Token::Op("->")))
        .then(type_parser())
        .then(
            block
                .repeated()
                .at_least(1)
                .collect::<Vec<_>>()
                .delimited_by(just(Token::Ctrl('{')), just(Token::Ctrl('}'))),
        )
        .map(|(((name, params), return_type), blocks)| RawFunction {
            name,
            params,
            return_type,
            blocks,
        })
}

/// Module parser
fn module_parser<'tokens, 'src: 'tokens, I>()
-> impl Parser<'tokens, I, Vec<RawFunction<'src>>, extra::Err<Rich<'tokens, Token<'src>, Span>>>
where
    I: ValueInput<'tokens, Token = Token<'src>, Span = Span>,
{
    function_parser().repeated().collect().then_ignore(end())
}

/// Tracks name-to-ID mappings while resolving one function
struct Resolver<'src> {
    values: HashMap<&'src str, ValueId>,
    value_types: HashMap<&'src str, IrType>,
    blocks: HashMap<u32, BlockId>,
    errors: Vec<(String, Span)>,
}

impl<'src> Resolver<'src> {
    fn value(&mut self, vref: &VRef<'src>) -> ValueId {
        match self.values.get(vref.0) {
            Some(&id) => id,
            None => {
                self.errors
                    .push((format!("undefined value `%{}`", vref.0), vref.1));
                ValueId(u32::MAX)
            }
        }
    }

    fn block(&mut self, label: &Spanned<u32>) -> BlockId {
        match self.blocks.get(&label.0) {
            Some(&id) => id,
            None => {
                self.errors
                    .push((format!("undefined block `bb{}`", label.0), label.1));
                BlockId(u32::MAX)
            }
        }
    }
}

fn resolve_function(raw: &RawFunction<'_>) -> Result<IrFunction, Vec<(String, Span)>> {
    let mut builder = FunctionBuilder::new();
    let mut resolver = Resolver {
        values: HashMap::new(),
        value_types: HashMap::new(),
        blocks: HashMap::new(),
        errors: Vec::new(),
    };

    for block in &raw.blocks {
        let id = builder.new_block();
        if resolver.blocks.insert(block.label.0, id).is_some() {
            resolver.errors.push((
                format!("duplicate block label `bb{}`", block.label.0),
                block.label.1,
            ));
        }
    }

    for (vref, ty) in &raw.params {
        if resolver.values.contains_key(vref.0) {
            resolver
                .errors
                .push((format!("duplicate parameter `%{}`", vref.0), vref.1));
            continue;
        }
        let id = builder.add_param(vref.0, ty.clone());
        resolver.values.insert(vref.0, id);
        resolver.value_types.insert(vref.0, ty.clone());
    }

    // Declare every destination first so phi nodes can reference values
    // defined later in the function
    for block in &raw.blocks {
        for instr in &block.instrs {
            if let RawInstr::Assign { dst, ty, .. } = instr {
                if resolver.values.contains_key(dst.0) {
                    resolver
                        .errors
                        .push((format!("value `%{}` redefined", dst.0), dst.1));
                    continue;
                }
                let id = builder.named_value(dst.0);
                resolver.values.insert(dst.0, id);
                resolver.value_types.insert(dst.0, ty.clone());
            }
        }
    }

    for block in &raw.blocks {
        let block_id = resolver.blocks[&block.label.0];
        builder.start_block(block_id);

        for instr in &block.instrs {
            match instr {
                RawInstr::Assign { dst, ty, rhs } => {
                    let dst_id = resolver.values[dst.0];
                    match rhs {
                        RawRhs::Const(value) => builder.add_instr(Instr::Const {
                            dst: dst_id,
                            value: *value,
                            ty: ty.clone(),
                        }),
                        RawRhs::Copy(src) => {
                            let src = resolver.value(src);
                            builder.add_instr(Instr::Copy {
                                dst: dst_id,
                                src,
                                ty: ty.clone(),
                            });
                        }
                        RawRhs::Binary(op, lhs, rhs) => {
                            let lhs = resolver.value(lhs);
                            let rhs = resolver.value(rhs);
                            builder.add_instr(Instr::Binary {
                                dst: dst_id,
                                op: *op,
                                lhs,
                                rhs,
                                ty: ty.clone(),
                            });
                        }
                        RawRhs::Unary(op, operand) => {
                            let operand = resolver.value(operand);
                            builder.add_instr(Instr::Unary {
                                dst: dst_id,
                                op: *op,
                                operand,
                                ty: ty.clone(),
                            });
                        }
                        RawRhs::Load(addr) => {
                            let addr = resolver.value(addr);
                            builder.add_instr(Instr::Load {
                                dst: dst_id,
                                addr,
                                ty: ty.clone(),
                            });
                        }
                        RawRhs::Call(callee, args) => {
                            let args = args.iter().map(|a| resolver.value(a)).collect();
                            builder.add_instr(Instr::Call {
                                dst: Some(dst_id),
                                callee: callee.to_string(),
                                args,
                                ty: ty.clone(),
                            });
                        }
                        RawRhs::Phi(incoming) => {
                            let mut phi = PhiNode::new(dst_id, ty.clone());
                            for (label, vref) in incoming {
                                let pred = resolver.block(label);
                                let value = resolver.value(vref);
                                phi.add_incoming(pred, value);
                            }
                            builder.add_phi(phi);
                        }
                    }
                }
                RawInstr::Store { addr, value } => {
                    let addr = resolver.value(addr);
                    let value = resolver.value(value);
                    builder.add_instr(Instr::Store { addr, value });
                }
                RawInstr::CallVoid { callee, args } => {
                    let args = args.iter().map(|a| resolver.value(a)).collect();
                    builder.add_instr(Instr::Call {
                        dst: None,
                        callee: callee.to_string(),
                        args,
                        ty: IrType::Void,
                    });
                }
            }
        }

        let terminator = match &block.terminator {
            RawTerm::Br(target) => Terminator::Jump {
                target: resolver.block(target),
            },
            RawTerm::Cbr(cond, t, f) => Terminator::Branch {
                cond: resolver.value(cond),
                true_target: resolver.block(t),
                false_target: resolver.block(f),
            },
            RawTerm::Switch(value, cases, default) => Terminator::Switch {
                value: resolver.value(value),
                cases: cases
                    .iter()
                    .map(|(v, label)| (*v, resolver.block(label)))
                    .collect(),
                default: resolver.block(default),
            },
            RawTerm::Ret(value) => Terminator::Return {
                value: value.as_ref().map(|v| resolver.value(v)),
            },
            RawTerm::Unreachable => Terminator::Unreachable,
        };
        builder.finish_block(terminator);
    }

    if !resolver.errors.is_empty() {
        return Err(resolver.errors);
    }

    let entry = resolver.blocks[&raw.blocks[0].label.0];
    Ok(builder.finish(raw.name.to_string(), raw.return_type.clone(), entry))
}

/// Parse a textual IR module
///
/// On failure the returned string is a rendered diagnostic report.
pub fn parse_module(filename: &str, source: &str) -> Result<IrModule, String> {
    let (tokens, lex_errors) = lexer().parse(source).into_output_errors();
    if !lex_errors.is_empty() {
        let errors: Vec<(String, Span)> = lex_errors
            .iter()
            .map(|e| (e.to_string(), *e.span()))
            .collect();
        return Err(render_errors(filename, source, &errors));
    }
    let tokens = tokens.unwrap_or_default();

    let eoi: Span = (source.len()..source.len()).into();
    let (raw, parse_errors) = module_parser()
        .parse(tokens.as_slice().map(eoi, |(t, s)| (t, s)))
        .into_output_errors();
    if !parse_errors.is_empty() {
        let errors: Vec<(String, Span)> = parse_errors
            .iter()
            .map(|e| (e.to_string(), *e.span()))
            .collect();
        return Err(render_errors(filename, source, &errors));
    }
    let raw = raw.unwrap_or_default();

    let mut module = IrModule::new();
    for raw_func in &raw {
        match resolve_function(raw_func) {
            Ok(func) => module.add_function(func),
            Err(errors) => return Err(render_errors(filename, source, &errors)),
        }
    }
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNT_LOOP: &str = r#"
        fn count(%n: i32) -> i32 {
        bb0:
          %c: i32 = const 0
          br bb1
        bb1:
          %i: i32 = phi [bb0: %c], [bb2: %i2]
          %t: i1 = lt %i, %n
          cbr %t, bb2, bb3
        bb2:
          %one: i32 = const 1
          %i2: i32 = add %i, %one
          br bb1
        bb3:
          ret %i
        }
    "#;

    #[test]
    fn test_parse_loop_function() {
        let module = parse_module("test.ir", COUNT_LOOP).unwrap();
        assert_eq!(module.functions.len(), 1);

        let func = &module.functions[0];
        assert_eq!(func.name, "count");
        assert_eq!(func.params.len(), 1);
        assert_eq!(func.blocks.len(), 4);

        // The phi in bb1 references %i2, which is defined in bb2
        let header = func
            .blocks
            .values()
            .find(|b| !b.phi_nodes.is_empty())
            .expect("loop header has a phi");
        assert_eq!(header.phi_nodes[0].incoming.len(), 2);
        assert_eq!(header.predecessors.len(), 2);
    }

    #[test]
    fn test_parse_switch_terminator() {
        let src = r#"
            fn pick(%x: i32) -> i32 {
            bb0:
              switch %x, [0: bb1], [1: bb2], default bb3
            bb1:
              %a: i32 = const 10
              ret %a
            bb2:
              %b: i32 = const 20
              ret %b
            bb3:
              %c: i32 = const 30
              ret %c
            }
        "#;
        let module = parse_module("test.ir", src).unwrap();
        let func = &module.functions[0];
        let entry = func.get_block(func.entry_block).unwrap();
        assert_eq!(entry.successors().len(), 3);
    }

    #[test]
    fn test_undefined_value_is_reported() {
        let src = r#"
            fn bad() -> i32 {
            bb0:
              ret %missing
            }
        "#;
        let err = parse_module("test.ir", src).unwrap_err();
        assert!(err.contains("missing"), "report should name the value: {err}");
    }

    #[test]
    fn test_redefined_value_is_reported() {
        let src = r#"
            fn bad() -> i32 {
            bb0:
              %x: i32 = const 1
              %x: i32 = const 2
              ret %x
            }
        "#;
        let err = parse_module("test.ir", src).unwrap_err();
        assert!(err.contains("redefined"), "report should mention redefinition: {err}");
    }

    #[test]
    fn test_parse_calls_and_memory() {
        let src = r#"
            fn touch(%p: ptr<i32>) -> void {
            bb0:
              %v: i32 = load %p
              %d: i32 = call twice(%v)
              store %p, %d
              call log(%d)
              ret
            }
        "#;
        let module = parse_module("test.ir", src).unwrap();
        let func = &module.functions[0];
        let entry = func.get_block(func.entry_block).unwrap();
        assert_eq!(entry.instructions.len(), 4);
        assert!(matches!(entry.terminator, Terminator::Return { value: None }));
    }
}
