//! Command-line configuration

use crate::refine::RefineOptions;
use std::env;

pub const USAGE: &str = "\
Usage: lucent --input <ir-file> [options]

Options:
  --input <path>              Input IR file
  --output <path>             Output C file (stdout when omitted)
  --smt-timeout <ms>          Per-call solver timeout (default 10000)
  --smt-tactics-cbr <list>    Comma-separated tactic pipeline for
                              condition-based refinement
  --smt-tactics-final <list>  Comma-separated tactic pipeline for the
                              final phase
  --version                   Print version information and exit
";

/// Parsed invocation
#[derive(Debug)]
pub enum Command {
    Run(Config),
    Version,
}

/// Configuration for one run
#[derive(Debug)]
pub struct Config {
    pub input: String,
    /// `None` writes to stdout
    pub output: Option<String>,
    pub refine: RefineOptions,
}

impl Config {
    /// Parse command line arguments from the environment
    pub fn from_args() -> Result<Command, String> {
        let args: Vec<String> = env::args().skip(1).collect();
        parse_args(&args)
    }
}

pub fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut input = None;
    let mut output = None;
    let mut refine = RefineOptions::default();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--version" => return Ok(Command::Version),
            "--input" => input = Some(required(&mut iter, "--input")?),
            "--output" => output = Some(required(&mut iter, "--output")?),
            "--smt-timeout" => {
                let value = required(&mut iter, "--smt-timeout")?;
                refine.smt_timeout_ms = value
                    .parse()
                    .map_err(|_| format!("invalid --smt-timeout value `{}`", value))?;
            }
            "--smt-tactics-cbr" => {
                refine.cbr_tactics = tactic_list(&required(&mut iter, "--smt-tactics-cbr")?)?;
            }
            "--smt-tactics-final" => {
                refine.final_tactics = tactic_list(&required(&mut iter, "--smt-tactics-final")?)?;
            }
            other => return Err(format!("unknown argument `{}`", other)),
        }
    }

    let input = input.ok_or_else(|| "missing required --input".to_string())?;
    Ok(Command::Run(Config {
        input,
        output,
        refine,
    }))
}

fn required<'a>(
    iter: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<String, String> {
    iter.next()
        .cloned()
        .ok_or_else(|| format!("{} requires a value", flag))
}

fn tactic_list(value: &str) -> Result<Vec<String>, String> {
    let tactics: Vec<String> = value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if tactics.is_empty() {
        return Err(format!("empty tactic list `{}`", value));
    }
    Ok(tactics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_minimal() {
        let cmd = parse_args(&args(&["--input", "prog.ir"])).unwrap();
        let Command::Run(config) = cmd else {
            panic!("expected a run command");
        };
        assert_eq!(config.input, "prog.ir");
        assert!(config.output.is_none());
        assert_eq!(config.refine.smt_timeout_ms, 10_000);
    }

    #[test]
    fn test_parse_overrides() {
        let cmd = parse_args(&args(&[
            "--input",
            "prog.ir",
            "--output",
            "prog.c",
            "--smt-timeout",
            "500",
            "--smt-tactics-cbr",
            "simplify",
            "--smt-tactics-final",
            "aig, ctx-simplify",
        ]))
        .unwrap();
        let Command::Run(config) = cmd else {
            panic!("expected a run command");
        };
        assert_eq!(config.output.as_deref(), Some("prog.c"));
        assert_eq!(config.refine.smt_timeout_ms, 500);
        assert_eq!(config.refine.cbr_tactics, vec!["simplify"]);
        assert_eq!(config.refine.final_tactics, vec!["aig", "ctx-simplify"]);
    }

    #[test]
    fn test_missing_input_is_an_error() {
        assert!(parse_args(&args(&["--output", "x.c"])).is_err());
    }

    #[test]
    fn test_version_flag_wins() {
        let cmd = parse_args(&args(&["--version"])).unwrap();
        assert!(matches!(cmd, Command::Version));
    }
}
