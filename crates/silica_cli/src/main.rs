//! Silica CLI — the command-line driver for the Silica IR toolchain.
//!
//! Provides `silica check` to parse and verify assembly files, and
//! `silica opt` to run a named pass pipeline over a module and write
//! the result back out.

#![warn(missing_docs)]

mod check;
mod opt;

use clap::{Parser, Subcommand};
use std::process;

/// Silica — a hardware IR toolchain core.
#[derive(Parser, Debug)]
#[command(name = "silica", version, about = "Silica hardware IR toolchain")]
pub struct Cli {
    /// Suppress all output except diagnostics.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse and verify assembly files, printing diagnostics.
    Check(CheckArgs),
    /// Run a pass pipeline over a module.
    Opt(OptArgs),
}

/// Arguments for the `silica check` subcommand.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Assembly files to verify.
    #[arg(required = true)]
    pub inputs: Vec<String>,
}

/// Arguments for the `silica opt` subcommand.
#[derive(Parser, Debug)]
pub struct OptArgs {
    /// The assembly file to transform.
    pub input: String,

    /// Comma-separated pipeline of pass names, in run order
    /// (e.g. `-p proclower,deseq,cf,dce,verify`).
    #[arg(short = 'p', long = "passes", value_delimiter = ',', required = true)]
    pub passes: Vec<String>,

    /// Output path; the transformed module goes to stdout if omitted.
    #[arg(short, long)]
    pub output: Option<String>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Check(ref args) => check::run(args, cli.quiet),
        Command::Opt(ref args) => opt::run(args, cli.quiet),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_check() {
        let cli = Cli::parse_from(["silica", "check", "a.sir", "b.sir"]);
        match cli.command {
            Command::Check(ref args) => {
                assert_eq!(args.inputs, vec!["a.sir", "b.sir"]);
            }
            _ => panic!("expected Check command"),
        }
    }

    #[test]
    fn check_requires_inputs() {
        assert!(Cli::try_parse_from(["silica", "check"]).is_err());
    }

    #[test]
    fn parse_opt_with_pipeline() {
        let cli = Cli::parse_from(["silica", "opt", "in.sir", "-p", "proclower,deseq,verify"]);
        match cli.command {
            Command::Opt(ref args) => {
                assert_eq!(args.input, "in.sir");
                assert_eq!(args.passes, vec!["proclower", "deseq", "verify"]);
                assert!(args.output.is_none());
            }
            _ => panic!("expected Opt command"),
        }
    }

    #[test]
    fn parse_opt_with_output() {
        let cli = Cli::parse_from(["silica", "opt", "in.sir", "-p", "cf", "-o", "out.sir"]);
        match cli.command {
            Command::Opt(ref args) => {
                assert_eq!(args.passes, vec!["cf"]);
                assert_eq!(args.output.as_deref(), Some("out.sir"));
            }
            _ => panic!("expected Opt command"),
        }
    }

    #[test]
    fn opt_requires_passes() {
        assert!(Cli::try_parse_from(["silica", "opt", "in.sir"]).is_err());
    }

    #[test]
    fn parse_global_quiet() {
        let cli = Cli::parse_from(["silica", "--quiet", "check", "a.sir"]);
        assert!(cli.quiet);
    }
}
