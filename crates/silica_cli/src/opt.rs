//! `silica opt` — run a pass pipeline over a module.

use crate::OptArgs;
use log::info;
use silica_asm::{module_to_string, parse_module};
use silica_passes::{run_pipeline, PassContext, PassOutcome};
use std::fs;

/// Runs the `silica opt` command.
///
/// The input is parsed, the named passes run in order, and the result
/// is written to `--output` or stdout. An internal pass error aborts
/// before anything is written, leaving the input unchanged on disk;
/// the exit code is 2 in that case. In debug builds the module is
/// re-verified after every pass.
pub fn run(args: &OptArgs, quiet: bool) -> Result<i32, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(&args.input)?;
    let mut module = match parse_module(&text) {
        Ok(module) => module,
        Err(err) => {
            eprintln!("{}: {err}", args.input);
            return Ok(1);
        }
    };

    let ctx = PassContext {
        verify_each: cfg!(debug_assertions),
    };
    match run_pipeline(&args.passes, &ctx, &mut module) {
        Ok(outcomes) => {
            for (name, outcome) in &outcomes {
                match outcome {
                    PassOutcome::Applied => info!("{name}: applied"),
                    PassOutcome::Declined(reason) => {
                        if !quiet {
                            eprintln!("{name}: declined ({reason})");
                        }
                    }
                }
            }
        }
        Err(err) => {
            eprintln!("error: {err}");
            return Ok(2);
        }
    }

    let printed = module_to_string(&module);
    match &args.output {
        Some(path) => fs::write(path, printed)?,
        None => print!("{printed}"),
    }
    Ok(0)
}
