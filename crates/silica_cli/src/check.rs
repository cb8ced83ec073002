//! `silica check` — parse and verify assembly files.

use crate::CheckArgs;
use silica_asm::parse_module;
use silica_ir::Verifier;
use std::fs;

/// Runs the `silica check` command.
///
/// Each input is parsed and verified; diagnostics are printed one per
/// line, prefixed with `- `. Returns exit code 0 when every file is
/// clean and 1 when any diagnostic was emitted.
pub fn run(args: &CheckArgs, quiet: bool) -> Result<i32, Box<dyn std::error::Error>> {
    let mut dirty = false;
    for path in &args.inputs {
        let text = fs::read_to_string(path)?;
        match parse_module(&text) {
            Err(err) => {
                println!("{path}:");
                println!("- {err}");
                dirty = true;
            }
            Ok(module) => {
                let mut verifier = Verifier::new();
                verifier.verify_module(&module);
                match verifier.finish() {
                    Ok(()) => {
                        if !quiet {
                            eprintln!("{path}: ok");
                        }
                    }
                    Err(errors) => {
                        println!("{path}:");
                        println!("{errors}");
                        dirty = true;
                    }
                }
            }
        }
    }
    Ok(if dirty { 1 } else { 0 })
}
