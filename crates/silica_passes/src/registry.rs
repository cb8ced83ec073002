//! Pass lookup by stable name, and the pipeline runner.

use crate::cf::ConstFolding;
use crate::dce::DeadCodeElim;
use crate::deseq::Desequentialization;
use crate::pass::{Pass, PassContext, PassOutcome};
use crate::proclower::ProcessLowering;
use log::info;
use silica_common::{InternalError, SilicaResult};
use silica_ir::{Module, Verifier, VerifierErrors};

/// A registered pass: its stable name, a short description, and its
/// declared effects on the IR.
pub struct PassInfo {
    /// The stable name used by `-p`.
    pub name: &'static str,
    /// One-line description for `--help`-style listings.
    pub description: &'static str,
    /// Whether the pass may replace whole units in the module table.
    pub rewrites_units: bool,
    /// Whether the pass may change block structure, invalidating any
    /// dominance information computed before it.
    pub invalidates_cfg: bool,
    /// The module-level entry point.
    pub run: fn(&PassContext, &mut Module) -> SilicaResult<PassOutcome>,
}

/// All registered passes, in lookup order.
pub const PASSES: &[PassInfo] = &[
    PassInfo {
        name: "cf",
        description: "constant folding",
        rewrites_units: false,
        invalidates_cfg: true,
        run: run_cf,
    },
    PassInfo {
        name: "dce",
        description: "dead code elimination",
        rewrites_units: false,
        invalidates_cfg: true,
        run: run_dce,
    },
    PassInfo {
        name: "proclower",
        description: "lower complete-sensitivity processes to entities",
        rewrites_units: true,
        invalidates_cfg: true,
        run: run_proclower,
    },
    PassInfo {
        name: "deseq",
        description: "recover registers from event-driven processes",
        rewrites_units: true,
        invalidates_cfg: true,
        run: run_deseq,
    },
    PassInfo {
        name: "verify",
        description: "check module well-formedness",
        rewrites_units: false,
        invalidates_cfg: false,
        run: run_verify,
    },
];

fn outcome(modified: bool, declined: &str) -> SilicaResult<PassOutcome> {
    Ok(if modified {
        PassOutcome::Applied
    } else {
        PassOutcome::Declined(declined.to_string())
    })
}

fn run_cf(ctx: &PassContext, module: &mut Module) -> SilicaResult<PassOutcome> {
    outcome(ConstFolding::run_on_module(ctx, module), "nothing to fold")
}

fn run_dce(ctx: &PassContext, module: &mut Module) -> SilicaResult<PassOutcome> {
    outcome(DeadCodeElim::run_on_module(ctx, module), "nothing to remove")
}

fn run_proclower(ctx: &PassContext, module: &mut Module) -> SilicaResult<PassOutcome> {
    outcome(
        ProcessLowering::run_on_module(ctx, module),
        "no process was lowered",
    )
}

fn run_deseq(ctx: &PassContext, module: &mut Module) -> SilicaResult<PassOutcome> {
    outcome(
        Desequentialization::run_on_module(ctx, module),
        "no register was recovered",
    )
}

/// The `verify` pseudo-pass: never mutates; diagnostics abort the
/// pipeline as an internal error of whatever produced the module.
fn run_verify(_ctx: &PassContext, module: &mut Module) -> SilicaResult<PassOutcome> {
    let mut verifier = Verifier::new();
    verifier.verify_module(module);
    match verifier.finish() {
        Ok(()) => Ok(PassOutcome::Applied),
        Err(errors) => Err(InternalError::new(format!(
            "verification failed:\n{errors}"
        ))),
    }
}

/// Looks a pass up by its stable name.
pub fn find_pass(name: &str) -> Option<&'static PassInfo> {
    PASSES.iter().find(|pass| pass.name == name)
}

/// An error aborting a pass pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A pass name did not resolve in the registry.
    #[error("unknown pass `{0}`")]
    UnknownPass(String),
    /// A pass failed internally; the module state is suspect.
    #[error("pass `{pass}` failed: {error}")]
    Internal {
        /// The failing pass.
        pass: String,
        /// The underlying error.
        error: InternalError,
    },
    /// A pass left the module in a state the verifier rejects.
    #[error("module does not verify after `{pass}`:\n{errors}")]
    VerificationFailed {
        /// The pass that ran last.
        pass: String,
        /// The verifier diagnostics.
        errors: VerifierErrors,
    },
}

/// Runs a comma-split pipeline of named passes in order, returning the
/// per-pass outcomes. With [`PassContext::verify_each`] set, the module
/// is re-verified after every pass and the pipeline aborts on the first
/// breach.
pub fn run_pipeline(
    names: &[String],
    ctx: &PassContext,
    module: &mut Module,
) -> Result<Vec<(String, PassOutcome)>, PipelineError> {
    let mut outcomes = Vec::new();
    for name in names {
        let pass = find_pass(name).ok_or_else(|| PipelineError::UnknownPass(name.clone()))?;
        info!("running pass `{}`", pass.name);
        let outcome = (pass.run)(ctx, module).map_err(|error| PipelineError::Internal {
            pass: name.clone(),
            error,
        })?;
        if ctx.verify_each && pass.name != "verify" {
            let mut verifier = Verifier::new();
            verifier.verify_module(module);
            if let Err(errors) = verifier.finish() {
                if errors.has_errors() {
                    return Err(PipelineError::VerificationFailed {
                        pass: name.clone(),
                        errors,
                    });
                }
            }
        }
        outcomes.push((name.clone(), outcome));
    }
    Ok(outcomes)
}
