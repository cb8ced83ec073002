//! Analysis and transformation passes over the Silica IR.
//!
//! Passes implement the [`Pass`] trait at whichever granularity suits
//! them — module, unit, or instruction — and are looked up by stable
//! name through [`registry`]. The central transformations are:
//!
//! - [`ConstFolding`] (`cf`) — evaluates constant expressions.
//! - [`DeadCodeElim`] (`dce`) — removes unused instructions and
//!   unreachable blocks.
//! - [`ProcessLowering`] (`proclower`) — rewrites processes with a
//!   complete sensitivity list as entities.
//! - [`Desequentialization`] (`deseq`) — recovers flip-flop intent from
//!   event-driven processes.
//!
//! Passes communicate only through the IR; after every pass the module
//! must verify again, which [`run_pipeline`](registry::run_pipeline)
//! checks when asked to.

#![warn(missing_docs)]

pub mod cf;
pub mod dce;
pub mod deseq;
pub mod pass;
pub mod proclower;
pub mod registry;

pub use cf::ConstFolding;
pub use dce::DeadCodeElim;
pub use deseq::Desequentialization;
pub use pass::{Pass, PassContext, PassOutcome};
pub use proclower::ProcessLowering;
pub use registry::{find_pass, run_pipeline, PassInfo, PipelineError};
