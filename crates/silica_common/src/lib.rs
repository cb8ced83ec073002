//! Shared foundational value types for the Silica hardware IR.
//!
//! This crate provides the constant-value domain the IR computes over:
//! nine-state logic values, packed logic vectors, arbitrary-width
//! two's-complement integers, and simulation-time constants, plus the
//! internal-error result type used by the pass infrastructure.

#![warn(missing_docs)]

pub mod int_value;
pub mod logic;
pub mod logic_vec;
pub mod result;
pub mod time;

pub use int_value::IntValue;
pub use logic::Logic;
pub use logic_vec::LogicVec;
pub use result::{InternalError, SilicaResult};
pub use time::TimeValue;
