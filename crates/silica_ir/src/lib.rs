//! Core intermediate representation for the Silica hardware toolchain.
//!
//! Silica IR describes hardware between register-transfer and gate level
//! as a typed SSA instruction language with four kinds of top-level
//! units: behavioral [`Process`](UnitKind::Process)es, structural
//! [`Entity`](UnitKind::Entity)s, combinational
//! [`Function`](UnitKind::Function)s, and external declarations. This
//! crate implements:
//!
//! - **[`Arena`]** storage with opaque IDs for all IR entities.
//! - **[`Type`]** — the closed set of hardware types with structural
//!   equality.
//! - **[`DataFlowGraph`]** — the value/use graph with atomic use-list
//!   maintenance and the replacement primitive passes build on.
//! - **[`InstData`]/[`Opcode`]** — the instruction set with operand
//!   contracts enforced at construction.
//! - **[`UnitData`]/[`Module`]** — containers, block/instruction layout,
//!   and the name-indexed module table.
//! - **[`DominatorTree`]** and the **[`Verifier`]** — the dominance
//!   analysis and the accumulating well-formedness checker.

#![warn(missing_docs)]

pub mod arena;
pub mod builder;
pub mod dfg;
pub mod dominance;
pub mod error;
pub mod ids;
pub mod inst;
pub mod layout;
pub mod module;
pub mod ty;
pub mod unit;
pub mod verifier;

pub use arena::Arena;
pub use builder::{InstBuilder, UnitBuilder};
pub use dfg::{DataFlowGraph, ExtUnitData, Use, ValueData};
pub use dominance::{DominatorTree, PredecessorTable};
pub use error::{BuildError, BuildResult};
pub use ids::{Block, ExtUnit, Inst, UnitId, Value};
pub use inst::{InstData, Opcode, RegMode};
pub use layout::{CfgLayout, FlatLayout, UnitLayout};
pub use module::{ModUnit, Module, ModuleError};
pub use ty::Type;
pub use unit::{DeclData, Signature, UnitData, UnitKind, UnitName};
pub use verifier::{Severity, Verifier, VerifierError, VerifierErrors};
