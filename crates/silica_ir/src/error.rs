//! Construction errors.
//!
//! Every fallible constructor in the IR reports failures through
//! [`BuildError`] and leaves the IR unchanged. These errors indicate a
//! contract violation at the call site, not a malformed data structure;
//! breaches of invariants on an already-built unit are the
//! [`Verifier`](crate::verifier::Verifier)'s business.

use crate::inst::{Opcode, RegMode};
use crate::ty::Type;
use crate::unit::UnitKind;

/// The result type of fallible IR constructors.
pub type BuildResult<T> = Result<T, BuildError>;

/// An error rejecting the construction of an instruction or unit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// A type width was zero where at least one bit is required.
    #[error("`{0}` requires a width of at least 1")]
    ZeroWidth(Opcode),

    /// An operand had the wrong type for its position.
    #[error("operand of `{opcode}` must be {expected}, got `{found}`")]
    OperandType {
        /// The instruction being built.
        opcode: Opcode,
        /// What the operand contract requires.
        expected: &'static str,
        /// The type that was provided.
        found: Type,
    },

    /// Two operands that must match had different types.
    #[error("operands of `{opcode}` must have matching types, got `{lhs}` and `{rhs}`")]
    TypeMismatch {
        /// The instruction being built.
        opcode: Opcode,
        /// The left-hand operand type.
        lhs: Type,
        /// The right-hand operand type.
        rhs: Type,
    },

    /// A field or element index was out of range for the target type.
    #[error("index {index} out of range for `{ty}`")]
    IndexOutOfRange {
        /// The offending index.
        index: u32,
        /// The indexed type.
        ty: Type,
    },

    /// A slice exceeded the bounds of the target type.
    #[error("slice of length {length} at offset {offset} out of range for `{ty}`")]
    SliceOutOfRange {
        /// The slice offset.
        offset: u32,
        /// The slice length.
        length: u32,
        /// The sliced type.
        ty: Type,
    },

    /// An instruction was built in a unit kind that does not admit it.
    #[error("`{opcode}` is not valid in a {kind} unit")]
    InvalidInUnit {
        /// The instruction being built.
        opcode: Opcode,
        /// The kind of the containing unit.
        kind: UnitKind,
    },

    /// A `call` or `inst` argument list did not match the callee's
    /// signature.
    #[error("`{unit}` expects {expected} {what}, got {found}")]
    SignatureMismatch {
        /// The name of the referenced unit.
        unit: String,
        /// What is being counted (inputs or outputs).
        what: &'static str,
        /// The number the signature requires.
        expected: usize,
        /// The number that was provided.
        found: usize,
    },

    /// An aggregate constructor received no elements.
    #[error("`{0}` requires at least one element")]
    EmptyAggregate(Opcode),

    /// The asynchronous override of a `reg` used an edge mode.
    #[error("register async override mode must be `low` or `high`, got `{0}`")]
    BadAsyncMode(RegMode),

    /// A function signature was missing a return type or carried outputs.
    #[error("a function takes value inputs and a return type, and has no output ports")]
    BadFunctionSignature,

    /// A process or entity signature carried a return type.
    #[error("a {0} has ports and no return type")]
    UnexpectedReturnType(UnitKind),

    /// A process or entity port was not of signal type.
    #[error("{kind} ports must be of signal type, got `{ty}`")]
    NonSignalPort {
        /// The kind of the unit being built.
        kind: UnitKind,
        /// The offending port type.
        ty: Type,
    },

    /// A `ret` value did not match the function's return type.
    #[error("`ret` value of type `{found}` does not match return type `{expected}`")]
    ReturnTypeMismatch {
        /// The declared return type.
        expected: Type,
        /// The returned value's type.
        found: Type,
    },
}
