//! Opaque ID newtypes for all IR entities.
//!
//! Each ID is a thin `u32` wrapper that is `Copy`, `Ord`, `Hash`, and
//! `Serialize`/`Deserialize`. IDs are created by
//! [`Arena::alloc`](crate::arena::Arena::alloc) and are stable for the
//! lifetime of their arena; they are only meaningful within the unit (or
//! module, for [`UnitId`]) that created them.

use crate::arena::ArenaId;
use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize,
        )]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl ArenaId for $name {
            fn from_raw(index: u32) -> Self {
                Self(index)
            }

            fn as_raw(self) -> u32 {
                self.0
            }
        }
    };
}

define_id!(
    /// Opaque, copyable ID for a value within a unit.
    Value
);

define_id!(
    /// Opaque, copyable ID for an instruction within a unit.
    Inst
);

define_id!(
    /// Opaque, copyable ID for a basic block within a unit.
    Block
);

define_id!(
    /// Opaque, copyable ID for an external unit referenced from within a
    /// unit by `call` or `inst`.
    ExtUnit
);

define_id!(
    /// Opaque, copyable ID for a unit in a module.
    UnitId
);

impl Value {
    /// A placeholder for unused instruction operand slots.
    ///
    /// Never exposed through operand accessors.
    pub(crate) fn invalid() -> Self {
        Value(u32::MAX)
    }
}
