//! The type system of the IR.
//!
//! [`Type`] is an immutable value with structural equality: constructing
//! the same type twice yields equal types, and distinct objects may
//! represent the same type. The `Display` form is the assembly surface
//! syntax (`i8`, `n9`, `i8$`, `i8*`, `[4 x i8]`, `{i8, i32}`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A hardware type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// The `void` type, carried by instructions without a result.
    Void,
    /// The `label` type of basic blocks.
    Label,
    /// The `time` type of simulation-time constants.
    Time,
    /// A two's-complement integer of the given bit width, `iN`.
    Int(u32),
    /// A nine-valued logic vector of the given width, `nN`.
    Logic(u32),
    /// A signal carrying values of the inner type, `T$`.
    Signal(Box<Type>),
    /// A pointer to a value of the inner type, `T*`.
    Pointer(Box<Type>),
    /// An array of `n` elements of the inner type, `[n x T]`.
    Array(u32, Box<Type>),
    /// A struct with the given field types, `{T, T, ...}`.
    Struct(Vec<Type>),
}

impl Type {
    /// Creates a signal type carrying the given type.
    pub fn signal(ty: Type) -> Type {
        Type::Signal(Box::new(ty))
    }

    /// Creates a pointer type to the given type.
    pub fn pointer(ty: Type) -> Type {
        Type::Pointer(Box::new(ty))
    }

    /// Creates an array type of `size` elements of the given type.
    pub fn array(size: u32, ty: Type) -> Type {
        Type::Array(size, Box::new(ty))
    }

    /// Returns `true` if this is the void type.
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// Returns `true` if this is an integer type.
    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int(_))
    }

    /// Returns `true` if this is a logic vector type.
    pub fn is_logic(&self) -> bool {
        matches!(self, Type::Logic(_))
    }

    /// Returns `true` if this is a signal type.
    pub fn is_signal(&self) -> bool {
        matches!(self, Type::Signal(_))
    }

    /// Returns `true` if this is a time type.
    pub fn is_time(&self) -> bool {
        matches!(self, Type::Time)
    }

    /// Returns the width of an `Int`, `Logic`, or `Array` type.
    pub fn width(&self) -> Option<u32> {
        match self {
            Type::Int(w) | Type::Logic(w) | Type::Array(w, _) => Some(*w),
            _ => None,
        }
    }

    /// Returns the element type of a `Signal`, `Pointer`, or `Array`.
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Signal(ty) | Type::Pointer(ty) | Type::Array(_, ty) => Some(ty),
            _ => None,
        }
    }

    /// Returns the field types of a `Struct`.
    pub fn fields(&self) -> Option<&[Type]> {
        match self {
            Type::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// Returns the type of field `index` of a `Struct`.
    pub fn field(&self, index: usize) -> Option<&Type> {
        self.fields().and_then(|fields| fields.get(index))
    }

    /// Returns the type carried by a signal.
    ///
    /// # Panics
    ///
    /// Panics if the type is not a signal.
    pub fn unwrap_signal(&self) -> &Type {
        match self {
            Type::Signal(ty) => ty,
            _ => panic!("unwrap_signal called on `{self}`"),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Label => write!(f, "label"),
            Type::Time => write!(f, "time"),
            Type::Int(w) => write!(f, "i{w}"),
            Type::Logic(w) => write!(f, "n{w}"),
            Type::Signal(ty) => write!(f, "{ty}$"),
            Type::Pointer(ty) => write!(f, "{ty}*"),
            Type::Array(n, ty) => write!(f, "[{n} x {ty}]"),
            Type::Struct(fields) => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
