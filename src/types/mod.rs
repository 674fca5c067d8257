//! # PINS Type System
//!
//! Static types of PINS programs. Every expression and declaration node gets
//! exactly one [`Type`] entry from the [`TypeChecker`].
//!
//! ## Types
//!
//! ```text
//! logical | integer | string       atomic, one word each
//! arr[n] T                         n contiguous elements of T
//! typ name: T                      alias, transparent for compatibility
//! ```
//!
//! Two types are compatible iff their structural forms (aliases stripped,
//! recursively) are identical.
//!
//! ## Poison
//!
//! A node whose type cannot be determined is typed [`Type::Error`]. Checks
//! involving a poisoned operand are skipped, so one root cause produces one
//! diagnostic.

pub mod checker;

pub use checker::{TypeCheck, TypeChecker};

use crate::table::NodeTable;
use serde::Serialize;
use std::fmt;

/// Type-of side-table
pub type Types = NodeTable<Type>;

/// Source-level type representation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Type {
    // === Atomic ===
    /// `logical`
    Logical,
    /// `integer` (64-bit, wrapping)
    Integer,
    /// `string`
    String,

    /// Unit type of loops, `if` without `else` and empty blocks
    Void,

    // === Compound ===
    /// `arr[length] element`
    Array {
        /// Number of elements
        length: i64,
        /// Element type
        element: Box<Type>,
    },
    /// Named alias introduced by `typ`
    Alias {
        /// Declared name
        name: String,
        /// Aliased type
        target: Box<Type>,
    },
    /// Signature of a function declaration
    Function {
        /// Parameter types
        params: Vec<Type>,
        /// Result type
        result: Box<Type>,
    },

    /// Poison: the node failed to type check
    Error,
}

impl Type {
    /// The type with every alias replaced by its target
    pub fn structural(&self) -> Type {
        match self {
            Type::Alias { target, .. } => target.structural(),
            Type::Array { length, element } => Type::Array {
                length: *length,
                element: Box::new(element.structural()),
            },
            Type::Function { params, result } => Type::Function {
                params: params.iter().map(Type::structural).collect(),
                result: Box::new(result.structural()),
            },
            other => other.clone(),
        }
    }

    /// Outermost non-alias type, without copying
    pub fn unaliased(&self) -> &Type {
        match self {
            Type::Alias { target, .. } => target.unaliased(),
            other => other,
        }
    }

    /// Structural equality
    pub fn is_compatible(&self, other: &Type) -> bool {
        self.structural() == other.structural()
    }

    /// `logical`, `integer` or `string` (possibly through aliases)
    pub fn is_atomic(&self) -> bool {
        matches!(
            self.unaliased(),
            Type::Logical | Type::Integer | Type::String
        )
    }

    /// True if the type is (or aliases) `integer`
    pub fn is_integer(&self) -> bool {
        matches!(self.unaliased(), Type::Integer)
    }

    /// True if the type is (or aliases) `logical`
    pub fn is_logical(&self) -> bool {
        matches!(self.unaliased(), Type::Logical)
    }

    /// True if the type is (or aliases) an array
    pub fn is_array(&self) -> bool {
        matches!(self.unaliased(), Type::Array { .. })
    }

    /// True if the type is poison, directly or through an alias or element
    pub fn is_error(&self) -> bool {
        match self.unaliased() {
            Type::Error => true,
            Type::Array { element, .. } => element.is_error(),
            _ => false,
        }
    }

    /// Length and element type of an array
    pub fn array_parts(&self) -> Option<(i64, &Type)> {
        match self.unaliased() {
            Type::Array { length, element } => Some((*length, element)),
            _ => None,
        }
    }

    /// Storage size in words: one per atomic value, `length × element` for
    /// arrays, nothing for `void`
    pub fn size_in_words(&self) -> i64 {
        match self.unaliased() {
            Type::Array { length, element } => length * element.size_in_words(),
            Type::Void | Type::Function { .. } | Type::Error => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Logical => write!(f, "logical"),
            Type::Integer => write!(f, "integer"),
            Type::String => write!(f, "string"),
            Type::Void => write!(f, "void"),
            Type::Array { length, element } => write!(f, "arr[{}] {}", length, element),
            Type::Alias { name, .. } => write!(f, "{}", name),
            Type::Function { params, result } => {
                write!(f, "fun(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, "): {}", result)
            }
            Type::Error => write!(f, "error"),
        }
    }
}
