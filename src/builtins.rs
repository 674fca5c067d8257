//! Standard-library primitives implemented natively by the host
//!
//! Built-ins are visible in an implicit root scope that encloses the program,
//! are type-checked like ordinary functions, and are called with the ordinary
//! calling convention (a static-link word followed by the arguments). The
//! interpreter executes them directly instead of interpreting IR.

use crate::types::Type;
use serde::Serialize;

/// Host-native primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Builtin {
    /// `print_int(i: integer): integer`
    PrintInt,
    /// `print_str(s: string): string`
    PrintStr,
    /// `print_log(l: logical): logical`
    PrintLog,
    /// `rand_int(min: integer, max: integer): integer`
    RandInt,
    /// `seed(s: integer): integer`
    Seed,
}

impl Builtin {
    /// Every built-in, in root-scope declaration order
    pub const ALL: [Builtin; 5] = [
        Builtin::PrintInt,
        Builtin::PrintStr,
        Builtin::PrintLog,
        Builtin::RandInt,
        Builtin::Seed,
    ];

    /// Source-level name, also used as the call label
    pub fn name(self) -> &'static str {
        match self {
            Builtin::PrintInt => "print_int",
            Builtin::PrintStr => "print_str",
            Builtin::PrintLog => "print_log",
            Builtin::RandInt => "rand_int",
            Builtin::Seed => "seed",
        }
    }

    /// Look up a built-in by label
    pub fn from_label(label: &str) -> Option<Builtin> {
        Self::ALL.into_iter().find(|b| b.name() == label)
    }

    /// Parameter types
    pub fn params(self) -> Vec<Type> {
        match self {
            Builtin::PrintInt | Builtin::Seed => vec![Type::Integer],
            Builtin::PrintStr => vec![Type::String],
            Builtin::PrintLog => vec![Type::Logical],
            Builtin::RandInt => vec![Type::Integer, Type::Integer],
        }
    }

    /// Result type
    pub fn result(self) -> Type {
        match self {
            Builtin::PrintInt | Builtin::RandInt | Builtin::Seed => Type::Integer,
            Builtin::PrintStr => Type::String,
            Builtin::PrintLog => Type::Logical,
        }
    }

    /// Function type of the built-in
    pub fn signature(self) -> Type {
        Type::Function {
            params: self.params(),
            result: Box::new(self.result()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_round_trip() {
        for b in Builtin::ALL {
            assert_eq!(Builtin::from_label(b.name()), Some(b));
        }
        assert_eq!(Builtin::from_label("main"), None);
    }
}
