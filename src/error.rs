//! Error types for the PINS back end

use crate::ast::{Position, SyntaxDiagnostic};
use crate::names::NameKind;
use crate::types::Type;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Name-resolution errors (user-facing, accumulated)
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum NameError {
    /// No enclosing scope declares the name
    ///
    /// **Example:** `fun f(): integer = y` with no `y` in scope
    #[error("unresolved name `{name}` at {position}")]
    Unresolved {
        /// Referenced name
        name: String,
        /// Reference position
        position: Position,
    },

    /// The same name is declared twice in one scope
    #[error("duplicate definition of `{name}` at {position} (first defined at {previous})")]
    Duplicate {
        /// Declared name
        name: String,
        /// Second declaration
        position: Position,
        /// First declaration
        previous: Position,
    },

    /// A name was found but denotes the wrong kind of entity
    ///
    /// **Example:** a type name used as a value, or a variable used as a type
    #[error("`{name}` at {position} is a {found}, expected a {expected}")]
    KindMismatch {
        /// Referenced name
        name: String,
        /// Kind the position requires
        expected: NameKind,
        /// Kind of the declaration found
        found: NameKind,
        /// Reference position
        position: Position,
    },

    /// A variable initializer refers to a variable of the same scope that is
    /// not initialized yet
    #[error("`{name}` at {position} is used before its declaration is initialized")]
    ForwardReference {
        /// Referenced name
        name: String,
        /// Reference position
        position: Position,
    },
}

/// Type-checking errors (user-facing, accumulated)
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum TypeError {
    /// Operand or declaration has the wrong type
    ///
    /// **Example:** `1 + "a"`, `{if 1 then 2 else 3}`
    #[error("type mismatch at {position}: expected {expected}, found {found}")]
    Mismatch {
        /// Required type
        expected: Type,
        /// Actual type
        found: Type,
        /// Offending node
        position: Position,
    },

    /// Call with the wrong number of arguments
    #[error("`{name}` at {position} expects {expected} argument(s), found {found}")]
    ArityMismatch {
        /// Callee name
        name: String,
        /// Declared parameter count
        expected: usize,
        /// Argument count at the call site
        found: usize,
        /// Call position
        position: Position,
    },

    /// Indexing a non-array value
    #[error("value of type {found} at {position} cannot be indexed")]
    NotIndexable {
        /// Type of the indexed expression
        found: Type,
        /// Index expression position
        position: Position,
    },

    /// Calling something that is not a function
    #[error("`{name}` at {position} is not a function")]
    NotCallable {
        /// Callee name
        name: String,
        /// Call position
        position: Position,
    },

    /// Assignment to a non-location or of a non-atomic value
    #[error("cannot assign a value of type {found} at {position}")]
    NotAssignable {
        /// Type of the target (or `error` for non-locations)
        found: Type,
        /// Assignment position
        position: Position,
    },

    /// Functions may only return atomic values
    #[error("function `{name}` at {position} cannot return a value of type {found}")]
    InvalidReturnType {
        /// Function name
        name: String,
        /// Declared result type
        found: Type,
        /// Declaration position
        position: Position,
    },

    /// Array types need at least one element
    #[error("array length {length} at {position} is not positive")]
    InvalidArrayLength {
        /// Declared length
        length: i64,
        /// Position of the array type
        position: Position,
    },

    /// A type alias refers back to itself
    #[error("type `{name}` at {position} is defined in terms of itself")]
    CyclicType {
        /// Alias name
        name: String,
        /// Declaration position
        position: Position,
    },
}

/// Internal invariant violation detected during frame evaluation.
///
/// Never user-facing: it means an earlier pass let an inconsistent tree through.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("frame evaluation invariant violated: {message}")]
pub struct FrameError {
    /// Description of the violated invariant
    pub message: String,
}

impl FrameError {
    /// Creates a frame error with a message
    pub fn new(message: impl Into<String>) -> Self {
        FrameError {
            message: message.into(),
        }
    }
}

/// Internal invariant violation detected while lowering or canonicalizing IR
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("IR invariant violated: {message}")]
pub struct IrError {
    /// Description of the violated invariant
    pub message: String,
}

impl IrError {
    /// Creates an IR error with a message
    pub fn new(message: impl Into<String>) -> Self {
        IrError {
            message: message.into(),
        }
    }
}

/// Faults raised while interpreting IR
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum RuntimeError {
    /// Integer division or remainder by zero
    #[error("division by zero")]
    DivisionByZero,

    /// Static data does not fit into the configured memory
    #[error("out of memory: {requested} bytes requested, {available} available")]
    OutOfMemory {
        /// Bytes requested
        requested: i64,
        /// Bytes left
        available: i64,
    },

    /// The stack grew into static data, or the call-depth guard tripped
    #[error("stack overflow (stack pointer {stack_pointer})")]
    StackOverflow {
        /// Stack pointer at the failed allocation
        stack_pointer: i64,
    },

    /// Array index outside `0..length`
    #[error("array index {index} out of bounds for length {length}")]
    ArrayIndexOutOfBounds {
        /// Evaluated index
        index: i64,
        /// Declared array length
        length: i64,
    },

    /// Load or store outside memory, or not word aligned
    #[error("invalid memory address {address}")]
    InvalidAddress {
        /// Offending byte address
        address: i64,
    },

    /// Call to a label with neither a chunk nor a built-in
    #[error("unknown function `{label}`")]
    UnknownFunction {
        /// Called label
        label: String,
    },

    /// Jump to a label missing from the current statement list
    #[error("jump to undefined label `{label}`")]
    UndefinedLabel {
        /// Target label
        label: String,
    },

    /// Interpreter met an IR shape it cannot execute in this mode
    #[error("malformed IR: {message}")]
    Malformed {
        /// Description
        message: String,
    },

    /// Host-imposed step budget exhausted
    #[error("execution timed out after {steps} steps")]
    Timeout {
        /// Steps executed
        steps: u64,
    },

    /// Writing program output failed
    #[error("output error: {message}")]
    Output {
        /// Underlying I/O error text
        message: String,
    },
}

impl From<std::io::Error> for RuntimeError {
    fn from(e: std::io::Error) -> Self {
        RuntimeError::Output {
            message: e.to_string(),
        }
    }
}

/// One accumulated compile-time diagnostic
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum Diagnostic {
    /// Reported by the external parser
    #[error("{0}")]
    Syntax(SyntaxDiagnostic),
    /// Reported by name resolution
    #[error(transparent)]
    Name(#[from] NameError),
    /// Reported by type checking
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// All compile-time diagnostics of one run, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics(pub Vec<Diagnostic>);

impl Diagnostics {
    /// True if nothing was reported
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of diagnostics
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over diagnostics
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    /// Name errors only
    pub fn name_errors(&self) -> impl Iterator<Item = &NameError> {
        self.0.iter().filter_map(|d| match d {
            Diagnostic::Name(e) => Some(e),
            _ => None,
        })
    }

    /// Type errors only
    pub fn type_errors(&self) -> impl Iterator<Item = &TypeError> {
        self.0.iter().filter_map(|d| match d {
            Diagnostic::Type(e) => Some(e),
            _ => None,
        })
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

/// PINS back-end errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The program has syntax, name, or type errors; no code was generated
    #[error("compilation failed with {} error(s):\n{}", .0.len(), .0)]
    Compile(Diagnostics),

    /// Defect in an earlier pass surfaced during frame evaluation
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Defect surfaced during IR generation or canonicalization
    #[error(transparent)]
    Ir(#[from] IrError),

    /// Execution aborted
    #[error("runtime error in `{function}`: {error}")]
    Runtime {
        /// Label of the function that was executing
        function: String,
        /// The fault
        #[source]
        error: RuntimeError,
    },
}

impl Error {
    /// Runtime fault raised inside `function`
    pub fn runtime(function: impl Into<String>, error: RuntimeError) -> Self {
        Error::Runtime {
            function: function.into(),
            error,
        }
    }

    /// The runtime fault, if this is one
    pub fn runtime_error(&self) -> Option<&RuntimeError> {
        match self {
            Error::Runtime { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The compile diagnostics, if this is a compile failure
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Error::Compile(d) => Some(d),
            _ => None,
        }
    }
}

/// Result type for PINS operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_display_joins_lines() {
        let diags = Diagnostics(vec![
            NameError::Unresolved {
                name: "x".into(),
                position: Position::at(1, 2),
            }
            .into(),
            TypeError::Mismatch {
                expected: Type::Integer,
                found: Type::String,
                position: Position::at(3, 4),
            }
            .into(),
        ]);
        let text = Error::Compile(diags).to_string();
        assert!(text.contains("2 error(s)"));
        assert!(text.contains("unresolved name `x` at 1:2"));
        assert!(text.contains("expected integer, found string"));
    }

    #[test]
    fn test_runtime_error_carries_function() {
        let err = Error::runtime("main", RuntimeError::DivisionByZero);
        assert_eq!(err.runtime_error(), Some(&RuntimeError::DivisionByZero));
        assert_eq!(err.to_string(), "runtime error in `main`: division by zero");
    }
}
