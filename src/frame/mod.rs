//! # Activation Records and Variable Access
//!
//! One [`Frame`] per function declaration, one [`Access`] per variable
//! declaration and per name reference that denotes a variable.
//!
//! ## Frame layout
//!
//! The frame pointer addresses the lowest word of an activation record:
//!
//! ```text
//! FP + 0                      static link (caller-supplied)
//! FP + W·(1+i)                parameter i
//! FP + parameters_size + ..   locals, in declaration order
//! FP + size                   end of frame
//! ```
//!
//! `W` is [`WORD_SIZE`]. Scoped-block locals live in the innermost enclosing
//! function's frame.

mod evaluator;

pub use evaluator::FrameEvaluator;

use crate::table::NodeTable;
use serde::Serialize;

/// Bytes per memory word: the target pointer width
pub const WORD_SIZE: i64 = std::mem::size_of::<usize>() as i64;

/// Label of the synthetic function that runs global initializers.
///
/// Generated code labels contain a `.`, which no PINS identifier can, so they
/// never collide with a top-level function's own name.
pub const INIT_LABEL: &str = ".init";

/// Layout of one function's activation record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// Code label
    pub label: String,
    /// Lexical nesting depth (top-level functions are at depth 1)
    pub depth: usize,
    /// Number of declared parameters
    pub parameter_count: usize,
    /// Static link plus parameters, in bytes
    pub parameters_size: i64,
    /// All locals of the function and its scoped blocks, in bytes
    pub locals_size: i64,
    /// Offset of the static-link word
    pub static_link_offset: i64,
}

impl Frame {
    /// Creates an empty frame for a function with `parameter_count` parameters
    pub fn new(label: impl Into<String>, depth: usize, parameter_count: usize) -> Self {
        Frame {
            label: label.into(),
            depth,
            parameter_count,
            parameters_size: WORD_SIZE * (1 + parameter_count as i64),
            locals_size: 0,
            static_link_offset: 0,
        }
    }

    /// Total size of the activation record in bytes
    pub fn size(&self) -> i64 {
        self.parameters_size + self.locals_size
    }

    /// Offset of parameter `index`
    pub fn parameter_offset(index: usize) -> i64 {
        WORD_SIZE * (1 + index as i64)
    }

    /// Reserve `words` words for a local and return its offset
    fn allocate_local(&mut self, words: i64) -> i64 {
        let offset = self.parameters_size + self.locals_size;
        self.locals_size += words * WORD_SIZE;
        offset
    }
}

/// Resolved addressing mode of a variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Access {
    /// In the current function's frame
    Local {
        /// Byte offset from the frame pointer
        offset: i64,
    },
    /// In an enclosing function's frame
    NonLocal {
        /// Static links to follow from the current frame
        hops: usize,
        /// Byte offset from the owning frame's pointer
        offset: i64,
    },
    /// Top-level variable in static data
    Global {
        /// Data label
        label: String,
    },
}

/// Statically allocated storage for one global variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataChunk {
    /// Data label (the variable name)
    pub label: String,
    /// Size in bytes
    pub size: i64,
}

/// Output of frame evaluation
#[derive(Debug, Clone, Default, Serialize)]
pub struct FrameLayout {
    /// Frame-of entries keyed by function declaration
    pub frames: NodeTable<Frame>,
    /// Access-of entries keyed by variable declaration or name reference
    pub accesses: NodeTable<Access>,
    /// Global variables in declaration order
    pub globals: Vec<DataChunk>,
    /// Frame of the global-initializer pseudo function
    pub init: Frame,
}

impl Default for Frame {
    fn default() -> Self {
        Frame::new(INIT_LABEL, 1, 0)
    }
}
