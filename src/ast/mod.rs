//! # PINS Syntax Tree
//!
//! The syntax tree is produced by an external parser and consumed read-only by
//! every pass of the back end. Nodes live in a single arena owned by [`Ast`];
//! a [`NodeId`] is the stable identity every side-table is keyed by.
//!
//! ```text
//! Ast
//! ├── nodes: Vec<Node>      # arena, indexed by NodeId
//! └── definitions: Vec<Id>  # top-level declarations, in source order
//! ```
//!
//! Hosts without a parser (tests, embedders, fuzzers) construct trees with
//! [`AstBuilder`].

mod builder;

pub use builder::AstBuilder;

use serde::Serialize;
use std::fmt;

/// Stable identity of a node inside its [`Ast`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Index of this node in the arena
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Line/column location in the source text (1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Location {
    /// Line number
    pub line: usize,
    /// Column number
    pub column: usize,
}

/// Source span of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Position {
    /// First character of the node
    pub start: Location,
    /// Last character of the node
    pub end: Location,
}

impl Position {
    /// Span covering a single line/column pair
    pub fn at(line: usize, column: usize) -> Self {
        let loc = Location { line, column };
        Position {
            start: loc,
            end: loc,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start.line, self.start.column)
    }
}

/// Atomic (built-in) type keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AtomType {
    /// `logical`
    Logical,
    /// `integer`
    Integer,
    /// `string`
    String,
}

/// Syntactic type expression
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TypeExpr {
    /// One of the atomic keywords
    Atom(AtomType),
    /// `arr[size] element`
    Array {
        /// Number of elements
        size: i64,
        /// Element type expression
        element: NodeId,
    },
    /// Reference to a `typ` declaration
    Named(String),
}

/// Declarations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Def {
    /// `typ name: type`
    Type {
        /// Declared name
        name: String,
        /// Aliased type expression
        ty: NodeId,
    },
    /// `fun name(params): result = body`
    Function {
        /// Declared name
        name: String,
        /// Parameter declarations (`Def::Parameter` nodes)
        params: Vec<NodeId>,
        /// Result type expression
        result: NodeId,
        /// Body expression
        body: NodeId,
    },
    /// One formal parameter of a function
    Parameter {
        /// Parameter name
        name: String,
        /// Parameter type expression
        ty: NodeId,
    },
    /// `var name: type [= init]`
    Variable {
        /// Declared name
        name: String,
        /// Declared type expression
        ty: NodeId,
        /// Optional initializer expression
        init: Option<NodeId>,
    },
}

impl Def {
    /// Declared name
    pub fn name(&self) -> &str {
        match self {
            Def::Type { name, .. }
            | Def::Function { name, .. }
            | Def::Parameter { name, .. }
            | Def::Variable { name, .. } => name,
        }
    }
}

/// Literal constants
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    /// Integer constant
    Integer(i64),
    /// `true` / `false`
    Logical(bool),
    /// String constant (without quotes)
    String(String),
}

/// Prefix operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    /// `+e`
    Plus,
    /// `-e`
    Minus,
    /// `!e`
    Not,
}

/// Infix operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `&` (short-circuit)
    And,
    /// `|` (short-circuit)
    Or,
    /// `==`
    Eq,
    /// `!=`
    Neq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Leq,
    /// `>=`
    Geq,
    /// `a[i]`
    Index,
}

impl BinaryOp {
    /// Integer arithmetic operators
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    /// Short-circuit logical operators
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    /// Relational operators
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Neq
                | BinaryOp::Lt
                | BinaryOp::Gt
                | BinaryOp::Leq
                | BinaryOp::Geq
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Leq => "<=",
            BinaryOp::Geq => ">=",
            BinaryOp::Index => "[]",
        };
        f.write_str(s)
    }
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    /// Constant
    Literal(Literal),
    /// Reference to a variable or parameter
    Name(String),
    /// Prefix operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand expression
        operand: NodeId,
    },
    /// Infix operation (including indexing)
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: NodeId,
        /// Right operand
        right: NodeId,
    },
    /// Function call by name
    Call {
        /// Callee name
        name: String,
        /// Argument expressions
        args: Vec<NodeId>,
    },
    /// `(e1; e2; ...)`, value of the last expression
    Block(Vec<NodeId>),
    /// `{if c then a [else b]}`
    If {
        /// Logical condition
        condition: NodeId,
        /// Then branch
        then_branch: NodeId,
        /// Optional else branch
        else_branch: Option<NodeId>,
    },
    /// `{while c: body}`
    While {
        /// Logical condition
        condition: NodeId,
        /// Loop body
        body: NodeId,
    },
    /// `{for i = lo, hi, step: body}`
    For {
        /// Counter (an `Expr::Name` node)
        counter: NodeId,
        /// Initial value
        low: NodeId,
        /// Exclusive upper bound
        high: NodeId,
        /// Increment
        step: NodeId,
        /// Loop body
        body: NodeId,
    },
    /// `body { where defs }`
    Scoped {
        /// Local declarations
        defs: Vec<NodeId>,
        /// Body evaluated in the new scope
        body: NodeId,
    },
    /// `{target = value}`
    Assign {
        /// Assigned location
        target: NodeId,
        /// Assigned value
        value: NodeId,
    },
    /// Placeholder inserted by parser error recovery
    Error,
}

/// Payload of one arena node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NodeKind {
    /// Declaration
    Def(Def),
    /// Expression
    Expr(Expr),
    /// Type expression
    Type(TypeExpr),
}

/// Arena node: payload plus source span
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    /// Source span
    pub position: Position,
    /// Payload
    pub kind: NodeKind,
}

/// Complete syntax tree of one compilation unit
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Ast {
    nodes: Vec<Node>,
    definitions: Vec<NodeId>,
}

impl Ast {
    /// Top-level declarations in source order
    pub fn definitions(&self) -> &[NodeId] {
        &self.definitions
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the arena holds no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node by identity
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Source span of a node (default span for unknown ids)
    pub fn position(&self, id: NodeId) -> Position {
        self.node(id).map(|n| n.position).unwrap_or_default()
    }

    /// Declaration payload, if `id` is a declaration
    pub fn def(&self, id: NodeId) -> Option<&Def> {
        match self.node(id).map(|n| &n.kind) {
            Some(NodeKind::Def(def)) => Some(def),
            _ => None,
        }
    }

    /// Expression payload, if `id` is an expression
    pub fn expr(&self, id: NodeId) -> Option<&Expr> {
        match self.node(id).map(|n| &n.kind) {
            Some(NodeKind::Expr(expr)) => Some(expr),
            _ => None,
        }
    }

    /// Type-expression payload, if `id` is a type expression
    pub fn type_expr(&self, id: NodeId) -> Option<&TypeExpr> {
        match self.node(id).map(|n| &n.kind) {
            Some(NodeKind::Type(ty)) => Some(ty),
            _ => None,
        }
    }

    /// Iterate over all nodes with their identities
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    pub(crate) fn push(&mut self, position: Position, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { position, kind });
        id
    }

    pub(crate) fn set_definitions(&mut self, defs: Vec<NodeId>) {
        self.definitions = defs;
    }
}

/// A syntax error reported by the parser
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntaxDiagnostic {
    /// Human-readable message
    pub message: String,
    /// Where the parser gave up on the construct
    pub position: Position,
}

impl fmt::Display for SyntaxDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error at {}: {}", self.position, self.message)
    }
}

/// Parser output: a possibly partial tree plus the diagnostics that produced it
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedProgram {
    /// Syntax tree (contains `Expr::Error` where recovery happened)
    pub ast: Ast,
    /// Accumulated syntax errors
    pub diagnostics: Vec<SyntaxDiagnostic>,
}

impl From<Ast> for ParsedProgram {
    fn from(ast: Ast) -> Self {
        ParsedProgram {
            ast,
            diagnostics: Vec::new(),
        }
    }
}
