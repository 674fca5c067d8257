//! # Name Resolution
//!
//! Binds every name reference (values, callees, type names) to the declaration
//! that defines it. Scopes mirror function bodies and scoped blocks; all
//! declarations of one block are registered before any of them is resolved,
//! so functions declared side by side may call each other.
//!
//! Errors accumulate: an unresolved reference is reported and resolution
//! continues with the remaining nodes.

pub mod scope;

use crate::ast::{Ast, Def, Expr, NodeId, Position, TypeExpr};
use crate::builtins::Builtin;
use crate::error::NameError;
use crate::table::NodeTable;
use scope::{Entry, ScopeChain};
use serde::Serialize;
use std::fmt;

/// Kind of entity a name denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NameKind {
    /// `typ` declaration
    Type,
    /// Variable or parameter
    Variable,
    /// Function or built-in
    Function,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameKind::Type => f.write_str("type"),
            NameKind::Variable => f.write_str("variable"),
            NameKind::Function => f.write_str("function"),
        }
    }
}

/// What a name reference resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Binding {
    /// A declaration node of the program
    Decl(NodeId),
    /// A standard-library primitive
    Builtin(Builtin),
}

impl Binding {
    /// Declaration node, if this is not a built-in
    pub fn decl(self) -> Option<NodeId> {
        match self {
            Binding::Decl(id) => Some(id),
            Binding::Builtin(_) => None,
        }
    }
}

/// Definition-of side-table: name-reference node → binding
pub type Definitions = NodeTable<Binding>;

/// Result of name resolution
#[derive(Debug, Clone, Default)]
pub struct NameResolution {
    /// Definition-of entries
    pub definitions: Definitions,
    /// Accumulated errors
    pub errors: Vec<NameError>,
}

/// Scope-chain walker producing [`Definitions`]
pub struct NameResolver<'a> {
    ast: &'a Ast,
    scopes: ScopeChain,
    definitions: Definitions,
    errors: Vec<NameError>,
}

impl<'a> NameResolver<'a> {
    /// Creates a resolver for `ast`
    pub fn new(ast: &'a Ast) -> Self {
        Self {
            ast,
            scopes: ScopeChain::new(),
            definitions: Definitions::new(),
            errors: Vec::new(),
        }
    }

    /// Resolve the whole program
    pub fn resolve(mut self) -> NameResolution {
        self.scopes.push_scope();
        for (order, builtin) in Builtin::ALL.into_iter().enumerate() {
            let entry = Entry {
                binding: Binding::Builtin(builtin),
                kind: NameKind::Function,
                order,
                position: Position::default(),
            };
            let declared = self.scopes.declare(builtin.name(), entry);
            debug_assert!(
                declared.is_ok(),
                "built-in `{}` declared twice",
                builtin.name()
            );
        }

        self.scopes.push_scope();
        let defs = self.ast.definitions().to_vec();
        self.resolve_defs(&defs);
        self.scopes.pop_scope();
        self.scopes.pop_scope();

        tracing::debug!(
            bindings = self.definitions.len(),
            errors = self.errors.len(),
            "name resolution finished"
        );
        NameResolution {
            definitions: self.definitions,
            errors: self.errors,
        }
    }

    /// Register every declaration of a block, then resolve each in order
    fn resolve_defs(&mut self, defs: &[NodeId]) {
        for (order, &id) in defs.iter().enumerate() {
            self.declare(id, order);
        }
        for (order, &id) in defs.iter().enumerate() {
            self.resolve_def(id, order);
        }
    }

    fn declare(&mut self, id: NodeId, order: usize) {
        let Some(def) = self.ast.def(id) else {
            return;
        };
        let kind = match def {
            Def::Type { .. } => NameKind::Type,
            Def::Function { .. } => NameKind::Function,
            Def::Parameter { .. } | Def::Variable { .. } => NameKind::Variable,
        };
        let position = self.ast.position(id);
        let entry = Entry {
            binding: Binding::Decl(id),
            kind,
            order,
            position,
        };
        if let Err(previous) = self.scopes.declare(def.name(), entry) {
            self.errors.push(NameError::Duplicate {
                name: def.name().to_string(),
                position,
                previous,
            });
        }
    }

    fn resolve_def(&mut self, id: NodeId, order: usize) {
        let Some(def) = self.ast.def(id) else {
            return;
        };
        match def {
            Def::Type { ty, .. } => self.resolve_type(*ty),
            Def::Parameter { ty, .. } => self.resolve_type(*ty),
            Def::Variable { ty, init, .. } => {
                self.resolve_type(*ty);
                if let Some(init) = init {
                    self.scopes.begin_initializer(order);
                    self.resolve_expr(*init);
                    self.scopes.end_initializer();
                }
            }
            Def::Function {
                params,
                result,
                body,
                ..
            } => {
                for &param in params {
                    if let Some(Def::Parameter { ty, .. }) = self.ast.def(param) {
                        self.resolve_type(*ty);
                    }
                }
                self.resolve_type(*result);

                self.scopes.push_scope();
                for (i, &param) in params.iter().enumerate() {
                    self.declare(param, i);
                }
                self.resolve_expr(*body);
                self.scopes.pop_scope();
            }
        }
    }

    fn resolve_type(&mut self, id: NodeId) {
        match self.ast.type_expr(id) {
            Some(TypeExpr::Atom(_)) | None => {}
            Some(TypeExpr::Array { element, .. }) => self.resolve_type(*element),
            Some(TypeExpr::Named(name)) => {
                let position = self.ast.position(id);
                match self.scopes.lookup(name) {
                    None => self.errors.push(NameError::Unresolved {
                        name: name.clone(),
                        position,
                    }),
                    Some(found) if found.entry.kind != NameKind::Type => {
                        self.errors.push(NameError::KindMismatch {
                            name: name.clone(),
                            expected: NameKind::Type,
                            found: found.entry.kind,
                            position,
                        })
                    }
                    Some(found) => {
                        self.definitions.insert(id, found.entry.binding);
                    }
                }
            }
        }
    }

    fn resolve_value(&mut self, id: NodeId, name: &str) {
        let position = self.ast.position(id);
        let Some(found) = self.scopes.lookup(name) else {
            self.errors.push(NameError::Unresolved {
                name: name.to_string(),
                position,
            });
            return;
        };
        if found.entry.kind != NameKind::Variable {
            self.errors.push(NameError::KindMismatch {
                name: name.to_string(),
                expected: NameKind::Variable,
                found: found.entry.kind,
                position,
            });
            return;
        }
        if found.not_yet_initialized {
            self.errors.push(NameError::ForwardReference {
                name: name.to_string(),
                position,
            });
        }
        let binding = found.entry.binding;
        tracing::trace!(node = %id, name, "bound value reference");
        self.definitions.insert(id, binding);
    }

    fn resolve_callee(&mut self, id: NodeId, name: &str) {
        let position = self.ast.position(id);
        match self.scopes.lookup(name) {
            None => self.errors.push(NameError::Unresolved {
                name: name.to_string(),
                position,
            }),
            Some(found) if found.entry.kind == NameKind::Type => {
                self.errors.push(NameError::KindMismatch {
                    name: name.to_string(),
                    expected: NameKind::Function,
                    found: NameKind::Type,
                    position,
                })
            }
            // Variables are bound too; the type checker reports them as not callable.
            Some(found) => {
                self.definitions.insert(id, found.entry.binding);
            }
        }
    }

    fn resolve_expr(&mut self, id: NodeId) {
        let Some(expr) = self.ast.expr(id) else {
            return;
        };
        match expr {
            Expr::Literal(_) | Expr::Error => {}
            Expr::Name(name) => self.resolve_value(id, name),
            Expr::Unary { operand, .. } => self.resolve_expr(*operand),
            Expr::Binary { left, right, .. } => {
                self.resolve_expr(*left);
                self.resolve_expr(*right);
            }
            Expr::Call { name, args } => {
                self.resolve_callee(id, name);
                for &arg in args {
                    self.resolve_expr(arg);
                }
            }
            Expr::Block(exprs) => {
                for &e in exprs {
                    self.resolve_expr(e);
                }
            }
            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(*condition);
                self.resolve_expr(*then_branch);
                if let Some(e) = else_branch {
                    self.resolve_expr(*e);
                }
            }
            Expr::While { condition, body } => {
                self.resolve_expr(*condition);
                self.resolve_expr(*body);
            }
            Expr::For {
                counter,
                low,
                high,
                step,
                body,
            } => {
                for e in [*counter, *low, *high, *step, *body] {
                    self.resolve_expr(e);
                }
            }
            Expr::Scoped { defs, body } => {
                self.scopes.push_scope();
                self.resolve_defs(defs);
                self.resolve_expr(*body);
                self.scopes.pop_scope();
            }
            Expr::Assign { target, value } => {
                self.resolve_expr(*target);
                self.resolve_expr(*value);
            }
        }
    }
}
