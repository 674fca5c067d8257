//! # Type Checker for PINS Programs
//!
//! Post-order type assignment over the resolved syntax tree. Declarations are
//! typed on demand (memoized), so a function may be called before the
//! checker reaches its declaration.

use super::{Type, Types};
use crate::ast::{AtomType, Ast, BinaryOp, Def, Expr, Literal, NodeId, TypeExpr, UnaryOp};
use crate::error::TypeError;
use crate::names::{Binding, Definitions};
use std::collections::HashSet;

/// Output of type checking
#[derive(Debug, Clone, Default)]
pub struct TypeCheck {
    /// Type-of entries for every expression, declaration and type expression
    pub types: Types,
    /// Accumulated errors
    pub errors: Vec<TypeError>,
}

/// Type checker for PINS programs
pub struct TypeChecker<'a> {
    ast: &'a Ast,
    definitions: &'a Definitions,
    types: Types,
    /// Type declarations whose target is being computed (cycle detection)
    resolving: HashSet<NodeId>,
    errors: Vec<TypeError>,
}

impl<'a> TypeChecker<'a> {
    /// Creates a checker over a resolved tree
    pub fn new(ast: &'a Ast, definitions: &'a Definitions) -> Self {
        TypeChecker {
            ast,
            definitions,
            types: Types::new(),
            resolving: HashSet::new(),
            errors: Vec::new(),
        }
    }

    /// Type check a complete program
    pub fn check(mut self) -> TypeCheck {
        for &id in self.ast.definitions() {
            self.check_def(id);
        }
        tracing::debug!(
            typed = self.types.len(),
            errors = self.errors.len(),
            "type checking finished"
        );
        TypeCheck {
            types: self.types,
            errors: self.errors,
        }
    }

    /// Report a mismatch unless `found` is compatible with `expected`.
    ///
    /// Returns true only when both types are sound and compatible.
    fn expect(&mut self, expected: &Type, found: &Type, at: NodeId) -> bool {
        if expected.is_error() || found.is_error() {
            return false;
        }
        if expected.is_compatible(found) {
            return true;
        }
        self.errors.push(TypeError::Mismatch {
            expected: expected.structural(),
            found: found.structural(),
            position: self.ast.position(at),
        });
        false
    }

    // ---- declarations ----

    fn check_def(&mut self, id: NodeId) {
        let Some(def) = self.ast.def(id) else {
            return;
        };
        match def {
            Def::Type { .. } | Def::Parameter { .. } => {
                self.decl_type(id);
            }
            Def::Variable { init, .. } => {
                let declared = self.decl_type(id);
                if let Some(init) = init {
                    let found = self.expr_type(*init);
                    if !declared.is_error() && !declared.is_atomic() {
                        self.errors.push(TypeError::NotAssignable {
                            found: declared,
                            position: self.ast.position(id),
                        });
                    } else {
                        self.expect(&declared, &found, *init);
                    }
                }
            }
            Def::Function {
                name, params, body, ..
            } => {
                let signature = self.decl_type(id);
                for &param in params {
                    self.check_def(param);
                }
                let result = match signature {
                    Type::Function { result, .. } => *result,
                    _ => Type::Error,
                };
                if !result.is_error() && !result.is_atomic() {
                    self.errors.push(TypeError::InvalidReturnType {
                        name: name.clone(),
                        found: result.clone(),
                        position: self.ast.position(id),
                    });
                }
                let found = self.expr_type(*body);
                if result.is_atomic() {
                    self.expect(&result, &found, *body);
                }
            }
        }
    }

    /// Type of a declaration, computed once
    fn decl_type(&mut self, id: NodeId) -> Type {
        if let Some(ty) = self.types.get(id) {
            return ty.clone();
        }
        let Some(def) = self.ast.def(id) else {
            return Type::Error;
        };
        let ty = match def {
            Def::Type { name, ty } => {
                if !self.resolving.insert(id) {
                    self.errors.push(TypeError::CyclicType {
                        name: name.clone(),
                        position: self.ast.position(id),
                    });
                    return Type::Error;
                }
                let target = self.type_expr(*ty);
                self.resolving.remove(&id);
                Type::Alias {
                    name: name.clone(),
                    target: Box::new(target),
                }
            }
            Def::Parameter { ty, .. } | Def::Variable { ty, .. } => self.type_expr(*ty),
            Def::Function { params, result, .. } => {
                let params = params.iter().map(|&p| self.decl_type(p)).collect();
                Type::Function {
                    params,
                    result: Box::new(self.type_expr(*result)),
                }
            }
        };
        self.types.insert(id, ty.clone());
        ty
    }

    fn type_expr(&mut self, id: NodeId) -> Type {
        if let Some(ty) = self.types.get(id) {
            return ty.clone();
        }
        let ty = match self.ast.type_expr(id) {
            None => Type::Error,
            Some(TypeExpr::Atom(AtomType::Logical)) => Type::Logical,
            Some(TypeExpr::Atom(AtomType::Integer)) => Type::Integer,
            Some(TypeExpr::Atom(AtomType::String)) => Type::String,
            Some(TypeExpr::Array { size, element }) => {
                let element = self.type_expr(*element);
                if *size <= 0 {
                    self.errors.push(TypeError::InvalidArrayLength {
                        length: *size,
                        position: self.ast.position(id),
                    });
                    Type::Error
                } else {
                    Type::Array {
                        length: *size,
                        element: Box::new(element),
                    }
                }
            }
            Some(TypeExpr::Named(_)) => match self.definitions.get(id) {
                Some(Binding::Decl(decl)) => self.decl_type(*decl),
                _ => Type::Error,
            },
        };
        self.types.insert(id, ty.clone());
        ty
    }

    // ---- expressions ----

    fn expr_type(&mut self, id: NodeId) -> Type {
        let ty = self.infer(id);
        tracing::trace!(node = %id, ty = %ty, "typed expression");
        self.types.insert(id, ty.clone());
        ty
    }

    fn infer(&mut self, id: NodeId) -> Type {
        let Some(expr) = self.ast.expr(id) else {
            return Type::Error;
        };
        match expr {
            Expr::Error => Type::Error,
            Expr::Literal(Literal::Integer(_)) => Type::Integer,
            Expr::Literal(Literal::Logical(_)) => Type::Logical,
            Expr::Literal(Literal::String(_)) => Type::String,

            Expr::Name(_) => match self.variable_decl(id) {
                Some(decl) => self.decl_type(decl),
                None => Type::Error,
            },

            Expr::Unary { op, operand } => {
                let found = self.expr_type(*operand);
                let expected = match op {
                    UnaryOp::Plus | UnaryOp::Minus => Type::Integer,
                    UnaryOp::Not => Type::Logical,
                };
                if self.expect(&expected, &found, *operand) {
                    expected
                } else {
                    Type::Error
                }
            }

            Expr::Binary { op, left, right } => {
                let lt = self.expr_type(*left);
                let rt = self.expr_type(*right);
                self.binary_type(*op, (&lt, *left), (&rt, *right))
            }

            Expr::Call { name, args } => {
                let arg_types: Vec<Type> = args.iter().map(|&a| self.expr_type(a)).collect();
                self.call_type(id, name, args, &arg_types)
            }

            Expr::Block(exprs) => {
                let mut last = Type::Void;
                for &e in exprs {
                    last = self.expr_type(e);
                }
                last
            }

            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let ct = self.expr_type(*condition);
                self.expect(&Type::Logical, &ct, *condition);
                let then_ty = self.expr_type(*then_branch);
                match else_branch {
                    None => Type::Void,
                    Some(e) => {
                        let else_ty = self.expr_type(*e);
                        if !then_ty.is_error() && then_ty.is_compatible(&else_ty) {
                            then_ty
                        } else {
                            Type::Void
                        }
                    }
                }
            }

            Expr::While { condition, body } => {
                let ct = self.expr_type(*condition);
                self.expect(&Type::Logical, &ct, *condition);
                self.expr_type(*body);
                Type::Void
            }

            Expr::For {
                counter,
                low,
                high,
                step,
                body,
            } => {
                let counter_ty = self.expr_type(*counter);
                if self.variable_decl(*counter).is_none() && !counter_ty.is_error() {
                    self.errors.push(TypeError::NotAssignable {
                        found: counter_ty.clone(),
                        position: self.ast.position(*counter),
                    });
                }
                self.expect(&Type::Integer, &counter_ty, *counter);
                for bound in [*low, *high, *step] {
                    let ty = self.expr_type(bound);
                    self.expect(&Type::Integer, &ty, bound);
                }
                self.expr_type(*body);
                Type::Void
            }

            Expr::Scoped { defs, body } => {
                for &d in defs {
                    self.check_def(d);
                }
                self.expr_type(*body)
            }

            Expr::Assign { target, value } => {
                let tt = self.expr_type(*target);
                let vt = self.expr_type(*value);
                if tt.is_error() {
                    return Type::Error;
                }
                if !self.is_location(*target) || !tt.is_atomic() {
                    self.errors.push(TypeError::NotAssignable {
                        found: tt,
                        position: self.ast.position(id),
                    });
                    return Type::Error;
                }
                if self.expect(&tt, &vt, *value) {
                    tt
                } else {
                    Type::Error
                }
            }
        }
    }

    fn binary_type(&mut self, op: BinaryOp, left: (&Type, NodeId), right: (&Type, NodeId)) -> Type {
        let (lt, l) = left;
        let (rt, r) = right;
        if op == BinaryOp::Index {
            if lt.is_error() {
                return Type::Error;
            }
            let element = match lt.array_parts() {
                Some((_, element)) => Some(element.clone()),
                None => {
                    self.errors.push(TypeError::NotIndexable {
                        found: lt.clone(),
                        position: self.ast.position(l),
                    });
                    None
                }
            };
            let index_ok = self.expect(&Type::Integer, rt, r);
            return match element {
                Some(element) if index_ok => element,
                _ => Type::Error,
            };
        }

        if op.is_arithmetic() || op.is_logical() {
            let operand = if op.is_arithmetic() {
                Type::Integer
            } else {
                Type::Logical
            };
            let left_ok = self.expect(&operand, lt, l);
            let right_ok = self.expect(&operand, rt, r);
            return if left_ok && right_ok {
                operand
            } else {
                Type::Error
            };
        }

        // Comparison
        if lt.is_error() || rt.is_error() {
            return Type::Error;
        }
        if !lt.is_atomic() {
            self.errors.push(TypeError::Mismatch {
                expected: Type::Integer,
                found: lt.structural(),
                position: self.ast.position(l),
            });
            return Type::Error;
        }
        if self.expect(lt, rt, r) {
            Type::Logical
        } else {
            Type::Error
        }
    }

    fn call_type(&mut self, id: NodeId, name: &str, args: &[NodeId], arg_types: &[Type]) -> Type {
        let signature = match self.definitions.get(id) {
            None => return Type::Error,
            Some(Binding::Builtin(builtin)) => builtin.signature(),
            Some(Binding::Decl(decl)) => match self.ast.def(*decl) {
                Some(Def::Function { .. }) => self.decl_type(*decl),
                _ => {
                    self.errors.push(TypeError::NotCallable {
                        name: name.to_string(),
                        position: self.ast.position(id),
                    });
                    return Type::Error;
                }
            },
        };
        let Type::Function { params, result } = signature else {
            return Type::Error;
        };
        if params.len() != args.len() {
            self.errors.push(TypeError::ArityMismatch {
                name: name.to_string(),
                expected: params.len(),
                found: args.len(),
                position: self.ast.position(id),
            });
            return Type::Error;
        }
        let mut ok = true;
        for ((param, found), &arg) in params.iter().zip(arg_types).zip(args) {
            ok &= self.expect(param, found, arg);
        }
        if ok {
            *result
        } else {
            Type::Error
        }
    }

    /// Declaration of the variable or parameter a name node is bound to
    fn variable_decl(&self, id: NodeId) -> Option<NodeId> {
        let decl = self.definitions.get(id)?.decl()?;
        match self.ast.def(decl) {
            Some(Def::Variable { .. } | Def::Parameter { .. }) => Some(decl),
            _ => None,
        }
    }

    fn is_location(&self, id: NodeId) -> bool {
        match self.ast.expr(id) {
            Some(Expr::Name(_)) => self.variable_decl(id).is_some(),
            Some(Expr::Binary {
                op: BinaryOp::Index,
                ..
            }) => true,
            _ => false,
        }
    }
}
