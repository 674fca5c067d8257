//! Frame and access evaluation
//!
//! Runs only on trees that passed name resolution and type checking; any
//! inconsistency found here is an internal defect and surfaces as
//! [`FrameError`].

use super::{Access, DataChunk, Frame, FrameLayout, INIT_LABEL, WORD_SIZE};
use crate::ast::{Ast, Def, Expr, NodeId};
use crate::error::FrameError;
use crate::names::{Binding, Definitions};
use crate::types::Types;
use std::collections::{HashMap, HashSet};

/// Computes frames and accesses for a checked program
pub struct FrameEvaluator<'a> {
    ast: &'a Ast,
    definitions: &'a Definitions,
    types: &'a Types,
    layout: FrameLayout,
    /// Depth of the frame that owns each variable declaration (0 = global)
    owner_depth: HashMap<NodeId, usize>,
    /// Frames under construction, innermost last
    open: Vec<Frame>,
    nested_functions: usize,
    /// Code labels handed out so far
    labels: HashSet<String>,
}

type FrameResult<T> = std::result::Result<T, FrameError>;

impl<'a> FrameEvaluator<'a> {
    /// Creates an evaluator over a resolved and type-checked tree
    pub fn new(ast: &'a Ast, definitions: &'a Definitions, types: &'a Types) -> Self {
        FrameEvaluator {
            ast,
            definitions,
            types,
            layout: FrameLayout::default(),
            owner_depth: HashMap::new(),
            open: Vec::new(),
            nested_functions: 0,
            labels: HashSet::from([INIT_LABEL.to_string()]),
        }
    }

    /// Lay out every frame of the program
    pub fn evaluate(mut self) -> FrameResult<FrameLayout> {
        let defs = self.ast.definitions();

        for &id in defs {
            if let Some(Def::Variable { name, .. }) = self.ast.def(id) {
                let size = self.words_of(id)? * WORD_SIZE;
                self.layout.globals.push(DataChunk {
                    label: name.clone(),
                    size,
                });
                self.owner_depth.insert(id, 0);
                self.layout.accesses.insert(
                    id,
                    Access::Global {
                        label: name.clone(),
                    },
                );
            }
        }

        // Global initializers run inside the `.init` pseudo frame.
        self.open.push(Frame::new(INIT_LABEL, 1, 0));
        for &id in defs {
            if let Some(Def::Variable {
                init: Some(init), ..
            }) = self.ast.def(id)
            {
                self.expr(*init)?;
            }
        }
        self.layout.init = self
            .open
            .pop()
            .ok_or_else(|| FrameError::new("initializer frame lost"))?;

        for &id in defs {
            if let Some(Def::Function { .. }) = self.ast.def(id) {
                self.function(id, 1)?;
            }
        }

        tracing::debug!(
            frames = self.layout.frames.len(),
            accesses = self.layout.accesses.len(),
            globals = self.layout.globals.len(),
            "frame evaluation finished"
        );
        Ok(self.layout)
    }

    fn words_of(&self, decl: NodeId) -> FrameResult<i64> {
        self.types
            .get(decl)
            .map(|ty| ty.size_in_words())
            .ok_or_else(|| FrameError::new(format!("declaration {} has no type", decl)))
    }

    fn current(&mut self) -> FrameResult<&mut Frame> {
        self.open
            .last_mut()
            .ok_or_else(|| FrameError::new("local declared outside any function"))
    }

    fn function(&mut self, id: NodeId, depth: usize) -> FrameResult<()> {
        let Some(Def::Function {
            name, params, body, ..
        }) = self.ast.def(id)
        else {
            return Err(FrameError::new(format!("{} is not a function", id)));
        };
        let label = if depth == 1 {
            name.clone()
        } else {
            self.nested_functions += 1;
            format!("L{}.{}", self.nested_functions, name)
        };
        if !self.labels.insert(label.clone()) {
            return Err(FrameError::new(format!("code label `{}` assigned twice", label)));
        }

        for (i, &param) in params.iter().enumerate() {
            self.owner_depth.insert(param, depth);
            self.layout.accesses.insert(
                param,
                Access::Local {
                    offset: Frame::parameter_offset(i),
                },
            );
        }

        self.open.push(Frame::new(label, depth, params.len()));
        self.expr(*body)?;
        let frame = self
            .open
            .pop()
            .ok_or_else(|| FrameError::new("function frame lost"))?;
        tracing::trace!(label = %frame.label, depth, size = frame.size(), "laid out frame");
        self.layout.frames.insert(id, frame);
        Ok(())
    }

    /// Locals of a scoped block: storage first, then nested functions and
    /// initializers, so bodies may refer to any variable of the block
    fn scoped_defs(&mut self, defs: &[NodeId]) -> FrameResult<()> {
        let depth = self.current()?.depth;
        for &id in defs {
            if let Some(Def::Variable { .. }) = self.ast.def(id) {
                let words = self.words_of(id)?;
                let offset = self.current()?.allocate_local(words);
                self.owner_depth.insert(id, depth);
                self.layout.accesses.insert(id, Access::Local { offset });
            }
        }
        for &id in defs {
            match self.ast.def(id) {
                Some(Def::Variable {
                    init: Some(init), ..
                }) => self.expr(*init)?,
                Some(Def::Function { .. }) => self.function(id, depth + 1)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn name_ref(&mut self, id: NodeId) -> FrameResult<()> {
        let decl = match self.definitions.get(id) {
            Some(Binding::Decl(decl)) => *decl,
            _ => {
                return Err(FrameError::new(format!(
                    "name reference {} is not bound to a declaration",
                    id
                )))
            }
        };
        let owner = *self.owner_depth.get(&decl).ok_or_else(|| {
            FrameError::new(format!("declaration {} has no storage", decl))
        })?;
        let decl_access = self
            .layout
            .accesses
            .get(decl)
            .cloned()
            .ok_or_else(|| FrameError::new(format!("declaration {} has no access", decl)))?;

        let access = match decl_access {
            Access::Global { label } => Access::Global { label },
            Access::Local { offset } => {
                let here = self.current()?.depth;
                if owner > here {
                    return Err(FrameError::new(format!(
                        "{} refers to a deeper frame ({} > {})",
                        id, owner, here
                    )));
                }
                match here - owner {
                    0 => Access::Local { offset },
                    hops => Access::NonLocal { hops, offset },
                }
            }
            Access::NonLocal { .. } => {
                return Err(FrameError::new(format!(
                    "declaration {} has a non-local access",
                    decl
                )))
            }
        };
        self.layout.accesses.insert(id, access);
        Ok(())
    }

    fn expr(&mut self, id: NodeId) -> FrameResult<()> {
        let Some(expr) = self.ast.expr(id) else {
            return Err(FrameError::new(format!("{} is not an expression", id)));
        };
        match expr {
            Expr::Literal(_) => {}
            Expr::Error => {
                return Err(FrameError::new(format!(
                    "parse-error placeholder {} reached frame evaluation",
                    id
                )))
            }
            Expr::Name(_) => self.name_ref(id)?,
            Expr::Unary { operand, .. } => self.expr(*operand)?,
            Expr::Binary { left, right, .. } => {
                self.expr(*left)?;
                self.expr(*right)?;
            }
            Expr::Call { args, .. } => {
                for &arg in args {
                    self.expr(arg)?;
                }
            }
            Expr::Block(exprs) => {
                for &e in exprs {
                    self.expr(e)?;
                }
            }
            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expr(*condition)?;
                self.expr(*then_branch)?;
                if let Some(e) = else_branch {
                    self.expr(*e)?;
                }
            }
            Expr::While { condition, body } => {
                self.expr(*condition)?;
                self.expr(*body)?;
            }
            Expr::For {
                counter,
                low,
                high,
                step,
                body,
            } => {
                for e in [*counter, *low, *high, *step, *body] {
                    self.expr(e)?;
                }
            }
            Expr::Scoped { defs, body } => {
                self.scoped_defs(defs)?;
                self.expr(*body)?;
            }
            Expr::Assign { target, value } => {
                self.expr(*target)?;
                self.expr(*value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstBuilder;
    use crate::names::NameResolver;
    use crate::types::TypeChecker;

    fn layout(ast: &Ast) -> FrameLayout {
        let names = NameResolver::new(ast).resolve();
        let types = TypeChecker::new(ast, &names.definitions).check();
        assert!(types.errors.is_empty(), "{:?}", types.errors);
        FrameEvaluator::new(ast, &names.definitions, &types.types)
            .evaluate()
            .unwrap()
    }

    #[test]
    fn test_locals_follow_parameters() {
        // fun f(p: integer): integer = (x + p) { where var a: arr[3] integer; var x: integer }
        let mut b = AstBuilder::new();
        let p_ty = b.integer();
        let p = b.param("p", p_ty);
        let elem = b.integer();
        let arr = b.array(3, elem);
        let a = b.var("a", arr);
        let x_ty = b.integer();
        let x = b.var("x", x_ty);
        let x_ref = b.name("x");
        let p_ref = b.name("p");
        let sum = b.binary(crate::ast::BinaryOp::Add, x_ref, p_ref);
        let body = b.scoped(vec![a, x], sum);
        let int = b.integer();
        let f = b.fun("f", vec![p], int, body);
        let ast = b.finish(vec![f]);

        let layout = layout(&ast);
        let frame = layout.frames.get(f).unwrap();
        assert_eq!(frame.label, "f");
        assert_eq!(frame.depth, 1);
        assert_eq!(frame.parameters_size, 2 * WORD_SIZE);
        assert_eq!(frame.locals_size, 4 * WORD_SIZE);
        assert_eq!(
            layout.accesses.get(a),
            Some(&Access::Local {
                offset: 2 * WORD_SIZE
            })
        );
        assert_eq!(
            layout.accesses.get(x_ref),
            Some(&Access::Local {
                offset: 5 * WORD_SIZE
            })
        );
        assert_eq!(
            layout.accesses.get(p_ref),
            Some(&Access::Local { offset: WORD_SIZE })
        );
    }

    #[test]
    fn test_globals_get_static_storage() {
        let mut b = AstBuilder::new();
        let elem = b.integer();
        let arr = b.array(5, elem);
        let g = b.var("g", arr);
        let ast = b.finish(vec![g]);

        let layout = layout(&ast);
        assert_eq!(
            layout.globals,
            vec![DataChunk {
                label: "g".into(),
                size: 5 * WORD_SIZE
            }]
        );
        assert_eq!(
            layout.accesses.get(g),
            Some(&Access::Global { label: "g".into() })
        );
        assert_eq!(layout.init.label, INIT_LABEL);
    }

    #[test]
    fn test_unbound_reference_is_internal_error() {
        let mut b = AstBuilder::new();
        let int = b.integer();
        let ghost = b.name("ghost");
        let main = b.fun("main", vec![], int, ghost);
        let ast = b.finish(vec![main]);

        let definitions = Definitions::new();
        let mut types = Types::new();
        types.insert(ghost, crate::types::Type::Integer);
        let err = FrameEvaluator::new(&ast, &definitions, &types)
            .evaluate()
            .unwrap_err();
        assert!(err.message.contains("not bound"));
    }
}
