//! IR Generator - lowers the checked syntax tree to tree IR
//!
//! One [`CodeChunk`] per function plus the `.init` chunk that evaluates
//! global initializers. Variable references become address computations
//! built from their [`Access`]; calls pass the static link as `args[0]`.
//!
//! ## Lowering summary
//!
//! | Source | Tree IR |
//! |--------|---------|
//! | `-e` | `0 - e` |
//! | `!e` | `e == 0` |
//! | `a & b`, `a \| b` | branch into a shared temporary |
//! | `a[i]` | `Mem(a + CheckIndex(i, n) * size)` |
//! | `if`/`while`/`for` | labels and two-way jumps; loops yield 0 |
//! | `{x = e}` | `t <- e; x <- t`, value `t` |
//! | call | arguments into temporaries, then `Call(label, [link, t1, ..])` |

use super::instruction::{BinOp, IrExpr, IrStmt, Temp};
use super::program::{CodeChunk, IrProgram};
use crate::ast::{Ast, BinaryOp, Def, Expr, Literal, NodeId, UnaryOp};
use crate::error::IrError;
use crate::frame::{Access, FrameLayout, WORD_SIZE};
use crate::names::{Binding, Definitions};
use crate::runtime::Value;
use crate::types::{Type, Types};

type IrResult<T> = std::result::Result<T, IrError>;

/// IR Generator - transforms the checked tree to tree IR
pub struct IrGenerator<'a> {
    ast: &'a Ast,
    definitions: &'a Definitions,
    types: &'a Types,
    layout: &'a FrameLayout,
    /// Entry function name
    entry: String,
    /// Finished chunks
    chunks: Vec<CodeChunk>,
    /// Depth of the function being lowered
    depth: usize,
    /// Next available temporary of the current function
    next_temp: u32,
    /// Label counter for generating unique labels
    label_counter: usize,
}

impl<'a> IrGenerator<'a> {
    /// Creates a generator over a fully analysed tree
    pub fn new(
        ast: &'a Ast,
        definitions: &'a Definitions,
        types: &'a Types,
        layout: &'a FrameLayout,
        entry: impl Into<String>,
    ) -> Self {
        IrGenerator {
            ast,
            definitions,
            types,
            layout,
            entry: entry.into(),
            chunks: Vec::new(),
            depth: 1,
            next_temp: Temp::FIRST_FREE,
            label_counter: 0,
        }
    }

    /// Lower the whole program
    pub fn generate(mut self) -> IrResult<IrProgram> {
        // Global initializers
        self.depth = self.layout.init.depth;
        let mut inits = Vec::new();
        for &id in self.ast.definitions() {
            if let Some(Def::Variable {
                init: Some(init), ..
            }) = self.ast.def(id)
            {
                let dst = IrExpr::mem(self.address_of(id)?);
                let value = self.expr(*init)?;
                inits.push(IrStmt::mov(dst, value));
            }
        }
        let init = CodeChunk {
            frame: self.layout.init.clone(),
            body: IrStmt::Seq(inits),
        };

        for &id in self.ast.definitions() {
            if let Some(Def::Function { .. }) = self.ast.def(id) {
                self.function(id)?;
            }
        }

        tracing::debug!(chunks = self.chunks.len(), "tree IR generated");
        Ok(IrProgram {
            chunks: self.chunks,
            globals: self.layout.globals.clone(),
            init,
            entry: self.entry,
        })
    }

    /// Allocate a fresh temporary
    fn temp(&mut self) -> Temp {
        let t = Temp(self.next_temp);
        self.next_temp += 1;
        t
    }

    /// Generate a unique label
    fn label(&mut self) -> String {
        self.label_counter += 1;
        format!("L{}", self.label_counter)
    }

    fn type_of(&self, id: NodeId) -> IrResult<&'a Type> {
        self.types
            .get(id)
            .ok_or_else(|| IrError::new(format!("node {} has no type", id)))
    }

    fn function(&mut self, id: NodeId) -> IrResult<()> {
        let Some(Def::Function { body, .. }) = self.ast.def(id) else {
            return Err(IrError::new(format!("{} is not a function", id)));
        };
        let frame = self
            .layout
            .frames
            .get(id)
            .cloned()
            .ok_or_else(|| IrError::new(format!("function {} has no frame", id)))?;

        let saved = (self.depth, self.next_temp);
        self.depth = frame.depth;
        self.next_temp = Temp::FIRST_FREE;
        let value = self.expr(*body)?;
        (self.depth, self.next_temp) = saved;

        tracing::trace!(label = %frame.label, "lowered function");
        self.chunks.push(CodeChunk {
            frame,
            body: IrStmt::mov(IrExpr::Temp(Temp::RV), value),
        });
        Ok(())
    }

    // ---- addressing ----

    /// Address of the storage described by the access of `id`
    fn address_of(&self, id: NodeId) -> IrResult<IrExpr> {
        let access = self
            .layout
            .accesses
            .get(id)
            .ok_or_else(|| IrError::new(format!("node {} has no access", id)))?;
        Ok(match access {
            Access::Local { offset } => {
                IrExpr::binop(BinOp::Add, IrExpr::Temp(Temp::FP), IrExpr::int(*offset))
            }
            Access::NonLocal { hops, offset } => {
                IrExpr::binop(BinOp::Add, follow_static_links(*hops), IrExpr::int(*offset))
            }
            Access::Global { label } => IrExpr::Name(label.clone()),
        })
    }

    /// Static link for a call to a function at `callee_depth`
    fn static_link(&self, callee_depth: usize) -> IrResult<IrExpr> {
        if callee_depth == 1 {
            return Ok(IrExpr::int(0));
        }
        if callee_depth > self.depth + 1 {
            return Err(IrError::new(format!(
                "call from depth {} into depth {}",
                self.depth, callee_depth
            )));
        }
        Ok(follow_static_links(self.depth + 1 - callee_depth))
    }

    /// Value of a variable reference; arrays evaluate to their base address
    fn variable(&mut self, id: NodeId) -> IrResult<IrExpr> {
        let address = self.address_of(id)?;
        if !self.type_of(id)?.is_array() {
            return Ok(IrExpr::mem(address));
        }
        let by_reference = matches!(
            self.definitions
                .get(id)
                .and_then(|b| b.decl())
                .and_then(|d| self.ast.def(d)),
            Some(Def::Parameter { .. })
        );
        Ok(if by_reference {
            IrExpr::mem(address)
        } else {
            address
        })
    }

    /// Address of `base[index]` and the element type
    fn element(&mut self, base: NodeId, index: NodeId) -> IrResult<(IrExpr, &'a Type)> {
        let (length, element) = self
            .type_of(base)?
            .array_parts()
            .ok_or_else(|| IrError::new(format!("indexed node {} is not an array", base)))?;
        let base = self.expr(base)?;
        let index = self.expr(index)?;
        let checked = IrExpr::CheckIndex {
            index: Box::new(index),
            length,
        };
        let offset = IrExpr::binop(
            BinOp::Mul,
            checked,
            IrExpr::int(element.size_in_words() * WORD_SIZE),
        );
        Ok((IrExpr::binop(BinOp::Add, base, offset), element))
    }

    /// Memory location denoted by an assignable expression
    fn location(&mut self, id: NodeId) -> IrResult<IrExpr> {
        match self.ast.expr(id) {
            Some(Expr::Name(_)) => Ok(IrExpr::mem(self.address_of(id)?)),
            Some(Expr::Binary {
                op: BinaryOp::Index,
                left,
                right,
            }) => {
                let (address, _) = self.element(*left, *right)?;
                Ok(IrExpr::mem(address))
            }
            _ => Err(IrError::new(format!("node {} is not assignable", id))),
        }
    }

    // ---- expressions ----

    fn expr(&mut self, id: NodeId) -> IrResult<IrExpr> {
        let Some(expr) = self.ast.expr(id) else {
            return Err(IrError::new(format!("{} is not an expression", id)));
        };
        match expr {
            Expr::Error => Err(IrError::new(format!(
                "parse-error placeholder {} reached code generation",
                id
            ))),
            Expr::Literal(Literal::Integer(n)) => Ok(IrExpr::int(*n)),
            Expr::Literal(Literal::Logical(b)) => Ok(IrExpr::Const(Value::logical(*b))),
            Expr::Literal(Literal::String(s)) => Ok(IrExpr::Const(Value::Str(s.clone()))),
            Expr::Name(_) => self.variable(id),

            Expr::Unary { op, operand } => {
                let e = self.expr(*operand)?;
                Ok(match op {
                    UnaryOp::Plus => e,
                    UnaryOp::Minus => IrExpr::binop(BinOp::Sub, IrExpr::int(0), e),
                    UnaryOp::Not => IrExpr::binop(BinOp::Eq, e, IrExpr::int(0)),
                })
            }

            Expr::Binary {
                op: BinaryOp::Index,
                left,
                right,
            } => {
                let (address, element) = self.element(*left, *right)?;
                Ok(if element.is_array() {
                    address
                } else {
                    IrExpr::mem(address)
                })
            }
            Expr::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                left,
                right,
            } => self.short_circuit(*op, *left, *right),
            Expr::Binary { op, left, right } => {
                let l = self.expr(*left)?;
                let r = self.expr(*right)?;
                Ok(IrExpr::binop(lower_binary(*op)?, l, r))
            }

            Expr::Call { args, .. } => self.call(id, args),

            Expr::Block(exprs) => {
                let Some((&last, init)) = exprs.split_last() else {
                    return Ok(IrExpr::int(0));
                };
                let mut stmts = Vec::with_capacity(init.len());
                for &e in init {
                    stmts.push(IrStmt::Eval(self.expr(e)?));
                }
                let value = self.expr(last)?;
                Ok(IrExpr::eseq(IrStmt::Seq(stmts), value))
            }

            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => self.conditional(*condition, *then_branch, *else_branch),

            Expr::While { condition, body } => {
                let test = self.label();
                let enter = self.label();
                let exit = self.label();
                let cond = self.expr(*condition)?;
                let body = self.expr(*body)?;
                let stmts = vec![
                    IrStmt::Label(test.clone()),
                    IrStmt::cjump(cond, enter.clone(), exit.clone()),
                    IrStmt::Label(enter),
                    IrStmt::Eval(body),
                    IrStmt::Jump(test),
                    IrStmt::Label(exit),
                ];
                Ok(IrExpr::eseq(IrStmt::Seq(stmts), IrExpr::int(0)))
            }

            Expr::For {
                counter,
                low,
                high,
                step,
                body,
            } => {
                let counter = self.location(*counter)?;
                let low = self.expr(*low)?;
                let high = self.expr(*high)?;
                let step = self.expr(*step)?;
                let body = self.expr(*body)?;
                let (limit, increment) = (self.temp(), self.temp());
                let test = self.label();
                let enter = self.label();
                let exit = self.label();
                let stmts = vec![
                    IrStmt::mov(counter.clone(), low),
                    IrStmt::mov(IrExpr::Temp(limit), high),
                    IrStmt::mov(IrExpr::Temp(increment), step),
                    IrStmt::Label(test.clone()),
                    IrStmt::cjump(
                        IrExpr::binop(BinOp::Lt, counter.clone(), IrExpr::Temp(limit)),
                        enter.clone(),
                        exit.clone(),
                    ),
                    IrStmt::Label(enter),
                    IrStmt::Eval(body),
                    IrStmt::mov(
                        counter.clone(),
                        IrExpr::binop(BinOp::Add, counter, IrExpr::Temp(increment)),
                    ),
                    IrStmt::Jump(test),
                    IrStmt::Label(exit),
                ];
                Ok(IrExpr::eseq(IrStmt::Seq(stmts), IrExpr::int(0)))
            }

            Expr::Scoped { defs, body } => {
                let mut inits = Vec::new();
                for &d in defs {
                    match self.ast.def(d) {
                        Some(Def::Variable {
                            init: Some(init), ..
                        }) => {
                            let dst = IrExpr::mem(self.address_of(d)?);
                            let value = self.expr(*init)?;
                            inits.push(IrStmt::mov(dst, value));
                        }
                        Some(Def::Function { .. }) => self.function(d)?,
                        _ => {}
                    }
                }
                let body = self.expr(*body)?;
                Ok(IrExpr::eseq(IrStmt::Seq(inits), body))
            }

            Expr::Assign { target, value } => {
                let value = self.expr(*value)?;
                let dst = self.location(*target)?;
                let t = self.temp();
                let stmts = vec![
                    IrStmt::mov(IrExpr::Temp(t), value),
                    IrStmt::mov(dst, IrExpr::Temp(t)),
                ];
                Ok(IrExpr::eseq(IrStmt::Seq(stmts), IrExpr::Temp(t)))
            }
        }
    }

    /// `&` / `|`: the right operand runs only when it decides the result
    fn short_circuit(&mut self, op: BinaryOp, left: NodeId, right: NodeId) -> IrResult<IrExpr> {
        let l = self.expr(left)?;
        let r = self.expr(right)?;
        let t = self.temp();
        let rhs = self.label();
        let done = self.label();
        let branch = if op == BinaryOp::And {
            IrStmt::cjump(IrExpr::Temp(t), rhs.clone(), done.clone())
        } else {
            IrStmt::cjump(IrExpr::Temp(t), done.clone(), rhs.clone())
        };
        let stmts = vec![
            IrStmt::mov(IrExpr::Temp(t), l),
            branch,
            IrStmt::Label(rhs),
            IrStmt::mov(IrExpr::Temp(t), r),
            IrStmt::Label(done),
        ];
        Ok(IrExpr::eseq(IrStmt::Seq(stmts), IrExpr::Temp(t)))
    }

    fn conditional(
        &mut self,
        condition: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    ) -> IrResult<IrExpr> {
        let cond = self.expr(condition)?;
        let then_value = self.expr(then_branch)?;
        let on_true = self.label();
        let on_false = self.label();

        let Some(else_branch) = else_branch else {
            let stmts = vec![
                IrStmt::cjump(cond, on_true.clone(), on_false.clone()),
                IrStmt::Label(on_true),
                IrStmt::Eval(then_value),
                IrStmt::Label(on_false),
            ];
            return Ok(IrExpr::eseq(IrStmt::Seq(stmts), IrExpr::int(0)));
        };

        let else_value = self.expr(else_branch)?;
        let done = self.label();
        let t = self.temp();
        let stmts = vec![
            IrStmt::cjump(cond, on_true.clone(), on_false.clone()),
            IrStmt::Label(on_true),
            IrStmt::mov(IrExpr::Temp(t), then_value),
            IrStmt::Jump(done.clone()),
            IrStmt::Label(on_false),
            IrStmt::mov(IrExpr::Temp(t), else_value),
            IrStmt::Label(done),
        ];
        Ok(IrExpr::eseq(IrStmt::Seq(stmts), IrExpr::Temp(t)))
    }

    fn call(&mut self, id: NodeId, args: &[NodeId]) -> IrResult<IrExpr> {
        let binding = self
            .definitions
            .get(id)
            .copied()
            .ok_or_else(|| IrError::new(format!("call {} is not bound", id)))?;
        let (label, static_link) = match binding {
            Binding::Builtin(builtin) => (builtin.name().to_string(), IrExpr::int(0)),
            Binding::Decl(decl) => {
                let frame =
                    self.layout.frames.get(decl).ok_or_else(|| {
                        IrError::new(format!("callee {} has no frame", decl))
                    })?;
                (frame.label.clone(), self.static_link(frame.depth)?)
            }
        };

        let mut moves = Vec::with_capacity(args.len());
        let mut call_args = Vec::with_capacity(args.len() + 1);
        call_args.push(static_link);
        for &arg in args {
            let value = self.expr(arg)?;
            let t = self.temp();
            moves.push(IrStmt::mov(IrExpr::Temp(t), value));
            call_args.push(IrExpr::Temp(t));
        }
        Ok(IrExpr::eseq(
            IrStmt::Seq(moves),
            IrExpr::Call {
                label,
                args: call_args,
            },
        ))
    }
}

/// `hops` loads of the static-link word (offset 0) starting from `FP`
fn follow_static_links(hops: usize) -> IrExpr {
    (0..hops).fold(IrExpr::Temp(Temp::FP), |base, _| IrExpr::mem(base))
}

fn lower_binary(op: BinaryOp) -> IrResult<BinOp> {
    Ok(match op {
        BinaryOp::Add => BinOp::Add,
        BinaryOp::Sub => BinOp::Sub,
        BinaryOp::Mul => BinOp::Mul,
        BinaryOp::Div => BinOp::Div,
        BinaryOp::Mod => BinOp::Mod,
        BinaryOp::Eq => BinOp::Eq,
        BinaryOp::Neq => BinOp::Ne,
        BinaryOp::Lt => BinOp::Lt,
        BinaryOp::Gt => BinOp::Gt,
        BinaryOp::Leq => BinOp::Le,
        BinaryOp::Geq => BinOp::Ge,
        BinaryOp::And | BinaryOp::Or | BinaryOp::Index => {
            return Err(IrError::new(format!("operator {} has no direct IR form", op)))
        }
    })
}
