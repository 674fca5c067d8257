//! Canonicalizer - tree IR to flat statement lists
//!
//! Lifts every nested statement out of expressions and every call into its
//! own `Move(Temp, Call)` / `Eval(Call)` statement, preserving evaluation
//! order. When a lifted statement would run before an expression that was
//! written to its left, the expression is first saved in a fresh temporary
//! unless the two provably commute.
//!
//! The output contains no `Seq` and no `Eseq`; re-canonicalizing it returns
//! the same statements.

use super::instruction::{IrExpr, IrStmt, Temp};
use super::program::{CanonicalProgram, CodeChunk, IrProgram, LinearChunk};
use crate::error::IrError;
use crate::frame::Frame;
use std::collections::BTreeSet;

type IrResult<T> = std::result::Result<T, IrError>;

/// Rewrites tree IR into canonical statement lists
#[derive(Debug)]
pub struct Canonicalizer {
    next_temp: u32,
}

impl Canonicalizer {
    /// Canonicalize every chunk of a program
    pub fn canonicalize_program(program: &IrProgram) -> IrResult<CanonicalProgram> {
        let init = Self::canonicalize(&program.init)?;
        let chunks = program
            .chunks
            .iter()
            .map(Self::canonicalize)
            .collect::<IrResult<Vec<_>>>()?;
        let canonical = CanonicalProgram {
            chunks,
            globals: program.globals.clone(),
            init,
            entry: program.entry.clone(),
        };
        tracing::debug!(
            chunks = canonical.chunks.len(),
            statements = canonical.statement_count(),
            "canonical IR generated"
        );
        Ok(canonical)
    }

    /// Canonicalize one tree-IR chunk
    pub fn canonicalize(chunk: &CodeChunk) -> IrResult<LinearChunk> {
        Self::linearize(&chunk.frame, chunk.body.clone())
    }

    /// Canonicalize an already linear chunk again (a fixed point for
    /// canonical input)
    pub fn recanonicalize(chunk: &LinearChunk) -> IrResult<LinearChunk> {
        Self::linearize(&chunk.frame, IrStmt::Seq(chunk.stmts.clone()))
    }

    fn linearize(frame: &Frame, body: IrStmt) -> IrResult<LinearChunk> {
        let first_free = body
            .max_temp()
            .map_or(Temp::FIRST_FREE, |t| t.0 + 1)
            .max(Temp::FIRST_FREE);
        let mut canon = Canonicalizer {
            next_temp: first_free,
        };
        let tree = canon.do_stm(body)?;
        let mut stmts = Vec::new();
        flatten(tree, &mut stmts);
        tracing::trace!(label = %frame.label, statements = stmts.len(), "linearized chunk");
        Ok(LinearChunk {
            frame: frame.clone(),
            stmts,
        })
    }

    fn temp(&mut self) -> Temp {
        let t = Temp(self.next_temp);
        self.next_temp += 1;
        t
    }

    fn do_stm(&mut self, stmt: IrStmt) -> IrResult<IrStmt> {
        Ok(match stmt {
            IrStmt::Seq(stmts) => IrStmt::Seq(
                stmts
                    .into_iter()
                    .map(|s| self.do_stm(s))
                    .collect::<IrResult<Vec<_>>>()?,
            ),
            IrStmt::Jump(_) | IrStmt::Label(_) => stmt,
            IrStmt::CJump {
                cond,
                if_true,
                if_false,
            } => {
                let (s, cond) = self.do_exp(cond)?;
                seq(s, IrStmt::CJump {
                    cond,
                    if_true,
                    if_false,
                })
            }
            IrStmt::Move {
                dst: IrExpr::Temp(t),
                src,
            } => {
                let (s, src) = self.do_exp_top(src)?;
                seq(s, IrStmt::mov(IrExpr::Temp(t), src))
            }
            IrStmt::Move {
                dst: IrExpr::Mem(address),
                src,
            } => {
                let (s, mut parts) = self.reorder(vec![*address, src])?;
                let src = parts.pop();
                let address = parts.pop();
                match (address, src) {
                    (Some(address), Some(src)) => seq(s, IrStmt::mov(IrExpr::mem(address), src)),
                    _ => return Err(IrError::new("store lost an operand")),
                }
            }
            IrStmt::Move {
                dst: IrExpr::Eseq { stmt, expr },
                src,
            } => self.do_stm(IrStmt::Seq(vec![*stmt, IrStmt::mov(*expr, src)]))?,
            IrStmt::Move { dst, .. } => {
                return Err(IrError::new(format!(
                    "move into a non-location {:?}",
                    dst
                )))
            }
            IrStmt::Eval(e) => {
                let (s, e) = self.do_exp_top(e)?;
                if e.is_leaf() {
                    s
                } else {
                    seq(s, IrStmt::Eval(e))
                }
            }
        })
    }

    /// Like [`Self::do_exp`], but a call may stay in place (the caller puts it
    /// directly under `Move(Temp, _)` or `Eval`)
    fn do_exp_top(&mut self, e: IrExpr) -> IrResult<(IrStmt, IrExpr)> {
        match e {
            IrExpr::Call { label, args } => {
                let (s, args) = self.reorder(args)?;
                Ok((s, IrExpr::Call { label, args }))
            }
            IrExpr::Eseq { stmt, expr } => {
                let before = self.do_stm(*stmt)?;
                let (s, e) = self.do_exp_top(*expr)?;
                Ok((seq(before, s), e))
            }
            other => self.do_exp(other),
        }
    }

    /// Split an expression into the statements it needs and a pure remainder
    fn do_exp(&mut self, e: IrExpr) -> IrResult<(IrStmt, IrExpr)> {
        match e {
            IrExpr::Const(_) | IrExpr::Name(_) | IrExpr::Temp(_) => Ok((IrStmt::nop(), e)),
            IrExpr::Mem(address) => {
                let (s, address) = self.do_exp_single(*address)?;
                Ok((s, IrExpr::mem(address)))
            }
            IrExpr::CheckIndex { index, length } => {
                let (s, index) = self.do_exp_single(*index)?;
                Ok((
                    s,
                    IrExpr::CheckIndex {
                        index: Box::new(index),
                        length,
                    },
                ))
            }
            IrExpr::Binop { op, left, right } => {
                let (s, mut parts) = self.reorder(vec![*left, *right])?;
                let right = parts.pop();
                let left = parts.pop();
                match (left, right) {
                    (Some(left), Some(right)) => Ok((s, IrExpr::binop(op, left, right))),
                    _ => Err(IrError::new("binary operation lost an operand")),
                }
            }
            IrExpr::Call { label, args } => {
                let (s, args) = self.reorder(args)?;
                let t = self.temp();
                let call = IrStmt::mov(IrExpr::Temp(t), IrExpr::Call { label, args });
                Ok((seq(s, call), IrExpr::Temp(t)))
            }
            IrExpr::Eseq { stmt, expr } => {
                let before = self.do_stm(*stmt)?;
                let (s, e) = self.do_exp(*expr)?;
                Ok((seq(before, s), e))
            }
        }
    }

    fn do_exp_single(&mut self, e: IrExpr) -> IrResult<(IrStmt, IrExpr)> {
        let (s, mut parts) = self.reorder(vec![e])?;
        parts
            .pop()
            .map(|e| (s, e))
            .ok_or_else(|| IrError::new("expression lost in reordering"))
    }

    /// Pull the statements out of `exprs`, keeping left-to-right evaluation.
    ///
    /// Returns one statement that must run first, and the pure remainders.
    fn reorder(&mut self, exprs: Vec<IrExpr>) -> IrResult<(IrStmt, Vec<IrExpr>)> {
        let mut split = Vec::with_capacity(exprs.len());
        for e in exprs {
            split.push(self.do_exp(e)?);
        }

        let mut after = IrStmt::nop();
        let mut pure = Vec::with_capacity(split.len());
        for (s, e) in split.into_iter().rev() {
            if commute(&after, &e) {
                after = seq(s, after);
                pure.push(e);
            } else {
                let t = self.temp();
                after = seq(s, seq(IrStmt::mov(IrExpr::Temp(t), e), after));
                pure.push(IrExpr::Temp(t));
            }
        }
        pure.reverse();
        Ok((after, pure))
    }
}

/// True if running `s` before evaluating the pure expression `e` cannot change
/// the value of `e` nor which fault (if any) happens first
pub fn commute(s: &IrStmt, e: &IrExpr) -> bool {
    if s.is_nop() || matches!(e, IrExpr::Const(_) | IrExpr::Name(_)) {
        return true;
    }
    let mut written = BTreeSet::new();
    s.temps_written(&mut written);
    // Callees cannot touch the caller's temporaries.
    if let IrExpr::Temp(t) = e {
        return !written.contains(t);
    }
    if s.has_call() || s.has_store() || e.has_call() {
        return false;
    }
    if e.may_trap() && (s.may_trap() || s.has_jump()) {
        return false;
    }
    let mut read = BTreeSet::new();
    e.temps_read(&mut read);
    written.is_disjoint(&read)
}

fn seq(a: IrStmt, b: IrStmt) -> IrStmt {
    match (a.is_nop(), b.is_nop()) {
        (true, _) => b,
        (_, true) => a,
        _ => IrStmt::Seq(vec![a, b]),
    }
}

fn flatten(stmt: IrStmt, out: &mut Vec<IrStmt>) {
    match stmt {
        IrStmt::Seq(stmts) => stmts.into_iter().for_each(|s| flatten(s, out)),
        IrStmt::Eval(e) if e.is_leaf() => {}
        other => out.push(other),
    }
}
