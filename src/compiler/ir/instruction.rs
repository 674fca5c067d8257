//! IR node definitions
//!
//! Tree IR permits statements nested inside expressions ([`IrExpr::Eseq`]) and
//! calls anywhere; canonical IR is a flat statement list in which calls only
//! appear as `Move(Temp, Call)` or `Eval(Call)`.

use crate::runtime::Value;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Temporary (virtual register), local to one activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Temp(pub u32);

impl Temp {
    /// Frame pointer of the current activation (read-only)
    pub const FP: Temp = Temp(0);
    /// Function result
    pub const RV: Temp = Temp(1);
    /// First temporary available to code generation
    pub const FIRST_FREE: u32 = 2;
}

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Temp::FP => write!(f, "FP"),
            Temp::RV => write!(f, "RV"),
            Temp(n) => write!(f, "T{}", n),
        }
    }
}

/// Binary IR operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinOp {
    /// Addition (wrapping)
    Add,
    /// Subtraction (wrapping)
    Sub,
    /// Multiplication (wrapping)
    Mul,
    /// Division, truncating toward zero
    Div,
    /// Remainder, sign of the dividend
    Mod,
    /// Equality: 1 or 0
    Eq,
    /// Not equal: 1 or 0
    Ne,
    /// Less than: 1 or 0
    Lt,
    /// Less than or equal: 1 or 0
    Le,
    /// Greater than: 1 or 0
    Gt,
    /// Greater than or equal: 1 or 0
    Ge,
}

impl BinOp {
    /// Relational operators
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    /// Operators that fault on a zero divisor
    pub fn may_trap(self) -> bool {
        matches!(self, BinOp::Div | BinOp::Mod)
    }
}

/// IR expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum IrExpr {
    /// Constant value
    Const(Value),
    /// Address of a static-data label
    Name(String),
    /// Contents of a temporary
    Temp(Temp),
    /// Word at a byte address
    Mem(Box<IrExpr>),
    /// Binary operation
    Binop {
        /// Operator
        op: BinOp,
        /// Left operand, evaluated first
        left: Box<IrExpr>,
        /// Right operand
        right: Box<IrExpr>,
    },
    /// Call; `args[0]` is the static link
    Call {
        /// Function label
        label: String,
        /// Arguments, evaluated left to right
        args: Vec<IrExpr>,
    },
    /// Execute `stmt`, then evaluate `expr`
    Eseq {
        /// Statement executed for effect
        stmt: Box<IrStmt>,
        /// Result expression
        expr: Box<IrExpr>,
    },
    /// `index` if `0 <= index < length`, otherwise an out-of-bounds fault
    CheckIndex {
        /// Index expression
        index: Box<IrExpr>,
        /// Array length
        length: i64,
    },
}

/// IR statement
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum IrStmt {
    /// Store `src` into a temporary or memory word
    Move {
        /// `Temp` or `Mem`
        dst: IrExpr,
        /// Stored value
        src: IrExpr,
    },
    /// Evaluate for effect, discarding the value
    Eval(IrExpr),
    /// Unconditional jump
    Jump(String),
    /// Two-way branch on a non-zero condition
    CJump {
        /// Condition
        cond: IrExpr,
        /// Target when the condition is non-zero
        if_true: String,
        /// Target otherwise
        if_false: String,
    },
    /// Jump target
    Label(String),
    /// Statements in order; the empty sequence is the no-op
    Seq(Vec<IrStmt>),
}

impl IrExpr {
    /// Integer constant
    pub fn int(n: i64) -> Self {
        IrExpr::Const(Value::Int(n))
    }

    /// Binary operation
    pub fn binop(op: BinOp, left: IrExpr, right: IrExpr) -> Self {
        IrExpr::Binop {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Memory word at `address`
    pub fn mem(address: IrExpr) -> Self {
        IrExpr::Mem(Box::new(address))
    }

    /// `stmt` then `expr`; a no-op statement is dropped
    pub fn eseq(stmt: IrStmt, expr: IrExpr) -> Self {
        if stmt.is_nop() {
            return expr;
        }
        IrExpr::Eseq {
            stmt: Box::new(stmt),
            expr: Box::new(expr),
        }
    }

    /// Constants, labels and temporaries: no effect and nothing to evaluate
    pub fn is_leaf(&self) -> bool {
        matches!(self, IrExpr::Const(_) | IrExpr::Name(_) | IrExpr::Temp(_))
    }

    /// True if evaluation may call a function
    pub fn has_call(&self) -> bool {
        match self {
            IrExpr::Const(_) | IrExpr::Name(_) | IrExpr::Temp(_) => false,
            IrExpr::Mem(e) => e.has_call(),
            IrExpr::CheckIndex { index, .. } => index.has_call(),
            IrExpr::Binop { left, right, .. } => left.has_call() || right.has_call(),
            IrExpr::Call { .. } => true,
            IrExpr::Eseq { stmt, expr } => stmt.has_call() || expr.has_call(),
        }
    }

    /// True if evaluation may raise a runtime fault
    pub fn may_trap(&self) -> bool {
        match self {
            IrExpr::Const(_) | IrExpr::Name(_) | IrExpr::Temp(_) => false,
            IrExpr::Mem(e) => e.may_trap(),
            IrExpr::CheckIndex { .. } | IrExpr::Call { .. } => true,
            IrExpr::Binop { op, left, right } => {
                op.may_trap() || left.may_trap() || right.may_trap()
            }
            IrExpr::Eseq { stmt, expr } => stmt.may_trap() || expr.may_trap(),
        }
    }

    /// True if the expression contains a nested statement
    pub fn has_eseq(&self) -> bool {
        match self {
            IrExpr::Const(_) | IrExpr::Name(_) | IrExpr::Temp(_) => false,
            IrExpr::Mem(e) => e.has_eseq(),
            IrExpr::CheckIndex { index, .. } => index.has_eseq(),
            IrExpr::Binop { left, right, .. } => left.has_eseq() || right.has_eseq(),
            IrExpr::Call { args, .. } => args.iter().any(IrExpr::has_eseq),
            IrExpr::Eseq { .. } => true,
        }
    }

    /// Temporaries read during evaluation
    pub fn temps_read(&self, out: &mut BTreeSet<Temp>) {
        match self {
            IrExpr::Const(_) | IrExpr::Name(_) => {}
            IrExpr::Temp(t) => {
                out.insert(*t);
            }
            IrExpr::Mem(e) | IrExpr::CheckIndex { index: e, .. } => e.temps_read(out),
            IrExpr::Binop { left, right, .. } => {
                left.temps_read(out);
                right.temps_read(out);
            }
            IrExpr::Call { args, .. } => args.iter().for_each(|a| a.temps_read(out)),
            IrExpr::Eseq { stmt, expr } => {
                stmt.temps_read(out);
                expr.temps_read(out);
            }
        }
    }
}

impl IrStmt {
    /// The empty statement
    pub fn nop() -> Self {
        IrStmt::Seq(Vec::new())
    }

    /// True for an empty (possibly nested) sequence
    pub fn is_nop(&self) -> bool {
        match self {
            IrStmt::Seq(stmts) => stmts.iter().all(IrStmt::is_nop),
            _ => false,
        }
    }

    /// `dst <- src`
    pub fn mov(dst: IrExpr, src: IrExpr) -> Self {
        IrStmt::Move { dst, src }
    }

    /// Two-way branch
    pub fn cjump(cond: IrExpr, if_true: impl Into<String>, if_false: impl Into<String>) -> Self {
        IrStmt::CJump {
            cond,
            if_true: if_true.into(),
            if_false: if_false.into(),
        }
    }

    /// True if execution may call a function
    pub fn has_call(&self) -> bool {
        match self {
            IrStmt::Move { dst, src } => dst.has_call() || src.has_call(),
            IrStmt::Eval(e) | IrStmt::CJump { cond: e, .. } => e.has_call(),
            IrStmt::Jump(_) | IrStmt::Label(_) => false,
            IrStmt::Seq(stmts) => stmts.iter().any(IrStmt::has_call),
        }
    }

    /// True if execution may write memory
    pub fn has_store(&self) -> bool {
        match self {
            IrStmt::Move { dst, src } => {
                matches!(dst, IrExpr::Mem(_)) || dst.has_store() || src.has_store()
            }
            IrStmt::Eval(e) | IrStmt::CJump { cond: e, .. } => e.has_store(),
            IrStmt::Jump(_) | IrStmt::Label(_) => false,
            IrStmt::Seq(stmts) => stmts.iter().any(IrStmt::has_store),
        }
    }

    /// True if execution may raise a runtime fault
    pub fn may_trap(&self) -> bool {
        match self {
            IrStmt::Move { dst, src } => dst.may_trap() || src.may_trap(),
            IrStmt::Eval(e) | IrStmt::CJump { cond: e, .. } => e.may_trap(),
            IrStmt::Jump(_) | IrStmt::Label(_) => false,
            IrStmt::Seq(stmts) => stmts.iter().any(IrStmt::may_trap),
        }
    }

    /// True if execution may transfer control (and therefore loop)
    pub fn has_jump(&self) -> bool {
        match self {
            IrStmt::Jump(_) | IrStmt::CJump { .. } => true,
            IrStmt::Move { dst, src } => dst.has_jump() || src.has_jump(),
            IrStmt::Eval(e) => e.has_jump(),
            IrStmt::Label(_) => false,
            IrStmt::Seq(stmts) => stmts.iter().any(IrStmt::has_jump),
        }
    }

    /// Temporaries written by the statement
    pub fn temps_written(&self, out: &mut BTreeSet<Temp>) {
        match self {
            IrStmt::Move { dst, src } => {
                if let IrExpr::Temp(t) = dst {
                    out.insert(*t);
                }
                dst.temps_written(out);
                src.temps_written(out);
            }
            IrStmt::Eval(e) | IrStmt::CJump { cond: e, .. } => e.temps_written(out),
            IrStmt::Jump(_) | IrStmt::Label(_) => {}
            IrStmt::Seq(stmts) => stmts.iter().for_each(|s| s.temps_written(out)),
        }
    }

    /// Temporaries read by the statement
    pub fn temps_read(&self, out: &mut BTreeSet<Temp>) {
        match self {
            IrStmt::Move { dst, src } => {
                match dst {
                    IrExpr::Temp(_) => {}
                    IrExpr::Mem(address) => address.temps_read(out),
                    other => other.temps_read(out),
                }
                src.temps_read(out);
            }
            IrStmt::Eval(e) | IrStmt::CJump { cond: e, .. } => e.temps_read(out),
            IrStmt::Jump(_) | IrStmt::Label(_) => {}
            IrStmt::Seq(stmts) => stmts.iter().for_each(|s| s.temps_read(out)),
        }
    }

    /// Largest temporary mentioned anywhere in the statement
    pub fn max_temp(&self) -> Option<Temp> {
        let mut all = BTreeSet::new();
        self.temps_read(&mut all);
        self.temps_written(&mut all);
        all.into_iter().next_back()
    }
}

// Walkers used by the statement predicates
impl IrExpr {
    fn has_store(&self) -> bool {
        match self {
            IrExpr::Const(_) | IrExpr::Name(_) | IrExpr::Temp(_) => false,
            IrExpr::Mem(e) | IrExpr::CheckIndex { index: e, .. } => e.has_store(),
            IrExpr::Binop { left, right, .. } => left.has_store() || right.has_store(),
            // A callee may store anywhere.
            IrExpr::Call { .. } => true,
            IrExpr::Eseq { stmt, expr } => stmt.has_store() || expr.has_store(),
        }
    }

    fn has_jump(&self) -> bool {
        match self {
            IrExpr::Const(_) | IrExpr::Name(_) | IrExpr::Temp(_) => false,
            IrExpr::Mem(e) | IrExpr::CheckIndex { index: e, .. } => e.has_jump(),
            IrExpr::Binop { left, right, .. } => left.has_jump() || right.has_jump(),
            IrExpr::Call { args, .. } => args.iter().any(IrExpr::has_jump),
            IrExpr::Eseq { stmt, expr } => stmt.has_jump() || expr.has_jump(),
        }
    }

    fn temps_written(&self, out: &mut BTreeSet<Temp>) {
        match self {
            IrExpr::Const(_) | IrExpr::Name(_) | IrExpr::Temp(_) => {}
            IrExpr::Mem(e) | IrExpr::CheckIndex { index: e, .. } => e.temps_written(out),
            IrExpr::Binop { left, right, .. } => {
                left.temps_written(out);
                right.temps_written(out);
            }
            IrExpr::Call { args, .. } => args.iter().for_each(|a| a.temps_written(out)),
            IrExpr::Eseq { stmt, expr } => {
                stmt.temps_written(out);
                expr.temps_written(out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(n: u32) -> IrExpr {
        IrExpr::Temp(Temp(n))
    }

    #[test]
    fn test_nested_empty_sequences_are_nop() {
        let s = IrStmt::Seq(vec![IrStmt::nop(), IrStmt::Seq(vec![IrStmt::nop()])]);
        assert!(s.is_nop());
        assert_eq!(IrExpr::eseq(s, t(2)), t(2));
    }

    #[test]
    fn test_store_and_call_detection() {
        let store = IrStmt::mov(IrExpr::mem(t(2)), IrExpr::int(1));
        assert!(store.has_store());
        assert!(!store.has_call());

        let call = IrExpr::Call {
            label: "f".into(),
            args: vec![IrExpr::int(0)],
        };
        let into_temp = IrStmt::mov(t(3), call);
        assert!(into_temp.has_call());
        assert!(into_temp.has_store());
        assert!(!IrStmt::mov(t(3), t(4)).has_store());
    }

    #[test]
    fn test_temp_sets() {
        let s = IrStmt::mov(
            IrExpr::mem(t(5)),
            IrExpr::binop(BinOp::Add, t(2), IrExpr::Temp(Temp::FP)),
        );
        let mut read = BTreeSet::new();
        s.temps_read(&mut read);
        assert_eq!(read, [Temp::FP, Temp(2), Temp(5)].into_iter().collect());

        let mut written = BTreeSet::new();
        s.temps_written(&mut written);
        assert!(written.is_empty());
        assert_eq!(s.max_temp(), Some(Temp(5)));
    }

    #[test]
    fn test_division_may_trap() {
        let e = IrExpr::binop(BinOp::Div, t(2), IrExpr::int(3));
        assert!(e.may_trap());
        assert!(!IrExpr::binop(BinOp::Add, t(2), t(3)).may_trap());
    }
}
