//! Programmatic construction of syntax trees

use super::{
    AtomType, Ast, BinaryOp, Def, Expr, Literal, NodeId, NodeKind, Position, TypeExpr, UnaryOp,
};

/// Incrementally builds an [`Ast`] arena.
///
/// Every constructor appends one node and returns its id. Nodes receive the
/// position most recently set with [`AstBuilder::at`].
///
/// ```
/// use pins::ast::{AstBuilder, BinaryOp};
///
/// let mut b = AstBuilder::new();
/// let int = b.integer();
/// let one = b.int(1);
/// let two = b.int(2);
/// let sum = b.binary(BinaryOp::Add, one, two);
/// let main = b.fun("main", vec![], int, sum);
/// let ast = b.finish(vec![main]);
/// assert_eq!(ast.definitions().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct AstBuilder {
    ast: Ast,
    position: Position,
}

impl AstBuilder {
    /// Creates an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source position attached to the following nodes
    pub fn at(&mut self, line: usize, column: usize) -> &mut Self {
        self.position = Position::at(line, column);
        self
    }

    /// Finishes the tree with the given top-level declarations
    pub fn finish(mut self, definitions: Vec<NodeId>) -> Ast {
        self.ast.set_definitions(definitions);
        self.ast
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.ast.push(self.position, kind)
    }

    fn expr(&mut self, expr: Expr) -> NodeId {
        self.push(NodeKind::Expr(expr))
    }

    fn def(&mut self, def: Def) -> NodeId {
        self.push(NodeKind::Def(def))
    }

    fn ty(&mut self, ty: TypeExpr) -> NodeId {
        self.push(NodeKind::Type(ty))
    }

    // ---- type expressions ----

    /// `integer`
    pub fn integer(&mut self) -> NodeId {
        self.ty(TypeExpr::Atom(AtomType::Integer))
    }

    /// `logical`
    pub fn logical(&mut self) -> NodeId {
        self.ty(TypeExpr::Atom(AtomType::Logical))
    }

    /// `string`
    pub fn string(&mut self) -> NodeId {
        self.ty(TypeExpr::Atom(AtomType::String))
    }

    /// `arr[size] element`
    pub fn array(&mut self, size: i64, element: NodeId) -> NodeId {
        self.ty(TypeExpr::Array { size, element })
    }

    /// Reference to a named type
    pub fn named(&mut self, name: &str) -> NodeId {
        self.ty(TypeExpr::Named(name.to_string()))
    }

    // ---- declarations ----

    /// `typ name: ty`
    pub fn typ(&mut self, name: &str, ty: NodeId) -> NodeId {
        self.def(Def::Type {
            name: name.to_string(),
            ty,
        })
    }

    /// `fun name(params): result = body`
    pub fn fun(&mut self, name: &str, params: Vec<NodeId>, result: NodeId, body: NodeId) -> NodeId {
        self.def(Def::Function {
            name: name.to_string(),
            params,
            result,
            body,
        })
    }

    /// Formal parameter `name: ty`
    pub fn param(&mut self, name: &str, ty: NodeId) -> NodeId {
        self.def(Def::Parameter {
            name: name.to_string(),
            ty,
        })
    }

    /// `var name: ty`
    pub fn var(&mut self, name: &str, ty: NodeId) -> NodeId {
        self.def(Def::Variable {
            name: name.to_string(),
            ty,
            init: None,
        })
    }

    /// `var name: ty = init`
    pub fn var_init(&mut self, name: &str, ty: NodeId, init: NodeId) -> NodeId {
        self.def(Def::Variable {
            name: name.to_string(),
            ty,
            init: Some(init),
        })
    }

    // ---- expressions ----

    /// Integer literal
    pub fn int(&mut self, value: i64) -> NodeId {
        self.expr(Expr::Literal(Literal::Integer(value)))
    }

    /// Logical literal
    pub fn logical_lit(&mut self, value: bool) -> NodeId {
        self.expr(Expr::Literal(Literal::Logical(value)))
    }

    /// String literal
    pub fn str(&mut self, value: &str) -> NodeId {
        self.expr(Expr::Literal(Literal::String(value.to_string())))
    }

    /// Name reference
    pub fn name(&mut self, name: &str) -> NodeId {
        self.expr(Expr::Name(name.to_string()))
    }

    /// Prefix operation
    pub fn unary(&mut self, op: UnaryOp, operand: NodeId) -> NodeId {
        self.expr(Expr::Unary { op, operand })
    }

    /// Infix operation
    pub fn binary(&mut self, op: BinaryOp, left: NodeId, right: NodeId) -> NodeId {
        self.expr(Expr::Binary { op, left, right })
    }

    /// `base[index]`
    pub fn index(&mut self, base: NodeId, index: NodeId) -> NodeId {
        self.binary(BinaryOp::Index, base, index)
    }

    /// `name(args)`
    pub fn call(&mut self, name: &str, args: Vec<NodeId>) -> NodeId {
        self.expr(Expr::Call {
            name: name.to_string(),
            args,
        })
    }

    /// `(e1; e2; ...)`
    pub fn block(&mut self, exprs: Vec<NodeId>) -> NodeId {
        self.expr(Expr::Block(exprs))
    }

    /// `{if condition then then_branch}`
    pub fn if_then(&mut self, condition: NodeId, then_branch: NodeId) -> NodeId {
        self.expr(Expr::If {
            condition,
            then_branch,
            else_branch: None,
        })
    }

    /// `{if condition then then_branch else else_branch}`
    pub fn if_else(&mut self, condition: NodeId, then_branch: NodeId, else_branch: NodeId) -> NodeId {
        self.expr(Expr::If {
            condition,
            then_branch,
            else_branch: Some(else_branch),
        })
    }

    /// `{while condition: body}`
    pub fn while_loop(&mut self, condition: NodeId, body: NodeId) -> NodeId {
        self.expr(Expr::While { condition, body })
    }

    /// `{for counter = low, high, step: body}`; `counter` must be a name node
    pub fn for_loop(
        &mut self,
        counter: NodeId,
        low: NodeId,
        high: NodeId,
        step: NodeId,
        body: NodeId,
    ) -> NodeId {
        self.expr(Expr::For {
            counter,
            low,
            high,
            step,
            body,
        })
    }

    /// `body { where defs }`
    pub fn scoped(&mut self, defs: Vec<NodeId>, body: NodeId) -> NodeId {
        self.expr(Expr::Scoped { defs, body })
    }

    /// `{target = value}`
    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.expr(Expr::Assign { target, value })
    }

    /// Parser-recovery placeholder
    pub fn error(&mut self) -> NodeId {
        self.expr(Expr::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nodes_get_sequential_ids() {
        let mut b = AstBuilder::new();
        let a = b.int(1);
        let c = b.int(2);
        assert_eq!(a, NodeId(0));
        assert_eq!(c, NodeId(1));
    }

    #[test]
    fn test_positions_follow_cursor() {
        let mut b = AstBuilder::new();
        b.at(3, 7);
        let x = b.name("x");
        let ast = b.finish(vec![]);
        assert_eq!(ast.position(x), Position::at(3, 7));
        assert!(matches!(ast.expr(x), Some(Expr::Name(n)) if n == "x"));
        assert!(ast.def(x).is_none());
    }
}
