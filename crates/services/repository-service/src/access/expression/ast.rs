//! Abstract syntax tree for access expressions.

/// Literal values written directly in an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// A context variable: `repository`, `groups` or `claims`
    Variable(String),
    /// `[a, b]` or `{a, b}`
    List(Vec<Expr>),
    /// `target.name`
    Member(Box<Expr>, String),
    /// `target[key]`
    Index(Box<Expr>, Box<Expr>),
    /// `name(args)` or `#name(args)`
    Call { function: String, args: Vec<Expr> },
    /// `target.name(args)`
    MethodCall {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Not(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Whether some path from this node down to a leaf has more than `limit`
    /// edges. Recursion stops at `limit`, so arbitrarily deep trees are safe.
    pub fn deeper_than(&self, limit: usize) -> bool {
        let children = self.children();
        match limit.checked_sub(1) {
            None => !children.is_empty(),
            Some(rest) => children.iter().any(|child| child.deeper_than(rest)),
        }
    }

    fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Literal(_) | Expr::Variable(_) => Vec::new(),
            Expr::List(items) => items.iter().collect(),
            Expr::Member(target, _) | Expr::Not(target) => vec![target.as_ref()],
            Expr::Index(target, key) => vec![target.as_ref(), key.as_ref()],
            Expr::Call { args, .. } => args.iter().collect(),
            Expr::MethodCall { target, args, .. } => {
                std::iter::once(target.as_ref()).chain(args.iter()).collect()
            }
            Expr::Binary(_, left, right) => vec![left.as_ref(), right.as_ref()],
        }
    }
}
