//! Parameter expression tree.

use symcirc_algebra::BigRational;

/// A parsed parameter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Exact number, SPICE suffix already applied.
    Number(BigRational),
    /// Reference to another parameter.
    Param(String),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `name(args...)`. Kept so the error can name the call; never evaluable.
    Call { name: String, args: Vec<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl Expr {
    pub(crate) fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }
}
