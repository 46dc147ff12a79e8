//! Symbolic expression evaluation.

use symcirc_algebra::RationalFunction;

use super::ast::{BinaryOp, Expr};
use crate::error::ParameterError;

/// Resolves identifiers while an expression is evaluated.
pub trait Lookup {
    /// Value of the named parameter.
    fn lookup(&mut self, name: &str) -> Result<RationalFunction, ParameterError>;
}

impl Expr {
    /// Evaluate to a rational function, resolving parameters through `scope`.
    pub fn eval<L: Lookup + ?Sized>(&self, scope: &mut L) -> Result<RationalFunction, ParameterError> {
        Ok(match self {
            Expr::Number(value) => RationalFunction::constant(value.clone()),
            Expr::Param(name) => scope.lookup(name)?,
            Expr::Neg(inner) => -inner.eval(scope)?,
            Expr::Binary(op, lhs, rhs) => {
                let a = lhs.eval(scope)?;
                let b = rhs.eval(scope)?;
                match op {
                    BinaryOp::Add => &a + &b,
                    BinaryOp::Sub => &a - &b,
                    BinaryOp::Mul => &a * &b,
                    BinaryOp::Div => a.checked_div(&b)?,
                    BinaryOp::Pow => {
                        let Some(n) = b.as_integer().and_then(|n| i32::try_from(n).ok()) else {
                            return Err(ParameterError::Unsupported(format!(
                                "non-integer exponent {}",
                                b
                            )));
                        };
                        a.pow_i32(n)?
                    }
                }
            }
            Expr::Call { name, .. } => {
                return Err(ParameterError::Unsupported(format!("function {}()", name)));
            }
        })
    }
}
