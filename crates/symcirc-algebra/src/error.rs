//! Error types for symcirc-algebra.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("singular matrix")]
    SingularMatrix,

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("no value bound for symbol: {0}")]
    UnboundSymbol(String),

    #[error("invalid number: {0}")]
    InvalidNumber(String),
}

pub type Result<T> = std::result::Result<T, Error>;
