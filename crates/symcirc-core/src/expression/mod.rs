//! Parameter expression parsing and symbolic evaluation.
//!
//! Supports expressions like:
//! - `2*R1 + 1k` - arithmetic with SPICE suffixes
//! - `(Ra*Rb)/(Ra+Rb)` - references to other parameters
//! - `gm^2` or `gm**2` - integer powers

mod ast;
mod eval;
mod parser;

pub use ast::{BinaryOp, Expr};
pub use eval::Lookup;
pub use parser::parse_expression;
