//! Exact symbolic arithmetic for circuit solving.
//!
//! Values are rational functions in named symbols (circuit parameters and the
//! frequency variable `s`) with arbitrary-precision rational coefficients.
//! Everything is exact: equality is decided algebraically, never by tolerance.
//!
//! The crate provides:
//! - [`Polynomial`]: sparse multivariate polynomials in canonical form
//! - [`RationalFunction`]: normalized quotients of polynomials
//! - [`matrix::solve`] / [`matrix::inverse`]: fraction-free Gauss-Jordan
//!   elimination over [`nalgebra::DMatrix`] of rational functions
//! - [`units::parse_value`]: exact SPICE-style number parsing

pub mod error;
pub mod matrix;
pub mod monomial;
pub mod polynomial;
pub mod rational;
pub mod units;

pub use error::{Error, Result};
pub use monomial::Monomial;
pub use polynomial::Polynomial;
pub use rational::RationalFunction;

pub use num_bigint::BigInt;
pub use num_complex::Complex64;
pub use num_rational::BigRational;

/// Name of the Laplace-domain frequency symbol.
pub const FREQUENCY: &str = "s";
