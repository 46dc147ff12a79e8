//! Exact linear solves over rational functions.
//!
//! Entries are brought to polynomial form row by row and eliminated with
//! fraction-free (Bareiss) Gauss-Jordan elimination, so every intermediate
//! division is an exact polynomial division and expression swell stays
//! bounded by the size of the determinant.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};
use crate::polynomial::Polynomial;
use crate::rational::RationalFunction;

/// Solve `A X = B` for `X`.
///
/// `A` must be square and symbolically non-singular; a matrix whose
/// determinant is identically zero yields [`Error::SingularMatrix`].
pub fn solve(
    a: &DMatrix<RationalFunction>,
    b: &DMatrix<RationalFunction>,
) -> Result<DMatrix<RationalFunction>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            actual: a.ncols(),
        });
    }
    if b.nrows() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            actual: b.nrows(),
        });
    }
    let m = b.ncols();
    if n == 0 {
        return Ok(DMatrix::zeros(0, m));
    }

    let width = n + m;
    let mut rows: Vec<Vec<Polynomial>> = (0..n)
        .map(|i| {
            let entries: Vec<&RationalFunction> = (0..width)
                .map(|j| if j < n { &a[(i, j)] } else { &b[(i, j - n)] })
                .collect();
            clear_denominators(&entries)
        })
        .collect();

    let mut prev = Polynomial::one();
    for k in 0..n {
        let pivot = (k..n)
            .filter(|&i| !rows[i][k].is_zero())
            .min_by_key(|&i| rows[i][k].len())
            .ok_or(Error::SingularMatrix)?;
        rows.swap(k, pivot);

        for i in 0..n {
            if i == k {
                continue;
            }
            let factor = rows[i][k].clone();
            for j in 0..width {
                if j == k {
                    continue;
                }
                let t = &(&rows[k][k] * &rows[i][j]) - &(&factor * &rows[k][j]);
                // Sylvester's identity makes this division exact.
                rows[i][j] = t.div_exact(&prev).ok_or(Error::SingularMatrix)?;
            }
            rows[i][k] = Polynomial::zero();
        }
        prev = rows[k][k].clone();
    }

    let mut x = DMatrix::zeros(n, m);
    for i in 0..n {
        for j in 0..m {
            x[(i, j)] = RationalFunction::new(rows[i][n + j].clone(), rows[i][i].clone())?;
        }
    }
    Ok(x)
}

/// Solve `A x = b` for a single right-hand side.
pub fn solve_vector(
    a: &DMatrix<RationalFunction>,
    b: &DVector<RationalFunction>,
) -> Result<DVector<RationalFunction>> {
    let rhs = DMatrix::from_fn(b.len(), 1, |i, _| b[i].clone());
    let x = solve(a, &rhs)?;
    Ok(DVector::from_fn(x.nrows(), |i, _| x[(i, 0)].clone()))
}

/// Inverse of a square matrix.
pub fn inverse(a: &DMatrix<RationalFunction>) -> Result<DMatrix<RationalFunction>> {
    let n = a.nrows();
    solve(a, &DMatrix::identity(n, n))
}

/// Multiply a row through by its distinct denominators.
fn clear_denominators(entries: &[&RationalFunction]) -> Vec<Polynomial> {
    let mut dens: Vec<&Polynomial> = Vec::new();
    for e in entries {
        let d = e.denominator();
        if !d.is_one() && !dens.contains(&d) {
            dens.push(d);
        }
    }
    entries
        .iter()
        .map(|e| {
            let mut p = e.numerator().clone();
            if p.is_zero() {
                return p;
            }
            for d in &dens {
                if *d != e.denominator() {
                    p = &p * d;
                }
            }
            p
        })
        .collect()
}
