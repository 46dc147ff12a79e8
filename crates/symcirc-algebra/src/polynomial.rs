//! Sparse multivariate polynomials with exact rational coefficients.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use num_complex::Complex64;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::error::{Error, Result};
use crate::monomial::Monomial;

/// A polynomial in named symbols over the rationals.
///
/// Terms are stored in a map from [`Monomial`] to a non-zero coefficient, so
/// the representation is canonical and `==` is exact algebraic equality.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Polynomial {
    terms: BTreeMap<Monomial, BigRational>,
}

impl Polynomial {
    /// The zero polynomial.
    pub fn zero() -> Self {
        Self::default()
    }

    /// The constant polynomial `1`.
    pub fn one() -> Self {
        Self::constant(BigRational::one())
    }

    /// A constant polynomial.
    pub fn constant(c: BigRational) -> Self {
        let mut p = Self::zero();
        p.add_term(Monomial::one(), c);
        p
    }

    /// A constant from an integer.
    pub fn from_integer(n: i64) -> Self {
        Self::constant(BigRational::from_integer(n.into()))
    }

    /// The polynomial consisting of a single symbol.
    pub fn symbol(name: &str) -> Self {
        Self::term(Monomial::symbol(name), BigRational::one())
    }

    /// A single term `c * m`.
    pub fn term(m: Monomial, c: BigRational) -> Self {
        let mut p = Self::zero();
        p.add_term(m, c);
        p
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn is_one(&self) -> bool {
        self.as_constant().is_some_and(|c| c.is_one())
    }

    /// Whether the polynomial has no symbols (including zero).
    pub fn is_constant(&self) -> bool {
        self.terms.keys().all(Monomial::is_one)
    }

    /// The constant value, if the polynomial is constant.
    pub fn as_constant(&self) -> Option<BigRational> {
        if self.is_zero() {
            return Some(BigRational::zero());
        }
        if self.is_constant() {
            return self.terms.values().next().cloned();
        }
        None
    }

    /// Number of non-zero terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Iterate over `(monomial, coefficient)` pairs in ascending monomial order.
    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, &BigRational)> {
        self.terms.iter()
    }

    /// Leading term under the lexicographic monomial order.
    pub fn leading(&self) -> Option<(&Monomial, &BigRational)> {
        self.terms.iter().next_back()
    }

    /// Every symbol appearing in the polynomial, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for m in self.terms.keys() {
            for (name, _) in m.factors() {
                if let Err(pos) = out.binary_search(name) {
                    out.insert(pos, name.clone());
                }
            }
        }
        out
    }

    fn add_term(&mut self, m: Monomial, c: BigRational) {
        if c.is_zero() {
            return;
        }
        match self.terms.get_mut(&m) {
            Some(existing) => {
                *existing += c;
                if existing.is_zero() {
                    self.terms.remove(&m);
                }
            }
            None => {
                self.terms.insert(m, c);
            }
        }
    }

    /// Multiply every coefficient by `c`.
    pub fn scale(&self, c: &BigRational) -> Polynomial {
        if c.is_zero() {
            return Polynomial::zero();
        }
        Polynomial {
            terms: self
                .terms
                .iter()
                .map(|(m, k)| (m.clone(), k * c))
                .collect(),
        }
    }

    /// Multiply by a single term `c * m`.
    pub fn mul_term(&self, m: &Monomial, c: &BigRational) -> Polynomial {
        if c.is_zero() {
            return Polynomial::zero();
        }
        Polynomial {
            terms: self
                .terms
                .iter()
                .map(|(tm, k)| (tm.mul(m), k * c))
                .collect(),
        }
    }

    /// Raise to a non-negative integer power.
    pub fn pow(&self, mut exp: u32) -> Polynomial {
        let mut base = self.clone();
        let mut acc = Polynomial::one();
        while exp > 0 {
            if exp & 1 == 1 {
                acc = &acc * &base;
            }
            exp >>= 1;
            if exp > 0 {
                base = &base * &base;
            }
        }
        acc
    }

    /// Exact quotient `self / divisor`.
    ///
    /// Returns `None` when `divisor` does not divide `self` or is zero. Uses
    /// leading-term division, which is exact for a monomial order: a non-zero
    /// remainder at any step means the division is not exact.
    pub fn div_exact(&self, divisor: &Polynomial) -> Option<Polynomial> {
        let (lm, lc) = divisor.leading()?;
        if self.is_zero() {
            return Some(Polynomial::zero());
        }
        if divisor.len() == 1 {
            let mut quotient = Polynomial::zero();
            for (m, c) in &self.terms {
                quotient.add_term(m.div(lm)?, c / lc);
            }
            return Some(quotient);
        }

        let mut remainder = self.clone();
        let mut quotient = Polynomial::zero();
        while let Some((rm, rc)) = remainder.leading() {
            let m = rm.div(lm)?;
            let c = rc / lc;
            remainder = &remainder - &divisor.mul_term(&m, &c);
            quotient.add_term(m, c);
        }
        Some(quotient)
    }

    /// Greatest monomial dividing every term.
    pub fn monomial_content(&self) -> Monomial {
        let mut terms = self.terms.keys();
        let Some(first) = terms.next() else {
            return Monomial::one();
        };
        terms.fold(first.clone(), |g, m| g.gcd(m))
    }

    /// Divide every term by a monomial known to divide all of them.
    pub fn div_monomial(&self, m: &Monomial) -> Option<Polynomial> {
        if m.is_one() {
            return Some(self.clone());
        }
        let mut terms = BTreeMap::new();
        for (tm, c) in &self.terms {
            terms.insert(tm.div(m)?, c.clone());
        }
        Some(Polynomial { terms })
    }

    /// Evaluate numerically with complex symbol values.
    pub fn eval(&self, values: &HashMap<String, Complex64>) -> Result<Complex64> {
        let mut acc = Complex64::new(0.0, 0.0);
        for (m, c) in &self.terms {
            let mut t = Complex64::new(ratio_to_f64(c), 0.0);
            for (name, exp) in m.factors() {
                let v = values
                    .get(name)
                    .ok_or_else(|| Error::UnboundSymbol(name.clone()))?;
                t *= v.powu(*exp);
            }
            acc += t;
        }
        Ok(acc)
    }
}

pub(crate) fn ratio_to_f64(c: &BigRational) -> f64 {
    match (c.numer().to_f64(), c.denom().to_f64()) {
        (Some(n), Some(d)) => n / d,
        _ => f64::NAN,
    }
}

impl From<BigRational> for Polynomial {
    fn from(c: BigRational) -> Self {
        Polynomial::constant(c)
    }
}

impl Add for &Polynomial {
    type Output = Polynomial;

    fn add(self, rhs: &Polynomial) -> Polynomial {
        let mut out = self.clone();
        for (m, c) in &rhs.terms {
            out.add_term(m.clone(), c.clone());
        }
        out
    }
}

impl Sub for &Polynomial {
    type Output = Polynomial;

    fn sub(self, rhs: &Polynomial) -> Polynomial {
        let mut out = self.clone();
        for (m, c) in &rhs.terms {
            out.add_term(m.clone(), -c);
        }
        out
    }
}

impl Mul for &Polynomial {
    type Output = Polynomial;

    fn mul(self, rhs: &Polynomial) -> Polynomial {
        let mut out = Polynomial::zero();
        for (ma, ca) in &self.terms {
            for (mb, cb) in &rhs.terms {
                out.add_term(ma.mul(mb), ca * cb);
            }
        }
        out
    }
}

impl Neg for &Polynomial {
    type Output = Polynomial;

    fn neg(self) -> Polynomial {
        Polynomial {
            terms: self.terms.iter().map(|(m, c)| (m.clone(), -c)).collect(),
        }
    }
}

impl Add for Polynomial {
    type Output = Polynomial;

    fn add(self, rhs: Polynomial) -> Polynomial {
        &self + &rhs
    }
}

impl Sub for Polynomial {
    type Output = Polynomial;

    fn sub(self, rhs: Polynomial) -> Polynomial {
        &self - &rhs
    }
}

impl Mul for Polynomial {
    type Output = Polynomial;

    fn mul(self, rhs: Polynomial) -> Polynomial {
        &self * &rhs
    }
}

impl Neg for Polynomial {
    type Output = Polynomial;

    fn neg(self) -> Polynomial {
        -&self
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        // Highest term first reads naturally.
        for (k, (m, c)) in self.terms.iter().rev().enumerate() {
            let negative = c.is_negative();
            let abs = c.abs();
            if k == 0 {
                if negative {
                    write!(f, "-")?;
                }
            } else if negative {
                write!(f, " - ")?;
            } else {
                write!(f, " + ")?;
            }
            if m.is_one() {
                write!(f, "{}", abs)?;
            } else if abs.is_one() {
                write!(f, "{}", m)?;
            } else {
                write!(f, "{}*{}", abs, m)?;
            }
        }
        Ok(())
    }
}
