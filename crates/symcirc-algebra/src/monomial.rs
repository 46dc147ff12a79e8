//! Power products of named symbols.

use std::cmp::Ordering;
use std::fmt;

/// A product of symbols raised to positive integer powers.
///
/// Factors are kept sorted by symbol name with strictly positive exponents, so
/// two monomials are equal exactly when their factor lists are equal. The empty
/// monomial is the constant `1`.
///
/// Monomials are ordered lexicographically with symbols that sort first by
/// name treated as the most significant variables (`a > b^5`). This order is
/// a monomial order (compatible with multiplication), which polynomial
/// division relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Monomial {
    factors: Vec<(String, u32)>,
}

impl Monomial {
    /// The constant monomial `1`.
    pub fn one() -> Self {
        Self::default()
    }

    /// A single symbol to the first power.
    pub fn symbol(name: impl Into<String>) -> Self {
        Self {
            factors: vec![(name.into(), 1)],
        }
    }

    /// A single symbol raised to `exp`; `exp == 0` yields `1`.
    pub fn power(name: impl Into<String>, exp: u32) -> Self {
        if exp == 0 {
            return Self::one();
        }
        Self {
            factors: vec![(name.into(), exp)],
        }
    }

    /// Whether this is the constant monomial.
    pub fn is_one(&self) -> bool {
        self.factors.is_empty()
    }

    /// Total degree.
    pub fn degree(&self) -> u32 {
        self.factors.iter().map(|(_, e)| e).sum()
    }

    /// Exponent of `name` (0 if absent).
    pub fn exponent(&self, name: &str) -> u32 {
        self.factors
            .iter()
            .find(|(s, _)| s == name)
            .map(|(_, e)| *e)
            .unwrap_or(0)
    }

    /// Sorted `(symbol, exponent)` factors.
    pub fn factors(&self) -> &[(String, u32)] {
        &self.factors
    }

    /// Product of two monomials.
    pub fn mul(&self, other: &Monomial) -> Monomial {
        let mut factors = Vec::with_capacity(self.factors.len() + other.factors.len());
        let (mut i, mut j) = (0, 0);
        while i < self.factors.len() && j < other.factors.len() {
            let (a, ea) = &self.factors[i];
            let (b, eb) = &other.factors[j];
            match a.cmp(b) {
                Ordering::Less => {
                    factors.push((a.clone(), *ea));
                    i += 1;
                }
                Ordering::Greater => {
                    factors.push((b.clone(), *eb));
                    j += 1;
                }
                Ordering::Equal => {
                    factors.push((a.clone(), ea + eb));
                    i += 1;
                    j += 1;
                }
            }
        }
        factors.extend_from_slice(&self.factors[i..]);
        factors.extend_from_slice(&other.factors[j..]);
        Monomial { factors }
    }

    /// Quotient `self / other`, or `None` if `other` does not divide `self`.
    pub fn div(&self, other: &Monomial) -> Option<Monomial> {
        let mut factors = Vec::with_capacity(self.factors.len());
        let mut j = 0;
        for (name, exp) in &self.factors {
            if j < other.factors.len() && other.factors[j].0 == *name {
                let e = other.factors[j].1;
                if e > *exp {
                    return None;
                }
                if e < *exp {
                    factors.push((name.clone(), exp - e));
                }
                j += 1;
            } else if j < other.factors.len() && other.factors[j].0 < *name {
                return None;
            } else {
                factors.push((name.clone(), *exp));
            }
        }
        if j < other.factors.len() {
            return None;
        }
        Some(Monomial { factors })
    }

    /// Greatest common divisor (minimum exponent per shared symbol).
    pub fn gcd(&self, other: &Monomial) -> Monomial {
        let mut factors = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.factors.len() && j < other.factors.len() {
            let (a, ea) = &self.factors[i];
            let (b, eb) = &other.factors[j];
            match a.cmp(b) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    factors.push((a.clone(), (*ea).min(*eb)));
                    i += 1;
                    j += 1;
                }
            }
        }
        Monomial { factors }
    }

    /// Split off the power of `name`, returning `(exponent, rest)`.
    pub fn split(&self, name: &str) -> (u32, Monomial) {
        let mut exp = 0;
        let mut factors = Vec::with_capacity(self.factors.len());
        for (s, e) in &self.factors {
            if s == name {
                exp = *e;
            } else {
                factors.push((s.clone(), *e));
            }
        }
        (exp, Monomial { factors })
    }
}

impl Ord for Monomial {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.factors.iter().zip(other.factors.iter()) {
            match a.0.cmp(&b.0) {
                // `self` carries a more significant symbol that `other` lacks.
                Ordering::Less => return Ordering::Greater,
                Ordering::Greater => return Ordering::Less,
                Ordering::Equal => match a.1.cmp(&b.1) {
                    Ordering::Equal => {}
                    ord => return ord,
                },
            }
        }
        self.factors.len().cmp(&other.factors.len())
    }
}

impl PartialOrd for Monomial {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Monomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.factors.is_empty() {
            return write!(f, "1");
        }
        for (k, (name, exp)) in self.factors.iter().enumerate() {
            if k > 0 {
                write!(f, "*")?;
            }
            if *exp == 1 {
                write!(f, "{}", name)?;
            } else {
                write!(f, "{}^{}", name, exp)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono(factors: &[(&str, u32)]) -> Monomial {
        factors
            .iter()
            .fold(Monomial::one(), |m, (s, e)| m.mul(&Monomial::power(*s, *e)))
    }

    #[test]
    fn test_mul_merges_factors() {
        let m = mono(&[("b", 1), ("a", 2)]).mul(&mono(&[("a", 1), ("c", 3)]));
        let expected = vec![("a".to_string(), 3), ("b".to_string(), 1), ("c".to_string(), 3)];
        assert_eq!(m.factors(), expected.as_slice());
        assert_eq!(m.degree(), 7);
    }

    #[test]
    fn test_div() {
        let m = mono(&[("a", 2), ("b", 1)]);
        assert_eq!(m.div(&mono(&[("a", 1)])), Some(mono(&[("a", 1), ("b", 1)])));
        assert_eq!(m.div(&m), Some(Monomial::one()));
        assert_eq!(m.div(&mono(&[("c", 1)])), None);
        assert_eq!(m.div(&mono(&[("a", 3)])), None);
        assert_eq!(m.div(&mono(&[("0", 1)])), None);
    }

    #[test]
    fn test_lex_order() {
        assert!(Monomial::symbol("a") > Monomial::power("b", 5));
        assert!(mono(&[("a", 1), ("b", 1)]) > Monomial::symbol("a"));
        assert!(Monomial::power("a", 2) > mono(&[("a", 1), ("b", 9)]));
        assert!(Monomial::symbol("z") > Monomial::one());
    }

    #[test]
    fn test_order_is_multiplicative() {
        let x = Monomial::symbol("a");
        let y = Monomial::power("b", 3);
        let w = mono(&[("b", 1), ("c", 2)]);
        assert!(x > y);
        assert!(x.mul(&w) > y.mul(&w));
    }

    #[test]
    fn test_gcd_and_split() {
        let m = mono(&[("a", 2), ("b", 1)]);
        let n = mono(&[("a", 1), ("c", 1)]);
        assert_eq!(m.gcd(&n), Monomial::symbol("a"));
        assert_eq!(m.split("a"), (2, Monomial::symbol("b")));
        assert_eq!(m.split("s"), (0, m.clone()));
    }

    #[test]
    fn test_display() {
        assert_eq!(mono(&[("R1", 1), ("s", 2)]).to_string(), "R1*s^2");
        assert_eq!(Monomial::one().to_string(), "1");
    }
}
