//! Rational functions: the symbolic value type used throughout the solver.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use num_complex::Complex64;
use num_rational::BigRational;
use num_traits::{One, ToPrimitive, Zero};

use crate::error::{Error, Result};
use crate::polynomial::Polynomial;

/// A quotient of two polynomials, kept in a normalized form.
///
/// Normalization cancels common monomial factors, performs exact division when
/// one side divides the other, and scales so the denominator's leading
/// coefficient is `1`. Without a full polynomial GCD the form is not unique,
/// so equality compares cross products (`a/b == c/d` iff `a*d == c*b`).
#[derive(Debug, Clone)]
pub struct RationalFunction {
    num: Polynomial,
    den: Polynomial,
}

impl RationalFunction {
    /// Build `num / den`, failing if `den` is zero.
    pub fn new(num: Polynomial, den: Polynomial) -> Result<Self> {
        if den.is_zero() {
            return Err(Error::DivisionByZero);
        }
        Ok(Self::normalized(num, den))
    }

    /// A polynomial value.
    pub fn from_polynomial(p: Polynomial) -> Self {
        Self {
            num: p,
            den: Polynomial::one(),
        }
    }

    /// A single free symbol.
    pub fn symbol(name: &str) -> Self {
        Self::from_polynomial(Polynomial::symbol(name))
    }

    /// An exact rational constant.
    pub fn constant(c: BigRational) -> Self {
        Self::from_polynomial(Polynomial::constant(c))
    }

    pub fn from_integer(n: i64) -> Self {
        Self::from_polynomial(Polynomial::from_integer(n))
    }

    pub fn numerator(&self) -> &Polynomial {
        &self.num
    }

    pub fn denominator(&self) -> &Polynomial {
        &self.den
    }

    /// The value as an exact constant, if it has no symbols.
    pub fn as_constant(&self) -> Option<BigRational> {
        let n = self.num.as_constant()?;
        let d = self.den.as_constant()?;
        Some(n / d)
    }

    /// The value as an integer, if it is an integral constant that fits.
    pub fn as_integer(&self) -> Option<i64> {
        let c = self.as_constant()?;
        if !c.is_integer() {
            return None;
        }
        c.to_integer().to_i64()
    }

    /// Every symbol appearing in the numerator or denominator.
    pub fn symbols(&self) -> Vec<String> {
        let mut out = self.num.symbols();
        for name in self.den.symbols() {
            if let Err(pos) = out.binary_search(&name) {
                out.insert(pos, name);
            }
        }
        out
    }

    /// Multiplicative inverse.
    pub fn inv(&self) -> Result<Self> {
        Self::new(self.den.clone(), self.num.clone())
    }

    /// Checked division.
    pub fn checked_div(&self, rhs: &Self) -> Result<Self> {
        if rhs.is_zero() {
            return Err(Error::DivisionByZero);
        }
        Ok(Self::normalized(&self.num * &rhs.den, &self.den * &rhs.num))
    }

    /// Integer power; negative exponents invert first.
    pub fn pow_i32(&self, exp: i32) -> Result<Self> {
        let base = if exp < 0 { self.inv()? } else { self.clone() };
        let e = exp.unsigned_abs();
        Ok(Self {
            num: base.num.pow(e),
            den: base.den.pow(e),
        })
    }

    /// Substitute `value` for every occurrence of `symbol`.
    pub fn subs(&self, symbol: &str, value: &RationalFunction) -> Result<Self> {
        let num = subs_polynomial(&self.num, symbol, value);
        let den = subs_polynomial(&self.den, symbol, value);
        num.checked_div(&den)
    }

    /// Numeric evaluation with complex values for every symbol.
    pub fn eval(&self, values: &HashMap<String, Complex64>) -> Result<Complex64> {
        let n = self.num.eval(values)?;
        let d = self.den.eval(values)?;
        if d == Complex64::new(0.0, 0.0) {
            return Err(Error::DivisionByZero);
        }
        Ok(n / d)
    }

    fn normalized(num: Polynomial, den: Polynomial) -> Self {
        if num.is_zero() {
            return Self::zero();
        }

        let common = num.monomial_content().gcd(&den.monomial_content());
        let (mut num, mut den) = if common.is_one() {
            (num, den)
        } else {
            match (num.div_monomial(&common), den.div_monomial(&common)) {
                (Some(n), Some(d)) => (n, d),
                _ => (num, den),
            }
        };

        if !den.is_constant() {
            if let Some(q) = num.div_exact(&den) {
                num = q;
                den = Polynomial::one();
            } else if num.len() <= den.len() {
                if let Some(q) = den.div_exact(&num) {
                    num = Polynomial::one();
                    den = q;
                }
            }
        }

        let lc = den
            .leading()
            .map(|(_, c)| c.clone())
            .unwrap_or_else(BigRational::one);
        if !lc.is_one() {
            let scale = lc.recip();
            num = num.scale(&scale);
            den = den.scale(&scale);
        }
        Self { num, den }
    }
}

fn subs_polynomial(p: &Polynomial, symbol: &str, value: &RationalFunction) -> RationalFunction {
    let mut acc = RationalFunction::zero();
    let mut powers: Vec<RationalFunction> = vec![RationalFunction::one()];
    for (m, c) in p.terms() {
        let (exp, rest) = m.split(symbol);
        while powers.len() <= exp as usize {
            let next = powers.last().map(|last| last * value).unwrap_or_else(RationalFunction::one);
            powers.push(next);
        }
        let term = RationalFunction::from_polynomial(Polynomial::term(rest, c.clone()));
        acc = &acc + &(&term * &powers[exp as usize]);
    }
    acc
}

impl From<Polynomial> for RationalFunction {
    fn from(p: Polynomial) -> Self {
        Self::from_polynomial(p)
    }
}

impl From<i64> for RationalFunction {
    fn from(n: i64) -> Self {
        Self::from_integer(n)
    }
}

impl From<BigRational> for RationalFunction {
    fn from(c: BigRational) -> Self {
        Self::constant(c)
    }
}

impl PartialEq for RationalFunction {
    fn eq(&self, other: &Self) -> bool {
        if self.den == other.den {
            return self.num == other.num;
        }
        &self.num * &other.den == &other.num * &self.den
    }
}

impl Zero for RationalFunction {
    fn zero() -> Self {
        Self {
            num: Polynomial::zero(),
            den: Polynomial::one(),
        }
    }

    fn is_zero(&self) -> bool {
        self.num.is_zero()
    }
}

impl One for RationalFunction {
    fn one() -> Self {
        Self::from_polynomial(Polynomial::one())
    }
}

impl Add for &RationalFunction {
    type Output = RationalFunction;

    fn add(self, rhs: &RationalFunction) -> RationalFunction {
        if self.is_zero() {
            return rhs.clone();
        }
        if rhs.is_zero() {
            return self.clone();
        }
        if self.den == rhs.den {
            return RationalFunction::normalized(&self.num + &rhs.num, self.den.clone());
        }
        if let Some(q) = self.den.div_exact(&rhs.den) {
            let num = &self.num + &(&rhs.num * &q);
            return RationalFunction::normalized(num, self.den.clone());
        }
        if let Some(q) = rhs.den.div_exact(&self.den) {
            let num = &(&self.num * &q) + &rhs.num;
            return RationalFunction::normalized(num, rhs.den.clone());
        }
        let num = &(&self.num * &rhs.den) + &(&rhs.num * &self.den);
        RationalFunction::normalized(num, &self.den * &rhs.den)
    }
}

impl Sub for &RationalFunction {
    type Output = RationalFunction;

    fn sub(self, rhs: &RationalFunction) -> RationalFunction {
        self + &(-rhs)
    }
}

impl Mul for &RationalFunction {
    type Output = RationalFunction;

    fn mul(self, rhs: &RationalFunction) -> RationalFunction {
        if self.is_zero() || rhs.is_zero() {
            return RationalFunction::zero();
        }
        if self.is_one() {
            return rhs.clone();
        }
        if rhs.is_one() {
            return self.clone();
        }
        RationalFunction::normalized(&self.num * &rhs.num, &self.den * &rhs.den)
    }
}

/// Panics on division by zero, like integer division; use
/// [`RationalFunction::checked_div`] when the divisor may vanish.
impl Div for &RationalFunction {
    type Output = RationalFunction;

    fn div(self, rhs: &RationalFunction) -> RationalFunction {
        assert!(!rhs.is_zero(), "division by zero rational function");
        RationalFunction::normalized(&self.num * &rhs.den, &self.den * &rhs.num)
    }
}

impl Neg for &RationalFunction {
    type Output = RationalFunction;

    fn neg(self) -> RationalFunction {
        RationalFunction {
            num: -&self.num,
            den: self.den.clone(),
        }
    }
}

macro_rules! forward_owned_binop {
    ($($trait:ident :: $method:ident),*) => {
        $(
            impl $trait for RationalFunction {
                type Output = RationalFunction;

                fn $method(self, rhs: RationalFunction) -> RationalFunction {
                    (&self).$method(&rhs)
                }
            }

            impl $trait<&RationalFunction> for RationalFunction {
                type Output = RationalFunction;

                fn $method(self, rhs: &RationalFunction) -> RationalFunction {
                    (&self).$method(rhs)
                }
            }
        )*
    };
}

forward_owned_binop!(Add::add, Sub::sub, Mul::mul, Div::div);

impl Neg for RationalFunction {
    type Output = RationalFunction;

    fn neg(self) -> RationalFunction {
        -&self
    }
}

impl fmt::Display for RationalFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let num_is_sum = self.num.len() > 1;
        if self.den.is_one() {
            return write!(f, "{}", self.num);
        }
        if num_is_sum {
            write!(f, "({})", self.num)?;
        } else {
            write!(f, "{}", self.num)?;
        }
        let den_is_atom = self.den.len() == 1
            && self
                .den
                .leading()
                .is_some_and(|(m, c)| c.is_one() && m.factors().len() <= 1);
        if den_is_atom {
            write!(f, "/{}", self.den)
        } else {
            write!(f, "/({})", self.den)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> RationalFunction {
        RationalFunction::symbol(name)
    }

    fn int(n: i64) -> RationalFunction {
        RationalFunction::from_integer(n)
    }

    #[test]
    fn test_divider_ratio() {
        // (1/R1) / (1/R1 + 1/R2) == R2 / (R1 + R2)
        let g1 = sym("R1").inv().unwrap();
        let g2 = sym("R2").inv().unwrap();
        let ratio = &g1 / &(&g1 + &g2);
        let expected = &sym("R2") / &(&sym("R1") + &sym("R2"));
        assert_eq!(ratio, expected);
    }

    #[test]
    fn test_exact_cancellation() {
        // (a^2 - b^2) / (a - b) simplifies to a polynomial
        let a = sym("a");
        let b = sym("b");
        let v = &(&(&a * &a) - &(&b * &b)) / &(&a - &b);
        assert!(v.denominator().is_one());
        assert_eq!(v, &a + &b);
    }

    #[test]
    fn test_monomial_cancellation() {
        let v = &(&sym("s") * &sym("C")) / &sym("s");
        assert_eq!(v.numerator(), &Polynomial::symbol("C"));
        assert!(v.denominator().is_one());
    }

    #[test]
    fn test_zero_and_one() {
        let a = sym("a");
        assert!((&a - &a).is_zero());
        assert!((&a / &a).is_one());
        assert!(int(0).is_zero());
        assert!(int(1).is_one());
    }

    #[test]
    fn test_checked_div_by_zero() {
        assert_eq!(sym("a").checked_div(&int(0)), Err(Error::DivisionByZero));
        assert_eq!(int(0).inv(), Err(Error::DivisionByZero));
    }

    #[test]
    fn test_pow() {
        let x = &sym("a") + &int(1);
        assert_eq!(x.pow_i32(2).unwrap(), &(&x * &x) + &int(0));
        assert_eq!(x.pow_i32(-1).unwrap(), x.inv().unwrap());
        assert!(x.pow_i32(0).unwrap().is_one());
    }

    #[test]
    fn test_subs() {
        // R / (R + s*L) at R = 2 -> 2 / (2 + s*L)
        let v = &sym("R") / &(&sym("R") + &(&sym("s") * &sym("L")));
        let sub = v.subs("R", &int(2)).unwrap();
        let expected = &int(2) / &(&int(2) + &(&sym("s") * &sym("L")));
        assert_eq!(sub, expected);
        assert!(!sub.symbols().contains(&"R".to_string()));
    }

    #[test]
    fn test_eval_lowpass() {
        // 1 / (1 + s*R*C) at omega = 1/(RC) has magnitude 1/sqrt(2)
        let h = &int(1) / &(&int(1) + &(&(&sym("s") * &sym("R")) * &sym("C")));
        let mut values = HashMap::new();
        values.insert("R".to_string(), Complex64::new(1e3, 0.0));
        values.insert("C".to_string(), Complex64::new(1e-6, 0.0));
        values.insert("s".to_string(), Complex64::new(0.0, 1e3));
        let v = h.eval(&values).unwrap();
        assert!((v.norm() - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn test_as_integer() {
        assert_eq!((&int(6) / &int(3)).as_integer(), Some(2));
        assert_eq!((&int(1) / &int(3)).as_integer(), None);
        assert_eq!(sym("a").as_integer(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(sym("R").inv().unwrap().to_string(), "1/R");
        let v = &sym("R2") / &(&sym("R1") + &sym("R2"));
        assert_eq!(v.to_string(), "R2/(R1 + R2)");
        assert_eq!(sym("s").pow_i32(2).unwrap().to_string(), "s^2");
    }
}
