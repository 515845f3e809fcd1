//! Arbitrary-precision dyadic real numbers.
//!
//! A [`Real`] is a value of the form `(-1)^s * m * 2^e` where the mantissa `m` is an
//! unbounded natural number. Addition, subtraction and multiplication are exact, so a
//! `Real` is the ground truth oracle against which floating-point computations are
//! measured. Operations whose result is generally not dyadic (division, square root,
//! transcendental functions) take an explicit precision (in bits) and a [`RoundingMode`].
//!
//! # Invariants
//!
//! - The mantissa is odd, unless the value is zero.
//! - Zero is unique: positive sign and zero exponent.
//!
//! Hence two `Real`s are numerically equal iff they are structurally equal.

use std::cmp::Ordering;
use std::fmt;

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, ToPrimitive, Zero};

use crate::elementary;
use crate::error::ReadError;
use crate::float::Double;

/// Default number of bits used for the shadow ("exact") computations.
pub const REAL_BITS: u64 = 123;

/// Largest decimal exponent accepted by the decimal parser.
const MAX_DECIMAL_EXPONENT: i64 = 100_000;

/// IEEE-754 rounding directions.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RoundingMode {
    /// Round to nearest, ties to even.
    NearestEven,
    /// Round toward negative infinity.
    Down,
    /// Round toward positive infinity.
    Up,
    /// Round toward zero.
    Zero,
}

impl RoundingMode {
    /// The mode rounding in the opposite direction (`Down` <-> `Up`).
    pub fn opposite(self) -> Self {
        match self {
            RoundingMode::Down => RoundingMode::Up,
            RoundingMode::Up => RoundingMode::Down,
            mode => mode,
        }
    }

    /// Whether a truncated magnitude must be incremented.
    ///
    /// `half` compares the discarded part with half a unit of the last kept place.
    fn increments(self, negative: bool, odd: bool, half: Ordering) -> bool {
        match self {
            RoundingMode::NearestEven => half == Ordering::Greater || (half == Ordering::Equal && odd),
            RoundingMode::Zero => false,
            RoundingMode::Up => !negative,
            RoundingMode::Down => negative,
        }
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundingMode::NearestEven => "nearest",
            RoundingMode::Down => "down",
            RoundingMode::Up => "up",
            RoundingMode::Zero => "zero",
        };
        write!(f, "{}", name)
    }
}

/// Arbitrary-precision real number (see the [module documentation](self)).
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Real {
    negative: bool,
    mantissa: BigUint,
    exponent: i64,
}

impl Real {
    pub fn zero() -> Self {
        Real {
            negative: false,
            mantissa: BigUint::zero(),
            exponent: 0,
        }
    }

    pub fn one() -> Self {
        Real::from_parts(false, BigUint::one(), 0)
    }

    /// Builds `(-1)^negative * mantissa * 2^exponent`, normalizing the result.
    pub fn from_parts(negative: bool, mantissa: BigUint, exponent: i64) -> Self {
        if mantissa.is_zero() {
            return Real::zero();
        }
        let shift = mantissa.trailing_zeros().unwrap_or(0);
        Real {
            negative,
            mantissa: mantissa >> shift,
            exponent: exponent + shift as i64,
        }
    }

    /// Exact power of two.
    pub fn pow2(exponent: i64) -> Self {
        Real::from_parts(false, BigUint::one(), exponent)
    }

    pub fn from_i64(value: i64) -> Self {
        Real::from_parts(value < 0, BigUint::from(value.unsigned_abs()), 0)
    }

    pub fn from_u64(value: u64) -> Self {
        Real::from_parts(false, BigUint::from(value), 0)
    }

    pub fn from_bigint(value: &BigInt) -> Self {
        Real::from_parts(value.sign() == Sign::Minus, value.magnitude().clone(), 0)
    }

    /// Exact value of a finite `f64`, or `None` for infinities and NaN.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let bits = value.to_bits();
        let negative = bits >> 63 == 1;
        let biased = ((bits >> 52) & 0x7ff) as i64;
        let fraction = bits & ((1u64 << 52) - 1);
        let (mantissa, exponent) = if biased == 0 {
            (fraction, -1074)
        } else {
            (fraction | (1u64 << 52), biased - 1075)
        };
        Some(Real::from_parts(negative, BigUint::from(mantissa), exponent))
    }

    /// Exact value of a finite `f32`, or `None` for infinities and NaN.
    pub fn from_f32(value: f32) -> Option<Self> {
        Real::from_f64(value as f64)
    }

    /// Nearest `f64` (overflowing to infinity).
    pub fn to_f64(&self) -> f64 {
        Double::from_real(self, RoundingMode::NearestEven).to_f64()
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn is_positive(&self) -> bool {
        !self.negative && !self.is_zero()
    }

    pub fn is_integer(&self) -> bool {
        self.is_zero() || self.exponent >= 0
    }

    pub fn mantissa(&self) -> &BigUint {
        &self.mantissa
    }

    pub fn exponent(&self) -> i64 {
        self.exponent
    }

    /// Number of significant bits.
    pub fn precision(&self) -> u64 {
        self.mantissa.bits()
    }

    /// `floor(log2(|self|))`, or `None` for zero.
    pub fn top_exponent(&self) -> Option<i64> {
        if self.is_zero() {
            None
        } else {
            Some(self.exponent + self.mantissa.bits() as i64 - 1)
        }
    }

    pub fn abs(&self) -> Self {
        Real {
            negative: false,
            ..self.clone()
        }
    }

    /// Multiplies by `2^shift` (exact).
    pub fn shifted(&self, shift: i64) -> Self {
        if self.is_zero() {
            return Real::zero();
        }
        Real {
            exponent: self.exponent + shift,
            ..self.clone()
        }
    }

    fn signed_add(&self, other: &Real, other_negative: bool) -> Real {
        if other.is_zero() {
            return self.clone();
        }
        if self.is_zero() {
            return Real {
                negative: other_negative,
                ..other.clone()
            };
        }
        let exponent = self.exponent.min(other.exponent);
        let lhs = &self.mantissa << (self.exponent - exponent) as u64;
        let rhs = &other.mantissa << (other.exponent - exponent) as u64;
        if self.negative == other_negative {
            return Real::from_parts(self.negative, lhs + rhs, exponent);
        }
        match lhs.cmp(&rhs) {
            Ordering::Greater => Real::from_parts(self.negative, lhs - rhs, exponent),
            Ordering::Less => Real::from_parts(other_negative, rhs - lhs, exponent),
            Ordering::Equal => Real::zero(),
        }
    }

    /// Exact sum.
    pub fn add(&self, other: &Real) -> Real {
        self.signed_add(other, other.negative)
    }

    /// Exact difference.
    pub fn sub(&self, other: &Real) -> Real {
        self.signed_add(other, !other.negative && !other.is_zero())
    }

    /// Exact product.
    pub fn mul(&self, other: &Real) -> Real {
        Real::from_parts(
            self.negative != other.negative,
            &self.mantissa * &other.mantissa,
            self.exponent + other.exponent,
        )
    }

    /// Compares magnitudes.
    pub fn cmp_abs(&self, other: &Real) -> Ordering {
        match (self.top_exponent(), other.top_exponent()) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) if a != b => a.cmp(&b),
            _ => {
                let exponent = self.exponent.min(other.exponent);
                let lhs = &self.mantissa << (self.exponent - exponent) as u64;
                let rhs = &other.mantissa << (other.exponent - exponent) as u64;
                lhs.cmp(&rhs)
            }
        }
    }

    /// Rounds to a multiple of `2^lsb`.
    pub fn round_at(&self, lsb: i64, mode: RoundingMode) -> Real {
        if self.is_zero() || self.exponent >= lsb {
            return self.clone();
        }
        let shift = (lsb - self.exponent) as u64;
        let mut quotient = &self.mantissa >> shift;
        let remainder = &self.mantissa - (&quotient << shift);
        // The mantissa is odd, so the discarded part is never zero here.
        let half = BigUint::one() << (shift - 1);
        if mode.increments(self.negative, quotient.bit(0), remainder.cmp(&half)) {
            quotient += 1u32;
        }
        Real::from_parts(self.negative, quotient, lsb)
    }

    /// Rounds to `precision` significant bits.
    pub fn round(&self, precision: u64, mode: RoundingMode) -> Real {
        assert!(precision > 0, "Precision should be positive");
        match self.top_exponent() {
            None => Real::zero(),
            Some(top) => self.round_at(top - precision as i64 + 1, mode),
        }
    }

    /// Truncates to a multiple of `2^lsb` and forces the last bit when inexact.
    ///
    /// Rounding-to-odd with two extra bits followed by any other rounding equals a
    /// direct rounding, which is how correctly rounded quotients are obtained.
    pub(crate) fn round_odd_at(&self, lsb: i64) -> Real {
        if self.is_zero() || self.exponent >= lsb {
            return self.clone();
        }
        let shift = (lsb - self.exponent) as u64;
        let mut quotient = &self.mantissa >> shift;
        if !quotient.bit(0) {
            quotient += 1u32;
        }
        Real::from_parts(self.negative, quotient, lsb)
    }

    /// Quotient rounded to odd with at least `precision + 2` significant bits.
    pub(crate) fn div_odd(&self, other: &Real, precision: u64) -> Real {
        assert!(!other.is_zero(), "Division by zero");
        if self.is_zero() {
            return Real::zero();
        }
        let wanted = precision + 3 + other.mantissa.bits();
        let shift = wanted.saturating_sub(self.mantissa.bits());
        let numerator = &self.mantissa << shift;
        let mut quotient = &numerator / &other.mantissa;
        let exact = (&quotient * &other.mantissa) == numerator;
        if !exact && !quotient.bit(0) {
            quotient += 1u32;
        }
        Real::from_parts(
            self.negative != other.negative,
            quotient,
            self.exponent - other.exponent - shift as i64,
        )
    }

    /// Square root rounded to odd with at least `precision + 2` significant bits.
    pub(crate) fn sqrt_odd(&self, precision: u64) -> Option<Real> {
        if self.negative {
            return None;
        }
        if self.is_zero() {
            return Some(Real::zero());
        }
        let wanted = 2 * (precision + 3);
        let mut shift = wanted.saturating_sub(self.mantissa.bits());
        if (self.exponent - shift as i64).rem_euclid(2) != 0 {
            shift += 1;
        }
        let radicand = &self.mantissa << shift;
        let mut root = radicand.sqrt();
        if &root * &root != radicand && !root.bit(0) {
            root += 1u32;
        }
        Some(Real::from_parts(false, root, (self.exponent - shift as i64).div_euclid(2)))
    }

    /// Correctly rounded quotient, or `None` when dividing by zero.
    pub fn checked_div(&self, other: &Real, precision: u64, mode: RoundingMode) -> Option<Real> {
        if other.is_zero() {
            return None;
        }
        Some(self.div_odd(other, precision).round(precision, mode))
    }

    /// Correctly rounded square root, or `None` for negative values.
    pub fn sqrt(&self, precision: u64, mode: RoundingMode) -> Option<Real> {
        self.sqrt_odd(precision).map(|root| root.round(precision, mode))
    }

    /// Rounds to an integer.
    pub fn to_integer(&self, mode: RoundingMode) -> BigInt {
        let rounded = self.round_at(0, mode);
        if rounded.is_zero() {
            return BigInt::zero();
        }
        let magnitude = &rounded.mantissa << rounded.exponent as u64;
        let sign = if rounded.negative { Sign::Minus } else { Sign::Plus };
        BigInt::from_biguint(sign, magnitude)
    }

    /// The value of `pi`.
    pub fn pi(precision: u64, mode: RoundingMode) -> Real {
        elementary::evaluate(precision, mode, elementary::pi)
    }

    pub fn exp(&self, precision: u64, mode: RoundingMode) -> Real {
        if self.is_zero() {
            return Real::one();
        }
        elementary::evaluate(precision, mode, |w| elementary::exp(self, w))
    }

    /// Natural logarithm, `None` for non-positive values.
    pub fn log(&self, precision: u64, mode: RoundingMode) -> Option<Real> {
        if !self.is_positive() {
            return None;
        }
        if *self == Real::one() {
            return Some(Real::zero());
        }
        Some(elementary::evaluate(precision, mode, |w| elementary::log(self, w)))
    }

    /// Decimal logarithm, `None` for non-positive values.
    pub fn log10(&self, precision: u64, mode: RoundingMode) -> Option<Real> {
        if !self.is_positive() {
            return None;
        }
        if *self == Real::one() {
            return Some(Real::zero());
        }
        Some(elementary::evaluate(precision, mode, |w| elementary::log10(self, w)))
    }

    pub fn sin(&self, precision: u64, mode: RoundingMode) -> Real {
        if self.is_zero() {
            return Real::zero();
        }
        elementary::evaluate(precision, mode, |w| elementary::sin(self, w))
    }

    pub fn cos(&self, precision: u64, mode: RoundingMode) -> Real {
        if self.is_zero() {
            return Real::one();
        }
        elementary::evaluate(precision, mode, |w| elementary::cos(self, w))
    }

    pub fn tan(&self, precision: u64, mode: RoundingMode) -> Real {
        if self.is_zero() {
            return Real::zero();
        }
        elementary::evaluate(precision, mode, |w| elementary::tan(self, w))
    }

    pub fn atan(&self, precision: u64, mode: RoundingMode) -> Real {
        if self.is_zero() {
            return Real::zero();
        }
        elementary::evaluate(precision, mode, |w| elementary::atan(self, w))
    }

    /// Arc sine, `None` outside `[-1, 1]`.
    pub fn asin(&self, precision: u64, mode: RoundingMode) -> Option<Real> {
        if self.cmp_abs(&Real::one()) == Ordering::Greater {
            return None;
        }
        if self.is_zero() {
            return Some(Real::zero());
        }
        Some(elementary::evaluate(precision, mode, |w| elementary::asin(self, w)))
    }

    /// Arc cosine, `None` outside `[-1, 1]`.
    pub fn acos(&self, precision: u64, mode: RoundingMode) -> Option<Real> {
        if self.cmp_abs(&Real::one()) == Ordering::Greater {
            return None;
        }
        if *self == Real::one() {
            return Some(Real::zero());
        }
        Some(elementary::evaluate(precision, mode, |w| elementary::acos(self, w)))
    }

    /// Angle of the point `(x, self)`, in `[-pi, pi]`.
    pub fn atan2(&self, x: &Real, precision: u64, mode: RoundingMode) -> Real {
        if self.is_zero() && !x.is_negative() {
            return Real::zero();
        }
        elementary::evaluate(precision, mode, |w| elementary::atan2(self, x, w))
    }

    /// `self^exponent`, `None` when undefined over the reals (or a division by zero).
    pub fn pow(&self, exponent: &Real, precision: u64, mode: RoundingMode) -> Option<Real> {
        if exponent.is_zero() || *self == Real::one() {
            return Some(Real::one());
        }
        if self.is_zero() {
            return if exponent.is_negative() { None } else { Some(Real::zero()) };
        }
        if exponent.is_integer() {
            let power = exponent.to_integer(RoundingMode::Zero);
            if let Some(power) = power.to_i64() {
                return self.powi(power, precision, mode);
            }
        }
        if self.negative {
            return None;
        }
        Some(elementary::evaluate(precision, mode, |w| elementary::pow(self, exponent, w)))
    }

    /// Integral power by repeated squaring.
    pub fn powi(&self, exponent: i64, precision: u64, mode: RoundingMode) -> Option<Real> {
        if exponent == 0 {
            return Some(Real::one());
        }
        if self.is_zero() {
            return if exponent < 0 { None } else { Some(Real::zero()) };
        }
        let mut remaining = exponent.unsigned_abs();
        // Small powers are exact; large ones keep enough guard bits to round once at the end.
        let exact = remaining <= 64;
        let working = precision + 64 + 2 * (64 - remaining.leading_zeros() as u64);
        let mut base = self.clone();
        let mut result = Real::one();
        while remaining > 0 {
            if remaining & 1 == 1 {
                result = result.mul(&base);
                if !exact {
                    result = result.round(working, RoundingMode::NearestEven);
                }
            }
            remaining >>= 1;
            if remaining > 0 {
                base = base.mul(&base);
                if !exact {
                    base = base.round(working, RoundingMode::NearestEven);
                }
            }
        }
        if exponent < 0 {
            Real::one().checked_div(&result, precision, mode)
        } else {
            Some(result.round(precision, mode))
        }
    }

    /// Parses a decimal literal (`[-+]digits[.digits][e[-+]digits]`) rounded to `precision` bits.
    pub fn from_decimal_str(text: &str, precision: u64, mode: RoundingMode) -> Result<Real, ReadError> {
        let (numerator, denominator) = parse_decimal(text)?;
        Ok(match denominator {
            None => numerator.round(precision, mode),
            Some(denominator) => numerator.div_odd(&denominator, precision).round(precision, mode),
        })
    }

    /// Parses a decimal literal rounded to odd with at least `precision + 2` bits.
    pub(crate) fn from_decimal_odd(text: &str, precision: u64) -> Result<Real, ReadError> {
        let (numerator, denominator) = parse_decimal(text)?;
        Ok(match denominator {
            None => numerator,
            Some(denominator) => numerator.div_odd(&denominator, precision),
        })
    }

    /// `round(|self| * 10^scale)` to nearest (ties away from zero).
    fn scaled_decimal(&self, scale: i64) -> BigUint {
        let mut numerator = self.mantissa.clone();
        let mut denominator = BigUint::one();
        let ten = BigUint::from(10u32);
        if scale >= 0 {
            numerator *= ten.pow(scale as u32);
        } else {
            denominator *= ten.pow((-scale) as u32);
        }
        if self.exponent >= 0 {
            numerator <<= self.exponent as u64;
        } else {
            denominator <<= (-self.exponent) as u64;
        }
        (numerator * 2u32 + &denominator) / (denominator * 2u32)
    }

    /// Scientific notation with `digits` significant decimal digits.
    pub fn to_scientific(&self, digits: usize) -> String {
        let top = match self.top_exponent() {
            None => return "0".to_string(),
            Some(top) => top,
        };
        let digits = digits.max(1);
        let ten = BigUint::from(10u32);
        let upper = ten.pow(digits as u32);
        let lower = ten.pow(digits as u32 - 1);
        let mut decimal = (top as f64 * std::f64::consts::LOG10_2).floor() as i64;
        let mut scaled = self.scaled_decimal(digits as i64 - 1 - decimal);
        for _ in 0..4 {
            if scaled >= upper {
                decimal += 1;
            } else if scaled < lower {
                decimal -= 1;
            } else {
                break;
            }
            scaled = self.scaled_decimal(digits as i64 - 1 - decimal);
        }
        let text = scaled.to_string();
        let (head, tail) = text.split_at(1);
        let tail = tail.trim_end_matches('0');
        let sign = if self.negative { "-" } else { "" };
        if tail.is_empty() {
            format!("{}{}e{}", sign, head, decimal)
        } else {
            format!("{}{}.{}e{}", sign, head, tail, decimal)
        }
    }
}

/// Splits a decimal literal into an exact numerator and an optional power-of-ten denominator.
fn parse_decimal(text: &str) -> Result<(Real, Option<Real>), ReadError> {
    let text = text.trim();
    let (negative, body) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (significand, exponent) = match body.find(['e', 'E']) {
        Some(index) => (&body[..index], Some(&body[index + 1..])),
        None => (body, None),
    };
    let (integral, fractional) = match significand.find('.') {
        Some(index) => (&significand[..index], &significand[index + 1..]),
        None => (significand, ""),
    };
    if integral.is_empty() && fractional.is_empty() {
        return Err(ReadError::with_message(format!("no digits in '{}'", text)));
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(integral) || !all_digits(fractional) {
        return Err(ReadError::with_message(format!("invalid digit in '{}'", text)));
    }
    let mut decimal_exponent = match exponent {
        None => 0,
        Some(exponent) => exponent
            .parse::<i64>()
            .map_err(|_| ReadError::with_message(format!("invalid exponent in '{}'", text)))?,
    };
    if decimal_exponent.abs() > MAX_DECIMAL_EXPONENT {
        return Err(ReadError::with_message(format!("exponent out of range in '{}'", text)));
    }
    decimal_exponent -= fractional.len() as i64;
    let digits = format!("{}{}", integral, fractional);
    let magnitude = BigUint::parse_bytes(digits.as_bytes(), 10).unwrap_or_default();
    let ten = BigUint::from(10u32);
    if decimal_exponent >= 0 {
        let magnitude = magnitude * ten.pow(decimal_exponent as u32);
        Ok((Real::from_parts(negative, magnitude, 0), None))
    } else {
        let denominator = ten.pow((-decimal_exponent) as u32);
        Ok((
            Real::from_parts(negative, magnitude, 0),
            Some(Real::from_parts(false, denominator, 0)),
        ))
    }
}

impl Ord for Real {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.cmp_abs(other),
            (true, true) => other.cmp_abs(self),
        }
    }
}

impl PartialOrd for Real {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::ops::Neg for Real {
    type Output = Real;

    fn neg(self) -> Real {
        -&self
    }
}

impl std::ops::Neg for &Real {
    type Output = Real;

    fn neg(self) -> Real {
        Real {
            negative: !self.negative && !self.is_zero(),
            ..self.clone()
        }
    }
}

impl std::ops::Add for &Real {
    type Output = Real;

    fn add(self, rhs: &Real) -> Real {
        Real::add(self, rhs)
    }
}

impl std::ops::Sub for &Real {
    type Output = Real;

    fn sub(self, rhs: &Real) -> Real {
        Real::sub(self, rhs)
    }
}

impl std::ops::Mul for &Real {
    type Output = Real;

    fn mul(self, rhs: &Real) -> Real {
        Real::mul(self, rhs)
    }
}

impl std::ops::Add for Real {
    type Output = Real;

    fn add(self, rhs: Real) -> Real {
        Real::add(&self, &rhs)
    }
}

impl std::ops::Sub for Real {
    type Output = Real;

    fn sub(self, rhs: Real) -> Real {
        Real::sub(&self, &rhs)
    }
}

impl std::ops::Mul for Real {
    type Output = Real;

    fn mul(self, rhs: Real) -> Real {
        Real::mul(&self, &rhs)
    }
}

impl Default for Real {
    fn default() -> Self {
        Real::zero()
    }
}

impl From<i64> for Real {
    fn from(value: i64) -> Self {
        Real::from_i64(value)
    }
}

impl fmt::Display for Real {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(digits) = f.precision() {
            return write!(f, "{}", self.to_scientific(digits));
        }
        let native = self.to_f64();
        if Real::from_f64(native).as_ref() == Some(self) {
            write!(f, "{}", native)
        } else {
            write!(f, "{}", self.to_scientific(40))
        }
    }
}

impl fmt::Debug for Real {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Real({})", self)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn real(value: f64) -> Real {
        Real::from_f64(value).unwrap()
    }

    #[test]
    fn test_normalization() {
        let x = Real::from_parts(false, BigUint::from(12u32), 0);
        assert_eq!(x.mantissa(), &BigUint::from(3u32));
        assert_eq!(x.exponent(), 2);
        assert_eq!(x, Real::from_i64(12));
        assert_eq!(Real::from_parts(true, BigUint::zero(), 5), Real::zero());
    }

    #[test]
    fn test_exact_arithmetic() {
        let a = real(0.1);
        let b = real(0.2);
        let sum = &a + &b;
        // The exact sum of the two doubles is not the double nearest to 0.3.
        assert_ne!(sum, real(0.3));
        assert_eq!(sum.to_f64(), 0.1 + 0.2);
        assert_eq!(&sum - &b, a);
        assert_eq!(&real(1.5) * &real(-2.0), real(-3.0));
        assert_eq!(&a - &a, Real::zero());
    }

    #[test]
    fn test_ordering() {
        let values = [-3.5, -1.0, -0.25, 0.0, 1e-300, 0.5, 2.0, 1e300];
        for (i, &x) in values.iter().enumerate() {
            for (j, &y) in values.iter().enumerate() {
                assert_eq!(real(x).cmp(&real(y)), i.cmp(&j), "{} vs {}", x, y);
            }
        }
    }

    #[test]
    fn test_rounding_modes() {
        // 2.5 at 2 bits of precision lies between 2 and 3.
        let x = real(2.5);
        assert_eq!(x.round(2, RoundingMode::NearestEven), real(2.0));
        assert_eq!(x.round(2, RoundingMode::Down), real(2.0));
        assert_eq!(x.round(2, RoundingMode::Up), real(3.0));
        assert_eq!(x.round(2, RoundingMode::Zero), real(2.0));

        let y = real(-2.5);
        assert_eq!(y.round(2, RoundingMode::NearestEven), real(-2.0));
        assert_eq!(y.round(2, RoundingMode::Down), real(-3.0));
        assert_eq!(y.round(2, RoundingMode::Up), real(-2.0));
        assert_eq!(y.round(2, RoundingMode::Zero), real(-2.0));

        assert_eq!(real(3.5).round(2, RoundingMode::NearestEven), real(4.0));
    }

    #[test]
    fn test_division() {
        let one = Real::one();
        let three = Real::from_i64(3);
        let third = one.checked_div(&three, 53, RoundingMode::NearestEven).unwrap();
        assert_eq!(third.to_f64(), 1.0 / 3.0);
        let down = one.checked_div(&three, 53, RoundingMode::Down).unwrap();
        let up = one.checked_div(&three, 53, RoundingMode::Up).unwrap();
        assert!(down < up);
        assert!(&down * &three < one);
        assert!(&up * &three > one);
        assert!(one.checked_div(&Real::zero(), 53, RoundingMode::NearestEven).is_none());
        assert_eq!(
            real(6.0).checked_div(&real(-4.0), 53, RoundingMode::NearestEven),
            Some(real(-1.5))
        );
    }

    #[test]
    fn test_sqrt() {
        let two = Real::from_i64(2);
        let root = two.sqrt(53, RoundingMode::NearestEven).unwrap();
        assert_eq!(root.to_f64(), 2f64.sqrt());
        assert_eq!(real(0.25).sqrt(10, RoundingMode::Up), Some(real(0.5)));
        assert!(real(-1.0).sqrt(53, RoundingMode::NearestEven).is_none());
        let down = two.sqrt(80, RoundingMode::Down).unwrap();
        assert!(&down * &down < two);
    }

    #[test]
    fn test_to_integer() {
        assert_eq!(real(2.5).to_integer(RoundingMode::NearestEven), BigInt::from(2));
        assert_eq!(real(-2.5).to_integer(RoundingMode::Down), BigInt::from(-3));
        assert_eq!(real(-2.5).to_integer(RoundingMode::Zero), BigInt::from(-2));
        assert_eq!(real(2.25).to_integer(RoundingMode::Up), BigInt::from(3));
        assert_eq!(real(1024.0).to_integer(RoundingMode::Zero), BigInt::from(1024));
    }

    #[test]
    fn test_decimal_parsing() {
        let tenth = Real::from_decimal_str("0.1", 53, RoundingMode::NearestEven).unwrap();
        assert_eq!(tenth, real(0.1));
        let large = Real::from_decimal_str("-1.5e3", 53, RoundingMode::NearestEven).unwrap();
        assert_eq!(large, real(-1500.0));
        let down = Real::from_decimal_str("0.1", 53, RoundingMode::Down).unwrap();
        let up = Real::from_decimal_str("0.1", 53, RoundingMode::Up).unwrap();
        assert!(down < up);
        assert!(Real::from_decimal_str("1.2.3", 53, RoundingMode::NearestEven).is_err());
        assert!(Real::from_decimal_str("", 53, RoundingMode::NearestEven).is_err());
        assert!(Real::from_decimal_str("1e", 53, RoundingMode::NearestEven).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(real(1.5).to_string(), "1.5");
        assert_eq!(Real::zero().to_string(), "0");
        assert_eq!(real(1500.0).to_scientific(3), "1.5e3");
        assert_eq!(real(-0.125).to_scientific(5), "-1.25e-1");
        let third = Real::one().checked_div(&Real::from_i64(3), 200, RoundingMode::NearestEven).unwrap();
        assert_eq!(format!("{:.5}", third), "3.3333e-1");
    }

    #[test]
    fn test_transcendentals_match_native() {
        let nearest = RoundingMode::NearestEven;
        for &x in &[0.5, 1.0, 2.0, 10.0, -3.25] {
            let r = real(x);
            assert!((r.exp(53, nearest).to_f64() - x.exp()).abs() <= x.exp() * 1e-15);
            assert!((r.sin(53, nearest).to_f64() - x.sin()).abs() <= 1e-15);
            assert!((r.cos(53, nearest).to_f64() - x.cos()).abs() <= 1e-15);
            assert!((r.atan(53, nearest).to_f64() - x.atan()).abs() <= 1e-15);
        }
        assert_eq!(real(1.0).exp(53, nearest).to_f64(), std::f64::consts::E);
        assert_eq!(Real::pi(53, nearest).to_f64(), std::f64::consts::PI);
        assert_eq!(real(2.0).log(53, nearest).unwrap().to_f64(), std::f64::consts::LN_2);
        assert_eq!(real(1000.0).log10(53, nearest).unwrap().to_f64(), 3.0);
        assert!(real(0.0).log(53, nearest).is_none());
        assert!(real(1.5).asin(53, nearest).is_none());
        assert_eq!(real(1.0).asin(53, nearest).unwrap().to_f64(), std::f64::consts::FRAC_PI_2);
        assert_eq!(real(-1.0).acos(53, nearest).unwrap().to_f64(), std::f64::consts::PI);
    }

    #[test]
    fn test_pow() {
        let nearest = RoundingMode::NearestEven;
        assert_eq!(real(2.0).pow(&real(10.0), 53, nearest), Some(real(1024.0)));
        assert_eq!(real(-2.0).pow(&real(3.0), 53, nearest), Some(real(-8.0)));
        assert_eq!(real(2.0).pow(&real(-2.0), 53, nearest), Some(real(0.25)));
        assert!(real(-2.0).pow(&real(0.5), 53, nearest).is_none());
        assert!(real(0.0).pow(&real(-1.0), 53, nearest).is_none());
        let root = real(2.0).pow(&real(0.5), 53, nearest).unwrap();
        assert!((root.to_f64() - 2f64.sqrt()).abs() <= 1e-15);
    }

    #[test]
    fn test_atan2_quadrants() {
        let nearest = RoundingMode::NearestEven;
        let angle = |y: f64, x: f64| real(y).atan2(&real(x), 53, nearest).to_f64();
        assert_eq!(angle(0.0, 1.0), 0.0);
        assert_eq!(angle(0.0, -1.0), std::f64::consts::PI);
        assert_eq!(angle(1.0, 0.0), std::f64::consts::FRAC_PI_2);
        assert_eq!(angle(-1.0, 0.0), -std::f64::consts::FRAC_PI_2);
        assert!((angle(1.0, -1.0) - 3.0 * std::f64::consts::FRAC_PI_4).abs() <= 1e-15);
        assert!((angle(-1.0, -1.0) + 3.0 * std::f64::consts::FRAC_PI_4).abs() <= 1e-15);
    }
}
