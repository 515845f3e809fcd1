//! Configurable-precision IEEE-754 floating-point numbers.
//!
//! [`Float<M, E>`] stores a sign, an `E`-bit biased exponent and an `M`-bit fraction
//! exactly like the binary interchange formats, so [`Single`] and [`Double`] convert
//! bit-for-bit to and from `f32` and `f64`. Every operation is computed exactly (or to
//! odd with guard bits) through [`Real`] and then rounded once with the requested
//! [`RoundingMode`].

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use num_bigint::{BigInt, BigUint};
use num_traits::{ToPrimitive, Zero};

use crate::error::ReadError;
use crate::real::{Real, RoundingMode};

/// IEEE binary32.
pub type Single = Float<23, 8>;
/// IEEE binary64.
pub type Double = Float<52, 11>;
/// x87 80-bit extended precision (the explicit integer bit is implicit here).
pub type Extended = Float<63, 15>;

/// Guard bits used for transcendental evaluations.
const ELEMENTARY_GUARD: u64 = 8;

/// Classification of a floating-point value.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FloatClass {
    Nan,
    Infinite,
    Zero,
    Subnormal,
    Normal,
}

/// A floating-point number with an `M`-bit fraction and an `E`-bit exponent.
///
/// # Invariants
///
/// - `1 <= M`, `2 <= E <= 30` and `M + E <= 126`.
/// - `exponent < 2^E` and `fraction < 2^M`.
#[derive(Copy, Clone)]
pub struct Float<const M: u32, const E: u32> {
    negative: bool,
    exponent: u32,
    fraction: u128,
}

impl<const M: u32, const E: u32> Float<M, E> {
    const VALID: () = assert!(M >= 1 && E >= 2 && E <= 30 && M + E <= 126, "Unsupported float format");

    /// Biased exponent of infinities and NaNs.
    const MAX_EXPONENT: u32 = (1 << E) - 1;
    const BIAS: i64 = (1i64 << (E - 1)) - 1;
    const FRACTION_MASK: u128 = (1u128 << M) - 1;

    /// Significant bits of a normal number.
    pub const PRECISION: u64 = M as u64 + 1;

    /// Builds a value from its raw fields.
    ///
    /// # Panics
    ///
    /// Panics if a field does not fit its width.
    pub fn from_fields(negative: bool, exponent: u32, fraction: u128) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;
        assert!(exponent <= Self::MAX_EXPONENT, "Exponent does not fit in {} bits", E);
        assert!(fraction <= Self::FRACTION_MASK, "Fraction does not fit in {} bits", M);
        Self {
            negative,
            exponent,
            fraction,
        }
    }

    pub fn zero(negative: bool) -> Self {
        Self::from_fields(negative, 0, 0)
    }

    pub fn one() -> Self {
        Self::from_fields(false, Self::BIAS as u32, 0)
    }

    pub fn infinity(negative: bool) -> Self {
        Self::from_fields(negative, Self::MAX_EXPONENT, 0)
    }

    /// The canonical quiet NaN.
    pub fn nan() -> Self {
        Self::from_fields(false, Self::MAX_EXPONENT, 1u128 << (M - 1))
    }

    pub fn max_finite(negative: bool) -> Self {
        Self::from_fields(negative, Self::MAX_EXPONENT - 1, Self::FRACTION_MASK)
    }

    /// Smallest positive subnormal.
    pub fn min_positive() -> Self {
        Self::from_fields(false, 0, 1)
    }

    /// Exponent of the smallest normal number.
    fn min_exponent() -> i64 {
        1 - Self::BIAS
    }

    pub fn is_sign_negative(&self) -> bool {
        self.negative
    }

    pub fn biased_exponent(&self) -> u32 {
        self.exponent
    }

    pub fn fraction(&self) -> u128 {
        self.fraction
    }

    pub fn is_nan(&self) -> bool {
        self.exponent == Self::MAX_EXPONENT && self.fraction != 0
    }

    pub fn is_infinite(&self) -> bool {
        self.exponent == Self::MAX_EXPONENT && self.fraction == 0
    }

    pub fn is_finite(&self) -> bool {
        self.exponent != Self::MAX_EXPONENT
    }

    pub fn is_zero(&self) -> bool {
        self.exponent == 0 && self.fraction == 0
    }

    pub fn classify(&self) -> FloatClass {
        match (self.exponent, self.fraction) {
            (0, 0) => FloatClass::Zero,
            (0, _) => FloatClass::Subnormal,
            (e, 0) if e == Self::MAX_EXPONENT => FloatClass::Infinite,
            (e, _) if e == Self::MAX_EXPONENT => FloatClass::Nan,
            _ => FloatClass::Normal,
        }
    }

    /// Whether the low half of the fraction is zero.
    ///
    /// Decimal literals that are not exactly representable almost never have this property.
    pub fn fits_half_precision(&self) -> bool {
        let half = M / 2;
        self.fraction & ((1u128 << half) - 1) == 0
    }

    /// The interchange encoding `sign | exponent | fraction`.
    pub fn ieee_bits(&self) -> u128 {
        ((self.negative as u128) << (M + E)) | ((self.exponent as u128) << M) | self.fraction
    }

    pub fn from_ieee_bits(bits: u128) -> Self {
        let negative = (bits >> (M + E)) & 1 == 1;
        let exponent = ((bits >> M) & ((1u128 << E) - 1)) as u32;
        Self::from_fields(negative, exponent, bits & Self::FRACTION_MASK)
    }

    /// Magnitude as a monotone integer key (IEEE ordering trick).
    fn magnitude_key(&self) -> u128 {
        ((self.exponent as u128) << M) | self.fraction
    }

    fn from_magnitude_key(negative: bool, key: u128) -> Self {
        Self::from_fields(negative, (key >> M) as u32, key & Self::FRACTION_MASK)
    }

    /// Exact value, or `None` for infinities and NaN.
    pub fn to_real(&self) -> Option<Real> {
        if !self.is_finite() {
            return None;
        }
        let (mantissa, exponent) = if self.exponent == 0 {
            (self.fraction, Self::min_exponent() - M as i64)
        } else {
            (
                self.fraction | (1u128 << M),
                self.exponent as i64 - Self::BIAS - M as i64,
            )
        };
        Some(Real::from_parts(self.negative, BigUint::from(mantissa), exponent))
    }

    /// Exact value of a finite number (zero otherwise).
    pub(crate) fn finite_value(&self) -> Real {
        self.to_real().unwrap_or_default()
    }

    fn overflow(negative: bool, mode: RoundingMode) -> Self {
        let to_infinity = match mode {
            RoundingMode::NearestEven => true,
            RoundingMode::Zero => false,
            RoundingMode::Up => !negative,
            RoundingMode::Down => negative,
        };
        if to_infinity {
            Self::infinity(negative)
        } else {
            Self::max_finite(negative)
        }
    }

    /// Rounds a real number into this format (zero maps to `+0`).
    pub fn from_real(value: &Real, mode: RoundingMode) -> Self {
        let top = match value.top_exponent() {
            None => return Self::zero(false),
            Some(top) => top,
        };
        let negative = value.is_negative();
        let lowest = Self::min_exponent() - M as i64;
        let rounded = value.round_at((top - M as i64).max(lowest), mode);
        let top = match rounded.top_exponent() {
            None => return Self::zero(negative),
            Some(top) => top,
        };
        if top > Self::BIAS {
            return Self::overflow(negative, mode);
        }
        let lsb = (top - M as i64).max(lowest);
        let significand = (rounded.mantissa() << (rounded.exponent() - lsb) as u64)
            .to_u128()
            .unwrap_or(0);
        if top >= Self::min_exponent() {
            Self::from_fields(negative, (top + Self::BIAS) as u32, significand & Self::FRACTION_MASK)
        } else {
            Self::from_fields(negative, 0, significand)
        }
    }

    /// Converts to another format.
    pub fn convert<const M2: u32, const E2: u32>(&self, mode: RoundingMode) -> Float<M2, E2> {
        if M2 == M && E2 == E {
            return Float::<M2, E2>::from_fields(self.negative, self.exponent, self.fraction);
        }
        match self.classify() {
            FloatClass::Nan => Float::nan(),
            FloatClass::Infinite => Float::infinity(self.negative),
            FloatClass::Zero => Float::zero(self.negative),
            _ => Float::from_real(&self.finite_value(), mode),
        }
    }

    pub fn from_f64(value: f64) -> Self {
        Double::from_ieee_bits(value.to_bits() as u128).convert(RoundingMode::NearestEven)
    }

    pub fn from_f32(value: f32) -> Self {
        Single::from_ieee_bits(value.to_bits() as u128).convert(RoundingMode::NearestEven)
    }

    pub fn to_f64(&self) -> f64 {
        f64::from_bits(self.convert::<52, 11>(RoundingMode::NearestEven).ieee_bits() as u64)
    }

    pub fn to_f32(&self) -> f32 {
        f32::from_bits(self.convert::<23, 8>(RoundingMode::NearestEven).ieee_bits() as u32)
    }

    pub fn from_i64(value: i64) -> Self {
        Self::from_real(&Real::from_i64(value), RoundingMode::NearestEven)
    }

    pub fn from_u64(value: u64) -> Self {
        Self::from_real(&Real::from_u64(value), RoundingMode::NearestEven)
    }

    pub fn abs(&self) -> Self {
        Self {
            negative: false,
            ..*self
        }
    }

    pub fn add(&self, other: &Self, mode: RoundingMode) -> Self {
        if self.is_nan() || other.is_nan() {
            return Self::nan();
        }
        match (self.is_infinite(), other.is_infinite()) {
            (true, true) if self.negative != other.negative => return Self::nan(),
            (true, _) => return *self,
            (false, true) => return *other,
            _ => {}
        }
        let sum = self.finite_value().add(&other.finite_value());
        if sum.is_zero() {
            let negative = if self.is_zero() && other.is_zero() && self.negative == other.negative {
                self.negative
            } else {
                mode == RoundingMode::Down
            };
            return Self::zero(negative);
        }
        Self::from_real(&sum, mode)
    }

    pub fn sub(&self, other: &Self, mode: RoundingMode) -> Self {
        self.add(&-*other, mode)
    }

    pub fn mul(&self, other: &Self, mode: RoundingMode) -> Self {
        if self.is_nan() || other.is_nan() {
            return Self::nan();
        }
        let negative = self.negative != other.negative;
        if self.is_infinite() || other.is_infinite() {
            if self.is_zero() || other.is_zero() {
                return Self::nan();
            }
            return Self::infinity(negative);
        }
        if self.is_zero() || other.is_zero() {
            return Self::zero(negative);
        }
        Self::from_real(&self.finite_value().mul(&other.finite_value()), mode)
    }

    pub fn div(&self, other: &Self, mode: RoundingMode) -> Self {
        if self.is_nan() || other.is_nan() {
            return Self::nan();
        }
        let negative = self.negative != other.negative;
        match (self.classify(), other.classify()) {
            (FloatClass::Infinite, FloatClass::Infinite) | (FloatClass::Zero, FloatClass::Zero) => Self::nan(),
            (FloatClass::Infinite, _) | (_, FloatClass::Zero) => Self::infinity(negative),
            (_, FloatClass::Infinite) | (FloatClass::Zero, _) => Self::zero(negative),
            _ => {
                let quotient = self.finite_value().div_odd(&other.finite_value(), Self::PRECISION);
                Self::from_real(&quotient, mode)
            }
        }
    }

    pub fn sqrt(&self, mode: RoundingMode) -> Self {
        if self.is_nan() || self.is_zero() {
            return *self;
        }
        if self.negative {
            return Self::nan();
        }
        if self.is_infinite() {
            return *self;
        }
        match self.finite_value().sqrt_odd(Self::PRECISION) {
            Some(root) => Self::from_real(&root, mode),
            None => Self::nan(),
        }
    }

    /// Evaluates a real function on a finite argument, NaN where it is undefined.
    fn elementary<F>(&self, mode: RoundingMode, function: F) -> Self
    where
        F: FnOnce(&Real, u64, RoundingMode) -> Option<Real>,
    {
        match function(&self.finite_value(), Self::PRECISION + ELEMENTARY_GUARD, mode) {
            Some(value) => Self::from_real(&value, mode),
            None => Self::nan(),
        }
    }

    pub fn sin(&self, mode: RoundingMode) -> Self {
        if !self.is_finite() {
            return Self::nan();
        }
        if self.is_zero() {
            return *self;
        }
        self.elementary(mode, |x, p, m| Some(x.sin(p, m)))
    }

    pub fn cos(&self, mode: RoundingMode) -> Self {
        if !self.is_finite() {
            return Self::nan();
        }
        self.elementary(mode, |x, p, m| Some(x.cos(p, m)))
    }

    pub fn tan(&self, mode: RoundingMode) -> Self {
        if !self.is_finite() {
            return Self::nan();
        }
        if self.is_zero() {
            return *self;
        }
        self.elementary(mode, |x, p, m| Some(x.tan(p, m)))
    }

    pub fn asin(&self, mode: RoundingMode) -> Self {
        if !self.is_finite() {
            return Self::nan();
        }
        if self.is_zero() {
            return *self;
        }
        self.elementary(mode, |x, p, m| x.asin(p, m))
    }

    pub fn acos(&self, mode: RoundingMode) -> Self {
        if !self.is_finite() {
            return Self::nan();
        }
        self.elementary(mode, |x, p, m| x.acos(p, m))
    }

    pub fn atan(&self, mode: RoundingMode) -> Self {
        if self.is_nan() || self.is_zero() {
            return *self;
        }
        if self.is_infinite() {
            let half_pi = Self::from_real(&Real::pi(Self::PRECISION + ELEMENTARY_GUARD, mode).shifted(-1), mode);
            return if self.negative { -half_pi } else { half_pi };
        }
        self.elementary(mode, |x, p, m| Some(x.atan(p, m)))
    }

    pub fn exp(&self, mode: RoundingMode) -> Self {
        if self.is_nan() {
            return *self;
        }
        if self.is_infinite() {
            return if self.negative { Self::zero(false) } else { *self };
        }
        self.elementary(mode, |x, p, m| Some(x.exp(p, m)))
    }

    pub fn log(&self, mode: RoundingMode) -> Self {
        if self.is_nan() {
            return *self;
        }
        if self.is_zero() {
            return Self::infinity(true);
        }
        if self.negative {
            return Self::nan();
        }
        if self.is_infinite() {
            return *self;
        }
        self.elementary(mode, |x, p, m| x.log(p, m))
    }

    pub fn log10(&self, mode: RoundingMode) -> Self {
        if self.is_nan() {
            return *self;
        }
        if self.is_zero() {
            return Self::infinity(true);
        }
        if self.negative {
            return Self::nan();
        }
        if self.is_infinite() {
            return *self;
        }
        self.elementary(mode, |x, p, m| x.log10(p, m))
    }

    /// Whether the value is an odd integer.
    fn is_odd_integer(&self) -> bool {
        self.is_finite() && {
            let value = self.finite_value();
            value.is_integer() && !value.is_zero() && value.exponent() == 0
        }
    }

    pub fn pow(&self, exponent: &Self, mode: RoundingMode) -> Self {
        if exponent.is_zero() {
            return Self::one();
        }
        if *self == Self::one() {
            return Self::one();
        }
        if self.is_nan() || exponent.is_nan() {
            return Self::nan();
        }
        if exponent.is_infinite() {
            return match self.abs().partial_cmp(&Self::one()) {
                Some(Ordering::Equal) => Self::one(),
                Some(Ordering::Greater) if !exponent.negative => Self::infinity(false),
                Some(Ordering::Less) if exponent.negative => Self::infinity(false),
                _ => Self::zero(false),
            };
        }
        let odd = exponent.is_odd_integer();
        if self.is_infinite() || self.is_zero() {
            // inf^y and 0^y are mirror images of each other.
            let large = self.is_infinite() != exponent.negative;
            let negative = self.negative && odd;
            return if large {
                Self::infinity(negative)
            } else {
                Self::zero(negative)
            };
        }
        let base = self.finite_value();
        let power = exponent.finite_value();
        match base.pow(&power, Self::PRECISION + ELEMENTARY_GUARD, mode) {
            Some(value) => Self::from_real(&value, mode),
            None => Self::nan(),
        }
    }

    /// Angle of the point `(x, self)`.
    pub fn atan2(&self, x: &Self, mode: RoundingMode) -> Self {
        if self.is_nan() || x.is_nan() {
            return Self::nan();
        }
        let precision = Self::PRECISION + ELEMENTARY_GUARD;
        let pi = || Real::pi(precision, mode);
        let signed = |value: Real| {
            let value = Self::from_real(&value, mode);
            if self.negative {
                -value
            } else {
                value
            }
        };
        match (self.is_infinite(), x.is_infinite()) {
            (true, true) => {
                let quarter = pi().shifted(-2);
                let angle = if x.negative { quarter.mul(&Real::from_i64(3)) } else { quarter };
                return signed(angle);
            }
            (true, false) => return signed(pi().shifted(-1)),
            (false, true) => {
                return if x.negative { signed(pi()) } else { Self::zero(self.negative) };
            }
            _ => {}
        }
        if self.is_zero() {
            return if x.negative { signed(pi()) } else { Self::zero(self.negative) };
        }
        Self::from_real(&self.finite_value().atan2(&x.finite_value(), precision, mode), mode)
    }

    /// Next representable value toward positive infinity.
    pub fn next_up(&self) -> Self {
        if self.is_nan() || (self.is_infinite() && !self.negative) {
            return *self;
        }
        if self.is_zero() {
            return Self::min_positive();
        }
        let key = self.magnitude_key();
        if self.negative {
            Self::from_magnitude_key(true, key - 1)
        } else {
            Self::from_magnitude_key(false, key + 1)
        }
    }

    /// Next representable value toward negative infinity.
    pub fn next_down(&self) -> Self {
        -(-*self).next_up()
    }

    /// Unit in the last place (the gap above `|self|`).
    pub fn ulp(&self) -> Self {
        if !self.is_finite() {
            return Self::nan();
        }
        let exponent = self.exponent.max(1) as i64 - Self::BIAS - M as i64;
        Self::from_real(&Real::pow2(exponent), RoundingMode::NearestEven)
    }

    /// Minimum, ignoring NaN like `f64::min`.
    pub fn min(self, other: Self) -> Self {
        match self.partial_cmp(&other) {
            Some(Ordering::Greater) => other,
            Some(Ordering::Equal) if other.negative => other,
            None if self.is_nan() => other,
            _ => self,
        }
    }

    /// Maximum, ignoring NaN like `f64::max`.
    pub fn max(self, other: Self) -> Self {
        match self.partial_cmp(&other) {
            Some(Ordering::Less) => other,
            Some(Ordering::Equal) if !other.negative => other,
            None if self.is_nan() => other,
            _ => self,
        }
    }

    /// Rounds to an integer, `None` for infinities and NaN.
    pub fn to_integer(&self, mode: RoundingMode) -> Option<BigInt> {
        self.to_real().map(|value| value.to_integer(mode))
    }

    fn saturating_integer(&self, mode: RoundingMode, min: BigInt, max: BigInt) -> BigInt {
        if self.is_nan() {
            return BigInt::zero();
        }
        if self.is_infinite() {
            return if self.negative { min } else { max };
        }
        self.finite_value().to_integer(mode).clamp(min, max)
    }

    /// Conversion to `i32`, saturating like an `as` cast.
    pub fn as_int(&self, mode: RoundingMode) -> i32 {
        self.saturating_integer(mode, i32::MIN.into(), i32::MAX.into())
            .to_i32()
            .unwrap_or(0)
    }

    /// Conversion to `u32`, saturating like an `as` cast.
    pub fn as_unsigned(&self, mode: RoundingMode) -> u32 {
        self.saturating_integer(mode, 0.into(), u32::MAX.into())
            .to_u32()
            .unwrap_or(0)
    }

    /// Conversion to `i64`, saturating like an `as` cast.
    pub fn as_long(&self, mode: RoundingMode) -> i64 {
        self.saturating_integer(mode, i64::MIN.into(), i64::MAX.into())
            .to_i64()
            .unwrap_or(0)
    }

    /// Conversion to `u64`, saturating like an `as` cast.
    pub fn as_unsigned_long(&self, mode: RoundingMode) -> u64 {
        self.saturating_integer(mode, 0.into(), u64::MAX.into())
            .to_u64()
            .unwrap_or(0)
    }

    /// Parses decimal text (or `inf`, `infinity`, `nan`), rounding with `mode`.
    pub fn parse(text: &str, mode: RoundingMode) -> Result<Self, ReadError> {
        let text = text.trim();
        let (negative, body) = match text.strip_prefix('-') {
            Some(body) => (true, body),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        match body.to_ascii_lowercase().as_str() {
            "inf" | "infinity" => return Ok(Self::infinity(negative)),
            "nan" => return Ok(Self::nan()),
            _ => {}
        }
        let value = Real::from_decimal_odd(text, Self::PRECISION)?;
        if value.is_zero() {
            return Ok(Self::zero(negative));
        }
        Ok(Self::from_real(&value, mode))
    }
}

impl<const M: u32, const E: u32> Default for Float<M, E> {
    fn default() -> Self {
        Self::zero(false)
    }
}

impl<const M: u32, const E: u32> PartialEq for Float<M, E> {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl<const M: u32, const E: u32> PartialOrd for Float<M, E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.is_nan() || other.is_nan() {
            return None;
        }
        let signed = |x: &Self| {
            let key = x.magnitude_key() as i128;
            if x.negative {
                -key
            } else {
                key
            }
        };
        Some(signed(self).cmp(&signed(other)))
    }
}

impl<const M: u32, const E: u32> std::ops::Neg for Float<M, E> {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            negative: !self.negative,
            ..self
        }
    }
}

impl<const M: u32, const E: u32> std::ops::Add for Float<M, E> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Float::add(&self, &rhs, RoundingMode::NearestEven)
    }
}

impl<const M: u32, const E: u32> std::ops::Sub for Float<M, E> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Float::sub(&self, &rhs, RoundingMode::NearestEven)
    }
}

impl<const M: u32, const E: u32> std::ops::Mul for Float<M, E> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Float::mul(&self, &rhs, RoundingMode::NearestEven)
    }
}

impl<const M: u32, const E: u32> std::ops::Div for Float<M, E> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        Float::div(&self, &rhs, RoundingMode::NearestEven)
    }
}

impl<const M: u32, const E: u32> From<f64> for Float<M, E> {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

impl<const M: u32, const E: u32> From<f32> for Float<M, E> {
    fn from(value: f32) -> Self {
        Self::from_f32(value)
    }
}

impl<const M: u32, const E: u32> FromStr for Float<M, E> {
    type Err = ReadError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text, RoundingMode::NearestEven)
    }
}

impl<const M: u32, const E: u32> fmt::Display for Float<M, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nan() {
            return write!(f, "nan");
        }
        if self.is_infinite() {
            return write!(f, "{}inf", if self.negative { "-" } else { "" });
        }
        if M == 23 && E == 8 {
            fmt::Display::fmt(&self.to_f32(), f)
        } else if M <= 52 && E <= 11 {
            fmt::Display::fmt(&self.to_f64(), f)
        } else if self.is_zero() {
            write!(f, "{}0", if self.negative { "-" } else { "" })
        } else {
            let digits = (Self::PRECISION as f64 * std::f64::consts::LOG10_2).ceil() as usize + 1;
            write!(f, "{}", self.finite_value().to_scientific(digits))
        }
    }
}

impl<const M: u32, const E: u32> fmt::Debug for Float<M, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Float<{}, {}>({})", M, E, self)
    }
}
