//! Interval domain with outward rounding.
//!
//! An [`Interval`] carries the value the native program computes (`implementation`,
//! rounded to nearest) and bounds `[lower, upper]` that enclose every real value the
//! computation can take. Lower bounds are rounded toward negative infinity and upper
//! bounds toward positive infinity.

use std::fmt;
use std::io;
use std::str::FromStr;

use log::debug;

use crate::error::{PreconditionError, ReadError};
use crate::float::{Double, Float, Single};
use crate::memory::{Mergeable, Slot, Watch};
use crate::outcome::Outcome;
use crate::path::ExecutionPath;
use crate::real::{Real, RoundingMode};
use crate::types::{Comparison, Site};

pub type FloatInterval = Interval<23, 8>;
pub type DoubleInterval = Interval<52, 11>;
pub type ExtendedInterval = Interval<63, 15>;

/// Bits used to locate the extrema and poles of trigonometric functions.
const PHASE_BITS: u64 = 160;

/// An interval of real values together with the native floating-point value.
///
/// # Invariants
///
/// - `lower <= upper` unless a bound is NaN.
#[derive(Copy, Clone, PartialEq)]
pub struct Interval<const M: u32, const E: u32> {
    implementation: Float<M, E>,
    lower: Float<M, E>,
    upper: Float<M, E>,
}

fn widen_down<const M: u32, const E: u32>(value: Float<M, E>) -> Float<M, E> {
    if value.is_finite() {
        value.next_down()
    } else {
        value
    }
}

fn widen_up<const M: u32, const E: u32>(value: Float<M, E>) -> Float<M, E> {
    if value.is_finite() {
        value.next_up()
    } else {
        value
    }
}

/// Whether `[lo, hi]` contains a point `offset * pi/2 + k * period * pi/2` for some integer `k`.
fn contains_phase(lo: &Real, hi: &Real, offset: i64, period: i64) -> bool {
    let limit = Real::pow2(50);
    if lo.abs() > limit || hi.abs() > limit {
        return true;
    }
    let quarter = Real::pi(PHASE_BITS, RoundingMode::NearestEven).shifted(-1);
    let origin = quarter.mul(&Real::from_i64(offset));
    let step = quarter.mul(&Real::from_i64(period));
    let slack = Real::pow2(-60);
    let position = |x: &Real| {
        x.sub(&origin)
            .checked_div(&step, PHASE_BITS, RoundingMode::NearestEven)
            .unwrap_or_default()
    };
    let first = position(lo).sub(&slack).to_integer(RoundingMode::Up);
    let last = position(hi).add(&slack).to_integer(RoundingMode::Down);
    first <= last
}

impl<const M: u32, const E: u32> Interval<M, E> {
    /// Builds an interval from its parts.
    ///
    /// # Panics
    ///
    /// Panics if `lower > upper`.
    pub fn from_parts(implementation: Float<M, E>, lower: Float<M, E>, upper: Float<M, E>) -> Self {
        assert!(!(lower > upper), "Empty interval [{}, {}]", lower, upper);
        Self {
            implementation,
            lower,
            upper,
        }
    }

    pub fn point(value: Float<M, E>) -> Self {
        Self {
            implementation: value,
            lower: value,
            upper: value,
        }
    }

    fn whole(implementation: Float<M, E>) -> Self {
        Self {
            implementation,
            lower: Float::infinity(true),
            upper: Float::infinity(false),
        }
    }

    /// Encloses a native double exactly.
    pub fn from_f64(value: f64) -> Self {
        let native = Double::from_f64(value);
        Self {
            implementation: native.convert(RoundingMode::NearestEven),
            lower: native.convert(RoundingMode::Down),
            upper: native.convert(RoundingMode::Up),
        }
    }

    /// Encloses a native float exactly.
    pub fn from_f32(value: f32) -> Self {
        let native = Single::from_f32(value);
        Self {
            implementation: native.convert(RoundingMode::NearestEven),
            lower: native.convert(RoundingMode::Down),
            upper: native.convert(RoundingMode::Up),
        }
    }

    pub fn from_i64(value: i64) -> Self {
        Self::enclose(&Real::from_i64(value))
    }

    fn enclose(value: &Real) -> Self {
        Self {
            implementation: Float::from_real(value, RoundingMode::NearestEven),
            lower: Float::from_real(value, RoundingMode::Down),
            upper: Float::from_real(value, RoundingMode::Up),
        }
    }

    /// A source literal: unless literals are atomic, a literal whose low mantissa
    /// bits are set is taken as an approximation and widened by one ulp each side.
    pub fn from_literal(value: f64, path: &ExecutionPath) -> Self {
        let mut result = Self::from_f64(value);
        if !path.config().support_atomic && !result.implementation.fits_half_precision() {
            result.lower = widen_down(result.lower);
            result.upper = widen_up(result.upper);
        }
        result
    }

    fn midpoint(lower: &Float<M, E>, upper: &Float<M, E>) -> Float<M, E> {
        match (lower.to_real(), upper.to_real()) {
            (Some(lo), Some(hi)) => Float::from_real(&lo.add(&hi).shifted(-1), RoundingMode::NearestEven),
            (Some(_), None) => *lower,
            (None, Some(_)) => *upper,
            (None, None) => Float::zero(false),
        }
    }

    /// All values between `min` and `max`; the implementation is the midpoint.
    pub fn between(min: f64, max: f64) -> Result<Self, PreconditionError> {
        Self::between_with_error(min, max, 0.0, 0.0)
    }

    /// Values between `min` and `max` whose real counterpart may additionally be off
    /// by an error in `[error_min, error_max]`.
    pub fn between_with_error(min: f64, max: f64, error_min: f64, error_max: f64) -> Result<Self, PreconditionError> {
        if !(min <= max) {
            return Err(PreconditionError::new(format!("empty interval [{}, {}]", min, max)));
        }
        if !(error_min <= error_max) {
            return Err(PreconditionError::new(format!(
                "empty error interval [{}, {}]",
                error_min, error_max
            )));
        }
        let shifted = |value: f64, error: f64, mode: RoundingMode| -> Float<M, E> {
            match (Real::from_f64(value), Real::from_f64(error)) {
                (Some(value), Some(error)) => Float::from_real(&value.add(&error), mode),
                _ => Double::from_f64(value + error).convert(mode),
            }
        };
        let lower = shifted(min, error_min, RoundingMode::Down);
        let upper = shifted(max, error_max, RoundingMode::Up);
        let implementation = Self::midpoint(
            &Double::from_f64(min).convert(RoundingMode::Down),
            &Double::from_f64(max).convert(RoundingMode::Up),
        );
        Ok(Self::from_parts(implementation, lower, upper))
    }

    /// Parses a decimal literal; the bounds enclose its exact value.
    pub fn parse(text: &str) -> Result<Self, ReadError> {
        Ok(Self {
            implementation: Float::parse(text, RoundingMode::NearestEven)?,
            lower: Float::parse(text, RoundingMode::Down)?,
            upper: Float::parse(text, RoundingMode::Up)?,
        })
    }

    pub fn implementation(&self) -> Float<M, E> {
        self.implementation
    }

    pub fn lower(&self) -> Float<M, E> {
        self.lower
    }

    pub fn upper(&self) -> Float<M, E> {
        self.upper
    }

    pub fn is_point(&self) -> bool {
        self.lower == self.upper
    }

    pub fn contains(&self, value: &Float<M, E>) -> bool {
        self.lower <= *value && *value <= self.upper
    }

    /// Whether every value of `other` lies in `self`.
    pub fn encloses(&self, other: &Self) -> bool {
        self.lower <= other.lower && other.upper <= self.upper
    }

    pub fn width(&self) -> Float<M, E> {
        self.upper.sub(&self.lower, RoundingMode::Up)
    }

    fn contains_zero(&self) -> bool {
        self.contains(&Float::zero(false))
    }

    pub fn neg(&self) -> Self {
        Self {
            implementation: -self.implementation,
            lower: -self.upper,
            upper: -self.lower,
        }
    }

    pub fn add(&self, other: &Self, _path: &ExecutionPath) -> Self {
        Self {
            implementation: self.implementation + other.implementation,
            lower: self.lower.add(&other.lower, RoundingMode::Down),
            upper: self.upper.add(&other.upper, RoundingMode::Up),
        }
    }

    pub fn sub(&self, other: &Self, _path: &ExecutionPath) -> Self {
        Self {
            implementation: self.implementation - other.implementation,
            lower: self.lower.sub(&other.upper, RoundingMode::Down),
            upper: self.upper.sub(&other.lower, RoundingMode::Up),
        }
    }

    /// Hull of `op` applied to the four pairs of bounds.
    fn corners<F>(&self, other: &Self, op: F) -> (Float<M, E>, Float<M, E>)
    where
        F: Fn(&Float<M, E>, &Float<M, E>, RoundingMode) -> Float<M, E>,
    {
        let pairs = [
            (self.lower, other.lower),
            (self.lower, other.upper),
            (self.upper, other.lower),
            (self.upper, other.upper),
        ];
        let lower = pairs
            .iter()
            .map(|(a, b)| op(a, b, RoundingMode::Down))
            .fold(Float::nan(), Float::min);
        let upper = pairs
            .iter()
            .map(|(a, b)| op(a, b, RoundingMode::Up))
            .fold(Float::nan(), Float::max);
        (lower, upper)
    }

    pub fn mul(&self, other: &Self, _path: &ExecutionPath) -> Self {
        let (lower, upper) = self.corners(other, |a, b, mode| a.mul(b, mode));
        Self {
            implementation: self.implementation * other.implementation,
            lower,
            upper,
        }
    }

    /// Division; a divisor that may be zero is reported and gives the whole line.
    #[track_caller]
    pub fn div(&self, other: &Self, path: &ExecutionPath) -> Self {
        let implementation = self.implementation / other.implementation;
        if other.contains_zero() {
            path.notify_division_by_zero(Site::caller());
            return Self::whole(implementation);
        }
        let (lower, upper) = self.corners(other, |a, b, mode| a.div(b, mode));
        Self {
            implementation,
            lower,
            upper,
        }
    }

    fn increasing<F>(&self, f: F) -> Self
    where
        F: Fn(&Float<M, E>, RoundingMode) -> Float<M, E>,
    {
        Self {
            implementation: f(&self.implementation, RoundingMode::NearestEven),
            lower: widen_down(f(&self.lower, RoundingMode::Down)),
            upper: widen_up(f(&self.upper, RoundingMode::Up)),
        }
    }

    fn decreasing<F>(&self, f: F) -> Self
    where
        F: Fn(&Float<M, E>, RoundingMode) -> Float<M, E>,
    {
        Self {
            implementation: f(&self.implementation, RoundingMode::NearestEven),
            lower: widen_down(f(&self.upper, RoundingMode::Down)),
            upper: widen_up(f(&self.lower, RoundingMode::Up)),
        }
    }

    /// Restricts the bounds to `[min, max]` (the domain of a function).
    fn clamped(&self, min: Float<M, E>, max: Float<M, E>) -> Self {
        Self {
            implementation: self.implementation,
            lower: self.lower.max(min).min(max),
            upper: self.upper.min(max).max(min),
        }
    }

    #[track_caller]
    pub fn sqrt(&self, path: &ExecutionPath) -> Self {
        let zero = Float::zero(false);
        if self.lower < zero {
            path.notify_negative_sqrt(Site::caller());
        }
        let domain = self.clamped(zero, Float::infinity(false));
        Self {
            implementation: self.implementation.sqrt(RoundingMode::NearestEven),
            lower: domain.lower.sqrt(RoundingMode::Down),
            upper: domain.upper.sqrt(RoundingMode::Up),
        }
    }

    pub fn exp(&self, _path: &ExecutionPath) -> Self {
        let mut result = self.increasing(|x, mode| x.exp(mode));
        result.lower = result.lower.max(Float::zero(false));
        result
    }

    #[track_caller]
    fn logarithm<F>(&self, path: &ExecutionPath, f: F) -> Self
    where
        F: Fn(&Float<M, E>, RoundingMode) -> Float<M, E>,
    {
        let zero = Float::zero(false);
        if self.lower <= zero {
            path.notify_negative_or_nul_log(Site::caller());
        }
        let mut result = self.clamped(zero, Float::infinity(false)).increasing(&f);
        result.implementation = f(&self.implementation, RoundingMode::NearestEven);
        result
    }

    #[track_caller]
    pub fn log(&self, path: &ExecutionPath) -> Self {
        self.logarithm(path, |x, mode| x.log(mode))
    }

    #[track_caller]
    pub fn log10(&self, path: &ExecutionPath) -> Self {
        self.logarithm(path, |x, mode| x.log10(mode))
    }

    /// Bounds of a periodic function with maxima at `top` and minima at `bottom`
    /// (in quarters of pi, modulo a full turn).
    fn periodic<F>(&self, top: i64, bottom: i64, f: F) -> Self
    where
        F: Fn(&Float<M, E>, RoundingMode) -> Float<M, E>,
    {
        let implementation = f(&self.implementation, RoundingMode::NearestEven);
        let one = Float::one();
        let (lo, hi) = match (self.lower.to_real(), self.upper.to_real()) {
            (Some(lo), Some(hi)) => (lo, hi),
            _ => return Self::from_parts(implementation, -one, one),
        };
        let mut lower = widen_down(f(&self.lower, RoundingMode::Down).min(f(&self.upper, RoundingMode::Down)));
        let mut upper = widen_up(f(&self.lower, RoundingMode::Up).max(f(&self.upper, RoundingMode::Up)));
        if contains_phase(&lo, &hi, top, 4) {
            upper = one;
        }
        if contains_phase(&lo, &hi, bottom, 4) {
            lower = -one;
        }
        Self {
            implementation,
            lower: lower.max(-one),
            upper: upper.min(one),
        }
    }

    pub fn sin(&self, _path: &ExecutionPath) -> Self {
        self.periodic(1, -1, |x, mode| x.sin(mode))
    }

    pub fn cos(&self, _path: &ExecutionPath) -> Self {
        self.periodic(0, 2, |x, mode| x.cos(mode))
    }

    pub fn tan(&self, _path: &ExecutionPath) -> Self {
        let implementation = self.implementation.tan(RoundingMode::NearestEven);
        let crosses_pole = match (self.lower.to_real(), self.upper.to_real()) {
            (Some(lo), Some(hi)) => contains_phase(&lo, &hi, 1, 2),
            _ => true,
        };
        if crosses_pole {
            return Self::whole(implementation);
        }
        self.increasing(|x, mode| x.tan(mode))
    }

    pub fn asin(&self, _path: &ExecutionPath) -> Self {
        let one = Float::one();
        let mut result = self.clamped(-one, one).increasing(|x, mode| x.asin(mode));
        result.implementation = self.implementation.asin(RoundingMode::NearestEven);
        result
    }

    pub fn acos(&self, _path: &ExecutionPath) -> Self {
        let one = Float::one();
        let mut result = self.clamped(-one, one).decreasing(|x, mode| x.acos(mode));
        result.implementation = self.implementation.acos(RoundingMode::NearestEven);
        result
    }

    pub fn atan(&self, _path: &ExecutionPath) -> Self {
        self.increasing(|x, mode| x.atan(mode))
    }

    fn pi(mode: RoundingMode) -> Float<M, E> {
        Float::from_real(&Real::pi(Float::<M, E>::PRECISION + 8, mode), mode)
    }

    /// Angle of the points `(x, self)`.
    pub fn atan2(&self, x: &Self, _path: &ExecutionPath) -> Self {
        let implementation = self.implementation.atan2(&x.implementation, RoundingMode::NearestEven);
        let zero = Float::zero(false);
        let crosses_cut = x.lower < zero && self.contains_zero();
        if crosses_cut || (self.contains_zero() && x.contains_zero()) {
            return Self::from_parts(
                implementation,
                -Self::pi(RoundingMode::Up),
                Self::pi(RoundingMode::Up),
            );
        }
        let (lower, upper) = self.corners(x, |y, x, mode| y.atan2(x, mode));
        Self {
            implementation,
            lower: widen_down(lower),
            upper: widen_up(upper),
        }
    }

    /// Power; a possibly negative base with a non-integer exponent is reported and
    /// the base restricted to its non-negative part.
    #[track_caller]
    pub fn pow(&self, exponent: &Self, path: &ExecutionPath) -> Self {
        let site = Site::caller();
        let implementation = self.implementation.pow(&exponent.implementation, RoundingMode::NearestEven);
        let zero = Float::zero(false);
        let integer = exponent.is_point() && exponent.lower.is_finite() && exponent.lower.finite_value().is_integer();
        let mut base = *self;
        if self.lower < zero && !integer {
            path.notify_negative_pow(site);
            base = base.clamped(zero, Float::infinity(false));
        }
        if integer && exponent.lower < zero && base.contains_zero() {
            path.notify_division_by_zero(site);
            return Self::whole(implementation);
        }
        let (mut lower, mut upper) = base.corners(exponent, |x, y, mode| x.pow(y, mode));
        if integer && base.lower < zero && zero < base.upper {
            lower = lower.min(zero);
            upper = upper.max(zero);
        }
        Self {
            implementation,
            lower: widen_down(lower),
            upper: widen_up(upper),
        }
    }

    pub fn abs(&self, _path: &ExecutionPath) -> Self {
        let zero = Float::zero(false);
        let (lower, upper) = if self.lower >= zero {
            (self.lower, self.upper)
        } else if self.upper <= zero {
            (-self.upper, -self.lower)
        } else {
            (zero, (-self.lower).max(self.upper))
        };
        Self {
            implementation: self.implementation.abs(),
            lower,
            upper,
        }
    }

    pub fn min(&self, other: &Self, _path: &ExecutionPath) -> Self {
        Self {
            implementation: self.implementation.min(other.implementation),
            lower: self.lower.min(other.lower),
            upper: self.upper.min(other.upper),
        }
    }

    pub fn max(&self, other: &Self, _path: &ExecutionPath) -> Self {
        Self {
            implementation: self.implementation.max(other.implementation),
            lower: self.lower.max(other.lower),
            upper: self.upper.max(other.upper),
        }
    }

    /// Median of three values.
    pub fn median(&self, b: &Self, c: &Self, path: &ExecutionPath) -> Self {
        self.min(b, path).max(&self.max(b, path).min(c, path), path)
    }

    /// Which outcomes of `self op other` the real values can reach.
    pub(crate) fn outcomes(&self, op: Comparison, other: &Self) -> (bool, bool) {
        match op {
            Comparison::Less => (self.lower < other.upper, self.upper >= other.lower),
            Comparison::LessOrEqual => (self.lower <= other.upper, self.upper > other.lower),
            Comparison::Greater | Comparison::GreaterOrEqual => other.outcomes(op.swap(), self),
            Comparison::Equal => {
                let overlap = self.lower <= other.upper && other.lower <= self.upper;
                let same_point = self.is_point() && other.is_point() && self.lower == other.lower;
                (overlap, !same_point)
            }
            Comparison::NotEqual => {
                let (can_true, can_false) = self.outcomes(Comparison::Equal, other);
                (can_false, can_true)
            }
        }
    }

    /// Decides `self op other`, splitting the flow when the bounds overlap.
    pub fn compare(&self, op: Comparison, other: &Self, path: &ExecutionPath, site: Site) -> bool {
        let (can_true, can_false) = self.outcomes(op, other);
        let implementation = op.evaluate(&self.implementation, &other.implementation);
        debug!(
            "compare({:?} {} {:?}) = ({}, {}), float {}",
            self, op, other, can_true, can_false, implementation
        );
        path.decide(site, can_true, can_false, implementation)
    }

    #[track_caller]
    pub fn lt(&self, other: &Self, path: &ExecutionPath) -> bool {
        self.compare(Comparison::Less, other, path, Site::caller())
    }

    #[track_caller]
    pub fn le(&self, other: &Self, path: &ExecutionPath) -> bool {
        self.compare(Comparison::LessOrEqual, other, path, Site::caller())
    }

    #[track_caller]
    pub fn gt(&self, other: &Self, path: &ExecutionPath) -> bool {
        self.compare(Comparison::Greater, other, path, Site::caller())
    }

    #[track_caller]
    pub fn ge(&self, other: &Self, path: &ExecutionPath) -> bool {
        self.compare(Comparison::GreaterOrEqual, other, path, Site::caller())
    }

    #[track_caller]
    pub fn eq(&self, other: &Self, path: &ExecutionPath) -> bool {
        self.compare(Comparison::Equal, other, path, Site::caller())
    }

    #[track_caller]
    pub fn ne(&self, other: &Self, path: &ExecutionPath) -> bool {
        self.compare(Comparison::NotEqual, other, path, Site::caller())
    }

    /// Restricts the values to those satisfying `self op bound`.
    ///
    /// Returns [`Outcome::Unreachable`] when no value does.
    pub fn assume(&mut self, op: Comparison, bound: &Self) -> Outcome<()> {
        let (can_true, _) = self.outcomes(op, bound);
        if !can_true {
            debug!("assume({:?} {} {:?}): unreachable", self, op, bound);
            return Outcome::Unreachable;
        }
        // Strict comparisons keep the closed bound: the reals just below it have no
        // float of their own.
        match op {
            Comparison::Less | Comparison::LessOrEqual => self.upper = self.upper.min(bound.upper),
            Comparison::Greater | Comparison::GreaterOrEqual => self.lower = self.lower.max(bound.lower),
            Comparison::Equal => {
                self.lower = self.lower.max(bound.lower);
                self.upper = self.upper.min(bound.upper);
            }
            Comparison::NotEqual => {}
        }
        Outcome::Value(())
    }

    /// Integer conversion of the implementation, toward zero.
    pub fn as_int(&self) -> i32 {
        self.implementation.as_int(RoundingMode::Zero)
    }

    /// Integer conversion of the implementation, toward negative infinity.
    pub fn as_unsigned(&self) -> u32 {
        self.implementation.as_unsigned(RoundingMode::Down)
    }

    pub fn as_long(&self) -> i64 {
        self.implementation.as_long(RoundingMode::Zero)
    }

    pub fn as_int_rounded(&self, mode: RoundingMode) -> i32 {
        self.implementation.as_int(mode)
    }

    /// Writes `<prefix>:\t[lower, upper]`.
    pub fn persist(&self, prefix: &str, path: &ExecutionPath) -> io::Result<()> {
        path.diagnostics()
            .persist(prefix, format_args!("[{}, {}]", self.lower, self.upper))
    }

    /// Writes `<prefix>:\t<implementation>`.
    pub fn light_persist(&self, prefix: &str, path: &ExecutionPath) -> io::Result<()> {
        path.diagnostics().persist(prefix, self.implementation)
    }
}

impl<const M: u32, const E: u32> Mergeable for Interval<M, E> {
    fn merge_with(&mut self, source: &Self, _path: &ExecutionPath) {
        self.lower = self.lower.min(source.lower);
        self.upper = self.upper.max(source.upper);
        self.implementation = source.implementation;
    }
}

impl<const M: u32, const E: u32> Watch for Interval<M, E> {
    fn slots(&mut self) -> Vec<&mut dyn Slot> {
        vec![self]
    }
}

impl<const M: u32, const E: u32> FromStr for Interval<M, E> {
    type Err = ReadError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl<const M: u32, const E: u32> fmt::Display for Interval<M, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.implementation, f)
    }
}

impl<const M: u32, const E: u32> fmt::Debug for Interval<M, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in [{}, {}]", self.implementation, self.lower, self.upper)
    }
}
