//! Zonotope domain: the native value plus an affine form enclosing the real values.
//!
//! Linear operations are exact up to the rounding of coefficients. Products bound
//! their quadratic part by the product of the radii, quotients multiply by a
//! linearization of the reciprocal, and the elementary functions use a mean-value
//! linearization around the center of the operand, falling back to the interval
//! enclosure of the result when the derivative is unbounded on the operand range.

use std::fmt;
use std::io;

use log::debug;

use crate::affine::LinearForm;
use crate::error::{Error, PreconditionError, ReadError};
use crate::float::{Double, Float, Single};
use crate::interval::Interval;
use crate::memory::{Mergeable, Slot, Watch};
use crate::outcome::Outcome;
use crate::path::ExecutionPath;
use crate::real::{Real, RoundingMode};
use crate::types::{Comparison, Site};

pub type FloatZonotope = Zonotope<23, 8>;
pub type DoubleZonotope = Zonotope<52, 11>;
pub type ExtendedZonotope = Zonotope<63, 15>;

#[derive(Clone, PartialEq)]
pub struct Zonotope<const M: u32, const E: u32> {
    implementation: Float<M, E>,
    form: LinearForm<M, E>,
}

/// Returns the value of a reachable outcome, or leaves the enclosing function with
/// `Ok(Outcome::Unreachable)`.
macro_rules! reachable {
    ($outcome:expr) => {
        match $outcome {
            Outcome::Value(value) => value,
            Outcome::Unreachable => return Ok(Outcome::Unreachable),
        }
    };
}

impl<const M: u32, const E: u32> Zonotope<M, E> {
    /// Working precision of the linearizations.
    const WORKING_BITS: u64 = Float::<M, E>::PRECISION + 32;

    pub fn from_parts(implementation: Float<M, E>, form: LinearForm<M, E>) -> Self {
        Self { implementation, form }
    }

    /// A value known exactly.
    pub fn point(value: Float<M, E>) -> Self {
        Self {
            implementation: value,
            form: LinearForm::constant(value),
        }
    }

    pub fn from_f64(value: f64, path: &ExecutionPath) -> Self {
        let implementation = Double::from_f64(value).convert(RoundingMode::NearestEven);
        let form = match Real::from_f64(value) {
            Some(exact) => LinearForm::from_real(&exact, path),
            None => LinearForm::unbounded(),
        };
        Self { implementation, form }
    }

    pub fn from_f32(value: f32, path: &ExecutionPath) -> Self {
        let implementation = Single::from_f32(value).convert(RoundingMode::NearestEven);
        let form = match Real::from_f32(value) {
            Some(exact) => LinearForm::from_real(&exact, path),
            None => LinearForm::unbounded(),
        };
        Self { implementation, form }
    }

    pub fn from_i64(value: i64, path: &ExecutionPath) -> Self {
        let exact = Real::from_i64(value);
        Self {
            implementation: Float::from_real(&exact, RoundingMode::NearestEven),
            form: LinearForm::from_real(&exact, path),
        }
    }

    /// A source literal, widened by one ulp on each side like [`Interval::from_literal`].
    pub fn from_literal(value: f64, path: &ExecutionPath) -> Self {
        let enclosure = Interval::<M, E>::from_literal(value, path);
        Self::from_interval(&enclosure, path)
    }

    /// The values of an interval, as a new noise symbol.
    pub fn from_interval(interval: &Interval<M, E>, path: &ExecutionPath) -> Self {
        let form = if interval.is_point() {
            LinearForm::constant(interval.lower())
        } else {
            LinearForm::from_bounds(interval.lower(), interval.upper(), path)
        };
        Self {
            implementation: interval.implementation(),
            form,
        }
    }

    /// All values between `min` and `max`; the implementation is the midpoint.
    pub fn between(min: f64, max: f64, path: &ExecutionPath) -> Result<Self, PreconditionError> {
        Ok(Self::from_interval(&Interval::between(min, max)?, path))
    }

    /// See [`Interval::between_with_error`].
    pub fn between_with_error(
        min: f64,
        max: f64,
        error_min: f64,
        error_max: f64,
        path: &ExecutionPath,
    ) -> Result<Self, PreconditionError> {
        let enclosure = Interval::between_with_error(min, max, error_min, error_max)?;
        Ok(Self::from_interval(&enclosure, path))
    }

    pub fn parse(text: &str, path: &ExecutionPath) -> Result<Self, ReadError> {
        Ok(Self::from_interval(&Interval::parse(text)?, path))
    }

    pub fn implementation(&self) -> Float<M, E> {
        self.implementation
    }

    pub fn form(&self) -> &LinearForm<M, E> {
        &self.form
    }

    /// Bounds of the real values, rounded outward.
    pub fn range(&self) -> (Float<M, E>, Float<M, E>) {
        self.form.range()
    }

    pub fn to_interval(&self) -> Interval<M, E> {
        let (lower, upper) = self.form.range();
        Interval::from_parts(self.implementation, lower, upper)
    }

    pub fn neg(&self) -> Self {
        Self {
            implementation: -self.implementation,
            form: self.form.neg(),
        }
    }

    pub fn add(&self, other: &Self, path: &ExecutionPath) -> Self {
        Self {
            implementation: self.implementation + other.implementation,
            form: self.form.add(&other.form, path),
        }
    }

    pub fn sub(&self, other: &Self, path: &ExecutionPath) -> Self {
        Self {
            implementation: self.implementation - other.implementation,
            form: self.form.sub(&other.form, path),
        }
    }

    pub fn mul(&self, other: &Self, path: &ExecutionPath) -> Self {
        Self {
            implementation: self.implementation * other.implementation,
            form: self.form.mul(&other.form, path),
        }
    }

    /// Division; a divisor whose range contains zero is reported and the result is unbounded.
    #[track_caller]
    pub fn div(&self, other: &Self, path: &ExecutionPath) -> Self {
        let implementation = self.implementation / other.implementation;
        let (lower, upper) = match other.form.bounds() {
            Some(bounds) => bounds,
            None => return Self::from_parts(implementation, LinearForm::unbounded()),
        };
        if !(lower.is_positive() || upper.is_negative()) {
            path.notify_division_by_zero(Site::caller());
            return Self::from_parts(implementation, LinearForm::unbounded());
        }
        let inverse = if lower.is_positive() {
            Self::reciprocal(&other.form, &lower, &upper, path)
        } else {
            Self::reciprocal(&other.form.neg(), &-upper, &-lower, path).map(|form| form.neg())
        };
        let form = match inverse {
            Some(inverse) => self.form.mul(&inverse, path),
            None => LinearForm::unbounded(),
        };
        Self { implementation, form }
    }

    /// Linearization of `1/y` for `y` in `[lower, upper]` with `0 < lower`.
    ///
    /// The slope `-s` is the derivative at `upper` rounded toward zero, so that
    /// `1/t + s*t` decreases on the range and is enclosed by its values at the bounds.
    fn reciprocal(form: &LinearForm<M, E>, lower: &Real, upper: &Real, path: &ExecutionPath) -> Option<LinearForm<M, E>> {
        let bits = Self::WORKING_BITS;
        let one = Real::one();
        let slope = one.checked_div(&upper.mul(upper), bits, RoundingMode::Down)?;
        let low = one.checked_div(upper, bits, RoundingMode::Down)?.add(&slope.mul(upper));
        let high = one.checked_div(lower, bits, RoundingMode::Up)?.add(&slope.mul(lower));
        let center = low.add(&high).shifted(-1);
        let error = high.sub(&low).shifted(-1);
        Some(LinearForm::combine(&[(form, -slope)], &center, &error, path))
    }

    /// Mean-value linearization of `f` around the center of the form, given the
    /// interval enclosure `hull` of the result and the range of `f'` on the operand.
    fn linearize<R, D>(&self, path: &ExecutionPath, hull: Interval<M, E>, value: R, derivative: D) -> Self
    where
        R: Fn(&Real, u64, RoundingMode) -> Option<Real>,
        D: FnOnce(&Interval<M, E>, &ExecutionPath) -> Option<Interval<M, E>>,
    {
        let form = self
            .linear_approximation(path, &hull, value, derivative)
            .unwrap_or_else(|| LinearForm::from_bounds(hull.lower(), hull.upper(), path));
        Self {
            implementation: hull.implementation(),
            form,
        }
    }

    fn linear_approximation<R, D>(
        &self,
        path: &ExecutionPath,
        hull: &Interval<M, E>,
        value: R,
        derivative: D,
    ) -> Option<LinearForm<M, E>>
    where
        R: Fn(&Real, u64, RoundingMode) -> Option<Real>,
        D: FnOnce(&Interval<M, E>, &ExecutionPath) -> Option<Interval<M, E>>,
    {
        if !self.form.is_finite() {
            return None;
        }
        let slopes = derivative(&self.to_interval(), path)?;
        let (low_slope, high_slope) = (slopes.lower().to_real()?, slopes.upper().to_real()?);
        let center = self.form.center().finite_value();
        let low = value(&center, Self::WORKING_BITS, RoundingMode::Down)?;
        let high = value(&center, Self::WORKING_BITS, RoundingMode::Up)?;

        let slope = low_slope.add(&high_slope).shifted(-1);
        let spread = high_slope.sub(&low_slope).shifted(-1);
        let error = high
            .sub(&low)
            .shifted(-1)
            .add(&spread.mul(&self.form.radius()));
        if let (Some(lower), Some(upper)) = (hull.lower().to_real(), hull.upper().to_real()) {
            if error > upper.sub(&lower).shifted(-1) {
                debug!("linearize: error {} wider than the enclosure", error.to_scientific(4));
                return None;
            }
        }
        let constant = low.add(&high).shifted(-1).sub(&slope.mul(&center));
        Some(LinearForm::combine(&[(&self.form, slope)], &constant, &error, path))
    }

    /// The interval `[x, x]` for a native constant.
    fn constant(value: f64) -> Interval<M, E> {
        Interval::from_f64(value)
    }

    #[track_caller]
    pub fn sqrt(&self, path: &ExecutionPath) -> Self {
        let range = self.to_interval();
        let hull = range.sqrt(path);
        let positive = range.lower() > Float::zero(false);
        self.linearize(path, hull, |x, bits, mode| x.sqrt(bits, mode), |x, path| {
            if !positive {
                return None;
            }
            Some(Self::constant(0.5).div(&x.sqrt(path), path))
        })
    }

    pub fn exp(&self, path: &ExecutionPath) -> Self {
        let hull = self.to_interval().exp(path);
        self.linearize(path, hull, |x, bits, mode| Some(x.exp(bits, mode)), |x, path| Some(x.exp(path)))
    }

    #[track_caller]
    pub fn log(&self, path: &ExecutionPath) -> Self {
        let range = self.to_interval();
        let hull = range.log(path);
        let positive = range.lower() > Float::zero(false);
        self.linearize(path, hull, |x, bits, mode| x.log(bits, mode), |x, path| {
            if !positive {
                return None;
            }
            Some(Self::constant(1.0).div(x, path))
        })
    }

    #[track_caller]
    pub fn log10(&self, path: &ExecutionPath) -> Self {
        let range = self.to_interval();
        let hull = range.log10(path);
        let positive = range.lower() > Float::zero(false);
        self.linearize(path, hull, |x, bits, mode| x.log10(bits, mode), |x, path| {
            if !positive {
                return None;
            }
            let ln10 = Self::constant(10.0).log(path);
            Some(Self::constant(1.0).div(&x.mul(&ln10, path), path))
        })
    }

    pub fn sin(&self, path: &ExecutionPath) -> Self {
        let hull = self.to_interval().sin(path);
        self.linearize(path, hull, |x, bits, mode| Some(x.sin(bits, mode)), |x, path| Some(x.cos(path)))
    }

    pub fn cos(&self, path: &ExecutionPath) -> Self {
        let hull = self.to_interval().cos(path);
        self.linearize(path, hull, |x, bits, mode| Some(x.cos(bits, mode)), |x, path| {
            Some(x.sin(path).neg())
        })
    }

    pub fn tan(&self, path: &ExecutionPath) -> Self {
        let hull = self.to_interval().tan(path);
        self.linearize(path, hull, |x, bits, mode| Some(x.tan(bits, mode)), |x, path| {
            let tangent = x.tan(path);
            if !tangent.lower().is_finite() || !tangent.upper().is_finite() {
                return None;
            }
            let square = tangent.pow(&Self::constant(2.0), path);
            Some(Self::constant(1.0).add(&square, path))
        })
    }

    /// `1 - x^2` when it is positive on the range.
    fn complement_square(x: &Interval<M, E>, path: &ExecutionPath) -> Option<Interval<M, E>> {
        let square = x.pow(&Self::constant(2.0), path);
        let complement = Self::constant(1.0).sub(&square, path);
        (complement.lower() > Float::zero(false)).then_some(complement)
    }

    pub fn asin(&self, path: &ExecutionPath) -> Self {
        let hull = self.to_interval().asin(path);
        self.linearize(path, hull, |x, bits, mode| x.asin(bits, mode), |x, path| {
            let complement = Self::complement_square(x, path)?;
            Some(Self::constant(1.0).div(&complement.sqrt(path), path))
        })
    }

    pub fn acos(&self, path: &ExecutionPath) -> Self {
        let hull = self.to_interval().acos(path);
        self.linearize(path, hull, |x, bits, mode| x.acos(bits, mode), |x, path| {
            let complement = Self::complement_square(x, path)?;
            Some(Self::constant(-1.0).div(&complement.sqrt(path), path))
        })
    }

    pub fn atan(&self, path: &ExecutionPath) -> Self {
        let hull = self.to_interval().atan(path);
        self.linearize(path, hull, |x, bits, mode| Some(x.atan(bits, mode)), |x, path| {
            let square = x.pow(&Self::constant(2.0), path);
            Some(Self::constant(1.0).div(&Self::constant(1.0).add(&square, path), path))
        })
    }

    /// Power. A constant exponent is linearized, any other one uses the enclosure.
    #[track_caller]
    pub fn pow(&self, exponent: &Self, path: &ExecutionPath) -> Self {
        let range = self.to_interval();
        let hull = range.pow(&exponent.to_interval(), path);
        let power = match (exponent.form.is_constant(), exponent.form.center().to_real()) {
            (true, Some(power)) => power,
            _ => return Self::from_interval(&hull, path),
        };
        let zero = Float::zero(false);
        let integer = power.is_integer();
        let usable = if integer {
            power >= Real::one() || !range.contains(&zero)
        } else {
            range.lower() > zero
        };
        let factor = Interval::point(exponent.form.center());
        let reduced = exponent.form.center().sub(&Float::one(), RoundingMode::NearestEven);
        let exact_reduction = reduced.to_real().map_or(false, |r| r == power.sub(&Real::one()));
        self.linearize(path, hull, |x, bits, mode| x.pow(&power, bits, mode), |x, path| {
            if !usable || !exact_reduction {
                return None;
            }
            Some(factor.mul(&x.pow(&Interval::point(reduced), path), path))
        })
    }

    /// Angle of the points `(x, self)`, through the interval enclosure.
    pub fn atan2(&self, x: &Self, path: &ExecutionPath) -> Self {
        let hull = self.to_interval().atan2(&x.to_interval(), path);
        Self::from_interval(&hull, path)
    }

    /// Exact bounds of `self - other`, as an interval compared against zero.
    fn difference(&self, other: &Self) -> Interval<M, E> {
        let implementation = self.implementation - other.implementation;
        match self.form.difference_bounds(&other.form) {
            Some((lower, upper)) => Interval::from_parts(
                implementation,
                Float::from_real(&lower, RoundingMode::Down),
                Float::from_real(&upper, RoundingMode::Up),
            ),
            None => Interval::from_parts(implementation, Float::infinity(true), Float::infinity(false)),
        }
    }

    /// Which outcomes of `self op other` the real values can reach.
    fn outcomes(&self, op: Comparison, other: &Self) -> (bool, bool) {
        self.difference(other)
            .outcomes(op, &Interval::point(Float::zero(false)))
    }

    /// Decides `self op other` from the range of the difference, splitting the flow
    /// when it is ambiguous.
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
    /// When the condition does not always hold, the narrowed range replaces the form
    /// and correlations with other values are lost.
    pub fn assume(&mut self, op: Comparison, bound: &Self, path: &ExecutionPath) -> Outcome<()> {
        let (can_true, can_false) = self.outcomes(op, bound);
        if !can_true {
            debug!("assume({:?} {} {:?}): unreachable", self, op, bound);
            return Outcome::Unreachable;
        }
        if !can_false {
            return Outcome::Value(());
        }
        let mut range = self.to_interval();
        if range.assume(op, &bound.to_interval()).is_unreachable() {
            return Outcome::Unreachable;
        }
        if range != self.to_interval() {
            self.form = LinearForm::from_bounds(range.lower(), range.upper(), path);
        }
        Outcome::Value(())
    }

    /// Absolute value, splitting on the sign.
    #[track_caller]
    pub fn abs(&self, path: &ExecutionPath) -> Result<Outcome<Self>, Error> {
        let zero = Self::point(Float::zero(false));
        let mut state = (self.clone(),);
        let outcome = path.split_scope(&mut state, |path, (x,)| {
            if x.lt(&zero, path) {
                if x.assume(Comparison::Less, &zero, path).is_unreachable() {
                    return Outcome::Unreachable;
                }
                *x = x.neg();
            } else if x.assume(Comparison::GreaterOrEqual, &zero, path).is_unreachable() {
                return Outcome::Unreachable;
            }
            Outcome::Value(())
        })?;
        reachable!(outcome);
        Ok(Outcome::Value(state.0))
    }

    /// Selects `self` or `other` depending on `self op other`.
    #[track_caller]
    fn select(&self, op: Comparison, other: &Self, path: &ExecutionPath) -> Result<Outcome<Self>, Error> {
        let site = Site::caller();
        let mut state = (self.clone(),);
        let outcome = path.split_scope(&mut state, |path, (x,)| {
            if !x.compare(op, other, path, site) {
                *x = other.clone();
            }
            Outcome::Value(())
        })?;
        reachable!(outcome);
        Ok(Outcome::Value(state.0))
    }

    #[track_caller]
    pub fn min(&self, other: &Self, path: &ExecutionPath) -> Result<Outcome<Self>, Error> {
        self.select(Comparison::LessOrEqual, other, path)
    }

    #[track_caller]
    pub fn max(&self, other: &Self, path: &ExecutionPath) -> Result<Outcome<Self>, Error> {
        self.select(Comparison::GreaterOrEqual, other, path)
    }

    /// Median of three values.
    #[track_caller]
    pub fn median(&self, b: &Self, c: &Self, path: &ExecutionPath) -> Result<Outcome<Self>, Error> {
        let low = reachable!(self.min(b, path)?);
        let high = reachable!(self.max(b, path)?);
        let middle = reachable!(high.min(c, path)?);
        low.max(&middle, path)
    }

    pub fn as_int(&self) -> i32 {
        self.implementation.as_int(RoundingMode::Zero)
    }

    pub fn as_unsigned(&self) -> u32 {
        self.implementation.as_unsigned(RoundingMode::Down)
    }

    pub fn as_long(&self) -> i64 {
        self.implementation.as_long(RoundingMode::Zero)
    }

    pub fn as_int_rounded(&self, mode: RoundingMode) -> i32 {
        self.implementation.as_int(mode)
    }

    /// Writes `<prefix>:\t<implementation> [lower, upper] = <form>`.
    pub fn persist(&self, prefix: &str, path: &ExecutionPath) -> io::Result<()> {
        let (lower, upper) = self.range();
        path.diagnostics().persist(
            prefix,
            format_args!("{} [{}, {}] = {}", self.implementation, lower, upper, self.form),
        )
    }

    /// Writes `<prefix>:\t<implementation>`.
    pub fn light_persist(&self, prefix: &str, path: &ExecutionPath) -> io::Result<()> {
        path.diagnostics().persist(prefix, self.implementation)
    }
}

impl<const M: u32, const E: u32> Mergeable for Zonotope<M, E> {
    fn merge_with(&mut self, source: &Self, path: &ExecutionPath) {
        self.form = self.form.join(&source.form, path);
        self.implementation = source.implementation;
    }

    // An unbounded form is the top element: the alternative is kept and the join
    // becomes unbounded.
    fn optimize_value(&mut self, path: &ExecutionPath) -> bool {
        if !self.form.is_finite() {
            return true;
        }
        if let Some(percent) = path.config().simplification_trigger_percent {
            self.form.simplify(percent, path);
        }
        self.form.absorb(path);
        true
    }
}

impl<const M: u32, const E: u32> Watch for Zonotope<M, E> {
    fn slots(&mut self) -> Vec<&mut dyn Slot> {
        vec![self]
    }
}

impl<const M: u32, const E: u32> fmt::Display for Zonotope<M, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.implementation, f)
    }
}

impl<const M: u32, const E: u32> fmt::Debug for Zonotope<M, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (lower, upper) = self.range();
        write!(f, "{} in [{}, {}]", self.implementation, lower, upper)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::config::Config;
    use crate::diagnostics::Finding;

    fn path() -> ExecutionPath {
        ExecutionPath::new(Config::default())
    }

    fn range(x: &DoubleZonotope) -> (f64, f64) {
        let (lower, upper) = x.range();
        (lower.to_f64(), upper.to_f64())
    }

    #[test]
    fn test_correlated_subtraction() {
        let path = path();
        let x = DoubleZonotope::between(0.0, 10.0, &path).unwrap();
        let y = x.mul(&DoubleZonotope::from_f64(2.0, &path), &path);
        let z = y.sub(&x, &path);
        assert_eq!(range(&z), (0.0, 10.0));
        // Intervals lose the correlation.
        let i = x.to_interval();
        let j = i.mul(&Interval::from_f64(2.0), &path).sub(&i, &path);
        assert_eq!((j.lower().to_f64(), j.upper().to_f64()), (-10.0, 20.0));
    }

    #[test]
    fn test_single_precision_constant() {
        let path = path();
        let tenth = FloatZonotope::from_f64(0.1, &path);
        let (lower, upper) = tenth.range();
        assert!(lower.to_f64() <= 0.1 && 0.1 <= upper.to_f64());
        assert_eq!(tenth.form().len(), 1);
    }

    #[test]
    fn test_division() {
        let path = path();
        let x = DoubleZonotope::between(1.0, 2.0, &path).unwrap();
        let y = DoubleZonotope::between(4.0, 8.0, &path).unwrap();
        let q = x.div(&y, &path);
        let (lower, upper) = range(&q);
        assert!(lower <= 0.125 && upper >= 0.5);
        assert!(upper - lower < 1.0);
        assert!(path.diagnostics().findings().is_empty());

        let z = DoubleZonotope::between(-1.0, 1.0, &path).unwrap();
        let bad = x.div(&z, &path);
        assert!(!bad.form().is_finite());
        assert!(matches!(
            path.diagnostics().findings()[..],
            [Finding::DivisionByZero { .. }]
        ));
    }

    #[test]
    fn test_negative_divisor() {
        let path = path();
        let one = DoubleZonotope::from_f64(1.0, &path);
        let y = DoubleZonotope::between(-4.0, -2.0, &path).unwrap();
        let (lower, upper) = range(&one.div(&y, &path));
        assert!(lower <= -0.5 && upper >= -0.25);
        assert!(upper < 0.0);
    }

    #[test]
    fn test_elementary_functions_enclose() {
        let path = path();
        let x = DoubleZonotope::between(0.5, 1.5, &path).unwrap();
        let cases: [(DoubleZonotope, fn(f64) -> f64); 8] = [
            (x.exp(&path), f64::exp as fn(f64) -> f64),
            (x.log(&path), f64::ln as fn(f64) -> f64),
            (x.log10(&path), f64::log10 as fn(f64) -> f64),
            (x.sqrt(&path), f64::sqrt as fn(f64) -> f64),
            (x.sin(&path), f64::sin as fn(f64) -> f64),
            (x.cos(&path), f64::cos as fn(f64) -> f64),
            (x.tan(&path), f64::tan as fn(f64) -> f64),
            (x.atan(&path), f64::atan as fn(f64) -> f64),
        ];
        for (result, f) in cases {
            let (lower, upper) = range(&result);
            for i in 0..=10 {
                let t = 0.5 + i as f64 / 10.0;
                let value = f(t);
                assert!(lower <= value && value <= upper, "{} not in [{}, {}]", value, lower, upper);
            }
        }
        let y = DoubleZonotope::between(-0.5, 0.5, &path).unwrap();
        for (result, f) in [
            (y.asin(&path), f64::asin as fn(f64) -> f64),
            (y.acos(&path), f64::acos as fn(f64) -> f64),
        ] {
            let (lower, upper) = range(&result);
            assert!(lower <= f(-0.5) && f(-0.5) <= upper);
            assert!(lower <= f(0.5) && f(0.5) <= upper);
        }
        assert!(path.diagnostics().findings().is_empty());
    }

    #[test]
    fn test_linearization_keeps_correlation() {
        let path = path();
        let x = DoubleZonotope::between(1.0, 1.001, &path).unwrap();
        let y = x.exp(&path).sub(&x.mul(&DoubleZonotope::from_f64(std::f64::consts::E, &path), &path), &path);
        let (lower, upper) = range(&y);
        // exp(x) - e*x is almost flat near 1.
        assert!(upper - lower < 1e-5);
    }

    #[test]
    fn test_domain_findings() {
        let path = path();
        let x = DoubleZonotope::between(-1.0, 4.0, &path).unwrap();
        let root = x.sqrt(&path);
        let (lower, upper) = range(&root);
        assert!(lower <= 0.0 && upper >= 2.0);
        x.log(&path);
        let findings = path.diagnostics().findings();
        assert!(matches!(findings[0], Finding::NegativeSqrt { .. }));
        assert!(matches!(findings[1], Finding::NegativeOrNulLog { .. }));
    }

    #[test]
    fn test_pow() {
        let path = path();
        let x = DoubleZonotope::between(1.0, 2.0, &path).unwrap();
        let cube = x.pow(&DoubleZonotope::from_f64(3.0, &path), &path);
        let (lower, upper) = range(&cube);
        assert!(lower <= 1.0 && upper >= 8.0);
        let root = x.pow(&DoubleZonotope::from_f64(0.5, &path), &path);
        let (lower, upper) = range(&root);
        assert!(lower <= 1.0 && upper >= std::f64::consts::SQRT_2);
    }

    #[test]
    fn test_comparisons() {
        let path = path();
        let x = DoubleZonotope::between(0.0, 1.0, &path).unwrap();
        let y = x.add(&DoubleZonotope::from_f64(0.5, &path), &path);
        // y - x is exactly 0.5 although the ranges overlap.
        assert!(x.lt(&y, &path));
        assert!(!x.eq(&y, &path));
        assert!(path.diagnostics().findings().is_empty());
    }

    #[test]
    fn test_assume() {
        let path = path();
        let mut x = DoubleZonotope::between(0.0, 10.0, &path).unwrap();
        let four = DoubleZonotope::from_f64(4.0, &path);
        assert!(x.assume(Comparison::LessOrEqual, &four, &path).is_value());
        assert_eq!(range(&x), (0.0, 4.0));
        let ten = DoubleZonotope::from_f64(10.0, &path);
        assert!(x.assume(Comparison::Greater, &ten, &path).is_unreachable());

        let mut y = DoubleZonotope::between(0.0, 10.0, &path).unwrap();
        let five = DoubleZonotope::from_f64(5.0, &path);
        assert!(y.assume(Comparison::Less, &five, &path).is_value());
        let (_, upper) = range(&y);
        assert!(upper >= 5.0, "upper = {}", upper);
    }

    #[test]
    fn test_abs_min_max() {
        let path = path();
        let x = DoubleZonotope::between(-1.0, 3.0, &path).unwrap();
        let abs = x.abs(&path).unwrap().value().unwrap();
        let (lower, upper) = range(&abs);
        assert!(lower <= 0.0 && lower > -1e-9);
        assert!(upper >= 3.0 && upper < 3.0 + 1e-9);
        assert_eq!(abs.implementation().to_f64(), 1.0);

        let y = DoubleZonotope::between(0.0, 2.0, &path).unwrap();
        let low = x.min(&y, &path).unwrap().value().unwrap();
        let (lower, upper) = range(&low);
        assert!(lower <= -1.0 && upper >= 2.0);
        let z = DoubleZonotope::from_f64(5.0, &path);
        let high = x.max(&z, &path).unwrap().value().unwrap();
        assert_eq!(range(&high), (5.0, 5.0));
        let middle = x.median(&y, &z, &path).unwrap().value().unwrap();
        let (lower, upper) = range(&middle);
        assert!(lower <= 0.0 && upper >= 2.0);
        assert!(!path.is_exploring());
    }

    #[test]
    fn test_merge() {
        let path = path();
        let mut x = DoubleZonotope::between(0.0, 1.0, &path).unwrap();
        let y = DoubleZonotope::between(5.0, 6.0, &path).unwrap();
        let before = x.clone();
        x.merge_with(&y, &path);
        assert!(x.form().encloses(before.form()));
        assert!(x.form().encloses(y.form()));
        assert_eq!(x.implementation(), y.implementation());
    }

    #[test]
    fn test_optimize_keeps_unbounded() {
        let path = path();
        let mut x = DoubleZonotope::from_parts(Float::one(), LinearForm::unbounded());
        assert!(x.optimize_value(&path));
        assert!(!x.form().is_finite());
        let mut y = DoubleZonotope::between(0.0, 1.0, &path).unwrap();
        assert!(y.optimize_value(&path));
    }

    #[test]
    fn test_persist() {
        let sink = crate::diagnostics::MemorySink::new();
        let path = ExecutionPath::with_diagnostics(
            Config::default(),
            crate::diagnostics::Diagnostics::with_output(Box::new(sink.clone())),
        );
        let x = DoubleZonotope::between(0.0, 10.0, &path).unwrap();
        x.persist("x", &path).unwrap();
        x.light_persist("x", &path).unwrap();
        assert_eq!(sink.contents(), "x:\t5 [0, 10] = 5 + 5*e1\nx:\t5\n");
    }
}
