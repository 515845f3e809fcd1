//! Shadow domain: every value is computed twice, in the target format and exactly.
//!
//! The exact side is kept at `Config::real_bits` bits, rounded to nearest after
//! each operation. After an operation the two sides are compared: in verbose mode
//! every rounding error is reported, with a threshold the relative error is tracked
//! and reported once it exceeds the threshold. Comparisons always follow the native
//! value; when the exact value would branch elsewhere the divergence is reported.

use std::fmt;
use std::io;

use log::debug;

use crate::diagnostics::Finding;
use crate::error::ReadError;
use crate::float::{Double, Float, Single};
use crate::memory::{Mergeable, Slot, Watch};
use crate::path::{BranchState, ExecutionPath};
use crate::real::{Real, RoundingMode};
use crate::types::{Comparison, Site};

pub type FloatShadow = Shadow<23, 8>;
pub type DoubleShadow = Shadow<52, 11>;
pub type ExtendedShadow = Shadow<63, 15>;

#[derive(Clone, PartialEq)]
pub struct Shadow<const M: u32, const E: u32> {
    implementation: Float<M, E>,
    real: Real,
    /// False once an operation had no exact result (`sqrt(-1)`, `x / 0`, ...);
    /// `real` then holds the last defined exact value.
    defined: bool,
}

impl<const M: u32, const E: u32> Shadow<M, E> {
    pub fn from_parts(implementation: Float<M, E>, real: Real) -> Self {
        Self {
            implementation,
            real,
            defined: true,
        }
    }

    /// A value whose native and exact sides agree.
    pub fn point(value: Float<M, E>) -> Self {
        Self {
            implementation: value,
            real: value.finite_value(),
            defined: value.is_finite(),
        }
    }

    /// The exact side is the value of the native double.
    pub fn from_f64(value: f64) -> Self {
        Self {
            implementation: Double::from_f64(value).convert(RoundingMode::NearestEven),
            real: Real::from_f64(value).unwrap_or_default(),
            defined: value.is_finite(),
        }
    }

    pub fn from_f32(value: f32) -> Self {
        Self {
            implementation: Single::from_f32(value).convert(RoundingMode::NearestEven),
            real: Real::from_f32(value).unwrap_or_default(),
            defined: value.is_finite(),
        }
    }

    pub fn from_i64(value: i64) -> Self {
        let real = Real::from_i64(value);
        Self {
            implementation: Float::from_real(&real, RoundingMode::NearestEven),
            real,
            defined: true,
        }
    }

    /// Parses a decimal literal; the exact side keeps `real_bits` bits of it.
    pub fn parse(text: &str, path: &ExecutionPath) -> Result<Self, ReadError> {
        let implementation = Float::parse(text, RoundingMode::NearestEven)?;
        let defined = implementation.is_finite();
        let real = if defined {
            Real::from_decimal_str(text.trim(), path.config().real_bits, RoundingMode::NearestEven)?
        } else {
            Real::zero()
        };
        Ok(Self {
            implementation,
            real,
            defined,
        })
    }

    pub fn implementation(&self) -> Float<M, E> {
        self.implementation
    }

    pub fn real(&self) -> &Real {
        &self.real
    }

    /// Whether the exact side holds the exact result of the computation.
    pub fn is_defined(&self) -> bool {
        self.defined
    }

    /// `|implementation - real| / |real|`; infinite for a non-finite implementation
    /// and NaN for an undefined exact value.
    pub fn relative_error(&self) -> f64 {
        if !self.defined {
            return f64::NAN;
        }
        let implementation = match self.implementation.to_real() {
            Some(value) => value,
            None => return f64::INFINITY,
        };
        let difference = implementation.sub(&self.real).abs();
        if difference.is_zero() {
            return 0.0;
        }
        if self.real.is_zero() {
            return f64::INFINITY;
        }
        difference
            .checked_div(&self.real.abs(), 53, RoundingMode::NearestEven)
            .map_or(f64::INFINITY, |ratio| ratio.to_f64())
    }

    /// `implementation - real`, as a double.
    pub fn absolute_error(&self) -> f64 {
        if !self.defined {
            return f64::NAN;
        }
        match self.implementation.to_real() {
            Some(value) => value.sub(&self.real).to_f64(),
            None => f64::INFINITY,
        }
    }

    /// Reports the rounding error of the operation that produced `self`.
    ///
    /// `finite_operands` tells whether the operands were finite, so that only the
    /// operation turning finite values into an infinity or NaN is reported.
    pub fn notify_for_compare(&self, site: Site, finite_operands: bool, path: &ExecutionPath) {
        if !self.defined {
            debug!("notify_for_compare(site = {}): no exact value", site);
            return;
        }
        let site = path.current_site(site);
        let config = path.config();
        if finite_operands && !self.implementation.is_finite() {
            path.notify(Finding::NonFinite { site });
        }
        if config.support_verbose {
            path.notify(Finding::Compare {
                site,
                diff: self.absolute_error(),
            });
        }
        if let Some(threshold) = config.threshold {
            let relative_error = self.relative_error();
            path.diagnostics().update_maximal_error(site, relative_error);
            if relative_error > threshold {
                path.notify(Finding::Threshold { site, relative_error });
            }
        }
    }

    fn bits(path: &ExecutionPath) -> u64 {
        path.config().real_bits
    }

    /// Builds the result of an operation on `operands`. Without an exact result, or
    /// with an undefined operand, the result keeps the exact value of the first
    /// operand and is undefined.
    fn finish(
        implementation: Float<M, E>,
        real: Option<Real>,
        operands: &[&Self],
        site: Site,
        path: &ExecutionPath,
    ) -> Self {
        let finite_operands = operands.iter().all(|x| x.implementation.is_finite());
        let result = match real {
            Some(real) if operands.iter().all(|x| x.defined) => Self {
                implementation,
                real,
                defined: true,
            },
            _ => Self {
                implementation,
                real: operands.first().map_or_else(Real::zero, |x| x.real.clone()),
                defined: false,
            },
        };
        debug!("shadow({}) = {:?}", site, result);
        result.notify_for_compare(site, finite_operands, path);
        result
    }

    fn binary<F, R>(&self, other: &Self, site: Site, path: &ExecutionPath, native: F, exact: R) -> Self
    where
        F: Fn(&Float<M, E>, &Float<M, E>) -> Float<M, E>,
        R: Fn(&Real, &Real) -> Real,
    {
        let implementation = native(&self.implementation, &other.implementation);
        let real = exact(&self.real, &other.real).round(Self::bits(path), RoundingMode::NearestEven);
        Self::finish(implementation, Some(real), &[self, other], site, path)
    }

    fn unary<F, R>(&self, site: Site, path: &ExecutionPath, native: F, exact: R) -> Self
    where
        F: Fn(&Float<M, E>) -> Float<M, E>,
        R: Fn(&Real, u64) -> Option<Real>,
    {
        let implementation = native(&self.implementation);
        let real = exact(&self.real, Self::bits(path));
        Self::finish(implementation, real, &[self], site, path)
    }

    pub fn neg(&self) -> Self {
        Self {
            implementation: -self.implementation,
            real: -&self.real,
            defined: self.defined,
        }
    }

    #[track_caller]
    pub fn add(&self, other: &Self, path: &ExecutionPath) -> Self {
        self.binary(other, Site::caller(), path, |a, b| *a + *b, |a, b| a.add(b))
    }

    #[track_caller]
    pub fn sub(&self, other: &Self, path: &ExecutionPath) -> Self {
        self.binary(other, Site::caller(), path, |a, b| *a - *b, |a, b| a.sub(b))
    }

    #[track_caller]
    pub fn mul(&self, other: &Self, path: &ExecutionPath) -> Self {
        self.binary(other, Site::caller(), path, |a, b| *a * *b, |a, b| a.mul(b))
    }

    /// Division; an exact divisor equal to zero is reported.
    #[track_caller]
    pub fn div(&self, other: &Self, path: &ExecutionPath) -> Self {
        let site = Site::caller();
        let implementation = self.implementation / other.implementation;
        let real = self.real.checked_div(&other.real, Self::bits(path), RoundingMode::NearestEven);
        if real.is_none() {
            path.notify_division_by_zero(site);
        }
        Self::finish(implementation, real, &[self, other], site, path)
    }

    #[track_caller]
    pub fn sqrt(&self, path: &ExecutionPath) -> Self {
        let site = Site::caller();
        if self.real.is_negative() {
            path.notify_negative_sqrt(site);
        }
        self.unary(site, path, |x| x.sqrt(RoundingMode::NearestEven), |x, bits| {
            x.sqrt(bits, RoundingMode::NearestEven)
        })
    }

    #[track_caller]
    pub fn log(&self, path: &ExecutionPath) -> Self {
        let site = Site::caller();
        if !self.real.is_positive() {
            path.notify_negative_or_nul_log(site);
        }
        self.unary(site, path, |x| x.log(RoundingMode::NearestEven), |x, bits| {
            x.log(bits, RoundingMode::NearestEven)
        })
    }

    #[track_caller]
    pub fn log10(&self, path: &ExecutionPath) -> Self {
        let site = Site::caller();
        if !self.real.is_positive() {
            path.notify_negative_or_nul_log(site);
        }
        self.unary(site, path, |x| x.log10(RoundingMode::NearestEven), |x, bits| {
            x.log10(bits, RoundingMode::NearestEven)
        })
    }

    #[track_caller]
    pub fn exp(&self, path: &ExecutionPath) -> Self {
        self.unary(Site::caller(), path, |x| x.exp(RoundingMode::NearestEven), |x, bits| {
            Some(x.exp(bits, RoundingMode::NearestEven))
        })
    }

    #[track_caller]
    pub fn sin(&self, path: &ExecutionPath) -> Self {
        self.unary(Site::caller(), path, |x| x.sin(RoundingMode::NearestEven), |x, bits| {
            Some(x.sin(bits, RoundingMode::NearestEven))
        })
    }

    #[track_caller]
    pub fn cos(&self, path: &ExecutionPath) -> Self {
        self.unary(Site::caller(), path, |x| x.cos(RoundingMode::NearestEven), |x, bits| {
            Some(x.cos(bits, RoundingMode::NearestEven))
        })
    }

    #[track_caller]
    pub fn tan(&self, path: &ExecutionPath) -> Self {
        self.unary(Site::caller(), path, |x| x.tan(RoundingMode::NearestEven), |x, bits| {
            Some(x.tan(bits, RoundingMode::NearestEven))
        })
    }

    #[track_caller]
    pub fn asin(&self, path: &ExecutionPath) -> Self {
        self.unary(Site::caller(), path, |x| x.asin(RoundingMode::NearestEven), |x, bits| {
            x.asin(bits, RoundingMode::NearestEven)
        })
    }

    #[track_caller]
    pub fn acos(&self, path: &ExecutionPath) -> Self {
        self.unary(Site::caller(), path, |x| x.acos(RoundingMode::NearestEven), |x, bits| {
            x.acos(bits, RoundingMode::NearestEven)
        })
    }

    #[track_caller]
    pub fn atan(&self, path: &ExecutionPath) -> Self {
        self.unary(Site::caller(), path, |x| x.atan(RoundingMode::NearestEven), |x, bits| {
            Some(x.atan(bits, RoundingMode::NearestEven))
        })
    }

    /// Power; a negative exact base with a non-integer exponent is reported.
    #[track_caller]
    pub fn pow(&self, exponent: &Self, path: &ExecutionPath) -> Self {
        let site = Site::caller();
        let implementation = self.implementation.pow(&exponent.implementation, RoundingMode::NearestEven);
        if self.real.is_negative() && !exponent.real.is_integer() {
            path.notify_negative_pow(site);
        }
        if self.real.is_zero() && exponent.real.is_negative() {
            path.notify_division_by_zero(site);
        }
        let real = self.real.pow(&exponent.real, Self::bits(path), RoundingMode::NearestEven);
        Self::finish(implementation, real, &[self, exponent], site, path)
    }

    #[track_caller]
    pub fn atan2(&self, x: &Self, path: &ExecutionPath) -> Self {
        let bits = Self::bits(path);
        self.binary(
            x,
            Site::caller(),
            path,
            |y, x| y.atan2(x, RoundingMode::NearestEven),
            |y, x| y.atan2(x, bits, RoundingMode::NearestEven),
        )
    }

    pub fn abs(&self) -> Self {
        Self {
            implementation: self.implementation.abs(),
            real: self.real.abs(),
            defined: self.defined,
        }
    }

    /// The smaller value, chosen by the native comparison.
    #[track_caller]
    pub fn min(&self, other: &Self, path: &ExecutionPath) -> Self {
        if other.lt(self, path) {
            other.clone()
        } else {
            self.clone()
        }
    }

    #[track_caller]
    pub fn max(&self, other: &Self, path: &ExecutionPath) -> Self {
        if other.gt(self, path) {
            other.clone()
        } else {
            self.clone()
        }
    }

    #[track_caller]
    pub fn median(&self, b: &Self, c: &Self, path: &ExecutionPath) -> Self {
        self.min(b, path).max(&self.max(b, path).min(c, path), path)
    }

    /// Decides `self op other` on the native values and reports a divergence of
    /// the exact values, when both are defined.
    pub fn compare(&self, op: Comparison, other: &Self, path: &ExecutionPath, site: Site) -> bool {
        let implementation = op.evaluate(&self.implementation, &other.implementation);
        if !(self.defined && other.defined) {
            return implementation;
        }
        let real = op.evaluate(&self.real, &other.real);
        if implementation != real {
            path.notify(Finding::BranchDivergence {
                site: path.current_site(site),
                implementation,
                real,
            });
            path.set_branch_state(BranchState::OnlyFloat);
        }
        implementation
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

    /// Writes `<prefix>:\t<implementation> (relative error <e>)`.
    pub fn persist(&self, prefix: &str, path: &ExecutionPath) -> io::Result<()> {
        path.diagnostics().persist(
            prefix,
            format_args!("{} (relative error {:e})", self.implementation, self.relative_error()),
        )
    }

    /// Writes `<prefix>:\t<implementation>`.
    pub fn light_persist(&self, prefix: &str, path: &ExecutionPath) -> io::Result<()> {
        path.diagnostics().persist(prefix, self.implementation)
    }
}

impl<const M: u32, const E: u32> Mergeable for Shadow<M, E> {
    fn merge_with(&mut self, source: &Self, _path: &ExecutionPath) {
        self.implementation = source.implementation;
        self.real = source.real.clone();
        self.defined = source.defined;
    }
}

impl<const M: u32, const E: u32> Watch for Shadow<M, E> {
    fn slots(&mut self) -> Vec<&mut dyn Slot> {
        vec![self]
    }
}

impl<const M: u32, const E: u32> fmt::Display for Shadow<M, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.implementation, f)
    }
}

impl<const M: u32, const E: u32> fmt::Debug for Shadow<M, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.defined {
            write!(f, "{} ~ {}", self.implementation, self.real.to_scientific(20))
        } else {
            write!(f, "{} ~ undefined", self.implementation)
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::config::Config;

    #[test]
    fn test_exact_side() {
        let path = ExecutionPath::new(Config::default());
        let tenth = DoubleShadow::from_f64(0.1);
        let sum = tenth.add(&tenth, &path).add(&tenth, &path);
        assert_eq!(sum.implementation().to_f64(), 0.1 + 0.1 + 0.1);
        assert_eq!(sum.real(), &Real::from_f64(0.1).unwrap().mul(&Real::from_i64(3)));
        assert!(sum.relative_error() > 0.0);
        assert!(sum.relative_error() < 1e-15);
    }

    #[test]
    fn test_overflow_is_reported() {
        let path = ExecutionPath::new(Config::default());
        let big = FloatShadow::from_f32(1e20);
        let small = FloatShadow::from_f32(1e-20);
        let quotient = big.div(&small, &path);
        assert!(quotient.implementation().is_infinite());
        assert!(quotient.real().to_f64() > 9e39);
        assert_eq!(quotient.relative_error(), f64::INFINITY);
        assert!(matches!(path.diagnostics().findings()[..], [Finding::NonFinite { .. }]));
        // Operations on the infinity are not reported again.
        quotient.add(&quotient, &path);
        assert_eq!(path.diagnostics().findings().len(), 1);
    }

    #[test]
    fn test_verbose_and_threshold() {
        let config = Config::default().with_verbose(true).with_threshold(1e-10);
        let path = ExecutionPath::new(config);
        let third = FloatShadow::from_i64(1).div(&FloatShadow::from_i64(3), &path);
        assert_eq!(path.diagnostics().compares(), 1);
        let findings = path.diagnostics().findings();
        assert!(matches!(findings[..], [Finding::Threshold { .. }]));
        assert!(third.absolute_error() != 0.0);
        let (error, _) = path.diagnostics().maximal_error().unwrap();
        assert_eq!(error, third.relative_error());
        assert!(error > 1e-9 && error < 1e-7);
    }

    #[test]
    fn test_branch_divergence() {
        let path = ExecutionPath::new(Config::default());
        let big = DoubleShadow::from_f64(1e16);
        let one = DoubleShadow::from_f64(1.0);
        // The native sum absorbs the 1, the exact one does not.
        let difference = big.add(&one, &path).sub(&big, &path);
        assert_eq!(difference.implementation().to_f64(), 0.0);
        assert_eq!(difference.real(), &Real::one());
        let taken = difference.gt(&DoubleShadow::from_f64(0.5), &path);
        assert!(!taken);
        assert!(matches!(
            path.diagnostics().findings()[..],
            [Finding::BranchDivergence {
                implementation: false,
                real: true,
                ..
            }]
        ));
        assert_eq!(path.branch_state(), BranchState::OnlyFloat);
    }

    #[test]
    fn test_domain_findings() {
        let path = ExecutionPath::new(Config::default());
        let minus = DoubleShadow::from_f64(-4.0);
        assert!(minus.sqrt(&path).implementation().is_nan());
        minus.log(&path);
        minus.pow(&DoubleShadow::from_f64(0.5), &path);
        DoubleShadow::from_f64(1.0).div(&DoubleShadow::from_f64(0.0), &path);
        assert!(matches!(
            path.diagnostics().findings()[..],
            [
                Finding::NegativeSqrt { .. },
                Finding::NegativeOrNulLog { .. },
                Finding::NegativePow { .. },
                Finding::DivisionByZero { .. }
            ]
        ));
    }

    #[test]
    fn test_undefined_exact_value() {
        let path = ExecutionPath::new(Config::default().with_threshold(1e-10));
        let minus = DoubleShadow::from_f64(-4.0);
        let root = minus.sqrt(&path);
        assert!(root.implementation().is_nan());
        assert!(!root.is_defined());
        // The last defined exact value, not the native NaN read as zero.
        assert_eq!(root.real(), &Real::from_i64(-4));
        assert!(root.relative_error().is_nan());

        let sum = root.add(&DoubleShadow::from_f64(1.0), &path);
        assert!(!sum.is_defined());
        assert!(!sum.eq(&DoubleShadow::from_f64(0.0), &path));
        assert!(matches!(path.diagnostics().findings()[..], [Finding::NegativeSqrt { .. }]));
        assert_eq!(path.diagnostics().maximal_error(), None);
        assert_eq!(path.branch_state(), BranchState::CompareFlow);
    }

    #[test]
    fn test_min_max_follow_native_values() {
        let path = ExecutionPath::new(Config::default());
        let a = DoubleShadow::from_f64(1.0);
        let b = DoubleShadow::from_f64(2.0);
        let c = DoubleShadow::from_f64(3.0);
        assert_eq!(a.min(&b, &path), a);
        assert_eq!(a.max(&b, &path), b);
        assert_eq!(c.median(&a, &b, &path), b);
        assert_eq!(DoubleShadow::from_f64(-2.5).abs().implementation().to_f64(), 2.5);
    }

    #[test]
    fn test_parse_and_persist() {
        let sink = crate::diagnostics::MemorySink::new();
        let path = ExecutionPath::with_diagnostics(
            Config::default(),
            crate::diagnostics::Diagnostics::with_output(Box::new(sink.clone())),
        );
        let x = DoubleShadow::parse("0.1", &path).unwrap();
        assert_eq!(x.implementation().to_f64(), 0.1);
        assert!(x.relative_error() > 0.0);
        assert!(DoubleShadow::parse("abc", &path).is_err());
        DoubleShadow::from_f64(1.5).persist("x", &path).unwrap();
        x.light_persist("y", &path).unwrap();
        assert_eq!(sink.contents(), "x:\t1.5 (relative error 0e0)\ny:\t0.1\n");
        assert_eq!(x.as_int(), 0);
    }
}
