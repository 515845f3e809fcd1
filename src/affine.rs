//! Affine forms over noise symbols.
//!
//! A [`LinearForm`] denotes `c0 + c1*e1 + ... + cn*en` where every noise symbol `ei`
//! ranges over `[-1, 1]` and is shared by all forms of a run. Coefficients are stored
//! in the target format; operations compute every coefficient exactly, round it to
//! nearest and gather the rounding errors of the whole operation into one fresh symbol.
//!
//! # Invariants
//!
//! - A finite form has finite coefficients and no zero coefficient.
//! - A form with a non-finite constant stands for every real value.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use log::debug;

use crate::float::Float;
use crate::path::ExecutionPath;
use crate::real::{Real, RoundingMode};
use crate::types::NoiseSymbol;

/// Sum of absolute rounding errors made while building a form.
struct ErrorSum(Real);

impl ErrorSum {
    fn round<const M: u32, const E: u32>(&mut self, exact: &Real) -> Option<Float<M, E>> {
        let rounded = Float::from_real(exact, RoundingMode::NearestEven);
        if !rounded.is_finite() {
            return None;
        }
        self.0 = self.0.add(&exact.sub(&rounded.finite_value()).abs());
        Some(rounded)
    }
}

#[derive(Clone, PartialEq)]
pub struct LinearForm<const M: u32, const E: u32> {
    constant: Float<M, E>,
    terms: BTreeMap<NoiseSymbol, Float<M, E>>,
}

impl<const M: u32, const E: u32> LinearForm<M, E> {
    /// A form without noise symbols.
    pub fn constant(value: Float<M, E>) -> Self {
        Self {
            constant: value,
            terms: BTreeMap::new(),
        }
    }

    /// The form standing for every real value.
    pub fn unbounded() -> Self {
        Self::constant(Float::nan())
    }

    /// An enclosure of `value`, with a fresh symbol when it is not representable.
    pub fn from_real(value: &Real, path: &ExecutionPath) -> Self {
        Self::combine(&[], value, &Real::zero(), path)
    }

    /// `center + radius * e` for a fresh symbol `e`, enclosing `[lower, upper]`.
    pub fn from_range(lower: &Real, upper: &Real, path: &ExecutionPath) -> Self {
        let center = lower.add(upper).shifted(-1);
        let radius = upper.sub(lower).shifted(-1).abs();
        Self::combine(&[], &center, &radius, path)
    }

    /// Like [`LinearForm::from_range`], unbounded when a bound is not finite.
    pub fn from_bounds(lower: Float<M, E>, upper: Float<M, E>, path: &ExecutionPath) -> Self {
        match (lower.to_real(), upper.to_real()) {
            (Some(lower), Some(upper)) => Self::from_range(&lower, &upper, path),
            _ => Self::unbounded(),
        }
    }

    pub fn center(&self) -> Float<M, E> {
        self.constant
    }

    pub fn coefficient(&self, symbol: NoiseSymbol) -> Option<Float<M, E>> {
        self.terms.get(&symbol).copied()
    }

    pub fn terms(&self) -> impl Iterator<Item = (NoiseSymbol, Float<M, E>)> + '_ {
        self.terms.iter().map(|(symbol, coefficient)| (*symbol, *coefficient))
    }

    /// Number of noise symbols.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.constant.is_finite()
    }

    /// Exact sum of the magnitudes of the coefficients.
    pub fn radius(&self) -> Real {
        self.terms
            .values()
            .fold(Real::zero(), |sum, coefficient| sum.add(&coefficient.finite_value().abs()))
    }

    /// Exact bounds, `None` when the form is unbounded.
    pub fn bounds(&self) -> Option<(Real, Real)> {
        let center = self.constant.to_real()?;
        let radius = self.radius();
        Some((center.sub(&radius), center.add(&radius)))
    }

    /// Bounds rounded outward.
    pub fn range(&self) -> (Float<M, E>, Float<M, E>) {
        match self.bounds() {
            Some((lower, upper)) => (
                Float::from_real(&lower, RoundingMode::Down),
                Float::from_real(&upper, RoundingMode::Up),
            ),
            None => (Float::infinity(true), Float::infinity(false)),
        }
    }

    /// Exact bounds of `self - other`.
    pub fn difference_bounds(&self, other: &Self) -> Option<(Real, Real)> {
        let center = self.constant.to_real()?.sub(&other.constant.to_real()?);
        let mut radius = Real::zero();
        for (symbol, coefficient) in &self.terms {
            let paired = other.terms.get(symbol).map_or_else(Real::zero, |c| c.finite_value());
            radius = radius.add(&coefficient.finite_value().sub(&paired).abs());
        }
        for (symbol, coefficient) in &other.terms {
            if !self.terms.contains_key(symbol) {
                radius = radius.add(&coefficient.finite_value().abs());
            }
        }
        Some((center.sub(&radius), center.add(&radius)))
    }

    /// Value of the form for the given values of its symbols.
    pub fn evaluate<F>(&self, assignment: F) -> Option<Real>
    where
        F: Fn(NoiseSymbol) -> Real,
    {
        let constant = self.constant.to_real()?;
        Some(self.terms.iter().fold(constant, |sum, (symbol, coefficient)| {
            sum.add(&coefficient.finite_value().mul(&assignment(*symbol)))
        }))
    }

    /// `sum(factor_i * form_i) + constant + error * e` for a fresh `e`, where `e` also
    /// carries the rounding errors of the result.
    pub fn combine(parts: &[(&Self, Real)], constant: &Real, error: &Real, path: &ExecutionPath) -> Self {
        if parts.iter().any(|(form, _)| !form.is_finite()) {
            return Self::unbounded();
        }
        match Self::try_combine(parts, constant, error, path) {
            Some(form) => form,
            None => {
                debug!("combine: coefficient overflow");
                Self::unbounded()
            }
        }
    }

    fn try_combine(parts: &[(&Self, Real)], constant: &Real, error: &Real, path: &ExecutionPath) -> Option<Self> {
        let mut exact_constant = constant.clone();
        let mut exact: BTreeMap<NoiseSymbol, Real> = BTreeMap::new();
        for (form, factor) in parts {
            exact_constant = exact_constant.add(&form.constant.finite_value().mul(factor));
            for (symbol, coefficient) in &form.terms {
                let entry = exact.entry(*symbol).or_insert_with(Real::zero);
                *entry = entry.add(&coefficient.finite_value().mul(factor));
            }
        }

        let mut errors = ErrorSum(error.abs());
        let constant = errors.round(&exact_constant)?;
        let mut terms = BTreeMap::new();
        for (symbol, coefficient) in &exact {
            if coefficient.is_zero() {
                continue;
            }
            let rounded = errors.round(coefficient)?;
            if !rounded.is_zero() {
                terms.insert(*symbol, rounded);
            }
        }
        let mut form = Self { constant, terms };
        form.add_error(&errors.0, path)?;
        form.absorb(path);
        Some(form)
    }

    /// Adds `error * e` for a fresh symbol `e`.
    fn add_error(&mut self, error: &Real, path: &ExecutionPath) -> Option<()> {
        if error.is_zero() {
            return Some(());
        }
        let coefficient = Float::from_real(error, RoundingMode::Up);
        if !coefficient.is_finite() {
            return None;
        }
        self.terms.insert(path.fresh_symbol(), coefficient);
        Some(())
    }

    pub fn neg(&self) -> Self {
        Self {
            constant: -self.constant,
            terms: self.terms.iter().map(|(symbol, c)| (*symbol, -*c)).collect(),
        }
    }

    pub fn add(&self, other: &Self, path: &ExecutionPath) -> Self {
        Self::combine(&[(self, Real::one()), (other, Real::one())], &Real::zero(), &Real::zero(), path)
    }

    pub fn sub(&self, other: &Self, path: &ExecutionPath) -> Self {
        Self::combine(&[(self, Real::one()), (other, -Real::one())], &Real::zero(), &Real::zero(), path)
    }

    pub fn scale(&self, factor: &Real, path: &ExecutionPath) -> Self {
        Self::combine(&[(self, factor.clone())], &Real::zero(), &Real::zero(), path)
    }

    /// Product; the quadratic part is bounded by the product of the radii.
    pub fn mul(&self, other: &Self, path: &ExecutionPath) -> Self {
        if !self.is_finite() || !other.is_finite() {
            return Self::unbounded();
        }
        let x = self.constant.finite_value();
        let y = other.constant.finite_value();
        let remainder = self.radius().mul(&other.radius());
        Self::combine(&[(self, y.clone()), (other, x.clone())], &-x.mul(&y), &remainder, path)
    }

    /// Replaces `symbols` by one fresh symbol whose coefficient is the sum of their magnitudes.
    fn replace_symbols(&mut self, symbols: &[NoiseSymbol], path: &ExecutionPath) {
        let mut total = Real::zero();
        for symbol in symbols {
            if let Some(coefficient) = self.terms.remove(symbol) {
                total = total.add(&coefficient.finite_value().abs());
            }
        }
        debug!("replace_symbols({} symbols)", symbols.len());
        if self.add_error(&total, path).is_none() {
            *self = Self::unbounded();
        }
    }

    /// Symbols eligible for absorption, smallest magnitude first and oldest first on ties.
    fn absorbable(&self, path: &ExecutionPath) -> Vec<NoiseSymbol> {
        let start = path.config().start_symbol_absorption;
        let mut candidates: Vec<_> = self
            .terms
            .iter()
            .filter(|(symbol, _)| symbol.id() >= start)
            .map(|(symbol, coefficient)| (*symbol, coefficient.abs()))
            .collect();
        candidates.sort_by(|(a, x), (b, y)| x.partial_cmp(y).unwrap_or(Ordering::Equal).then(a.cmp(b)));
        candidates.into_iter().map(|(symbol, _)| symbol).collect()
    }

    /// Keeps at most `limit_symbol_absorption` symbols.
    pub fn absorb(&mut self, path: &ExecutionPath) {
        let limit = path.config().limit_symbol_absorption;
        if self.terms.len() <= limit {
            return;
        }
        let excess = self.terms.len() + 1 - limit;
        let mut candidates = self.absorbable(path);
        candidates.truncate(excess);
        if candidates.len() < 2 {
            return;
        }
        debug!("absorb: {} symbols over the limit {}", self.terms.len() - limit, limit);
        self.replace_symbols(&candidates, path);
    }

    /// Absorbs the symbols whose magnitude is at most `percent` % of the magnitude of
    /// the form (its radius, plus its constant unless constants are excluded).
    pub fn simplify(&mut self, percent: f64, path: &ExecutionPath) {
        let percent = match Real::from_f64(percent) {
            Some(percent) if self.is_finite() => percent,
            _ => return,
        };
        let mut reference = self.radius();
        if !path.config().exclude_constant_from_absorption {
            reference = reference.add(&self.constant.finite_value().abs());
        }
        let bound = reference.mul(&percent);
        let hundred = Real::from_i64(100);
        let small: Vec<_> = self
            .absorbable(path)
            .into_iter()
            .filter(|symbol| {
                self.terms
                    .get(symbol)
                    .map_or(false, |c| c.finite_value().abs().mul(&hundred) <= bound)
            })
            .collect();
        if small.len() >= 2 {
            self.replace_symbols(&small, path);
        }
    }

    /// A form enclosing both `self` and `other`: the coefficients they share with the
    /// same sign keep their smaller magnitude, and one fresh symbol covers the rest.
    pub fn join(&self, other: &Self, path: &ExecutionPath) -> Self {
        if !self.is_finite() || !other.is_finite() {
            return Self::unbounded();
        }
        if self == other {
            return self.clone();
        }
        let mut common = BTreeMap::new();
        for (symbol, a) in &self.terms {
            if let Some(b) = other.terms.get(symbol) {
                if a.is_sign_negative() == b.is_sign_negative() {
                    common.insert(*symbol, if a.abs() <= b.abs() { *a } else { *b });
                }
            }
        }
        let residual = |form: &Self| {
            let radius = form.terms.iter().fold(Real::zero(), |sum, (symbol, c)| {
                let shared = common.get(symbol).map_or_else(Real::zero, |s: &Float<M, E>| s.finite_value());
                sum.add(&c.finite_value().sub(&shared).abs())
            });
            let center = form.constant.finite_value();
            (center.sub(&radius), center.add(&radius))
        };
        let (low, high) = residual(self);
        let (other_low, other_high) = residual(other);
        let lower = low.min(other_low);
        let upper = high.max(other_high);

        let mut errors = ErrorSum(upper.sub(&lower).shifted(-1));
        let joined = errors.round(&lower.add(&upper).shifted(-1)).and_then(|constant| {
            let mut form = Self { constant, terms: common };
            form.add_error(&errors.0, path)?;
            Some(form)
        });
        joined.unwrap_or_else(Self::unbounded)
    }

    /// Whether every value of `other` is a value of `self`, comparing ranges.
    pub fn encloses(&self, other: &Self) -> bool {
        match (self.bounds(), other.bounds()) {
            (_, None) => !self.is_finite(),
            (None, Some(_)) => true,
            (Some((a, b)), Some((c, d))) => a <= c && d <= b,
        }
    }
}

impl<const M: u32, const E: u32> fmt::Display for LinearForm<M, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.constant)?;
        for (symbol, coefficient) in &self.terms {
            if coefficient.is_sign_negative() {
                write!(f, " - {}*{}", coefficient.abs(), symbol)?;
            } else {
                write!(f, " + {}*{}", coefficient, symbol)?;
            }
        }
        Ok(())
    }
}

impl<const M: u32, const E: u32> fmt::Debug for LinearForm<M, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinearForm({})", self)
    }
}
