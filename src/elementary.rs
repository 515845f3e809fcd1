//! Fixed-point kernels for the transcendental functions of [`Real`].
//!
//! A kernel evaluates its function on integers scaled by `2^g` (with `g` a little
//! above the requested working precision `w`) and returns the approximation together
//! with the exponent of an upper bound on its absolute error. [`evaluate`] raises the
//! working precision until the approximation has enough significant bits to be
//! rounded, which handles cancellation (`sin` near `pi`, `log` near 1, ...).

use std::cell::RefCell;

use log::debug;
use num_bigint::{BigInt, Sign};
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::cache::Cache;
use crate::real::{Real, RoundingMode};
use crate::utils::{pairing2, PerfectHash};

const MAX_WORKING_BITS: u64 = 1 << 16;

/// Number of argument halvings before the exponential series.
const EXP_HALVINGS: u64 = 8;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Constant {
    Pi,
    Ln2,
    Ln10,
}

struct ConstantKey(Constant, u64);

impl PerfectHash for ConstantKey {
    fn hash(&self) -> u64 {
        pairing2(self.0 as u64, self.1)
    }
}

thread_local! {
    static CONSTANTS: RefCell<Cache<ConstantKey, BigInt>> = RefCell::new(Cache::new(6));
}

/// Rounds the output of `kernel` once it is significant enough.
pub(crate) fn evaluate<F>(precision: u64, mode: RoundingMode, kernel: F) -> Real
where
    F: Fn(u64) -> (Real, i64),
{
    let mut working = precision + 32;
    loop {
        let (approximation, error) = kernel(working);
        let significant = approximation
            .top_exponent()
            .is_some_and(|top| top - error >= precision as i64 + 8);
        if significant || working >= MAX_WORKING_BITS {
            return approximation.round(precision, mode);
        }
        debug!("evaluate: raising working precision above {} bits", working);
        working *= 2;
    }
}

fn unit(g: u64) -> BigInt {
    BigInt::one() << g
}

/// `x * 2^g`, truncated toward zero.
fn to_fixed(x: &Real, g: u64) -> BigInt {
    let shift = x.exponent() + g as i64;
    let magnitude = if shift >= 0 {
        x.mantissa() << shift as u64
    } else {
        x.mantissa() >> (-shift) as u64
    };
    let sign = if x.is_negative() { Sign::Minus } else { Sign::Plus };
    BigInt::from_biguint(sign, magnitude)
}

fn from_fixed(value: &BigInt, g: u64) -> Real {
    Real::from_parts(value.sign() == Sign::Minus, value.magnitude().clone(), -(g as i64))
}

fn mul(a: &BigInt, b: &BigInt, g: u64) -> BigInt {
    (a * b) >> g
}

fn div(a: &BigInt, b: &BigInt, g: u64) -> BigInt {
    (a << g) / b
}

fn sqrt(a: &BigInt, g: u64) -> BigInt {
    BigInt::from_biguint(Sign::Plus, (a.magnitude() << g).sqrt())
}

/// Floor of `a / b` for a positive `b`.
fn floor_div(a: &BigInt, b: &BigInt) -> BigInt {
    let quotient = a / b;
    if (a - &quotient * b).is_negative() {
        quotient - 1u32
    } else {
        quotient
    }
}

fn bit_length(value: u64) -> i64 {
    64 - value.leading_zeros() as i64
}

fn constant(which: Constant, g: u64) -> BigInt {
    CONSTANTS.with(|cache| {
        let key = ConstantKey(which, g);
        if let Some(value) = cache.borrow().get(&key) {
            return value.clone();
        }
        let value = match which {
            Constant::Pi => compute_pi(g),
            Constant::Ln2 => compute_ln2(g),
            Constant::Ln10 => compute_ln10(g),
        };
        let mut cache = cache.borrow_mut();
        cache.insert(&key, value.clone());
        debug!("constant({:?}, {} bits): {:?}", which, g, cache);
        value
    })
}

/// `atan(1/n)` (or `atanh(1/n)` when `hyperbolic`).
fn arc_inverse(n: u64, g: u64, hyperbolic: bool) -> BigInt {
    let n = BigInt::from(n);
    let n2 = &n * &n;
    let mut power = unit(g) / &n;
    let mut sum = BigInt::zero();
    let mut k = 0u64;
    while !power.is_zero() {
        let term = &power / (2 * k + 1);
        if hyperbolic || k % 2 == 0 {
            sum += term;
        } else {
            sum -= term;
        }
        power /= &n2;
        k += 1;
    }
    sum
}

// Machin: pi = 16 atan(1/5) - 4 atan(1/239)
fn compute_pi(g: u64) -> BigInt {
    let h = g + 16;
    (arc_inverse(5, h, false) * 16u32 - arc_inverse(239, h, false) * 4u32) >> 16u32
}

// ln 2 = 2 atanh(1/3)
fn compute_ln2(g: u64) -> BigInt {
    let h = g + 16;
    (arc_inverse(3, h, true) * 2u32) >> 16u32
}

// ln 10 = 3 ln 2 + 2 atanh(1/9)
fn compute_ln10(g: u64) -> BigInt {
    let h = g + 16;
    (constant(Constant::Ln2, h) * 3u32 + arc_inverse(9, h, true) * 2u32) >> 16u32
}

pub(crate) fn pi(w: u64) -> (Real, i64) {
    let g = w + 16;
    (from_fixed(&constant(Constant::Pi, g), g), -(w as i64))
}

pub(crate) fn exp(x: &Real, w: u64) -> (Real, i64) {
    let limit = Real::pow2(50);
    let x = if *x > limit {
        limit
    } else if *x < -&limit {
        -limit
    } else {
        x.clone()
    };
    let magnitude = x.top_exponent().map_or(0, |top| top.max(0) as u64 + 1);
    let g = w + magnitude + 32;
    let fixed = to_fixed(&x, g);
    let ln2 = constant(Constant::Ln2, g);
    let k = floor_div(&(&fixed * 2u32 + &ln2), &(&ln2 * 2u32));
    let reduced = (&fixed - &k * &ln2) >> EXP_HALVINGS;

    let mut sum = unit(g);
    let mut term = unit(g);
    let mut i = 1u64;
    loop {
        term = mul(&term, &reduced, g) / i;
        if term.is_zero() {
            break;
        }
        sum += &term;
        i += 1;
    }
    for _ in 0..EXP_HALVINGS {
        sum = mul(&sum, &sum, g);
    }
    let k = k.to_i64().unwrap_or(0);
    (from_fixed(&sum, g).shifted(k), k - w as i64)
}

/// `atanh(u)` for a small `u`.
fn atanh_series(u: &BigInt, g: u64) -> BigInt {
    let u2 = mul(u, u, g);
    let mut sum = u.clone();
    let mut power = u.clone();
    let mut k = 1u64;
    loop {
        power = mul(&power, &u2, g);
        if power.is_zero() {
            break;
        }
        k += 2;
        sum += &power / k;
    }
    sum
}

/// Natural logarithm of a positive `x`, and the bit length of its binary exponent.
fn log_fixed(x: &Real, g: u64) -> (BigInt, i64) {
    let mut binary = x.top_exponent().unwrap_or(0);
    let mut fraction = x.shifted(-binary);
    // Keep the fraction in [1/sqrt(2), sqrt(2)) so that the series converges fast.
    if fraction.mul(&fraction) > Real::from_i64(2) {
        binary += 1;
        fraction = fraction.shifted(-1);
    }
    let one = unit(g);
    let fixed = to_fixed(&fraction, g);
    let u = div(&(&fixed - &one), &(&fixed + &one), g);
    let value = atanh_series(&u, g) * 2u32 + constant(Constant::Ln2, g) * binary;
    (value, bit_length(binary.unsigned_abs()))
}

pub(crate) fn log(x: &Real, w: u64) -> (Real, i64) {
    let g = w + 32;
    let (value, binary_bits) = log_fixed(x, g);
    (from_fixed(&value, g), binary_bits + 6 - g as i64)
}

pub(crate) fn log10(x: &Real, w: u64) -> (Real, i64) {
    let g = w + 32;
    let (value, binary_bits) = log_fixed(x, g);
    let value = div(&value, &constant(Constant::Ln10, g), g);
    (from_fixed(&value, g), binary_bits + 6 - g as i64)
}

/// Reduces `x` modulo `pi/2`: returns the remainder and the quadrant.
fn reduce_quadrant(x: &Real, w: u64) -> (BigInt, u64, u64) {
    let magnitude = x.top_exponent().map_or(0, |top| top.max(0) as u64 + 1);
    let g = w + magnitude + 32;
    let fixed = to_fixed(x, g);
    let half_pi = constant(Constant::Pi, g) >> 1u32;
    let k = floor_div(&(&fixed * 2u32 + &half_pi), &(&half_pi * 2u32));
    let reduced = &fixed - &k * &half_pi;
    let quadrant = (k % 4u32 + 4u32) % 4u32;
    (reduced, quadrant.to_u64().unwrap_or(0), g)
}

fn sin_cos_series(r: &BigInt, g: u64) -> (BigInt, BigInt) {
    let r2 = mul(r, r, g);

    let mut sin = r.clone();
    let mut term = r.clone();
    let mut i = 1u64;
    loop {
        term = -mul(&term, &r2, g) / ((i + 1) * (i + 2));
        if term.is_zero() {
            break;
        }
        sin += &term;
        i += 2;
    }

    let mut cos = unit(g);
    let mut term = unit(g);
    let mut i = 0u64;
    loop {
        term = -mul(&term, &r2, g) / ((i + 1) * (i + 2));
        if term.is_zero() {
            break;
        }
        cos += &term;
        i += 2;
    }
    (sin, cos)
}

pub(crate) fn sin(x: &Real, w: u64) -> (Real, i64) {
    let (reduced, quadrant, g) = reduce_quadrant(x, w);
    let (s, c) = sin_cos_series(&reduced, g);
    let value = match quadrant {
        0 => s,
        1 => c,
        2 => -s,
        _ => -c,
    };
    (from_fixed(&value, g), -(w as i64) - 24)
}

pub(crate) fn cos(x: &Real, w: u64) -> (Real, i64) {
    let (reduced, quadrant, g) = reduce_quadrant(x, w);
    let (s, c) = sin_cos_series(&reduced, g);
    let value = match quadrant {
        0 => c,
        1 => -s,
        2 => -c,
        _ => s,
    };
    (from_fixed(&value, g), -(w as i64) - 24)
}

pub(crate) fn tan(x: &Real, w: u64) -> (Real, i64) {
    let (reduced, quadrant, g) = reduce_quadrant(x, w);
    let (s, c) = sin_cos_series(&reduced, g);
    let (numerator, denominator) = if quadrant % 2 == 0 { (s, c) } else { (-c, s) };
    if denominator.is_zero() {
        return (Real::zero(), 0);
    }
    // The error is amplified by the square of the inverse denominator.
    let scale = (g as i64 - denominator.bits() as i64).max(0);
    let value = div(&numerator, &denominator, g);
    (from_fixed(&value, g), -(w as i64) - 22 + 2 * scale)
}

fn atan_fixed(a: &BigInt, g: u64) -> BigInt {
    let one = unit(g);
    let negative = a.is_negative();
    let mut a = a.abs();
    let inverted = a > one;
    if inverted {
        a = div(&one, &a, g);
    }
    // atan(a) = 2 atan(a / (1 + sqrt(1 + a^2))), applied twice.
    for _ in 0..2 {
        let root = sqrt(&(&one + mul(&a, &a, g)), g);
        a = div(&a, &(&one + root), g);
    }
    let a2 = mul(&a, &a, g);
    let mut sum = a.clone();
    let mut power = a;
    let mut k = 1u64;
    loop {
        power = mul(&power, &a2, g);
        if power.is_zero() {
            break;
        }
        k += 2;
        let term = &power / k;
        if (k / 2) % 2 == 1 {
            sum -= term;
        } else {
            sum += term;
        }
    }
    let mut result = sum << 2u32;
    if inverted {
        result = (constant(Constant::Pi, g) >> 1u32) - result;
    }
    if negative {
        -result
    } else {
        result
    }
}

pub(crate) fn atan(x: &Real, w: u64) -> (Real, i64) {
    let g = w + 32;
    let value = atan_fixed(&to_fixed(x, g), g);
    (from_fixed(&value, g), 12 - g as i64)
}

fn asin_fixed(x: &Real, g: u64) -> BigInt {
    // asin(x) = 2 atan(x / (1 + sqrt(1 - x^2))); 1 - x^2 is exact.
    let complement = Real::one().sub(&x.mul(x));
    let root = BigInt::from_biguint(Sign::Plus, to_fixed(&complement, 2 * g).magnitude().sqrt());
    let quotient = div(&to_fixed(x, g), &(unit(g) + root), g);
    atan_fixed(&quotient, g) * 2u32
}

pub(crate) fn asin(x: &Real, w: u64) -> (Real, i64) {
    let g = w + 32;
    (from_fixed(&asin_fixed(x, g), g), 12 - g as i64)
}

pub(crate) fn acos(x: &Real, w: u64) -> (Real, i64) {
    let g = w + 32;
    let value = (constant(Constant::Pi, g) >> 1u32) - asin_fixed(x, g);
    (from_fixed(&value, g), 12 - g as i64)
}

pub(crate) fn atan2(y: &Real, x: &Real, w: u64) -> (Real, i64) {
    let g = w + 32;
    let pi = constant(Constant::Pi, g);
    let value = if x.is_zero() {
        if y.is_negative() {
            -(pi >> 1u32)
        } else {
            pi >> 1u32
        }
    } else {
        let ratio = y.div_odd(x, g + 8);
        let angle = atan_fixed(&to_fixed(&ratio, g), g);
        match (x.is_negative(), y.is_negative()) {
            (false, _) => angle,
            (true, true) => angle - pi,
            (true, false) => angle + pi,
        }
    };
    (from_fixed(&value, g), 12 - g as i64)
}

/// `x^y` for a positive `x`, as `exp(y * log(x))`.
pub(crate) fn pow(x: &Real, y: &Real, w: u64) -> (Real, i64) {
    let exponent_bits = y.top_exponent().map_or(0, |top| top.max(0) as u64 + 1);
    let g = w + exponent_bits + 32;
    let (logarithm, binary_bits) = log_fixed(x, g);
    let product = from_fixed(&logarithm, g).mul(y);
    let product_error = exponent_bits as i64 + binary_bits + 6 - g as i64;
    let (value, _) = exp(&product, w + 8);
    let top = value.top_exponent().unwrap_or(0);
    (value, top + 2 + product_error.max(-(w as i64)))
}
