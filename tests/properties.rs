//! Property-based soundness tests: every real value a program can compute on the
//! given inputs lies inside the abstract value the domains compute.

use fldiag::config::Config;
use fldiag::interval::DoubleInterval;
use fldiag::memory::Mergeable;
use fldiag::path::ExecutionPath;
use fldiag::real::{Real, RoundingMode};
use fldiag::shadow::DoubleShadow;
use fldiag::zonotope::DoubleZonotope;

use proptest::prelude::*;

/// Strategy for bounds `(lower, upper)` with `lower <= upper`.
fn bounds(range: f64) -> impl Strategy<Value = (f64, f64)> {
    (-range..range).prop_flat_map(move |a| (-range..range).prop_map(move |b| (a.min(b), a.max(b))))
}

/// Points of `[lower, upper]`, endpoints included.
fn sample_points(lower: f64, upper: f64, count: usize) -> Vec<f64> {
    if lower == upper {
        return vec![lower];
    }
    (0..=count)
        .map(|i| {
            let t = i as f64 / count as f64;
            (lower + (upper - lower) * t).clamp(lower, upper)
        })
        .collect()
}

/// Strategy for bounds within `[min, max]`, `0 < min`.
fn positive_bounds(min: f64, max: f64) -> impl Strategy<Value = (f64, f64)> {
    (min..max, min..max).prop_map(|(a, b)| (a.min(b), a.max(b)))
}

/// Precision of the reference values; far above the one of a double.
const REFERENCE_BITS: u64 = 200;

/// Both roundings of an exact result, which enclose it.
fn reference<F>(f: F) -> (Real, Real)
where
    F: Fn(RoundingMode) -> Real,
{
    (f(RoundingMode::Down), f(RoundingMode::Up))
}

fn exact(value: f64) -> Real {
    Real::from_f64(value).unwrap()
}

fn interval_contains(x: &DoubleInterval, value: &Real) -> bool {
    x.lower().to_real().map_or(true, |lower| lower <= *value) && x.upper().to_real().map_or(true, |upper| *value <= upper)
}

fn zonotope_contains(x: &DoubleZonotope, value: &Real) -> bool {
    let (lower, upper) = x.range();
    lower.to_real().map_or(true, |lower| lower <= *value) && upper.to_real().map_or(true, |upper| *value <= upper)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Interval addition and multiplication enclose the exact results.
    #[test]
    fn interval_arithmetic_is_sound((a, b) in bounds(1e3), (c, d) in bounds(1e3)) {
        let path = ExecutionPath::new(Config::default());
        let x = DoubleInterval::between(a, b).unwrap();
        let y = DoubleInterval::between(c, d).unwrap();
        let sum = x.add(&y, &path);
        let product = x.mul(&y, &path);

        for p in sample_points(a, b, 6) {
            for q in sample_points(c, d, 6) {
                let (p, q) = (exact(p), exact(q));
                prop_assert!(interval_contains(&sum, &p.add(&q)), "{:?} + {:?} not in {:?}", p, q, sum);
                prop_assert!(interval_contains(&product, &p.mul(&q)), "{:?} * {:?} not in {:?}", p, q, product);
            }
        }
    }

    /// Interval subtraction and division by a range away from zero enclose the exact results.
    #[test]
    fn interval_sub_div_is_sound(
        (a, b) in bounds(1e3),
        (c, d) in positive_bounds(0.5, 1e3),
        negative in any::<bool>(),
    ) {
        let path = ExecutionPath::new(Config::default());
        let (c, d) = if negative { (-d, -c) } else { (c, d) };
        let x = DoubleInterval::between(a, b).unwrap();
        let y = DoubleInterval::between(c, d).unwrap();
        let difference = x.sub(&y, &path);
        let quotient = x.div(&y, &path);
        prop_assert!(path.diagnostics().findings().is_empty());

        for p in sample_points(a, b, 6) {
            for q in sample_points(c, d, 6) {
                let (p, q) = (exact(p), exact(q));
                prop_assert!(interval_contains(&difference, &p.sub(&q)), "{:?} - {:?} not in {:?}", p, q, difference);
                let (down, up) = reference(|mode| p.checked_div(&q, REFERENCE_BITS, mode).unwrap());
                prop_assert!(
                    interval_contains(&quotient, &down) && interval_contains(&quotient, &up),
                    "{:?} / {:?} not in {:?}", p, q, quotient
                );
            }
        }
    }

    /// Zonotope `exp` and `sin` enclose the exact function on the input range.
    #[test]
    fn zonotope_exp_sin_is_sound((a, b) in bounds(10.0)) {
        let path = ExecutionPath::new(Config::default());
        let x = DoubleZonotope::between(a, b, &path).unwrap();
        let exp = x.exp(&path);
        let sin = x.sin(&path);

        for p in sample_points(a, b, 12) {
            let p = exact(p);
            let (down, up) = reference(|mode| p.exp(REFERENCE_BITS, mode));
            prop_assert!(zonotope_contains(&exp, &down) && zonotope_contains(&exp, &up), "exp({:?}) not in {:?}", p, exp);
            let (down, up) = reference(|mode| p.sin(REFERENCE_BITS, mode));
            prop_assert!(zonotope_contains(&sin, &down) && zonotope_contains(&sin, &up), "sin({:?}) not in {:?}", p, sin);
        }
    }

    /// Zonotope `log` and `sqrt` enclose the exact function on a positive range.
    #[test]
    fn zonotope_log_sqrt_is_sound((a, b) in positive_bounds(1e-2, 1e3)) {
        let path = ExecutionPath::new(Config::default());
        let x = DoubleZonotope::between(a, b, &path).unwrap();
        let log = x.log(&path);
        let sqrt = x.sqrt(&path);
        prop_assert!(path.diagnostics().findings().is_empty());

        for p in sample_points(a, b, 12) {
            let p = exact(p);
            let (down, up) = reference(|mode| p.log(REFERENCE_BITS, mode).unwrap());
            prop_assert!(zonotope_contains(&log, &down) && zonotope_contains(&log, &up), "log({:?}) not in {:?}", p, log);
            let (down, up) = reference(|mode| p.sqrt(REFERENCE_BITS, mode).unwrap());
            prop_assert!(zonotope_contains(&sqrt, &down) && zonotope_contains(&sqrt, &up), "sqrt({:?}) not in {:?}", p, sqrt);
        }
    }

    /// `x*x - 3*x` on a zonotope encloses the exact polynomial on the input range.
    #[test]
    fn zonotope_polynomial_is_sound((a, b) in bounds(1e2)) {
        let path = ExecutionPath::new(Config::default());
        let x = DoubleZonotope::between(a, b, &path).unwrap();
        let three = DoubleZonotope::from_f64(3.0, &path);
        let f = x.mul(&x, &path).sub(&three.mul(&x, &path), &path);

        for p in sample_points(a, b, 16) {
            let p = exact(p);
            let value = p.mul(&p).sub(&Real::from_i64(3).mul(&p));
            prop_assert!(zonotope_contains(&f, &value), "f({:?}) = {:?} not in {:?}", p, value, f);
        }
    }

    /// The subtraction of correlated values is not wider than the intervals give.
    #[test]
    fn zonotope_is_tighter_than_interval((a, b) in bounds(1e2)) {
        let path = ExecutionPath::new(Config::default());
        let x = DoubleZonotope::between(a, b, &path).unwrap();
        let y = DoubleZonotope::from_f64(2.0, &path).mul(&x, &path);
        let z = y.sub(&x, &path);

        let hull = y.to_interval().sub(&x.to_interval(), &path);
        let (lower, upper) = z.range();
        prop_assert!(hull.lower() <= lower && upper <= hull.upper(), "{:?} wider than {:?}", z, hull);
    }

    /// Merging two intervals encloses both.
    #[test]
    fn interval_merge_encloses_both((a, b) in bounds(1e6), (c, d) in bounds(1e6)) {
        let path = ExecutionPath::new(Config::default());
        let x = DoubleInterval::between(a, b).unwrap();
        let y = DoubleInterval::between(c, d).unwrap();
        let mut merged = x;
        merged.merge_with(&y, &path);

        prop_assert!(merged.encloses(&x));
        prop_assert!(merged.encloses(&y));
        prop_assert_eq!(merged.implementation(), y.implementation());
    }

    /// Joining two zonotopes encloses both.
    #[test]
    fn zonotope_join_encloses_both((a, b) in bounds(1e3), shift in -1e3f64..1e3) {
        let path = ExecutionPath::new(Config::default());
        let x = DoubleZonotope::between(a, b, &path).unwrap();
        let y = x.add(&DoubleZonotope::from_f64(shift, &path), &path);
        let mut joined = x.clone();
        joined.merge_with(&y, &path);

        prop_assert!(joined.form().encloses(x.form()), "{:?} does not enclose {:?}", joined, x);
        prop_assert!(joined.form().encloses(y.form()), "{:?} does not enclose {:?}", joined, y);
    }

    /// Absorbing noise symbols never shrinks the range of a sum.
    #[test]
    fn absorption_keeps_sums_enclosed(values in prop::collection::vec(bounds(1e2), 2..12)) {
        let wide = ExecutionPath::new(Config::default());
        let narrow = ExecutionPath::new(Config::default().with_limit_symbol_absorption(3));

        let sum = |path: &ExecutionPath| {
            values
                .iter()
                .map(|(a, b)| DoubleZonotope::between(*a, *b, path).unwrap())
                .reduce(|sum, x| sum.add(&x, path))
                .unwrap()
        };
        let (lower, upper) = sum(&wide).range();
        let absorbed = sum(&narrow);
        let (absorbed_lower, absorbed_upper) = absorbed.range();

        prop_assert!(absorbed.form().len() <= 3, "{:?}", absorbed);
        prop_assert!(absorbed_lower <= lower && upper <= absorbed_upper);
    }

    /// The shadow keeps the exact sum while the implementation rounds.
    #[test]
    fn shadow_tracks_exact_sum(a in -1e6f64..1e6, b in -1e6f64..1e6) {
        let path = ExecutionPath::new(Config::default());
        let x = DoubleShadow::from_f64(a);
        let y = DoubleShadow::from_f64(b);
        let sum = x.add(&y, &path);

        prop_assert_eq!(sum.real(), &exact(a).add(&exact(b)));
        prop_assert_eq!(sum.implementation().to_f64(), a + b);
    }
}
