//! # fldiag: floating-point instability diagnosis
//!
//! **`fldiag`** replaces native floating-point values with instrumented ones that track,
//! next to the value the program actually computes, what the exact computation would
//! produce. It reports where rounding errors become significant and where the control
//! flow of the native program may diverge from the control flow of the exact one.
//!
//! ## Domains
//!
//! Every domain keeps the native value (the *implementation*) and adds:
//!
//! - **[`Interval`][crate::interval::Interval]**: bounds enclosing every real value, computed with outward rounding.
//! - **[`Zonotope`][crate::zonotope::Zonotope]**: an affine form over shared noise symbols, which keeps the correlations between values.
//! - **[`Shadow`][crate::shadow::Shadow]**: the exact value, computed with many more bits than the native one.
//!
//! All domains are generic over the format `Float<M, E>` (`M` fraction bits, `E` exponent bits),
//! with aliases for single, double and extended precision.
//!
//! ## Execution paths
//!
//! Domain operations take the [`ExecutionPath`][crate::path::ExecutionPath] of the run.
//! When a comparison between interval or zonotope values cannot be decided, the path either
//! explores both branches (inside a [split scope][crate::path::ExecutionPath::split_scope]) and
//! merges the values at the end of the scope, or follows the native branch and reports
//! the other one.
//!
//! ```rust
//! use fldiag::config::Config;
//! use fldiag::outcome::Outcome;
//! use fldiag::path::ExecutionPath;
//! use fldiag::zonotope::DoubleZonotope;
//!
//! let path = ExecutionPath::new(Config::default());
//! let x = DoubleZonotope::between(0.0, 10.0, &path).unwrap();
//! let half = DoubleZonotope::from_f64(5.0, &path);
//!
//! // y = x < 5 ? x + 5 : x - 5
//! let mut state = (x.clone(),);
//! let outcome = path
//!     .split_scope(&mut state, |path, (y,)| {
//!         if y.lt(&half, path) {
//!             *y = y.add(&half, path);
//!         } else {
//!             *y = y.sub(&half, path);
//!         }
//!         Outcome::Value(())
//!     })
//!     .unwrap();
//! assert!(outcome.is_value());
//!
//! let (lower, upper) = state.0.range();
//! assert!(lower.to_f64() <= 0.0 && upper.to_f64() >= 10.0);
//! ```
//!
//! ## Core Components
//!
//! - **[`real`]** and **[`float`]**: exact reals and correctly rounded floating-point formats.
//! - **[`path`]**: branch decisions, split scopes, unstable loops and branch traces.
//! - **[`diagnostics`]**: the sink collecting findings and persisted values.
//! - **[`config`]**: analysis options and the [`Initialization`][crate::config::Initialization] guard.

pub mod affine;
pub mod cache;
pub mod config;
pub mod diagnostics;
mod elementary;
pub mod error;
pub mod explorer;
pub mod float;
pub mod interval;
pub mod memory;
pub mod outcome;
pub mod path;
pub mod real;
pub mod shadow;
pub mod trace;
pub mod types;
pub mod utils;
pub mod zonotope;
