//! Analysis configuration and the scoped initialization guard.
//!
//! A [`Config`] is set once before the analysed computation starts. [`Initialization`]
//! owns the [`ExecutionPath`] built from it for the whole run and flushes the
//! diagnostics when it goes out of scope.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::diagnostics::Diagnostics;
use crate::error::{Error, PreconditionError};
use crate::path::{ExecutionPath, Mode};
use crate::real::REAL_BITS;

/// Configuration options of an analysis run.
///
/// Use `Config::default()` and the `with_*` methods to adjust it.
///
/// # Examples
///
/// ```
/// use fldiag::config::Config;
///
/// let config = Config::default()
///     .with_unstable_in_loop(true)
///     .with_threshold(1e-6);
/// assert_eq!(config.limit_symbol_absorption, 48);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Treat decimal literals as exact instead of widening them by one ulp (default: false)
    pub support_atomic: bool,
    /// Explore loops whose exit condition is ambiguous iteration by iteration (default: false)
    pub support_unstable_in_loop: bool,
    /// Report the rounding error of every shadow operation (default: false)
    pub support_verbose: bool,
    /// Relative error above which a shadow operation is reported (default: none)
    pub threshold: Option<f64>,
    /// Explore the branch taken by the floating-point flow first (default: false)
    pub support_first_follow_float: bool,
    /// Maximal number of live noise symbols in one affine form (default: 48)
    pub limit_symbol_absorption: usize,
    /// Noise symbols with a smaller id are never absorbed (default: 0)
    pub start_symbol_absorption: u64,
    /// Leave the constant out of the reference magnitude of simplification (default: false)
    pub exclude_constant_from_absorption: bool,
    /// Coefficients below this percentage of the reference magnitude are absorbed (default: none)
    pub simplification_trigger_percent: Option<f64>,
    /// File receiving persisted values and findings (default: none)
    pub result_file: Option<PathBuf>,
    /// Which flows take part in branch decisions (default: both)
    pub mode: Mode,
    /// Precision of the shadow real values, in bits (default: 123)
    pub real_bits: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            support_atomic: false,
            support_unstable_in_loop: false,
            support_verbose: false,
            threshold: None,
            support_first_follow_float: false,
            limit_symbol_absorption: 48,
            start_symbol_absorption: 0,
            exclude_constant_from_absorption: false,
            simplification_trigger_percent: None,
            result_file: None,
            mode: Mode::Both,
            real_bits: REAL_BITS,
        }
    }
}

impl Config {
    pub fn with_atomic(mut self, enabled: bool) -> Self {
        self.support_atomic = enabled;
        self
    }

    pub fn with_unstable_in_loop(mut self, enabled: bool) -> Self {
        self.support_unstable_in_loop = enabled;
        self
    }

    pub fn with_verbose(mut self, enabled: bool) -> Self {
        self.support_verbose = enabled;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_first_follow_float(mut self, enabled: bool) -> Self {
        self.support_first_follow_float = enabled;
        self
    }

    pub fn with_limit_symbol_absorption(mut self, limit: usize) -> Self {
        self.limit_symbol_absorption = limit;
        self
    }

    pub fn with_start_symbol_absorption(mut self, start: u64) -> Self {
        self.start_symbol_absorption = start;
        self
    }

    pub fn with_exclude_constant(mut self, enabled: bool) -> Self {
        self.exclude_constant_from_absorption = enabled;
        self
    }

    pub fn with_simplification_trigger_percent(mut self, percent: f64) -> Self {
        self.simplification_trigger_percent = Some(percent);
        self
    }

    pub fn with_result_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.result_file = Some(path.into());
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_real_bits(mut self, bits: u64) -> Self {
        self.real_bits = bits;
        self
    }

    /// Checks the options against each other.
    pub fn validate(&self) -> Result<(), PreconditionError> {
        if self.limit_symbol_absorption < 2 {
            return Err(PreconditionError::new(format!(
                "symbol absorption limit {} is below 2",
                self.limit_symbol_absorption
            )));
        }
        if let Some(threshold) = self.threshold {
            if threshold.is_nan() || threshold < 0.0 {
                return Err(PreconditionError::new(format!("invalid threshold {}", threshold)));
            }
        }
        if let Some(percent) = self.simplification_trigger_percent {
            if !(0.0..=100.0).contains(&percent) {
                return Err(PreconditionError::new(format!(
                    "simplification trigger {}% is outside [0, 100]",
                    percent
                )));
            }
        }
        if self.real_bits < 24 {
            return Err(PreconditionError::new(format!(
                "shadow precision of {} bits is too small",
                self.real_bits
            )));
        }
        Ok(())
    }
}

/// Scoped analysis resource: set up on `start`, torn down on drop.
pub struct Initialization {
    path: ExecutionPath,
    closed: bool,
}

impl Initialization {
    /// Validates the configuration, opens the result file and builds the execution path.
    pub fn start(config: Config) -> Result<Self, Error> {
        config.validate()?;
        let diagnostics = match &config.result_file {
            Some(file) => {
                info!("Writing results to {}", file.display());
                let out: Box<dyn Write> = Box::new(BufWriter::new(File::create(file)?));
                Diagnostics::with_output(out)
            }
            None => Diagnostics::new(),
        };
        debug!("Initialization::start(config = {:?})", config);
        Ok(Self {
            path: ExecutionPath::with_diagnostics(config, diagnostics),
            closed: false,
        })
    }

    pub fn path(&self) -> &ExecutionPath {
        &self.path
    }

    /// Ends the run, reporting the maximal relative error and flushing the output.
    pub fn finish(mut self) -> Result<(), Error> {
        self.closed = true;
        self.close()
    }

    fn close(&self) -> Result<(), Error> {
        if self.path.config().threshold.is_some() {
            self.path.diagnostics().report_maximal_error()?;
        }
        self.path.diagnostics().flush()?;
        Ok(())
    }
}

impl Drop for Initialization {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(error) = self.close() {
            warn!("Could not flush the diagnostics: {}", error);
        }
    }
}
