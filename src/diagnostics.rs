//! Diagnostics sink: numerical findings, persisted values and the maximal relative error.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info, warn};

use crate::types::Site;

/// Something the analysis observed about the diagnosed program.
///
/// Findings are never errors: they are recorded and the computation continues.
#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    /// A divisor may be zero.
    DivisionByZero { site: Site },
    /// The argument of a square root may be negative.
    NegativeSqrt { site: Site },
    /// A possibly negative base is raised to a non-integer power.
    NegativePow { site: Site },
    /// The argument of a logarithm may be negative or zero.
    NegativeOrNulLog { site: Site },
    /// An ambiguous branch was decided without exploring the alternative.
    UnstableBranch { site: Site, taken: bool },
    /// The exact flow takes another branch than the floating-point flow.
    BranchDivergence {
        site: Site,
        implementation: bool,
        real: bool,
    },
    /// Rounding error of one operation (verbose mode). Counted and written, not kept.
    Compare { site: Site, diff: f64 },
    /// Relative error above the configured threshold.
    Threshold { site: Site, relative_error: f64 },
    /// The floating-point result is infinite or NaN while the exact one is finite.
    NonFinite { site: Site },
    /// A replayed trace expects a branch at `expected` but the program branches at `site`.
    TraceMismatch { site: Site, expected: String },
}

impl Finding {
    pub fn site(&self) -> Site {
        match self {
            Finding::DivisionByZero { site }
            | Finding::NegativeSqrt { site }
            | Finding::NegativePow { site }
            | Finding::NegativeOrNulLog { site }
            | Finding::UnstableBranch { site, .. }
            | Finding::BranchDivergence { site, .. }
            | Finding::Compare { site, .. }
            | Finding::Threshold { site, .. }
            | Finding::NonFinite { site }
            | Finding::TraceMismatch { site, .. } => *site,
        }
    }

    /// Whether the finding points at a numerical problem rather than at a trace event.
    pub fn is_problem(&self) -> bool {
        !matches!(self, Finding::Compare { .. } | Finding::UnstableBranch { .. })
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::DivisionByZero { site } => write!(f, "{}: division by zero", site),
            Finding::NegativeSqrt { site } => write!(f, "{}: square root of a negative value", site),
            Finding::NegativePow { site } => {
                write!(f, "{}: negative value raised to a non-integer power", site)
            }
            Finding::NegativeOrNulLog { site } => {
                write!(f, "{}: logarithm of a negative or null value", site)
            }
            Finding::UnstableBranch { site, taken } => write!(
                f,
                "{}: unstable branch, only the {} branch is followed",
                site,
                if *taken { "then" } else { "else" }
            ),
            Finding::BranchDivergence {
                site,
                implementation,
                real,
            } => write!(
                f,
                "{}: branch divergence, float goes to {} and real to {}",
                site, implementation, real
            ),
            Finding::Compare { site, diff } => write!(f, "{}: diff = {:e}", site, diff),
            Finding::Threshold { site, relative_error } => write!(
                f,
                "{}: relative error {:e} exceeds the threshold",
                site, relative_error
            ),
            Finding::NonFinite { site } => write!(f, "{}: non-finite float for a finite real", site),
            Finding::TraceMismatch { site, expected } => {
                write!(f, "{}: trace expects a branch at {}, replay stopped", site, expected)
            }
        }
    }
}

/// In-memory output, shared between the sink and its reader.
#[derive(Debug, Clone, Default)]
pub struct MemorySink(Rc<RefCell<Vec<u8>>>);

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Receives findings and persisted values during an analysis run.
pub struct Diagnostics {
    out: RefCell<Option<Box<dyn Write>>>,
    findings: RefCell<Vec<Finding>>,
    compares: Cell<usize>,
    maximal_error: Cell<Option<(f64, Site)>>,
}

impl Diagnostics {
    /// A sink that only logs and keeps the findings in memory.
    pub fn new() -> Self {
        Self {
            out: RefCell::new(None),
            findings: RefCell::new(Vec::new()),
            compares: Cell::new(0),
            maximal_error: Cell::new(None),
        }
    }

    /// A sink that also writes every line to `out`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        let diagnostics = Self::new();
        *diagnostics.out.borrow_mut() = Some(out);
        diagnostics
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        match self.out.borrow_mut().as_mut() {
            Some(out) => writeln!(out, "{}", line),
            None => Ok(()),
        }
    }

    /// Logs and writes `finding`. Verbose [`Finding::Compare`] entries are only
    /// counted, one per operation would grow without bound.
    pub fn record(&self, finding: Finding) {
        if finding.is_problem() {
            warn!("{}", finding);
        } else {
            info!("{}", finding);
        }
        if let Err(error) = self.write_line(&finding.to_string()) {
            warn!("Could not write finding: {}", error);
        }
        if let Finding::Compare { .. } = finding {
            self.compares.set(self.compares.get() + 1);
        } else {
            self.findings.borrow_mut().push(finding);
        }
    }

    /// Number of [`Finding::Compare`] entries recorded.
    pub fn compares(&self) -> usize {
        self.compares.get()
    }

    pub fn findings(&self) -> Vec<Finding> {
        self.findings.borrow().clone()
    }

    pub fn count<P: Fn(&Finding) -> bool>(&self, predicate: P) -> usize {
        self.findings.borrow().iter().filter(|finding| predicate(finding)).count()
    }

    pub fn clear(&self) {
        self.findings.borrow_mut().clear();
        self.compares.set(0);
        self.maximal_error.set(None);
    }

    /// Writes `<prefix>:\t<value>`.
    pub fn persist(&self, prefix: &str, value: impl fmt::Display) -> io::Result<()> {
        let line = format!("{}:\t{}", prefix, value);
        info!("{}", line);
        self.write_line(&line)
    }

    /// Keeps the largest relative error seen so far.
    pub fn update_maximal_error(&self, site: Site, relative_error: f64) {
        let larger = match self.maximal_error.get() {
            None => true,
            Some((current, _)) => relative_error > current,
        };
        if larger {
            debug!("update_maximal_error(site = {}, relative_error = {:e})", site, relative_error);
            self.maximal_error.set(Some((relative_error, site)));
        }
    }

    pub fn maximal_error(&self) -> Option<(f64, Site)> {
        self.maximal_error.get()
    }

    pub fn report_maximal_error(&self) -> io::Result<()> {
        match self.maximal_error.get() {
            Some((error, site)) => self.persist("maximal relative error", format!("{:e} at {}", error, site)),
            None => self.persist("maximal relative error", 0.0),
        }
    }

    pub fn flush(&self) -> io::Result<()> {
        match self.out.borrow_mut().as_mut() {
            Some(out) => out.flush(),
            None => Ok(()),
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("has_output", &self.out.borrow().is_some())
            .field("findings", &self.findings.borrow().len())
            .field("compares", &self.compares.get())
            .field("maximal_error", &self.maximal_error.get())
            .finish()
    }
}
