//! The execution path: branch decisions, split scopes and unstable loops.
//!
//! Every domain operation receives the [`ExecutionPath`] of the run. When an abstract
//! comparison cannot be decided, [`ExecutionPath::decide`] picks a side: inside a split
//! scope the innermost [`PathExplorer`] enumerates both sides over successive runs of
//! the scope body, outside of any scope the floating-point side is followed (or a
//! recorded trace is replayed) and the unexplored side is reported.
//!
//! # Examples
//!
//! ```
//! use fldiag::config::Config;
//! use fldiag::interval::DoubleInterval;
//! use fldiag::outcome::Outcome;
//! use fldiag::path::ExecutionPath;
//!
//! let path = ExecutionPath::new(Config::default());
//! let x = DoubleInterval::between(0.0, 10.0).unwrap();
//! let five = DoubleInterval::from_f64(5.0);
//!
//! let outcome = path
//!     .split_scope(&mut (x.clone(),), |path, (y,)| {
//!         if y.lt(&five, path) {
//!             *y = y.add(&five, path);
//!         }
//!         Outcome::Value(())
//!     })
//!     .unwrap();
//! assert!(outcome.is_value());
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::io::{BufRead, Write};

use log::debug;

use crate::config::Config;
use crate::diagnostics::{Diagnostics, Finding};
use crate::error::{Error, ReadError};
use crate::explorer::PathExplorer;
use crate::memory::{MergeMemory, SaveMemory, Watch};
use crate::outcome::Outcome;
use crate::trace::{Trace, TraceEntry};
use crate::types::{NoiseSymbol, Site};

/// Which flows take part in a branch decision.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum Mode {
    /// Every outcome of the real values and the floating-point outcome.
    #[default]
    Both,
    /// Only the outcomes of the real values.
    RealOnly,
    /// Only the floating-point outcome.
    ImplementationOnly,
}

/// Relation between the followed flow and the floating-point flow.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum BranchState {
    /// Both flows agree so far.
    #[default]
    CompareFlow,
    /// The exact flow diverged; execution follows the floating-point flow.
    OnlyFloat,
    /// Execution follows a real outcome the floating-point flow does not take.
    OnlyReal,
}

/// Context of one analysis run.
pub struct ExecutionPath {
    config: Config,
    explorers: RefCell<Vec<PathExplorer>>,
    next_symbol: Cell<u64>,
    follow_flow: Cell<bool>,
    replay: RefCell<Trace>,
    recorded: RefCell<Trace>,
    sync_site: Cell<Option<Site>>,
    source_line: Cell<Option<Site>>,
    branch_state: Cell<BranchState>,
    diagnostics: Diagnostics,
    pending_error: RefCell<Option<ReadError>>,
}

impl ExecutionPath {
    pub fn new(config: Config) -> Self {
        Self::with_diagnostics(config, Diagnostics::new())
    }

    pub fn with_diagnostics(config: Config, diagnostics: Diagnostics) -> Self {
        Self {
            config,
            explorers: RefCell::new(Vec::new()),
            next_symbol: Cell::new(1),
            follow_flow: Cell::new(false),
            replay: RefCell::new(Trace::new()),
            recorded: RefCell::new(Trace::new()),
            sync_site: Cell::new(None),
            source_line: Cell::new(None),
            branch_state: Cell::new(BranchState::CompareFlow),
            diagnostics,
            pending_error: RefCell::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Mode of the innermost split scope, or the configured one.
    pub fn mode(&self) -> Mode {
        self.explorers
            .borrow()
            .last()
            .map(|explorer| explorer.mode())
            .unwrap_or(self.config.mode)
    }

    /// Number of nested split scopes.
    pub fn depth(&self) -> usize {
        self.explorers.borrow().len()
    }

    pub fn is_exploring(&self) -> bool {
        self.depth() > 0
    }

    pub fn branch_state(&self) -> BranchState {
        self.branch_state.get()
    }

    pub(crate) fn set_branch_state(&self, state: BranchState) {
        self.branch_state.set(state);
    }

    /// Allocates a noise symbol never used before in this run.
    pub fn fresh_symbol(&self) -> NoiseSymbol {
        let id = self.next_symbol.get();
        self.next_symbol.set(id + 1);
        NoiseSymbol::new(id)
    }

    /// Overrides the site attached to subsequent findings.
    pub fn set_source_line(&self, site: Option<Site>) {
        self.source_line.set(site);
    }

    /// The overriding source line if any, `fallback` otherwise.
    pub fn current_site(&self, fallback: Site) -> Site {
        self.source_line.get().unwrap_or(fallback)
    }

    /// Site of the last split point inside the innermost scope.
    pub fn sync_site(&self) -> Option<Site> {
        self.sync_site.get()
    }

    pub(crate) fn notify(&self, finding: Finding) {
        self.diagnostics.record(finding);
    }

    pub fn notify_division_by_zero(&self, site: Site) {
        self.notify(Finding::DivisionByZero {
            site: self.current_site(site),
        });
    }

    pub fn notify_negative_sqrt(&self, site: Site) {
        self.notify(Finding::NegativeSqrt {
            site: self.current_site(site),
        });
    }

    pub fn notify_negative_pow(&self, site: Site) {
        self.notify(Finding::NegativePow {
            site: self.current_site(site),
        });
    }

    pub fn notify_negative_or_nul_log(&self, site: Site) {
        self.notify(Finding::NegativeOrNulLog {
            site: self.current_site(site),
        });
    }

    /// Decides a comparison.
    ///
    /// `can_true` and `can_false` are the outcomes reachable by the real values,
    /// `implementation` is the outcome of the floating-point values.
    pub fn decide(&self, site: Site, can_true: bool, can_false: bool, implementation: bool) -> bool {
        let (then_candidate, else_candidate) = match self.mode() {
            Mode::RealOnly => (can_true, can_false),
            Mode::ImplementationOnly => (implementation, !implementation),
            Mode::Both => (can_true || implementation, can_false || !implementation),
        };
        let taken = if then_candidate != else_candidate {
            then_candidate
        } else if !then_candidate {
            // Nothing reachable (NaN bounds): the floating-point flow is all there is.
            implementation
        } else {
            self.decide_ambiguous(site, implementation)
        };
        if taken != implementation {
            self.branch_state.set(BranchState::OnlyReal);
        }
        taken
    }

    fn decide_ambiguous(&self, site: Site, implementation: bool) -> bool {
        let first = if self.config.support_first_follow_float {
            implementation
        } else {
            true
        };
        let explored = self.explorers.borrow_mut().last_mut().map(|explorer| explorer.choose(first));
        if let Some(taken) = explored {
            debug!("decide(site = {}): explored branch {}", site, taken);
            return taken;
        }
        if self.follow_flow.get() {
            if let Some(taken) = self.replay_decision(site) {
                return taken;
            }
        }
        self.notify(Finding::UnstableBranch {
            site: self.current_site(site),
            taken: implementation,
        });
        self.recorded.borrow_mut().push(TraceEntry::new(site, implementation));
        implementation
    }

    fn replay_decision(&self, site: Site) -> Option<bool> {
        let entry = self.replay.borrow_mut().next_entry();
        match entry {
            Some(entry) if entry.matches(site) => {
                debug!("decide(site = {}): replayed branch {}", site, entry.taken);
                let taken = entry.taken;
                self.recorded.borrow_mut().push(entry);
                Some(taken)
            }
            Some(entry) => {
                let expected = format!("{}:{}", entry.file, entry.line);
                let error = ReadError::with_message(format!(
                    "trace expects a branch at {} but the program branches at {}",
                    expected, site
                ));
                self.notify(Finding::TraceMismatch {
                    site: self.current_site(site),
                    expected,
                });
                *self.pending_error.borrow_mut() = Some(error);
                self.follow_flow.set(false);
                None
            }
            None => {
                debug!("decide(site = {}): trace exhausted", site);
                self.follow_flow.set(false);
                None
            }
        }
    }

    /// Marks a split point. Only meaningful inside a split scope.
    pub fn split_branches(&self, site: Site) {
        if self.is_exploring() {
            debug!("split_branches(site = {})", site);
            self.sync_site.set(Some(site));
        }
    }

    /// Runs `alternative` once per combination of ambiguous decisions, restoring the
    /// watched values between runs.
    fn explore<S, F>(&self, mode: Mode, site: Site, state: &mut S, mut alternative: F) -> Result<(), Error>
    where
        S: Watch + ?Sized,
        F: FnMut(&Self, &mut S) -> Result<(), Error>,
    {
        let saved = SaveMemory::capture(state);
        let follow_flow = self.follow_flow.replace(false);
        let branch_state = self.branch_state.get();
        let sync_site = self.sync_site.replace(None);
        self.explorers.borrow_mut().push(PathExplorer::new(mode, site));
        debug!("explore(site = {}, mode = {:?}): depth {}", site, mode, self.depth());

        let result = loop {
            if let Err(error) = alternative(self, state) {
                break Err(error);
            }
            let more = self
                .explorers
                .borrow_mut()
                .last_mut()
                .map_or(false, |explorer| explorer.next_alternative());
            if !more {
                break Ok(());
            }
            self.branch_state.set(branch_state);
            if let Err(error) = saved.restore(state) {
                break Err(error.into());
            }
        };

        let explorer = self.explorers.borrow_mut().pop();
        assert!(explorer.is_some(), "Unbalanced split scopes");
        if let Some(explorer) = explorer {
            debug!("explore(site = {}): {} alternatives", site, explorer.alternatives());
        }
        self.follow_flow.set(follow_flow);
        self.branch_state.set(branch_state);
        self.sync_site.set(sync_site);
        result
    }

    /// Runs `body` under a split scope with the current mode.
    ///
    /// See [`ExecutionPath::split_scope_with`].
    #[track_caller]
    pub fn split_scope<S, F>(&self, state: &mut S, body: F) -> Result<Outcome<()>, Error>
    where
        S: Watch + ?Sized,
        F: FnMut(&Self, &mut S) -> Outcome<()>,
    {
        self.split_scope_with(self.mode(), Site::caller(), state, body)
    }

    /// Runs `body` once per alternative of the ambiguous branches it meets.
    ///
    /// Each run starts from the values `state` had on entry. The values of the runs
    /// that complete are merged back into `state`. Runs returning
    /// [`Outcome::Unreachable`] do not contribute; if no run completes, the result
    /// is [`Outcome::Unreachable`] and `state` is left unspecified.
    pub fn split_scope_with<S, F>(&self, mode: Mode, site: Site, state: &mut S, mut body: F) -> Result<Outcome<()>, Error>
    where
        S: Watch + ?Sized,
        F: FnMut(&Self, &mut S) -> Outcome<()>,
    {
        let mut merged = MergeMemory::new();
        self.explore(mode, site, state, |path, state| {
            match body(path, state) {
                Outcome::Value(()) => {
                    let follows = path.branch_state() != BranchState::OnlyReal;
                    merged.absorb(path, state, follows)?;
                }
                Outcome::Unreachable => debug!("split_scope(site = {}): unreachable alternative", site),
            }
            Ok(())
        })?;
        if merged.is_empty() {
            return Ok(Outcome::Unreachable);
        }
        merged.store_into(state)?;
        Ok(Outcome::Value(()))
    }

    /// Runs a loop whose exit condition may be ambiguous.
    ///
    /// `body` runs one iteration and returns whether the loop continues. With
    /// `support_unstable_in_loop`, every iteration is a split scope: alternatives
    /// that leave the loop are merged into the result, those that continue are
    /// merged into the state of the next iteration. Otherwise this is a plain loop
    /// and ambiguous exits follow the usual decision rule.
    #[track_caller]
    pub fn unstable_loop<S, F>(&self, state: &mut S, mut body: F) -> Result<Outcome<()>, Error>
    where
        S: Watch + ?Sized,
        F: FnMut(&Self, &mut S) -> Outcome<bool>,
    {
        let site = Site::caller();
        if !self.config.support_unstable_in_loop {
            loop {
                match body(self, state) {
                    Outcome::Value(true) => {}
                    Outcome::Value(false) => return Ok(Outcome::Value(())),
                    Outcome::Unreachable => return Ok(Outcome::Unreachable),
                }
            }
        }

        let mode = self.mode();
        let mut exits = MergeMemory::new();
        let mut iterations = 0usize;
        loop {
            let mut continues = MergeMemory::new();
            self.explore(mode, site, state, |path, state| {
                let follows = |path: &Self| path.branch_state() != BranchState::OnlyReal;
                match body(path, state) {
                    Outcome::Value(true) => {
                        continues.absorb(path, state, follows(path))?;
                    }
                    Outcome::Value(false) => {
                        exits.absorb(path, state, follows(path))?;
                    }
                    Outcome::Unreachable => debug!("unstable_loop(site = {}): unreachable alternative", site),
                }
                Ok(())
            })?;
            iterations += 1;
            if continues.is_empty() {
                break;
            }
            continues.store_into(state)?;
        }
        debug!("unstable_loop(site = {}): left after {} iterations", site, iterations);
        if exits.is_empty() {
            return Ok(Outcome::Unreachable);
        }
        exits.store_into(state)?;
        Ok(Outcome::Value(()))
    }

    /// Loads a trace to replay with [`ExecutionPath::set_follow_flow`].
    pub fn load_trace(&self, reader: impl BufRead) -> Result<(), Error> {
        let trace = Trace::read(reader)?;
        debug!("load_trace: {} decisions", trace.len());
        *self.replay.borrow_mut() = trace;
        Ok(())
    }

    pub fn set_follow_flow(&self) {
        self.follow_flow.set(true);
    }

    pub fn clear_follow_flow(&self) {
        self.follow_flow.set(false);
    }

    pub fn does_follow_flow(&self) -> bool {
        self.follow_flow.get()
    }

    /// The ambiguous decisions taken outside of split scopes so far.
    pub fn recorded_trace(&self) -> Trace {
        self.recorded.borrow().clone()
    }

    /// Writes the ambiguous decisions taken so far, in the format read by `load_trace`.
    pub fn write_current_path(&self, out: &mut impl Write) -> Result<(), Error> {
        self.recorded.borrow().write(out)?;
        Ok(())
    }

    /// Takes the replay error raised since the last call, if any.
    pub fn take_error(&self) -> Option<ReadError> {
        self.pending_error.borrow_mut().take()
    }
}

impl fmt::Debug for ExecutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionPath")
            .field("mode", &self.mode())
            .field("depth", &self.depth())
            .field("next_symbol", &self.next_symbol.get())
            .field("follow_flow", &self.follow_flow.get())
            .field("branch_state", &self.branch_state.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::diagnostics::MemorySink;
    use crate::memory::Mergeable;

    /// Toy domain: a set of possible integers, ambiguous when it holds several.
    #[derive(Debug, Clone, PartialEq)]
    struct Values(Vec<i32>);

    impl Values {
        #[track_caller]
        fn is_positive(&self, path: &ExecutionPath) -> bool {
            let can_true = self.0.iter().any(|&v| v > 0);
            let can_false = self.0.iter().any(|&v| v <= 0);
            path.decide(Site::caller(), can_true, can_false, self.0[0] > 0)
        }
    }

    impl Mergeable for Values {
        fn merge_with(&mut self, source: &Self, _path: &ExecutionPath) {
            let mut values = source.0.clone();
            for v in &self.0 {
                if !values.contains(v) {
                    values.push(*v);
                }
            }
            self.0 = values;
        }
    }

    fn site() -> Site {
        Site::new("test.rs", 1)
    }

    #[test]
    fn test_decided_comparisons_need_no_scope() {
        let path = ExecutionPath::new(Config::default());
        assert!(path.decide(site(), true, false, true));
        assert!(!path.decide(site(), false, true, false));
        assert!(path.diagnostics().findings().is_empty());
        assert_eq!(path.branch_state(), BranchState::CompareFlow);
    }

    #[test]
    fn test_unexplored_branch_is_reported() {
        let path = ExecutionPath::new(Config::default());
        assert!(!path.decide(site(), true, true, false));
        assert_eq!(
            path.diagnostics().findings(),
            vec![Finding::UnstableBranch { site: site(), taken: false }]
        );
        assert_eq!(path.recorded_trace().len(), 1);
    }

    #[test]
    fn test_symbols_past_u32_range() {
        let path = ExecutionPath::new(Config::default());
        path.next_symbol.set(u64::from(u32::MAX));
        let a = path.fresh_symbol();
        let b = path.fresh_symbol();
        assert_eq!(a.id(), u64::from(u32::MAX));
        assert!(a < b);
        assert_eq!(b.to_string(), "e4294967296");
    }

    #[test]
    fn test_replay_mismatch_is_recorded() {
        let sink = MemorySink::new();
        let path = ExecutionPath::with_diagnostics(Config::default(), Diagnostics::with_output(Box::new(sink.clone())));
        path.load_trace("other.rs:9\tthen\n".as_bytes()).unwrap();
        path.set_follow_flow();

        assert!(!path.decide(site(), true, true, false));
        assert!(path.take_error().is_some());
        assert_eq!(
            path.diagnostics().findings(),
            vec![
                Finding::TraceMismatch {
                    site: site(),
                    expected: "other.rs:9".to_string(),
                },
                Finding::UnstableBranch { site: site(), taken: false },
            ]
        );
        assert_eq!(
            sink.contents(),
            "test.rs:1: trace expects a branch at other.rs:9, replay stopped\n\
             test.rs:1: unstable branch, only the else branch is followed\n"
        );
    }

    #[test]
    fn test_modes() {
        let real = ExecutionPath::new(Config::default().with_mode(Mode::RealOnly));
        // The float says true, but no real value does.
        assert!(!real.decide(site(), false, true, true));
        assert_eq!(real.branch_state(), BranchState::OnlyReal);
        let float = ExecutionPath::new(Config::default().with_mode(Mode::ImplementationOnly));
        assert!(float.decide(site(), true, true, true));
        assert!(float.diagnostics().findings().is_empty());
    }

    #[test]
    fn test_split_scope_explores_both_sides() {
        let path = ExecutionPath::new(Config::default());
        let mut state = (Values(vec![-2, 3]),);
        let mut runs = 0;
        let outcome = path
            .split_scope(&mut state, |path, (x,)| {
                runs += 1;
                let doubled = if x.is_positive(path) { 2 } else { -2 };
                x.0 = vec![doubled * x.0[0]];
                Outcome::Value(())
            })
            .unwrap();
        assert_eq!(outcome, Outcome::Value(()));
        assert_eq!(runs, 2);
        // The then side is explored first; the else side is the floating-point flow.
        assert_eq!(state.0 .0, vec![4, -4]);
        assert_eq!(path.depth(), 0);
        assert!(path.diagnostics().findings().is_empty());
    }

    #[test]
    fn test_first_follow_float() {
        let path = ExecutionPath::new(Config::default().with_first_follow_float(true));
        let mut order = Vec::new();
        let outcome = path
            .split_scope(&mut (), |path, _| {
                order.push(path.decide(site(), true, true, false));
                Outcome::Value(())
            })
            .unwrap();
        assert!(outcome.is_value());
        assert_eq!(order, vec![false, true]);
    }

    #[test]
    fn test_unreachable_alternative_is_dropped() {
        let path = ExecutionPath::new(Config::default());
        let mut state = (Values(vec![-1, 1]),);
        let outcome = path
            .split_scope(&mut state, |path, (x,)| {
                if x.is_positive(path) {
                    return Outcome::Unreachable;
                }
                x.0 = vec![0];
                Outcome::Value(())
            })
            .unwrap();
        assert!(outcome.is_value());
        assert_eq!(state.0 .0, vec![0]);

        let outcome = path
            .split_scope(&mut state, |_, _| Outcome::Unreachable)
            .unwrap();
        assert!(outcome.is_unreachable());
    }

    #[test]
    fn test_nested_scopes() {
        let path = ExecutionPath::new(Config::default());
        let mut runs = 0;
        let outcome = path
            .split_scope(&mut (), |path, _| {
                path.decide(site(), true, true, true);
                path.split_scope(&mut (), |path, _| {
                    assert_eq!(path.depth(), 2);
                    path.decide(site(), true, true, true);
                    runs += 1;
                    Outcome::Value(())
                })
                .unwrap()
            })
            .unwrap();
        assert!(outcome.is_value());
        assert_eq!(runs, 4);
    }

    #[test]
    fn test_plain_loop_without_support() {
        let path = ExecutionPath::new(Config::default());
        let mut state = (Values(vec![0]),);
        let outcome = path
            .unstable_loop(&mut state, |_, (x,)| {
                x.0[0] += 1;
                Outcome::Value(x.0[0] < 5)
            })
            .unwrap();
        assert!(outcome.is_value());
        assert_eq!(state.0 .0, vec![5]);
    }

    #[test]
    fn test_unstable_loop_merges_exits() {
        let path = ExecutionPath::new(Config::default().with_unstable_in_loop(true));
        // Counts down every candidate; the loop exits per candidate at a different time.
        let mut state = (Values(vec![1, 3]),);
        let outcome = path
            .unstable_loop(&mut state, |path, (x,)| {
                if x.is_positive(path) {
                    x.0 = x.0.iter().map(|v| v - 1).collect();
                    Outcome::Value(true)
                } else {
                    Outcome::Value(false)
                }
            })
            .unwrap();
        assert!(outcome.is_value());
        let mut values = state.0 .0.clone();
        values.sort();
        assert!(values.contains(&0));
        assert!(path.diagnostics().findings().is_empty());
    }

    #[test]
    fn test_replay_trace() {
        let path = ExecutionPath::new(Config::default());
        path.load_trace("test.rs:1\tthen\ntest.rs:1\telse\n".as_bytes()).unwrap();
        path.set_follow_flow();
        assert!(path.decide(site(), true, true, false));
        assert_eq!(path.branch_state(), BranchState::OnlyReal);
        assert!(!path.decide(site(), true, true, true));
        assert!(path.does_follow_flow());
        // Exhausted: back to the floating-point flow.
        assert!(path.decide(site(), true, true, true));
        assert!(!path.does_follow_flow());
        assert!(path.take_error().is_none());

        let mut out = Vec::new();
        path.write_current_path(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "# fldiag branch trace\ntest.rs:1\tthen\ntest.rs:1\telse\ntest.rs:1\tthen\n");
    }

    #[test]
    fn test_replay_mismatch() {
        let path = ExecutionPath::new(Config::default());
        path.load_trace("other.rs:9 then".as_bytes()).unwrap();
        path.set_follow_flow();
        assert!(!path.decide(site(), true, true, false));
        assert!(!path.does_follow_flow());
        let error = path.take_error().unwrap();
        assert!(error.message().unwrap().contains("other.rs:9"));
        assert!(path.take_error().is_none());
    }

    #[test]
    fn test_bad_trace() {
        let path = ExecutionPath::new(Config::default());
        assert!(matches!(path.load_trace("garbage".as_bytes()), Err(Error::Read(_))));
    }

    #[test]
    fn test_fresh_symbols_are_increasing() {
        let path = ExecutionPath::new(Config::default());
        let a = path.fresh_symbol();
        let b = path.fresh_symbol();
        assert!(a < b);
    }
}
