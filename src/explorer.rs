//! Depth-first enumeration of the alternatives of a split scope.
//!
//! A [`PathExplorer`] records the binary decisions taken while running the body of a
//! split scope once. After the run, [`PathExplorer::next_alternative`] flips the
//! deepest decision that still has an unexplored side and discards the decisions
//! below it; the next run replays the kept prefix and extends it. When no decision
//! can be flipped, every alternative has been explored.

use std::fmt;

use log::debug;

use crate::path::Mode;
use crate::types::Site;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Decision {
    taken: bool,
    has_alternative: bool,
}

pub struct PathExplorer {
    mode: Mode,
    site: Site,
    decisions: Vec<Decision>,
    cursor: usize,
    alternatives: usize,
}

impl PathExplorer {
    pub fn new(mode: Mode, site: Site) -> Self {
        Self {
            mode,
            site,
            decisions: Vec::new(),
            cursor: 0,
            alternatives: 1,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn site(&self) -> Site {
        self.site
    }

    /// Number of alternatives started so far.
    pub fn alternatives(&self) -> usize {
        self.alternatives
    }

    /// Number of decisions in the current alternative.
    pub fn depth(&self) -> usize {
        self.decisions.len()
    }

    /// Decides an ambiguous branch: replays the recorded prefix, or opens a new
    /// decision starting with `first`.
    pub fn choose(&mut self, first: bool) -> bool {
        let taken = if let Some(decision) = self.decisions.get(self.cursor) {
            decision.taken
        } else {
            self.decisions.push(Decision {
                taken: first,
                has_alternative: true,
            });
            first
        };
        self.cursor += 1;
        taken
    }

    /// Moves to the next unexplored alternative. Returns false once all are done.
    pub fn next_alternative(&mut self) -> bool {
        self.cursor = 0;
        while let Some(last) = self.decisions.last_mut() {
            if last.has_alternative {
                last.taken = !last.taken;
                last.has_alternative = false;
                self.alternatives += 1;
                debug!(
                    "next_alternative(site = {}): alternative {} at depth {}",
                    self.site,
                    self.alternatives,
                    self.decisions.len()
                );
                return true;
            }
            self.decisions.pop();
        }
        false
    }

    /// Whether recorded decisions remain to be replayed in the current run.
    pub fn is_replaying(&self) -> bool {
        self.cursor < self.decisions.len()
    }
}

impl fmt::Debug for PathExplorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathExplorer")
            .field("mode", &self.mode)
            .field("site", &self.site)
            .field("depth", &self.decisions.len())
            .field("cursor", &self.cursor)
            .field("alternatives", &self.alternatives)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn explorer() -> PathExplorer {
        PathExplorer::new(Mode::Both, Site::new("test.rs", 1))
    }

    #[test]
    fn test_no_decision() {
        let mut explorer = explorer();
        assert!(!explorer.next_alternative());
        assert_eq!(explorer.alternatives(), 1);
    }

    #[test]
    fn test_single_decision() {
        let mut explorer = explorer();
        assert!(explorer.choose(true));
        assert!(explorer.next_alternative());
        assert!(!explorer.choose(true));
        assert!(!explorer.next_alternative());
    }

    #[test]
    fn test_enumerates_all_paths() {
        // Two nested decisions in every run: four paths.
        let mut explorer = explorer();
        let mut paths = Vec::new();
        loop {
            let a = explorer.choose(true);
            let b = explorer.choose(false);
            paths.push((a, b));
            if !explorer.next_alternative() {
                break;
            }
        }
        assert_eq!(paths, vec![(true, false), (true, true), (false, false), (false, true)]);
        assert_eq!(explorer.alternatives(), 4);
    }

    #[test]
    fn test_uneven_tree() {
        // The second decision only happens on the then side of the first.
        let mut explorer = explorer();
        let mut count = 0;
        loop {
            if explorer.choose(true) {
                explorer.choose(true);
            }
            count += 1;
            if !explorer.next_alternative() {
                break;
            }
        }
        assert_eq!(count, 3);
    }
}
