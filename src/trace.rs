//! Branch traces for record and replay.
//!
//! A trace is a text file with one decided branch per line:
//!
//! ```text
//! # fldiag branch trace
//! src/main.rs:42	then
//! src/main.rs:57	else
//! ```
//!
//! The location is `<file>:<line>`, separated from the direction by a tab (or any
//! whitespace). Blank lines and lines starting with `#` are ignored.

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, BufRead, Write};

use crate::error::ReadError;
use crate::types::Site;

/// One decided branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub file: String,
    pub line: u32,
    pub taken: bool,
}

impl TraceEntry {
    pub fn new(site: Site, taken: bool) -> Self {
        Self {
            file: site.file().to_string(),
            line: site.line(),
            taken,
        }
    }

    pub fn matches(&self, site: Site) -> bool {
        self.line == site.line() && self.file == site.file()
    }

    fn parse(text: &str, number: usize) -> Result<Self, ReadError> {
        let malformed = |what: &str| ReadError::with_message(format!("line {}: {} in '{}'", number, what, text));
        let (location, direction) = text
            .rsplit_once(char::is_whitespace)
            .map(|(location, direction)| (location.trim_end(), direction))
            .ok_or_else(|| malformed("expected '<file>:<line> <then|else>'"))?;
        let (file, line) = location
            .rsplit_once(':')
            .ok_or_else(|| malformed("missing line number"))?;
        let line = line.parse().map_err(|_| malformed("invalid line number"))?;
        let taken = match direction {
            "then" => true,
            "else" => false,
            _ => return Err(malformed("unknown direction")),
        };
        Ok(Self {
            file: file.to_string(),
            line,
            taken,
        })
    }
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}\t{}",
            self.file,
            self.line,
            if self.taken { "then" } else { "else" }
        )
    }
}

/// Ordered sequence of decided branches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    entries: VecDeque<TraceEntry>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(reader: impl BufRead) -> Result<Self, ReadError> {
        let mut entries = VecDeque::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|error| ReadError::with_message(error.to_string()))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            entries.push_back(TraceEntry::parse(line, index + 1)?);
        }
        Ok(Self { entries })
    }

    pub fn write(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "# fldiag branch trace")?;
        for entry in &self.entries {
            writeln!(out, "{}", entry)?;
        }
        Ok(())
    }

    pub fn push(&mut self, entry: TraceEntry) {
        self.entries.push_back(entry);
    }

    /// Removes and returns the next entry to replay.
    pub fn next_entry(&mut self) -> Option<TraceEntry> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_write_then_read() {
        let mut trace = Trace::new();
        trace.push(TraceEntry::new(Site::new("src/main.rs", 42), true));
        trace.push(TraceEntry::new(Site::new("C:\\work\\prog.rs", 7), false));
        let mut out = Vec::new();
        trace.write(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "# fldiag branch trace\nsrc/main.rs:42\tthen\nC:\\work\\prog.rs:7\telse\n"
        );
        assert_eq!(Trace::read(text.as_bytes()).unwrap(), trace);
    }

    #[test]
    fn test_skips_comments() {
        let trace = Trace::read("\n# comment\n  a.rs:1 then  \n\n".as_bytes()).unwrap();
        assert_eq!(trace.len(), 1);
        assert!(trace.iter().next().unwrap().matches(Site::new("a.rs", 1)));
    }

    #[test]
    fn test_malformed_lines() {
        let error = Trace::read("a.rs:1 then\na.rs:x else\n".as_bytes()).unwrap_err();
        assert!(error.message().unwrap().starts_with("line 2: invalid line number"));
        assert!(Trace::read("a.rs:1 maybe".as_bytes()).is_err());
        assert!(Trace::read("a.rs then".as_bytes()).is_err());
        assert!(Trace::read("a.rs:1".as_bytes()).is_err());
        let spaced = Trace::read("my dir/a.rs:3\tthen".as_bytes()).unwrap();
        assert_eq!(spaced.iter().next().unwrap().file, "my dir/a.rs");
    }

    #[test]
    fn test_replay_order() {
        let mut trace = Trace::read("a.rs:1 then\na.rs:2 else".as_bytes()).unwrap();
        assert_eq!(trace.next_entry().map(|entry| entry.line), Some(1));
        assert_eq!(trace.next_entry().map(|entry| entry.taken), Some(false));
        assert!(trace.next_entry().is_none());
    }
}
