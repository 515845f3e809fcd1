//! Type-safe wrappers for noise symbols, source sites and comparison operators.
//!
//! Noise symbols index the error terms of affine forms, and sites identify the
//! source location of a branch, which is what replay traces are keyed on.

use std::fmt;
use std::panic::Location;

/// Identifier of an affine noise symbol `e_i` ranging over `[-1, 1]`.
///
/// Symbols are allocated in increasing order by the execution path, so a smaller
/// id always denotes an older symbol.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NoiseSymbol(u64);

impl NoiseSymbol {
    pub fn new(id: u64) -> Self {
        NoiseSymbol(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NoiseSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl From<NoiseSymbol> for u64 {
    fn from(symbol: NoiseSymbol) -> Self {
        symbol.0
    }
}

/// A source location: the file and line of a branch or of an unstable scope.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Site {
    file: &'static str,
    line: u32,
}

impl Site {
    pub const fn new(file: &'static str, line: u32) -> Self {
        Site { file, line }
    }

    /// The location of the caller (through any chain of `#[track_caller]` functions).
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Site::new(location.file(), location.line())
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A comparison operator between two values.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Comparison {
    Less,
    LessOrEqual,
    Equal,
    NotEqual,
    GreaterOrEqual,
    Greater,
}

impl Comparison {
    /// The operator with swapped operands: `a op b` iff `b op.swap() a`.
    pub fn swap(self) -> Self {
        match self {
            Comparison::Less => Comparison::Greater,
            Comparison::LessOrEqual => Comparison::GreaterOrEqual,
            Comparison::Equal => Comparison::Equal,
            Comparison::NotEqual => Comparison::NotEqual,
            Comparison::GreaterOrEqual => Comparison::LessOrEqual,
            Comparison::Greater => Comparison::Less,
        }
    }

    /// The logical negation (ignoring unordered operands).
    pub fn negate(self) -> Self {
        match self {
            Comparison::Less => Comparison::GreaterOrEqual,
            Comparison::LessOrEqual => Comparison::Greater,
            Comparison::Equal => Comparison::NotEqual,
            Comparison::NotEqual => Comparison::Equal,
            Comparison::GreaterOrEqual => Comparison::Less,
            Comparison::Greater => Comparison::LessOrEqual,
        }
    }

    pub fn evaluate<T: PartialOrd + ?Sized>(self, a: &T, b: &T) -> bool {
        match self {
            Comparison::Less => a < b,
            Comparison::LessOrEqual => a <= b,
            Comparison::Equal => a == b,
            Comparison::NotEqual => a != b,
            Comparison::GreaterOrEqual => a >= b,
            Comparison::Greater => a > b,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Comparison::Less => "<",
            Comparison::LessOrEqual => "<=",
            Comparison::Equal => "==",
            Comparison::NotEqual => "!=",
            Comparison::GreaterOrEqual => ">=",
            Comparison::Greater => ">",
        };
        write!(f, "{}", symbol)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_symbol_order() {
        let a = NoiseSymbol::new(1);
        let b = NoiseSymbol::new(7);
        assert!(a < b);
        assert_eq!(b.to_string(), "e7");
        assert_eq!(u64::from(b), 7);
    }

    #[track_caller]
    fn here() -> Site {
        Site::caller()
    }

    #[test]
    fn test_caller_site() {
        let line = line!() + 1;
        let site = here();
        assert_eq!(site.line(), line);
        assert!(site.file().ends_with("types.rs"));
        assert_eq!(Site::new("a.rs", 3).to_string(), "a.rs:3");
    }

    #[test]
    fn test_comparison() {
        assert!(Comparison::Less.evaluate(&1.0, &2.0));
        assert!(!Comparison::Less.evaluate(&f64::NAN, &2.0));
        assert!(Comparison::NotEqual.evaluate(&f64::NAN, &f64::NAN));
        assert_eq!(Comparison::LessOrEqual.swap(), Comparison::GreaterOrEqual);
        assert_eq!(Comparison::Less.negate(), Comparison::GreaterOrEqual);
        assert_eq!(Comparison::Equal.to_string(), "==");
    }
}
