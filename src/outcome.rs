//! Result of a computation that may turn out to be infeasible.

/// Either a value, or the statement that the current path cannot happen.
///
/// Infeasibility arises when an `assume` contradicts the current abstraction or when
/// every alternative of a split scope is unreachable. The caller abandons the path,
/// which makes the enclosing scope skip it when merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T> {
    Value(T),
    Unreachable,
}

impl<T> Outcome<T> {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Outcome::Unreachable)
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }

    pub fn value(self) -> Option<T> {
        match self {
            Outcome::Value(value) => Some(value),
            Outcome::Unreachable => None,
        }
    }

    pub fn as_ref(&self) -> Outcome<&T> {
        match self {
            Outcome::Value(value) => Outcome::Value(value),
            Outcome::Unreachable => Outcome::Unreachable,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Value(value) => Outcome::Value(f(value)),
            Outcome::Unreachable => Outcome::Unreachable,
        }
    }

    pub fn and_then<U, F: FnOnce(T) -> Outcome<U>>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Value(value) => f(value),
            Outcome::Unreachable => Outcome::Unreachable,
        }
    }
}

impl<T> From<Option<T>> for Outcome<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Outcome::Value(value),
            None => Outcome::Unreachable,
        }
    }
}

impl<T> From<Outcome<T>> for Option<T> {
    fn from(outcome: Outcome<T>) -> Self {
        outcome.value()
    }
}
