//! Error kinds raised by the engine.

use std::fmt;
use std::io::{self, Write};

/// Malformed external input: a literal, a replay trace or a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadError {
    message: Option<String>,
}

impl ReadError {
    pub fn new() -> Self {
        Self { message: None }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error while reading input file!")?;
        if let Some(message) = &self.message {
            write!(f, " {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ReadError {}

/// Violated precondition of the analysed program or of an engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreconditionError {
    message: String,
}

impl PreconditionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Writes `error: <message>` on its own line.
    pub fn print(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "error: {}", self.message)
    }
}

impl fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {}", self.message)
    }
}

impl std::error::Error for PreconditionError {}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_read_error_display() {
        assert_eq!(ReadError::new().to_string(), "error while reading input file!");
        let error = ReadError::with_message("line 3: unknown direction");
        assert_eq!(
            error.to_string(),
            "error while reading input file! line 3: unknown direction"
        );
        assert_eq!(error.message(), Some("line 3: unknown direction"));
    }

    #[test]
    fn test_precondition_print() {
        let error = PreconditionError::new("negative width");
        let mut out = Vec::new();
        error.print(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "error: negative width\n");
    }

    #[test]
    fn test_conversions() {
        let error: Error = ReadError::with_message("bad").into();
        assert!(matches!(error, Error::Read(_)));
        let error: Error = PreconditionError::new("bad").into();
        assert_eq!(error.to_string(), "error: bad");
    }
}
