//! Error types for the argument parser.

use thiserror::Error;

/// Result type alias for parser operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Errors raised while tokenizing an argument line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A `]` appeared with no open `[` before it.
    #[error("invalid argument: unmatched ']' at offset {offset}")]
    UnmatchedClose { offset: usize },

    /// The line ended with brackets still open.
    #[error("invalid argument: {open} unclosed '['")]
    Unclosed { open: usize },
}
