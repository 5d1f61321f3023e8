//! Error types for the runtime.

use relaunch_parser::ParseError;
use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors raised while preparing or driving the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The argument line is malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The argument line names no commands.
    #[error("nothing to run")]
    NothingToRun,

    /// A watch path does not exist.
    #[error("no such file or directory: {0}")]
    PathNotFound(String),

    /// A watch path could not be made absolute.
    #[error("failed to resolve {path}: {source}")]
    Resolve {
        path: String,
        source: std::io::Error,
    },

    /// `start()` was called on a runtime that already left `Pending`.
    #[error("a runtime can only be started once")]
    AlreadyStarted,
}
