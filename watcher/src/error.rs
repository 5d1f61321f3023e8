//! Error types for the watcher.

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Errors that can occur while watching a path.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Path not found.
    #[error("no such file or directory: {0}")]
    PathNotFound(String),

    /// `start()` was called on a watcher that already left `Pending`.
    #[error("cannot start a watcher more than once")]
    AlreadyStarted,

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
}
