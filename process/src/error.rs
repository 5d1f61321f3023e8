//! Error types for child processes.

use thiserror::Error;

/// Result type alias for process operations.
pub type Result<T> = std::result::Result<T, ProcessError>;

/// Errors that can occur while driving a child process.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// `start()` was called on a handle that already left `Pending`.
    #[error("cannot start a process more than once")]
    AlreadyStarted,

    /// The shell could not be spawned.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// The termination request could not be delivered.
    #[error("failed to terminate process {pid}: {source}")]
    Terminate { pid: u32, source: std::io::Error },
}
