//! The parsed argument line.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Watch path used when the argument line names none.
pub const DEFAULT_PATH: &str = ".";

/// Debounce window applied to every watched path.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Paths to watch and commands to run, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    /// Watch paths in the order given. Never empty once parsed.
    pub paths: Vec<String>,

    /// Raw shell text of each bracketed command, in order.
    pub commands: Vec<String>,

    /// Debounce window for the watchers.
    pub timeout: Duration,
}

impl Argument {
    /// Create an argument watching [`DEFAULT_PATH`] with no commands.
    pub fn new() -> Self {
        Self {
            paths: vec![DEFAULT_PATH.to_string()],
            commands: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replace the watch paths.
    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Append a command.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    /// Set the debounce window.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether there is anything to run.
    pub fn has_commands(&self) -> bool {
        !self.commands.is_empty()
    }
}

impl Default for Argument {
    fn default() -> Self {
        Self::new()
    }
}
