//! Output sinks for runtime announcements and child output.

use std::io::{IsTerminal, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use owo_colors::OwoColorize;
use tracing::debug;

/// Append-only destination for everything the runtime prints.
///
/// Only the runtime writes to a sink, one call at a time.
pub trait OutputSink: Send + Sync {
    /// A runtime announcement, printed as its own line.
    fn info(&self, line: &str);

    /// Raw child output, printed verbatim.
    fn write(&self, text: &str);
}

/// Writes to the process's stdout.
#[derive(Debug, Clone)]
pub struct TerminalSink {
    /// Whether announcements are styled.
    color: bool,
}

impl TerminalSink {
    /// Create a sink that styles announcements when stdout is a terminal.
    pub fn new() -> Self {
        Self {
            color: std::io::stdout().is_terminal(),
        }
    }

    /// Create a sink that never styles its output.
    pub fn plain() -> Self {
        Self { color: false }
    }

    fn emit(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|()| stdout.flush()) {
            debug!("failed to write to stdout: {e}");
        }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for TerminalSink {
    fn info(&self, line: &str) {
        if self.color {
            self.emit(&format!("{}\n", line.dimmed()));
        } else {
            self.emit(&format!("{line}\n"));
        }
    }

    fn write(&self, text: &str) {
        self.emit(text);
    }
}

/// One call recorded by a [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// An announcement line.
    Info(String),

    /// A chunk of child output.
    Write(String),
}

/// Records everything in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    outputs: Arc<Mutex<Vec<Output>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded call, in order.
    pub fn outputs(&self) -> Vec<Output> {
        self.lock().clone()
    }

    /// Recorded announcement lines, in order.
    pub fn infos(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|output| match output {
                Output::Info(line) => Some(line.clone()),
                Output::Write(_) => None,
            })
            .collect()
    }

    /// Recorded child output, concatenated.
    pub fn text(&self) -> String {
        self.lock()
            .iter()
            .filter_map(|output| match output {
                Output::Write(text) => Some(text.as_str()),
                Output::Info(_) => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Output>> {
        self.outputs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OutputSink for MemorySink {
    fn info(&self, line: &str) {
        self.lock().push(Output::Info(line.to_string()));
    }

    fn write(&self, text: &str) {
        self.lock().push(Output::Write(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        let shared = sink.clone();

        shared.info("[0: echo hi]");
        shared.write("hi\n");
        shared.info("[0: end]");

        assert_eq!(
            sink.outputs(),
            vec![
                Output::Info("[0: echo hi]".to_string()),
                Output::Write("hi\n".to_string()),
                Output::Info("[0: end]".to_string()),
            ]
        );
        assert_eq!(sink.infos(), vec!["[0: echo hi]", "[0: end]"]);
        assert_eq!(sink.text(), "hi\n");
    }

    #[test]
    fn test_plain_terminal_sink() {
        let sink = TerminalSink::plain();
        assert!(!sink.color);
        sink.info("[watching: /tmp]");
    }
}
