//! Notifications emitted by a child process.

/// An event from one [`ChildProcess`](crate::ChildProcess).
///
/// `id` is the handle's position in its generation; it is reused by the next
/// generation and says nothing about which OS process produced the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A chunk of stdout or stderr, decoded lossily as UTF-8.
    Data { id: usize, text: String },

    /// A non-fatal error, such as a second `start()` or a failed spawn.
    Error { id: usize, message: String },

    /// The handle reached `Stopped`. Sent once per handle.
    End { id: usize },
}

impl ProcessEvent {
    /// Id of the handle that sent the event.
    pub fn id(&self) -> usize {
        match self {
            Self::Data { id, .. } | Self::Error { id, .. } | Self::End { id } => *id,
        }
    }

    /// Check if this is the final event of its handle.
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End { .. })
    }
}
