//! Raw and debounced watch events.

use std::path::PathBuf;

/// A notification from the raw source, before debouncing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    /// Something under the watched path changed.
    Changed { kind: FileEventKind, path: PathBuf },

    /// The source reported a failure.
    Error(String),
}

/// A debounced notification from a [`DebouncedWatcher`](crate::DebouncedWatcher).
///
/// `path` is always the watched root, not the file that changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A burst of raw changes settled.
    Changed { path: PathBuf },

    /// A non-fatal error from the raw source or from `start()`.
    Error { path: PathBuf, message: String },

    /// The watcher reached `Stopped`. Sent once per watcher.
    End { path: PathBuf },
}

impl WatchEvent {
    /// The watched root this event belongs to.
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Changed { path } | Self::Error { path, .. } | Self::End { path } => path,
        }
    }
}

/// Kind of file event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    /// File was created.
    Created,

    /// File was modified.
    Modified,

    /// File was deleted.
    Deleted,

    /// File was renamed (old path).
    RenamedFrom,

    /// File was renamed (new path).
    RenamedTo,

    /// File metadata changed.
    MetadataChanged,

    /// File was opened or read. Ignored by the watcher.
    Accessed,

    /// Unknown event type.
    Unknown,
}

impl FileEventKind {
    /// Whether this kind can signal a content change.
    pub fn is_change(self) -> bool {
        !matches!(self, Self::Accessed)
    }
}

impl From<notify::EventKind> for FileEventKind {
    fn from(kind: notify::EventKind) -> Self {
        match kind {
            notify::EventKind::Create(_) => Self::Created,
            notify::EventKind::Modify(modify_kind) => match modify_kind {
                notify::event::ModifyKind::Name(rename) => match rename {
                    notify::event::RenameMode::From => Self::RenamedFrom,
                    notify::event::RenameMode::To => Self::RenamedTo,
                    _ => Self::Modified,
                },
                notify::event::ModifyKind::Metadata(_) => Self::MetadataChanged,
                _ => Self::Modified,
            },
            notify::EventKind::Remove(_) => Self::Deleted,
            notify::EventKind::Access(_) => Self::Accessed,
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RenameMode};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_from_notify() {
        assert_eq!(
            FileEventKind::from(notify::EventKind::Create(CreateKind::File)),
            FileEventKind::Created
        );
        assert_eq!(
            FileEventKind::from(notify::EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            FileEventKind::RenamedTo
        );
        assert_eq!(
            FileEventKind::from(notify::EventKind::Access(AccessKind::Any)),
            FileEventKind::Accessed
        );
    }

    #[test]
    fn test_access_is_not_a_change() {
        assert!(!FileEventKind::Accessed.is_change());
        assert!(FileEventKind::Modified.is_change());
        assert!(FileEventKind::Unknown.is_change());
    }

    #[test]
    fn test_watch_event_path() {
        let event = WatchEvent::Error {
            path: PathBuf::from("/src"),
            message: "boom".to_string(),
        };
        assert_eq!(event.path(), &PathBuf::from("/src"));
    }
}
