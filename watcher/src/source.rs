//! Raw filesystem notification sources.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::{Result, WatcherError};
use crate::event::{FileEventKind, RawEvent};

/// Handle for one subscription on a [`NotificationSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Delivers raw change notifications for a path.
///
/// Notifications arrive at whatever granularity the platform provides and may
/// be bursty or spurious; debouncing is the subscriber's job.
pub trait NotificationSource: Send + Sync {
    /// Start delivering notifications for `path` to `events`.
    fn subscribe(
        &self,
        path: &Path,
        events: mpsc::UnboundedSender<RawEvent>,
    ) -> Result<SubscriptionId>;

    /// Stop a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Notification source backed by the platform's recommended `notify` watcher.
///
/// Each subscription owns its own watcher, so the same path may be subscribed
/// more than once.
#[derive(Default)]
pub struct NotifySource {
    next_id: AtomicU64,
    watchers: Mutex<HashMap<SubscriptionId, RecommendedWatcher>>,
}

impl NotifySource {
    /// Create a source with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if there are no live subscriptions.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriptionId, RecommendedWatcher>> {
        self.watchers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NotificationSource for NotifySource {
    fn subscribe(
        &self,
        path: &Path,
        events: mpsc::UnboundedSender<RawEvent>,
    ) -> Result<SubscriptionId> {
        if !path.exists() {
            return Err(WatcherError::PathNotFound(path.display().to_string()));
        }

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    let kind = FileEventKind::from(event.kind);
                    if !kind.is_change() {
                        return;
                    }
                    for path in event.paths {
                        let _ = events.send(RawEvent::Changed { kind, path });
                    }
                }
                Err(e) => {
                    error!("Watch error: {e}");
                    let _ = events.send(RawEvent::Error(e.to_string()));
                }
            },
        )?;

        watcher.watch(path, RecursiveMode::Recursive)?;

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, watcher);
        info!("Started watching: {}", path.display());

        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        // Dropping the notify watcher releases the OS watch.
        if self.lock().remove(&id).is_some() {
            debug!(?id, "subscription removed");
        }
    }
}

type Subscriber = (SubscriptionId, PathBuf, mpsc::UnboundedSender<RawEvent>);

/// A source driven by hand through [`ManualSource::notify`].
///
/// Useful for embedding relaunch behind a custom trigger and for tests.
#[derive(Default)]
pub struct ManualSource {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl ManualSource {
    /// Create a source with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a modification of `path` to every subscriber watching it or
    /// one of its ancestors.
    pub fn notify(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.send(path, || RawEvent::Changed {
            kind: FileEventKind::Modified,
            path: path.to_path_buf(),
        });
    }

    /// Report a source failure to every subscriber covering `path`.
    pub fn fail(&self, path: impl AsRef<Path>, message: &str) {
        self.send(path.as_ref(), || RawEvent::Error(message.to_string()));
    }

    /// Number of live subscriptions.
    pub fn subscribers(&self) -> usize {
        self.lock().len()
    }

    fn send(&self, path: &Path, event: impl Fn() -> RawEvent) {
        for (_, root, events) in self.lock().iter() {
            if path.starts_with(root) {
                let _ = events.send(event());
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl NotificationSource for ManualSource {
    fn subscribe(
        &self,
        path: &Path,
        events: mpsc::UnboundedSender<RawEvent>,
    ) -> Result<SubscriptionId> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, path.to_path_buf(), events));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().retain(|(existing, _, _)| *existing != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_manual_source_routes_by_root() {
        let source = ManualSource::new();
        let (src_tx, mut src_rx) = mpsc::unbounded_channel();
        let (docs_tx, mut docs_rx) = mpsc::unbounded_channel();

        source.subscribe(Path::new("/project/src"), src_tx).unwrap();
        let docs = source.subscribe(Path::new("/project/docs"), docs_tx).unwrap();
        assert_eq!(source.subscribers(), 2);

        source.notify("/project/src/main.rs");
        assert_eq!(
            src_rx.try_recv().unwrap(),
            RawEvent::Changed {
                kind: FileEventKind::Modified,
                path: PathBuf::from("/project/src/main.rs"),
            }
        );
        assert!(docs_rx.try_recv().is_err());

        source.unsubscribe(docs);
        assert_eq!(source.subscribers(), 1);
        source.notify("/project/docs/index.md");
        assert!(docs_rx.try_recv().is_err());
    }

    #[test]
    fn test_notify_source_rejects_missing_path() {
        let source = NotifySource::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = source.subscribe(Path::new("/nonexistent/path/12345"), tx);
        assert!(matches!(result, Err(WatcherError::PathNotFound(_))));
        assert!(source.is_empty());
    }

    #[tokio::test]
    async fn test_notify_source_reports_writes() {
        let temp_dir = TempDir::new().unwrap();
        let source = NotifySource::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let id = source.subscribe(temp_dir.path(), tx).unwrap();
        assert_eq!(source.len(), 1);

        std::fs::write(temp_dir.path().join("touched.txt"), "hello").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, RawEvent::Changed { .. }));

        source.unsubscribe(id);
        assert!(source.is_empty());
    }
}
