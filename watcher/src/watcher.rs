//! Debounced watcher implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::WatcherError;
use crate::event::{RawEvent, WatchEvent};
use crate::source::{NotificationSource, SubscriptionId};

/// Lifecycle of a [`DebouncedWatcher`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Created, not yet subscribed.
    Pending,

    /// Subscribed and debouncing.
    Started,

    /// Disposed. Inert from here on.
    Stopped,
}

/// Watches one path and emits one [`WatchEvent::Changed`] per burst of raw
/// notifications.
///
/// Each raw notification (re)arms a single deadline `window` in the future;
/// the change is reported once the deadline passes with no further
/// notification.
pub struct DebouncedWatcher {
    /// Watched root.
    path: PathBuf,

    /// Quiet period that ends a burst.
    window: Duration,

    /// Where raw notifications come from.
    source: Arc<dyn NotificationSource>,

    /// Event sender.
    events: mpsc::UnboundedSender<WatchEvent>,

    state: WatcherState,

    /// Live subscription on `source`, if subscribing succeeded.
    subscription: Option<SubscriptionId>,

    /// Stops the debounce task, dropping any pending deadline with it.
    cancel: CancellationToken,
}

impl DebouncedWatcher {
    /// Create a pending watcher.
    pub fn new(
        path: impl Into<PathBuf>,
        window: Duration,
        source: Arc<dyn NotificationSource>,
        events: mpsc::UnboundedSender<WatchEvent>,
    ) -> Self {
        Self {
            path: path.into(),
            window,
            source,
            events,
            state: WatcherState::Pending,
            subscription: None,
            cancel: CancellationToken::new(),
        }
    }

    /// The watched root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The debounce window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// Subscribe to the source and begin debouncing.
    ///
    /// Only valid once, from `Pending`; a second call emits an error event and
    /// disposes the watcher. A failed subscription is reported as an error
    /// event and leaves the watcher started but silent.
    pub fn start(&mut self) {
        if self.state != WatcherState::Pending {
            self.emit_error(&WatcherError::AlreadyStarted);
            self.dispose();
            return;
        }
        self.state = WatcherState::Started;

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        match self.source.subscribe(&self.path, raw_tx) {
            Ok(id) => self.subscription = Some(id),
            Err(e) => {
                self.emit_error(&e);
                return;
            }
        }

        info!(path = %self.path.display(), window = ?self.window, "watcher started");
        tokio::spawn(debounce(
            self.path.clone(),
            self.window,
            raw_rx,
            self.events.clone(),
            self.cancel.clone(),
        ));
    }

    /// Cancel any pending deadline and unsubscribe. Idempotent; emits `End`
    /// on the first call only.
    pub fn dispose(&mut self) {
        match self.state {
            WatcherState::Stopped => return,
            WatcherState::Pending => {}
            WatcherState::Started => {
                self.cancel.cancel();
                if let Some(id) = self.subscription.take() {
                    self.source.unsubscribe(id);
                }
            }
        }
        self.state = WatcherState::Stopped;
        debug!(path = %self.path.display(), "watcher stopped");
        let _ = self.events.send(WatchEvent::End {
            path: self.path.clone(),
        });
    }

    fn emit_error(&self, error: &WatcherError) {
        warn!(path = %self.path.display(), "{error}");
        let _ = self.events.send(WatchEvent::Error {
            path: self.path.clone(),
            message: error.to_string(),
        });
    }
}

impl Drop for DebouncedWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(id) = self.subscription.take() {
            self.source.unsubscribe(id);
        }
    }
}

impl std::fmt::Debug for DebouncedWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebouncedWatcher")
            .field("path", &self.path)
            .field("window", &self.window)
            .field("state", &self.state)
            .finish()
    }
}

/// Coalesce raw notifications until cancelled.
async fn debounce(
    path: PathBuf,
    window: Duration,
    mut raw: mpsc::UnboundedReceiver<RawEvent>,
    events: mpsc::UnboundedSender<WatchEvent>,
    cancel: CancellationToken,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => return,

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                debug!(path = %path.display(), "change settled");
                let _ = events.send(WatchEvent::Changed { path: path.clone() });
            }

            raw_event = raw.recv() => match raw_event {
                Some(RawEvent::Changed { kind, path: changed }) => {
                    trace!(?kind, changed = %changed.display(), "raw change");
                    deadline = Some(Instant::now() + window);
                }
                Some(RawEvent::Error(message)) => {
                    warn!(path = %path.display(), "watch source error: {message}");
                    let _ = events.send(WatchEvent::Error { path: path.clone(), message });
                }
                None => break,
            },
        }
    }

    // The source went away; still honour a burst that was in flight.
    if let Some(deadline) = deadline {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = sleep_until(deadline) => {
                let _ = events.send(WatchEvent::Changed { path });
            }
        }
    }
}
