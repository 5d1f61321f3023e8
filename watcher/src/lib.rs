//! # Debounced Watcher
//!
//! Watches one path and turns a burst of raw filesystem notifications into a
//! single [`WatchEvent::Changed`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Debounced Watcher                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  NotificationSource ──► RawEvent ──► debounce task ──► WatchEvent │
//! │   (NotifySource)                     (one deadline)             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The raw source is injected through [`NotificationSource`], so tests can
//! drive the debounce logic without touching the filesystem.

pub mod error;
pub mod event;
pub mod source;
pub mod watcher;

pub use error::{Result, WatcherError};
pub use event::{FileEventKind, RawEvent, WatchEvent};
pub use source::{ManualSource, NotificationSource, NotifySource, SubscriptionId};
pub use watcher::{DebouncedWatcher, WatcherState};
