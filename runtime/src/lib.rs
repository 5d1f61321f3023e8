//! # Restart Runtime
//!
//! Owns one generation of child processes and one debounced watcher per
//! path. Every settled change tears the generation down and starts the next
//! one; stdin lines go to whichever generation is current.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            Runtime                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  DebouncedWatcher × paths ──Changed──► restart()                │
//! │                                          │                      │
//! │                       dispose gen N ◄────┴────► spawn gen N+1   │
//! │                                                     │           │
//! │  stdin lines ──► write() ──► ChildProcess × commands            │
//! │                                                     │           │
//! │  OutputSink ◄────────── Data / End ─────────────────┘           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use relaunch_runtime::{Runtime, TerminalSink, prepare};
//! use relaunch_watcher::NotifySource;
//!
//! let argument = prepare("./src [cargo run]", &std::env::current_dir()?)?;
//! let (mut runtime, _events) = Runtime::new(
//!     argument,
//!     Arc::new(NotifySource::new()),
//!     Arc::new(TerminalSink::new()),
//! );
//! runtime.run(tokio::io::BufReader::new(tokio::io::stdin()), shutdown).await;
//! ```

pub mod error;
pub mod prepare;
pub mod runtime;
pub mod sink;

pub use error::{Result, RuntimeError};
pub use prepare::prepare;
pub use runtime::{Runtime, RuntimeEvent, RuntimeState};
pub use sink::{MemorySink, Output, OutputSink, TerminalSink};

// Re-export from dependencies for convenience
pub use relaunch_parser::Argument;
pub use relaunch_watcher::{NotificationSource, NotifySource};
