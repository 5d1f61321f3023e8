//! # Child Processes
//!
//! A [`ChildProcess`] runs one shell command on behalf of the restart
//! runtime. It streams stdout and stderr as [`ProcessEvent::Data`], accepts
//! lines for the child's stdin, and tears the OS process down on dispose.
//!
//! ## Lifecycle
//!
//! ```text
//! Pending ──start()──► Started ──dispose() / exit──► Stopped
//!    │                                                  ▲
//!    └──────────────────dispose()───────────────────────┘
//! ```
//!
//! Every handle reports [`ProcessEvent::End`] exactly once, whichever way it
//! reaches `Stopped`.

mod decode;
pub mod error;
pub mod event;
pub mod process;
pub mod shell;

pub use error::{ProcessError, Result};
pub use event::ProcessEvent;
pub use process::{ChildProcess, ProcessState};
pub use shell::Platform;
