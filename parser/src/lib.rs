//! # Argument Parser
//!
//! Turns the free-form argument line of `relaunch` into an [`Argument`]:
//! the paths to watch and the shell commands to (re)start.
//!
//! ```text
//! ./src + ./assets [cargo run][npm run watch]
//! └──── paths ───┘ └─────── commands ───────┘
//! ```
//!
//! Everything before the first `[` is the path segment. Every top-level
//! bracket pair is one command; nested brackets are kept verbatim so shell
//! syntax such as `[ -f x ]` survives.

pub mod argument;
pub mod error;
pub mod tokenizer;

pub use argument::{Argument, DEFAULT_PATH, DEFAULT_TIMEOUT};
pub use error::{ParseError, Result};
pub use tokenizer::parse;
