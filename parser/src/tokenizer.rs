//! Single-pass tokenizer for the argument line.
//!
//! Bracket balance and command extraction share one depth counter, so a line
//! that passes the balance check always yields the command boundaries the
//! check saw.

use tracing::debug;

use crate::argument::{Argument, DEFAULT_PATH, DEFAULT_TIMEOUT};
use crate::error::{ParseError, Result};

/// Parse an argument line into watch paths and commands.
///
/// The line is the program's arguments joined with single spaces. A line
/// without any bracket group parses successfully with no commands; rejecting
/// that is left to the caller.
pub fn parse(line: &str) -> Result<Argument> {
    let mut depth = 0usize;
    let mut first_open = None;
    let mut commands = Vec::new();
    let mut current = String::new();

    for (offset, ch) in line.char_indices() {
        match ch {
            '[' => {
                first_open.get_or_insert(offset);
                if depth > 0 {
                    current.push(ch);
                }
                depth += 1;
            }
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(ParseError::UnmatchedClose { offset })?;
                if depth > 0 {
                    current.push(ch);
                } else {
                    commands.push(std::mem::take(&mut current));
                }
            }
            _ if depth > 0 => current.push(ch),
            _ => {}
        }
    }

    if depth != 0 {
        return Err(ParseError::Unclosed { open: depth });
    }

    let paths = split_paths(&line[..first_open.unwrap_or(line.len())]);
    debug!(?paths, count = commands.len(), "parsed argument line");

    Ok(Argument {
        paths,
        commands,
        timeout: DEFAULT_TIMEOUT,
    })
}

/// Split the path segment on `+` and whitespace.
fn split_paths(segment: &str) -> Vec<String> {
    let paths: Vec<String> = segment
        .split(|c: char| c == '+' || c.is_whitespace())
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(String::from)
        .collect();

    if paths.is_empty() {
        vec![DEFAULT_PATH.to_string()]
    } else {
        paths
    }
}
