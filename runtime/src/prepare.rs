//! Startup validation: parse, resolve, and check the argument line.

use std::path::Path;

use path_absolutize::Absolutize;
use relaunch_parser::Argument;
use tracing::debug;

use crate::error::{Result, RuntimeError};

/// Parse `line` and make it ready for [`Runtime`](crate::Runtime).
///
/// Watch paths are resolved against `cwd` and must exist; at least one
/// command is required. Nothing is spawned or watched here, so a failure
/// leaves no state behind.
pub fn prepare(line: &str, cwd: &Path) -> Result<Argument> {
    let mut argument = relaunch_parser::parse(line)?;

    argument.paths = argument
        .paths
        .iter()
        .map(|path| resolve(cwd, path))
        .collect::<Result<Vec<_>>>()?;

    if let Some(missing) = argument.paths.iter().find(|path| !Path::new(path).exists()) {
        return Err(RuntimeError::PathNotFound(missing.clone()));
    }

    if !argument.has_commands() {
        return Err(RuntimeError::NothingToRun);
    }

    debug!(paths = ?argument.paths, commands = ?argument.commands, "argument prepared");
    Ok(argument)
}

/// Resolve `path` against `cwd`, normalising `.` and `..` segments.
fn resolve(cwd: &Path, path: &str) -> Result<String> {
    Path::new(path)
        .absolutize_from(cwd)
        .map(|resolved| resolved.to_string_lossy().into_owned())
        .map_err(|source| RuntimeError::Resolve {
            path: path.to_string(),
            source,
        })
}
