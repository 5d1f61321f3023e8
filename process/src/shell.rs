//! Host shell selection and process termination.

use std::io;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

/// How commands are launched and torn down on the host.
///
/// Chosen once per [`ChildProcess`](crate::ChildProcess) when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// `sh -c`, terminated with `SIGINT` to the child's process group.
    Posix,

    /// `cmd /C`, terminated with `taskkill /T /F` on the process tree.
    Windows,
}

impl Platform {
    /// The platform of the running host.
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    /// Build the shell invocation for `text` with all three stdio streams
    /// piped.
    pub fn command(self, text: &str) -> Command {
        let mut command = match self {
            Self::Posix => {
                let mut command = Command::new("sh");
                command.arg("-c").arg(text);
                command
            }
            Self::Windows => {
                let mut command = Command::new("cmd");
                command.arg("/C").arg(text);
                command
            }
        };

        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Own process group, so the interrupt reaches whatever the shell
        // started and the terminal's Ctrl+C does not.
        #[cfg(unix)]
        command.process_group(0);

        command
    }

    /// Ask the OS to stop the process `pid`. Delivery is not awaited.
    pub fn terminate(self, pid: u32) -> io::Result<()> {
        match self {
            Self::Posix => interrupt_group(pid),
            Self::Windows => {
                debug!(pid, "running taskkill");
                std::process::Command::new("taskkill")
                    .args(["/pid", &pid.to_string(), "/T", "/F"])
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()
                    .map(drop)
            }
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::host()
    }
}

#[cfg(unix)]
fn interrupt_group(pid: u32) -> io::Result<()> {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pid = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    debug!(pid, "sending SIGINT to process group");
    killpg(Pid::from_raw(pid), Signal::SIGINT).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn interrupt_group(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process groups are not available on this host",
    ))
}
