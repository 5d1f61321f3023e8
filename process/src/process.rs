//! The child process handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::decode::Utf8Decoder;
use crate::error::ProcessError;
use crate::event::ProcessEvent;
use crate::shell::Platform;

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Lifecycle of a [`ChildProcess`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Created, not yet spawned.
    Pending,

    /// The OS process is running and its output is being forwarded.
    Started,

    /// Exited or disposed. Inert from here on.
    Stopped,
}

/// One shell command of a generation.
///
/// Cloning yields another reference to the same handle. All methods are
/// synchronous; `start()` must be called from within a tokio runtime because
/// it spawns the tasks that pump the child's stdio.
#[derive(Clone)]
pub struct ChildProcess {
    shared: Arc<Shared>,
}

struct Shared {
    id: usize,
    command: String,
    platform: Platform,
    events: mpsc::UnboundedSender<ProcessEvent>,
    inner: Mutex<Inner>,
}

struct Inner {
    state: ProcessState,
    running: Option<Running>,
}

/// Resources owned while `Started`.
struct Running {
    pid: Option<u32>,

    /// Lines queued for the child's stdin.
    input: mpsc::UnboundedSender<String>,

    /// Task writing `input` into the child's stdin.
    feeder: JoinHandle<()>,

    /// Task pumping stdout/stderr and waiting for exit.
    supervisor: JoinHandle<()>,
}

/// Why a started handle is being stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    /// The OS process exited and its output is drained.
    Exited,

    /// `dispose()` was called while the process was running.
    Disposed,
}

impl ChildProcess {
    /// Create a pending handle for the host platform.
    pub fn new(
        id: usize,
        command: impl Into<String>,
        events: mpsc::UnboundedSender<ProcessEvent>,
    ) -> Self {
        Self::with_platform(id, command, Platform::host(), events)
    }

    /// Create a pending handle with an explicit platform strategy.
    pub fn with_platform(
        id: usize,
        command: impl Into<String>,
        platform: Platform,
        events: mpsc::UnboundedSender<ProcessEvent>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                command: command.into(),
                platform,
                events,
                inner: Mutex::new(Inner {
                    state: ProcessState::Pending,
                    running: None,
                }),
            }),
        }
    }

    /// Position of this handle in its generation.
    pub fn id(&self) -> usize {
        self.shared.id
    }

    /// The shell text this handle runs.
    pub fn command(&self) -> &str {
        &self.shared.command
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessState {
        self.shared.lock().state
    }

    /// OS process id while `Started`.
    pub fn pid(&self) -> Option<u32> {
        self.shared
            .lock()
            .running
            .as_ref()
            .and_then(|running| running.pid)
    }

    /// Spawn the command. Only valid once, from `Pending`.
    ///
    /// A second call emits an error event and disposes the handle. A failed
    /// spawn does the same; neither is fatal to the caller.
    pub fn start(&self) {
        let mut inner = self.shared.lock();
        if inner.state != ProcessState::Pending {
            drop(inner);
            self.fail(ProcessError::AlreadyStarted);
            return;
        }
        inner.state = ProcessState::Started;

        let spawned = self
            .shared
            .platform
            .command(&self.shared.command)
            .spawn();

        match spawned {
            Ok(child) => {
                inner.running = Some(self.attach(child));
            }
            Err(source) => {
                drop(inner);
                self.fail(ProcessError::Spawn {
                    command: self.shared.command.clone(),
                    source,
                });
            }
        }
    }

    /// Send `data` followed by a newline to the child's stdin.
    ///
    /// Dropped silently unless the handle is `Started`.
    pub fn write(&self, data: &str) {
        let inner = self.shared.lock();
        if inner.state != ProcessState::Started {
            return;
        }
        if let Some(running) = &inner.running {
            let _ = running.input.send(format!("{data}\n"));
        }
    }

    /// Stop the handle. Idempotent; emits `End` on the first call only.
    ///
    /// Output forwarding is detached before the termination request goes out,
    /// so no `Data` event is sent once this returns. The OS process is not
    /// awaited.
    pub fn dispose(&self) {
        self.teardown(Teardown::Disposed);
    }

    fn attach(&self, mut child: Child) -> Running {
        let pid = child.id();
        info!(id = self.shared.id, pid = ?pid, command = %self.shared.command, "process started");

        let (input, lines) = mpsc::unbounded_channel();
        let feeder = match child.stdin.take() {
            Some(stdin) => tokio::spawn(feed_stdin(stdin, lines)),
            None => tokio::spawn(async {}),
        };

        let process = self.clone();
        let supervisor = tokio::spawn(async move {
            let stdout = child.stdout.take();
            let stderr = child.stderr.take();

            let (_, _, status) = tokio::join!(
                process.pump(stdout),
                process.pump(stderr),
                child.wait()
            );

            match status {
                Ok(status) => info!(id = process.id(), %status, "process exited"),
                Err(e) => warn!(id = process.id(), "failed to wait for process: {e}"),
            }
            process.teardown(Teardown::Exited);
        });

        Running {
            pid,
            input,
            feeder,
            supervisor,
        }
    }

    /// Forward one output stream until it closes.
    async fn pump<R>(&self, stream: Option<R>)
    where
        R: AsyncRead + Unpin,
    {
        let Some(mut stream) = stream else {
            return;
        };

        let mut decoder = Utf8Decoder::new();
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let text = decoder.decode(&buf[..n]);
                    if !text.is_empty() {
                        self.emit_data(text);
                    }
                }
                Err(e) => {
                    debug!(id = self.shared.id, "output stream closed: {e}");
                    break;
                }
            }
        }

        if let Some(text) = decoder.finish() {
            self.emit_data(text);
        }
    }

    fn emit_data(&self, text: String) {
        // Checked under the lock so a concurrent dispose cannot slip in
        // between the state test and the send.
        let inner = self.shared.lock();
        if inner.state == ProcessState::Started {
            self.shared.emit(ProcessEvent::Data {
                id: self.shared.id,
                text,
            });
        }
    }

    fn fail(&self, error: ProcessError) {
        warn!(id = self.shared.id, "{error}");
        self.shared.emit(ProcessEvent::Error {
            id: self.shared.id,
            message: error.to_string(),
        });
        self.dispose();
    }

    fn teardown(&self, reason: Teardown) {
        let mut inner = self.shared.lock();
        let previous = inner.state;
        if previous == ProcessState::Stopped {
            return;
        }
        inner.state = ProcessState::Stopped;
        let running = inner.running.take();
        drop(inner);

        if let Some(running) = running {
            self.release(running, reason);
        }

        debug!(id = self.shared.id, ?previous, ?reason, "process stopped");
        self.shared.emit(ProcessEvent::End { id: self.shared.id });
    }

    fn release(&self, running: Running, reason: Teardown) {
        let Running {
            pid,
            input,
            feeder,
            supervisor,
        } = running;

        // Closing the input channel lets the feeder drop the child's stdin.
        drop(input);
        feeder.abort();

        if reason == Teardown::Exited {
            return;
        }

        supervisor.abort();

        if let Some(pid) = pid {
            if let Err(source) = self.shared.platform.terminate(pid) {
                let error = ProcessError::Terminate { pid, source };
                debug!(id = self.shared.id, "{error}");
            }
        }
    }
}

impl std::fmt::Debug for ChildProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildProcess")
            .field("id", &self.shared.id)
            .field("command", &self.shared.command)
            .field("state", &self.state())
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ProcessEvent) {
        // The receiver may already be gone during shutdown.
        let _ = self.events.send(event);
    }
}

async fn feed_stdin(mut stdin: ChildStdin, mut lines: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = lines.recv().await {
        if let Err(e) = stdin.write_all(line.as_bytes()).await {
            debug!("stdin closed: {e}");
            break;
        }
        if let Err(e) = stdin.flush().await {
            debug!("stdin flush failed: {e}");
            break;
        }
    }
}
