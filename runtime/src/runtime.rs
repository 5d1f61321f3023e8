//! The restart orchestrator.

use std::borrow::Cow;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use relaunch_parser::Argument;
use relaunch_process::{ChildProcess, ProcessEvent};
use relaunch_watcher::{DebouncedWatcher, NotificationSource, WatchEvent};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::RuntimeError;
use crate::sink::OutputSink;

/// Lifecycle of a [`Runtime`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Pending,
    Started,
    Stopped,
}

/// Notifications about the runtime itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// A non-fatal misuse, such as starting twice.
    Error(String),

    /// The runtime stopped. Sent exactly once.
    End,
}

/// Runs one generation of commands and replaces it whenever a watched path
/// settles after a change.
///
/// All methods are synchronous and meant to be called from a single task;
/// [`Runtime::run`] is that task for the CLI.
pub struct Runtime {
    argument: Argument,
    source: Arc<dyn NotificationSource>,
    sink: Arc<dyn OutputSink>,
    state: RuntimeState,

    /// One per watch path, created on `start()`.
    watchers: Vec<DebouncedWatcher>,

    /// The live generation, one handle per command.
    generation: Vec<ChildProcess>,

    /// Number of generations started so far.
    generations: usize,

    process_tx: mpsc::UnboundedSender<ProcessEvent>,
    process_rx: mpsc::UnboundedReceiver<ProcessEvent>,
    watch_tx: mpsc::UnboundedSender<WatchEvent>,
    watch_rx: mpsc::UnboundedReceiver<WatchEvent>,
    events: mpsc::UnboundedSender<RuntimeEvent>,
}

impl Runtime {
    /// Create a pending runtime and the receiver for its [`RuntimeEvent`]s.
    pub fn new(
        argument: Argument,
        source: Arc<dyn NotificationSource>,
        sink: Arc<dyn OutputSink>,
    ) -> (Self, mpsc::UnboundedReceiver<RuntimeEvent>) {
        let (process_tx, process_rx) = mpsc::unbounded_channel();
        let (watch_tx, watch_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();

        let runtime = Self {
            argument,
            source,
            sink,
            state: RuntimeState::Pending,
            watchers: Vec::new(),
            generation: Vec::new(),
            generations: 0,
            process_tx,
            process_rx,
            watch_tx,
            watch_rx,
            events,
        };
        (runtime, events_rx)
    }

    pub fn argument(&self) -> &Argument {
        &self.argument
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    /// Handles of the live generation.
    pub fn generation(&self) -> &[ChildProcess] {
        &self.generation
    }

    /// Number of generations started so far, the initial one included.
    pub fn generations(&self) -> usize {
        self.generations
    }

    /// Run generation 0 and start one watcher per path.
    ///
    /// Only valid once, from `Pending`; a second call emits
    /// [`RuntimeEvent::Error`] and disposes the runtime.
    pub fn start(&mut self) {
        if self.state != RuntimeState::Pending {
            let error = RuntimeError::AlreadyStarted;
            warn!("{error}");
            let _ = self.events.send(RuntimeEvent::Error(error.to_string()));
            self.dispose();
            return;
        }
        self.state = RuntimeState::Started;
        info!(
            paths = ?self.argument.paths,
            commands = self.argument.commands.len(),
            "runtime started"
        );

        self.restart();

        for path in &self.argument.paths {
            let mut watcher = DebouncedWatcher::new(
                PathBuf::from(path),
                self.argument.timeout,
                self.source.clone(),
                self.watch_tx.clone(),
            );
            watcher.start();
            self.watchers.push(watcher);
        }
    }

    /// Dispose the live generation and start the next one.
    ///
    /// Termination of the old processes is requested, not awaited.
    fn restart(&mut self) {
        for handle in self.generation.drain(..) {
            handle.dispose();
        }
        self.drain_process_events();

        self.generations += 1;
        debug!(generation = self.generations, "starting generation");

        self.generation = self
            .argument
            .commands
            .iter()
            .enumerate()
            .map(|(id, command)| ChildProcess::new(id, command.as_str(), self.process_tx.clone()))
            .collect();

        for handle in &self.generation {
            self.sink
                .info(&format!("[{}: {}]", handle.id(), handle.command()));
            handle.start();
        }
    }

    /// Send one input line to every handle of the live generation.
    pub fn write(&self, line: &str) {
        for handle in &self.generation {
            handle.write(line);
        }
    }

    /// Stop every handle and watcher. Idempotent; emits
    /// [`RuntimeEvent::End`] on the first call only.
    pub fn dispose(&mut self) {
        match self.state {
            RuntimeState::Stopped => return,
            RuntimeState::Pending => {}
            RuntimeState::Started => {
                for handle in self.generation.drain(..) {
                    handle.dispose();
                }
                for watcher in &mut self.watchers {
                    watcher.dispose();
                }
                self.drain_process_events();
            }
        }
        self.state = RuntimeState::Stopped;
        info!(generations = self.generations, "runtime stopped");
        let _ = self.events.send(RuntimeEvent::End);
    }

    /// Start, then react to watcher, process, and input events until
    /// `shutdown` resolves. The runtime is disposed on return.
    ///
    /// Input is split on `\n` and decoded lossily, so a malformed line is
    /// still forwarded. End of `input` only stops forwarding.
    pub async fn run<I, F>(&mut self, mut input: I, shutdown: F)
    where
        I: AsyncBufRead + Unpin,
        F: Future<Output = ()>,
    {
        self.start();

        tokio::pin!(shutdown);
        // Survives cancelled reads; cleared once a line is forwarded.
        let mut line = Vec::new();
        let mut input_open = true;

        while self.state == RuntimeState::Started {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    debug!("shutdown requested");
                    break;
                }

                Some(event) = self.watch_rx.recv() => self.on_watch_event(event),

                Some(event) = self.process_rx.recv() => self.on_process_event(event),

                read = input.read_until(b'\n', &mut line), if input_open => match read {
                    Ok(0) => {
                        if !line.is_empty() {
                            self.write(&input_line(&line));
                            line.clear();
                        }
                        debug!("input closed");
                        input_open = false;
                    }
                    Ok(_) => {
                        self.write(&input_line(&line));
                        line.clear();
                    }
                    Err(e) => {
                        warn!("failed to read input: {e}");
                        input_open = false;
                    }
                },
            }
        }

        self.dispose();
    }

    fn on_watch_event(&mut self, event: WatchEvent) {
        match event {
            WatchEvent::Changed { path } => {
                if self.state == RuntimeState::Started {
                    info!(path = %path.display(), "change detected, restarting");
                    self.restart();
                }
            }
            WatchEvent::Error { path, message } => {
                warn!(path = %path.display(), "watch error: {message}");
                self.sink
                    .info(&format!("[watch error: {}: {message}]", path.display()));
            }
            WatchEvent::End { .. } => {}
        }
    }

    fn on_process_event(&self, event: ProcessEvent) {
        match event {
            ProcessEvent::Data { text, .. } => self.sink.write(&text),
            ProcessEvent::Error { id, message } => {
                self.sink.info(&format!("[{id}: error: {message}]"));
            }
            ProcessEvent::End { id } => self.sink.info(&format!("[{id}: end]")),
        }
    }

    /// Report whatever the disposed handles already queued, so their end is
    /// announced before anything of the next generation.
    fn drain_process_events(&mut self) {
        while let Ok(event) = self.process_rx.try_recv() {
            self.on_process_event(event);
        }
    }
}

/// Strip the line terminator from one raw input line.
fn input_line(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes)
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("argument", &self.argument)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("watchers", &self.watchers)
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use pretty_assertions::assert_eq;
    use relaunch_watcher::ManualSource;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    const WINDOW: Duration = Duration::from_millis(50);

    struct Harness {
        source: Arc<ManualSource>,
        sink: MemorySink,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<Runtime>,
    }

    impl Harness {
        async fn stop(self) -> Runtime {
            let _ = self.shutdown.send(());
            self.task.await.unwrap()
        }
    }

    fn argument(commands: &[&str]) -> Argument {
        commands
            .iter()
            .fold(Argument::new().with_paths(["/project"]), |arg, command| {
                arg.with_command(*command)
            })
            .with_timeout(WINDOW)
    }

    fn spawn_with_input<I>(argument: Argument, input: I) -> Harness
    where
        I: AsyncBufRead + Unpin + Send + 'static,
    {
        let source = Arc::new(ManualSource::new());
        let sink = MemorySink::new();
        let (shutdown, shutdown_rx) = oneshot::channel();
        let (mut runtime, _events) = Runtime::new(argument, source.clone(), Arc::new(sink.clone()));

        let task = tokio::spawn(async move {
            runtime
                .run(input, async {
                    let _ = shutdown_rx.await;
                })
                .await;
            runtime
        });

        Harness {
            source,
            sink,
            shutdown,
            task,
        }
    }

    fn spawn(argument: Argument) -> Harness {
        spawn_with_input(argument, tokio::io::BufReader::new(tokio::io::empty()))
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_generation_zero_runs_immediately() {
        let harness = spawn(argument(&["echo hello"]));
        let sink = harness.sink.clone();

        wait_for(|| sink.infos().len() == 2).await;
        assert_eq!(sink.infos(), vec!["[0: echo hello]", "[0: end]"]);
        assert_eq!(sink.text(), "hello\n");

        let runtime = harness.stop().await;
        assert_eq!(runtime.state(), RuntimeState::Stopped);
        assert_eq!(runtime.generations(), 1);
    }

    #[tokio::test]
    async fn test_change_restarts_generation() {
        let harness = spawn(argument(&["sleep 30"]));
        let sink = harness.sink.clone();

        wait_for(|| sink.infos().len() == 1).await;
        harness.source.notify("/project/src/main.rs");

        wait_for(|| sink.infos().len() == 3).await;
        assert_eq!(
            sink.infos(),
            vec!["[0: sleep 30]", "[0: end]", "[0: sleep 30]"]
        );

        let runtime = harness.stop().await;
        assert_eq!(runtime.generations(), 2);
        assert!(runtime.generation().is_empty());
        assert_eq!(
            sink.infos(),
            vec!["[0: sleep 30]", "[0: end]", "[0: sleep 30]", "[0: end]"]
        );
    }

    #[tokio::test]
    async fn test_burst_restarts_once() {
        let harness = spawn(argument(&["sleep 30"]));
        let sink = harness.sink.clone();

        wait_for(|| sink.infos().len() == 1).await;
        for i in 0..5 {
            harness.source.notify(format!("/project/file{i}.txt"));
        }

        wait_for(|| sink.infos().len() == 3).await;
        tokio::time::sleep(WINDOW * 4).await;

        let runtime = harness.stop().await;
        assert_eq!(runtime.generations(), 2);
    }

    #[tokio::test]
    async fn test_ids_are_reused_across_generations() {
        let harness = spawn(argument(&["sleep 30", "sleep 31"]));
        let sink = harness.sink.clone();
        let started = ["[0: sleep 30]", "[1: sleep 31]"];
        let ended = ["[0: end]", "[1: end]"];

        wait_for(|| sink.infos().len() == 2).await;
        for restart in 1..=3 {
            harness.source.notify(format!("/project/file{restart}.txt"));
            wait_for(|| sink.infos().len() == 2 + 4 * restart).await;
        }

        let mut expected = started.to_vec();
        for _ in 0..3 {
            expected.extend(ended);
            expected.extend(started);
        }
        assert_eq!(sink.infos(), expected);

        let runtime = harness.stop().await;
        assert_eq!(runtime.generations(), 4);
    }

    #[tokio::test]
    async fn test_input_lines_reach_children() {
        let input = tokio_test::io::Builder::new().read(b"hello\n").build();
        let harness = spawn_with_input(
            argument(&["read line; echo got $line"]),
            tokio::io::BufReader::new(input),
        );
        let sink = harness.sink.clone();

        wait_for(|| sink.infos().len() == 2).await;
        assert_eq!(sink.text(), "got hello\n");
        assert_eq!(
            sink.infos(),
            vec!["[0: read line; echo got $line]", "[0: end]"]
        );
        harness.stop().await;
    }

    #[tokio::test]
    async fn test_malformed_input_line_keeps_forwarding() {
        let input = tokio_test::io::Builder::new()
            .read(b"\xff\xfe\nhello\n")
            .build();
        let harness = spawn_with_input(
            argument(&["read a; read b; echo got $b"]),
            tokio::io::BufReader::new(input),
        );
        let sink = harness.sink.clone();

        wait_for(|| sink.infos().len() == 2).await;
        assert_eq!(sink.text(), "got hello\n");
        harness.stop().await;
    }

    #[tokio::test]
    async fn test_input_is_not_replayed_after_restart() {
        let input = tokio_test::io::Builder::new().read(b"first\n").build();
        let harness = spawn_with_input(
            argument(&["read line; echo got $line; sleep 30"]),
            tokio::io::BufReader::new(input),
        );
        let sink = harness.sink.clone();

        wait_for(|| sink.text() == "got first\n").await;
        harness.source.notify("/project/a.txt");
        wait_for(|| sink.infos().len() == 3).await;

        // The new generation is blocked on `read` with nothing to receive.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(sink.text(), "got first\n");

        let runtime = harness.stop().await;
        assert_eq!(runtime.generations(), 2);
    }

    #[test]
    fn test_input_line_strips_terminator() {
        assert_eq!(input_line(b"hello\n"), "hello");
        assert_eq!(input_line(b"hello\r\n"), "hello");
        assert_eq!(input_line(b"tail"), "tail");
        assert_eq!(input_line(b"\xff\xfe\n"), "\u{FFFD}\u{FFFD}");
    }

    #[tokio::test]
    async fn test_watch_errors_are_announced() {
        let harness = spawn(argument(&["sleep 30"]));
        let sink = harness.sink.clone();

        wait_for(|| sink.infos().len() == 1).await;
        harness.source.fail("/project", "inotify limit reached");

        wait_for(|| sink.infos().len() == 2).await;
        assert_eq!(sink.infos()[1], "[watch error: /project: inotify limit reached]");

        let runtime = harness.stop().await;
        assert_eq!(runtime.generations(), 1);
    }

    #[tokio::test]
    async fn test_start_twice_reports_error_and_disposes() {
        let sink = MemorySink::new();
        let source = Arc::new(ManualSource::new());
        let (mut runtime, mut events) =
            Runtime::new(argument(&["sleep 30"]), source.clone(), Arc::new(sink.clone()));

        runtime.start();
        assert_eq!(source.subscribers(), 1);
        runtime.start();

        assert_eq!(
            events.try_recv().unwrap(),
            RuntimeEvent::Error("a runtime can only be started once".to_string())
        );
        assert_eq!(events.try_recv().unwrap(), RuntimeEvent::End);
        assert_eq!(runtime.state(), RuntimeState::Stopped);
        assert_eq!(source.subscribers(), 0);
        assert_eq!(sink.infos(), vec!["[0: sleep 30]", "[0: end]"]);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let (mut runtime, mut events) = Runtime::new(
            argument(&["sleep 30"]),
            Arc::new(ManualSource::new()),
            Arc::new(MemorySink::new()),
        );

        runtime.start();
        runtime.dispose();
        runtime.dispose();
        drop(runtime);

        let mut ends = 0;
        while let Some(event) = events.recv().await {
            if event == RuntimeEvent::End {
                ends += 1;
            }
        }
        assert_eq!(ends, 1);
    }

    #[tokio::test]
    async fn test_dispose_pending_runtime() {
        let sink = MemorySink::new();
        let (mut runtime, mut events) = Runtime::new(
            argument(&["sleep 30"]),
            Arc::new(ManualSource::new()),
            Arc::new(sink.clone()),
        );

        runtime.dispose();
        assert_eq!(runtime.state(), RuntimeState::Stopped);
        assert_eq!(events.try_recv().unwrap(), RuntimeEvent::End);
        assert!(sink.outputs().is_empty());

        // Starting after dispose is a misuse, not a panic.
        runtime.start();
        assert!(matches!(events.try_recv(), Ok(RuntimeEvent::Error(_))));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_write_without_handles_is_noop() {
        let sink = MemorySink::new();
        let (mut runtime, _events) = Runtime::new(
            Argument::new().with_paths(["/project"]),
            Arc::new(ManualSource::new()),
            Arc::new(sink.clone()),
        );

        runtime.start();
        runtime.write("ignored");
        assert!(runtime.generation().is_empty());
        assert!(sink.outputs().is_empty());
        runtime.dispose();
    }
}
