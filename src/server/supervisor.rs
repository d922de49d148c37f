//! Per-server process supervisor.
//!
//! Every server is owned by one [`SupervisorTask`] running on its own tokio
//! task. The task is the only code that touches the server's state and process
//! handle: requests arrive as [`Command`]s from [`ServerSupervisor`] handles,
//! and watcher tasks report readiness and exits as [`ProcessNotice`]s. Reads go
//! through a `watch` channel that the task refreshes after every mutation.

use crate::admission::Rejection;
use crate::config::{ServerConfig, SupervisorConfig};
use crate::error::{Error, Result};
use crate::server::lifecycle::{EventLog, ServerEvent};
use crate::server::process::{schedule_deadline, ProcessEvent, ProcessHandle, ProcessNotice, RunId};
use crate::server::settings;
use crate::server::{Port, RuntimeState, ServerSnapshot};
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Result of a start request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The server printed its ready marker and is now `Running`
    Started,
    /// The server could not be started and is `Stopped` again
    Failed,
    /// The request was refused before anything happened
    Rejected(Rejection),
}

impl StartOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, StartOutcome::Started)
    }
}

/// Result of a stop request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The process exited and the server is `Stopped`
    Stopped,
    /// The stop could not be carried out
    Failed,
    /// The request was refused before anything happened
    Rejected(Rejection),
}

impl StopOutcome {
    pub fn is_stopped(&self) -> bool {
        matches!(self, StopOutcome::Stopped)
    }
}

/// Immediate answer to a start request: either final, or a receiver that
/// resolves once the server is ready (`true`) or gave up (`false`).
pub(crate) enum StartAck {
    Pending(oneshot::Receiver<bool>),
    Done(StartOutcome),
}

impl StartAck {
    pub(crate) async fn outcome(self) -> StartOutcome {
        match self {
            StartAck::Done(outcome) => outcome,
            StartAck::Pending(ready) => match ready.await {
                Ok(true) => StartOutcome::Started,
                _ => StartOutcome::Failed,
            },
        }
    }
}

pub(crate) enum Command {
    Start { ack: oneshot::Sender<StartAck> },
    Stop { reply: oneshot::Sender<StopOutcome> },
    Shutdown { reply: oneshot::Sender<StopOutcome> },
}

/// A configured server whose directory has been validated.
#[derive(Debug, Clone)]
pub struct ServerRecord {
    config: ServerConfig,
    port: Port,
}

impl ServerRecord {
    /// Validate the server directory and read its current port.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigInvalid`] if the directory is missing or not a directory,
    /// [`Error::Settings`] if `server.properties` exists but is unusable.
    pub fn load(config: ServerConfig) -> Result<Self> {
        let metadata = std::fs::metadata(&config.directory).map_err(|e| {
            Error::ConfigInvalid(format!(
                "Cannot access directory {} of server '{}': {}",
                config.directory.display(),
                config.name,
                e
            ))
        })?;
        if !metadata.is_dir() {
            return Err(Error::ConfigInvalid(format!(
                "Path {} of server '{}' is not a directory",
                config.directory.display(),
                config.name
            )));
        }

        let port = settings::read_port(&config.directory)?;
        Ok(Self { config, port })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn port(&self) -> Port {
        self.port
    }
}

/// Handle to a server's supervisor task.
///
/// Cloning the handle is cheap; all clones talk to the same task. The task
/// ends, killing any process it still owns, once every handle is dropped.
#[derive(Clone)]
pub struct ServerSupervisor {
    name: String,
    directory: PathBuf,
    public: bool,
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<ServerSnapshot>,
    events: EventLog,
}

impl ServerSupervisor {
    /// Spawn the supervisor task for `record`. Must be called inside a tokio runtime.
    pub fn spawn(record: ServerRecord, options: SupervisorConfig) -> Self {
        let ServerRecord { config, port } = record;
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let (notices_tx, notices_rx) = mpsc::channel(16);
        let (snapshot_tx, snapshot_rx) = watch::channel(ServerSnapshot::stopped(port));
        let events = EventLog::new();

        let handle = Self {
            name: config.name.clone(),
            directory: config.directory.clone(),
            public: config.public,
            commands: commands_tx,
            snapshot: snapshot_rx,
            events: events.clone(),
        };

        let task = SupervisorTask {
            config,
            options,
            state: RuntimeState::Stopped,
            port,
            process: None,
            snapshot: snapshot_tx,
            events,
            notices: notices_tx,
            pending_start: None,
            stop_waiters: Vec::new(),
            restarts: 0,
            shutting_down: false,
        };
        tokio::spawn(task.run(commands_rx, notices_rx));

        handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn state(&self) -> RuntimeState {
        self.snapshot.borrow().state
    }

    pub fn port(&self) -> Port {
        self.snapshot.borrow().port
    }

    pub fn snapshot(&self) -> ServerSnapshot {
        *self.snapshot.borrow()
    }

    /// Start the server and wait until it is ready or has failed.
    ///
    /// This bypasses admission policy; use
    /// [`AdmissionController`](crate::AdmissionController) for user requests.
    #[tracing::instrument(skip(self), fields(server = %self.name))]
    pub async fn start(&self) -> StartOutcome {
        self.begin_start().await.outcome().await
    }

    /// Send a start request and return as soon as the task has accepted or
    /// refused it. On acceptance the published state is already `Starting`.
    pub(crate) async fn begin_start(&self) -> StartAck {
        let (ack, rx) = oneshot::channel();
        if self.commands.send(Command::Start { ack }).await.is_err() {
            tracing::error!(server = %self.name, "Supervisor task is gone");
            return StartAck::Done(StartOutcome::Failed);
        }
        rx.await.unwrap_or(StartAck::Done(StartOutcome::Failed))
    }

    /// Ask a running server to shut down and wait for it to exit.
    #[tracing::instrument(skip(self), fields(server = %self.name))]
    pub async fn stop(&self) -> StopOutcome {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Stop { reply }, rx).await
    }

    /// Bring the server down whatever its state and refuse further starts.
    ///
    /// Running servers get the shutdown command, starting ones are killed,
    /// stopping ones are waited for.
    #[tracing::instrument(skip(self), fields(server = %self.name))]
    pub async fn shutdown(&self) -> StopOutcome {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Shutdown { reply }, rx).await
    }

    async fn request(&self, command: Command, rx: oneshot::Receiver<StopOutcome>) -> StopOutcome {
        if self.commands.send(command).await.is_err() {
            tracing::error!(server = %self.name, "Supervisor task is gone");
            return StopOutcome::Failed;
        }
        rx.await.unwrap_or(StopOutcome::Failed)
    }

    /// Recent state transitions, newest first
    pub fn events(&self, limit: Option<usize>) -> Vec<ServerEvent> {
        self.events.recent(limit)
    }

    /// Subscribe to state transitions
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }
}

/// The single owner of one server's state and process.
struct SupervisorTask {
    config: ServerConfig,
    options: SupervisorConfig,
    state: RuntimeState,
    port: Port,
    /// Present iff `state` is not `Stopped`
    process: Option<ProcessHandle>,
    snapshot: watch::Sender<ServerSnapshot>,
    events: EventLog,
    /// Handed to every spawned process's watchers
    notices: mpsc::Sender<ProcessNotice>,
    /// Caller waiting for the current start to finish
    pending_start: Option<oneshot::Sender<bool>>,
    /// Callers waiting for the current process to exit
    stop_waiters: Vec<oneshot::Sender<StopOutcome>>,
    /// Automatic restarts since the last explicit start
    restarts: u32,
    shutting_down: bool,
}

impl SupervisorTask {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut notices: mpsc::Receiver<ProcessNotice>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(notice) = notices.recv() => self.handle_notice(notice),
            }
        }

        if self.process.is_some() {
            tracing::warn!(server = %self.config.name, "All handles dropped, killing server process");
        }
        // Dropping the process handle terminates the process
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { ack } => {
                let result = self.begin_start(true);
                let _ = ack.send(result);
            }
            Command::Stop { reply } => self.stop(reply).await,
            Command::Shutdown { reply } => self.shutdown(reply).await,
        }
    }

    fn begin_start(&mut self, explicit: bool) -> StartAck {
        let name = self.config.name.clone();

        if self.shutting_down {
            return StartAck::Done(StartOutcome::Rejected(Rejection::ShuttingDown));
        }
        if self.state != RuntimeState::Stopped {
            return StartAck::Done(StartOutcome::Rejected(Rejection::NotStopped));
        }
        if self.process.is_some() {
            tracing::error!(server = %name, "Invariant violation: stopped server still owns a process");
            return StartAck::Done(StartOutcome::Failed);
        }

        // The port may have been generated or edited since the last run
        match settings::read_port(&self.config.directory) {
            Ok(port) => self.port = port,
            Err(e) => {
                tracing::error!(server = %name, error = %e, "Refusing to start with invalid settings");
                self.publish();
                return StartAck::Done(StartOutcome::Failed);
            }
        }

        if explicit {
            self.restarts = 0;
        }

        self.transition(RuntimeState::Starting);
        let spawned = ProcessHandle::spawn(
            &name,
            &self.config.directory,
            &self.options.entry_point,
            &self.options.ready_marker,
            self.notices.clone(),
        );

        match spawned {
            Ok(process) => {
                tracing::info!(server = %name, port = %self.port, pid = process.pid(), "Server starting");
                if let Some(after) = self.options.startup_timeout() {
                    schedule_deadline(process.run(), RuntimeState::Starting, after, self.notices.clone());
                }
                self.process = Some(process);
                self.publish();

                let (tx, rx) = oneshot::channel();
                self.pending_start = Some(tx);
                StartAck::Pending(rx)
            }
            Err(e) => {
                tracing::error!(server = %name, error = %e, "Failed to spawn server");
                self.transition(RuntimeState::Stopped);
                self.publish();
                StartAck::Done(StartOutcome::Failed)
            }
        }
    }

    async fn stop(&mut self, reply: oneshot::Sender<StopOutcome>) {
        if self.shutting_down && self.state != RuntimeState::Stopped {
            // Already on its way down; just wait with everyone else
            self.stop_waiters.push(reply);
            return;
        }
        if self.state != RuntimeState::Running {
            let _ = reply.send(StopOutcome::Rejected(Rejection::NotRunning));
            return;
        }
        if self.process.is_none() {
            tracing::warn!(server = %self.config.name, "Invariant violation: running server has no process");
            let _ = reply.send(StopOutcome::Failed);
            return;
        }

        self.stop_waiters.push(reply);
        self.request_exit().await;
    }

    async fn shutdown(&mut self, reply: oneshot::Sender<StopOutcome>) {
        self.shutting_down = true;

        match self.state {
            RuntimeState::Stopped => {
                let _ = reply.send(StopOutcome::Stopped);
            }
            RuntimeState::Starting => {
                self.stop_waiters.push(reply);
                if let Some(process) = self.process.as_mut() {
                    process.kill();
                }
            }
            RuntimeState::Running => {
                self.stop_waiters.push(reply);
                self.request_exit().await;
            }
            RuntimeState::Stopping => self.stop_waiters.push(reply),
        }
    }

    /// Running -> Stopping, then send the shutdown command.
    async fn request_exit(&mut self) {
        self.transition(RuntimeState::Stopping);
        self.publish();

        let name = self.config.name.clone();
        let command = self.options.shutdown_command.clone();
        let stop_timeout = self.options.stop_timeout();
        let notices = self.notices.clone();

        if let Some(process) = self.process.as_mut() {
            tracing::info!(server = %name, "Stopping server");
            if let Err(e) = process.send_line(&command).await {
                tracing::warn!(server = %name, error = %e, "Cannot send shutdown command, killing instead");
                process.kill();
            } else if let Some(after) = stop_timeout {
                schedule_deadline(process.run(), RuntimeState::Stopping, after, notices);
            }
        }
    }

    fn handle_notice(&mut self, notice: ProcessNotice) {
        let current = self.process.as_ref().map(ProcessHandle::run);
        if current != Some(notice.run) {
            // Each run reports its exit exactly once, and that report releases the handle
            if matches!(notice.event, ProcessEvent::Exited { .. }) {
                tracing::warn!(
                    server = %self.config.name,
                    run = %notice.run,
                    state = %self.state,
                    "Invariant violation: exit reported for a process this server does not own"
                );
            }
            return;
        }

        match notice.event {
            ProcessEvent::Ready => self.on_ready(),
            ProcessEvent::Exited { code } => self.on_exit(notice.run, code),
            ProcessEvent::Deadline(state) => self.on_deadline(state),
        }
    }

    fn on_ready(&mut self) {
        if self.state != RuntimeState::Starting {
            return;
        }

        // First runs generate server.properties while starting up
        match settings::read_port(&self.config.directory) {
            Ok(port) => self.port = port,
            Err(e) => {
                tracing::warn!(server = %self.config.name, error = %e, "Keeping previous port");
            }
        }

        self.transition(RuntimeState::Running);
        self.publish();
        tracing::info!(server = %self.config.name, port = %self.port, "Server is ready");

        if let Some(pending) = self.pending_start.take() {
            let _ = pending.send(true);
        }
    }

    fn on_exit(&mut self, run: RunId, code: Option<i32>) {
        let name = self.config.name.clone();
        // Release the handle first; the process is gone
        self.process = None;
        let pending_start = self.pending_start.take();
        let stop_waiters = std::mem::take(&mut self.stop_waiters);

        match self.state {
            RuntimeState::Starting => {
                tracing::warn!(server = %name, %run, ?code, "Server exited before it was ready");
                self.transition(RuntimeState::Stopped);
            }
            RuntimeState::Stopping => {
                tracing::info!(server = %name, ?code, "Server stopped");
                self.transition(RuntimeState::Stopped);
            }
            RuntimeState::Running => {
                tracing::warn!(server = %name, %run, ?code, "Server crashed");
                self.transition(RuntimeState::Stopped);
                self.restart_after_crash();
            }
            RuntimeState::Stopped => {
                tracing::error!(server = %name, %run, "Invariant violation: exit observed while stopped");
            }
        }

        self.publish();

        if let Some(pending) = pending_start {
            let _ = pending.send(false);
        }
        for waiter in stop_waiters {
            let _ = waiter.send(StopOutcome::Stopped);
        }
    }

    fn restart_after_crash(&mut self) {
        let name = self.config.name.clone();

        if self.shutting_down {
            return;
        }
        if let Some(max) = self.options.restart.max_attempts {
            if self.restarts >= max {
                tracing::error!(server = %name, restarts = self.restarts, "Restart limit reached, leaving server stopped");
                return;
            }
        }

        self.restarts += 1;
        tracing::info!(server = %name, attempt = self.restarts, "Restarting crashed server");
        // Nobody awaits an automatic restart; the outcome shows in the logs and events
        if let StartAck::Done(outcome) = self.begin_start(false) {
            tracing::error!(server = %name, ?outcome, "Automatic restart failed");
        }
    }

    fn on_deadline(&mut self, state: RuntimeState) {
        if self.state != state {
            return;
        }
        tracing::warn!(server = %self.config.name, %state, "Deadline elapsed, killing server");
        if let Some(process) = self.process.as_mut() {
            process.kill();
        }
    }

    fn transition(&mut self, to: RuntimeState) {
        let from = self.state;
        self.state = to;
        tracing::debug!(server = %self.config.name, %from, %to, "State transition");
        self.events.record(&self.config.name, from, to);
    }

    fn publish(&self) {
        let snapshot = ServerSnapshot {
            state: self.state,
            port: self.port,
            has_process: self.process.is_some(),
        };
        self.snapshot.send_replace(snapshot);
    }
}
