// src/server/process.rs
use crate::error::{Error, Result};
use crate::server::RuntimeState;
use async_process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use futures_lite::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use std::fmt;
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Longest console line kept; the rest of a longer line is discarded.
const MAX_LINE_LEN: usize = 64 * 1024;

/// Unique identifier for one spawned server process
///
/// A server gets a fresh id every time it is (re)started, so notifications
/// from a previous process can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(Uuid);

impl RunId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Something a watcher task observed about a process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessEvent {
    /// A stdout line contained the ready marker
    Ready,
    /// The process terminated
    Exited { code: Option<i32> },
    /// A configured deadline for leaving `RuntimeState` elapsed
    Deadline(RuntimeState),
}

/// Message from a watcher task to the owning supervisor
#[derive(Debug, Clone, Copy)]
pub(crate) struct ProcessNotice {
    pub run: RunId,
    pub event: ProcessEvent,
}

/// Exclusive handle to a running server process.
///
/// The `Child` itself lives in the exit watcher task; the handle keeps stdin
/// and a kill switch. Dropping the handle kills the process.
pub(crate) struct ProcessHandle {
    run: RunId,
    pid: u32,
    stdin: Option<ChildStdin>,
    kill: Option<oneshot::Sender<()>>,
}

impl ProcessHandle {
    /// Spawn `directory/entry_point` with `directory` as working directory and
    /// start the watcher tasks that report to `notices`.
    pub fn spawn(
        name: &str,
        directory: &Path,
        entry_point: &str,
        ready_marker: &str,
        notices: mpsc::Sender<ProcessNotice>,
    ) -> Result<Self> {
        let script = directory.join(entry_point);

        let mut command = Command::new(&script);
        command
            .current_dir(directory)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            Error::Process(format!("Failed to start {}: {}", script.display(), e))
        })?;

        let run = RunId::new();
        let pid = child.id();
        let stdin = child.stdin.take();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(scan_stdout(
                name.to_string(),
                run,
                stdout,
                ready_marker.to_string(),
                notices.clone(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_stderr(name.to_string(), stderr));
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(watch_exit(name.to_string(), run, child, kill_rx, notices));

        tracing::debug!(server = %name, %run, pid, "Spawned server process");

        Ok(Self {
            run,
            pid,
            stdin,
            kill: Some(kill_tx),
        })
    }

    pub fn run(&self) -> RunId {
        self.run
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Write one command line to the process's stdin
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::Process("Process has no stdin pipe".to_string()))?;

        let mut data = line.as_bytes().to_vec();
        data.push(b'\n');
        stdin
            .write_all(&data)
            .await
            .map_err(|e| Error::Process(format!("Failed to write to stdin: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| Error::Process(format!("Failed to flush stdin: {}", e)))
    }

    /// Ask the exit watcher to terminate the process. The exit is still
    /// reported through the usual notice.
    pub fn kill(&mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

/// Report `event` for `run` unless the process leaves `state` within `after`.
pub(crate) fn schedule_deadline(
    run: RunId,
    state: RuntimeState,
    after: Duration,
    notices: mpsc::Sender<ProcessNotice>,
) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let _ = notices
            .send(ProcessNotice {
                run,
                event: ProcessEvent::Deadline(state),
            })
            .await;
    });
}

async fn scan_stdout(
    name: String,
    run: RunId,
    stdout: ChildStdout,
    ready_marker: String,
    notices: mpsc::Sender<ProcessNotice>,
) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    let mut ready = false;

    loop {
        match read_line_capped(&mut reader, &mut buf).await {
            Ok(0) => break, // EOF
            Ok(_) => {
                // Server output is not guaranteed to be valid UTF-8
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end();
                tracing::debug!(server = %name, "{}", line);

                if !ready && line.contains(&ready_marker) {
                    ready = true;
                    // Keep draining even if nobody listens, so the pipe never fills up
                    let _ = notices
                        .send(ProcessNotice {
                            run,
                            event: ProcessEvent::Ready,
                        })
                        .await;
                }
            }
            Err(e) => {
                tracing::debug!(server = %name, error = %e, "Stopped reading stdout");
                break;
            }
        }
    }
}

/// Read one line into `buf`, keeping at most [`MAX_LINE_LEN`] bytes of it.
/// Returns the number of bytes kept, 0 at EOF.
async fn read_line_capped<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> io::Result<usize> {
    buf.clear();
    let kept = (&mut *reader)
        .take(MAX_LINE_LEN as u64)
        .read_until(b'\n', buf)
        .await?;

    if kept == MAX_LINE_LEN && buf.last() != Some(&b'\n') {
        let mut overflow = Vec::new();
        loop {
            overflow.clear();
            let read = (&mut *reader)
                .take(MAX_LINE_LEN as u64)
                .read_until(b'\n', &mut overflow)
                .await?;
            if read == 0 || overflow.last() == Some(&b'\n') {
                break;
            }
        }
    }

    Ok(kept)
}

async fn log_stderr(name: String, stderr: ChildStderr) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();

    loop {
        match read_line_capped(&mut reader, &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                tracing::debug!(server = %name, stream = "stderr", "{}", line.trim_end());
            }
        }
    }
}

async fn watch_exit(
    name: String,
    run: RunId,
    mut child: Child,
    mut kill: oneshot::Receiver<()>,
    notices: mpsc::Sender<ProcessNotice>,
) {
    // Either the process exits on its own, or the handle asks for (or is
    // dropped, which also means) termination.
    let exited = tokio::select! {
        status = child.status() => Some(status),
        _ = &mut kill => None,
    };

    let status = match exited {
        Some(status) => status,
        None => {
            tracing::warn!(server = %name, %run, "Killing server process");
            if let Err(e) = child.kill() {
                tracing::warn!(server = %name, error = %e, "Failed to kill server process");
            }
            child.status().await
        }
    };

    let code = match status {
        Ok(status) => {
            tracing::debug!(server = %name, %run, %status, "Server process exited");
            status.code()
        }
        Err(e) => {
            tracing::warn!(server = %name, %run, error = %e, "Failed to wait for server process");
            None
        }
    };

    let _ = notices
        .send(ProcessNotice {
            run,
            event: ProcessEvent::Exited { code },
        })
        .await;
}
