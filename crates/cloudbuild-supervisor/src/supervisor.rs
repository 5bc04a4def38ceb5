//! Process group supervisor.

use chrono::Utc;
use cloudbuild_core::process::{LabelColor, LabeledLine, LineSink, OutputStream, ProcessSpec};
use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Exit code reported when the group is stopped by Ctrl-C.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// How long to keep draining output after a process has exited.
const READER_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("no processes to supervise")]
    Empty,

    #[error("failed to start {label}: {source}")]
    Spawn {
        label: String,
        #[source]
        source: std::io::Error,
    },
}

/// How a supervised group ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorExit {
    /// Exit code of the group: 0, the first failing process's code, or
    /// [`INTERRUPTED_EXIT_CODE`].
    pub code: i32,
    /// Label of the process that brought the group down.
    pub failed: Option<String>,
}

impl SupervisorExit {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// True when Ctrl-C stopped the group rather than one of its members.
    pub fn was_interrupted(&self) -> bool {
        self.failed.is_none() && self.code == INTERRUPTED_EXIT_CODE
    }
}

/// Runs a group of processes and forwards their output to a [`LineSink`].
pub struct Supervisor {
    sink: Arc<dyn LineSink>,
    handle_interrupt: bool,
}

impl Supervisor {
    pub fn new(sink: Arc<dyn LineSink>) -> Self {
        Self {
            sink,
            handle_interrupt: true,
        }
    }

    /// Whether Ctrl-C stops the group. Enabled by default.
    pub fn with_interrupt_handling(mut self, enabled: bool) -> Self {
        self.handle_interrupt = enabled;
        self
    }

    /// Start every process and wait until the group ends.
    ///
    /// The group ends when all processes exit with code 0, when any process
    /// exits with another code (the others are killed), or on Ctrl-C.
    pub async fn supervise_all(
        &self,
        specs: Vec<ProcessSpec>,
    ) -> Result<SupervisorExit, SupervisorError> {
        self.run_group(specs, interrupted(self.handle_interrupt)).await
    }

    /// Run the group until it ends on its own or `interrupt` resolves.
    async fn run_group<I>(
        &self,
        specs: Vec<ProcessSpec>,
        interrupt: I,
    ) -> Result<SupervisorExit, SupervisorError>
    where
        I: Future<Output = ()>,
    {
        if specs.is_empty() {
            return Err(SupervisorError::Empty);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (exit_tx, mut exit_rx) = mpsc::unbounded_channel::<(String, i32)>();
        let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(specs.len());

        for spec in specs {
            let child = match spawn(&spec) {
                Ok(child) => child,
                Err(source) => {
                    let _ = shutdown_tx.send(true);
                    join_all(tasks).await;
                    return Err(SupervisorError::Spawn {
                        label: spec.label,
                        source,
                    });
                }
            };

            info!(label = %spec.label, program = %spec.program, pid = ?child.id(), "Started process");
            tasks.push(tokio::spawn(watch_process(
                spec,
                child,
                self.sink.clone(),
                shutdown_rx.clone(),
                exit_tx.clone(),
            )));
        }
        drop(exit_tx);

        // Polled across iterations so a signal between exits is not lost.
        tokio::pin!(interrupt);

        let mut running = tasks.len();
        let outcome = loop {
            tokio::select! {
                exit = exit_rx.recv() => match exit {
                    Some((label, code)) => {
                        running = running.saturating_sub(1);
                        if code != 0 {
                            warn!(label = %label, code, "Process failed, stopping the others");
                            break SupervisorExit { code, failed: Some(label) };
                        }
                        debug!(label = %label, "Process exited cleanly");
                        if running == 0 {
                            break SupervisorExit { code: 0, failed: None };
                        }
                    }
                    None => break SupervisorExit { code: 0, failed: None },
                },
                _ = &mut interrupt => {
                    info!("Interrupted, stopping all processes");
                    break SupervisorExit { code: INTERRUPTED_EXIT_CODE, failed: None };
                }
            }
        };

        let _ = shutdown_tx.send(true);
        join_all(tasks).await;

        Ok(outcome)
    }
}

fn spawn(spec: &ProcessSpec) -> std::io::Result<Child> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Lead a fresh process group so teardown reaches helpers the child forks.
    #[cfg(unix)]
    cmd.process_group(0);

    if let Some(dir) = &spec.working_dir {
        cmd.current_dir(dir);
    }

    cmd.spawn()
}

async fn join_all(tasks: Vec<JoinHandle<()>>) {
    for task in tasks {
        let _ = task.await;
    }
}

/// SIGKILL every member of the group led by `pid`.
#[cfg(unix)]
fn kill_group(label: &str, pid: Option<u32>) {
    let Some(pid) = pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return;
    };
    // SAFETY: killpg only takes plain integers; the group was created by
    // `spawn`, so it never names the supervisor's own group.
    let rc = unsafe { libc::killpg(pid, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(label = %label, error = %err, "Failed to kill process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_label: &str, _pid: Option<u32>) {}

async fn interrupted(enabled: bool) {
    if enabled && tokio::signal::ctrl_c().await.is_ok() {
        return;
    }
    std::future::pending::<()>().await
}

/// Own one child: forward its output, wait for it, and kill it on shutdown.
async fn watch_process(
    spec: ProcessSpec,
    mut child: Child,
    sink: Arc<dyn LineSink>,
    mut shutdown: watch::Receiver<bool>,
    exits: mpsc::UnboundedSender<(String, i32)>,
) {
    let pid = child.id();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(forward_lines(
            stdout,
            OutputStream::Stdout,
            spec.label.clone(),
            spec.color,
            sink.clone(),
        )));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(forward_lines(
            stderr,
            OutputStream::Stderr,
            spec.label.clone(),
            spec.color,
            sink,
        )));
    }

    tokio::select! {
        status = child.wait() => {
            kill_group(&spec.label, pid);

            // Drain what is left, but never wait on pipes a grandchild keeps open.
            for mut reader in readers {
                if tokio::time::timeout(READER_GRACE, &mut reader).await.is_err() {
                    reader.abort();
                }
            }

            let code = match status {
                Ok(status) => status.code().unwrap_or(1),
                Err(e) => {
                    warn!(label = %spec.label, error = %e, "Failed to wait for process");
                    1
                }
            };
            let _ = exits.send((spec.label, code));
        }
        _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
            debug!(label = %spec.label, "Killing process");
            kill_group(&spec.label, pid);
            if let Err(e) = child.kill().await {
                warn!(label = %spec.label, error = %e, "Failed to kill process");
            }
            for reader in readers {
                reader.abort();
            }
        }
    }
}

/// Forward non-empty lines from one output stream.
async fn forward_lines<R>(
    reader: R,
    stream: OutputStream,
    label: String,
    color: LabelColor,
    sink: Arc<dyn LineSink>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let content = String::from_utf8_lossy(&buf);
                let content = content.trim_end_matches(['\n', '\r']);
                if content.trim().is_empty() {
                    continue;
                }
                sink.line(LabeledLine {
                    timestamp: Utc::now(),
                    label: label.clone(),
                    color,
                    stream,
                    content: content.to_string(),
                });
            }
            Err(e) => {
                warn!(label = %label, error = %e, "Error reading process output");
                break;
            }
        }
    }
}
