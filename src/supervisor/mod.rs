//! Execution supervisor.
//!
//! Every submission runs in a freshly spawned `graphtrace-worker` process. The
//! supervisor validates the code first (invalid code never reaches a worker),
//! takes a slot from a bounded pool, spawns the worker, and waits for its
//! report against a hard deadline. A worker that misses the deadline is killed;
//! the executed code is never trusted to cooperate.

/// Configuration and persistence.
pub mod config;
/// Supervisor/worker pipe protocol.
pub mod protocol;
/// Bounded worker slot pool.
pub mod slots;
/// Worker-side job execution.
pub mod worker;

pub use config::{SupervisorConfig, WORKER_BINARY, WorkerLimits};
pub use protocol::{FailureKind, WORKER_PROTOCOL_VERSION, WorkerJob, WorkerReport};
pub use slots::WorkerSlots;

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::error::{ErrorKind, SupervisorError};
use crate::graph::{Graph, codec};
use crate::recording::{ExecutionSession, SessionState, TraceRecord, close_area, remove_area};
use crate::script::compile;

/// Largest report the supervisor will read from a worker.
pub const MAX_REPORT_BYTES: u64 = 256 * 1024 * 1024;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A failed run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionFailure {
    /// User-facing classification.
    pub kind: ErrorKind,
    /// Short message, free of internal details.
    pub message: String,
    /// Steps recorded before the failure.
    pub trace: Vec<TraceRecord>,
}

/// How a submission ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The code ran to completion.
    Completed {
        /// Recorded steps.
        trace: Vec<TraceRecord>,
        /// Whether steps beyond the record cap were dropped.
        truncated: bool,
    },
    /// The code raised, or the worker died.
    Failed(ExecutionFailure),
    /// The worker was killed at the deadline.
    TimedOut(Duration),
}

impl Outcome {
    /// Terminal session state for this outcome.
    pub fn session_state(&self) -> SessionState {
        match self {
            Outcome::Completed { .. } => SessionState::Completed,
            Outcome::Failed(_) => SessionState::Failed,
            Outcome::TimedOut(_) => SessionState::TimedOut,
        }
    }
}

/// Result of one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// Session id (also names the worker's recording area).
    pub session_id: Uuid,
    /// blake3 hash of the submitted code.
    pub code_hash: String,
    /// How the run ended.
    pub outcome: Outcome,
}

/// Runs submissions in isolated, time-bounded worker processes.
#[derive(Debug)]
pub struct Supervisor {
    config: SupervisorConfig,
    worker_program: PathBuf,
    slots: WorkerSlots,
}

impl Supervisor {
    /// Create a supervisor, resolving the worker executable.
    pub fn new(config: SupervisorConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let worker_program = config.resolve_worker_program()?;
        tracing::info!(
            "supervisor ready: worker {:?}, {} slots",
            worker_program,
            config.max_workers
        );
        Ok(Self {
            slots: WorkerSlots::new(config.max_workers),
            worker_program,
            config,
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Worker executable in use.
    pub fn worker_program(&self) -> &Path {
        &self.worker_program
    }

    /// Worker slots currently held.
    pub fn active_workers(&self) -> usize {
        self.slots.in_use()
    }

    /// Submit with the configured default timeout.
    pub fn submit_default(&self, code: &str, graph: &Graph) -> Result<Submission, SupervisorError> {
        self.submit(code, graph, self.config.timeout())
    }

    /// Run `code` against `graph` in a fresh worker, killing it after `timeout`.
    ///
    /// Code that does not compile is rejected without spawning anything. Slot
    /// waiting and execution share one deadline of `timeout` from entry, so the
    /// call returns within `timeout` plus the time needed to kill and reap the
    /// worker.
    pub fn submit(
        &self,
        code: &str,
        graph: &Graph,
        timeout: Duration,
    ) -> Result<Submission, SupervisorError> {
        let deadline = Instant::now() + timeout;
        compile(code)?;

        let mut session = ExecutionSession::new(code);
        tracing::info!(
            session = %session.id(),
            code_hash = %&session.code_hash()[..16],
            "submission accepted"
        );

        let _slot = self
            .slots
            .acquire(deadline.saturating_duration_since(Instant::now()))
            .ok_or(SupervisorError::NoSlot)?;
        let job = WorkerJob {
            protocol: WORKER_PROTOCOL_VERSION,
            session_id: session.id(),
            code: code.to_string(),
            graph: codec::encode(graph),
            recording: self.config.recording.clone(),
            max_call_depth: self.config.max_call_depth,
            limits: self.config.limits.clone(),
        };
        let payload = serde_json::to_vec(&job).map_err(io::Error::from)?;

        let mut child = Command::new(&self.worker_program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(SupervisorError::Spawn)?;
        session.transition(SessionState::Running)?;
        tracing::debug!(session = %session.id(), "worker spawned");

        let outcome = match self.await_report(&mut child, payload, deadline) {
            Ok(Some(output)) => match wait_until(&mut child, deadline)? {
                Some(status) => interpret(&output, status)?,
                None => self.kill(&mut child, &session, timeout),
            },
            Ok(None) => self.kill(&mut child, &session, timeout),
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err);
            }
        };

        session.transition(outcome.session_state())?;
        tracing::info!(
            session = %session.id(),
            state = ?session.state(),
            "submission finished"
        );
        Ok(Submission {
            session_id: session.id(),
            code_hash: session.code_hash().to_string(),
            outcome,
        })
    }

    /// Feed the job and collect stdout on a helper thread. `None` means the
    /// deadline passed first.
    fn await_report(
        &self,
        child: &mut Child,
        payload: Vec<u8>,
        deadline: Instant,
    ) -> Result<Option<Vec<u8>>, SupervisorError> {
        let (Some(mut stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(SupervisorError::Io(io::Error::other("worker pipes unavailable")));
        };

        let (tx, rx) = mpsc::channel();
        let pump = thread::spawn(move || {
            let result = (|| -> io::Result<Vec<u8>> {
                // A worker that exits early closes its stdin; the report
                // still tells what happened.
                if let Err(err) = stdin.write_all(&payload) {
                    if err.kind() != io::ErrorKind::BrokenPipe {
                        return Err(err);
                    }
                }
                drop(stdin);
                let mut output = Vec::new();
                stdout.take(MAX_REPORT_BYTES).read_to_end(&mut output)?;
                Ok(output)
            })();
            let _ = tx.send(result);
        });

        let remaining = deadline.saturating_duration_since(Instant::now());
        let received = rx.recv_timeout(remaining);
        match received {
            Ok(result) => {
                let _ = pump.join();
                Ok(Some(result?))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(SupervisorError::Io(
                io::Error::other("worker pipe thread exited unexpectedly"),
            )),
        }
    }

    fn kill(&self, child: &mut Child, session: &ExecutionSession, timeout: Duration) -> Outcome {
        tracing::warn!(
            session = %session.id(),
            "worker exceeded {:?}, killing it",
            timeout
        );
        if let Err(err) = child.kill() {
            tracing::warn!("failed to kill worker: {}", err);
        }
        if let Err(err) = child.wait() {
            tracing::warn!("failed to reap worker: {}", err);
        }
        let area = self.config.recording.root.join(session.area_name());
        if self.config.recording.auto_delete {
            if let Err(err) = remove_area(&area) {
                tracing::warn!("failed to remove recording area {:?}: {}", area, err);
            }
        } else if let Err(err) = close_area(&area, SessionState::TimedOut) {
            tracing::warn!("failed to close recording area {:?}: {}", area, err);
        }
        Outcome::TimedOut(timeout)
    }
}

/// Poll for worker exit until the deadline. `None` means it is still running.
fn wait_until(child: &mut Child, deadline: Instant) -> Result<Option<ExitStatus>, SupervisorError> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

/// Turn worker output and exit status into an outcome.
fn interpret(output: &[u8], status: ExitStatus) -> Result<Outcome, SupervisorError> {
    let text = String::from_utf8_lossy(output);
    let Some(line) = text.lines().rev().find(|line| !line.trim().is_empty()) else {
        tracing::warn!("worker exited without a report ({})", status);
        return Ok(Outcome::Failed(ExecutionFailure {
            kind: ErrorKind::ExecutionException,
            message: "worker terminated abnormally".into(),
            trace: Vec::new(),
        }));
    };

    let report: WorkerReport = serde_json::from_str(line)
        .map_err(|err| SupervisorError::MalformedReport(err.to_string()))?;
    Ok(match report {
        WorkerReport::Completed { trace, truncated } => Outcome::Completed { trace, truncated },
        WorkerReport::Failed {
            kind,
            message,
            trace,
        } => Outcome::Failed(ExecutionFailure {
            kind: kind.into(),
            message,
            trace,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn status(code: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }

    #[cfg(unix)]
    #[test]
    fn missing_report_is_an_execution_failure() {
        let outcome = interpret(b"", status(1)).unwrap();
        match outcome {
            Outcome::Failed(failure) => {
                assert_eq!(failure.kind, ErrorKind::ExecutionException);
                assert_eq!(failure.message, "worker terminated abnormally");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn garbage_report_is_malformed() {
        assert!(matches!(
            interpret(b"hello\n", status(0)),
            Err(SupervisorError::MalformedReport(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn failure_kinds_map_to_error_kinds() {
        let line = br#"{"status":"failed","kind":"validation","message":"bad","trace":[]}"#;
        match interpret(line, status(0)).unwrap() {
            Outcome::Failed(failure) => assert_eq!(failure.kind, ErrorKind::Validation),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn invalid_code_never_spawns() {
        let config = SupervisorConfig {
            worker_program: Some(PathBuf::from("/nonexistent/graphtrace-worker")),
            ..SupervisorConfig::default()
        };
        let supervisor = Supervisor::new(config).unwrap();
        let err = supervisor
            .submit("(define", &Graph::new(), Duration::from_secs(1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
