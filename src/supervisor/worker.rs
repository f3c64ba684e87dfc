//! Worker side of the supervisor protocol.
//!
//! The worker reads one [`WorkerJob`] from stdin, applies OS resource limits,
//! runs the code under a [`TracingController`] scope and writes one
//! [`WorkerReport`] line to stdout. Every failure it can observe is turned into
//! a report; only signals and aborts end the process without one.

use anyhow::{Context, Result};
use std::io::{Read, Write};
use std::thread;

use super::config::WorkerLimits;
use super::protocol::{FailureKind, WORKER_PROTOCOL_VERSION, WorkerJob, WorkerReport};
use crate::graph::codec;
use crate::recording::{ExecutionSession, SessionState, TracingController};
use crate::script::{Interpreter, RunError, compile};

/// Stack size of the thread running the interpreter.
pub const INTERPRETER_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Read a job from `input`, execute it and write the report to `output`.
pub fn run_worker<R: Read, W: Write>(mut input: R, mut output: W) -> Result<()> {
    let mut raw = String::new();
    input
        .read_to_string(&mut raw)
        .context("Failed to read job from stdin")?;

    let report = match serde_json::from_str::<WorkerJob>(&raw) {
        Ok(job) if job.protocol != WORKER_PROTOCOL_VERSION => WorkerReport::failed(
            FailureKind::Internal,
            format!(
                "worker protocol mismatch: expected {}, got {}",
                WORKER_PROTOCOL_VERSION, job.protocol
            ),
        ),
        Ok(job) => {
            if let Err(err) = apply_limits(&job.limits) {
                tracing::warn!("failed to apply worker limits: {}", err);
            }
            execute_isolated(job)
        }
        Err(err) => WorkerReport::failed(FailureKind::Internal, format!("malformed job: {}", err)),
    };

    serde_json::to_writer(&mut output, &report).context("Failed to encode report")?;
    output.write_all(b"\n").context("Failed to write report")?;
    output.flush().context("Failed to flush report")?;
    Ok(())
}

/// Run the job on a dedicated thread with a large stack; a panic becomes an
/// internal failure report.
pub fn execute_isolated(job: WorkerJob) -> WorkerReport {
    let spawned = thread::Builder::new()
        .name("graphtrace-interpreter".into())
        .stack_size(INTERPRETER_STACK_SIZE)
        .spawn(move || execute_job(job));
    match spawned {
        Ok(handle) => handle.join().unwrap_or_else(|_| {
            WorkerReport::failed(FailureKind::Internal, "worker panicked while executing code")
        }),
        Err(err) => {
            tracing::warn!("cannot start interpreter thread: {}", err);
            WorkerReport::failed(FailureKind::Internal, "cannot start interpreter")
        }
    }
}

/// Execute a job in the current thread.
pub fn execute_job(job: WorkerJob) -> WorkerReport {
    let program = match compile(&job.code) {
        Ok(program) => program,
        Err(err) => return WorkerReport::failed(FailureKind::Validation, err.to_string()),
    };
    let mut graph = match codec::decode(&job.graph) {
        Ok(graph) => graph,
        Err(err) => return WorkerReport::failed(FailureKind::Format, err.to_string()),
    };

    let mut session = ExecutionSession::with_id(job.session_id, &job.code);
    let mut controller = TracingController::new(job.recording.clone());
    let mut scope = match controller.acquire(&mut session) {
        Ok(scope) => scope,
        Err(err) => {
            tracing::warn!("cannot start recording: {}", err);
            return WorkerReport::failed(FailureKind::Internal, "cannot start recording");
        }
    };

    tracing::debug!(session = %job.session_id, "executing code");
    let result = Interpreter::new(&program, &mut graph, &mut scope)
        .with_max_call_depth(job.max_call_depth)
        .run();

    let failure = match result {
        Ok(()) => None,
        Err(RunError::Script(err)) => Some((FailureKind::Execution, err.to_string())),
        Err(RunError::Hook(err)) => {
            tracing::warn!("recording failed: {}", err);
            Some((FailureKind::Internal, "recording failed".to_string()))
        }
    };
    let state = if failure.is_some() {
        SessionState::Failed
    } else {
        SessionState::Completed
    };
    if let Err(err) = scope.finish(state) {
        tracing::warn!("failed to release recording: {}", err);
    }

    let truncated = session.truncated();
    let trace = session.into_trace();
    match failure {
        None => WorkerReport::Completed { trace, truncated },
        Some((kind, message)) => WorkerReport::Failed {
            kind,
            message,
            trace,
        },
    }
}

/// Apply CPU and address-space limits to the current process.
#[cfg(unix)]
pub fn apply_limits(limits: &WorkerLimits) -> std::io::Result<()> {
    fn clamp(current: &libc::rlimit, wanted: u64) -> libc::rlimit {
        let value = (wanted as libc::rlim_t).min(current.rlim_max);
        libc::rlimit {
            rlim_cur: value,
            rlim_max: value,
        }
    }

    let mut current = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    if let Some(seconds) = limits.cpu_seconds {
        // SAFETY: `current` is a valid, writable rlimit.
        if unsafe { libc::getrlimit(libc::RLIMIT_CPU, &mut current) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
        let limit = clamp(&current, seconds);
        // SAFETY: `limit` is a valid rlimit.
        if unsafe { libc::setrlimit(libc::RLIMIT_CPU, &limit) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    if let Some(bytes) = limits.memory_bytes {
        // SAFETY: `current` is a valid, writable rlimit.
        if unsafe { libc::getrlimit(libc::RLIMIT_AS, &mut current) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
        let limit = clamp(&current, bytes);
        // SAFETY: `limit` is a valid rlimit.
        if unsafe { libc::setrlimit(libc::RLIMIT_AS, &limit) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Resource limits are not supported on this platform.
#[cfg(not(unix))]
pub fn apply_limits(limits: &WorkerLimits) -> std::io::Result<()> {
    if limits.cpu_seconds.is_some() || limits.memory_bytes.is_some() {
        tracing::debug!("worker resource limits are not supported on this platform");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingConfig;
    use serde_json::json;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn job(root: &TempDir, code: &str) -> WorkerJob {
        WorkerJob {
            protocol: WORKER_PROTOCOL_VERSION,
            session_id: Uuid::new_v4(),
            code: code.to_string(),
            graph: json!({"elements": {"nodes": [{"data": {"id": "a"}}]}}),
            recording: RecordingConfig {
                root: root.path().to_path_buf(),
                auto_delete: true,
                max_records: 100,
            },
            max_call_depth: 32,
            limits: WorkerLimits {
                cpu_seconds: None,
                memory_bytes: None,
            },
        }
    }

    #[test]
    fn reports_trace_of_completed_run() {
        let root = TempDir::new().unwrap();
        let report = execute_job(job(&root, "(define n (node \"a\"))\n(define k (id n))"));
        match report {
            WorkerReport::Completed { trace, truncated } => {
                assert!(!truncated);
                assert_eq!(trace.len(), 2);
                assert_eq!(trace[1].variables["n"], json!("Node(id: a)"));
                assert_eq!(trace[1].variables["k"], json!("a"));
            }
            other => panic!("unexpected report: {:?}", other),
        }
    }

    #[test]
    fn classifies_failures() {
        let root = TempDir::new().unwrap();
        assert!(matches!(
            execute_job(job(&root, "(define")),
            WorkerReport::Failed { kind: FailureKind::Validation, .. }
        ));
        assert!(matches!(
            execute_job(job(&root, "(define a 1)\n(raise \"nope\")")),
            WorkerReport::Failed { kind: FailureKind::Execution, ref trace, .. } if trace.len() == 1
        ));
    }

    #[test]
    fn pipe_round_trip_writes_one_line() {
        let root = TempDir::new().unwrap();
        let input = serde_json::to_vec(&job(&root, "(define a 1)")).unwrap();
        let mut output = Vec::new();
        run_worker(input.as_slice(), &mut output).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.lines().count(), 1);
        let report: WorkerReport = serde_json::from_str(text.trim()).unwrap();
        assert!(matches!(report, WorkerReport::Completed { .. }));
    }

    #[test]
    fn malformed_job_is_reported() {
        let mut output = Vec::new();
        run_worker("not json".as_bytes(), &mut output).unwrap();
        let report: WorkerReport = serde_json::from_slice(&output).unwrap();
        assert!(matches!(report, WorkerReport::Failed { kind: FailureKind::Internal, .. }));
    }
}
