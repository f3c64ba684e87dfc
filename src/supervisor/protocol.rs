use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::WorkerLimits;
use crate::error::ErrorKind;
use crate::recording::{RecordingConfig, TraceRecord};

/// Version of the supervisor/worker pipe protocol.
pub const WORKER_PROTOCOL_VERSION: u32 = 1;

/// Job written to the worker's stdin as a single JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerJob {
    /// Pipe protocol version.
    pub protocol: u32,
    /// Session id chosen by the supervisor; names the recording area.
    pub session_id: Uuid,
    /// Submitted code.
    pub code: String,
    /// Graph in the external node/edge format.
    pub graph: serde_json::Value,
    /// Recording area settings.
    pub recording: RecordingConfig,
    /// Cap on nested function calls.
    pub max_call_depth: usize,
    /// OS resource limits to apply before running code.
    pub limits: WorkerLimits,
}

/// Classification of a failed run, as reported by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The graph in the job did not decode.
    Format,
    /// The code did not parse or validate.
    Validation,
    /// The code raised or failed at runtime.
    Execution,
    /// The worker itself failed (recording, panic, bad job).
    Internal,
}

impl From<FailureKind> for ErrorKind {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Format => ErrorKind::Format,
            FailureKind::Validation => ErrorKind::Validation,
            FailureKind::Execution => ErrorKind::ExecutionException,
            FailureKind::Internal => ErrorKind::Unknown,
        }
    }
}

/// Single JSON line the worker writes to stdout before exiting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerReport {
    /// The code ran to completion.
    Completed {
        /// Recorded steps.
        trace: Vec<TraceRecord>,
        /// Whether steps beyond the record cap were dropped.
        truncated: bool,
    },
    /// The run failed.
    Failed {
        /// Failure class.
        kind: FailureKind,
        /// Short, user-presentable message.
        message: String,
        /// Steps recorded before the failure.
        trace: Vec<TraceRecord>,
    },
}

impl WorkerReport {
    /// Failure report with an empty trace.
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        WorkerReport::Failed {
            kind,
            message: message.into(),
            trace: Vec::new(),
        }
    }
}
