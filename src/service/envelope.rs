//! Result envelopes returned to the web app.
//!
//! Success: `{"data": {"codeHash": ..., "execResult": [...]}}`.
//! Failure: `{"errors": [{"message": ...}]}`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ErrorKind, ModelError, SupervisorError};
use crate::recording::TraceRecord;
use crate::supervisor::{Outcome, Submission};

/// Payload of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeData {
    /// blake3 hash of the submitted code.
    pub code_hash: String,
    /// Recorded steps, in execution order.
    pub exec_result: Vec<TraceRecord>,
    /// Set when steps beyond the record cap were dropped.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

/// One user-facing error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Short message.
    pub message: String,
}

/// Response envelope; exactly one of `data` and `errors` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EnvelopeData>,
    /// Present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ErrorEntry>>,
}

impl Envelope {
    /// Success envelope.
    pub fn success(code_hash: impl Into<String>, trace: Vec<TraceRecord>, truncated: bool) -> Self {
        Self {
            data: Some(EnvelopeData {
                code_hash: code_hash.into(),
                exec_result: trace,
                truncated,
            }),
            errors: None,
        }
    }

    /// Error envelope with a single message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: None,
            errors: Some(vec![ErrorEntry {
                message: message.into(),
            }]),
        }
    }

    /// Whether this is a success envelope.
    pub fn is_success(&self) -> bool {
        self.data.is_some()
    }

    /// First error message, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.errors
            .as_ref()
            .and_then(|errors| errors.first())
            .map(|entry| entry.message.as_str())
    }
}

/// Turns supervisor outcomes and errors into envelopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAssembler;

impl ResultAssembler {
    /// Envelope for a finished submission.
    pub fn from_submission(&self, submission: Submission) -> Envelope {
        match submission.outcome {
            Outcome::Completed { trace, truncated } => {
                Envelope::success(submission.code_hash, trace, truncated)
            }
            Outcome::Failed(failure) => Envelope::error(message(failure.kind, &failure.message)),
            Outcome::TimedOut(timeout) => Envelope::error(timeout_message(timeout)),
        }
    }

    /// Envelope for a submission the supervisor could not run.
    pub fn from_supervisor_error(&self, err: &SupervisorError) -> Envelope {
        let detail = match err {
            SupervisorError::InvalidCode(err) => err.to_string(),
            SupervisorError::NoSlot => "no worker slot available".to_string(),
            SupervisorError::Spawn(_) => "failed to start worker".to_string(),
            SupervisorError::Io(_) => "worker communication failed".to_string(),
            SupervisorError::MalformedReport(_) => "malformed worker report".to_string(),
            SupervisorError::Recording(_) => "session bookkeeping failed".to_string(),
        };
        Envelope::error(message(err.kind(), &detail))
    }

    /// Envelope for a graph that failed to decode.
    pub fn from_model_error(&self, err: &ModelError) -> Envelope {
        Envelope::error(message(err.kind(), &err.to_string()))
    }
}

/// User-facing message for an error of `kind`.
pub fn message(kind: ErrorKind, detail: &str) -> String {
    let detail = detail.trim().trim_end_matches('.');
    match kind {
        ErrorKind::Format | ErrorKind::Validation => format!("{}.", detail),
        ErrorKind::ExecutionException => format!("Exception: {}.", detail),
        ErrorKind::Unknown => format!("Unknown Exception: {}.", detail),
        ErrorKind::TimedOut => format!("Timeout: {}.", detail),
    }
}

/// Message for a run killed at `timeout`.
pub fn timeout_message(timeout: Duration) -> String {
    format!(
        "Timeout: Code running timed out after {} s.",
        format_seconds(timeout)
    )
}

fn format_seconds(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        duration.as_secs().to_string()
    } else {
        format!("{:.3}", duration.as_secs_f64())
            .trim_end_matches('0')
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::ExecutionFailure;
    use serde_json::{Map, json};
    use uuid::Uuid;

    fn submission(outcome: Outcome) -> Submission {
        Submission {
            session_id: Uuid::new_v4(),
            code_hash: "abc".to_string(),
            outcome,
        }
    }

    #[test]
    fn success_envelope_shape() {
        let record = TraceRecord {
            step: 1,
            line: 1,
            variables: Map::new(),
        };
        let envelope = ResultAssembler.from_submission(submission(Outcome::Completed {
            trace: vec![record],
            truncated: false,
        }));
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"data": {"codeHash": "abc", "execResult": [{"step": 1, "line": 1, "variables": {}}]}})
        );
    }

    #[test]
    fn failures_carry_one_short_message() {
        let envelope = ResultAssembler.from_submission(submission(Outcome::TimedOut(
            Duration::from_secs(2),
        )));
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"errors": [{"message": "Timeout: Code running timed out after 2 s."}]})
        );

        let envelope = ResultAssembler.from_submission(submission(Outcome::Failed(
            ExecutionFailure {
                kind: ErrorKind::ExecutionException,
                message: "boom".into(),
                trace: Vec::new(),
            },
        )));
        assert_eq!(envelope.error_message(), Some("Exception: boom."));
    }

    #[test]
    fn internal_details_are_not_forwarded() {
        let err = SupervisorError::Spawn(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "/opt/secret/graphtrace-worker",
        ));
        let envelope = ResultAssembler.from_supervisor_error(&err);
        assert_eq!(
            envelope.error_message(),
            Some("Unknown Exception: failed to start worker.")
        );
    }

    #[test]
    fn fractional_timeouts_are_trimmed() {
        assert_eq!(
            timeout_message(Duration::from_millis(1500)),
            "Timeout: Code running timed out after 1.5 s."
        );
    }
}
