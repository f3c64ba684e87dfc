use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use uuid::Uuid;

use crate::error::{RecordingError, RecordingResult};
use crate::script::StepContext;

/// Snapshot of program state at one completed statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// 0-based step index within the session.
    pub step: u64,
    /// Source line of the completed statement.
    pub line: u32,
    /// Bindings visible in the current frame, rendered as JSON.
    pub variables: Map<String, serde_json::Value>,
}

impl TraceRecord {
    /// Capture a record from the interpreter's step context.
    pub fn capture(step: u64, context: &StepContext<'_>) -> Self {
        let variables = context
            .bindings
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        Self {
            step,
            line: context.line,
            variables,
        }
    }
}

/// Lifecycle of an execution session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Created, not yet executing.
    Preparing,
    /// Code is executing.
    Running,
    /// Code ran to completion.
    Completed,
    /// Code raised or the run was aborted.
    Failed,
    /// The run exceeded its wall-clock budget.
    TimedOut,
}

impl SessionState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::TimedOut
        )
    }

    /// Whether `self -> to` is a legal transition.
    pub fn can_transition(self, to: SessionState) -> bool {
        match (self, to) {
            (SessionState::Preparing, SessionState::Running) => true,
            (SessionState::Preparing | SessionState::Running, SessionState::Failed) => true,
            (SessionState::Preparing | SessionState::Running, SessionState::TimedOut) => true,
            (SessionState::Running, SessionState::Completed) => true,
            _ => false,
        }
    }
}

/// Content hash identifying submitted code.
pub fn code_hash(code: &str) -> String {
    blake3::hash(code.as_bytes()).to_hex().to_string()
}

/// One execution of submitted code and the trace it produced.
#[derive(Debug, Clone)]
pub struct ExecutionSession {
    id: Uuid,
    code_hash: String,
    state: SessionState,
    trace: Vec<TraceRecord>,
    truncated: bool,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl ExecutionSession {
    /// Create a session for `code` with a fresh id.
    pub fn new(code: &str) -> Self {
        Self::with_id(Uuid::new_v4(), code)
    }

    /// Create a session with a caller-chosen id (the supervisor picks ids so it
    /// can find the recording area of a killed worker).
    pub fn with_id(id: Uuid, code: &str) -> Self {
        Self {
            id,
            code_hash: code_hash(code),
            state: SessionState::Preparing,
            trace: Vec::new(),
            truncated: false,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Session id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// blake3 hash of the submitted code.
    pub fn code_hash(&self) -> &str {
        &self.code_hash
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `to`, rejecting illegal transitions.
    pub fn transition(&mut self, to: SessionState) -> RecordingResult<()> {
        if !self.state.can_transition(to) {
            return Err(RecordingError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        if to.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Records captured so far, in step order.
    pub fn trace(&self) -> &[TraceRecord] {
        &self.trace
    }

    /// Take ownership of the trace.
    pub fn into_trace(self) -> Vec<TraceRecord> {
        self.trace
    }

    /// Whether records were dropped because the cap was reached.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub(crate) fn push_record(&mut self, record: TraceRecord) {
        self.trace.push(record);
    }

    pub(crate) fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    /// Directory name of this session's recording area.
    pub fn area_name(&self) -> String {
        area_name(&self.code_hash, self.id)
    }

    /// Serializable summary written to `session.json`.
    pub fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            id: self.id,
            code_hash: self.code_hash.clone(),
            state: self.state,
            records: self.trace.len(),
            truncated: self.truncated,
            created_at: self.created_at,
            finished_at: self.finished_at,
        }
    }
}

/// Name of the recording area for a code hash and session id.
pub fn area_name(code_hash: &str, id: Uuid) -> String {
    let prefix: String = code_hash.chars().take(16).collect();
    format!("{}-{}", prefix, id.simple())
}

/// Contents of `session.json` in a recording area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Session id.
    pub id: Uuid,
    /// blake3 hash of the submitted code.
    pub code_hash: String,
    /// State at the time of writing.
    pub state: SessionState,
    /// Number of records written.
    pub records: usize,
    /// Whether the record cap was hit.
    pub truncated: bool,
    /// Session creation time.
    pub created_at: DateTime<Utc>,
    /// Time the session reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_rejects_illegal_transitions() {
        let mut session = ExecutionSession::new("(define a 1)");
        assert!(session.transition(SessionState::Completed).is_err());
        session.transition(SessionState::Running).unwrap();
        session.transition(SessionState::Completed).unwrap();
        assert!(session.metadata().finished_at.is_some());
        assert!(matches!(
            session.transition(SessionState::Failed),
            Err(RecordingError::InvalidTransition {
                from: SessionState::Completed,
                to: SessionState::Failed
            })
        ));
    }

    #[test]
    fn identical_code_shares_hash_but_not_area() {
        let a = ExecutionSession::new("(define a 1)");
        let b = ExecutionSession::new("(define a 1)");
        assert_eq!(a.code_hash(), b.code_hash());
        assert_eq!(a.code_hash().len(), 64);
        assert_ne!(a.area_name(), b.area_name());
        assert!(a.area_name().starts_with(&a.code_hash()[..16]));
    }
}
