//! Per-run trace recording.
//!
//! A [`TracingController`] hands out at most one [`TraceScope`] at a time. The
//! scope owns the session's [`RecordingArea`] and acts as the interpreter's
//! [`StepHook`]; it is released on every exit path (explicit finish, error, or
//! drop), after which nothing is recorded.
//!
//! ```text
//! UNARMED --acquire--> ARMED --first step--> RECORDING --finish--> COMPLETE | ABORTED --release--> UNARMED
//! ```

/// Recording area storage.
pub mod area;
/// Trace records and execution sessions.
pub mod record;

pub use area::{RecordingArea, close_area, list_areas, read_metadata, read_trace, remove_area};
pub use record::{ExecutionSession, SessionMetadata, SessionState, TraceRecord, area_name, code_hash};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RecordingError, RecordingResult};
use crate::script::{StepContext, StepHook};

/// Default cap on records kept per session.
pub const DEFAULT_MAX_RECORDS: usize = 100_000;

/// Where and how recording areas are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Directory holding one sub-directory per session.
    pub root: PathBuf,
    /// Remove the area on release instead of archiving it.
    pub auto_delete: bool,
    /// Records beyond this count are dropped and the session marked truncated.
    pub max_records: usize,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir().join("graphtrace"),
            auto_delete: true,
            max_records: DEFAULT_MAX_RECORDS,
        }
    }
}

/// Controller state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerState {
    /// No scope is active.
    Unarmed,
    /// A scope is active; no step observed yet.
    Armed,
    /// At least one step was observed.
    Recording,
    /// The run finished normally.
    Complete,
    /// The run failed, timed out, or the scope was dropped unfinished.
    Aborted,
}

/// Manages the recording resource for one session at a time.
#[derive(Debug)]
pub struct TracingController {
    config: RecordingConfig,
    state: ControllerState,
    last_outcome: Option<ControllerState>,
    last_area: Option<PathBuf>,
}

impl TracingController {
    /// Create an unarmed controller.
    pub fn new(config: RecordingConfig) -> Self {
        Self {
            config,
            state: ControllerState::Unarmed,
            last_outcome: None,
            last_area: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// How the most recently released scope ended.
    pub fn last_outcome(&self) -> Option<ControllerState> {
        self.last_outcome
    }

    /// Archived area of the most recently released scope, when it was kept.
    pub fn last_area(&self) -> Option<&Path> {
        self.last_area.as_deref()
    }

    /// Configuration in use.
    pub fn config(&self) -> &RecordingConfig {
        &self.config
    }

    /// Create the session's recording area and arm the controller.
    ///
    /// The session moves from `Preparing` to `Running`. On failure the
    /// controller stays unarmed and nothing needs releasing.
    pub fn acquire<'c>(
        &'c mut self,
        session: &'c mut ExecutionSession,
    ) -> RecordingResult<TraceScope<'c>> {
        if self.state != ControllerState::Unarmed {
            return Err(RecordingError::AlreadyArmed);
        }

        let area = RecordingArea::create(&self.config.root, &session.area_name())?;
        let armed = session
            .transition(SessionState::Running)
            .and_then(|()| area.write_metadata(&session.metadata()));
        if let Err(err) = armed {
            let path = area.path().to_path_buf();
            drop(area);
            if let Err(cleanup) = remove_area(&path) {
                tracing::warn!("failed to remove recording area {:?}: {}", path, cleanup);
            }
            return Err(err);
        }

        tracing::debug!(session = %session.id(), "tracing controller armed");
        self.state = ControllerState::Armed;
        self.last_area = None;
        Ok(TraceScope {
            max_records: self.config.max_records,
            controller: self,
            session,
            area: Some(area),
            released: false,
        })
    }
}

/// Active recording scope; the interpreter's step hook for one run.
#[derive(Debug)]
pub struct TraceScope<'c> {
    controller: &'c mut TracingController,
    session: &'c mut ExecutionSession,
    area: Option<RecordingArea>,
    max_records: usize,
    released: bool,
}

impl TraceScope<'_> {
    /// Session being recorded.
    pub fn session(&self) -> &ExecutionSession {
        self.session
    }

    /// Path of the recording area, while it exists.
    pub fn area_path(&self) -> Option<&Path> {
        self.area.as_ref().map(RecordingArea::path)
    }

    /// Record the terminal session state and release the scope.
    pub fn finish(mut self, outcome: SessionState) -> RecordingResult<()> {
        let transition = self.session.transition(outcome);
        self.controller.state = if outcome == SessionState::Completed && transition.is_ok() {
            ControllerState::Complete
        } else {
            ControllerState::Aborted
        };
        let released = self.release();
        transition.and(released)
    }

    /// Remove the hook and dispose of the area. Idempotent.
    pub fn release(&mut self) -> RecordingResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        if !self.session.state().is_terminal() {
            if let Err(err) = self.session.transition(SessionState::Failed) {
                tracing::warn!("cannot mark session failed: {}", err);
            }
        }
        let outcome = match self.controller.state {
            ControllerState::Complete => ControllerState::Complete,
            _ => ControllerState::Aborted,
        };

        let result = match self.area.take() {
            None => Ok(None),
            Some(area) if self.controller.config.auto_delete => area.delete().map(|()| None),
            Some(area) => area
                .write_metadata(&self.session.metadata())
                .map(|()| Some(area.path().to_path_buf())),
        };

        self.controller.state = ControllerState::Unarmed;
        self.controller.last_outcome = Some(outcome);
        tracing::debug!(
            session = %self.session.id(),
            records = self.session.trace().len(),
            "tracing controller released ({:?})",
            outcome
        );
        match result {
            Ok(kept) => {
                self.controller.last_area = kept;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

impl StepHook for TraceScope<'_> {
    type Error = RecordingError;

    fn on_step(&mut self, step: &StepContext<'_>) -> Result<(), Self::Error> {
        if self.released {
            return Ok(());
        }
        if self.controller.state == ControllerState::Armed {
            self.controller.state = ControllerState::Recording;
        }
        if self.session.trace().len() >= self.max_records {
            if !self.session.truncated() {
                tracing::debug!("record cap of {} reached", self.max_records);
                self.session.mark_truncated();
            }
            return Ok(());
        }

        let record = TraceRecord::capture(self.session.trace().len() as u64, step);
        if let Some(area) = self.area.as_mut() {
            area.append(&record)?;
        }
        self.session.push_record(record);
        Ok(())
    }
}

impl Drop for TraceScope<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.controller.state = ControllerState::Aborted;
        if let Err(err) = self.release() {
            tracing::warn!("failed to release trace scope: {}", err);
        }
    }
}
