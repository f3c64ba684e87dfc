//! Error types for graphtrace
//!
//! Each subsystem has its own `thiserror` enum. Every error classifies into one
//! of the user-facing [`ErrorKind`]s, which is all that crosses the result
//! envelope boundary.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::graph::{EntityKind, Identity};
use crate::recording::SessionState;
use crate::script::ScriptError;

/// User-facing error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed external graph representation.
    Format,
    /// A value failed a field-level contract before model construction.
    Validation,
    /// The worker exceeded its wall-clock budget.
    TimedOut,
    /// The submitted code raised or terminated abnormally.
    ExecutionException,
    /// Supervisor-internal failure.
    Unknown,
}

/// Top-level error
#[derive(Debug, Error)]
pub enum Error {
    /// Graph model errors
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Script parse/build errors
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Recording area / controller errors
    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    /// Supervisor errors
    #[error("Supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Classify into the user-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Model(err) => err.kind(),
            Error::Script(err) if err.is_compile_error() => ErrorKind::Validation,
            Error::Script(_) => ErrorKind::ExecutionException,
            Error::Recording(_) | Error::Config(_) => ErrorKind::Unknown,
            Error::Supervisor(err) => err.kind(),
        }
    }
}

/// Result type using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Graph model and codec errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Malformed external representation
    #[error("Graph format error: {0}")]
    Format(String),

    /// An identity appeared twice within one element set
    #[error("Graph format error: duplicate {kind} identity '{identity}'")]
    DuplicateIdentity {
        /// Kind of the rejected element
        kind: EntityKind,
        /// The duplicated identity
        identity: Identity,
    },

    /// An edge endpoint is not present in the node set
    #[error("Graph format error: edge '{edge}' references unknown node '{node}'")]
    DanglingEndpoint {
        /// Edge identity
        edge: Identity,
        /// Missing node identity
        node: Identity,
    },

    /// Lookup of a missing entity
    #[error("{kind} '{identity}' not found")]
    NotFound {
        /// Kind of the missing entity
        kind: EntityKind,
        /// Identity that was requested
        identity: String,
    },

    /// Removal of a node that edges still reference
    #[error("node '{0}' still has incident edges")]
    NodeInUse(Identity),

    /// Ordering across entity kinds
    #[error("cannot compare a {left} with a {right}")]
    IncomparableKinds {
        /// Left-hand kind
        left: EntityKind,
        /// Right-hand kind
        right: EntityKind,
    },

    /// Field-level contract violation
    #[error("Validation error: {field} {reason}")]
    Validation {
        /// Offending field
        field: String,
        /// What the contract requires
        reason: String,
    },
}

impl ModelError {
    /// Classify into the user-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::Validation { .. } => ErrorKind::Validation,
            ModelError::NotFound { .. }
            | ModelError::NodeInUse(_)
            | ModelError::IncomparableKinds { .. } => ErrorKind::Unknown,
            _ => ErrorKind::Format,
        }
    }
}

/// Recording area and tracing controller errors
#[derive(Debug, Error)]
pub enum RecordingError {
    /// The controller already has an active scope
    #[error("tracing controller is already armed")]
    AlreadyArmed,

    /// Recording area could not be created
    #[error("cannot create recording area {path}: {source}")]
    CreateArea {
        /// Area path
        path: PathBuf,
        /// Underlying IO error
        source: io::Error,
    },

    /// Session lifecycle violation
    #[error("invalid session transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// State before
        from: SessionState,
        /// Requested state
        to: SessionState,
    },

    /// Recording area does not exist
    #[error("recording area {0} does not exist")]
    MissingArea(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias for recording operations
pub type RecordingResult<T> = std::result::Result<T, RecordingError>;

/// Execution supervisor errors
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The submitted code does not parse
    #[error(transparent)]
    InvalidCode(#[from] ScriptError),

    /// No worker slot freed up within the budget
    #[error("no worker slot available")]
    NoSlot,

    /// The worker process could not be started
    #[error("failed to spawn worker: {0}")]
    Spawn(io::Error),

    /// Communication with the worker failed
    #[error("worker communication failed: {0}")]
    Io(#[from] io::Error),

    /// The worker wrote something that is not a report
    #[error("malformed worker report: {0}")]
    MalformedReport(String),

    /// Session bookkeeping failed
    #[error(transparent)]
    Recording(#[from] RecordingError),
}

impl SupervisorError {
    /// Classify into the user-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SupervisorError::InvalidCode(_) => ErrorKind::Validation,
            _ => ErrorKind::Unknown,
        }
    }
}
