//! NDJSON execution service.
//!
//! Each request line is `{"version", "code", "graph"}`; each response line is an
//! [`Envelope`]. Requests on one connection are processed sequentially and every
//! request, including an unparsable one, gets exactly one response line. Checks
//! run in order: protocol version, code, graph, graph decoding; only a request
//! that passes all of them reaches the supervisor.

/// Success/error envelopes and the result assembler.
pub mod envelope;

pub use envelope::{Envelope, EnvelopeData, ErrorEntry, ResultAssembler};

use serde::Deserialize;
use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use thiserror::Error;

use crate::PROTOCOL_VERSION;
use crate::error::{ErrorKind, ModelError, SupervisorError};
use crate::graph::codec;
use crate::supervisor::Supervisor;

/// Value reported when a request carries no version.
pub const MISSING_VERSION: &str = "Not Exist";

/// Request rejected before or during execution.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The line is not a JSON request object
    #[error("Bad Request: {0}.")]
    Parse(String),

    /// The client speaks another protocol version
    #[error(
        "The current version of your local server ({expected}) does not match version of the web app (\"{requested}\")."
    )]
    VersionMismatch {
        /// Version of this server
        expected: String,
        /// Version named by the request
        requested: String,
    },

    /// No `code` field
    #[error("No Code Snippets Embedded In The Request.")]
    MissingCode,

    /// No `graph` field
    #[error("No Graph Intel Embedded In The Request.")]
    MissingGraph,

    /// A field has the wrong shape
    #[error("Validation error: {0}.")]
    InvalidParams(String),

    /// The graph did not decode
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The supervisor could not run the code
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

impl ServiceError {
    /// Classify into the user-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Parse(_)
            | ServiceError::VersionMismatch { .. }
            | ServiceError::MissingCode
            | ServiceError::MissingGraph
            | ServiceError::InvalidParams(_) => ErrorKind::Validation,
            ServiceError::Model(err) => err.kind(),
            ServiceError::Supervisor(err) => err.kind(),
        }
    }

    /// Error envelope for this failure.
    pub fn to_envelope(&self) -> Envelope {
        match self {
            ServiceError::Model(err) => ResultAssembler.from_model_error(err),
            ServiceError::Supervisor(err) => ResultAssembler.from_supervisor_error(err),
            other => Envelope::error(other.to_string()),
        }
    }
}

/// Execution request as sent by the web app.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionRequest {
    /// Protocol version of the client.
    #[serde(default)]
    pub version: Option<String>,
    /// Code to run; must be a string.
    #[serde(default)]
    pub code: Option<Value>,
    /// Graph as a JSON object or a JSON-encoded string.
    #[serde(default)]
    pub graph: Option<Value>,
}

/// Service entry point: validates requests and runs them on a shared supervisor.
#[derive(Debug, Clone)]
pub struct Service {
    supervisor: Arc<Supervisor>,
}

impl Service {
    /// Create a service backed by `supervisor`.
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self { supervisor }
    }

    /// Supervisor in use.
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Process a single connection by consuming requests from the reader and writing responses.
    pub fn handle<R: BufRead, W: Write>(&self, reader: R, writer: W) -> io::Result<()> {
        let mut session = Session {
            service: self,
            writer,
        };
        session.run(reader)
    }

    /// Run one request and build its envelope.
    pub fn execute(&self, request: ExecutionRequest) -> Envelope {
        match self.try_execute(request) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::info!(kind = ?err.kind(), "request rejected: {}", err);
                err.to_envelope()
            }
        }
    }

    fn try_execute(&self, request: ExecutionRequest) -> Result<Envelope, ServiceError> {
        check_version(request.version.as_deref())?;

        let code = match request.code {
            None | Some(Value::Null) => return Err(ServiceError::MissingCode),
            Some(Value::String(code)) => code,
            Some(_) => {
                return Err(ServiceError::InvalidParams("code must be a string".into()));
            }
        };
        let raw_graph = match request.graph {
            None | Some(Value::Null) => return Err(ServiceError::MissingGraph),
            Some(graph) => graph,
        };

        let graph = codec::decode(&raw_graph)?;
        let submission = self.supervisor.submit_default(&code, &graph)?;
        Ok(ResultAssembler.from_submission(submission))
    }
}

/// Reject requests from a client with another protocol version.
pub fn check_version(requested: Option<&str>) -> Result<(), ServiceError> {
    match requested {
        Some(version) if version == PROTOCOL_VERSION => Ok(()),
        other => Err(ServiceError::VersionMismatch {
            expected: PROTOCOL_VERSION.to_string(),
            requested: other.unwrap_or(MISSING_VERSION).to_string(),
        }),
    }
}

struct Session<'a, W: Write> {
    service: &'a Service,
    writer: W,
}

impl<W: Write> Session<'_, W> {
    fn run<R: BufRead>(&mut self, reader: R) -> io::Result<()> {
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<ExecutionRequest>(&line) {
                Ok(request) => self.service.execute(request),
                Err(err) => ServiceError::Parse(err.to_string()).to_envelope(),
            };
            self.write_response(&response)?;
        }

        Ok(())
    }

    fn write_response(&mut self, envelope: &Envelope) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, envelope)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}
