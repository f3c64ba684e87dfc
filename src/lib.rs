//! graphtrace – traced execution of graph algorithms in isolated workers
//!
//! This crate provides:
//! - A typed graph model (nodes, edges, identity-keyed element sets) and a codec
//!   for the node/edge JSON format used by the web app
//! - A small S-expression language for graph algorithms, with a step hook
//! - A tracing controller that records one trace record per completed statement
//! - A supervisor that runs each submission in a time-bounded worker process
//! - An NDJSON service that turns outcomes into result envelopes

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Error types and the user-facing error taxonomy
pub mod error;
/// Graph model and codec
pub mod graph;
/// Per-run trace recording
pub mod recording;
/// Graph script language
pub mod script;
/// NDJSON execution service
pub mod service;
/// Worker process supervision
pub mod supervisor;

// Re-export key types for convenience
pub use error::{Error, ErrorKind, Result};
pub use graph::{Edge, Graph, Identity, Node};
pub use recording::{ExecutionSession, TraceRecord, TracingController};
pub use service::{Envelope, ResultAssembler, Service};
pub use supervisor::{Outcome, Submission, Supervisor, SupervisorConfig};

/// Current version of graphtrace
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol version expected in execution requests
pub const PROTOCOL_VERSION: &str = "1.0.0";
