//! The graph script language.
//!
//! Submitted code is a small S-expression language evaluated by a tree-walking
//! interpreter. Source text is parsed into [`Program`] forms, validated into a
//! [`ProgramIr`], then executed by an [`Interpreter`] that calls a [`StepHook`]
//! after every completed statement. The hook is passed in explicitly, so no
//! instrumentation state outlives a run.

/// Abstract syntax tree definitions.
pub mod ast;
/// Translation of parsed forms into the IR.
pub mod builder;
/// Builtin functions.
pub mod builtins;
/// Typed intermediate representation.
pub mod ir;
/// S-expression parser.
pub mod parser;
/// Tree-walking interpreter.
pub mod runtime;
/// Runtime values.
pub mod value;

pub use ast::{Expr, Form, Program};
pub use builder::build_ir;
pub use builtins::Builtin;
pub use ir::ProgramIr;
pub use parser::parse_program;
pub use runtime::{DEFAULT_MAX_CALL_DEPTH, Interpreter, RunError, StepContext, StepHook};
pub use value::Value;

use thiserror::Error;

/// Convenience result alias for script operations.
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Errors surfaced by the parser, builder and interpreter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// Parsing failed due to invalid syntax.
    #[error("syntax error on line {line}: {message}")]
    Syntax {
        /// What went wrong.
        message: String,
        /// Line the problem was found on.
        line: u32,
    },

    /// The program parsed but is not well formed.
    #[error("invalid script on line {line}: {message}")]
    Validation {
        /// What went wrong.
        message: String,
        /// Line of the offending form.
        line: u32,
    },

    /// The script raised an error with `(raise ...)`.
    #[error("{message}")]
    Raised {
        /// User-supplied message.
        message: String,
        /// Line of the `raise` statement.
        line: u32,
    },

    /// A builtin or binding failed at runtime.
    #[error("{message} (line {line})")]
    Runtime {
        /// What went wrong.
        message: String,
        /// Line of the failing statement.
        line: u32,
    },

    /// Nested calls exceeded the configured depth.
    #[error("maximum call depth of {limit} exceeded (line {line})")]
    CallDepth {
        /// Configured cap.
        limit: usize,
        /// Line of the call that overflowed.
        line: u32,
    },
}

impl ScriptError {
    /// Whether the error was found before execution started.
    pub fn is_compile_error(&self) -> bool {
        matches!(self, ScriptError::Syntax { .. } | ScriptError::Validation { .. })
    }

    /// Source line the error refers to.
    pub fn line(&self) -> u32 {
        match self {
            ScriptError::Syntax { line, .. }
            | ScriptError::Validation { line, .. }
            | ScriptError::Raised { line, .. }
            | ScriptError::Runtime { line, .. }
            | ScriptError::CallDepth { line, .. } => *line,
        }
    }
}

/// Parse and validate source text in one go.
pub fn compile(source: &str) -> Result<ProgramIr> {
    let program = parse_program(source)?;
    build_ir(&program)
}
