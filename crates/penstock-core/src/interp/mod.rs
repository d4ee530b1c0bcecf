//! Reference interpreter
//!
//! Walks the steps of a pipeline in order against a caller-owned
//! [`Environment`], dispatching each operator to its registry kernel. This
//! back-end defines the semantics the JIT must reproduce: for every program
//! the JIT compiles and every well-typed environment, both back-ends
//! produce equal results.
//!
//! [`Environment`]: crate::types::Environment

mod executor;

pub use executor::Interpreter;

use thiserror::Error;

/// Errors raised while interpreting a pipeline
#[derive(Debug, Error)]
pub enum ExecError {
    /// A step names an operator missing from the registry
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    /// A variable arg references an unbound environment slot
    #[error("variable not found: {0}")]
    VariableNotFound(String),

    /// A literal failed to decode, or a value had the wrong shape for the
    /// operator consuming it
    #[error("type mismatch in '{op}': {detail}")]
    TypeMismatch {
        /// Operator being evaluated
        op: String,
        /// What went wrong
        detail: String,
    },

    /// A step passes more args than the operator accepts
    #[error("operator '{op}' takes at most {expected} arguments, got {got}")]
    ArityMismatch {
        /// Operator being evaluated
        op: String,
        /// Registered parameter count
        expected: usize,
        /// Args supplied by the step
        got: usize,
    },
}

/// Result type for interpreter operations
pub type ExecResult<T> = Result<T, ExecError>;
