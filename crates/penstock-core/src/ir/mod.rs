//! Pipeline intermediate representation
//!
//! A [`PipelineConfig`] is the immutable program the engine consumes: named,
//! typed inputs and outputs, declared intermediate variables, and an ordered
//! list of operator invocations. Once [`PipelineConfig::compute_fingerprint`]
//! has run, the config is content-addressed: the fingerprint keys the compile
//! cache, names the generated entry symbol, and never changes for equal
//! canonical forms.

mod config;
mod fingerprint;
pub mod json;

pub use config::{Arg, IOField, OpCall, PipelineConfig};
pub use fingerprint::{canonical_form, sanitize_identifier};

use thiserror::Error;

/// Validation errors for a pipeline config
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Pipeline name is empty
    #[error("pipeline name is empty")]
    EmptyName,

    /// A step has no operator name
    #[error("step {index}: empty operator name")]
    EmptyOpName {
        /// Position of the offending step
        index: usize,
    },

    /// A step has no output variable
    #[error("step {index} ('{op}'): empty output variable")]
    EmptyOutputVar {
        /// Position of the offending step
        index: usize,
        /// The step's operator name
        op: String,
    },

    /// A variable name is not usable as an identifier
    #[error("'{name}' is not a valid variable name")]
    InvalidIdentifier {
        /// The offending name
        name: String,
    },

    /// An io field carries the `unknown` type
    #[error("field '{name}' has unresolved type")]
    UnknownType {
        /// The offending field name
        name: String,
    },
}

/// Result type for IR operations
pub type ConfigResult<T> = Result<T, ConfigError>;
