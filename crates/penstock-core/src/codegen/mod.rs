//! Code generation for the JIT back-end
//!
//! Lowers a fingerprinted [`PipelineConfig`] to a single self-contained
//! C++17 translation unit: a typed context record, the steps in order, and
//! a C-ABI entry point named from the sanitized fingerprint.
//!
//! ```text
//! PipelineConfig → CodeGenerator → .cpp source → external compiler → .so
//! ```
//!
//! The marshalling boundary is a pair of generated plain structs
//! (`InputPack`, `OutputPack`); [`layout`] computes their field offsets and
//! is shared with the executor, so the emitting side and the calling side
//! agree by construction.
//!
//! [`PipelineConfig`]: crate::ir::PipelineConfig

mod emitter;
pub mod layout;

pub use emitter::CodeGenerator;
pub use layout::{PackField, PackLayout};

use std::path::PathBuf;

use thiserror::Error;

use crate::types::DataType;

/// Options for source emission
#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// Emit the banner timestamp; cosmetic only, never part of the
    /// fingerprint or cache key. Turned off where byte-identical output
    /// matters (tests).
    pub timestamp: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self { timestamp: true }
    }
}

/// Errors from code generation
#[derive(Debug, Error)]
pub enum CodegenError {
    /// The config has no fingerprint yet
    #[error("pipeline '{0}' has no fingerprint; compute it before generating code")]
    MissingFingerprint(String),

    /// A marshalled field has a type that cannot cross the C boundary
    #[error("{role} '{name}' has type {ty}; only numeric scalars can be marshalled")]
    UnsupportedIoType {
        /// `input` or `output`
        role: &'static str,
        /// Field name
        name: String,
        /// The offending type
        ty: DataType,
    },

    /// A literal arg does not decode as its declared numeric type
    #[error("step '{op}': literal '{text}' is not a valid {ty} literal")]
    InvalidLiteral {
        /// Operator of the offending step
        op: String,
        /// Literal text
        text: String,
        /// Declared literal type
        ty: DataType,
    },

    /// Writing the emitted source failed
    #[error("failed to write generated source {path}: {source}")]
    Io {
        /// Destination path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}
