//! JIT back-end plumbing
//!
//! This module owns the path from emitted source to a callable entry
//! point:
//!
//! ```text
//! .cpp source → Toolchain (external compiler) → .so → PipelineLoader → entry fn
//! ```
//!
//! The [`CompileCache`] keys everything by pipeline fingerprint: one
//! deterministic artifact path per fingerprint, an in-memory index that is
//! rebuilt from scratch each process, and artifacts on disk that outlive
//! the process and are adopted on the next run.

mod cache;
mod loader;
mod toolchain;

pub use cache::{CacheEntry, CompileCache, CompileOutcome, DEFAULT_MAX_ARTIFACTS};
pub use loader::{EntryFn, Loader, PipelineLoader};
pub use toolchain::{Toolchain, ToolchainOptions};

use thiserror::Error;

use crate::codegen::CodegenError;

/// Errors from compiling, caching or loading pipeline artifacts
#[derive(Debug, Error)]
pub enum JitError {
    /// Source emission failed
    #[error(transparent)]
    Codegen(#[from] CodegenError),

    /// The external compiler exited non-zero; payload is its output
    #[error("pipeline compilation failed:\n{0}")]
    CompileFailure(String),

    /// The shared object is not on disk
    #[error("artifact missing: {0}")]
    ArtifactMissing(String),

    /// No entry symbol resolved under any candidate name
    #[error("no pipeline entry symbol found in {0}")]
    SymbolNotFound(String),

    /// The dynamic linker rejected the artifact
    #[error("failed to load {path}: {source}")]
    Open {
        /// Artifact path
        path: String,
        /// Linker error
        #[source]
        source: libloading::Error,
    },

    /// Execution was requested for a fingerprint that is not loaded
    #[error("pipeline {0} is not loaded")]
    NotLoaded(String),

    /// Filesystem or process-spawn failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for JIT operations
pub type JitResult<T> = Result<T, JitError>;
