//! Engine façade
//!
//! An [`Engine`] owns everything the two back-ends share: the operator
//! registry (immutable, freely shared), the compile cache, the dynamic
//! loader, and the toolchain/codegen options. There are no process-wide
//! singletons; embed as many engines as needed, each with its own cache
//! directory.
//!
//! Compile, load and execute on one fingerprint are serialized by a single
//! mutex over the JIT state. The mutex is never held across interpreter
//! dispatch, and executions of distinct already-loaded fingerprints only
//! contend on it briefly for the map lookups around the entry call.

mod executor;

pub use executor::PipelineExecutor;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::codegen::{CodeGenerator, CodegenOptions};
use crate::interp::{ExecError, Interpreter};
use crate::ir::{ConfigError, PipelineConfig};
use crate::jit::{
    CompileCache, CompileOutcome, JitError, PipelineLoader, Toolchain, ToolchainOptions,
};
use crate::ops::OperatorRegistry;

use executor::{InterpreterExecutor, JitExecutor};

/// Execution strategy for a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Reference interpreter
    Interpreter,

    /// Generate, compile and load native code
    Jit,

    /// Engine's choice; currently behaves as [`Mode::Jit`]
    #[default]
    Auto,
}

/// Errors surfaced by executors and the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The config failed validation
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Interpreter failure, or a marshalling failure in the JIT path
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Code generation, compilation or loading failure
    #[error(transparent)]
    Jit(#[from] JitError),

    /// The entry function returned `false`; the environment may be
    /// partially written
    #[error("pipeline '{0}' reported execution failure")]
    ExecutionFailure(String),
}

/// Construction-time options for an engine
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Where artifacts and emitted sources live
    pub cache_dir: PathBuf,

    /// Include path for the operator library header
    pub include_dir: PathBuf,

    /// Source-emission options
    pub codegen: CodegenOptions,

    /// Compiler invocation options
    pub toolchain: ToolchainOptions,

    /// Bound on shared objects kept in the cache directory
    pub max_artifacts: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./generated"),
            // The operator header ships with this crate; deployments with a
            // relocated header override this.
            include_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/include")),
            codegen: CodegenOptions::default(),
            toolchain: ToolchainOptions::default(),
            max_artifacts: crate::jit::DEFAULT_MAX_ARTIFACTS,
        }
    }
}

/// Shared JIT state, guarded by the engine mutex
pub(crate) struct JitShared {
    pub(crate) cache: CompileCache,
    pub(crate) loader: PipelineLoader,
    pub(crate) toolchain: Toolchain,
    pub(crate) gen: CodegenOptions,
    pub(crate) include_dir: PathBuf,
}

/// The top-level service owning registry, cache and loader
pub struct Engine {
    registry: Arc<OperatorRegistry>,
    shared: Arc<Mutex<JitShared>>,
}

impl Engine {
    /// Engine with default options
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    /// Engine with explicit options
    #[must_use]
    pub fn with_options(options: EngineOptions) -> Self {
        let mut cache = CompileCache::new(options.cache_dir);
        cache.set_max_artifacts(options.max_artifacts);
        Self {
            registry: Arc::new(OperatorRegistry::with_builtins()),
            shared: Arc::new(Mutex::new(JitShared {
                cache,
                loader: PipelineLoader::new(),
                toolchain: Toolchain::new(options.toolchain),
                gen: options.codegen,
                include_dir: options.include_dir,
            })),
        }
    }

    /// The shared operator registry
    #[must_use]
    pub fn registry(&self) -> Arc<OperatorRegistry> {
        Arc::clone(&self.registry)
    }

    /// Relocate the cache directory, creating it if missing
    ///
    /// # Errors
    /// Propagates directory-creation failures.
    pub fn set_cache_dir(&self, dir: impl Into<PathBuf>) -> std::io::Result<()> {
        self.lock().cache.set_dir(dir)
    }

    /// Current cache directory
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.lock().cache.dir().to_path_buf()
    }

    /// Drop the in-memory cache index and close every loaded artifact;
    /// files on disk are kept
    pub fn clear_cache(&self) {
        let mut shared = self.lock();
        shared.cache.clear();
        shared.loader.unload_all();
    }

    /// Number of artifacts currently loaded
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.lock().loader.loaded_count()
    }

    /// Ensure a compiled artifact exists for `config`
    ///
    /// # Errors
    /// Propagates validation, codegen and compile failures.
    pub fn compile(&self, config: &PipelineConfig) -> Result<CompileOutcome, EngineError> {
        config.validate()?;
        let mut config = config.clone();
        config.compute_fingerprint();
        let mut guard = self.lock();
        let shared = &mut *guard;
        let outcome = shared.cache.compile(
            &self.registry,
            &config,
            &shared.gen,
            &shared.toolchain,
            &shared.include_dir,
        )?;
        Ok(outcome)
    }

    /// Build an executor handle for `config` under `mode`
    ///
    /// Validates the config, computes its fingerprint, and for the JIT
    /// path also resolves the marshalling layouts up front so unmappable
    /// io types are reported before any compile is attempted.
    ///
    /// # Errors
    /// [`EngineError::Config`] on invalid configs; layout errors surface as
    /// [`EngineError::Jit`].
    pub fn executor(
        &self,
        config: PipelineConfig,
        mode: Mode,
    ) -> Result<Box<dyn PipelineExecutor + Send>, EngineError> {
        config.validate()?;
        let mut config = config;
        let fingerprint = config.compute_fingerprint().to_string();

        match mode {
            Mode::Interpreter => Ok(Box::new(InterpreterExecutor::new(
                Interpreter::new(self.registry(), config),
                fingerprint,
            ))),
            Mode::Jit | Mode::Auto => {
                let gen_options = self.lock().gen.clone();
                let generator = CodeGenerator::new(&self.registry, &config, gen_options);
                let input_layout = generator.input_layout().map_err(JitError::Codegen)?;
                let output_layout = generator.output_layout().map_err(JitError::Codegen)?;
                Ok(Box::new(JitExecutor::new(
                    self.registry(),
                    Arc::clone(&self.shared),
                    config,
                    fingerprint,
                    input_layout,
                    output_layout,
                )))
            }
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, JitShared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
