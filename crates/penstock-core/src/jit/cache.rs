//! Fingerprint-keyed compile cache
//!
//! On-disk layout under the cache directory:
//!
//! ```text
//! <cache_dir>/libpipeline_<fingerprint>.so        shared object
//! <cache_dir>/libpipeline_<fingerprint>.so.cpp    emitted source
//! ```
//!
//! Neither file is rewritten when it already exists for a fingerprint. The
//! in-memory index starts empty every process; artifacts found on disk are
//! adopted instead of recompiled. The fingerprint is the only semantic key:
//! file modification times are never consulted for validity.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::codegen::{CodeGenerator, CodegenOptions};
use crate::ir::PipelineConfig;
use crate::ops::OperatorRegistry;

use super::{JitError, JitResult, Toolchain};

/// Default bound on shared objects kept in the cache directory
pub const DEFAULT_MAX_ARTIFACTS: usize = 64;

/// One compiled pipeline
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Pipeline fingerprint
    pub fingerprint: String,

    /// Emitted source path
    pub source_path: PathBuf,

    /// Shared object path
    pub artifact_path: PathBuf,

    /// When the entry was recorded
    pub compile_time: SystemTime,
}

/// How a `compile` call was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileOutcome {
    /// The toolchain ran and produced a fresh artifact
    Compiled,

    /// A valid in-memory entry already existed; nothing ran
    CachedInMemory,

    /// The artifact was already on disk from an earlier process and was
    /// recorded without recompiling
    AdoptedFromDisk,
}

/// In-memory index over the on-disk artifact store
#[derive(Debug)]
pub struct CompileCache {
    dir: PathBuf,
    entries: HashMap<String, CacheEntry>,
    max_artifacts: usize,
}

impl CompileCache {
    /// Create a cache rooted at `dir`; the directory is created lazily
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            entries: HashMap::new(),
            max_artifacts: DEFAULT_MAX_ARTIFACTS,
        }
    }

    /// Current cache directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Relocate the cache root, creating the directory if missing
    ///
    /// # Errors
    /// Propagates directory-creation failures.
    pub fn set_dir(&mut self, dir: impl Into<PathBuf>) -> std::io::Result<()> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        self.dir = dir;
        Ok(())
    }

    /// Bound the number of shared objects kept on disk
    pub fn set_max_artifacts(&mut self, max: usize) {
        self.max_artifacts = max;
    }

    /// Deterministic artifact path for a fingerprint
    #[must_use]
    pub fn artifact_path_for(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("libpipeline_{fingerprint}.so"))
    }

    /// Deterministic source path for a fingerprint
    #[must_use]
    pub fn source_path_for(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("libpipeline_{fingerprint}.so.cpp"))
    }

    /// The artifact path, iff the entry is valid: recorded in memory and
    /// still present on disk
    #[must_use]
    pub fn artifact_path(&self, fingerprint: &str) -> Option<PathBuf> {
        let entry = self.entries.get(fingerprint)?;
        entry.artifact_path.exists().then(|| entry.artifact_path.clone())
    }

    /// Look up the full entry
    #[must_use]
    pub fn entry(&self, fingerprint: &str) -> Option<&CacheEntry> {
        self.entries.get(fingerprint)
    }

    /// Number of recorded entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every in-memory entry; artifacts on disk are kept
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Ensure a compiled artifact exists for `config`
    ///
    /// A valid in-memory entry short-circuits; an artifact already on disk
    /// is adopted; otherwise the source is emitted and the toolchain runs.
    /// Nothing is recorded on failure.
    ///
    /// # Errors
    /// Propagates codegen errors, source-write failures and
    /// [`JitError::CompileFailure`].
    pub fn compile(
        &mut self,
        registry: &OperatorRegistry,
        config: &PipelineConfig,
        gen_options: &CodegenOptions,
        toolchain: &Toolchain,
        include_dir: &Path,
    ) -> JitResult<CompileOutcome> {
        let fingerprint = config
            .fingerprint()
            .ok_or_else(|| {
                JitError::Codegen(crate::codegen::CodegenError::MissingFingerprint(
                    config.name.clone(),
                ))
            })?
            .to_string();

        if self.artifact_path(&fingerprint).is_some() {
            debug!(%fingerprint, "compile cache hit");
            return Ok(CompileOutcome::CachedInMemory);
        }

        std::fs::create_dir_all(&self.dir)?;
        let artifact_path = self.artifact_path_for(&fingerprint);
        let source_path = self.source_path_for(&fingerprint);

        if artifact_path.exists() {
            debug!(%fingerprint, artifact = %artifact_path.display(), "adopting on-disk artifact");
            self.record(&fingerprint, &source_path, &artifact_path);
            return Ok(CompileOutcome::AdoptedFromDisk);
        }

        let generator = CodeGenerator::new(registry, config, gen_options.clone());
        generator.write_to(&source_path).map_err(JitError::Codegen)?;

        if let Err(err) = toolchain.compile(&source_path, &artifact_path, include_dir) {
            if !toolchain.options().keep_source {
                let _ = std::fs::remove_file(&source_path);
            }
            return Err(err);
        }

        self.record(&fingerprint, &source_path, &artifact_path);
        info!(%fingerprint, artifact = %artifact_path.display(), "pipeline compiled");
        self.prune_disk();
        Ok(CompileOutcome::Compiled)
    }

    fn record(&mut self, fingerprint: &str, source_path: &Path, artifact_path: &Path) {
        self.entries.insert(
            fingerprint.to_string(),
            CacheEntry {
                fingerprint: fingerprint.to_string(),
                source_path: source_path.to_path_buf(),
                artifact_path: artifact_path.to_path_buf(),
                compile_time: SystemTime::now(),
            },
        );
    }

    /// Best-effort bounded retention: keep at most `max_artifacts` shared
    /// objects, dropping the oldest by modification time together with
    /// their sources
    fn prune_disk(&self) {
        if self.max_artifacts == 0 {
            return;
        }
        let Ok(read_dir) = std::fs::read_dir(&self.dir) else {
            return;
        };

        let mut artifacts: Vec<(PathBuf, SystemTime)> = read_dir
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                let name = path.file_name()?.to_str()?;
                if !name.starts_with("libpipeline_") || !name.ends_with(".so") {
                    return None;
                }
                let modified = entry.metadata().ok()?.modified().ok()?;
                Some((path, modified))
            })
            .collect();

        if artifacts.len() <= self.max_artifacts {
            return;
        }

        artifacts.sort_by_key(|(_, modified)| *modified);
        let excess = artifacts.len() - self.max_artifacts;
        for (path, _) in artifacts.into_iter().take(excess) {
            debug!(artifact = %path.display(), "evicting cached artifact");
            if let Err(err) = std::fs::remove_file(&path) {
                warn!(artifact = %path.display(), %err, "failed to evict artifact");
            }
            let mut source = path.into_os_string();
            source.push(".cpp");
            let _ = std::fs::remove_file(PathBuf::from(source));
        }
    }
}
