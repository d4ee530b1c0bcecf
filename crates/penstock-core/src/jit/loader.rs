//! Dynamic loading of compiled pipeline artifacts
//!
//! A [`Loader`] owns one opened shared object; dropping it closes the
//! handle. The [`PipelineLoader`] keys loaders by fingerprint and stores,
//! in the same map slot, the resolved entry function pointer. Pointer and
//! library enter and leave the map together, so a stored pointer can never
//! outlive the code it points into; no raw pointer is ever handed out.

use std::collections::HashMap;
use std::ffi::{c_char, c_void, CStr};
use std::path::{Path, PathBuf};

use libloading::Library;
use tracing::debug;

use crate::ir::sanitize_identifier;

use super::{JitError, JitResult};

/// Signature of the generated entry point
pub type EntryFn = unsafe extern "C" fn(*const c_void, *mut c_void) -> bool;

/// Signature of the optional diagnostics symbol
type NameFn = unsafe extern "C" fn() -> *const c_char;

/// One opened artifact; move-only, closed on drop
#[derive(Debug)]
pub struct Loader {
    library: Library,
    path: PathBuf,
}

impl Loader {
    /// Open a shared object with lazy binding and local visibility
    ///
    /// # Errors
    /// [`JitError::ArtifactMissing`] when the file is absent,
    /// [`JitError::Open`] when the dynamic linker rejects it.
    pub fn open(path: &Path) -> JitResult<Self> {
        if !path.exists() {
            return Err(JitError::ArtifactMissing(path.display().to_string()));
        }

        #[cfg(unix)]
        let library = {
            use libloading::os::unix::{Library as UnixLibrary, RTLD_LAZY, RTLD_LOCAL};
            // SAFETY: the artifact is a freshly compiled pipeline object
            // whose only initialization is trivial C++ static setup.
            unsafe { UnixLibrary::open(Some(path), RTLD_LAZY | RTLD_LOCAL) }
                .map(Library::from)
                .map_err(|source| JitError::Open {
                    path: path.display().to_string(),
                    source,
                })?
        };

        #[cfg(not(unix))]
        let library = {
            // SAFETY: as above.
            unsafe { Library::new(path) }.map_err(|source| JitError::Open {
                path: path.display().to_string(),
                source,
            })?
        };

        Ok(Self {
            library,
            path: path.to_path_buf(),
        })
    }

    /// Path the artifact was opened from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve a typed symbol, `None` when absent
    ///
    /// # Safety
    /// `T` must match the symbol's actual signature, and the returned value
    /// must not be used after this loader is dropped.
    unsafe fn symbol<T: Copy>(&self, name: &str) -> Option<T> {
        let mut bytes = name.as_bytes().to_vec();
        bytes.push(0);
        self.library.get::<T>(&bytes).ok().map(|sym| *sym)
    }
}

/// What the map holds per fingerprint: the library and the pointers that
/// dereference into it, inserted and removed as one unit
struct LoadedPipeline {
    loader: Loader,
    entry: EntryFn,
    display_name: String,
}

impl std::fmt::Debug for LoadedPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPipeline")
            .field("path", &self.loader.path())
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Fingerprint-keyed collection of loaded pipelines
#[derive(Debug, Default)]
pub struct PipelineLoader {
    loaded: HashMap<String, LoadedPipeline>,
}

impl PipelineLoader {
    /// Create an empty loader
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `path` and resolve the entry point for `fingerprint`
    ///
    /// Resolution tries, in order: the sanitized-fingerprint symbol, the
    /// raw-fingerprint symbol, and the plain `pipeline_execute` fallback.
    /// A prior load under the same fingerprint is replaced and its handle
    /// closed.
    ///
    /// # Errors
    /// Propagates open failures; [`JitError::SymbolNotFound`] when no
    /// candidate resolves (the partially-loaded artifact is closed).
    pub fn load(&mut self, fingerprint: &str, path: &Path) -> JitResult<()> {
        let loader = Loader::open(path)?;

        let candidates = [
            format!("pipeline_execute_{}", sanitize_identifier(fingerprint)),
            format!("pipeline_execute_{fingerprint}"),
            "pipeline_execute".to_string(),
        ];

        let mut entry: Option<EntryFn> = None;
        for candidate in &candidates {
            // SAFETY: every candidate is an entry point emitted with the
            // EntryFn signature by our own code generator.
            if let Some(found) = unsafe { loader.symbol::<EntryFn>(candidate) } {
                entry = Some(found);
                break;
            }
        }
        let Some(entry) = entry else {
            // Dropping `loader` here closes the artifact.
            return Err(JitError::SymbolNotFound(path.display().to_string()));
        };

        // SAFETY: pipeline_name, when present, is the nullary diagnostics
        // symbol emitted alongside the entry; the CStr is copied out before
        // the borrow of `loader` ends.
        let display_name = unsafe {
            loader
                .symbol::<NameFn>("pipeline_name")
                .map(|name_fn| {
                    let ptr = name_fn();
                    if ptr.is_null() {
                        fingerprint.to_string()
                    } else {
                        CStr::from_ptr(ptr).to_string_lossy().into_owned()
                    }
                })
                .unwrap_or_else(|| fingerprint.to_string())
        };

        debug!(%fingerprint, name = %display_name, path = %path.display(), "pipeline loaded");
        self.loaded.insert(
            fingerprint.to_string(),
            LoadedPipeline {
                loader,
                entry,
                display_name,
            },
        );
        Ok(())
    }

    /// True when `fingerprint` has a loaded artifact
    #[must_use]
    pub fn is_loaded(&self, fingerprint: &str) -> bool {
        self.loaded.contains_key(fingerprint)
    }

    /// Diagnostics name reported by the artifact
    #[must_use]
    pub fn display_name(&self, fingerprint: &str) -> Option<&str> {
        self.loaded
            .get(fingerprint)
            .map(|p| p.display_name.as_str())
    }

    /// Invoke the loaded entry, passing its boolean result through verbatim
    ///
    /// # Errors
    /// [`JitError::NotLoaded`] when the fingerprint has no entry.
    ///
    /// # Safety
    /// `input` and `output` must point to buffers laid out exactly as the
    /// generated `InputPack`/`OutputPack` for this fingerprint, valid for
    /// the duration of the call.
    pub unsafe fn execute(
        &self,
        fingerprint: &str,
        input: *const c_void,
        output: *mut c_void,
    ) -> JitResult<bool> {
        let pipeline = self
            .loaded
            .get(fingerprint)
            .ok_or_else(|| JitError::NotLoaded(fingerprint.to_string()))?;
        // SAFETY: the entry pointer dereferences into the library owned by
        // the same map slot, which is alive for the duration of `&self`;
        // buffer validity is the caller's contract.
        Ok((pipeline.entry)(input, output))
    }

    /// Close one artifact
    pub fn unload(&mut self, fingerprint: &str) {
        self.loaded.remove(fingerprint);
    }

    /// Close every artifact
    pub fn unload_all(&mut self) {
        self.loaded.clear();
    }

    /// Number of loaded artifacts
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }
}
