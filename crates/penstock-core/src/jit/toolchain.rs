//! External toolchain driver
//!
//! Turns an emitted translation unit into a position-independent shared
//! object by invoking the system C++ compiler. The invocation blocks; the
//! engine never holds its dispatch lock across it.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::{JitError, JitResult};

/// Options controlling the compiler invocation
#[derive(Debug, Clone)]
pub struct ToolchainOptions {
    /// Compiler binary; autodetected when `None` (clang++ first, then g++)
    pub compiler: Option<PathBuf>,

    /// Extra flags appended after the standard set
    pub extra_flags: Vec<String>,

    /// Keep the emitted source next to the artifact; when false, a failed
    /// compile deletes it
    pub keep_source: bool,
}

impl Default for ToolchainOptions {
    fn default() -> Self {
        Self {
            compiler: None,
            extra_flags: Vec::new(),
            keep_source: true,
        }
    }
}

/// Wrapper around the system C++ compiler
#[derive(Debug, Clone, Default)]
pub struct Toolchain {
    options: ToolchainOptions,
}

impl Toolchain {
    /// Create a toolchain with the given options
    #[must_use]
    pub fn new(options: ToolchainOptions) -> Self {
        Self { options }
    }

    /// The options this toolchain runs with
    #[must_use]
    pub fn options(&self) -> &ToolchainOptions {
        &self.options
    }

    /// Compile `source` into a shared object at `artifact`
    ///
    /// # Errors
    /// [`JitError::Io`] when the compiler cannot be spawned,
    /// [`JitError::CompileFailure`] with the captured compiler output when
    /// it exits non-zero or produces no artifact.
    pub fn compile(&self, source: &Path, artifact: &Path, include_dir: &Path) -> JitResult<()> {
        let compiler = self.resolve_compiler();
        let args = build_args(source, artifact, include_dir, &self.options.extra_flags);
        debug!(compiler = %compiler.display(), source = %source.display(), "invoking toolchain");

        let output = Command::new(&compiler).args(&args).output()?;

        if !output.status.success() {
            let mut log = String::from_utf8_lossy(&output.stderr).into_owned();
            if log.is_empty() {
                log = String::from_utf8_lossy(&output.stdout).into_owned();
            }
            return Err(JitError::CompileFailure(log));
        }

        if !artifact.exists() {
            return Err(JitError::CompileFailure(format!(
                "compiler exited cleanly but produced no artifact at {}",
                artifact.display()
            )));
        }

        Ok(())
    }

    /// Pick the compiler: explicit option, else clang++, else g++
    fn resolve_compiler(&self) -> PathBuf {
        if let Some(compiler) = &self.options.compiler {
            return compiler.clone();
        }
        if Command::new("clang++").arg("--version").output().is_ok() {
            return PathBuf::from("clang++");
        }
        PathBuf::from("g++")
    }
}

/// The standard argument set: optimized, position-independent, C++17, warnings off
fn build_args(
    source: &Path,
    artifact: &Path,
    include_dir: &Path,
    extra_flags: &[String],
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-O3".into(),
        "-shared".into(),
        "-fPIC".into(),
        "-march=native".into(),
        "-std=c++17".into(),
        "-I".into(),
        include_dir.as_os_str().to_owned(),
        "-w".into(),
    ];
    for flag in extra_flags {
        args.push(flag.into());
    }
    args.push(source.as_os_str().to_owned());
    args.push("-o".into());
    args.push(artifact.as_os_str().to_owned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_set_matches_contract() {
        let args = build_args(
            Path::new("/tmp/x.cpp"),
            Path::new("/tmp/libx.so"),
            Path::new("/opt/include"),
            &["-ffast-math".to_string()],
        );
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-O3",
                "-shared",
                "-fPIC",
                "-march=native",
                "-std=c++17",
                "-I",
                "/opt/include",
                "-w",
                "-ffast-math",
                "/tmp/x.cpp",
                "-o",
                "/tmp/libx.so",
            ]
        );
    }

    #[test]
    fn missing_source_is_a_compile_failure() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = Toolchain::default();
        let result = toolchain.compile(
            &dir.path().join("missing.cpp"),
            &dir.path().join("out.so"),
            dir.path(),
        );
        assert!(result.is_err());
    }
}
