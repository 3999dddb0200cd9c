//! Compiled artifact cache
//!
//! Programs are persisted as JSON artifacts under the cache root, one file
//! per view and mode. Whether an existing artifact is reused or recompiled
//! is decided by the configured [`CompileMode`]: `Auto`/`Slow` compare
//! timestamps, `Fast` trusts any present artifact, `Debug` recompiles on
//! every fetch. Artifact writes go through a temp file and a rename, so a
//! concurrent reader never observes a half-written artifact. A failed
//! write degrades to an uncached render instead of failing the request.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use lamina_config::{CompileMode, EngineConfig};
use lamina_vfs::{VfsError, VfsResult, VirtualFileSystem};

use crate::compile::{CompileError, Compiler};
use crate::program::Program;

/// How a fetched program was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Loaded from a valid cached artifact
    Hit,
    /// Compiled from source during this fetch
    Compiled,
}

/// Failure while fetching a program.
///
/// Only source-read failures and compile failures abort a fetch; artifact
/// problems (unreadable, corrupt, stale format) fall back to recompiling.
#[derive(Debug)]
pub enum FetchError {
    Vfs(VfsError),
    Compile(CompileError),
}

pub type FetchResult<T> = Result<T, FetchError>;

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Vfs(err) => write!(f, "{err}"),
            FetchError::Compile(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Vfs(err) => Some(err),
            FetchError::Compile(err) => Some(err),
        }
    }
}

impl From<VfsError> for FetchError {
    fn from(err: VfsError) -> Self {
        FetchError::Vfs(err)
    }
}

impl From<CompileError> for FetchError {
    fn from(err: CompileError) -> Self {
        FetchError::Compile(err)
    }
}

/// Cache of compiled template artifacts.
pub struct ArtifactCache {
    cache_root: PathBuf,
    mode: CompileMode,
    compiled_ext: String,
}

impl ArtifactCache {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            cache_root: config.cache_root.clone(),
            mode: config.mode,
            compiled_ext: config.compiled_ext.clone(),
        }
    }

    pub fn mode(&self) -> CompileMode {
        self.mode
    }

    /// Create the cache directory. Called once when the engine is built,
    /// never on the render path.
    pub fn prepare(&self, vfs: &dyn VirtualFileSystem) -> VfsResult<()> {
        vfs.create_dir_all(&self.cache_root)
    }

    /// Artifact location for a view.
    ///
    /// The filename keeps a readable slug of the view name and a hash of
    /// the exact name, so `a.b` and `a_b` cannot collide. The mode is part
    /// of the name: switching modes never reuses another mode's artifacts.
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        let slug: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        let file = format!(
            "{slug}_{:016x}.{}{}",
            hasher.finish(),
            self.mode.as_str(),
            self.compiled_ext
        );
        self.cache_root.join(file)
    }

    /// Fetch the program for a view, reusing its artifact when the mode
    /// allows it and compiling from source otherwise.
    pub fn fetch(
        &self,
        vfs: &dyn VirtualFileSystem,
        compiler: &Compiler<'_>,
        name: &str,
        source_path: &Path,
    ) -> FetchResult<(Program, CacheStatus)> {
        let artifact = self.artifact_path(name);
        if !self.mode.always_recompiles() {
            if let Some(program) = self.load_fresh(vfs, &artifact, source_path) {
                trace!(target: "lamina::cache", view = name, "cache hit");
                return Ok((program, CacheStatus::Hit));
            }
        }

        let source = self.read_source(vfs, source_path)?;
        let program = compiler.compile(name, &source)?;
        self.store(vfs, &artifact, &program);
        debug!(
            target: "lamina::cache",
            view = name,
            mode = self.mode.as_str(),
            "compiled and cached"
        );
        Ok((program, CacheStatus::Compiled))
    }

    /// Load the artifact if it is present, fresh enough for the mode, and
    /// structurally valid. Any defect makes it count as stale.
    fn load_fresh(
        &self,
        vfs: &dyn VirtualFileSystem,
        artifact: &Path,
        source_path: &Path,
    ) -> Option<Program> {
        if !vfs.is_file(artifact) {
            return None;
        }
        if self.mode.checks_freshness() && !artifact_is_fresh(vfs, artifact, source_path) {
            trace!(
                target: "lamina::cache",
                path = %artifact.display(),
                "artifact older than source"
            );
            return None;
        }
        let bytes = match vfs.read_file(artifact) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(
                    target: "lamina::cache",
                    path = %artifact.display(),
                    error = %err,
                    "unreadable artifact, recompiling"
                );
                return None;
            }
        };
        let program: Program = match serde_json::from_slice(&bytes) {
            Ok(program) => program,
            Err(err) => {
                warn!(
                    target: "lamina::cache",
                    path = %artifact.display(),
                    error = %err,
                    "corrupt artifact, recompiling"
                );
                return None;
            }
        };
        if !program.is_current_version() {
            debug!(
                target: "lamina::cache",
                path = %artifact.display(),
                version = program.version,
                "artifact format version mismatch, recompiling"
            );
            return None;
        }
        Some(program)
    }

    fn read_source(&self, vfs: &dyn VirtualFileSystem, source_path: &Path) -> FetchResult<String> {
        let bytes = vfs.read_file(source_path)?;
        match String::from_utf8(bytes) {
            Ok(text) => Ok(text),
            Err(err) => {
                warn!(
                    target: "lamina::cache",
                    path = %source_path.display(),
                    "template is not valid UTF-8, replacing invalid sequences"
                );
                Ok(String::from_utf8_lossy(err.as_bytes()).into_owned())
            }
        }
    }

    /// Persist an artifact. Failures are logged and swallowed; the caller
    /// keeps the freshly compiled program either way.
    fn store(&self, vfs: &dyn VirtualFileSystem, artifact: &Path, program: &Program) {
        let bytes = match serde_json::to_vec(program) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(
                    target: "lamina::cache",
                    view = %program.name,
                    error = %err,
                    "failed to serialize artifact, render stays uncached"
                );
                return;
            }
        };
        let temp = temp_path(artifact);
        if let Err(err) = vfs.write_file(&temp, &bytes) {
            warn!(
                target: "lamina::cache",
                path = %temp.display(),
                error = %err,
                "failed to write artifact, render stays uncached"
            );
            return;
        }
        if let Err(err) = vfs.rename(&temp, artifact) {
            warn!(
                target: "lamina::cache",
                path = %artifact.display(),
                error = %err,
                "failed to publish artifact, render stays uncached"
            );
        }
    }
}

/// Strictly-newer sources invalidate; equal timestamps count as fresh.
/// Unavailable timestamps count as stale.
fn artifact_is_fresh(
    vfs: &dyn VirtualFileSystem,
    artifact: &Path,
    source_path: &Path,
) -> bool {
    match (vfs.modified(source_path), vfs.modified(artifact)) {
        (Ok(source), Ok(artifact)) => source <= artifact,
        _ => false,
    }
}

/// Temp file beside the artifact, hidden and pid-tagged so concurrent
/// writers on a shared cache directory do not clobber each other.
fn temp_path(artifact: &Path) -> PathBuf {
    let file = artifact
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("artifact"));
    let parent = artifact.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!(".{file}.tmp-{}", std::process::id()))
}
