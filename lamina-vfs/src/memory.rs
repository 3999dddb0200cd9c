//! In-memory file system implementation

use crate::error::{VfsError, VfsResult};
use crate::VirtualFileSystem;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

#[derive(Debug, Clone)]
struct MemoryEntry {
    data: Vec<u8>,
    modified: SystemTime,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<String, MemoryEntry>,
    dirs: BTreeSet<String>,
}

/// An in-memory file system implementation.
///
/// All files are stored in memory using a `BTreeMap`, making it suitable
/// for testing and scenarios where disk access is not desired. Every entry
/// carries a modification timestamp that tests can move explicitly via
/// [`MemoryFileSystem::set_modified`], which is how cache-invalidation
/// behavior is exercised without sleeping.
///
/// # Example
/// ```
/// use lamina_vfs::{MemoryFileSystem, VirtualFileSystem};
/// use std::path::Path;
///
/// let fs = MemoryFileSystem::new();
/// fs.write_file(Path::new("/test.txt"), b"hello").unwrap();
/// let content = fs.read_file(Path::new("/test.txt")).unwrap();
/// assert_eq!(content, b"hello");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryFileSystem {
    /// Create a new empty memory file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new memory file system pre-populated with files.
    ///
    /// # Arguments
    /// * `files` - Iterator of (path, content) tuples
    pub fn with_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: AsRef<str>,
    {
        let fs = Self::new();
        {
            let mut state = fs.state.write().unwrap();
            let now = SystemTime::now();
            for (path, content) in files {
                state.files.insert(
                    path.as_ref().to_string(),
                    MemoryEntry {
                        data: content,
                        modified: now,
                    },
                );
            }
        }
        fs
    }

    /// Override the modification time of an existing file.
    ///
    /// # Arguments
    /// * `path` - File path
    /// * `time` - New modification time
    pub fn set_modified(&self, path: &Path, time: SystemTime) -> VfsResult<()> {
        let normalized = normalize_path(path);
        let mut state = self.state.write().map_err(|_| poisoned())?;
        match state.files.get_mut(&normalized) {
            Some(entry) => {
                entry.modified = time;
                Ok(())
            }
            None => Err(VfsError::NotFound { path: normalized }),
        }
    }

    /// Bump the modification time of an existing file to now.
    pub fn touch(&self, path: &Path) -> VfsResult<()> {
        self.set_modified(path, SystemTime::now())
    }
}

/// Normalize a path string for internal storage.
/// Uses forward slashes consistently for cross-platform compatibility.
fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn poisoned() -> VfsError {
    VfsError::Custom {
        message: String::from("Lock poisoned"),
    }
}

impl VirtualFileSystem for MemoryFileSystem {
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let normalized = normalize_path(path);
        let state = self.state.read().map_err(|_| poisoned())?;

        state
            .files
            .get(&normalized)
            .map(|entry| entry.data.clone())
            .ok_or(VfsError::NotFound { path: normalized })
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> VfsResult<()> {
        let normalized = normalize_path(path);
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.files.insert(
            normalized,
            MemoryEntry {
                data: content.to_vec(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let normalized = normalize_path(path);
        let state = match self.state.read() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        state.files.contains_key(&normalized) || state.dirs.contains(&normalized)
    }

    fn is_file(&self, path: &Path) -> bool {
        let normalized = normalize_path(path);
        let state = match self.state.read() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        state.files.contains_key(&normalized)
    }

    fn is_dir(&self, path: &Path) -> bool {
        let normalized = normalize_path(path);
        let state = match self.state.read() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        state.dirs.contains(&normalized)
    }

    fn modified(&self, path: &Path) -> VfsResult<SystemTime> {
        let normalized = normalize_path(path);
        let state = self.state.read().map_err(|_| poisoned())?;
        state
            .files
            .get(&normalized)
            .map(|entry| entry.modified)
            .ok_or(VfsError::NotFound { path: normalized })
    }

    fn create_dir_all(&self, path: &Path) -> VfsResult<()> {
        let normalized = normalize_path(path);
        let mut state = self.state.write().map_err(|_| poisoned())?;
        // Record every ancestor so is_dir answers for parents too
        let mut acc = String::new();
        for part in normalized.split('/').filter(|p| !p.is_empty()) {
            if acc.is_empty() && normalized.starts_with('/') {
                acc.push('/');
            } else if !acc.is_empty() && !acc.ends_with('/') {
                acc.push('/');
            }
            acc.push_str(part);
            state.dirs.insert(acc.clone());
        }
        state.dirs.insert(normalized);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        let from_key = normalize_path(from);
        let to_key = normalize_path(to);
        let mut state = self.state.write().map_err(|_| poisoned())?;
        match state.files.remove(&from_key) {
            Some(entry) => {
                state.files.insert(to_key, entry);
                Ok(())
            }
            None => Err(VfsError::NotFound { path: from_key }),
        }
    }
}
