//! Scratch files handed to the toolchain.
//!
//! The toolchain only accepts file paths, so the checker writes each snapshot
//! to a scratch file first. Paths are deterministic per document identity:
//! `<dir>/<file-stem>-<hash>.<ext>`, where `<hash>` is the first 16 hex digits
//! of the SHA-256 of the full identity, stable across builds. Two open
//! documents with the same file name never share a scratch file.
//!
//! Production code uses [`TempDirScratch`]; tests can swap in the in-memory
//! `mock::MemoryScratch`.

use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use sha2::{Digest, Sha256};

use crate::diagnostics::{BridgeError, BridgeResult};

/// Filesystem collaborator for the one-shot checker.
pub trait ScratchSpace: Send + Sync + Debug {
    /// Deterministic scratch path for a document identity.
    fn path_for(&self, identity: &str) -> PathBuf;

    fn write(&self, path: &Path, text: &str) -> BridgeResult<()>;

    /// Remove a scratch file. A missing file is not an error.
    fn remove(&self, path: &Path) -> BridgeResult<()>;
}

/// Scratch files under a directory on disk, created on first write.
#[derive(Debug)]
pub struct TempDirScratch {
    target: RwLock<Target>,
}

#[derive(Debug, Clone)]
struct Target {
    dir: PathBuf,
    extension: String,
}

impl TempDirScratch {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            target: RwLock::new(Target {
                dir: dir.into(),
                extension: extension.into(),
            }),
        }
    }

    fn target(&self) -> Target {
        self.target
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn dir(&self) -> PathBuf {
        self.target().dir
    }

    pub fn extension(&self) -> String {
        self.target().extension
    }

    /// Point future paths at another directory and extension. Files already
    /// written stay where they are.
    pub fn retarget(&self, dir: impl Into<PathBuf>, extension: impl Into<String>) {
        *self.target.write().unwrap_or_else(PoisonError::into_inner) = Target {
            dir: dir.into(),
            extension: extension.into(),
        };
    }
}

impl ScratchSpace for TempDirScratch {
    fn path_for(&self, identity: &str) -> PathBuf {
        let target = self.target();
        target
            .dir
            .join(scratch_file_name(identity, &target.extension))
    }

    fn write(&self, path: &Path, text: &str) -> BridgeResult<()> {
        let scratch_error = |source| BridgeError::Scratch {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(scratch_error)?;
        }
        std::fs::write(path, text).map_err(scratch_error)
    }

    fn remove(&self, path: &Path) -> BridgeResult<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(BridgeError::Scratch {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// `<stem>-<hash>.<ext>` for an identity such as a document URI.
pub fn scratch_file_name(identity: &str, extension: &str) -> String {
    let file_name = identity
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(identity);
    let file_name = file_name.split(['?', '#']).next().unwrap_or(file_name);
    let stem = file_name
        .strip_suffix(extension)
        .and_then(|rest| rest.strip_suffix('.'))
        .unwrap_or(file_name);
    let stem: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "untitled".to_string() } else { stem };

    let digest = Sha256::digest(identity.as_bytes());
    let hash: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    format!("{stem}-{hash}.{extension}")
}

#[cfg(test)]
pub mod mock {
    //! In-memory scratch space.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    pub struct MemoryScratch {
        files: Mutex<HashMap<PathBuf, String>>,
        /// When set, every write fails with this error kind.
        pub fail_writes: Option<io::ErrorKind>,
    }

    impl MemoryScratch {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(kind: io::ErrorKind) -> Self {
            Self {
                fail_writes: Some(kind),
                ..Self::default()
            }
        }

        pub fn contents(&self, path: &Path) -> Option<String> {
            self.files
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(path)
                .cloned()
        }

        pub fn file_count(&self) -> usize {
            self.files.lock().unwrap_or_else(PoisonError::into_inner).len()
        }
    }

    impl ScratchSpace for MemoryScratch {
        fn path_for(&self, identity: &str) -> PathBuf {
            PathBuf::from("/scratch").join(scratch_file_name(identity, "frg"))
        }

        fn write(&self, path: &Path, text: &str) -> BridgeResult<()> {
            if let Some(kind) = self.fail_writes {
                return Err(BridgeError::Scratch {
                    path: path.to_path_buf(),
                    source: io::Error::from(kind),
                });
            }
            self.files
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(path.to_path_buf(), text.to_string());
            Ok(())
        }

        fn remove(&self, path: &Path) -> BridgeResult<()> {
            self.files
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(path);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_keeps_stem_and_extension() {
        let name = scratch_file_name("file:///home/me/hw1/model.frg", "frg");
        assert!(name.starts_with("model-"), "got {name}");
        assert!(name.ends_with(".frg"));
        assert_eq!(name.len(), "model-".len() + 16 + ".frg".len());
    }

    #[test]
    fn test_same_file_name_in_different_directories_differs() {
        let a = scratch_file_name("file:///a/model.frg", "frg");
        let b = scratch_file_name("file:///b/model.frg", "frg");
        assert_ne!(a, b);
    }

    #[test]
    fn test_file_name_is_deterministic() {
        let identity = "file:///c%3A/Users/me/model.frg";
        assert_eq!(
            scratch_file_name(identity, "frg"),
            scratch_file_name(identity, "frg")
        );
    }

    #[test]
    fn test_file_name_hash_is_pinned() {
        assert_eq!(
            scratch_file_name("file:///hw/model.frg", "frg"),
            "model-8046bda394d5fb2f.frg"
        );
    }

    #[test]
    fn test_untitled_and_odd_names() {
        assert!(scratch_file_name("untitled:Untitled-1", "frg").starts_with("untitled_Untitled-1-"));
        assert!(scratch_file_name("file:///dir/", "frg").starts_with("untitled-"));
        assert!(scratch_file_name("file:///dir/my%20model.frg", "frg").starts_with("my_20model-"));
    }

    #[test]
    fn test_write_and_remove_on_disk() {
        let temp = tempfile::TempDir::new().unwrap();
        let scratch = TempDirScratch::new(temp.path().join("nested"), "frg");
        let path = scratch.path_for("file:///x/model.frg");
        assert!(path.starts_with(scratch.dir()));

        scratch.retarget(temp.path().join("elsewhere"), "forge");
        let moved = scratch.path_for("file:///x/model.frg");
        assert!(moved.starts_with(temp.path().join("elsewhere")));
        assert_eq!(moved.extension().unwrap(), "forge");
        assert_eq!(scratch.extension(), "forge");

        scratch.write(&path, "#lang forge\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "#lang forge\n");

        scratch.remove(&path).unwrap();
        assert!(!path.exists());
        scratch.remove(&path).unwrap();
    }

    #[test]
    fn test_write_failure_is_scratch_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let scratch = TempDirScratch::new(&blocker, "frg");
        let path = scratch.path_for("file:///x/model.frg");
        let err = scratch.write(&path, "text").unwrap_err();
        assert!(matches!(err, BridgeError::Scratch { .. }));
    }
}
