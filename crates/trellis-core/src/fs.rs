//! File system access used by the resolver and the default renderer.
//!
//! The engine never touches the disk directly; it goes through a
//! [`FileSystem`] so tests and embedders can swap in their own storage.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// Storage backend for template files.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read a whole file as UTF-8 text.
    async fn read(&self, path: &Path) -> io::Result<String>;

    /// Recursively list every file below `root`.
    ///
    /// Returned paths are relative to `root`. Order is unspecified. Fails with
    /// [`io::ErrorKind::NotFound`] only when `root` itself does not exist.
    async fn list(&self, root: &Path) -> io::Result<Vec<PathBuf>>;
}

/// The real disk, through `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn read(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn list(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![PathBuf::new()];

        while let Some(relative) = pending.pop() {
            let dir = root.join(&relative);
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound && !relative.as_os_str().is_empty() => {
                    return Err(io::Error::other(format!(
                        "{} vanished while listing: {}",
                        dir.display(),
                        e
                    )));
                }
                Err(e) => return Err(e),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = relative.join(entry.file_name());
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else {
                    files.push(path);
                }
            }
        }

        Ok(files)
    }
}

/// An in-memory file system.
///
/// Counts `list` and `read` calls, which makes it handy for asserting how
/// many file checks a resolution performed.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: RwLock<BTreeMap<PathBuf, String>>,
    lists: AtomicUsize,
    reads: AtomicUsize,
}

impl MemoryFileSystem {
    /// Create an empty file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file.
    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    /// Add or replace a file.
    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(normalize(&path.into()), content.into());
        }
    }

    /// Drop every file.
    pub fn clear(&self) {
        if let Ok(mut files) = self.files.write() {
            files.clear();
        }
    }

    /// How many times `list` ran.
    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    /// How many times `read` ran.
    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

/// Strip `.` components so `./a/b` and `a/b` address the same file.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn read(&self, path: &Path) -> io::Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let files = self
            .files
            .read()
            .map_err(|_| io::Error::other("file table poisoned"))?;
        files.get(&normalize(path)).cloned().ok_or_else(|| not_found(path))
    }

    async fn list(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let root = normalize(root);
        let files = self
            .files
            .read()
            .map_err(|_| io::Error::other("file table poisoned"))?;

        let listed: Vec<PathBuf> = files
            .keys()
            .filter_map(|path| path.strip_prefix(&root).ok())
            .filter(|relative| !relative.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .collect();

        if listed.is_empty() {
            return Err(not_found(&root));
        }
        Ok(listed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_read_and_list() {
        let fs = MemoryFileSystem::new()
            .with_file("parentTheme/foo-bar.html", "abc123")
            .with_file("parentTheme/bar/foo-foo.html", "def")
            .with_file("other/x.html", "x");

        assert_eq!(fs.read(Path::new("./parentTheme/foo-bar.html")).await.unwrap(), "abc123");

        let mut listed = fs.list(Path::new("./parentTheme/")).await.unwrap();
        listed.sort();
        assert_eq!(
            listed,
            vec![PathBuf::from("bar/foo-foo.html"), PathBuf::from("foo-bar.html")]
        );
        assert_eq!(fs.list_calls(), 1);
        assert_eq!(fs.read_calls(), 1);
    }

    #[tokio::test]
    async fn test_memory_missing() {
        let fs = MemoryFileSystem::new();
        let err = fs.read(Path::new("nope.html")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(fs.list(Path::new("theme/")).await.is_err());
    }

    #[tokio::test]
    async fn test_local_list_is_recursive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
        std::fs::write(dir.path().join("top.html"), "top").unwrap();
        std::fs::write(dir.path().join("nested/deeper/low.html"), "low").unwrap();

        let fs = LocalFileSystem;
        let mut listed = fs.list(dir.path()).await.unwrap();
        listed.sort();
        assert_eq!(
            listed,
            vec![PathBuf::from("nested/deeper/low.html"), PathBuf::from("top.html")]
        );
        assert_eq!(fs.read(&dir.path().join("top.html")).await.unwrap(), "top");
    }

    #[tokio::test]
    async fn test_local_missing_root_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalFileSystem.list(&dir.path().join("absent")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
