//! Filesystem abstraction and native implementation.
//!
//! A thin [`FileSystem`] trait over [`tokio::fs`], kept as a trait (rather
//! than calling `tokio::fs` directly everywhere) so the IPC transport and
//! session/task storage layers can be exercised against an in-memory or
//! tempdir-backed implementation in tests.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Filesystem operations needed by the host.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read a file's entire contents as a UTF-8 string.
    async fn read_to_string(&self, path: &Path) -> std::io::Result<String>;

    /// Write a string to a file, creating parent directories if needed.
    /// Overwrites the file if it already exists.
    async fn write_string(&self, path: &Path, content: &str) -> std::io::Result<()>;

    /// Append a string to a file, creating it (and parent dirs) if needed.
    async fn append_string(&self, path: &Path, content: &str) -> std::io::Result<()>;

    /// Atomically write a string to `path` by writing to a sibling `.tmp`
    /// file and renaming it into place. Readers never observe a partial
    /// write.
    async fn write_atomic(&self, path: &Path, content: &str) -> std::io::Result<()>;

    /// Check whether a path exists (file or directory).
    async fn exists(&self, path: &Path) -> bool;

    /// List all entries in a directory. Does not recurse.
    async fn list_dir(&self, path: &Path) -> std::io::Result<Vec<PathBuf>>;

    /// Create a directory and all parent directories.
    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Remove a file. Not an error if the file is already gone.
    async fn remove_file(&self, path: &Path) -> std::io::Result<()>;

    /// Get the user's home directory.
    fn home_dir(&self) -> Option<PathBuf>;
}

/// Native filesystem implementation using [`tokio::fs`].
pub struct NativeFileSystem;

#[async_trait]
impl FileSystem for NativeFileSystem {
    async fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn write_string(&self, path: &Path, content: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await
    }

    async fn append_string(&self, path: &Path, content: &str) -> std::io::Result<()> {
        use tokio::io::AsyncWriteExt;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn write_atomic(&self, path: &Path, content: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = path.with_extension(match path.extension() {
            Some(ext) => format!("{}.tmp", ext.to_string_lossy()),
            None => "tmp".to_string(),
        });
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn list_dir(&self, path: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(path).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            entries.push(entry.path());
        }
        Ok(entries)
    }

    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn remove_file(&self, path: &Path) -> std::io::Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_atomic_leaves_no_tmp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drop").join("1-abcdef.json");
        let fs = NativeFileSystem;
        fs.write_atomic(&path, "{}").await.unwrap();

        assert!(fs.exists(&path).await);
        let tmp = path.with_extension("json.tmp");
        assert!(!fs.exists(&tmp).await);
    }

    #[tokio::test]
    async fn write_atomic_content_is_complete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.json");
        let fs = NativeFileSystem;
        fs.write_atomic(&path, "{\"type\":\"message\"}").await.unwrap();

        let content = fs.read_to_string(&path).await.unwrap();
        assert_eq!(content, "{\"type\":\"message\"}");
    }

    #[tokio::test]
    async fn remove_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.json");
        let fs = NativeFileSystem;
        fs.remove_file(&path).await.unwrap();
        fs.remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn list_dir_returns_full_paths() {
        let dir = tempfile::tempdir().unwrap();
        let fs = NativeFileSystem;
        fs.write_string(&dir.path().join("a.json"), "{}").await.unwrap();
        fs.write_string(&dir.path().join("b.json"), "{}").await.unwrap();

        let mut entries = fs.list_dir(dir.path()).await.unwrap();
        entries.sort();
        assert_eq!(entries.len(), 2);
    }
}
