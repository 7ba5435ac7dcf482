//! The file-drop transport implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use nanoclaw_platform::FileSystem;

use crate::error::{IpcError, Result};
use crate::message::IpcMessage;

/// Name of the sentinel file that signals end-of-session.
pub const CLOSE_SENTINEL: &str = "_close";

/// Default interval between drain polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A bidirectional file-drop transport rooted at a single directory.
///
/// One `IpcTransport` is created per agent IPC root (typically the
/// agent's inbox or outbox directory). Producer and consumer need not be
/// the same process -- the transport assumes nothing beyond filesystem
/// visibility of `root`.
pub struct IpcTransport<F: FileSystem> {
    root: PathBuf,
    fs: Arc<F>,
}

impl<F: FileSystem> IpcTransport<F> {
    /// Create a transport rooted at `root`. Does not create the directory;
    /// the first write does.
    pub fn new(root: PathBuf, fs: Arc<F>) -> Self {
        Self { root, fs }
    }

    /// The root directory this transport is scoped to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate that `path` resolves to somewhere under `root`, without
    /// requiring the path to exist yet (canonicalizing the parent instead).
    fn check_contained(&self, path: &Path) -> Result<()> {
        let root_abs = std::path::absolute(&self.root).map_err(IpcError::Transport)?;
        let path_abs = std::path::absolute(path).map_err(IpcError::Transport)?;
        if path_abs.starts_with(&root_abs) {
            Ok(())
        } else {
            Err(IpcError::PathEscape {
                root: root_abs.display().to_string(),
                attempted: path_abs.display().to_string(),
            })
        }
    }

    /// Write a message into the transport's directory.
    ///
    /// The filename is `<epochMillis>-<random6>.json`, written via
    /// temp-file-then-rename so that a concurrent drain only ever
    /// observes a complete file.
    pub async fn write(&self, msg: &IpcMessage) -> Result<PathBuf> {
        let filename = Self::generate_filename();
        let path = self.root.join(&filename);
        self.check_contained(&path)?;

        let body = serde_json::to_string(msg).map_err(|e| IpcError::Parse {
            file: filename.clone(),
            source: e,
        })?;

        self.fs
            .write_atomic(&path, &body)
            .await
            .map_err(IpcError::Transport)?;

        debug!(kind = msg.kind(), file = %filename, "wrote ipc message");
        Ok(path)
    }

    /// Write the `_close` sentinel, signalling graceful end of session.
    pub async fn write_close_sentinel(&self) -> Result<()> {
        let path = self.root.join(CLOSE_SENTINEL);
        self.check_contained(&path)?;
        self.fs
            .write_atomic(&path, "")
            .await
            .map_err(IpcError::Transport)?;
        debug!("wrote close sentinel");
        Ok(())
    }

    /// Check whether the `_close` sentinel is present, without consuming it.
    pub async fn has_close_sentinel(&self) -> bool {
        self.fs.exists(&self.root.join(CLOSE_SENTINEL)).await
    }

    /// Consume the `_close` sentinel if present, returning whether it was found.
    pub async fn consume_close_sentinel(&self) -> Result<bool> {
        let path = self.root.join(CLOSE_SENTINEL);
        if self.fs.exists(&path).await {
            self.fs.remove_file(&path).await.map_err(IpcError::Transport)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Drain all `.json` files in the transport's directory, sorted by
    /// filename (chronological, since filenames are epoch-prefixed).
    ///
    /// Each file is unlinked after a successful parse. A file that fails
    /// to parse is unlinked and logged but does not block the rest of the
    /// drain.
    pub async fn drain(&self) -> Result<Vec<IpcMessage>> {
        if !self.fs.exists(&self.root).await {
            return Ok(Vec::new());
        }

        let mut entries = self
            .fs
            .list_dir(&self.root)
            .await
            .map_err(IpcError::Transport)?;
        entries.retain(|p| p.extension().map(|e| e == "json").unwrap_or(false));
        entries.sort();

        let mut messages = Vec::with_capacity(entries.len());
        for path in entries {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let content = match self.fs.read_to_string(&path).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(file = %filename, error = %e, "failed to read ipc file, skipping");
                    let _ = self.fs.remove_file(&path).await;
                    continue;
                }
            };

            match serde_json::from_str::<IpcMessage>(&content) {
                Ok(msg) => {
                    messages.push(msg);
                }
                Err(e) => {
                    warn!(file = %filename, error = %e, "failed to parse ipc file, skipping");
                }
            }

            if let Err(e) = self.fs.remove_file(&path).await {
                warn!(file = %filename, error = %e, "failed to unlink drained ipc file");
            }
        }

        Ok(messages)
    }

    /// Generate an epoch-millis-prefixed, collision-resistant filename.
    fn generate_filename() -> String {
        let epoch_ms = chrono::Utc::now().timestamp_millis();
        let suffix: String = {
            let mut rng = rand::thread_rng();
            (0..6)
                .map(|_| {
                    let n: u8 = rng.gen_range(0..36);
                    std::char::from_digit(n as u32, 36).unwrap_or('0')
                })
                .collect()
        };
        format!("{epoch_ms}-{suffix}.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nanoclaw_platform::NativeFileSystem;

    fn transport(root: PathBuf) -> IpcTransport<NativeFileSystem> {
        IpcTransport::new(root, Arc::new(NativeFileSystem))
    }

    fn sample_message(text: &str) -> IpcMessage {
        IpcMessage::Message {
            chat_jid: "discord:1".into(),
            text: text.into(),
            sender: None,
            group_folder: "owner-dm".into(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn round_trip_ipc_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let t = transport(dir.path().to_path_buf());

        t.write(&sample_message("first")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        t.write(&sample_message("second")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        t.write(&sample_message("third")).await.unwrap();

        let drained = t.drain().await.unwrap();
        let texts: Vec<&str> = drained
            .iter()
            .map(|m| match m {
                IpcMessage::Message { text, .. } => text.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn drain_is_destructive() {
        let dir = tempfile::tempdir().unwrap();
        let t = transport(dir.path().to_path_buf());
        t.write(&sample_message("only")).await.unwrap();

        assert_eq!(t.drain().await.unwrap().len(), 1);
        assert_eq!(t.drain().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn drain_on_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let t = transport(dir.path().join("never-created"));
        assert!(t.drain().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn close_sentinel_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let t = transport(dir.path().to_path_buf());
        assert!(!t.has_close_sentinel().await);

        t.write_close_sentinel().await.unwrap();
        assert!(t.has_close_sentinel().await);

        assert!(t.consume_close_sentinel().await.unwrap());
        assert!(!t.has_close_sentinel().await);
    }

    #[tokio::test]
    async fn consume_close_sentinel_twice_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let t = transport(dir.path().to_path_buf());
        t.write_close_sentinel().await.unwrap();
        assert!(t.consume_close_sentinel().await.unwrap());
        assert!(!t.consume_close_sentinel().await.unwrap());
    }

    #[tokio::test]
    async fn write_path_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let t = transport(dir.path().to_path_buf());
        let escaping = dir.path().parent().unwrap().join("escaped.json");
        let err = t.check_contained(&escaping).unwrap_err();
        assert!(matches!(err, IpcError::PathEscape { .. }));
    }

    #[tokio::test]
    async fn drain_skips_unparsable_file_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let t = transport(dir.path().to_path_buf());
        let fs = NativeFileSystem;
        fs.write_atomic(&dir.path().join("0-bad.json"), "not json")
            .await
            .unwrap();
        t.write(&sample_message("good")).await.unwrap();

        let drained = t.drain().await.unwrap();
        assert_eq!(drained.len(), 1);
        // Bad file was unlinked too, despite failing to parse.
        assert!(dir.path().join("0-bad.json").metadata().is_err());
    }
}
