//! A generic append-only JSONL key/value log, the same on-disk shape as
//! the scheduler's task store, reused here for the registered-chat table
//! and the per-folder session table.

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum RecordEvent<T> {
    Put { key: String, value: T },
    Delete { key: String },
}

/// An in-memory map backed by an append-only JSONL event log. Every
/// mutation is one `Put`/`Delete` append, giving single-row-write
/// atomicity without a SQL engine.
pub struct JsonlMap {
    path: PathBuf,
}

impl JsonlMap {
    /// Bind to the log at `path`. The file is created on first write.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Replay the log into a fresh map. Lines that fail to parse are
    /// logged and skipped rather than aborting the load.
    pub async fn load<T>(&self) -> std::io::Result<HashMap<String, T>>
    where
        T: DeserializeOwned + Debug,
    {
        let mut map = HashMap::new();
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(map);
        }

        let file = tokio::fs::File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RecordEvent<T>>(&line) {
                Ok(RecordEvent::Put { key, value }) => {
                    map.insert(key, value);
                }
                Ok(RecordEvent::Delete { key }) => {
                    map.remove(&key);
                }
                Err(e) => {
                    warn!(error = %e, "skipping malformed record in jsonl store");
                }
            }
        }
        Ok(map)
    }

    /// Append a `Put` event.
    pub async fn append_put<T: Serialize>(&self, key: &str, value: &T) -> std::io::Result<()> {
        self.append(&RecordEvent::Put {
            key: key.to_string(),
            value,
        })
        .await
    }

    /// Append a `Delete` event.
    pub async fn append_delete(&self, key: &str) -> std::io::Result<()> {
        self.append(&RecordEvent::<()>::Delete { key: key.to_string() })
            .await
    }

    async fn append<T: Serialize>(&self, event: &RecordEvent<T>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let line = serde_json::to_string(event)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
    }

    #[tokio::test]
    async fn put_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlMap::new(dir.path().join("log.jsonl"));
        store
            .append_put("a", &Sample { name: "alice".into() })
            .await
            .unwrap();

        let loaded: HashMap<String, Sample> = store.load().await.unwrap();
        assert_eq!(loaded.get("a").unwrap().name, "alice");
    }

    #[tokio::test]
    async fn put_then_delete_removes_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlMap::new(dir.path().join("log.jsonl"));
        store
            .append_put("a", &Sample { name: "alice".into() })
            .await
            .unwrap();
        store.append_delete("a").await.unwrap();

        let loaded: HashMap<String, Sample> = store.load().await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn later_put_overwrites_earlier_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlMap::new(dir.path().join("log.jsonl"));
        store
            .append_put("a", &Sample { name: "alice".into() })
            .await
            .unwrap();
        store
            .append_put("a", &Sample { name: "alice-v2".into() })
            .await
            .unwrap();

        let loaded: HashMap<String, Sample> = store.load().await.unwrap();
        assert_eq!(loaded.get("a").unwrap().name, "alice-v2");
    }

    #[tokio::test]
    async fn load_on_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlMap::new(dir.path().join("never-written.jsonl"));
        let loaded: HashMap<String, Sample> = store.load().await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn malformed_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        tokio::fs::create_dir_all(dir.path()).await.unwrap();
        tokio::fs::write(&path, "not json\n").await.unwrap();
        let store = JsonlMap::new(path.clone());
        store
            .append_put("a", &Sample { name: "alice".into() })
            .await
            .unwrap();

        let loaded: HashMap<String, Sample> = store.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
    }
}
