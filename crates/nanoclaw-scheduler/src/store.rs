//! Append-only JSONL persistence for scheduled tasks.
//!
//! Every mutation is one `StorageEvent` appended to the log, followed by
//! the matching in-memory field update. Replaying the full log from
//! scratch rebuilds the same map, which is how `load_tasks` recovers
//! state at startup.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

use nanoclaw_types::ScheduledTask;

use crate::error::{Result, SchedulerError};

/// One persisted mutation of the task set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StorageEvent {
    Create { task: ScheduledTask },
    Update { task_id: String, field: String, value: Value },
    Delete { task_id: String },
}

/// JSONL-backed store for the scheduler's task set.
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    /// Point at the log file. The file (and its parent directory) is
    /// created lazily on first write.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Replay the log into an in-memory map. Invalid lines are skipped
    /// with a warning rather than failing the whole load.
    pub async fn load_tasks(&self) -> Result<HashMap<String, ScheduledTask>> {
        let mut tasks = HashMap::new();

        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(tasks),
            Err(e) => return Err(e.into()),
        };

        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let event: StorageEvent = match serde_json::from_str(line) {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping malformed task store line");
                    continue;
                }
            };
            apply_event(&mut tasks, event);
        }

        Ok(tasks)
    }

    /// Persist a new task.
    pub async fn append_create(&self, task: &ScheduledTask) -> Result<()> {
        self.append_event(&StorageEvent::Create { task: task.clone() }).await
    }

    /// Persist a single field update on an existing task.
    pub async fn append_update(&self, task_id: &str, field: &str, value: Value) -> Result<()> {
        self.append_event(&StorageEvent::Update {
            task_id: task_id.to_string(),
            field: field.to_string(),
            value,
        })
        .await
    }

    /// Persist a task's removal.
    pub async fn append_delete(&self, task_id: &str) -> Result<()> {
        self.append_event(&StorageEvent::Delete { task_id: task_id.to_string() }).await
    }

    async fn append_event(&self, event: &StorageEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(event)
            .map_err(|e| SchedulerError::MalformedEvent(e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Stream the run log file line by line, most recent lines last,
    /// returning the last `limit` entries for a task.
    pub async fn recent_run_errors(&self, run_log_path: &PathBuf, task_id: &str, limit: usize) -> Result<Vec<String>> {
        let file = match tokio::fs::File::open(run_log_path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut lines = BufReader::new(file).lines();
        let mut errors = Vec::new();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let Ok(value) = serde_json::from_str::<Value>(&line) else {
                continue;
            };
            if value.get("task_id").and_then(|v| v.as_str()) != Some(task_id) {
                continue;
            }
            if let Some(error) = value.get("error").and_then(|v| v.as_str()) {
                errors.push(error.to_string());
            }
        }
        if errors.len() > limit {
            let start = errors.len() - limit;
            errors = errors.split_off(start);
        }
        Ok(errors)
    }

    /// Append one run log entry.
    pub async fn append_run_log(&self, run_log_path: &PathBuf, entry: &Value) -> Result<()> {
        if let Some(parent) = run_log_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(entry)
            .map_err(|e| SchedulerError::MalformedEvent(e.to_string()))?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(run_log_path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

fn apply_event(tasks: &mut HashMap<String, ScheduledTask>, event: StorageEvent) {
    match event {
        StorageEvent::Create { task } => {
            tasks.insert(task.id.clone(), task);
        }
        StorageEvent::Update { task_id, field, value } => {
            if let Some(task) = tasks.get_mut(&task_id) {
                apply_field_update(task, &field, &value);
            } else {
                warn!(task_id, field, "update for unknown task, ignoring");
            }
        }
        StorageEvent::Delete { task_id } => {
            tasks.remove(&task_id);
        }
    }
}

/// Apply a single named-field update to an in-memory task. Mirrors the
/// field set the scheduler actually mutates; unknown fields are logged
/// and ignored rather than failing the whole replay.
fn apply_field_update(task: &mut ScheduledTask, field: &str, value: &Value) {
    match field {
        "status" => {
            if let Some(s) = value.as_str() {
                if let Ok(status) = serde_json::from_value(Value::String(s.to_string())) {
                    task.status = status;
                }
            }
        }
        "next_run" => {
            task.next_run = serde_json::from_value(value.clone()).unwrap_or(None);
        }
        "last_run" => {
            task.last_run = serde_json::from_value(value.clone()).unwrap_or(None);
        }
        "last_result" => {
            task.last_result = serde_json::from_value(value.clone()).unwrap_or(None);
        }
        "last_error" => {
            task.last_error = serde_json::from_value(value.clone()).unwrap_or(None);
        }
        "retry_count" => {
            if let Some(n) = value.as_u64() {
                task.retry_count = n as u32;
            }
        }
        _ => warn!(field, "unknown task field update, ignoring"),
    }
}
