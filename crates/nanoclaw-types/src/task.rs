//! Scheduled task types.
//!
//! Defines the data model for scheduled tasks: [`ScheduledTask`], its
//! [`ScheduleKind`]/[`ScheduleValue`], [`TaskStatus`], and the append-only
//! [`TaskRunLog`] used by the failure diagnoser.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::jid::Jid;

/// How a scheduled task is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Fire according to a cron expression.
    Cron,
    /// Fire repeatedly at a fixed interval.
    Interval,
    /// Fire exactly once at a specific timestamp.
    Once,
}

/// The schedule-kind-specific payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduleValue {
    /// A cron expression, e.g. `"0 9 * * *"`.
    Cron(String),
    /// An interval in milliseconds.
    IntervalMs(i64),
    /// An ISO-8601 timestamp.
    At(DateTime<Utc>),
}

/// Whether a task run targets the folder's shared session or a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    /// Reuse the folder's current session.
    Group,
    /// Start with no session (fresh conversation).
    Isolated,
}

/// Lifecycle status of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Eligible to fire on its schedule.
    Active,
    /// Suspended after a persistent-failure diagnosis; must be resumed manually.
    Paused,
    /// Retries exhausted; terminal until manually reset.
    Error,
    /// A `once` task that has already fired, or was deactivated as orphaned. Terminal.
    Completed,
}

/// A scheduled task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Unique task identifier.
    pub id: String,
    /// Folder this task is scoped to (working directory, session key).
    pub folder: String,
    /// Chat this task's results are delivered to.
    pub jid: Jid,
    /// Prompt text given to the agent on each run.
    pub prompt: String,
    /// How the task is scheduled.
    pub schedule_kind: ScheduleKind,
    /// Schedule-kind-specific value.
    pub schedule_value: ScheduleValue,
    /// Session reuse policy for each run.
    pub context_mode: ContextMode,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Next scheduled fire time; `None` once a `once` task has fired or any
    /// task has reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
    /// Timestamp of the last run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    /// Result text of the last successful run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<String>,
    /// Error string of the last failed run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Consecutive failures since the last success.
    #[serde(default)]
    pub retry_count: u32,
    /// Maximum consecutive retries before transitioning to `error`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
}

fn default_max_retries() -> u32 {
    3
}

impl ScheduledTask {
    /// `true` once status has reached a point from which no further runs occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TaskStatus::Completed)
    }

    /// Invariant check: a `once` task that is not active must have no next run.
    pub fn once_next_run_invariant_holds(&self) -> bool {
        if self.schedule_kind == ScheduleKind::Once && self.status != TaskStatus::Active {
            self.next_run.is_none()
        } else {
            true
        }
    }
}

/// One recorded execution of a [`ScheduledTask`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRunLog {
    /// Which task this run belongs to.
    pub task_id: String,
    /// When the run started.
    pub run_at: DateTime<Utc>,
    /// Wall-clock duration of the run.
    pub duration_ms: i64,
    /// Outcome of the run.
    pub status: RunStatus,
    /// Result text, if the run succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Error text, if the run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a single task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The run completed successfully.
    Success,
    /// The run failed.
    Error,
}
