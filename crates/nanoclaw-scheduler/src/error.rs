//! Scheduler errors.

use thiserror::Error;

/// Errors raised while storing, scheduling, or running scheduled tasks.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SchedulerError {
    /// No task is registered under this id.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// A `cron`-kind task's schedule expression does not parse.
    #[error("invalid cron expression: {0}")]
    InvalidCronExpression(String),

    /// The task's registered chat no longer exists.
    #[error("group not found for task {0}")]
    GroupNotFound(String),

    /// The persistent event log could not be read or written.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A persisted event line was not valid JSON or did not match the
    /// expected shape.
    #[error("malformed store event: {0}")]
    MalformedEvent(String),
}

/// A convenience alias for this crate.
pub type Result<T> = std::result::Result<T, SchedulerError>;
