//! Work items accepted by a per-chat queue.

use nanoclaw_agent::AgentConfig;

/// Produces the prompt text for an interactive turn, evaluated just
/// before the item is acted on (either to spawn a fresh agent or to be
/// piped into a running one).
pub type ProduceText = Box<dyn FnOnce() -> String + Send + 'static>;

/// Produces the full agent configuration for a scheduled task run.
pub type ProduceConfig = Box<dyn FnOnce() -> AgentConfig + Send + 'static>;

/// The outcome of one scheduled task's run, handed back to whoever
/// enqueued it so it can record a run log.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// The task id this outcome belongs to.
    pub task_id: String,
    /// `true` if the agent exited cleanly without an error frame.
    pub succeeded: bool,
    /// The error message, if the run failed.
    pub error: Option<String>,
}

/// Callback invoked once a scheduled task's run completes.
pub type OnTaskComplete = Box<dyn FnOnce(TaskOutcome) + Send + 'static>;

/// One unit of work submitted to a chat's queue.
pub enum WorkItem {
    /// Interactive inbound turn.
    Message {
        /// Produces the prompt text.
        produce_text: ProduceText,
    },
    /// Scheduled task run.
    Task {
        /// The task's id, for logging and the completion callback.
        task_id: String,
        /// Produces the agent configuration for this run.
        produce_config: ProduceConfig,
        /// Invoked once the run completes or fails.
        on_complete: OnTaskComplete,
    },
}

impl WorkItem {
    /// A short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            WorkItem::Message { .. } => "message",
            WorkItem::Task { .. } => "task",
        }
    }
}
