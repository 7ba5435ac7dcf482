//! The per-chat FIFO queue: strict ordering within a JID, full
//! parallelism across JIDs, and the live interrupt/augment pattern (C5).

pub mod chat_queue;
pub mod error;
pub mod item;
pub mod manager;
pub mod sink;

pub use chat_queue::{
    spawn_chat_queue, ChatQueueConfig, ChatQueueHandle, DEFAULT_INTERACTIVE_IDLE,
    DEFAULT_TASK_IDLE,
};
pub use error::QueueError;
pub use item::{OnTaskComplete, ProduceConfig, ProduceText, TaskOutcome, WorkItem};
pub use manager::{ChatPaths, QueueManager};
pub use sink::{InboundSink, OutboundSink};
