//! IPC wire message shapes.
//!
//! Every dropped file is a JSON object discriminated by `type`. Producer
//! and consumer may live in different processes; the transport makes no
//! assumptions beyond filesystem visibility, so these types carry no
//! references back into host state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nanoclaw_types::task::{ContextMode, ScheduleKind};

/// A message dropped into (or drained from) an agent's IPC directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcMessage {
    /// A user turn to fold into the conversation.
    Message {
        /// Chat this text originated from.
        chat_jid: String,
        /// Message text.
        text: String,
        /// Optional sender display name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender: Option<String>,
        /// Folder the message is scoped to.
        group_folder: String,
        /// When the message was produced.
        timestamp: DateTime<Utc>,
    },
    /// A voice note to fold into the conversation.
    VoiceMessage {
        /// Chat this audio originated from.
        chat_jid: String,
        /// Path to the audio file (resolved relative to the agent's mounts).
        audio_path: String,
        /// Folder the message is scoped to.
        group_folder: String,
        /// When the audio was produced.
        timestamp: DateTime<Utc>,
    },
    /// A tool-initiated request to create a scheduled task.
    ScheduleTask {
        /// Prompt text for the new task.
        prompt: String,
        /// Schedule kind.
        schedule_type: ScheduleKind,
        /// Schedule-kind-specific value (cron expr, ms, or ISO timestamp) as raw text.
        schedule_value: String,
        /// Session reuse policy.
        context_mode: ContextMode,
        /// Chat the task's results should be delivered to.
        target_jid: String,
        /// Who asked for the task (plugin name or user id).
        created_by: String,
        /// When the request was made.
        timestamp: DateTime<Utc>,
    },
    /// Suspend a scheduled task.
    PauseTask {
        /// Task to pause.
        task_id: String,
        /// Folder the request came from.
        group_folder: String,
        /// Whether the request came from the main folder.
        is_main: bool,
        /// When the request was made.
        timestamp: DateTime<Utc>,
    },
    /// Resume a paused scheduled task.
    ResumeTask {
        /// Task to resume.
        task_id: String,
        /// Folder the request came from.
        group_folder: String,
        /// Whether the request came from the main folder.
        is_main: bool,
        /// When the request was made.
        timestamp: DateTime<Utc>,
    },
    /// Cancel (delete) a scheduled task.
    CancelTask {
        /// Task to cancel.
        task_id: String,
        /// Folder the request came from.
        group_folder: String,
        /// Whether the request came from the main folder.
        is_main: bool,
        /// When the request was made.
        timestamp: DateTime<Utc>,
    },
    /// Register a new chat with the router.
    RegisterGroup {
        /// Routing key for the new chat.
        jid: String,
        /// Human-readable display name.
        name: String,
        /// Folder to assign.
        folder: String,
        /// Optional trigger pattern.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trigger: Option<String>,
        /// When the request was made.
        timestamp: DateTime<Utc>,
    },
}

impl IpcMessage {
    /// The `type` discriminator string, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            IpcMessage::Message { .. } => "message",
            IpcMessage::VoiceMessage { .. } => "voice_message",
            IpcMessage::ScheduleTask { .. } => "schedule_task",
            IpcMessage::PauseTask { .. } => "pause_task",
            IpcMessage::ResumeTask { .. } => "resume_task",
            IpcMessage::CancelTask { .. } => "cancel_task",
            IpcMessage::RegisterGroup { .. } => "register_group",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_round_trips_through_json() {
        let msg = IpcMessage::Message {
            chat_jid: "discord:1".into(),
            text: "wait, also...".into(),
            sender: Some("alice".into()),
            group_folder: "owner-dm".into(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"message\""));
        let restored: IpcMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.kind(), "message");
    }

    #[test]
    fn cancel_task_kind() {
        let msg = IpcMessage::CancelTask {
            task_id: "t1".into(),
            group_folder: "owner-dm".into(),
            is_main: true,
            timestamp: Utc::now(),
        };
        assert_eq!(msg.kind(), "cancel_task");
    }
}
