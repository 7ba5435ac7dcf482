//! Agent-input shape written to the subprocess's stdin at spawn time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Initial configuration handed to a freshly spawned agent process.
///
/// Serialized once as a single JSON blob and written to the child's
/// stdin; everything after this is carried over the IPC transport, not
/// stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// The user-facing prompt or instruction that starts this turn.
    pub prompt: String,

    /// Existing session id to resume, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// The chat's folder on disk.
    pub group_folder: String,

    /// The chat's JID.
    pub chat_jid: String,

    /// Whether this chat is the main/owner chat.
    pub is_main: bool,

    /// Whether this turn originates from a scheduled task rather than a
    /// live inbound message.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_scheduled_task: bool,

    /// Secrets the agent is permitted to use this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<HashMap<String, String>>,

    /// Sender ids recognized as trusted for this chat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_ids: Option<Vec<String>>,

    /// Arbitrary trust configuration passed through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_config: Option<serde_json::Value>,
}

impl AgentConfig {
    /// Build the minimal configuration for an interactive turn.
    pub fn interactive(
        prompt: impl Into<String>,
        group_folder: impl Into<String>,
        chat_jid: impl Into<String>,
        is_main: bool,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            session_id: None,
            group_folder: group_folder.into(),
            chat_jid: chat_jid.into(),
            is_main,
            is_scheduled_task: false,
            secrets: None,
            sender_ids: None,
            trust_config: None,
        }
    }

    /// Resume an existing session.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Mark this configuration as a scheduled-task run.
    pub fn as_scheduled_task(mut self) -> Self {
        self.is_scheduled_task = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interactive_config_omits_optional_fields_when_serialized() {
        let config = AgentConfig::interactive("hi", "owner-dm", "discord:1", true);
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sessionId"));
        assert!(!json.contains("isScheduledTask"));
        assert!(!json.contains("secrets"));
    }

    #[test]
    fn with_session_id_round_trips() {
        let config = AgentConfig::interactive("hi", "owner-dm", "discord:1", true)
            .with_session_id("sess-1");
        assert_eq!(config.session_id.as_deref(), Some("sess-1"));
    }

    #[test]
    fn as_scheduled_task_serializes_true() {
        let config =
            AgentConfig::interactive("run", "owner-dm", "discord:1", false).as_scheduled_task();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"isScheduledTask\":true"));
    }
}
