//! Registered chat metadata.
//!
//! A chat becomes "registered" the first time the router admits it --
//! either via an explicit `register_group` IPC request from the agent or
//! via a channel's own auto-registration policy. Registration assigns the
//! chat a `folder`, which doubles as the agent's working directory and
//! the scoping key for tasks and sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::jid::Jid;

/// A chat the host has registered and will route interactive turns and
/// scheduled tasks for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredChat {
    /// Routing key.
    pub jid: Jid,
    /// Human-readable name shown in status output.
    pub display_name: String,
    /// Working-directory / scoping-key folder name.
    pub folder: String,
    /// Optional regex-style trigger pattern gating whether a message
    /// addresses the agent (e.g. requiring a mention in a group chat).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_pattern: Option<String>,
    /// Whether `trigger_pattern` must match before a message is piped in.
    #[serde(default)]
    pub requires_trigger: bool,
    /// Whether this is the single main folder with cross-chat admin tools.
    #[serde(default)]
    pub is_main: bool,
    /// When the chat was registered.
    pub added_at: DateTime<Utc>,
}

impl RegisteredChat {
    /// Build a newly registered chat with the given jid/folder, defaulting
    /// to no trigger requirement and non-main status.
    pub fn new(jid: Jid, display_name: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            jid,
            display_name: display_name.into(),
            folder: folder.into(),
            trigger_pattern: None,
            requires_trigger: false,
            is_main: false,
            added_at: Utc::now(),
        }
    }
}
