//! Conversation session types.
//!
//! A [`Session`] tracks the resumable agent conversation id for one
//! folder. The message history itself lives inside the agent process;
//! the host only needs to remember which session id to hand back on the
//! next turn so the agent can resume.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A per-folder conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session key, the folder name this session belongs to.
    pub folder: String,

    /// Resumable agent-side session id, if one has been assigned yet.
    #[serde(default)]
    pub session_id: Option<String>,

    /// When the session was first created.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// When the session was last updated.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,

    /// Arbitrary session metadata (last channel used, etc.).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Session {
    /// Create a new session for `folder` with no assigned agent session id.
    pub fn new(folder: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            folder: folder.into(),
            session_id: None,
            created_at: now,
            updated_at: now,
            metadata: HashMap::new(),
        }
    }

    /// Record a new agent-assigned session id, bumping `updated_at`.
    pub fn set_session_id(&mut self, session_id: impl Into<String>) {
        self.session_id = Some(session_id.into());
        self.updated_at = Utc::now();
    }
}
