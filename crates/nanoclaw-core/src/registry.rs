//! The registered-chat table and per-folder session table: the single
//! piece of shared state the scheduler, the channel router, and the
//! queue all need a read (or, for sessions, a single-writer) view of.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::RwLock as StdRwLock;
use std::sync::Arc;

use tracing::{debug, warn};

use nanoclaw_channels::RegistrationPolicy;
use nanoclaw_scheduler::{GroupResolver, SessionResolver};
use nanoclaw_types::{Jid, RegisteredChat, Session};

use crate::store::JsonlMap;

/// Chats and sessions, backed by append-only JSONL logs. Implements the
/// small read-mostly traits the scheduler and channel router each define
/// locally to avoid depending on this crate directly.
pub struct Registry {
    chats: StdRwLock<HashMap<String, RegisteredChat>>,
    sessions: StdRwLock<HashMap<String, Session>>,
    chat_store: Arc<JsonlMap>,
    session_store: Arc<JsonlMap>,
    /// Channel prefixes that auto-accept any inbound jid (e.g. the local
    /// web dashboard). Everything else needs either a prior registration
    /// or an explicit entry in `allowed_jids`.
    open_channels: HashSet<String>,
    /// Specific jids allowed to register even on a closed channel (e.g.
    /// the owner's known Discord DM channel id).
    allowed_jids: HashSet<Jid>,
}

impl Registry {
    /// Load both tables from disk under `data_dir` (`chats.jsonl`,
    /// `sessions.jsonl`).
    pub async fn load(
        data_dir: PathBuf,
        open_channels: HashSet<String>,
        allowed_jids: HashSet<Jid>,
    ) -> std::io::Result<Self> {
        let chat_store = Arc::new(JsonlMap::new(data_dir.join("chats.jsonl")));
        let session_store = Arc::new(JsonlMap::new(data_dir.join("sessions.jsonl")));
        let chats = chat_store.load::<RegisteredChat>().await?;
        let sessions = session_store.load::<Session>().await?;
        Ok(Self {
            chats: StdRwLock::new(chats),
            sessions: StdRwLock::new(sessions),
            chat_store,
            session_store,
            open_channels,
            allowed_jids,
        })
    }

    /// All currently registered chats, for CLI/dashboard listing.
    pub fn list_chats(&self) -> Vec<RegisteredChat> {
        self.chats.read().unwrap().values().cloned().collect()
    }

    /// Record a new resumable session id for `folder`, creating the
    /// session row if this is its first turn. The queue is the single
    /// writer here; the scheduler only ever reads via [`SessionResolver`].
    pub async fn record_session_id(&self, folder: &str, session_id: String) {
        let session = {
            let mut sessions = self.sessions.write().unwrap();
            let session = sessions
                .entry(folder.to_string())
                .or_insert_with(|| Session::new(folder));
            session.set_session_id(session_id);
            session.clone()
        };
        if let Err(e) = self.session_store.append_put(folder, &session).await {
            warn!(folder, error = %e, "failed to persist session id");
        }
    }

}

impl RegistrationPolicy for Registry {
    fn is_allowed(&self, jid: &Jid) -> bool {
        if self.chats.read().unwrap().contains_key(jid.as_str()) {
            return true;
        }
        self.open_channels.contains(jid.channel_prefix()) || self.allowed_jids.contains(jid)
    }

    fn lookup(&self, jid: &Jid) -> Option<RegisteredChat> {
        self.chats.read().unwrap().get(jid.as_str()).cloned()
    }

    fn ensure_registered(&self, jid: &Jid, display_name: &str) -> Option<RegisteredChat> {
        if let Some(existing) = self.lookup(jid) {
            return Some(existing);
        }
        let folder = jid.as_str().replace(':', "-");
        let chat = RegisteredChat::new(jid.clone(), display_name, folder);
        self.chats
            .write()
            .unwrap()
            .insert(jid.as_str().to_string(), chat.clone());
        debug!(%jid, folder = %chat.folder, "auto-registered chat");

        let store = self.chat_store.clone();
        let persisted = chat.clone();
        tokio::spawn(async move {
            if let Err(e) = store.append_put(persisted.jid.as_str(), &persisted).await {
                warn!(jid = %persisted.jid, error = %e, "failed to persist chat registration");
            }
        });
        Some(chat)
    }

    fn check_trigger(&self, chat: &RegisteredChat, text: &str) -> bool {
        let Some(pattern) = &chat.trigger_pattern else {
            return true;
        };
        regex::Regex::new(pattern).map(|re| re.is_match(text)).unwrap_or(false)
    }
}

impl GroupResolver for Registry {
    fn folder_exists(&self, folder: &str) -> bool {
        self.chats.read().unwrap().values().any(|c| c.folder == folder)
    }
}

impl SessionResolver for Registry {
    fn session_id_for(&self, folder: &str) -> Option<String> {
        self.sessions.read().unwrap().get(folder).and_then(|s| s.session_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn registry(dir: &std::path::Path) -> Registry {
        Registry::load(dir.to_path_buf(), HashSet::new(), HashSet::new()).await.unwrap()
    }

    #[tokio::test]
    async fn unregistered_non_open_jid_is_disallowed() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path()).await;
        assert!(!registry.is_allowed(&Jid::new("discord", "1")));
    }

    #[tokio::test]
    async fn open_channel_is_always_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::load(
            dir.path().to_path_buf(),
            HashSet::from(["web".to_string()]),
            HashSet::new(),
        )
        .await
        .unwrap();
        assert!(registry.is_allowed(&Jid::new("web", "main")));
    }

    #[tokio::test]
    async fn ensure_registered_is_idempotent_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::load(
            dir.path().to_path_buf(),
            HashSet::from(["web".to_string()]),
            HashSet::new(),
        )
        .await
        .unwrap();

        let jid = Jid::new("web", "main");
        let first = registry.ensure_registered(&jid, "Dashboard").unwrap();
        let second = registry.ensure_registered(&jid, "Dashboard").unwrap();
        assert_eq!(first.folder, second.folder);
        assert!(registry.folder_exists(&first.folder));
    }

    #[tokio::test]
    async fn record_session_id_is_readable_via_resolver() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path()).await;
        registry.record_session_id("owner-dm", "sess-1".into()).await;
        assert_eq!(registry.session_id_for("owner-dm"), Some("sess-1".to_string()));
    }

    #[tokio::test]
    async fn check_trigger_passes_without_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path()).await;
        let chat = RegisteredChat::new(Jid::new("web", "main"), "Dashboard", "main");
        assert!(registry.check_trigger(&chat, "anything"));
    }

    #[tokio::test]
    async fn check_trigger_matches_configured_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path()).await;
        let mut chat = RegisteredChat::new(Jid::new("discord", "g1"), "Group", "group-1");
        chat.requires_trigger = true;
        chat.trigger_pattern = Some(r"(?i)^hey bot".to_string());
        assert!(registry.check_trigger(&chat, "hey bot, what's up"));
        assert!(!registry.check_trigger(&chat, "unrelated message"));
    }
}
