//! Resolves the on-disk layout for a chat's agent working directory and
//! IPC inbox, rooted at the configured data directory.

use std::path::PathBuf;

use nanoclaw_queue::ChatPaths;
use nanoclaw_types::Jid;

/// Lays every chat out under `<data_dir>/chats/<channel>/<suffix>/`.
pub struct DataDirChatPaths {
    root: PathBuf,
}

impl DataDirChatPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn chat_dir(&self, jid: &Jid) -> PathBuf {
        self.root
            .join("chats")
            .join(jid.channel_prefix())
            .join(sanitize(jid.suffix()))
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl ChatPaths for DataDirChatPaths {
    fn working_dir(&self, jid: &Jid) -> PathBuf {
        self.chat_dir(jid).join("work")
    }

    fn ipc_root(&self, jid: &Jid) -> PathBuf {
        self.chat_dir(jid).join("ipc")
    }
}
