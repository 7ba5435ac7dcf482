//! Process configuration: a single TOML file, discovered by walking
//! upward from the current directory before falling back to the home
//! directory, overridable by `NANOCLAW_CONFIG` or an explicit CLI flag.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CoreError, Result};

fn default_data_dir() -> String {
    "~/.nanoclaw/data".to_string()
}

fn default_plugin_dirs() -> Vec<String> {
    vec!["~/.nanoclaw/plugins".to_string()]
}

fn default_main_folder() -> String {
    "main".to_string()
}

fn default_task_poll_seconds() -> u64 {
    30
}

/// Top-level process configuration, deserialized from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct NanoclawConfig {
    /// Directory holding the registered-chat/session JSONL stores and
    /// the scheduler's task store and run log.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Directories scanned for `plugin.json` manifests.
    #[serde(default = "default_plugin_dirs")]
    pub plugin_dirs: Vec<String>,

    /// The jid treated as the main folder (cross-chat admin tools).
    pub main_jid: String,

    /// The folder name for `main_jid`.
    #[serde(default = "default_main_folder")]
    pub main_folder: String,

    /// How often the scheduler's due-scan loop runs.
    #[serde(default = "default_task_poll_seconds")]
    pub task_poll_seconds: u64,

    /// Command used to spawn an agent subprocess.
    pub agent_command: String,

    /// Arguments passed to every agent invocation.
    #[serde(default)]
    pub agent_args: Vec<String>,
}

impl NanoclawConfig {
    /// Resolve `~/`-prefixed paths against the home directory.
    pub fn expand(raw: &str) -> PathBuf {
        if let Some(rest) = raw.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(raw)
    }

    pub fn data_dir(&self) -> PathBuf {
        Self::expand(&self.data_dir)
    }

    pub fn plugin_dirs(&self) -> Vec<PathBuf> {
        self.plugin_dirs.iter().map(|d| Self::expand(d)).collect()
    }
}

/// Discover the config path: an explicit override, then `NANOCLAW_CONFIG`,
/// then `./nanoclaw.toml` walking up to the filesystem root, then
/// `~/.nanoclaw/config.toml`.
pub fn discover_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(explicit) = explicit {
        return Some(PathBuf::from(explicit));
    }
    if let Ok(from_env) = std::env::var("NANOCLAW_CONFIG") {
        return Some(PathBuf::from(from_env));
    }
    if let Ok(mut dir) = std::env::current_dir() {
        loop {
            let candidate = dir.join("nanoclaw.toml");
            if candidate.exists() {
                return Some(candidate);
            }
            if !dir.pop() {
                break;
            }
        }
    }
    dirs::home_dir().map(|home| home.join(".nanoclaw").join("config.toml"))
}

/// Load and parse the config file at `path`.
pub async fn load(path: &Path) -> Result<NanoclawConfig> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CoreError::Configuration(format!("reading {}: {e}", path.display())))?;
    toml::from_str(&contents)
        .map_err(|e| CoreError::Configuration(format!("parsing {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_minimal_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nanoclaw.toml");
        tokio::fs::write(
            &path,
            r#"
            main_jid = "web:main"
            agent_command = "nanoclaw-agent"
            "#,
        )
        .await
        .unwrap();

        let config = load(&path).await.unwrap();
        assert_eq!(config.main_jid, "web:main");
        assert_eq!(config.main_folder, "main");
        assert_eq!(config.task_poll_seconds, 30);
        assert!(config.agent_args.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_a_configuration_error() {
        let err = load(Path::new("/nonexistent/nanoclaw.toml")).await.unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }
}
