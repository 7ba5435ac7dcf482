//! Plugin manifest types.
//!
//! Defines [`PluginManifest`] and [`PluginCapability`] -- the schema for
//! plugin metadata parsed from `plugin.json`.

use serde::{Deserialize, Serialize};

use crate::error::PluginError;

/// Which runtime a plugin is built to run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginTarget {
    /// Loaded by the host process only.
    Host,
    /// Loaded inside the agent (container) process only.
    Container,
    /// Loaded in both runtimes.
    Both,
}

/// A named permission a plugin may declare in its manifest.
///
/// Presence or absence decides whether a given service operation is
/// callable from that plugin; see [`crate::context::PluginContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginCapability {
    /// Read files through the IPC service.
    IpcRead,
    /// Write files through the IPC service.
    IpcWrite,
    /// Read the plugin's own data directory.
    FsRead,
    /// Write the plugin's own data directory.
    FsWrite,
    /// Make outbound network requests.
    Network,
    /// Execute shell commands.
    Shell,
    /// Read conversation messages.
    MessagesRead,
    /// Send conversation messages.
    MessagesWrite,
    /// Create, pause, resume, or cancel scheduled tasks.
    TasksManage,
    /// Register or modify chat groups.
    GroupsManage,
}

/// Plugin manifest parsed from `plugin.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique plugin identifier, kebab-case (`^[a-z0-9-]+$`).
    pub name: String,

    /// Semantic version string (must be valid semver).
    pub version: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Which runtime this plugin targets.
    pub target: PluginTarget,

    /// Capabilities this plugin requires.
    #[serde(default)]
    pub capabilities: Vec<PluginCapability>,

    /// Names of other plugins this plugin must load after.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Entry file, relative to the plugin's own directory.
    #[serde(default = "default_main_entry")]
    pub main_entry: String,

    /// Plugin-declared configuration, handed back to the plugin verbatim
    /// as part of its [`crate::context::PluginContext`]. Not validated by
    /// the registry; the plugin's own `onLoad` is responsible for
    /// interpreting its shape.
    #[serde(default)]
    pub config: serde_json::Value,
}

fn default_main_entry() -> String {
    "index.ts".to_string()
}

impl PluginManifest {
    /// Validate the manifest against the schema in the data model.
    ///
    /// Returns an error describing the first validation failure.
    pub fn validate(&self) -> Result<(), PluginError> {
        if self.name.is_empty() {
            return Err(PluginError::InvalidManifest(
                "manifest: name is required".into(),
            ));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(PluginError::InvalidManifest(format!(
                "manifest: name '{}' must match ^[a-z0-9-]+$",
                self.name
            )));
        }
        if semver::Version::parse(&self.version).is_err() {
            return Err(PluginError::InvalidManifest(format!(
                "manifest: invalid semver version '{}'",
                self.version
            )));
        }
        Ok(())
    }

    /// Parse and validate a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, PluginError> {
        let manifest: Self = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// `true` if this manifest should be loaded for the given runtime.
    pub fn matches_runtime(&self, runtime: PluginTarget) -> bool {
        self.target == PluginTarget::Both || self.target == runtime
    }

    /// `true` if `capability` is declared in this manifest.
    pub fn has_capability(&self, capability: PluginCapability) -> bool {
        self.capabilities.contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(name: &str) -> PluginManifest {
        PluginManifest {
            name: name.into(),
            version: "1.0.0".into(),
            description: String::new(),
            target: PluginTarget::Host,
            capabilities: vec![],
            dependencies: vec![],
            main_entry: default_main_entry(),
            config: serde_json::Value::Null,
        }
    }

    #[test]
    fn validate_accepts_kebab_case_name() {
        assert!(minimal("weather-lookup").validate().is_ok());
    }

    #[test]
    fn validate_rejects_uppercase_name() {
        let err = minimal("WeatherLookup").validate().unwrap_err();
        assert!(err.to_string().contains("^[a-z0-9-]+$"));
    }

    #[test]
    fn validate_rejects_bad_semver() {
        let mut m = minimal("weather-lookup");
        m.version = "not-a-version".into();
        assert!(m.validate().is_err());
    }

    #[test]
    fn default_main_entry_is_index_ts() {
        let json = r#"{"name":"p","version":"1.0.0","target":"host"}"#;
        let m = PluginManifest::from_json(json).unwrap();
        assert_eq!(m.main_entry, "index.ts");
        assert!(m.capabilities.is_empty());
        assert!(m.dependencies.is_empty());
    }

    #[test]
    fn matches_runtime_both_matches_everything() {
        let mut m = minimal("p");
        m.target = PluginTarget::Both;
        assert!(m.matches_runtime(PluginTarget::Host));
        assert!(m.matches_runtime(PluginTarget::Container));
    }

    #[test]
    fn matches_runtime_host_only() {
        let m = minimal("p");
        assert!(m.matches_runtime(PluginTarget::Host));
        assert!(!m.matches_runtime(PluginTarget::Container));
    }

    #[test]
    fn has_capability_checks_declared_set() {
        let mut m = minimal("p");
        m.capabilities.push(PluginCapability::IpcRead);
        assert!(m.has_capability(PluginCapability::IpcRead));
        assert!(!m.has_capability(PluginCapability::IpcWrite));
    }
}
