//! Core plugin and tool contracts.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::context::PluginContext;
use crate::error::PluginError;

/// The contract every plugin implements.
///
/// `onLoad` receives a capability-gated [`PluginContext`] and is given a
/// 30s hard timeout by the registry; `onUnload` is given a 10s soft
/// timeout whose failure is logged but does not block unloading the
/// rest of the plugin set.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// The plugin's own name, matching its manifest.
    fn name(&self) -> &str;

    /// Called once after the context has been built, before the plugin's
    /// tools are registered. Failing or timing out fails the load.
    async fn on_load(&self, _ctx: PluginContext) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called once during reverse-load-order unloading.
    async fn on_unload(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Tools this plugin exposes to the agent's tool-call transport.
    fn tools(&self) -> Vec<std::sync::Arc<dyn Tool>> {
        Vec::new()
    }
}

/// Per-invocation context for a tool call: the plugin's context extended
/// with the calling chat's identity.
#[derive(Clone)]
pub struct ToolContext {
    /// The plugin's capability-gated services.
    pub plugin: PluginContext,
    /// The chat this invocation is scoped to.
    pub jid: String,
    /// The folder this invocation is scoped to.
    pub folder: String,
    /// Whether the invoking chat is the main folder.
    pub is_main: bool,
    /// Cancellation token for the owning agent turn.
    pub cancel: CancellationToken,
}

/// A single piece of structured tool output.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    /// Plain text content.
    Text {
        /// The text.
        text: String,
    },
}

/// The structured result of a tool invocation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolResult {
    /// Content blocks returned to the agent.
    pub content: Vec<ToolContent>,
    /// Whether this result represents a tool-level error (as opposed to
    /// a transport-level failure, which is a `Result::Err` instead).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    /// Build a successful text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Build an error-flagged text result.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: true,
        }
    }
}

/// A single tool registered with the agent's tool-call transport.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, as registered with the agent.
    fn name(&self) -> &str;

    /// Human-readable description shown to the agent.
    fn description(&self) -> &str;

    /// JSON schema describing the tool's arguments.
    fn parameters_schema(&self) -> Value;

    /// Validate and execute the tool, returning its structured result.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, PluginError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_text_is_not_error() {
        let result = ToolResult::text("done");
        assert!(!result.is_error);
        assert_eq!(result.content.len(), 1);
    }

    #[test]
    fn tool_result_error_flag_set() {
        let result = ToolResult::error("failed");
        assert!(result.is_error);
    }

    #[test]
    fn tool_result_serializes_without_is_error_when_false() {
        let json = serde_json::to_string(&ToolResult::text("ok")).unwrap();
        assert!(!json.contains("is_error"));
    }
}
