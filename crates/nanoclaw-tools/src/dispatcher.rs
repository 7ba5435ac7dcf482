//! Dispatches tool calls to the plugin that registered them (C6).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use nanoclaw_plugin::{PluginContext, Tool, ToolContext, ToolResult};

use crate::error::{Result, ToolDispatchError};
use crate::validate::validate_args;

struct Registration {
    tool: Arc<dyn Tool>,
    plugin_context: PluginContext,
}

/// Registers every container-target plugin's declared tools and routes
/// invocations to them, building a fresh [`ToolContext`] per call.
pub struct ToolDispatcher {
    tools: HashMap<String, Registration>,
}

impl ToolDispatcher {
    /// Build a dispatcher from loaded plugins, each paired with the
    /// capability-gated context it was loaded with.
    pub fn from_plugins(plugins: &[(PluginContext, Vec<Arc<dyn Tool>>)]) -> Self {
        let mut tools = HashMap::new();
        for (plugin_context, plugin_tools) in plugins {
            for tool in plugin_tools {
                let name = tool.name().to_string();
                if tools.contains_key(&name) {
                    warn!(tool = %name, plugin = %plugin_context.plugin_name, "duplicate tool name, keeping first registration");
                    continue;
                }
                debug!(tool = %name, plugin = %plugin_context.plugin_name, "registered tool");
                tools.insert(
                    name,
                    Registration {
                        tool: tool.clone(),
                        plugin_context: plugin_context.clone(),
                    },
                );
            }
        }
        Self { tools }
    }

    /// Names of every registered tool, for `list_tools`-style introspection.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// The JSON schema of a registered tool's arguments.
    pub fn schema_for(&self, tool_name: &str) -> Option<Value> {
        self.tools.get(tool_name).map(|r| r.tool.parameters_schema())
    }

    /// Validate and invoke `tool_name` with `args`, scoped to the
    /// invoking chat's `(jid, folder, is_main)` and `cancel` token.
    pub async fn dispatch(
        &self,
        tool_name: &str,
        args: Value,
        jid: impl Into<String>,
        folder: impl Into<String>,
        is_main: bool,
        cancel: CancellationToken,
    ) -> Result<ToolResult> {
        let registration = self
            .tools
            .get(tool_name)
            .ok_or_else(|| ToolDispatchError::UnknownTool(tool_name.to_string()))?;

        let schema = registration.tool.parameters_schema();
        if let Err(reason) = validate_args(&schema, &args) {
            return Err(ToolDispatchError::ValidationFailed {
                tool: tool_name.to_string(),
                reason,
            });
        }

        let ctx = ToolContext {
            plugin: registration.plugin_context.clone(),
            jid: jid.into(),
            folder: folder.into(),
            is_main,
            cancel,
        };

        registration
            .tool
            .execute(args, &ctx)
            .await
            .map_err(ToolDispatchError::Plugin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nanoclaw_plugin::{DeniedTasksService, LiveIpcService, PluginError, DeniedMessagesService};
    use nanoclaw_plugin::PluginCapability;
    use serde_json::json;
    use std::path::PathBuf;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes text"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "required": ["text"]})
        }
        async fn execute(&self, args: Value, ctx: &ToolContext) -> std::result::Result<ToolResult, PluginError> {
            let text = args.get("text").and_then(|v| v.as_str()).unwrap_or_default();
            Ok(ToolResult::text(format!("{text} (jid={})", ctx.jid)))
        }
    }

    fn sample_context() -> PluginContext {
        let manifest = nanoclaw_plugin::PluginManifest {
            name: "demo".into(),
            version: "1.0.0".into(),
            description: String::new(),
            target: nanoclaw_plugin::PluginTarget::Container,
            capabilities: vec![],
            dependencies: vec![],
            main_entry: "index.ts".into(),
            config: serde_json::Value::Null,
        };
        PluginContext {
            plugin_name: "demo".into(),
            logger: nanoclaw_plugin::PluginLogger::new("demo"),
            event_bus: Arc::new(nanoclaw_plugin::NoopEventBus),
            config: manifest.config.clone(),
            ipc: Arc::new(LiveIpcService::new(PathBuf::from("/tmp"), &manifest)),
            messages: Arc::new(DeniedMessagesService::new(PluginCapability::MessagesRead)),
            tasks: Arc::new(DeniedTasksService),
        }
    }

    #[tokio::test]
    async fn dispatch_invokes_matching_tool() {
        let dispatcher = ToolDispatcher::from_plugins(&[(
            sample_context(),
            vec![Arc::new(EchoTool) as Arc<dyn Tool>],
        )]);

        let result = dispatcher
            .dispatch(
                "echo",
                json!({"text": "hi"}),
                "discord:1",
                "owner-dm",
                true,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.content.len(), 1);
    }

    #[tokio::test]
    async fn dispatch_rejects_unknown_tool() {
        let dispatcher = ToolDispatcher::from_plugins(&[]);
        let err = dispatcher
            .dispatch(
                "missing",
                json!({}),
                "discord:1",
                "owner-dm",
                true,
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolDispatchError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn dispatch_rejects_missing_required_argument() {
        let dispatcher = ToolDispatcher::from_plugins(&[(
            sample_context(),
            vec![Arc::new(EchoTool) as Arc<dyn Tool>],
        )]);
        let err = dispatcher
            .dispatch(
                "echo",
                json!({}),
                "discord:1",
                "owner-dm",
                true,
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolDispatchError::ValidationFailed { .. }));
    }

    #[test]
    fn tool_names_are_sorted() {
        let dispatcher = ToolDispatcher::from_plugins(&[(
            sample_context(),
            vec![Arc::new(EchoTool) as Arc<dyn Tool>],
        )]);
        assert_eq!(dispatcher.tool_names(), vec!["echo".to_string()]);
    }
}
