//! Plugin contract, manifest schema, capability-gated contexts, and the
//! dependency-ordered plugin registry (C2).

pub mod context;
pub mod error;
pub mod manifest;
pub mod registry;
pub mod traits;

pub use context::{
    DeniedMessagesService, DeniedTasksService, IpcService, LiveIpcService, MessagesService,
    NoopEventBus, PluginContext, PluginEventBus, PluginEventHandler, PluginEventResult,
    PluginLogger, TasksService,
};
pub use error::PluginError;
pub use manifest::{PluginCapability, PluginManifest, PluginTarget};
pub use registry::PluginRegistry;
pub use traits::{Plugin, Tool, ToolContext, ToolResult};
