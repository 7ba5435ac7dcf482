//! Plugin discovery, dependency ordering, loading, and unloading (C2).
//!
//! Discovery walks a list of directories looking for `plugin.json`
//! files. Because this is a statically compiled target rather than a
//! dynamic-import runtime, each plugin additionally registers a
//! constructor function under its manifest name (see
//! [`PluginRegistry::register_factory`]); "loading" resolves the
//! manifest to that constructor rather than importing a module.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::context::{NoopEventBus, PluginContext, PluginEventBus};
use crate::error::PluginError;
use crate::manifest::{PluginManifest, PluginTarget};
use crate::traits::Plugin;

const LOAD_TIMEOUT: Duration = Duration::from_secs(30);
const UNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

type PluginFactory = Box<dyn Fn() -> Arc<dyn Plugin> + Send + Sync>;

/// Discovers, orders, loads, and unloads plugins, and answers queries
/// against the currently loaded set.
pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
    loaded: Vec<(PluginManifest, Arc<dyn Plugin>)>,
    event_bus: Arc<dyn PluginEventBus>,
}

impl PluginRegistry {
    /// An empty registry with no registered factories or loaded plugins,
    /// and a bus that drops every event.
    pub fn new() -> Self {
        Self::with_event_bus(Arc::new(NoopEventBus))
    }

    /// An empty registry that emits `plugin:loaded`/`plugin:unloaded` on `bus`.
    pub fn with_event_bus(bus: Arc<dyn PluginEventBus>) -> Self {
        Self {
            factories: HashMap::new(),
            loaded: Vec::new(),
            event_bus: bus,
        }
    }

    /// Replace the bus this registry publishes `plugin:loaded`/
    /// `plugin:unloaded` events to.
    pub fn set_event_bus(&mut self, bus: Arc<dyn PluginEventBus>) {
        self.event_bus = bus;
    }

    /// Register a constructor for the plugin named in its manifest.
    ///
    /// This is the Rust-native stand-in for dynamic module import: a
    /// pre-linked registry of statically compiled plugin constructors,
    /// keyed by the same `name` used in `plugin.json`.
    pub fn register_factory<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Scan `dirs` for subdirectories containing a `plugin.json`,
    /// returning the manifests that parse, validate, and target
    /// `runtime`. Invalid manifests and runtime mismatches are skipped
    /// with a warning, not an error.
    pub async fn discover(dirs: &[PathBuf], runtime: PluginTarget) -> Vec<PluginManifest> {
        let mut manifests = Vec::new();
        for dir in dirs {
            let mut read_dir = match tokio::fs::read_dir(dir).await {
                Ok(rd) => rd,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "failed to scan plugin directory");
                    continue;
                }
            };

            while let Ok(Some(entry)) = read_dir.next_entry().await {
                let candidate_dir = entry.path();
                if !candidate_dir.is_dir() {
                    continue;
                }
                let manifest_path = candidate_dir.join("plugin.json");
                let Ok(content) = tokio::fs::read_to_string(&manifest_path).await else {
                    continue;
                };

                match PluginManifest::from_json(&content) {
                    Ok(manifest) if manifest.matches_runtime(runtime) => {
                        manifests.push(manifest);
                    }
                    Ok(_) => { /* wrong runtime target, silently skipped */ }
                    Err(e) => {
                        warn!(
                            path = %manifest_path.display(),
                            error = %e,
                            "skipping invalid plugin manifest"
                        );
                    }
                }
            }
        }
        manifests
    }

    /// Topologically sort `manifests` by their `dependencies` lists via
    /// DFS. Unknown dependencies (not present in `manifests`) are
    /// treated as already satisfied. A back-edge during the DFS means a
    /// cycle; the error names one node on the cycle and the whole batch
    /// is rejected.
    pub fn topological_order(
        manifests: Vec<PluginManifest>,
    ) -> Result<Vec<PluginManifest>, PluginError> {
        let by_name: HashMap<String, PluginManifest> =
            manifests.into_iter().map(|m| (m.name.clone(), m)).collect();

        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        let mut marks: HashMap<String, Mark> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        fn visit(
            name: &str,
            by_name: &HashMap<String, PluginManifest>,
            marks: &mut HashMap<String, Mark>,
            order: &mut Vec<String>,
        ) -> Result<(), PluginError> {
            match marks.get(name) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => return Err(PluginError::DependencyCycle(name.to_string())),
                None => {}
            }
            marks.insert(name.to_string(), Mark::Visiting);
            if let Some(manifest) = by_name.get(name) {
                for dep in &manifest.dependencies {
                    if by_name.contains_key(dep) {
                        visit(dep, by_name, marks, order)?;
                    }
                    // Unknown (external) dependencies are treated as absent.
                }
            }
            marks.insert(name.to_string(), Mark::Done);
            order.push(name.to_string());
            Ok(())
        }

        let names: Vec<String> = by_name.keys().cloned().collect();
        for name in names {
            visit(&name, &by_name, &mut marks, &mut order)?;
        }

        Ok(order
            .into_iter()
            .filter_map(|name| by_name.get(&name).cloned())
            .collect())
    }

    /// Load plugins in dependency order.
    ///
    /// `build_context` constructs a capability-gated [`PluginContext`]
    /// for each manifest just before `on_load` is invoked. A duplicate
    /// name is rejected with a warning and the later copy is skipped,
    /// not an error for the batch.
    pub async fn load_all<B>(
        &mut self,
        dirs: &[PathBuf],
        runtime: PluginTarget,
        build_context: B,
    ) -> Result<Vec<String>, PluginError>
    where
        B: Fn(&PluginManifest) -> PluginContext,
    {
        let discovered = Self::discover(dirs, runtime).await;
        let ordered = Self::topological_order(discovered)?;

        let mut newly_loaded = Vec::new();
        let already_loaded: HashSet<String> =
            self.loaded.iter().map(|(m, _)| m.name.clone()).collect();

        for manifest in ordered {
            if already_loaded.contains(&manifest.name)
                || newly_loaded.contains(&manifest.name)
            {
                warn!(plugin = %manifest.name, "duplicate plugin name, skipping later copy");
                continue;
            }

            let Some(factory) = self.factories.get(&manifest.name) else {
                warn!(plugin = %manifest.name, "no registered factory, skipping");
                continue;
            };
            let plugin = factory();
            let ctx = build_context(&manifest);

            let load_result =
                tokio::time::timeout(LOAD_TIMEOUT, plugin.on_load(ctx)).await;
            match load_result {
                Ok(Ok(())) => {
                    info!(plugin = %manifest.name, "plugin loaded");
                    self.event_bus
                        .emit(nanoclaw_types::Event::PluginLoaded {
                            name: manifest.name.clone(),
                        })
                        .await;
                    newly_loaded.push(manifest.name.clone());
                    self.loaded.push((manifest, plugin));
                }
                Ok(Err(e)) => {
                    warn!(plugin = %manifest.name, error = %e, "plugin on_load failed, skipping");
                }
                Err(_) => {
                    warn!(plugin = %manifest.name, "plugin on_load exceeded 30s timeout, skipping");
                }
            }
        }

        Ok(newly_loaded)
    }

    /// Unload every loaded plugin in reverse load order.
    ///
    /// Each `on_unload` is given a 10s soft timeout; a timeout or error
    /// is logged but does not stop unloading the remaining plugins.
    pub async fn unload_all(&mut self) {
        while let Some((manifest, plugin)) = self.loaded.pop() {
            match tokio::time::timeout(UNLOAD_TIMEOUT, plugin.on_unload()).await {
                Ok(Ok(())) => info!(plugin = %manifest.name, "plugin unloaded"),
                Ok(Err(e)) => warn!(plugin = %manifest.name, error = %e, "plugin on_unload failed"),
                Err(_) => warn!(plugin = %manifest.name, "plugin on_unload timed out"),
            }
            self.event_bus
                .emit(nanoclaw_types::Event::PluginUnloaded {
                    name: manifest.name.clone(),
                })
                .await;
        }
    }

    /// Look up a loaded plugin by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.loaded
            .iter()
            .find(|(m, _)| m.name == name)
            .map(|(_, p)| p.clone())
    }

    /// All loaded plugins, in load order.
    pub fn get_all(&self) -> Vec<Arc<dyn Plugin>> {
        self.loaded.iter().map(|(_, p)| p.clone()).collect()
    }

    /// Loaded plugins that declare at least one tool.
    pub fn get_tool_plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.loaded
            .iter()
            .filter(|(_, p)| !p.tools().is_empty())
            .map(|(_, p)| p.clone())
            .collect()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate that a resolved plugin entry path lies inside `plugin_dir`.
///
/// Used when a plugin's `main_entry` is loaded via an out-of-tree
/// dynamic artifact rather than a statically linked factory.
pub fn validate_entry_path(plugin_dir: &Path, main_entry: &str) -> Result<PathBuf, PluginError> {
    let resolved = plugin_dir.join(main_entry);
    let plugin_dir_abs =
        std::path::absolute(plugin_dir).map_err(PluginError::Io)?;
    let resolved_abs = std::path::absolute(&resolved).map_err(PluginError::Io)?;
    if !resolved_abs.starts_with(&plugin_dir_abs) {
        return Err(PluginError::EntryPathEscape(resolved_abs.display().to_string()));
    }
    Ok(resolved)
}
