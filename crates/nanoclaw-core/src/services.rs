//! Live plugin-context services wired to the router and the scheduler.
//!
//! These are the "live" counterparts to `nanoclaw_plugin`'s `Denied*`
//! stubs, constructed by the host and handed to [`PluginRegistry::load_all`]
//! for plugins that declared the matching capability.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;

use nanoclaw_plugin::{MessagesService, PluginError, TasksService};
use nanoclaw_platform::FileSystem;
use nanoclaw_queue::OutboundSink;
use nanoclaw_scheduler::SchedulerEngine;
use nanoclaw_types::{ContextMode, Jid, ScheduleKind, ScheduleValue};

/// Sends through whatever owns outbound delivery for a jid (the channel
/// router). Conversation content is never persisted, so `read` always
/// comes back empty -- there is nothing on disk to read.
pub struct CoreMessagesService {
    outbound: Arc<dyn OutboundSink>,
}

impl CoreMessagesService {
    pub fn new(outbound: Arc<dyn OutboundSink>) -> Self {
        Self { outbound }
    }
}

#[async_trait]
impl MessagesService for CoreMessagesService {
    async fn read(&self, _jid: &str, _limit: usize) -> Result<Vec<String>, PluginError> {
        Ok(Vec::new())
    }

    async fn send(&self, jid: &str, text: &str) -> Result<(), PluginError> {
        let jid = Jid::parse(jid).map_err(|e| PluginError::Other(e.to_string()))?;
        self.outbound.deliver(&jid, text).await;
        Ok(())
    }
}

/// Schedules and cancels tasks against the main folder. A plugin tool
/// calling `tasks.create` has no per-chat `ToolContext` threaded into it
/// (the service is built once per plugin, not per invocation), so a
/// task created this way lands on the main jid -- the folder where
/// cross-chat administrative tools are meant to run.
pub struct CoreTasksService<F: FileSystem> {
    scheduler: Arc<SchedulerEngine<F>>,
    main_jid: Jid,
    main_folder: String,
}

impl<F: FileSystem + 'static> CoreTasksService<F> {
    pub fn new(scheduler: Arc<SchedulerEngine<F>>, main_jid: Jid, main_folder: String) -> Self {
        Self {
            scheduler,
            main_jid,
            main_folder,
        }
    }

    /// A leading digit that isn't part of a recognizable timestamp is
    /// treated as a cron expression; anything that parses as RFC3339 is
    /// a one-off `at` run.
    fn parse_schedule(schedule: &str) -> (ScheduleKind, ScheduleValue) {
        match DateTime::parse_from_rfc3339(schedule) {
            Ok(at) => (ScheduleKind::Once, ScheduleValue::At(at.with_timezone(&chrono::Utc))),
            Err(_) => (ScheduleKind::Cron, ScheduleValue::Cron(schedule.to_string())),
        }
    }
}

#[async_trait]
impl<F: FileSystem + 'static> TasksService for CoreTasksService<F> {
    async fn create(&self, prompt: &str, schedule: &str) -> Result<String, PluginError> {
        let (kind, value) = Self::parse_schedule(schedule);
        self.scheduler
            .add_task(
                self.main_folder.clone(),
                self.main_jid.clone(),
                prompt.to_string(),
                kind,
                value,
                ContextMode::Isolated,
                3,
            )
            .await
            .map_err(|e| PluginError::Other(e.to_string()))
    }

    async fn cancel(&self, task_id: &str) -> Result<(), PluginError> {
        self.scheduler
            .cancel_task(task_id)
            .await
            .map_err(|e| PluginError::Other(e.to_string()))
    }
}
