//! Command-line entry point: brings up the host process, or drives a
//! one-shot inspection/maintenance command against the same on-disk
//! state the host uses.

mod commands;
mod paths;
mod sink;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "nanoclaw", version, about = "Multi-channel assistant orchestrator")]
struct Cli {
    /// Path to the TOML config file. Defaults to the usual discovery order.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the host: load plugins, register channels, run until interrupted.
    Run,
    /// Print a summary of the configured data directory's current state.
    Status,
    /// Channel-related inspection commands.
    Channels {
        #[command(subcommand)]
        command: ChannelsCommand,
    },
    /// Scheduled-task inspection and control commands.
    Tasks {
        #[command(subcommand)]
        command: TasksCommand,
    },
    /// Plugin inspection commands.
    Plugins {
        #[command(subcommand)]
        command: PluginsCommand,
    },
    /// Configuration inspection commands.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ChannelsCommand {
    /// List every registered chat.
    List,
}

#[derive(Subcommand)]
enum TasksCommand {
    /// List every scheduled task.
    List,
    /// Pause a task so the due-scan loop skips it.
    Pause { task_id: String },
    /// Resume a paused task.
    Resume { task_id: String },
    /// Cancel a task permanently.
    Cancel { task_id: String },
    /// Run a task immediately, outside its normal schedule.
    RunNow { task_id: String },
}

#[derive(Subcommand)]
enum PluginsCommand {
    /// List discoverable plugin manifests.
    List,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the resolved configuration.
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => commands::run(cli.config).await,
        Commands::Status => commands::status(cli.config).await,
        Commands::Channels { command } => match command {
            ChannelsCommand::List => commands::channels_list(cli.config).await,
        },
        Commands::Tasks { command } => match command {
            TasksCommand::List => commands::tasks_list(cli.config).await,
            TasksCommand::Pause { task_id } => commands::tasks_pause(cli.config, task_id).await,
            TasksCommand::Resume { task_id } => commands::tasks_resume(cli.config, task_id).await,
            TasksCommand::Cancel { task_id } => commands::tasks_cancel(cli.config, task_id).await,
            TasksCommand::RunNow { task_id } => commands::tasks_run_now(cli.config, task_id).await,
        },
        Commands::Plugins { command } => match command {
            PluginsCommand::List => commands::plugins_list(cli.config).await,
        },
        Commands::Config { command } => match command {
            ConfigCommand::Show => commands::config_show(cli.config).await,
        },
    }
}
