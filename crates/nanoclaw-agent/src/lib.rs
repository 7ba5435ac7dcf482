//! Spawns, feeds, and streams output from one long-running agent
//! subprocess per chat (C4).

pub mod config;
pub mod error;
pub mod output;
pub mod runner;

pub use config::AgentConfig;
pub use error::AgentError;
pub use output::{AgentOutput, FrameScanner, FRAME_END, FRAME_START};
pub use runner::{AgentRunner, RunningAgent, DEFAULT_KILL_GRACE};
