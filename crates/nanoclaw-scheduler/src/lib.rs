//! Persistent store, due-scan loop, and failure-recovery policy for
//! scheduled tasks (C7).

pub mod diagnosis;
pub mod engine;
pub mod error;
pub mod next_run;
pub mod retry;
pub mod store;

pub use diagnosis::{diagnose, Diagnosis};
pub use engine::{
    GroupResolver, NoopTaskEvents, SchedulerConfig, SchedulerEngine, SessionResolver, TaskEvents,
    DEFAULT_POLL_INTERVAL,
};
pub use error::SchedulerError;
pub use next_run::compute_next_run;
pub use retry::backoff_for;
pub use store::TaskStore;
