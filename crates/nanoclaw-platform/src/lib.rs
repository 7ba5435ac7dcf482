//! Filesystem and process abstractions shared across nanoclaw crates.
//!
//! Unlike the broader clawft framework this is drawn from, nanoclaw targets
//! a single native host process, so there is no browser/WASM counterpart
//! here -- just the traits and their [`tokio`]-backed native implementation.

pub mod fs;
pub mod process;

pub use fs::{FileSystem, NativeFileSystem};
pub use process::{NativeProcessSpawner, ProcessOutput, ProcessSpawner};
