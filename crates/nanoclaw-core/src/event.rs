//! The fixed set of events the bus carries, each with a statically
//! associated payload. The types themselves live in `nanoclaw-types` so
//! that the plugin crate can reference them without depending on this
//! crate; re-exported here since this is where the bus that carries them
//! lives.

pub use nanoclaw_types::{Event, EventKind};
