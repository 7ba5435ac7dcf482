//! The channel router: normalizes inbound events from heterogeneous
//! platform adapters, applies the registration/allow-list policy, and
//! dispatches outbound messages back to the owning channel instance.

pub mod error;
pub mod router;
pub mod traits;

pub use error::{ChannelError, RouterError};
pub use router::ChannelRouter;
pub use traits::{Channel, MessageEvents, NoopMessageEvents, RegistrationPolicy, RouterHost};
