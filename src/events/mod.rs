//! Event channels and signals.
//!
//! - [`EventBus`]: the subscribe/publish capability the runtime consumes
//! - [`EventChannel`]: synchronous in-process bus used as the scoped channel
//!   of every machine and graph
//! - [`Signal`]: an observer list raised by code outside the machine
//!
//! Units subscribe permanently; whether a delivered event has any effect is
//! decided at delivery time by checking that the unit is the selected unit of
//! an active graph.

mod channel;
mod signal;

pub use channel::{Event, EventBus, EventCallback, EventChannel, EventFilter, SubscriptionId};
pub use signal::{ListenerId, Signal};
