//! Shared vocabulary of the runtime.
//!
//! This module contains the small value types every other module speaks:
//! - Graph and unit identifiers
//! - The context handed to lifecycle hooks and timers
//! - The bounded transition history kept by each graph for diagnostics

mod context;
mod history;
mod ids;

pub use context::{StateContext, TickPhase};
pub use history::{TransitionCause, TransitionHistory, TransitionRecord};
pub use ids::{GraphId, UnitId};
