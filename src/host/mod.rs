//! Hosting graphs and driving them from a frame loop.
//!
//! A [`Machine`] owns a power source, a scoped event channel and the graphs
//! attached to it. It implements [`TickDriver`], the per-frame contract a host
//! loop calls into.

mod driver;
mod machine;

pub use driver::TickDriver;
pub use machine::{Machine, WeakMachine};
