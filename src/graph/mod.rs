//! State graphs, their units and the transitions between them.
//!
//! A [`StateGraph`] owns its [`StateUnit`]s and selects at most one of them.
//! Units own their outgoing [`Transition`]s; the graph owns the "any-state"
//! transitions that apply whichever unit is selected.

#[allow(clippy::module_inception)]
mod graph;
mod timers;
mod transition;
mod unit;

pub use graph::StateGraph;
pub use transition::{Predicate, Resolver, Selector, Transition, TransitionKind};
pub use unit::StateUnit;
