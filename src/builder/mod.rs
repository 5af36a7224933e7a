//! Builder API for ergonomic transition construction.
//!
//! Transitions are configured with a fluent [`TransitionBuilder`] and
//! validated when built, so a transition without a usable target is rejected
//! before it can ever be registered.

pub mod error;
pub mod transition;

pub use error::BuildError;
pub use transition::TransitionBuilder;

use crate::core::UnitId;

/// Start a transition that always fires towards `target`.
///
/// # Example
///
/// ```
/// use framestate::builder::go_to;
/// use framestate::host::Machine;
///
/// let machine = Machine::new("door");
/// let graph = machine.create_graph("door").unwrap();
/// let closed = graph.add_unit("Closed").unwrap();
/// let open = graph.add_unit("Open").unwrap();
///
/// closed.add_transition(go_to(&open).when(|elapsed| elapsed >= 2.0)).unwrap();
/// ```
pub fn go_to(target: impl Into<UnitId>) -> TransitionBuilder {
    TransitionBuilder::new().to(target)
}

/// Start a transition that fires towards `target` once `predicate` holds.
pub fn go_to_when<F>(target: impl Into<UnitId>, predicate: F) -> TransitionBuilder
where
    F: Fn(f32) -> bool + 'static,
{
    TransitionBuilder::new().to(target).when(predicate)
}

/// Start a transition that fires towards `target` after `seconds` in the state.
pub fn after(target: impl Into<UnitId>, seconds: f32) -> TransitionBuilder {
    go_to_when(target, move |elapsed| elapsed >= seconds)
}
