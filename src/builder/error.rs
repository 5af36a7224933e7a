//! Errors raised while building transitions.

use thiserror::Error;

/// Errors that can occur when building a transition.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BuildError {
    #[error("Transition target not specified. Call .to(unit), .resolve(..) or .select(..)")]
    MissingTarget,

    #[error("Transition has more than one target source; use only one of .to, .resolve, .select")]
    ConflictingTargets,

    #[error("Indexed transition needs at least one target")]
    EmptyTargetList,

    #[error("Event transition topic must not be empty")]
    EmptyTopic,

    #[error("Transition cannot be driven by both an event and a signal")]
    ConflictingTriggers,

    #[error("Event and signal transitions need a fixed target set with .to(unit)")]
    TriggerNeedsFixedTarget,

    #[error("Event filter given without .on_event(topic)")]
    FilterWithoutEvent,

    #[error("Only event transitions can listen on an external bus")]
    ExpectedEventTransition,
}
