//! Builder for constructing transitions.

use crate::builder::error::BuildError;
use crate::core::UnitId;
use crate::events::{EventFilter, Signal};
use crate::graph::{Predicate, Resolver, Selector, Transition, TransitionKind};
use serde_json::Value;
use std::rc::Rc;

/// Builder for constructing transitions with a fluent API.
///
/// The variant is inferred from what was configured:
///
/// | configured | variant |
/// |---|---|
/// | `.to` | Direct |
/// | `.to` + `.when` | Basic |
/// | `.resolve` | ConditionalSingle |
/// | `.select` | ConditionalIndexed |
/// | `.on_event` + `.to` | ByEvent |
/// | `.on_signal` + `.to` | BySignal |
#[derive(Default)]
pub struct TransitionBuilder {
    target: Option<UnitId>,
    predicate: Option<Predicate>,
    resolver: Option<Resolver>,
    selection: Option<(Vec<UnitId>, Selector)>,
    topic: Option<String>,
    filter: Option<EventFilter>,
    signal: Option<Signal>,
}

impl TransitionBuilder {
    /// Create a new transition builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a fixed target.
    pub fn to(mut self, target: impl Into<UnitId>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Only fire while `predicate(elapsed)` holds.
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(f32) -> bool + 'static,
    {
        self.predicate = Some(Rc::new(predicate));
        self
    }

    /// Compute the target on every evaluation; `None` means "did not fire".
    pub fn resolve<F>(mut self, resolver: F) -> Self
    where
        F: Fn(f32) -> Option<UnitId> + 'static,
    {
        self.resolver = Some(Rc::new(resolver));
        self
    }

    /// Pick one of `targets` by index; `None` or an out-of-range index means "did not fire".
    pub fn select<I, T, F>(mut self, targets: I, selector: F) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<UnitId>,
        F: Fn(f32) -> Option<usize> + 'static,
    {
        let targets = targets.into_iter().map(Into::into).collect();
        self.selection = Some((targets, Rc::new(selector)));
        self
    }

    /// Fire when an event with this topic is delivered.
    pub fn on_event(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Restrict an event transition to payloads where `payload[key] == value`.
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some(EventFilter::new(key, value));
        self
    }

    /// Fire when `signal` is raised.
    pub fn on_signal(mut self, signal: &Signal) -> Self {
        self.signal = Some(signal.clone());
        self
    }

    /// Build the transition.
    pub fn build(self) -> Result<Transition, BuildError> {
        let sources = [
            self.target.is_some(),
            self.resolver.is_some(),
            self.selection.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();

        match sources {
            0 => return Err(BuildError::MissingTarget),
            1 => {}
            _ => return Err(BuildError::ConflictingTargets),
        }

        if self.topic.is_some() && self.signal.is_some() {
            return Err(BuildError::ConflictingTriggers);
        }
        if self.filter.is_some() && self.topic.is_none() {
            return Err(BuildError::FilterWithoutEvent);
        }

        let kind = if let Some(topic) = self.topic {
            if topic.is_empty() {
                return Err(BuildError::EmptyTopic);
            }
            let target = self.target.ok_or(BuildError::TriggerNeedsFixedTarget)?;
            TransitionKind::ByEvent {
                topic,
                filter: self.filter,
                predicate: self.predicate,
                target,
            }
        } else if let Some(signal) = self.signal {
            let target = self.target.ok_or(BuildError::TriggerNeedsFixedTarget)?;
            TransitionKind::BySignal {
                signal,
                predicate: self.predicate,
                target,
            }
        } else if let Some(resolver) = self.resolver {
            let resolver = match self.predicate {
                Some(predicate) => Rc::new(move |elapsed: f32| {
                    if predicate(elapsed) {
                        resolver(elapsed)
                    } else {
                        None
                    }
                }) as Resolver,
                None => resolver,
            };
            TransitionKind::ConditionalSingle { resolver }
        } else if let Some((targets, selector)) = self.selection {
            if targets.is_empty() {
                return Err(BuildError::EmptyTargetList);
            }
            let selector = match self.predicate {
                Some(predicate) => Rc::new(move |elapsed: f32| {
                    if predicate(elapsed) {
                        selector(elapsed)
                    } else {
                        None
                    }
                }) as Selector,
                None => selector,
            };
            TransitionKind::ConditionalIndexed { targets, selector }
        } else {
            let target = self.target.ok_or(BuildError::MissingTarget)?;
            match self.predicate {
                Some(predicate) => TransitionKind::Basic { target, predicate },
                None => TransitionKind::Direct { target },
            }
        };

        Ok(Transition::new(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GraphId;

    fn unit(i: usize) -> UnitId {
        UnitId::new(GraphId::next(), i)
    }

    #[test]
    fn builder_requires_a_target() {
        let result = TransitionBuilder::new().when(|_| true).build();
        assert!(matches!(result, Err(BuildError::MissingTarget)));
    }

    #[test]
    fn builder_rejects_two_target_sources() {
        let result = TransitionBuilder::new()
            .to(unit(0))
            .resolve(|_| None)
            .build();
        assert!(matches!(result, Err(BuildError::ConflictingTargets)));
    }

    #[test]
    fn bare_target_builds_direct() {
        let t = TransitionBuilder::new().to(unit(0)).build().unwrap();
        assert!(t.is_direct());
    }

    #[test]
    fn target_with_predicate_builds_basic() {
        let t = TransitionBuilder::new()
            .to(unit(0))
            .when(|elapsed| elapsed > 1.0)
            .build()
            .unwrap();
        assert_eq!(t.kind_name(), "Basic");
        assert_eq!(t.evaluate(0.5), None);
    }

    #[test]
    fn empty_selection_is_rejected() {
        let result = TransitionBuilder::new()
            .select(Vec::<UnitId>::new(), |_| Some(0))
            .build();
        assert!(matches!(result, Err(BuildError::EmptyTargetList)));
    }

    #[test]
    fn predicate_gates_selection() {
        let targets = vec![unit(0), unit(1)];
        let t = TransitionBuilder::new()
            .select(targets.clone(), |_| Some(1))
            .when(|elapsed| elapsed >= 2.0)
            .build()
            .unwrap();
        assert_eq!(t.evaluate(1.0), None);
        assert_eq!(t.evaluate(2.0), Some(targets[1]));
    }

    #[test]
    fn event_transition_needs_fixed_target() {
        let result = TransitionBuilder::new()
            .on_event("door")
            .resolve(|_| None)
            .build();
        assert!(matches!(result, Err(BuildError::TriggerNeedsFixedTarget)));
    }

    #[test]
    fn event_topic_must_not_be_empty() {
        let result = TransitionBuilder::new().on_event("").to(unit(0)).build();
        assert!(matches!(result, Err(BuildError::EmptyTopic)));
    }

    #[test]
    fn filter_requires_event() {
        let result = TransitionBuilder::new()
            .to(unit(0))
            .filter("side", "left")
            .build();
        assert!(matches!(result, Err(BuildError::FilterWithoutEvent)));
    }

    #[test]
    fn event_and_signal_conflict() {
        let result = TransitionBuilder::new()
            .on_event("door")
            .on_signal(&Signal::new())
            .to(unit(0))
            .build();
        assert!(matches!(result, Err(BuildError::ConflictingTriggers)));
    }

    #[test]
    fn signal_transition_builds() {
        let t = TransitionBuilder::new()
            .on_signal(&Signal::new())
            .to(unit(0))
            .build()
            .unwrap();
        assert_eq!(t.kind_name(), "BySignal");
        assert!(!t.is_polled());
    }
}
