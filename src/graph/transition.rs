//! Transition variants and their evaluation.

use crate::core::UnitId;
use crate::events::{EventFilter, Signal};
use std::fmt;
use std::rc::Rc;

/// Predicate over the selected unit's elapsed time.
pub type Predicate = Rc<dyn Fn(f32) -> bool>;

/// Picks a target (or none) from the selected unit's elapsed time.
pub type Resolver = Rc<dyn Fn(f32) -> Option<UnitId>>;

/// Picks an index into a fixed target list (or none).
pub type Selector = Rc<dyn Fn(f32) -> Option<usize>>;

/// How a transition decides whether and where to go.
#[derive(Clone)]
pub enum TransitionKind {
    /// Always fires.
    Direct { target: UnitId },
    /// Fires when the predicate holds.
    Basic { target: UnitId, predicate: Predicate },
    /// Fires when the resolver returns a target.
    ConditionalSingle { resolver: Resolver },
    /// Fires when the selector returns an index inside `targets`.
    ConditionalIndexed {
        targets: Vec<UnitId>,
        selector: Selector,
    },
    /// Fires when a matching event is delivered (and the optional predicate holds).
    ByEvent {
        topic: String,
        filter: Option<EventFilter>,
        predicate: Option<Predicate>,
        target: UnitId,
    },
    /// Fires when the signal is raised (and the optional predicate holds).
    BySignal {
        signal: Signal,
        predicate: Option<Predicate>,
        target: UnitId,
    },
}

/// A decision unit owned by a state unit or by a graph's any-state set.
///
/// Polled kinds are evaluated during the per-tick scan; event and signal
/// kinds are checked at delivery time and never fire from the scan.
/// Build one with [`TransitionBuilder`](crate::builder::TransitionBuilder).
#[derive(Clone)]
pub struct Transition {
    kind: TransitionKind,
}

impl Transition {
    pub(crate) fn new(kind: TransitionKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> &TransitionKind {
        &self.kind
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            TransitionKind::Direct { .. } => "Direct",
            TransitionKind::Basic { .. } => "Basic",
            TransitionKind::ConditionalSingle { .. } => "ConditionalSingle",
            TransitionKind::ConditionalIndexed { .. } => "ConditionalIndexed",
            TransitionKind::ByEvent { .. } => "ByEvent",
            TransitionKind::BySignal { .. } => "BySignal",
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.kind, TransitionKind::Direct { .. })
    }

    /// Whether the per-tick scan evaluates this transition.
    pub fn is_polled(&self) -> bool {
        !matches!(
            self.kind,
            TransitionKind::ByEvent { .. } | TransitionKind::BySignal { .. }
        )
    }

    /// Targets known at registration time. Resolver-based transitions have none.
    pub fn declared_targets(&self) -> Vec<UnitId> {
        match &self.kind {
            TransitionKind::Direct { target }
            | TransitionKind::Basic { target, .. }
            | TransitionKind::ByEvent { target, .. }
            | TransitionKind::BySignal { target, .. } => vec![*target],
            TransitionKind::ConditionalIndexed { targets, .. } => targets.clone(),
            TransitionKind::ConditionalSingle { .. } => Vec::new(),
        }
    }

    /// Per-tick evaluation: `Some(target)` when the transition fires.
    ///
    /// Event and signal kinds always report `None` here.
    pub fn evaluate(&self, elapsed: f32) -> Option<UnitId> {
        match &self.kind {
            TransitionKind::Direct { target } => Some(*target),
            TransitionKind::Basic { target, predicate } => predicate(elapsed).then_some(*target),
            TransitionKind::ConditionalSingle { resolver } => resolver(elapsed),
            TransitionKind::ConditionalIndexed { targets, selector } => {
                selector(elapsed).and_then(|i| targets.get(i).copied())
            }
            TransitionKind::ByEvent { .. } | TransitionKind::BySignal { .. } => None,
        }
    }

    /// Delivery-time evaluation for event and signal kinds.
    pub(crate) fn evaluate_trigger(&self, elapsed: f32) -> Option<UnitId> {
        match &self.kind {
            TransitionKind::ByEvent {
                predicate, target, ..
            }
            | TransitionKind::BySignal {
                predicate, target, ..
            } => predicate.as_ref().map_or(true, |p| p(elapsed)).then_some(*target),
            _ => None,
        }
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("kind", &self.kind_name())
            .field("targets", &self.declared_targets())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GraphId;

    fn ids(n: usize) -> Vec<UnitId> {
        let graph = GraphId::next();
        (0..n).map(|i| UnitId::new(graph, i)).collect()
    }

    #[test]
    fn direct_always_fires() {
        let ids = ids(1);
        let t = Transition::new(TransitionKind::Direct { target: ids[0] });
        assert_eq!(t.evaluate(0.0), Some(ids[0]));
        assert!(t.is_direct());
        assert!(t.is_polled());
    }

    #[test]
    fn basic_follows_predicate() {
        let ids = ids(1);
        let t = Transition::new(TransitionKind::Basic {
            target: ids[0],
            predicate: Rc::new(|elapsed| elapsed >= 0.5),
        });
        assert_eq!(t.evaluate(0.25), None);
        assert_eq!(t.evaluate(0.5), Some(ids[0]));
    }

    #[test]
    fn indexed_out_of_range_does_not_fire() {
        let ids = ids(2);
        let t = Transition::new(TransitionKind::ConditionalIndexed {
            targets: ids.clone(),
            selector: Rc::new(|elapsed| Some(elapsed as usize)),
        });
        assert_eq!(t.evaluate(1.0), Some(ids[1]));
        assert_eq!(t.evaluate(2.0), None);
        assert_eq!(t.declared_targets(), ids);
    }

    #[test]
    fn conditional_single_may_decline() {
        let ids = ids(1);
        let target = ids[0];
        let t = Transition::new(TransitionKind::ConditionalSingle {
            resolver: Rc::new(move |elapsed| (elapsed > 1.0).then_some(target)),
        });
        assert_eq!(t.evaluate(0.5), None);
        assert_eq!(t.evaluate(1.5), Some(target));
        assert!(t.declared_targets().is_empty());
    }

    #[test]
    fn triggered_kinds_are_not_polled() {
        let ids = ids(1);
        let t = Transition::new(TransitionKind::ByEvent {
            topic: "door".to_string(),
            filter: None,
            predicate: Some(Rc::new(|elapsed| elapsed > 1.0)),
            target: ids[0],
        });
        assert!(!t.is_polled());
        assert_eq!(t.evaluate(5.0), None);
        assert_eq!(t.evaluate_trigger(0.5), None);
        assert_eq!(t.evaluate_trigger(1.5), Some(ids[0]));
    }
}
