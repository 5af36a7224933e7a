//! A single state: lifecycle hooks, timers, outgoing transitions and an
//! optional nested graph.

use super::graph::{GraphCore, StateGraph};
use super::timers::{Hook, Timers};
use super::transition::{Transition, TransitionKind};
use crate::builder::{BuildError, TransitionBuilder};
use crate::core::{StateContext, TickPhase, TransitionCause, UnitId};
use crate::error::{FsmError, FsmResult};
use crate::events::{Event, EventBus, EventFilter, SubscriptionId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Whether a unit's update changed the graph's selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UnitOutcome {
    Stayed,
    Transitioned,
}

#[derive(Default)]
struct Hooks {
    enter: Option<Hook>,
    pre_update: Option<Hook>,
    update: Option<Hook>,
    fixed_update: Option<Hook>,
    late_update: Option<Hook>,
    exit: Option<Hook>,
}

pub(crate) struct UnitCore {
    id: UnitId,
    name: String,
    graph: Weak<GraphCore>,
    hooks: RefCell<Hooks>,
    transitions: RefCell<Vec<Rc<Transition>>>,
    timers: RefCell<Timers>,
    elapsed: Cell<f32>,
    sub_graph: RefCell<Option<StateGraph>>,
}

/// Handle to one state of a [`StateGraph`].
///
/// Units are created by [`StateGraph::add_unit`] and live as long as their
/// graph. Handles are cheap to clone and only keep a weak link back to the
/// graph, so holding one never keeps a graph alive.
///
/// # Example
///
/// ```rust
/// use framestate::builder::after;
/// use framestate::host::Machine;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let machine = Machine::new("enemy");
/// let graph = machine.create_graph("ai").unwrap();
/// let idle = graph.add_unit("Idle").unwrap();
/// let alert = graph.add_unit("Alert").unwrap();
///
/// let entered = Rc::new(Cell::new(0));
/// let counter = Rc::clone(&entered);
/// alert.on_enter(move |_| counter.set(counter.get() + 1));
/// idle.add_transition(after(&alert, 0.5)).unwrap();
///
/// machine.start().unwrap();
/// machine.update(0.5).unwrap();
/// assert_eq!(graph.current(), Some(alert.id()));
/// assert_eq!(entered.get(), 1);
/// ```
#[derive(Clone)]
pub struct StateUnit {
    core: Rc<UnitCore>,
}

impl StateUnit {
    pub(crate) fn new(id: UnitId, name: String, graph: Weak<GraphCore>) -> Self {
        Self {
            core: Rc::new(UnitCore {
                id,
                name,
                graph,
                hooks: RefCell::new(Hooks::default()),
                transitions: RefCell::new(Vec::new()),
                timers: RefCell::new(Timers::default()),
                elapsed: Cell::new(0.0),
                sub_graph: RefCell::new(None),
            }),
        }
    }

    pub fn id(&self) -> UnitId {
        self.core.id
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Time accumulated since the unit was last entered.
    pub fn elapsed(&self) -> f32 {
        self.core.elapsed.get()
    }

    /// The owning graph, while it is still alive.
    pub fn graph(&self) -> Option<StateGraph> {
        self.core.graph.upgrade().map(StateGraph::from_core)
    }

    pub(crate) fn graph_core(&self) -> Option<Rc<GraphCore>> {
        self.core.graph.upgrade()
    }

    /// Whether this unit is the selected unit of an active graph.
    ///
    /// This is the gate every event, signal and subscription callback of the
    /// unit passes through at delivery time.
    pub fn is_selected(&self) -> bool {
        self.graph_core()
            .is_some_and(|g| g.is_active() && g.current() == Some(self.core.id))
    }

    pub fn ptr_eq(&self, other: &StateUnit) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    pub(crate) fn downgrade(&self) -> Weak<UnitCore> {
        Rc::downgrade(&self.core)
    }

    pub(crate) fn upgrade(weak: &Weak<UnitCore>) -> Option<StateUnit> {
        weak.upgrade().map(|core| StateUnit { core })
    }

    fn context(&self, delta: f32) -> StateContext {
        StateContext {
            unit: self.core.id,
            elapsed: self.core.elapsed.get(),
            delta,
        }
    }

    fn hook(&self, pick: impl Fn(&Hooks) -> Option<Hook>) -> Option<Hook> {
        pick(&self.core.hooks.borrow())
    }

    // ---- configuration ------------------------------------------------------

    pub fn on_enter<F>(&self, hook: F) -> &Self
    where
        F: Fn(&StateContext) + 'static,
    {
        self.core.hooks.borrow_mut().enter = Some(Rc::new(hook));
        self
    }

    /// Runs every `Update` tick after elapsed time accrues, before timers and transitions.
    pub fn on_pre_update<F>(&self, hook: F) -> &Self
    where
        F: Fn(&StateContext) + 'static,
    {
        self.core.hooks.borrow_mut().pre_update = Some(Rc::new(hook));
        self
    }

    /// Runs every `Update` tick in which no transition left the unit.
    pub fn on_update<F>(&self, hook: F) -> &Self
    where
        F: Fn(&StateContext) + 'static,
    {
        self.core.hooks.borrow_mut().update = Some(Rc::new(hook));
        self
    }

    pub fn on_fixed_update<F>(&self, hook: F) -> &Self
    where
        F: Fn(&StateContext) + 'static,
    {
        self.core.hooks.borrow_mut().fixed_update = Some(Rc::new(hook));
        self
    }

    pub fn on_late_update<F>(&self, hook: F) -> &Self
    where
        F: Fn(&StateContext) + 'static,
    {
        self.core.hooks.borrow_mut().late_update = Some(Rc::new(hook));
        self
    }

    pub fn on_exit<F>(&self, hook: F) -> &Self
    where
        F: Fn(&StateContext) + 'static,
    {
        self.core.hooks.borrow_mut().exit = Some(Rc::new(hook));
        self
    }

    /// Fire `callback` once per entry, as soon as elapsed time reaches `at`.
    pub fn schedule<F>(&self, at: f32, callback: F) -> &Self
    where
        F: Fn(&StateContext) + 'static,
    {
        self.core.timers.borrow_mut().schedule(at, Rc::new(callback));
        self
    }

    /// Fire `callback` every `interval` of elapsed time, catching up after stalls.
    ///
    /// A non-positive interval is rejected with a warning and never armed.
    pub fn every<F>(&self, interval: f32, callback: F) -> &Self
    where
        F: Fn(&StateContext) + 'static,
    {
        let running = self.is_selected().then(|| self.elapsed());
        let armed = self
            .core
            .timers
            .borrow_mut()
            .every(interval, Rc::new(callback), running);
        if !armed {
            log::warn!(
                "unit '{}': periodic interval {} is not positive; callback ignored",
                self.core.name,
                interval
            );
        }
        self
    }

    pub fn scheduled_count(&self) -> usize {
        self.core.timers.borrow().scheduled_len()
    }

    pub fn periodic_count(&self) -> usize {
        self.core.timers.borrow().periodic_len()
    }

    pub fn transition_count(&self) -> usize {
        self.core.transitions.borrow().len()
    }

    pub(crate) fn transitions(&self) -> Vec<Rc<Transition>> {
        self.core.transitions.borrow().clone()
    }

    /// Register an outgoing transition. Insertion order is priority order.
    ///
    /// Event transitions listen on the graph's scoped channel; signal
    /// transitions connect to their signal while the graph runs.
    pub fn add_transition(&self, builder: TransitionBuilder) -> FsmResult<()> {
        let graph = self.live_graph()?;
        let transition = Rc::new(builder.build()?);
        graph.check_targets(&transition)?;

        match transition.kind() {
            TransitionKind::ByEvent { topic, filter, .. } => {
                let callback = self.trigger_callback(&transition, TransitionCause::Event);
                graph
                    .channel()
                    .subscribe(topic, filter.clone(), Rc::new(move |_: &Event| callback()));
            }
            TransitionKind::BySignal { signal, .. } => {
                let callback = self.trigger_callback(&transition, TransitionCause::Signal);
                graph.add_signal_binding(signal.clone(), callback);
            }
            _ => {}
        }

        self.core.transitions.borrow_mut().push(transition);
        Ok(())
    }

    /// Register an event transition that listens on an external bus instead
    /// of the graph's scoped channel. The subscription is released when the
    /// graph is disposed.
    pub fn add_transition_on(
        &self,
        bus: Rc<dyn EventBus>,
        builder: TransitionBuilder,
    ) -> FsmResult<SubscriptionId> {
        let graph = self.live_graph()?;
        let transition = Rc::new(builder.build()?);
        graph.check_targets(&transition)?;

        let TransitionKind::ByEvent { topic, filter, .. } = transition.kind() else {
            return Err(BuildError::ExpectedEventTransition.into());
        };
        let callback = self.trigger_callback(&transition, TransitionCause::Event);
        let id = bus.subscribe(topic, filter.clone(), Rc::new(move |_: &Event| callback()));
        graph.track_external(bus, id);

        self.core.transitions.borrow_mut().push(transition);
        Ok(id)
    }

    /// Listen for `topic` on the graph's scoped channel.
    ///
    /// The subscription lasts as long as the unit; `callback` only runs while
    /// the unit is selected in an active graph.
    pub fn on_event<F>(
        &self,
        topic: &str,
        filter: Option<EventFilter>,
        callback: F,
    ) -> FsmResult<SubscriptionId>
    where
        F: Fn(&Event) + 'static,
    {
        let graph = self.live_graph()?;
        Ok(graph
            .channel()
            .subscribe(topic, filter, self.gated(callback)))
    }

    /// Listen for `topic` on an injected bus, with the same selection gate as
    /// [`on_event`](Self::on_event).
    pub fn subscribe<F>(
        &self,
        bus: Rc<dyn EventBus>,
        topic: &str,
        filter: Option<EventFilter>,
        callback: F,
    ) -> FsmResult<SubscriptionId>
    where
        F: Fn(&Event) + 'static,
    {
        let graph = self.live_graph()?;
        let id = bus.subscribe(topic, filter, self.gated(callback));
        graph.track_external(bus, id);
        Ok(id)
    }

    fn gated<F>(&self, callback: F) -> Rc<dyn Fn(&Event)>
    where
        F: Fn(&Event) + 'static,
    {
        let unit = self.downgrade();
        Rc::new(move |event: &Event| {
            if StateUnit::upgrade(&unit).is_some_and(|u| u.is_selected()) {
                callback(event);
            }
        })
    }

    fn trigger_callback(&self, transition: &Rc<Transition>, cause: TransitionCause) -> Rc<dyn Fn()> {
        let unit = self.downgrade();
        let transition = Rc::clone(transition);
        Rc::new(move || {
            if let Some(unit) = StateUnit::upgrade(&unit) {
                unit.fire_triggered(&transition, cause);
            }
        })
    }

    fn fire_triggered(&self, transition: &Transition, cause: TransitionCause) {
        if !self.is_selected() {
            return;
        }
        let Some(graph) = self.graph_core() else {
            return;
        };
        let _scope = graph.begin_resolution();
        if let Some(target) = transition.evaluate_trigger(self.elapsed()) {
            graph.change_state(target, cause);
        }
    }

    fn live_graph(&self) -> FsmResult<Rc<GraphCore>> {
        let graph = self
            .graph_core()
            .ok_or_else(|| FsmError::Disposed(self.core.name.clone()))?;
        graph.ensure_live()?;
        Ok(graph)
    }

    /// Create the graph nested in this unit.
    ///
    /// The sub-graph is entered whenever this unit starts, updated while it
    /// stays selected and exited when it stops. Its power node hangs under
    /// the owning graph's, so it never runs while the owner is unpowered.
    pub fn create_sub_graph(&self, name: impl Into<String>) -> FsmResult<StateGraph> {
        let graph = self.live_graph()?;
        if self.core.sub_graph.borrow().is_some() {
            return Err(FsmError::SubGraphExists(self.core.name.clone()));
        }

        let sub = StateGraph::nested(name.into(), graph.config().clone());
        graph.power().attach_child(&sub.power())?;
        *self.core.sub_graph.borrow_mut() = Some(sub.clone());
        Ok(sub)
    }

    pub fn sub_graph(&self) -> Option<StateGraph> {
        self.core.sub_graph.borrow().clone()
    }

    // ---- lifecycle ----------------------------------------------------------

    /// Enter the unit. Called by the owning graph right after selecting it.
    pub(crate) fn start(&self, graph: &Rc<GraphCore>) {
        let epoch = graph.epoch();
        self.core.elapsed.set(0.0);

        if let Some(enter) = self.hook(|h| h.enter.clone()) {
            enter(&self.context(0.0));
            if graph.epoch() != epoch {
                return;
            }
        }

        if let Some(sub) = self.sub_graph() {
            if let Err(e) = sub.enter() {
                log::warn!("unit '{}': sub-graph not entered: {}", self.core.name, e);
            }
            if graph.epoch() != epoch {
                return;
            }
        }

        self.core.timers.borrow_mut().rearm();
        self.poll(graph, epoch, 0.0);
    }

    /// Leave the unit. Called by the owning graph before it changes selection.
    pub(crate) fn stop(&self) {
        if let Some(sub) = self.sub_graph() {
            if !sub.is_disposed() {
                sub.core().shutdown();
            }
        }
        if let Some(exit) = self.hook(|h| h.exit.clone()) {
            exit(&self.context(0.0));
        }
    }

    /// One `Update` tick for the selected unit.
    pub(crate) fn update(&self, graph: &Rc<GraphCore>, delta: f32) -> UnitOutcome {
        let epoch = graph.epoch();
        self.core.elapsed.set(self.core.elapsed.get() + delta);

        if let Some(pre) = self.hook(|h| h.pre_update.clone()) {
            pre(&self.context(delta));
            if graph.epoch() != epoch {
                return UnitOutcome::Transitioned;
            }
        }

        if self.poll(graph, epoch, delta) == UnitOutcome::Transitioned {
            return UnitOutcome::Transitioned;
        }

        if let Some(update) = self.hook(|h| h.update.clone()) {
            update(&self.context(delta));
            if graph.epoch() != epoch {
                return UnitOutcome::Transitioned;
            }
        }

        if let Some(sub) = self.sub_graph() {
            if let Err(e) = sub.update(delta) {
                log::debug!("unit '{}': sub-graph skipped: {}", self.core.name, e);
            }
            if graph.epoch() != epoch {
                return UnitOutcome::Transitioned;
            }
        }

        UnitOutcome::Stayed
    }

    /// `FixedUpdate` / `LateUpdate` for the selected unit.
    pub(crate) fn tick_phase(&self, phase: TickPhase, delta: f32) {
        let hook = match phase {
            TickPhase::Update => None,
            TickPhase::FixedUpdate => self.hook(|h| h.fixed_update.clone()),
            TickPhase::LateUpdate => self.hook(|h| h.late_update.clone()),
        };
        if let Some(hook) = hook {
            hook(&self.context(delta));
        }
        if !self.is_selected() {
            return;
        }
        if let Some(sub) = self.sub_graph() {
            if let Err(e) = sub.tick(phase, delta) {
                log::debug!("unit '{}': sub-graph skipped: {}", self.core.name, e);
            }
        }
    }

    // Scheduled one-shots, periodic callbacks, then local transitions.
    fn poll(&self, graph: &Rc<GraphCore>, epoch: u64, delta: f32) -> UnitOutcome {
        let scheduled = self.core.timers.borrow().scheduled_len();
        for i in 0..scheduled {
            let due = self
                .core
                .timers
                .borrow_mut()
                .take_due_scheduled(i, self.elapsed());
            if let Some(callback) = due {
                callback(&self.context(delta));
                if graph.epoch() != epoch {
                    return UnitOutcome::Transitioned;
                }
            }
        }

        let periodic = self.core.timers.borrow().periodic_len();
        for i in 0..periodic {
            loop {
                let due = self
                    .core
                    .timers
                    .borrow_mut()
                    .take_due_periodic(i, self.elapsed());
                let Some(callback) = due else {
                    break;
                };
                callback(&self.context(delta));
                if graph.epoch() != epoch {
                    return UnitOutcome::Transitioned;
                }
            }
        }

        let count = self.core.transitions.borrow().len();
        for i in 0..count {
            let transition = self.core.transitions.borrow().get(i).cloned();
            let Some(transition) = transition else {
                break;
            };
            if !transition.is_polled() {
                continue;
            }
            let fired = transition.evaluate(self.elapsed());
            if graph.epoch() != epoch {
                return UnitOutcome::Transitioned;
            }
            let Some(target) = fired else {
                continue;
            };
            if !graph.contains(target) {
                log::warn!(
                    "unit '{}': {} transition resolved to unknown unit {}; ignored",
                    self.core.name,
                    transition.kind_name(),
                    target
                );
                continue;
            }
            graph.change_state(target, TransitionCause::Local);
            return UnitOutcome::Transitioned;
        }

        UnitOutcome::Stayed
    }
}

impl From<&StateUnit> for UnitId {
    fn from(unit: &StateUnit) -> Self {
        unit.id()
    }
}

impl From<StateUnit> for UnitId {
    fn from(unit: StateUnit) -> Self {
        unit.id()
    }
}

impl fmt::Debug for StateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateUnit")
            .field("id", &self.core.id)
            .field("name", &self.core.name)
            .field("elapsed", &self.core.elapsed.get())
            .field("transitions", &self.transition_count())
            .field("has_sub_graph", &self.core.sub_graph.borrow().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::go_to;
    use crate::events::{EventBus, EventChannel};
    use crate::power::PowerNode;
    use serde_json::json;

    fn powered_graph() -> (StateGraph, PowerNode) {
        let graph = StateGraph::new("g");
        let source = PowerNode::source("test");
        source.set_switched_on(true);
        source.attach_child(&graph.power()).unwrap();
        (graph, source)
    }

    #[test]
    fn hooks_receive_elapsed_and_delta() {
        let (graph, _power) = powered_graph();
        let unit = graph.add_unit("A").unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        unit.on_update(move |ctx| sink.borrow_mut().push((ctx.elapsed, ctx.delta)));

        graph.enter().unwrap();
        graph.update(0.5).unwrap();
        graph.update(0.25).unwrap();
        assert_eq!(*seen.borrow(), vec![(0.5, 0.5), (0.75, 0.25)]);
    }

    #[test]
    fn zero_delay_schedule_fires_on_entry() {
        let (graph, _power) = powered_graph();
        let unit = graph.add_unit("A").unwrap();
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        unit.schedule(0.0, move |_| flag.set(true));

        graph.enter().unwrap();
        assert!(fired.get());
        assert_eq!(unit.scheduled_count(), 1);
    }

    #[test]
    fn rejected_interval_is_not_armed() {
        let (graph, _power) = powered_graph();
        let unit = graph.add_unit("A").unwrap();
        unit.every(-0.5, |_| {});
        assert_eq!(unit.periodic_count(), 0);
    }

    #[test]
    fn on_event_is_gated_by_selection() {
        let (graph, _power) = powered_graph();
        let a = graph.add_unit("A").unwrap();
        let b = graph.add_unit("B").unwrap();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        b.on_event("ping", None, move |_| counter.set(counter.get() + 1))
            .unwrap();
        a.add_transition(TransitionBuilder::new().on_event("advance").to(&b))
            .unwrap();

        graph.enter().unwrap();
        graph.raise("ping", &json!({})).unwrap();
        assert_eq!(hits.get(), 0);

        graph.raise("advance", &json!({})).unwrap();
        graph.raise("ping", &json!({})).unwrap();
        assert_eq!(hits.get(), 1);
        assert!(b.is_selected());
        assert!(!a.is_selected());
    }

    #[test]
    fn external_subscription_is_released_with_the_graph() {
        let (graph, _power) = powered_graph();
        let unit = graph.add_unit("A").unwrap();
        let world = Rc::new(EventChannel::new("world"));
        let bus: Rc<dyn EventBus> = world.clone();
        unit.subscribe(bus, "tick", None, |_| {}).unwrap();
        assert_eq!(world.subscriber_count(), 1);

        graph.dispose().unwrap();
        assert_eq!(world.subscriber_count(), 0);
    }

    #[test]
    fn transitions_are_tried_in_insertion_order() {
        let (graph, _power) = powered_graph();
        let a = graph.add_unit("A").unwrap();
        let b = graph.add_unit("B").unwrap();
        let c = graph.add_unit("C").unwrap();
        a.add_transition(go_to(&c)).unwrap();
        a.add_transition(go_to(&b)).unwrap();

        graph.enter().unwrap();
        assert_eq!(graph.current(), Some(c.id()));
        assert_eq!(a.transition_count(), 2);
    }

    #[test]
    fn one_sub_graph_per_unit() {
        let (graph, _power) = powered_graph();
        let unit = graph.add_unit("A").unwrap();
        let sub = unit.create_sub_graph("inner").unwrap();

        assert!(sub.is_nested());
        assert!(sub.power().parent().is_some_and(|p| p.ptr_eq(&graph.power())));
        assert!(unit.sub_graph().is_some_and(|s| s.ptr_eq(&sub)));
        assert_eq!(
            unit.create_sub_graph("second").unwrap_err(),
            FsmError::SubGraphExists("A".to_string())
        );
    }

    #[test]
    fn handles_outlive_their_graph_safely() {
        let graph = StateGraph::new("g");
        let unit = graph.add_unit("A").unwrap();
        drop(graph);

        assert!(unit.graph().is_none());
        assert!(!unit.is_selected());
        assert!(matches!(
            unit.add_transition(go_to(&unit)),
            Err(FsmError::Disposed(_))
        ));
    }
}
