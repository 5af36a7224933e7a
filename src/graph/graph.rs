//! A set of units with one selection and the per-tick resolution loop.

use super::transition::{Transition, TransitionKind};
use super::unit::{StateUnit, UnitOutcome};
use crate::builder::TransitionBuilder;
use crate::config::RuntimeConfig;
use crate::core::{
    GraphId, TickPhase, TransitionCause, TransitionHistory, TransitionRecord, UnitId,
};
use crate::error::{FsmError, FsmResult};
use crate::events::{Event, EventBus, EventChannel, ListenerId, Signal, SubscriptionId};
use crate::power::PowerNode;
use chrono::Utc;
use serde_json::Value;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

struct SignalBinding {
    signal: Signal,
    listener: Rc<dyn Fn()>,
    connected: Option<ListenerId>,
}

pub(crate) struct GraphCore {
    id: GraphId,
    name: String,
    config: RuntimeConfig,
    power: PowerNode,
    channel: Rc<EventChannel>,
    units: RefCell<Vec<StateUnit>>,
    initial: Cell<Option<UnitId>>,
    current: Cell<Option<UnitId>>,
    any_state: RefCell<Vec<Rc<Transition>>>,
    entered: Cell<bool>,
    disposed: Cell<bool>,
    detached: Cell<bool>,
    nested: bool,
    // Bumped on every selection change; lets callers notice reentrant switches.
    epoch: Cell<u64>,
    switching: Cell<bool>,
    depth: Cell<u32>,
    changes: Cell<u32>,
    halted: Cell<bool>,
    history: RefCell<TransitionHistory>,
    bindings: RefCell<Vec<SignalBinding>>,
    bound: Cell<bool>,
    external: RefCell<Vec<(Rc<dyn EventBus>, SubscriptionId)>>,
}

/// Keeps the transition budget shared across nested resolution work.
///
/// The outermost scope resets the budget; nested scopes (reentrant event
/// delivery, immediate transitions on entry) draw from the same one.
pub(crate) struct ResolutionScope {
    core: Rc<GraphCore>,
}

impl Drop for ResolutionScope {
    fn drop(&mut self) {
        self.core.depth.set(self.core.depth.get().saturating_sub(1));
    }
}

impl GraphCore {
    pub(crate) fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub(crate) fn power(&self) -> PowerNode {
        self.power.clone()
    }

    pub(crate) fn channel(&self) -> Rc<EventChannel> {
        Rc::clone(&self.channel)
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    pub(crate) fn current(&self) -> Option<UnitId> {
        self.current.get()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.entered.get() && !self.disposed.get() && self.power.is_active()
    }

    pub(crate) fn ensure_live(&self) -> FsmResult<()> {
        if self.disposed.get() {
            return Err(FsmError::Disposed(self.name.clone()));
        }
        Ok(())
    }

    pub(crate) fn contains(&self, id: UnitId) -> bool {
        id.graph() == self.id && id.index() < self.units.borrow().len()
    }

    fn unit(&self, id: UnitId) -> Option<StateUnit> {
        if id.graph() != self.id {
            return None;
        }
        self.units.borrow().get(id.index()).cloned()
    }

    fn current_unit(&self) -> Option<StateUnit> {
        self.current.get().and_then(|id| self.unit(id))
    }

    pub(crate) fn check_targets(&self, transition: &Transition) -> FsmResult<()> {
        for target in transition.declared_targets() {
            if !self.contains(target) {
                return Err(FsmError::ForeignUnit {
                    graph: self.name.clone(),
                    unit: target,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn begin_resolution(self: &Rc<Self>) -> ResolutionScope {
        if self.depth.get() == 0 {
            self.changes.set(0);
            self.halted.set(false);
        }
        self.depth.set(self.depth.get() + 1);
        ResolutionScope {
            core: Rc::clone(self),
        }
    }

    /// Move the selection to `target`, drawing on the per-tick budget.
    ///
    /// Returns `false` when the request was refused: the graph is mid-switch,
    /// or the budget for this tick is spent.
    pub(crate) fn change_state(self: &Rc<Self>, target: UnitId, cause: TransitionCause) -> bool {
        if self.switching.get() {
            log::debug!(
                "graph '{}': dropped {:?} transition requested while switching units",
                self.name,
                cause
            );
            return false;
        }
        if self.halted.get() {
            return false;
        }
        if self.changes.get() >= self.config.max_transitions_per_tick {
            self.halted.set(true);
            log::warn!(
                "graph '{}': exceeded {} state changes in one tick; deferring to the next tick",
                self.name,
                self.config.max_transitions_per_tick
            );
            return false;
        }
        self.changes.set(self.changes.get() + 1);
        self.select(target, cause);
        true
    }

    fn select(self: &Rc<Self>, target: UnitId, cause: TransitionCause) {
        let Some(next) = self.unit(target) else {
            return;
        };

        let previous = self.current_unit();
        if let Some(previous) = &previous {
            self.switching.set(true);
            previous.stop();
            self.switching.set(false);
        }

        self.current.set(Some(target));
        self.epoch.set(self.epoch.get() + 1);

        if self.config.log_transitions {
            log::debug!(
                "graph '{}': {} -> {} ({:?})",
                self.name,
                previous.as_ref().map(|u| u.name()).unwrap_or("<none>"),
                next.name(),
                cause
            );
        }
        if self.config.history_capacity > 0 {
            self.history.borrow_mut().record(TransitionRecord {
                from: previous.as_ref().map(|u| u.name().to_string()),
                to: next.name().to_string(),
                cause,
                elapsed_in_from: previous.as_ref().map(|u| u.elapsed()).unwrap_or(0.0),
                recorded_at: Utc::now(),
            });
        }

        next.start(self);
    }

    // First polled any-state transition that fires. A direct one pointing at
    // the selected unit is passed over; every other kind re-enters it.
    fn poll_any_state(&self, current: UnitId, elapsed: f32) -> Option<UnitId> {
        let count = self.any_state.borrow().len();
        for i in 0..count {
            let transition = self.any_state.borrow().get(i).cloned();
            let Some(transition) = transition else {
                break;
            };
            if !transition.is_polled() {
                continue;
            }
            let Some(target) = transition.evaluate(elapsed) else {
                continue;
            };
            if transition.is_direct() && target == current {
                continue;
            }
            if !self.contains(target) {
                log::warn!(
                    "graph '{}': any-state {} transition resolved to unknown unit {}; ignored",
                    self.name,
                    transition.kind_name(),
                    target
                );
                continue;
            }
            return Some(target);
        }
        None
    }

    fn fire_any_triggered(self: &Rc<Self>, transition: &Transition, cause: TransitionCause) {
        if !self.is_active() {
            return;
        }
        let Some(current) = self.current_unit() else {
            return;
        };
        let _scope = self.begin_resolution();
        if let Some(target) = transition.evaluate_trigger(current.elapsed()) {
            self.change_state(target, cause);
        }
    }

    /// Stop the selected unit and clear the selection.
    pub(crate) fn shutdown(&self) {
        if !self.entered.get() {
            return;
        }
        if let Some(current) = self.current_unit() {
            self.switching.set(true);
            current.stop();
            self.switching.set(false);
        }
        self.current.set(None);
        self.epoch.set(self.epoch.get() + 1);
        self.entered.set(false);
        self.refresh_bindings();
    }

    pub(crate) fn add_signal_binding(&self, signal: Signal, listener: Rc<dyn Fn()>) {
        let connected = self
            .bound
            .get()
            .then(|| signal.connect_rc(Rc::clone(&listener)));
        self.bindings.borrow_mut().push(SignalBinding {
            signal,
            listener,
            connected,
        });
    }

    // Signal listeners are connected only while entered, attached and not disposed.
    fn refresh_bindings(&self) {
        let want = self.entered.get() && !self.detached.get() && !self.disposed.get();
        if want == self.bound.get() {
            return;
        }
        self.bound.set(want);
        for binding in self.bindings.borrow_mut().iter_mut() {
            if want {
                binding.connected = Some(binding.signal.connect_rc(Rc::clone(&binding.listener)));
            } else if let Some(id) = binding.connected.take() {
                binding.signal.disconnect(id);
            }
        }
    }

    pub(crate) fn track_external(&self, bus: Rc<dyn EventBus>, id: SubscriptionId) {
        self.external.borrow_mut().push((bus, id));
    }

    fn sub_graphs(&self) -> Vec<StateGraph> {
        self.units
            .borrow()
            .iter()
            .filter_map(StateUnit::sub_graph)
            .collect()
    }

    pub(crate) fn set_detached(&self, detached: bool) {
        self.detached.set(detached);
        self.refresh_bindings();
        for sub in self.sub_graphs() {
            sub.core.set_detached(detached);
        }
    }
}

/// A graph of [`StateUnit`]s with at most one selected unit.
///
/// A graph processes ticks and events only while it is entered and its power
/// node is active. Machines power the graphs they host; a unit powers the
/// sub-graph it owns.
///
/// Each `Update` tick resolves transitions in a bounded loop: any-state
/// transitions first, then the selected unit's own. A state change restarts
/// the loop against the new unit, until nothing fires or the per-tick budget
/// ([`RuntimeConfig::max_transitions_per_tick`]) is spent.
///
/// # Example
///
/// ```rust
/// use framestate::builder::{after, TransitionBuilder};
/// use framestate::host::Machine;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let machine = Machine::new("hero");
/// let graph = machine.create_graph("locomotion").unwrap();
/// let idle = graph.add_unit("Idle").unwrap();
/// let walk = graph.add_unit("Walk").unwrap();
/// let stunned = graph.add_unit("Stunned").unwrap();
///
/// let hit = Rc::new(Cell::new(false));
/// let flag = Rc::clone(&hit);
/// idle.add_transition(after(&walk, 0.1)).unwrap();
/// graph
///     .add_any_transition(TransitionBuilder::new().to(&stunned).when(move |_| flag.get()))
///     .unwrap();
///
/// machine.start().unwrap();
/// hit.set(true);
/// machine.update(0.1).unwrap();
/// assert_eq!(graph.current(), Some(stunned.id()));
/// ```
#[derive(Clone)]
pub struct StateGraph {
    core: Rc<GraphCore>,
}

impl StateGraph {
    /// A top-level graph. It stays unpowered until a machine hosts it.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, RuntimeConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: RuntimeConfig) -> Self {
        Self::build(name.into(), config, false)
    }

    pub(crate) fn nested(name: String, config: RuntimeConfig) -> Self {
        Self::build(name, config, true)
    }

    fn build(name: String, config: RuntimeConfig, nested: bool) -> Self {
        let config = config.sanitized();
        let history = TransitionHistory::with_capacity(config.history_capacity);
        Self {
            core: Rc::new(GraphCore {
                id: GraphId::next(),
                power: PowerNode::new(name.clone()),
                channel: Rc::new(EventChannel::new(name.clone())),
                name,
                config,
                units: RefCell::new(Vec::new()),
                initial: Cell::new(None),
                current: Cell::new(None),
                any_state: RefCell::new(Vec::new()),
                entered: Cell::new(false),
                disposed: Cell::new(false),
                detached: Cell::new(false),
                nested,
                epoch: Cell::new(0),
                switching: Cell::new(false),
                depth: Cell::new(0),
                changes: Cell::new(0),
                halted: Cell::new(false),
                history: RefCell::new(history),
                bindings: RefCell::new(Vec::new()),
                bound: Cell::new(false),
                external: RefCell::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn from_core(core: Rc<GraphCore>) -> Self {
        Self { core }
    }

    pub(crate) fn core(&self) -> &Rc<GraphCore> {
        &self.core
    }

    pub fn id(&self) -> GraphId {
        self.core.id
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.core.config
    }

    pub fn power(&self) -> PowerNode {
        self.core.power()
    }

    /// The graph's scoped event channel.
    pub fn channel(&self) -> Rc<EventChannel> {
        self.core.channel()
    }

    /// Whether this graph is owned by a unit rather than hosted by a machine.
    pub fn is_nested(&self) -> bool {
        self.core.nested
    }

    pub fn is_entered(&self) -> bool {
        self.core.entered.get()
    }

    /// Entered, not disposed and powered.
    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    pub fn is_disposed(&self) -> bool {
        self.core.disposed.get()
    }

    pub fn ptr_eq(&self, other: &StateGraph) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    // ---- units --------------------------------------------------------------

    /// Create a unit. The first unit created becomes the initial unit.
    pub fn add_unit(&self, name: impl Into<String>) -> FsmResult<StateUnit> {
        self.core.ensure_live()?;
        let name = name.into();
        if self.unit_by_name(&name).is_some() {
            return Err(FsmError::DuplicateUnit {
                graph: self.core.name.clone(),
                name,
            });
        }

        let id = UnitId::new(self.core.id, self.core.units.borrow().len());
        let unit = StateUnit::new(id, name, Rc::downgrade(&self.core));
        self.core.units.borrow_mut().push(unit.clone());
        if self.core.initial.get().is_none() {
            self.core.initial.set(Some(id));
        }
        Ok(unit)
    }

    pub fn set_initial(&self, unit: impl Into<UnitId>) -> FsmResult<()> {
        self.core.ensure_live()?;
        let unit = unit.into();
        if !self.core.contains(unit) {
            return Err(FsmError::ForeignUnit {
                graph: self.core.name.clone(),
                unit,
            });
        }
        self.core.initial.set(Some(unit));
        Ok(())
    }

    pub fn initial(&self) -> Option<UnitId> {
        self.core.initial.get()
    }

    pub fn unit(&self, id: UnitId) -> Option<StateUnit> {
        self.core.unit(id)
    }

    pub fn unit_by_name(&self, name: &str) -> Option<StateUnit> {
        self.core
            .units
            .borrow()
            .iter()
            .find(|u| u.name() == name)
            .cloned()
    }

    pub fn units(&self) -> Vec<StateUnit> {
        self.core.units.borrow().clone()
    }

    pub fn unit_count(&self) -> usize {
        self.core.units.borrow().len()
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.core.contains(id)
    }

    /// The selected unit, if any.
    pub fn current(&self) -> Option<UnitId> {
        self.core.current()
    }

    pub fn current_unit(&self) -> Option<StateUnit> {
        self.core.current_unit()
    }

    pub fn current_name(&self) -> Option<String> {
        self.current_unit().map(|u| u.name().to_string())
    }

    pub fn history(&self) -> Ref<'_, TransitionHistory> {
        self.core.history.borrow()
    }

    pub fn any_transition_count(&self) -> usize {
        self.core.any_state.borrow().len()
    }

    /// Register a transition evaluated against whichever unit is selected.
    ///
    /// Any-state transitions run before the selected unit's own transitions.
    /// A direct one that resolves to the selected unit is skipped; any other
    /// kind that fires towards the selected unit exits and re-enters it.
    pub fn add_any_transition(&self, builder: TransitionBuilder) -> FsmResult<()> {
        self.core.ensure_live()?;
        let transition = Rc::new(builder.build()?);
        self.core.check_targets(&transition)?;

        match transition.kind() {
            TransitionKind::ByEvent { topic, filter, .. } => {
                let callback = self.any_trigger_callback(&transition, TransitionCause::Event);
                self.core
                    .channel
                    .subscribe(topic, filter.clone(), Rc::new(move |_: &Event| callback()));
            }
            TransitionKind::BySignal { signal, .. } => {
                let callback = self.any_trigger_callback(&transition, TransitionCause::Signal);
                self.core.add_signal_binding(signal.clone(), callback);
            }
            _ => {}
        }

        self.core.any_state.borrow_mut().push(transition);
        Ok(())
    }

    fn any_trigger_callback(
        &self,
        transition: &Rc<Transition>,
        cause: TransitionCause,
    ) -> Rc<dyn Fn()> {
        let graph = Rc::downgrade(&self.core);
        let transition = Rc::clone(transition);
        Rc::new(move || {
            if let Some(graph) = graph.upgrade() {
                graph.fire_any_triggered(&transition, cause);
            }
        })
    }

    // ---- lifecycle ----------------------------------------------------------

    /// Select and start the initial unit. A no-op when already entered.
    pub fn enter(&self) -> FsmResult<()> {
        self.core.ensure_live()?;
        if self.core.entered.get() {
            return Ok(());
        }
        let initial = self
            .core
            .initial
            .get()
            .ok_or_else(|| FsmError::NoInitialUnit(self.core.name.clone()))?;

        self.core.entered.set(true);
        self.core.refresh_bindings();
        let _scope = self.core.begin_resolution();
        self.core.select(initial, TransitionCause::Entry);
        Ok(())
    }

    /// Stop the selected unit (running its exit hook) and clear the selection.
    pub fn exit(&self) -> FsmResult<()> {
        self.core.ensure_live()?;
        self.core.shutdown();
        Ok(())
    }

    /// Stop the graph and make it unusable. Every later operation fails with
    /// [`FsmError::Disposed`].
    pub fn dispose(&self) -> FsmResult<()> {
        self.core.ensure_live()?;
        self.core.shutdown();
        for sub in self.core.sub_graphs() {
            if !sub.is_disposed() {
                sub.dispose()?;
            }
        }

        self.core.disposed.set(true);
        self.core.refresh_bindings();
        for (bus, id) in self.core.external.borrow_mut().drain(..) {
            bus.unsubscribe(id);
        }
        self.core.channel.clear();
        self.core.power.set_parent(None)?;
        Ok(())
    }

    /// One `Update` tick: resolve transitions and update the selected unit.
    pub fn update(&self, delta: f32) -> FsmResult<()> {
        self.core.ensure_live()?;
        if !self.core.is_active() {
            return Ok(());
        }

        let core = &self.core;
        let _scope = core.begin_resolution();
        let mut delta = delta;
        // Every pass either changes state (bounded by the budget) or returns.
        for _ in 0..=core.config.max_transitions_per_tick {
            if core.halted.get() || !core.is_active() {
                return Ok(());
            }
            let Some(current) = core.current_unit() else {
                return Ok(());
            };

            if let Some(target) = core.poll_any_state(current.id(), current.elapsed()) {
                core.change_state(target, TransitionCause::AnyState);
                delta = 0.0;
                continue;
            }

            match current.update(core, delta) {
                UnitOutcome::Stayed => return Ok(()),
                UnitOutcome::Transitioned => delta = 0.0,
            }
        }
        Ok(())
    }

    pub fn fixed_update(&self, delta: f32) -> FsmResult<()> {
        self.tick(TickPhase::FixedUpdate, delta)
    }

    pub fn late_update(&self, delta: f32) -> FsmResult<()> {
        self.tick(TickPhase::LateUpdate, delta)
    }

    /// Drive one phase of a frame.
    pub fn tick(&self, phase: TickPhase, delta: f32) -> FsmResult<()> {
        if phase == TickPhase::Update {
            return self.update(delta);
        }
        self.core.ensure_live()?;
        if !self.core.is_active() {
            return Ok(());
        }
        if let Some(current) = self.core.current_unit() {
            current.tick_phase(phase, delta);
        }
        Ok(())
    }

    /// Publish on this graph's channel, then on the selected unit's sub-graph.
    pub fn raise(&self, topic: &str, payload: &Value) -> FsmResult<()> {
        self.core.ensure_live()?;
        self.core.channel.publish(topic, payload);
        if !self.core.is_active() {
            return Ok(());
        }
        if let Some(sub) = self.core.current_unit().and_then(|u| u.sub_graph()) {
            if !sub.is_disposed() {
                sub.raise(topic, payload)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for StateGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateGraph")
            .field("id", &self.core.id)
            .field("name", &self.core.name)
            .field("units", &self.unit_count())
            .field("current", &self.current_name())
            .field("entered", &self.core.entered.get())
            .field("active", &self.core.is_active())
            .field("disposed", &self.core.disposed.get())
            .finish()
    }
}
