//! The top-level owner of graphs.

use super::driver::TickDriver;
use crate::config::RuntimeConfig;
use crate::core::TickPhase;
use crate::error::{FsmError, FsmResult};
use crate::events::{EventBus, EventChannel};
use crate::graph::StateGraph;
use crate::power::PowerNode;
use crate::validation::{issues_of, validate_graph};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

struct MachineCore {
    name: String,
    config: RuntimeConfig,
    power: PowerNode,
    channel: Rc<EventChannel>,
    graphs: RefCell<Vec<StateGraph>>,
    started: Cell<bool>,
    disposed: Cell<bool>,
}

/// Hosts graphs, powers them and forwards ticks and events to them.
///
/// The machine's power node is a power source; every attached graph's power
/// node hangs beneath it, so switching the machine off gates every graph at
/// once. Detaching a graph keeps its selected unit; re-attaching resumes it
/// without entering it again.
///
/// # Example
///
/// ```rust
/// use framestate::builder::TransitionBuilder;
/// use framestate::host::Machine;
/// use serde_json::json;
///
/// let machine = Machine::new("door");
/// let graph = machine.create_graph("door").unwrap();
/// let closed = graph.add_unit("Closed").unwrap();
/// let open = graph.add_unit("Open").unwrap();
/// closed
///     .add_transition(TransitionBuilder::new().on_event("interact").to(&open))
///     .unwrap();
///
/// machine.start().unwrap();
/// machine.local_raise("interact", &json!({})).unwrap();
/// assert_eq!(graph.current_name().as_deref(), Some("Open"));
///
/// machine.dispose().unwrap();
/// assert!(machine.update(0.1).is_err());
/// ```
#[derive(Clone)]
pub struct Machine {
    core: Rc<MachineCore>,
}

/// Non-owning handle to a [`Machine`], for callbacks that must not keep it alive.
#[derive(Clone)]
pub struct WeakMachine {
    core: Weak<MachineCore>,
}

impl WeakMachine {
    pub fn upgrade(&self) -> Option<Machine> {
        self.core.upgrade().map(|core| Machine { core })
    }
}

impl Machine {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, RuntimeConfig::default())
    }

    /// A machine with `config`. Out-of-range values are clamped, see
    /// [`RuntimeConfig::sanitized`].
    pub fn with_config(name: impl Into<String>, config: RuntimeConfig) -> Self {
        let name = name.into();
        let config = config.sanitized();
        Self {
            core: Rc::new(MachineCore {
                power: PowerNode::source(name.clone()),
                channel: Rc::new(EventChannel::new(name.clone())),
                name,
                config,
                graphs: RefCell::new(Vec::new()),
                started: Cell::new(false),
                disposed: Cell::new(false),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.core.config
    }

    pub fn power(&self) -> PowerNode {
        self.core.power.clone()
    }

    /// The machine's scoped event channel.
    pub fn channel(&self) -> Rc<EventChannel> {
        Rc::clone(&self.core.channel)
    }

    pub fn downgrade(&self) -> WeakMachine {
        WeakMachine {
            core: Rc::downgrade(&self.core),
        }
    }

    pub fn is_started(&self) -> bool {
        self.core.started.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.core.disposed.get()
    }

    /// Started and switched on.
    pub fn is_active(&self) -> bool {
        self.core.power.is_active()
    }

    /// Currently attached graphs, in attachment order.
    pub fn graphs(&self) -> Vec<StateGraph> {
        self.core.graphs.borrow().clone()
    }

    pub fn is_hosting(&self, graph: &StateGraph) -> bool {
        self.core.graphs.borrow().iter().any(|g| g.ptr_eq(graph))
    }

    fn ensure_live(&self) -> FsmResult<()> {
        if self.core.disposed.get() {
            return Err(FsmError::Disposed(self.core.name.clone()));
        }
        Ok(())
    }

    // ---- hosting ------------------------------------------------------------

    /// Construct a graph with this machine's config and attach it.
    pub fn create_graph(&self, name: impl Into<String>) -> FsmResult<StateGraph> {
        self.ensure_live()?;
        let graph = StateGraph::with_config(name, self.core.config.clone());
        self.attach_graph(&graph)?;
        Ok(graph)
    }

    /// Host `graph`. Attaching a graph this machine already hosts is a no-op.
    ///
    /// On a started machine a graph with no selected unit is entered right
    /// away; a graph that kept its selection across a detach resumes as is.
    pub fn attach_graph(&self, graph: &StateGraph) -> FsmResult<()> {
        self.ensure_live()?;
        if graph.is_disposed() {
            return Err(FsmError::Disposed(graph.name().to_string()));
        }
        if graph.is_nested() {
            return Err(FsmError::NestedGraph(graph.name().to_string()));
        }
        if self.is_hosting(graph) {
            return Ok(());
        }
        if graph.power().parent().is_some() {
            return Err(FsmError::AlreadyHosted(graph.name().to_string()));
        }

        if self.core.started.get() && !graph.is_entered() {
            let issues = issues_of(validate_graph(graph));
            if !issues.is_empty() {
                return Err(FsmError::InvalidGraph(issues));
            }
        }

        graph.power().set_parent(Some(&self.core.power))?;
        graph.power().set_switched_on(true);
        graph.core().set_detached(false);
        self.core.graphs.borrow_mut().push(graph.clone());

        if self.core.started.get() && !graph.is_entered() {
            graph.enter()?;
        }
        Ok(())
    }

    /// Stop hosting `graph`, keeping its selected unit. Returns whether it was hosted.
    pub fn detach_graph(&self, graph: &StateGraph) -> FsmResult<bool> {
        self.ensure_live()?;
        let removed = {
            let mut graphs = self.core.graphs.borrow_mut();
            let before = graphs.len();
            graphs.retain(|g| !g.ptr_eq(graph));
            graphs.len() != before
        };
        if !removed {
            return Ok(false);
        }

        graph.power().set_switched_on(false);
        graph.power().set_parent(None)?;
        graph.core().set_detached(true);
        Ok(true)
    }

    // ---- lifecycle ----------------------------------------------------------

    /// Validate every graph, power on and enter the graphs with no selection.
    ///
    /// Starting a started machine is a no-op.
    pub fn start(&self) -> FsmResult<()> {
        self.ensure_live()?;
        if self.core.started.get() {
            return Ok(());
        }

        let graphs = self.graphs();
        let issues: Vec<_> = graphs
            .iter()
            .flat_map(|g| issues_of(validate_graph(g)))
            .collect();
        if !issues.is_empty() {
            return Err(FsmError::InvalidGraph(issues));
        }

        self.core.started.set(true);
        self.core.power.set_switched_on(true);
        log::debug!("machine '{}': started with {} graph(s)", self.core.name, graphs.len());

        for graph in graphs {
            if !graph.is_entered() && !graph.is_disposed() {
                graph.enter()?;
            }
        }
        Ok(())
    }

    /// Power off and stop every graph. The machine can be started again.
    pub fn exit(&self) -> FsmResult<()> {
        self.ensure_live()?;
        if !self.core.started.get() {
            return Ok(());
        }

        self.core.power.set_switched_on(false);
        for graph in self.graphs() {
            if !graph.is_disposed() {
                graph.exit()?;
            }
        }
        self.core.started.set(false);
        log::debug!("machine '{}': exited", self.core.name);
        Ok(())
    }

    /// Exit, then start again from every graph's initial unit.
    pub fn reset(&self) -> FsmResult<()> {
        self.exit()?;
        self.start()
    }

    /// Stop and dispose every hosted graph. Every later call fails with
    /// [`FsmError::Disposed`].
    pub fn dispose(&self) -> FsmResult<()> {
        self.ensure_live()?;

        self.core.power.set_switched_on(false);
        let graphs: Vec<StateGraph> = self.core.graphs.borrow_mut().drain(..).collect();
        for graph in &graphs {
            if !graph.is_disposed() {
                graph.dispose()?;
            }
        }

        self.core.channel.clear();
        self.core.started.set(false);
        self.core.disposed.set(true);
        log::debug!("machine '{}': disposed", self.core.name);
        Ok(())
    }

    /// Switch the machine's power node without touching graph selections.
    ///
    /// While switched off, ticks and events are ignored by every hosted graph.
    pub fn set_activation(&self, on: bool) -> FsmResult<()> {
        self.ensure_live()?;
        self.core.power.set_switched_on(on);
        Ok(())
    }

    // ---- ticks and events ---------------------------------------------------

    pub fn update(&self, delta: f32) -> FsmResult<()> {
        self.tick(TickPhase::Update, delta)
    }

    pub fn fixed_update(&self, delta: f32) -> FsmResult<()> {
        self.tick(TickPhase::FixedUpdate, delta)
    }

    pub fn late_update(&self, delta: f32) -> FsmResult<()> {
        self.tick(TickPhase::LateUpdate, delta)
    }

    /// Drive one phase over every hosted graph, in attachment order.
    pub fn tick(&self, phase: TickPhase, delta: f32) -> FsmResult<()> {
        self.ensure_live()?;
        if !self.core.power.is_active() {
            return Ok(());
        }

        // Graphs may be attached or detached by callbacks during the tick.
        let mut i = 0;
        loop {
            let graph = self.core.graphs.borrow().get(i).cloned();
            let Some(graph) = graph else {
                break;
            };
            i += 1;
            if graph.is_disposed() {
                continue;
            }
            graph.tick(phase, delta)?;
            if self.core.disposed.get() {
                break;
            }
        }
        Ok(())
    }

    /// Publish on the machine's channel, then on every attached graph.
    pub fn local_raise(&self, topic: &str, payload: &Value) -> FsmResult<()> {
        self.ensure_live()?;
        self.core.channel.publish(topic, payload);

        for graph in self.graphs() {
            if self.is_hosting(&graph) && !graph.is_disposed() {
                graph.raise(topic, payload)?;
            }
        }
        Ok(())
    }
}

impl TickDriver for Machine {
    fn on_update(&self, delta: f32) -> FsmResult<()> {
        self.update(delta)
    }

    fn on_fixed_update(&self, delta: f32) -> FsmResult<()> {
        self.fixed_update(delta)
    }

    fn on_late_update(&self, delta: f32) -> FsmResult<()> {
        self.late_update(delta)
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("name", &self.core.name)
            .field("graphs", &self.core.graphs.borrow().len())
            .field("started", &self.core.started.get())
            .field("active", &self.core.power.is_active())
            .field("disposed", &self.core.disposed.get())
            .finish()
    }
}
