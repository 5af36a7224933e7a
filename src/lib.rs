//! Framestate: a hierarchical, tick-driven state machine runtime
//!
//! Behaviour is described as graphs of state units. A host loop drives a
//! [`Machine`] once per frame; the machine forwards each tick to the graphs it
//! hosts, and every graph resolves its transitions in a bounded loop before
//! updating its selected unit. Units can own nested graphs, so behaviour
//! composes hierarchically.
//!
//! # Core Concepts
//!
//! - **Power tree**: [`PowerNode`]s gate whether machines, graphs and
//!   sub-graphs process ticks and events at all
//! - **Graphs and units**: a [`StateGraph`] owns its [`StateUnit`]s and
//!   selects at most one at a time
//! - **Transitions**: built with [`TransitionBuilder`]; polled each tick, or
//!   driven by events and [`Signal`]s
//! - **Events**: every machine and graph has a scoped [`EventChannel`];
//!   delivery only has an effect on the selected unit of an active graph
//!
//! # Example
//!
//! ```rust
//! use framestate::builder::{after, TransitionBuilder};
//! use framestate::Machine;
//! use serde_json::json;
//!
//! let machine = Machine::new("guard");
//! let graph = machine.create_graph("patrol").unwrap();
//! let walk = graph.add_unit("Walk").unwrap();
//! let look = graph.add_unit("LookAround").unwrap();
//! let chase = graph.add_unit("Chase").unwrap();
//!
//! walk.add_transition(after(&look, 2.0)).unwrap();
//! look.add_transition(after(&walk, 1.0)).unwrap();
//! graph
//!     .add_any_transition(TransitionBuilder::new().on_event("spotted").to(&chase))
//!     .unwrap();
//!
//! machine.start().unwrap();
//! machine.update(2.0).unwrap();
//! assert_eq!(graph.current_name().as_deref(), Some("LookAround"));
//!
//! machine.local_raise("spotted", &json!({ "by": "camera" })).unwrap();
//! assert_eq!(graph.current(), Some(chase.id()));
//! assert_eq!(graph.history().path(), vec!["Walk", "LookAround", "Chase"]);
//! ```

pub mod builder;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod graph;
pub mod host;
pub mod power;
pub mod validation;

// Re-export commonly used types
pub use builder::{BuildError, TransitionBuilder};
pub use config::RuntimeConfig;
pub use core::{StateContext, TickPhase, TransitionCause, UnitId};
pub use error::{FsmError, FsmResult};
pub use events::{Event, EventBus, EventChannel, EventFilter, Signal};
pub use graph::{StateGraph, StateUnit, Transition};
pub use host::{Machine, TickDriver};
pub use power::PowerNode;
