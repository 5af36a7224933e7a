//! The activation ("power") tree.
//!
//! Machines, graphs and sub-graphs each own a [`PowerNode`]. Switching a node
//! off, or cutting it from an active ancestor, gates ticks and event delivery
//! for everything beneath it.

mod node;

pub use node::PowerNode;
