//! Identifiers for graphs and the units they own.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`StateGraph`](crate::graph::StateGraph).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphId(u64);

impl GraphId {
    pub(crate) fn next() -> Self {
        GraphId(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Handle-free reference to a unit inside one graph.
///
/// Transitions point at their targets through `UnitId` rather than through
/// unit handles, so cyclic graphs never form reference cycles. The graph
/// component lets registration reject targets that belong to another graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId {
    graph: GraphId,
    index: u32,
}

impl UnitId {
    pub(crate) fn new(graph: GraphId, index: usize) -> Self {
        UnitId {
            graph,
            index: index as u32,
        }
    }

    /// The graph this unit was created in.
    pub fn graph(&self) -> GraphId {
        self.graph
    }

    /// Position of the unit in its graph's creation order.
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.graph, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_ids_are_unique() {
        let a = GraphId::next();
        let b = GraphId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }

    #[test]
    fn unit_id_keeps_its_graph() {
        let graph = GraphId::next();
        let unit = UnitId::new(graph, 3);
        assert_eq!(unit.graph(), graph);
        assert_eq!(unit.index(), 3);
        assert_eq!(unit.to_string(), format!("g{}#3", graph.get()));
    }
}
