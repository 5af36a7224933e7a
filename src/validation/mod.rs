//! Pre-start structural checks for graphs.
//!
//! [`validate_graph`] walks a graph and every sub-graph beneath it and
//! accumulates all problems it finds instead of stopping at the first one.
//! [`Machine::start`](crate::host::Machine::start) runs it over every hosted
//! graph.
//!
//! The only blocking issue is a graph with no units. A direct transition
//! from a unit to itself is logged as a warning and left to the per-tick
//! budget, like every other runaway chain.

mod issues;

pub use issues::GraphIssue;

use crate::graph::{StateGraph, TransitionKind};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Check `graph` and its sub-graphs, accumulating ALL issues.
///
/// # Example
///
/// ```rust
/// use framestate::graph::StateGraph;
/// use framestate::validation::{validate_graph, GraphIssue};
/// use stillwater::validation::Validation;
///
/// let graph = StateGraph::new("empty");
/// match validate_graph(&graph) {
///     Validation::Failure(issues) => {
///         assert!(issues.iter().any(|i| matches!(i, GraphIssue::EmptyGraph { .. })));
///     }
///     Validation::Success(_) => panic!("an empty graph cannot be entered"),
/// }
/// ```
pub fn validate_graph(graph: &StateGraph) -> Validation<(), NonEmptyVec<GraphIssue>> {
    let mut checks: Vec<Validation<(), NonEmptyVec<GraphIssue>>> = Vec::new();

    if graph.unit_count() == 0 {
        checks.push(Validation::fail(GraphIssue::EmptyGraph {
            graph: graph.name().to_string(),
        }));
    }

    for unit in graph.units() {
        for transition in unit.transitions() {
            if let TransitionKind::Direct { target } = transition.kind() {
                if *target == unit.id() {
                    log::warn!(
                        "unit '{}' in graph '{}' has a direct transition to itself; \
                         it will re-enter until the per-tick budget runs out",
                        unit.name(),
                        graph.name()
                    );
                }
            }
        }

        if let Some(sub) = unit.sub_graph() {
            checks.push(validate_graph(&sub));
        }
    }

    Validation::all_vec(checks).map(|_| ())
}

/// Collect the issues of a failed validation into a plain list.
pub(crate) fn issues_of(result: Validation<(), NonEmptyVec<GraphIssue>>) -> Vec<GraphIssue> {
    match result {
        Validation::Success(_) => Vec::new(),
        Validation::Failure(issues) => issues.iter().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::go_to;

    #[test]
    fn populated_graph_is_valid() {
        let graph = StateGraph::new("locomotion");
        let idle = graph.add_unit("Idle").unwrap();
        let walk = graph.add_unit("Walk").unwrap();
        idle.add_transition(go_to(&walk)).unwrap();

        assert!(validate_graph(&graph).is_success());
    }

    #[test]
    fn issues_accumulate_across_sub_graphs() {
        let graph = StateGraph::new("combat");
        let attack = graph.add_unit("Attack").unwrap();
        let block = graph.add_unit("Block").unwrap();
        attack.create_sub_graph("combo").unwrap();
        block.create_sub_graph("parry").unwrap();

        let issues = issues_of(validate_graph(&graph));
        assert_eq!(issues.len(), 2);
        assert!(issues.contains(&GraphIssue::EmptyGraph {
            graph: "combo".to_string(),
        }));
        assert!(issues.contains(&GraphIssue::EmptyGraph {
            graph: "parry".to_string(),
        }));
    }

    #[test]
    fn direct_self_transitions_are_not_blocking() {
        let graph = StateGraph::new("combat");
        let attack = graph.add_unit("Attack").unwrap();
        attack.add_transition(go_to(&attack)).unwrap();

        assert!(validate_graph(&graph).is_success());
    }

    #[test]
    fn success_has_no_issues() {
        let graph = StateGraph::new("single");
        graph.add_unit("Only").unwrap();
        assert!(issues_of(validate_graph(&graph)).is_empty());
    }
}
