//! Runtime error taxonomy.
//!
//! Programming errors, illegal power-tree topology and use-after-dispose all
//! surface to the caller synchronously through [`FsmError`]. Runaway
//! transition chains and misconfigured periodic callbacks are recovered
//! locally and only reported through the `log` facade.

use crate::builder::BuildError;
use crate::core::UnitId;
use crate::validation::GraphIssue;
use thiserror::Error;

/// Errors surfaced by power nodes, graphs, units and machines.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FsmError {
    #[error("power node '{0}' cannot be its own parent")]
    SelfParenting(String),

    #[error("power node '{0}' cannot be attached to itself")]
    SelfAttachment(String),

    #[error("'{0}' has been disposed")]
    Disposed(String),

    #[error("unit {unit} does not belong to graph '{graph}'")]
    ForeignUnit { graph: String, unit: UnitId },

    #[error("graph '{0}' has no units to enter")]
    NoInitialUnit(String),

    #[error("graph '{graph}' already has a unit named '{name}'")]
    DuplicateUnit { graph: String, name: String },

    #[error("unit '{0}' already owns a sub-graph")]
    SubGraphExists(String),

    #[error("graph '{0}' is already hosted by another machine")]
    AlreadyHosted(String),

    #[error("graph '{0}' is a sub-graph and cannot be hosted by a machine")]
    NestedGraph(String),

    #[error("invalid transition: {0}")]
    Build(#[from] BuildError),

    #[error("graph validation failed: {}", describe(.0))]
    InvalidGraph(Vec<GraphIssue>),
}

fn describe(issues: &[GraphIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type FsmResult<T> = Result<T, FsmError>;
