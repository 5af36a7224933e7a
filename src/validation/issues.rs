//! Structural problems detected before a machine starts.

use thiserror::Error;

/// A single structural problem in a graph.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GraphIssue {
    #[error("graph '{graph}' has no units")]
    EmptyGraph { graph: String },
}
