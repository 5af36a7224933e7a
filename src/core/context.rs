//! Values handed to user callbacks.

use super::ids::UnitId;
use serde::{Deserialize, Serialize};

/// Snapshot of the unit a callback runs for.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StateContext {
    /// The unit whose hook or timer is running.
    pub unit: UnitId,
    /// Time accumulated since the unit was last entered.
    pub elapsed: f32,
    /// Delta of the tick this call belongs to (zero on entry).
    pub delta: f32,
}

/// One of the three per-frame phases a host drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TickPhase {
    Update,
    FixedUpdate,
    LateUpdate,
}

impl TickPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Update => "Update",
            Self::FixedUpdate => "FixedUpdate",
            Self::LateUpdate => "LateUpdate",
        }
    }
}
