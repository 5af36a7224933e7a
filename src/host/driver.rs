//! The contract between a host loop and the runtime.

use crate::error::FsmResult;

/// Per-frame entry points a host loop calls, once each per frame.
///
/// Each phase drains every hosted graph synchronously, parent graph first and
/// then any active sub-graph.
pub trait TickDriver {
    fn on_update(&self, delta: f32) -> FsmResult<()>;

    fn on_fixed_update(&self, delta: f32) -> FsmResult<()>;

    fn on_late_update(&self, delta: f32) -> FsmResult<()>;

    /// Run a whole frame: fixed update, update, then late update.
    fn run_frame(&self, delta: f32, fixed_delta: f32) -> FsmResult<()> {
        self.on_fixed_update(fixed_delta)?;
        self.on_update(delta)?;
        self.on_late_update(delta)
    }
}
