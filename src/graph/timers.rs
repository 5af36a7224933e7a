//! Scheduled and periodic callbacks polled against a unit's elapsed time.

use crate::core::StateContext;
use std::rc::Rc;

pub(crate) type Hook = Rc<dyn Fn(&StateContext)>;

struct Scheduled {
    at: f32,
    fired: bool,
    callback: Hook,
}

// Boundary `n` lies at `base + interval * n`; computing it from the count
// rather than summing intervals keeps f32 error from dropping a boundary.
struct Periodic {
    interval: f32,
    base: f32,
    crossed: u32,
    callback: Hook,
}

impl Periodic {
    fn next_boundary(&self) -> f32 {
        self.base + self.interval * (self.crossed + 1) as f32
    }
}

/// Timer bookkeeping for one unit.
///
/// Callbacks are handed out one at a time so the caller can invoke them with
/// no borrow held.
#[derive(Default)]
pub(crate) struct Timers {
    scheduled: Vec<Scheduled>,
    periodic: Vec<Periodic>,
}

impl Timers {
    /// Register a one-shot. A target already in the past fires on the next poll.
    pub(crate) fn schedule(&mut self, at: f32, callback: Hook) {
        self.scheduled.push(Scheduled {
            at,
            fired: false,
            callback,
        });
    }

    /// Arm a periodic callback. Returns `false` (and arms nothing) for `interval <= 0`.
    pub(crate) fn every(&mut self, interval: f32, callback: Hook, elapsed: Option<f32>) -> bool {
        if interval <= 0.0 || interval.is_nan() {
            return false;
        }
        self.periodic.push(Periodic {
            interval,
            base: elapsed.unwrap_or(0.0),
            crossed: 0,
            callback,
        });
        true
    }

    pub(crate) fn scheduled_len(&self) -> usize {
        self.scheduled.len()
    }

    pub(crate) fn periodic_len(&self) -> usize {
        self.periodic.len()
    }

    /// Reset bookkeeping for a fresh entry.
    pub(crate) fn rearm(&mut self) {
        for s in &mut self.scheduled {
            s.fired = false;
        }
        for p in &mut self.periodic {
            p.base = 0.0;
            p.crossed = 0;
        }
    }

    /// The `index`-th one-shot, if it is due and has not fired since entry.
    pub(crate) fn take_due_scheduled(&mut self, index: usize, elapsed: f32) -> Option<Hook> {
        let s = self.scheduled.get_mut(index)?;
        if s.fired || elapsed < s.at {
            return None;
        }
        s.fired = true;
        Some(Rc::clone(&s.callback))
    }

    /// The `index`-th periodic callback, once per interval boundary crossed.
    pub(crate) fn take_due_periodic(&mut self, index: usize, elapsed: f32) -> Option<Hook> {
        let p = self.periodic.get_mut(index)?;
        if elapsed < p.next_boundary() {
            return None;
        }
        p.crossed += 1;
        Some(Rc::clone(&p.callback))
    }
}
