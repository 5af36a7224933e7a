//! Bounded record of the state changes a graph has made.
//!
//! Every selection change (including the initial entry) can be recorded with
//! its cause, how long the previous unit had been selected and the wall-clock
//! time it happened. The history is diagnostics only: it never influences
//! transition resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// What caused a selection change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionCause {
    /// The graph was entered and selected its initial unit.
    Entry,
    /// A transition owned by the previously selected unit fired.
    Local,
    /// An any-state transition fired.
    AnyState,
    /// An event-driven transition fired during event delivery.
    Event,
    /// A signal-driven transition fired when its signal was raised.
    Signal,
}

/// Record of a single selection change.
///
/// # Example
///
/// ```rust
/// use framestate::core::{TransitionCause, TransitionRecord};
/// use chrono::Utc;
///
/// let record = TransitionRecord {
///     from: Some("Idle".to_string()),
///     to: "Walk".to_string(),
///     cause: TransitionCause::Local,
///     elapsed_in_from: 1.5,
///     recorded_at: Utc::now(),
/// };
/// assert_eq!(record.to, "Walk");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// The unit that was selected before the change, if any
    pub from: Option<String>,
    /// The unit selected by the change
    pub to: String,
    /// What triggered the change
    pub cause: TransitionCause,
    /// Time the previous unit had accumulated when it was left
    pub elapsed_in_from: f32,
    /// When the change happened
    pub recorded_at: DateTime<Utc>,
}

/// Ordered, bounded history of selection changes.
///
/// Once `capacity` records are held the oldest one is dropped for each new
/// record. A capacity of zero disables recording altogether.
///
/// # Example
///
/// ```rust
/// use framestate::core::{TransitionCause, TransitionHistory, TransitionRecord};
/// use chrono::Utc;
///
/// let mut history = TransitionHistory::with_capacity(2);
/// for (from, to) in [(None, "A"), (Some("A"), "B"), (Some("B"), "C")] {
///     history.record(TransitionRecord {
///         from: from.map(str::to_string),
///         to: to.to_string(),
///         cause: TransitionCause::Local,
///         elapsed_in_from: 0.0,
///         recorded_at: Utc::now(),
///     });
/// }
///
/// assert_eq!(history.len(), 2);
/// assert_eq!(history.path(), vec!["A", "B", "C"]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionHistory {
    capacity: usize,
    records: VecDeque<TransitionRecord>,
}

impl Default for TransitionHistory {
    fn default() -> Self {
        Self::with_capacity(crate::config::DEFAULT_HISTORY_CAPACITY)
    }
}

impl TransitionHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record, evicting the oldest one when full.
    pub fn record(&mut self, record: TransitionRecord) {
        if self.capacity == 0 {
            return;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Names of the units traversed, oldest first.
    ///
    /// Starts with the `from` of the oldest retained record (when it has
    /// one), followed by the `to` of every record.
    pub fn path(&self) -> Vec<&str> {
        let mut path = Vec::with_capacity(self.records.len() + 1);
        if let Some(from) = self.records.front().and_then(|r| r.from.as_deref()) {
            path.push(from);
        }
        path.extend(self.records.iter().map(|r| r.to.as_str()));
        path
    }

    /// Wall-clock span between the oldest and newest retained records.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.records.front()?, self.records.back()?);
        last.recorded_at
            .signed_duration_since(first.recorded_at)
            .to_std()
            .ok()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&TransitionRecord> {
        self.records.back()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Export the retained records as a JSON array.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(from: Option<&str>, to: &str, cause: TransitionCause) -> TransitionRecord {
        TransitionRecord {
            from: from.map(str::to_string),
            to: to.to_string(),
            cause,
            elapsed_in_from: 0.25,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn new_history_is_empty() {
        let history = TransitionHistory::with_capacity(4);
        assert!(history.is_empty());
        assert!(history.path().is_empty());
        assert!(history.duration().is_none());
    }

    #[test]
    fn path_starts_at_first_source() {
        let mut history = TransitionHistory::with_capacity(8);
        history.record(record(Some("Idle"), "Walk", TransitionCause::Local));
        history.record(record(Some("Walk"), "Run", TransitionCause::AnyState));

        assert_eq!(history.path(), vec!["Idle", "Walk", "Run"]);
        assert_eq!(history.last().map(|r| r.cause), Some(TransitionCause::AnyState));
    }

    #[test]
    fn entry_record_has_no_source() {
        let mut history = TransitionHistory::with_capacity(8);
        history.record(record(None, "Idle", TransitionCause::Entry));
        assert_eq!(history.path(), vec!["Idle"]);
    }

    #[test]
    fn oldest_records_are_evicted() {
        let mut history = TransitionHistory::with_capacity(2);
        history.record(record(None, "A", TransitionCause::Entry));
        history.record(record(Some("A"), "B", TransitionCause::Local));
        history.record(record(Some("B"), "C", TransitionCause::Local));

        assert_eq!(history.len(), 2);
        assert_eq!(history.path(), vec!["A", "B", "C"]);
    }

    #[test]
    fn zero_capacity_disables_recording() {
        let mut history = TransitionHistory::with_capacity(0);
        history.record(record(None, "A", TransitionCause::Entry));
        assert!(history.is_empty());
    }

    #[test]
    fn duration_spans_retained_records() {
        let mut history = TransitionHistory::with_capacity(4);
        let start = Utc::now();
        let mut first = record(None, "A", TransitionCause::Entry);
        first.recorded_at = start;
        let mut second = record(Some("A"), "B", TransitionCause::Local);
        second.recorded_at = start + chrono::Duration::milliseconds(40);
        history.record(first);
        history.record(second);

        assert_eq!(history.duration(), Some(Duration::from_millis(40)));
    }

    #[test]
    fn history_exports_json() {
        let mut history = TransitionHistory::with_capacity(4);
        history.record(record(Some("Idle"), "Walk", TransitionCause::Signal));

        let json = history.to_json().unwrap();
        let parsed: Vec<TransitionRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].cause, TransitionCause::Signal);
        assert_eq!(parsed[0].from.as_deref(), Some("Idle"));
    }
}
