//! Change tracking for rewrite passes and desugaring.
//!
//! Every pass records what it changed into an [`EventLog`]. The log is append-only and
//! lock-free (backed by [`boxcar::Vec`]), so a shared log can be written through `&self`
//! from several threads. Passes usually collect events into a local log and
//! [`merge`](EventLog::merge) it into the shared one when they report a change.
//!
//! ```rust
//! use pathscope::pipeline::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//! log.record(EventKind::PredicateRemoved)
//!     .pass("optimizer")
//!     .message("x == x");
//! assert_eq!(log.count(EventKind::PredicateRemoved), 1);
//! ```

use std::fmt;

use strum::{Display, EnumIter};

use crate::state::Location;

/// What kind of change an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum EventKind {
    /// A redundant predicate was removed.
    PredicateRemoved,
    /// A choice branch was pruned as infeasible.
    BranchPruned,
    /// A constant was substituted for a term.
    ConstantPropagated,
    /// Memory accesses were assigned a space.
    MemorySpaced,
    /// A term was simplified.
    TermSimplified,
    /// A library call was replaced by its model.
    CallDesugared,
    /// A library call had no model and was kept.
    CallPassedThrough,
}

/// A single recorded change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// What changed.
    pub kind: EventKind,
    /// The pass (or component) that made the change.
    pub pass: &'static str,
    /// Source location of the affected predicate, if known.
    pub location: Location,
    /// Free-form detail.
    pub message: String,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.pass, self.kind)?;
        if !self.location.is_unknown() {
            write!(f, " at {}", self.location)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Append-only, thread-safe collection of [`Event`]s.
#[derive(Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts recording an event. The event is appended when the returned recorder is
    /// dropped, after the optional details have been filled in.
    pub fn record(&self, kind: EventKind) -> EventRecorder<'_> {
        EventRecorder {
            log: self,
            event: Some(Event {
                kind,
                pass: "",
                location: Location::unknown(),
                message: String::new(),
            }),
        }
    }

    /// Appends a complete event.
    pub fn push(&self, event: Event) {
        self.events.push(event);
    }

    /// Moves every event of `other` into this log.
    pub fn merge(&self, other: EventLog) {
        for event in other.iter() {
            self.events.push(event.clone());
        }
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of events of the given kind.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.iter().filter(|e| e.kind == kind).count()
    }

    /// Iterates the events in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, event)| event)
    }

    /// Returns a snapshot of all events.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Event> {
        self.iter().cloned().collect()
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Fills in an event before it is appended to its log.
pub struct EventRecorder<'a> {
    log: &'a EventLog,
    event: Option<Event>,
}

impl EventRecorder<'_> {
    /// Sets the recording pass.
    #[must_use]
    pub fn pass(mut self, pass: &'static str) -> Self {
        if let Some(event) = self.event.as_mut() {
            event.pass = pass;
        }
        self
    }

    /// Sets the location.
    #[must_use]
    pub fn at(mut self, location: &Location) -> Self {
        if let Some(event) = self.event.as_mut() {
            event.location = location.clone();
        }
        self
    }

    /// Sets the message and appends the event.
    pub fn message(mut self, message: impl fmt::Display) {
        if let Some(event) = self.event.as_mut() {
            event.message = message.to_string();
        }
    }
}

impl Drop for EventRecorder<'_> {
    fn drop(&mut self) {
        if let Some(event) = self.event.take() {
            self.log.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_merge() {
        let shared = EventLog::new();
        let local = EventLog::new();
        local
            .record(EventKind::ConstantPropagated)
            .pass("constant-propagation")
            .at(&Location::new("A.b", 4))
            .message("x -> 3");
        let _ = local.record(EventKind::PredicateRemoved).pass("optimizer");
        assert_eq!(local.len(), 2);

        shared.merge(local);
        assert_eq!(shared.len(), 2);
        assert_eq!(shared.count(EventKind::ConstantPropagated), 1);
        let first = shared.iter().next().unwrap();
        assert_eq!(first.to_string(), "[constant-propagation] ConstantPropagated at A.b:4: x -> 3");
    }

    #[test]
    fn test_concurrent_recording() {
        let log = EventLog::new();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..25 {
                        log.record(EventKind::TermSimplified).message("t");
                    }
                });
            }
        });
        assert_eq!(log.len(), 100);
    }
}
