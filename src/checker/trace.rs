//! Structured diagnostics of reachability queries.
//!
//! The checker reports each step of a query to a [`DiagnosticsSink`]. Sinks only
//! observe; nothing they do can change a verdict.

use std::{fmt, time::Duration};

use strum::Display;

use crate::{checker::ProgramPoint, solver::SolverResult, state::PredicateState};

/// Which projection of a query's state a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Projection {
    /// Every predicate.
    Full,
    /// Path predicates only.
    Path,
}

/// One step of a reachability query.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceRecord {
    /// The supplier returned a state for the point.
    PointRecognized {
        /// The queried point.
        point: ProgramPoint,
        /// Number of predicates in the supplied state.
        predicates: usize,
    },
    /// A projection went through desugaring and the rewrite pipeline.
    StatePrepared {
        /// The queried point.
        point: ProgramPoint,
        /// The projection.
        projection: Projection,
        /// Before preparation.
        before: PredicateState,
        /// After preparation.
        after: PredicateState,
    },
    /// The query finished.
    Verdict {
        /// The queried point.
        point: ProgramPoint,
        /// The verdict returned to the caller.
        result: SolverResult,
        /// Wall-clock time of the whole query.
        elapsed: Duration,
    },
}

impl TraceRecord {
    /// The point the record belongs to.
    #[must_use]
    pub fn point(&self) -> &ProgramPoint {
        match self {
            TraceRecord::PointRecognized { point, .. }
            | TraceRecord::StatePrepared { point, .. }
            | TraceRecord::Verdict { point, .. } => point,
        }
    }
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceRecord::PointRecognized { point, predicates } => {
                write!(f, "{point}: recognized, {predicates} predicates")
            }
            TraceRecord::StatePrepared {
                point,
                projection,
                before,
                after,
            } => write!(
                f,
                "{point}: {projection} state prepared, {} -> {} predicates",
                before.size(),
                after.size()
            ),
            TraceRecord::Verdict {
                point,
                result,
                elapsed,
            } => write!(f, "{point}: {result} in {elapsed:?}"),
        }
    }
}

/// Receives the trace records of reachability queries.
///
/// Records of parallel queries arrive interleaved; [`TraceRecord::point`] tells them apart.
pub trait DiagnosticsSink: Send + Sync {
    /// Receives one record.
    fn record(&self, record: &TraceRecord);
}

/// Renders records through the `log` facade.
///
/// Summaries are logged at `debug`, complete states at `trace`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticsSink for LogSink {
    fn record(&self, record: &TraceRecord) {
        log::debug!("{record}");
        if let TraceRecord::StatePrepared { before, after, .. } = record {
            log::trace!("before: {before}");
            log::trace!("after: {after}");
        }
    }
}

/// Keeps every record in memory.
#[derive(Default)]
pub struct MemorySink {
    records: boxcar::Vec<TraceRecord>,
}

impl fmt::Debug for MemorySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySink")
            .field("records", &self.len())
            .finish()
    }
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The records received so far, in arrival order.
    #[must_use]
    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.iter().map(|(_, r)| r.clone()).collect()
    }

    /// The records of one point.
    #[must_use]
    pub fn records_for(&self, point: &ProgramPoint) -> Vec<TraceRecord> {
        self.records
            .iter()
            .filter(|(_, r)| r.point() == point)
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Number of records received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.count()
    }

    /// Returns `true` if nothing was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.count() == 0
    }
}

impl DiagnosticsSink for MemorySink {
    fn record(&self, record: &TraceRecord) {
        self.records.push(record.clone());
    }
}

impl<T: DiagnosticsSink + ?Sized> DiagnosticsSink for std::sync::Arc<T> {
    fn record(&self, record: &TraceRecord) {
        (**self).record(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_filters_by_point() {
        let sink = MemorySink::new();
        let a = ProgramPoint::new("A.f", 1);
        let b = ProgramPoint::new("B.g", 2);
        sink.record(&TraceRecord::PointRecognized {
            point: a.clone(),
            predicates: 3,
        });
        sink.record(&TraceRecord::Verdict {
            point: b.clone(),
            result: SolverResult::Unsat,
            elapsed: Duration::from_millis(1),
        });

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.records_for(&a).len(), 1);
        assert_eq!(
            sink.records_for(&b)[0].to_string(),
            "B.g@2: UNSAT in 1ms"
        );
    }
}
