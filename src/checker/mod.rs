//! Reachability checking.
//!
//! The checker joins the pieces of the engine: a [`StateSupplier`] provides the state
//! reaching a [`ProgramPoint`], the [`Desugarer`](crate::desugar::Desugarer) and the
//! [`PassPipeline`](crate::pipeline::PassPipeline) prepare it, and a
//! [`SolverBackend`](crate::solver::SolverBackend) decides it.
//!
//! # Architecture
//!
//! - [`Checker`] - Runs queries, one backend call per query
//! - [`StateSupplier`] - Static analysis collaborator
//! - [`DiagnosticsSink`] - Observer of [`TraceRecord`]s; [`LogSink`] and [`MemorySink`]
//!   are provided

mod engine;
mod point;
mod trace;

pub use engine::{Checker, PreparedQuery, NO_STATE};
pub use point::{ProgramPoint, StateSupplier};
pub use trace::{DiagnosticsSink, LogSink, MemorySink, Projection, TraceRecord};
