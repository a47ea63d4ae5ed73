//! Solving backends.
//!
//! A backend decides whether a prepared state admits an execution that also satisfies a
//! path condition. Every backend implements [`SolverBackend`]; the checker calls it
//! exactly once per query and returns its verdict unchanged.
//!
//! # Available backends
//!
//! - [`BoundedSolver`] - enumerative reference backend, always available. It executes
//!   the state concretely over small input domains and only reports `Unsat` when the
//!   enumeration was exhaustive.
//! - `Z3Solver` - SMT backend (feature `z3`).
//!
//! # Contract
//!
//! Backends never block past their configured timeout and never turn a timeout or an
//! internal failure into `Unsat`; both are reported as [`SolverResult::Unknown`] with a
//! reason.
//!
//! The [`eval`] module holds the concrete term semantics shared by the bounded backend
//! and by constant folding.

mod bounded;
pub mod eval;
mod model;
#[cfg(feature = "z3")]
mod smt;

pub use bounded::BoundedSolver;
pub use model::{Addr, Heap, HeapObject, Model, Origin, SolverResult, Value};
#[cfg(feature = "z3")]
pub use smt::Z3Solver;

use crate::state::PredicateState;

/// A reachability decision procedure.
///
/// Implementations must be thread-safe: the checker shares one backend between the
/// parallel queries of [`Checker::check_many`](crate::Checker::check_many).
pub trait SolverBackend: Send + Sync {
    /// Returns the name of this backend.
    fn name(&self) -> &'static str;

    /// Returns a description of what this backend does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Decides whether some execution satisfies every constraint of `state` and the path
    /// condition `path`.
    ///
    /// `path` is a predicate state whose sequences are conjunctions and whose choices are
    /// disjunctions. Failures and timeouts are reported as [`SolverResult::Unknown`].
    fn is_path_possible(&self, state: &PredicateState, path: &PredicateState) -> SolverResult;
}
