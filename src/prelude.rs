//! # pathscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the pathscope library. Import this module to get quick access to the essential
//! types for building states and checking reachability.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all pathscope operations
pub use crate::Error;

/// The result type used throughout pathscope
pub use crate::Result;

/// Checking session owning the term factory
pub use crate::Session;

/// Configuration
pub use crate::config::{CheckerConfig, PipelineConfig, SolverConfig, StringStrategy};

// ================================================================================================
// Terms
// ================================================================================================

/// Term construction
pub use crate::term::{Term, TermFactory, TermKind, TermType};

/// Operators and memory references
pub use crate::term::{BinaryOp, CmpOp, FieldRef, MemRef, MethodRef, MethodSignature, StrOp};

// ================================================================================================
// Predicate States
// ================================================================================================

/// Predicates and states
pub use crate::state::{
    Location, Predicate, PredicateKind, PredicateState, PredicateTypes, StateBuilder,
};

// ================================================================================================
// Rewriting and Desugaring
// ================================================================================================

/// Rewrite pipeline
pub use crate::pipeline::{EventKind, EventLog, PassContext, PassPipeline, StatePass};

/// Points-to collaborators of the memory spacer
pub use crate::pipeline::{PointsTo, SitePointsTo, TypePointsTo};

/// Library call desugaring
pub use crate::desugar::{AdapterRegistry, CallKey, Desugarer};

// ================================================================================================
// Checking and Solving
// ================================================================================================

/// Reachability queries
pub use crate::checker::{Checker, DiagnosticsSink, MemorySink, ProgramPoint, StateSupplier};

/// Solving
pub use crate::solver::{BoundedSolver, Model, SolverBackend, SolverResult, Value};

/// SMT backend
#[cfg(feature = "z3")]
pub use crate::solver::Z3Solver;
