//! Predicate states: the tree-shaped record of effects and branch conditions leading to a
//! program point.
//!
//! # Key Components
//!
//! - [`Predicate`] - An assignment, store, call, assumption or path condition
//! - [`PredicateState`] - Blocks, sequences and choices of predicates
//! - [`StateBuilder`] - Incremental, type-checked construction
//! - [`PredicateTypes`] - Filter sets used to project states (e.g. path conditions only)

mod builder;
mod predicate;
mod tree;

pub use builder::StateBuilder;
pub use predicate::{Location, Predicate, PredicateKind, PredicateType, PredicateTypes};
pub use tree::{PredicateState, Segment};
