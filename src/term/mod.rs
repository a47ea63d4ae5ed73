//! Symbolic terms: the value vocabulary of predicate states.
//!
//! A [`Term`] is an immutable, structurally compared expression with a static
//! [`TermType`]. Terms are built exclusively through a [`TermFactory`], which type checks
//! every construction and interns the results.
//!
//! # Key Components
//!
//! - [`Term`] / [`TermKind`] - The expression DAG
//! - [`TermType`] - Static semantic types (booleans, sized integers, references, arrays)
//! - [`TermFactory`] - Fail-fast typed construction, interning and fresh names
//! - [`MemRef`] / [`MemorySpace`] - Memory cells and the regions assigned by spacing
//! - [`visit`] - Memoized traversal, substitution and free-variable collection

mod factory;
mod literal;
mod node;
mod ops;
mod types;
pub mod visit;

pub use factory::TermFactory;
pub use literal::Literal;
pub use node::{
    AllocSite, FieldRef, MemRef, MemorySpace, MethodRef, MethodSignature, Term, TermKind, VarId,
};
pub use ops::{BinaryOp, CmpOp, StrOp, UnaryOp};
pub use types::{IntType, TermType, CHAR_SEQUENCE_CLASS, OBJECT_CLASS, STRING_CLASS};
