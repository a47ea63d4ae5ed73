// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # pathscope
//!
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/pathscope/blob/main/LICENSE-APACHE)
//!
//! A symbolic reachability engine for statically analyzed Java-like bytecode. A static
//! analysis describes every execution reaching a program point as a predicate state;
//! `pathscope` rewrites that state into a solver-friendly shape and decides whether the
//! point can be reached at all.
//!
//! ## Features
//!
//! - **Typed terms** - Hash-consed symbolic terms with construction-time type checking
//! - **Predicate states** - Immutable sequence/choice trees of assignments, stores,
//!   calls, assumptions and path conditions
//! - **Rewrite pipeline** - Optimizer, constant propagation, memory spacing and
//!   simplification, iterated to a fixpoint with an event log
//! - **String desugaring** - `java/lang/String` calls expanded either into a heap model
//!   over `char[]` or into atomic string operations, through a pluggable adapter registry
//! - **Reachability checking** - One solver call per query, parallel batches, structured
//!   diagnostics
//! - **Solvers** - A bounded enumerative backend and, with the `z3` feature, an SMT backend
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! pathscope = "0.1"
//! ```
//!
//! ```rust
//! use pathscope::prelude::*;
//!
//! let session = Session::new();
//! let tf = session.factory();
//! let x = tf.var("x", TermType::INT);
//!
//! let mut builder = StateBuilder::new();
//! builder
//!     .path(&tf.gt(&x, &tf.int(10))?)?
//!     .path(&tf.lt(&x, &tf.int(12))?)?;
//!
//! let point = ProgramPoint::new("Main.run", 7);
//! let mut states = std::collections::HashMap::new();
//! states.insert(point.clone(), builder.build());
//!
//! let checker = Checker::new(session.clone(), states, CheckerConfig::default())?;
//! let result = checker.check_reachable(&point)?;
//! assert_eq!(result.model().and_then(|m| m.int("x")), Some(11));
//! # Ok::<(), pathscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`term`] - Terms, types and the [`term::TermFactory`]
//! - [`state`] - Predicates, [`state::PredicateState`] and [`state::StateBuilder`]
//! - [`pipeline`] - Rewrite passes and the fixpoint scheduler
//! - [`desugar`] - Library call desugaring and the string models
//! - [`solver`] - Backends and models
//! - [`checker`] - Reachability queries
//!
//! A query flows from the [`checker::StateSupplier`] through the
//! [`desugar::Desugarer`] and the [`pipeline::PassPipeline`] into a
//! [`solver::SolverBackend`]:
//!
//! ```text
//! supplier -> desugar -> pipeline (full) -> path projection -> pipeline (path) -> backend
//! ```
//!
//! ## Error Handling
//!
//! Construction of ill-typed terms and predicates fails immediately with an [`Error`].
//! Reachability queries never fail: missing states, unmodeled calls and solver limits all
//! end in [`SolverResult::Unknown`] with a reason.
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade. Pass decisions are logged at `debug`,
//! complete states at `trace`.
//!
//! ## Thread Safety
//!
//! Terms, states and the [`Checker`] are `Send + Sync`. [`Checker::check_many`] runs its
//! queries on the rayon thread pool.
#[macro_use]
pub(crate) mod error;

mod session;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use pathscope::prelude::*;
///
/// let session = Session::new();
/// let s = session.factory().var("s", TermType::string());
/// assert!(s.ty().is_reference());
/// ```
pub mod prelude;

/// Configuration of the checker, the pipeline and the solvers.
pub mod config;

/// Symbolic terms.
///
/// Every term is built by a [`term::TermFactory`], which type-checks operands, interns
/// structurally equal terms and hands out fresh names.
///
/// # Examples
///
/// ```rust
/// use pathscope::{term::TermType, Session};
///
/// let session = Session::new();
/// let tf = session.factory();
/// let x = tf.var("x", TermType::INT);
/// let sum = tf.add(&x, &tf.int(1))?;
/// assert_eq!(sum.to_string(), "(x + 1)");
/// # Ok::<(), pathscope::Error>(())
/// ```
pub mod term;

/// Predicates and predicate states.
pub mod state;

/// Rewrite passes over predicate states.
pub mod pipeline;

/// Desugaring of library calls into primitive predicates.
pub mod desugar;

/// Solving backends and satisfying models.
pub mod solver;

/// Reachability checking of program points.
pub mod checker;

/// `pathscope` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `pathscope` Error type
///
/// # Examples
///
/// ```rust
/// use pathscope::{term::TermType, Error, Session};
///
/// let session = Session::new();
/// let tf = session.factory();
/// match tf.lt(&tf.bool(true), &tf.int(1)) {
///     Err(Error::TypeMismatch { .. }) => {}
///     other => panic!("unexpected: {other:?}"),
/// }
/// ```
pub use error::Error;

/// The context of a checking session.
pub use session::Session;

/// Checker configuration.
pub use config::{CheckerConfig, PipelineConfig, SolverConfig, StringStrategy};

/// Reachability checker entry point.
pub use checker::Checker;

/// Verdict of a reachability query.
pub use solver::SolverResult;
