//! Semantics-preserving rewrites of predicate states.
//!
//! Every pass maps a state to an equivalent one (the same set of concrete executions)
//! that is smaller or easier to encode. The [`PassPipeline`] runs the passes in a fixed
//! order until the state stops changing.
//!
//! # Architecture
//!
//! - [`StatePass`] - The pass trait; passes are stateless and thread-safe
//! - [`PassContext`] - Term factory, event log and points-to collaborator of one run
//! - [`PassPipeline`] - Fixpoint scheduler
//! - [`EventLog`] - Append-only record of every change a pass makes
//!
//! # Passes
//!
//! | Pass | Purpose |
//! |------|---------|
//! | [`Optimizer`] | Tautologies, dead generated assignments, infeasible branches |
//! | [`ConstantPropagator`] | Literal substitution within a path, constant folding |
//! | [`MemorySpacer`] | Non-aliasing memory regions from a [`PointsTo`] approximation |
//! | [`Simplifier`] | Algebraic identities, trivial quantifiers |
//!
//! # Example
//!
//! ```rust
//! use pathscope::{
//!     pipeline::{EventLog, PassContext, PassPipeline, TypePointsTo},
//!     state::StateBuilder,
//!     term::TermType,
//!     Session,
//! };
//!
//! let session = Session::new();
//! let tf = session.factory();
//! let x = tf.var("x", TermType::INT);
//!
//! let mut builder = StateBuilder::new();
//! builder.path(&tf.gt(&tf.add(&x, &tf.int(0))?, &tf.mul(&tf.int(2), &tf.int(3))?)?)?;
//!
//! let events = EventLog::new();
//! let ctx = PassContext::new(tf, &events, &TypePointsTo);
//! let result = PassPipeline::default().run(&builder.build(), &ctx)?;
//! assert_eq!(result.to_string(), "(\n  @P (x > 6)\n)");
//! # Ok::<(), pathscope::Error>(())
//! ```

mod events;
mod optimizer;
mod pass;
mod propagation;
mod scheduler;
mod simplifier;
mod spacing;

pub use events::{Event, EventKind, EventLog, EventRecorder};
pub use optimizer::Optimizer;
pub use pass::{PassContext, StatePass};
pub use propagation::ConstantPropagator;
pub use scheduler::PassPipeline;
pub use simplifier::Simplifier;
pub use spacing::{AllocationTag, MemorySpacer, PointsTo, SitePointsTo, TypePointsTo};
