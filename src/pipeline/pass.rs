//! Pass trait and the context shared by all rewrite passes.
//!
//! This module defines the `StatePass` trait that every rewrite pass implements, and the
//! [`PassContext`] handed to each pass invocation.

use crate::{
    pipeline::{spacing::PointsTo, EventLog},
    state::PredicateState,
    term::TermFactory,
    Result,
};

/// Shared, read-only inputs of a pass invocation.
///
/// The context borrows the session's term factory (passes that build new terms go
/// through it so interning and fresh names stay session-scoped), the event log changes
/// are recorded into, and the points-to collaborator consulted by memory spacing.
pub struct PassContext<'a> {
    /// Term factory of the checking session.
    pub factory: &'a TermFactory,
    /// Change log.
    pub events: &'a EventLog,
    /// Allocation provenance of memory bases.
    pub points_to: &'a dyn PointsTo,
}

impl<'a> PassContext<'a> {
    /// Creates a new context.
    ///
    /// # Arguments
    ///
    /// * `factory` - The session's term factory.
    /// * `events` - The log that passes record their changes into.
    /// * `points_to` - The points-to approximation used for memory spacing.
    ///
    /// # Returns
    ///
    /// A new `PassContext` borrowing its arguments.
    #[must_use]
    pub fn new(
        factory: &'a TermFactory,
        events: &'a EventLog,
        points_to: &'a dyn PointsTo,
    ) -> Self {
        Self {
            factory,
            events,
            points_to,
        }
    }
}

/// A rewrite pass over predicate states.
///
/// Passes are pure: `run` must return a state describing exactly the same set of
/// concrete executions as its input, and must return a structurally equal state when it
/// has nothing to do. All passes must be thread-safe (Send + Sync) so one pipeline can be
/// shared by parallel queries.
///
/// # Pipeline Integration
///
/// Passes don't declare their own ordering. The [`PassPipeline`](crate::pipeline::PassPipeline)
/// runs them in a fixed order, each expecting the normal form left by its predecessor:
///
/// 1. **Optimizer**: tautologies, dead generated assignments, infeasible branches
/// 2. **Constant propagation**: literal substitution within a path
/// 3. **Memory spacing**: region discriminators from the points-to collaborator
/// 4. **Simplification**: algebraic identities and quantifier collapsing
pub trait StatePass: Send + Sync {
    /// Returns the unique name of this pass.
    ///
    /// Used for logging, event attribution and debugging.
    fn name(&self) -> &'static str;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Rewrites a state.
    ///
    /// # Arguments
    ///
    /// * `state` - The state to rewrite.
    /// * `ctx` - The pass context.
    ///
    /// # Returns
    ///
    /// The rewritten state. Changes are recorded in `ctx.events`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass fails to rebuild a term.
    fn run(&self, state: &PredicateState, ctx: &PassContext<'_>) -> Result<PredicateState>;
}
