//! Fixpoint scheduling of the rewrite passes.
//!
//! The `PassPipeline` runs its passes in a fixed order, normalizing the state after every
//! pass, and repeats the whole sequence until a round leaves the state unchanged. The
//! result is therefore a normal form: running the pipeline on its own output returns a
//! structurally equal state.

use crate::{
    config::PipelineConfig,
    pipeline::{
        ConstantPropagator, MemorySpacer, Optimizer, PassContext, Simplifier, StatePass,
    },
    state::PredicateState,
    Error, Result,
};

/// Orchestrates rewrite pass execution.
///
/// The standard pipeline runs:
///
/// 1. **Optimizer**: tautologies, dead generated assignments, infeasible branches
/// 2. **Constant propagation**: literal substitution and folding
/// 3. **Memory spacing**: region discriminators from the points-to collaborator
/// 4. **Simplification**: algebraic identities and quantifier collapsing
///
/// Each round runs every pass once. Rounds repeat until no pass changes the state or
/// `max_iterations` rounds have run.
pub struct PassPipeline {
    /// Maximum rounds before stopping.
    max_iterations: usize,
    /// Passes in execution order.
    passes: Vec<Box<dyn StatePass>>,
}

impl Default for PassPipeline {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl PassPipeline {
    /// Creates an empty pipeline.
    ///
    /// # Arguments
    ///
    /// * `max_iterations` - Maximum rounds before stopping.
    ///
    /// # Returns
    ///
    /// A new `PassPipeline` without passes. It still normalizes state structure.
    #[must_use]
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            passes: Vec::new(),
        }
    }

    /// Creates the standard pipeline with the passes enabled in `config`.
    ///
    /// # Arguments
    ///
    /// * `config` - Iteration limit and per-pass enable flags.
    ///
    /// # Returns
    ///
    /// A new `PassPipeline` with the enabled passes in their fixed order.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut pipeline = Self::new(config.max_iterations);
        if config.enable_optimizer {
            pipeline.add_pass(Box::new(Optimizer));
        }
        if config.enable_constant_propagation {
            pipeline.add_pass(Box::new(ConstantPropagator));
        }
        if config.enable_memory_spacing {
            pipeline.add_pass(Box::new(MemorySpacer));
        }
        if config.enable_simplifier {
            pipeline.add_pass(Box::new(Simplifier));
        }
        pipeline
    }

    /// Appends a pass to the end of each round.
    pub fn add_pass(&mut self, pass: Box<dyn StatePass>) {
        self.passes.push(pass);
    }

    /// Appends a pass (builder pattern).
    #[must_use]
    pub fn with_pass(mut self, pass: Box<dyn StatePass>) -> Self {
        self.add_pass(pass);
        self
    }

    /// Names of the passes in execution order.
    #[must_use]
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Maximum rounds before stopping.
    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Runs the pipeline to fixpoint.
    ///
    /// # Arguments
    ///
    /// * `state` - The state to rewrite.
    /// * `ctx` - The pass context shared by all passes.
    ///
    /// # Returns
    ///
    /// The normalized, rewritten state.
    ///
    /// # Errors
    ///
    /// Construction errors raised by a pass are returned unchanged; any other failure is
    /// wrapped in [`Error::Pipeline`] naming the pass.
    pub fn run(&self, state: &PredicateState, ctx: &PassContext<'_>) -> Result<PredicateState> {
        let mut current = state.normalize();
        if self.passes.is_empty() {
            return Ok(current);
        }

        for iteration in 0..self.max_iterations {
            let changed = self.run_passes_once(&mut current, ctx)?;
            if !changed {
                log::trace!("pipeline stable after {} rounds", iteration + 1);
                return Ok(current);
            }
        }

        log::warn!(
            "pipeline did not stabilize within {} rounds ({} predicates left)",
            self.max_iterations,
            current.size()
        );
        Ok(current)
    }

    /// Runs every pass once, in order.
    ///
    /// # Arguments
    ///
    /// * `state` - The state, replaced by each pass's normalized output.
    /// * `ctx` - The pass context.
    ///
    /// # Returns
    ///
    /// `true` if any pass changed the state, `false` otherwise.
    fn run_passes_once(&self, state: &mut PredicateState, ctx: &PassContext<'_>) -> Result<bool> {
        let mut changed = false;
        for pass in &self.passes {
            let next = pass
                .run(state, ctx)
                .map_err(|err| {
                    if err.is_construction_error() {
                        err
                    } else {
                        Error::Pipeline {
                            pass: pass.name(),
                            message: err.to_string(),
                        }
                    }
                })?
                .normalize();
            if next != *state {
                log::trace!("{} changed the state ({} predicates)", pass.name(), next.size());
                *state = next;
                changed = true;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::{EventKind, EventLog, TypePointsTo},
        state::StateBuilder,
        term::{TermFactory, TermType},
    };

    #[test]
    fn test_standard_order() {
        let pipeline = PassPipeline::default();
        assert_eq!(
            pipeline.pass_names(),
            vec!["optimizer", "constant-propagation", "memory-spacing", "simplifier"]
        );
        let none = PassPipeline::from_config(&PipelineConfig::disabled());
        assert!(none.pass_names().is_empty());
    }

    #[test]
    fn test_reaches_fixpoint() {
        let tf = TermFactory::new();
        let x = tf.var("x", TermType::INT);
        let t = tf.fresh_var("t", TermType::INT);
        let u = tf.fresh_var("u", TermType::INT);

        // t = 1; u = t + 1; path (x > u) && (u == 2)
        let mut builder = StateBuilder::new();
        builder
            .state(&t, &tf.int(1))
            .unwrap()
            .state(&u, &tf.add(&t, &tf.int(1)).unwrap())
            .unwrap()
            .path(
                &tf.and(
                    &tf.gt(&x, &u).unwrap(),
                    &tf.eq(&u, &tf.int(2)).unwrap(),
                )
                .unwrap(),
            )
            .unwrap();
        let state = builder.build();

        let events = EventLog::new();
        let points_to = TypePointsTo;
        let ctx = PassContext::new(&tf, &events, &points_to);
        let pipeline = PassPipeline::default();
        let result = pipeline.run(&state, &ctx).unwrap();

        let rendered: Vec<String> = result.predicates().iter().map(|p| p.to_string()).collect();
        assert_eq!(rendered, vec!["@P (x > 2)"]);
        assert!(events.count(EventKind::ConstantPropagated) > 0);
        assert!(events.count(EventKind::PredicateRemoved) > 0);

        let again = pipeline.run(&result, &ctx).unwrap();
        assert_eq!(again, result);
    }
}
