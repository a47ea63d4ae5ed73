//! Configuration for the reachability checker.
//!
//! This module provides configuration types for controlling the rewrite pipeline, the
//! string modeling strategy and the resource bounds of the solving backend.

use std::time::Duration;

/// How string library calls are modeled during desugaring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display)]
pub enum StringStrategy {
    /// Strings are heap records with a `value: char[]` field; operations become
    /// quantified formulas over the character arrays.
    #[default]
    Structural,
    /// Strings are atomic values manipulated through the string term vocabulary.
    Opaque,
}

/// Configuration for the rewrite pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum rounds of the fixpoint loop (default: 16).
    pub max_iterations: usize,

    /// Enable the optimizer (tautology removal, dead generated assignments, branch pruning).
    pub enable_optimizer: bool,

    /// Enable constant propagation.
    pub enable_constant_propagation: bool,

    /// Enable memory spacing.
    pub enable_memory_spacing: bool,

    /// Enable term simplification.
    pub enable_simplifier: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 16,
            enable_optimizer: true,
            enable_constant_propagation: true,
            enable_memory_spacing: true,
            enable_simplifier: true,
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with every pass disabled.
    ///
    /// The pipeline then only normalizes the state structure.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enable_optimizer: false,
            enable_constant_propagation: false,
            enable_memory_spacing: false,
            enable_simplifier: false,
            ..Self::default()
        }
    }

    /// Returns true if any pass is enabled.
    #[must_use]
    pub fn any_enabled(&self) -> bool {
        self.enable_optimizer
            || self.enable_constant_propagation
            || self.enable_memory_spacing
            || self.enable_simplifier
    }
}

/// Resource bounds of the solving backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverConfig {
    /// Wall-clock budget of one query (default: 5s). Passed unchanged to the backend.
    pub timeout: Duration,

    /// Maximum number of distinct branch combinations explored (default: 4096).
    pub max_paths: usize,

    /// Maximum number of executions tried (default: 100 000).
    pub max_search_nodes: usize,

    /// Largest array length chosen for input arrays and accepted for allocations
    /// (default: 8).
    pub max_array_length: usize,

    /// Maximum number of candidate values tried per integer input (default: 16).
    pub int_candidates: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_paths: 4096,
            max_search_nodes: 100_000,
            max_array_length: 8,
            int_candidates: 16,
        }
    }
}

/// Configuration for the reachability checker.
///
/// Controls the rewrite pipeline, the string modeling strategy and the solving bounds.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use pathscope::{CheckerConfig, StringStrategy};
///
/// let config = CheckerConfig::thorough()
///     .with_string_strategy(StringStrategy::Opaque)
///     .with_timeout(Duration::from_secs(1));
/// assert_eq!(config.solver.timeout, Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckerConfig {
    /// Rewrite pipeline settings.
    pub pipeline: PipelineConfig,

    /// String modeling strategy used by the desugarer.
    pub strings: StringStrategy,

    /// Solving backend bounds.
    pub solver: SolverConfig,
}

impl CheckerConfig {
    /// Creates a new configuration with default settings.
    ///
    /// # Returns
    ///
    /// A new `CheckerConfig` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a "fast" configuration for quick answers.
    ///
    /// This configuration uses:
    /// - Fewer pipeline rounds (4 max)
    /// - A 500ms solving budget
    /// - Short arrays and few integer candidates
    ///
    /// # Returns
    ///
    /// A new `CheckerConfig` optimized for speed over thoroughness.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            pipeline: PipelineConfig {
                max_iterations: 4,
                ..PipelineConfig::default()
            },
            solver: SolverConfig {
                timeout: Duration::from_millis(500),
                max_paths: 256,
                max_search_nodes: 10_000,
                max_array_length: 4,
                int_candidates: 8,
            },
            ..Self::default()
        }
    }

    /// Creates a "thorough" configuration for conclusive answers.
    ///
    /// This configuration uses:
    /// - More pipeline rounds (64 max)
    /// - A 30s solving budget
    /// - Longer arrays and more integer candidates
    ///
    /// # Returns
    ///
    /// A new `CheckerConfig` optimized for thoroughness over speed.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            pipeline: PipelineConfig {
                max_iterations: 64,
                ..PipelineConfig::default()
            },
            solver: SolverConfig {
                timeout: Duration::from_secs(30),
                max_paths: 65_536,
                max_search_nodes: 1_000_000,
                max_array_length: 16,
                int_candidates: 32,
            },
            ..Self::default()
        }
    }

    /// Sets the maximum number of pipeline rounds.
    ///
    /// # Arguments
    ///
    /// * `max` - The maximum number of fixpoint iterations.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.pipeline.max_iterations = max;
        self
    }

    /// Replaces the pipeline settings.
    ///
    /// # Arguments
    ///
    /// * `pipeline` - The pipeline configuration.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Selects the string modeling strategy.
    ///
    /// # Arguments
    ///
    /// * `strategy` - Structural or opaque string modeling.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_string_strategy(mut self, strategy: StringStrategy) -> Self {
        self.strings = strategy;
        self
    }

    /// Sets the solving budget of one query.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Wall-clock budget handed to the backend.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.solver.timeout = timeout;
        self
    }

    /// Replaces the solver bounds.
    ///
    /// # Arguments
    ///
    /// * `solver` - The solver configuration.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_order_bounds() {
        let fast = CheckerConfig::fast();
        let default = CheckerConfig::default();
        let thorough = CheckerConfig::thorough();
        assert!(fast.solver.timeout < default.solver.timeout);
        assert!(default.solver.timeout < thorough.solver.timeout);
        assert!(fast.pipeline.max_iterations < thorough.pipeline.max_iterations);
        assert_eq!(default.strings, StringStrategy::Structural);
    }

    #[test]
    fn test_disabled_pipeline() {
        let config = PipelineConfig::disabled();
        assert!(!config.any_enabled());
        assert!(PipelineConfig::default().any_enabled());
    }
}
