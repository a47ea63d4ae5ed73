//! Library-call desugaring.
//!
//! States produced by static analysis keep calls into library code as opaque call
//! predicates. This module replaces the calls it has models for by predicate states that
//! describe their effect, so that the rest of the engine only ever sees memory accesses,
//! arithmetic and (for the opaque string model) string terms.
//!
//! # Architecture
//!
//! - [`CallKey`] - Declaring class plus full method signature
//! - [`AdapterRegistry`] - Exact-key map from calls to their [`Adapter`]
//! - [`Desugarer`] - The pass applying the registry to a whole state
//! - [`inline_call_terms`] - Rewrites calls nested inside lambda bodies
//! - [`string`] - The two string models and their adapter tables
//!
//! # Registering a model
//!
//! ```rust
//! use pathscope::{
//!     config::StringStrategy,
//!     desugar::{AdapterRegistry, CallKey, CallSite, DesugarContext, Desugarer},
//!     state::PredicateState,
//!     term::{MethodSignature, TermType},
//!     Error,
//! };
//!
//! fn hash_code(ctx: &DesugarContext<'_>, site: &CallSite<'_>) -> pathscope::Result<PredicateState> {
//!     let mut builder = ctx.builder(site);
//!     if let Some(lhv) = site.lhv {
//!         builder.assume(&ctx.factory.ge(lhv, &ctx.factory.int(i64::from(i32::MIN)))?)?;
//!     }
//!     Ok(builder.build())
//! }
//!
//! let mut registry = AdapterRegistry::for_strategy(StringStrategy::Opaque)?;
//! let key = CallKey::new(
//!     "java/lang/String",
//!     MethodSignature::new("hashCode", vec![], TermType::INT),
//! );
//! registry.register(key.clone(), hash_code)?;
//! assert!(matches!(registry.register(key, hash_code), Err(Error::DuplicateAdapter(_))));
//!
//! let desugarer = Desugarer::new(registry, StringStrategy::Opaque);
//! assert!(desugarer.registry().len() > 1);
//! # Ok::<(), pathscope::Error>(())
//! ```

mod desugarer;
mod inline;
mod key;
mod registry;
pub mod string;

pub use desugarer::Desugarer;
pub use inline::inline_call_terms;
pub use key::CallKey;
pub use registry::{Adapter, AdapterRegistry, CallSite, DesugarContext};
