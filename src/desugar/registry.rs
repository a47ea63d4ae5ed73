//! Adapter registration and lookup.
//!
//! An adapter is a plain function that models one library method: given the call site, it
//! returns the predicate state that replaces the call predicate. Adapters are registered
//! under explicit [`CallKey`]s; resolution is a single map lookup on the call's declaring
//! class and signature, with no subtype search.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::{
    config::StringStrategy,
    desugar::{
        string::{opaque, structural},
        CallKey,
    },
    state::{Location, Predicate, PredicateKind, PredicateState, StateBuilder},
    term::{MethodRef, Term, TermFactory, TermKind, TermType},
    Error, Result,
};

/// Models one library method.
pub type Adapter = fn(&DesugarContext<'_>, &CallSite<'_>) -> Result<PredicateState>;

/// Collaborators available to adapters.
#[derive(Clone, Copy)]
pub struct DesugarContext<'a> {
    /// Factory for every term the adapter builds.
    pub factory: &'a TermFactory,
}

impl<'a> DesugarContext<'a> {
    /// Creates a context.
    #[must_use]
    pub fn new(factory: &'a TermFactory) -> Self {
        DesugarContext { factory }
    }

    /// A state builder that stamps predicates with the call site's location.
    #[must_use]
    pub fn builder(&self, site: &CallSite<'_>) -> StateBuilder {
        let mut builder = StateBuilder::new();
        builder.at(site.location.clone());
        builder
    }
}

/// A call predicate taken apart for an adapter.
#[derive(Debug, Clone, Copy)]
pub struct CallSite<'a> {
    /// Result variable, if the result is used.
    pub lhv: Option<&'a Term>,
    /// Receiver.
    pub owner: &'a Term,
    /// Invoked method.
    pub method: &'a MethodRef,
    /// Arguments, excluding the receiver.
    pub args: &'a [Term],
    /// Location of the call predicate.
    pub location: &'a Location,
}

impl<'a> CallSite<'a> {
    /// Returns the call site of a call predicate, or `None` for any other predicate.
    #[must_use]
    pub fn of(predicate: &'a Predicate) -> Option<Self> {
        let PredicateKind::Call { lhv, call } = predicate.kind() else {
            return None;
        };
        let TermKind::Call {
            owner,
            method,
            args,
        } = call.kind()
        else {
            return None;
        };
        Some(CallSite {
            lhv: lhv.as_ref(),
            owner,
            method,
            args,
            location: predicate.location(),
        })
    }

    /// The argument at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Arity`] if the call has fewer arguments.
    pub fn arg(&self, index: usize) -> Result<&'a Term> {
        self.args.get(index).ok_or(Error::Arity {
            operation: "adapter",
            expected: index + 1,
            found: self.args.len(),
        })
    }

    /// The variable receiving the result: the call's own result variable, or a fresh
    /// generated one when the result is discarded.
    #[must_use]
    pub fn result(&self, factory: &TermFactory, ty: TermType) -> Term {
        match self.lhv {
            Some(lhv) => lhv.clone(),
            None => factory.fresh_var("res", ty),
        }
    }
}

/// Maps call keys to adapters.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: FxHashMap<CallKey, Adapter>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}

impl AdapterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the string adapters of `strategy`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateAdapter`] if the strategy registers a key twice.
    pub fn for_strategy(strategy: StringStrategy) -> Result<Self> {
        let mut registry = Self::new();
        match strategy {
            StringStrategy::Structural => structural::register(&mut registry)?,
            StringStrategy::Opaque => opaque::register(&mut registry)?,
        }
        Ok(registry)
    }

    /// Registers an adapter.
    ///
    /// # Arguments
    ///
    /// * `key` - The method the adapter models.
    /// * `adapter` - The model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateAdapter`] if `key` already has an adapter; the registry
    /// is left unchanged.
    pub fn register(&mut self, key: CallKey, adapter: Adapter) -> Result<()> {
        if self.adapters.contains_key(&key) {
            return Err(Error::DuplicateAdapter(key.to_string()));
        }
        self.adapters.insert(key, adapter);
        Ok(())
    }

    /// Returns the adapter registered for `method`.
    #[must_use]
    pub fn resolve(&self, method: &MethodRef) -> Option<Adapter> {
        self.adapters.get(&CallKey::from(method)).copied()
    }

    /// Returns `true` if `key` has an adapter.
    #[must_use]
    pub fn contains(&self, key: &CallKey) -> bool {
        self.adapters.contains_key(key)
    }

    /// Registered keys in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<&CallKey> {
        let mut keys: Vec<&CallKey> = self.adapters.keys().collect();
        keys.sort();
        keys
    }

    /// Number of registered adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{MethodSignature, STRING_CLASS};

    fn nothing(_: &DesugarContext<'_>, _: &CallSite<'_>) -> Result<PredicateState> {
        Ok(PredicateState::empty())
    }

    fn hash_code() -> MethodRef {
        MethodRef::new(
            STRING_CLASS,
            MethodSignature::new("hashCode", vec![], TermType::INT),
        )
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = AdapterRegistry::new();
        let key = CallKey::from(&hash_code());
        registry.register(key.clone(), nothing).unwrap();
        assert!(matches!(
            registry.register(key, nothing),
            Err(Error::DuplicateAdapter(_))
        ));
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve(&hash_code()).is_some());
    }

    #[test]
    fn test_strategies_register_without_conflict() {
        let structural = AdapterRegistry::for_strategy(StringStrategy::Structural).unwrap();
        let opaque = AdapterRegistry::for_strategy(StringStrategy::Opaque).unwrap();
        assert!(!structural.is_empty());
        assert!(opaque.len() > structural.len());
        assert!(structural.resolve(&hash_code()).is_none());
    }

    #[test]
    fn test_call_site_of_predicate() {
        let tf = TermFactory::new();
        let s = tf.var("s", TermType::string());
        let n = tf.var("n", TermType::INT);
        let length = MethodRef::new(
            STRING_CLASS,
            MethodSignature::new("length", vec![], TermType::INT),
        );
        let call = tf.call(&s, &length, &[]).unwrap();
        let predicate = Predicate::call(Some(&n), &call).unwrap();

        let site = CallSite::of(&predicate).unwrap();
        assert_eq!(site.owner, &s);
        assert_eq!(site.lhv, Some(&n));
        assert!(matches!(site.arg(0), Err(Error::Arity { .. })));
        assert!(CallSite::of(&Predicate::path(&tf.bool(true)).unwrap()).is_none());
    }
}
