//! The desugaring pass.
//!
//! Replaces library call predicates by their models, in place: the predicates before a
//! call stay before its expansion and the predicates after it stay after. Calls without
//! a model are kept unchanged, so their results remain unconstrained.
//!
//! Under the structural string strategy, string literals are heap objects too. Every
//! literal operand is materialized right before the predicate reading it as a fresh
//! `String` whose `value` holds the literal's characters.

use rustc_hash::FxHashMap;

use crate::{
    config::StringStrategy,
    desugar::{inline, AdapterRegistry, CallSite, DesugarContext},
    pipeline::{EventKind, PassContext, StatePass},
    state::{Predicate, PredicateKind, PredicateState, Segment},
    term::{visit, Literal, Term, TermFactory, TermKind, TermType},
    Result,
};

const NAME: &str = "desugar";

/// Rewrites library calls into the predicates that model them.
///
/// # Example
///
/// ```rust
/// use pathscope::{
///     config::StringStrategy,
///     desugar::{string::StringMethod, Desugarer},
///     pipeline::{EventKind, EventLog, PassContext, StatePass, TypePointsTo},
///     state::StateBuilder,
///     term::TermType,
///     Session,
/// };
///
/// let session = Session::new();
/// let tf = session.factory();
/// let s = tf.var("s", TermType::string());
/// let n = tf.var("n", TermType::INT);
///
/// let mut builder = StateBuilder::new();
/// builder.call(Some(&n), &tf.call(&s, &StringMethod::Length.method_ref(), &[])?)?;
///
/// let events = EventLog::new();
/// let ctx = PassContext::new(tf, &events, &TypePointsTo);
/// let desugared = Desugarer::for_strategy(StringStrategy::Opaque)?.run(&builder.build(), &ctx)?;
/// assert_eq!(events.count(EventKind::CallDesugared), 1);
/// assert!(desugared.to_string().contains("n = length(s)"));
/// # Ok::<(), pathscope::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Desugarer {
    registry: AdapterRegistry,
    strategy: StringStrategy,
}

impl Desugarer {
    /// Creates a desugarer over an explicit registry.
    ///
    /// # Arguments
    ///
    /// * `registry` - The adapters to apply.
    /// * `strategy` - The string model used for nested calls and literals.
    #[must_use]
    pub fn new(registry: AdapterRegistry, strategy: StringStrategy) -> Self {
        Desugarer { registry, strategy }
    }

    /// Creates a desugarer with the string adapters of `strategy`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateAdapter`](crate::Error::DuplicateAdapter) if the strategy
    /// registers a key twice.
    pub fn for_strategy(strategy: StringStrategy) -> Result<Self> {
        Ok(Self::new(AdapterRegistry::for_strategy(strategy)?, strategy))
    }

    /// The registered adapters.
    #[must_use]
    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// The string model.
    #[must_use]
    pub fn strategy(&self) -> StringStrategy {
        self.strategy
    }

    fn desugar(&self, state: &PredicateState, ctx: &PassContext<'_>) -> Result<PredicateState> {
        let mut result = PredicateState::empty();
        let mut block = Vec::new();
        for segment in state.segments() {
            match segment {
                Segment::Block(predicates) => {
                    for predicate in predicates {
                        if let Some(expanded) = self.rewrite(predicate, &mut block, ctx)? {
                            result = result.append(std::mem::take(&mut block)).then(&expanded);
                        }
                    }
                }
                Segment::Choice(branches) => {
                    let mut rewritten = Vec::with_capacity(branches.len());
                    for branch in branches {
                        rewritten.push(self.desugar(branch, ctx)?);
                    }
                    result = result
                        .append(std::mem::take(&mut block))
                        .then(&PredicateState::choice(rewritten));
                }
            }
        }
        Ok(result.append(block))
    }

    /// Pushes the rewritten predicate onto `block`, or returns the state replacing it
    /// when the predicate is a modeled call. Literal materializations always go to
    /// `block` first.
    fn rewrite(
        &self,
        predicate: &Predicate,
        block: &mut Vec<Predicate>,
        ctx: &PassContext<'_>,
    ) -> Result<Option<PredicateState>> {
        let tf = ctx.factory;
        let predicate = match self.strategy {
            StringStrategy::Structural => materialize_literals(predicate, block, tf)?,
            StringStrategy::Opaque => predicate.clone(),
        };
        let predicate = self.inline_nested(&predicate, tf)?;

        let Some(site) = CallSite::of(&predicate) else {
            block.push(predicate.clone());
            return Ok(None);
        };
        let Some(adapter) = self.registry.resolve(site.method) else {
            log::debug!("no model for {}, keeping the call", site.method);
            ctx.events
                .record(EventKind::CallPassedThrough)
                .pass(NAME)
                .at(predicate.location())
                .message(site.method);
            block.push(predicate.clone());
            return Ok(None);
        };

        let expanded = adapter(&DesugarContext::new(tf), &site)?;
        log::debug!("desugared {predicate} into {} predicates", expanded.size());
        ctx.events
            .record(EventKind::CallDesugared)
            .pass(NAME)
            .at(predicate.location())
            .message(&predicate);
        Ok(Some(expanded))
    }

    /// Inlines calls nested in the operands. The call term of a call predicate itself is
    /// left for the adapters; only its receiver and arguments are searched.
    fn inline_nested(&self, predicate: &Predicate, tf: &TermFactory) -> Result<Predicate> {
        if !predicate.operands().into_iter().any(inline::has_call) {
            return Ok(predicate.clone());
        }
        let strategy = self.strategy;
        let PredicateKind::Call { lhv, call } = predicate.kind() else {
            return predicate.try_map_operands(|t| inline::inline_call_terms(t, tf, strategy));
        };
        let TermKind::Call {
            owner,
            method,
            args,
        } = call.kind()
        else {
            return Err(malformed_error!("call predicate without a call term: {}", predicate));
        };
        let owner = inline::inline_call_terms(owner, tf, strategy)?;
        let args = args
            .iter()
            .map(|arg| inline::inline_call_terms(arg, tf, strategy))
            .collect::<Result<Vec<_>>>()?;
        let call = tf.call(&owner, method, &args)?;
        Ok(predicate.with_kind(PredicateKind::Call {
            lhv: lhv.clone(),
            call,
        }))
    }
}

impl StatePass for Desugarer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Replaces library calls by the predicates modeling them"
    }

    fn run(&self, state: &PredicateState, ctx: &PassContext<'_>) -> Result<PredicateState> {
        self.desugar(state, ctx)
    }
}

/// Replaces the string literals among the operands of `predicate` by fresh structural
/// strings, pushing their construction onto `block`.
fn materialize_literals(
    predicate: &Predicate,
    block: &mut Vec<Predicate>,
    tf: &TermFactory,
) -> Result<Predicate> {
    let mut literals: Vec<(Term, String)> = Vec::new();
    for operand in predicate.operands() {
        visit::any(operand, &mut |t: &Term| {
            if let Some(Literal::Str(text)) = t.as_literal() {
                if !literals.iter().any(|(seen, _)| seen == t) {
                    literals.push((t.clone(), text.to_string()));
                }
            }
            false
        });
    }
    if literals.is_empty() {
        return Ok(predicate.clone());
    }

    let string = TermType::string();
    let value = crate::desugar::string::value_field();
    let mut mapping = FxHashMap::default();
    for (literal, text) in literals {
        let object = tf.fresh_var("lit", string.clone());
        block.push(
            Predicate::assign(&object, &tf.new_object(&string)?)?.at(predicate.location().clone()),
        );
        block.push(
            Predicate::store(&tf.field(&object, &value)?, &tf.char_array(&text)?)?
                .at(predicate.location().clone()),
        );
        mapping.insert(literal, object);
    }
    predicate.try_map_operands(|t| Ok(visit::substitute(t, &mapping)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        desugar::string::StringMethod,
        pipeline::{EventLog, TypePointsTo},
        state::{Location, StateBuilder},
        term::{MethodRef, MethodSignature, STRING_CLASS},
    };

    fn run(desugarer: &Desugarer, tf: &TermFactory, state: &PredicateState) -> (PredicateState, EventLog) {
        let events = EventLog::new();
        let ctx = PassContext::new(tf, &events, &TypePointsTo);
        let result = desugarer.run(state, &ctx).unwrap();
        (result, events)
    }

    fn rendered(state: &PredicateState) -> Vec<String> {
        state.predicates().iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_call_replaced_in_place() {
        let tf = TermFactory::new();
        let s = tf.var("s", TermType::string());
        let n = tf.var("n", TermType::INT);
        let x = tf.var("x", TermType::INT);
        let mut builder = StateBuilder::new();
        builder
            .state(&x, &tf.int(1))
            .unwrap()
            .call(Some(&n), &tf.call(&s, &StringMethod::Length.method_ref(), &[]).unwrap())
            .unwrap()
            .path(&tf.gt(&n, &x).unwrap())
            .unwrap();

        let desugarer = Desugarer::for_strategy(StringStrategy::Opaque).unwrap();
        let (result, events) = run(&desugarer, &tf, &builder.build());
        assert_eq!(
            rendered(&result),
            vec![
                "x = 1",
                "@A (s != null)",
                "n = length(s)",
                "@A (n >= 0)",
                "@P (n > x)"
            ]
        );
        assert_eq!(events.count(EventKind::CallDesugared), 1);
    }

    #[test]
    fn test_unmodeled_call_passes_through() {
        let tf = TermFactory::new();
        let s = tf.var("s", TermType::string());
        let h = tf.var("h", TermType::INT);
        let hash = MethodRef::new(
            STRING_CLASS,
            MethodSignature::new("hashCode", vec![], TermType::INT),
        );
        let mut builder = StateBuilder::new();
        builder
            .at(Location::new("Main.run", 3))
            .call(Some(&h), &tf.call(&s, &hash, &[]).unwrap())
            .unwrap();
        let state = builder.build();

        let desugarer = Desugarer::for_strategy(StringStrategy::Structural).unwrap();
        let (result, events) = run(&desugarer, &tf, &state);
        assert_eq!(result, state);
        assert_eq!(events.count(EventKind::CallPassedThrough), 1);
        assert_eq!(events.to_vec()[0].location, Location::new("Main.run", 3));
    }

    #[test]
    fn test_calls_inside_branches_desugared() {
        let tf = TermFactory::new();
        let s = tf.var("s", TermType::string());
        let e = tf.var("e", TermType::Bool);
        let flag = tf.var("flag", TermType::Bool);
        let is_empty = tf.call(&s, &StringMethod::IsEmpty.method_ref(), &[]).unwrap();

        let mut taken = StateBuilder::new();
        taken.path(&flag).unwrap().call(Some(&e), &is_empty).unwrap();
        let mut skipped = StateBuilder::new();
        skipped.path(&tf.not(&flag).unwrap()).unwrap();
        let mut builder = StateBuilder::new();
        builder.choice(vec![taken.build(), skipped.build()]);

        let desugarer = Desugarer::for_strategy(StringStrategy::Opaque).unwrap();
        let (result, events) = run(&desugarer, &tf, &builder.build());
        assert_eq!(events.count(EventKind::CallDesugared), 1);
        assert!(result.to_string().contains("e = (length(s) == 0)"));
    }

    #[test]
    fn test_structural_literal_materialized() {
        let tf = TermFactory::new();
        let n = tf.var("n", TermType::INT);
        let call = tf
            .call(&tf.string("ab"), &StringMethod::Length.method_ref(), &[])
            .unwrap();
        let mut builder = StateBuilder::new();
        builder.call(Some(&n), &call).unwrap();

        let desugarer = Desugarer::for_strategy(StringStrategy::Structural).unwrap();
        let (result, _) = run(&desugarer, &tf, &builder.build());
        let lines = rendered(&result);
        assert!(lines[0].starts_with("%lit"));
        assert!(lines[0].contains("new java/lang/String"));
        assert!(lines[1].contains(".value = new char[2]"));
        assert!(lines.iter().all(|l| !l.contains("\"ab\"")));
    }

    #[test]
    fn test_opaque_keeps_literals() {
        let tf = TermFactory::new();
        let n = tf.var("n", TermType::INT);
        let call = tf
            .call(&tf.string("ab"), &StringMethod::Length.method_ref(), &[])
            .unwrap();
        let mut builder = StateBuilder::new();
        builder.call(Some(&n), &call).unwrap();

        let desugarer = Desugarer::for_strategy(StringStrategy::Opaque).unwrap();
        let (result, _) = run(&desugarer, &tf, &builder.build());
        assert!(result.to_string().contains("n = length(\"ab\")"));
    }

    #[test]
    fn test_nested_call_in_array_initializer() {
        let tf = TermFactory::new();
        let s = tf.var("s", TermType::string());
        let a = tf.var("a", TermType::char_array());
        let char_at = StringMethod::CharAt.method_ref();
        let init = tf
            .index_lambda(|i| tf.call(&s, &char_at, &[i.clone()]))
            .unwrap();
        let generated = tf
            .generate_array(&TermType::CHAR, &tf.int(3), &init)
            .unwrap();
        let mut builder = StateBuilder::new();
        builder.state(&a, &generated).unwrap();

        let desugarer = Desugarer::for_strategy(StringStrategy::Opaque).unwrap();
        let (result, _) = run(&desugarer, &tf, &builder.build());
        let text = result.to_string();
        assert!(text.contains("charAt(s, %i"));
        assert!(!text.contains("s.charAt("));
    }
}
