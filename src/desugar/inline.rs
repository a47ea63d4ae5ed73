//! Rewriting of call terms nested inside other terms.
//!
//! Call predicates are replaced by whole states, but a call can also appear inside a
//! lambda body (an array initializer, a quantifier) where no predicate can be inserted.
//! Those calls are rewritten to the pure expression computing the same value when the
//! string model has one; any other nested call is left in place.

use crate::{
    config::StringStrategy,
    desugar::string::{opaque, structural, StringMethod},
    term::{visit::PostOrder, Term, TermFactory, TermKind},
    Result,
};

/// Replaces every string call term inside `term` that has a pure model.
///
/// # Arguments
///
/// * `term` - The term to rewrite.
/// * `factory` - Factory for the replacement terms.
/// * `strategy` - The string model the replacements follow.
///
/// # Errors
///
/// Returns a construction error if a call term carries arguments of the wrong type.
pub fn inline_call_terms(term: &Term, factory: &TermFactory, strategy: StringStrategy) -> Result<Term> {
    let mut rewriter = PostOrder::new(|t: &Term| {
        let TermKind::Call {
            owner,
            method,
            args,
        } = t.kind()
        else {
            return Ok(t.clone());
        };
        let Some(string_method) = StringMethod::resolve(method) else {
            return Ok(t.clone());
        };
        let inlined = match strategy {
            StringStrategy::Structural => structural::inline(factory, string_method, owner, args)?,
            StringStrategy::Opaque => opaque::inline(factory, string_method, owner, args)?,
        };
        Ok(inlined.unwrap_or_else(|| {
            log::trace!("no inline model for nested call {t}");
            t.clone()
        }))
    });
    rewriter.apply(term)
}

/// Returns `true` if `term` contains a call term.
pub(crate) fn has_call(term: &Term) -> bool {
    crate::term::visit::any(term, &mut |t: &Term| matches!(t.kind(), TermKind::Call { .. }))
}
