//! Generic traversal and rewriting of term DAGs.
//!
//! All traversals memoize on structural identity, so shared subterms are visited once per
//! traversal even when the DAG is exponentially larger as a tree.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    term::{BinaryOp, MemRef, MemorySpace, Term, TermKind},
    Result,
};

/// Post-order rewriter with memoization.
///
/// Children are rewritten first; `f` is then applied to the node rebuilt over the new
/// children. Results are cached per input term for the lifetime of the rewriter.
pub struct PostOrder<F> {
    f: F,
    memo: FxHashMap<Term, Term>,
}

impl<F> PostOrder<F>
where
    F: FnMut(&Term) -> Result<Term>,
{
    /// Creates a rewriter applying `f` at every node.
    pub fn new(f: F) -> Self {
        PostOrder {
            f,
            memo: FxHashMap::default(),
        }
    }

    /// Rewrites `term`.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by the node function.
    pub fn apply(&mut self, term: &Term) -> Result<Term> {
        if let Some(done) = self.memo.get(term) {
            return Ok(done.clone());
        }
        let kind = term.kind().try_map_children(|child| self.apply(child))?;
        let rebuilt = term.with_kind(kind);
        let result = (self.f)(&rebuilt)?;
        self.memo.insert(term.clone(), result.clone());
        Ok(result)
    }

    /// Rewrites the operands of a memory reference.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by the node function.
    pub fn apply_mem(&mut self, target: &MemRef) -> Result<MemRef> {
        target.try_map(|t| self.apply(t))
    }
}

/// Replaces every subterm that is a key of `mapping` by its value.
///
/// Replacement is not recursive: the inserted terms are not searched again.
#[must_use]
pub fn substitute(term: &Term, mapping: &FxHashMap<Term, Term>) -> Term {
    fn walk(term: &Term, mapping: &FxHashMap<Term, Term>, memo: &mut FxHashMap<Term, Term>) -> Term {
        if let Some(replacement) = mapping.get(term) {
            return replacement.clone();
        }
        if term.children().is_empty() {
            return term.clone();
        }
        if let Some(done) = memo.get(term) {
            return done.clone();
        }
        let kind = match term
            .kind()
            .try_map_children(|child| Ok(walk(child, mapping, memo)))
        {
            Ok(kind) => kind,
            Err(_) => return term.clone(),
        };
        let result = term.with_kind(kind);
        memo.insert(term.clone(), result.clone());
        result
    }

    if mapping.is_empty() {
        return term.clone();
    }
    walk(term, mapping, &mut FxHashMap::default())
}

/// Substitutes inside a memory reference.
#[must_use]
pub fn substitute_mem(target: &MemRef, mapping: &FxHashMap<Term, Term>) -> MemRef {
    match target.try_map(|t| Ok(substitute(t, mapping))) {
        Ok(mem) => mem,
        Err(_) => target.clone(),
    }
}

/// Returns `true` if any subterm (including `term` itself) satisfies `pred`.
pub fn any<P>(term: &Term, pred: &mut P) -> bool
where
    P: FnMut(&Term) -> bool,
{
    fn walk<P: FnMut(&Term) -> bool>(term: &Term, pred: &mut P, seen: &mut FxHashSet<Term>) -> bool {
        if !seen.insert(term.clone()) {
            return false;
        }
        if pred(term) {
            return true;
        }
        term.children().into_iter().any(|child| walk(child, pred, seen))
    }

    walk(term, pred, &mut FxHashSet::default())
}

/// Free variables of `term` in first-encounter (pre-order) order.
///
/// Lambda parameters are bound within their body and are not reported.
#[must_use]
pub fn free_vars(term: &Term) -> Vec<Term> {
    let mut out = Vec::new();
    let mut seen = FxHashSet::default();
    collect_vars(term, &mut Vec::new(), &mut seen, &mut out);
    out
}

fn collect_vars(term: &Term, bound: &mut Vec<Term>, seen: &mut FxHashSet<Term>, out: &mut Vec<Term>) {
    match term.kind() {
        TermKind::Var(_) => {
            if !bound.contains(term) && seen.insert(term.clone()) {
                out.push(term.clone());
            }
        }
        TermKind::Lambda { params, body } => {
            let depth = bound.len();
            bound.extend(params.iter().cloned());
            collect_vars(body, bound, seen, out);
            bound.truncate(depth);
        }
        _ => {
            for child in term.children() {
                collect_vars(child, bound, seen, out);
            }
        }
    }
}

/// Returns `true` if `var` occurs free in `term`.
#[must_use]
pub fn mentions(term: &Term, var: &Term) -> bool {
    any(term, &mut |t: &Term| t == var)
}

/// Resets every memory space inside `term` to [`MemorySpace::SHARED`].
#[must_use]
pub fn erase_spaces(term: &Term) -> Term {
    let mut rewriter = PostOrder::new(|t: &Term| {
        Ok(match t.kind() {
            TermKind::Load(mem) if mem.space() != MemorySpace::SHARED => {
                t.with_kind(TermKind::Load(mem.with_space(MemorySpace::SHARED)))
            }
            TermKind::ArrayLength { array, space } if *space != MemorySpace::SHARED => {
                t.with_kind(TermKind::ArrayLength {
                    array: array.clone(),
                    space: MemorySpace::SHARED,
                })
            }
            _ => t.clone(),
        })
    });
    rewriter.apply(term).unwrap_or_else(|_| term.clone())
}

/// Returns `true` if evaluating `term` can never fault.
///
/// Memory reads, allocations, calls, reference casts, string operations and division by
/// anything but a non-zero literal may fail at runtime; everything else is total.
#[must_use]
pub fn is_total(term: &Term) -> bool {
    !any(term, &mut |t: &Term| match t.kind() {
        TermKind::Load(_)
        | TermKind::ArrayLength { .. }
        | TermKind::New { .. }
        | TermKind::Call { .. }
        | TermKind::Str { .. } => true,
        TermKind::Cast { target, .. } => target.is_reference(),
        TermKind::Binary {
            op: BinaryOp::Div | BinaryOp::Rem,
            rhs,
            ..
        } => rhs.ty().is_integral() && rhs.as_int_const().is_none_or(|v| v == 0),
        _ => false,
    })
}

/// Returns `true` if `term` contains a method call.
#[must_use]
pub fn contains_call(term: &Term) -> bool {
    any(term, &mut |t: &Term| matches!(t.kind(), TermKind::Call { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{TermFactory, TermType};

    #[test]
    fn test_substitute_replaces_all_occurrences() {
        let tf = TermFactory::new();
        let x = tf.var("x", TermType::INT);
        let y = tf.var("y", TermType::INT);
        let sum = tf.add(&x, &tf.mul(&x, &y).unwrap()).unwrap();

        let mut mapping = FxHashMap::default();
        mapping.insert(x, tf.int(2));
        assert_eq!(substitute(&sum, &mapping).to_string(), "(2 + (2 * y))");
    }

    #[test]
    fn test_free_vars_skip_bound_parameters() {
        let tf = TermFactory::new();
        let a = tf.var("a", TermType::char_array());
        let n = tf.var("n", TermType::INT);
        let body = tf
            .index_lambda(|i| {
                let elem = tf.load_element(&a, i)?;
                tf.ge(&elem, &tf.char(0))
            })
            .unwrap();
        let quantified = tf.for_all(&tf.int(0), &n, &body).unwrap();

        assert_eq!(free_vars(&quantified), vec![n, a]);
    }

    #[test]
    fn test_any_and_mentions() {
        let tf = TermFactory::new();
        let x = tf.var("x", TermType::INT);
        let y = tf.var("y", TermType::INT);
        let cond = tf.gt(&x, &tf.int(0)).unwrap();
        assert!(mentions(&cond, &x));
        assert!(!mentions(&cond, &y));
        assert!(!contains_call(&cond));
    }

    #[test]
    fn test_totality() {
        let tf = TermFactory::new();
        let x = tf.var("x", TermType::INT);
        let a = tf.var("a", TermType::char_array());
        assert!(is_total(&tf.add(&x, &tf.int(1)).unwrap()));
        assert!(is_total(&tf.binary(BinaryOp::Div, &x, &tf.int(2)).unwrap()));
        assert!(!is_total(&tf.binary(BinaryOp::Div, &x, &x).unwrap()));
        assert!(!is_total(&tf.length(&a).unwrap()));
    }
}
