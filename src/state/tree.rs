//! The predicate-state tree.

use std::{fmt, sync::Arc};

use crate::{
    state::{Predicate, PredicateKind, PredicateTypes},
    term::{Literal, Term, TermKind, TermType},
    Result,
};

/// A tree of predicates describing the executions that reach a program point.
///
/// - [`PredicateState::Basic`] is one straight-line block; predicate order matters.
/// - [`PredicateState::Chain`] sequences two states.
/// - [`PredicateState::Choice`] is a control-flow split: exactly one branch is taken on a
///   concrete execution. A choice with no branches has no executions at all.
///
/// States are immutable; every operation returns a new state sharing unchanged
/// substructure with its input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PredicateState {
    /// A straight-line block.
    Basic(Arc<[Predicate]>),
    /// `base` followed by `curr`.
    Chain {
        /// The earlier part.
        base: Arc<PredicateState>,
        /// The later part.
        curr: Arc<PredicateState>,
    },
    /// Alternative continuations.
    Choice(Arc<[PredicateState]>),
}

/// A borrowed element of a state's top-level sequence, see [`PredicateState::segments`].
#[derive(Debug, Clone, Copy)]
pub enum Segment<'a> {
    /// A run of predicates.
    Block(&'a [Predicate]),
    /// A split.
    Choice(&'a [PredicateState]),
}

impl Default for PredicateState {
    fn default() -> Self {
        PredicateState::empty()
    }
}

impl PredicateState {
    /// The state with no predicates.
    #[must_use]
    pub fn empty() -> Self {
        PredicateState::Basic(Arc::from(Vec::new()))
    }

    /// A single block.
    #[must_use]
    pub fn basic(predicates: Vec<Predicate>) -> Self {
        PredicateState::Basic(Arc::from(predicates))
    }

    /// `base` followed by `curr`. Empty operands are elided.
    #[must_use]
    pub fn chain(base: PredicateState, curr: PredicateState) -> Self {
        if base.is_empty() {
            return curr;
        }
        if curr.is_empty() {
            return base;
        }
        PredicateState::Chain {
            base: Arc::new(base),
            curr: Arc::new(curr),
        }
    }

    /// A choice between `branches`.
    #[must_use]
    pub fn choice(branches: Vec<PredicateState>) -> Self {
        PredicateState::Choice(Arc::from(branches))
    }

    /// This state followed by `predicates`.
    #[must_use]
    pub fn append(&self, predicates: Vec<Predicate>) -> Self {
        PredicateState::chain(self.clone(), PredicateState::basic(predicates))
    }

    /// This state followed by `next`.
    #[must_use]
    pub fn then(&self, next: &PredicateState) -> Self {
        PredicateState::chain(self.clone(), next.clone())
    }

    /// Returns `true` if the state contains no predicates and does not branch.
    ///
    /// A choice whose branches are all empty is empty; a choice with no branches is not,
    /// since it admits no execution.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            PredicateState::Basic(predicates) => predicates.is_empty(),
            PredicateState::Chain { base, curr } => base.is_empty() && curr.is_empty(),
            PredicateState::Choice(branches) => {
                !branches.is_empty() && branches.iter().all(PredicateState::is_empty)
            }
        }
    }

    /// Total number of predicates in the tree.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            PredicateState::Basic(predicates) => predicates.len(),
            PredicateState::Chain { base, curr } => base.size() + curr.size(),
            PredicateState::Choice(branches) => branches.iter().map(PredicateState::size).sum(),
        }
    }

    /// All predicates in pre-order (sequence order, branches in declaration order).
    #[must_use]
    pub fn predicates(&self) -> Vec<&Predicate> {
        let mut out = Vec::with_capacity(self.size());
        self.collect_predicates(&mut out);
        out
    }

    fn collect_predicates<'a>(&'a self, out: &mut Vec<&'a Predicate>) {
        match self {
            PredicateState::Basic(predicates) => out.extend(predicates.iter()),
            PredicateState::Chain { base, curr } => {
                base.collect_predicates(out);
                curr.collect_predicates(out);
            }
            PredicateState::Choice(branches) => {
                for branch in branches.iter() {
                    branch.collect_predicates(out);
                }
            }
        }
    }

    /// The top-level sequence of this state with chains flattened.
    ///
    /// Choices are returned as a whole; their branches are not flattened.
    #[must_use]
    pub fn segments(&self) -> Vec<Segment<'_>> {
        let mut out = Vec::new();
        self.collect_segments(&mut out);
        out
    }

    fn collect_segments<'a>(&'a self, out: &mut Vec<Segment<'a>>) {
        match self {
            PredicateState::Basic(predicates) => out.push(Segment::Block(predicates)),
            PredicateState::Chain { base, curr } => {
                base.collect_segments(out);
                curr.collect_segments(out);
            }
            PredicateState::Choice(branches) => out.push(Segment::Choice(branches)),
        }
    }

    /// Keeps the predicates satisfying `keep`, preserving the tree structure.
    #[must_use]
    pub fn filter<P>(&self, keep: &mut P) -> PredicateState
    where
        P: FnMut(&Predicate) -> bool,
    {
        match self {
            PredicateState::Basic(predicates) => {
                PredicateState::basic(predicates.iter().filter(|p| keep(p)).cloned().collect())
            }
            PredicateState::Chain { base, curr } => {
                PredicateState::chain(base.filter(keep), curr.filter(keep))
            }
            PredicateState::Choice(branches) => {
                PredicateState::choice(branches.iter().map(|b| b.filter(keep)).collect())
            }
        }
    }

    /// Keeps the predicates whose type is in `types`, preserving choice structure.
    #[must_use]
    pub fn filter_by_type(&self, types: PredicateTypes) -> PredicateState {
        self.filter(&mut |p: &Predicate| types.contains(PredicateTypes::from(p.ty())))
    }

    /// Maps every predicate through `f`; `Ok(None)` removes it.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `f`.
    pub fn try_map_predicates<F>(&self, f: &mut F) -> Result<PredicateState>
    where
        F: FnMut(&Predicate) -> Result<Option<Predicate>>,
    {
        Ok(match self {
            PredicateState::Basic(predicates) => {
                let mut out = Vec::with_capacity(predicates.len());
                for predicate in predicates.iter() {
                    if let Some(mapped) = f(predicate)? {
                        out.push(mapped);
                    }
                }
                PredicateState::basic(out)
            }
            PredicateState::Chain { base, curr } => {
                PredicateState::chain(base.try_map_predicates(f)?, curr.try_map_predicates(f)?)
            }
            PredicateState::Choice(branches) => PredicateState::choice(
                branches
                    .iter()
                    .map(|b| b.try_map_predicates(f))
                    .collect::<Result<_>>()?,
            ),
        })
    }

    /// Maps every predicate through `f`.
    #[must_use]
    pub fn map_predicates<F>(&self, mut f: F) -> PredicateState
    where
        F: FnMut(&Predicate) -> Predicate,
    {
        let mut wrapped = |p: &Predicate| Ok(Some(f(p)));
        match self.try_map_predicates(&mut wrapped) {
            Ok(state) => state,
            Err(_) => self.clone(),
        }
    }

    /// Returns the structural normal form of this state.
    ///
    /// Chains are flattened into a left-leaning sequence, adjacent blocks are merged and
    /// empty blocks dropped. Choices are normalized recursively; structurally identical
    /// branches are merged, a single-branch choice is spliced into the sequence, a choice of
    /// empty branches disappears and a choice with no branches becomes `assume false`.
    #[must_use]
    pub fn normalize(&self) -> PredicateState {
        let mut parts: Vec<PredicateState> = Vec::new();
        let mut block: Vec<Predicate> = Vec::new();
        self.normalize_into(&mut parts, &mut block);
        flush_block(&mut parts, &mut block);
        parts
            .into_iter()
            .fold(PredicateState::empty(), PredicateState::chain)
    }

    fn normalize_into(&self, parts: &mut Vec<PredicateState>, block: &mut Vec<Predicate>) {
        for segment in self.segments() {
            match segment {
                Segment::Block(predicates) => block.extend(predicates.iter().cloned()),
                Segment::Choice(branches) => {
                    let mut unique: Vec<PredicateState> = Vec::with_capacity(branches.len());
                    for branch in branches.iter() {
                        let normalized = branch.normalize();
                        if !unique.contains(&normalized) {
                            unique.push(normalized);
                        }
                    }
                    match unique.len() {
                        0 => block.push(infeasible()),
                        1 => unique[0].normalize_into(parts, block),
                        _ if unique.iter().all(PredicateState::is_empty) => {}
                        _ => {
                            flush_block(parts, block);
                            parts.push(PredicateState::choice(unique));
                        }
                    }
                }
            }
        }
    }
}

fn flush_block(parts: &mut Vec<PredicateState>, block: &mut Vec<Predicate>) {
    if !block.is_empty() {
        parts.push(PredicateState::basic(std::mem::take(block)));
    }
}

fn infeasible() -> Predicate {
    let falsity = Term::new(TermKind::Const(Literal::Bool(false)), TermType::Bool);
    Predicate::from_kind(PredicateKind::Assume(falsity))
}

impl fmt::Display for PredicateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_indented(
            state: &PredicateState,
            f: &mut fmt::Formatter<'_>,
            depth: usize,
        ) -> fmt::Result {
            let pad = "  ".repeat(depth);
            for segment in state.segments() {
                match segment {
                    Segment::Block(predicates) => {
                        for predicate in predicates {
                            writeln!(f, "{pad}{predicate}")?;
                        }
                    }
                    Segment::Choice(branches) => {
                        writeln!(f, "{pad}BEGIN")?;
                        for (i, branch) in branches.iter().enumerate() {
                            if i > 0 {
                                writeln!(f, "{pad}|")?;
                            }
                            write_indented(branch, f, depth + 1)?;
                        }
                        writeln!(f, "{pad}END")?;
                    }
                }
            }
            Ok(())
        }

        write!(f, "(")?;
        if !self.is_empty() {
            writeln!(f)?;
            write_indented(self, f, 1)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{state::PredicateType, term::TermFactory};

    fn cond(tf: &TermFactory, name: &str) -> Predicate {
        Predicate::path(&tf.var(name, TermType::Bool)).unwrap()
    }

    #[test]
    fn test_chain_elides_empty() {
        let tf = TermFactory::new();
        let a = PredicateState::basic(vec![cond(&tf, "a")]);
        assert_eq!(PredicateState::chain(PredicateState::empty(), a.clone()), a);
        assert_eq!(PredicateState::chain(a.clone(), PredicateState::empty()), a);
    }

    #[test]
    fn test_normalize_merges_blocks() {
        let tf = TermFactory::new();
        let state = PredicateState::empty()
            .append(vec![cond(&tf, "a")])
            .append(vec![])
            .append(vec![cond(&tf, "b")]);
        let normalized = state.normalize();
        assert_eq!(
            normalized,
            PredicateState::basic(vec![cond(&tf, "a"), cond(&tf, "b")])
        );
        assert_eq!(normalized.normalize(), normalized);
    }

    #[test]
    fn test_normalize_unwraps_single_branch() {
        let tf = TermFactory::new();
        let inner = PredicateState::basic(vec![cond(&tf, "b")]);
        let state = PredicateState::basic(vec![cond(&tf, "a")])
            .then(&PredicateState::choice(vec![inner.clone(), inner]));
        assert_eq!(
            state.normalize(),
            PredicateState::basic(vec![cond(&tf, "a"), cond(&tf, "b")])
        );
    }

    #[test]
    fn test_normalize_empty_choice_is_infeasible() {
        let state = PredicateState::choice(vec![]).normalize();
        let predicates = state.predicates();
        assert_eq!(predicates.len(), 1);
        assert_eq!(predicates[0].ty(), PredicateType::Assume);
        assert!(predicates[0].condition().is_some_and(Term::is_false));
    }

    #[test]
    fn test_filter_by_type_keeps_choice() {
        let tf = TermFactory::new();
        let x = tf.var("x", TermType::INT);
        let assign = Predicate::assign(&x, &tf.int(1)).unwrap();
        let state = PredicateState::basic(vec![assign]).then(&PredicateState::choice(vec![
            PredicateState::basic(vec![cond(&tf, "a")]),
            PredicateState::basic(vec![cond(&tf, "b")]),
        ]));
        let paths = state.filter_by_type(PredicateTypes::PATH);
        assert_eq!(paths.size(), 2);
        assert!(matches!(paths, PredicateState::Choice(_)));
    }

    #[test]
    fn test_size_and_order() {
        let tf = TermFactory::new();
        let state = PredicateState::basic(vec![cond(&tf, "a")]).then(&PredicateState::choice(vec![
            PredicateState::basic(vec![cond(&tf, "b")]),
            PredicateState::basic(vec![cond(&tf, "c")]),
        ]));
        let names: Vec<String> = state.predicates().iter().map(|p| p.to_string()).collect();
        assert_eq!(names, vec!["@P a", "@P b", "@P c"]);
        assert_eq!(state.size(), 3);
    }
}
