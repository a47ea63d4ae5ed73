//! Memory spacing: partitioning heap accesses into non-aliasing regions.
//!
//! The pass does not compute aliasing itself. It asks a [`PointsTo`] collaborator for an
//! [`AllocationTag`] of every memory base (the owner of a field access, the array of an
//! element or length access), maps distinct tags to distinct [`MemorySpace`]s and rewrites
//! the accesses to carry them. Accesses whose base has no tag stay in
//! [`MemorySpace::SHARED`].
//!
//! Spaces are numbered from 1 in order of first encounter (predicates in pre-order, terms
//! outside-in), and bases are queried with their own spaces erased, so re-running the
//! pass on its output reproduces the same numbering.

use std::{fmt, sync::Arc};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    pipeline::{EventKind, PassContext, StatePass},
    state::{Predicate, PredicateKind, PredicateState},
    term::{
        visit::{self, PostOrder},
        MemorySpace, Term, TermKind, TermType, CHAR_SEQUENCE_CLASS, OBJECT_CLASS,
    },
    Result,
};

const NAME: &str = "memory-spacing";

/// Provenance label of a memory base.
///
/// Two bases with different tags must never reference the same object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocationTag(pub Arc<str>);

impl AllocationTag {
    /// Creates a tag.
    #[must_use]
    pub fn new(label: &str) -> Self {
        AllocationTag(Arc::from(label))
    }
}

impl fmt::Display for AllocationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Points-to approximation supplied by the caller's static analysis.
pub trait PointsTo: Send + Sync {
    /// Returns the allocation tag of a memory base, or `None` when the base may alias
    /// anything.
    ///
    /// The base is passed with every memory space erased.
    fn tag(&self, base: &Term) -> Option<AllocationTag>;
}

/// Partitions memory by the static type of the base.
///
/// Sound as long as the static types of two aliasing bases agree, which holds for the
/// modeled hierarchy: fields are accessed through a base of their declaring class and
/// primitive arrays are invariant. Bases typed as `Object`, `CharSequence` or arrays of
/// references are left untagged.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypePointsTo;

impl PointsTo for TypePointsTo {
    fn tag(&self, base: &Term) -> Option<AllocationTag> {
        match base.ty() {
            TermType::Class(name)
                if &**name != OBJECT_CLASS && &**name != CHAR_SEQUENCE_CLASS =>
            {
                Some(AllocationTag(name.clone()))
            }
            TermType::Array(elem) if !elem.is_reference() => {
                Some(AllocationTag::new(&base.ty().to_string()))
            }
            _ => None,
        }
    }
}

/// Explicit per-term tags with a fallback for unlisted bases.
///
/// ```rust
/// use pathscope::{pipeline::{AllocationTag, PointsTo, SitePointsTo}, term::TermType, Session};
///
/// let session = Session::new();
/// let tf = session.factory();
/// let a = tf.var("a", TermType::char_array());
/// let b = tf.var("b", TermType::char_array());
///
/// let points_to = SitePointsTo::new()
///     .with(&a, AllocationTag::new("site-a"))
///     .with(&b, AllocationTag::new("site-b"));
/// assert_ne!(points_to.tag(&a), points_to.tag(&b));
/// ```
#[derive(Default)]
pub struct SitePointsTo {
    tags: FxHashMap<Term, AllocationTag>,
    fallback: Option<Box<dyn PointsTo>>,
}

impl SitePointsTo {
    /// Creates an empty map whose unlisted bases fall back to [`TypePointsTo`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            tags: FxHashMap::default(),
            fallback: Some(Box::new(TypePointsTo)),
        }
    }

    /// Creates an empty map whose unlisted bases are untagged.
    #[must_use]
    pub fn strict() -> Self {
        Self::default()
    }

    /// Tags a base (builder pattern).
    #[must_use]
    pub fn with(mut self, base: &Term, tag: AllocationTag) -> Self {
        self.insert(base, tag);
        self
    }

    /// Tags a base.
    pub fn insert(&mut self, base: &Term, tag: AllocationTag) {
        self.tags.insert(visit::erase_spaces(base), tag);
    }
}

impl PointsTo for SitePointsTo {
    fn tag(&self, base: &Term) -> Option<AllocationTag> {
        self.tags
            .get(base)
            .cloned()
            .or_else(|| self.fallback.as_ref().and_then(|f| f.tag(base)))
    }
}

/// Assigns memory spaces to every field, element and length access.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemorySpacer;

impl MemorySpacer {
    /// Creates a new memory spacer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl StatePass for MemorySpacer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Partitions memory accesses into regions using the points-to collaborator"
    }

    fn run(&self, state: &PredicateState, ctx: &PassContext<'_>) -> Result<PredicateState> {
        let spaces = Spaces::collect(state, ctx);
        let result = state.try_map_predicates(&mut |predicate: &Predicate| {
            let mut rewriter = PostOrder::new(|t: &Term| Ok(spaces.respace(t)));
            let mapped = predicate.try_map_operands(|t| rewriter.apply(t))?;
            let mapped = match mapped.kind() {
                PredicateKind::Store { target, value } => {
                    let space = spaces.space_of(target.base());
                    if space == target.space() {
                        mapped
                    } else {
                        mapped.with_kind(PredicateKind::Store {
                            target: target.with_space(space),
                            value: value.clone(),
                        })
                    }
                }
                _ => mapped,
            };
            Ok(Some(mapped))
        })?;
        if result != *state {
            ctx.events
                .record(EventKind::MemorySpaced)
                .pass(NAME)
                .message(format!(
                    "{} bases in {} spaces",
                    spaces.bases.len(),
                    spaces.tags.len()
                ));
        }
        Ok(result)
    }
}

struct Spaces {
    /// Erased base -> space.
    bases: FxHashMap<Term, MemorySpace>,
    /// Tag -> space, in numbering order.
    tags: FxHashMap<AllocationTag, MemorySpace>,
    seen: FxHashSet<Term>,
}

impl Spaces {
    fn collect(state: &PredicateState, ctx: &PassContext<'_>) -> Self {
        let mut spaces = Spaces {
            bases: FxHashMap::default(),
            tags: FxHashMap::default(),
            seen: FxHashSet::default(),
        };
        for predicate in state.predicates() {
            if let PredicateKind::Store { target, .. } = predicate.kind() {
                spaces.visit_base(target.base(), ctx);
            }
            for operand in predicate.operands() {
                spaces.visit(operand, ctx);
            }
        }
        spaces
    }

    fn visit(&mut self, term: &Term, ctx: &PassContext<'_>) {
        if !self.seen.insert(term.clone()) {
            return;
        }
        match term.kind() {
            TermKind::Load(mem) => self.visit_base(mem.base(), ctx),
            TermKind::ArrayLength { array, .. } => self.visit_base(array, ctx),
            _ => {}
        }
        for child in term.children() {
            self.visit(child, ctx);
        }
    }

    fn visit_base(&mut self, base: &Term, ctx: &PassContext<'_>) {
        let erased = visit::erase_spaces(base);
        if self.bases.contains_key(&erased) {
            return;
        }
        let space = match ctx.points_to.tag(&erased) {
            Some(tag) => {
                let next = MemorySpace(self.tags.len() as u32 + 1);
                *self.tags.entry(tag).or_insert(next)
            }
            None => MemorySpace::SHARED,
        };
        self.bases.insert(erased, space);
    }

    fn space_of(&self, base: &Term) -> MemorySpace {
        self.bases
            .get(&visit::erase_spaces(base))
            .copied()
            .unwrap_or(MemorySpace::SHARED)
    }

    fn respace(&self, term: &Term) -> Term {
        match term.kind() {
            TermKind::Load(mem) => {
                let space = self.space_of(mem.base());
                if space == mem.space() {
                    term.clone()
                } else {
                    term.with_kind(TermKind::Load(mem.with_space(space)))
                }
            }
            TermKind::ArrayLength { array, space } => {
                let target = self.space_of(array);
                if target == *space {
                    term.clone()
                } else {
                    term.with_kind(TermKind::ArrayLength {
                        array: array.clone(),
                        space: target,
                    })
                }
            }
            _ => term.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::EventLog,
        state::StateBuilder,
        term::{FieldRef, TermFactory},
    };

    fn spaces_of(state: &PredicateState) -> Vec<u32> {
        let mut out = Vec::new();
        for predicate in state.predicates() {
            if let PredicateKind::Store { target, .. } = predicate.kind() {
                out.push(target.space().0);
            }
            for operand in predicate.operands() {
                visit::any(operand, &mut |t: &Term| {
                    match t.kind() {
                        TermKind::Load(mem) => out.push(mem.space().0),
                        TermKind::ArrayLength { space, .. } => out.push(space.0),
                        _ => {}
                    }
                    false
                });
            }
        }
        out
    }

    #[test]
    fn test_type_partitioning() {
        let tf = TermFactory::new();
        let chars = tf.var("chars", TermType::char_array());
        let ints = tf.var("ints", TermType::array(TermType::INT));
        let obj = tf.var("o", TermType::object());
        let c = tf.fresh_var("c", TermType::CHAR);
        let n = tf.fresh_var("n", TermType::INT);

        let mut builder = StateBuilder::new();
        builder
            .state(&c, &tf.load_element(&chars, &tf.int(0)).unwrap())
            .unwrap()
            .state(&n, &tf.length(&ints).unwrap())
            .unwrap()
            .path(&tf.eq(&obj, &tf.null()).unwrap())
            .unwrap()
            .store(&tf.element(&chars, &tf.int(1)).unwrap(), &c)
            .unwrap();
        let state = builder.build();

        let events = EventLog::new();
        let points_to = TypePointsTo;
        let ctx = PassContext::new(&tf, &events, &points_to);
        let spaced = MemorySpacer.run(&state, &ctx).unwrap();

        assert_eq!(spaces_of(&spaced), vec![1, 2, 1]);
        assert_eq!(events.count(EventKind::MemorySpaced), 1);

        let again = MemorySpacer.run(&spaced, &ctx).unwrap();
        assert_eq!(again, spaced);
    }

    #[test]
    fn test_untagged_bases_stay_shared() {
        let tf = TermFactory::new();
        let a = tf.var("a", TermType::char_array());
        let b = tf.var("b", TermType::char_array());
        let s = tf.var("s", TermType::string());
        let value = FieldRef::new(crate::term::STRING_CLASS, "value", TermType::char_array());
        let x = tf.fresh_var("x", TermType::char_array());

        let mut builder = StateBuilder::new();
        builder
            .path(
                &tf.eq(
                    &tf.load_element(&a, &tf.int(0)).unwrap(),
                    &tf.load_element(&b, &tf.int(0)).unwrap(),
                )
                .unwrap(),
            )
            .unwrap()
            .state(&x, &tf.load_field(&s, &value).unwrap())
            .unwrap();
        let state = builder.build();

        let events = EventLog::new();
        let points_to = SitePointsTo::strict().with(&a, AllocationTag::new("A"));
        let ctx = PassContext::new(&tf, &events, &points_to);
        let spaced = MemorySpacer.run(&state, &ctx).unwrap();

        assert_eq!(spaces_of(&spaced), vec![1, 0, 0]);
    }
}
