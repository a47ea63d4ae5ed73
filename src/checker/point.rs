//! Program points and the state supplier interface.

use std::{collections::HashMap, fmt, hash::BuildHasher, sync::Arc};

use crate::state::PredicateState;

/// An instruction of the analyzed program.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramPoint {
    /// Fully qualified method.
    pub method: Arc<str>,
    /// Instruction index within the method body.
    pub index: u32,
}

impl ProgramPoint {
    /// Creates a program point.
    #[must_use]
    pub fn new(method: &str, index: u32) -> Self {
        ProgramPoint {
            method: Arc::from(method),
            index,
        }
    }
}

impl fmt::Display for ProgramPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.method, self.index)
    }
}

/// Source of the predicate states reaching program points.
///
/// The supplier is the static analysis that builds states; the checker only consumes
/// them. A supplied state must already encode every effect and branch decision on the
/// way from the method entry to the point.
pub trait StateSupplier: Send + Sync {
    /// The state reaching `point`, or `None` if the point was not analyzed.
    fn instruction_state(&self, point: &ProgramPoint) -> Option<PredicateState>;
}

impl<S> StateSupplier for HashMap<ProgramPoint, PredicateState, S>
where
    S: BuildHasher + Send + Sync,
{
    fn instruction_state(&self, point: &ProgramPoint) -> Option<PredicateState> {
        self.get(point).cloned()
    }
}

impl<T: StateSupplier + ?Sized> StateSupplier for Arc<T> {
    fn instruction_state(&self, point: &ProgramPoint) -> Option<PredicateState> {
        (**self).instruction_state(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    #[test]
    fn test_map_supplier() {
        let point = ProgramPoint::new("Main.run", 4);
        let mut states = FxHashMap::default();
        states.insert(point.clone(), PredicateState::empty());

        assert_eq!(states.instruction_state(&point), Some(PredicateState::empty()));
        assert_eq!(states.instruction_state(&ProgramPoint::new("Main.run", 5)), None);
        assert_eq!(point.to_string(), "Main.run@4");
    }
}
