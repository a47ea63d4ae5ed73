//! Incremental construction of predicate states.
//!
//! ```rust
//! use pathscope::{state::StateBuilder, term::TermType, Session};
//!
//! let session = Session::new();
//! let tf = session.factory();
//! let x = tf.var("x", TermType::INT);
//!
//! let mut positive = StateBuilder::new();
//! positive.path(&tf.gt(&x, &tf.int(0))?)?;
//! let mut negative = StateBuilder::new();
//! negative.path(&tf.le(&x, &tf.int(0))?)?;
//!
//! let mut builder = StateBuilder::new();
//! builder
//!     .assume(&tf.ge(&x, &tf.int(-10))?)?
//!     .choice(vec![positive.build(), negative.build()]);
//! assert_eq!(builder.build().size(), 3);
//! # Ok::<(), pathscope::Error>(())
//! ```

use crate::{
    state::{Location, Predicate, PredicateState},
    term::{MemRef, Term},
    Result,
};

/// Builds a [`PredicateState`] block by block.
///
/// Predicates are collected into the current block; [`StateBuilder::choice`] and
/// [`StateBuilder::append`] close the block and sequence the given state after it.
#[derive(Debug, Default)]
pub struct StateBuilder {
    state: PredicateState,
    block: Vec<Predicate>,
    location: Location,
}

impl StateBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder continuing `state`.
    #[must_use]
    pub fn from_state(state: PredicateState) -> Self {
        StateBuilder {
            state,
            ..Self::default()
        }
    }

    /// Sets the location attached to subsequently added predicates.
    pub fn at(&mut self, location: Location) -> &mut Self {
        self.location = location;
        self
    }

    /// Adds a predicate as is.
    pub fn predicate(&mut self, predicate: Predicate) -> &mut Self {
        self.block.push(predicate);
        self
    }

    fn located(&mut self, predicate: Predicate) -> &mut Self {
        let location = self.location.clone();
        self.predicate(predicate.at(location))
    }

    /// Adds the state predicate `lhv := rhv`.
    ///
    /// # Errors
    ///
    /// See [`Predicate::assign`].
    pub fn state(&mut self, lhv: &Term, rhv: &Term) -> Result<&mut Self> {
        Ok(self.located(Predicate::assign(lhv, rhv)?))
    }

    /// Adds the store `*target := value`.
    ///
    /// # Errors
    ///
    /// See [`Predicate::store`].
    pub fn store(&mut self, target: &MemRef, value: &Term) -> Result<&mut Self> {
        Ok(self.located(Predicate::store(target, value)?))
    }

    /// Adds a call predicate.
    ///
    /// # Errors
    ///
    /// See [`Predicate::call`].
    pub fn call(&mut self, lhv: Option<&Term>, call: &Term) -> Result<&mut Self> {
        Ok(self.located(Predicate::call(lhv, call)?))
    }

    /// Adds an assumption.
    ///
    /// # Errors
    ///
    /// See [`Predicate::assume`].
    pub fn assume(&mut self, cond: &Term) -> Result<&mut Self> {
        Ok(self.located(Predicate::assume(cond)?))
    }

    /// Adds a path predicate.
    ///
    /// # Errors
    ///
    /// See [`Predicate::path`].
    pub fn path(&mut self, cond: &Term) -> Result<&mut Self> {
        Ok(self.located(Predicate::path(cond)?))
    }

    fn flush(&mut self) {
        if !self.block.is_empty() {
            let block = std::mem::take(&mut self.block);
            self.state = self.state.append(block);
        }
    }

    /// Sequences a choice between `branches` after the current content.
    pub fn choice(&mut self, branches: Vec<PredicateState>) -> &mut Self {
        self.flush();
        self.state = self.state.then(&PredicateState::choice(branches));
        self
    }

    /// Sequences `next` after the current content.
    pub fn append(&mut self, next: &PredicateState) -> &mut Self {
        self.flush();
        self.state = self.state.then(next);
        self
    }

    /// Returns the state built so far, leaving the builder usable.
    #[must_use]
    pub fn current(&self) -> PredicateState {
        self.state.append(self.block.clone())
    }

    /// Finishes the state.
    #[must_use]
    pub fn build(mut self) -> PredicateState {
        self.flush();
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{TermFactory, TermType};

    #[test]
    fn test_builder_sequences_blocks() {
        let tf = TermFactory::new();
        let x = tf.var("x", TermType::INT);
        let y = tf.var("y", TermType::INT);

        let mut builder = StateBuilder::new();
        builder
            .at(Location::new("Main.run", 3))
            .state(&x, &tf.int(1))
            .unwrap()
            .choice(vec![PredicateState::empty(), PredicateState::empty()])
            .state(&y, &x)
            .unwrap();
        let state = builder.build();

        assert_eq!(state.size(), 2);
        let predicates = state.predicates();
        assert_eq!(predicates[0].location(), &Location::new("Main.run", 3));
        assert_eq!(predicates[1].to_string(), "y = x");
    }

    #[test]
    fn test_builder_rejects_ill_typed() {
        let tf = TermFactory::new();
        let mut builder = StateBuilder::new();
        assert!(builder.assume(&tf.int(1)).is_err());
        assert!(builder.build().is_empty());
    }
}
