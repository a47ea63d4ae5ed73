//! Checking sessions.

use std::sync::Arc;

use crate::term::TermFactory;

/// The context of one checking session.
///
/// A session owns the term factory, and with it the fresh-name counters, used by every
/// component that builds terms for the session: the state supplier, the desugaring
/// adapters and the checker. Sessions are independent; two sessions never share counters.
/// Cloning a session yields another handle to the same factory.
#[derive(Clone, Default)]
pub struct Session {
    factory: Arc<TermFactory>,
}

impl Session {
    /// Creates a fresh session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The term factory of this session.
    #[must_use]
    pub fn factory(&self) -> &TermFactory {
        &self.factory
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("interned", &self.factory.interned())
            .finish()
    }
}
