use thiserror::Error;

use crate::term::TermType;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Most errors in this crate are *construction errors*: an attempt to build an ill-typed term
/// or predicate. They are raised at the point of construction and are never deferred to solve
/// time. Conditions that a reachability query is expected to survive (no state for a point,
/// an unmodeled library call, a solver timeout) are not errors at all; they are reported
/// through [`crate::solver::SolverResult::Unknown`] or the event log.
///
/// # Error Categories
///
/// ## Construction Errors
/// - [`Error::TypeMismatch`] - Operand types are incompatible with the operation
/// - [`Error::Arity`] - Wrong number of parameters or arguments
/// - [`Error::InvalidTerm`] - A term of the wrong shape was supplied (e.g. not a lambda)
/// - [`Error::Malformed`] - Internal inconsistency detected while building a state
///
/// ## Infrastructure Errors
/// - [`Error::Pipeline`] - A rewrite pass could not complete
/// - [`Error::Solver`] - A backend failed before a verdict could be produced
/// - [`Error::DuplicateAdapter`] - Two desugaring adapters registered for the same call key
/// - [`Error::LockError`] - Thread synchronization failure
///
/// # Examples
///
/// ```rust
/// use pathscope::{term::TermType, Error, Session};
///
/// let session = Session::new();
/// let tf = session.factory();
/// let flag = tf.bool(true);
/// let one = tf.int(1);
///
/// match tf.add(&flag, &one) {
///     Err(Error::TypeMismatch { operation, .. }) => assert_eq!(operation, "add"),
///     other => panic!("unexpected result: {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// An operation was applied to operands of incompatible types.
    ///
    /// This is a programmer error in the code building the state and is signaled
    /// immediately by the term factory.
    #[error("Type mismatch in '{operation}' - expected {expected}, found {found}")]
    TypeMismatch {
        /// The operation that rejected its operands
        operation: &'static str,
        /// Description of the expected type
        expected: String,
        /// The type that was supplied
        found: TermType,
    },

    /// A lambda, call or quantifier received the wrong number of operands.
    #[error("Arity mismatch in '{operation}' - expected {expected}, found {found}")]
    Arity {
        /// The operation that rejected its operands
        operation: &'static str,
        /// The expected operand count
        expected: usize,
        /// The supplied operand count
        found: usize,
    },

    /// A term of the wrong shape was supplied where a specific term kind is required.
    #[error("Invalid term - {0}")]
    InvalidTerm(String),

    /// Internal inconsistency detected while building or rewriting a state.
    ///
    /// The error includes the source location where the inconsistency was detected for
    /// debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A rewrite pass failed.
    #[error("Pass '{pass}' failed - {message}")]
    Pipeline {
        /// Name of the failing pass
        pass: &'static str,
        /// What went wrong
        message: String,
    },

    /// A solving backend failed internally.
    ///
    /// Backends convert this into an `Unknown` verdict before it reaches the checker's
    /// caller; it only surfaces from backend-internal helpers.
    #[error("Solver error - {0}")]
    Solver(String),

    /// A desugaring adapter was registered twice for the same call key.
    #[error("Adapter already registered for {0}")]
    DuplicateAdapter(String),

    /// Failed to lock target.
    ///
    /// This error occurs when thread synchronization fails, typically
    /// when trying to acquire a mutex or rwlock that is in an invalid state.
    #[error("Failed to lock target")]
    LockError,
}

impl Error {
    /// Creates a [`Error::TypeMismatch`] for the given operation.
    pub(crate) fn mismatch(
        operation: &'static str,
        expected: impl Into<String>,
        found: &TermType,
    ) -> Self {
        Error::TypeMismatch {
            operation,
            expected: expected.into(),
            found: found.clone(),
        }
    }

    /// Returns `true` for errors caused by ill-typed or ill-shaped construction.
    #[must_use]
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Error::TypeMismatch { .. }
                | Error::Arity { .. }
                | Error::InvalidTerm(_)
                | Error::Malformed { .. }
        )
    }
}
