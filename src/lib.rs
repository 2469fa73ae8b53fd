//! Deferreds and chainable promises.
//!
//! A [`Deferred`] owns a [`Promise`] and is the only thing allowed to settle
//! it. Consumers chain work on the promise with [`Promise::then`]; every
//! handler runs on the injected [`Scheduler`], never in the caller's turn.
//! [`Deferred::resolve`] adopts the outcome of other promises and of foreign
//! thenables (any object exposing a callable `then`).
//!
//! # Examples
//!
//! ```
//! use std::rc::Rc;
//! use thenable::{defer, Function, State, TaskQueue, Value};
//!
//! let queue = Rc::new(TaskQueue::new());
//! let deferred = defer(queue.clone());
//! let doubled = deferred.promise().then(
//!     Function::new(|_, args| match args.first() {
//!         Some(Value::Number(n)) => Ok(Value::Number(n * 2.0)),
//!         _ => Ok(Value::Undefined),
//!     }),
//!     Value::Undefined,
//! );
//!
//! deferred.fulfill(Value::from(21.0));
//! assert_eq!(doubled.state(), State::Pending);
//!
//! queue.run_until_idle();
//! assert_eq!(doubled.result(), Some(Value::Number(42.0)));
//! ```

pub mod deferred;
pub mod evaluator;
pub mod predicates;
pub mod promise;
pub mod resolution;
pub mod scheduler;
pub mod value;

use std::rc::Rc;

pub use deferred::Deferred;
pub use promise::{Promise, Settled, State};
pub use scheduler::{Scheduler, TaskQueue};
pub use value::{Function, Object, Property, Value};

/// Class of an [`Error`], mirroring the error classes a host reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A value had the wrong shape for the operation, e.g. a promise
    /// resolved with itself.
    Type,
    /// Any other raised error.
    Generic,
}

/// Errors raised by this crate, carried as rejection reasons via
/// [`Value::Error`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A deferred was settled with its own promise.
    #[error("cannot resolve a promise with itself")]
    SelfResolution,
    /// A generic error carrying a message.
    #[error("{0}")]
    Thrown(String),
}

impl Error {
    /// The class this error belongs to; self-resolution is a type error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SelfResolution => ErrorKind::Type,
            Error::Thrown(_) => ErrorKind::Generic,
        }
    }

    /// Shorthand for [`Error::Thrown`].
    pub fn thrown(message: impl Into<String>) -> Self {
        Error::Thrown(message.into())
    }
}

/// Creates a pending deferred whose handlers run on `scheduler`.
pub fn defer(scheduler: Rc<dyn Scheduler>) -> Deferred {
    Deferred::new(scheduler)
}

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
