use std::cell::Cell;
use std::rc::Rc;

use crate::evaluator::Evaluator;
use crate::{resolution, Error, Promise, Scheduler, Value};

/// The privileged side of a promise.
///
/// A `Deferred` and its [`Promise`] are created together. Hand the promise to
/// consumers and settle it later with exactly one of [`fulfill`],
/// [`reject`] or [`resolve`]; once the promise has left the pending state
/// every further call is a silent no-op.
///
/// Clones control the same promise.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use thenable::{Deferred, State, TaskQueue, Value};
///
/// let queue = Rc::new(TaskQueue::new());
/// let deferred = Deferred::new(queue.clone());
/// deferred.fulfill(Value::from("🍓"));
/// deferred.reject(Value::from("too late"));
///
/// assert_eq!(deferred.promise().state(), State::Fulfilled);
/// assert_eq!(deferred.promise().result(), Some(Value::from("🍓")));
/// ```
///
/// [`fulfill`]: Deferred::fulfill
/// [`reject`]: Deferred::reject
/// [`resolve`]: Deferred::resolve
#[derive(Debug, Clone)]
pub struct Deferred {
    promise: Promise,
    /// Set by the first `resolve`, shared between clones.
    resolving: Rc<Cell<bool>>,
}

impl Deferred {
    pub fn new(scheduler: Rc<dyn Scheduler>) -> Self {
        Deferred {
            promise: Promise::pending(scheduler),
            resolving: Rc::default(),
        }
    }

    pub fn promise(&self) -> Promise {
        self.promise.clone()
    }

    /// Fulfill with `value` as is. A promise passed here becomes the
    /// fulfillment value, it is not adopted. Fulfilling with the deferred's
    /// own promise rejects with [`Error::SelfResolution`] instead.
    pub fn fulfill(&self, value: Value) {
        if let Value::Promise(promise) = &value {
            if promise.ptr_eq(&self.promise) {
                tracing::debug!("promise fulfilled with itself");
                self.reject(Error::SelfResolution.into());
                return;
            }
        }
        self.promise.settle(Ok(value));
    }

    pub fn reject(&self, reason: Value) {
        self.promise.settle(Err(reason));
    }

    /// Settle according to `outcome`, adopting the state of promises and
    /// thenables. See [`resolution::resolve`].
    ///
    /// Only the first call runs the procedure; later calls are ignored even
    /// while the adopted outcome is still pending. `fulfill` and `reject`
    /// are not locked by it.
    pub fn resolve(&self, outcome: Value) {
        if self.resolving.replace(true) {
            tracing::trace!("deferred already resolving, ignored");
            return;
        }
        resolution::resolve(self, outcome);
    }

    /// Same as `self.promise().then(..)`.
    pub fn then(&self, on_fulfilled: impl Into<Value>, on_rejected: impl Into<Value>) -> Promise {
        self.promise.then(on_fulfilled, on_rejected)
    }

    pub(crate) fn fulfiller(&self) -> Evaluator {
        let deferred = self.clone();
        Box::new(move |value| deferred.fulfill(value))
    }

    pub(crate) fn rejecter(&self) -> Evaluator {
        let deferred = self.clone();
        Box::new(move |reason| deferred.reject(reason))
    }
}
