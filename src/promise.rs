use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::evaluator::{create_evaluator, Evaluator, Handler};
use crate::{Deferred, Scheduler, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Fulfilled,
    Rejected,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Pending => "pending",
            State::Fulfilled => "fulfilled",
            State::Rejected => "rejected",
        })
    }
}

enum Status {
    Pending {
        on_fulfilled: Vec<Evaluator>,
        on_rejected: Vec<Evaluator>,
    },
    Fulfilled(Value),
    Rejected(Value),
}

struct Inner {
    status: Status,
    wakers: Vec<Waker>,
}

struct Shared {
    inner: RefCell<Inner>,
    scheduler: Rc<dyn Scheduler>,
}

/// Read-facing handle to an eventual value.
///
/// Clones share the same underlying promise; identity is compared with
/// [`Promise::ptr_eq`]. Only the owning [`Deferred`] can settle it.
#[derive(Clone)]
pub struct Promise {
    shared: Rc<Shared>,
}

impl Promise {
    pub(crate) fn pending(scheduler: Rc<dyn Scheduler>) -> Self {
        Promise {
            shared: Rc::new(Shared {
                inner: RefCell::new(Inner {
                    status: Status::Pending {
                        on_fulfilled: vec![],
                        on_rejected: vec![],
                    },
                    wakers: vec![],
                }),
                scheduler,
            }),
        }
    }

    pub fn state(&self) -> State {
        match self.shared.inner.borrow().status {
            Status::Pending { .. } => State::Pending,
            Status::Fulfilled(_) => State::Fulfilled,
            Status::Rejected(_) => State::Rejected,
        }
    }

    /// The fulfillment value or rejection reason, `None` while pending.
    pub fn result(&self) -> Option<Value> {
        self.settlement().map(|settled| match settled {
            Ok(value) | Err(value) => value,
        })
    }

    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    /// Register interest in the eventual value.
    ///
    /// Returns a new promise settled by running the matching handler on the
    /// scheduler and resolving its outcome. A handler that is not a
    /// [`Function`](crate::Function) is replaced by a pass-through (for
    /// `on_fulfilled`) or a re-raise (for `on_rejected`). Neither handler
    /// ever runs before `then` returns, even if this promise has already
    /// settled.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::rc::Rc;
    /// use thenable::{defer, State, TaskQueue, Value};
    ///
    /// let queue = Rc::new(TaskQueue::new());
    /// let deferred = defer(queue.clone());
    /// deferred.reject(Value::from("💥"));
    ///
    /// let next = deferred.promise().then(Value::Undefined, Value::Undefined);
    /// assert_eq!(next.state(), State::Pending);
    /// queue.run_until_idle();
    /// assert_eq!(next.state(), State::Rejected);
    /// assert_eq!(next.result(), Some(Value::from("💥")));
    /// ```
    pub fn then(&self, on_fulfilled: impl Into<Value>, on_rejected: impl Into<Value>) -> Promise {
        let dependent = Deferred::new(self.shared.scheduler.clone());
        self.register(
            create_evaluator(Handler::on_fulfilled(on_fulfilled.into()), dependent.clone()),
            create_evaluator(Handler::on_rejected(on_rejected.into()), dependent.clone()),
        );
        dependent.promise()
    }

    /// A future that completes with `Ok(value)` or `Err(reason)` once this
    /// promise settles. Polling it does not drive the scheduler.
    pub fn settled(&self) -> Settled {
        Settled {
            promise: self.clone(),
        }
    }

    /// Queue the evaluators, or schedule the matching one right away if
    /// already settled.
    pub(crate) fn register(&self, on_fulfilled: Evaluator, on_rejected: Evaluator) {
        let mut inner = self.shared.inner.borrow_mut();
        let (evaluator, result) = match &mut inner.status {
            Status::Pending {
                on_fulfilled: fulfilled_queue,
                on_rejected: rejected_queue,
            } => {
                fulfilled_queue.push(on_fulfilled);
                rejected_queue.push(on_rejected);
                return;
            }
            Status::Fulfilled(value) => (on_fulfilled, value.clone()),
            Status::Rejected(reason) => (on_rejected, reason.clone()),
        };
        drop(inner);
        self.shared.scheduler.schedule(evaluator, result);
    }

    pub(crate) fn settlement(&self) -> Option<Result<Value, Value>> {
        match &self.shared.inner.borrow().status {
            Status::Pending { .. } => None,
            Status::Fulfilled(value) => Some(Ok(value.clone())),
            Status::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    /// Leave the pending state. Returns `false`, changing nothing, if the
    /// promise had already settled.
    pub(crate) fn settle(&self, settlement: Result<Value, Value>) -> bool {
        let (queue, wakers) = {
            let mut inner = self.shared.inner.borrow_mut();
            let (on_fulfilled, on_rejected) = match &mut inner.status {
                Status::Pending {
                    on_fulfilled,
                    on_rejected,
                } => (mem::take(on_fulfilled), mem::take(on_rejected)),
                _ => return false,
            };
            let queue = match &settlement {
                Ok(value) => {
                    inner.status = Status::Fulfilled(value.clone());
                    on_fulfilled
                }
                Err(reason) => {
                    inner.status = Status::Rejected(reason.clone());
                    on_rejected
                }
            };
            (queue, mem::take(&mut inner.wakers))
        };

        let (state, result) = match settlement {
            Ok(value) => (State::Fulfilled, value),
            Err(reason) => (State::Rejected, reason),
        };
        tracing::trace!(%state, handlers = queue.len(), "promise settled");
        for evaluator in queue {
            self.shared.scheduler.schedule(evaluator, result.clone());
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A nested promise prints as `Promise`, results may form cycles.
        let shallow = |value: &Value| match value {
            Value::Promise(_) => "Promise".to_string(),
            other => format!("{other:?}"),
        };
        match self.settlement() {
            None => write!(f, "Promise {{ <pending> }}"),
            Some(Ok(value)) => write!(f, "Promise {{ <fulfilled>: {} }}", shallow(&value)),
            Some(Err(reason)) => write!(f, "Promise {{ <rejected>: {} }}", shallow(&reason)),
        }
    }
}

/// Future returned by [`Promise::settled`].
#[derive(Debug)]
pub struct Settled {
    promise: Promise,
}

impl Future for Settled {
    type Output = Result<Value, Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(settled) = self.promise.settlement() {
            return Poll::Ready(settled);
        }
        let mut inner = self.promise.shared.inner.borrow_mut();
        if !inner.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
            inner.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}
