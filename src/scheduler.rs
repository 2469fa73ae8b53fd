//! "Run later, not now".
//!
//! Every handler a promise runs goes through a [`Scheduler`]. The only
//! guarantee a scheduler must give is that a callback runs after the
//! `schedule` call has returned, and that callbacks scheduled on the same
//! scheduler run in the order they were scheduled.
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;

use crate::Value;

/// A unit of deferred work: a callback and the argument it will get.
pub type Callback = Box<dyn FnOnce(Value)>;

pub trait Scheduler {
    /// Queue `callback` to be invoked with `argument` in a later turn.
    fn schedule(&self, callback: Callback, argument: Value);
}

/// Single-threaded FIFO task queue.
///
/// Nothing runs until the owner asks for it, which makes it usable both as
/// the host queue of a small event loop and as a simulated scheduler that
/// tests can single-step.
///
/// ```
/// use thenable::{Scheduler, TaskQueue, Value};
/// use std::{cell::Cell, rc::Rc};
///
/// let queue = TaskQueue::new();
/// let seen = Rc::new(Cell::new(false));
/// let flag = seen.clone();
/// queue.schedule(Box::new(move |_| flag.set(true)), Value::Undefined);
/// assert!(!seen.get());
/// assert!(queue.run_next());
/// assert!(seen.get());
/// ```
#[derive(Default)]
pub struct TaskQueue {
    tasks: RefCell<VecDeque<(Callback, Value)>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Run the oldest queued task. Returns `false` if the queue was empty.
    pub fn run_next(&self) -> bool {
        // The borrow must end before the task runs, tasks schedule more tasks.
        let next = self.tasks.borrow_mut().pop_front();
        match next {
            Some((callback, argument)) => {
                callback(argument);
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty, including tasks queued while
    /// draining. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl Scheduler for TaskQueue {
    fn schedule(&self, callback: Callback, argument: Value) {
        self.tasks.borrow_mut().push_back((callback, argument));
        tracing::trace!(pending = self.len(), "task scheduled");
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue").field("len", &self.len()).finish()
    }
}
