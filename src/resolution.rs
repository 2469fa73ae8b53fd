//! The promise resolution procedure.
//!
//! Given an arbitrary outcome, decide how a deferred settles:
//!
//! 1. its own promise rejects it with [`Error::SelfResolution`];
//! 2. a promise of this crate is adopted directly, synchronously when it
//!    has already settled;
//! 3. an object or function whose `then` member is callable is treated as a
//!    foreign thenable and asked to report its outcome;
//! 4. anything else fulfills the deferred as is.
//!
//! Foreign thenables are not trusted. `then` is read exactly once, a raise
//! while reading or calling it becomes a rejection, and of the two
//! callbacks handed to it only the first call counts.
use std::cell::Cell;
use std::rc::Rc;

use crate::predicates::is_object_or_function;
use crate::value::argument;
use crate::{Deferred, Error, Function, Promise, Value};

/// An outcome after the `then` probe.
enum Outcome {
    Plain(Value),
    Native(Promise),
    Thenable { thenable: Value, then: Function },
    /// Reading `then` raised.
    Raised(Value),
}

impl Outcome {
    fn classify(x: Value) -> Self {
        let x = match x {
            Value::Promise(promise) => return Outcome::Native(promise),
            other => other,
        };
        if !is_object_or_function(&x) {
            return Outcome::Plain(x);
        }
        // Single read, an accessor may answer differently next time.
        match x.get("then") {
            Ok(Value::Function(then)) => Outcome::Thenable { thenable: x, then },
            Ok(_) => Outcome::Plain(x),
            Err(reason) => Outcome::Raised(reason),
        }
    }
}

/// Settle `deferred` according to `x`.
///
/// Nested thenables are followed by re-entering this procedure for every
/// value a thenable reports. There is no depth limit: a thenable that keeps
/// reporting fresh thenables synchronously recurses for as long as it does.
pub fn resolve(deferred: &Deferred, x: Value) {
    if let Value::Promise(promise) = &x {
        if promise.ptr_eq(&deferred.promise()) {
            tracing::debug!("promise resolved with itself");
            deferred.reject(Error::SelfResolution.into());
            return;
        }
    }

    match Outcome::classify(x) {
        Outcome::Plain(value) => deferred.fulfill(value),
        Outcome::Native(promise) => adopt(deferred, &promise),
        Outcome::Thenable { thenable, then } => call_then(deferred, thenable, then),
        Outcome::Raised(reason) => {
            tracing::debug!(?reason, "reading `then` raised");
            deferred.reject(reason);
        }
    }
}

fn adopt(deferred: &Deferred, promise: &Promise) {
    match promise.settlement() {
        Some(Ok(value)) => deferred.fulfill(value),
        Some(Err(reason)) => deferred.reject(reason),
        None => promise.register(deferred.fulfiller(), deferred.rejecter()),
    }
}

fn call_then(deferred: &Deferred, thenable: Value, then: Function) {
    let called = Rc::new(Cell::new(false));

    let resolve_promise = {
        let deferred = deferred.clone();
        let called = called.clone();
        Function::new(move |_, args| {
            if !called.replace(true) {
                resolve(&deferred, argument(args, 0));
            }
            Ok(Value::Undefined)
        })
    };
    let reject_promise = {
        let deferred = deferred.clone();
        let called = called.clone();
        Function::new(move |_, args| {
            if !called.replace(true) {
                deferred.reject(argument(args, 0));
            }
            Ok(Value::Undefined)
        })
    };

    if let Err(reason) = then.call(&thenable, &[resolve_promise.into(), reject_promise.into()]) {
        if called.replace(true) {
            tracing::trace!(?reason, "`then` raised after reporting, ignored");
        } else {
            tracing::debug!(?reason, "`then` raised");
            deferred.reject(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Object, State, TaskQueue};

    fn setup() -> (Deferred, Rc<TaskQueue>) {
        let queue = Rc::new(TaskQueue::new());
        (Deferred::new(queue.clone()), queue)
    }

    /// An object whose `then` calls back synchronously with `report`.
    fn thenable(report: Result<Value, Value>) -> Value {
        Object::new()
            .with(
                "then",
                Function::new(move |_, args| {
                    let (callback, value) = match &report {
                        Ok(value) => (argument(args, 0), value.clone()),
                        Err(reason) => (argument(args, 1), reason.clone()),
                    };
                    match callback {
                        Value::Function(f) => f.call(&Value::Undefined, &[value]),
                        _ => Ok(Value::Undefined),
                    }
                }),
            )
            .into()
    }

    #[test]
    fn test_self_resolution_rejects_with_type_error() {
        let (d, _queue) = setup();
        d.resolve(d.promise().into());
        assert_eq!(d.promise().state(), State::Rejected);
        assert_eq!(d.promise().result(), Some(Value::Error(Error::SelfResolution)));
    }

    #[test]
    fn test_plain_values_fulfill_immediately() {
        for value in [
            Value::from(1.0),
            Value::from("s"),
            Value::Null,
            Object::new().with("then", 5.0).into(),
        ] {
            let (d, _queue) = setup();
            d.resolve(value.clone());
            assert_eq!(d.promise().result(), Some(value));
        }
    }

    #[test]
    fn test_settled_native_promise_is_adopted_synchronously() {
        let (d, queue) = setup();
        let source = Deferred::new(queue.clone());
        source.reject(Value::from("r"));
        d.resolve(source.promise().into());
        assert_eq!(d.promise().state(), State::Rejected);
        assert_eq!(d.promise().result(), Some(Value::from("r")));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pending_native_promise_is_followed() {
        let (d, queue) = setup();
        let source = Deferred::new(queue.clone());
        d.resolve(source.promise().into());
        assert_eq!(d.promise().state(), State::Pending);

        source.fulfill(Value::from(9.0));
        queue.run_until_idle();
        assert_eq!(d.promise().result(), Some(Value::from(9.0)));
    }

    #[test]
    fn test_nested_thenables_are_adopted() {
        let (d, _queue) = setup();
        d.resolve(thenable(Ok(thenable(Ok(Value::from("deep"))))));
        assert_eq!(d.promise().result(), Some(Value::from("deep")));

        let (d, _queue) = setup();
        d.resolve(thenable(Ok(thenable(Err(Value::from("bad"))))));
        assert_eq!(d.promise().state(), State::Rejected);
        assert_eq!(d.promise().result(), Some(Value::from("bad")));
    }

    #[test]
    fn test_rejection_reason_is_not_unwrapped() {
        let (d, _queue) = setup();
        let reason = thenable(Ok(Value::from(1.0)));
        d.resolve(thenable(Err(reason.clone())));
        assert_eq!(d.promise().result(), Some(reason));
    }

    #[test]
    fn test_then_is_called_with_the_thenable_as_this() {
        let (d, _queue) = setup();
        let object = Object::new();
        let expected = Value::from(object.clone());
        object.set(
            "then",
            Function::new(move |this, args| {
                let same = *this == expected;
                match argument(args, 0) {
                    Value::Function(f) => f.call(&Value::Undefined, &[Value::Bool(same)]),
                    _ => Ok(Value::Undefined),
                }
            }),
        );
        d.resolve(object.into());
        assert_eq!(d.promise().result(), Some(Value::Bool(true)));
    }

    #[test]
    fn test_raising_getter_rejects() {
        let (d, _queue) = setup();
        let object = Object::new();
        object.define_accessor("then", Function::new(|_, _| Err(Value::from("getter"))));
        d.resolve(object.into());
        assert_eq!(d.promise().state(), State::Rejected);
        assert_eq!(d.promise().result(), Some(Value::from("getter")));
    }

    #[test]
    fn test_raising_then_rejects() {
        let (d, _queue) = setup();
        let object = Object::new().with("then", Function::new(|_, _| Err(Value::from("then"))));
        d.resolve(object.into());
        assert_eq!(d.promise().result(), Some(Value::from("then")));
    }

    #[test]
    fn test_first_callback_wins() {
        let (d, _queue) = setup();
        let object = Object::new().with(
            "then",
            Function::new(|_, args| {
                if let Value::Function(resolve) = argument(args, 0) {
                    resolve.call(&Value::Undefined, &[Value::from("first")])?;
                    resolve.call(&Value::Undefined, &[Value::from("second")])?;
                }
                if let Value::Function(reject) = argument(args, 1) {
                    reject.call(&Value::Undefined, &[Value::from("third")])?;
                }
                Err(Value::from("fourth"))
            }),
        );
        d.resolve(object.into());
        assert_eq!(d.promise().state(), State::Fulfilled);
        assert_eq!(d.promise().result(), Some(Value::from("first")));
    }

    #[test]
    fn test_raise_after_resolving_with_pending_value_is_ignored() {
        let (d, queue) = setup();
        let source = Deferred::new(queue.clone());
        let pending = source.promise();
        let object = Object::new().with(
            "then",
            Function::new(move |_, args| {
                if let Value::Function(resolve) = argument(args, 0) {
                    resolve.call(&Value::Undefined, &[pending.clone().into()])?;
                }
                Err(Value::from("late raise"))
            }),
        );
        d.resolve(object.into());
        assert_eq!(d.promise().state(), State::Pending);

        source.fulfill(Value::from("adopted"));
        queue.run_until_idle();
        assert_eq!(d.promise().result(), Some(Value::from("adopted")));
    }

    #[test]
    fn test_callbacks_called_after_then_returns() {
        let (d, queue) = setup();
        let stash: Rc<std::cell::RefCell<Option<Value>>> = Rc::default();
        let slot = stash.clone();
        let object = Object::new().with(
            "then",
            Function::new(move |_, args| {
                *slot.borrow_mut() = Some(argument(args, 1));
                Ok(Value::Undefined)
            }),
        );
        d.resolve(object.into());
        assert_eq!(d.promise().state(), State::Pending);

        let reject = stash.borrow_mut().take();
        if let Some(Value::Function(reject)) = reject {
            reject.call(&Value::Undefined, &[Value::from("later")]).unwrap();
        }
        assert_eq!(d.promise().result(), Some(Value::from("later")));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_then_read_exactly_once() {
        let (d, _queue) = setup();
        let reads = Rc::new(Cell::new(0));
        let counter = reads.clone();
        let object = Object::new();
        object.define_accessor(
            "then",
            Function::new(move |_, _| {
                counter.set(counter.get() + 1);
                if counter.get() == 1 {
                    Ok(Function::new(|_, args| match argument(args, 0) {
                        Value::Function(f) => f.call(&Value::Undefined, &[Value::from("once")]),
                        _ => Ok(Value::Undefined),
                    })
                    .into())
                } else {
                    Err(Value::from("read twice"))
                }
            }),
        );
        d.resolve(object.into());
        assert_eq!(reads.get(), 1);
        assert_eq!(d.promise().result(), Some(Value::from("once")));
    }

    #[test]
    fn test_function_with_then_is_a_thenable() {
        let (d, _queue) = setup();
        let callable = Function::new(|_, _| Ok(Value::Undefined));
        callable.set(
            "then",
            Function::new(|_, args| match argument(args, 1) {
                Value::Function(f) => f.call(&Value::Undefined, &[Value::from("fn")]),
                _ => Ok(Value::Undefined),
            }),
        );
        d.resolve(callable.into());
        assert_eq!(d.promise().state(), State::Rejected);
        assert_eq!(d.promise().result(), Some(Value::from("fn")));
    }
}
