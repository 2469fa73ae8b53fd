//! Binding `then` handlers to the deferred they settle.
use crate::scheduler::Callback;
use crate::{Deferred, Value};

/// A scheduled unit of work that receives the settled result.
pub type Evaluator = Callback;

/// What to run against a settled result.
#[derive(Debug, Clone)]
pub enum Handler {
    Callback(crate::Function),
    /// Default `on_fulfilled`: hand the value on unchanged.
    PassThrough,
    /// Default `on_rejected`: raise the reason again.
    Rethrow,
}

impl Handler {
    pub fn on_fulfilled(candidate: Value) -> Self {
        Self::callback(candidate).unwrap_or(Handler::PassThrough)
    }

    pub fn on_rejected(candidate: Value) -> Self {
        Self::callback(candidate).unwrap_or(Handler::Rethrow)
    }

    fn callback(candidate: Value) -> Option<Self> {
        match candidate {
            Value::Function(function) => Some(Handler::Callback(function)),
            _ => None,
        }
    }

    /// `Err` means the handler raised.
    pub fn invoke(&self, result: Value) -> Result<Value, Value> {
        match self {
            Handler::Callback(function) => function.call(&Value::Undefined, &[result]),
            Handler::PassThrough => Ok(result),
            Handler::Rethrow => Err(result),
        }
    }
}

/// Wrap `handler` so that, once run with a settled result, its outcome
/// settles `dependent`: a raise rejects it, anything returned goes through
/// the resolution procedure.
pub fn create_evaluator(handler: Handler, dependent: Deferred) -> Evaluator {
    Box::new(move |result| match handler.invoke(result) {
        Ok(outcome) => dependent.resolve(outcome),
        Err(reason) => {
            tracing::trace!(?reason, "handler raised");
            dependent.reject(reason);
        }
    })
}
