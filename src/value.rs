//! The values promises carry.
//!
//! Fulfillment values, rejection reasons and handler return values all live
//! in one closed universe: primitives, errors, objects, callables and
//! promises. Objects and callables carry properties so that a foreign value
//! can expose a `then` member, possibly behind an accessor that runs code on
//! every read.
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::{Error, Promise};

type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value, Value>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Error(Error),
    Object(Object),
    Function(Function),
    Promise(Promise),
}

impl Value {
    /// Shorthand for a generic raised error carrying `message`.
    pub fn error(message: impl Into<String>) -> Self {
        Value::Error(Error::thrown(message))
    }

    /// Read property `key`. Accessors run with `self` as `this`, and may
    /// fail. Values without properties read as `Undefined`.
    pub fn get(&self, key: &str) -> Result<Value, Value> {
        match self {
            Value::Object(object) => object.properties().get(self, key),
            Value::Function(function) => function.properties().get(self, key),
            _ => Ok(Value::Undefined),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Argument `index` of a native call, `Undefined` when it was not passed.
pub fn argument(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// Primitives compare by value, everything with identity by reference.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Promise(a), Value::Promise(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Error(e) => write!(f, "Error({e})"),
            Value::Object(o) => write!(f, "{o:?}"),
            Value::Function(func) => write!(f, "{func:?}"),
            Value::Promise(p) => write!(f, "{p:?}"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Error> for Value {
    fn from(e: Error) -> Self {
        Value::Error(e)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Promise> for Value {
    fn from(p: Promise) -> Self {
        Value::Promise(p)
    }
}

#[derive(Clone)]
pub enum Property {
    Data(Value),
    /// Getter invoked on every read.
    Accessor(Function),
}

#[derive(Default)]
struct Properties(RefCell<BTreeMap<String, Property>>);

impl Properties {
    fn get(&self, owner: &Value, key: &str) -> Result<Value, Value> {
        // Clone out so a getter can touch the same object.
        let property = self.0.borrow().get(key).cloned();
        match property {
            None => Ok(Value::Undefined),
            Some(Property::Data(value)) => Ok(value),
            Some(Property::Accessor(getter)) => getter.call(owner, &[]),
        }
    }

    fn define(&self, key: impl Into<String>, property: Property) {
        self.0.borrow_mut().insert(key.into(), property);
    }
}

/// A plain object: a bag of properties with reference identity.
#[derive(Clone, Default)]
pub struct Object(Rc<Properties>);

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Object::set`].
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.define(key, Property::Data(value.into()));
    }

    pub fn define_accessor(&self, key: impl Into<String>, getter: Function) {
        self.0.define(key, Property::Accessor(getter));
    }

    pub fn get(&self, key: &str) -> Result<Value, Value> {
        self.0.get(&Value::Object(self.clone()), key)
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn properties(&self) -> &Properties {
        &self.0
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.0 .0.borrow().keys().cloned().collect();
        f.debug_struct("Object").field("keys", &keys).finish()
    }
}

struct FunctionData {
    call: Box<NativeFn>,
    properties: Properties,
}

/// A callable value. A call receives `this` and its arguments and either
/// returns a value or raises a reason with `Err`.
#[derive(Clone)]
pub struct Function(Rc<FunctionData>);

impl Function {
    pub fn new<F>(call: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, Value> + 'static,
    {
        Function(Rc::new(FunctionData {
            call: Box::new(call),
            properties: Properties::default(),
        }))
    }

    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value, Value> {
        (self.0.call)(this, args)
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.properties.define(key, Property::Data(value.into()));
    }

    pub fn define_accessor(&self, key: impl Into<String>, getter: Function) {
        self.0.properties.define(key, Property::Accessor(getter));
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn properties(&self) -> &Properties {
        &self.0.properties
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({:p})", Rc::as_ptr(&self.0))
    }
}
