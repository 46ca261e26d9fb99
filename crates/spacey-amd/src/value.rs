// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! JavaScript value representation seen by the loader.
//!
//! The loader only needs the shapes that flow through `define`/`require`:
//! primitives, arrays, plain objects and callables. Objects and functions
//! compare by identity, the way the engine compares them.

use crate::error::{LoaderError, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Signature of a Rust closure exposed as a JavaScript function.
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value> + Send + Sync;

/// A JavaScript value.
///
/// Values are thread-safe and can be shared between tasks, matching the
/// engine's value type.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// undefined
    #[default]
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Array literal
    Array(Vec<Value>),
    /// Plain object (shared, mutable)
    Object(ObjectRef),
    /// Function reference
    Function(Arc<NativeFunction>),
}

/// A shared, mutable property bag.
#[derive(Clone, Default)]
pub struct ObjectRef(Arc<RwLock<BTreeMap<String, Value>>>);

impl ObjectRef {
    /// Create an empty object
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a property, `undefined` when missing
    pub fn get(&self, key: &str) -> Value {
        self.0.read().get(key).cloned().unwrap_or_default()
    }

    /// Set a property
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.0.write().insert(key.into(), value);
    }

    /// Snapshot of all entries, in key order
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.0.read().keys().cloned().collect();
        write!(f, "Object({:?})", keys)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ObjectRef {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let map = iter.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self(Arc::new(RwLock::new(map)))
    }
}

/// A native (Rust) function with its own property bag.
///
/// Properties let the loader hang `require.config`, `define.amd` and
/// friends off the function object itself.
pub struct NativeFunction {
    name: String,
    func: Box<NativeFn>,
    properties: ObjectRef,
}

impl NativeFunction {
    /// The function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the function
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.func)(args)
    }

    /// The function's own properties
    pub fn properties(&self) -> &ObjectRef {
        &self.properties
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    /// Wrap a Rust closure as a function value.
    pub fn function<F>(name: impl Into<String>, func: F) -> Value
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Value::Function(Arc::new(NativeFunction {
            name: name.into(),
            func: Box::new(func),
            properties: ObjectRef::new(),
        }))
    }

    /// Build a plain object from key/value pairs.
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Value {
        Value::Object(entries.into_iter().collect())
    }

    /// Build an array of strings.
    pub fn string_array<S: AsRef<str>>(items: &[S]) -> Value {
        Value::Array(
            items
                .iter()
                .map(|s| Value::String(s.as_ref().to_string()))
                .collect(),
        )
    }

    /// Returns true if this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns true if this value is nullish (null or undefined).
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Returns true if this value is a string.
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Returns true if this value is an array.
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Returns true if this value is a function.
    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// String contents, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Array elements, if this is an array.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Converts the value to a boolean (ToBoolean).
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// Returns the type of this value as a string.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) | Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Property lookup; `undefined` for primitives and missing keys.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(obj) => obj.get(key),
            Value::Function(func) => func.properties().get(key),
            Value::Array(items) if key == "length" => Value::Number(items.len() as f64),
            _ => Value::Undefined,
        }
    }

    /// Property assignment on objects and functions.
    pub fn set(&self, key: impl Into<String>, value: Value) -> Result<()> {
        match self {
            Value::Object(obj) => obj.set(key, value),
            Value::Function(func) => func.properties().set(key, value),
            other => {
                return Err(LoaderError::type_error(format!(
                    "Cannot set properties of {}",
                    other.type_of()
                )));
            }
        }
        Ok(())
    }

    /// Call this value as a function.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        match self {
            Value::Function(func) => func.call(args),
            other => Err(LoaderError::type_error(format!("{} is not a function", other))),
        }
    }

    /// Convert a JSON document into a value.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from_json(v))))
            }
        }
    }

    /// Convert to JSON following `JSON.stringify` rules: functions and
    /// `undefined` are dropped from objects and become `null` in arrays.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Function(_) => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(obj) => serde_json::Value::Object(
                obj.entries()
                    .into_iter()
                    .filter(|(_, v)| !v.is_undefined() && !v.is_function())
                    .map(|(k, v)| (k, v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Function(func) => write!(f, "[Function: {}]", func.name()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_identity_equality() {
        let f = Value::function("f", |_| Ok(Value::Undefined));
        let g = Value::function("f", |_| Ok(Value::Undefined));
        assert_eq!(f, f.clone());
        assert_ne!(f, g);
    }

    #[test]
    fn test_object_identity_equality() {
        let a = Value::object([("x", Value::Number(1.0))]);
        let b = Value::object([("x", Value::Number(1.0))]);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_type_of() {
        assert_eq!(Value::Undefined.type_of(), "undefined");
        assert_eq!(Value::Null.type_of(), "object");
        assert_eq!(Value::string_array(&["a"]).type_of(), "object");
        assert_eq!(Value::function("f", |_| Ok(Value::Null)).type_of(), "function");
    }

    #[test]
    fn test_function_properties() {
        let f = Value::function("define", |_| Ok(Value::Undefined));
        f.set("amd", Value::Boolean(true)).unwrap();
        assert!(f.get("amd").to_boolean());
        assert!(f.get("missing").is_undefined());
    }

    #[test]
    fn test_set_on_primitive_fails() {
        assert!(Value::Number(1.0).set("x", Value::Null).is_err());
    }

    #[test]
    fn test_call_non_function() {
        let err = Value::from("nope").call(&[]).unwrap_err();
        assert!(matches!(err, LoaderError::TypeError(_)));
    }

    #[test]
    fn test_json_bridge_drops_functions() {
        let obj = Value::object([
            ("baseUrl", Value::from("lib/")),
            ("onError", Value::function("onError", |_| Ok(Value::Undefined))),
        ]);
        let json = obj.to_json();
        assert_eq!(json, serde_json::json!({ "baseUrl": "lib/" }));

        let back = Value::from_json(serde_json::json!({ "paths": { "a": ["b", "c"] } }));
        assert_eq!(back.get("paths").get("a"), Value::string_array(&["b", "c"]));
    }
}
