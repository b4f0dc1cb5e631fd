//! Tagged in-memory datum.
//!
//! Every variant is an explicit discriminant, so union branch selection never
//! has to guess whether `true` is a boolean or the integer `1`.  Integers are
//! carried as `i64` for both `int` and `long`; floating point as `f64` for
//! both `float` and `double`.
//!
//! Union branch indices never appear here: decoding a union yields the
//! branch's inner value directly.

use std::collections::HashMap;

use serde_json::{json, Value as Json};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<Value>),
    Map(HashMap<String, Value>),
    /// Fields in schema order.
    Record(Vec<(String, Value)>),
    /// Enum symbol.
    Enum(String),
    /// A value tagged with the full name of the named schema it belongs to.
    /// Encoding uses the tag to pin a union branch; decoding a union branch
    /// of a named type produces one, so decoded values re-encode unchanged.
    Named(String, Box<Value>),
}

impl Value {
    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn named(name: impl Into<String>, inner: Value) -> Self {
        Value::Named(name.into(), Box::new(inner))
    }

    /// Strip any `Named` tags.
    pub fn untagged(&self) -> &Value {
        let mut v = self;
        while let Value::Named(_, inner) = v {
            v = inner;
        }
        v
    }

    /// Look up a record field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self.untagged() {
            Value::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Observed kind, as used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null         => "null",
            Value::Boolean(_)   => "boolean",
            Value::Int(_)       => "integer",
            Value::Float(_)     => "fractional",
            Value::Bytes(_)     => "bytes",
            Value::String(_)    => "string",
            Value::Array(_)     => "array",
            Value::Map(_)       => "map",
            Value::Record(_)    => "record",
            Value::Enum(_)      => "enum symbol",
            Value::Named(_, _)  => "named value",
        }
    }

    /// JSON rendering for diagnostics and the CLI.  Bytes become a string of
    /// code points 0-255, one per byte; non-finite floats become `null`.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null          => Json::Null,
            Value::Boolean(b)    => json!(b),
            Value::Int(i)        => json!(i),
            Value::Float(f)      => serde_json::Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
            Value::Bytes(b)      => Json::String(b.iter().map(|&c| c as char).collect()),
            Value::String(s)     => json!(s),
            Value::Array(items)  => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(m)        => Json::Object(m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
            Value::Record(f)     => Json::Object(f.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
            Value::Enum(s)       => json!(s),
            Value::Named(_, v)   => v.to_json(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Boolean(b) }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self { Value::Int(i64::from(i)) }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self { Value::Int(i) }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self { Value::Float(f64::from(f)) }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self { Value::Float(f) }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::String(s.to_owned()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Value::String(s) }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self { Value::Bytes(b) }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self { Value::Bytes(b.to_vec()) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
