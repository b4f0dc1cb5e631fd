//! Field default materialization.
//!
//! A default is a JSON literal interpreted against the field's schema.  For a
//! union, an explicit `null` goes to the `null` branch; any other literal is
//! tried against the first branch and, failing that, against the remaining
//! branches in order.

use serde_json::Value as Json;

use crate::encoding::composite::tag_branch;
use crate::error::{Error, Result};
use crate::schema::{Kind, Schema, SchemaNode, SchemaRef};
use crate::value::Value;

pub fn materialize(literal: &Json, schema: &Schema, node: SchemaRef) -> Result<Value> {
    let mismatch = || Error::mismatch(format!("default for {}", schema.describe(node)), json_kind(literal));

    Ok(match (schema.node(node), literal) {
        (SchemaNode::Null, Json::Null)          => Value::Null,
        (SchemaNode::Boolean, Json::Bool(b))    => Value::Boolean(*b),
        (SchemaNode::Int, Json::Number(n)) => {
            let i = n.as_i64().ok_or_else(mismatch)?;
            i32::try_from(i).map_err(|_| Error::Range { value: i })?;
            Value::Int(i)
        }
        (SchemaNode::Long, Json::Number(n))     => Value::Int(n.as_i64().ok_or_else(mismatch)?),
        (SchemaNode::Float, Json::Number(n)) => {
            let f = n.as_f64().ok_or_else(mismatch)?;
            Value::Float(f64::from(f as f32))
        }
        (SchemaNode::Double, Json::Number(n))   => Value::Float(n.as_f64().ok_or_else(mismatch)?),
        (SchemaNode::Bytes, Json::String(s))    => Value::Bytes(latin1(s).ok_or_else(mismatch)?),
        (SchemaNode::String, Json::String(s))   => Value::String(s.clone()),
        (SchemaNode::Fixed { name, size }, Json::String(s)) => {
            let bytes = latin1(s).ok_or_else(mismatch)?;
            if bytes.len() != *size {
                return Err(Error::SizeMismatch { name: name.clone(), expected: *size, found: bytes.len() });
            }
            Value::Bytes(bytes)
        }
        (SchemaNode::Enum { name, symbols, .. }, Json::String(s)) => {
            if !symbols.contains(s) {
                return Err(Error::UnknownSymbol { name: name.clone(), symbol: s.clone() });
            }
            Value::Enum(s.clone())
        }
        (SchemaNode::Array(items), Json::Array(values)) => Value::Array(
            values.iter()
                .map(|v| materialize(v, schema, *items))
                .collect::<Result<Vec<_>>>()?,
        ),
        (SchemaNode::Map(values), Json::Object(entries)) => Value::Map(
            entries.iter()
                .map(|(k, v)| materialize(v, schema, *values).map(|m| (k.clone(), m)))
                .collect::<Result<_>>()?,
        ),
        (SchemaNode::Record { name, fields }, Json::Object(given)) => {
            let mut out = Vec::with_capacity(fields.len());
            for field in fields {
                let literal = given.get(&field.name)
                    .or(field.default.as_ref())
                    .ok_or_else(|| Error::MissingField { record: name.clone(), field: field.name.clone() })?;
                out.push((field.name.clone(), materialize(literal, schema, field.schema)?));
            }
            Value::Record(out)
        }
        (SchemaNode::Union(branches), _) => return union_default(literal, schema, branches),
        _ => return Err(mismatch()),
    })
}

fn union_default(literal: &Json, schema: &Schema, branches: &[SchemaRef]) -> Result<Value> {
    if literal.is_null() && branches.iter().any(|b| schema.kind(*b) == Kind::Null) {
        return Ok(Value::Null);
    }
    let (first, rest) = branches.split_first()
        .ok_or_else(|| Error::Schema("default declared for an empty union".into()))?;
    match materialize(literal, schema, *first) {
        Ok(v) => Ok(tag_branch(schema, *first, v)),
        Err(first_err) => rest.iter()
            .find_map(|b| materialize(literal, schema, *b).ok().map(|v| tag_branch(schema, *b, v)))
            .ok_or(first_err),
    }
}

/// JSON encodes `bytes` / `fixed` defaults as one code point (0-255) per byte.
fn latin1(s: &str) -> Option<Vec<u8>> {
    s.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect()
}

fn json_kind(v: &Json) -> &'static str {
    match v {
        Json::Null      => "null literal",
        Json::Bool(_)   => "boolean literal",
        Json::Number(_) => "number literal",
        Json::String(_) => "string literal",
        Json::Array(_)  => "array literal",
        Json::Object(_) => "object literal",
    }
}
