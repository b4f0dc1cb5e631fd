//! Union branch selection.
//!
//! The rule order below is a cross-implementation contract: two writers fed
//! the same value and the same union must pick the same branch.  Rules are
//! tried top to bottom; within a rule the union is scanned in schema order.
//!
//! 1. `Null` -> `null` branch.
//! 2. `Boolean` -> `boolean` branch, checked by type before any numeric rule.
//! 3. `Bytes` -> `bytes` branch, else a `fixed` of matching length.  Bytes
//!    are never converted to `string`.
//! 4. `String` -> `string` branch.
//! 5. `Int` -> the narrowest of `int`, `long`, `float`, `double` that is
//!    present and holds the value losslessly.
//! 6. `Float` -> the first `float` or `double` branch in schema order.
//! 7. `Array` -> first `array`; `Map` -> first `map`.
//! 8. `Named` -> the named branch with that name; an untagged `Record` or
//!    `Enum` -> the first structurally compatible record / enum branch.
//!    A record is compatible when every field value conforms to its declared
//!    type, so `[A{x:int}, B{x:string}]` tells `{x:"s"}` apart.

use crate::error::{Error, Result};
use crate::schema::{names_match, Kind, Schema, SchemaNode, SchemaRef};
use crate::value::Value;

/// Largest integer magnitude a binary32 holds exactly.
const F32_EXACT: i64 = 1 << 24;
/// Largest integer magnitude a binary64 holds exactly.
const F64_EXACT: i64 = 1 << 53;

/// Pick the branch index `value` encodes under.
pub fn select_branch(value: &Value, schema: &Schema, branches: &[SchemaRef]) -> Result<usize> {
    let find = |kind: Kind| branches.iter().position(|b| schema.kind(*b) == kind);

    let found = match value {
        Value::Null       => find(Kind::Null),
        Value::Boolean(_) => find(Kind::Boolean),
        Value::Bytes(b)   => find(Kind::Bytes).or_else(|| {
            branches.iter().position(|br| matches!(
                schema.node(*br), SchemaNode::Fixed { size, .. } if *size == b.len()
            ))
        }),
        Value::String(_)  => find(Kind::String),
        Value::Int(i)     => [Kind::Int, Kind::Long, Kind::Float, Kind::Double]
            .into_iter()
            .filter(|k| int_fits(*i, *k))
            .find_map(find),
        Value::Float(_)   => branches.iter()
            .position(|b| matches!(schema.kind(*b), Kind::Float | Kind::Double)),
        Value::Array(_)   => find(Kind::Array),
        Value::Map(_)     => find(Kind::Map),
        Value::Named(name, _) => branches.iter()
            .position(|b| schema.node(*b).name() == Some(name.as_str()))
            .or_else(|| branches.iter().position(|b| {
                schema.node(*b).name().is_some_and(|n| names_match(n, name))
            })),
        Value::Record(fields) => branches.iter()
            .position(|b| record_compatible(fields, schema, *b)),
        Value::Enum(symbol) => branches.iter().position(|b| matches!(
            schema.node(*b), SchemaNode::Enum { symbols, .. } if symbols.contains(symbol)
        )),
    };

    found.ok_or_else(|| no_match(value, schema, branches))
}

fn int_fits(i: i64, kind: Kind) -> bool {
    match kind {
        Kind::Int    => i32::try_from(i).is_ok(),
        Kind::Long   => true,
        Kind::Float  => (-F32_EXACT..=F32_EXACT).contains(&i),
        Kind::Double => (-F64_EXACT..=F64_EXACT).contains(&i),
        _            => false,
    }
}

/// Every value field is declared and conforms to its declared type, and
/// every declared field without a default is present.
fn record_compatible(fields: &[(String, Value)], schema: &Schema, node: SchemaRef) -> bool {
    let SchemaNode::Record { fields: declared, .. } = schema.node(node) else {
        return false;
    };
    fields.iter().all(|(name, value)| {
        declared.iter().any(|d| &d.name == name && conforms(value, schema, d.schema))
    }) && declared.iter()
        .filter(|d| d.default.is_none())
        .all(|d| fields.iter().any(|(name, _)| name == &d.name))
}

/// Whether `value` would encode under `node`.
fn conforms(value: &Value, schema: &Schema, node: SchemaRef) -> bool {
    let n = schema.node(node);
    match (value, n) {
        (Value::Named(name, inner), _) => match n {
            SchemaNode::Union(branches) => select_branch(value, schema, branches).is_ok(),
            _ => n.name().is_some_and(|own| names_match(own, name)) && conforms(inner, schema, node),
        },
        (_, SchemaNode::Union(branches)) => select_branch(value, schema, branches).is_ok(),
        (Value::Null, SchemaNode::Null)
        | (Value::Boolean(_), SchemaNode::Boolean)
        | (Value::Int(_), SchemaNode::Long | SchemaNode::Float | SchemaNode::Double)
        | (Value::Float(_), SchemaNode::Float | SchemaNode::Double)
        | (Value::Bytes(_), SchemaNode::Bytes)
        | (Value::String(_), SchemaNode::String) => true,
        (Value::Int(i), SchemaNode::Int) => i32::try_from(*i).is_ok(),
        (Value::Bytes(b), SchemaNode::Fixed { size, .. }) => b.len() == *size,
        (Value::Enum(s) | Value::String(s), SchemaNode::Enum { symbols, .. }) => symbols.contains(s),
        (Value::Array(items), SchemaNode::Array(item)) => items.iter().all(|v| conforms(v, schema, *item)),
        (Value::Map(entries), SchemaNode::Map(values)) => entries.values().all(|v| conforms(v, schema, *values)),
        (Value::Record(fields), SchemaNode::Record { .. }) => record_compatible(fields, schema, node),
        _ => false,
    }
}

fn no_match(value: &Value, schema: &Schema, branches: &[SchemaRef]) -> Error {
    let available = branches.iter()
        .map(|b| schema.describe(*b))
        .collect::<Vec<_>>()
        .join(", ");
    let found = match value {
        Value::Named(name, inner) => format!("{} tagged `{name}`", inner.kind_name()),
        other                     => other.kind_name().to_owned(),
    };
    Error::NoMatchingUnionBranch { found, branches: available }
}
