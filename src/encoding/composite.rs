//! Schema-directed encoding of whole values.
//!
//! Arrays and maps are written as a sequence of count blocks closed by a
//! zero count.  A negative count is followed by the block's byte size, which
//! lets [`skip`] step over the block without decoding its items.  Records are
//! the concatenation of their fields in schema order; field names never
//! reach the wire.

use std::io::Read;

use super::primitive::*;
use super::union::select_branch;
use super::DatumConfig;
use crate::error::{Error, Result};
use crate::resolve::default::materialize;
use crate::schema::{Schema, SchemaNode, SchemaRef};
use crate::value::Value;

/// Upper bound on speculative `Vec` reservation for a decoded block count.
const MAX_PREALLOC: usize = 1024;

// ── Encode ───────────────────────────────────────────────────────────────────

pub fn encode(
    value:  &Value,
    schema: &Schema,
    node:   SchemaRef,
    config: &DatumConfig,
    buf:    &mut Vec<u8>,
) -> Result<()> {
    let mismatch = || Error::mismatch(schema.describe(node), value.kind_name());
    let v = value.untagged();

    match schema.node(node) {
        SchemaNode::Null => match v {
            Value::Null => encode_null(buf),
            _ => return Err(mismatch()),
        },
        SchemaNode::Boolean => match v {
            Value::Boolean(b) => encode_boolean(*b, buf),
            _ => return Err(mismatch()),
        },
        SchemaNode::Int => match v {
            Value::Int(i) => {
                let i = i32::try_from(*i).map_err(|_| Error::Range { value: *i })?;
                encode_int(i, buf);
            }
            _ => return Err(mismatch()),
        },
        SchemaNode::Long => match v {
            Value::Int(i) => encode_long(*i, buf),
            _ => return Err(mismatch()),
        },
        SchemaNode::Float => match v {
            Value::Float(f) => encode_float(*f as f32, buf),
            Value::Int(i)   => encode_float(*i as f32, buf),
            _ => return Err(mismatch()),
        },
        SchemaNode::Double => match v {
            Value::Float(f) => encode_double(*f, buf),
            Value::Int(i)   => encode_double(*i as f64, buf),
            _ => return Err(mismatch()),
        },
        SchemaNode::Bytes => match v {
            Value::Bytes(b) => encode_bytes(b, buf),
            _ => return Err(mismatch()),
        },
        SchemaNode::String => match v {
            Value::String(s) => encode_string(s, buf),
            _ => return Err(mismatch()),
        },
        SchemaNode::Fixed { name, size } => match v {
            Value::Bytes(b) => encode_fixed(b, *size, name, buf)?,
            _ => return Err(mismatch()),
        },
        SchemaNode::Enum { name, symbols, .. } => match v {
            Value::Enum(s) | Value::String(s) => encode_enum(s, symbols, name, buf)?,
            _ => return Err(mismatch()),
        },
        SchemaNode::Array(items) => match v {
            Value::Array(values) => {
                encode_blocks(values.iter(), config, buf, |item, out| {
                    encode(item, schema, *items, config, out)
                })?;
            }
            _ => return Err(mismatch()),
        },
        SchemaNode::Map(values) => match v {
            Value::Map(entries) => {
                // Sorted keys keep the output byte-stable across runs.
                let mut sorted: Vec<_> = entries.iter().collect();
                sorted.sort_by(|a, b| a.0.cmp(b.0));
                encode_blocks(sorted.into_iter(), config, buf, |(k, item), out| {
                    encode_string(k, out);
                    encode(item, schema, *values, config, out)
                })?;
            }
            _ => return Err(mismatch()),
        },
        SchemaNode::Record { name, fields } => match v {
            Value::Record(given) => {
                for field in fields {
                    match given.iter().find(|(n, _)| n == &field.name) {
                        Some((_, fv)) => encode(fv, schema, field.schema, config, buf)?,
                        None => {
                            let literal = field.default.as_ref().ok_or_else(|| Error::MissingField {
                                record: name.clone(),
                                field:  field.name.clone(),
                            })?;
                            let dv = materialize(literal, schema, field.schema)?;
                            encode(&dv, schema, field.schema, config, buf)?;
                        }
                    }
                }
            }
            _ => return Err(mismatch()),
        },
        SchemaNode::Union(branches) => {
            // Selection sees the tagged value; the branch encoder does not need it.
            let index = select_branch(value, schema, branches)?;
            encode_long(index as i64, buf);
            encode(value, schema, branches[index], config, buf)?;
        }
    }
    Ok(())
}

fn encode_blocks<T, I, F>(items: I, config: &DatumConfig, buf: &mut Vec<u8>, mut encode_item: F) -> Result<()>
where
    I: ExactSizeIterator<Item = T>,
    F: FnMut(T, &mut Vec<u8>) -> Result<()>,
{
    let count = items.len() as i64;
    if count > 0 {
        if config.sized_collections {
            let mut body = Vec::new();
            for item in items {
                encode_item(item, &mut body)?;
            }
            encode_long(-count, buf);
            encode_long(body.len() as i64, buf);
            buf.extend_from_slice(&body);
        } else {
            encode_long(count, buf);
            for item in items {
                encode_item(item, buf)?;
            }
        }
    }
    encode_long(0, buf);
    Ok(())
}

// ── Decode ───────────────────────────────────────────────────────────────────

pub fn decode<R: Read>(schema: &Schema, node: SchemaRef, config: &DatumConfig, r: &mut R) -> Result<Value> {
    Ok(match schema.node(node) {
        SchemaNode::Null    => Value::Null,
        SchemaNode::Boolean => Value::Boolean(decode_boolean(r, config.lenient_boolean)?),
        SchemaNode::Int     => Value::Int(decode_int(r, config.strict_int)?),
        SchemaNode::Long    => Value::Int(decode_long(r)?),
        SchemaNode::Float   => Value::Float(f64::from(decode_float(r)?)),
        SchemaNode::Double  => Value::Float(decode_double(r)?),
        SchemaNode::Bytes   => Value::Bytes(decode_bytes(r)?),
        SchemaNode::String  => Value::String(decode_string(r)?),
        SchemaNode::Fixed { size, .. } => Value::Bytes(decode_fixed(r, *size)?),
        SchemaNode::Enum { symbols, .. } => {
            let index = decode_enum_index(r, symbols.len())?;
            Value::Enum(symbols[index].clone())
        }
        SchemaNode::Array(items) => {
            let mut out = Vec::new();
            read_blocks(r, config.max_collection_items, |r, count| {
                out.reserve(count.min(MAX_PREALLOC));
                for _ in 0..count {
                    out.push(decode(schema, *items, config, r)?);
                }
                Ok(())
            })?;
            Value::Array(out)
        }
        SchemaNode::Map(values) => {
            let mut out = std::collections::HashMap::new();
            read_blocks(r, config.max_collection_items, |r, count| {
                for _ in 0..count {
                    let key = decode_string(r)?;
                    out.insert(key, decode(schema, *values, config, r)?);
                }
                Ok(())
            })?;
            Value::Map(out)
        }
        SchemaNode::Record { fields, .. } => {
            let mut out = Vec::with_capacity(fields.len());
            for field in fields {
                out.push((field.name.clone(), decode(schema, field.schema, config, r)?));
            }
            Value::Record(out)
        }
        SchemaNode::Union(branches) => {
            let index = decode_branch_index(r, branches.len())?;
            let branch = branches[index];
            tag_branch(schema, branch, decode(schema, branch, config, r)?)
        }
    })
}

/// Wrap a value decoded from a named union branch in its full name, so
/// encoding it again selects the same branch.
pub(crate) fn tag_branch(schema: &Schema, branch: SchemaRef, value: Value) -> Value {
    match schema.node(branch).name() {
        Some(name) => Value::named(name, value),
        None       => value,
    }
}

/// Drive the count-block loop shared by arrays and maps.  `body` receives the
/// absolute item count of each block; the byte size of sized blocks is read
/// and discarded.  Counts are summed across blocks and checked against
/// `max_items` before `body` runs.
pub(crate) fn read_blocks<R, F>(r: &mut R, max_items: usize, mut body: F) -> Result<()>
where
    R: Read,
    F: FnMut(&mut R, usize) -> Result<()>,
{
    let mut total = 0;
    loop {
        let count = decode_long(r)?;
        if count == 0 {
            return Ok(());
        }
        if count < 0 {
            decode_long(r)?;
        }
        let count = block_count(count, &mut total, max_items)?;
        body(r, count)?;
    }
}

fn block_count(count: i64, total: &mut usize, max_items: usize) -> Result<usize> {
    let n = usize::try_from(count.unsigned_abs())
        .map_err(|_| Error::malformed(format!("block count {count} too large")))?;
    *total = total.checked_add(n)
        .filter(|t| *t <= max_items)
        .ok_or_else(|| Error::malformed(format!(
            "collection declares more than {max_items} items (block count {count})"
        )))?;
    Ok(n)
}

pub(crate) fn decode_branch_index<R: Read>(r: &mut R, branch_count: usize) -> Result<usize> {
    let index = decode_long(r)?;
    usize::try_from(index)
        .ok()
        .filter(|&i| i < branch_count)
        .ok_or_else(|| Error::malformed(format!("union index {index} out of range 0..{branch_count}")))
}

// ── Skip ─────────────────────────────────────────────────────────────────────

/// Advance past one value written under `node` without materializing it.
/// Sized array / map blocks are stepped over by byte count.
pub fn skip<R: Read>(schema: &Schema, node: SchemaRef, r: &mut R) -> Result<()> {
    skip_with(schema, node, &DatumConfig::default(), r)
}

/// [`skip`] with an explicit collection item limit from `config`.
pub fn skip_with<R: Read>(schema: &Schema, node: SchemaRef, config: &DatumConfig, r: &mut R) -> Result<()> {
    let max = config.max_collection_items;
    match schema.node(node) {
        SchemaNode::Null    => Ok(()),
        SchemaNode::Boolean => skip_exact(r, 1),
        SchemaNode::Int | SchemaNode::Long | SchemaNode::Enum { .. } => skip_long(r),
        SchemaNode::Float   => skip_exact(r, 4),
        SchemaNode::Double  => skip_exact(r, 8),
        SchemaNode::Bytes | SchemaNode::String => skip_bytes(r),
        SchemaNode::Fixed { size, .. } => skip_exact(r, *size as u64),
        SchemaNode::Array(items) => skip_blocks(r, max, |r| skip_with(schema, *items, config, r)),
        SchemaNode::Map(values)  => skip_blocks(r, max, |r| {
            skip_bytes(r)?;
            skip_with(schema, *values, config, r)
        }),
        SchemaNode::Record { fields, .. } => {
            for field in fields {
                skip_with(schema, field.schema, config, r)?;
            }
            Ok(())
        }
        SchemaNode::Union(branches) => {
            let index = decode_branch_index(r, branches.len())?;
            skip_with(schema, branches[index], config, r)
        }
    }
}

fn skip_blocks<R, F>(r: &mut R, max_items: usize, mut skip_item: F) -> Result<()>
where
    R: Read,
    F: FnMut(&mut R) -> Result<()>,
{
    let mut total = 0;
    loop {
        let count = decode_long(r)?;
        if count == 0 {
            return Ok(());
        }
        block_count(count, &mut total, max_items)?;
        if count < 0 {
            let size = decode_long(r)?;
            let size = u64::try_from(size)
                .map_err(|_| Error::malformed(format!("negative block size {size}")))?;
            skip_exact(r, size)?;
        } else {
            for _ in 0..count {
                skip_item(r)?;
            }
        }
    }
}
