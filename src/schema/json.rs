//! Schema <-> JSON mapping for the container header.
//!
//! Only what the header round-trip needs: named types, namespaces, field
//! defaults and enum defaults.  Attributes the model has no slot for
//! (`doc`, `aliases`, `logicalType`, ...) are accepted and dropped.
//!
//! Output is canonical: named types are written in full at their first
//! occurrence (depth-first, field order) and by full name afterwards, with
//! object keys in sorted order.  The fingerprint is computed over this text.

use std::collections::HashSet;

use serde_json::{json, Map, Value as Json};

use super::{Field, Kind, Schema, SchemaBuilder, SchemaNode, SchemaRef};
use crate::error::{Error, Result};

pub fn parse(text: &str) -> Result<Schema> {
    let v: Json = serde_json::from_str(text)?;
    from_value(&v)
}

pub fn from_value(v: &Json) -> Result<Schema> {
    let mut p = Parser { b: SchemaBuilder::new() };
    let root = p.parse(v, None)?;
    p.b.build(root)
}

pub fn to_json(schema: &Schema) -> Json {
    let mut seen = HashSet::new();
    node_json(schema, schema.root(), None, &mut seen)
}

// ── Parsing ──────────────────────────────────────────────────────────────────

struct Parser {
    b: SchemaBuilder,
}

impl Parser {
    fn parse(&mut self, v: &Json, ns: Option<&str>) -> Result<SchemaRef> {
        match v {
            Json::String(s)    => self.reference(s, ns),
            Json::Array(items) => {
                let branches = items.iter()
                    .map(|item| self.parse(item, ns))
                    .collect::<Result<Vec<_>>>()?;
                self.b.add(SchemaNode::Union(branches))
            }
            Json::Object(obj)  => self.complex(obj, ns),
            other => Err(Error::Schema(format!("unexpected schema JSON `{other}`"))),
        }
    }

    fn reference(&mut self, s: &str, ns: Option<&str>) -> Result<SchemaRef> {
        if let Some(kind) = Kind::from_primitive_name(s) {
            return self.b.add_kind(kind);
        }
        let full = qualify(s, ns);
        self.b.named(&full)
            .or_else(|| self.b.named(s))
            .ok_or_else(|| Error::Schema(format!("unknown type `{s}`")))
    }

    fn complex(&mut self, obj: &Map<String, Json>, ns: Option<&str>) -> Result<SchemaRef> {
        let ty = match obj.get("type") {
            Some(Json::String(t)) => t.as_str(),
            Some(nested)          => return self.parse(nested, ns),
            None => return Err(Error::Schema("schema object without `type`".into())),
        };

        match ty {
            "record" | "error" => {
                let (full, inner_ns) = full_name(obj, ns)?;
                let r = self.b.declare(&full)?;
                let fields_json = obj.get("fields")
                    .and_then(Json::as_array)
                    .ok_or_else(|| Error::Schema(format!("record `{full}` has no `fields` array")))?;

                let mut fields = Vec::with_capacity(fields_json.len());
                for f in fields_json {
                    let fo = f.as_object()
                        .ok_or_else(|| Error::Schema(format!("field of `{full}` is not an object")))?;
                    let name = fo.get("name")
                        .and_then(Json::as_str)
                        .ok_or_else(|| Error::Schema(format!("field of `{full}` has no name")))?;
                    let type_json = fo.get("type")
                        .ok_or_else(|| Error::Schema(format!("field `{name}` of `{full}` has no type")))?;
                    let schema = self.parse(type_json, inner_ns.as_deref())?;
                    fields.push(Field {
                        name:    name.to_owned(),
                        schema,
                        default: fo.get("default").cloned(),
                    });
                }
                self.b.define(r, SchemaNode::Record { name: full, fields })?;
                Ok(r)
            }
            "enum" => {
                let (full, _) = full_name(obj, ns)?;
                let symbols = obj.get("symbols")
                    .and_then(Json::as_array)
                    .ok_or_else(|| Error::Schema(format!("enum `{full}` has no `symbols` array")))?
                    .iter()
                    .map(|s| s.as_str().map(str::to_owned)
                        .ok_or_else(|| Error::Schema(format!("enum `{full}` has a non-string symbol"))))
                    .collect::<Result<Vec<_>>>()?;
                let default = obj.get("default").and_then(Json::as_str).map(str::to_owned);
                self.b.add(SchemaNode::Enum { name: full, symbols, default })
            }
            "fixed" => {
                let (full, _) = full_name(obj, ns)?;
                let size = obj.get("size")
                    .and_then(Json::as_u64)
                    .ok_or_else(|| Error::Schema(format!("fixed `{full}` has no valid `size`")))?;
                self.b.add(SchemaNode::Fixed { name: full, size: size as usize })
            }
            "array" => {
                let items = obj.get("items")
                    .ok_or_else(|| Error::Schema("array without `items`".into()))?;
                let items = self.parse(items, ns)?;
                self.b.add(SchemaNode::Array(items))
            }
            "map" => {
                let values = obj.get("values")
                    .ok_or_else(|| Error::Schema("map without `values`".into()))?;
                let values = self.parse(values, ns)?;
                self.b.add(SchemaNode::Map(values))
            }
            other => self.reference(other, ns),
        }
    }
}

fn full_name(obj: &Map<String, Json>, ns: Option<&str>) -> Result<(String, Option<String>)> {
    let name = obj.get("name")
        .and_then(Json::as_str)
        .ok_or_else(|| Error::Schema("named type without `name`".into()))?;

    if let Some((space, _)) = name.rsplit_once('.') {
        return Ok((name.to_owned(), Some(space.to_owned())));
    }
    // An explicit empty namespace is the null namespace, not "inherit".
    let space = match obj.get("namespace").and_then(Json::as_str) {
        Some("")    => None,
        Some(space) => Some(space.to_owned()),
        None        => ns.map(str::to_owned),
    };
    Ok(match space {
        Some(space) => (format!("{space}.{name}"), Some(space)),
        None        => (name.to_owned(), None),
    })
}

fn qualify(name: &str, ns: Option<&str>) -> String {
    match ns {
        Some(space) if !name.contains('.') => format!("{space}.{name}"),
        _ => name.to_owned(),
    }
}

// ── Rendering ────────────────────────────────────────────────────────────────

fn node_json(schema: &Schema, r: SchemaRef, ns: Option<&str>, seen: &mut HashSet<SchemaRef>) -> Json {
    let node = schema.node(r);
    if let Some(name) = node.name() {
        if !seen.insert(r) {
            return Json::String(name.to_owned());
        }
    }

    let mut out = match node {
        SchemaNode::Fixed { name, size } => json!({ "type": "fixed", "name": name, "size": size }),
        SchemaNode::Enum { name, symbols, default } => {
            let mut o = json!({ "type": "enum", "name": name, "symbols": symbols });
            if let Some(d) = default {
                o["default"] = json!(d);
            }
            o
        }
        SchemaNode::Array(items) => json!({ "type": "array", "items": node_json(schema, *items, ns, seen) }),
        SchemaNode::Map(values)  => json!({ "type": "map", "values": node_json(schema, *values, ns, seen) }),
        SchemaNode::Union(branches) => {
            Json::Array(branches.iter().map(|b| node_json(schema, *b, ns, seen)).collect())
        }
        SchemaNode::Record { name, fields } => {
            let inner_ns = name.rsplit_once('.').map(|(space, _)| space);
            let mut out = Vec::with_capacity(fields.len());
            for f in fields {
                let mut o = Map::new();
                o.insert("name".into(), json!(f.name));
                o.insert("type".into(), node_json(schema, f.schema, inner_ns, seen));
                if let Some(d) = &f.default {
                    o.insert("default".into(), d.clone());
                }
                out.push(Json::Object(o));
            }
            json!({ "type": "record", "name": name, "fields": out })
        }
        primitive => return Json::String(primitive.kind().name().to_owned()),
    };

    // A null-namespace type nested under a namespace carries `"namespace": ""`.
    if let (Some(name), Some(_), Json::Object(o)) = (node.name(), ns, &mut out) {
        if !name.contains('.') {
            o.insert("namespace".into(), json!(""));
        }
    }
    out
}
