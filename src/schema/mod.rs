//! In-memory schema model.
//!
//! A [`Schema`] is an arena of [`SchemaNode`]s addressed by [`SchemaRef`].
//! Named types (`record`, `enum`, `fixed`) occupy exactly one slot each and
//! every reference to a name points at that slot, so self-referential
//! schemas are plain index cycles rather than cyclic ownership.
//!
//! The model is read-only once built.  Structural validation of the schema
//! language itself is left to whoever produced the tree; the builder only
//! refuses duplicate names and dangling declarations, which would make the
//! arena unusable.

pub mod json;

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// Stable structural identity of a schema: BLAKE3 of its canonical JSON.
pub type Fingerprint = [u8; 32];

/// Index of a node inside a [`Schema`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaRef(pub(crate) usize);

impl SchemaRef {
    pub fn index(self) -> usize { self.0 }
}

/// Node discriminant, used for promotion rules, branch matching and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Fixed,
    Enum,
    Array,
    Map,
    Union,
    Record,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Null    => "null",
            Kind::Boolean => "boolean",
            Kind::Int     => "int",
            Kind::Long    => "long",
            Kind::Float   => "float",
            Kind::Double  => "double",
            Kind::Bytes   => "bytes",
            Kind::String  => "string",
            Kind::Fixed   => "fixed",
            Kind::Enum    => "enum",
            Kind::Array   => "array",
            Kind::Map     => "map",
            Kind::Union   => "union",
            Kind::Record  => "record",
        }
    }

    /// Parse a primitive type name.  Complex kinds are never returned.
    pub fn from_primitive_name(s: &str) -> Option<Self> {
        match s {
            "null"    => Some(Kind::Null),
            "boolean" => Some(Kind::Boolean),
            "int"     => Some(Kind::Int),
            "long"    => Some(Kind::Long),
            "float"   => Some(Kind::Float),
            "double"  => Some(Kind::Double),
            "bytes"   => Some(Kind::Bytes),
            "string"  => Some(Kind::String),
            _         => None,
        }
    }

    pub fn is_named(self) -> bool {
        matches!(self, Kind::Fixed | Kind::Enum | Kind::Record)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One record field.  `default` is the JSON literal as declared; it is
/// interpreted against `schema` only when a default is actually needed.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name:    String,
    pub schema:  SchemaRef,
    pub default: Option<serde_json::Value>,
}

impl Field {
    pub fn new(name: impl Into<String>, schema: SchemaRef) -> Self {
        Self { name: name.into(), schema, default: None }
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Fixed  { name: String, size: usize },
    /// `default` is the symbol substituted for unknown writer symbols when
    /// the reader opts into enum fallback.
    Enum   { name: String, symbols: Vec<String>, default: Option<String> },
    Array(SchemaRef),
    Map(SchemaRef),
    Union(Vec<SchemaRef>),
    Record { name: String, fields: Vec<Field> },
}

impl SchemaNode {
    pub fn kind(&self) -> Kind {
        match self {
            SchemaNode::Null           => Kind::Null,
            SchemaNode::Boolean        => Kind::Boolean,
            SchemaNode::Int            => Kind::Int,
            SchemaNode::Long           => Kind::Long,
            SchemaNode::Float          => Kind::Float,
            SchemaNode::Double         => Kind::Double,
            SchemaNode::Bytes          => Kind::Bytes,
            SchemaNode::String         => Kind::String,
            SchemaNode::Fixed { .. }   => Kind::Fixed,
            SchemaNode::Enum { .. }    => Kind::Enum,
            SchemaNode::Array(_)       => Kind::Array,
            SchemaNode::Map(_)         => Kind::Map,
            SchemaNode::Union(_)       => Kind::Union,
            SchemaNode::Record { .. }  => Kind::Record,
        }
    }

    /// Full name of a named type; `None` for everything else.
    pub fn name(&self) -> Option<&str> {
        match self {
            SchemaNode::Fixed { name, .. }
            | SchemaNode::Enum { name, .. }
            | SchemaNode::Record { name, .. } => Some(name),
            _ => None,
        }
    }

    fn primitive(kind: Kind) -> Option<Self> {
        Some(match kind {
            Kind::Null    => SchemaNode::Null,
            Kind::Boolean => SchemaNode::Boolean,
            Kind::Int     => SchemaNode::Int,
            Kind::Long    => SchemaNode::Long,
            Kind::Float   => SchemaNode::Float,
            Kind::Double  => SchemaNode::Double,
            Kind::Bytes   => SchemaNode::Bytes,
            Kind::String  => SchemaNode::String,
            _             => return None,
        })
    }
}

/// Unqualified part of a dotted full name.
pub fn short_name(full: &str) -> &str {
    full.rsplit('.').next().unwrap_or(full)
}

/// True when two named types denote the same type across schemas: equal
/// full names, or equal unqualified names when namespaces differ.
pub(crate) fn names_match(a: &str, b: &str) -> bool {
    a == b || short_name(a) == short_name(b)
}

// ── Schema ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Schema {
    nodes:       Vec<SchemaNode>,
    names:       HashMap<String, SchemaRef>,
    root:        SchemaRef,
    fingerprint: Fingerprint,
}

impl Schema {
    /// Single-node schema of a primitive kind.
    pub fn primitive(kind: Kind) -> Result<Self> {
        let node = SchemaNode::primitive(kind)
            .ok_or_else(|| Error::Schema(format!("`{kind}` is not a primitive type")))?;
        let mut b = SchemaBuilder::new();
        let root = b.add(node)?;
        b.build(root)
    }

    /// Parse schema JSON text (the form carried in container headers).
    pub fn parse(text: &str) -> Result<Self> {
        json::parse(text)
    }

    pub fn root(&self) -> SchemaRef { self.root }

    pub fn node(&self, r: SchemaRef) -> &SchemaNode { &self.nodes[r.0] }

    pub fn kind(&self, r: SchemaRef) -> Kind { self.nodes[r.0].kind() }

    pub fn lookup(&self, full_name: &str) -> Option<SchemaRef> {
        self.names.get(full_name).copied()
    }

    pub fn len(&self) -> usize { self.nodes.len() }

    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    pub fn fingerprint(&self) -> Fingerprint { self.fingerprint }

    /// Canonical JSON text; stable for structurally identical schemas.
    pub fn to_json_string(&self) -> String {
        json::to_json(self).to_string()
    }

    /// Short human-readable label for a node, e.g. `record Node` or `array`.
    pub fn describe(&self, r: SchemaRef) -> String {
        let node = self.node(r);
        match node.name() {
            Some(name) => format!("{} {}", node.kind(), name),
            None       => node.kind().to_string(),
        }
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for Schema {}

// ── Builder ──────────────────────────────────────────────────────────────────

/// Incremental arena construction.
///
/// Named types that refer to themselves are built in two steps: [`declare`]
/// reserves the slot and registers the name, [`define`] fills it in once the
/// children exist.
///
/// [`declare`]: SchemaBuilder::declare
/// [`define`]: SchemaBuilder::define
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    nodes: Vec<Option<SchemaNode>>,
    names: HashMap<String, SchemaRef>,
}

impl SchemaBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, node: SchemaNode) -> Result<SchemaRef> {
        if let Some(name) = node.name() {
            let r = self.declare(name)?;
            self.define(r, node)?;
            return Ok(r);
        }
        let r = SchemaRef(self.nodes.len());
        self.nodes.push(Some(node));
        Ok(r)
    }

    pub fn add_kind(&mut self, kind: Kind) -> Result<SchemaRef> {
        let node = SchemaNode::primitive(kind)
            .ok_or_else(|| Error::Schema(format!("`{kind}` is not a primitive type")))?;
        self.add(node)
    }

    pub fn declare(&mut self, full_name: &str) -> Result<SchemaRef> {
        if self.names.contains_key(full_name) {
            return Err(Error::Schema(format!("duplicate named type `{full_name}`")));
        }
        let r = SchemaRef(self.nodes.len());
        self.nodes.push(None);
        self.names.insert(full_name.to_owned(), r);
        Ok(r)
    }

    pub fn define(&mut self, r: SchemaRef, node: SchemaNode) -> Result<()> {
        match self.nodes.get_mut(r.0) {
            Some(slot @ None) => {
                *slot = Some(node);
                Ok(())
            }
            Some(Some(_)) => Err(Error::Schema(format!("schema slot {} already defined", r.0))),
            None          => Err(Error::Schema(format!("schema slot {} does not exist", r.0))),
        }
    }

    pub fn named(&self, full_name: &str) -> Option<SchemaRef> {
        self.names.get(full_name).copied()
    }

    pub fn build(self, root: SchemaRef) -> Result<Schema> {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (i, slot) in self.nodes.into_iter().enumerate() {
            match slot {
                Some(node) => nodes.push(node),
                None => {
                    let name = self.names.iter()
                        .find(|(_, r)| r.0 == i)
                        .map(|(n, _)| n.as_str())
                        .unwrap_or("<anonymous>");
                    return Err(Error::Schema(format!("named type `{name}` declared but never defined")));
                }
            }
        }
        if root.0 >= nodes.len() {
            return Err(Error::Schema(format!("root slot {} does not exist", root.0)));
        }
        let mut schema = Schema { nodes, names: self.names, root, fingerprint: [0u8; 32] };
        schema.fingerprint = blake3::hash(schema.to_json_string().as_bytes()).into();
        Ok(schema)
    }
}
