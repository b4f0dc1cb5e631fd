//! Writer/reader schema resolution.
//!
//! A [`ResolutionPlan`] is computed once per (writer, reader) schema pair and
//! is pure data afterwards: an arena of [`Step`]s, one per distinct
//! (writer node, reader node) pair reached, so recursive schemas produce a
//! cyclic plan rather than unbounded recursion at build time.
//!
//! # Rules
//! - Same kind: decoded as written.
//! - Promotions: `int -> long -> float -> double`, `string <-> bytes`.
//! - Records: fields matched by name.  Writer-only fields are skipped;
//!   reader-only fields take their materialized default, or the plan fails
//!   with `MissingField`.  Decode order follows the writer, output order
//!   follows the reader.
//! - Unions: matched by kind and name, never by position.
//! - Enums: decoded by the writer's symbol list; a symbol the reader lacks
//!   fails unless [`EnumFallback::ReaderDefault`] is configured and the
//!   reader declares a default.
//!
//! Any other mismatch is a `SchemaResolution` error, raised while planning
//! except for writer union branches, which only fail if actually read.

pub mod cache;
pub mod default;

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::encoding::composite::{self, decode_branch_index, read_blocks};
use crate::encoding::primitive::{decode_enum_index, decode_string};
use crate::encoding::DatumConfig;
use crate::error::{Error, Result};
use crate::schema::{names_match, Kind, Schema, SchemaNode, SchemaRef};
use crate::value::Value;

pub use cache::PlanCache;
use default::materialize;

/// What to do with an enum symbol the reader schema does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumFallback {
    #[default]
    Fail,
    ReaderDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    pub enum_fallback: EnumFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StepId(usize);

#[derive(Debug, Clone)]
enum Step {
    /// Reserved while a record plan is under construction.
    Pending,
    /// Same shape on both sides: decode with the writer subtree.
    AsWritten(SchemaRef),
    /// Decode with the writer node, then widen to the reader kind.
    Promote { from: SchemaRef, to: Kind },
    /// Writer is not a union, reader is: decode into the matched reader
    /// branch, tagged with its name when it is a named type.
    ReaderBranch { step: StepId, tag: Option<String> },
    Enum {
        name:           String,
        /// Writer symbol, and whether the reader declares it.
        symbols:        Vec<(String, bool)>,
        reader_default: Option<String>,
    },
    Array(StepId),
    Map(StepId),
    Record {
        name:     String,
        ops:      Vec<FieldOp>,
        /// Reader field names, in reader order.
        fields:   Vec<String>,
        /// Reader slot -> materialized default for fields the writer lacks.
        defaults: Vec<(usize, Value)>,
    },
    /// Writer is a union: one entry per writer branch.
    WriterUnion { branches: Vec<BranchPlan> },
}

#[derive(Debug, Clone)]
enum FieldOp {
    Read { slot: usize, step: StepId },
    Skip(SchemaRef),
}

#[derive(Debug, Clone)]
enum BranchPlan {
    Resolved { step: StepId, tag: Option<String> },
    /// No reader counterpart; reading this branch is an error.
    Unmatched { writer: String, reader: String },
}

// ── Plan ─────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ResolutionPlan {
    writer:    Arc<Schema>,
    reader:    Arc<Schema>,
    steps:     Vec<Step>,
    root:      Option<StepId>,
}

impl ResolutionPlan {
    /// Compute the plan.  Identical schemas (by fingerprint) get an empty
    /// plan that decodes straight through the composite codec.
    pub fn new(writer: Arc<Schema>, reader: Arc<Schema>) -> Result<Self> {
        if writer.fingerprint() == reader.fingerprint() {
            return Ok(Self { writer, reader, steps: Vec::new(), root: None });
        }
        let mut planner = Planner { writer: &writer, reader: &reader, steps: Vec::new(), memo: HashMap::new() };
        let root = planner.plan(writer.root(), reader.root())?;
        let steps = planner.steps;
        Ok(Self { writer, reader, steps, root: Some(root) })
    }

    pub fn is_identity(&self) -> bool { self.root.is_none() }

    pub fn writer(&self) -> &Arc<Schema> { &self.writer }

    pub fn reader(&self) -> &Arc<Schema> { &self.reader }

    /// Decode one writer-encoded value into the reader's shape.
    pub fn decode<R: Read>(&self, r: &mut R, datum: &DatumConfig, config: &ResolutionConfig) -> Result<Value> {
        match self.root {
            None       => composite::decode(&self.writer, self.writer.root(), datum, r),
            Some(root) => self.run(root, r, datum, config),
        }
    }

    fn run<R: Read>(&self, id: StepId, r: &mut R, datum: &DatumConfig, config: &ResolutionConfig) -> Result<Value> {
        match &self.steps[id.0] {
            Step::Pending => Err(Error::resolution("incomplete plan", "reader")),
            Step::AsWritten(w) => composite::decode(&self.writer, *w, datum, r),
            Step::Promote { from, to } => {
                let written = composite::decode(&self.writer, *from, datum, r)?;
                promote(written, *to)
            }
            Step::ReaderBranch { step, tag } => Ok(tagged(tag, self.run(*step, r, datum, config)?)),
            Step::Enum { name, symbols, reader_default } => {
                let index = decode_enum_index(r, symbols.len())?;
                let (symbol, known) = &symbols[index];
                if *known {
                    return Ok(Value::Enum(symbol.clone()));
                }
                match (config.enum_fallback, reader_default) {
                    (EnumFallback::ReaderDefault, Some(d)) => Ok(Value::Enum(d.clone())),
                    _ => Err(Error::UnknownSymbol { name: name.clone(), symbol: symbol.clone() }),
                }
            }
            Step::Array(item) => {
                let mut out = Vec::new();
                read_blocks(r, datum.max_collection_items, |r, count| {
                    for _ in 0..count {
                        out.push(self.run(*item, r, datum, config)?);
                    }
                    Ok(())
                })?;
                Ok(Value::Array(out))
            }
            Step::Map(item) => {
                let mut out = HashMap::new();
                read_blocks(r, datum.max_collection_items, |r, count| {
                    for _ in 0..count {
                        let key = decode_string(r)?;
                        out.insert(key, self.run(*item, r, datum, config)?);
                    }
                    Ok(())
                })?;
                Ok(Value::Map(out))
            }
            Step::Record { name, ops, fields, defaults } => {
                let mut slots: Vec<Option<Value>> = vec![None; fields.len()];
                for op in ops {
                    match op {
                        FieldOp::Read { slot, step } => slots[*slot] = Some(self.run(*step, r, datum, config)?),
                        FieldOp::Skip(w)             => composite::skip_with(&self.writer, *w, datum, r)?,
                    }
                }
                for (slot, value) in defaults {
                    slots[*slot] = Some(value.clone());
                }
                fields.iter()
                    .zip(slots)
                    .map(|(field, v)| {
                        v.map(|v| (field.clone(), v)).ok_or_else(|| Error::MissingField {
                            record: name.clone(),
                            field:  field.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Record)
            }
            Step::WriterUnion { branches } => {
                let index = decode_branch_index(r, branches.len())?;
                match &branches[index] {
                    BranchPlan::Resolved { step, tag } => Ok(tagged(tag, self.run(*step, r, datum, config)?)),
                    BranchPlan::Unmatched { writer, reader } => Err(Error::resolution(writer.clone(), reader.clone())),
                }
            }
        }
    }
}

/// Decode a single value with the process-wide plan cache.
pub fn from_datum_resolved(
    mut bytes: &[u8],
    writer:    &Arc<Schema>,
    reader:    &Arc<Schema>,
    datum:     &DatumConfig,
    config:    &ResolutionConfig,
) -> Result<Value> {
    let plan = PlanCache::global().get_or_build(writer, reader)?;
    plan.decode(&mut bytes, datum, config)
}

// ── Planner ──────────────────────────────────────────────────────────────────

struct Planner<'a> {
    writer: &'a Schema,
    reader: &'a Schema,
    steps:  Vec<Step>,
    memo:   HashMap<(SchemaRef, SchemaRef), StepId>,
}

impl Planner<'_> {
    fn push(&mut self, step: Step) -> StepId {
        self.steps.push(step);
        StepId(self.steps.len() - 1)
    }

    fn plan(&mut self, w: SchemaRef, r: SchemaRef) -> Result<StepId> {
        if let Some(id) = self.memo.get(&(w, r)) {
            return Ok(*id);
        }
        // Reserve first so recursive references resolve to this step.
        let id = self.push(Step::Pending);
        self.memo.insert((w, r), id);
        let step = self.build(w, r)?;
        self.steps[id.0] = step;
        Ok(id)
    }

    fn build(&mut self, w: SchemaRef, r: SchemaRef) -> Result<Step> {
        let (writer, reader) = (self.writer, self.reader);
        let wnode = writer.node(w);
        let rnode = reader.node(r);

        if let SchemaNode::Union(wbranches) = wnode {
            let mut branches = Vec::with_capacity(wbranches.len());
            for wb in wbranches {
                let target = match rnode {
                    SchemaNode::Union(rbranches) => self.match_branch(*wb, rbranches)
                        .map(|rt| (rt, reader.node(rt).name().map(str::to_owned))),
                    _ if self.compatible(*wb, r) => Some((r, None)),
                    _ => None,
                };
                branches.push(match target {
                    Some((rt, tag)) => BranchPlan::Resolved { step: self.plan(*wb, rt)?, tag },
                    None => BranchPlan::Unmatched {
                        writer: writer.describe(*wb),
                        reader: reader.describe(r),
                    },
                });
            }
            return Ok(Step::WriterUnion { branches });
        }

        if let SchemaNode::Union(rbranches) = rnode {
            let rb = self.match_branch(w, rbranches)
                .ok_or_else(|| Error::resolution(writer.describe(w), reader.describe(r)))?;
            let tag = reader.node(rb).name().map(str::to_owned);
            return Ok(Step::ReaderBranch { step: self.plan(w, rb)?, tag });
        }

        let incompatible = || Error::resolution(writer.describe(w), reader.describe(r));
        match (wnode, rnode) {
            (SchemaNode::Record { name: wn, fields: wf }, SchemaNode::Record { name: rn, fields: rf }) => {
                if !names_match(wn, rn) {
                    return Err(incompatible());
                }
                let mut ops = Vec::with_capacity(wf.len());
                for field in wf {
                    match rf.iter().position(|f| f.name == field.name) {
                        Some(slot) => {
                            let step = self.plan(field.schema, rf[slot].schema)?;
                            ops.push(FieldOp::Read { slot, step });
                        }
                        None => ops.push(FieldOp::Skip(field.schema)),
                    }
                }
                let mut defaults = Vec::new();
                for (slot, field) in rf.iter().enumerate() {
                    if wf.iter().any(|f| f.name == field.name) {
                        continue;
                    }
                    let literal = field.default.as_ref().ok_or_else(|| Error::MissingField {
                        record: rn.clone(),
                        field:  field.name.clone(),
                    })?;
                    defaults.push((slot, materialize(literal, reader, field.schema)?));
                }
                Ok(Step::Record {
                    name:   rn.clone(),
                    ops,
                    fields: rf.iter().map(|f| f.name.clone()).collect(),
                    defaults,
                })
            }
            (SchemaNode::Enum { name: wn, symbols: ws, .. },
             SchemaNode::Enum { name: rn, symbols: rs, default }) => {
                if !names_match(wn, rn) {
                    return Err(incompatible());
                }
                Ok(Step::Enum {
                    name:           rn.clone(),
                    symbols:        ws.iter().map(|s| (s.clone(), rs.contains(s))).collect(),
                    reader_default: default.clone(),
                })
            }
            (SchemaNode::Fixed { name: wn, size: ws }, SchemaNode::Fixed { name: rn, size: rs }) => {
                if !names_match(wn, rn) || ws != rs {
                    return Err(incompatible());
                }
                Ok(Step::AsWritten(w))
            }
            (SchemaNode::Array(wi), SchemaNode::Array(ri)) => Ok(Step::Array(self.plan(*wi, *ri)?)),
            (SchemaNode::Map(wv), SchemaNode::Map(rv))     => Ok(Step::Map(self.plan(*wv, *rv)?)),
            _ => {
                let (wk, rk) = (wnode.kind(), rnode.kind());
                if wk == rk {
                    Ok(Step::AsWritten(w))
                } else if promotes(wk, rk) {
                    Ok(Step::Promote { from: w, to: rk })
                } else {
                    Err(incompatible())
                }
            }
        }
    }

    /// Reader branch for writer node `w`: exact kind (and name) first, then
    /// unqualified-name matches, then the first promotion target.
    fn match_branch(&self, w: SchemaRef, rbranches: &[SchemaRef]) -> Option<SchemaRef> {
        let wnode = self.writer.node(w);
        let wkind = wnode.kind();

        let exact = rbranches.iter().copied().find(|rb| {
            let rnode = self.reader.node(*rb);
            rnode.kind() == wkind && match (wnode.name(), rnode.name()) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        });
        exact
            .or_else(|| rbranches.iter().copied().find(|rb| wkind.is_named() && self.compatible(w, *rb)))
            .or_else(|| rbranches.iter().copied().find(|rb| promotes(wkind, self.reader.kind(*rb))))
    }

    /// Shallow compatibility: same kind (names matching for named types) or
    /// a legal promotion.
    fn compatible(&self, w: SchemaRef, r: SchemaRef) -> bool {
        let wnode = self.writer.node(w);
        let rnode = self.reader.node(r);
        if let SchemaNode::Union(rbranches) = rnode {
            return self.match_branch(w, rbranches).is_some();
        }
        match (wnode.name(), rnode.name()) {
            (Some(a), Some(b)) => wnode.kind() == rnode.kind() && names_match(a, b),
            _ => wnode.kind() == rnode.kind() || promotes(wnode.kind(), rnode.kind()),
        }
    }
}

/// Legal writer -> reader promotions (identity excluded).
pub fn promotes(from: Kind, to: Kind) -> bool {
    matches!(
        (from, to),
        (Kind::Int, Kind::Long | Kind::Float | Kind::Double)
            | (Kind::Long, Kind::Float | Kind::Double)
            | (Kind::Float, Kind::Double)
            | (Kind::String, Kind::Bytes)
            | (Kind::Bytes, Kind::String)
    )
}

/// Values read into a named reader union branch carry the branch's name.
fn tagged(tag: &Option<String>, value: Value) -> Value {
    match tag {
        Some(name) => Value::named(name.clone(), value),
        None       => value,
    }
}

fn promote(value: Value, to: Kind) -> Result<Value> {
    Ok(match (value, to) {
        (Value::Int(i), Kind::Long)     => Value::Int(i),
        (Value::Int(i), Kind::Float)    => Value::Float(f64::from(i as f32)),
        (Value::Int(i), Kind::Double)   => Value::Float(i as f64),
        (Value::Float(f), Kind::Double) => Value::Float(f),
        (Value::String(s), Kind::Bytes) => Value::Bytes(s.into_bytes()),
        (Value::Bytes(b), Kind::String) => Value::String(
            String::from_utf8(b).map_err(|e| Error::malformed(format!("bytes promoted to string are not UTF-8: {e}")))?,
        ),
        (other, to) => return Err(Error::resolution(other.kind_name(), to.name())),
    })
}
