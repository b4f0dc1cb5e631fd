//! Binary datum encoding: primitives, composites and union selection.

pub mod composite;
pub mod primitive;
pub mod union;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::Schema;
use crate::value::Value;

pub use composite::{decode, encode, skip, skip_with};
pub use union::select_branch;

/// Default cap on the items one array or map may declare across its blocks.
pub const DEFAULT_MAX_COLLECTION_ITEMS: usize = 1 << 22;

/// Knobs for datum encoding and decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatumConfig {
    /// Reject decoded `int` values outside the 32-bit range.
    pub strict_int:        bool,
    /// Read any non-zero boolean byte as `true` instead of failing.
    pub lenient_boolean:   bool,
    /// Write arrays and maps as one negative-count block carrying its byte
    /// size, so readers can skip them without decoding.
    pub sized_collections: bool,
    /// Reject an array or map whose block counts add up to more items than
    /// this. Checked before any item is read, so a forged count fails fast.
    pub max_collection_items: usize,
}

impl Default for DatumConfig {
    fn default() -> Self {
        Self {
            strict_int:           false,
            lenient_boolean:      false,
            sized_collections:    false,
            max_collection_items: DEFAULT_MAX_COLLECTION_ITEMS,
        }
    }
}

/// Encode one value under `schema` with default settings.
pub fn to_datum(value: &Value, schema: &Schema) -> Result<Vec<u8>> {
    to_datum_with(value, schema, &DatumConfig::default())
}

pub fn to_datum_with(value: &Value, schema: &Schema, config: &DatumConfig) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode(value, schema, schema.root(), config, &mut buf)?;
    Ok(buf)
}

/// Decode one value written under `schema` and read with the same schema.
pub fn from_datum(mut bytes: &[u8], schema: &Schema) -> Result<Value> {
    decode(schema, schema.root(), &DatumConfig::default(), &mut bytes)
}
