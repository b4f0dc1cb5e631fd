//! File header: magic, metadata map, sync marker.
//!
//! ```text
//! "Obj" 0x01 | map<bytes> metadata | sync[16]
//! ```
//!
//! The metadata map uses the datum map encoding (count blocks closed by a
//! zero count, string keys, bytes values).  Keys are written in sorted order
//! so two headers with the same content are byte-identical.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;

use crate::codec;
use crate::encoding::composite::read_blocks;
use crate::encoding::primitive::{decode_bytes, decode_string, encode_bytes, encode_long, encode_string};
use crate::encoding::DEFAULT_MAX_COLLECTION_ITEMS;
use crate::error::{Error, Result};
use crate::schema::Schema;

pub const MAGIC: &[u8; 4] = b"Obj\x01";
pub const SYNC_SIZE: usize = 16;

pub const SCHEMA_KEY: &str = "avro.schema";
pub const CODEC_KEY: &str = "avro.codec";
/// Keys under this prefix belong to the format, not to callers.
pub const RESERVED_PREFIX: &str = "avro.";

pub type SyncMarker = [u8; SYNC_SIZE];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub metadata: BTreeMap<String, Vec<u8>>,
    pub sync:     SyncMarker,
}

impl Header {
    /// Build a header for a new file with a fresh random sync marker.
    /// Caller metadata may not use the reserved `avro.` prefix.
    pub fn new(schema: &Schema, codec_name: &str, user: &BTreeMap<String, Vec<u8>>) -> Result<Self> {
        if let Some(key) = user.keys().find(|k| k.starts_with(RESERVED_PREFIX)) {
            return Err(Error::InvalidFormat(format!("metadata key `{key}` uses the reserved prefix")));
        }
        let mut metadata = user.clone();
        metadata.insert(SCHEMA_KEY.to_string(), schema.to_json_string().into_bytes());
        metadata.insert(CODEC_KEY.to_string(), codec_name.as_bytes().to_vec());
        let mut sync = [0u8; SYNC_SIZE];
        OsRng.fill_bytes(&mut sync);
        Ok(Self { metadata, sync })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 + self.metadata.values().map(Vec::len).sum::<usize>());
        buf.extend_from_slice(MAGIC);
        if !self.metadata.is_empty() {
            encode_long(self.metadata.len() as i64, &mut buf);
            for (k, v) in &self.metadata {
                encode_string(k, &mut buf);
                encode_bytes(v, &mut buf);
            }
        }
        encode_long(0, &mut buf);
        buf.extend_from_slice(&self.sync);
        buf
    }

    /// Write the whole header with one `write_all`; returns its length.
    pub fn write<W: Write>(&self, mut writer: W) -> Result<u64> {
        let bytes = self.to_bytes();
        writer.write_all(&bytes)?;
        debug!(len = bytes.len(), sync = %hex::encode(self.sync), "header written");
        Ok(bytes.len() as u64)
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(|_| Error::InvalidFormat("file shorter than magic".into()))?;
        if magic[..3] != MAGIC[..3] {
            return Err(Error::InvalidFormat(format!("bad magic {}", hex::encode(magic))));
        }
        if magic[3] != MAGIC[3] {
            return Err(Error::InvalidFormat(format!("unsupported version {}", magic[3])));
        }

        let mut metadata = BTreeMap::new();
        read_blocks(&mut reader, DEFAULT_MAX_COLLECTION_ITEMS, |r, count| {
            for _ in 0..count {
                let key = decode_string(r)?;
                metadata.insert(key, decode_bytes(r)?);
            }
            Ok(())
        })
        .map_err(header_error)?;

        let mut sync = [0u8; SYNC_SIZE];
        reader.read_exact(&mut sync).map_err(|_| Error::InvalidFormat("header truncated before sync marker".into()))?;

        let header = Self { metadata, sync };
        debug!(keys = header.metadata.len(), codec = header.codec_name(), "header read");
        Ok(header)
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.metadata.get(key).map(Vec::as_slice)
    }

    /// The declared codec; a header without one uses `null`.
    pub fn codec_name(&self) -> &str {
        self.get(CODEC_KEY)
            .and_then(|b| std::str::from_utf8(b).ok())
            .unwrap_or(codec::NULL)
    }

    pub fn schema(&self) -> Result<Schema> {
        let raw = self.get(SCHEMA_KEY)
            .ok_or_else(|| Error::InvalidFormat(format!("header has no `{SCHEMA_KEY}` entry")))?;
        let text = std::str::from_utf8(raw)
            .map_err(|_| Error::InvalidFormat(format!("`{SCHEMA_KEY}` is not UTF-8")))?;
        Schema::parse(text)
    }

    /// Metadata entries a caller supplied, without the reserved keys.
    pub fn user_metadata(&self) -> BTreeMap<String, Vec<u8>> {
        self.metadata.iter()
            .filter(|(k, _)| !k.starts_with(RESERVED_PREFIX))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn header_error(e: Error) -> Error {
    match e {
        Error::MalformedData(reason) => Error::InvalidFormat(format!("header metadata: {reason}")),
        other => other,
    }
}
