//! Block compression codecs, looked up by the name stored in the header.
//!
//! # Identity rules
//! A codec is identified by the string under `avro.codec` in the file
//! header.  The name is the only identity: it is written once per file and
//! applies to every block.  A reader that cannot resolve the name MUST fail
//! before decoding any block.
//!
//! `null` is mandatory.  `zstandard` and `xz` follow the names other
//! implementations use; `lz4` and `brotli` are extensions that only this
//! crate (or hosts registering the same transform) can read.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use crate::error::{Error, Result};

pub const NULL:      &str = "null";
pub const ZSTANDARD: &str = "zstandard";
pub const XZ:        &str = "xz";
pub const LZ4:       &str = "lz4";
pub const BROTLI:    &str = "brotli";

pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

// ── Codec trait ──────────────────────────────────────────────────────────────

/// A whole-block transform.  Implementations must be pure: the same input
/// always decompresses to the bytes that were compressed.
pub trait Codec: Send + Sync {
    fn name(&self) -> &str;
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

fn compression(codec: &str, e: impl ToString) -> Error {
    Error::Compression { codec: codec.to_string(), reason: e.to_string() }
}

fn decompression(codec: &str, e: impl ToString) -> Error {
    Error::Decompression { codec: codec.to_string(), reason: e.to_string() }
}

// ── Built-in codec implementations ──────────────────────────────────────────

pub struct NullCodec;
impl Codec for NullCodec {
    fn name(&self) -> &str { NULL }
    fn compress(&self, data: &[u8], _: i32) -> Result<Vec<u8>> { Ok(data.to_vec()) }
    fn decompress(&self, data: &[u8])        -> Result<Vec<u8>> { Ok(data.to_vec()) }
}

/// Frames carry a content checksum so payload corruption surfaces as a
/// decompression failure rather than garbage records.
pub struct ZstdCodec;
impl Codec for ZstdCodec {
    fn name(&self) -> &str { ZSTANDARD }
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>> {
        let mut enc = zstd::stream::Encoder::new(Vec::new(), level)
            .map_err(|e| compression(ZSTANDARD, e))?;
        enc.include_checksum(true).map_err(|e| compression(ZSTANDARD, e))?;
        enc.write_all(data).map_err(|e| compression(ZSTANDARD, e))?;
        enc.finish().map_err(|e| compression(ZSTANDARD, e))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::decode_all(data).map_err(|e| decompression(ZSTANDARD, e))
    }
}

pub struct XzCodec;
impl Codec for XzCodec {
    fn name(&self) -> &str { XZ }
    fn compress(&self, data: &[u8], _: i32) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        lzma_rs::xz_compress(&mut Cursor::new(data), &mut out)
            .map_err(|e| compression(XZ, e))?;
        Ok(out)
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        lzma_rs::xz_decompress(&mut Cursor::new(data), &mut out)
            .map_err(|e| decompression(XZ, e))?;
        Ok(out)
    }
}

pub struct Lz4Codec;
impl Codec for Lz4Codec {
    fn name(&self) -> &str { LZ4 }
    fn compress(&self, data: &[u8], _: i32) -> Result<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(data))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4_flex::decompress_size_prepended(data).map_err(|e| decompression(LZ4, e))
    }
}

pub struct BrotliCodec;
impl Codec for BrotliCodec {
    fn name(&self) -> &str { BROTLI }
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>> {
        let quality = level.clamp(0, 11) as u32;
        let mut out = Vec::new();
        {
            let mut w = brotli::CompressorWriter::new(&mut out, 4096, quality, 22);
            w.write_all(data).map_err(|e| compression(BROTLI, e))?;
        }
        Ok(out)
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        brotli::Decompressor::new(data, 4096)
            .read_to_end(&mut out)
            .map_err(|e| decompression(BROTLI, e))?;
        Ok(out)
    }
}

// ── Registry ─────────────────────────────────────────────────────────────────

/// Name -> codec table.  Cloning is cheap; codecs are shared.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl CodecRegistry {
    /// A registry holding only the mandatory `null` codec.
    pub fn empty() -> Self {
        let mut reg = Self { codecs: HashMap::new() };
        reg.register(Arc::new(NullCodec));
        reg
    }

    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        reg.register(Arc::new(ZstdCodec));
        reg.register(Arc::new(XzCodec));
        reg.register(Arc::new(Lz4Codec));
        reg.register(Arc::new(BrotliCodec));
        reg
    }

    /// Add or replace the codec registered under `codec.name()`.
    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        self.codecs.insert(codec.name().to_string(), codec);
    }

    /// Resolve a header codec name.  There is no fallback: an unknown name
    /// is fatal.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Codec>> {
        self.codecs
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnsupportedCodec(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for CodecRegistry {
    fn default() -> Self { Self::with_builtins() }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry").field("codecs", &self.names()).finish()
    }
}
