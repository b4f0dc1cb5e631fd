//! Primitive wire representations.
//!
//! # Integers
//! `int` and `long` share one encoding: zig-zag (`(n << 1) ^ (n >> 63)`)
//! followed by a little-endian base-128 varint.  A long-range value is
//! accepted where an `int` is declared unless `strict` is requested.
//!
//! # Floating point
//! IEEE-754 binary32 / binary64, little-endian, no transform.
//!
//! # Bytes and strings
//! `long` length prefix followed by the raw bytes; strings are UTF-8.
//!
//! Encoders append to a `Vec<u8>` and cannot fail on I/O.  Decoders read
//! from any `Read`; an EOF in the middle of a primitive is `MalformedData`.

use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// A zig-zag varint never needs more than ten bytes for 64 bits.
pub const MAX_VARINT_LEN: usize = 10;

// ── Integers ─────────────────────────────────────────────────────────────────

#[inline]
pub fn zigzag(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

#[inline]
pub fn unzigzag(z: u64) -> i64 {
    ((z >> 1) as i64) ^ -((z & 1) as i64)
}

pub fn encode_long(n: i64, buf: &mut Vec<u8>) {
    let mut z = zigzag(n);
    while z >= 0x80 {
        buf.push((z as u8 & 0x7F) | 0x80);
        z >>= 7;
    }
    buf.push(z as u8);
}

pub fn encode_int(n: i32, buf: &mut Vec<u8>) {
    encode_long(i64::from(n), buf)
}

pub fn decode_long<R: Read>(r: &mut R) -> Result<i64> {
    let mut z: u64 = 0;
    for i in 0..MAX_VARINT_LEN {
        let b = r.read_u8().map_err(Error::from_primitive_io)?;
        let shift = 7 * i as u32;
        if i == MAX_VARINT_LEN - 1 && b > 0x01 {
            return Err(Error::malformed("varint overflows 64 bits"));
        }
        z |= u64::from(b & 0x7F) << shift;
        if b & 0x80 == 0 {
            return Ok(unzigzag(z));
        }
    }
    Err(Error::malformed("runaway varint: more than 10 bytes"))
}

/// Decode a declared `int`.  With `strict`, values outside the 32-bit range
/// fail with [`Error::Range`]; otherwise they pass through as read.
pub fn decode_int<R: Read>(r: &mut R, strict: bool) -> Result<i64> {
    let v = decode_long(r)?;
    if strict && i32::try_from(v).is_err() {
        return Err(Error::Range { value: v });
    }
    Ok(v)
}

// ── Floating point ───────────────────────────────────────────────────────────

pub fn encode_float(f: f32, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&f.to_le_bytes());
}

pub fn encode_double(f: f64, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&f.to_le_bytes());
}

pub fn decode_float<R: Read>(r: &mut R) -> Result<f32> {
    r.read_f32::<LittleEndian>().map_err(Error::from_primitive_io)
}

pub fn decode_double<R: Read>(r: &mut R) -> Result<f64> {
    r.read_f64::<LittleEndian>().map_err(Error::from_primitive_io)
}

// ── Boolean / null ───────────────────────────────────────────────────────────

pub fn encode_boolean(b: bool, buf: &mut Vec<u8>) {
    buf.push(u8::from(b));
}

/// Only `0x00` and `0x01` are valid unless `lenient`, in which case any
/// non-zero byte reads as `true`.
pub fn decode_boolean<R: Read>(r: &mut R, lenient: bool) -> Result<bool> {
    match r.read_u8().map_err(Error::from_primitive_io)? {
        0x00 => Ok(false),
        0x01 => Ok(true),
        _ if lenient => Ok(true),
        other => Err(Error::malformed(format!("invalid boolean byte 0x{other:02x}"))),
    }
}

/// Null occupies zero bytes.
#[inline]
pub fn encode_null(_buf: &mut Vec<u8>) {}

// ── Bytes / string ───────────────────────────────────────────────────────────

pub fn encode_bytes(b: &[u8], buf: &mut Vec<u8>) {
    encode_long(b.len() as i64, buf);
    buf.extend_from_slice(b);
}

pub fn encode_string(s: &str, buf: &mut Vec<u8>) {
    encode_bytes(s.as_bytes(), buf)
}

pub fn decode_bytes<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let len = decode_len(r)?;
    read_exact_len(r, len)
}

pub fn decode_string<R: Read>(r: &mut R) -> Result<String> {
    let bytes = decode_bytes(r)?;
    String::from_utf8(bytes).map_err(|e| Error::malformed(format!("invalid UTF-8 in string: {e}")))
}

// ── Fixed / enum ─────────────────────────────────────────────────────────────

pub fn encode_fixed(b: &[u8], size: usize, name: &str, buf: &mut Vec<u8>) -> Result<()> {
    if b.len() != size {
        return Err(Error::SizeMismatch { name: name.to_owned(), expected: size, found: b.len() });
    }
    buf.extend_from_slice(b);
    Ok(())
}

pub fn decode_fixed<R: Read>(r: &mut R, size: usize) -> Result<Vec<u8>> {
    read_exact_len(r, size as u64)
}

pub fn encode_enum(symbol: &str, symbols: &[String], name: &str, buf: &mut Vec<u8>) -> Result<()> {
    let index = symbols.iter()
        .position(|s| s == symbol)
        .ok_or_else(|| Error::UnknownSymbol { name: name.to_owned(), symbol: symbol.to_owned() })?;
    encode_long(index as i64, buf);
    Ok(())
}

/// Read an enum index and bounds-check it against `symbol_count`.
pub fn decode_enum_index<R: Read>(r: &mut R, symbol_count: usize) -> Result<usize> {
    let index = decode_long(r)?;
    usize::try_from(index)
        .ok()
        .filter(|&i| i < symbol_count)
        .ok_or_else(|| Error::malformed(format!("enum index {index} out of range 0..{symbol_count}")))
}

// ── Skipping ─────────────────────────────────────────────────────────────────

pub fn skip_long<R: Read>(r: &mut R) -> Result<()> {
    decode_long(r).map(|_| ())
}

pub fn skip_bytes<R: Read>(r: &mut R) -> Result<()> {
    let len = decode_len(r)?;
    skip_exact(r, len)
}

/// Advance `r` by exactly `n` bytes without materializing them.
pub fn skip_exact<R: Read>(r: &mut R, n: u64) -> Result<()> {
    let copied = io::copy(&mut r.by_ref().take(n), &mut io::sink())?;
    if copied < n {
        return Err(Error::malformed("unexpected end of input"));
    }
    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn decode_len<R: Read>(r: &mut R) -> Result<u64> {
    let len = decode_long(r)?;
    u64::try_from(len).map_err(|_| Error::malformed(format!("negative length {len}")))
}

/// Read exactly `len` bytes.  The buffer grows with the data actually
/// present, so a corrupt length cannot force a huge up-front allocation.
fn read_exact_len<R: Read>(r: &mut R, len: u64) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(len.min(64 * 1024) as usize);
    r.by_ref().take(len).read_to_end(&mut out)?;
    if (out.len() as u64) < len {
        return Err(Error::malformed("unexpected end of input"));
    }
    Ok(out)
}
