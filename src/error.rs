//! Error taxonomy shared by every layer of the crate.
//!
//! Nothing here is retried internally: corruption and schema mismatches are
//! not transient, so every variant is surfaced to the caller as soon as it is
//! detected.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Primitive bytes do not form a valid encoding (runaway varint,
    /// truncated input, invalid UTF-8, bad boolean byte, ...).
    #[error("malformed data: {0}")]
    MalformedData(String),

    /// A decoded `int` fell outside the 32-bit range while strict mode is on.
    #[error("value {value} is out of range for int")]
    Range { value: i64 },

    /// Writer and reader schema kinds cannot be reconciled at a position.
    #[error("schema resolution failed: writer {writer} cannot be read as {reader}")]
    SchemaResolution { writer: String, reader: String },

    /// The reader requires a field that neither the writer nor a default supplies.
    #[error("missing field `{field}` in record `{record}` and no default declared")]
    MissingField { record: String, field: String },

    #[error("no union branch matches a {found} value (branches: {branches})")]
    NoMatchingUnionBranch { found: String, branches: String },

    #[error("unknown symbol `{symbol}` for enum `{name}`")]
    UnknownSymbol { name: String, symbol: String },

    #[error("fixed `{name}` expects {expected} bytes, got {found}")]
    SizeMismatch { name: String, expected: usize, found: usize },

    /// A caller-supplied value does not fit the schema at a non-union position.
    #[error("type mismatch: schema expects {expected}, value is {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("unsupported codec `{0}`")]
    UnsupportedCodec(String),

    #[error("compression failed ({codec}): {reason}")]
    Compression { codec: String, reason: String },

    #[error("decompression failed ({codec}): {reason}")]
    Decompression { codec: String, reason: String },

    /// Bad magic, bad version, or a structurally unusable header.
    #[error("invalid container format: {0}")]
    InvalidFormat(String),

    /// Sync marker mismatch or a truncated block frame.
    #[error("corrupt block at offset {offset}: {reason}")]
    CorruptBlock { offset: u64, reason: String },

    /// The schema JSON carried in a header cannot be mapped onto the model.
    #[error("schema error: {0}")]
    Schema(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedData(msg.into())
    }

    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Error::TypeMismatch { expected: expected.into(), found: found.into() }
    }

    pub(crate) fn resolution(writer: impl Into<String>, reader: impl Into<String>) -> Self {
        Error::SchemaResolution { writer: writer.into(), reader: reader.into() }
    }

    /// Map an EOF inside a primitive to `MalformedData`; keep other IO errors.
    pub(crate) fn from_primitive_io(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::MalformedData("unexpected end of input".into())
        } else {
            Error::Io(e)
        }
    }
}
