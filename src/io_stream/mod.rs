//! Streaming container writer and reader.
//!
//! # Writer
//! [`DataFileWriter`] writes the header on construction, buffers encoded
//! records into the open block, and emits a whole frame whenever the block
//! reaches `sync_interval` bytes or `block_record_limit` records, on
//! [`flush`](DataFileWriter::flush), on [`close`](DataFileWriter::close), or
//! after every append when `flush_on_append` is set.  A frame is handed to
//! the sink in one `write_all`; a failing write poisons the writer and drops
//! the buffered block, leaving earlier frames intact.
//!
//! # Reader
//! [`DataFileReader`] validates the header up front (magic, schema, codec
//! availability), then yields records lazily.  Each block's payload is
//! decompressed in one piece and decoded through the cached resolution plan
//! for the (writer, reader) schema pair.  After any error the reader stops;
//! [`sync_to`](DataFileReader::sync_to) resumes at the next sync marker.

use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::block::{decode_block, encode_block, read_frame, write_frame, CountingReader};
use crate::codec::{Codec, CodecRegistry, DEFAULT_COMPRESSION_LEVEL, NULL};
use crate::encoding::{encode, DatumConfig};
use crate::error::{Error, Result};
use crate::header::{Header, SyncMarker, SYNC_SIZE};
use crate::recovery::find_sync;
use crate::resolve::{PlanCache, ResolutionConfig, ResolutionPlan};
use crate::schema::Schema;
use crate::value::Value;

/// Flush threshold for the open block, in encoded bytes.
pub const DEFAULT_SYNC_INTERVAL: usize = 64_000;

// ── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    pub codec:              String,
    pub compression_level:  i32,
    pub sync_interval:      usize,
    pub block_record_limit: Option<usize>,
    /// Emit a frame after every append (streaming writers).
    pub flush_on_append:    bool,
    /// Caller metadata; keys may not start with `avro.`.
    pub metadata:           BTreeMap<String, Vec<u8>>,
    pub datum:              DatumConfig,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            codec:              NULL.to_string(),
            compression_level:  DEFAULT_COMPRESSION_LEVEL,
            sync_interval:      DEFAULT_SYNC_INTERVAL,
            block_record_limit: None,
            flush_on_append:    false,
            metadata:           BTreeMap::new(),
            datum:              DatumConfig::default(),
        }
    }
}

impl WriterOptions {
    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    pub datum:      DatumConfig,
    pub resolution: ResolutionConfig,
}

// ── Writer ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    HeaderWritten,
    BlockOpen,
    /// A sink write failed; no further frames are written.
    Failed,
    Closed,
}

pub struct DataFileWriter<W: Write> {
    inner:       Option<W>,
    schema:      Arc<Schema>,
    header:      Header,
    codec:       Arc<dyn Codec>,
    options:     WriterOptions,
    block:       Vec<u8>,
    block_count: usize,
    scratch:     Vec<u8>,
    /// Absolute offset of the next byte written to `inner`.
    position:    u64,
    state:       WriterState,
}

impl<W: Write> DataFileWriter<W> {
    pub fn new(inner: W, schema: Arc<Schema>, options: WriterOptions) -> Result<Self> {
        Self::with_registry(inner, schema, options, &CodecRegistry::default())
    }

    /// Create a file: resolve the codec, then write the header.
    pub fn with_registry(
        mut inner: W,
        schema:    Arc<Schema>,
        options:   WriterOptions,
        registry:  &CodecRegistry,
    ) -> Result<Self> {
        let codec = registry.get(&options.codec)?;
        let header = Header::new(&schema, codec.name(), &options.metadata)?;
        let position = header.write(&mut inner)?;
        Ok(Self::resume(inner, schema, header, codec, options, position))
    }

    fn resume(
        inner:    W,
        schema:   Arc<Schema>,
        header:   Header,
        codec:    Arc<dyn Codec>,
        options:  WriterOptions,
        position: u64,
    ) -> Self {
        Self {
            inner: Some(inner),
            schema,
            header,
            codec,
            options,
            block: Vec::new(),
            block_count: 0,
            scratch: Vec::new(),
            position,
            state: WriterState::HeaderWritten,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> { &self.schema }

    pub fn header(&self) -> &Header { &self.header }

    pub fn sync_marker(&self) -> &SyncMarker { &self.header.sync }

    pub fn state(&self) -> WriterState { self.state }

    /// Records buffered in the open block.
    pub fn pending(&self) -> usize { self.block_count }

    /// Encode `value` into the open block.  A value that fails to encode
    /// leaves the block untouched.
    pub fn append(&mut self, value: &Value) -> Result<()> {
        self.ensure_writable()?;
        self.scratch.clear();
        encode(value, &self.schema, self.schema.root(), &self.options.datum, &mut self.scratch)?;
        self.block.extend_from_slice(&self.scratch);
        self.block_count += 1;
        self.state = WriterState::BlockOpen;

        let full = self.block.len() >= self.options.sync_interval
            || self.options.block_record_limit.is_some_and(|limit| self.block_count >= limit);
        if self.options.flush_on_append || full {
            self.flush_block()?;
        }
        Ok(())
    }

    pub fn extend<'a, I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        values.into_iter().try_for_each(|v| self.append(v))
    }

    /// Write the open block (if any) and flush the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_block()?;
        if let Some(inner) = self.inner.as_mut() {
            inner.flush()?;
        }
        Ok(())
    }

    /// Close the open block and return the offset where the next block will
    /// start.  Readers can jump there with `DataFileReader::seek_to_sync`.
    pub fn sync(&mut self) -> Result<u64> {
        self.flush_block()?;
        Ok(self.position)
    }

    /// Flush and hand back the sink.
    pub fn close(mut self) -> Result<W> {
        self.flush()?;
        self.state = WriterState::Closed;
        self.inner.take().ok_or_else(|| closed_error("writer has no sink"))
    }

    fn ensure_writable(&self) -> Result<()> {
        match self.state {
            WriterState::Failed => Err(closed_error("writer failed on an earlier write")),
            WriterState::Closed => Err(closed_error("writer is closed")),
            _ => Ok(()),
        }
    }

    fn flush_block(&mut self) -> Result<()> {
        if self.block_count == 0 {
            return Ok(());
        }
        self.ensure_writable()?;
        let inner = self.inner.as_mut().ok_or_else(|| closed_error("writer has no sink"))?;

        let frame = encode_block(
            &self.block,
            self.block_count,
            self.codec.as_ref(),
            self.options.compression_level,
            &self.header.sync,
        )?;
        if let Err(e) = write_frame(inner, &frame) {
            self.state = WriterState::Failed;
            self.block.clear();
            self.block_count = 0;
            return Err(e.into());
        }
        debug!(
            offset = self.position,
            records = self.block_count,
            raw = self.block.len(),
            framed = frame.len(),
            codec = self.codec.name(),
            "block flushed"
        );
        self.position += frame.len() as u64;
        self.block.clear();
        self.block_count = 0;
        self.state = WriterState::HeaderWritten;
        Ok(())
    }
}

impl<W: Read + Write + Seek> DataFileWriter<W> {
    /// Reopen an existing file for appending.  The schema, codec and sync
    /// marker come from its header; `options.codec` and `options.metadata`
    /// are ignored.  Nothing is written until a block is flushed.
    pub fn append_to(inner: W, options: WriterOptions) -> Result<Self> {
        Self::append_to_with_registry(inner, options, &CodecRegistry::default())
    }

    pub fn append_to_with_registry(mut inner: W, options: WriterOptions, registry: &CodecRegistry) -> Result<Self> {
        inner.seek(SeekFrom::Start(0))?;
        let header = Header::read(&mut inner)?;
        let schema = Arc::new(header.schema()?);
        let codec = registry.get(header.codec_name())?;
        let position = inner.seek(SeekFrom::End(0))?;
        debug!(position, codec = codec.name(), "reopened for append");
        Ok(Self::resume(inner, schema, header, codec, options, position))
    }
}

impl<W: Write> Drop for DataFileWriter<W> {
    fn drop(&mut self) {
        if matches!(self.state, WriterState::Closed | WriterState::Failed) {
            return;
        }
        if let Err(e) = self.flush() {
            warn!(error = %e, "flush on drop failed; buffered records lost");
        }
    }
}

fn closed_error(msg: &str) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::BrokenPipe, msg.to_string()))
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct DataFileReader<R: Read> {
    source:     CountingReader<R>,
    header:     Header,
    plan:       Arc<ResolutionPlan>,
    codec:      Arc<dyn Codec>,
    options:    ReaderOptions,
    current:    Cursor<Vec<u8>>,
    remaining:  u64,
    /// Offset of the frame being read; the byte after the previous marker.
    block_start: u64,
    data_start: u64,
    done:       bool,
}

impl<R: Read> DataFileReader<R> {
    /// Read with the writer's own schema.
    pub fn new(source: R) -> Result<Self> {
        Self::with_options(source, None, ReaderOptions::default())
    }

    pub fn with_reader_schema(source: R, reader: Arc<Schema>) -> Result<Self> {
        Self::with_options(source, Some(reader), ReaderOptions::default())
    }

    pub fn with_options(source: R, reader: Option<Arc<Schema>>, options: ReaderOptions) -> Result<Self> {
        Self::open(source, reader, options, &CodecRegistry::default(), PlanCache::global())
    }

    /// Full control: codec registry and plan cache are supplied by the host.
    /// `source` must be positioned at the start of the file.
    pub fn open(
        source:   R,
        reader:   Option<Arc<Schema>>,
        options:  ReaderOptions,
        registry: &CodecRegistry,
        cache:    &PlanCache,
    ) -> Result<Self> {
        let mut source = CountingReader::new(source, 0);
        let header = Header::read(&mut source)?;
        let codec = registry.get(header.codec_name())?;
        let writer = Arc::new(header.schema()?);
        let reader = reader.unwrap_or_else(|| Arc::clone(&writer));
        let plan = cache.get_or_build(&writer, &reader)?;
        let data_start = source.position();
        Ok(Self {
            source,
            header,
            plan,
            codec,
            options,
            current: Cursor::new(Vec::new()),
            remaining: 0,
            block_start: data_start,
            data_start,
            done: false,
        })
    }

    pub fn header(&self) -> &Header { &self.header }

    pub fn metadata(&self, key: &str) -> Option<&[u8]> { self.header.get(key) }

    pub fn writer_schema(&self) -> &Arc<Schema> { self.plan.writer() }

    pub fn reader_schema(&self) -> &Arc<Schema> { self.plan.reader() }

    pub fn codec_name(&self) -> &str { self.codec.name() }

    pub fn sync_marker(&self) -> &SyncMarker { &self.header.sync }

    /// Offset of the first block.
    pub fn data_start(&self) -> u64 { self.data_start }

    /// Offset of the block currently being read (just after the last marker).
    pub fn previous_sync(&self) -> u64 { self.block_start }

    /// True once the reader has moved past the split ending at `position`.
    pub fn past_sync(&self, position: u64) -> bool {
        self.done || self.block_start >= position + SYNC_SIZE as u64
    }

    pub fn into_inner(self) -> R { self.source.into_inner() }

    fn next_record(&mut self) -> Result<Option<Value>> {
        while self.remaining == 0 {
            if self.done {
                return Ok(None);
            }
            self.load_block()?;
        }
        let value = self.plan.decode(
            &mut self.current,
            &self.options.datum,
            &self.options.resolution,
        )?;
        self.remaining -= 1;
        Ok(Some(value))
    }

    fn load_block(&mut self) -> Result<()> {
        let leftover = self.current.get_ref().len() as u64 - self.current.position();
        if leftover > 0 {
            return Err(Error::CorruptBlock {
                offset: self.block_start,
                reason: format!("{leftover} bytes left after the last record"),
            });
        }

        let offset = self.source.position();
        match read_frame(&mut self.source, offset, &self.header.sync)?.into_result()? {
            None => {
                trace!(offset, "end of block stream");
                self.done = true;
            }
            Some(block) => {
                let records = decode_block(&block, self.codec.as_ref())?;
                trace!(offset, records = block.count, bytes = records.len(), "block loaded");
                self.block_start = offset;
                self.current = Cursor::new(records);
                self.remaining = block.count;
            }
        }
        Ok(())
    }

    fn reset_block(&mut self, block_start: u64) {
        self.current = Cursor::new(Vec::new());
        self.remaining = 0;
        self.block_start = block_start;
        self.done = false;
    }
}

impl<R: Read + Seek> DataFileReader<R> {
    /// Move to the first block boundary at or after `position` and resume
    /// there.  With no marker past `position` the reader is exhausted.
    pub fn sync_to(&mut self, position: u64) -> Result<()> {
        let found = find_sync(&mut self.source, &self.header.sync, position)?;
        match found {
            Some(marker) => {
                let start = marker + SYNC_SIZE as u64;
                self.source.seek(SeekFrom::Start(start))?;
                debug!(position, block = start, "resynchronised");
                self.reset_block(start);
            }
            None => {
                let end = self.source.seek(SeekFrom::End(0))?;
                self.reset_block(end);
                self.done = true;
            }
        }
        Ok(())
    }

    /// Jump to a block boundary obtained from `DataFileWriter::sync` or
    /// [`previous_sync`](Self::previous_sync).
    pub fn seek_to_sync(&mut self, position: u64) -> Result<()> {
        self.source.seek(SeekFrom::Start(position))?;
        self.reset_block(position);
        Ok(())
    }
}

impl<R: Read> Iterator for DataFileReader<R> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(v) => v.map(Ok),
            Err(e) => {
                self.done = true;
                self.remaining = 0;
                self.current = Cursor::new(Vec::new());
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Kind;

    fn long_schema() -> Arc<Schema> {
        Arc::new(Schema::primitive(Kind::Long).unwrap())
    }

    #[test]
    fn write_then_read_in_memory() {
        let mut w = DataFileWriter::new(Vec::new(), long_schema(), WriterOptions::default()).unwrap();
        for i in 0..10 {
            w.append(&Value::Int(i)).unwrap();
        }
        let bytes = w.close().unwrap();

        let values: Vec<Value> = DataFileReader::new(&bytes[..]).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(values, (0..10).map(Value::Int).collect::<Vec<_>>());
    }

    #[test]
    fn record_limit_splits_blocks() {
        let options = WriterOptions { block_record_limit: Some(3), ..Default::default() };
        let mut w = DataFileWriter::new(Vec::new(), long_schema(), options).unwrap();
        let header_len = w.sync().unwrap();
        for i in 0..7 {
            w.append(&Value::Int(i)).unwrap();
        }
        assert_eq!(w.pending(), 1);
        let after_two_blocks = w.sync().unwrap();
        assert!(after_two_blocks > header_len);
        let bytes = w.close().unwrap();
        assert_eq!(DataFileReader::new(&bytes[..]).unwrap().count(), 7);
    }

    #[test]
    fn failed_encode_leaves_block_untouched() {
        let mut w = DataFileWriter::new(Vec::new(), long_schema(), WriterOptions::default()).unwrap();
        w.append(&Value::Int(1)).unwrap();
        assert!(w.append(&Value::String("x".into())).is_err());
        assert_eq!(w.pending(), 1);
        let bytes = w.close().unwrap();
        assert_eq!(DataFileReader::new(&bytes[..]).unwrap().count(), 1);
    }

    #[test]
    fn options_load_from_json() {
        let opts: WriterOptions = serde_json::from_str(r#"{"codec":"zstandard","block_record_limit":10}"#).unwrap();
        assert_eq!(opts.codec, "zstandard");
        assert_eq!(opts.sync_interval, DEFAULT_SYNC_INTERVAL);
        let ropts: ReaderOptions =
            serde_json::from_str(r#"{"resolution":{"enum_fallback":"reader_default"}}"#).unwrap();
        assert_eq!(ropts.resolution.enum_fallback, crate::resolve::EnumFallback::ReaderDefault);
    }
}
