//! Sync-marker recovery: resynchronisation and block health scanning.
//!
//! # How it works
//!
//! Every frame ends with the file's 16-byte sync marker, so a reader that
//! loses its place can search forward for the next marker and restart at the
//! byte after it.  The scanner walks the file frame by frame from the end of
//! the header; after a damaged frame it resumes at the next marker instead
//! of giving up.
//!
//! ## Block health
//!
//! - `Healthy`: frame intact, payload decompresses, every record decodes
//!   under the writer schema and consumes the payload exactly
//! - `SyncMismatch`: the bytes after the payload are not the marker
//! - `Truncated`: input ends inside the frame
//! - `Malformed`: count or size field is not a valid long
//! - `Undecodable`: framing intact but decompression or decoding fails

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::block::{decode_block, read_frame, CountingReader, Damage, Frame, RawBlock};
use crate::codec::{Codec, CodecRegistry};
use crate::encoding::{composite, DatumConfig};
use crate::error::{Error, Result};
use crate::header::{Header, SyncMarker, SYNC_SIZE};
use crate::io_stream::{DataFileWriter, WriterOptions};
use crate::schema::Schema;

const SEARCH_CHUNK: usize = 8192;

// ── Resync ───────────────────────────────────────────────────────────────────

/// Offset of the first occurrence of `sync` starting at or after `from`.
/// Leaves the stream at an unspecified position.
pub fn find_sync<R: Read + Seek>(r: &mut R, sync: &SyncMarker, from: u64) -> Result<Option<u64>> {
    r.seek(SeekFrom::Start(from))?;
    let mut window: Vec<u8> = Vec::with_capacity(SEARCH_CHUNK + SYNC_SIZE);
    let mut window_start = from;
    let mut chunk = vec![0u8; SEARCH_CHUNK];

    loop {
        let n = match r.read(&mut chunk) {
            Ok(0) => return Ok(None),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        window.extend_from_slice(&chunk[..n]);
        if let Some(i) = window.windows(SYNC_SIZE).position(|w| w == sync) {
            return Ok(Some(window_start + i as u64));
        }
        // Keep the tail that could still be the start of a marker.
        let keep = window.len().min(SYNC_SIZE - 1);
        let drop = window.len() - keep;
        window.drain(..drop);
        window_start += drop as u64;
    }
}

// ── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockHealth {
    Healthy,
    SyncMismatch,
    Truncated,
    Malformed,
    Undecodable { reason: String },
}

impl BlockHealth {
    pub fn is_usable(&self) -> bool {
        matches!(self, BlockHealth::Healthy)
    }
}

impl From<Damage> for BlockHealth {
    fn from(d: Damage) -> Self {
        match d {
            Damage::Truncated    => BlockHealth::Truncated,
            Damage::SyncMismatch => BlockHealth::SyncMismatch,
            Damage::Malformed    => BlockHealth::Malformed,
        }
    }
}

/// Diagnostic record for one frame position.
#[derive(Debug, Clone)]
pub struct ScannedBlock {
    pub offset:       u64,
    /// Known only when the frame header could be read.
    pub records:      Option<u64>,
    pub payload_size: Option<u64>,
    pub health:       BlockHealth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryQuality {
    /// Every block healthy.
    Full,
    /// At least half of the blocks healthy.
    Partial,
    /// Fewer than half healthy; results unreliable.
    Catastrophic,
}

#[derive(Debug)]
pub struct RecoveryReport {
    pub header:          Header,
    pub blocks:          Vec<ScannedBlock>,
    pub healthy_records: u64,
    pub bytes_scanned:   u64,
    /// Bytes skipped while searching for a marker after damage.
    pub bytes_skipped:   u64,
}

impl RecoveryReport {
    pub fn healthy_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| b.health.is_usable()).count()
    }

    pub fn damaged_blocks(&self) -> usize {
        self.blocks.len() - self.healthy_blocks()
    }

    /// Percentage of blocks that are healthy (0.0-100.0).
    pub fn health_pct(&self) -> f64 {
        if self.blocks.is_empty() { return 100.0; }
        self.healthy_blocks() as f64 / self.blocks.len() as f64 * 100.0
    }

    pub fn quality(&self) -> RecoveryQuality {
        match self.health_pct() {
            p if p >= 100.0 => RecoveryQuality::Full,
            p if p >= 50.0  => RecoveryQuality::Partial,
            _               => RecoveryQuality::Catastrophic,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{:?} recovery: {}/{} blocks healthy ({:.1}%), {} record(s) recoverable, {} byte(s) skipped",
            self.quality(),
            self.healthy_blocks(),
            self.blocks.len(),
            self.health_pct(),
            self.healthy_records,
            self.bytes_skipped,
        )
    }
}

// ── Scanner ──────────────────────────────────────────────────────────────────

/// Walk every frame of a container.
///
/// Damaged data never produces `Err`: it is reported as a [`BlockHealth`].
/// Only a header that cannot be read, a codec that is unavailable, and
/// genuine I/O failures propagate.
pub fn scan<R: Read + Seek>(source: R, registry: &CodecRegistry) -> Result<RecoveryReport> {
    let mut r = CountingReader::new(source, 0);
    r.seek(SeekFrom::Start(0))?;
    let header = Header::read(&mut r)?;
    let schema = header.schema()?;
    let codec = registry.get(header.codec_name())?;

    let mut blocks = Vec::new();
    let mut healthy_records = 0u64;
    let mut bytes_skipped = 0u64;

    loop {
        let offset = r.position();
        match read_frame(&mut r, offset, &header.sync)? {
            Frame::End => break,
            Frame::Block(block) => {
                let health = check_block(&block, codec.as_ref(), &schema);
                if health.is_usable() {
                    healthy_records += block.count;
                } else {
                    warn!(offset, ?health, "undecodable block");
                }
                blocks.push(ScannedBlock {
                    offset,
                    records:      Some(block.count),
                    payload_size: Some(block.payload.len() as u64),
                    health,
                });
            }
            Frame::Damaged { damage, reason, .. } => {
                warn!(offset, ?damage, %reason, "damaged block");
                blocks.push(ScannedBlock { offset, records: None, payload_size: None, health: damage.into() });

                match find_sync(&mut r, &header.sync, offset + 1)? {
                    Some(marker) => {
                        let next = marker + SYNC_SIZE as u64;
                        bytes_skipped += next - offset;
                        debug!(from = offset, to = next, "resynchronised");
                        r.seek(SeekFrom::Start(next))?;
                    }
                    None => {
                        let end = r.seek(SeekFrom::End(0))?;
                        bytes_skipped += end.saturating_sub(offset);
                        break;
                    }
                }
            }
        }
    }

    Ok(RecoveryReport { header, blocks, healthy_records, bytes_scanned: r.position(), bytes_skipped })
}

pub fn scan_file(path: &Path) -> Result<RecoveryReport> {
    let f = std::fs::File::open(path)?;
    scan(io::BufReader::new(f), &CodecRegistry::default())
}

fn check_block(block: &RawBlock, codec: &dyn Codec, schema: &Schema) -> BlockHealth {
    let undecodable = |e: Error| BlockHealth::Undecodable { reason: e.to_string() };
    let records = match decode_block(block, codec) {
        Ok(r) => r,
        Err(e) => return undecodable(e),
    };
    let mut cursor = records.as_slice();
    for _ in 0..block.count {
        if let Err(e) = composite::skip(schema, schema.root(), &mut cursor) {
            return undecodable(e);
        }
    }
    if !cursor.is_empty() {
        return BlockHealth::Undecodable { reason: format!("{} trailing bytes", cursor.len()) };
    }
    BlockHealth::Healthy
}

/// Copy the records of every healthy block of `src` into a new container
/// written to `dst` under the same schema.  `options.codec` selects the
/// output codec.
pub fn extract_recoverable<R, W>(src: R, dst: W, options: WriterOptions) -> Result<(RecoveryReport, W)>
where
    R: Read + Seek,
    W: Write,
{
    let registry = CodecRegistry::default();
    let mut r = io::BufReader::new(src);
    let report = scan(&mut r, &registry)?;
    let schema = std::sync::Arc::new(report.header.schema()?);
    let codec = registry.get(report.header.codec_name())?;
    let datum = DatumConfig::default();

    let mut writer = DataFileWriter::with_registry(dst, schema.clone(), options, &registry)?;
    for scanned in report.blocks.iter().filter(|b| b.health.is_usable()) {
        r.seek(SeekFrom::Start(scanned.offset))?;
        let Some(block) = read_frame(&mut r, scanned.offset, &report.header.sync)?.into_result()? else {
            break;
        };
        let records = decode_block(&block, codec.as_ref())?;
        let mut cursor = records.as_slice();
        for _ in 0..block.count {
            writer.append(&composite::decode(&schema, schema.root(), &datum, &mut cursor)?)?;
        }
    }
    let dst = writer.close()?;
    Ok((report, dst))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn find_sync_across_chunk_boundary() {
        let sync: SyncMarker = [0x5A; SYNC_SIZE];
        let mut data = vec![0u8; SEARCH_CHUNK - 5];
        data.extend_from_slice(&sync);
        data.extend_from_slice(&[1, 2, 3]);
        let mut r = Cursor::new(data);
        assert_eq!(find_sync(&mut r, &sync, 0).unwrap(), Some((SEARCH_CHUNK - 5) as u64));
        assert_eq!(find_sync(&mut r, &sync, (SEARCH_CHUNK - 4) as u64).unwrap(), None);
    }

    #[test]
    fn quality_thresholds() {
        let header = Header { metadata: Default::default(), sync: [0; SYNC_SIZE] };
        let block = |health| ScannedBlock { offset: 0, records: None, payload_size: None, health };
        let mut report = RecoveryReport {
            header,
            blocks: vec![block(BlockHealth::Healthy), block(BlockHealth::Healthy)],
            healthy_records: 0,
            bytes_scanned: 0,
            bytes_skipped: 0,
        };
        assert_eq!(report.quality(), RecoveryQuality::Full);
        report.blocks.push(block(BlockHealth::Truncated));
        assert_eq!(report.quality(), RecoveryQuality::Partial);
        report.blocks.push(block(BlockHealth::SyncMismatch));
        report.blocks.push(block(BlockHealth::Malformed));
        assert_eq!(report.quality(), RecoveryQuality::Catastrophic);
    }
}
