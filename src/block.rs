//! Block frames.
//!
//! ```text
//! long count | long size | payload[size] | sync[16]
//! ```
//!
//! `payload` is the concatenation of `count` encoded records, passed through
//! the file's codec.  The trailing sync marker is the structural check: any
//! frame whose last 16 bytes are not the file's marker is corrupt.
//!
//! A zero count followed directly by the sync marker and end of input is a
//! terminal resync point and ends the block stream.  The same marker with
//! more bytes behind it is rejected.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use byteorder::ReadBytesExt;

use crate::codec::Codec;
use crate::encoding::primitive::{decode_long, encode_long};
use crate::error::{Error, Result};
use crate::header::{SyncMarker, SYNC_SIZE};

/// One frame as read from disk, payload still compressed.
#[derive(Debug, Clone)]
pub struct RawBlock {
    pub offset:  u64,
    pub count:   u64,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Damage {
    /// Input ended inside the frame.
    Truncated,
    /// The 16 bytes after the payload are not the file's marker.
    SyncMismatch,
    /// Count or size are not valid longs, or a zero-count marker is misplaced.
    Malformed,
}

#[derive(Debug)]
pub enum Frame {
    End,
    Block(RawBlock),
    Damaged { offset: u64, damage: Damage, reason: String },
}

impl Frame {
    /// Collapse damage into `CorruptBlock`; `None` means end of stream.
    pub fn into_result(self) -> Result<Option<RawBlock>> {
        match self {
            Frame::End          => Ok(None),
            Frame::Block(block) => Ok(Some(block)),
            Frame::Damaged { offset, reason, .. } => Err(Error::CorruptBlock { offset, reason }),
        }
    }
}

// ── Write ────────────────────────────────────────────────────────────────────

/// Compress `records` and lay out the full frame.
pub fn encode_block(
    records: &[u8],
    count:   usize,
    codec:   &dyn Codec,
    level:   i32,
    sync:    &SyncMarker,
) -> Result<Vec<u8>> {
    let payload = codec.compress(records, level)?;
    let mut frame = Vec::with_capacity(payload.len() + 2 * 10 + SYNC_SIZE);
    encode_long(count as i64, &mut frame);
    encode_long(payload.len() as i64, &mut frame);
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(sync);
    Ok(frame)
}

pub fn decode_block(block: &RawBlock, codec: &dyn Codec) -> Result<Vec<u8>> {
    codec.decompress(&block.payload)
}

// ── Read ─────────────────────────────────────────────────────────────────────

/// Read the frame starting at `offset`.  Only I/O failures other than EOF are
/// returned as `Err`; everything wrong with the bytes is a [`Frame::Damaged`].
pub fn read_frame<R: Read>(r: &mut R, offset: u64, sync: &SyncMarker) -> Result<Frame> {
    let damaged = |damage, reason: String| Ok(Frame::Damaged { offset, damage, reason });

    let first = match r.read_u8() {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(Frame::End),
        Err(e) => return Err(e.into()),
    };
    let mut head = Cursor::new([first]).chain(&mut *r);
    let count = match decode_long(&mut head) {
        Ok(c) => c,
        Err(e) => return classify(e, offset),
    };
    if count < 0 {
        return damaged(Damage::Malformed, format!("negative record count {count}"));
    }

    if count == 0 {
        let mut probe = [0u8; SYNC_SIZE + 1];
        let n = read_up_to(r, &mut probe)?;
        if n >= SYNC_SIZE && probe[..SYNC_SIZE] == sync[..] {
            return if n == SYNC_SIZE {
                Ok(Frame::End)
            } else {
                damaged(Damage::Malformed, "zero-count sync marker followed by more data".into())
            };
        }
        // An ordinary empty frame: the probed bytes start its size field.
        let mut rest = Cursor::new(&probe[..n]).chain(&mut *r);
        return read_body(&mut rest, offset, 0, sync);
    }

    read_body(r, offset, count as u64, sync)
}

fn read_body<R: Read>(r: &mut R, offset: u64, count: u64, sync: &SyncMarker) -> Result<Frame> {
    let size = match decode_long(r) {
        Ok(s) => s,
        Err(e) => return classify(e, offset),
    };
    let Ok(size) = u64::try_from(size) else {
        return Ok(Frame::Damaged { offset, damage: Damage::Malformed, reason: format!("negative block size {size}") });
    };

    let mut payload = Vec::new();
    let got = r.by_ref().take(size).read_to_end(&mut payload)? as u64;
    if got < size {
        return Ok(Frame::Damaged {
            offset,
            damage: Damage::Truncated,
            reason: format!("payload truncated: {got} of {size} bytes"),
        });
    }

    let mut marker = [0u8; SYNC_SIZE];
    let got = read_up_to(r, &mut marker)?;
    if got < SYNC_SIZE {
        return Ok(Frame::Damaged { offset, damage: Damage::Truncated, reason: "missing sync marker".into() });
    }
    if &marker != sync {
        return Ok(Frame::Damaged {
            offset,
            damage: Damage::SyncMismatch,
            reason: format!("sync marker mismatch: found {}", hex::encode(marker)),
        });
    }
    Ok(Frame::Block(RawBlock { offset, count, payload }))
}

fn classify(e: Error, offset: u64) -> Result<Frame> {
    match e {
        Error::MalformedData(reason) => {
            let damage = if reason.contains("end of input") { Damage::Truncated } else { Damage::Malformed };
            Ok(Frame::Damaged { offset, damage, reason: format!("frame header: {reason}") })
        }
        other => Err(other),
    }
}

/// Fill as much of `buf` as the source allows; returns the filled length.
pub(crate) fn read_up_to<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ── Position tracking ────────────────────────────────────────────────────────

/// Pass-through reader that knows its absolute byte position.
#[derive(Debug)]
pub(crate) struct CountingReader<R> {
    inner: R,
    pos:   u64,
}

impl<R> CountingReader<R> {
    pub(crate) fn new(inner: R, pos: u64) -> Self { Self { inner, pos } }

    pub(crate) fn position(&self) -> u64 { self.pos }

    pub(crate) fn into_inner(self) -> R { self.inner }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Seek> Seek for CountingReader<R> {
    fn seek(&mut self, to: SeekFrom) -> io::Result<u64> {
        self.pos = self.inner.seek(to)?;
        Ok(self.pos)
    }
}

/// Single `write_all` so a failing sink never holds half a frame from us.
pub(crate) fn write_frame<W: Write>(w: &mut W, frame: &[u8]) -> io::Result<()> {
    w.write_all(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::NullCodec;

    const SYNC: SyncMarker = [0xAB; SYNC_SIZE];

    fn frame(count: usize, records: &[u8]) -> Vec<u8> {
        encode_block(records, count, &NullCodec, 0, &SYNC).unwrap()
    }

    #[test]
    fn frame_layout() {
        let bytes = frame(2, &[0x02, 0x04]);
        assert_eq!(&bytes[..4], &[0x04, 0x04, 0x02, 0x04]);
        assert_eq!(&bytes[4..], &SYNC);
    }

    #[test]
    fn read_back_block_then_end() {
        let bytes = frame(3, b"abc");
        let mut r = &bytes[..];
        let block = read_frame(&mut r, 100, &SYNC).unwrap().into_result().unwrap().unwrap();
        assert_eq!((block.offset, block.count, block.payload.as_slice()), (100, 3, &b"abc"[..]));
        assert!(matches!(read_frame(&mut r, 0, &SYNC).unwrap(), Frame::End));
    }

    #[test]
    fn zero_count_marker_at_end_is_end() {
        let mut bytes = vec![0x00];
        bytes.extend_from_slice(&SYNC);
        assert!(matches!(read_frame(&mut &bytes[..], 0, &SYNC).unwrap(), Frame::End));
    }

    #[test]
    fn zero_count_marker_with_trailing_data_is_corrupt() {
        let mut bytes = vec![0x00];
        bytes.extend_from_slice(&SYNC);
        bytes.push(0x02);
        match read_frame(&mut &bytes[..], 7, &SYNC).unwrap() {
            Frame::Damaged { offset, damage, .. } => assert_eq!((offset, damage), (7, Damage::Malformed)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ordinary_empty_frame_is_a_block() {
        let bytes = frame(0, &[]);
        let mut r = &bytes[..];
        let block = read_frame(&mut r, 0, &SYNC).unwrap().into_result().unwrap().unwrap();
        assert_eq!(block.count, 0);
        assert!(r.is_empty());
    }

    #[test]
    fn damage_kinds() {
        let good = frame(1, b"x");

        let mut bad_sync = good.clone();
        *bad_sync.last_mut().unwrap() ^= 1;
        assert!(matches!(
            read_frame(&mut &bad_sync[..], 0, &SYNC).unwrap(),
            Frame::Damaged { damage: Damage::SyncMismatch, .. }
        ));

        let truncated = &good[..good.len() - 4];
        assert!(matches!(
            read_frame(&mut &truncated[..], 0, &SYNC).unwrap(),
            Frame::Damaged { damage: Damage::Truncated, .. }
        ));

        let err = read_frame(&mut &truncated[..], 9, &SYNC).unwrap().into_result().unwrap_err();
        assert!(matches!(err, Error::CorruptBlock { offset: 9, .. }));
    }

    #[test]
    fn counting_reader_tracks_position() {
        let data = [1u8, 2, 3, 4, 5];
        let mut r = CountingReader::new(&data[..], 10);
        let mut buf = [0u8; 3];
        r.read_exact(&mut buf).unwrap();
        assert_eq!(r.position(), 13);
    }
}
