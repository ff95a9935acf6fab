//! Section framing.
//!
//! Every LFP container is a run of sections, each laid out as:
//!
//! | Field | Size | Notes |
//! |-------|------|-------|
//! | magic | 12 | fixed per kind |
//! | size | 4 | big-endian `i32`, payload length |
//! | content id | 45 | ASCII `sha1-<40 hex>`, only when size > 0 |
//! | padding | 35 | nulls, only when size > 0 |
//! | payload | size | only when size > 0 |
//! | trailing padding | variable | nulls up to the next magic |
//!
//! Payloads are never read while framing; [`Section::read_data`] seeks back
//! to them on demand.

use byteorder::{BigEndian, ReadBytesExt};
use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use tracing::trace;

use crate::error::{LfpError, Result};

pub const MAGIC_LENGTH:   usize = 12;
pub const SIZE_LENGTH:    usize = 4;
pub const SHA1_LENGTH:    usize = 45;
pub const PADDING_LENGTH: usize = 35;

/// Bytes of framing in front of a non-empty payload.
pub const FRAMED_HEADER_LENGTH: u64 =
    (MAGIC_LENGTH + SIZE_LENGTH + SHA1_LENGTH + PADDING_LENGTH) as u64;
/// Bytes of framing for a payload-less (sentinel) section.
pub const EMPTY_SECTION_LENGTH: u64 = (MAGIC_LENGTH + SIZE_LENGTH) as u64;

pub const HEADER_MAGIC: &[u8; MAGIC_LENGTH] = b"\x89LFP\x0D\x0A\x1A\x0A\x00\x00\x00\x01";
pub const META_MAGIC:   &[u8; MAGIC_LENGTH] = b"\x89LFM\x0D\x0A\x1A\x0A\x00\x00\x00\x00";
pub const CHUNK_MAGIC:  &[u8; MAGIC_LENGTH] = b"\x89LFC\x0D\x0A\x1A\x0A\x00\x00\x00\x00";

const SHA1_PREFIX: &str = "sha1-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Header,
    Meta,
    Chunk,
}

impl SectionKind {
    #[inline]
    pub fn magic(self) -> &'static [u8; MAGIC_LENGTH] {
        match self {
            SectionKind::Header => HEADER_MAGIC,
            SectionKind::Meta   => META_MAGIC,
            SectionKind::Chunk  => CHUNK_MAGIC,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SectionKind::Header => "Header",
            SectionKind::Meta   => "Meta",
            SectionKind::Chunk  => "Chunk",
        }
    }
}

/// One framed section. Holds positions only, never payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind:        SectionKind,
    /// Absolute offset of the magic.
    pub offset:      u64,
    pub size:        u32,
    /// Content id, present iff `size > 0`.
    pub sha1:        Option<String>,
    /// Absolute offset of the payload, present iff `size > 0`.
    pub data_offset: Option<u64>,
}

impl Section {
    /// Frame one section of `kind` at the reader's current position.
    ///
    /// On return the reader sits on the first byte after the section's
    /// trailing null padding. `stream_len` bounds the payload so a truncated
    /// file is rejected here rather than on the first payload read.
    ///
    /// Fixed padding and payloads are skipped with `seek_relative`, so the
    /// buffer survives unless a payload is larger than what it holds.
    pub fn read<R: Read + Seek>(
        reader: &mut BufReader<R>,
        kind: SectionKind,
        stream_len: u64,
    ) -> Result<Self> {
        let offset = reader.stream_position()?;

        let mut magic = [0u8; MAGIC_LENGTH];
        reader.read_exact(&mut magic).map_err(|e| truncated(e, offset, kind))?;
        if &magic != kind.magic() {
            return Err(LfpError::format(
                offset,
                format!("invalid magic bytes for section {}", kind.name()),
            ));
        }

        let size = reader.read_i32::<BigEndian>().map_err(|e| truncated(e, offset, kind))?;
        if size < 0 {
            return Err(LfpError::format(
                offset,
                format!("negative size {size} for section {}", kind.name()),
            ));
        }
        if size == 0 {
            trace!(kind = kind.name(), offset, "empty section");
            return Ok(Self { kind, offset, size: 0, sha1: None, data_offset: None });
        }
        let size = size as u32;

        let mut id = [0u8; SHA1_LENGTH];
        reader.read_exact(&mut id).map_err(|e| truncated(e, offset, kind))?;
        let sha1 = parse_content_id(&id)
            .ok_or_else(|| LfpError::format(offset, "content id is not ASCII"))?;

        let data_offset = reader.stream_position()? + PADDING_LENGTH as u64;
        let data_end = data_offset + u64::from(size);
        if data_end > stream_len {
            return Err(LfpError::format(
                offset,
                format!(
                    "{} payload of {size} B runs past end of stream ({stream_len} B)",
                    kind.name()
                ),
            ));
        }
        reader.seek_relative(PADDING_LENGTH as i64 + i64::from(size))?;
        let padding = skip_null_padding(reader)?;

        trace!(kind = kind.name(), offset, size, padding, sha1 = %sha1, "framed section");
        Ok(Self { kind, offset, size, sha1: Some(sha1), data_offset: Some(data_offset) })
    }

    /// Seek to the payload and read it. Empty sections yield an empty vec.
    pub fn read_data<R: Read + Seek>(&self, reader: &mut R) -> io::Result<Vec<u8>> {
        let Some(data_offset) = self.data_offset else {
            return Ok(Vec::new());
        };
        reader.seek(SeekFrom::Start(data_offset))?;
        let mut data = vec![0u8; self.size as usize];
        reader.read_exact(&mut data)?;
        Ok(data)
    }

    /// Bytes this section occupies on disk, excluding trailing padding.
    pub fn framed_len(&self) -> u64 {
        if self.size == 0 {
            EMPTY_SECTION_LENGTH
        } else {
            FRAMED_HEADER_LENGTH + u64::from(self.size)
        }
    }

    /// Raw 20-byte SHA-1 digest decoded from the content id, if well formed.
    pub fn digest(&self) -> Option<[u8; 20]> {
        let hex_part = self.sha1.as_deref()?.strip_prefix(SHA1_PREFIX)?;
        let mut out = [0u8; 20];
        hex::decode_to_slice(hex_part, &mut out).ok()?;
        Some(out)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.size > 0 {
            write!(f, "{}({}B)", self.kind.name(), self.size)
        } else {
            write!(f, "{}()", self.kind.name())
        }
    }
}

fn parse_content_id(raw: &[u8; SHA1_LENGTH]) -> Option<String> {
    let id = std::str::from_utf8(raw).ok()?;
    if !id.is_ascii() {
        return None;
    }
    Some(id.trim_end_matches('\0').to_owned())
}

/// Consume consecutive null bytes, leaving the reader on the next non-null
/// byte (or at EOF). Returns the number of bytes skipped.
fn skip_null_padding<R: BufRead>(reader: &mut R) -> io::Result<u64> {
    let mut skipped = 0u64;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(skipped);
        }
        let nulls = buf.iter().take_while(|b| **b == 0).count();
        let done = nulls < buf.len();
        reader.consume(nulls);
        skipped += nulls as u64;
        if done {
            return Ok(skipped);
        }
    }
}

fn truncated(e: io::Error, offset: u64, kind: SectionKind) -> LfpError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        LfpError::format(offset, format!("truncated {} section", kind.name()))
    } else {
        LfpError::Io(e)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    fn buffered(bytes: Vec<u8>) -> BufReader<Cursor<Vec<u8>>> {
        BufReader::new(Cursor::new(bytes))
    }

    /// Counts seeks that move the inner stream.
    struct SeekCounter {
        inner: Cursor<Vec<u8>>,
        seeks: usize,
    }

    impl Read for SeekCounter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl Seek for SeekCounter {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            if pos != SeekFrom::Current(0) {
                self.seeks += 1;
            }
            self.inner.seek(pos)
        }
    }

    pub(crate) fn sha1_for(seed: u8) -> String {
        format!("{SHA1_PREFIX}{}", hex::encode([seed; 20]))
    }

    /// Frame `payload` the way the camera writes it, padded to 16 bytes.
    pub(crate) fn frame(kind: SectionKind, sha1: &str, payload: &[u8]) -> Vec<u8> {
        let mut out = kind.magic().to_vec();
        out.extend_from_slice(&(payload.len() as i32).to_be_bytes());
        if payload.is_empty() {
            return out;
        }
        let mut id = sha1.as_bytes().to_vec();
        id.resize(SHA1_LENGTH, 0);
        out.extend_from_slice(&id);
        out.extend_from_slice(&[0u8; PADDING_LENGTH]);
        out.extend_from_slice(payload);
        while out.len() % 16 != 0 {
            out.push(0);
        }
        out
    }

    #[test]
    fn reads_header_and_lands_on_next_magic() {
        let mut bytes = frame(SectionKind::Header, "", &[]);
        let meta = frame(SectionKind::Meta, &sha1_for(1), b"{\"a\":1}");
        bytes.extend_from_slice(&meta);
        let len = bytes.len() as u64;
        let mut cur = buffered(bytes);

        let header = Section::read(&mut cur, SectionKind::Header, len).unwrap();
        assert_eq!(header.size, 0);
        assert_eq!(header.sha1, None);
        assert_eq!(cur.stream_position().unwrap(), EMPTY_SECTION_LENGTH);

        let meta = Section::read(&mut cur, SectionKind::Meta, len).unwrap();
        assert_eq!(meta.size, 7);
        assert_eq!(meta.sha1.as_deref(), Some(sha1_for(1).as_str()));
        assert_eq!(meta.data_offset, Some(EMPTY_SECTION_LENGTH + FRAMED_HEADER_LENGTH));
        assert_eq!(cur.stream_position().unwrap(), len);
        assert_eq!(meta.read_data(&mut cur).unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn variable_trailing_padding_is_skipped() {
        let mut bytes = frame(SectionKind::Chunk, &sha1_for(2), b"abc");
        bytes.extend_from_slice(&[0u8; 37]);
        let next = bytes.len() as u64;
        bytes.extend_from_slice(CHUNK_MAGIC);
        let len = bytes.len() as u64;
        let mut cur = buffered(bytes);

        Section::read(&mut cur, SectionKind::Chunk, len).unwrap();
        assert_eq!(cur.stream_position().unwrap(), next);
    }

    #[test]
    fn framing_small_sections_stays_in_the_buffer() {
        let mut bytes = frame(SectionKind::Header, "", &[]);
        bytes.extend(frame(SectionKind::Meta, &sha1_for(1), b"{}"));
        for seed in 2..6 {
            bytes.extend(frame(SectionKind::Chunk, &sha1_for(seed), &[seed; 100]));
            bytes.extend_from_slice(&[0u8; 21]);
        }
        let len = bytes.len() as u64;
        let mut reader = BufReader::new(SeekCounter { inner: Cursor::new(bytes), seeks: 0 });

        Section::read(&mut reader, SectionKind::Header, len).unwrap();
        Section::read(&mut reader, SectionKind::Meta, len).unwrap();
        for _ in 2..6 {
            let chunk = Section::read(&mut reader, SectionKind::Chunk, len).unwrap();
            assert_eq!(chunk.size, 100);
        }
        assert_eq!(reader.stream_position().unwrap(), len);
        assert_eq!(reader.get_ref().seeks, 0);
    }

    #[test]
    fn wrong_magic_is_a_format_error() {
        let bytes = frame(SectionKind::Chunk, &sha1_for(3), b"x");
        let len = bytes.len() as u64;
        let err = Section::read(&mut buffered(bytes), SectionKind::Meta, len).unwrap_err();
        assert!(matches!(err, LfpError::Format { offset: 0, .. }), "{err}");
    }

    #[test]
    fn payload_past_eof_is_a_format_error() {
        let mut bytes = frame(SectionKind::Chunk, &sha1_for(4), &[7u8; 32]);
        bytes.truncate(FRAMED_HEADER_LENGTH as usize + 10);
        let len = bytes.len() as u64;
        let err = Section::read(&mut buffered(bytes), SectionKind::Chunk, len).unwrap_err();
        assert!(matches!(err, LfpError::Format { .. }));
    }

    #[test]
    fn negative_size_is_rejected() {
        let mut bytes = CHUNK_MAGIC.to_vec();
        bytes.extend_from_slice(&(-5i32).to_be_bytes());
        let len = bytes.len() as u64;
        let err = Section::read(&mut buffered(bytes), SectionKind::Chunk, len).unwrap_err();
        assert!(matches!(err, LfpError::Format { .. }));
    }

    #[test]
    fn digest_decodes_hex() {
        let s = Section {
            kind:        SectionKind::Chunk,
            offset:      0,
            size:        1,
            sha1:        Some(sha1_for(0xab)),
            data_offset: Some(96),
        };
        assert_eq!(s.digest(), Some([0xab; 20]));
        assert_eq!(s.to_string(), "Chunk(1B)");
    }
}
