//! Chunk store: the generic LFP container loader.
//!
//! [`LfpReader`] frames exactly one Header, one Meta, then Chunk sections
//! until fewer than [`MAGIC_LENGTH`] bytes remain. Only the section index is
//! built eagerly; chunk payloads are read on first access and cached for the
//! reader's lifetime (see [`LfpReader::evict`] and [`LfpReader::clear_cache`]).
//!
//! # Duplicate content ids
//! Last write wins. The earlier section is dropped from the index and a
//! warning is logged.
//!
//! # Threading
//! A reader owns its stream exclusively. Payload reads seek, so callers that
//! share one across threads must serialise access themselves.

use std::collections::HashMap;
use std::io::{BufReader, Read, Seek, SeekFrom};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{LfpError, LookupError, Result};
use crate::section::{Section, SectionKind, MAGIC_LENGTH};

/// Back-reference from the model into the chunk store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkRef {
    pub sha1: String,
    pub size: u32,
}

impl From<&Section> for ChunkRef {
    fn from(s: &Section) -> Self {
        ChunkRef {
            sha1: s.sha1.clone().unwrap_or_default(),
            size: s.size,
        }
    }
}

pub struct LfpReader<R: Read + Seek> {
    reader:       R,
    /// Offset of the Header magic.
    start:        u64,
    stream_len:   u64,
    header:       Option<Section>,
    meta:         Option<Section>,
    meta_content: Option<Value>,
    chunks:       HashMap<String, Section>,
    empty_chunks: usize,
    cache:        HashMap<String, Vec<u8>>,
    loaded:       bool,
}

impl<R: Read + Seek> LfpReader<R> {
    /// Wrap a stream positioned at the Header magic. Nothing is parsed until
    /// [`load`](Self::load).
    pub fn new(mut reader: R) -> Result<Self> {
        let start = reader.stream_position()?;
        let stream_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(start))?;
        Ok(Self {
            reader,
            start,
            stream_len,
            header:       None,
            meta:         None,
            meta_content: None,
            chunks:       HashMap::new(),
            empty_chunks: 0,
            cache:        HashMap::new(),
            loaded:       false,
        })
    }

    /// Frame Header, Meta and every Chunk. A no-op once it has succeeded.
    ///
    /// Nothing is committed to `self` unless the whole stream frames cleanly,
    /// and every attempt starts over from the Header.
    pub fn load(&mut self) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        let len = self.stream_len;
        self.reader.seek(SeekFrom::Start(self.start))?;
        let mut framer = BufReader::new(&mut self.reader);
        let header = Section::read(&mut framer, SectionKind::Header, len)?;
        let meta   = Section::read(&mut framer, SectionKind::Meta, len)?;

        let mut chunks = HashMap::new();
        let mut empty_chunks = 0usize;
        while framer.stream_position()? + MAGIC_LENGTH as u64 <= len {
            let chunk = Section::read(&mut framer, SectionKind::Chunk, len)?;
            let Some(sha1) = chunk.sha1.clone() else {
                empty_chunks += 1;
                continue;
            };
            if let Some(prev) = chunks.insert(sha1, chunk) {
                warn!(
                    sha1 = prev.sha1.as_deref().unwrap_or_default(),
                    dropped_offset = prev.offset,
                    "duplicate chunk content id; keeping the later section"
                );
            }
        }

        debug!(
            header = %header,
            meta = %meta,
            chunks = chunks.len(),
            empty_chunks,
            stream_len = len,
            "loaded LFP container"
        );
        self.header = Some(header);
        self.meta = Some(meta);
        self.chunks = chunks;
        self.empty_chunks = empty_chunks;
        self.loaded = true;
        Ok(())
    }

    pub fn is_loaded(&self) -> bool { self.loaded }

    pub fn stream_len(&self) -> u64 { self.stream_len }

    pub fn header(&self) -> Option<&Section> { self.header.as_ref() }

    pub fn meta(&self) -> Option<&Section> { self.meta.as_ref() }

    /// Number of zero-size Chunk sections seen while loading.
    pub fn empty_chunks(&self) -> usize { self.empty_chunks }

    /// The Meta payload as JSON, parsed once and cached.
    pub fn meta_content(&mut self) -> Result<&Value> {
        self.load()?;
        let content = match self.meta_content.take() {
            Some(v) => v,
            None => {
                let meta = self.meta.as_ref()
                    .ok_or_else(|| LfpError::format(0, "no Meta section"))?;
                if meta.size == 0 {
                    return Err(LfpError::format(meta.offset, "Meta section carries no payload"));
                }
                let data = meta.read_data(&mut self.reader)?;
                serde_json::from_slice(&data)?
            }
        };
        Ok(self.meta_content.insert(content))
    }

    pub fn chunk(&self, sha1: &str) -> Option<&Section> {
        self.chunks.get(sha1)
    }

    pub fn contains_chunk(&self, sha1: &str) -> bool {
        self.chunks.contains_key(sha1)
    }

    /// Resolve a content id into a model back-reference.
    pub fn resolve(&self, sha1: &str) -> Option<ChunkRef> {
        self.chunks.get(sha1).map(ChunkRef::from)
    }

    pub fn chunk_count(&self) -> usize { self.chunks.len() }

    pub fn chunks(&self) -> impl Iterator<Item = &Section> {
        self.chunks.values()
    }

    /// All chunks ordered by content id.
    pub fn chunks_sorted(&self) -> Vec<&Section> {
        let mut out: Vec<&Section> = self.chunks.values().collect();
        out.sort_by(|a, b| a.sha1.cmp(&b.sha1));
        out
    }

    /// Payload of a chunk, read through the cache.
    pub fn chunk_data(&mut self, sha1: &str) -> Result<&[u8]> {
        use std::collections::hash_map::Entry;

        match self.cache.entry(sha1.to_owned()) {
            Entry::Occupied(e) => Ok(e.into_mut().as_slice()),
            Entry::Vacant(e) => {
                let section = self.chunks.get(sha1)
                    .ok_or_else(|| LookupError::UnknownChunk(sha1.to_owned()))?;
                let data = section.read_data(&mut self.reader)?;
                debug!(sha1, size = data.len(), "read chunk payload");
                Ok(e.insert(data).as_slice())
            }
        }
    }

    /// Drop one cached payload. Returns whether anything was cached.
    pub fn evict(&mut self, sha1: &str) -> bool {
        self.cache.remove(sha1).is_some()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Total bytes currently held by the payload cache.
    pub fn cached_bytes(&self) -> usize {
        self.cache.values().map(Vec::len).sum()
    }

    /// Release the stream. Further payload reads are impossible.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::tests::{frame, sha1_for};
    use crate::section::CHUNK_MAGIC;
    use std::io::Cursor;

    fn container(chunks: &[(String, Vec<u8>)]) -> Vec<u8> {
        let mut out = frame(SectionKind::Header, "", &[]);
        out.extend(frame(SectionKind::Meta, &sha1_for(0), br#"{"files":[]}"#));
        for (sha1, data) in chunks {
            out.extend(frame(SectionKind::Chunk, sha1, data));
        }
        out
    }

    #[test]
    fn loads_chunks_lazily() {
        let bytes = container(&[
            (sha1_for(1), b"first".to_vec()),
            (sha1_for(2), b"second payload".to_vec()),
        ]);
        let mut reader = LfpReader::new(Cursor::new(bytes)).unwrap();
        reader.load().unwrap();

        assert_eq!(reader.chunk_count(), 2);
        assert_eq!(reader.cached_bytes(), 0);
        assert_eq!(reader.chunk_data(&sha1_for(2)).unwrap(), b"second payload");
        assert_eq!(reader.cached_bytes(), 14);
        assert!(reader.evict(&sha1_for(2)));
        assert!(!reader.evict(&sha1_for(2)));
        assert_eq!(reader.chunk_data(&sha1_for(1)).unwrap(), b"first");
    }

    #[test]
    fn load_twice_is_a_noop() {
        let bytes = container(&[(sha1_for(1), b"x".to_vec())]);
        let mut reader = LfpReader::new(Cursor::new(bytes)).unwrap();
        reader.load().unwrap();
        reader.load().unwrap();
        assert!(reader.is_loaded());
        assert_eq!(reader.chunk_count(), 1);
    }

    #[test]
    fn duplicate_content_id_keeps_last() {
        let bytes = container(&[
            (sha1_for(7), b"old".to_vec()),
            (sha1_for(7), b"newer".to_vec()),
        ]);
        let mut reader = LfpReader::new(Cursor::new(bytes)).unwrap();
        reader.load().unwrap();
        assert_eq!(reader.chunk_count(), 1);
        assert_eq!(reader.chunk_data(&sha1_for(7)).unwrap(), b"newer");
    }

    #[test]
    fn empty_chunks_are_counted_not_indexed() {
        let mut bytes = container(&[(sha1_for(1), b"x".to_vec())]);
        bytes.extend(frame(SectionKind::Chunk, "", &[]));
        let mut reader = LfpReader::new(Cursor::new(bytes)).unwrap();
        reader.load().unwrap();
        assert_eq!(reader.chunk_count(), 1);
        assert_eq!(reader.empty_chunks(), 1);
    }

    #[test]
    fn short_tail_stops_the_loop() {
        let mut bytes = container(&[]);
        bytes.extend_from_slice(&CHUNK_MAGIC[..MAGIC_LENGTH - 1]);
        let mut reader = LfpReader::new(Cursor::new(bytes)).unwrap();
        reader.load().unwrap();
        assert_eq!(reader.chunk_count(), 0);
    }

    #[test]
    fn failed_load_commits_nothing() {
        let mut bytes = container(&[(sha1_for(1), b"x".to_vec())]);
        bytes.extend_from_slice(b"garbage-garbage-");
        let mut reader = LfpReader::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(reader.load(), Err(LfpError::Format { .. })));
        assert!(!reader.is_loaded());
        assert_eq!(reader.chunk_count(), 0);
    }

    /// Fails exactly one `read` call, the `fail_on`-th.
    struct FailOnce {
        inner:   Cursor<Vec<u8>>,
        reads:   usize,
        fail_on: usize,
    }

    impl Read for FailOnce {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.reads += 1;
            if self.reads == self.fail_on {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "device hiccup"));
            }
            self.inner.read(buf)
        }
    }

    impl Seek for FailOnce {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn load_retries_from_the_header() {
        // Large enough that framing the later chunks refills the buffer.
        let bytes = container(&[
            (sha1_for(1), vec![1u8; 5000]),
            (sha1_for(2), vec![2u8; 5000]),
            (sha1_for(3), vec![3u8; 5000]),
        ]);
        let stream = FailOnce { inner: Cursor::new(bytes), reads: 0, fail_on: 2 };
        let mut reader = LfpReader::new(stream).unwrap();

        assert!(matches!(reader.load(), Err(LfpError::Io(_))));
        assert!(!reader.is_loaded());

        reader.load().unwrap();
        assert_eq!(reader.chunk_count(), 3);
        assert_eq!(reader.chunk_data(&sha1_for(3)).unwrap(), &[3u8; 5000][..]);
    }

    #[test]
    fn meta_content_is_parsed() {
        let bytes = container(&[]);
        let mut reader = LfpReader::new(Cursor::new(bytes)).unwrap();
        let content = reader.meta_content().unwrap();
        assert!(content.get("files").is_some());
    }

    #[test]
    fn unknown_chunk_is_a_lookup_error() {
        let mut reader = LfpReader::new(Cursor::new(container(&[]))).unwrap();
        reader.load().unwrap();
        let err = reader.chunk_data("sha1-nope").unwrap_err();
        assert!(matches!(err, LfpError::Lookup(LookupError::UnknownChunk(_))));
        assert_eq!(reader.cached_bytes(), 0);
    }
}
