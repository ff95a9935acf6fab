#![allow(dead_code)]

use lfp_reader::section::{PADDING_LENGTH, SHA1_LENGTH};
use lfp_reader::SectionKind;
use serde_json::Value;

/// Assembles synthetic LFP containers the way the camera lays them out.
#[derive(Default)]
pub struct LfpBuilder {
    chunks: Vec<(String, Vec<u8>)>,
    next:   u64,
}

impl LfpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk and return its content id.
    pub fn chunk(&mut self, data: &[u8]) -> String {
        self.next += 1;
        let sha1 = format!("sha1-{:040x}", self.next);
        self.chunks.push((sha1.clone(), data.to_vec()));
        sha1
    }

    pub fn chunk_with_id(&mut self, sha1: &str, data: &[u8]) {
        self.chunks.push((sha1.to_owned(), data.to_vec()));
    }

    pub fn build(&self, meta: &Value) -> Vec<u8> {
        let mut out = section(SectionKind::Header, "", &[]);
        let meta = serde_json::to_vec(meta).unwrap();
        out.extend(section(SectionKind::Meta, "sha1-0000000000000000000000000000000000000000", &meta));
        for (sha1, data) in &self.chunks {
            out.extend(section(SectionKind::Chunk, sha1, data));
        }
        out
    }
}

/// One framed section, null-padded to a 16-byte boundary.
pub fn section(kind: SectionKind, sha1: &str, payload: &[u8]) -> Vec<u8> {
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

/// Little-endian packed depth LUT.
pub fn pack_lut(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}
