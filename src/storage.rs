//! Storage model: a camera's embedded file table.

use std::collections::BTreeMap;
use std::io::{Read, Seek};

use tracing::debug;

use crate::container::{ChunkRef, LfpReader};
use crate::error::{LfpError, Result};
use crate::meta::StorageMeta;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageModel {
    /// Logical path (e.g. `C:\T1CALIB\MOD_0000.RAW`) to its chunk.
    pub files: BTreeMap<String, ChunkRef>,
}

impl StorageModel {
    /// Resolve every `dataRef` against the chunk store. A later entry with
    /// the same name replaces an earlier one.
    pub fn build<R: Read + Seek>(reader: &LfpReader<R>, meta: StorageMeta) -> Result<Self> {
        let mut files = BTreeMap::new();
        for (index, entry) in meta.files.into_iter().enumerate() {
            let chunk = reader.resolve(&entry.data_ref).ok_or_else(|| {
                LfpError::InvalidStorageFile(format!(
                    "files[{index}] ({}): unresolved chunk reference {}",
                    entry.name, entry.data_ref
                ))
            })?;
            files.insert(entry.name, chunk);
        }
        debug!(files = files.len(), "built storage model");
        Ok(Self { files })
    }

    pub fn get(&self, path: &str) -> Option<&ChunkRef> {
        self.files.get(path)
    }

    /// `(path, chunk)` pairs in path order.
    pub fn files_sorted(&self) -> impl Iterator<Item = (&str, &ChunkRef)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize { self.files.len() }

    pub fn is_empty(&self) -> bool { self.files.is_empty() }
}
