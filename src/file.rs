//! High-level [`LfpFile`] API.
//!
//! ```no_run
//! use lfp_reader::{LfpFile, ContainerKind};
//!
//! let mut lfp = LfpFile::open("IMG_0001-stk.lfp")?;
//! if let ContainerKind::Picture(picture) = lfp.kind() {
//!     let image = picture.find_by_position(0.5, 0.5)?.clone();
//!     let jpeg = lfp.read_payload(&image.payload)?;
//!     println!("lambda {} -> {} B", image.lambda, jpeg.len());
//! }
//! # Ok::<(), lfp_reader::LfpError>(())
//! ```

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::container::LfpReader;
use crate::error::{LfpError, LookupError, Result};
use crate::meta::{self, MetaKind, PictureMeta, StorageMeta};
use crate::picture::{ImagePayload, PictureBuilder, PictureModel};
use crate::section::Section;
use crate::splitter::{ImageFormat, VideoSplitter};
use crate::storage::StorageModel;

// ── OpenOptions ───────────────────────────────────────────────────────────────

/// Which schema the caller expects the Meta JSON to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerHint {
    /// Decide from the top-level `picture` / `files` key.
    #[default]
    Any,
    Picture,
    Storage,
}

/// Configuration for [`LfpFile::open_with`].
#[derive(Clone, Default)]
pub struct OpenOptions {
    pub expect:       ContainerHint,
    /// Demultiplexes H264 blocks of images. Stacks stored that way are
    /// unavailable without one.
    pub splitter:     Option<Arc<dyn VideoSplitter>>,
    pub image_format: ImageFormat,
}

impl OpenOptions {
    pub fn expect(mut self, hint: ContainerHint) -> Self {
        self.expect = hint;
        self
    }

    pub fn splitter(mut self, splitter: Arc<dyn VideoSplitter>) -> Self {
        self.splitter = Some(splitter);
        self
    }

    pub fn image_format(mut self, format: ImageFormat) -> Self {
        self.image_format = format;
        self
    }
}

impl fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenOptions")
            .field("expect", &self.expect)
            .field("splitter", &self.splitter.as_ref().map(|s| s.name().to_owned()))
            .field("image_format", &self.image_format)
            .finish()
    }
}

// ── ContainerKind ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ContainerKind {
    Picture(PictureModel),
    Storage(StorageModel),
}

impl ContainerKind {
    pub fn name(&self) -> &'static str {
        match self {
            ContainerKind::Picture(_) => "picture",
            ContainerKind::Storage(_) => "storage",
        }
    }
}

// ── LfpFile ───────────────────────────────────────────────────────────────────

pub struct LfpFile<R: Read + Seek> {
    path:   Option<PathBuf>,
    reader: LfpReader<R>,
    kind:   ContainerKind,
}

impl LfpFile<BufReader<File>> {
    // ── Constructors ─────────────────────────────────────────────────────────

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, OpenOptions::default())
    }

    pub fn open_picture<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, OpenOptions::default().expect(ContainerHint::Picture))
    }

    pub fn open_storage<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, OpenOptions::default().expect(ContainerHint::Storage))
    }

    pub fn open_with<P: AsRef<Path>>(path: P, opts: OpenOptions) -> Result<Self> {
        let path = path.as_ref().to_owned();
        info!(path = %path.display(), "opening LFP file");
        let mut lfp = Self::from_reader(BufReader::new(File::open(&path)?), opts)?;
        lfp.path = Some(path);
        Ok(lfp)
    }
}

impl<R: Read + Seek> LfpFile<R> {
    /// Load a container from an already-open stream positioned at its
    /// Header section.
    pub fn from_reader(stream: R, opts: OpenOptions) -> Result<Self> {
        let mut reader = LfpReader::new(stream)?;
        reader.load()?;
        let kind = process(&mut reader, &opts)?;
        debug!(kind = kind.name(), chunks = reader.chunk_count(), "processed LFP container");
        Ok(Self { path: None, reader, kind })
    }

    // ── Model ─────────────────────────────────────────────────────────────────

    pub fn kind(&self) -> &ContainerKind { &self.kind }

    pub fn picture(&self) -> Result<&PictureModel> {
        match &self.kind {
            ContainerKind::Picture(p) => Ok(p),
            other => Err(LookupError::WrongKind { wanted: "picture", actual: other.name() }.into()),
        }
    }

    pub fn storage(&self) -> Result<&StorageModel> {
        match &self.kind {
            ContainerKind::Storage(s) => Ok(s),
            other => Err(LookupError::WrongKind { wanted: "storage", actual: other.name() }.into()),
        }
    }

    // ── Raw access ────────────────────────────────────────────────────────────

    pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

    pub fn reader(&self) -> &LfpReader<R> { &self.reader }

    pub fn reader_mut(&mut self) -> &mut LfpReader<R> { &mut self.reader }

    pub fn meta_content(&mut self) -> Result<&serde_json::Value> {
        self.reader.meta_content()
    }

    pub fn chunk_data(&mut self, sha1: &str) -> Result<&[u8]> {
        self.reader.chunk_data(sha1)
    }

    pub fn chunks_sorted(&self) -> Vec<&Section> {
        self.reader.chunks_sorted()
    }

    /// Encoded bytes of an image, from its chunk or inline.
    pub fn read_payload(&mut self, payload: &ImagePayload) -> Result<Vec<u8>> {
        match payload {
            ImagePayload::Chunk(c)  => Ok(self.reader.chunk_data(&c.sha1)?.to_vec()),
            ImagePayload::Inline(b) => Ok(b.clone()),
        }
    }

    /// Bytes of an embedded storage file.
    pub fn file_data(&mut self, path: &str) -> Result<&[u8]> {
        let sha1 = self.storage()?
            .get(path)
            .ok_or_else(|| LookupError::UnknownFile(path.to_owned()))?
            .sha1
            .clone();
        self.reader.chunk_data(&sha1)
    }

    // ── Cache ─────────────────────────────────────────────────────────────────

    pub fn evict(&mut self, sha1: &str) -> bool { self.reader.evict(sha1) }

    pub fn clear_cache(&mut self) { self.reader.clear_cache() }

    /// Close the container and hand back the stream.
    pub fn close(self) -> R { self.reader.into_inner() }
}

impl<R: Read + Seek> fmt::Debug for LfpFile<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LfpFile")
            .field("path", &self.path)
            .field("kind", &self.kind.name())
            .field("chunks", &self.reader.chunk_count())
            .finish()
    }
}

/// Build exactly one model from the loaded container's Meta JSON.
fn process<R: Read + Seek>(reader: &mut LfpReader<R>, opts: &OpenOptions) -> Result<ContainerKind> {
    let content = reader.meta_content()?.clone();
    let target = match (opts.expect, meta::classify(&content)) {
        (ContainerHint::Picture, _) | (ContainerHint::Any, MetaKind::Picture) => MetaKind::Picture,
        (ContainerHint::Storage, _) | (ContainerHint::Any, MetaKind::Storage) => MetaKind::Storage,
        (ContainerHint::Any, MetaKind::Unknown) => {
            return Err(LfpError::InvalidPictureFile(format!(
                "meta has neither `{}` nor `{}`",
                meta::PICTURE_KEY,
                meta::FILES_KEY
            )));
        }
    };

    match target {
        MetaKind::Storage => {
            let meta = StorageMeta::from_content(&content)?;
            Ok(ContainerKind::Storage(StorageModel::build(reader, meta)?))
        }
        _ => {
            let meta = PictureMeta::from_content(&content)?;
            let model = PictureBuilder::new(reader)
                .splitter(opts.splitter.as_deref())
                .image_format(opts.image_format)
                .build(meta)?;
            Ok(ContainerKind::Picture(model))
        }
    }
}
