//! Picture model: raw frame, refocus stack and parallax stack.
//!
//! Built once from the Meta JSON by [`PictureBuilder`] and never mutated.
//! Entities hold [`ChunkRef`] back-references into the reader's chunk store;
//! only images demultiplexed from an H264 block carry their own bytes.

pub mod depth_lut;

use std::collections::BTreeMap;
use std::io::{Read, Seek};

use tracing::{debug, warn};

use crate::container::{ChunkRef, LfpReader};
use crate::error::{LfpError, LookupError, Result};
use crate::meta::{
    self, AccelerationEntry, AccelerationKind, BlockOfImages, FrameRefs, ParallaxContent,
    PictureMeta, RefocusContent, Version,
};
use crate::splitter::{ImageFormat, VideoSplitter};

pub use depth_lut::DepthLut;

// ── Entities ─────────────────────────────────────────────────────────────────

/// Where an image's encoded bytes live.
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePayload {
    Chunk(ChunkRef),
    Inline(Vec<u8>),
}

impl ImagePayload {
    pub fn len(&self) -> usize {
        match self {
            ImagePayload::Chunk(c)  => c.size as usize,
            ImagePayload::Inline(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Raw sensor frame of an unprocessed picture.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub metadata:         ChunkRef,
    pub image:            ChunkRef,
    pub private_metadata: ChunkRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefocusImage {
    pub id:             u32,
    pub lambda:         f64,
    pub width:          u32,
    pub height:         u32,
    pub representation: String,
    pub payload:        ImagePayload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefocusStack {
    pub images:         BTreeMap<u32, RefocusImage>,
    pub depth_lut:      DepthLut,
    pub default_lambda: f64,
    pub min_lambda:     f64,
    pub max_lambda:     f64,
    pub width:          u32,
    pub height:         u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParallaxImage {
    pub id:             u32,
    pub coord:          (f64, f64),
    pub width:          u32,
    pub height:         u32,
    pub representation: String,
    pub payload:        ImagePayload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParallaxStack {
    pub images:           BTreeMap<u32, ParallaxImage>,
    pub width:            u32,
    pub height:           u32,
    /// Twice the largest `|x|` among the images.
    pub viewpoint_width:  f64,
    /// Twice the largest `|y|` among the images.
    pub viewpoint_height: f64,
}

/// Presence of an optional part of the picture.
#[derive(Debug, Clone, PartialEq)]
pub enum Capability<T> {
    Present(T),
    /// The file does not carry it.
    Absent,
    /// The file carries it but a collaborator needed to build it is missing.
    Unavailable(String),
    /// The file carries it but its metadata does not match the schema.
    Invalid(String),
}

impl<T> Capability<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Capability::Present(_))
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Capability::Present(t) => Some(t),
            _ => None,
        }
    }

    fn get(&self, what: &'static str) -> Result<&T> {
        match self {
            Capability::Present(t)     => Ok(t),
            Capability::Absent         => Err(LookupError::NotBuilt(what).into()),
            Capability::Unavailable(m) => Err(LfpError::MissingCapability(m.clone())),
            Capability::Invalid(m)     => Err(LfpError::InvalidPictureFile(m.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PictureModel {
    pub version:        Option<Version>,
    pub frame:          Option<Frame>,
    pub refocus_stack:  Capability<RefocusStack>,
    pub parallax_stack: Capability<ParallaxStack>,
}

impl PictureModel {
    /// Format version from the Meta JSON, for reporting only.
    pub fn version(&self) -> Option<&Version> { self.version.as_ref() }

    pub fn has_frame(&self) -> bool { self.frame.is_some() }

    pub fn has_refocus_stack(&self) -> bool { self.refocus_stack.is_present() }

    pub fn has_parallax_stack(&self) -> bool { self.parallax_stack.is_present() }

    pub fn frame(&self) -> Result<&Frame> {
        self.frame.as_ref().ok_or_else(|| LookupError::NotBuilt("frame").into())
    }

    pub fn refocus_stack(&self) -> Result<&RefocusStack> {
        self.refocus_stack.get("refocus stack")
    }

    pub fn parallax_stack(&self) -> Result<&ParallaxStack> {
        self.parallax_stack.get("parallax stack")
    }

    pub fn find_by_lambda(&self, lambda: f64) -> Result<&RefocusImage> {
        Ok(self.refocus_stack()?.find_by_lambda(lambda)?)
    }

    pub fn find_most_focused(&self, i: usize, j: usize) -> Result<&RefocusImage> {
        Ok(self.refocus_stack()?.find_most_focused(i, j)?)
    }

    pub fn find_by_position(&self, fx: f64, fy: f64) -> Result<&RefocusImage> {
        Ok(self.refocus_stack()?.find_by_position(fx, fy)?)
    }

    pub fn find_by_viewpoint(&self, fx: f64, fy: f64) -> Result<&ParallaxImage> {
        Ok(self.parallax_stack()?.find_by_viewpoint(fx, fy)?)
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

pub struct PictureBuilder<'a, R: Read + Seek> {
    reader:   &'a mut LfpReader<R>,
    splitter: Option<&'a dyn VideoSplitter>,
    format:   ImageFormat,
}

impl<'a, R: Read + Seek> PictureBuilder<'a, R> {
    pub fn new(reader: &'a mut LfpReader<R>) -> Self {
        Self { reader, splitter: None, format: ImageFormat::default() }
    }

    pub fn splitter(mut self, splitter: Option<&'a dyn VideoSplitter>) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn image_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn build(mut self, meta: PictureMeta) -> Result<PictureModel> {
        let frame = meta.frame.as_ref().and_then(|refs| self.frame(refs));

        let mut refocus_stack = Capability::Absent;
        let mut parallax_stack = Capability::Absent;
        for (index, entry) in meta.accelerations.iter().enumerate() {
            match AccelerationKind::parse(&entry.kind) {
                AccelerationKind::RefocusStack => {
                    refocus_stack = soften(self.refocus_stack(entry, index))?;
                }
                AccelerationKind::EdofParallax => {
                    parallax_stack = soften(self.parallax_stack(entry, index))?;
                }
                AccelerationKind::DepthMap => {
                    debug!(index, "depth map acceleration is not supported; skipped");
                }
                AccelerationKind::Unknown => {
                    warn!(index, kind = %entry.kind, "unknown acceleration type; skipped");
                }
            }
        }

        debug!(
            frame = frame.is_some(),
            refocus_stack = refocus_stack.is_present(),
            parallax_stack = parallax_stack.is_present(),
            "built picture model"
        );
        Ok(PictureModel { version: meta.version, frame, refocus_stack, parallax_stack })
    }

    /// A frame exists only when all three references resolve.
    fn frame(&self, refs: &FrameRefs) -> Option<Frame> {
        let resolve = |r: &Option<String>| r.as_deref().and_then(|s| self.reader.resolve(s));
        Some(Frame {
            metadata:         resolve(&refs.metadata_ref)?,
            image:            resolve(&refs.image_ref)?,
            private_metadata: resolve(&refs.private_metadata_ref)?,
        })
    }

    fn refocus_stack(&mut self, entry: &AccelerationEntry, index: usize) -> Result<RefocusStack> {
        let content: RefocusContent = meta::vendor_content(entry, index)?;

        let images: BTreeMap<u32, RefocusImage> = if let Some(array) = &content.image_array {
            array.iter().enumerate().map(|(id, img)| {
                let chunk = self.require(&img.image_ref, index)?;
                let id = id as u32;
                Ok((id, RefocusImage {
                    id,
                    lambda:         img.lambda,
                    width:          img.width,
                    height:         img.height,
                    representation: img.representation.clone(),
                    payload:        ImagePayload::Chunk(chunk),
                }))
            }).collect::<Result<_>>()?
        } else if let Some(block) = &content.block_of_images {
            let frames = self.split_block(block, index, "refocus stack")?;
            let representation = self.format.name();
            block.metadata_array.iter().zip(frames).enumerate().map(|(id, (m, data))| {
                let id = id as u32;
                (id, RefocusImage {
                    id,
                    lambda:         m.lambda,
                    width:          m.width,
                    height:         m.height,
                    representation: representation.to_owned(),
                    payload:        ImagePayload::Inline(data),
                })
            }).collect()
        } else {
            return Err(invalid(index, "refocus stack has neither `imageArray` nor `blockOfImages`"));
        };

        let lut = &content.depth_lut;
        if lut.width == 0 || lut.height == 0 {
            return Err(invalid(index, format!("depth LUT is {}x{}", lut.width, lut.height)));
        }
        let source = self.require(&lut.image_ref, index)?;
        let data = self.reader.chunk_data(&source.sha1)?;
        let table = depth_lut::decode_table(data, lut.width, lut.height)
            .map_err(|e| invalid(index, e))?;
        let depth_lut = DepthLut {
            width:          lut.width,
            height:         lut.height,
            representation: lut.representation.clone(),
            table,
            source,
        };

        let (min_lambda, max_lambda) = images.values()
            .map(|img| img.lambda)
            .fold(None, |acc: Option<(f64, f64)>, l| match acc {
                None => Some((l, l)),
                Some((lo, hi)) => Some((lo.min(l), hi.max(l))),
            })
            .unwrap_or((content.default_lambda, content.default_lambda));

        let dims = content.display_parameters.display_dimensions.value;
        debug!(
            images = images.len(),
            lut_width = depth_lut.width,
            lut_height = depth_lut.height,
            min_lambda,
            max_lambda,
            "built refocus stack"
        );
        Ok(RefocusStack {
            images,
            depth_lut,
            default_lambda: content.default_lambda,
            min_lambda,
            max_lambda,
            width:  dims.width,
            height: dims.height,
        })
    }

    fn parallax_stack(&mut self, entry: &AccelerationEntry, index: usize) -> Result<ParallaxStack> {
        let content: ParallaxContent = meta::vendor_content(entry, index)?;
        let block = &content.block_of_images;
        let frames = self.split_block(block, index, "parallax stack")?;
        let representation = self.format.name();

        let images: BTreeMap<u32, ParallaxImage> = block.metadata_array.iter()
            .zip(frames)
            .enumerate()
            .map(|(id, (m, data))| {
                let id = id as u32;
                (id, ParallaxImage {
                    id,
                    coord:          (m.coord.x, m.coord.y),
                    width:          m.width,
                    height:         m.height,
                    representation: representation.to_owned(),
                    payload:        ImagePayload::Inline(data),
                })
            })
            .collect();

        let (max_x, max_y) = images.values().fold((0.0f64, 0.0f64), |(mx, my), img| {
            (mx.max(img.coord.0.abs()), my.max(img.coord.1.abs()))
        });
        let dims = content.display_parameters.display_dimensions.value;
        debug!(images = images.len(), max_x, max_y, "built parallax stack");
        Ok(ParallaxStack {
            images,
            width:            dims.width,
            height:           dims.height,
            viewpoint_width:  2.0 * max_x,
            viewpoint_height: 2.0 * max_y,
        })
    }

    /// Demultiplex an H264 block through the injected splitter.
    fn split_block<T>(
        &mut self,
        block: &BlockOfImages<T>,
        index: usize,
        what:  &str,
    ) -> Result<Vec<Vec<u8>>> {
        let chunk = self.require(&block.block_of_images_ref, index)?;
        let Some(splitter) = self.splitter else {
            return Err(LfpError::MissingCapability(format!(
                "{what} is stored as a {} block of images and no video splitter is configured",
                block.representation.as_deref().unwrap_or("h264"),
            )));
        };
        let data = self.reader.chunk_data(&chunk.sha1)?;
        let frames = splitter.split(data, self.format).map_err(|e| {
            LfpError::MissingCapability(format!("video splitter `{}` failed: {e}", splitter.name()))
        })?;
        if frames.len() != block.metadata_array.len() {
            return Err(invalid(index, format!(
                "video block decoded to {} images but metadata lists {}",
                frames.len(),
                block.metadata_array.len()
            )));
        }
        Ok(frames)
    }

    fn require(&self, sha1: &str, index: usize) -> Result<ChunkRef> {
        self.reader.resolve(sha1)
            .ok_or_else(|| invalid(index, format!("unresolved chunk reference {sha1}")))
    }
}

/// Schema and collaborator failures disable one stack and leave the rest of
/// the picture usable. I/O errors stay fatal.
fn soften<T>(built: Result<T>) -> Result<Capability<T>> {
    match built {
        Ok(t) => Ok(Capability::Present(t)),
        Err(LfpError::MissingCapability(msg)) => {
            warn!(reason = %msg, "stack unavailable");
            Ok(Capability::Unavailable(msg))
        }
        Err(LfpError::InvalidPictureFile(msg)) => {
            warn!(reason = %msg, "stack metadata is invalid; skipped");
            Ok(Capability::Invalid(msg))
        }
        Err(e) => Err(e),
    }
}

fn invalid(index: usize, msg: impl std::fmt::Display) -> LfpError {
    LfpError::InvalidPictureFile(format!("picture.accelerationArray[{index}]: {msg}"))
}
