//! Typed views over the Meta section's JSON.
//!
//! Only the keys the model builders consume are declared; everything else in
//! the camera's metadata is ignored. Missing required keys surface as
//! [`LfpError::InvalidPictureFile`] / [`LfpError::InvalidStorageFile`] with
//! the JSON path that failed.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{LfpError, Result};

pub const PICTURE_KEY: &str = "picture";
pub const FILES_KEY:   &str = "files";

const ACCELERATION_PREFIX: &str = "com.lytro.acceleration.";

/// Which schema the Meta JSON follows, decided by top-level key presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKind {
    Picture,
    Storage,
    Unknown,
}

pub fn classify(content: &Value) -> MetaKind {
    if content.get(PICTURE_KEY).is_some() {
        MetaKind::Picture
    } else if content.get(FILES_KEY).is_some() {
        MetaKind::Storage
    } else {
        MetaKind::Unknown
    }
}

// ── Storage ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name:     String,
    pub data_ref: String,
}

#[derive(Debug, Clone)]
pub struct StorageMeta {
    pub files: Vec<FileEntry>,
}

impl StorageMeta {
    pub fn from_content(content: &Value) -> Result<Self> {
        let files = content.get(FILES_KEY)
            .ok_or_else(|| LfpError::InvalidStorageFile(format!("missing key `{FILES_KEY}`")))?;
        let files = Vec::<FileEntry>::deserialize(files)
            .map_err(|e| LfpError::InvalidStorageFile(format!("{FILES_KEY}: {e}")))?;
        Ok(Self { files })
    }
}

// ── Picture ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub major:            u32,
    pub minor:            u32,
    #[serde(default)]
    pub provisional_date: Option<String>,
}

/// Chunk references of a raw frame. Any of them may be missing in a
/// processed-only picture.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRefs {
    pub metadata_ref:         Option<String>,
    pub image_ref:            Option<String>,
    pub private_metadata_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct FrameEntry {
    #[serde(default)]
    frame: FrameRefs,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccelerationEntry {
    #[serde(rename = "type")]
    pub kind:           String,
    #[serde(default)]
    pub vendor_content: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PictureRaw {
    // Cameras write `null` as well as omitting the key.
    #[serde(default)]
    frame_array:        Option<Vec<FrameEntry>>,
    #[serde(default)]
    acceleration_array: Option<Vec<AccelerationEntry>>,
}

#[derive(Debug, Clone)]
pub struct PictureMeta {
    pub version:       Option<Version>,
    pub frame:         Option<FrameRefs>,
    pub accelerations: Vec<AccelerationEntry>,
}

impl PictureMeta {
    pub fn from_content(content: &Value) -> Result<Self> {
        let picture = content.get(PICTURE_KEY)
            .ok_or_else(|| LfpError::InvalidPictureFile(format!("missing key `{PICTURE_KEY}`")))?;
        let raw = PictureRaw::deserialize(picture)
            .map_err(|e| LfpError::InvalidPictureFile(format!("{PICTURE_KEY}: {e}")))?;
        // A malformed version block is reporting-only; ignore it.
        let version = content.get("version")
            .and_then(|v| Version::deserialize(v).ok());
        Ok(Self {
            version,
            frame:         raw.frame_array.unwrap_or_default().into_iter().next().map(|f| f.frame),
            accelerations: raw.acceleration_array.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelerationKind {
    RefocusStack,
    EdofParallax,
    DepthMap,
    Unknown,
}

impl AccelerationKind {
    /// Accepts both `com.lytro.acceleration.refocusStack` and `refocusStack`.
    pub fn parse(s: &str) -> Self {
        match s.strip_prefix(ACCELERATION_PREFIX).unwrap_or(s) {
            "refocusStack" => AccelerationKind::RefocusStack,
            "edofParallax" => AccelerationKind::EdofParallax,
            "depthMap"     => AccelerationKind::DepthMap,
            _              => AccelerationKind::Unknown,
        }
    }
}

/// Deserialize the vendor content of acceleration entry `index`, tagging
/// failures with their JSON path.
pub fn vendor_content<T: for<'de> Deserialize<'de>>(entry: &AccelerationEntry, index: usize) -> Result<T> {
    T::deserialize(&entry.vendor_content).map_err(|e| {
        LfpError::InvalidPictureFile(format!(
            "{PICTURE_KEY}.accelerationArray[{index}].vendorContent ({}): {e}",
            entry.kind
        ))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Dimensions {
    pub width:  u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayParameters {
    pub display_dimensions: DisplayDimensions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayDimensions {
    pub value: Dimensions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthLutMeta {
    pub width:          usize,
    pub height:         usize,
    pub representation: String,
    pub image_ref:      String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefocusImageMeta {
    pub lambda:         f64,
    pub width:          u32,
    pub height:         u32,
    pub representation: String,
    pub image_ref:      String,
}

/// An H264 stream holding several images, with per-image metadata in
/// stream order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockOfImages<T> {
    pub block_of_images_ref: String,
    #[serde(default)]
    pub representation:      Option<String>,
    pub metadata_array:      Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefocusBlockEntry {
    pub lambda: f64,
    pub width:  u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParallaxBlockEntry {
    pub coord:  Coord,
    pub width:  u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefocusContent {
    pub default_lambda:     f64,
    pub display_parameters: DisplayParameters,
    pub depth_lut:          DepthLutMeta,
    #[serde(default)]
    pub image_array:        Option<Vec<RefocusImageMeta>>,
    #[serde(default)]
    pub block_of_images:    Option<BlockOfImages<RefocusBlockEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallaxContent {
    pub display_parameters: DisplayParameters,
    pub block_of_images:    BlockOfImages<ParallaxBlockEntry>,
}
