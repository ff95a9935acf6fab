//! Reader for LFP light-field containers.
//!
//! An LFP file is a Header section, a Meta section holding JSON, and any
//! number of content-addressed Chunk sections. [`LfpFile`] frames the
//! sections, indexes the chunks (payloads are read lazily) and turns the Meta
//! JSON into either a [`PictureModel`] or a [`StorageModel`].

pub mod error;
pub mod section;
pub mod container;
pub mod meta;
pub mod splitter;
pub mod picture;
pub mod lookup;
pub mod storage;
pub mod file;
pub mod logger;

pub use error::{LfpError, LookupError, Result};
pub use section::{Section, SectionKind};
pub use container::{ChunkRef, LfpReader};
pub use splitter::{ImageFormat, SplitError, VideoSplitter};
pub use picture::{
    Capability, DepthLut, Frame, ImagePayload, ParallaxImage, ParallaxStack, PictureModel,
    RefocusImage, RefocusStack,
};
pub use storage::StorageModel;
pub use file::{ContainerHint, ContainerKind, LfpFile, OpenOptions};
