//! Video-block splitter capability.
//!
//! Processed pictures may pack a whole stack into one H264 stream
//! (`blockOfImages`). Decoding that stream is not this crate's job: callers
//! inject a [`VideoSplitter`] through [`OpenOptions`](crate::file::OpenOptions).
//! Without one, stacks that need it are reported as
//! [`LfpError::MissingCapability`](crate::error::LfpError::MissingCapability)
//! while the rest of the picture stays usable.
//!
//! A splitter must be deterministic and return images in stream order; the
//! builder pairs them positionally with the block's metadata array.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("video decoding failed: {0}")]
    Decode(String),
}

/// Raster format the splitter should emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Name used as an image's `representation`.
    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png  => "png",
        }
    }

    /// Parse a case-insensitive format name.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
            "png"          => Some(ImageFormat::Png),
            _              => None,
        }
    }
}

pub trait VideoSplitter: Send + Sync {
    /// Decode `data` into one encoded image per video frame, in order.
    fn split(&self, data: &[u8], format: ImageFormat) -> Result<Vec<Vec<u8>>, SplitError>;

    /// Diagnostic name.
    fn name(&self) -> &str { "custom" }
}

impl<F> VideoSplitter for F
where
    F: Fn(&[u8], ImageFormat) -> Result<Vec<Vec<u8>>, SplitError> + Send + Sync,
{
    fn split(&self, data: &[u8], format: ImageFormat) -> Result<Vec<Vec<u8>>, SplitError> {
        self(data, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_round_trip() {
        for f in [ImageFormat::Jpeg, ImageFormat::Png] {
            assert_eq!(ImageFormat::from_name(f.name()), Some(f));
        }
        assert_eq!(ImageFormat::from_name("JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_name("gif"), None);
    }

    #[test]
    fn closures_are_splitters() {
        let halves = |data: &[u8], _: ImageFormat| -> Result<Vec<Vec<u8>>, SplitError> {
            let (a, b) = data.split_at(data.len() / 2);
            Ok(vec![a.to_vec(), b.to_vec()])
        };
        let out = halves.split(b"abcd", ImageFormat::Png).unwrap();
        assert_eq!(out, vec![b"ab".to_vec(), b"cd".to_vec()]);
        assert_eq!(halves.name(), "custom");
    }
}
