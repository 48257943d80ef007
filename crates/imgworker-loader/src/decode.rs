//! Image decoding
//!
//! Two paths lead to a displayed image. A decoder that can fully decode
//! does so on the blocking pool; one that cannot only probes the header,
//! the equivalent of waiting for a native load event. Both report the
//! same [`ImageInfo`].

use crate::error::DecodeError;
use async_trait::async_trait;
use image::{ImageFormat, ImageReader};
use std::io::Cursor;
use std::sync::Arc;

/// What is known about a displayed image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Detected container format
    pub format: Option<ImageFormat>,
}

/// Turns fetched bytes into a displayable image
#[async_trait]
pub trait Decoder: Send + Sync + 'static {
    /// Whether [`Decoder::decode`] is available
    fn can_decode(&self) -> bool;

    /// Fully decode the image
    ///
    /// # Errors
    /// Any decode failure.
    async fn decode(&self, bytes: Arc<[u8]>) -> Result<ImageInfo, DecodeError>;

    /// Read just enough to know the image is loadable
    ///
    /// # Errors
    /// Unknown format or a malformed header.
    fn load(&self, bytes: &[u8]) -> Result<ImageInfo, DecodeError>;
}

/// Decoder backed by the `image` crate
#[derive(Debug, Clone, Copy)]
pub struct ImageCrateDecoder {
    full: bool,
}

impl ImageCrateDecoder {
    /// Decoder that fully decodes
    #[inline]
    #[must_use]
    pub fn full() -> Self {
        Self { full: true }
    }

    /// Decoder limited to header probing
    #[inline]
    #[must_use]
    pub fn header_only() -> Self {
        Self { full: false }
    }
}

impl Default for ImageCrateDecoder {
    fn default() -> Self {
        Self::full()
    }
}

#[async_trait]
impl Decoder for ImageCrateDecoder {
    fn can_decode(&self) -> bool {
        self.full
    }

    async fn decode(&self, bytes: Arc<[u8]>) -> Result<ImageInfo, DecodeError> {
        let format = image::guess_format(&bytes).ok();
        let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| DecodeError::Task(e.to_string()))??;

        Ok(ImageInfo {
            width: decoded.width(),
            height: decoded.height(),
            format,
        })
    }

    fn load(&self, bytes: &[u8]) -> Result<ImageInfo, DecodeError> {
        let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        let format = reader.format().ok_or(DecodeError::UnknownFormat)?;
        let (width, height) = reader.into_dimensions()?;

        Ok(ImageInfo {
            width,
            height,
            format: Some(format),
        })
    }
}
