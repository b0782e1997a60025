//! In-memory pixel buffers passed between conversion stages.
//!
//! Each stage consumes one buffer kind and produces the next:
//! [`PixelBuffer`] → [`GrayscaleBuffer`] → [`BinaryBuffer`].

use image::{GrayImage, Luma};

use crate::error::ConvertError;

/// Canonical decoded image: 8-bit samples, 1, 3 or 4 interleaved channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: u8,
    samples: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw row-major samples.
    ///
    /// Fails with [`ConvertError::Decode`] when the dimensions are zero, the
    /// channel count is not 1, 3 or 4, or the sample count does not match.
    pub fn new(
        width: u32,
        height: u32,
        channels: u8,
        samples: Vec<u8>,
    ) -> Result<Self, ConvertError> {
        if width == 0 || height == 0 {
            return Err(ConvertError::decode(format!(
                "image has empty dimensions {width}x{height}"
            )));
        }
        if !matches!(channels, 1 | 3 | 4) {
            return Err(ConvertError::decode(format!(
                "unsupported channel count {channels}"
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if samples.len() != expected {
            return Err(ConvertError::decode(format!(
                "sample count {} does not match {width}x{height}x{channels}",
                samples.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            samples,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Iterate over pixels as channel slices in raster order.
    pub fn pixels(&self) -> std::slice::ChunksExact<'_, u8> {
        self.samples.chunks_exact(self.channels as usize)
    }
}

/// Single-channel luminance image with the same geometry as its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayscaleBuffer(GrayImage);

impl GrayscaleBuffer {
    pub fn from_image(img: GrayImage) -> Self {
        Self(img)
    }

    /// Uniform field of a single luminance value.
    pub fn uniform(width: u32, height: u32, value: u8) -> Self {
        Self(GrayImage::from_pixel(width, height, Luma([value])))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    /// Luminance samples in raster order.
    pub fn samples(&self) -> &[u8] {
        self.0.as_raw()
    }
}

/// Strictly two-level image: every sample is 0 (black) or 255 (white).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryBuffer(GrayImage);

impl BinaryBuffer {
    pub const BLACK: u8 = 0;
    pub const WHITE: u8 = 255;

    /// Wrap an image that is already bilevel.
    ///
    /// Returns `None` if any sample is neither 0 nor 255.
    pub fn from_image(img: GrayImage) -> Option<Self> {
        img.as_raw()
            .iter()
            .all(|&v| v == Self::BLACK || v == Self::WHITE)
            .then_some(Self(img))
    }

    /// Build from stage output that upholds the bilevel invariant.
    pub(crate) fn from_bilevel_unchecked(img: GrayImage) -> Self {
        debug_assert!(
            img.as_raw()
                .iter()
                .all(|&v| v == Self::BLACK || v == Self::WHITE)
        );
        Self(img)
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    pub fn samples(&self) -> &[u8] {
        self.0.as_raw()
    }

    pub fn is_white(&self, x: u32, y: u32) -> bool {
        self.0.get_pixel(x, y).0[0] == Self::WHITE
    }

    /// Number of white pixels.
    pub fn white_count(&self) -> u64 {
        self.0
            .as_raw()
            .iter()
            .filter(|&&v| v == Self::WHITE)
            .count() as u64
    }

    pub(crate) fn as_image_mut(&mut self) -> &mut GrayImage {
        &mut self.0
    }

    pub fn into_image(self) -> GrayImage {
        self.0
    }
}
