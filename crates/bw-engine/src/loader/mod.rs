//! Image loading: content-sniffed decoding into a [`PixelBuffer`].
//!
//! Photoshop (PSD) and Softimage (PIC) files are handled by the decoders in
//! this module; every other format goes through the `image` crate.

pub mod pic;
pub mod psd;

use std::fmt;
use std::path::Path;

use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::buffer::PixelBuffer;
use crate::error::{ConvertError, Result};

/// Container format detected from the file contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Psd,
    Pic,
    Image(ImageFormat),
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Psd => f.write_str("PSD"),
            Self::Pic => f.write_str("PIC"),
            Self::Image(ImageFormat::Pnm) => f.write_str("PNM"),
            Self::Image(format) => {
                let name = format.extensions_str().first().copied().unwrap_or("image");
                f.write_str(&name.to_ascii_uppercase())
            }
        }
    }
}

/// A decoded input file.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub format: SourceFormat,
    pub pixels: PixelBuffer,
}

/// Read and decode the image at `path`.
///
/// I/O failures (missing file, permission denied) are reported as
/// [`ConvertError::Io`]; anything wrong with the bytes themselves is
/// [`ConvertError::Decode`].
pub fn load_image(path: &Path) -> Result<LoadedImage> {
    let bytes = std::fs::read(path).map_err(|e| ConvertError::io(path, e))?;
    debug!(path = %path.display(), len = bytes.len(), "Read input file");
    decode_bytes(&bytes)
}

/// Decode an in-memory image file.
pub fn decode_bytes(bytes: &[u8]) -> Result<LoadedImage> {
    let format = detect_format(bytes)
        .ok_or_else(|| ConvertError::decode("unrecognized image format"))?;

    let pixels = match format {
        SourceFormat::Psd => psd::decode(bytes)?,
        SourceFormat::Pic => pic::decode(bytes)?,
        SourceFormat::Image(image_format) => {
            let img = image::load_from_memory_with_format(bytes, image_format)
                .map_err(|e| ConvertError::decode(format!("{format}: {e}")))?;
            from_dynamic(img)?
        }
    };

    debug!(
        %format,
        width = pixels.width(),
        height = pixels.height(),
        channels = pixels.channels(),
        "Decoded image"
    );
    Ok(LoadedImage { format, pixels })
}

/// Sniff the container format from magic bytes. File extensions are never
/// consulted.
pub fn detect_format(bytes: &[u8]) -> Option<SourceFormat> {
    if psd::is_psd(bytes) {
        return Some(SourceFormat::Psd);
    }
    if pic::is_pic(bytes) {
        return Some(SourceFormat::Pic);
    }
    image::guess_format(bytes)
        .ok()
        .or_else(|| looks_like_tga(bytes).then_some(ImageFormat::Tga))
        .map(SourceFormat::Image)
}

/// TGA has no magic number; accept a header whose fields are all plausible.
fn looks_like_tga(bytes: &[u8]) -> bool {
    let Some(header) = bytes.get(..18) else {
        return false;
    };
    let (color_map, kind, map_bits, bpp) = (header[1], header[2], header[7], header[16]);
    let width = u16::from_le_bytes([header[12], header[13]]);
    let height = u16::from_le_bytes([header[14], header[15]]);
    if width == 0 || height == 0 {
        return false;
    }
    match color_map {
        0 => matches!(kind, 2 | 3 | 10 | 11) && matches!(bpp, 8 | 15 | 16 | 24 | 32),
        1 => {
            matches!(kind, 1 | 9)
                && matches!(map_bits, 8 | 15 | 16 | 24 | 32)
                && matches!(bpp, 8 | 16)
        }
        _ => false,
    }
}

/// Normalize an `image` crate result into the canonical buffer.
///
/// Gray (with or without alpha) becomes 1 channel, colour becomes 3, colour
/// with alpha becomes 4. Float images are tone-mapped with a 2.2 gamma.
fn from_dynamic(img: DynamicImage) -> Result<PixelBuffer> {
    let (width, height) = (img.width(), img.height());
    let color = img.color();

    if matches!(img, DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_)) {
        let channels = if color.has_alpha() { 4 } else { 3 };
        let samples = float_to_ldr(&img.to_rgba32f().into_raw(), channels);
        return PixelBuffer::new(width, height, channels, samples);
    }

    if !color.has_color() {
        PixelBuffer::new(width, height, 1, img.to_luma8().into_raw())
    } else if color.has_alpha() {
        PixelBuffer::new(width, height, 4, img.to_rgba8().into_raw())
    } else {
        PixelBuffer::new(width, height, 3, img.to_rgb8().into_raw())
    }
}

const HDR_GAMMA: f32 = 2.2;

/// Map linear RGBA floats to 8-bit samples, keeping `channels` per pixel.
fn float_to_ldr(rgba: &[f32], channels: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgba.len() / 4 * channels as usize);
    for px in rgba.chunks_exact(4) {
        for &v in &px[..3] {
            out.push(to_u8(v.max(0.0).powf(1.0 / HDR_GAMMA)));
        }
        if channels == 4 {
            out.push(to_u8(px[3]));
        }
    }
    out
}

fn to_u8(v: f32) -> u8 {
    (v * 255.0 + 0.5).clamp(0.0, 255.0) as u8
}

/// Bounds-checked big-endian cursor shared by the built-in decoders.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| ConvertError::decode("unexpected end of image data"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16_be(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32_be(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}
