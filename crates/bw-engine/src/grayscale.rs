//! Luminance reduction from the canonical pixel buffer.

use image::GrayImage;
use serde::Serialize;
use tracing::debug;

use crate::buffer::{GrayscaleBuffer, PixelBuffer};

/// Luma coefficients used for colour input.
///
/// Weights are held in thousandths (Rec.601) or ten-thousandths (Rec.709)
/// so the reduction is exact integer arithmetic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LumaWeights {
    /// 0.299 R + 0.587 G + 0.114 B
    #[default]
    Rec601,
    /// 0.2126 R + 0.7152 G + 0.0722 B
    Rec709,
}

impl LumaWeights {
    /// Integer weights and their common denominator.
    const fn coefficients(self) -> ([u32; 3], u32) {
        match self {
            Self::Rec601 => ([299, 587, 114], 1_000),
            Self::Rec709 => ([2126, 7152, 722], 10_000),
        }
    }

    /// Rounded luminance of one RGB triple.
    pub fn luma(self, r: u8, g: u8, b: u8) -> u8 {
        let ([wr, wg, wb], scale) = self.coefficients();
        let weighted = wr * u32::from(r) + wg * u32::from(g) + wb * u32::from(b);
        ((weighted + scale / 2) / scale).min(255) as u8
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "rec601" | "bt601" | "601" => Some(Self::Rec601),
            "rec709" | "bt709" | "709" => Some(Self::Rec709),
            _ => None,
        }
    }
}

/// Reduce a pixel buffer to one luminance sample per pixel.
///
/// Single-channel input passes through unchanged; alpha is ignored.
pub fn to_grayscale(pixels: &PixelBuffer, weights: LumaWeights) -> GrayscaleBuffer {
    let (width, height) = pixels.dimensions();
    debug!(
        width,
        height,
        channels = pixels.channels(),
        ?weights,
        "Reducing to grayscale"
    );

    let luma: Vec<u8> = if pixels.channels() == 1 {
        pixels.samples().to_vec()
    } else {
        pixels
            .pixels()
            .map(|px| weights.luma(px[0], px[1], px[2]))
            .collect()
    };

    // Sample count is validated by PixelBuffer, so the sizes always agree.
    let img = GrayImage::from_raw(width, height, luma)
        .unwrap_or_else(|| GrayImage::new(width, height));
    GrayscaleBuffer::from_image(img)
}
