//! Binarization of grayscale images.
//!
//! Provides Floyd-Steinberg error-diffusion dithering and plain threshold
//! conversion. All arithmetic is integer so output is bit-identical on every
//! platform.

use image::GrayImage;
use tracing::{debug, trace};

use crate::buffer::{BinaryBuffer, GrayscaleBuffer};

/// Default threshold value for binarization.
pub const DEFAULT_THRESHOLD: u8 = 128;

/// Fixed-point scale of the error accumulator (errors are held in sixteenths).
const SCALE: i32 = 16;

/// Row interval between progress reports.
const PROGRESS_ROWS: u32 = 50;

/// Per-pixel quantization error carried forward during one dithering pass.
///
/// Values are in sixteenths of a luminance level.
#[derive(Debug, Clone)]
pub struct ErrorAccumulator {
    width: usize,
    height: usize,
    cells: Vec<i32>,
}

impl ErrorAccumulator {
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = (width as usize, height as usize);
        Self {
            width,
            height,
            cells: vec![0; width * height],
        }
    }

    pub fn get(&self, x: u32, y: u32) -> i32 {
        self.cells[y as usize * self.width + x as usize]
    }

    /// Sum of all carried error, in sixteenths.
    pub fn total(&self) -> i64 {
        self.cells.iter().map(|&e| i64::from(e)).sum()
    }

    /// Distribute quantization error to not-yet-visited neighbours.
    ///
    /// Error distribution pattern:
    /// - Right:        7/16
    /// - Bottom-left:  3/16
    /// - Bottom:       5/16
    /// - Bottom-right: 1/16 (takes the rounding remainder)
    ///
    /// Shares falling outside the image are dropped.
    pub fn diffuse(&mut self, x: u32, y: u32, error: i32) {
        let right = error * 7 / SCALE;
        let bottom_left = error * 3 / SCALE;
        let bottom = error * 5 / SCALE;
        let bottom_right = error - right - bottom_left - bottom;

        let (xu, yu) = (x as usize, y as usize);
        let w = self.width;
        let has_right = xu + 1 < w;

        if has_right {
            self.cells[yu * w + xu + 1] += right;
        }
        if yu + 1 < self.height {
            let below = (yu + 1) * w + xu;
            if xu > 0 {
                self.cells[below - 1] += bottom_left;
            }
            self.cells[below] += bottom;
            if has_right {
                self.cells[below + 1] += bottom_right;
            }
        }
    }
}

/// Apply Floyd-Steinberg dithering to a grayscale image.
///
/// Pixels are visited in raster order (no serpentine scan). A pixel becomes
/// white when its luminance plus carried error is at least `threshold`.
pub fn floyd_steinberg_dither(img: &GrayscaleBuffer, threshold: u8) -> BinaryBuffer {
    dither_with_progress(img, threshold, |row, height| {
        trace!(row, height, "Dithering progress");
    })
}

/// [`floyd_steinberg_dither`], calling `progress(row, height)` before every
/// 50th row.
pub fn dither_with_progress(
    img: &GrayscaleBuffer,
    threshold: u8,
    mut progress: impl FnMut(u32, u32),
) -> BinaryBuffer {
    let (width, height) = img.dimensions();
    debug!(width, height, threshold, "Applying Floyd-Steinberg dithering");

    let cutoff = i32::from(threshold) * SCALE;
    let white = i32::from(BinaryBuffer::WHITE) * SCALE;
    let mut errors = ErrorAccumulator::new(width, height);
    let mut output = Vec::with_capacity(width as usize * height as usize);

    for (y, row) in img.samples().chunks_exact(width as usize).enumerate() {
        let y = y as u32;
        if y % PROGRESS_ROWS == 0 {
            progress(y, height);
        }
        for (x, &luma) in row.iter().enumerate() {
            let x = x as u32;
            let biased = i32::from(luma) * SCALE + errors.get(x, y);
            let (level, quantized) = if biased >= cutoff {
                (BinaryBuffer::WHITE, white)
            } else {
                (BinaryBuffer::BLACK, 0)
            };
            output.push(level);
            errors.diffuse(x, y, biased - quantized);
        }
    }

    debug!("Floyd-Steinberg dithering complete");
    BinaryBuffer::from_bilevel_unchecked(into_gray(width, height, output))
}

/// Simple threshold conversion without dithering.
///
/// Pixels with values >= `threshold` become white (255), others become black (0).
pub fn threshold_binarize(img: &GrayscaleBuffer, threshold: u8) -> BinaryBuffer {
    let (width, height) = img.dimensions();
    debug!(width, height, threshold, "Applying threshold conversion");

    let output = img
        .samples()
        .iter()
        .map(|&v| {
            if v >= threshold {
                BinaryBuffer::WHITE
            } else {
                BinaryBuffer::BLACK
            }
        })
        .collect();
    BinaryBuffer::from_bilevel_unchecked(into_gray(width, height, output))
}

fn into_gray(width: u32, height: u32, samples: Vec<u8>) -> GrayImage {
    GrayImage::from_raw(width, height, samples).unwrap_or_else(|| GrayImage::new(width, height))
}
