//! Black/white inversion of a bilevel image.

use tracing::debug;

use crate::buffer::BinaryBuffer;

/// Swap black and white in place (`v -> 255 - v`).
///
/// Applying it twice restores the original image exactly.
pub fn invert(mut img: BinaryBuffer) -> BinaryBuffer {
    let (width, height) = img.dimensions();
    debug!(width, height, "Inverting black and white");
    image::imageops::invert(img.as_image_mut());
    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn checkerboard(width: u32, height: u32) -> BinaryBuffer {
        let img = GrayImage::from_fn(width, height, |x, y| {
            Luma([if (x + y) % 2 == 0 { 255 } else { 0 }])
        });
        BinaryBuffer::from_image(img).unwrap()
    }

    #[test]
    fn test_invert_swaps_levels() {
        let original = checkerboard(3, 3);
        let inverted = invert(original.clone());
        for y in 0..3 {
            for x in 0..3 {
                assert_ne!(original.is_white(x, y), inverted.is_white(x, y));
            }
        }
    }

    #[test]
    fn test_invert_is_involution() {
        let original = checkerboard(7, 5);
        assert_eq!(invert(invert(original.clone())), original);
    }

    #[test]
    fn test_invert_keeps_bilevel_invariant() {
        let inverted = invert(checkerboard(4, 4));
        assert!(BinaryBuffer::from_image(inverted.into_image()).is_some());
    }
}
