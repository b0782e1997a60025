//! 1-bit grayscale PNG output.
//!
//! The file is written to a temporary sibling and renamed into place only
//! after the whole image has been encoded and flushed, so the output path
//! never holds a truncated PNG.

use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::buffer::BinaryBuffer;
use crate::error::{ConvertError, Result};

/// Default physical resolution recorded in the output.
pub const DEFAULT_DPI: u32 = 300;

const TEMP_PREFIX: &str = ".bwconvert-";

/// Pixels per metre for a resolution in dots per inch, rounded.
pub fn dpi_to_ppm(dpi: u32) -> u32 {
    ((u64::from(dpi) * 10_000 + 127) / 254) as u32
}

/// Physical size in millimetres of an image printed at `dpi`.
pub fn physical_size_mm(width: u32, height: u32, dpi: u32) -> (f64, f64) {
    let mm = |px: u32| f64::from(px) / f64::from(dpi.max(1)) * 25.4;
    (mm(width), mm(height))
}

/// Pack a bilevel image into PNG 1-bit rows: MSB first, white = 1,
/// each row padded to a whole byte.
pub fn pack_rows(img: &BinaryBuffer) -> Vec<u8> {
    let width = img.width() as usize;
    let row_bytes = width.div_ceil(8);
    let mut packed = vec![0u8; row_bytes * img.height() as usize];

    if width == 0 {
        return packed;
    }
    for (row, out) in img
        .samples()
        .chunks_exact(width)
        .zip(packed.chunks_exact_mut(row_bytes))
    {
        for (x, &v) in row.iter().enumerate() {
            if v == BinaryBuffer::WHITE {
                out[x / 8] |= 0x80 >> (x % 8);
            }
        }
    }
    packed
}

/// Encode a bilevel image as an in-memory 1-bit grayscale PNG.
pub fn encode_png(
    img: &BinaryBuffer,
    dpi: u32,
) -> std::result::Result<Vec<u8>, png::EncodingError> {
    let (width, height) = img.dimensions();
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Grayscale);
        encoder.set_depth(png::BitDepth::One);
        let ppm = dpi_to_ppm(dpi);
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: ppm,
            yppu: ppm,
            unit: png::Unit::Meter,
        }));

        let mut writer = encoder.write_header()?;
        writer.write_image_data(&pack_rows(img))?;
        writer.finish()?;
    }
    Ok(out)
}

/// Encode `img` and atomically place it at `path`.
///
/// Any failure (including creating the temporary file) is reported as
/// [`ConvertError::Encode`]; the temporary file is removed on every error
/// path and `path` is left untouched.
pub fn write_bilevel_png(img: &BinaryBuffer, path: &Path, dpi: u32) -> Result<u64> {
    let bytes = encode_png(img, dpi).map_err(|e| ConvertError::encode(path, e))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| ConvertError::encode(path, e))?;
    debug!(temp = %tmp.path().display(), len = bytes.len(), "Writing PNG to temporary file");

    tmp.write_all(&bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| ConvertError::encode(path, e))?;

    tmp.persist(path)
        .map_err(|e| ConvertError::encode(path, e.error))?;
    Ok(bytes.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::io::Cursor;

    fn from_bits(width: u32, height: u32, bits: &[u8]) -> BinaryBuffer {
        let samples = bits.iter().map(|&b| if b == 1 { 255 } else { 0 }).collect();
        BinaryBuffer::from_image(GrayImage::from_raw(width, height, samples).unwrap()).unwrap()
    }

    fn temp_entries(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(TEMP_PREFIX))
            .collect()
    }

    #[test]
    fn test_pack_rows_msb_first_with_padding() {
        let img = from_bits(10, 2, &[
            1, 0, 1, 1, 0, 0, 0, 0, 1, 0, //
            0, 0, 0, 0, 0, 0, 0, 1, 0, 1,
        ]);
        assert_eq!(pack_rows(&img), vec![0xB0, 0x80, 0x01, 0x40]);
    }

    #[test]
    fn test_pack_rows_exact_byte_width() {
        let img = from_bits(8, 1, &[1, 1, 1, 1, 1, 1, 1, 1]);
        assert_eq!(pack_rows(&img), vec![0xFF]);
    }

    #[test]
    fn test_dpi_to_ppm() {
        assert_eq!(dpi_to_ppm(300), 11811);
        assert_eq!(dpi_to_ppm(72), 2835);
        assert_eq!(dpi_to_ppm(254), 10000);
    }

    #[test]
    fn test_physical_size_at_300_dpi() {
        let (w, h) = physical_size_mm(600, 300, 300);
        assert!((w - 50.8).abs() < 1e-9);
        assert!((h - 25.4).abs() < 1e-9);
    }

    #[test]
    fn test_encoded_png_is_one_bit_grayscale() {
        let img = from_bits(3, 2, &[1, 0, 1, 0, 1, 0]);
        let bytes = encode_png(&img, 300).unwrap();

        let mut decoder = png::Decoder::new(Cursor::new(bytes));
        decoder.set_transformations(png::Transformations::IDENTITY);
        let mut reader = decoder.read_info().unwrap();
        let info = reader.info();
        assert_eq!(info.color_type, png::ColorType::Grayscale);
        assert_eq!(info.bit_depth, png::BitDepth::One);
        let dims = info.pixel_dims.unwrap();
        assert_eq!((dims.xppu, dims.yppu), (11811, 11811));
        assert_eq!(dims.unit, png::Unit::Meter);

        let mut raw = vec![0; reader.output_buffer_size()];
        reader.next_frame(&mut raw).unwrap();
        assert_eq!(&raw[..2], &[0b1010_0000, 0b0100_0000]);
    }

    #[test]
    fn test_encoded_png_decodes_to_same_levels() {
        let img = from_bits(5, 1, &[0, 1, 1, 0, 1]);
        let bytes = encode_png(&img, 300).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_luma8();
        let expected: Vec<Luma<u8>> = img.samples().iter().map(|&v| Luma([v])).collect();
        let actual: Vec<Luma<u8>> = decoded.pixels().copied().collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_write_places_file_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("art.png");
        let img = from_bits(2, 2, &[1, 0, 0, 1]);

        let len = write_bilevel_png(&img, &path, 300).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), len);
        assert!(temp_entries(dir.path()).is_empty());
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("art.png");
        std::fs::write(&path, b"old contents").unwrap();

        let img = from_bits(1, 1, &[1]);
        write_bilevel_png(&img, &path, 300).unwrap();
        let written = std::fs::read(&path).unwrap();
        assert_eq!(written, encode_png(&img, 300).unwrap());
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("art.png");
        let img = from_bits(1, 1, &[0]);

        let err = write_bilevel_png(&img, &path, 300).unwrap_err();
        assert!(matches!(err, ConvertError::Encode { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory cannot be replaced by a file rename.
        let path = dir.path().join("occupied");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), b"x").unwrap();

        let img = from_bits(1, 1, &[1]);
        let err = write_bilevel_png(&img, &path, 300).unwrap_err();
        assert!(matches!(err, ConvertError::Encode { .. }));
        assert!(path.is_dir());
        assert!(temp_entries(dir.path()).is_empty());
    }
}
