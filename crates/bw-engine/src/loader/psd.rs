//! Photoshop (PSD) decoder for the flattened composite image.
//!
//! Supports grayscale and RGB colour modes at 8 or 16 bits per sample,
//! stored raw or PackBits-compressed. Layer data is skipped.

use super::ByteReader;
use crate::buffer::PixelBuffer;
use crate::error::{ConvertError, Result};

const SIGNATURE: &[u8; 4] = b"8BPS";
const MAX_CHANNELS: u16 = 56;

const MODE_GRAYSCALE: u16 = 1;
const MODE_RGB: u16 = 3;

const COMPRESSION_RAW: u16 = 0;
const COMPRESSION_RLE: u16 = 1;

pub fn is_psd(bytes: &[u8]) -> bool {
    bytes.starts_with(SIGNATURE)
}

pub fn decode(bytes: &[u8]) -> Result<PixelBuffer> {
    let mut r = ByteReader::new(bytes);
    if r.take(4)? != SIGNATURE {
        return Err(ConvertError::decode("missing PSD signature"));
    }
    let version = r.u16_be()?;
    if version != 1 {
        return Err(ConvertError::decode(format!(
            "unsupported PSD version {version}"
        )));
    }
    r.skip(6)?;

    let channel_count = r.u16_be()?;
    if channel_count == 0 || channel_count > MAX_CHANNELS {
        return Err(ConvertError::decode(format!(
            "invalid PSD channel count {channel_count}"
        )));
    }
    let height = r.u32_be()?;
    let width = r.u32_be()?;

    let depth = r.u16_be()?;
    let sample_bytes = match depth {
        8 => 1,
        16 => 2,
        other => {
            return Err(ConvertError::decode(format!(
                "unsupported PSD bit depth {other}"
            )));
        }
    };

    let mode = r.u16_be()?;
    let color_channels: u16 = match mode {
        MODE_GRAYSCALE => 1,
        MODE_RGB => 3,
        other => {
            return Err(ConvertError::decode(format!(
                "unsupported PSD colour mode {other}"
            )));
        }
    };
    if channel_count < color_channels {
        return Err(ConvertError::decode(
            "PSD has fewer channels than its colour mode needs",
        ));
    }
    let used_channels = if mode == MODE_RGB && channel_count >= 4 {
        4
    } else {
        color_channels
    };

    // Colour mode data, image resources, layer and mask info.
    for _ in 0..3 {
        let len = r.u32_be()? as usize;
        r.skip(len)?;
    }

    let pixel_count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| ConvertError::decode("PSD dimensions overflow"))?;
    let plane_len = pixel_count
        .checked_mul(sample_bytes)
        .ok_or_else(|| ConvertError::decode("PSD dimensions overflow"))?;

    let compression = r.u16_be()?;
    let planes: Vec<Vec<u8>> = match compression {
        COMPRESSION_RAW => (0..used_channels)
            .map(|_| r.take(plane_len).map(<[u8]>::to_vec))
            .collect::<Result<_>>()?,
        COMPRESSION_RLE => {
            // Per-row byte counts for every channel; rows are decoded in
            // sequence so the counts are not needed.
            let counts_len = (height as usize)
                .checked_mul(channel_count as usize * 2)
                .ok_or_else(|| ConvertError::decode("PSD dimensions overflow"))?;
            r.skip(counts_len)?;
            (0..used_channels)
                .map(|_| unpack_bits(&mut r, plane_len))
                .collect::<Result<_>>()?
        }
        other => {
            return Err(ConvertError::decode(format!(
                "unsupported PSD compression {other}"
            )));
        }
    };

    // 16-bit samples are big-endian; keep the high byte.
    let mut samples = Vec::with_capacity(pixel_count * planes.len());
    for i in 0..pixel_count {
        for plane in &planes {
            samples.push(plane[i * sample_bytes]);
        }
    }

    PixelBuffer::new(width, height, used_channels as u8, samples)
}

/// Expand PackBits data until `len` bytes have been produced.
fn unpack_bits(r: &mut ByteReader<'_>, len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    while out.len() < len {
        let header = r.u8()?;
        match header {
            128 => {}
            0..=127 => {
                let count = header as usize + 1;
                if out.len() + count > len {
                    return Err(ConvertError::decode("PSD literal run overflows plane"));
                }
                out.extend_from_slice(r.take(count)?);
            }
            _ => {
                let count = 257 - header as usize;
                if out.len() + count > len {
                    return Err(ConvertError::decode("PSD repeat run overflows plane"));
                }
                let value = r.u8()?;
                out.resize(out.len() + count, value);
            }
        }
    }
    Ok(out)
}
