//! Softimage PIC decoder.

use super::ByteReader;
use crate::buffer::PixelBuffer;
use crate::error::{ConvertError, Result};

const MAGIC: [u8; 4] = [0x53, 0x80, 0xF6, 0x34];
const PICT_OFFSET: usize = 88;
const MAX_PACKETS: usize = 10;
/// Same ceiling the `image` crate applies to decoder allocations.
const MAX_ALLOC: usize = 512 * 1024 * 1024;

const CHANNEL_ALPHA: u8 = 0x10;

#[derive(Debug, Clone, Copy)]
struct Packet {
    kind: u8,
    channels: u8,
}

pub fn is_pic(bytes: &[u8]) -> bool {
    bytes.starts_with(&MAGIC)
        && bytes.get(PICT_OFFSET..PICT_OFFSET + 4) == Some(&b"PICT"[..])
}

pub fn decode(bytes: &[u8]) -> Result<PixelBuffer> {
    if !is_pic(bytes) {
        return Err(ConvertError::decode("missing PIC signature"));
    }
    let mut r = ByteReader::new(bytes);
    r.skip(PICT_OFFSET + 4)?;
    let width = u32::from(r.u16_be()?);
    let height = u32::from(r.u16_be()?);
    // Aspect ratio, fields, padding.
    r.skip(8)?;

    let packets = read_packets(&mut r)?;
    let has_alpha = packets.iter().any(|p| p.channels & CHANNEL_ALPHA != 0);

    let row_len = width as usize * 4;
    if row_len * height as usize > MAX_ALLOC {
        return Err(ConvertError::decode(format!(
            "PIC image {width}x{height} is too large"
        )));
    }
    let mut rgba = vec![255u8; row_len * height as usize];
    for row in rgba.chunks_exact_mut(row_len.max(1)) {
        for packet in &packets {
            decode_row(&mut r, *packet, row)?;
        }
    }

    let (channels, samples) = if has_alpha {
        (4, rgba)
    } else {
        let rgb = rgba
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        (3, rgb)
    };
    PixelBuffer::new(width, height, channels, samples)
}

fn read_packets(r: &mut ByteReader<'_>) -> Result<Vec<Packet>> {
    let mut packets = Vec::new();
    loop {
        if packets.len() == MAX_PACKETS {
            return Err(ConvertError::decode("too many PIC channel packets"));
        }
        let chained = r.u8()?;
        let size = r.u8()?;
        let kind = r.u8()?;
        let channels = r.u8()?;
        if size != 8 {
            return Err(ConvertError::decode(format!(
                "unsupported PIC sample size {size}"
            )));
        }
        packets.push(Packet { kind, channels });
        if chained == 0 {
            return Ok(packets);
        }
    }
}

/// Read one pixel's worth of the channels selected by `mask` into `dest`.
fn read_channels(r: &mut ByteReader<'_>, mask: u8, dest: &mut [u8]) -> Result<()> {
    for (i, slot) in dest.iter_mut().enumerate().take(4) {
        if mask & (0x80 >> i) != 0 {
            *slot = r.u8()?;
        }
    }
    Ok(())
}

fn decode_row(r: &mut ByteReader<'_>, packet: Packet, row: &mut [u8]) -> Result<()> {
    let width = row.len() / 4;
    match packet.kind {
        // Uncompressed
        0 => {
            for px in row.chunks_exact_mut(4) {
                read_channels(r, packet.channels, px)?;
            }
        }
        // Pure run-length
        1 => {
            let mut x = 0;
            while x < width {
                let count = (r.u8()? as usize).min(width - x);
                if count == 0 {
                    return Err(ConvertError::decode("empty PIC run"));
                }
                let mut value = [0u8; 4];
                read_channels(r, packet.channels, &mut value)?;
                for px in row[x * 4..(x + count) * 4].chunks_exact_mut(4) {
                    copy_channels(packet.channels, &value, px);
                }
                x += count;
            }
        }
        // Mixed run-length
        2 => {
            let mut x = 0;
            while x < width {
                let header = r.u8()? as usize;
                if header >= 128 {
                    let count = if header == 128 {
                        r.u16_be()? as usize
                    } else {
                        header - 127
                    };
                    if count == 0 || count > width - x {
                        return Err(ConvertError::decode("bad PIC repeat run"));
                    }
                    let mut value = [0u8; 4];
                    read_channels(r, packet.channels, &mut value)?;
                    for px in row[x * 4..(x + count) * 4].chunks_exact_mut(4) {
                        copy_channels(packet.channels, &value, px);
                    }
                    x += count;
                } else {
                    let count = header + 1;
                    if count > width - x {
                        return Err(ConvertError::decode("bad PIC literal run"));
                    }
                    for px in row[x * 4..(x + count) * 4].chunks_exact_mut(4) {
                        read_channels(r, packet.channels, px)?;
                    }
                    x += count;
                }
            }
        }
        other => {
            return Err(ConvertError::decode(format!(
                "unsupported PIC packet type {other}"
            )));
        }
    }
    Ok(())
}

fn copy_channels(mask: u8, value: &[u8; 4], dest: &mut [u8]) {
    for i in 0..4 {
        if mask & (0x80 >> i) != 0 {
            dest[i] = value[i];
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const RGB: u8 = 0xE0;

    /// Header plus packet table; pixel data is appended by the caller.
    pub(crate) fn pic_header(width: u16, height: u16, packets: &[(u8, u8)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC);
        out.resize(PICT_OFFSET, 0);
        out.extend_from_slice(b"PICT");
        out.extend_from_slice(&width.to_be_bytes());
        out.extend_from_slice(&height.to_be_bytes());
        out.extend_from_slice(&[0; 8]);
        for (i, &(kind, channels)) in packets.iter().enumerate() {
            let chained = u8::from(i + 1 < packets.len());
            out.extend_from_slice(&[chained, 8, kind, channels]);
        }
        out
    }

    #[test]
    fn test_detects_magic_and_pict_tag() {
        let bytes = pic_header(1, 1, &[(0, RGB)]);
        assert!(is_pic(&bytes));
        assert!(!is_pic(&bytes[..PICT_OFFSET]));
        assert!(!is_pic(b"\x53\x80\xF6\x34"));
    }

    #[test]
    fn test_uncompressed_rgb() {
        let mut bytes = pic_header(2, 1, &[(0, RGB)]);
        bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        let buf = decode(&bytes).unwrap();
        assert_eq!(buf.channels(), 3);
        assert_eq!(buf.samples(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_pure_rle_with_alpha_packet() {
        let mut bytes = pic_header(3, 1, &[(1, RGB), (0, CHANNEL_ALPHA)]);
        // One run of three grey pixels, then three raw alpha bytes.
        bytes.extend_from_slice(&[3, 90, 90, 90]);
        bytes.extend_from_slice(&[7, 8, 9]);
        let buf = decode(&bytes).unwrap();
        assert_eq!(buf.channels(), 4);
        assert_eq!(
            buf.samples(),
            &[90, 90, 90, 7, 90, 90, 90, 8, 90, 90, 90, 9]
        );
    }

    #[test]
    fn test_mixed_rle_rows() {
        let mut bytes = pic_header(4, 2, &[(2, RGB)]);
        // Row 0: repeat 4 (header 131 = 127 + 4).
        bytes.extend_from_slice(&[131, 10, 20, 30]);
        // Row 1: literal 2, then long-form repeat of 2.
        bytes.extend_from_slice(&[1, 1, 1, 1, 2, 2, 2]);
        bytes.extend_from_slice(&[128, 0, 2, 5, 5, 5]);
        let buf = decode(&bytes).unwrap();
        assert_eq!(buf.dimensions(), (4, 2));
        let samples = buf.samples();
        assert_eq!(&samples[..12], &[10, 20, 30].repeat(4)[..]);
        assert_eq!(&samples[12..], &[1, 1, 1, 2, 2, 2, 5, 5, 5, 5, 5, 5]);
    }

    #[test]
    fn test_run_past_row_end_is_rejected() {
        let mut bytes = pic_header(2, 1, &[(2, RGB)]);
        bytes.extend_from_slice(&[140, 1, 1, 1]);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_truncated_pixels_are_rejected() {
        let mut bytes = pic_header(4, 4, &[(0, RGB)]);
        bytes.extend_from_slice(&[0; 10]);
        assert!(matches!(decode(&bytes), Err(ConvertError::Decode { .. })));
    }

    #[test]
    fn test_zero_width_is_rejected() {
        let bytes = pic_header(0, 1, &[(0, RGB)]);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_oversized_header_is_rejected_before_allocating() {
        let bytes = pic_header(u16::MAX, u16::MAX, &[(1, RGB)]);
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }
}
