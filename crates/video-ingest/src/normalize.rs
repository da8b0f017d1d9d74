//! Conversion of native pixel data into canonical 8-bit frames.
//!
//! The output keeps the channel order implied by the format's
//! [`PixelLayout`]; only the sample depth changes. 16-bit channels keep their
//! high byte, float channels are clamped to `[0, 1]` and scaled, packed
//! formats are expanded by bit replication.

use half::f16;

use crate::{
    format::{NativePixelFormat, PixelLayout, classify},
    types::{CaptureError, FrameBuffer, FrameError, expected_len, try_alloc},
};

#[derive(Clone, Copy, Debug)]
enum Sample {
    U8,
    U16,
    F16,
    F32,
}

impl Sample {
    fn size(self) -> usize {
        match self {
            Sample::U8 => 1,
            Sample::U16 | Sample::F16 => 2,
            Sample::F32 => 4,
        }
    }

    fn to_u8(self, raw: &[u8]) -> u8 {
        match self {
            Sample::U8 => raw[0],
            Sample::U16 => raw[1],
            Sample::F16 => unit_to_u8(f16::from_bits(u16::from_le_bytes([raw[0], raw[1]])).to_f32()),
            Sample::F32 => unit_to_u8(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Encoding {
    /// Channels already in canonical order, each `Sample` wide.
    Interleaved(Sample),
    R5g6b5,
    Bgr5a1,
    A2bgr10,
    Rg11b10Float,
}

fn encoding(format: NativePixelFormat) -> Option<Encoding> {
    use NativePixelFormat::*;
    match format {
        R8 | Rgb8 | Rgba8 | Rgba8Uint | Argb8 | Bgra8 | Abgr8 => {
            Some(Encoding::Interleaved(Sample::U8))
        }
        R16 | Rgba16 | Abgr16 => Some(Encoding::Interleaved(Sample::U16)),
        Rgba16Float => Some(Encoding::Interleaved(Sample::F16)),
        Rgb32Float | Rgba32Float | Argb32Float => Some(Encoding::Interleaved(Sample::F32)),
        R5g6b5 => Some(Encoding::R5g6b5),
        Bgr5a1 => Some(Encoding::Bgr5a1),
        A2bgr10 => Some(Encoding::A2bgr10),
        Rg11b10Float => Some(Encoding::Rg11b10Float),
        Bc1 | Bc3 | Bc5 | Nv12 | Yuy2 | Depth32Float | Other(_) => None,
    }
}

/// Copy `raw` into a new canonical frame.
///
/// Formats that classify as `Unsupported` produce an `Unsupported` frame
/// holding a verbatim copy, so the decode stage can reject it explicitly.
pub fn normalize(
    format: NativePixelFormat,
    width: u32,
    height: u32,
    raw: &[u8],
) -> Result<FrameBuffer, CaptureError> {
    let layout = classify(format);
    let (Some(encoding), Some(src_bpp), Some(dst_bpp)) = (
        encoding(format),
        format.bytes_per_pixel(),
        layout.bytes_per_pixel(),
    ) else {
        let mut copy = try_alloc(raw.len())?;
        copy.extend_from_slice(raw);
        return Ok(FrameBuffer::new(width, height, PixelLayout::Unsupported, copy)?);
    };

    let expected = expected_len(width, height, src_bpp)?;
    if raw.len() != expected {
        return Err(FrameError::Length {
            width,
            height,
            layout,
            expected,
            actual: raw.len(),
        }
        .into());
    }

    let out_len = expected_len(width, height, dst_bpp)?;
    let mut out = try_alloc(out_len)?;
    match encoding {
        Encoding::Interleaved(Sample::U8) => out.extend_from_slice(raw),
        Encoding::Interleaved(sample) => {
            out.extend(raw.chunks_exact(sample.size()).map(|s| sample.to_u8(s)));
        }
        Encoding::R5g6b5 => {
            for px in raw.chunks_exact(2) {
                let word = u16::from_le_bytes([px[0], px[1]]) as u32;
                out.extend_from_slice(&[
                    expand(word >> 11, 5),
                    expand(word >> 5, 6),
                    expand(word, 5),
                ]);
            }
        }
        Encoding::Bgr5a1 => {
            for px in raw.chunks_exact(2) {
                let word = u16::from_le_bytes([px[0], px[1]]) as u32;
                out.extend_from_slice(&[
                    expand(word, 5),
                    expand(word >> 5, 5),
                    expand(word >> 10, 5),
                    expand(word >> 15, 1),
                ]);
            }
        }
        Encoding::A2bgr10 => {
            for px in raw.chunks_exact(4) {
                let word = u32::from_le_bytes([px[0], px[1], px[2], px[3]]);
                out.extend_from_slice(&[
                    expand(word >> 30, 2),
                    expand(word >> 20, 10),
                    expand(word >> 10, 10),
                    expand(word, 10),
                ]);
            }
        }
        Encoding::Rg11b10Float => {
            for px in raw.chunks_exact(4) {
                let word = u32::from_le_bytes([px[0], px[1], px[2], px[3]]);
                out.extend_from_slice(&[
                    unit_to_u8(small_float(word & 0x7ff, 6)),
                    unit_to_u8(small_float((word >> 11) & 0x7ff, 6)),
                    unit_to_u8(small_float(word >> 22, 5)),
                ]);
            }
        }
    }

    Ok(FrameBuffer::new(width, height, layout, out)?)
}

/// Widen the low `bits` of `value` to 8 bits by replicating the top bits.
fn expand(value: u32, bits: u32) -> u8 {
    let value = value & ((1 << bits) - 1);
    match bits {
        1 => (value * 0xff) as u8,
        2 => (value * 0x55) as u8,
        8 => value as u8,
        b @ 4..=7 => ((value << (8 - b)) | (value >> (2 * b - 8))) as u8,
        b if b > 8 => (value >> (b - 8)) as u8,
        _ => value as u8,
    }
}

/// Decode an unsigned float with a 5-bit exponent and `mantissa_bits` mantissa.
fn small_float(bits: u32, mantissa_bits: u32) -> f32 {
    let exponent = (bits >> mantissa_bits) & 0x1f;
    let mantissa = (bits & ((1 << mantissa_bits) - 1)) as f32 / (1u32 << mantissa_bits) as f32;
    match exponent {
        0 => mantissa * 2f32.powi(-14),
        31 if mantissa == 0.0 => f32::INFINITY,
        31 => f32::NAN,
        e => (1.0 + mantissa) * 2f32.powi(e as i32 - 15),
    }
}

fn unit_to_u8(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
