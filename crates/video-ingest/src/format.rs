//! Native pixel formats and their canonical channel layouts.
//!
//! Sources hand back frames in whatever format their render surface uses.
//! Decoders only understand a handful of 8-bit channel layouts, so every
//! native format is classified into exactly one [`PixelLayout`] through the
//! single table in [`classify`]. Anything not listed there is
//! [`PixelLayout::Unsupported`].

use std::fmt;

/// Canonical 8-bit channel layouts understood by the decode stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    /// One grey byte per pixel.
    Luminance,
    /// `r, g, b`.
    Rgb,
    /// `r, g, b, x`.
    RgbWithPadding,
    /// `x, r, g, b`.
    Xrgb,
    /// `b, g, r, x`.
    BgrWithPadding,
    /// `x, b, g, r`.
    Xbgr,
    /// No canonical mapping; frames in this layout are never decoded.
    Unsupported,
}

impl PixelLayout {
    /// Bytes per pixel of the canonical layout, `None` for `Unsupported`.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            PixelLayout::Luminance => Some(1),
            PixelLayout::Rgb => Some(3),
            PixelLayout::RgbWithPadding
            | PixelLayout::Xrgb
            | PixelLayout::BgrWithPadding
            | PixelLayout::Xbgr => Some(4),
            PixelLayout::Unsupported => None,
        }
    }

    pub fn is_supported(self) -> bool {
        !matches!(self, PixelLayout::Unsupported)
    }

    /// Byte offsets of the red, green and blue channels inside one pixel.
    pub(crate) fn rgb_offsets(self) -> Option<[usize; 3]> {
        match self {
            PixelLayout::Luminance => Some([0, 0, 0]),
            PixelLayout::Rgb | PixelLayout::RgbWithPadding => Some([0, 1, 2]),
            PixelLayout::Xrgb => Some([1, 2, 3]),
            PixelLayout::BgrWithPadding => Some([2, 1, 0]),
            PixelLayout::Xbgr => Some([3, 2, 1]),
            PixelLayout::Unsupported => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PixelLayout::Luminance => "lum",
            PixelLayout::Rgb => "rgb",
            PixelLayout::RgbWithPadding => "rgbx",
            PixelLayout::Xrgb => "xrgb",
            PixelLayout::BgrWithPadding => "bgrx",
            PixelLayout::Xbgr => "xbgr",
            PixelLayout::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for PixelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Pixel formats a video source may produce, named by byte order in memory.
///
/// Packed formats are little-endian words; their bit positions are listed on
/// each variant, lowest bits first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NativePixelFormat {
    /// 8-bit grey.
    R8,
    /// 16-bit grey.
    R16,
    Rgb8,
    Rgb32Float,
    /// `u32`: r (11-bit float) | g (11-bit float) | b (10-bit float).
    Rg11b10Float,
    /// `u16`: b (5) | g (6) | r (5).
    R5g6b5,
    Rgba8,
    Rgba8Uint,
    Rgba16,
    Rgba16Float,
    Rgba32Float,
    Argb8,
    Argb32Float,
    Bgra8,
    /// `u16`: b (5) | g (5) | r (5) | a (1).
    Bgr5a1,
    Abgr8,
    Abgr16,
    /// `u32`: r (10) | g (10) | b (10) | a (2).
    A2bgr10,
    /// Block-compressed, 4 bits per pixel.
    Bc1,
    /// Block-compressed, 8 bits per pixel.
    Bc3,
    /// Block-compressed two-channel normal maps.
    Bc5,
    /// Planar 4:2:0 luma + interleaved chroma.
    Nv12,
    /// Packed 4:2:2 luma/chroma.
    Yuy2,
    Depth32Float,
    /// Any identifier the capture backend reports that has no name here.
    Other(u32),
}

impl NativePixelFormat {
    /// Every named format, in identifier order.
    pub const NAMED: [NativePixelFormat; 24] = [
        NativePixelFormat::R8,
        NativePixelFormat::R16,
        NativePixelFormat::Rgb8,
        NativePixelFormat::Rgb32Float,
        NativePixelFormat::Rg11b10Float,
        NativePixelFormat::R5g6b5,
        NativePixelFormat::Rgba8,
        NativePixelFormat::Rgba8Uint,
        NativePixelFormat::Rgba16,
        NativePixelFormat::Rgba16Float,
        NativePixelFormat::Rgba32Float,
        NativePixelFormat::Argb8,
        NativePixelFormat::Argb32Float,
        NativePixelFormat::Bgra8,
        NativePixelFormat::Bgr5a1,
        NativePixelFormat::Abgr8,
        NativePixelFormat::Abgr16,
        NativePixelFormat::A2bgr10,
        NativePixelFormat::Bc1,
        NativePixelFormat::Bc3,
        NativePixelFormat::Bc5,
        NativePixelFormat::Nv12,
        NativePixelFormat::Yuy2,
        NativePixelFormat::Depth32Float,
    ];

    /// Map a backend format identifier onto a named format.
    ///
    /// Identifiers are indices into [`NativePixelFormat::NAMED`]; anything
    /// else is kept verbatim as [`NativePixelFormat::Other`].
    pub fn from_id(id: u32) -> Self {
        usize::try_from(id)
            .ok()
            .and_then(|index| Self::NAMED.get(index).copied())
            .unwrap_or(NativePixelFormat::Other(id))
    }

    /// Storage size of one pixel as the source lays it out, when it has a
    /// fixed per-pixel size.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        use NativePixelFormat::*;
        match self {
            R8 => Some(1),
            R16 | R5g6b5 | Bgr5a1 | Yuy2 => Some(2),
            Rgb8 => Some(3),
            Rgba8 | Rgba8Uint | Argb8 | Bgra8 | Abgr8 | A2bgr10 | Rg11b10Float | Depth32Float => {
                Some(4)
            }
            Rgba16 | Rgba16Float | Abgr16 => Some(8),
            Rgb32Float => Some(12),
            Rgba32Float | Argb32Float => Some(16),
            Bc1 | Bc3 | Bc5 | Nv12 | Other(_) => None,
        }
    }

    /// Canonical layout of this format; shorthand for [`classify`].
    pub fn layout(self) -> PixelLayout {
        classify(self)
    }
}

/// Classify a native format into its canonical layout.
///
/// Total: every format maps to exactly one layout, with `Unsupported` for
/// compressed, planar, depth, and unknown formats.
pub fn classify(format: NativePixelFormat) -> PixelLayout {
    use NativePixelFormat::*;
    match format {
        R8 | R16 => PixelLayout::Luminance,
        Rgb8 | Rgb32Float | Rg11b10Float | R5g6b5 => PixelLayout::Rgb,
        Rgba8 | Rgba8Uint | Rgba16 | Rgba16Float | Rgba32Float => PixelLayout::RgbWithPadding,
        Argb8 | Argb32Float => PixelLayout::Xrgb,
        Bgra8 | Bgr5a1 => PixelLayout::BgrWithPadding,
        Abgr8 | Abgr16 | A2bgr10 => PixelLayout::Xbgr,
        Bc1 | Bc3 | Bc5 | Nv12 | Yuy2 | Depth32Float | Other(_) => PixelLayout::Unsupported,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_named_format_classifies() {
        for format in NativePixelFormat::NAMED {
            let layout = classify(format);
            if layout.is_supported() {
                assert!(
                    format.bytes_per_pixel().is_some(),
                    "{format:?} maps to {layout} but has no pixel size"
                );
            }
        }
    }

    #[test]
    fn identifiers_round_trip_and_unknown_ids_are_unsupported() {
        for (id, format) in NativePixelFormat::NAMED.iter().enumerate() {
            assert_eq!(NativePixelFormat::from_id(id as u32), *format);
        }
        for id in [24, 25, 1_000, u32::MAX] {
            let format = NativePixelFormat::from_id(id);
            assert_eq!(format, NativePixelFormat::Other(id));
            assert_eq!(classify(format), PixelLayout::Unsupported);
        }
    }

    #[test]
    fn mapping_table_matches_channel_order() {
        assert_eq!(classify(NativePixelFormat::R16), PixelLayout::Luminance);
        assert_eq!(classify(NativePixelFormat::R5g6b5), PixelLayout::Rgb);
        assert_eq!(classify(NativePixelFormat::Rgba16Float), PixelLayout::RgbWithPadding);
        assert_eq!(classify(NativePixelFormat::Argb32Float), PixelLayout::Xrgb);
        assert_eq!(classify(NativePixelFormat::Bgr5a1), PixelLayout::BgrWithPadding);
        assert_eq!(classify(NativePixelFormat::A2bgr10), PixelLayout::Xbgr);
        assert_eq!(classify(NativePixelFormat::Nv12), PixelLayout::Unsupported);
        assert_eq!(classify(NativePixelFormat::Depth32Float), PixelLayout::Unsupported);
    }

    #[test]
    fn padded_layouts_place_rgb_after_or_before_padding() {
        assert_eq!(PixelLayout::Xrgb.rgb_offsets(), Some([1, 2, 3]));
        assert_eq!(PixelLayout::BgrWithPadding.rgb_offsets(), Some([2, 1, 0]));
        assert_eq!(PixelLayout::Xbgr.rgb_offsets(), Some([3, 2, 1]));
        assert_eq!(PixelLayout::Unsupported.bytes_per_pixel(), None);
    }
}
