use crate::{
    format::PixelLayout,
    types::{FrameError, expected_len},
};

/// Borrowed pixels plus the descriptor a decoder needs to read them.
#[derive(Clone, Copy, Debug)]
pub struct ImageView<'a> {
    bytes: &'a [u8],
    width: u32,
    height: u32,
    layout: PixelLayout,
}

impl<'a> ImageView<'a> {
    pub fn new(
        bytes: &'a [u8],
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<Self, FrameError> {
        let bytes_per_pixel = layout
            .bytes_per_pixel()
            .ok_or(FrameError::UnsupportedLayout(layout))?;
        let expected = expected_len(width, height, bytes_per_pixel)?;
        if bytes.len() != expected {
            return Err(FrameError::Length {
                width,
                height,
                layout,
                expected,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bytes,
            width,
            height,
            layout,
        })
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Grey value of the pixel at (`x`, `y`) using BT.601 integer weights.
    ///
    /// Out-of-range coordinates read as white.
    pub fn luminance(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return u8::MAX;
        }
        let Some(bytes_per_pixel) = self.layout.bytes_per_pixel() else {
            return u8::MAX;
        };
        let offset = (y as usize * self.width as usize + x as usize) * bytes_per_pixel;
        self.luminance_at(offset)
    }

    /// Convert the whole view to a row-major grey image.
    pub fn to_luma(&self) -> Vec<u8> {
        let Some(bytes_per_pixel) = self.layout.bytes_per_pixel() else {
            return Vec::new();
        };
        if self.layout == PixelLayout::Luminance {
            return self.bytes.to_vec();
        }
        (0..self.bytes.len())
            .step_by(bytes_per_pixel)
            .map(|offset| self.luminance_at(offset))
            .collect()
    }

    fn luminance_at(&self, offset: usize) -> u8 {
        let Some([r, g, b]) = self.layout.rgb_offsets() else {
            return u8::MAX;
        };
        if self.layout == PixelLayout::Luminance {
            return self.bytes[offset];
        }
        let r = self.bytes[offset + r] as u32;
        let g = self.bytes[offset + g] as u32;
        let b = self.bytes[offset + b] as u32;
        ((r * 77 + g * 150 + b * 29) >> 8) as u8
    }
}
