//! Live video sources and the render target frames are read back through.

use tracing::{error, info, warn};

use crate::{
    format::NativePixelFormat,
    types::{CaptureError, expected_len, try_alloc},
};

/// A camera or media stream whose current frame can be read back to the CPU.
///
/// Status queries may be called from any thread. [`VideoSource::read_pixels`]
/// is only ever called from the render context.
pub trait VideoSource: Send + Sync {
    /// Human readable name used in logs.
    fn display_name(&self) -> &str;

    fn is_playing(&self) -> bool;

    /// Whether the backing surface has been created and holds a frame.
    fn surface_ready(&self) -> bool;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Format the surface is rasterized in.
    fn pixel_format(&self) -> NativePixelFormat;

    /// Rasterize the current frame into `target`.
    ///
    /// The target has already been sized for the source's current dimensions
    /// and format; sources that emit variable-size data may resize its pixel
    /// vector themselves.
    fn read_pixels(&self, target: &mut RenderTarget) -> Result<(), CaptureError>;

    /// Playing, with a live surface of non-zero size.
    fn is_capturable(&self) -> bool {
        self.is_playing() && self.surface_ready() && self.width() > 0 && self.height() > 0
    }
}

/// Reusable surface the live view is rasterized into before readback.
#[derive(Debug)]
pub struct RenderTarget {
    width: u32,
    height: u32,
    format: NativePixelFormat,
    pixels: Vec<u8>,
}

impl Default for RenderTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderTarget {
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            format: NativePixelFormat::Rgba8,
            pixels: Vec::new(),
        }
    }

    /// Resize the target for a `width` x `height` surface in `format`.
    ///
    /// Pixel storage is zeroed to the format's size, or left empty when the
    /// format has no fixed per-pixel size.
    pub fn init_auto_format(
        &mut self,
        width: u32,
        height: u32,
        format: NativePixelFormat,
    ) -> Result<(), CaptureError> {
        let len = match format.bytes_per_pixel() {
            Some(bytes_per_pixel) => expected_len(width, height, bytes_per_pixel)?,
            None => 0,
        };
        if self.pixels.capacity() < len {
            let mut fresh = try_alloc(len)?;
            fresh.resize(len, 0);
            self.pixels = fresh;
        } else {
            self.pixels.clear();
            self.pixels.resize(len, 0);
        }
        self.width = width;
        self.height = height;
        self.format = format;
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> NativePixelFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut Vec<u8> {
        &mut self.pixels
    }

    /// Discard the frame contents, keeping the allocation for the next read.
    pub fn clear(&mut self) {
        self.pixels.clear();
    }
}

/// Lifecycle notifications raised by a media source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceEvent {
    Opened { url: String },
    OpenFailed { url: String },
    EndReached,
    PlaybackSuspended,
}

impl SourceEvent {
    pub fn log(&self, source: &str) {
        match self {
            SourceEvent::Opened { url } => info!(source, "media opened: {url}"),
            SourceEvent::OpenFailed { url } => error!(source, "media failed to open: {url}"),
            SourceEvent::EndReached => warn!(source, "media end reached"),
            SourceEvent::PlaybackSuspended => warn!(source, "media playback suspended"),
        }
    }
}
