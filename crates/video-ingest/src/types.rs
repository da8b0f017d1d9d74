use std::fmt;

use anyhow::Error;
use chrono::Utc;
use thiserror::Error;

use crate::{format::PixelLayout, view::ImageView};

/// Memory holding the pixels of one captured frame.
///
/// A [`FrameBuffer`] owns its storage exclusively; dropping the frame drops
/// the storage, which is the single release of whatever backs it.
pub trait PixelStorage: Send + 'static {
    fn bytes(&self) -> &[u8];
}

impl PixelStorage for Vec<u8> {
    fn bytes(&self) -> &[u8] {
        self
    }
}

impl PixelStorage for Box<[u8]> {
    fn bytes(&self) -> &[u8] {
        self
    }
}

/// CPU-readable copy of a sampled frame in a canonical layout.
pub struct FrameBuffer {
    width: u32,
    height: u32,
    layout: PixelLayout,
    timestamp_ms: i64,
    storage: Box<dyn PixelStorage>,
}

impl FrameBuffer {
    /// Wrap `storage` as a `width` x `height` frame.
    ///
    /// For supported layouts the storage must hold exactly
    /// `width * height * bytes_per_pixel` bytes. `Unsupported` frames carry
    /// the raw bytes unchecked; they are never decoded.
    pub fn new(
        width: u32,
        height: u32,
        layout: PixelLayout,
        storage: impl PixelStorage,
    ) -> Result<Self, FrameError> {
        if let Some(bytes_per_pixel) = layout.bytes_per_pixel() {
            let expected = expected_len(width, height, bytes_per_pixel)?;
            let actual = storage.bytes().len();
            if actual != expected {
                return Err(FrameError::Length {
                    width,
                    height,
                    layout,
                    expected,
                    actual,
                });
            }
        }

        Ok(Self {
            width,
            height,
            layout,
            timestamp_ms: Utc::now().timestamp_millis(),
            storage: Box::new(storage),
        })
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

    /// Wall-clock capture time in milliseconds since the Unix epoch.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub fn bytes(&self) -> &[u8] {
        self.storage.bytes()
    }

    /// Borrow the frame as a canonical image view.
    pub fn view(&self) -> Result<ImageView<'_>, FrameError> {
        ImageView::new(self.bytes(), self.width, self.height, self.layout)
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .field("timestamp_ms", &self.timestamp_ms)
            .field("len", &self.bytes().len())
            .finish()
    }
}

pub(crate) fn expected_len(
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Result<usize, FrameError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(bytes_per_pixel))
        .ok_or(FrameError::Overflow { width, height })
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error(
        "frame buffer holds {actual} bytes, expected {expected} for {width}x{height} {layout}"
    )]
    Length {
        width: u32,
        height: u32,
        layout: PixelLayout,
        expected: usize,
        actual: usize,
    },
    #[error("frame dimensions {width}x{height} overflow the addressable size")]
    Overflow { width: u32, height: u32 },
    #[error("pixel layout {0} has no canonical image view")]
    UnsupportedLayout(PixelLayout),
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("video source {name:?} is not ready for capture")]
    Unavailable { name: String },
    #[error("failed to allocate {bytes} bytes for a captured frame")]
    Allocation { bytes: usize },
    #[error("execution context {context:?} is no longer accepting work")]
    ContextClosed { context: String },
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("failed to read pixels back from the source: {0}")]
    ReadFailed(#[from] Error),
}

/// Allocate an empty buffer able to hold `bytes` without reallocating.
pub(crate) fn try_alloc(bytes: usize) -> Result<Vec<u8>, CaptureError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(bytes)
        .map_err(|_| CaptureError::Allocation { bytes })?;
    Ok(buffer)
}
