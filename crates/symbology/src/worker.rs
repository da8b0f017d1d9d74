//! Decode stage of the sampling cycle.
//!
//! The worker screens the frame layout before handing anything to the
//! backend: frames in [`PixelLayout::Unsupported`] never reach the decoder.
//! The frame is released when the worker returns, whatever the outcome.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use thiserror::Error;
use tracing::{debug, warn};
use video_ingest::{FrameBuffer, ImageView, PixelLayout, exec::panic_message};

use crate::{
    decoder::{DecodeError, SymbolDecoder},
    options::DecodeOptions,
    symbol::SymbolResult,
};

/// Why a frame produced no decode attempt or a failed one.
#[derive(Debug, Error)]
pub enum DecodeAbort {
    #[error("frame layout has no canonical mapping")]
    UnsupportedFormat,
    #[error(transparent)]
    Failed(#[from] DecodeError),
}

#[derive(Clone)]
pub struct DecodeWorker {
    decoder: Arc<dyn SymbolDecoder>,
    options: DecodeOptions,
}

impl DecodeWorker {
    pub fn new(decoder: Arc<dyn SymbolDecoder>, options: DecodeOptions) -> Self {
        Self { decoder, options }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Decode `frame`, consuming it.
    ///
    /// Unsupported layouts and backend failures come back as errors so the
    /// caller can tell them apart from an honest empty result.
    pub fn try_decode(&self, frame: FrameBuffer) -> Result<Vec<SymbolResult>, DecodeAbort> {
        if frame.layout() == PixelLayout::Unsupported {
            debug!(
                width = frame.width(),
                height = frame.height(),
                "skipping frame without a canonical layout"
            );
            return Err(DecodeAbort::UnsupportedFormat);
        }
        let view = frame.view().map_err(DecodeError::from)?;
        let symbols = self.decode_view(&view)?;
        drop(frame);
        Ok(symbols)
    }

    /// Decode `frame`, treating every failure as "nothing found".
    pub fn decode(&self, frame: FrameBuffer) -> Vec<SymbolResult> {
        match self.try_decode(frame) {
            Ok(symbols) => symbols,
            Err(DecodeAbort::UnsupportedFormat) => Vec::new(),
            Err(DecodeAbort::Failed(err)) => {
                warn!("decode failed: {err}");
                Vec::new()
            }
        }
    }

    /// Run the backend on a borrowed view. A panicking backend is reported
    /// as [`DecodeError::Backend`].
    pub fn decode_view(&self, view: &ImageView<'_>) -> Result<Vec<SymbolResult>, DecodeError> {
        let decoder = self.decoder.as_ref();
        let options = &self.options;
        panic::catch_unwind(AssertUnwindSafe(|| decoder.read_symbols(view, options)))
            .unwrap_or_else(|payload| {
                Err(DecodeError::Backend(format!(
                    "decoder panicked: {}",
                    panic_message(payload.as_ref())
                )))
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::symbol::{BarcodeFormat, Quadrilateral};

    #[derive(Default)]
    struct Spy {
        calls: AtomicUsize,
        panic: bool,
    }

    impl SymbolDecoder for Spy {
        fn read_symbols(
            &self,
            view: &ImageView<'_>,
            _options: &DecodeOptions,
        ) -> Result<Vec<SymbolResult>, DecodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic {
                panic!("backend exploded");
            }
            Ok(vec![SymbolResult::from_payload(
                BarcodeFormat::Code128,
                format!("{}x{}", view.width(), view.height()).into_bytes(),
                Quadrilateral::default(),
            )])
        }
    }

    fn worker(spy: &Arc<Spy>) -> DecodeWorker {
        DecodeWorker::new(spy.clone(), DecodeOptions::default())
    }

    #[test]
    fn unsupported_frames_never_reach_the_decoder() {
        let spy = Arc::new(Spy::default());
        let frame = FrameBuffer::new(4, 4, PixelLayout::Unsupported, vec![1u8; 7]).unwrap();
        assert!(matches!(
            worker(&spy).try_decode(frame),
            Err(DecodeAbort::UnsupportedFormat)
        ));
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn supported_frames_are_decoded() {
        let spy = Arc::new(Spy::default());
        let frame = FrameBuffer::new(3, 2, PixelLayout::Rgb, vec![0u8; 18]).unwrap();
        let symbols = worker(&spy).decode(frame);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].text(), "3x2");
        assert_eq!(spy.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_backend_becomes_an_empty_result() {
        let spy = Arc::new(Spy {
            panic: true,
            ..Spy::default()
        });
        let worker = worker(&spy);
        let frame = FrameBuffer::new(1, 1, PixelLayout::Luminance, vec![0u8]).unwrap();
        assert!(matches!(
            worker.try_decode(frame),
            Err(DecodeAbort::Failed(DecodeError::Backend(_)))
        ));
        let frame = FrameBuffer::new(1, 1, PixelLayout::Luminance, vec![0u8]).unwrap();
        assert!(worker.decode(frame).is_empty());
    }
}
