//! Frame acquisition for the barcode sampling pipeline.
//!
//! - `format`: native pixel formats and their canonical layouts.
//! - `normalize`: conversion of native pixels into canonical 8-bit frames.
//! - `types`: owned frame buffers and capture errors.
//! - `view`: borrowed canonical image views handed to decoders.
//! - `source`: the video source abstraction and its render target.
//! - `capture`: render-context snapshot of the current frame.
//! - `exec`: execution contexts the pipeline hops between.

pub mod capture;
pub mod exec;
pub mod format;
pub mod normalize;
pub mod source;
pub mod types;
pub mod view;

pub use capture::FrameCapture;
pub use exec::{Compute, Context, ContextClosed, Executor, Render};
pub use format::{NativePixelFormat, PixelLayout, classify};
pub use normalize::normalize;
pub use source::{RenderTarget, SourceEvent, VideoSource};
pub use types::{CaptureError, FrameBuffer, FrameError, PixelStorage};
pub use view::ImageView;
