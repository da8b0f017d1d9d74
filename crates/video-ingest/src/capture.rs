//! Snapshot of the live frame into CPU memory.
//!
//! The surface read happens on the render context. The resulting
//! [`FrameBuffer`] is a normalized copy, so the live surface and the render
//! target are free to be reused as soon as the read returns, and it is handed
//! to the continuation on the hand-off context.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use tracing::{Span, debug};

use crate::{
    exec::{Compute, Context, Render},
    normalize::normalize,
    source::{RenderTarget, VideoSource},
    types::{CaptureError, FrameBuffer},
};

pub struct FrameCapture {
    source: Arc<dyn VideoSource>,
    target: Arc<Mutex<RenderTarget>>,
    render: Context<Render>,
    handoff: Context<Compute>,
}

impl FrameCapture {
    pub fn new(
        source: Arc<dyn VideoSource>,
        render: Context<Render>,
        handoff: Context<Compute>,
    ) -> Self {
        Self {
            source,
            target: Arc::new(Mutex::new(RenderTarget::new())),
            render,
            handoff,
        }
    }

    pub fn source(&self) -> &Arc<dyn VideoSource> {
        &self.source
    }

    /// Stop waiting on both contexts when the capture is dropped.
    pub fn detach(&self) {
        self.render.detach();
        self.handoff.detach();
    }

    /// Snapshot the current frame.
    ///
    /// On success `on_ready` runs on the hand-off context with the frame.
    /// When the source is not capturable or the read fails, `on_ready` never
    /// runs and `on_abort` receives the error instead. `state` travels with
    /// whichever continuation fires; if neither can run it is dropped.
    ///
    /// Returns an error only when the render context refused the job, in
    /// which case neither continuation runs.
    pub fn capture_frame<S, R, A>(
        &self,
        state: S,
        on_ready: R,
        on_abort: A,
    ) -> Result<(), CaptureError>
    where
        S: Send + 'static,
        R: FnOnce(FrameBuffer, S) + Send + 'static,
        A: FnOnce(CaptureError, S) + Send + 'static,
    {
        let source = Arc::clone(&self.source);
        let target = Arc::clone(&self.target);
        let handoff = self.handoff.clone();
        let span = Span::current();

        self.render
            .post(move || {
                let _entered = span.enter();
                let started = Instant::now();
                match read_frame(source.as_ref(), &target) {
                    Ok(frame) => {
                        debug!(
                            width = frame.width(),
                            height = frame.height(),
                            layout = %frame.layout(),
                            timestamp_ms = frame.timestamp_ms(),
                            elapsed_us = started.elapsed().as_micros() as u64,
                            "frame captured"
                        );
                        let ready_span = span.clone();
                        let posted = handoff.post(move || {
                            let _entered = ready_span.enter();
                            on_ready(frame, state);
                        });
                        if let Err(closed) = posted {
                            debug!("hand-off context {:?} closed; frame dropped", closed.name);
                        }
                    }
                    Err(err) => on_abort(err, state),
                }
            })
            .map_err(|closed| CaptureError::ContextClosed {
                context: closed.name,
            })
    }
}

/// Read the source into the render target and copy it out as a canonical frame.
fn read_frame(
    source: &dyn VideoSource,
    target: &Mutex<RenderTarget>,
) -> Result<FrameBuffer, CaptureError> {
    if !source.is_capturable() {
        return Err(CaptureError::Unavailable {
            name: source.display_name().to_string(),
        });
    }

    let mut target = target.lock().unwrap_or_else(PoisonError::into_inner);
    target.init_auto_format(source.width(), source.height(), source.pixel_format())?;
    let result = source.read_pixels(&mut target).and_then(|()| {
        normalize(
            target.format(),
            target.width(),
            target.height(),
            target.pixels(),
        )
    });
    target.clear();
    result
}
