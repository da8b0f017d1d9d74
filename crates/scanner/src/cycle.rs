//! One sampling cycle: its terminal outcomes and the handle that reports them.

use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use symbology::SymbolResult;
use thiserror::Error;
use tracing::debug;
use video_ingest::CaptureError;

/// Terminal failures of a cycle. None of them stop the sampling loop.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("frame pixel format has no canonical layout")]
    UnsupportedFormat,
    #[error("source {source_name:?} was not ready at sample time")]
    CaptureUnavailable { source_name: String },
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("could not allocate {bytes} bytes for the frame")]
    ResourceExhaustion { bytes: usize },
    #[error("cycle ended without an outcome")]
    Abandoned,
}

impl CycleError {
    pub fn label(&self) -> &'static str {
        match self {
            CycleError::UnsupportedFormat => "unsupported_format",
            CycleError::CaptureUnavailable { .. } => "capture_unavailable",
            CycleError::CaptureFailed(_) => "capture_failed",
            CycleError::ResourceExhaustion { .. } => "resource_exhaustion",
            CycleError::Abandoned => "abandoned",
        }
    }
}

impl From<CaptureError> for CycleError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::Unavailable { name } => CycleError::CaptureUnavailable { source_name: name },
            CaptureError::Allocation { bytes } => CycleError::ResourceExhaustion { bytes },
            CaptureError::ContextClosed { .. } => CycleError::Abandoned,
            other => CycleError::CaptureFailed(other.to_string()),
        }
    }
}

#[derive(Debug)]
pub enum CycleOutcome {
    Decoded(Vec<SymbolResult>),
    Empty,
    Failed(CycleError),
}

impl CycleOutcome {
    /// Value of the `outcome` label on `scanner_cycles_total`.
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Decoded(_) => "decoded",
            CycleOutcome::Empty => "empty",
            CycleOutcome::Failed(err) => err.label(),
        }
    }
}

impl From<Vec<SymbolResult>> for CycleOutcome {
    fn from(symbols: Vec<SymbolResult>) -> Self {
        if symbols.is_empty() {
            CycleOutcome::Empty
        } else {
            CycleOutcome::Decoded(symbols)
        }
    }
}

#[derive(Debug)]
pub struct CycleReport {
    pub cycle: u64,
    pub outcome: CycleOutcome,
    pub elapsed: Duration,
}

/// Travels by value through every stage of one cycle.
///
/// Exactly one report is sent per cycle: either through
/// [`CycleCompletion::complete`] or, if the handle is dropped first, as
/// [`CycleError::Abandoned`].
#[derive(Debug)]
pub(crate) struct CycleCompletion {
    cycle: u64,
    started: Instant,
    tx: Option<Sender<CycleReport>>,
}

impl CycleCompletion {
    pub(crate) fn new(cycle: u64, started: Instant, tx: Sender<CycleReport>) -> Self {
        Self {
            cycle,
            started,
            tx: Some(tx),
        }
    }

    pub(crate) fn cycle(&self) -> u64 {
        self.cycle
    }

    pub(crate) fn started(&self) -> Instant {
        self.started
    }

    pub(crate) fn complete(mut self, outcome: CycleOutcome) {
        self.send(outcome);
    }

    fn send(&mut self, outcome: CycleOutcome) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        let report = CycleReport {
            cycle: self.cycle,
            outcome,
            elapsed: self.started.elapsed(),
        };
        if tx.send(report).is_err() {
            debug!(cycle = self.cycle, "reader gone; cycle report discarded");
        }
    }
}

impl Drop for CycleCompletion {
    fn drop(&mut self) {
        self.send(CycleOutcome::Failed(CycleError::Abandoned));
    }
}
