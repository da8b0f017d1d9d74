//! The public entry point: a reader driven by an external per-frame tick.
//!
//! `tick` and `pump` must be called from the thread that owns the reader.
//! That thread is the only one that touches the scheduler state and the
//! subscribers; capture and decode run on the render and compute contexts
//! and come back as [`CycleReport`]s over a channel.

use std::{
    io,
    sync::Arc,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use symbology::{DecodeAbort, DecodeWorker, SymbolDecoder, SymbolResult};
use tracing::{debug, info_span, warn};
use video_ingest::{
    Compute, Context, FrameBuffer, FrameCapture, Render, SourceEvent, VideoSource,
};

use crate::{
    config::{ConfigError, ScannerConfig},
    cycle::{CycleCompletion, CycleError, CycleOutcome, CycleReport},
    reporter::{ResultReporter, SubscriberId},
    scheduler::{SampleScheduler, SchedulerState, TickDecision},
    watchdog::StallWatchdog,
};

/// The two contexts a reader hops between.
#[derive(Clone, Debug)]
pub struct ReaderContexts {
    pub render: Context<Render>,
    pub compute: Context<Compute>,
}

impl ReaderContexts {
    /// One dedicated worker thread per context, named `{prefix}-render` and
    /// `{prefix}-compute`.
    pub fn threaded(prefix: &str) -> io::Result<Self> {
        Ok(Self {
            render: Context::threaded(prefix)?,
            compute: Context::threaded(prefix)?,
        })
    }

    /// Run every stage on the ticking thread, inside the `tick` call.
    pub fn inline() -> Self {
        Self {
            render: Context::inline(),
            compute: Context::inline(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub ticks: u64,
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub symbols_reported: u64,
    pub unavailable: u64,
}

pub struct BarcodeReader {
    config: ScannerConfig,
    scheduler: SampleScheduler,
    capture: FrameCapture,
    worker: DecodeWorker,
    reporter: ResultReporter,
    watchdog: StallWatchdog,
    reports_tx: Sender<CycleReport>,
    reports_rx: Receiver<CycleReport>,
    stats: ReaderStats,
}

impl BarcodeReader {
    pub fn new(
        config: ScannerConfig,
        source: Arc<dyn VideoSource>,
        decoder: Arc<dyn SymbolDecoder>,
        contexts: ReaderContexts,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (reports_tx, reports_rx) = unbounded();
        Ok(Self {
            scheduler: SampleScheduler::new(config.tick_threshold),
            capture: FrameCapture::new(source, contexts.render, contexts.compute),
            worker: DecodeWorker::new(decoder, config.decode),
            reporter: ResultReporter::new(),
            watchdog: StallWatchdog::new(config.stall_warning),
            reports_tx,
            reports_rx,
            stats: ReaderStats::default(),
            config,
        })
    }

    /// Advance the sampling loop by one tick. Never blocks.
    ///
    /// Finished cycles are reported before the tick is counted, so a cycle
    /// that completed since the last tick frees the scheduler for this one.
    pub fn tick(&mut self) -> TickDecision {
        self.pump();
        self.stats.ticks += 1;
        self.watchdog.observe(Instant::now());

        let source = Arc::clone(self.capture.source());
        let decision = self.scheduler.tick(|| source.is_capturable());
        match decision {
            TickDecision::Sample(cycle) => {
                self.start_cycle(cycle);
                self.pump();
            }
            TickDecision::Unavailable => {
                self.stats.unavailable += 1;
                metrics::counter!("scanner_cycles_total", "outcome" => "capture_unavailable")
                    .increment(1);
                debug!(source = source.display_name(), "source not capturable; sample skipped");
            }
            TickDecision::Busy => debug!("previous cycle still in flight; sample skipped"),
            TickDecision::Wait => {}
        }
        decision
    }

    /// Deliver every finished cycle. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(report) = self.reports_rx.try_recv() {
            self.handle_report(report);
            handled += 1;
        }
        handled
    }

    /// Block until the in-flight cycle, if any, has finished and been
    /// reported. Meant for shutdown; returns `false` on timeout.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.pump();
        while !self.scheduler.is_idle() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.reports_rx.recv_timeout(remaining) {
                Ok(report) => self.handle_report(report),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return false,
            }
        }
        true
    }

    /// Drop the reader without joining its worker threads. For shutdown
    /// after [`wait_idle`](Self::wait_idle) timed out on a stuck cycle; the
    /// cycle is left to finish or die with the process.
    pub fn detach_workers(&self) {
        self.capture.detach();
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriberId
    where
        F: FnMut(&[SymbolResult]) + Send + 'static,
    {
        self.reporter.subscribe(callback)
    }

    pub fn subscribe_channel(&mut self) -> (SubscriberId, Receiver<Vec<SymbolResult>>) {
        self.reporter.subscribe_channel()
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.reporter.unsubscribe(id)
    }

    /// Log a lifecycle notification from the media source.
    pub fn on_source_event(&self, event: &SourceEvent) {
        event.log(self.capture.source().display_name());
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn source(&self) -> &Arc<dyn VideoSource> {
        self.capture.source()
    }

    fn start_cycle(&mut self, cycle: u64) {
        let started = Instant::now();
        self.stats.cycles_started += 1;
        self.watchdog.arm(cycle, started);

        let span = info_span!("scanner.cycle", cycle);
        let _entered = span.enter();
        debug!("sampling cycle started");

        let completion = CycleCompletion::new(cycle, started, self.reports_tx.clone());
        let worker = self.worker.clone();
        let requested = self.capture.capture_frame(
            completion,
            move |frame, completion| decode_stage(&worker, frame, completion),
            |err, completion| completion.complete(CycleOutcome::Failed(err.into())),
        );
        if let Err(err) = requested {
            // The completion went down with the rejected job and has
            // already reported the cycle as abandoned.
            warn!("capture could not be scheduled: {err}");
        }
    }

    fn handle_report(&mut self, report: CycleReport) {
        let CycleReport {
            cycle,
            outcome,
            elapsed,
        } = report;
        metrics::counter!("scanner_cycles_total", "outcome" => outcome.label()).increment(1);
        metrics::histogram!("scanner_stage_latency_seconds", "stage" => "cycle")
            .record(elapsed.as_secs_f64());

        match outcome {
            CycleOutcome::Decoded(symbols) => {
                let count = symbols.len() as u64;
                debug!(cycle, symbols = count, "cycle decoded symbols");
                metrics::counter!("scanner_symbols_total").increment(count);
                self.stats.symbols_reported += count;
                self.reporter.report(symbols);
            }
            CycleOutcome::Empty => debug!(cycle, "cycle found no symbols"),
            CycleOutcome::Failed(CycleError::Abandoned) => {
                warn!(cycle, "cycle abandoned before reaching an outcome")
            }
            CycleOutcome::Failed(err) => debug!(cycle, "cycle aborted: {err}"),
        }

        if self.scheduler.finish(cycle) {
            self.watchdog.disarm();
            self.stats.cycles_completed += 1;
        } else {
            debug!(cycle, "report for a cycle that is not in flight ignored");
        }
    }
}

/// Runs on the compute context with exclusive ownership of the frame.
fn decode_stage(worker: &DecodeWorker, frame: FrameBuffer, completion: CycleCompletion) {
    metrics::histogram!("scanner_stage_latency_seconds", "stage" => "capture")
        .record(completion.started().elapsed().as_secs_f64());

    let decode_started = Instant::now();
    let outcome = match worker.try_decode(frame) {
        Ok(symbols) => CycleOutcome::from(symbols),
        Err(DecodeAbort::UnsupportedFormat) => CycleOutcome::Failed(CycleError::UnsupportedFormat),
        Err(DecodeAbort::Failed(err)) => {
            warn!(cycle = completion.cycle(), "decode failed; treating as empty: {err}");
            CycleOutcome::Empty
        }
    };
    metrics::histogram!("scanner_stage_latency_seconds", "stage" => "decode")
        .record(decode_started.elapsed().as_secs_f64());
    completion.complete(outcome);
}
