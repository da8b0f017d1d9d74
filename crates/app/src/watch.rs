//! `qrscan watch`: tick a reader over a still-image source until the images
//! run out, the tick budget is spent, or Ctrl+C.

use std::{
    io::{self, Write},
    sync::{
        Arc, Once,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use scanner::{BarcodeReader, ReaderContexts};
use serde::Serialize;
use symbology::{QrDecoder, SymbolResult};
use tracing::{info, info_span, warn};
use video_ingest::SourceEvent;

use crate::{cli::WatchConfig, still::StillImageSource, telemetry};

/// How long shutdown waits for the cycle in flight.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct ReportLine<'a> {
    timestamp: String,
    frame: usize,
    image: Option<String>,
    symbols: &'a [SymbolResult],
}

pub fn run(config: WatchConfig) -> Result<()> {
    static CTRL_HANDLER: Once = Once::new();

    let _telemetry_guard = telemetry::enter_runtime(&config.telemetry);
    if let Some(addr) = config.telemetry.metrics_addr {
        telemetry::init_metrics(addr)?;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_shutdown = shutdown.clone();
    CTRL_HANDLER.call_once(move || {
        if let Err(err) = ctrlc::set_handler(move || {
            handler_shutdown.store(true, Ordering::SeqCst);
        }) {
            warn!("Failed to install Ctrl+C handler: {err}");
        }
    });

    let source = Arc::new(StillImageSource::open(
        &config.images,
        config.format,
        config.looping,
    )?);
    let contexts = ReaderContexts::threaded("qrscan").context("failed to start worker threads")?;
    let mut reader = BarcodeReader::new(
        config.scanner.clone(),
        source.clone(),
        Arc::new(QrDecoder::new()),
        contexts,
    )?;

    let watch_span = info_span!(
        "qrscan.watch",
        images = config.images.len(),
        threshold = config.scanner.tick_threshold,
        format = ?config.format,
    );
    let _watch_span_guard = watch_span.enter();

    for path in &config.images {
        reader.on_source_event(&SourceEvent::Opened {
            url: path.display().to_string(),
        });
    }

    let printer_source = source.clone();
    reader.subscribe(move |symbols| {
        // Reports arrive after the image may have moved on; label them with
        // the image the cycle's capture actually read.
        let frame = printer_source.last_read();
        let line = ReportLine {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            frame,
            image: printer_source
                .path(frame)
                .map(|path| path.display().to_string()),
            symbols,
        };
        if let Err(err) = print_line(&line) {
            warn!("failed to write report: {err}");
        }
    });

    let threshold = u64::from(config.scanner.tick_threshold);
    let mut tick: u64 = 0;
    while !shutdown.load(Ordering::SeqCst) {
        if config.max_ticks.is_some_and(|max| tick >= max) {
            break;
        }
        let started = Instant::now();
        reader.tick();
        tick += 1;

        // Change images half way between samples. Small thresholds advance
        // on almost every tick; report lines carry the captured index.
        let frame_done = tick > threshold && tick % threshold == threshold / 2;
        if frame_done && !source.advance() && reader.state().is_idle() {
            reader.on_source_event(&SourceEvent::EndReached);
            break;
        }

        if let Some(rest) = config.tick_interval.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }

    if !reader.wait_idle(DRAIN_TIMEOUT) {
        reader.detach_workers();
        warn!("cycle still in flight after {DRAIN_TIMEOUT:?}; leaving its worker behind");
    }
    let stats = reader.stats();
    info!(
        ticks = stats.ticks,
        cycles = stats.cycles_completed,
        symbols = stats.symbols_reported,
        skipped = stats.unavailable,
        "watch finished"
    );
    Ok(())
}

fn print_line(line: &ReportLine<'_>) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, line)?;
    stdout.write_all(b"\n")?;
    stdout.flush()
}
