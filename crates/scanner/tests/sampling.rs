//! End-to-end behaviour of the sampling loop against instrumented stubs.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, unbounded};
use scanner::{BarcodeReader, ReaderContexts, ScannerConfig, SchedulerState, TickDecision};
use symbology::{
    BarcodeFormat, ContentType, DecodeError, DecodeOptions, Point, Quadrilateral, SymbolDecoder,
    SymbolResult,
};
use video_ingest::{
    CaptureError, Context, ContextClosed, Executor, ImageView, NativePixelFormat, PixelLayout,
    RenderTarget, VideoSource, exec::Job,
};

struct StubSource {
    width: u32,
    height: u32,
    format: NativePixelFormat,
    pixels: Vec<u8>,
    playing: AtomicBool,
    gate: Option<Receiver<()>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    reads: AtomicUsize,
}

impl StubSource {
    /// 2x2 RGB frame: black and white checkerboard.
    fn checkerboard() -> Self {
        #[rustfmt::skip]
        let pixels = vec![
            0, 0, 0,        255, 255, 255,
            255, 255, 255,  0, 0, 0,
        ];
        Self {
            width: 2,
            height: 2,
            format: NativePixelFormat::Rgb8,
            pixels,
            playing: AtomicBool::new(true),
            gate: None,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    fn gated(gate: Receiver<()>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::checkerboard()
        }
    }
}

impl VideoSource for StubSource {
    fn display_name(&self) -> &str {
        "stub"
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn surface_ready(&self) -> bool {
        true
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel_format(&self) -> NativePixelFormat {
        self.format
    }

    fn read_pixels(&self, target: &mut RenderTarget) -> Result<(), CaptureError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _ = gate.recv_timeout(Duration::from_secs(5));
        }
        let pixels = target.pixels_mut();
        pixels.clear();
        pixels.extend_from_slice(&self.pixels);
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

enum Reply {
    Symbols(Vec<SymbolResult>),
    Fail,
}

struct SpyDecoder {
    reply: Reply,
    calls: AtomicUsize,
    layouts: Mutex<Vec<(u32, u32, PixelLayout)>>,
}

impl SpyDecoder {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            layouts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SymbolDecoder for SpyDecoder {
    fn read_symbols(
        &self,
        view: &ImageView<'_>,
        _options: &DecodeOptions,
    ) -> Result<Vec<SymbolResult>, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.layouts
            .lock()
            .unwrap()
            .push((view.width(), view.height(), view.layout()));
        match &self.reply {
            Reply::Symbols(symbols) => Ok(symbols.clone()),
            Reply::Fail => Err(DecodeError::Backend("corrupt bitstream".into())),
        }
    }
}

fn hello() -> SymbolResult {
    SymbolResult::new(
        BarcodeFormat::QrCode,
        ContentType::Text,
        "HELLO",
        b"HELLO".to_vec(),
        Quadrilateral::from_corners([
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ]),
    )
}

fn reader(
    threshold: u32,
    source: &Arc<StubSource>,
    decoder: &Arc<SpyDecoder>,
    contexts: ReaderContexts,
) -> BarcodeReader {
    let config = ScannerConfig::default().with_tick_threshold(threshold);
    BarcodeReader::new(config, source.clone(), decoder.clone(), contexts).unwrap()
}

fn counting_subscriber(reader: &mut BarcodeReader) -> Arc<Mutex<Vec<Vec<SymbolResult>>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    reader.subscribe(move |symbols| sink.lock().unwrap().push(symbols.to_vec()));
    seen
}

#[test]
fn samples_on_every_hundredth_tick() {
    let source = Arc::new(StubSource::checkerboard());
    let decoder = SpyDecoder::new(Reply::Symbols(vec![hello()]));
    let mut reader = reader(100, &source, &decoder, ReaderContexts::inline());

    let sampled: Vec<usize> = (1..=250)
        .filter(|_| matches!(reader.tick(), TickDecision::Sample(_)))
        .collect();

    assert_eq!(sampled, vec![100, 200]);
    let stats = reader.stats();
    assert_eq!(stats.ticks, 250);
    assert_eq!(stats.cycles_started, 2);
    assert_eq!(stats.cycles_completed, 2);
    assert_eq!(decoder.calls(), 2);
    assert_eq!(reader.state(), SchedulerState::Idle);
}

#[test]
fn round_trip_delivers_the_decoded_symbol_unchanged() {
    let source = Arc::new(StubSource::checkerboard());
    let decoder = SpyDecoder::new(Reply::Symbols(vec![hello()]));
    let mut reader = reader(100, &source, &decoder, ReaderContexts::inline());
    let seen = counting_subscriber(&mut reader);

    for _ in 0..100 {
        reader.tick();
    }

    assert_eq!(*seen.lock().unwrap(), vec![vec![hello()]]);
    assert_eq!(
        *decoder.layouts.lock().unwrap(),
        vec![(2, 2, PixelLayout::Rgb)]
    );
    assert_eq!(reader.stats().symbols_reported, 1);
}

#[test]
fn empty_results_reach_no_subscriber() {
    let source = Arc::new(StubSource::checkerboard());
    let decoder = SpyDecoder::new(Reply::Symbols(Vec::new()));
    let mut reader = reader(1, &source, &decoder, ReaderContexts::inline());
    let seen = counting_subscriber(&mut reader);
    let (_, rx) = reader.subscribe_channel();

    for _ in 0..5 {
        reader.tick();
    }

    assert_eq!(decoder.calls(), 5);
    assert!(seen.lock().unwrap().is_empty());
    assert!(rx.try_recv().is_err());
    assert_eq!(reader.stats().cycles_completed, 5);
}

#[test]
fn decode_failures_are_silent_and_keep_sampling() {
    let source = Arc::new(StubSource::checkerboard());
    let decoder = SpyDecoder::new(Reply::Fail);
    let mut reader = reader(2, &source, &decoder, ReaderContexts::inline());
    let seen = counting_subscriber(&mut reader);

    for _ in 0..6 {
        reader.tick();
    }

    assert_eq!(decoder.calls(), 3);
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(reader.state(), SchedulerState::Idle);
}

#[test]
fn unsupported_frames_skip_the_decoder() {
    let source = Arc::new(StubSource {
        format: NativePixelFormat::Nv12,
        pixels: vec![16; 6],
        ..StubSource::checkerboard()
    });
    let decoder = SpyDecoder::new(Reply::Symbols(vec![hello()]));
    let mut reader = reader(1, &source, &decoder, ReaderContexts::inline());
    let seen = counting_subscriber(&mut reader);

    for _ in 0..3 {
        reader.tick();
    }

    assert_eq!(source.reads.load(Ordering::SeqCst), 3);
    assert_eq!(decoder.calls(), 0);
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(reader.stats().cycles_completed, 3);
    assert_eq!(reader.state(), SchedulerState::Idle);
}

#[test]
fn stopped_source_is_never_read() {
    let source = Arc::new(StubSource::checkerboard());
    source.playing.store(false, Ordering::SeqCst);
    let decoder = SpyDecoder::new(Reply::Symbols(vec![hello()]));
    let mut reader = reader(10, &source, &decoder, ReaderContexts::inline());

    let decisions: Vec<_> = (0..20).map(|_| reader.tick()).collect();

    assert_eq!(decisions[9], TickDecision::Unavailable);
    assert_eq!(decisions[19], TickDecision::Unavailable);
    assert_eq!(reader.stats().unavailable, 2);
    assert_eq!(source.reads.load(Ordering::SeqCst), 0);

    source.playing.store(true, Ordering::SeqCst);
    let decisions: Vec<_> = (0..10).map(|_| reader.tick()).collect();
    assert_eq!(decisions[9], TickDecision::Sample(1));
}

#[test]
fn at_most_one_cycle_is_in_flight() {
    let (release, gate): (Sender<()>, Receiver<()>) = unbounded();
    let source = Arc::new(StubSource::gated(gate));
    let decoder = SpyDecoder::new(Reply::Symbols(vec![hello()]));
    let contexts = ReaderContexts::threaded("test-scanner").unwrap();
    let mut reader = reader(1, &source, &decoder, contexts);
    let (_, results) = reader.subscribe_channel();

    let decisions: Vec<_> = (0..200).map(|_| reader.tick()).collect();
    assert_eq!(decisions[0], TickDecision::Sample(1));
    assert!(decisions[1..].iter().all(|d| *d == TickDecision::Busy));
    assert_eq!(reader.state(), SchedulerState::Sampling { cycle: 1 });

    release.send(()).unwrap();
    assert!(reader.wait_idle(Duration::from_secs(5)));
    assert_eq!(results.try_recv().unwrap(), vec![hello()]);

    assert_eq!(reader.tick(), TickDecision::Sample(2));
    release.send(()).unwrap();
    assert!(reader.wait_idle(Duration::from_secs(5)));

    assert_eq!(source.reads.load(Ordering::SeqCst), 2);
    assert_eq!(source.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(decoder.calls(), 2);
}

/// Signals when it starts decoding, then holds the frame until released.
struct GatedDecoder {
    entered: Sender<()>,
    gate: Receiver<()>,
}

impl SymbolDecoder for GatedDecoder {
    fn read_symbols(
        &self,
        _view: &ImageView<'_>,
        _options: &DecodeOptions,
    ) -> Result<Vec<SymbolResult>, DecodeError> {
        let _ = self.entered.send(());
        let _ = self.gate.recv_timeout(Duration::from_secs(5));
        Ok(vec![hello()])
    }
}

#[test]
fn decode_finishes_before_the_cycle_is_closed() {
    let (entered_tx, entered) = unbounded();
    let (release, gate) = unbounded();
    let source = Arc::new(StubSource::checkerboard());
    let decoder = Arc::new(GatedDecoder {
        entered: entered_tx,
        gate,
    });
    let config = ScannerConfig::default().with_tick_threshold(1);
    let contexts = ReaderContexts::threaded("test-gated-decode").unwrap();
    let mut reader = BarcodeReader::new(config, source, decoder, contexts).unwrap();
    let seen = counting_subscriber(&mut reader);

    assert_eq!(reader.tick(), TickDecision::Sample(1));
    entered.recv_timeout(Duration::from_secs(5)).unwrap();

    // The decoder still owns the frame, so nothing may have been reported.
    assert_eq!(reader.pump(), 0);
    assert_eq!(reader.state(), SchedulerState::Sampling { cycle: 1 });
    assert_eq!(reader.stats().cycles_completed, 0);
    assert!(seen.lock().unwrap().is_empty());

    release.send(()).unwrap();
    assert!(reader.wait_idle(Duration::from_secs(5)));
    assert_eq!(reader.state(), SchedulerState::Idle);
    assert_eq!(reader.stats().cycles_completed, 1);
    assert_eq!(*seen.lock().unwrap(), vec![vec![hello()]]);
}

#[test]
fn detached_reader_drops_without_waiting_for_a_stuck_capture() {
    let (release, gate): (Sender<()>, Receiver<()>) = unbounded();
    let source = Arc::new(StubSource::gated(gate));
    let decoder = SpyDecoder::new(Reply::Symbols(vec![hello()]));
    let contexts = ReaderContexts::threaded("test-detach").unwrap();
    let mut reader = reader(1, &source, &decoder, contexts);

    assert_eq!(reader.tick(), TickDecision::Sample(1));
    assert!(!reader.wait_idle(Duration::from_millis(50)));

    reader.detach_workers();
    let started = Instant::now();
    drop(reader);
    assert!(started.elapsed() < Duration::from_secs(1));

    release.send(()).unwrap();
}

struct ClosedExecutor;

impl Executor for ClosedExecutor {
    fn name(&self) -> &str {
        "closed"
    }

    fn post(&self, _job: Job) -> Result<(), ContextClosed> {
        Err(ContextClosed {
            name: "closed".into(),
        })
    }
}

#[test]
fn rejected_capture_still_returns_to_idle() {
    let source = Arc::new(StubSource::checkerboard());
    let decoder = SpyDecoder::new(Reply::Symbols(vec![hello()]));
    let contexts = ReaderContexts {
        render: Context::new(Arc::new(ClosedExecutor)),
        compute: Context::inline(),
    };
    let mut reader = reader(1, &source, &decoder, contexts);

    assert_eq!(reader.tick(), TickDecision::Sample(1));
    assert_eq!(reader.state(), SchedulerState::Idle);
    assert_eq!(reader.tick(), TickDecision::Sample(2));
    assert_eq!(reader.stats().cycles_completed, 2);
    assert_eq!(source.reads.load(Ordering::SeqCst), 0);
}

#[test]
fn unsubscribed_callbacks_stop_receiving() {
    let source = Arc::new(StubSource::checkerboard());
    let decoder = SpyDecoder::new(Reply::Symbols(vec![hello()]));
    let mut reader = reader(1, &source, &decoder, ReaderContexts::inline());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let id = reader.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    reader.tick();
    assert!(reader.unsubscribe(id));
    reader.tick();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(reader.stats().symbols_reported, 2);
}

#[test]
fn invalid_config_is_rejected() {
    let source: Arc<dyn VideoSource> = Arc::new(StubSource::checkerboard());
    let decoder: Arc<dyn SymbolDecoder> = SpyDecoder::new(Reply::Fail);
    let config = ScannerConfig::default().with_tick_threshold(0);
    assert!(BarcodeReader::new(config, source, decoder, ReaderContexts::inline()).is_err());
}
