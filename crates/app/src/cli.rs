//! Command-line surface of `qrscan`.
//!
//! Arguments are parsed with clap and translated into the configs the
//! commands run with, so the commands never look at raw flags.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use scanner::{DEFAULT_TICK_THRESHOLD, ScannerConfig};
use symbology::{DecodeOptions, FormatSet};
use video_ingest::NativePixelFormat;

#[derive(Debug, Parser)]
#[command(name = "qrscan", version, about = "Sample and decode barcodes from a live source")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play still images as a live source and report decoded symbols as JSON lines.
    Watch(WatchArgs),
    /// Decode each image once and print one JSON object per image.
    Read(ReadArgs),
}

/// Native format the still-image source rasterizes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SurfaceFormat {
    Rgba8,
    Bgra8,
    R8,
    Rgb8,
    Argb8,
    Abgr8,
}

impl From<SurfaceFormat> for NativePixelFormat {
    fn from(format: SurfaceFormat) -> Self {
        match format {
            SurfaceFormat::Rgba8 => NativePixelFormat::Rgba8,
            SurfaceFormat::Bgra8 => NativePixelFormat::Bgra8,
            SurfaceFormat::R8 => NativePixelFormat::R8,
            SurfaceFormat::Rgb8 => NativePixelFormat::Rgb8,
            SurfaceFormat::Argb8 => NativePixelFormat::Argb8,
            SurfaceFormat::Abgr8 => NativePixelFormat::Abgr8,
        }
    }
}

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// Comma-separated symbologies, or `all`, `linear`, `matrix`.
    #[arg(long = "formats", value_name = "LIST", default_value = "all")]
    pub formats: FormatSet,
    /// Spend extra passes on hard images.
    #[arg(long = "try-harder", action = clap::ArgAction::SetTrue)]
    pub try_harder: bool,
}

impl TryFrom<&DecodeArgs> for DecodeOptions {
    type Error = anyhow::Error;

    fn try_from(args: &DecodeArgs) -> Result<Self> {
        if args.formats.is_empty() {
            bail!("--formats must name at least one symbology");
        }
        Ok(DecodeOptions::default()
            .with_symbologies(args.formats)
            .with_try_harder(args.try_harder))
    }
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Images played in order as the frames of the source.
    #[arg(long = "image", value_name = "PATH", required = true, num_args = 1..)]
    pub images: Vec<PathBuf>,
    /// Tick rate of the host loop.
    #[arg(long = "fps", value_name = "N", default_value_t = 60.0)]
    pub fps: f64,
    /// Stop after this many ticks.
    #[arg(long = "ticks", value_name = "N")]
    pub ticks: Option<u64>,
    /// Ticks between two samples.
    #[arg(long = "threshold", value_name = "T", default_value_t = DEFAULT_TICK_THRESHOLD)]
    pub threshold: u32,
    /// Surface format the images are rasterized into.
    #[arg(long = "format", value_enum, default_value = "rgba8")]
    pub format: SurfaceFormat,
    /// Restart from the first image after the last one.
    #[arg(long = "loop", action = clap::ArgAction::SetTrue)]
    pub looping: bool,
    /// Warn when a cycle is in flight for longer than this many seconds.
    #[arg(long = "stall-warning", value_name = "SECS", default_value_t = 10.0)]
    pub stall_warning: f64,
    /// Serve Prometheus metrics on this address.
    #[arg(long = "metrics-addr", value_name = "ADDR")]
    pub metrics_addr: Option<SocketAddr>,
    /// Emit Chrome trace JSON for post-mortem analysis.
    #[arg(long = "chrome-trace", value_name = "PATH")]
    pub chrome_trace: Option<PathBuf>,
    #[command(flatten)]
    pub decode: DecodeArgs,
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    /// Images to decode.
    #[arg(value_name = "PATH", required = true)]
    pub images: Vec<PathBuf>,
    #[command(flatten)]
    pub decode: DecodeArgs,
}

#[derive(Clone, Debug, Default)]
/// Optional telemetry knobs for tracing and metrics export.
pub struct TelemetryOptions {
    /// Write a Chrome trace JSON file capturing cycle spans.
    pub chrome_trace_path: Option<PathBuf>,
    /// Address of the Prometheus scrape endpoint.
    pub metrics_addr: Option<SocketAddr>,
}

#[derive(Clone, Debug)]
/// Everything `qrscan watch` runs with.
pub struct WatchConfig {
    pub images: Vec<PathBuf>,
    pub tick_interval: Duration,
    pub max_ticks: Option<u64>,
    pub format: NativePixelFormat,
    pub looping: bool,
    pub scanner: ScannerConfig,
    pub telemetry: TelemetryOptions,
}

impl TryFrom<WatchArgs> for WatchConfig {
    type Error = anyhow::Error;

    fn try_from(args: WatchArgs) -> Result<Self> {
        if !(args.fps.is_finite() && args.fps > 0.0 && args.fps <= 1_000.0) {
            bail!("--fps must be between 0 and 1000");
        }
        if args.threshold == 0 {
            bail!("--threshold must be at least 1");
        }
        if !(args.stall_warning.is_finite() && args.stall_warning >= 0.0) {
            bail!("--stall-warning must be a non-negative number of seconds");
        }
        if args.ticks == Some(0) {
            bail!("--ticks must be at least 1");
        }

        let stall_warning = (args.stall_warning > 0.0)
            .then(|| Duration::from_secs_f64(args.stall_warning));
        let scanner = ScannerConfig::default()
            .with_tick_threshold(args.threshold)
            .with_decode(DecodeOptions::try_from(&args.decode)?)
            .with_stall_warning(stall_warning);
        scanner.validate()?;

        Ok(Self {
            images: args.images,
            tick_interval: Duration::from_secs_f64(1.0 / args.fps),
            max_ticks: args.ticks,
            format: args.format.into(),
            looping: args.looping,
            scanner,
            telemetry: TelemetryOptions {
                chrome_trace_path: args.chrome_trace,
                metrics_addr: args.metrics_addr,
            },
        })
    }
}
