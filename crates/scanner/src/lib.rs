//! Periodic barcode sampling over a live video source.
//!
//! A [`BarcodeReader`] is ticked once per rendered frame by its host. Every
//! `tick_threshold` ticks it snapshots the current frame on the render
//! context, decodes it on the compute context, and delivers any symbols to
//! its subscribers on the ticking thread. At most one cycle is in flight.
//!
//! - `config`: reader settings and their validation.
//! - `scheduler`: tick counter and in-flight state machine.
//! - `cycle`: terminal outcomes and the completion handle of one cycle.
//! - `reporter`: subscriber registry and result delivery.
//! - `reader`: the entry point tying the stages together.

pub mod config;
pub mod cycle;
pub mod reader;
pub mod reporter;
pub mod scheduler;
mod watchdog;

pub use config::{ConfigError, DEFAULT_STALL_WARNING, DEFAULT_TICK_THRESHOLD, ScannerConfig};
pub use cycle::{CycleError, CycleOutcome, CycleReport};
pub use reader::{BarcodeReader, ReaderContexts, ReaderStats};
pub use reporter::{ResultReporter, SubscriberId, SymbolCallback};
pub use scheduler::{SampleScheduler, SchedulerState, TickDecision};
