//! Reader configuration.
//!
//! Hosts build a [`ScannerConfig`] once and hand it to the reader; stages
//! read it without re-validating.

use std::time::Duration;

use symbology::{DecodeOptions, FormatSet};
use thiserror::Error;

/// Ticks between two sampling attempts.
pub const DEFAULT_TICK_THRESHOLD: u32 = 100;
/// How long a cycle may stay in flight before a stall is reported.
pub const DEFAULT_STALL_WARNING: Duration = Duration::from_secs(10);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("tick threshold must be at least 1")]
    ZeroThreshold,
    #[error("at least one symbology must be enabled")]
    NoSymbologies,
    #[error("stall warning must be longer than zero")]
    ZeroStallWarning,
}

#[derive(Clone, Debug, PartialEq)]
/// Settings consumed by a [`crate::BarcodeReader`].
pub struct ScannerConfig {
    /// A sample is attempted on every `tick_threshold`-th tick.
    pub tick_threshold: u32,
    /// Options handed to the decode capability.
    pub decode: DecodeOptions,
    /// Warn when a cycle stays in flight longer than this. `None` disables it.
    pub stall_warning: Option<Duration>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            tick_threshold: DEFAULT_TICK_THRESHOLD,
            decode: DecodeOptions::default(),
            stall_warning: Some(DEFAULT_STALL_WARNING),
        }
    }
}

impl ScannerConfig {
    pub fn with_tick_threshold(mut self, tick_threshold: u32) -> Self {
        self.tick_threshold = tick_threshold;
        self
    }

    pub fn with_decode(mut self, decode: DecodeOptions) -> Self {
        self.decode = decode;
        self
    }

    pub fn with_symbologies(mut self, symbologies: FormatSet) -> Self {
        self.decode.symbologies = symbologies;
        self
    }

    pub fn with_try_harder(mut self, try_harder: bool) -> Self {
        self.decode.try_harder = try_harder;
        self
    }

    pub fn with_stall_warning(mut self, stall_warning: Option<Duration>) -> Self {
        self.stall_warning = stall_warning;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        if self.decode.symbologies.is_empty() {
            return Err(ConfigError::NoSymbologies);
        }
        if self.stall_warning == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroStallWarning);
        }
        Ok(())
    }
}
