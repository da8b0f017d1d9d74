//! Stall detection for the in-flight cycle.
//!
//! A cycle has no timeout: a stuck capture or decode blocks further sampling
//! until it finishes. The watchdog only makes that visible. It is observed on
//! every tick and warns once per cycle when the cycle has been in flight for
//! longer than the configured limit.

use std::time::{Duration, Instant};

use tracing::warn;

#[derive(Debug)]
struct Watch {
    cycle: u64,
    started: Instant,
    warned: bool,
}

#[derive(Debug)]
pub(crate) struct StallWatchdog {
    limit: Option<Duration>,
    current: Option<Watch>,
}

impl StallWatchdog {
    pub(crate) fn new(limit: Option<Duration>) -> Self {
        Self {
            limit,
            current: None,
        }
    }

    /// Start watching `cycle`.
    pub(crate) fn arm(&mut self, cycle: u64, now: Instant) {
        self.current = Some(Watch {
            cycle,
            started: now,
            warned: false,
        });
    }

    pub(crate) fn disarm(&mut self) {
        self.current = None;
    }

    /// Returns `true` on the one observation that reports the stall.
    pub(crate) fn observe(&mut self, now: Instant) -> bool {
        let (Some(limit), Some(watch)) = (self.limit, self.current.as_mut()) else {
            return false;
        };
        if watch.warned {
            return false;
        }
        let elapsed = now.saturating_duration_since(watch.started);
        if elapsed <= limit {
            return false;
        }
        watch.warned = true;
        warn!(
            cycle = watch.cycle,
            elapsed_ms = elapsed.as_millis() as u64,
            "sampling cycle stalled; no new samples until it finishes"
        );
        metrics::counter!("scanner_stalled_cycles_total").increment(1);
        true
    }
}
