//! Tick counter and in-flight state of the sampling loop.
//!
//! The scheduler is a plain value owned by the reader and mutated only from
//! the thread that drives ticks. It holds the single in-flight guard: a new
//! cycle can start only from `Idle`, and only [`SampleScheduler::finish`]
//! with the matching cycle id returns it there.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Sampling { cycle: u64 },
}

impl SchedulerState {
    pub fn is_idle(self) -> bool {
        self == SchedulerState::Idle
    }
}

/// What a tick decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickDecision {
    /// Threshold not reached yet.
    Wait,
    /// Threshold reached while a cycle is still in flight.
    Busy,
    /// Threshold reached but the source cannot be captured.
    Unavailable,
    /// Start the cycle with this id.
    Sample(u64),
}

#[derive(Debug)]
pub struct SampleScheduler {
    threshold: u32,
    counter: u32,
    state: SchedulerState,
    last_cycle: u64,
}

impl SampleScheduler {
    /// A threshold of zero is treated as one.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            counter: 0,
            state: SchedulerState::Idle,
            last_cycle: 0,
        }
    }

    /// Count one tick.
    ///
    /// The counter resets whenever it reaches the threshold, whatever is
    /// decided. `ready` is only consulted when a cycle could actually start.
    pub fn tick(&mut self, ready: impl FnOnce() -> bool) -> TickDecision {
        self.counter += 1;
        if self.counter < self.threshold {
            return TickDecision::Wait;
        }
        self.counter = 0;

        match self.state {
            SchedulerState::Sampling { .. } => TickDecision::Busy,
            SchedulerState::Idle if !ready() => TickDecision::Unavailable,
            SchedulerState::Idle => {
                self.last_cycle += 1;
                self.state = SchedulerState::Sampling {
                    cycle: self.last_cycle,
                };
                TickDecision::Sample(self.last_cycle)
            }
        }
    }

    /// Return to `Idle` if `cycle` is the one in flight.
    pub fn finish(&mut self, cycle: u64) -> bool {
        match self.state {
            SchedulerState::Sampling { cycle: current } if current == cycle => {
                self.state = SchedulerState::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state.is_idle()
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
