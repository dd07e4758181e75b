//! How a worker waits when its tasks are not making progress.
//!
//! Workers have no readiness notification to block on, so after a pass over
//! their task set that retired nothing they ask an [`IdleStrategy`] to wait.
//! The default [`IdleBackoff`] keeps latency low while work is arriving and
//! caps CPU use once a worker has been idle for a while.

use std::thread;
use std::time::Duration;

use crate::config::IdleConfig;

pub trait IdleStrategy: Send {
    /// Called after a pass that retired nothing.
    fn idle(&mut self);

    /// Called after a pass that made progress.
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleAction {
    Spin,
    Yield,
    Sleep(Duration),
}

/// Spin, then yield, then sleep with exponentially growing pauses.
#[derive(Debug, Clone)]
pub struct IdleBackoff {
    spin_passes: u32,
    yield_passes: u32,
    min_sleep: Duration,
    max_sleep: Duration,
    empty_passes: u32,
    sleep: Duration,
}

impl IdleBackoff {
    pub fn new(config: &IdleConfig) -> Self {
        let min_sleep = Duration::from_micros(config.min_sleep_us);
        Self {
            spin_passes: config.spin_passes,
            yield_passes: config.yield_passes,
            min_sleep,
            max_sleep: Duration::from_micros(config.max_sleep_us).max(min_sleep),
            empty_passes: 0,
            sleep: min_sleep,
        }
    }

    /// Decides the wait for the next empty pass and advances the schedule.
    pub fn next_action(&mut self) -> IdleAction {
        let pass = self.empty_passes;
        self.empty_passes = self.empty_passes.saturating_add(1);

        if pass < self.spin_passes {
            return IdleAction::Spin;
        }
        if pass - self.spin_passes < self.yield_passes {
            return IdleAction::Yield;
        }

        let sleep = self.sleep;
        self.sleep = (self.sleep * 2).min(self.max_sleep);
        IdleAction::Sleep(sleep)
    }
}

impl Default for IdleBackoff {
    fn default() -> Self {
        Self::new(&IdleConfig::default())
    }
}

impl IdleStrategy for IdleBackoff {
    fn idle(&mut self) {
        match self.next_action() {
            IdleAction::Spin => std::hint::spin_loop(),
            IdleAction::Yield => thread::yield_now(),
            IdleAction::Sleep(d) => thread::sleep(d),
        }
    }

    fn reset(&mut self) {
        self.empty_passes = 0;
        self.sleep = self.min_sleep;
    }
}

/// Never waits. Lowest latency, one core per worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct BusySpin;

impl IdleStrategy for BusySpin {
    fn idle(&mut self) {
        std::hint::spin_loop();
    }

    fn reset(&mut self) {}
}
