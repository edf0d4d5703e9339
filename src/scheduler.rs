//! Tick scheduling.
//!
//! The frame loop never sleeps on its own; the driver asks a scheduler to wait
//! for the next frame slot before running an armed tick.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

pub trait FrameScheduler {
    /// Block until the next slot in which a tick may run.
    fn wait_for_frame(&mut self);
}

/// Fires once per display refresh.
///
/// Slots sit on a fixed grid anchored at construction. A tick that overruns its
/// slot simply waits for the next grid point, so cadence is capped at the
/// refresh rate and otherwise follows detection latency.
pub struct RefreshScheduler {
    epoch: Instant,
    interval: Duration,
}

impl RefreshScheduler {
    pub fn new(refresh_hz: u32) -> Result<Self> {
        if refresh_hz == 0 {
            return Err(anyhow!("refresh rate must be greater than zero"));
        }
        Ok(Self {
            epoch: Instant::now(),
            interval: Duration::from_secs(1) / refresh_hz,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time from `now` until the next refresh boundary (never zero).
    fn until_next_slot(&self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.epoch).as_nanos();
        let interval = self.interval.as_nanos().max(1);
        let next = (elapsed / interval + 1) * interval;
        Duration::from_nanos((next - elapsed) as u64)
    }
}

impl FrameScheduler for RefreshScheduler {
    fn wait_for_frame(&mut self) {
        std::thread::sleep(self.until_next_slot(Instant::now()));
    }
}

/// Runs every tick immediately. Counts how often it was asked.
#[derive(Debug, Default)]
pub struct ImmediateScheduler {
    waits: u64,
}

impl ImmediateScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> u64 {
        self.waits
    }
}

impl FrameScheduler for ImmediateScheduler {
    fn wait_for_frame(&mut self) {
        self.waits += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_refresh_rate_is_rejected() {
        assert!(RefreshScheduler::new(0).is_err());
    }

    #[test]
    fn slots_follow_the_refresh_grid() -> Result<()> {
        let scheduler = RefreshScheduler::new(50)?;
        assert_eq!(scheduler.interval(), Duration::from_millis(20));

        let epoch = scheduler.epoch;
        assert_eq!(scheduler.until_next_slot(epoch), Duration::from_millis(20));
        assert_eq!(
            scheduler.until_next_slot(epoch + Duration::from_millis(5)),
            Duration::from_millis(15)
        );
        // Overran two slots: wait for the following boundary only.
        assert_eq!(
            scheduler.until_next_slot(epoch + Duration::from_millis(47)),
            Duration::from_millis(13)
        );
        Ok(())
    }

    #[test]
    fn immediate_scheduler_counts_waits() {
        let mut scheduler = ImmediateScheduler::new();
        scheduler.wait_for_frame();
        scheduler.wait_for_frame();
        assert_eq!(scheduler.waits(), 2);
    }
}
