use std::time::{Duration, Instant};

use crate::compositor::Compositor;

/// What the loop should do after a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameControl {
    Continue,
    Stop,
}

/// Source of frame instants; stands in for the host's vsync callback.
pub trait FrameScheduler {
    /// Block until the next frame is due. `None` ends the loop.
    fn next_frame(&mut self) -> Option<Instant>;
}

/// Sleeps to a fixed cadence, 60 Hz by default.
#[derive(Clone, Debug)]
pub struct FixedRateScheduler {
    interval: Duration,
    limit: Option<u64>,
    issued: u64,
    next: Option<Instant>,
}

impl Default for FixedRateScheduler {
    fn default() -> Self {
        Self::new(Duration::from_micros(16_667))
    }
}

impl FixedRateScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            limit: None,
            issued: 0,
            next: None,
        }
    }

    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl FrameScheduler for FixedRateScheduler {
    fn next_frame(&mut self) -> Option<Instant> {
        if self.limit.is_some_and(|limit| self.issued >= limit) {
            return None;
        }
        let now = Instant::now();
        let due = self.next.unwrap_or(now);
        if due > now {
            std::thread::sleep(due - now);
        }
        let at = Instant::now();
        // A frame more than one interval late resets the cadence instead of
        // bursting to catch up.
        let base = if at.saturating_duration_since(due) > self.interval {
            at
        } else {
            due
        };
        self.next = Some(base + self.interval);
        self.issued += 1;
        Some(at)
    }
}

/// Drive `compositor` until the scheduler runs dry or a frame asks to stop.
/// Returns the number of frames ticked.
pub fn run<S: FrameScheduler + ?Sized>(compositor: &mut Compositor, scheduler: &mut S) -> u64 {
    let mut ticks = 0u64;
    while let Some(now) = scheduler.next_frame() {
        ticks += 1;
        if compositor.frame(now) == FrameControl::Stop {
            break;
        }
    }
    tracing::debug!(ticks, "frame loop finished");
    ticks
}
