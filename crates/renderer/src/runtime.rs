use std::time::{Duration, Instant};

/// Snapshot of the time state supplied to the frame uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed wall-clock or simulated time in seconds.
    pub seconds: f32,
    /// Monotonic frame counter for the running session.
    pub frame_index: u64,
    /// Instant the sample corresponds to; drives debounce and dwell timers.
    pub instant: Instant,
}

impl TimeSample {
    /// Creates a new time sample.
    pub fn new(seconds: f32, frame_index: u64, instant: Instant) -> Self {
        Self {
            seconds,
            frame_index,
            instant,
        }
    }
}

/// Abstraction over where time values originate from.
pub trait TimeSource: Send {
    /// Resets the source to its initial state.
    fn reset(&mut self);
    /// Produces a time sample for the next frame.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    frame: u64,
}

impl SystemTimeSource {
    /// Creates a system time source initialised to `Instant::now()`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.origin);
        let sample = TimeSample::new(elapsed.as_secs_f32(), self.frame, now);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Time source that advances by a fixed step per sample regardless of the
/// wall clock. Used for headless, reproducible runs.
#[derive(Debug, Clone, Copy)]
pub struct SteppedTimeSource {
    origin: Instant,
    step: Duration,
    frame: u64,
}

impl SteppedTimeSource {
    /// Builds a source that reports `frame_rate` frames per simulated second.
    pub fn new(origin: Instant, frame_rate: f32) -> Self {
        let rate = if frame_rate.is_finite() && frame_rate > 0.0 {
            frame_rate
        } else {
            60.0
        };
        Self {
            origin,
            step: Duration::from_secs_f64(1.0 / f64::from(rate)),
            frame: 0,
        }
    }

    /// Instant of the sample that will be produced for `frame`.
    pub fn instant_at(&self, frame: u64) -> Instant {
        self.origin + self.step.mul_f64(frame as f64)
    }

    pub fn step(&self) -> Duration {
        self.step
    }
}

impl TimeSource for SteppedTimeSource {
    fn reset(&mut self) {
        self.frame = 0;
    }

    fn sample(&mut self) -> TimeSample {
        let elapsed = self.step.mul_f64(self.frame as f64);
        let sample = TimeSample::new(elapsed.as_secs_f32(), self.frame, self.origin + elapsed);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Decides when the window loop should issue the next redraw.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Option<Duration>,
    last_render: Option<Instant>,
}

impl FramePacer {
    /// `target_fps` of `None` or a non-positive value renders every callback.
    pub fn new(target_fps: Option<f32>) -> Self {
        let interval = target_fps
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .map(|fps| Duration::from_secs_f32(1.0 / fps));
        Self {
            interval,
            last_render: None,
        }
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        match (self.interval, self.last_render) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        }
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        self.last_render = Some(now);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        Some(self.last_render? + self.interval?)
    }

    pub fn reset(&mut self) {
        self.last_render = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepped_source_is_reproducible() {
        let origin = Instant::now();
        let mut source = SteppedTimeSource::new(origin, 50.0);
        let first = source.sample();
        let second = source.sample();
        assert_eq!(first.frame_index, 0);
        assert_eq!(first.seconds, 0.0);
        assert_eq!(second.frame_index, 1);
        assert!((second.seconds - 0.02).abs() < 1e-6);
        assert_eq!(second.instant, origin + Duration::from_millis(20));
        assert_eq!(source.instant_at(10), origin + Duration::from_millis(200));

        source.reset();
        assert_eq!(source.sample(), first);
    }

    #[test]
    fn stepped_source_rejects_bad_rates() {
        let source = SteppedTimeSource::new(Instant::now(), 0.0);
        assert_eq!(source.step(), Duration::from_secs_f64(1.0 / 60.0));
    }

    #[test]
    fn pacer_without_cap_is_always_ready() {
        let mut pacer = FramePacer::new(None);
        let now = Instant::now();
        pacer.mark_rendered(now);
        assert!(pacer.ready_for_frame(now));
        assert_eq!(pacer.next_deadline(), None);
    }

    #[test]
    fn pacer_waits_for_interval() {
        let mut pacer = FramePacer::new(Some(10.0));
        let now = Instant::now();
        assert!(pacer.ready_for_frame(now));
        pacer.mark_rendered(now);
        assert!(!pacer.ready_for_frame(now + Duration::from_millis(50)));
        assert!(pacer.ready_for_frame(now + Duration::from_millis(100)));
        assert_eq!(pacer.next_deadline(), Some(now + Duration::from_millis(100)));
    }
}
