//! Frame pacing and stall detection for the encode loop.

use std::time::Duration;

pub const STALL_LIMIT: Duration = Duration::from_secs(10);

// position changes below this are treated as no progress
const MIN_ADVANCE: Duration = Duration::from_micros(100);

/// Upper bound on waiting for the next decoded frame:
/// `max(8ms, round(1000 / fps) + 50ms)`.
pub fn frame_wait(fps: u32) -> Duration {
    let fps = fps.max(1) as f64;
    let ms = (1000.0 / fps).round() as u64 + 50;
    Duration::from_millis(ms.max(8))
}

/// Timing attached to one submitted frame, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    pub index: u64,
    pub timestamp_us: i64,
    pub duration_us: i64,
    pub keyframe: bool,
}

/// Hands out timestamps derived from a fixed frame rate instead of wall-clock
/// arrival time.
#[derive(Debug)]
pub struct FramePacer {
    fps: u32,
    index: u64,
}

impl FramePacer {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            index: 0,
        }
    }

    pub fn keyframe_interval(&self) -> u64 {
        (self.fps as u64 * 2).max(1)
    }

    pub fn frames_submitted(&self) -> u64 {
        self.index
    }

    pub fn next_frame(&mut self) -> FrameTiming {
        let index = self.index;
        self.index += 1;
        let fps = self.fps as f64;
        FrameTiming {
            index,
            timestamp_us: (index as f64 * 1_000_000.0 / fps).round() as i64,
            duration_us: (1_000_000.0 / fps).round() as i64,
            keyframe: index % self.keyframe_interval() == 0,
        }
    }
}

/// Accumulates the time spent waiting without playback progress.
#[derive(Debug)]
pub struct StallDetector {
    increment: Duration,
    limit: Duration,
    accumulated: Duration,
}

impl StallDetector {
    pub fn new(increment: Duration, limit: Duration) -> Self {
        Self {
            increment,
            limit,
            accumulated: Duration::ZERO,
        }
    }

    /// Records one wait from `before` to `after`. Returns true once the
    /// accumulated stall reaches the limit.
    pub fn observe(&mut self, before: Duration, after: Duration) -> bool {
        if after > before + MIN_ADVANCE {
            self.accumulated = Duration::ZERO;
            return false;
        }
        self.accumulated += self.increment;
        self.accumulated >= self.limit
    }

    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_wait() {
        assert_eq!(frame_wait(30), Duration::from_millis(83));
        assert_eq!(frame_wait(24), Duration::from_millis(92));
        assert_eq!(frame_wait(1), Duration::from_millis(1050));
        assert_eq!(frame_wait(1000), Duration::from_millis(51));
        assert_eq!(frame_wait(0), Duration::from_millis(1050));
    }

    #[test]
    fn test_pacer_timestamps() {
        let mut pacer = FramePacer::new(25);
        let first = pacer.next_frame();
        let second = pacer.next_frame();
        assert_eq!(first.timestamp_us, 0);
        assert_eq!(first.duration_us, 40_000);
        assert_eq!(second.timestamp_us, 40_000);
        assert_eq!(second.index, 1);
        assert_eq!(pacer.frames_submitted(), 2);
    }

    #[test]
    fn test_pacer_keyframes_every_two_seconds() {
        let mut pacer = FramePacer::new(30);
        assert_eq!(pacer.keyframe_interval(), 60);
        let keyframes: Vec<u64> = (0..181)
            .map(|_| pacer.next_frame())
            .filter(|t| t.keyframe)
            .map(|t| t.index)
            .collect();
        assert_eq!(keyframes, vec![0, 60, 120, 180]);
    }

    #[test]
    fn test_stall_detector_resets_on_progress() {
        let step = Duration::from_millis(83);
        let mut stall = StallDetector::new(step, STALL_LIMIT);
        let pos = Duration::from_secs(1);
        assert!(!stall.observe(pos, pos));
        assert!(!stall.observe(pos, pos + Duration::from_micros(50)));
        assert_eq!(stall.accumulated(), step * 2);
        assert!(!stall.observe(pos, pos + Duration::from_millis(33)));
        assert_eq!(stall.accumulated(), Duration::ZERO);
    }

    #[test]
    fn test_stall_detector_trips_after_ceil_waits() {
        let step = Duration::from_millis(83);
        let mut stall = StallDetector::new(step, STALL_LIMIT);
        let pos = Duration::from_secs(2);
        let waits = (1..).find(|_| stall.observe(pos, pos)).unwrap();
        // ceil(10000 / 83)
        assert_eq!(waits, 121);
    }
}
