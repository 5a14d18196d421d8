use std::time::{Duration, Instant};

/// Timing of one frame.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped.
    pub delta: f32,
    /// Seconds since the clock started (sum of clamped deltas).
    pub elapsed: f64,
    pub frame_index: u64,
}

/// Produces per-frame delta times.
///
/// Deltas are clamped so a stall (debugger, minimized window) does not
/// launch moving objects across the scene.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    elapsed: f64,
    frame_index: u64,
    min_delta: Duration,
    max_delta: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    pub fn with_clamps(min_delta: Duration, max_delta: Duration) -> Self {
        debug_assert!(min_delta <= max_delta);
        Self {
            last: Instant::now(),
            elapsed: 0.0,
            frame_index: 0,
            min_delta,
            max_delta,
        }
    }

    /// Restarts the delta baseline, e.g. after the window was suspended.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let delta = self.advance(now.saturating_duration_since(self.last));
        self.last = now;
        delta
    }

    fn advance(&mut self, raw: Duration) -> FrameTime {
        let delta = raw.clamp(self.min_delta, self.max_delta).as_secs_f32();
        self.elapsed += delta as f64;
        let time = FrameTime {
            delta,
            elapsed: self.elapsed,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        time
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deltas_are_clamped() {
        let mut clock = FrameClock::with_clamps(Duration::from_millis(1), Duration::from_millis(100));
        let stalled = clock.advance(Duration::from_secs(5));
        assert!((stalled.delta - 0.1).abs() < 1e-6);
        assert_eq!(stalled.frame_index, 0);

        let instant = clock.advance(Duration::ZERO);
        assert!((instant.delta - 0.001).abs() < 1e-6);
        assert_eq!(instant.frame_index, 1);
        assert!((instant.elapsed - 0.101).abs() < 1e-6);
    }
}
