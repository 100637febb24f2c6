/// Nominal frame step: one sixtieth of a second per presented frame.
pub const DEFAULT_TIME_STEP: f64 = 1.0 / 60.0;

/// Snapshot of the time state supplied to the shader uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Logical seconds since the owning surface started rendering.
    pub seconds: f64,
    /// Monotonic frame counter for the owning surface.
    pub frame_index: u64,
}

/// Logical animation clock owned by exactly one render surface.
///
/// The value is an accumulator advanced by a fixed step per frame rather than
/// a wall-clock read, so a stalled frame never makes the animation jump.
#[derive(Debug, Clone)]
pub struct Clock {
    seconds: f64,
    step: f64,
    frame: u64,
}

impl Clock {
    /// Creates a clock at zero advancing by `step` seconds per frame.
    ///
    /// Non-finite or negative steps fall back to [`DEFAULT_TIME_STEP`].
    pub fn new(step: f64) -> Self {
        let step = if step.is_finite() && step >= 0.0 {
            step
        } else {
            tracing::warn!(step, "invalid clock step; using default");
            DEFAULT_TIME_STEP
        };
        Self {
            seconds: 0.0,
            step,
            frame: 0,
        }
    }

    /// Returns the sample the current frame draws with, then moves forward.
    ///
    /// The first call yields `t = 0`; each later call yields a value no
    /// smaller than the one before it.
    pub fn advance(&mut self) -> TimeSample {
        let sample = TimeSample {
            seconds: self.seconds,
            frame_index: self.frame,
        };
        self.seconds += self.step;
        self.frame = self.frame.saturating_add(1);
        sample
    }

    /// Time the next call to [`Clock::advance`] will report.
    pub fn time(&self) -> f64 {
        self.seconds
    }

    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    pub fn step(&self) -> f64 {
        self.step
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_STEP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_starts_at_zero() {
        let mut clock = Clock::default();
        let sample = clock.advance();
        assert_eq!(sample.seconds, 0.0);
        assert_eq!(sample.frame_index, 0);
        assert!((clock.time() - DEFAULT_TIME_STEP).abs() < 1e-12);
    }

    #[test]
    fn advance_is_monotonic() {
        let mut clock = Clock::new(0.01);
        let mut last = -1.0;
        for _ in 0..1_000 {
            let sample = clock.advance();
            assert!(sample.seconds >= last);
            last = sample.seconds;
        }
        assert_eq!(clock.frame_index(), 1_000);
    }

    #[test]
    fn clocks_are_independent() {
        let mut a = Clock::default();
        let b = Clock::default();
        for _ in 0..10 {
            a.advance();
        }
        assert_eq!(b.time(), 0.0);
        assert_eq!(b.frame_index(), 0);
    }

    #[test]
    fn rejects_negative_step() {
        let clock = Clock::new(-1.0);
        assert_eq!(clock.step(), DEFAULT_TIME_STEP);
    }
}
