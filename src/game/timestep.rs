//! Fixed-timestep accumulator and hit-stop slow motion
//!
//! The display clock calls [`FixedTimestep::advance`] once per frame with a
//! wall-clock timestamp; it returns how many whole simulation ticks to run.

use crate::game::constants::sim;

/// Converts variable frame deltas into whole fixed ticks
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    tick_ms: f64,
    max_elapsed_ms: f64,
    accumulator: f64,
    last_timestamp: Option<f64>,
}

impl FixedTimestep {
    pub fn new(tick_rate: u32, max_catchup_ticks: u32) -> Self {
        let tick_ms = 1000.0 / tick_rate.max(1) as f64;
        Self {
            tick_ms,
            max_elapsed_ms: tick_ms * max_catchup_ticks.max(1) as f64,
            accumulator: 0.0,
            last_timestamp: None,
        }
    }

    /// Feed one display frame; returns the number of ticks to simulate
    ///
    /// The first call only records the timestamp. Elapsed time is scaled by
    /// `slow_mo` before clamping, so slow motion never changes tick size.
    pub fn advance(&mut self, now_ms: f64, slow_mo: f64) -> u32 {
        let Some(last) = self.last_timestamp.replace(now_ms) else {
            return 0;
        };
        let raw = (now_ms - last).max(0.0);
        let scaled = raw * slow_mo.clamp(0.0, 1.0);
        let elapsed = if scaled.is_finite() {
            scaled.min(self.max_elapsed_ms)
        } else {
            0.0
        };

        self.accumulator += elapsed;
        let mut ticks = 0;
        while self.accumulator >= self.tick_ms {
            self.accumulator -= self.tick_ms;
            ticks += 1;
        }
        ticks
    }

    /// Fraction of a tick left in the accumulator (render interpolation)
    #[inline]
    pub fn alpha(&self) -> f64 {
        self.accumulator / self.tick_ms
    }

    #[inline]
    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    #[inline]
    pub fn tick_ms(&self) -> f64 {
        self.tick_ms
    }

    /// Forget the previous frame (after a pause or role switch)
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.last_timestamp = None;
    }
}

impl Default for FixedTimestep {
    fn default() -> Self {
        Self::new(sim::TICK_RATE, sim::MAX_CATCHUP_TICKS)
    }
}

/// Slow-motion controller feeding `slow_mo` into the accumulator
///
/// Durations run on real (unscaled) time. While a request is active a
/// stronger one (lower factor) replaces it; a weaker one is ignored.
#[derive(Debug, Clone)]
pub struct HitStop {
    factor: f64,
    remaining_ms: f64,
    last_timestamp: Option<f64>,
}

impl HitStop {
    pub fn new() -> Self {
        Self {
            factor: 1.0,
            remaining_ms: 0.0,
            last_timestamp: None,
        }
    }

    /// Request slow motion at `factor` for `duration_ms` of real time
    pub fn trigger(&mut self, factor: f64, duration_ms: f64) {
        let factor = factor.clamp(0.0, 1.0);
        if self.remaining_ms <= 0.0 || factor < self.factor {
            self.factor = factor;
            self.remaining_ms = duration_ms;
        } else if (factor - self.factor).abs() < f64::EPSILON {
            self.remaining_ms = self.remaining_ms.max(duration_ms);
        }
    }

    /// Advance real time and return the factor for this frame
    pub fn update(&mut self, now_ms: f64) -> f64 {
        if let Some(last) = self.last_timestamp.replace(now_ms) {
            self.remaining_ms -= (now_ms - last).max(0.0);
        }
        self.factor()
    }

    #[inline]
    pub fn factor(&self) -> f64 {
        if self.remaining_ms > 0.0 {
            self.factor
        } else {
            1.0
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.remaining_ms > 0.0
    }
}

impl Default for HitStop {
    fn default() -> Self {
        Self::new()
    }
}
