//! Simulation clock.
//!
//! The tick counter is the source of truth. Simulated time is derived from
//! it as `tick * dt` so that long runs do not accumulate floating-point
//! drift, and the step length `dt` is fixed for the lifetime of a clock.

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// The step length is zero, negative, or not a number.
    #[error("invalid step length: {dt_sec}")]
    InvalidStep {
        /// The rejected step length in seconds.
        dt_sec: f64,
    },
}

/// Fixed-step simulated clock.
#[derive(Debug, Clone, PartialEq)]
pub struct SimClock {
    /// Ticks completed so far.
    tick: u64,
    /// Simulated seconds per tick.
    dt_sec: f64,
}

impl SimClock {
    /// Create a clock at tick 0.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidStep`] unless `dt_sec` is finite and
    /// greater than zero.
    pub fn new(dt_sec: f64) -> Result<Self, ClockError> {
        if !dt_sec.is_finite() || dt_sec <= 0.0 {
            return Err(ClockError::InvalidStep { dt_sec });
        }
        Ok(Self { tick: 0, dt_sec })
    }

    /// Advance the clock by one tick. Returns the new tick number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the tick counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        Ok(self.tick)
    }

    /// Ticks completed so far.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds per tick.
    pub const fn dt_sec(&self) -> f64 {
        self.dt_sec
    }

    /// Cumulative simulated seconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn sim_time_sec(&self) -> f64 {
        self.tick as f64 * self.dt_sec
    }

    /// Whether a period of `period_sec` elapsed during the last tick.
    ///
    /// True on the first tick at or after each multiple of the period.
    pub fn crossed_period(&self, period_sec: f64) -> bool {
        if period_sec <= 0.0 || self.tick == 0 {
            return false;
        }
        let now = self.sim_time_sec();
        let before = now - self.dt_sec;
        (now / period_sec).floor() > (before / period_sec).floor()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn clock_starts_at_tick_zero() {
        let clock = SimClock::new(1.0).unwrap();
        assert_eq!(clock.tick(), 0);
        assert!(clock.sim_time_sec().abs() < f64::EPSILON);
    }

    #[test]
    fn clock_advances() {
        let mut clock = SimClock::new(0.5).unwrap();
        assert_eq!(clock.advance().unwrap(), 1);
        assert_eq!(clock.advance().unwrap(), 2);
        assert!((clock.sim_time_sec() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_step() {
        assert!(matches!(SimClock::new(0.0), Err(ClockError::InvalidStep { .. })));
        assert!(SimClock::new(-1.0).is_err());
        assert!(SimClock::new(f64::NAN).is_err());
    }

    #[test]
    fn period_crossings() {
        let mut clock = SimClock::new(1.0).unwrap();
        let mut crossings = Vec::new();
        for _ in 0..45 {
            clock.advance().unwrap();
            if clock.crossed_period(15.0) {
                crossings.push(clock.tick());
            }
        }
        assert_eq!(crossings, vec![15, 30, 45]);
    }

    #[test]
    fn period_crossings_with_coarse_step() {
        let mut clock = SimClock::new(4.0).unwrap();
        let mut crossings = Vec::new();
        for _ in 0..10 {
            clock.advance().unwrap();
            if clock.crossed_period(15.0) {
                crossings.push(clock.tick());
            }
        }
        // 16s, 32s
        assert_eq!(crossings, vec![4, 8]);
    }
}
