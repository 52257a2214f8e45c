//! Simulation clocks
//!
//! A clock counts ticks instead of accumulating `dt`, so its time is always
//! exactly `start + tick * dt` and never drifts.

use crate::error::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a clock registered with a [`crate::Network`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClockId(pub(crate) usize);

impl ClockId {
    /// The clock every network is created with
    pub const DEFAULT: ClockId = ClockId(0);

    /// Registration index of the clock
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Discrete time base
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Clock {
    start: f64,
    dt: f64,
    tick: u64,
}

impl Clock {
    /// Create a clock starting at zero
    pub fn new(dt: f64) -> Result<Self> {
        Self::with_start(0.0, dt)
    }

    /// Create a clock starting at `start` seconds
    pub fn with_start(start: f64, dt: f64) -> Result<Self> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::invalid_parameter(
                "dt",
                dt.to_string(),
                "finite and > 0",
            ));
        }
        if !start.is_finite() {
            return Err(SimError::invalid_parameter(
                "start",
                start.to_string(),
                "finite",
            ));
        }
        Ok(Self { start, dt, tick: 0 })
    }

    /// Current time (s)
    #[inline]
    pub fn t(&self) -> f64 {
        self.start + self.tick as f64 * self.dt
    }

    /// Step size (s)
    #[inline]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Start time (s)
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Number of ticks taken since start
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Advance by one step
    pub(crate) fn advance(&mut self) {
        self.tick += 1;
    }

    /// Number of whole ticks spanning `duration`
    ///
    /// Fails when `duration` is negative, not finite, or not an integer
    /// multiple of `dt` within a relative tolerance of `1e-9`.
    pub fn ticks_for(&self, duration: f64) -> Result<u64> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(SimError::invalid_parameter(
                "duration",
                duration.to_string(),
                "finite and >= 0",
            ));
        }
        let steps = duration / self.dt;
        let rounded = steps.round();
        if (steps - rounded).abs() > 1e-9 * rounded.max(1.0) {
            return Err(SimError::invalid_config(format!(
                "duration {} is not a whole number of ticks of dt={}",
                duration, self.dt
            )));
        }
        Ok(rounded as u64)
    }

    /// Go back to the start time
    pub fn reinit(&mut self) {
        self.tick = 0;
    }

    /// Jump to the last tick at or before `t`
    pub fn reinit_to(&mut self, t: f64) -> Result<()> {
        if !t.is_finite() || t < self.start {
            return Err(SimError::invalid_parameter(
                "t",
                t.to_string(),
                format!(">= clock start {}", self.start),
            ));
        }
        // Small tolerance so that t = k * dt lands on tick k.
        self.tick = ((t - self.start) / self.dt + 1e-9).floor() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_validation() {
        assert!(Clock::new(0.0).is_err());
        assert!(Clock::new(-1e-4).is_err());
        assert!(Clock::new(f64::NAN).is_err());
        assert!(Clock::with_start(f64::INFINITY, 1e-4).is_err());
        assert!(Clock::new(1e-4).is_ok());
    }

    #[test]
    fn test_clock_advance_is_exact() {
        let mut clock = Clock::with_start(0.5, 0.25).unwrap();
        assert_eq!(clock.t(), 0.5);
        for _ in 0..6 {
            clock.advance();
        }
        assert_eq!(clock.tick(), 6);
        assert_eq!(clock.t(), 2.0);

        clock.reinit();
        assert_eq!(clock.t(), 0.5);
    }

    #[test]
    fn test_ticks_for() {
        let clock = Clock::new(1e-4).unwrap();
        assert_eq!(clock.ticks_for(2e-3).unwrap(), 20);
        assert_eq!(clock.ticks_for(0.0).unwrap(), 0);
        assert_eq!(clock.ticks_for(0.5).unwrap(), 5000);
        assert!(clock.ticks_for(1.5e-4).is_err());
        assert!(clock.ticks_for(-1e-3).is_err());
        assert!(clock.ticks_for(f64::INFINITY).is_err());
    }

    #[test]
    fn test_reinit_to() {
        let mut clock = Clock::new(1e-4).unwrap();
        clock.reinit_to(3e-3).unwrap();
        assert_eq!(clock.tick(), 30);
        clock.reinit_to(3.05e-3).unwrap();
        assert_eq!(clock.tick(), 30);
        assert!(clock.reinit_to(-1.0).is_err());
    }
}
