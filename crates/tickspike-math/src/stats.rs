//! Statistics for monitor summaries and spike trains
//!
//! [`RunningStats`] is the streaming accumulator used by state monitors: it sees
//! one population-wide sample vector per recorded tick and never stores the
//! samples themselves. The free functions are the batch equivalents.

use crate::{Float, MathError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-component running mean and variance over a stream of equal-length vectors
///
/// Uses Welford's update so the unbiased variance equals
/// `(sum_sq / n - mean^2) * n / (n - 1)` without the cancellation of the
/// naive sum-of-squares form.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunningStats {
    count: usize,
    mean: Vec<Float>,
    m2: Vec<Float>,
}

impl RunningStats {
    /// Create an accumulator for vectors of `width` components
    pub fn new(width: usize) -> Self {
        Self {
            count: 0,
            mean: vec![0.0; width],
            m2: vec![0.0; width],
        }
    }

    /// Number of components per sample
    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// Number of samples pushed so far
    pub fn count(&self) -> usize {
        self.count
    }

    /// Add one sample vector
    pub fn push(&mut self, sample: &[Float]) -> Result<()> {
        if sample.len() != self.width() {
            return Err(MathError::DimensionMismatch {
                expected: self.width(),
                got: sample.len(),
            });
        }

        self.count += 1;
        let n = self.count as Float;
        for ((mean, m2), &x) in self.mean.iter_mut().zip(self.m2.iter_mut()).zip(sample) {
            let delta = x - *mean;
            *mean += delta / n;
            *m2 += delta * (x - *mean);
        }
        Ok(())
    }

    /// Per-component mean (zeros before the first sample)
    pub fn mean(&self) -> &[Float] {
        &self.mean
    }

    /// Per-component unbiased variance (zeros with fewer than two samples)
    pub fn var(&self) -> Vec<Float> {
        if self.count < 2 {
            return vec![0.0; self.width()];
        }
        let denom = (self.count - 1) as Float;
        self.m2.iter().map(|m2| m2 / denom).collect()
    }

    /// Per-component standard deviation, the square root of [`RunningStats::var`]
    pub fn std(&self) -> Vec<Float> {
        self.var().into_iter().map(Float::sqrt).collect()
    }

    /// Forget all samples, keeping the width
    pub fn clear(&mut self) {
        self.count = 0;
        self.mean.iter_mut().for_each(|m| *m = 0.0);
        self.m2.iter_mut().for_each(|m| *m = 0.0);
    }
}

/// Calculate mean of a data slice
pub fn mean(data: &[Float]) -> Float {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<Float>() / data.len() as Float
}

/// Calculate sample variance (Bessel's correction)
pub fn variance(data: &[Float]) -> Float {
    if data.len() < 2 {
        return 0.0;
    }

    let mean_val = mean(data);
    let sum_sq_diff: Float = data.iter()
        .map(|&x| (x - mean_val) * (x - mean_val))
        .sum();

    sum_sq_diff / (data.len() - 1) as Float
}

/// Calculate standard deviation
pub fn standard_deviation(data: &[Float]) -> Float {
    variance(data).sqrt()
}

/// Mean firing rate (Hz) of a spike train observed for `duration` seconds
///
/// Returns 0.0 for a non-positive duration.
pub fn firing_rate(spike_count: usize, duration: Float) -> Float {
    if duration <= 0.0 {
        return 0.0;
    }
    spike_count as Float / duration
}
