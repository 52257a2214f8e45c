//! Coincidence matching and the gamma factor
//!
//! A generated spike at `s` and a reference spike at `r` coincide when
//! `s - delta <= r <= s + delta`. Matching is greedy and one-to-one: generated
//! spikes are taken in time order and each claims the earliest unclaimed
//! reference spike inside its window.
//!
//! The gamma factor compares the coincidence count against the count expected
//! from a Poisson train with the generated train's mean rate:
//!
//! ```text
//! rate     = n_gen / duration
//! expected = 2 * delta * rate * n_ref
//! norm     = 0.5 * (1 - 2 * delta * rate) * (n_gen + n_ref)
//! gamma    = (coincidences - expected) / norm
//! ```
//!
//! A generated train identical to the reference scores exactly 1.

use crate::stats::firing_rate;
use crate::{Float, MathError, Result};

/// Gamma factor from already-counted coincidences
///
/// Degenerate inputs (an empty train on either side, a non-positive
/// duration, or a rate so high that `2 * delta * rate >= 1`) score 0.0.
pub fn gamma_from_counts(
    coincidences: usize,
    n_generated: usize,
    n_reference: usize,
    delta: Float,
    duration: Float,
) -> Float {
    if n_generated == 0 || n_reference == 0 || duration <= 0.0 {
        return 0.0;
    }

    let rate = firing_rate(n_generated, duration);
    let window_fraction = 1.0 - 2.0 * delta * rate;
    if window_fraction <= 0.0 {
        return 0.0;
    }

    let expected = 2.0 * delta * rate * n_reference as Float;
    let norm = 0.5 * window_fraction * (n_generated + n_reference) as Float;
    (coincidences as Float - expected) / norm
}

/// Count greedy one-to-one coincidences between two spike trains
///
/// Both trains are sorted before matching, so callers may pass them in any
/// order.
pub fn coincidence_count(generated: &[Float], reference: &[Float], delta: Float) -> Result<usize> {
    validate_delta(delta)?;
    let generated = sorted_train(generated, "generated")?;
    let reference = sorted_train(reference, "reference")?;

    let mut next_free = 0;
    let mut count = 0;
    for &s in &generated {
        // First reference spike not before the window, but never one already claimed.
        let lower = reference.partition_point(|&r| r < s - delta).max(next_free);
        if lower < reference.len() && reference[lower] <= s + delta {
            count += 1;
            next_free = lower + 1;
        }
    }
    Ok(count)
}

/// Offline gamma factor of `generated` against `reference`
///
/// `duration` is the length of the recording the generated train comes from
/// and sets its mean rate.
pub fn gamma_factor(
    generated: &[Float],
    reference: &[Float],
    delta: Float,
    duration: Float,
) -> Result<Float> {
    let coincidences = coincidence_count(generated, reference, delta)?;
    Ok(gamma_from_counts(
        coincidences,
        generated.len(),
        reference.len(),
        delta,
        duration,
    ))
}

fn validate_delta(delta: Float) -> Result<()> {
    if !delta.is_finite() || delta <= 0.0 {
        return Err(MathError::invalid_input(format!(
            "coincidence window must be finite and > 0, got {}",
            delta
        )));
    }
    Ok(())
}

fn sorted_train(train: &[Float], name: &str) -> Result<Vec<Float>> {
    if train.iter().any(|t| !t.is_finite()) {
        return Err(MathError::invalid_input(format!(
            "{} train contains a non-finite spike time",
            name
        )));
    }
    let mut sorted = train.to_vec();
    sorted.sort_by(Float::total_cmp);
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Float = 1e-3;

    #[test]
    fn test_window_is_inclusive() {
        assert_eq!(coincidence_count(&[3.5 * MS], &[3.0 * MS], 1.0 * MS).unwrap(), 1);
        assert_eq!(coincidence_count(&[5.0 * MS], &[3.0 * MS], 1.0 * MS).unwrap(), 0);
        assert_eq!(coincidence_count(&[0.5], &[0.25], 0.25).unwrap(), 1);
    }

    #[test]
    fn test_reference_spike_claimed_once() {
        let reference = [3.0 * MS];
        let generated = [3.5 * MS, 3.8 * MS];
        assert_eq!(coincidence_count(&generated, &reference, 1.0 * MS).unwrap(), 1);
    }

    #[test]
    fn test_generated_spike_claims_once() {
        // One generated spike inside two reference windows only takes the first.
        let reference = [9.0 * MS, 11.0 * MS];
        let generated = [10.0 * MS];
        assert_eq!(coincidence_count(&generated, &reference, 2.0 * MS).unwrap(), 1);
    }

    #[test]
    fn test_unsorted_input() {
        let reference = [30.0 * MS, 10.0 * MS, 20.0 * MS];
        let generated = [20.5 * MS, 10.2 * MS];
        assert_eq!(coincidence_count(&generated, &reference, 1.0 * MS).unwrap(), 2);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(coincidence_count(&[1.0], &[1.0], 0.0).is_err());
        assert!(coincidence_count(&[1.0], &[1.0], Float::NAN).is_err());
        assert!(coincidence_count(&[Float::INFINITY], &[1.0], 0.1).is_err());
        assert!(gamma_factor(&[1.0], &[Float::NAN], 0.1, 2.0).is_err());
    }

    #[test]
    fn test_perfect_match_scores_one() {
        let train: Vec<Float> = (1..=50).map(|k| k as Float * 19.0 * MS).collect();
        let gamma = gamma_factor(&train, &train, 2.0 * MS, 1.0).unwrap();
        assert!((gamma - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_coincidence_is_negative() {
        let reference: Vec<Float> = (1..=20).map(|k| k as Float * 50.0 * MS).collect();
        let generated: Vec<Float> = reference.iter().map(|t| t + 25.0 * MS).collect();
        let gamma = gamma_factor(&generated, &reference, 1.0 * MS, 1.0).unwrap();
        assert!(gamma < 0.0);
    }

    #[test]
    fn test_degenerate_values() {
        assert_eq!(gamma_from_counts(0, 0, 10, 1.0 * MS, 1.0), 0.0);
        assert_eq!(gamma_from_counts(0, 10, 0, 1.0 * MS, 1.0), 0.0);
        assert_eq!(gamma_from_counts(3, 10, 10, 1.0 * MS, 0.0), 0.0);
        // 1000 spikes in 1s with a 1ms window saturates the window
        assert_eq!(gamma_from_counts(3, 1000, 10, 1.0 * MS, 1.0), 0.0);

        let empty: [Float; 0] = [];
        assert_eq!(gamma_factor(&empty, &[0.1, 0.2], 1.0 * MS, 1.0).unwrap(), 0.0);
    }

    #[test]
    fn test_closed_form() {
        // rate 10 Hz, delta 2 ms: expected = 2*0.002*10*20 = 0.8
        // norm = 0.5 * (1 - 0.04) * 30 = 14.4
        let gamma = gamma_from_counts(8, 10, 20, 2.0 * MS, 1.0);
        assert!((gamma - (8.0 - 0.8) / 14.4).abs() < 1e-12);
    }
}
