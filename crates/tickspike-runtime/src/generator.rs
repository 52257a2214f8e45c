//! Spike sources without state variables

use crate::clock::Clock;
use crate::error::*;
use crate::group::NeuronGroup;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Replays a fixed list of `(neuron, time)` firing events
///
/// An event fires on the tick whose time is nearest to it, i.e. on the first
/// tick with `t_event < t + dt / 2`. Events earlier than the first tick fire
/// on the first tick. Events with equal times keep their given order.
#[derive(Debug, Clone)]
pub struct SpikeGeneratorGroup {
    n: usize,
    events: Vec<(usize, f64)>,
    cursor: usize,
    spikes: Vec<usize>,
}

impl SpikeGeneratorGroup {
    /// Create a generator of `n` neurons
    pub fn new(n: usize, mut events: Vec<(usize, f64)>) -> Result<Self> {
        for &(i, t) in &events {
            if i >= n {
                return Err(SimError::index_out_of_range(i, n));
            }
            if !t.is_finite() {
                return Err(SimError::invalid_parameter(
                    "spike time",
                    t.to_string(),
                    "finite",
                ));
            }
        }
        // Stable: simultaneous events keep their order.
        events.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(Self {
            n,
            events,
            cursor: 0,
            spikes: Vec::new(),
        })
    }

    /// Events not yet emitted
    pub fn pending(&self) -> &[(usize, f64)] {
        &self.events[self.cursor..]
    }
}

impl NeuronGroup for SpikeGeneratorGroup {
    fn len(&self) -> usize {
        self.n
    }

    fn spikes(&self) -> &[usize] {
        &self.spikes
    }

    fn state(&self, _var: &str) -> Option<&[f64]> {
        None
    }

    fn state_mut(&mut self, _var: &str) -> Option<&mut [f64]> {
        None
    }

    fn update(&mut self, clock: &Clock) -> Result<()> {
        self.spikes.clear();
        let horizon = clock.t() + 0.5 * clock.dt();
        while let Some(&(i, t)) = self.events.get(self.cursor) {
            if t >= horizon {
                break;
            }
            self.spikes.push(i);
            self.cursor += 1;
        }
        Ok(())
    }

    fn reinit(&mut self) {
        self.cursor = 0;
        self.spikes.clear();
    }
}

/// Independent Poisson spike sources
#[derive(Debug, Clone)]
pub struct PoissonGroup {
    rates: Vec<f64>,
    seed: u64,
    rng: StdRng,
    spikes: Vec<usize>,
}

impl PoissonGroup {
    /// One source per rate (Hz), reproducible from `seed`
    pub fn new(rates: Vec<f64>, seed: u64) -> Result<Self> {
        if let Some(&rate) = rates.iter().find(|r| !r.is_finite() || **r < 0.0) {
            return Err(SimError::invalid_parameter(
                "rate",
                rate.to_string(),
                "finite and >= 0",
            ));
        }
        Ok(Self {
            rates,
            seed,
            rng: StdRng::seed_from_u64(seed),
            spikes: Vec::new(),
        })
    }

    /// Rates (Hz)
    pub fn rates(&self) -> &[f64] {
        &self.rates
    }
}

impl NeuronGroup for PoissonGroup {
    fn len(&self) -> usize {
        self.rates.len()
    }

    fn spikes(&self) -> &[usize] {
        &self.spikes
    }

    fn state(&self, var: &str) -> Option<&[f64]> {
        (var == "rate").then_some(self.rates.as_slice())
    }

    fn state_mut(&mut self, var: &str) -> Option<&mut [f64]> {
        (var == "rate").then_some(self.rates.as_mut_slice())
    }

    fn update(&mut self, clock: &Clock) -> Result<()> {
        self.spikes.clear();
        let dt = clock.dt();
        for (i, rate) in self.rates.iter().enumerate() {
            if self.rng.gen::<f64>() < rate * dt {
                self.spikes.push(i);
            }
        }
        Ok(())
    }

    fn reinit(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
        self.spikes.clear();
    }
}
