//! Leaky integrate-and-fire population
//!
//! Reference state updater used to drive the scheduler with realistic spike
//! trains. Integrates `dv/dt = (v_rest - v + R * I) / tau` with forward Euler,
//! where `I` is the sum of the per-neuron variable `i` and an optional input
//! table sampled at the clock tick.

use crate::clock::Clock;
use crate::error::*;
use crate::group::NeuronGroup;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters shared by every neuron of a [`LifGroup`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LifParams {
    /// Resting potential
    pub v_rest: f64,
    /// Reset potential
    pub v_reset: f64,
    /// Threshold potential
    pub v_thresh: f64,
    /// Refractory period (s)
    pub t_refrac: f64,
    /// Membrane resistance
    pub r_m: f64,
}

impl Default for LifParams {
    fn default() -> Self {
        // Dimensionless integrate-and-fire: reset 0, threshold 1.
        Self {
            v_rest: 0.0,
            v_reset: 0.0,
            v_thresh: 1.0,
            t_refrac: 0.0,
            r_m: 1.0,
        }
    }
}

impl LifParams {
    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        if self.v_thresh <= self.v_reset {
            return Err(SimError::invalid_parameter(
                "v_thresh",
                format!("{} (with v_reset={})", self.v_thresh, self.v_reset),
                "> v_reset",
            ));
        }
        if !(self.t_refrac >= 0.0) {
            return Err(SimError::invalid_parameter(
                "t_refrac",
                self.t_refrac.to_string(),
                ">= 0.0",
            ));
        }
        if !(self.r_m > 0.0) {
            return Err(SimError::invalid_parameter(
                "r_m",
                self.r_m.to_string(),
                "> 0.0",
            ));
        }
        Ok(())
    }
}

/// Input current sampled from a table, one value per `dt` starting at `start`
///
/// Outside the table the input is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedInput {
    values: Vec<f64>,
    start: f64,
    dt: f64,
}

impl TimedInput {
    /// Create a table
    pub fn new(values: Vec<f64>, start: f64, dt: f64) -> Result<Self> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::invalid_parameter("dt", dt.to_string(), "> 0"));
        }
        Ok(Self { values, start, dt })
    }

    /// Value at time `t`
    pub fn at(&self, t: f64) -> f64 {
        let k = ((t - self.start) / self.dt).round();
        if k < 0.0 {
            return 0.0;
        }
        self.values.get(k as usize).copied().unwrap_or(0.0)
    }
}

/// Population of leaky integrate-and-fire neurons with per-neuron `tau`
///
/// Variables: `"v"` (membrane potential), `"i"` (constant input current),
/// `"tau"` (membrane time constant, s).
#[derive(Debug, Clone)]
pub struct LifGroup {
    params: LifParams,
    v: Vec<f64>,
    i: Vec<f64>,
    tau: Vec<f64>,
    last_spike: Vec<Option<f64>>,
    input: Option<TimedInput>,
    spikes: Vec<usize>,
}

impl LifGroup {
    /// Create a population with one neuron per time constant
    pub fn new(taus: Vec<f64>, params: LifParams) -> Result<Self> {
        params.validate()?;
        if let Some(&tau) = taus.iter().find(|t| !(**t > 0.0) || !t.is_finite()) {
            return Err(SimError::invalid_parameter(
                "tau",
                tau.to_string(),
                "finite and > 0",
            ));
        }
        let n = taus.len();
        Ok(Self {
            v: vec![params.v_rest; n],
            i: vec![0.0; n],
            last_spike: vec![None; n],
            tau: taus,
            params,
            input: None,
            spikes: Vec::new(),
        })
    }

    /// Drive every neuron with a shared input table
    pub fn with_input(mut self, input: TimedInput) -> Self {
        self.input = Some(input);
        self
    }

    /// Set a constant input current for every neuron
    pub fn with_current(mut self, current: f64) -> Self {
        self.i.iter_mut().for_each(|i| *i = current);
        self
    }

    /// Parameters
    pub fn params(&self) -> &LifParams {
        &self.params
    }

    fn is_refractory(&self, k: usize, t: f64) -> bool {
        match self.last_spike[k] {
            Some(last) => t - last < self.params.t_refrac,
            None => false,
        }
    }
}

impl NeuronGroup for LifGroup {
    fn len(&self) -> usize {
        self.v.len()
    }

    fn spikes(&self) -> &[usize] {
        &self.spikes
    }

    fn state(&self, var: &str) -> Option<&[f64]> {
        match var {
            "v" => Some(self.v.as_slice()),
            "i" => Some(self.i.as_slice()),
            "tau" => Some(self.tau.as_slice()),
            _ => None,
        }
    }

    fn state_mut(&mut self, var: &str) -> Option<&mut [f64]> {
        match var {
            "v" => Some(self.v.as_mut_slice()),
            "i" => Some(self.i.as_mut_slice()),
            "tau" => Some(self.tau.as_mut_slice()),
            _ => None,
        }
    }

    fn update(&mut self, clock: &Clock) -> Result<()> {
        self.spikes.clear();
        let t = clock.t();
        let dt = clock.dt();
        let external = self.input.as_ref().map_or(0.0, |input| input.at(t));

        for k in 0..self.v.len() {
            if self.is_refractory(k, t) {
                continue;
            }
            let drive = self.params.r_m * (self.i[k] + external);
            self.v[k] += dt * (self.params.v_rest - self.v[k] + drive) / self.tau[k];

            if self.v[k] >= self.params.v_thresh {
                self.spikes.push(k);
            }
        }
        Ok(())
    }

    fn reset(&mut self, clock: &Clock) -> Result<()> {
        let t = clock.t();
        for &k in &self.spikes {
            self.v[k] = self.params.v_reset;
            self.last_spike[k] = Some(t);
        }
        Ok(())
    }

    fn reinit(&mut self) {
        self.v.iter_mut().for_each(|v| *v = self.params.v_rest);
        self.last_spike.iter_mut().for_each(|s| *s = None);
        self.spikes.clear();
    }
}
