//! Binned population firing rate

use crate::error::*;
use crate::group::GroupId;
use crate::operation::{Attach, Operation, TickContext};
use crate::schedule::{Phase, Schedule};

/// Population rate `spikes / (N * bin)` per time bin
///
/// Only complete bins are emitted; spikes of a trailing partial bin stay
/// pending until a later run completes it.
#[derive(Debug, Clone)]
pub struct PopulationRateMonitor {
    source: GroupId,
    bin: f64,
    schedule: Schedule,
    ticks_per_bin: u64,
    population: usize,
    pending_ticks: u64,
    pending_spikes: usize,
    bin_start: f64,
    rates: Vec<f64>,
    times: Vec<f64>,
}

impl PopulationRateMonitor {
    /// Monitor `source` with bins of `bin` seconds
    pub fn new(source: GroupId, bin: f64) -> Result<Self> {
        if !bin.is_finite() || bin <= 0.0 {
            return Err(SimError::invalid_parameter("bin", bin.to_string(), "finite and > 0"));
        }
        Ok(Self {
            source,
            bin,
            schedule: Schedule::at(Phase::AfterGroups),
            ticks_per_bin: 0,
            population: 0,
            pending_ticks: 0,
            pending_spikes: 0,
            bin_start: 0.0,
            rates: Vec::new(),
            times: Vec::new(),
        })
    }

    /// Bin width (s)
    pub fn bin(&self) -> f64 {
        self.bin
    }

    /// Rate of each completed bin (Hz)
    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    /// Start time of each completed bin
    pub fn times(&self) -> &[f64] {
        &self.times
    }
}

impl Operation for PopulationRateMonitor {
    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    fn source(&self) -> Option<GroupId> {
        Some(self.source)
    }

    fn attach(&mut self, ctx: &Attach<'_>) -> Result<()> {
        self.population = ctx
            .source
            .map(|group| group.len())
            .ok_or(SimError::UnknownGroup { id: self.source.index() })?;
        self.ticks_per_bin = ctx.clock.ticks_for(self.bin)?;
        if self.ticks_per_bin == 0 {
            return Err(SimError::invalid_config(format!(
                "rate bin {} is shorter than dt={}",
                self.bin,
                ctx.clock.dt()
            )));
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Result<()> {
        if self.pending_ticks == 0 {
            self.bin_start = ctx.t();
        }
        self.pending_spikes += ctx.group(self.source)?.spikes().len();
        self.pending_ticks += 1;

        if self.pending_ticks == self.ticks_per_bin {
            let rate = if self.population == 0 {
                0.0
            } else {
                self.pending_spikes as f64 / (self.population as f64 * self.bin)
            };
            self.rates.push(rate);
            self.times.push(self.bin_start);
            self.pending_ticks = 0;
            self.pending_spikes = 0;
        }
        Ok(())
    }

    fn reinit(&mut self) {
        self.pending_ticks = 0;
        self.pending_spikes = 0;
        self.rates.clear();
        self.times.clear();
    }

    fn name(&self) -> &'static str {
        "population_rate_monitor"
    }
}
