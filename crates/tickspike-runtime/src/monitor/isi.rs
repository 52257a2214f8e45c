//! Interspike interval histogram

use crate::error::*;
use crate::group::GroupId;
use crate::operation::{Attach, Operation, TickContext};
use crate::schedule::{Phase, Schedule};

/// Histogram of the intervals between successive spikes of each neuron
///
/// `bin_edges` are ascending left edges: `counts[k]` holds the intervals in
/// `[bin_edges[k], bin_edges[k + 1])`, and the last bin everything from the
/// last edge up. Intervals shorter than the first edge are not counted.
#[derive(Debug, Clone)]
pub struct ISIHistogramMonitor {
    source: GroupId,
    schedule: Schedule,
    bin_edges: Vec<f64>,
    counts: Vec<usize>,
    last_spike: Vec<Option<f64>>,
    nspikes: usize,
}

impl ISIHistogramMonitor {
    /// Histogram the intervals of `source` into bins starting at `bin_edges` (s)
    pub fn new(source: GroupId, bin_edges: Vec<f64>) -> Result<Self> {
        if bin_edges.is_empty() {
            return Err(SimError::invalid_config("ISI histogram needs at least one bin edge"));
        }
        if let Some(e) = bin_edges.iter().find(|e| !e.is_finite()) {
            return Err(SimError::invalid_parameter("bin edge", e.to_string(), "finite"));
        }
        if bin_edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SimError::invalid_config("ISI bin edges must be strictly ascending"));
        }
        let counts = vec![0; bin_edges.len()];
        Ok(Self {
            source,
            schedule: Schedule::at(Phase::AfterGroups),
            bin_edges,
            counts,
            last_spike: Vec::new(),
            nspikes: 0,
        })
    }

    /// Left edges of the bins
    pub fn bin_edges(&self) -> &[f64] {
        &self.bin_edges
    }

    /// Intervals counted per bin
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Total number of spikes seen
    pub fn nspikes(&self) -> usize {
        self.nspikes
    }
}

impl Operation for ISIHistogramMonitor {
    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    fn source(&self) -> Option<GroupId> {
        Some(self.source)
    }

    fn attach(&mut self, ctx: &Attach<'_>) -> Result<()> {
        let n = ctx
            .source
            .map(|group| group.len())
            .ok_or(SimError::UnknownGroup { id: self.source.index() })?;
        self.last_spike = vec![None; n];
        Ok(())
    }

    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Result<()> {
        let t = ctx.t();
        let group = ctx.group(self.source)?;

        for &i in group.spikes() {
            let last = self
                .last_spike
                .get_mut(i)
                .ok_or_else(|| SimError::index_out_of_range(i, group.len()))?;
            if let Some(previous) = last.replace(t) {
                let bin = self.bin_edges.partition_point(|&edge| edge <= t - previous);
                if bin > 0 {
                    self.counts[bin - 1] += 1;
                }
            }
            self.nspikes += 1;
        }
        Ok(())
    }

    fn reinit(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
        self.last_spike.iter_mut().for_each(|t| *t = None);
        self.nspikes = 0;
    }

    fn name(&self) -> &'static str {
        "isi_histogram_monitor"
    }
}
