//! Spike recording

use crate::clock::ClockId;
use crate::error::*;
use crate::group::GroupId;
use crate::operation::{Operation, TickContext};
use crate::schedule::{Phase, Schedule};
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Spike monitor configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpikeMonitorParams {
    /// Keep every `(neuron, time)` pair; `None` means yes unless a callback is
    /// supplied
    pub record: Option<bool>,
    /// Slot within the tick
    pub when: Phase,
    /// Read the firing list every `timestep` ticks
    pub timestep: u32,
    /// Clock to run on; defaults to the source's clock
    pub clock: Option<ClockId>,
}

impl Default for SpikeMonitorParams {
    fn default() -> Self {
        Self {
            record: None,
            when: Phase::AfterGroups,
            timestep: 1,
            clock: None,
        }
    }
}

impl SpikeMonitorParams {
    /// Set whether spike pairs are kept
    pub fn with_record(mut self, record: bool) -> Self {
        self.record = Some(record);
        self
    }

    /// Set the phase
    pub fn with_when(mut self, when: Phase) -> Self {
        self.when = when;
        self
    }

    /// Set the decimation interval
    pub fn with_timestep(mut self, timestep: u32) -> Self {
        self.timestep = timestep;
        self
    }

    /// Run on an explicit clock
    pub fn with_clock(mut self, clock: ClockId) -> Self {
        self.clock = Some(clock);
        self
    }

    fn schedule(&self) -> Schedule {
        Schedule {
            when: self.when,
            timestep: self.timestep,
            clock: self.clock,
        }
    }
}

type SpikeFn = Box<dyn FnMut(&[usize])>;

/// Records the spikes of a group
///
/// The flat, time-ordered `spikes` sequence is the only store; per-neuron
/// spike times are derived from it on demand.
pub struct SpikeMonitor {
    source: GroupId,
    schedule: Schedule,
    record: bool,
    function: Option<SpikeFn>,
    spikes: Vec<(usize, f64)>,
    nspikes: usize,
}

impl SpikeMonitor {
    /// Record every spike of `source`
    pub fn new(source: GroupId) -> Self {
        Self::build(source, SpikeMonitorParams::default(), None)
    }

    /// Monitor with explicit parameters
    pub fn with_params(source: GroupId, params: SpikeMonitorParams) -> Self {
        Self::build(source, params, None)
    }

    /// Hand every tick's firing list to `function` instead of storing pairs
    ///
    /// Fails if `params` explicitly asks for recording as well.
    pub fn with_function<F>(source: GroupId, params: SpikeMonitorParams, function: F) -> Result<Self>
    where
        F: FnMut(&[usize]) + 'static,
    {
        if params.record == Some(true) {
            return Err(SimError::invalid_config(
                "spike monitor cannot both record spikes and call a function",
            ));
        }
        Ok(Self::build(source, params, Some(Box::new(function))))
    }

    fn build(source: GroupId, params: SpikeMonitorParams, function: Option<SpikeFn>) -> Self {
        let record = params.record.unwrap_or(function.is_none());
        Self {
            source,
            schedule: params.schedule(),
            record,
            function,
            spikes: Vec::new(),
            nspikes: 0,
        }
    }

    /// Total number of spikes seen
    pub fn nspikes(&self) -> usize {
        self.nspikes
    }

    /// Recorded `(neuron, time)` pairs in time order
    pub fn spikes(&self) -> &[(usize, f64)] {
        &self.spikes
    }

    /// Whether spike pairs are kept
    pub fn is_recording(&self) -> bool {
        self.record
    }

    /// Spike times grouped by neuron, each ascending
    pub fn spiketimes(&self) -> BTreeMap<usize, Vec<f64>> {
        let mut trains: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        for &(i, t) in &self.spikes {
            trains.entry(i).or_default().push(t);
        }
        trains
    }

    /// Spike times of one neuron (empty if it never fired)
    pub fn spiketimes_of(&self, neuron: usize) -> Vec<f64> {
        self.spikes
            .iter()
            .filter(|(i, _)| *i == neuron)
            .map(|&(_, t)| t)
            .collect()
    }
}

impl fmt::Debug for SpikeMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpikeMonitor")
            .field("source", &self.source)
            .field("schedule", &self.schedule)
            .field("record", &self.record)
            .field("nspikes", &self.nspikes)
            .finish_non_exhaustive()
    }
}

impl Operation for SpikeMonitor {
    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    fn source(&self) -> Option<GroupId> {
        Some(self.source)
    }

    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Result<()> {
        let t = ctx.t();
        let group = ctx.group(self.source)?;
        let fired = group.spikes();
        if let Some(&i) = fired.iter().find(|&&i| i >= group.len()) {
            return Err(SimError::index_out_of_range(i, group.len()));
        }
        self.nspikes += fired.len();
        if self.record {
            self.spikes.extend(fired.iter().map(|&i| (i, t)));
        }
        if let Some(function) = self.function.as_mut() {
            function(fired);
        }
        Ok(())
    }

    fn reinit(&mut self) {
        self.spikes.clear();
        self.nspikes = 0;
    }

    fn name(&self) -> &'static str {
        "spike_monitor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ClockId};
    use crate::generator::SpikeGeneratorGroup;
    use crate::group::Groups;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn drive(monitor: &mut SpikeMonitor, events: Vec<(usize, f64)>, ticks: usize) {
        let mut groups = Groups::default();
        let id = groups.push(
            Box::new(SpikeGeneratorGroup::new(3, events).unwrap()),
            ClockId::DEFAULT,
        );
        assert_eq!(id, monitor.source);
        let mut clock = Clock::new(1e-3).unwrap();
        for _ in 0..ticks {
            groups.get_mut(id).unwrap().update(&clock).unwrap();
            let mut ctx = TickContext { clock: &clock, groups: &mut groups };
            monitor.execute(&mut ctx).unwrap();
            clock.advance();
        }
    }

    #[test]
    fn test_records_pairs_in_order() {
        let mut monitor = SpikeMonitor::new(GroupId(0));
        drive(&mut monitor, vec![(2, 1e-3), (0, 1e-3), (1, 3e-3)], 5);

        assert_eq!(monitor.nspikes(), 3);
        let neurons: Vec<usize> = monitor.spikes().iter().map(|s| s.0).collect();
        assert_eq!(neurons, vec![2, 0, 1]);
        assert_eq!(monitor.spiketimes_of(1), vec![monitor.spikes()[2].1]);
        assert!(monitor.spiketimes_of(7).is_empty());

        let trains = monitor.spiketimes();
        assert_eq!(trains.len(), 3);
        assert_eq!(trains[&0].len(), 1);

        monitor.reinit();
        assert_eq!(monitor.nspikes(), 0);
        assert!(monitor.spikes().is_empty());
    }

    #[test]
    fn test_count_only() {
        let params = SpikeMonitorParams::default().with_record(false);
        let mut monitor = SpikeMonitor::with_params(GroupId(0), params);
        drive(&mut monitor, vec![(0, 0.0), (1, 0.0), (1, 2e-3)], 4);

        assert_eq!(monitor.nspikes(), 3);
        assert!(monitor.spikes().is_empty());
        assert!(!monitor.is_recording());
    }

    #[test]
    fn test_function_receives_raw_lists() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut monitor = SpikeMonitor::with_function(
            GroupId(0),
            SpikeMonitorParams::default(),
            move |fired| sink.borrow_mut().extend_from_slice(fired),
        )
        .unwrap();
        drive(&mut monitor, vec![(0, 0.0), (1, 1e-3), (0, 2e-3)], 4);

        assert_eq!(*seen.borrow(), vec![0, 1, 0]);
        assert_eq!(monitor.nspikes(), 3);
        assert!(monitor.spikes().is_empty());
    }

    #[test]
    fn test_params_reach_the_schedule() {
        let params = SpikeMonitorParams::default()
            .with_when(Phase::End)
            .with_timestep(4)
            .with_clock(ClockId(1));
        let monitor = SpikeMonitor::with_params(GroupId(0), params);
        assert_eq!(
            monitor.schedule(),
            &Schedule::at(Phase::End).with_timestep(4).with_clock(ClockId(1))
        );
        assert!(SpikeMonitor::new(GroupId(0)).schedule().validate().is_ok());
    }

    #[test]
    fn test_function_and_record_conflict() {
        let params = SpikeMonitorParams::default().with_record(true);
        let result = SpikeMonitor::with_function(GroupId(0), params, |_| {});
        assert!(matches!(result, Err(SimError::Configuration { .. })));
    }
}
