//! State variable recording and population statistics

use crate::clock::ClockId;
use crate::error::*;
use crate::group::GroupId;
use crate::operation::{Attach, Operation, TickContext};
use crate::schedule::{Phase, Schedule};
use std::collections::BTreeSet;
use tickspike_math::RunningStats;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which neurons keep a full trace
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Record {
    /// Statistics only
    #[default]
    None,
    /// A single neuron
    One(usize),
    /// A set of neurons
    Many(BTreeSet<usize>),
    /// Every neuron of the source
    All,
}

impl Record {
    fn resolve(&self, len: usize) -> Result<Vec<usize>> {
        let indices: Vec<usize> = match self {
            Record::None => Vec::new(),
            Record::One(i) => vec![*i],
            Record::Many(set) => set.iter().copied().collect(),
            Record::All => (0..len).collect(),
        };
        if let Some(&i) = indices.iter().find(|&&i| i >= len) {
            return Err(SimError::invalid_config(format!(
                "cannot record neuron {} of a population of {}",
                i, len
            )));
        }
        Ok(indices)
    }
}

impl From<bool> for Record {
    fn from(all: bool) -> Self {
        if all {
            Record::All
        } else {
            Record::None
        }
    }
}

impl From<usize> for Record {
    fn from(i: usize) -> Self {
        Record::One(i)
    }
}

impl From<Vec<usize>> for Record {
    fn from(indices: Vec<usize>) -> Self {
        Record::Many(indices.into_iter().collect())
    }
}

impl From<BTreeSet<usize>> for Record {
    fn from(indices: BTreeSet<usize>) -> Self {
        Record::Many(indices)
    }
}

/// State monitor configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StateMonitorParams {
    /// Neurons with a full trace
    pub record: Record,
    /// Slot within the tick
    pub when: Phase,
    /// Sample every `timestep` ticks
    pub timestep: u32,
    /// Clock to sample on; defaults to the source's clock
    pub clock: Option<ClockId>,
}

impl Default for StateMonitorParams {
    fn default() -> Self {
        Self {
            record: Record::None,
            when: Phase::End,
            timestep: 1,
            clock: None,
        }
    }
}

impl StateMonitorParams {
    /// Set the traced neurons
    pub fn with_record(mut self, record: impl Into<Record>) -> Self {
        self.record = record.into();
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

    /// Sample on an explicit clock
    pub fn with_clock(mut self, clock: ClockId) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        if self.timestep == 0 {
            return Err(SimError::invalid_config("state monitor timestep must be >= 1"));
        }
        Ok(())
    }

    fn schedule(&self) -> Schedule {
        Schedule {
            when: self.when,
            timestep: self.timestep,
            clock: self.clock,
        }
    }
}

/// Records one state variable of a group
///
/// Every sample feeds the running statistics of the whole population; only
/// the neurons selected by [`Record`] keep their trace. `times` grows on every
/// sample whatever the selection, so monitors on the same schedule share
/// aligned time axes.
#[derive(Debug, Clone)]
pub struct StateMonitor {
    source: GroupId,
    var: String,
    record: Record,
    schedule: Schedule,
    indices: Vec<usize>,
    traces: Vec<Vec<f64>>,
    times: Vec<f64>,
    stats: RunningStats,
}

impl StateMonitor {
    /// Monitor variable `var` of `source`
    pub fn new(source: GroupId, var: impl Into<String>, params: StateMonitorParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            source,
            var: var.into(),
            schedule: params.schedule(),
            record: params.record,
            indices: Vec::new(),
            traces: Vec::new(),
            times: Vec::new(),
            stats: RunningStats::new(0),
        })
    }

    /// Name of the monitored variable
    pub fn variable(&self) -> &str {
        &self.var
    }

    /// Sample times
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Number of samples taken
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// True before the first sample
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Per-neuron mean over all samples
    pub fn mean(&self) -> &[f64] {
        self.stats.mean()
    }

    /// Per-neuron unbiased variance over all samples
    pub fn var(&self) -> Vec<f64> {
        self.stats.var()
    }

    /// Per-neuron standard deviation over all samples
    pub fn std(&self) -> Vec<f64> {
        self.stats.std()
    }

    /// Trace of neuron `i`
    pub fn get(&self, i: usize) -> Result<&[f64]> {
        self.indices
            .iter()
            .position(|&k| k == i)
            .map(|slot| self.traces[slot].as_slice())
            .ok_or_else(|| SimError::index_out_of_range(i, self.stats.width()))
    }

    /// Neurons with a trace, ascending
    pub fn recorded_indices(&self) -> &[usize] {
        &self.indices
    }
}

impl Operation for StateMonitor {
    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    fn source(&self) -> Option<GroupId> {
        Some(self.source)
    }

    fn attach(&mut self, ctx: &Attach<'_>) -> Result<()> {
        let len = ctx
            .source
            .map(|group| group.len())
            .ok_or(SimError::UnknownGroup { id: self.source.index() })?;
        self.indices = self.record.resolve(len)?;
        self.traces = vec![Vec::new(); self.indices.len()];
        self.stats = RunningStats::new(len);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Result<()> {
        let t = ctx.t();
        let values = ctx
            .group(self.source)?
            .state(&self.var)
            .ok_or_else(|| SimError::unknown_variable(self.var.clone()))?;

        self.stats.push(values)?;
        for (trace, &i) in self.traces.iter_mut().zip(&self.indices) {
            trace.push(values[i]);
        }
        self.times.push(t);
        Ok(())
    }

    fn reinit(&mut self) {
        self.traces.iter_mut().for_each(Vec::clear);
        self.times.clear();
        self.stats.clear();
    }

    fn name(&self) -> &'static str {
        "state_monitor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::group::{Groups, PassiveGroup};

    fn setup(record: Record) -> (Groups, StateMonitor) {
        let mut groups = Groups::default();
        let id = groups.push(
            Box::new(PassiveGroup::new(3).with_variable("v", 0.0)),
            ClockId::DEFAULT,
        );
        let mut monitor =
            StateMonitor::new(id, "v", StateMonitorParams::default().with_record(record)).unwrap();
        let clock = Clock::new(1e-3).unwrap();
        let attach = Attach {
            source: Some(groups.get(id).unwrap()),
            clock: &clock,
        };
        monitor.attach(&attach).unwrap();
        (groups, monitor)
    }

    fn sample(groups: &mut Groups, monitor: &mut StateMonitor, clock: &Clock, v: [f64; 3]) {
        groups
            .get_mut(GroupId(0))
            .unwrap()
            .state_mut("v")
            .unwrap()
            .copy_from_slice(&v);
        let mut ctx = TickContext { clock, groups };
        monitor.execute(&mut ctx).unwrap();
    }

    #[test]
    fn test_record_conversions() {
        assert_eq!(Record::from(true), Record::All);
        assert_eq!(Record::from(false), Record::None);
        assert_eq!(Record::from(2), Record::One(2));
        assert_eq!(
            Record::from(vec![2, 0, 2]),
            Record::Many([0, 2].into_iter().collect())
        );
    }

    #[test]
    fn test_statistics_and_traces() {
        let (mut groups, mut monitor) = setup(Record::from(vec![0, 2]));
        let mut clock = Clock::new(1e-3).unwrap();
        for v in [[1.0, 2.0, 3.0], [3.0, 2.0, 1.0], [2.0, 2.0, 5.0]] {
            sample(&mut groups, &mut monitor, &clock, v);
            clock.advance();
        }

        assert_eq!(monitor.len(), 3);
        assert_eq!(monitor.mean(), &[2.0, 2.0, 3.0]);
        let var = monitor.var();
        assert!((var[0] - 1.0).abs() < 1e-12);
        assert_eq!(var[1], 0.0);
        assert!((var[2] - 4.0).abs() < 1e-12);
        assert!((monitor.std()[2] - 2.0).abs() < 1e-12);

        assert_eq!(monitor.get(2).unwrap(), &[3.0, 1.0, 5.0]);
        assert!(matches!(
            monitor.get(1),
            Err(SimError::IndexOutOfRange { index: 1, len: 3 })
        ));
        assert_eq!(monitor.recorded_indices(), &[0, 2]);
    }

    #[test]
    fn test_times_without_traces() {
        let (mut groups, mut monitor) = setup(Record::None);
        let clock = Clock::new(1e-3).unwrap();
        sample(&mut groups, &mut monitor, &clock, [1.0, 1.0, 1.0]);
        assert_eq!(monitor.times(), &[0.0]);
        assert!(monitor.get(0).is_err());
        // single sample: no spread yet
        assert_eq!(monitor.var(), vec![0.0; 3]);

        monitor.reinit();
        assert!(monitor.is_empty());
        assert_eq!(monitor.mean(), &[0.0; 3]);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(StateMonitorParams::default().with_timestep(0).validate().is_err());

        let mut groups = Groups::default();
        let id = groups.push(Box::new(PassiveGroup::new(2).with_variable("v", 0.0)), ClockId::DEFAULT);
        let clock = Clock::new(1e-3).unwrap();
        let attach = Attach {
            source: Some(groups.get(id).unwrap()),
            clock: &clock,
        };
        let mut monitor =
            StateMonitor::new(id, "v", StateMonitorParams::default().with_record(5usize)).unwrap();
        assert!(matches!(
            monitor.attach(&attach),
            Err(SimError::Configuration { .. })
        ));

        let mut monitor = StateMonitor::new(id, "w", StateMonitorParams::default()).unwrap();
        monitor.attach(&attach).unwrap();
        let mut ctx = TickContext { clock: &clock, groups: &mut groups };
        assert!(matches!(
            monitor.execute(&mut ctx),
            Err(SimError::UnknownVariable { .. })
        ));
    }
}
