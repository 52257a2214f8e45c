//! Online coincidence counting against a reference spike train
//!
//! [`CoincidenceCounter`] watches the firing list of a group tick by tick and
//! matches every spike against a fixed reference train with the greedy,
//! one-to-one rule of [`tickspike_math::coincidence`]. Its gamma factors are
//! computed by the same closed form as the offline
//! [`tickspike_math::gamma_factor`], so both agree exactly on the same data.

use crate::error::*;
use crate::group::GroupId;
use crate::operation::{Attach, Operation, TickContext};
use crate::schedule::{Phase, Schedule};
use tickspike_math::gamma_from_counts;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Sorted reference spike times
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceTrain {
    times: Vec<f64>,
}

impl ReferenceTrain {
    /// Reference train from spike times in any order
    pub fn new(mut times: Vec<f64>) -> Result<Self> {
        if let Some(t) = times.iter().find(|t| !t.is_finite()) {
            return Err(SimError::invalid_parameter(
                "reference spike time",
                t.to_string(),
                "finite",
            ));
        }
        times.sort_by(f64::total_cmp);
        Ok(Self { times })
    }

    /// Reference train given with a leading and a trailing sentinel spike
    ///
    /// The first time must lie strictly before, and the last strictly after,
    /// every other time. Only the interior spikes are kept.
    pub fn bracketed(times: Vec<f64>) -> Result<Self> {
        if times.len() < 2 {
            return Err(SimError::invalid_config(
                "bracketed reference train needs a leading and a trailing sentinel",
            ));
        }
        let (first, last) = (times[0], times[times.len() - 1]);
        let interior = &times[1..times.len() - 1];
        if !(first < last) || interior.iter().any(|&t| !(first < t && t < last)) {
            return Err(SimError::invalid_config(format!(
                "sentinels {} and {} do not bracket the reference spikes",
                first, last
            )));
        }
        Self::new(interior.to_vec())
    }

    /// Spike times, ascending
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Number of spikes
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// True for an empty train
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Streaming matcher of each source neuron against a reference train
#[derive(Debug, Clone)]
pub struct CoincidenceCounter {
    source: GroupId,
    reference: ReferenceTrain,
    delta: f64,
    schedule: Schedule,
    delays: Option<Vec<f64>>,
    offsets: Option<Vec<usize>>,
    dt: f64,
    ticks: u64,
    cursors: Vec<usize>,
    coincidences: Vec<usize>,
    model_length: Vec<usize>,
}

impl CoincidenceCounter {
    /// Match every neuron of `source` against `reference` with window `delta` (s)
    pub fn new(source: GroupId, reference: ReferenceTrain, delta: f64) -> Result<Self> {
        if !delta.is_finite() || delta <= 0.0 {
            return Err(SimError::invalid_parameter("delta", delta.to_string(), "finite and > 0"));
        }
        Ok(Self {
            source,
            reference,
            delta,
            schedule: Schedule::at(Phase::AfterGroups),
            delays: None,
            offsets: None,
            dt: 0.0,
            ticks: 0,
            cursors: Vec::new(),
            coincidences: Vec::new(),
            model_length: Vec::new(),
        })
    }

    /// Per-neuron delay added to every generated spike before matching
    pub fn with_delays(mut self, delays: Vec<f64>) -> Result<Self> {
        if let Some(d) = delays.iter().find(|d| !d.is_finite()) {
            return Err(SimError::invalid_parameter("delay", d.to_string(), "finite"));
        }
        self.delays = Some(delays);
        Ok(self)
    }

    /// Per-neuron index of the first reference spike available for matching
    pub fn with_offsets(mut self, offsets: Vec<usize>) -> Result<Self> {
        if let Some(&o) = offsets.iter().find(|&&o| o > self.reference.len()) {
            return Err(SimError::index_out_of_range(o, self.reference.len()));
        }
        self.offsets = Some(offsets);
        Ok(self)
    }

    /// Match at another phase of the source clock
    pub fn with_when(mut self, when: Phase) -> Self {
        self.schedule.when = when;
        self
    }

    /// Coincidence window (s)
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// The reference train
    pub fn reference(&self) -> &ReferenceTrain {
        &self.reference
    }

    /// Coincidences found so far, per neuron
    pub fn coincidences(&self) -> &[usize] {
        &self.coincidences
    }

    /// Spikes emitted so far, per neuron
    pub fn model_length(&self) -> &[usize] {
        &self.model_length
    }

    /// Observed time: ticks seen times the clock step
    pub fn duration(&self) -> f64 {
        self.ticks as f64 * self.dt
    }

    /// Reference spikes available to neuron `i`
    pub fn reference_length(&self, i: usize) -> Result<usize> {
        if i >= self.cursors.len() {
            return Err(SimError::index_out_of_range(i, self.cursors.len()));
        }
        Ok(self.available(i))
    }

    /// Per-neuron gamma factor of the spikes seen so far
    pub fn gamma(&self) -> Vec<f64> {
        let duration = self.duration();
        if duration <= 0.0 {
            log::debug!("gamma requested before any tick was observed; scoring 0");
        }
        let score = |i: usize| {
            gamma_from_counts(
                self.coincidences[i],
                self.model_length[i],
                self.available(i),
                self.delta,
                duration,
            )
        };

        #[cfg(feature = "parallel")]
        {
            (0..self.model_length.len()).into_par_iter().map(score).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            (0..self.model_length.len()).map(score).collect()
        }
    }

    fn offset(&self, i: usize) -> usize {
        self.offsets
            .as_ref()
            .and_then(|offsets| offsets.get(i))
            .copied()
            .unwrap_or(0)
    }

    fn delay(&self, i: usize) -> f64 {
        self.delays
            .as_ref()
            .and_then(|delays| delays.get(i))
            .copied()
            .unwrap_or(0.0)
    }

    fn available(&self, i: usize) -> usize {
        self.reference.len() - self.offset(i)
    }

    fn restart(&mut self, n: usize) {
        self.cursors = (0..n).map(|i| self.offset(i)).collect();
        self.coincidences = vec![0; n];
        self.model_length = vec![0; n];
        self.ticks = 0;
    }
}

impl Operation for CoincidenceCounter {
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
        if let Some(delays) = &self.delays {
            if delays.len() != n {
                return Err(SimError::invalid_config(format!(
                    "{} delays given for a population of {}",
                    delays.len(),
                    n
                )));
            }
        }
        if let Some(offsets) = &self.offsets {
            if offsets.len() != n {
                return Err(SimError::invalid_config(format!(
                    "{} offsets given for a population of {}",
                    offsets.len(),
                    n
                )));
            }
        }
        self.dt = ctx.clock.dt();
        self.restart(n);
        log::debug!(
            "coincidence counter on group {} with {} reference spikes, delta={}",
            self.source.index(),
            self.reference.len(),
            self.delta
        );
        Ok(())
    }

    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Result<()> {
        let t = ctx.t();
        let group = ctx.group(self.source)?;
        let reference = self.reference.times();

        for &i in group.spikes() {
            if i >= self.cursors.len() {
                return Err(SimError::index_out_of_range(i, self.cursors.len()));
            }
            self.model_length[i] += 1;

            let s = t + self.delay(i);
            let cursor = &mut self.cursors[i];
            while *cursor < reference.len() && reference[*cursor] < s - self.delta {
                *cursor += 1;
            }
            if *cursor < reference.len() && reference[*cursor] <= s + self.delta {
                self.coincidences[i] += 1;
                *cursor += 1;
            }
        }
        self.ticks += 1;
        Ok(())
    }

    fn reinit(&mut self) {
        let n = self.cursors.len();
        self.restart(n);
    }

    fn name(&self) -> &'static str {
        "coincidence_counter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ClockId};
    use crate::generator::SpikeGeneratorGroup;
    use crate::group::Groups;
    use tickspike_math::gamma_factor;

    const MS: f64 = 1e-3;

    fn drive(counter: &mut CoincidenceCounter, n: usize, events: Vec<(usize, f64)>, ticks: usize) {
        let mut groups = Groups::default();
        let id = groups.push(
            Box::new(SpikeGeneratorGroup::new(n, events).unwrap()),
            ClockId::DEFAULT,
        );
        let mut clock = Clock::new(0.5 * MS).unwrap();
        counter
            .attach(&Attach {
                source: Some(groups.get(id).unwrap()),
                clock: &clock,
            })
            .unwrap();
        for _ in 0..ticks {
            groups.get_mut(id).unwrap().update(&clock).unwrap();
            let mut ctx = TickContext { clock: &clock, groups: &mut groups };
            counter.execute(&mut ctx).unwrap();
            clock.advance();
        }
    }

    #[test]
    fn test_claimed_reference_spike_is_not_reused() {
        let reference = ReferenceTrain::new(vec![3.0 * MS]).unwrap();
        let mut counter = CoincidenceCounter::new(GroupId(0), reference, 1.0 * MS).unwrap();
        drive(&mut counter, 1, vec![(0, 3.5 * MS), (0, 4.5 * MS)], 20);

        assert_eq!(counter.model_length(), &[2]);
        assert_eq!(counter.coincidences(), &[1]);
        assert!((counter.duration() - 10.0 * MS).abs() < 1e-12);
    }

    #[test]
    fn test_no_spikes_scores_zero() {
        let reference = ReferenceTrain::new(vec![1.0 * MS, 2.0 * MS]).unwrap();
        let mut counter = CoincidenceCounter::new(GroupId(0), reference, 1.0 * MS).unwrap();
        drive(&mut counter, 2, vec![(1, 1.0 * MS)], 10);

        let gamma = counter.gamma();
        assert_eq!(gamma[0], 0.0);
        assert_eq!(counter.model_length(), &[0, 1]);
    }

    #[test]
    fn test_matches_offline_gamma() {
        let reference = vec![1.0 * MS, 2.5 * MS, 6.0 * MS, 9.0 * MS];
        let events = vec![(0, 1.0 * MS), (0, 2.0 * MS), (1, 4.0 * MS), (0, 8.5 * MS), (1, 9.5 * MS)];
        let mut counter =
            CoincidenceCounter::new(GroupId(0), ReferenceTrain::new(reference.clone()).unwrap(), 0.6 * MS)
                .unwrap()
                .with_delays(vec![0.0, 0.5 * MS])
                .unwrap();
        drive(&mut counter, 2, events, 24);

        let gamma = counter.gamma();
        let duration = counter.duration();
        let generated = [
            vec![1.0 * MS, 2.0 * MS, 8.5 * MS],
            vec![4.0 * MS + 0.5 * MS, 9.5 * MS + 0.5 * MS],
        ];
        for (i, train) in generated.iter().enumerate() {
            let offline = gamma_factor(train, &reference, 0.6 * MS, duration).unwrap();
            assert!((gamma[i] - offline).abs() < 1e-12, "neuron {}: {} vs {}", i, gamma[i], offline);
        }
    }

    #[test]
    fn test_offsets_and_reinit() {
        let reference = ReferenceTrain::new(vec![1.0 * MS, 3.0 * MS]).unwrap();
        let mut counter = CoincidenceCounter::new(GroupId(0), reference, 0.5 * MS)
            .unwrap()
            .with_offsets(vec![1])
            .unwrap();
        drive(&mut counter, 1, vec![(0, 1.0 * MS), (0, 3.0 * MS)], 10);

        assert_eq!(counter.coincidences(), &[1]);
        assert_eq!(counter.reference_length(0).unwrap(), 1);

        counter.reinit();
        assert_eq!(counter.coincidences(), &[0]);
        assert_eq!(counter.duration(), 0.0);
        assert!(CoincidenceCounter::new(GroupId(0), ReferenceTrain::new(vec![]).unwrap(), 1.0)
            .unwrap()
            .with_offsets(vec![1])
            .is_err());
    }

    #[test]
    fn test_gamma_before_any_tick() {
        let reference = ReferenceTrain::new(vec![1.0 * MS]).unwrap();
        let mut counter = CoincidenceCounter::new(GroupId(0), reference, 0.5 * MS).unwrap();
        drive(&mut counter, 2, vec![(0, 0.0)], 0);

        assert_eq!(counter.duration(), 0.0);
        assert_eq!(counter.gamma(), vec![0.0, 0.0]);
        assert_eq!(counter.gamma(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_reference_length_out_of_range() {
        let reference = ReferenceTrain::new(vec![1.0 * MS, 2.0 * MS, 3.0 * MS]).unwrap();
        let mut counter = CoincidenceCounter::new(GroupId(0), reference, 0.5 * MS)
            .unwrap()
            .with_offsets(vec![0, 1])
            .unwrap();
        assert!(matches!(
            counter.reference_length(0),
            Err(SimError::IndexOutOfRange { index: 0, len: 0 })
        ));

        drive(&mut counter, 2, vec![], 4);
        assert_eq!(counter.reference_length(1).unwrap(), 2);
        assert!(matches!(
            counter.reference_length(5),
            Err(SimError::IndexOutOfRange { index: 5, len: 2 })
        ));

        let plain = ReferenceTrain::new(vec![1.0 * MS]).unwrap();
        let mut counter = CoincidenceCounter::new(GroupId(0), plain, 0.5 * MS).unwrap();
        drive(&mut counter, 2, vec![], 4);
        assert!(counter.reference_length(5).is_err());
    }

    #[test]
    fn test_mismatched_delays() {
        let mut groups = Groups::default();
        let id = groups.push(
            Box::new(SpikeGeneratorGroup::new(3, vec![]).unwrap()),
            ClockId::DEFAULT,
        );
        let clock = Clock::new(MS).unwrap();
        let mut counter = CoincidenceCounter::new(id, ReferenceTrain::new(vec![]).unwrap(), MS)
            .unwrap()
            .with_delays(vec![0.0; 2])
            .unwrap();
        let result = counter.attach(&Attach {
            source: Some(groups.get(id).unwrap()),
            clock: &clock,
        });
        assert!(matches!(result, Err(SimError::Configuration { .. })));
    }

    #[test]
    fn test_bracketed_reference() {
        let train = ReferenceTrain::bracketed(vec![-1.0, 2.0 * MS, 1.0 * MS, 1.0]).unwrap();
        assert_eq!(train.times(), &[1.0 * MS, 2.0 * MS]);

        assert!(ReferenceTrain::bracketed(vec![0.0]).is_err());
        assert!(ReferenceTrain::bracketed(vec![0.5, 0.1, 1.0]).is_err());
        assert!(ReferenceTrain::new(vec![f64::NAN]).is_err());
    }
}
