//! Neuron groups: the state-update / threshold / reset collaborators
//!
//! The scheduler never integrates models itself. It drives anything that
//! implements [`NeuronGroup`], and monitors read the group's firing list and
//! state vectors through the same trait.

use crate::clock::{Clock, ClockId};
use crate::error::*;
use crate::AsAny;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a group registered with a [`crate::Network`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupId(pub(crate) usize);

impl GroupId {
    /// Registration index of the group
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A population of neurons driven by the scheduler
pub trait NeuronGroup: AsAny {
    /// Number of neurons
    fn len(&self) -> usize;

    /// True for an empty population
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices that fired on the most recent update, in reporting order
    fn spikes(&self) -> &[usize];

    /// Current values of a state variable, one per neuron
    fn state(&self, var: &str) -> Option<&[f64]>;

    /// Mutable access to a state variable
    fn state_mut(&mut self, var: &str) -> Option<&mut [f64]>;

    /// Advance state by one tick of `clock` and determine which neurons fire
    fn update(&mut self, clock: &Clock) -> Result<()>;

    /// Apply the reset to neurons that fired on this tick
    fn reset(&mut self, _clock: &Clock) -> Result<()> {
        Ok(())
    }

    /// Return to the initial state
    fn reinit(&mut self) {}
}

pub(crate) struct GroupSlot {
    pub(crate) group: Box<dyn NeuronGroup>,
    pub(crate) clock: ClockId,
}

/// The groups of a network, indexed by [`GroupId`]
#[derive(Default)]
pub struct Groups {
    slots: Vec<GroupSlot>,
}

impl Groups {
    pub(crate) fn push(&mut self, group: Box<dyn NeuronGroup>, clock: ClockId) -> GroupId {
        self.slots.push(GroupSlot { group, clock });
        GroupId(self.slots.len() - 1)
    }

    /// Number of registered groups
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no group is registered
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Look up a group
    pub fn get(&self, id: GroupId) -> Result<&dyn NeuronGroup> {
        self.slots
            .get(id.0)
            .map(|slot| slot.group.as_ref())
            .ok_or(SimError::UnknownGroup { id: id.0 })
    }

    /// Look up a group mutably
    pub fn get_mut(&mut self, id: GroupId) -> Result<&mut dyn NeuronGroup> {
        match self.slots.get_mut(id.0) {
            Some(slot) => Ok(slot.group.as_mut()),
            None => Err(SimError::UnknownGroup { id: id.0 }),
        }
    }

    /// Clock a group is updated on
    pub fn clock_of(&self, id: GroupId) -> Result<ClockId> {
        self.slots
            .get(id.0)
            .map(|slot| slot.clock)
            .ok_or(SimError::UnknownGroup { id: id.0 })
    }

    pub(crate) fn slots_mut(&mut self) -> impl Iterator<Item = &mut GroupSlot> {
        self.slots.iter_mut()
    }
}

/// Group with static state variables and an optional threshold/reset rule
///
/// Variables never change on their own (`dV/dt = 0`); network operations or
/// connections modify them. When a threshold is configured, every neuron whose
/// variable is `>= threshold` fires on update and is set to the reset value
/// in the reset phase.
#[derive(Debug, Clone)]
pub struct PassiveGroup {
    n: usize,
    variables: BTreeMap<String, Vec<f64>>,
    initial: BTreeMap<String, Vec<f64>>,
    threshold: Option<ThresholdRule>,
    spikes: Vec<usize>,
}

#[derive(Debug, Clone)]
struct ThresholdRule {
    var: String,
    threshold: f64,
    reset: f64,
}

impl PassiveGroup {
    /// Create a group of `n` neurons without variables
    pub fn new(n: usize) -> Self {
        Self {
            n,
            variables: BTreeMap::new(),
            initial: BTreeMap::new(),
            threshold: None,
            spikes: Vec::new(),
        }
    }

    /// Add a variable initialised to `value` for every neuron
    pub fn with_variable(mut self, name: impl Into<String>, value: f64) -> Self {
        let name = name.into();
        self.variables.insert(name.clone(), vec![value; self.n]);
        self.initial.insert(name, vec![value; self.n]);
        self
    }

    /// Fire when `var >= threshold`, then set `var = reset`
    pub fn with_threshold(
        mut self,
        var: impl Into<String>,
        threshold: f64,
        reset: f64,
    ) -> Result<Self> {
        let var = var.into();
        if !self.variables.contains_key(&var) {
            return Err(SimError::unknown_variable(var));
        }
        self.threshold = Some(ThresholdRule { var, threshold, reset });
        Ok(self)
    }
}

impl NeuronGroup for PassiveGroup {
    fn len(&self) -> usize {
        self.n
    }

    fn spikes(&self) -> &[usize] {
        &self.spikes
    }

    fn state(&self, var: &str) -> Option<&[f64]> {
        self.variables.get(var).map(Vec::as_slice)
    }

    fn state_mut(&mut self, var: &str) -> Option<&mut [f64]> {
        self.variables.get_mut(var).map(Vec::as_mut_slice)
    }

    fn update(&mut self, _clock: &Clock) -> Result<()> {
        self.spikes.clear();
        if let Some(rule) = &self.threshold {
            let values = self
                .variables
                .get(&rule.var)
                .ok_or_else(|| SimError::unknown_variable(rule.var.clone()))?;
            self.spikes.extend(
                values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| **v >= rule.threshold)
                    .map(|(i, _)| i),
            );
        }
        Ok(())
    }

    fn reset(&mut self, _clock: &Clock) -> Result<()> {
        if let Some(rule) = &self.threshold {
            let values = self
                .variables
                .get_mut(&rule.var)
                .ok_or_else(|| SimError::unknown_variable(rule.var.clone()))?;
            for &i in &self.spikes {
                values[i] = rule.reset;
            }
        }
        Ok(())
    }

    fn reinit(&mut self) {
        self.variables = self.initial.clone();
        self.spikes.clear();
    }
}
