//! Execution phases and per-operation scheduling
//!
//! Every tick of a clock runs its operations phase by phase:
//!
//! ```text
//! start
//! before_groups      -> groups: state update + threshold
//! after_groups
//! before_connections -> connections: propagation
//! after_connections
//! before_resets      -> groups: reset
//! after_resets
//! end
//! ```

use crate::clock::ClockId;
use crate::error::*;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Ordering slot within one clock tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Phase {
    /// First slot of the tick
    Start,
    /// Before the groups update their state
    BeforeGroups,
    /// After state update and threshold
    AfterGroups,
    /// Before synaptic propagation
    BeforeConnections,
    /// After synaptic propagation
    AfterConnections,
    /// Before the groups reset firing neurons
    BeforeResets,
    /// After reset
    AfterResets,
    /// Last slot of the tick
    End,
}

impl Phase {
    /// All phases in execution order
    pub const ALL: [Phase; 8] = [
        Phase::Start,
        Phase::BeforeGroups,
        Phase::AfterGroups,
        Phase::BeforeConnections,
        Phase::AfterConnections,
        Phase::BeforeResets,
        Phase::AfterResets,
        Phase::End,
    ];

    /// Name used in configuration
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::BeforeGroups => "before_groups",
            Phase::AfterGroups => "after_groups",
            Phase::BeforeConnections => "before_connections",
            Phase::AfterConnections => "after_connections",
            Phase::BeforeResets => "before_resets",
            Phase::AfterResets => "after_resets",
            Phase::End => "end",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Phase {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        Phase::ALL
            .iter()
            .copied()
            .find(|phase| phase.name() == s)
            .ok_or_else(|| SimError::invalid_config(format!("unknown phase name '{}'", s)))
    }
}

/// When and how often an operation runs
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Schedule {
    /// Slot within the tick
    pub when: Phase,
    /// Run every `timestep` ticks of the clock (>= 1)
    pub timestep: u32,
    /// Clock to run on; `None` uses the source group's clock, or the default
    /// clock for operations without a source
    pub clock: Option<ClockId>,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            when: Phase::End,
            timestep: 1,
            clock: None,
        }
    }
}

impl Schedule {
    /// Schedule at `when` on every tick of the resolved clock
    pub fn at(when: Phase) -> Self {
        Self {
            when,
            ..Default::default()
        }
    }

    /// Set the decimation interval
    pub fn with_timestep(mut self, timestep: u32) -> Self {
        self.timestep = timestep;
        self
    }

    /// Bind to an explicit clock
    pub fn with_clock(mut self, clock: ClockId) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        if self.timestep == 0 {
            return Err(SimError::invalid_parameter("timestep", "0", ">= 1"));
        }
        Ok(())
    }

    /// Whether the operation is due on the `elapsed`-th tick of its clock,
    /// counting from 1
    ///
    /// `N` ticks therefore give `floor(N / timestep)` executions.
    #[inline]
    pub fn is_due(&self, elapsed: u64) -> bool {
        elapsed % u64::from(self.timestep) == 0
    }
}
