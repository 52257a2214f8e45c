//! Synaptic propagation collaborators
//!
//! A connection runs in the connections slot of its source group's clock. It
//! reads the source's firing list and applies weighted updates to a target
//! state variable. Any accelerated or sparse kernel is another implementation
//! of [`Propagation`].

use crate::error::*;
use crate::group::{GroupId, Groups};

/// Applies the effect of the current tick's spikes to target state
pub trait Propagation {
    /// Group whose spikes are propagated; also selects the clock
    fn source(&self) -> GroupId;

    /// Deliver this tick's spikes
    fn propagate(&mut self, groups: &mut Groups) -> Result<()>;
}

/// All-to-all connection with a dense row-major weight matrix
///
/// For every firing source neuron `i`, adds `weights[i][j]` to variable `var`
/// of target neuron `j`.
#[derive(Debug, Clone)]
pub struct DenseConnection {
    source: GroupId,
    target: GroupId,
    var: String,
    n_target: usize,
    weights: Vec<f64>,
}

impl DenseConnection {
    /// Create a connection; `weights.len()` must equal `n_source * n_target`
    pub fn new(
        groups: &Groups,
        source: GroupId,
        target: GroupId,
        var: impl Into<String>,
        weights: Vec<f64>,
    ) -> Result<Self> {
        let var = var.into();
        let n_source = groups.get(source)?.len();
        let target_group = groups.get(target)?;
        let n_target = target_group.len();
        if target_group.state(&var).is_none() {
            return Err(SimError::unknown_variable(var));
        }
        if weights.len() != n_source * n_target {
            return Err(SimError::invalid_config(format!(
                "weight matrix has {} entries, expected {}x{}",
                weights.len(),
                n_source,
                n_target
            )));
        }
        Ok(Self {
            source,
            target,
            var,
            n_target,
            weights,
        })
    }

    /// Weight from source `i` to target `j`
    pub fn weight(&self, i: usize, j: usize) -> Option<f64> {
        if j >= self.n_target {
            return None;
        }
        self.weights.get(i * self.n_target + j).copied()
    }
}

impl Propagation for DenseConnection {
    fn source(&self) -> GroupId {
        self.source
    }

    fn propagate(&mut self, groups: &mut Groups) -> Result<()> {
        let fired = groups.get(self.source)?.spikes().to_vec();
        if fired.is_empty() {
            return Ok(());
        }
        let target = groups
            .get_mut(self.target)?
            .state_mut(&self.var)
            .ok_or_else(|| SimError::unknown_variable(self.var.clone()))?;

        for i in fired {
            let row = self
                .weights
                .get(i * self.n_target..(i + 1) * self.n_target)
                .ok_or_else(|| SimError::index_out_of_range(i, self.weights.len() / self.n_target.max(1)))?;
            for (value, w) in target.iter_mut().zip(row) {
                *value += w;
            }
        }
        Ok(())
    }
}
