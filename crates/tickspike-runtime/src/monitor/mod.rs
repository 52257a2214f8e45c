//! Recorders
//!
//! Monitors are passive operations: they read the firing list and state of
//! their source group and never modify it.
//!
//! - [`SpikeMonitor`]: firing events and their count
//! - [`StateMonitor`]: state variable traces and population statistics
//! - [`PopulationRateMonitor`]: binned population firing rate
//! - [`ISIHistogramMonitor`]: histogram of interspike intervals

mod isi;
mod rate;
mod spike;
mod state;

pub use isi::ISIHistogramMonitor;
pub use rate::PopulationRateMonitor;
pub use spike::{SpikeMonitor, SpikeMonitorParams};
pub use state::{Record, StateMonitor, StateMonitorParams};
