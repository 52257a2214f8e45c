//! Discrete-time spiking network scheduler with monitors and coincidence scoring
//!
//! A [`Network`] owns clocks, neuron groups, connections and operations, and
//! advances them tick by tick in a fixed phase order (see [`schedule`]).
//! Recorders ([`SpikeMonitor`], [`StateMonitor`], [`PopulationRateMonitor`],
//! [`ISIHistogramMonitor`]) and the streaming [`CoincidenceCounter`] are
//! operations that read the firing list and state of a source group on each
//! tick.
//!
//! ```rust
//! use tickspike_runtime::{ClockId, Network, SpikeGeneratorGroup, SpikeMonitor, MS};
//!
//! let mut net = Network::new(0.1 * MS).unwrap();
//! let events = vec![(0, 3.0 * MS), (1, 4.0 * MS), (0, 7.0 * MS)];
//! let gen = net.add_group(SpikeGeneratorGroup::new(2, events).unwrap(), ClockId::DEFAULT).unwrap();
//! let mon = net.add_operation(SpikeMonitor::new(gen)).unwrap();
//!
//! net.run(10.0 * MS).unwrap();
//! assert_eq!(net.operation(&mon).unwrap().nspikes(), 3);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

use std::any::Any;

// Core modules
pub mod clock;
pub mod coincidence;
pub mod connection;
pub mod error;
pub mod generator;
pub mod group;
pub mod monitor;
pub mod network;
pub mod neuron;
pub mod operation;
pub mod schedule;

// Re-export essential types
pub use clock::{Clock, ClockId};
pub use coincidence::{CoincidenceCounter, ReferenceTrain};
pub use connection::{DenseConnection, Propagation};
pub use error::{Result, SimError};
pub use generator::{PoissonGroup, SpikeGeneratorGroup};
pub use group::{GroupId, Groups, NeuronGroup, PassiveGroup};
pub use monitor::{
    ISIHistogramMonitor, PopulationRateMonitor, Record, SpikeMonitor, SpikeMonitorParams,
    StateMonitor, StateMonitorParams,
};
pub use network::Network;
pub use neuron::{LifGroup, LifParams, TimedInput};
pub use operation::{Attach, Handle, NetworkOperation, Operation, TickContext};
pub use schedule::{Phase, Schedule};

/// One millisecond in seconds
pub const MS: f64 = 1e-3;

/// Default clock step (0.1 ms)
pub const DEFAULT_DT: f64 = 0.1 * MS;

/// Access to the concrete type behind a trait object
///
/// Implemented for every `'static` type; it lets [`Network`] hand back typed
/// references to the groups and operations it owns.
pub trait AsAny {
    /// Upcast to `&dyn Any`
    fn as_any(&self) -> &dyn Any;

    /// Upcast to `&mut dyn Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
