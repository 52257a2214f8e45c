//! Scheduled operations and the per-tick context they run in

use crate::clock::{Clock, ClockId};
use crate::error::*;
use crate::group::{GroupId, Groups, NeuronGroup};
use crate::schedule::{Phase, Schedule};
use crate::AsAny;
use std::fmt;
use std::marker::PhantomData;

/// What an operation can see when it is registered
pub struct Attach<'a> {
    /// The operation's source group, if it declared one
    pub source: Option<&'a dyn NeuronGroup>,
    /// The clock the operation was bound to
    pub clock: &'a Clock,
}

/// View of the network handed to an operation on each due tick
pub struct TickContext<'a> {
    pub(crate) clock: &'a Clock,
    pub(crate) groups: &'a mut Groups,
}

impl<'a> TickContext<'a> {
    /// Current time of the operation's clock (s)
    #[inline]
    pub fn t(&self) -> f64 {
        self.clock.t()
    }

    /// Step of the operation's clock (s)
    #[inline]
    pub fn dt(&self) -> f64 {
        self.clock.dt()
    }

    /// The operation's clock
    pub fn clock(&self) -> &Clock {
        self.clock
    }

    /// Read a group
    pub fn group(&self, id: GroupId) -> Result<&dyn NeuronGroup> {
        self.groups.get(id)
    }

    /// Modify a group
    pub fn group_mut(&mut self, id: GroupId) -> Result<&mut dyn NeuronGroup> {
        self.groups.get_mut(id)
    }
}

/// A unit of work executed by the scheduler at a phase of a clock tick
pub trait Operation: AsAny {
    /// Phase, decimation and clock
    fn schedule(&self) -> &Schedule;

    /// Group this operation observes; its clock is the default for the operation
    fn source(&self) -> Option<GroupId> {
        None
    }

    /// Called once on registration; validates against the source and clock
    fn attach(&mut self, _ctx: &Attach<'_>) -> Result<()> {
        Ok(())
    }

    /// Run on a due tick
    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Result<()>;

    /// Forget everything recorded so far
    fn reinit(&mut self) {}

    /// Short name for logs
    fn name(&self) -> &'static str {
        "operation"
    }
}

/// Typed handle to an operation owned by a [`crate::Network`]
pub struct Handle<T> {
    pub(crate) index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// Registration index of the operation
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.index).finish()
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

type OperationFn = Box<dyn FnMut(&mut TickContext<'_>) -> Result<()>>;

/// User code scheduled like any other operation
///
/// Unlike monitors, a network operation may modify group state, which is how
/// stimulation protocols are expressed.
pub struct NetworkOperation {
    schedule: Schedule,
    function: OperationFn,
    calls: u64,
}

impl NetworkOperation {
    /// Run `function` at `when` on every tick of the default clock
    pub fn new<F>(when: Phase, function: F) -> Self
    where
        F: FnMut(&mut TickContext<'_>) -> Result<()> + 'static,
    {
        Self {
            schedule: Schedule::at(when),
            function: Box::new(function),
            calls: 0,
        }
    }

    /// Bind to another clock
    pub fn on_clock(mut self, clock: ClockId) -> Self {
        self.schedule.clock = Some(clock);
        self
    }

    /// Run only every `timestep` ticks
    pub fn every(mut self, timestep: u32) -> Self {
        self.schedule.timestep = timestep;
        self
    }

    /// Number of times the function has run
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl fmt::Debug for NetworkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkOperation")
            .field("schedule", &self.schedule)
            .field("calls", &self.calls)
            .finish_non_exhaustive()
    }
}

impl Operation for NetworkOperation {
    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    fn execute(&mut self, ctx: &mut TickContext<'_>) -> Result<()> {
        self.calls += 1;
        (self.function)(ctx)
    }

    fn reinit(&mut self) {
        self.calls = 0;
    }

    fn name(&self) -> &'static str {
        "network_operation"
    }
}
