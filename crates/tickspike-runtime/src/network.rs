//! The network: clocks, groups, connections and the tick scheduler

use crate::clock::{Clock, ClockId};
use crate::connection::Propagation;
use crate::error::*;
use crate::group::{GroupId, Groups, NeuronGroup};
use crate::operation::{Attach, Handle, Operation, TickContext};
use crate::schedule::Phase;
use crate::AsAny;
use std::any::type_name;
use std::fmt;

struct OperationSlot {
    op: Box<dyn Operation>,
    clock: ClockId,
    elapsed: u64,
}

struct ConnectionSlot {
    connection: Box<dyn Propagation>,
    clock: ClockId,
}

/// Owns every simulated object and advances them tick by tick
///
/// Each tick of a clock runs, in order: `start`, `before_groups` operations,
/// state update and threshold of the clock's groups, `after_groups`,
/// `before_connections`, propagation of connections whose source is on the
/// clock, `after_connections`, `before_resets`, reset of the clock's groups,
/// `after_resets` and `end`. Operations sharing a phase run in registration
/// order. With several clocks, the clock with the earliest current time ticks
/// next, ties going to the clock registered first.
pub struct Network {
    clocks: Vec<Clock>,
    groups: Groups,
    connections: Vec<ConnectionSlot>,
    operations: Vec<OperationSlot>,
}

impl Network {
    /// Create a network whose default clock steps by `dt` seconds
    pub fn new(dt: f64) -> Result<Self> {
        Ok(Self {
            clocks: vec![Clock::new(dt)?],
            groups: Groups::default(),
            connections: Vec::new(),
            operations: Vec::new(),
        })
    }

    /// Register an additional clock
    pub fn add_clock(&mut self, clock: Clock) -> ClockId {
        self.clocks.push(clock);
        let id = ClockId(self.clocks.len() - 1);
        log::debug!("added clock {} with dt={}", id.index(), self.clocks[id.0].dt());
        id
    }

    /// Look up a clock
    pub fn clock(&self, id: ClockId) -> Result<&Clock> {
        self.clocks.get(id.0).ok_or(SimError::UnknownClock { id: id.0 })
    }

    /// Current time of the default clock
    pub fn t(&self) -> f64 {
        self.clocks[ClockId::DEFAULT.0].t()
    }

    /// Register a group updated on `clock`
    pub fn add_group<G: NeuronGroup + 'static>(&mut self, group: G, clock: ClockId) -> Result<GroupId> {
        self.clock(clock)?;
        let n = group.len();
        let id = self.groups.push(Box::new(group), clock);
        log::debug!("added group {} of {} neurons on clock {}", id.index(), n, clock.index());
        Ok(id)
    }

    /// All groups
    pub fn groups(&self) -> &Groups {
        &self.groups
    }

    /// Look up a group
    pub fn group(&self, id: GroupId) -> Result<&dyn NeuronGroup> {
        self.groups.get(id)
    }

    /// Look up a group mutably, e.g. to set state between runs
    pub fn group_mut(&mut self, id: GroupId) -> Result<&mut dyn NeuronGroup> {
        self.groups.get_mut(id)
    }

    /// Look up a group as its concrete type
    pub fn group_as<G: NeuronGroup + 'static>(&self, id: GroupId) -> Result<&G> {
        AsAny::as_any(self.groups.get(id)?)
            .downcast_ref::<G>()
            .ok_or(SimError::HandleType {
                id: id.index(),
                expected: type_name::<G>(),
            })
    }

    /// Register a connection; it propagates on its source group's clock
    pub fn add_connection<P: Propagation + 'static>(&mut self, connection: P) -> Result<()> {
        let clock = self.groups.clock_of(connection.source())?;
        self.connections.push(ConnectionSlot {
            connection: Box::new(connection),
            clock,
        });
        Ok(())
    }

    /// Register an operation and return a typed handle to it
    ///
    /// The operation runs on its schedule's clock if it names one, otherwise on
    /// its source group's clock, otherwise on the default clock.
    pub fn add_operation<T: Operation + 'static>(&mut self, mut op: T) -> Result<Handle<T>> {
        op.schedule().validate()?;
        let source = match op.source() {
            Some(id) => Some(self.groups.get(id)?),
            None => None,
        };
        let clock = match (op.schedule().clock, op.source()) {
            (Some(clock), _) => clock,
            (None, Some(id)) => self.groups.clock_of(id)?,
            (None, None) => ClockId::DEFAULT,
        };
        let attach = Attach {
            source,
            clock: self.clocks.get(clock.0).ok_or(SimError::UnknownClock { id: clock.0 })?,
        };
        op.attach(&attach)?;

        log::debug!(
            "added {} at {} every {} tick(s) of clock {}",
            op.name(),
            op.schedule().when,
            op.schedule().timestep,
            clock.index()
        );
        self.operations.push(OperationSlot {
            op: Box::new(op),
            clock,
            elapsed: 0,
        });
        Ok(Handle::new(self.operations.len() - 1))
    }

    /// Read a registered operation
    pub fn operation<T: Operation + 'static>(&self, handle: &Handle<T>) -> Result<&T> {
        let slot = self
            .operations
            .get(handle.index)
            .ok_or(SimError::UnknownOperation { id: handle.index })?;
        AsAny::as_any(&*slot.op)
            .downcast_ref::<T>()
            .ok_or(SimError::HandleType {
                id: handle.index,
                expected: type_name::<T>(),
            })
    }

    /// Modify a registered operation
    pub fn operation_mut<T: Operation + 'static>(&mut self, handle: &Handle<T>) -> Result<&mut T> {
        let slot = self
            .operations
            .get_mut(handle.index)
            .ok_or(SimError::UnknownOperation { id: handle.index })?;
        AsAny::as_any_mut(&mut *slot.op)
            .downcast_mut::<T>()
            .ok_or(SimError::HandleType {
                id: handle.index,
                expected: type_name::<T>(),
            })
    }

    /// Advance every clock by `duration` seconds
    ///
    /// Ticks at times in `[t, t + duration)` of each clock execute. `duration`
    /// must be a whole number of ticks of every clock; otherwise nothing runs.
    /// A later call continues from where this one stopped.
    pub fn run(&mut self, duration: f64) -> Result<()> {
        let ends = self
            .clocks
            .iter()
            .map(|clock| -> Result<u64> { Ok(clock.tick() + clock.ticks_for(duration)?) })
            .collect::<Result<Vec<u64>>>()?;

        let total: u64 = ends
            .iter()
            .zip(&self.clocks)
            .map(|(end, clock)| end - clock.tick())
            .sum();
        let schedule = self.operations_by_clock();
        log::info!(
            "Running {}s from t={}: {} ticks over {} clock(s), {} operation(s)",
            duration,
            self.t(),
            total,
            self.clocks.len(),
            self.operations.len()
        );

        let report_every = (total / 10).max(1);
        let mut done = 0u64;
        while let Some(c) = self.next_clock(&ends) {
            self.tick(c, &schedule[c]).map_err(|e| {
                log::error!(
                    "tick {} of clock {} (t={}) failed: {}",
                    self.clocks[c].tick(),
                    c,
                    self.clocks[c].t(),
                    e
                );
                e
            })?;
            self.clocks[c].advance();

            done += 1;
            if done % report_every == 0 {
                log::debug!("Run progress: {:.1}%", done as f64 / total as f64 * 100.0);
            }
        }

        log::info!("Run completed: {} ticks, t={}", done, self.t());
        Ok(())
    }

    /// Return every clock to its start and clear all recorded data
    pub fn reinit(&mut self) {
        self.clocks.iter_mut().for_each(Clock::reinit);
        for slot in self.groups.slots_mut() {
            slot.group.reinit();
        }
        for slot in &mut self.operations {
            slot.op.reinit();
            slot.elapsed = 0;
        }
        log::debug!("network reinitialised");
    }

    fn operations_by_clock(&self) -> Vec<Vec<usize>> {
        let mut schedule = vec![Vec::new(); self.clocks.len()];
        for (i, slot) in self.operations.iter().enumerate() {
            schedule[slot.clock.0].push(i);
        }
        schedule
    }

    /// Earliest clock that has not reached its end tick
    fn next_clock(&self, ends: &[u64]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (c, clock) in self.clocks.iter().enumerate() {
            if clock.tick() >= ends[c] {
                continue;
            }
            best = match best {
                Some(b) => {
                    let other = &self.clocks[b];
                    // Times within rounding of each other are simultaneous.
                    let eps = 1e-9 * clock.dt().min(other.dt());
                    if clock.t() < other.t() - eps {
                        Some(c)
                    } else {
                        Some(b)
                    }
                }
                None => Some(c),
            };
        }
        best
    }

    fn tick(&mut self, c: usize, operations: &[usize]) -> Result<()> {
        let id = ClockId(c);
        for phase in Phase::ALL {
            match phase {
                Phase::AfterGroups => {
                    let clock = &self.clocks[c];
                    for slot in self.groups.slots_mut().filter(|slot| slot.clock == id) {
                        slot.group.update(clock)?;
                    }
                }
                Phase::AfterConnections => {
                    for slot in self.connections.iter_mut().filter(|slot| slot.clock == id) {
                        slot.connection.propagate(&mut self.groups)?;
                    }
                }
                Phase::AfterResets => {
                    let clock = &self.clocks[c];
                    for slot in self.groups.slots_mut().filter(|slot| slot.clock == id) {
                        slot.group.reset(clock)?;
                    }
                }
                _ => {}
            }

            for &i in operations {
                let slot = &mut self.operations[i];
                if slot.op.schedule().when != phase {
                    continue;
                }
                slot.elapsed += 1;
                if slot.op.schedule().is_due(slot.elapsed) {
                    let mut ctx = TickContext {
                        clock: &self.clocks[c],
                        groups: &mut self.groups,
                    };
                    slot.op.execute(&mut ctx)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("clocks", &self.clocks)
            .field("groups", &self.groups.len())
            .field("connections", &self.connections.len())
            .field("operations", &self.operations.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::SpikeGeneratorGroup;
    use crate::group::PassiveGroup;
    use crate::monitor::{SpikeMonitor, StateMonitor, StateMonitorParams};
    use crate::operation::NetworkOperation;
    use std::cell::RefCell;
    use std::rc::Rc;

    const MS: f64 = 1e-3;

    fn trace(log: &Rc<RefCell<Vec<String>>>, label: &'static str, when: Phase) -> NetworkOperation {
        let log = Rc::clone(log);
        NetworkOperation::new(when, move |ctx| {
            log.borrow_mut().push(format!("{}@{:.1}", label, ctx.t() / MS));
            Ok(())
        })
    }

    #[test]
    fn test_phase_order_within_tick() {
        let mut net = Network::new(MS).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        net.add_operation(trace(&log, "end", Phase::End)).unwrap();
        net.add_operation(trace(&log, "start", Phase::Start)).unwrap();
        net.add_operation(trace(&log, "after_groups", Phase::AfterGroups)).unwrap();
        net.add_operation(trace(&log, "start2", Phase::Start)).unwrap();

        net.run(MS).unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["start@0.0", "start2@0.0", "after_groups@0.0", "end@0.0"]
        );
    }

    #[test]
    fn test_clock_interleaving_and_ties() {
        let mut net = Network::new(0.1 * MS).unwrap();
        let slow = net.add_clock(Clock::new(0.2 * MS).unwrap());
        let log = Rc::new(RefCell::new(Vec::new()));
        net.add_operation(trace(&log, "slow", Phase::Start).on_clock(slow)).unwrap();
        net.add_operation(trace(&log, "fast", Phase::Start)).unwrap();

        net.run(0.4 * MS).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                "fast@0.0", "slow@0.0", "fast@0.1", "fast@0.2", "slow@0.2", "fast@0.3"
            ]
        );
    }

    #[test]
    fn test_decimation_counts() {
        let mut net = Network::new(MS).unwrap();
        let every = net
            .add_operation(NetworkOperation::new(Phase::End, |_| Ok(())).every(3))
            .unwrap();
        net.run(9.0 * MS).unwrap();
        assert_eq!(net.operation(&every).unwrap().calls(), 3);
        net.run(MS).unwrap();
        assert_eq!(net.operation(&every).unwrap().calls(), 3);
        net.run(2.0 * MS).unwrap();
        assert_eq!(net.operation(&every).unwrap().calls(), 4);
    }

    #[test]
    fn test_resume_and_reinit() {
        let mut net = Network::new(MS).unwrap();
        let gen = net
            .add_group(
                SpikeGeneratorGroup::new(2, vec![(0, 1.0 * MS), (1, 6.0 * MS)]).unwrap(),
                ClockId::DEFAULT,
            )
            .unwrap();
        let mon = net.add_operation(SpikeMonitor::new(gen)).unwrap();

        net.run(5.0 * MS).unwrap();
        assert_eq!(net.operation(&mon).unwrap().nspikes(), 1);
        net.run(5.0 * MS).unwrap();
        assert_eq!(net.operation(&mon).unwrap().nspikes(), 2);
        assert!((net.t() - 10.0 * MS).abs() < 1e-12);

        net.reinit();
        assert_eq!(net.t(), 0.0);
        assert_eq!(net.operation(&mon).unwrap().nspikes(), 0);
        assert_eq!(net.group_as::<SpikeGeneratorGroup>(gen).unwrap().pending().len(), 2);
    }

    #[test]
    fn test_invalid_duration_runs_nothing() {
        let mut net = Network::new(0.1 * MS).unwrap();
        net.add_clock(Clock::new(0.3 * MS).unwrap());
        let calls = net
            .add_operation(NetworkOperation::new(Phase::Start, |_| Ok(())))
            .unwrap();

        assert!(net.run(0.5 * MS).unwrap_err().is_configuration());
        assert!(net.run(-1.0).is_err());
        assert!(net.run(f64::INFINITY).is_err());
        assert_eq!(net.operation(&calls).unwrap().calls(), 0);
        assert_eq!(net.t(), 0.0);
    }

    #[test]
    fn test_handles_and_lookups() {
        let mut net = Network::new(MS).unwrap();
        let group = net
            .add_group(PassiveGroup::new(2).with_variable("v", 0.0), ClockId::DEFAULT)
            .unwrap();
        let handle = net
            .add_operation(StateMonitor::new(group, "v", StateMonitorParams::default()).unwrap())
            .unwrap();
        let wrong: Handle<SpikeMonitor> = Handle::new(handle.index());

        assert!(net.operation(&handle).is_ok());
        assert!(matches!(net.operation(&wrong), Err(SimError::HandleType { .. })));
        assert!(matches!(
            net.operation(&Handle::<SpikeMonitor>::new(9)),
            Err(SimError::UnknownOperation { id: 9 })
        ));
        assert!(net.group_as::<SpikeGeneratorGroup>(group).is_err());
        assert!(net.add_group(PassiveGroup::new(1), ClockId(4)).is_err());
        assert!(net.add_operation(SpikeMonitor::new(GroupId(7))).is_err());
        assert!(net
            .add_operation(NetworkOperation::new(Phase::End, |_| Ok(())).every(0))
            .is_err());
    }

    #[test]
    fn test_operation_error_aborts_run() {
        let mut net = Network::new(MS).unwrap();
        net.add_operation(NetworkOperation::new(Phase::Start, |ctx| {
            if ctx.t() > 2.5 * MS {
                return Err(SimError::invalid_config("stop"));
            }
            Ok(())
        }))
        .unwrap();
        assert!(net.run(10.0 * MS).is_err());
        assert_eq!(net.clock(ClockId::DEFAULT).unwrap().tick(), 3);
    }
}
