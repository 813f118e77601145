//! The cycle evaluator.
//!
//! Each call to [`Simulator::step`] advances simulated time by one clock:
//!
//! 1. **Settle**: combinational bindings are re-evaluated, in declaration
//!    order, until a full pass changes nothing.
//! 2. **Commit**: every registered binding is evaluated against the settled
//!    values, and only then are all results written. No register observes
//!    another register's update from the same step.
//! 3. **Settle** again, so the values observed after the step are
//!    consistent with the new register contents.
//!
//! Combinational bindings must form a DAG. Loops are rejected when the
//! simulator is created and, as a backstop, by bounding the number of
//! settle passes.

use std::collections::HashMap;
use serde::{Serialize, Deserialize};
use tracing::{debug, trace, warn};

use crate::csr::{CsrBank, CsrEntry};
use crate::sim::{Binding, Design, Module, SignalId, SignalStore, SimError};
use crate::trace::{TraceRecord, TraceSink};

/// Where the evaluator is within a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Between steps; all values are settled.
    Idle,
    /// Re-evaluating combinational bindings.
    Settling,
    /// Writing registered bindings.
    Committing,
    /// A structural error stopped the simulation.
    Faulted,
}

/// How a signal is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Driver {
    Comb,
    Sync,
}

/// A running simulation of one [`Design`].
pub struct Simulator {
    store: SignalStore,
    top: Module,
    comb: Vec<Binding>,
    sync: Vec<Binding>,
    drivers: Vec<Option<Driver>>,
    csr: CsrBank,
    cycle: u64,
    phase: Phase,
    settle_limit: usize,
    last_settle_passes: usize,
}

impl Simulator {
    /// Elaborate a design and settle it at cycle 0.
    pub fn new(design: Design) -> Result<Self, SimError> {
        let (store, top) = design.into_parts();

        let mut comb = Vec::new();
        let mut sync = Vec::new();
        for module in top.walk() {
            comb.extend(module.comb().iter().cloned());
            sync.extend(module.sync().iter().cloned());
        }

        let mut drivers = vec![None; store.len()];
        for (kind, bindings) in [(Driver::Comb, &comb), (Driver::Sync, &sync)] {
            for binding in bindings.iter() {
                check_binding(&store, binding)?;
                let slot = &mut drivers[binding.target.index()];
                if slot.is_some() {
                    return Err(SimError::MultipleDrivers(store.name(binding.target).to_string()));
                }
                *slot = Some(kind);
            }
        }

        let csr = CsrBank::from_module(&top)?;
        if let Some(spec) = csr.specs().find(|spec| !store.contains(spec.signal)) {
            return Err(SimError::ForeignSignal(spec.signal));
        }
        for spec in csr.storage() {
            if drivers[spec.signal.index()].is_some() {
                return Err(SimError::DrivenSignal(store.name(spec.signal).to_string()));
            }
        }

        let settle_limit = comb.len() + 1;
        let mut sim = Self {
            store,
            top,
            comb,
            sync,
            drivers,
            csr,
            cycle: 0,
            phase: Phase::Idle,
            settle_limit,
            last_settle_passes: 0,
        };

        if let Some(path) = sim.find_comb_loop() {
            return Err(SimError::CombinationalLoop { signals: path, iterations: 0 });
        }

        debug!(
            signals = sim.store.len(),
            comb = sim.comb.len(),
            sync = sim.sync.len(),
            registers = sim.csr.len(),
            "design elaborated"
        );
        sim.settle()?;
        sim.phase = Phase::Idle;
        Ok(sim)
    }

    /// Advance one clock cycle.
    pub fn step(&mut self) -> Result<(), SimError> {
        if self.phase == Phase::Faulted {
            return Err(SimError::Faulted);
        }
        let result = self.step_inner();
        if let Err(ref e) = result {
            warn!(cycle = self.cycle, error = %e, "step failed");
            self.phase = Phase::Faulted;
        }
        result
    }

    fn step_inner(&mut self) -> Result<(), SimError> {
        self.settle()?;

        self.phase = Phase::Committing;
        // Sample everything first, then write: a simultaneous clock edge.
        let updates: Vec<(SignalId, i128)> = self
            .sync
            .iter()
            .map(|b| (b.target, b.expr.eval(&self.store)))
            .collect();
        for (target, value) in updates {
            self.store.write(target, value);
        }
        self.cycle += 1;

        self.settle()?;
        self.phase = Phase::Idle;
        trace!(cycle = self.cycle, passes = self.last_settle_passes, "step complete");
        Ok(())
    }

    /// Step `cycles` times, recording every signal at each observed cycle.
    ///
    /// The record set for a cycle is emitted before the clock edge that
    /// ends it, so `run(16, ..)` records cycles `0..16`.
    pub fn run(&mut self, cycles: u64, sink: &mut dyn TraceSink) -> Result<(), SimError> {
        for _ in 0..cycles {
            sink.record(&self.snapshot())?;
            self.step()?;
        }
        sink.flush()?;
        Ok(())
    }

    /// Re-evaluate combinational bindings until nothing changes.
    ///
    /// Returns the number of passes that changed at least one value; for an
    /// acyclic graph of depth `d` this is at most `d`.
    pub fn settle(&mut self) -> Result<usize, SimError> {
        if self.phase == Phase::Faulted {
            return Err(SimError::Faulted);
        }
        self.phase = Phase::Settling;

        for pass in 0..self.settle_limit {
            let mut changed = Vec::new();
            for binding in &self.comb {
                let value = binding.expr.eval(&self.store);
                if self.store.write(binding.target, value) {
                    changed.push(binding.target);
                }
            }
            trace!(pass, changed = changed.len(), "settle pass");

            if changed.is_empty() {
                self.last_settle_passes = pass;
                self.phase = Phase::Idle;
                return Ok(pass);
            }
            if pass + 1 == self.settle_limit {
                self.phase = Phase::Faulted;
                return Err(SimError::CombinationalLoop {
                    signals: changed.iter().map(|id| self.store.name(*id).to_string()).collect(),
                    iterations: self.settle_limit,
                });
            }
        }

        // settle_limit is never zero
        self.phase = Phase::Idle;
        Ok(0)
    }

    /// Return every signal and every register to its reset value.
    pub fn reset(&mut self) -> Result<(), SimError> {
        self.store.reset();
        self.cycle = 0;
        self.phase = Phase::Idle;
        self.settle()?;
        debug!("simulator reset");
        Ok(())
    }

    /// Current value of a signal.
    ///
    /// # Panics
    ///
    /// Panics if `id` belongs to another design; see [`try_peek`](Self::try_peek).
    pub fn peek(&self, id: SignalId) -> i64 {
        self.store.read(id)
    }

    /// Current value of a signal, or `ForeignSignal` if `id` is not ours.
    pub fn try_peek(&self, id: SignalId) -> Result<i64, SimError> {
        if !self.store.contains(id) {
            return Err(SimError::ForeignSignal(id));
        }
        Ok(self.store.read(id))
    }

    /// Current value of a signal by hierarchical name.
    pub fn peek_by_name(&self, name: &str) -> Result<i64, SimError> {
        Ok(self.store.read(self.lookup(name)?))
    }

    /// Drive an undriven (input) signal and re-settle.
    pub fn poke(&mut self, id: SignalId, value: i64) -> Result<(), SimError> {
        if self.phase == Phase::Faulted {
            return Err(SimError::Faulted);
        }
        if !self.store.contains(id) {
            return Err(SimError::ForeignSignal(id));
        }
        if self.drivers[id.index()].is_some() {
            return Err(SimError::DrivenSignal(self.store.name(id).to_string()));
        }
        self.store.write(id, value as i128);
        self.settle()?;
        Ok(())
    }

    /// [`poke`](Self::poke) by hierarchical name.
    pub fn poke_by_name(&mut self, name: &str, value: i64) -> Result<(), SimError> {
        let id = self.lookup(name)?;
        self.poke(id, value)
    }

    /// Read a register from the bank.
    pub fn csr_read(&self, name: &str) -> Result<i64, SimError> {
        Ok(self.csr.read(&self.store, name)?)
    }

    /// Write a storage register and re-settle.
    pub fn csr_write(&mut self, name: &str, value: i64) -> Result<(), SimError> {
        if self.phase == Phase::Faulted {
            return Err(SimError::Faulted);
        }
        self.csr.write(&mut self.store, name, value)?;
        debug!(register = name, value, "register written");
        self.settle()?;
        Ok(())
    }

    /// Snapshot of the register bank.
    pub fn csrs(&self) -> Vec<CsrEntry> {
        self.csr.entries(&self.store)
    }

    /// One trace record per signal at the current cycle.
    pub fn snapshot(&self) -> Vec<TraceRecord> {
        self.store
            .ids()
            .map(|id| TraceRecord {
                cycle: self.cycle,
                signal: self.store.name(id).to_string(),
                value: self.store.read(id),
            })
            .collect()
    }

    fn lookup(&self, name: &str) -> Result<SignalId, SimError> {
        self.store
            .find(name)
            .ok_or_else(|| SimError::UnknownSignal(name.to_string()))
    }

    /// Find a cycle in the combinational dependency graph, returned as the
    /// names along the loop with the first repeated at the end.
    fn find_comb_loop(&self) -> Option<Vec<String>> {
        let driver_of: HashMap<SignalId, usize> = self
            .comb
            .iter()
            .enumerate()
            .map(|(i, b)| (b.target, i))
            .collect();

        let deps: Vec<Vec<usize>> = self
            .comb
            .iter()
            .map(|b| {
                let mut sources = Vec::new();
                b.expr.sources(&mut sources);
                sources.iter().filter_map(|s| driver_of.get(s).copied()).collect()
            })
            .collect();

        let mut state = vec![Visit::New; deps.len()];
        let mut path = Vec::new();
        for start in 0..deps.len() {
            if state[start] == Visit::New {
                if let Some(cycle) = visit(start, &deps, &mut state, &mut path) {
                    let mut names: Vec<String> = cycle
                        .iter()
                        .map(|&i| self.store.name(self.comb[i].target).to_string())
                        .collect();
                    if let Some(first) = names.first().cloned() {
                        names.push(first);
                    }
                    return Some(names);
                }
            }
        }
        None
    }

    pub fn store(&self) -> &SignalStore {
        &self.store
    }

    pub fn top(&self) -> &Module {
        &self.top
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_faulted(&self) -> bool {
        self.phase == Phase::Faulted
    }

    /// How a signal is driven, if at all.
    pub fn driver(&self, id: SignalId) -> Option<Driver> {
        self.drivers.get(id.index()).copied().flatten()
    }

    /// Changing passes taken by the most recent settle.
    pub fn last_settle_passes(&self) -> usize {
        self.last_settle_passes
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("design", &self.top.name())
            .field("cycle", &self.cycle)
            .field("phase", &self.phase)
            .field("signals", &self.store.len())
            .finish()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Active,
    Done,
}

fn visit(node: usize, deps: &[Vec<usize>], state: &mut [Visit], path: &mut Vec<usize>) -> Option<Vec<usize>> {
    state[node] = Visit::Active;
    path.push(node);
    for &next in &deps[node] {
        match state[next] {
            Visit::Active => {
                let start = path.iter().position(|&n| n == next).unwrap_or(0);
                return Some(path[start..].to_vec());
            }
            Visit::New => {
                if let Some(cycle) = visit(next, deps, state, path) {
                    return Some(cycle);
                }
            }
            Visit::Done => {}
        }
    }
    path.pop();
    state[node] = Visit::Done;
    None
}

fn check_binding(store: &SignalStore, binding: &Binding) -> Result<(), SimError> {
    if !store.contains(binding.target) {
        return Err(SimError::ForeignSignal(binding.target));
    }
    let mut sources = Vec::new();
    binding.expr.sources(&mut sources);
    match sources.into_iter().find(|id| !store.contains(*id)) {
        Some(id) => Err(SimError::ForeignSignal(id)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{bits_for, Expr, Shape};
    use crate::trace::MemoryTrace;
    use proptest::prelude::*;

    struct Blinky {
        counter: SignalId,
        blinker: SignalId,
        blinker_sync: SignalId,
    }

    fn blinky() -> (Simulator, Blinky) {
        let (design, ids) = Design::build("top", |m| {
            let counter = m.signal("counter", Shape::unsigned(bits_for(7)).unwrap())?;
            let blinker = m.signal("blinker", Shape::BIT)?;
            let blinker_sync = m.signal("blinker_sync", Shape::BIT)?;
            m.sync(counter, counter + 1);
            m.comb(blinker, Expr::sig(counter).ge(4));
            m.sync(blinker_sync, Expr::sig(counter).ge(4));
            Ok(Blinky { counter, blinker, blinker_sync })
        })
        .unwrap();
        (Simulator::new(design).unwrap(), ids)
    }

    #[test]
    fn test_counter_wraps_after_eight() {
        let (mut sim, ids) = blinky();
        assert_eq!(sim.peek(ids.counter), 0);
        for _ in 0..8 {
            sim.step().unwrap();
        }
        assert_eq!(sim.peek(ids.counter), 0);
        assert_eq!(sim.cycle(), 8);
    }

    #[test]
    fn test_comb_same_cycle_sync_one_late() {
        let (mut sim, ids) = blinky();
        let mut seen = Vec::new();
        for _ in 0..16 {
            seen.push((sim.peek(ids.counter), sim.peek(ids.blinker), sim.peek(ids.blinker_sync)));
            sim.step().unwrap();
        }

        for (cycle, &(counter, blinker, sync)) in seen.iter().enumerate() {
            assert_eq!(counter, cycle as i64 % 8);
            assert_eq!(blinker, (counter >= 4) as i64, "cycle {}", cycle);
            let prev = if cycle == 0 { 0 } else { seen[cycle - 1].1 };
            assert_eq!(sync, prev, "cycle {}", cycle);
        }

        // cycle 4: comb high, registered still low; cycle 5: both high
        assert_eq!(seen[4], (4, 1, 0));
        assert_eq!(seen[5], (5, 1, 1));
        assert_eq!(seen[8], (0, 0, 1));
        assert_eq!(seen[9], (1, 0, 0));
    }

    #[test]
    fn test_registered_swap_is_simultaneous() {
        let (design, (a, b)) = Design::build("top", |m| {
            let a = m.signal_with_reset("a", Shape::unsigned(8).unwrap(), 1)?;
            let b = m.signal_with_reset("b", Shape::unsigned(8).unwrap(), 2)?;
            m.sync(a, b);
            m.sync(b, a);
            Ok((a, b))
        })
        .unwrap();
        let mut sim = Simulator::new(design).unwrap();
        sim.step().unwrap();
        assert_eq!((sim.peek(a), sim.peek(b)), (2, 1));
        sim.step().unwrap();
        assert_eq!((sim.peek(a), sim.peek(b)), (1, 2));
    }

    fn two_registers(a0: i64, b0: i64, swapped: bool) -> (i64, i64) {
        let (design, (a, b)) = Design::build("top", |m| {
            let a = m.signal_with_reset("a", Shape::signed(16).unwrap(), a0)?;
            let b = m.signal_with_reset("b", Shape::signed(16).unwrap(), b0)?;
            let next_a = Expr::sig(b) * 3 + 1;
            let next_b = Expr::sig(a) - b;
            if swapped {
                m.sync(b, next_b);
                m.sync(a, next_a);
            } else {
                m.sync(a, next_a);
                m.sync(b, next_b);
            }
            Ok((a, b))
        })
        .unwrap();
        let mut sim = Simulator::new(design).unwrap();
        for _ in 0..5 {
            sim.step().unwrap();
        }
        (sim.peek(a), sim.peek(b))
    }

    proptest! {
        #[test]
        fn commit_order_does_not_matter(a0 in -1000i64..1000, b0 in -1000i64..1000) {
            prop_assert_eq!(two_registers(a0, b0, false), two_registers(a0, b0, true));
        }
    }

    #[test]
    fn test_self_loop_rejected() {
        let (design, _) = Design::build("top", |m| {
            let a = m.signal("a", Shape::BIT)?;
            m.comb(a, !Expr::sig(a));
            Ok(())
        })
        .unwrap();
        match Simulator::new(design).unwrap_err() {
            SimError::CombinationalLoop { signals, .. } => {
                assert_eq!(signals, vec!["top.a", "top.a"]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_stable_loop_rejected() {
        // a = b, b = a never oscillates but is still a loop
        let (design, _) = Design::build("top", |m| {
            let a = m.signal("a", Shape::BIT)?;
            let b = m.signal("b", Shape::BIT)?;
            m.comb(a, b);
            m.comb(b, a);
            Ok(())
        })
        .unwrap();
        let err = Simulator::new(design).unwrap_err();
        assert!(matches!(err, SimError::CombinationalLoop { ref signals, .. } if signals.len() == 3));
    }

    #[test]
    fn test_chain_converges_within_depth() {
        // declared last-stage first so every pass only fixes one level
        let depth = 5;
        let (design, (input, stages)) = Design::build("top", |m| {
            let input = m.signal("input", Shape::unsigned(16).unwrap())?;
            let mut stages = Vec::new();
            for i in 0..depth {
                stages.push(m.signal(&format!("s{}", i), Shape::unsigned(16).unwrap())?);
            }
            for i in (0..depth).rev() {
                let src = if i == 0 { input } else { stages[i - 1] };
                m.comb(stages[i], src + 1);
            }
            Ok((input, stages))
        })
        .unwrap();
        let mut sim = Simulator::new(design).unwrap();
        assert!(sim.last_settle_passes() <= depth);

        sim.poke(input, 100).unwrap();
        assert!(sim.last_settle_passes() <= depth);
        assert_eq!(sim.peek(stages[depth - 1]), 100 + depth as i64);
    }

    #[test]
    fn test_multiple_drivers() {
        let (design, _) = Design::build("top", |m| {
            let a = m.signal("a", Shape::BIT)?;
            m.comb(a, 1);
            m.sync(a, 0);
            Ok(())
        })
        .unwrap();
        assert_eq!(
            Simulator::new(design).unwrap_err(),
            SimError::MultipleDrivers("top.a".into())
        );
    }

    #[test]
    fn test_poke_driven_signal_rejected() {
        let (mut sim, ids) = blinky();
        assert!(matches!(sim.poke(ids.counter, 3), Err(SimError::DrivenSignal(_))));
        assert!(matches!(sim.peek_by_name("top.nope"), Err(SimError::UnknownSignal(_))));
        assert_eq!(sim.peek_by_name("top.blinker").unwrap(), 0);
    }

    #[test]
    fn test_foreign_signal_peek() {
        let (sim, ids) = blinky();
        let (_, other) = Design::build("other", |m| {
            for i in 0..8 {
                m.signal(&format!("s{}", i), Shape::BIT)?;
            }
            m.signal("far", Shape::BIT)
        })
        .unwrap();
        assert!(matches!(sim.try_peek(other), Err(SimError::ForeignSignal(_))));
        assert_eq!(sim.try_peek(ids.counter).unwrap(), 0);
    }

    #[test]
    fn test_poke_on_faulted_leaves_store() {
        let (design, input) = Design::build("top", |m| {
            let input = m.signal("input", Shape::unsigned(4).unwrap())?;
            let out = m.signal("out", Shape::unsigned(4).unwrap())?;
            m.comb(out, input);
            Ok(input)
        })
        .unwrap();
        let mut sim = Simulator::new(design).unwrap();
        sim.phase = Phase::Faulted;

        assert!(matches!(sim.poke(input, 9), Err(SimError::Faulted)));
        assert_eq!(sim.peek(input), 0);
        assert_eq!(sim.peek_by_name("top.out").unwrap(), 0);

        sim.reset().unwrap();
        sim.poke(input, 9).unwrap();
        assert_eq!(sim.peek_by_name("top.out").unwrap(), 9);
    }

    #[test]
    fn test_reset_restores_state() {
        let (mut sim, ids) = blinky();
        for _ in 0..6 {
            sim.step().unwrap();
        }
        sim.reset().unwrap();
        assert_eq!(sim.cycle(), 0);
        assert_eq!(sim.peek(ids.counter), 0);
        assert_eq!(sim.peek(ids.blinker_sync), 0);
        assert_eq!(sim.phase(), Phase::Idle);
    }

    #[test]
    fn test_run_records_each_cycle() {
        let (mut sim, _) = blinky();
        let mut trace = MemoryTrace::new();
        sim.run(3, &mut trace).unwrap();

        let records = trace.records();
        assert_eq!(records.len(), 3 * 3);
        assert_eq!(records[0].cycle, 0);
        assert_eq!(records[8].cycle, 2);
        assert_eq!(records[3].signal, "top.counter");
        assert_eq!(records[3].value, 1);
    }

    #[test]
    fn test_driver_kinds() {
        let (sim, ids) = blinky();
        assert_eq!(sim.driver(ids.counter), Some(Driver::Sync));
        assert_eq!(sim.driver(ids.blinker), Some(Driver::Comb));
    }
}
