//! A counter that blinks.
//!
//! Every cycle the counter is incremented. The `blinker` flag is high while
//! the counter sits in the upper half of its period; `blinker_sync` carries
//! the same comparison through a register, so it lags by one cycle.

use crate::logic::{bits_for, Expr, Shape};
use crate::sim::{Design, ModuleBuilder, SignalId, SimError};

/// Period of the tutorial blinker.
pub const DEFAULT_PERIOD: u32 = 8;

/// Signal handles of a built blinker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blinker {
    pub counter: SignalId,
    pub blinker: SignalId,
    pub blinker_sync: SignalId,
    pub period: u32,
}

impl Blinker {
    /// Build a blinker into `m`.
    ///
    /// The counter is exactly wide enough for `period - 1`. A power-of-two
    /// period wraps by overflow; any other period resets explicitly.
    pub fn build(m: &mut ModuleBuilder<'_>, period: u32) -> Result<Self, SimError> {
        if period == 0 {
            return Err(SimError::Parameter("blinker period must be at least 1".into()));
        }
        let last = period as i64 - 1;
        let width = bits_for(last);
        let shape = Shape::unsigned(width)
            .ok_or_else(|| SimError::Width { name: "counter".into(), width })?;

        let counter = m.signal("counter", shape)?;
        let blinker = m.signal("blinker", Shape::BIT)?;
        let blinker_sync = m.signal("blinker_sync", Shape::BIT)?;

        // a u1 counter for period 1 would toggle, so it takes the reset path
        if period > 1 && period.is_power_of_two() {
            m.sync(counter, counter + 1);
        } else {
            m.sync(counter, Expr::mux(Expr::sig(counter).equals(last), 0, counter + 1));
        }

        let upper_half = Expr::sig(counter).ge(period as i64 / 2);
        m.comb(blinker, upper_half.clone());
        m.sync(blinker_sync, upper_half);

        m.status("counter", counter);
        m.status("blinker", blinker);

        Ok(Self { counter, blinker, blinker_sync, period })
    }

    /// A design whose top module is a blinker.
    pub fn design(period: u32) -> Result<(Design, Self), SimError> {
        Design::build("blinker", |m| Self::build(m, period))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Simulator;
    use crate::trace::MemoryTrace;

    #[test]
    fn test_tutorial_waveform() {
        let (design, b) = Blinker::design(DEFAULT_PERIOD).unwrap();
        let mut sim = Simulator::new(design).unwrap();
        let mut trace = MemoryTrace::new();
        sim.run(16, &mut trace).unwrap();

        let counter = trace.values_of("blinker.counter");
        let blinker = trace.values_of("blinker.blinker");
        let sync = trace.values_of("blinker.blinker_sync");

        assert_eq!(counter, vec![0, 1, 2, 3, 4, 5, 6, 7, 0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(blinker, vec![0, 0, 0, 0, 1, 1, 1, 1, 0, 0, 0, 0, 1, 1, 1, 1]);
        assert_eq!(sync, vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 0, 0, 0, 0, 1, 1, 1]);
        assert_eq!(sim.peek(b.counter), 0);
    }

    #[test]
    fn test_odd_period_resets() {
        let (design, b) = Blinker::design(5).unwrap();
        let mut sim = Simulator::new(design).unwrap();
        let mut seen = Vec::new();
        for _ in 0..10 {
            seen.push((sim.peek(b.counter), sim.peek(b.blinker)));
            sim.step().unwrap();
        }
        let counts: Vec<_> = seen.iter().map(|s| s.0).collect();
        assert_eq!(counts, vec![0, 1, 2, 3, 4, 0, 1, 2, 3, 4]);
        // threshold is 5 / 2 = 2
        assert_eq!(seen[2].1, 1);
        assert_eq!(seen[1].1, 0);
    }

    #[test]
    fn test_period_one_holds_zero() {
        let (design, b) = Blinker::design(1).unwrap();
        let mut sim = Simulator::new(design).unwrap();
        let mut counts = Vec::new();
        for _ in 0..4 {
            sim.step().unwrap();
            counts.push(sim.peek(b.counter));
        }
        assert_eq!(counts, vec![0, 0, 0, 0]);
        // 0 >= 1 / 2, so the flag stays high
        assert_eq!(sim.peek(b.blinker), 1);
    }

    #[test]
    fn test_status_registers() {
        let (design, _) = Blinker::design(DEFAULT_PERIOD).unwrap();
        let mut sim = Simulator::new(design).unwrap();
        for _ in 0..5 {
            sim.step().unwrap();
        }
        assert_eq!(sim.csr_read("counter").unwrap(), 5);
        assert_eq!(sim.csr_read("blinker").unwrap(), 1);
        assert!(sim.csr_write("counter", 0).is_err());
    }

    #[test]
    fn test_zero_period_rejected() {
        assert!(matches!(Blinker::design(0), Err(SimError::Parameter(_))));
    }
}
