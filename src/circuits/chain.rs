//! A transform gated by an enable register.
//!
//! ```text
//! output = pid_enable ? transform(input << extra) >> extra : input
//! ```
//!
//! where `extra = signal_width - width`. Running the transform on the wider
//! internal signal keeps its rounding error small; the final right shift
//! truncates (arithmetically, so signs survive).

use crate::circuits::{Transform, TransformPorts};
use crate::logic::{Expr, Shape};
use crate::sim::{Design, ModuleBuilder, SignalId, SimError};

/// External width of the tutorial chain.
pub const DEFAULT_WIDTH: u32 = 14;

/// Internal width of the tutorial chain.
pub const DEFAULT_SIGNAL_WIDTH: u32 = 25;

/// Signal handles of a built chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidChain {
    pub input: SignalId,
    pub output: SignalId,
    pub enable: SignalId,
    pub transform: TransformPorts,
    /// `signal_width - width`.
    pub extra_bits: u32,
}

impl PidChain {
    /// Build the chain into `m`, with `transform` as a submodule.
    ///
    /// `input` is left undriven; the parent (or a testbench) connects it.
    pub fn build(
        m: &mut ModuleBuilder<'_>,
        width: u32,
        signal_width: u32,
        transform: &dyn Transform,
    ) -> Result<Self, SimError> {
        if signal_width < width {
            return Err(SimError::Parameter(format!(
                "signal width {} is narrower than width {}",
                signal_width, width
            )));
        }
        let extra_bits = signal_width - width;
        let outer = Shape::signed(width)
            .ok_or_else(|| SimError::Width { name: "input".into(), width })?;
        let inner = Shape::signed(signal_width)
            .ok_or_else(|| SimError::Width { name: "input_shifted".into(), width: signal_width })?;

        let input = m.signal("input", outer)?;
        let output = m.signal("output", outer)?;
        let enable = m.storage("pid_enable", Shape::BIT, 0)?;

        let input_shifted = m.signal("input_shifted", inner)?;
        m.comb(input_shifted, input << extra_bits);

        let ports = m.submodule(transform.name(), |sub| transform.elaborate(sub, inner))?;
        m.comb(ports.input, input_shifted);
        m.comb(ports.running, 1);

        let pid_output = m.signal("pid_output", inner)?;
        m.comb(pid_output, ports.output);

        m.comb(output, Expr::mux(enable, pid_output >> extra_bits, input));

        Ok(Self { input, output, enable, transform: ports, extra_bits })
    }

    /// A design whose top module is a chain.
    pub fn design(width: u32, signal_width: u32, transform: &dyn Transform) -> Result<(Design, Self), SimError> {
        Design::build("chain", |m| Self::build(m, width, signal_width, transform))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuits::{Gain, Pid, GAIN_SHIFT};
    use crate::sim::Simulator;
    use proptest::prelude::*;

    fn chain(t: &dyn Transform) -> (Simulator, PidChain) {
        let (design, c) = PidChain::design(DEFAULT_WIDTH, DEFAULT_SIGNAL_WIDTH, t).unwrap();
        (Simulator::new(design).unwrap(), c)
    }

    #[test]
    fn test_disabled_is_bypass() {
        // an integrating PID accumulates state, which must not leak out
        let (mut sim, c) = chain(&Pid::new().with_gains(1 << GAIN_SHIFT, 1 << GAIN_SHIFT, 0));
        for x in [0, 1, -1, 8191, -8192, 1234, -4321] {
            sim.poke(c.input, x).unwrap();
            assert_eq!(sim.peek(c.output), x);
            sim.step().unwrap();
            assert_eq!(sim.peek(c.output), x);
        }
        assert_ne!(sim.csr_read("pid_integral").unwrap(), 0);
    }

    #[test]
    fn test_enabled_default_pid_follows_input() {
        let (mut sim, c) = chain(&Pid::new());
        sim.csr_write("pid_enable", 1).unwrap();
        for x in [0, 5, -5, 8191, -8192] {
            sim.poke(c.input, x).unwrap();
            assert_eq!(sim.peek(c.output), x);
        }
    }

    #[test]
    fn test_enable_toggles_path() {
        let (mut sim, c) = chain(&Gain::new(-(1 << GAIN_SHIFT)));
        sim.poke(c.input, 100).unwrap();
        assert_eq!(sim.peek(c.output), 100);
        sim.csr_write("pid_enable", 1).unwrap();
        assert_eq!(sim.peek(c.output), -100);
        sim.csr_write("pid_enable", 0).unwrap();
        assert_eq!(sim.peek(c.output), 100);
    }

    #[test]
    fn test_extra_bits_and_names() {
        let (sim, c) = chain(&Pid::new());
        assert_eq!(c.extra_bits, 11);
        assert_eq!(sim.store().name(c.transform.output), "chain.pid.pid_out");
        let names: Vec<_> = sim.csrs().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["pid_enable", "pid_integral", "pid_kd", "pid_ki", "pid_kp", "pid_setpoint"]);
    }

    #[test]
    fn test_narrow_signal_width_rejected() {
        let err = PidChain::design(14, 10, &Pid::new()).unwrap_err();
        assert!(matches!(err, SimError::Parameter(_)));
    }

    proptest! {
        #[test]
        fn enabled_rounding_error_is_bounded(x in -8192i64..8192, k in -8000i64..8000) {
            let (mut sim, c) = chain(&Gain::new(k));
            sim.csr_write("pid_enable", 1).unwrap();
            sim.poke(c.input, x).unwrap();

            let extra = c.extra_bits;
            // exact result of the gain on the shifted input, in internal units
            let reference = ((x << extra) as f64) * (k as f64) / (1u64 << GAIN_SHIFT) as f64;
            let limit = (1i64 << (DEFAULT_SIGNAL_WIDTH - 1)) as f64;
            prop_assume!(reference.abs() < limit - 1.0);

            let got = (sim.peek(c.output) << extra) as f64;
            let err = reference - got;
            prop_assert!(err >= 0.0, "err {}", err);
            // truncation by the final shift loses less than one external LSB
            prop_assert!(err < (1i64 << extra) as f64, "err {}", err);
        }
    }
}
