//! Fixed-point transforms.
//!
//! Gains are signed [`GAIN_WIDTH`]-bit values with [`GAIN_SHIFT`] fractional
//! bits, so `1 << GAIN_SHIFT` is unity.

use crate::circuits::{Transform, TransformPorts};
use crate::logic::{Expr, Shape};
use crate::sim::{ModuleBuilder, SimError};

/// Fractional bits of a gain.
pub const GAIN_SHIFT: u32 = 12;

/// Width of a gain register.
pub const GAIN_WIDTH: u32 = 16;

/// Unity gain.
pub const UNITY: i64 = 1 << GAIN_SHIFT;

fn gain_shape() -> Result<Shape, SimError> {
    Shape::signed(GAIN_WIDTH).ok_or_else(|| SimError::Parameter(format!("gain width {}", GAIN_WIDTH)))
}

/// A PID controller with register-programmable gains.
///
/// ```text
/// error    = input - setpoint
/// p        = (error * kp) >> GAIN_SHIFT
/// integral <= running ? integral + ((error * ki) >> GAIN_SHIFT) : 0
/// d        = ((error - prev_error) * kd) >> GAIN_SHIFT
/// pid_out  = p + integral + d
/// ```
///
/// Every term saturates at the signal width rather than wrapping. With the
/// default gains (kp = 1, ki = kd = 0, setpoint = 0) the output follows the
/// input.
#[derive(Debug, Clone)]
pub struct Pid {
    name: String,
    kp: i64,
    ki: i64,
    kd: i64,
}

impl Pid {
    pub fn new() -> Self {
        Self {
            name: "pid".to_string(),
            kp: UNITY,
            ki: 0,
            kd: 0,
        }
    }

    /// Reset values of the three gain registers.
    pub fn with_gains(mut self, kp: i64, ki: i64, kd: i64) -> Self {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        self
    }
}

impl Default for Pid {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for Pid {
    fn name(&self) -> &str {
        &self.name
    }

    fn elaborate(&self, m: &mut ModuleBuilder<'_>, shape: Shape) -> Result<TransformPorts, SimError> {
        let gain = gain_shape()?;

        let input = m.signal("input", shape)?;
        let running = m.signal("running", Shape::BIT)?;
        let output = m.signal("pid_out", shape)?;

        let setpoint = m.storage("setpoint", shape, 0)?;
        let kp = m.storage("kp", gain, self.kp)?;
        let ki = m.storage("ki", gain, self.ki)?;
        let kd = m.storage("kd", gain, self.kd)?;

        let error = m.signal("error", shape)?;
        m.comb(error, (input - setpoint).saturate(shape));

        let p = m.signal("p", shape)?;
        m.comb(p, ((error * kp) >> GAIN_SHIFT).saturate(shape));

        let integral = m.signal("integral", shape)?;
        let accumulated = (integral + ((error * ki) >> GAIN_SHIFT)).saturate(shape);
        m.sync(integral, Expr::mux(running, accumulated, 0));

        let prev_error = m.signal("prev_error", shape)?;
        m.sync(prev_error, error);

        let d = m.signal("d", shape)?;
        m.comb(d, (((error - prev_error) * kd) >> GAIN_SHIFT).saturate(shape));

        m.comb(output, (p + integral + d).saturate(shape));
        m.status("integral", integral);

        Ok(TransformPorts { input, running, output })
    }
}

/// Stateless scaling by a fixed-point constant.
#[derive(Debug, Clone)]
pub struct Gain {
    name: String,
    k: i64,
}

impl Gain {
    /// `k` is in units of `1 / 2^GAIN_SHIFT`.
    pub fn new(k: i64) -> Self {
        Self { name: "gain".to_string(), k }
    }
}

impl Transform for Gain {
    fn name(&self) -> &str {
        &self.name
    }

    fn elaborate(&self, m: &mut ModuleBuilder<'_>, shape: Shape) -> Result<TransformPorts, SimError> {
        let input = m.signal("input", shape)?;
        let running = m.signal("running", Shape::BIT)?;
        let output = m.signal("output", shape)?;
        let k = m.storage("k", gain_shape()?, self.k)?;

        m.comb(output, ((input * k) >> GAIN_SHIFT).saturate(shape));
        Ok(TransformPorts { input, running, output })
    }
}
