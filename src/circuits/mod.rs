//! Example circuits.
//!
//! - [`Blinker`] - a free-running counter with a combinational and a
//!   registered "upper half" flag
//! - [`PidChain`] - a transform gated by an enable register, with fixed-point
//!   headroom at its boundary
//! - [`Pid`], [`Gain`] - transforms that can sit inside the chain

pub mod blinker;
pub mod chain;
pub mod pid;

pub use blinker::Blinker;
pub use chain::PidChain;
pub use pid::{Gain, Pid, GAIN_SHIFT, GAIN_WIDTH};

use crate::logic::Shape;
use crate::sim::{ModuleBuilder, SignalId, SimError};

/// Signals a transform exposes to whoever instantiates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformPorts {
    pub input: SignalId,
    /// Held high while the transform should accumulate state.
    pub running: SignalId,
    pub output: SignalId,
}

/// A stateful block with one input and one output of the same shape.
///
/// The chain treats a transform as opaque: it drives `input` and `running`
/// and reads `output`, and nothing else.
pub trait Transform {
    /// Name of the submodule the transform is built in.
    fn name(&self) -> &str;

    /// Declare the transform's signals and bindings inside `m`.
    fn elaborate(&self, m: &mut ModuleBuilder<'_>, shape: Shape) -> Result<TransformPorts, SimError>;
}
