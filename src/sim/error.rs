//! Simulation errors.

use thiserror::Error;

use crate::csr::CsrError;
use crate::sim::SignalId;
use crate::trace::TraceError;

/// Errors raised while building or stepping a design.
///
/// All of these are structural: retrying the same operation fails the same
/// way. Width overflow on assignment is not an error; values wrap silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("signal `{name}` has invalid width {width} (expected 1..=63)")]
    Width { name: String, width: u32 },

    #[error("invalid parameter: {0}")]
    Parameter(String),

    #[error("signal `{0}` already exists")]
    DuplicateSignal(String),

    #[error("no signal named `{0}`")]
    UnknownSignal(String),

    #[error("signal {0:?} does not belong to this design")]
    ForeignSignal(SignalId),

    #[error("signal `{0}` has more than one driver")]
    MultipleDrivers(String),

    #[error("signal `{0}` is driven by a binding and cannot be set externally")]
    DrivenSignal(String),

    #[error("combinational loop through {} after {iterations} settle passes", .signals.join(" -> "))]
    CombinationalLoop { signals: Vec<String>, iterations: usize },

    #[error("simulator faulted on an earlier step; reset to continue")]
    Faulted,

    #[error("register bank error: {0}")]
    Csr(#[from] CsrError),

    #[error("trace output failed: {0}")]
    Trace(#[from] TraceError),
}
