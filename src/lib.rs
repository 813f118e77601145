//! # gatesim
//!
//! A small simulator for synchronous digital logic.
//!
//! A design is a tree of modules that own fixed-width signals. Signals are
//! driven either combinationally (recomputed within the same cycle) or
//! through registers (sampled this cycle, visible on the next). The
//! [`Simulator`] advances a design one clock at a time with an explicit
//! two-phase update, which is what lets many things "happen at once" without
//! any concurrency.
//!
//! Two example circuits come with it: a blinking counter and a PID stage
//! gated by an enable register.

pub mod logic;
pub mod sim;
pub mod csr;
pub mod trace;
pub mod circuits;
pub mod config;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use logic::{bits_for, Expr, Shape};
pub use sim::{Design, ModuleBuilder, Phase, SignalId, SimError, Simulator};
pub use csr::{CsrBank, CsrDirection, CsrError};
pub use trace::{JsonLinesTrace, MemoryTrace, TraceRecord, TraceSink};
pub use circuits::{Blinker, Gain, Pid, PidChain, Transform};
pub use config::{ConfigError, RunConfig, TransformConfig};

#[cfg(feature = "tui")]
pub use tui::run_viewer;
