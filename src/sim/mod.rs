//! Two-phase cycle simulation.
//!
//! This module implements the simulation core:
//! - [`SignalStore`] - named, fixed-width signal values
//! - [`Module`] / [`Design`] - hierarchical ownership of signals and bindings
//! - [`Simulator`] - the cycle evaluator (combinational settle, registered commit)

pub mod store;
pub mod module;
pub mod simulator;
mod error;

pub use store::{SignalId, SignalInfo, SignalStore};
pub use module::{Binding, Design, Module, ModuleBuilder};
pub use simulator::{Driver, Phase, Simulator};
pub use error::SimError;
