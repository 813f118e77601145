//! Interactive stepper for a running simulation.
//!
//! Provides a terminal viewer with:
//! - Every signal with its shape, driver and current value
//! - Short waveform history per signal
//! - The register bank, with the enable flag toggleable
//! - Step/run/reset controls

mod app;
mod ui;

pub use app::{ViewerApp, run_viewer};
