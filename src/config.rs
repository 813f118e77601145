//! Run configuration.
//!
//! A run can be described by a JSON file; every field is optional and
//! command-line flags override whatever the file says.
//!
//! ```json
//! {
//!   "cycles": 32,
//!   "transform": { "kind": "pid", "kp": 4096, "ki": 64, "kd": 0 },
//!   "csr": { "pid_enable": 1, "pid_setpoint": 0 },
//!   "stimulus": [0, 100, 200, 200, 200],
//!   "trace": "chain.jsonl"
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::circuits::{blinker, chain, Gain, Pid, Transform};
use crate::circuits::pid::UNITY;
use crate::sim::{SignalId, SimError, Simulator};

/// Which transform sits inside the gated chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransformConfig {
    Pid {
        #[serde(default = "unity")]
        kp: i64,
        #[serde(default)]
        ki: i64,
        #[serde(default)]
        kd: i64,
    },
    Gain {
        #[serde(default = "unity")]
        k: i64,
    },
}

fn unity() -> i64 {
    UNITY
}

impl TransformConfig {
    /// Instantiate the configured transform.
    pub fn build(&self) -> Box<dyn Transform> {
        match *self {
            TransformConfig::Pid { kp, ki, kd } => Box::new(Pid::new().with_gains(kp, ki, kd)),
            TransformConfig::Gain { k } => Box::new(Gain::new(k)),
        }
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig::Pid { kp: UNITY, ki: 0, kd: 0 }
    }
}

/// Parameters of one simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Number of clock cycles to simulate.
    pub cycles: u64,
    /// Blinker period.
    pub period: u32,
    /// External width of the chain.
    pub width: u32,
    /// Internal width of the chain.
    pub signal_width: u32,
    pub transform: TransformConfig,
    /// Register writes applied before the first cycle.
    pub csr: BTreeMap<String, i64>,
    /// Chain input per cycle; the last value is held once exhausted.
    pub stimulus: Vec<i64>,
    /// Where to append a JSON-lines trace.
    pub trace: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            cycles: 16,
            period: blinker::DEFAULT_PERIOD,
            width: chain::DEFAULT_WIDTH,
            signal_width: chain::DEFAULT_SIGNAL_WIDTH,
            transform: TransformConfig::default(),
            csr: BTreeMap::new(),
            stimulus: Vec::new(),
            trace: None,
        }
    }
}

impl RunConfig {
    /// Load a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_json(&text)
    }

    /// Parse a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Input value for `cycle`, holding the last stimulus value.
    pub fn stimulus_at(&self, cycle: u64) -> Option<i64> {
        let last = self.stimulus.len().checked_sub(1)?;
        let index = (cycle as usize).min(last);
        self.stimulus.get(index).copied()
    }

    /// Apply the configured register writes to a simulator.
    pub fn apply_csrs(&self, sim: &mut Simulator) -> Result<(), SimError> {
        for (name, value) in &self.csr {
            sim.csr_write(name, *value)?;
        }
        Ok(())
    }

    /// Drive `input` with the stimulus for the simulator's current cycle.
    pub fn apply_stimulus(&self, sim: &mut Simulator, input: SignalId) -> Result<(), SimError> {
        match self.stimulus_at(sim.cycle()) {
            Some(value) => sim.poke(input, value),
            None => Ok(()),
        }
    }
}

/// Errors that can occur while loading a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("invalid configuration: {0}")]
    Parse(String),
}
