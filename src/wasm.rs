//! WebAssembly bindings for gatesim.
//!
//! This module provides JavaScript-friendly wrappers around the example
//! circuits.

use wasm_bindgen::prelude::*;
use crate::circuits::{Blinker, Pid, PidChain};
use crate::sim::{SignalId, Simulator};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_err(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

/// WebAssembly-friendly simulator wrapper.
#[wasm_bindgen]
pub struct WasmSim {
    sim: Simulator,
    input: Option<SignalId>,
}

#[wasm_bindgen]
impl WasmSim {
    /// Simulate the blinking counter.
    #[wasm_bindgen]
    pub fn blinker(period: u32) -> Result<WasmSim, JsError> {
        let (design, _) = Blinker::design(period).map_err(js_err)?;
        let sim = Simulator::new(design).map_err(js_err)?;
        Ok(Self { sim, input: None })
    }

    /// Simulate the gated PID chain.
    #[wasm_bindgen]
    pub fn chain(width: u32, signal_width: u32) -> Result<WasmSim, JsError> {
        let (design, c) = PidChain::design(width, signal_width, &Pid::new()).map_err(js_err)?;
        let sim = Simulator::new(design).map_err(js_err)?;
        Ok(Self { sim, input: Some(c.input) })
    }

    /// Advance one cycle.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<(), JsError> {
        self.sim.step().map_err(js_err)
    }

    /// Advance `cycles` cycles. Returns the cycle count afterwards.
    #[wasm_bindgen]
    pub fn run(&mut self, cycles: u32) -> Result<u64, JsError> {
        for _ in 0..cycles {
            self.sim.step().map_err(js_err)?;
        }
        Ok(self.sim.cycle())
    }

    /// Reset to cycle 0.
    #[wasm_bindgen]
    pub fn reset(&mut self) -> Result<(), JsError> {
        self.sim.reset().map_err(js_err)
    }

    /// Current cycle.
    #[wasm_bindgen]
    pub fn cycle(&self) -> u64 {
        self.sim.cycle()
    }

    /// Value of a signal by hierarchical name.
    #[wasm_bindgen]
    pub fn peek(&self, name: &str) -> Result<i64, JsError> {
        self.sim.peek_by_name(name).map_err(js_err)
    }

    /// Drive the chain input.
    #[wasm_bindgen]
    pub fn set_input(&mut self, value: i64) -> Result<(), JsError> {
        let input = self.input.ok_or_else(|| JsError::new("this circuit has no input"))?;
        self.sim.poke(input, value).map_err(js_err)
    }

    /// Read a register.
    #[wasm_bindgen]
    pub fn csr_read(&self, name: &str) -> Result<i64, JsError> {
        self.sim.csr_read(name).map_err(js_err)
    }

    /// Write a storage register.
    #[wasm_bindgen]
    pub fn csr_write(&mut self, name: &str, value: i64) -> Result<(), JsError> {
        self.sim.csr_write(name, value).map_err(js_err)
    }

    /// All signal names, in creation order.
    #[wasm_bindgen]
    pub fn signal_names(&self) -> js_sys::Array {
        self.sim
            .store()
            .ids()
            .map(|id| JsValue::from_str(self.sim.store().name(id)))
            .collect()
    }

    /// Current cycle's trace records as JSON.
    #[wasm_bindgen]
    pub fn snapshot_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.sim.snapshot()).map_err(js_err)
    }

    /// Register bank as JSON.
    #[wasm_bindgen]
    pub fn registers_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.sim.csrs()).map_err(js_err)
    }
}
