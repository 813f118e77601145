//! Control/status register bank.
//!
//! Registers are declared explicitly by each module through
//! [`ModuleBuilder::csr`](crate::sim::ModuleBuilder::csr); nothing is
//! discovered by reflection. The bank flattens the declarations of a whole
//! design into one name-indexed table:
//! - **status** registers are read-only snapshots of a signal
//! - **storage** registers are writable from outside and drive a signal

mod bank;

pub use bank::{CsrBank, CsrDirection, CsrEntry, CsrError, CsrSpec};
