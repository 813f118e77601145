//! Bit-vector value model.
//!
//! This module provides the core types for describing fixed-width values:
//! - [`Shape`] - width and signedness of a signal
//! - [`Expr`] - the expression tree on the right-hand side of a binding
//! - [`bits_for`] - how many bits a constant needs

mod value;
pub mod expr;

pub use value::{bits_for, Shape, MAX_WIDTH};
pub use expr::Expr;
