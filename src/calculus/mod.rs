// src/calculus/mod.rs

//! Numeric calculus over single-variable expressions in `x`.

pub mod derivative;
pub mod integral;

pub use derivative::{central_difference, numeric_derivative, DEFAULT_STEP};
pub use integral::{numeric_integral, simpson, simpson_intervals, DEFAULT_INTERVALS};
