// src/lib.rs

pub mod engine;
pub mod error;
pub mod live;
pub mod optimizer;
pub mod strategies;

#[cfg(feature = "python")]
mod python;

pub use error::{BacktestError, Result};
