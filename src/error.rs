// src/error.rs

use thiserror::Error;

/// Caller precondition failures. Everything here is detected before the bar
/// loop starts; the loop itself never fails.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("bar series is empty")]
    EmptySeries,

    #[error("bar times must be strictly increasing (index {index})")]
    UnorderedTime { index: usize },

    #[error("`{field}` holds a non-finite value at index {index}")]
    NonFinite { field: &'static str, index: usize },

    #[error("`{name}` length {got} != expected {expected}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{name} must be a positive finite number, got {value}")]
    InvalidStep { name: &'static str, value: f64 },

    #[error("invalid setting `{name}`: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    #[error("parameter vector has {got} genes, expected {expected}")]
    ParamCount { expected: usize, got: usize },

    #[error("parameter `{name}` has an empty domain")]
    EmptyDomain { name: String },

    #[error("parameter #{index} is not {expected}")]
    ParamType { index: usize, expected: &'static str },

    #[error("need at least {needed} bars to split train/validation windows, got {got}")]
    NotEnoughBars { needed: usize, got: usize },

    #[error("deal row {row} is malformed: {reason}")]
    MalformedDeal { row: usize, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, BacktestError>;
