// src/engine/precision.rs

use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};

/// Decimal places kept after snapping to a step.
const ADJUST_DIGITS: i32 = 10;

/// Snap `value` to the nearest multiple of `step`, then round to 10 decimals.
///
/// Both roundings use `f64::round`, so ties go away from zero
/// (`adjust(0.25, 0.5) == 0.5`, `adjust(-0.25, 0.5) == -0.5`).
/// NaN propagates.
pub fn adjust(value: f64, step: f64) -> f64 {
    round_to((value / step).round() * step, ADJUST_DIGITS)
}

/// Round to a fixed number of decimal places, ties away from zero.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

/// Exchange step sizes for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Precision {
    pub price_step: f64,
    pub qty_step:   f64,
}

impl Default for Precision {
    fn default() -> Self {
        Self { price_step: 0.01, qty_step: 0.001 }
    }
}

impl Precision {
    pub fn new(price_step: f64, qty_step: f64) -> Result<Self> {
        let p = Self { price_step, qty_step };
        p.validate()?;
        Ok(p)
    }

    pub fn validate(&self) -> Result<()> {
        check_step("price_step", self.price_step)?;
        check_step("qty_step", self.qty_step)
    }

    #[inline]
    pub fn price(&self, value: f64) -> f64 {
        adjust(value, self.price_step)
    }

    #[inline]
    pub fn qty(&self, value: f64) -> f64 {
        adjust(value, self.qty_step)
    }
}

fn check_step(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(BacktestError::InvalidStep { name, value })
    }
}
