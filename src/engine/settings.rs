// src/engine/settings.rs

use serde::{Deserialize, Serialize};

use crate::engine::position::Side;
use crate::engine::precision::Precision;
use crate::error::{BacktestError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSizeType {
    /// `position_size` is a percentage of current equity.
    #[default]
    PercentOfEquity,
    /// `position_size` is an amount of quote currency.
    FixedCurrency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Both,
    LongOnly,
    ShortOnly,
}

impl Direction {
    pub fn allows(self, side: Side) -> bool {
        match self {
            Direction::Both => true,
            Direction::LongOnly => side == Side::Long,
            Direction::ShortOnly => side == Side::Short,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginMode {
    #[default]
    Isolated,
    Cross,
}

/// Account and exchange settings for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub initial_capital:    f64,
    /// Percent per side: 0.05 means 0.05%.
    pub commission_pct:     f64,
    pub leverage:           u32,
    pub position_size_type: PositionSizeType,
    pub position_size:      f64,
    pub direction:          Direction,
    pub margin_mode:        MarginMode,
    pub hedge:              bool,
    pub precision:          Precision,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            initial_capital:    10_000.0,
            commission_pct:     0.05,
            leverage:           1,
            position_size_type: PositionSizeType::PercentOfEquity,
            position_size:      100.0,
            direction:          Direction::Both,
            margin_mode:        MarginMode::Isolated,
            hedge:              false,
            precision:          Precision::default(),
        }
    }
}

impl SimulationSettings {
    pub fn validate(&self) -> Result<()> {
        self.precision.validate()?;
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(invalid("initial_capital", "must be positive"));
        }
        if !(self.commission_pct.is_finite() && (0.0..100.0).contains(&self.commission_pct)) {
            return Err(invalid("commission_pct", "must be in [0, 100)"));
        }
        if self.leverage == 0 {
            return Err(invalid("leverage", "must be at least 1"));
        }
        if !(self.position_size.is_finite() && self.position_size > 0.0) {
            return Err(invalid("position_size", "must be positive"));
        }
        Ok(())
    }

    /// Raw (unrounded) order quantity for a market fill at `price`.
    pub fn order_quantity(&self, equity: f64, price: f64, position_size: f64) -> f64 {
        let notional = match self.position_size_type {
            PositionSizeType::PercentOfEquity => {
                equity * self.leverage as f64 * (position_size / 100.0)
            }
            PositionSizeType::FixedCurrency => position_size * self.leverage as f64,
        };
        notional * (1.0 - self.commission_pct / 100.0) / price
    }

    /// Raw liquidation level for a position entered at `entry`.
    pub fn liquidation_price(&self, side: Side, entry: f64) -> f64 {
        entry * (1.0 - side.sign() / self.leverage as f64)
    }
}

fn invalid(name: &'static str, reason: &str) -> BacktestError {
    BacktestError::InvalidSetting { name, reason: reason.to_string() }
}
