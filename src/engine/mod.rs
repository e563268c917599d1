// src/engine/mod.rs

pub mod alerts;
pub mod bars;
pub mod exposure;
pub mod ledger;
pub mod levels;
pub mod metrics;
pub mod orders;
pub mod params;
pub mod position;
pub mod precision;
pub mod prepare_inputs;
mod scan_entries;
pub mod settings;
mod simulate_exits;
pub mod simulator;
pub mod strategy;

use serde::Serialize;

pub use crate::engine::{
    alerts::Alerts,
    bars::{Bar, BarSeries},
    ledger::{DealLedger, DealRecord, SignalCode},
    levels::{Levels, TakeLevel, MAX_TAKES},
    metrics::{compute_metrics, compute_summary_metrics, SideMetrics, SummaryMetrics},
    orders::{order_commands, OrderCommand, OrderSize},
    params::{ParamDomain, ParamSpace, ParamValue, ParamVector},
    position::{Leg, PositionSlot, Side, MAX_LEGS},
    precision::{adjust, Precision},
    settings::{Direction, MarginMode, PositionSizeType, SimulationSettings},
    simulator::{simulate, SimulationResult},
    strategy::{BarContext, EntryPlan, Optimizable, ScaleIn, Strategy},
};

use crate::error::Result;

/// A finished run plus its statistics.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub strategy: String,
    pub result:   SimulationResult,
    pub metrics:  SummaryMetrics,
}

/// Simulate, then derive metrics from the ledger.
pub fn run_backtest<S: Strategy + ?Sized>(
    strategy: &mut S,
    bars: &BarSeries,
    settings: &SimulationSettings,
) -> Result<BacktestReport> {
    let result = simulate(strategy, bars, settings)?;
    let metrics = compute_summary_metrics(&result.ledger);
    Ok(BacktestReport { strategy: strategy.name().to_string(), result, metrics })
}
