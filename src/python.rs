// src/python.rs

use numpy::{IntoPyArray, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::engine::{
    compute_metrics, precision, run_backtest, BarSeries, DealLedger, Precision, SideMetrics, SimulationSettings,
    SummaryMetrics,
};
use crate::error::BacktestError;
use crate::strategies::{BreakoutParams, ChannelBreakout};

fn value_error(e: BacktestError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Snap `value` to the nearest multiple of `step`.
#[pyfunction]
fn adjust(value: f64, step: f64) -> f64 {
    precision::adjust(value, step)
}

/// Metrics for a 13-column deal matrix as produced by `run_breakout`.
#[pyfunction]
#[pyo3(name = "compute_metrics", signature = (deals, initial_capital))]
fn compute_metrics_py(py: Python<'_>, deals: PyReadonlyArray2<'_, f64>, initial_capital: f64) -> PyResult<PyObject> {
    let records = DealLedger::records_from_array(deals.as_array()).map_err(value_error)?;
    let summary = compute_metrics(initial_capital, &records);
    summary_to_py(py, &summary)
}

#[pyfunction]
#[pyo3(signature = (
    time, open, high, low, close, volume,
    entry_period=20, exit_period=10, stop_pct=2.0, take_pct=6.0, trail=true,
    initial_capital=10_000.0, commission_pct=0.05, leverage=1, position_size=100.0,
    price_step=0.01, qty_step=0.001
))]
#[allow(clippy::too_many_arguments)]
fn run_breakout(
    py: Python<'_>,
    time:            PyReadonlyArray1<'_, i64>,
    open:            PyReadonlyArray1<'_, f64>,
    high:            PyReadonlyArray1<'_, f64>,
    low:             PyReadonlyArray1<'_, f64>,
    close:           PyReadonlyArray1<'_, f64>,
    volume:          PyReadonlyArray1<'_, f64>,
    entry_period:    usize,
    exit_period:     usize,
    stop_pct:        f64,
    take_pct:        f64,
    trail:           bool,
    initial_capital: f64,
    commission_pct:  f64,
    leverage:        u32,
    position_size:   f64,
    price_step:      f64,
    qty_step:        f64,
) -> PyResult<PyObject> {
    // 1) Columns into a series
    let bars = BarSeries::from_columns(
        time.as_slice()?.to_vec(),
        open.as_slice()?.to_vec(),
        high.as_slice()?.to_vec(),
        low.as_slice()?.to_vec(),
        close.as_slice()?.to_vec(),
        volume.as_slice()?.to_vec(),
    )
    .map_err(value_error)?;

    // 2) Strategy and settings
    let mut strategy = ChannelBreakout::new(BreakoutParams { entry_period, exit_period, stop_pct, take_pct, trail })
        .map_err(value_error)?;
    let settings = SimulationSettings {
        initial_capital,
        commission_pct,
        leverage,
        position_size,
        precision: Precision::new(price_step, qty_step).map_err(value_error)?,
        ..Default::default()
    };

    // 3) Run
    let report = run_backtest(&mut strategy, &bars, &settings).map_err(value_error)?;

    // 4) Marshal
    let out = PyDict::new(py);
    out.set_item("deals", report.result.ledger.to_array().into_pyarray(py))?;
    out.set_item("equity", report.result.equity)?;
    out.set_item("open_side", report.result.open_side().map(|s| s.code()))?;
    out.set_item("metrics", summary_to_py(py, &report.metrics)?)?;
    Ok(out.into())
}

fn summary_to_py(py: Python<'_>, summary: &SummaryMetrics) -> PyResult<PyObject> {
    let d = PyDict::new(py);
    d.set_item("overall", side_to_py(py, &summary.overall)?)?;
    d.set_item("long", side_to_py(py, &summary.longs)?)?;
    d.set_item("short", side_to_py(py, &summary.shorts)?)?;
    Ok(d.into())
}

fn side_to_py(py: Python<'_>, m: &SideMetrics) -> PyResult<PyObject> {
    let d = PyDict::new(py);
    d.set_item("net_profit",       m.net_profit)?;
    d.set_item("net_profit_pct",   m.net_profit_pct)?;
    d.set_item("gross_profit",     m.gross_profit)?;
    d.set_item("gross_profit_pct", m.gross_profit_pct)?;
    d.set_item("gross_loss",       m.gross_loss)?;
    d.set_item("gross_loss_pct",   m.gross_loss_pct)?;
    d.set_item("profit_factor",    m.profit_factor)?;
    d.set_item("commission_paid",  m.commission_paid)?;
    d.set_item("total_trades",     m.total_trades)?;
    d.set_item("winning_trades",   m.winning_trades)?;
    d.set_item("losing_trades",    m.losing_trades)?;
    d.set_item("win_rate",         m.win_rate)?;
    d.set_item("avg_trade",        m.avg_trade)?;
    d.set_item("avg_trade_pct",    m.avg_trade_pct)?;
    d.set_item("avg_win",          m.avg_win)?;
    d.set_item("avg_win_pct",      m.avg_win_pct)?;
    d.set_item("avg_loss",         m.avg_loss)?;
    d.set_item("avg_loss_pct",     m.avg_loss_pct)?;
    d.set_item("win_loss_ratio",   m.win_loss_ratio)?;
    d.set_item("largest_win",      m.largest_win)?;
    d.set_item("largest_win_pct",  m.largest_win_pct)?;
    d.set_item("largest_loss",     m.largest_loss)?;
    d.set_item("largest_loss_pct", m.largest_loss_pct)?;
    d.set_item("max_run_up",       m.max_run_up)?;
    d.set_item("max_run_up_pct",   m.max_run_up_pct)?;
    d.set_item("max_drawdown",     m.max_drawdown)?;
    d.set_item("max_drawdown_pct", m.max_drawdown_pct)?;
    d.set_item("recovery_factor",  m.recovery_factor)?;
    d.set_item("sharpe_ratio",     m.sharpe_ratio)?;
    d.set_item("sortino_ratio",    m.sortino_ratio)?;
    d.set_item("skewness",         m.skewness)?;
    d.set_item("liquidations",     m.liquidations)?;
    d.set_item("max_order_size",   m.max_order_size)?;
    d.set_item("equity",           PyList::new(py, &m.equity))?;
    Ok(d.into())
}

#[pymodule]
fn tradesim(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(adjust, m)?)?;
    m.add_function(wrap_pyfunction!(compute_metrics_py, m)?)?;
    m.add_function(wrap_pyfunction!(run_breakout, m)?)?;
    Ok(())
}
