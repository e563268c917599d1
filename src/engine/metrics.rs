// src/engine/metrics.rs

use serde::Serialize;

use crate::engine::exposure::{equity_curve, max_drawdown, max_run_up};
use crate::engine::ledger::{DealLedger, DealRecord};
use crate::engine::position::Side;

/// Profitability and risk statistics over one partition of the ledger.
/// Amounts are in quote currency, `*_pct` fields in percent. Degenerate
/// ratios are NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideMetrics {
    pub net_profit:         f64,
    pub net_profit_pct:     f64,
    pub gross_profit:       f64,
    pub gross_profit_pct:   f64,
    pub gross_loss:         f64,   // positive
    pub gross_loss_pct:     f64,
    pub profit_factor:      f64,
    pub commission_paid:    f64,
    pub total_trades:       usize,
    pub winning_trades:     usize,
    pub losing_trades:      usize, // pnl <= 0
    pub win_rate:           f64,
    pub avg_trade:          f64,
    pub avg_trade_pct:      f64,
    pub avg_win:            f64,
    pub avg_win_pct:        f64,
    pub avg_loss:           f64,   // positive
    pub avg_loss_pct:       f64,
    pub win_loss_ratio:     f64,
    pub largest_win:        f64,
    pub largest_win_pct:    f64,
    pub largest_loss:       f64,   // positive
    pub largest_loss_pct:   f64,
    pub max_run_up:         f64,
    pub max_run_up_pct:     f64,
    pub max_drawdown:       f64,
    pub max_drawdown_pct:   f64,
    pub recovery_factor:    f64,
    pub sharpe_ratio:       f64,
    pub sortino_ratio:      f64,
    pub skewness:           f64,
    pub liquidations:       usize,
    pub max_order_size:     f64,
    pub equity:             Vec<f64>,
}

/// Combined, long-only and short-only views of one ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub overall: SideMetrics,
    pub longs:   SideMetrics,
    pub shorts:  SideMetrics,
}

impl SummaryMetrics {
    pub fn side(&self, side: Side) -> &SideMetrics {
        side.pick(&self.longs, &self.shorts)
    }
}

/// Build the three partitions from a ledger.
pub fn compute_summary_metrics(ledger: &DealLedger) -> SummaryMetrics {
    compute_metrics(ledger.initial_capital(), ledger.records())
}

/// Same as [`compute_summary_metrics`] over bare records, e.g. a deal matrix
/// handed in from outside.
pub fn compute_metrics(initial_capital: f64, deals: &[DealRecord]) -> SummaryMetrics {
    let all:    Vec<&DealRecord> = deals.iter().collect();
    let longs:  Vec<&DealRecord> = deals.iter().filter(|d| d.side == Side::Long).collect();
    let shorts: Vec<&DealRecord> = deals.iter().filter(|d| d.side == Side::Short).collect();

    SummaryMetrics {
        overall: compute_side_metrics(initial_capital, &all),
        longs:   compute_side_metrics(initial_capital, &longs),
        shorts:  compute_side_metrics(initial_capital, &shorts),
    }
}

fn compute_side_metrics(initial_capital: f64, deals: &[&DealRecord]) -> SideMetrics {
    let pct_of_capital = |x: f64| x / initial_capital * 100.0;

    let winners: Vec<&DealRecord> = deals.iter().copied().filter(|d| d.is_win()).collect();
    let losers:  Vec<&DealRecord> = deals.iter().copied().filter(|d| !d.is_win()).collect();

    // 1) Profit and loss totals
    let gross_profit: f64 = winners.iter().map(|d| d.pnl_abs).sum();
    let gross_loss: f64 = losers.iter().map(|d| d.pnl_abs).sum::<f64>().abs();
    let net_profit = gross_profit - gross_loss;
    let commission_paid = deals.iter().map(|d| d.commission_paid).sum();

    // 2) Per-trade averages and extremes
    let pnl:     Vec<f64> = deals.iter().map(|d| d.pnl_abs).collect();
    let pnl_pct: Vec<f64> = deals.iter().map(|d| d.pnl_pct).collect();
    let win_pnl: Vec<f64> = winners.iter().map(|d| d.pnl_abs).collect();
    let win_pct: Vec<f64> = winners.iter().map(|d| d.pnl_pct).collect();
    let loss_pnl: Vec<f64> = losers.iter().map(|d| d.pnl_abs).collect();
    let loss_pct: Vec<f64> = losers.iter().map(|d| d.pnl_pct).collect();

    let avg_win = mean(&win_pnl);
    let avg_loss = mean(&loss_pnl).abs();

    // 3) Equity walks
    let equity = equity_curve(initial_capital, pnl.iter().copied());
    let (max_run_up, max_run_up_pct) = max_run_up(&equity);
    let (max_drawdown, max_drawdown_pct) = max_drawdown(&equity);

    SideMetrics {
        net_profit,
        net_profit_pct:   pct_of_capital(net_profit),
        gross_profit,
        gross_profit_pct: pct_of_capital(gross_profit),
        gross_loss,
        gross_loss_pct:   pct_of_capital(gross_loss),
        profit_factor:    ratio(gross_profit, gross_loss),
        commission_paid,
        total_trades:     deals.len(),
        winning_trades:   winners.len(),
        losing_trades:    losers.len(),
        win_rate:         ratio(winners.len() as f64, deals.len() as f64) * 100.0,
        avg_trade:        mean(&pnl),
        avg_trade_pct:    mean(&pnl_pct),
        avg_win,
        avg_win_pct:      mean(&win_pct),
        avg_loss,
        avg_loss_pct:     mean(&loss_pct).abs(),
        win_loss_ratio:   ratio(avg_win, avg_loss),
        largest_win:      max(&win_pnl),
        largest_win_pct:  max(&win_pct),
        largest_loss:     min(&loss_pnl).abs(),
        largest_loss_pct: min(&loss_pct).abs(),
        max_run_up,
        max_run_up_pct,
        max_drawdown,
        max_drawdown_pct,
        recovery_factor:  ratio(net_profit, max_drawdown),
        sharpe_ratio:     sharpe(&pnl_pct),
        sortino_ratio:    sortino(&pnl_pct),
        skewness:         skewness(&pnl_pct),
        liquidations:     deals.iter().filter(|d| d.exit_signal.is_liquidation()).count(),
        max_order_size:   max(&deals.iter().map(|d| d.quantity).collect::<Vec<_>>()),
        equity,
    }
}

/// `a / b`, NaN when `b` is zero or either side is NaN.
fn ratio(a: f64, b: f64) -> f64 {
    if b == 0.0 || b.is_nan() { f64::NAN } else { a / b }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn max(xs: &[f64]) -> f64 {
    xs.iter().copied().reduce(f64::max).unwrap_or(f64::NAN)
}

fn min(xs: &[f64]) -> f64 {
    xs.iter().copied().reduce(f64::min).unwrap_or(f64::NAN)
}

/// Population standard deviation.
fn std_dev(xs: &[f64]) -> f64 {
    let m = mean(xs);
    mean(&xs.iter().map(|x| (x - m).powi(2)).collect::<Vec<_>>()).sqrt()
}

fn sharpe(pnl_pct: &[f64]) -> f64 {
    ratio(mean(pnl_pct), std_dev(pnl_pct))
}

/// Downside deviation over every trade, gains counted as zero.
fn sortino(pnl_pct: &[f64]) -> f64 {
    let downside: Vec<f64> = pnl_pct.iter().map(|x| x.min(0.0).powi(2)).collect();
    ratio(mean(pnl_pct), mean(&downside).sqrt())
}

fn skewness(pnl_pct: &[f64]) -> f64 {
    if pnl_pct.len() < 3 {
        return f64::NAN;
    }
    let m = mean(pnl_pct);
    let third = mean(&pnl_pct.iter().map(|x| (x - m).powi(3)).collect::<Vec<_>>());
    ratio(third, std_dev(pnl_pct).powi(3))
}
