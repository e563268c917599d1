// src/engine/ledger.rs

use std::fmt;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::engine::position::{Leg, Side};
use crate::error::{BacktestError, Result};

/// Why a deal opened or closed. Three digits `XYY`: `X` is the class,
/// `YY` an optional take-profit leg number. Labels only; never branched on
/// by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalCode(pub u16);

impl SignalCode {
    pub const ENTRY_LONG:        SignalCode = SignalCode(100);
    pub const ENTRY_SHORT:       SignalCode = SignalCode(200);
    pub const EXIT_LONG:         SignalCode = SignalCode(100);
    pub const EXIT_SHORT:        SignalCode = SignalCode(200);
    pub const TAKE_LONG:         SignalCode = SignalCode(300);
    pub const TAKE_SHORT:        SignalCode = SignalCode(400);
    pub const STOP_LONG:         SignalCode = SignalCode(500);
    pub const STOP_SHORT:        SignalCode = SignalCode(600);
    pub const LIQUIDATION_LONG:  SignalCode = SignalCode(700);
    pub const LIQUIDATION_SHORT: SignalCode = SignalCode(800);

    pub fn entry(side: Side) -> Self {
        side.pick(Self::ENTRY_LONG, Self::ENTRY_SHORT)
    }

    pub fn exit(side: Side) -> Self {
        side.pick(Self::EXIT_LONG, Self::EXIT_SHORT)
    }

    /// Take-profit code for leg `leg` (0-based), e.g. 301 for the first long leg.
    pub fn take(side: Side, leg: usize) -> Self {
        let base = side.pick(Self::TAKE_LONG, Self::TAKE_SHORT);
        SignalCode(base.0 + leg as u16 + 1)
    }

    pub fn stop(side: Side) -> Self {
        side.pick(Self::STOP_LONG, Self::STOP_SHORT)
    }

    pub fn liquidation(side: Side) -> Self {
        side.pick(Self::LIQUIDATION_LONG, Self::LIQUIDATION_SHORT)
    }

    pub fn class(self) -> u16 {
        self.0 / 100
    }

    pub fn leg(self) -> u16 {
        self.0 % 100
    }

    pub fn is_liquidation(self) -> bool {
        matches!(self.class(), 7 | 8)
    }
}

impl fmt::Display for SignalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of columns in the dense deal matrix.
pub const DEAL_COLUMNS: usize = 13;

/// One closed fill. Written once, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DealRecord {
    pub side:            Side,
    pub entry_signal:    SignalCode,
    pub exit_signal:     SignalCode,
    pub entry_time:      i64,
    pub exit_time:       i64,
    pub entry_price:     f64,
    pub exit_price:      f64,
    pub quantity:        f64,
    pub pnl_abs:         f64,
    pub pnl_pct:         f64,
    pub cum_pnl_abs:     f64,
    pub cum_pnl_pct:     f64,
    pub commission_paid: f64,
}

impl DealRecord {
    /// Row layout: side (0 long / 1 short), entry signal, exit signal, entry
    /// time, exit time, entry price, exit price, quantity, pnl, pnl %,
    /// cumulative pnl, cumulative pnl %, commission.
    pub fn to_row(&self) -> [f64; DEAL_COLUMNS] {
        [
            self.side.code(),
            self.entry_signal.0 as f64,
            self.exit_signal.0 as f64,
            self.entry_time as f64,
            self.exit_time as f64,
            self.entry_price,
            self.exit_price,
            self.quantity,
            self.pnl_abs,
            self.pnl_pct,
            self.cum_pnl_abs,
            self.cum_pnl_pct,
            self.commission_paid,
        ]
    }

    pub fn from_row(row: usize, values: &[f64]) -> Result<Self> {
        if values.len() != DEAL_COLUMNS {
            return Err(BacktestError::MalformedDeal { row, reason: "expected 13 columns" });
        }
        let side = Side::from_code(values[0])
            .ok_or(BacktestError::MalformedDeal { row, reason: "side must be 0 or 1" })?;
        Ok(Self {
            side,
            entry_signal:    signal_cell(row, values[1])?,
            exit_signal:     signal_cell(row, values[2])?,
            entry_time:      time_cell(row, values[3])?,
            exit_time:       time_cell(row, values[4])?,
            entry_price:     values[5],
            exit_price:      values[6],
            quantity:        values[7],
            pnl_abs:         values[8],
            pnl_pct:         values[9],
            cum_pnl_abs:     values[10],
            cum_pnl_pct:     values[11],
            commission_paid: values[12],
        })
    }

    pub fn is_win(&self) -> bool {
        self.pnl_abs > 0.0
    }
}

fn signal_cell(row: usize, value: f64) -> Result<SignalCode> {
    if value.fract() == 0.0 && (0.0..=u16::MAX as f64).contains(&value) {
        Ok(SignalCode(value as u16))
    } else {
        Err(BacktestError::MalformedDeal { row, reason: "signal must be an integer in 0..=65535" })
    }
}

fn time_cell(row: usize, value: f64) -> Result<i64> {
    // i64::MAX as f64 rounds up to 2^63, hence the open upper bound
    if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
        Ok(value as i64)
    } else {
        Err(BacktestError::MalformedDeal { row, reason: "time must be an integer millisecond value" })
    }
}

/// Realized PnL and commission of closing `quantity` opened at `entry_price`
/// at `exit_price`. `commission_pct` is a percentage (0.1 means 0.1%) charged
/// on both the entry and the exit notional.
pub fn deal_pnl(
    side: Side,
    entry_price: f64,
    exit_price: f64,
    quantity: f64,
    commission_pct: f64,
) -> (f64, f64) {
    let commission = quantity * entry_price * commission_pct / 100.0
        + quantity * exit_price * commission_pct / 100.0;
    let pnl = (exit_price - entry_price) * side.sign() * quantity - commission;
    (pnl, commission)
}

/// Append-only log of closed deals in exit order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealLedger {
    initial_capital: f64,
    commission_pct:  f64,
    deals:           Vec<DealRecord>,
}

impl DealLedger {
    pub fn new(initial_capital: f64, commission_pct: f64) -> Self {
        Self { initial_capital, commission_pct, deals: Vec::new() }
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn commission_pct(&self) -> f64 {
        self.commission_pct
    }

    /// Close `quantity` of `leg` and append the resulting deal.
    /// Returns the realized PnL; a zero quantity appends nothing and returns 0.
    pub fn close_leg(
        &mut self,
        leg: &Leg,
        exit_signal: SignalCode,
        exit_time: i64,
        exit_price: f64,
        quantity: f64,
    ) -> f64 {
        if quantity == 0.0 || quantity.is_nan() {
            return 0.0;
        }
        let (pnl, commission) =
            deal_pnl(leg.side, leg.entry_price, exit_price, quantity, self.commission_pct);
        let notional = leg.entry_price * quantity;
        let prev_cum = self.cum_pnl_abs();

        self.deals.push(DealRecord {
            side:            leg.side,
            entry_signal:    leg.entry_signal,
            exit_signal,
            entry_time:      leg.entry_time,
            exit_time,
            entry_price:     leg.entry_price,
            exit_price,
            quantity,
            pnl_abs:         pnl,
            pnl_pct:         if notional != 0.0 { pnl / notional * 100.0 } else { f64::NAN },
            cum_pnl_abs:     prev_cum + pnl,
            cum_pnl_pct:     pnl / (self.initial_capital + prev_cum) * 100.0,
            commission_paid: commission,
        });
        pnl
    }

    /// Running sum of `pnl_abs` over every deal so far.
    pub fn cum_pnl_abs(&self) -> f64 {
        self.deals.last().map_or(0.0, |d| d.cum_pnl_abs)
    }

    /// `initial_capital` followed by the cumulative equity after each deal.
    pub fn equity_curve(&self) -> Vec<f64> {
        crate::engine::exposure::equity_curve(
            self.initial_capital,
            self.deals.iter().map(|d| d.pnl_abs),
        )
    }

    /// Optimizer fitness: total realized return in percent of initial capital.
    pub fn total_return_pct(&self) -> f64 {
        let total: f64 = self.deals.iter().map(|d| d.pnl_abs).sum();
        total / self.initial_capital * 100.0
    }

    pub fn records(&self) -> &[DealRecord] {
        &self.deals
    }

    pub fn len(&self) -> usize {
        self.deals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deals.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DealRecord> {
        self.deals.iter()
    }

    /// Dense `[n, 13]` matrix, one row per deal.
    pub fn to_array(&self) -> Array2<f64> {
        let mut out = Array2::<f64>::zeros((self.deals.len(), DEAL_COLUMNS));
        for (mut row, deal) in out.rows_mut().into_iter().zip(&self.deals) {
            for (cell, value) in row.iter_mut().zip(deal.to_row()) {
                *cell = value;
            }
        }
        out
    }

    /// Parse a dense `[n, 13]` matrix back into records.
    pub fn records_from_array(rows: ArrayView2<'_, f64>) -> Result<Vec<DealRecord>> {
        if rows.ncols() != DEAL_COLUMNS {
            return Err(BacktestError::MalformedDeal { row: 0, reason: "expected 13 columns" });
        }
        rows.rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let values: Vec<f64> = row.iter().copied().collect();
                DealRecord::from_row(i, &values)
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a DealLedger {
    type Item = &'a DealRecord;
    type IntoIter = std::slice::Iter<'a, DealRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.deals.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(side: Side, price: f64, qty: f64) -> Leg {
        Leg {
            side,
            entry_signal: SignalCode::entry(side),
            entry_time:   1_000,
            entry_price:  price,
            quantity:     qty,
        }
    }

    #[test]
    fn long_round_trip_pnl() {
        let mut ledger = DealLedger::new(10_000.0, 0.1);
        let pnl = ledger.close_leg(&leg(Side::Long, 100.0, 10.0), SignalCode::take(Side::Long, 0), 2_000, 110.0, 10.0);
        assert!((pnl - 97.9).abs() < 1e-9);
        let deal = ledger.records()[0];
        assert!((deal.commission_paid - 2.1).abs() < 1e-9);
        assert!((deal.pnl_pct - 9.79).abs() < 1e-9);
        assert!((deal.cum_pnl_pct - 0.979).abs() < 1e-9);
        assert_eq!(deal.exit_signal, SignalCode(301));
    }

    #[test]
    fn short_flips_price_delta() {
        let (pnl, commission) = deal_pnl(Side::Short, 100.0, 90.0, 2.0, 0.0);
        assert_eq!(pnl, 20.0);
        assert_eq!(commission, 0.0);
    }

    #[test]
    fn cumulative_columns_chain() {
        let mut ledger = DealLedger::new(1_000.0, 0.0);
        ledger.close_leg(&leg(Side::Long, 10.0, 10.0), SignalCode::EXIT_LONG, 2, 20.0, 10.0);
        ledger.close_leg(&leg(Side::Short, 10.0, 10.0), SignalCode::EXIT_SHORT, 3, 15.0, 10.0);
        let deals = ledger.records();
        assert_eq!(deals[0].cum_pnl_abs, 100.0);
        assert_eq!(deals[1].cum_pnl_abs, 50.0);
        // -50 / (1000 + 100)
        assert!((deals[1].cum_pnl_pct - (-50.0 / 1_100.0 * 100.0)).abs() < 1e-12);
        assert_eq!(ledger.equity_curve(), vec![1_000.0, 1_100.0, 1_050.0]);
        assert!((ledger.total_return_pct() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn zero_quantity_is_not_logged() {
        let mut ledger = DealLedger::new(1_000.0, 0.1);
        let pnl = ledger.close_leg(&leg(Side::Long, 10.0, 0.0), SignalCode::EXIT_LONG, 2, 20.0, 0.0);
        assert_eq!(pnl, 0.0);
        assert!(ledger.is_empty());
    }

    #[test]
    fn dense_matrix_round_trips() {
        let mut ledger = DealLedger::new(1_000.0, 0.05);
        ledger.close_leg(&leg(Side::Short, 50.0, 3.0), SignalCode::STOP_SHORT, 9, 55.0, 3.0);
        let matrix = ledger.to_array();
        assert_eq!(matrix.dim(), (1, DEAL_COLUMNS));
        assert_eq!(matrix[[0, 0]], 1.0);
        assert_eq!(matrix[[0, 2]], 600.0);
        let back = DealLedger::records_from_array(matrix.view()).unwrap();
        assert_eq!(back, ledger.records());
    }

    #[test]
    fn fractional_or_negative_cells_are_rejected() {
        let mut ledger = DealLedger::new(1_000.0, 0.0);
        ledger.close_leg(&leg(Side::Long, 10.0, 1.0), SignalCode::take(Side::Long, 0), 5, 11.0, 1.0);
        let good = ledger.records()[0].to_row();
        assert!(DealRecord::from_row(0, &good).is_ok());

        for (col, value) in [(1, 301.7), (2, -5.0), (2, 70_000.0), (3, 1.5), (4, f64::NAN), (4, f64::INFINITY)] {
            let mut row = good;
            row[col] = value;
            assert!(
                matches!(DealRecord::from_row(3, &row), Err(BacktestError::MalformedDeal { row: 3, .. })),
                "column {col} accepted {value}"
            );
        }
    }

    #[test]
    fn signal_code_parts() {
        let code = SignalCode::take(Side::Short, 2);
        assert_eq!(code, SignalCode(403));
        assert_eq!(code.class(), 4);
        assert_eq!(code.leg(), 3);
        assert!(SignalCode::liquidation(Side::Long).is_liquidation());
        assert!(!SignalCode::stop(Side::Long).is_liquidation());
    }
}
