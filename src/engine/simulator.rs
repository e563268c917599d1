// src/engine/simulator.rs

use log::debug;
use serde::Serialize;

use crate::engine::alerts::Alerts;
use crate::engine::bars::BarSeries;
use crate::engine::ledger::DealLedger;
use crate::engine::levels::{LevelSeries, Levels};
use crate::engine::position::{PositionSlot, Side};
use crate::engine::prepare_inputs::prepare_inputs;
use crate::engine::scan_entries::{add_leg, open_position};
use crate::engine::settings::SimulationSettings;
use crate::engine::simulate_exits::{
    check_protective, check_takes, move_stop, signal_exit, ExitOutcome,
};
use crate::engine::strategy::{BarContext, Strategy};
use crate::error::Result;

/// Mutable state carried from bar to bar.
#[derive(Debug, Clone)]
pub(crate) struct SimState {
    pub slot:   PositionSlot,
    pub levels: Levels,
    pub equity: f64,   // initial capital + realized pnl
    pub alerts: Alerts,
    pub ledger: DealLedger,
}

impl SimState {
    pub fn new(settings: &SimulationSettings) -> Self {
        Self {
            slot:   PositionSlot::new(),
            levels: Levels::default(),
            equity: settings.initial_capital,
            alerts: Alerts::default(),
            ledger: DealLedger::new(settings.initial_capital, settings.commission_pct),
        }
    }
}

/// Everything one run produces.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub ledger:       DealLedger,
    /// Position still open after the last bar.
    #[serde(skip)]
    pub position:     PositionSlot,
    pub levels:       Levels,
    /// Alerts raised on the last bar.
    pub alerts:       Alerts,
    pub level_series: LevelSeries,
    pub equity:       f64,
}

impl SimulationResult {
    pub fn open_side(&self) -> Option<Side> {
        self.position.side()
    }
}

/// Run `strategy` over `bars`.
///
/// Inputs are validated up front; once the loop starts it cannot fail. Each
/// bar is evaluated long side first, then short:
///
/// 1) liquidation, 2) stop, 3) take legs, 4) trailing stop, 5) signal exit,
/// 6) scale-in, then an entry if the slot is flat. A side liquidated on this
/// bar does not re-enter until the next one, and a short is never opened on
/// a bar that opened a long.
pub fn simulate<S: Strategy + ?Sized>(
    strategy: &mut S,
    bars: &BarSeries,
    settings: &SimulationSettings,
) -> Result<SimulationResult> {
    let n = prepare_inputs(bars)?;
    settings.validate()?;

    strategy.prepare(bars);
    let strategy: &S = strategy;

    let mut state = SimState::new(settings);
    let mut level_series = LevelSeries::with_len(n);

    for i in strategy.warmup().min(n)..n {
        let bar = bars.bar(i);
        state.alerts.reset();

        for side in Side::BOTH {
            let mut liquidated = false;

            if state.slot.side() == Some(side) {
                liquidated = run_exits(strategy, &mut state, side, i, bars, settings);
            }

            let blocked = liquidated || (side == Side::Short && state.alerts.open_long);
            if state.slot.is_flat() && !blocked && settings.direction.allows(side) {
                let plan = {
                    let ctx = context(&state, i, bars);
                    strategy.entry(&ctx, side)
                };
                if let Some(plan) = plan.filter(|p| p.side == side) {
                    open_position(&mut state, &plan, &bar, settings);
                }
            }
        }
        level_series.record(i, &state.levels);
    }

    debug!(
        "{}: {} bars, {} deals, equity {:.2}",
        strategy.name(),
        n,
        state.ledger.len(),
        state.equity
    );

    Ok(SimulationResult {
        ledger:       state.ledger,
        position:     state.slot,
        levels:       state.levels,
        alerts:       state.alerts,
        level_series,
        equity:       state.equity,
    })
}

/// Steps 1-6 for the open `side`. Returns true on liquidation.
fn run_exits<S: Strategy + ?Sized>(
    strategy: &S,
    state: &mut SimState,
    side: Side,
    i: usize,
    bars: &BarSeries,
    settings: &SimulationSettings,
) -> bool {
    let bar = bars.bar(i);

    match check_protective(state, side, &bar) {
        ExitOutcome::Liquidated => return true,
        ExitOutcome::Closed => return false,
        ExitOutcome::StillOpen => {}
    }
    if check_takes(state, side, &bar, settings) == ExitOutcome::Closed {
        return false;
    }

    let proposed = strategy.trail_stop(&context(state, i, bars), side);
    if let Some(stop) = proposed {
        move_stop(state, side, stop, settings);
    }

    if strategy.exit(&context(state, i, bars), side) {
        signal_exit(state, side, &bar, settings);
        return false;
    }

    let scale = strategy.scale_in(&context(state, i, bars), side);
    if let Some(scale) = scale {
        add_leg(state, &scale, &bar, settings);
    }
    false
}

#[inline]
fn context<'a>(state: &'a SimState, index: usize, bars: &'a BarSeries) -> BarContext<'a> {
    BarContext {
        index,
        bars,
        equity: state.equity,
        position: &state.slot,
        levels: &state.levels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::bars::Bar;
    use crate::engine::ledger::SignalCode;
    use crate::engine::settings::{Direction, PositionSizeType};
    use crate::engine::strategy::EntryPlan;
    use crate::error::BacktestError;

    /// Goes `side` on every listed bar with fixed stop/take offsets.
    struct Scripted {
        entries: Vec<(usize, Side)>,
        stop:    f64,
        take:    f64,
    }

    impl Strategy for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn warmup(&self) -> usize {
            0
        }

        fn entry(&self, ctx: &BarContext<'_>, side: Side) -> Option<EntryPlan> {
            if !self.entries.contains(&(ctx.index, side)) {
                return None;
            }
            let close = ctx.close();
            Some(
                EntryPlan::new(side)
                    .stop(close - side.sign() * self.stop)
                    .take(close + side.sign() * self.take, 100.0),
            )
        }
    }

    fn bar(i: i64, high: f64, low: f64, close: f64) -> Bar {
        Bar { time: i * 60_000, open: close, high, low, close, volume: 1.0 }
    }

    fn settings() -> SimulationSettings {
        SimulationSettings {
            commission_pct:     0.0,
            position_size_type: PositionSizeType::FixedCurrency,
            position_size:      1_000.0,
            ..Default::default()
        }
    }

    #[test]
    fn take_then_stop() {
        let bars = BarSeries::from_bars(&[
            bar(0, 100.0, 100.0, 100.0),
            bar(1, 111.0, 101.0, 109.0),
            bar(2, 100.0, 100.0, 100.0),
            bar(3, 100.0, 94.0, 96.0),
        ]);
        let mut strategy = Scripted { entries: vec![(0, Side::Long), (2, Side::Short)], stop: 5.0, take: 10.0 };
        let result = simulate(&mut strategy, &bars, &settings()).unwrap();

        let deals = result.ledger.records();
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].exit_signal, SignalCode(301));
        assert_eq!(deals[0].pnl_abs, 100.0);
        // short opened on bar 2, still open: bar 3 hit neither 105 nor 90
        assert_eq!(result.open_side(), Some(Side::Short));
        assert_eq!(result.level_series.stop[3], 105.0);
        assert_eq!(result.equity, 10_100.0);
    }

    #[test]
    fn short_blocked_on_bar_that_opened_long() {
        let bars = BarSeries::from_bars(&[bar(0, 100.0, 100.0, 100.0), bar(1, 100.0, 100.0, 100.0)]);
        let mut strategy = Scripted { entries: vec![(0, Side::Long), (0, Side::Short)], stop: 5.0, take: 10.0 };
        let result = simulate(&mut strategy, &bars, &settings()).unwrap();
        assert_eq!(result.open_side(), Some(Side::Long));
        assert!(result.ledger.is_empty());
    }

    #[test]
    fn direction_filter() {
        let bars = BarSeries::from_bars(&[bar(0, 100.0, 100.0, 100.0)]);
        let mut strategy = Scripted { entries: vec![(0, Side::Long)], stop: 5.0, take: 10.0 };
        let s = SimulationSettings { direction: Direction::ShortOnly, ..settings() };
        let result = simulate(&mut strategy, &bars, &s).unwrap();
        assert!(result.position.is_flat());
        assert!(!result.alerts.any());
    }

    #[test]
    fn rejects_bad_inputs_before_running() {
        let mut strategy = Scripted { entries: vec![], stop: 1.0, take: 1.0 };
        assert_eq!(
            simulate(&mut strategy, &BarSeries::default(), &settings()).unwrap_err(),
            BacktestError::EmptySeries
        );
        let bars = BarSeries::from_bars(&[bar(0, 1.0, 1.0, 1.0)]);
        let mut bad = settings();
        bad.precision.qty_step = 0.0;
        assert!(matches!(
            simulate(&mut strategy, &bars, &bad),
            Err(BacktestError::InvalidStep { .. })
        ));
    }
}
