// src/engine/simulate_exits.rs

use log::trace;

use crate::engine::bars::Bar;
use crate::engine::ledger::SignalCode;
use crate::engine::levels::TakeLevel;
use crate::engine::position::Side;
use crate::engine::settings::SimulationSettings;
use crate::engine::simulator::SimState;

/// What the exit checks left behind on this bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitOutcome {
    StillOpen,
    Closed,
    Liquidated,
}

/// Close every leg at `price` and drop all levels.
pub(crate) fn close_all(state: &mut SimState, code: SignalCode, time: i64, price: f64) {
    for leg in state.slot.drain().iter().flatten() {
        state.equity += state.ledger.close_leg(leg, code, time, price, leg.quantity);
    }
    state.levels.clear();
}

/// Liquidation first, then the stop. Either one flattens the position and
/// raises cancel-all.
pub(crate) fn check_protective(state: &mut SimState, side: Side, bar: &Bar) -> ExitOutcome {
    // 1) Liquidation
    let liquidation = state.levels.liquidation;
    if side.adverse_touch(bar.high, bar.low, liquidation) {
        trace!("bar {}: {:?} liquidated at {}", bar.time, side, liquidation);
        close_all(state, SignalCode::liquidation(side), bar.time, liquidation);
        state.alerts.cancel = true;
        return ExitOutcome::Liquidated;
    }

    // 2) Stop
    let stop = state.levels.stop;
    if side.adverse_touch(bar.high, bar.low, stop) {
        trace!("bar {}: {:?} stopped at {}", bar.time, side, stop);
        close_all(state, SignalCode::stop(side), bar.time, stop);
        state.alerts.cancel = true;
        return ExitOutcome::Closed;
    }
    ExitOutcome::StillOpen
}

/// 3) Touched take levels, nearest first. Each closes its allotted quantity
/// FIFO across legs; the last remaining level closes whatever is left.
pub(crate) fn check_takes(
    state: &mut SimState,
    side: Side,
    bar: &Bar,
    settings: &SimulationSettings,
) -> ExitOutcome {
    for k in 0..state.levels.takes.len() {
        let level = state.levels.takes[k];
        if !level.is_active() || !side.favourable_touch(bar.high, bar.low, level.price) {
            continue;
        }
        let last = state.levels.active_takes().count() == 1;
        let open_qty = state.slot.quantity();
        let quantity = if last || level.quantity >= open_qty { open_qty } else { level.quantity };

        let code = SignalCode::take(side, k);
        for piece in state.slot.consume_fifo(quantity, settings.precision.qty_step).iter().flatten() {
            state.equity += state.ledger.close_leg(piece, code, bar.time, level.price, piece.quantity);
        }
        state.levels.takes[k] = TakeLevel::EMPTY;
        trace!("bar {}: {:?} take {} filled {} @ {}", bar.time, side, code, quantity, level.price);

        if state.slot.is_flat() {
            state.levels.clear();
            return ExitOutcome::Closed;
        }
    }
    ExitOutcome::StillOpen
}

/// 4) Apply a proposed stop if it moves toward profit.
pub(crate) fn move_stop(state: &mut SimState, side: Side, proposed: f64, settings: &SimulationSettings) {
    let candidate = settings.precision.price(proposed);
    if state.levels.tightens_stop(side, candidate) {
        state.levels.stop = candidate;
        state.alerts.set_stop_moved(side);
    }
}

/// 5) Signal exit at the bar close.
pub(crate) fn signal_exit(state: &mut SimState, side: Side, bar: &Bar, settings: &SimulationSettings) {
    let price = settings.precision.price(bar.close);
    close_all(state, SignalCode::exit(side), bar.time, price);
    state.alerts.set_close(side);
}
