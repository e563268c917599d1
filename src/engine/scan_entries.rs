// src/engine/scan_entries.rs

use log::trace;

use crate::engine::bars::Bar;
use crate::engine::ledger::SignalCode;
use crate::engine::levels::{TakeLevel, MAX_TAKES};
use crate::engine::settings::SimulationSettings;
use crate::engine::simulator::SimState;
use crate::engine::strategy::{EntryPlan, ScaleIn};

/// Fill `plan` at the bar close while flat. Returns false, leaving the state
/// untouched, when the sized quantity or any take quantity rounds to zero.
pub(crate) fn open_position(
    state: &mut SimState,
    plan: &EntryPlan,
    bar: &Bar,
    settings: &SimulationSettings,
) -> bool {
    let precision = &settings.precision;
    let side = plan.side;

    // 1) Size at the close
    let price = precision.price(bar.close);
    let size = plan.position_size.unwrap_or(settings.position_size);
    let quantity = precision.qty(settings.order_quantity(state.equity, price, size));
    if !(quantity > 0.0) {
        trace!("bar {}: {:?} entry aborted, quantity rounds to {}", bar.time, side, quantity);
        return false;
    }

    // 2) Take legs, nearest to the entry first
    let mut takes = [TakeLevel::EMPTY; MAX_TAKES];
    let mut n = 0;
    for target in plan.take_targets().filter(|t| t.price.is_finite()) {
        let take_qty = precision.qty(quantity * target.volume_pct / 100.0);
        if !(take_qty > 0.0) {
            trace!("bar {}: {:?} entry aborted, take at {} has no quantity", bar.time, side, target.price);
            return false;
        }
        takes[n] = TakeLevel { price: precision.price(target.price), quantity: take_qty };
        n += 1;
    }
    takes[..n].sort_by(|a, b| (a.price - price).abs().total_cmp(&(b.price - price).abs()));

    // 3) Write the first leg
    let signal = plan.signal.unwrap_or_else(|| SignalCode::entry(side));
    if state.slot.open_leg(side, signal, bar.time, price, quantity).is_err() {
        return false;
    }
    state.levels.stop = precision.price(plan.stop);
    state.levels.liquidation = precision.price(settings.liquidation_price(side, price));
    state.levels.takes = takes;
    state.alerts.set_open(side);

    trace!(
        "bar {}: open {:?} {} @ {} stop {} liq {}",
        bar.time, side, quantity, price, state.levels.stop, state.levels.liquidation
    );
    true
}

/// Add a leg to the open position and move liquidation to the new average
/// entry. Returns false when nothing was added.
pub(crate) fn add_leg(
    state: &mut SimState,
    scale: &ScaleIn,
    bar: &Bar,
    settings: &SimulationSettings,
) -> bool {
    let Some(side) = state.slot.side() else {
        return false;
    };
    let precision = &settings.precision;
    let price = precision.price(bar.close);
    let quantity =
        precision.qty(settings.order_quantity(state.equity, price, scale.position_size));
    if !(quantity > 0.0) {
        return false;
    }
    let signal = scale.signal.unwrap_or_else(|| SignalCode::entry(side));
    if state.slot.open_leg(side, signal, bar.time, price, quantity).is_err() {
        trace!("bar {}: scale-in skipped, no free leg", bar.time);
        return false;
    }

    let average = state.slot.average_entry_price();
    if !average.is_nan() {
        state.levels.liquidation = precision.price(settings.liquidation_price(side, average));
    }
    state.alerts.set_scaled(side);
    true
}
