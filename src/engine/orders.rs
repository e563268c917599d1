// src/engine/orders.rs

use serde::Serialize;

use crate::engine::alerts::Alerts;
use crate::engine::levels::Levels;
use crate::engine::position::{PositionSlot, Side};
use crate::engine::settings::{MarginMode, SimulationSettings};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "unit", content = "value")]
pub enum OrderSize {
    /// Percent of the open position.
    Percent(f64),
    Units(f64),
}

/// Account mode attached to every opening order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarginParams {
    pub margin:   MarginMode,
    pub leverage: u32,
    pub hedge:    bool,
}

/// What the adapter layer should send to the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum OrderCommand {
    CancelAll,
    MarketOpen { side: Side, size: OrderSize, params: MarginParams },
    MarketClose { side: Side, size: OrderSize },
    StopClose { side: Side, price: f64, size: OrderSize },
    LimitClose { side: Side, price: f64, size: OrderSize },
}

/// Translate the last bar's alerts into order commands, given the position
/// and levels left after that bar.
///
/// Order: cancel-all, closes, opens, then the protective orders for whatever
/// is now open.
pub fn order_commands(
    alerts: &Alerts,
    position: &PositionSlot,
    levels: &Levels,
    settings: &SimulationSettings,
) -> Vec<OrderCommand> {
    let mut out = Vec::new();
    let params = MarginParams {
        margin:   settings.margin_mode,
        leverage: settings.leverage,
        hedge:    settings.hedge,
    };

    if alerts.cancel {
        out.push(OrderCommand::CancelAll);
    }
    for side in Side::BOTH {
        if alerts.closed(side) {
            out.push(OrderCommand::MarketClose { side, size: OrderSize::Percent(100.0) });
        }
    }

    let Some(side) = position.side() else {
        return out;
    };
    let opened = alerts.opened(side);
    let scaled = alerts.scaled(side);

    if opened {
        let size = OrderSize::Units(position.quantity());
        out.push(OrderCommand::MarketOpen { side, size, params });
    } else if scaled {
        let added = position.legs().last().map_or(0.0, |l| l.quantity);
        out.push(OrderCommand::MarketOpen { side, size: OrderSize::Units(added), params });
    }

    // A moved stop or an added leg replaces every resting exit.
    let replace = !opened && (alerts.stop_moved(side) || scaled);
    if replace && !alerts.cancel {
        out.push(OrderCommand::CancelAll);
    }
    if opened || replace {
        protective_orders(&mut out, side, levels);
    }
    out
}

fn protective_orders(out: &mut Vec<OrderCommand>, side: Side, levels: &Levels) {
    if !levels.stop.is_nan() {
        out.push(OrderCommand::StopClose {
            side,
            price: levels.stop,
            size:  OrderSize::Percent(100.0),
        });
    }
    let active: Vec<_> = levels.active_takes().map(|(_, t)| *t).collect();
    for (k, take) in active.iter().enumerate() {
        let size = if k + 1 == active.len() {
            OrderSize::Percent(100.0)
        } else {
            OrderSize::Units(take.quantity)
        };
        out.push(OrderCommand::LimitClose { side, price: take.price, size });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ledger::SignalCode;
    use crate::engine::levels::TakeLevel;

    fn open_long() -> (PositionSlot, Levels) {
        let mut slot = PositionSlot::new();
        slot.open_leg(Side::Long, SignalCode::ENTRY_LONG, 0, 100.0, 2.0).unwrap();
        let mut levels = Levels { stop: 95.0, liquidation: 0.0, ..Default::default() };
        levels.takes[0] = TakeLevel { price: 105.0, quantity: 1.0 };
        levels.takes[1] = TakeLevel { price: 110.0, quantity: 1.0 };
        (slot, levels)
    }

    #[test]
    fn open_emits_market_stop_and_limits() {
        let (slot, levels) = open_long();
        let alerts = Alerts { open_long: true, ..Default::default() };
        let settings = SimulationSettings { leverage: 3, ..Default::default() };
        let cmds = order_commands(&alerts, &slot, &levels, &settings);

        assert_eq!(cmds.len(), 4);
        assert!(matches!(
            cmds[0],
            OrderCommand::MarketOpen { side: Side::Long, size: OrderSize::Units(q), params } if q == 2.0 && params.leverage == 3
        ));
        assert_eq!(cmds[1], OrderCommand::StopClose { side: Side::Long, price: 95.0, size: OrderSize::Percent(100.0) });
        assert_eq!(cmds[2], OrderCommand::LimitClose { side: Side::Long, price: 105.0, size: OrderSize::Units(1.0) });
        assert_eq!(cmds[3], OrderCommand::LimitClose { side: Side::Long, price: 110.0, size: OrderSize::Percent(100.0) });
    }

    #[test]
    fn stop_then_reentry() {
        let (slot, levels) = open_long();
        let alerts = Alerts { cancel: true, open_long: true, ..Default::default() };
        let cmds = order_commands(&alerts, &slot, &levels, &SimulationSettings::default());
        assert_eq!(cmds[0], OrderCommand::CancelAll);
        assert!(matches!(cmds[1], OrderCommand::MarketOpen { .. }));
    }

    #[test]
    fn moved_stop_replaces_exits() {
        let (slot, levels) = open_long();
        let alerts = Alerts { stop_moved_long: true, ..Default::default() };
        let cmds = order_commands(&alerts, &slot, &levels, &SimulationSettings::default());
        assert_eq!(cmds[0], OrderCommand::CancelAll);
        assert!(matches!(cmds[1], OrderCommand::StopClose { price, .. } if price == 95.0));
        assert_eq!(cmds.len(), 4);
    }

    #[test]
    fn quiet_bar_emits_nothing() {
        let (slot, levels) = open_long();
        assert!(order_commands(&Alerts::default(), &slot, &levels, &SimulationSettings::default()).is_empty());
        let close = Alerts { close_short: true, ..Default::default() };
        let cmds = order_commands(&close, &PositionSlot::new(), &Levels::default(), &SimulationSettings::default());
        assert_eq!(cmds, vec![OrderCommand::MarketClose { side: Side::Short, size: OrderSize::Percent(100.0) }]);
    }
}
