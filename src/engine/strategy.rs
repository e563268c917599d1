// src/engine/strategy.rs

use crate::engine::bars::{Bar, BarSeries};
use crate::engine::ledger::SignalCode;
use crate::engine::levels::{Levels, MAX_TAKES};
use crate::engine::params::{ParamSpace, ParamVector};
use crate::engine::position::{PositionSlot, Side};
use crate::error::Result;

/// A take-profit the strategy asks for: raw price and the percentage of the
/// entry quantity it should close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TakeTarget {
    pub price:      f64,
    pub volume_pct: f64,
}

/// What to open and where to put the exits. Prices are raw; the engine
/// snaps them to the exchange steps.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPlan {
    pub side:          Side,
    pub stop:          f64,                          // NaN = no stop
    pub takes:         [Option<TakeTarget>; MAX_TAKES],
    pub position_size: Option<f64>,                  // overrides settings
    pub signal:        Option<SignalCode>,           // default 100/200
}

impl EntryPlan {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            stop:          f64::NAN,
            takes:         [None; MAX_TAKES],
            position_size: None,
            signal:        None,
        }
    }

    pub fn stop(mut self, price: f64) -> Self {
        self.stop = price;
        self
    }

    /// Add a take-profit leg. Legs past `MAX_TAKES` are ignored.
    pub fn take(mut self, price: f64, volume_pct: f64) -> Self {
        if let Some(slot) = self.takes.iter_mut().find(|t| t.is_none()) {
            *slot = Some(TakeTarget { price, volume_pct });
        }
        self
    }

    pub fn size(mut self, position_size: f64) -> Self {
        self.position_size = Some(position_size);
        self
    }

    pub fn signal(mut self, code: SignalCode) -> Self {
        self.signal = Some(code);
        self
    }

    pub fn take_targets(&self) -> impl Iterator<Item = &TakeTarget> {
        self.takes.iter().flatten()
    }
}

/// Add a leg to an open position at the bar close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleIn {
    pub position_size: f64,
    pub signal:        Option<SignalCode>,
}

/// Read-only view handed to the strategy hooks for bar `index`.
#[derive(Debug, Clone, Copy)]
pub struct BarContext<'a> {
    pub index:    usize,
    pub bars:     &'a BarSeries,
    pub equity:   f64,
    pub position: &'a PositionSlot,
    pub levels:   &'a Levels,
}

impl BarContext<'_> {
    #[inline]
    pub fn bar(&self) -> Bar {
        self.bars.bar(self.index)
    }

    #[inline]
    pub fn close(&self) -> f64 {
        self.bars.close()[self.index]
    }

    pub fn side(&self) -> Option<Side> {
        self.position.side()
    }

    pub fn average_entry_price(&self) -> f64 {
        self.position.average_entry_price()
    }
}

/// Decision hooks plugged into the bar loop. Only `entry` is mandatory.
pub trait Strategy {
    fn name(&self) -> &str;

    /// Compute indicators over the whole series before the loop starts.
    fn prepare(&mut self, _bars: &BarSeries) {}

    /// First bar index the loop evaluates.
    fn warmup(&self) -> usize {
        1
    }

    /// Called while flat for each side the direction allows.
    fn entry(&self, ctx: &BarContext<'_>, side: Side) -> Option<EntryPlan>;

    /// Signal exit at the bar close.
    fn exit(&self, _ctx: &BarContext<'_>, _side: Side) -> bool {
        false
    }

    /// Proposed new stop. Applied only when it moves toward profit.
    fn trail_stop(&self, _ctx: &BarContext<'_>, _side: Side) -> Option<f64> {
        None
    }

    fn scale_in(&self, _ctx: &BarContext<'_>, _side: Side) -> Option<ScaleIn> {
        None
    }
}

/// A strategy the optimizer can rebuild from a gene vector.
pub trait Optimizable: Strategy + Sized {
    /// Label used in optimizer output.
    const NAME: &'static str;

    fn space() -> ParamSpace;
    fn from_params(params: &ParamVector) -> Result<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_takes_in_order() {
        let plan = EntryPlan::new(Side::Long).stop(95.0).take(105.0, 50.0).take(110.0, 50.0);
        let targets: Vec<_> = plan.take_targets().collect();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[1].price, 110.0);
        assert_eq!(plan.stop, 95.0);
        assert!(plan.position_size.is_none());
    }

    #[test]
    fn extra_takes_are_dropped() {
        let mut plan = EntryPlan::new(Side::Short);
        for k in 0..MAX_TAKES + 2 {
            plan = plan.take(100.0 - k as f64, 10.0);
        }
        assert_eq!(plan.take_targets().count(), MAX_TAKES);
    }
}
