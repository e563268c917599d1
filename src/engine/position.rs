// src/engine/position.rs

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::ledger::SignalCode;
use crate::engine::precision::adjust;

/// Legs one open position may hold (grid / pyramiding strategies).
pub const MAX_LEGS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Long, Side::Short];

    /// +1 for long, -1 for short.
    #[inline]
    pub fn sign(self) -> f64 {
        self.pick(1.0, -1.0)
    }

    #[inline]
    pub fn pick<T>(self, long: T, short: T) -> T {
        match self {
            Side::Long => long,
            Side::Short => short,
        }
    }

    pub fn opposite(self) -> Side {
        self.pick(Side::Short, Side::Long)
    }

    /// Ledger column value: 0 long, 1 short.
    pub fn code(self) -> f64 {
        self.pick(0.0, 1.0)
    }

    pub fn from_code(code: f64) -> Option<Side> {
        if code == 0.0 {
            Some(Side::Long)
        } else if code == 1.0 {
            Some(Side::Short)
        } else {
            None
        }
    }

    /// Adverse touch: long levels below price are hit by the low,
    /// short levels above price by the high.
    #[inline]
    pub fn adverse_touch(self, high: f64, low: f64, level: f64) -> bool {
        match self {
            Side::Long => low <= level,
            Side::Short => high >= level,
        }
    }

    /// Favourable touch, used by take-profit levels.
    #[inline]
    pub fn favourable_touch(self, high: f64, low: f64, level: f64) -> bool {
        match self {
            Side::Long => high >= level,
            Side::Short => low <= level,
        }
    }
}

/// One fill contributing to the open position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Leg {
    pub side:         Side,
    pub entry_signal: SignalCode,
    pub entry_time:   i64,   // ms
    pub entry_price:  f64,   // rounded to price step
    pub quantity:     f64,   // rounded to qty step
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("slot already holds the opposite side")]
    SideConflict,
    #[error("all {MAX_LEGS} legs are in use")]
    Full,
}

/// Open position: up to `MAX_LEGS` legs, all on the same side, oldest first.
/// Fixed-size so the bar loop never allocates for it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionSlot {
    legs: [Option<Leg>; MAX_LEGS],
}

impl PositionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn side(&self) -> Option<Side> {
        self.legs().next().map(|l| l.side)
    }

    pub fn is_flat(&self) -> bool {
        self.legs[0].is_none()
    }

    pub fn legs(&self) -> impl Iterator<Item = &Leg> {
        self.legs.iter().flatten()
    }

    pub fn leg_count(&self) -> usize {
        self.legs().count()
    }

    /// Append a leg. Rejected if it would mix sides or the slot is full.
    pub fn open_leg(
        &mut self,
        side: Side,
        entry_signal: SignalCode,
        entry_time: i64,
        entry_price: f64,
        quantity: f64,
    ) -> Result<usize, SlotError> {
        if self.side().is_some_and(|s| s != side) {
            return Err(SlotError::SideConflict);
        }
        let idx = self.legs.iter().position(Option::is_none).ok_or(SlotError::Full)?;
        self.legs[idx] = Some(Leg { side, entry_signal, entry_time, entry_price, quantity });
        Ok(idx)
    }

    pub fn quantity(&self) -> f64 {
        self.legs().map(|l| l.quantity).sum()
    }

    /// Quantity-weighted mean entry over filled legs; NaN when flat.
    pub fn average_entry_price(&self) -> f64 {
        let (notional, qty) = self
            .legs()
            .fold((0.0, 0.0), |(n, q), l| (n + l.entry_price * l.quantity, q + l.quantity));
        if qty > 0.0 { notional / qty } else { f64::NAN }
    }

    pub fn clear(&mut self) {
        self.legs = [None; MAX_LEGS];
    }

    /// Remove every leg and hand them back, oldest first.
    pub fn drain(&mut self) -> [Option<Leg>; MAX_LEGS] {
        std::mem::replace(&mut self.legs, [None; MAX_LEGS])
    }

    /// Take `quantity` out of the position first-in-first-out. Each returned
    /// piece carries the entry data of the leg it came from and the quantity
    /// consumed from it. Leftovers are re-snapped to `qty_step`.
    pub fn consume_fifo(&mut self, quantity: f64, qty_step: f64) -> [Option<Leg>; MAX_LEGS] {
        let mut pieces = [None; MAX_LEGS];
        let mut kept = [None; MAX_LEGS];
        let mut remaining = quantity;
        let (mut p, mut k) = (0, 0);

        for leg in self.legs.iter().flatten() {
            if remaining > 0.0 {
                let used = leg.quantity.min(remaining);
                remaining = adjust(remaining - used, qty_step);
                pieces[p] = Some(Leg { quantity: used, ..*leg });
                p += 1;
                let left = adjust(leg.quantity - used, qty_step);
                if left > 0.0 {
                    kept[k] = Some(Leg { quantity: left, ..*leg });
                    k += 1;
                }
            } else {
                kept[k] = Some(*leg);
                k += 1;
            }
        }
        self.legs = kept;
        pieces
    }
}
