// src/engine/levels.rs

use serde::Serialize;

use crate::engine::position::Side;

/// Take-profit legs one position may carry.
pub const MAX_TAKES: usize = 8;

/// One resting take-profit: price and allotted quantity. NaN when unused.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TakeLevel {
    pub price:    f64,
    pub quantity: f64,
}

impl TakeLevel {
    pub const EMPTY: TakeLevel = TakeLevel { price: f64::NAN, quantity: f64::NAN };

    #[inline]
    pub fn is_active(&self) -> bool {
        !self.price.is_nan()
    }
}

impl Default for TakeLevel {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Exit prices attached to the open position. All NaN while flat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Levels {
    pub stop:        f64,
    pub liquidation: f64,
    /// Sorted by distance from entry, nearest first.
    pub takes:       [TakeLevel; MAX_TAKES],
}

impl Default for Levels {
    fn default() -> Self {
        Self {
            stop:        f64::NAN,
            liquidation: f64::NAN,
            takes:       [TakeLevel::EMPTY; MAX_TAKES],
        }
    }
}

impl Levels {
    pub fn clear(&mut self) {
        *self = Levels::default();
    }

    pub fn active_takes(&self) -> impl Iterator<Item = (usize, &TakeLevel)> {
        self.takes.iter().enumerate().filter(|(_, t)| t.is_active())
    }

    pub fn take_prices(&self) -> [f64; MAX_TAKES] {
        self.takes.map(|t| t.price)
    }

    /// Whether `candidate` moves the stop toward profit. Any finite stop
    /// tightens a missing one.
    pub fn tightens_stop(&self, side: Side, candidate: f64) -> bool {
        if candidate.is_nan() {
            return false;
        }
        if self.stop.is_nan() {
            return true;
        }
        match side {
            Side::Long => candidate > self.stop,
            Side::Short => candidate < self.stop,
        }
    }
}

/// Per-bar snapshot of the levels, for charts and reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LevelSeries {
    pub stop:        Vec<f64>,
    pub liquidation: Vec<f64>,
    pub takes:       Vec<[f64; MAX_TAKES]>,
}

impl LevelSeries {
    pub fn with_len(n: usize) -> Self {
        Self {
            stop:        vec![f64::NAN; n],
            liquidation: vec![f64::NAN; n],
            takes:       vec![[f64::NAN; MAX_TAKES]; n],
        }
    }

    #[inline]
    pub fn record(&mut self, i: usize, levels: &Levels) {
        self.stop[i] = levels.stop;
        self.liquidation[i] = levels.liquidation;
        self.takes[i] = levels.take_prices();
    }
}
