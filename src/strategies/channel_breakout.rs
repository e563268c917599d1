// src/strategies/channel_breakout.rs

use serde::{Deserialize, Serialize};

use crate::engine::bars::BarSeries;
use crate::engine::params::{ParamDomain, ParamSpace, ParamVector};
use crate::engine::position::Side;
use crate::engine::strategy::{BarContext, EntryPlan, Optimizable, Strategy};
use crate::error::{BacktestError, Result};
use crate::strategies::indicators::{rolling_highest, rolling_lowest};

/// Parameters of [`ChannelBreakout`], in gene order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakoutParams {
    pub entry_period: usize,   // bars in the breakout channel
    pub exit_period:  usize,   // bars in the opposite-side exit channel
    pub stop_pct:     f64,     // % from entry
    pub take_pct:     f64,     // % from entry for the second leg; first leg at half
    pub trail:        bool,    // trail the stop to the channel midline
}

impl Default for BreakoutParams {
    fn default() -> Self {
        Self { entry_period: 20, exit_period: 10, stop_pct: 2.0, take_pct: 6.0, trail: true }
    }
}

/// Donchian breakout: enter when the close leaves the prior channel, exit on
/// a break of the shorter opposite channel. Two take legs, half the size
/// each, at `take_pct / 2` and `take_pct`.
#[derive(Debug, Clone)]
pub struct ChannelBreakout {
    params:     BreakoutParams,
    upper:      Vec<f64>,
    lower:      Vec<f64>,
    exit_upper: Vec<f64>,
    exit_lower: Vec<f64>,
}

impl ChannelBreakout {
    pub fn new(params: BreakoutParams) -> Result<Self> {
        if params.entry_period == 0 || params.exit_period == 0 {
            return Err(BacktestError::InvalidSetting {
                name:   "entry_period",
                reason: "channel periods must be at least 1".into(),
            });
        }
        if !(params.stop_pct > 0.0 && params.take_pct > 0.0) {
            return Err(BacktestError::InvalidSetting {
                name:   "stop_pct",
                reason: "stop and take distances must be positive".into(),
            });
        }
        Ok(Self {
            params,
            upper:      Vec::new(),
            lower:      Vec::new(),
            exit_upper: Vec::new(),
            exit_lower: Vec::new(),
        })
    }

    pub fn params(&self) -> &BreakoutParams {
        &self.params
    }

    /// Value of `series` on the bar before `i`; NaN on the first bar.
    fn prev(series: &[f64], i: usize) -> f64 {
        i.checked_sub(1).and_then(|j| series.get(j)).copied().unwrap_or(f64::NAN)
    }
}

impl Strategy for ChannelBreakout {
    fn name(&self) -> &str {
        <Self as Optimizable>::NAME
    }

    fn prepare(&mut self, bars: &BarSeries) {
        self.upper = rolling_highest(bars.high(), self.params.entry_period);
        self.lower = rolling_lowest(bars.low(), self.params.entry_period);
        self.exit_upper = rolling_highest(bars.high(), self.params.exit_period);
        self.exit_lower = rolling_lowest(bars.low(), self.params.exit_period);
    }

    fn warmup(&self) -> usize {
        self.params.entry_period.max(self.params.exit_period)
    }

    fn entry(&self, ctx: &BarContext<'_>, side: Side) -> Option<EntryPlan> {
        let close = ctx.close();
        let broke = match side {
            Side::Long => close > Self::prev(&self.upper, ctx.index),
            Side::Short => close < Self::prev(&self.lower, ctx.index),
        };
        if !broke {
            return None;
        }
        let s = side.sign();
        let p = &self.params;
        Some(
            EntryPlan::new(side)
                .stop(close * (1.0 - s * p.stop_pct / 100.0))
                .take(close * (1.0 + s * p.take_pct / 200.0), 50.0)
                .take(close * (1.0 + s * p.take_pct / 100.0), 50.0),
        )
    }

    fn exit(&self, ctx: &BarContext<'_>, side: Side) -> bool {
        let close = ctx.close();
        match side {
            Side::Long => close < Self::prev(&self.exit_lower, ctx.index),
            Side::Short => close > Self::prev(&self.exit_upper, ctx.index),
        }
    }

    fn trail_stop(&self, ctx: &BarContext<'_>, side: Side) -> Option<f64> {
        if !self.params.trail {
            return None;
        }
        let mid = (self.upper[ctx.index] + self.lower[ctx.index]) / 2.0;
        let close = ctx.close();
        // only a level on the losing side of the close can rest as a stop
        let valid = match side {
            Side::Long => mid < close,
            Side::Short => mid > close,
        };
        valid.then_some(mid)
    }
}

impl Optimizable for ChannelBreakout {
    const NAME: &'static str = "channel_breakout";

    fn space() -> ParamSpace {
        ParamSpace::new(vec![
            ParamDomain::int_range("entry_period", 10, 60, 5),
            ParamDomain::int_range("exit_period", 5, 30, 5),
            ParamDomain::float_range("stop_pct", 0.5, 5.0, 0.5),
            ParamDomain::float_range("take_pct", 1.0, 12.0, 1.0),
            ParamDomain::boolean("trail"),
        ])
    }

    fn from_params(params: &ParamVector) -> Result<Self> {
        params.expect_len(5)?;
        let period = |i: usize| -> Result<usize> {
            usize::try_from(params.int(i)?)
                .map_err(|_| BacktestError::ParamType { index: i, expected: "a non-negative integer" })
        };
        Self::new(BreakoutParams {
            entry_period: period(0)?,
            exit_period:  period(1)?,
            stop_pct:     params.float(2)?,
            take_pct:     params.float(3)?,
            trail:        params.flag(4)?,
        })
    }
}
