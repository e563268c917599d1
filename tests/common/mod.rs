#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tradesim::engine::{Bar, BarContext, BarSeries, EntryPlan, Side, Strategy};

pub const MINUTE: i64 = 60_000;

/// Route `log` output through the test harness; safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar { time: i as i64 * MINUTE, open, high, low, close, volume: 1.0 }
}

/// Bars from (high, low, close) triples; open equals the previous close.
pub fn bars_from(hlc: &[(f64, f64, f64)]) -> BarSeries {
    let mut prev = hlc.first().map_or(0.0, |t| t.2);
    hlc.iter()
        .enumerate()
        .map(|(i, &(h, l, c))| {
            let b = bar(i, prev, h, l, c);
            prev = c;
            b
        })
        .collect()
}

/// Deterministic random walk with a small intrabar range.
pub fn random_walk(n: usize, seed: u64) -> BarSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut close = 100.0_f64;
    (0..n)
        .map(|i| {
            let open = close;
            close = (close * (1.0 + rng.gen_range(-0.02..0.02))).max(1.0);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.005));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.005));
            bar(i, open, high, low, close)
        })
        .collect()
}

/// Opens the listed entries, nothing else. Stop and take are absolute
/// prices (NaN to leave them out).
pub struct Scripted {
    pub entries: Vec<(usize, Side)>,
    pub stop:    f64,
    pub take:    f64,
}

impl Scripted {
    pub fn once(index: usize, side: Side, stop: f64, take: f64) -> Self {
        Self { entries: vec![(index, side)], stop, take }
    }
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
        let mut plan = EntryPlan::new(side).stop(self.stop);
        if self.take.is_finite() {
            plan = plan.take(self.take, 100.0);
        }
        Some(plan)
    }
}
