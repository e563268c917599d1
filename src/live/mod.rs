// src/live/mod.rs

use std::collections::VecDeque;
use std::time::Duration;

use log::{debug, error, warn};
use thiserror::Error;

use crate::engine::bars::{Bar, BarSeries};
use crate::engine::orders::{order_commands, OrderCommand};
use crate::engine::prepare_inputs::prepare_inputs;
use crate::engine::settings::SimulationSettings;
use crate::engine::simulator::simulate;
use crate::engine::strategy::Strategy;
use crate::error::BacktestError;

#[cfg(feature = "live")]
mod runtime;
#[cfg(feature = "live")]
pub use runtime::RunnerHandle;

/// Bars kept beyond the strategy warmup.
pub const HISTORY_MARGIN: usize = 500;

/// Failures of the exchange / notification adapters. They stop at the
/// runner; nothing outside this module sees them.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Engine(#[from] BacktestError),
}

/// Source of closed klines for one symbol.
pub trait KlineSource {
    /// Closed bars with `time > since` (all available when `since` is None),
    /// oldest first.
    fn closed_bars(&mut self, since: Option<i64>) -> Result<Vec<Bar>, AdapterError>;
}

/// Exchange side of the order commands.
pub trait OrderGateway {
    fn send(&mut self, symbol: &str, command: &OrderCommand) -> Result<(), AdapterError>;
}

pub trait Notifier {
    fn notify(&self, message: &str) -> Result<(), AdapterError>;
}

/// One unit of work the runner polls.
pub trait LiveTask {
    fn name(&self) -> &str;

    /// Fetch, simulate, dispatch. Returns the number of commands sent.
    fn poll(&mut self) -> Result<usize, AdapterError>;
}

/// A strategy bound to a symbol: keeps a rolling bar window, re-simulates
/// on every new closed bar and forwards the commands of the last bar.
///
/// New bars are only committed once the simulation over them succeeded.
/// Commands the gateway refused stay queued and go out first on the next
/// poll.
pub struct LiveContext<S, K, G> {
    name:     String,
    symbol:   String,
    strategy: S,
    settings: SimulationSettings,
    bars:     BarSeries,
    history:  usize,                   // max bars kept
    pending:  VecDeque<OrderCommand>,  // computed, not yet accepted
    source:   K,
    gateway:  G,
}

impl<S: Strategy, K: KlineSource, G: OrderGateway> LiveContext<S, K, G> {
    pub fn new(symbol: &str, strategy: S, settings: SimulationSettings, source: K, gateway: G) -> Self {
        Self {
            name: format!("{}:{}", strategy.name(), symbol),
            symbol: symbol.to_string(),
            history: strategy.warmup() + HISTORY_MARGIN,
            strategy,
            settings,
            bars: BarSeries::default(),
            pending: VecDeque::new(),
            source,
            gateway,
        }
    }

    /// Override the window length. Never below warmup plus one bar.
    pub fn with_history(mut self, bars: usize) -> Self {
        self.history = bars.max(self.strategy.warmup() + 1);
        self
    }

    pub fn bars(&self) -> &BarSeries {
        &self.bars
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// The held window plus the bars of `fresh` newer than its last one,
    /// cut to `history`. None when nothing is new.
    fn stage(&self, fresh: Vec<Bar>) -> Result<Option<BarSeries>, AdapterError> {
        let mut last = self.bars.last().map(|b| b.time);
        let newer: Vec<Bar> = fresh
            .into_iter()
            .filter(|bar| {
                let keep = last.map_or(true, |t| bar.time > t);
                if keep {
                    last = Some(bar.time);
                }
                keep
            })
            .collect();
        if newer.is_empty() {
            return Ok(None);
        }
        prepare_inputs(&BarSeries::from_bars(&newer)).map_err(|e| AdapterError::Malformed(e.to_string()))?;

        let mut staged = self.bars.clone();
        for bar in newer {
            staged.push(bar);
        }
        Ok(Some(staged.tail(self.history)))
    }

    /// Send queued commands in order, dropping each once accepted.
    fn flush(&mut self) -> Result<usize, AdapterError> {
        let mut sent = 0;
        while let Some(command) = self.pending.front() {
            debug!("{}: {:?}", self.name, command);
            self.gateway.send(&self.symbol, command)?;
            self.pending.pop_front();
            sent += 1;
        }
        Ok(sent)
    }
}

impl<S: Strategy, K: KlineSource, G: OrderGateway> LiveTask for LiveContext<S, K, G> {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self) -> Result<usize, AdapterError> {
        // 1) Whatever the gateway refused last time
        let mut sent = self.flush()?;

        // 2) New closed bars, staged
        let since = self.bars.last().map(|b| b.time);
        let fresh = self.source.closed_bars(since)?;
        let Some(staged) = self.stage(fresh)? else {
            return Ok(sent);
        };

        // 3) Re-run over the window
        let result = simulate(&mut self.strategy, &staged, &self.settings)?;

        // 4) Commit, then dispatch the last bar's alerts
        self.bars = staged;
        self.pending = order_commands(&result.alerts, &result.position, &result.levels, &self.settings).into();
        sent += self.flush()?;
        Ok(sent)
    }
}

/// Polls every task on a fixed interval. A failing task is logged and
/// reported, then retried on the next cycle; the others keep running.
pub struct LiveRunner {
    tasks:    Vec<Box<dyn LiveTask + Send>>,
    notifier: Box<dyn Notifier + Send>,
    interval: Duration,
}

/// Outcome of one pass over the tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub succeeded: usize,
    pub failed:    usize,
    pub commands:  usize,
}

impl LiveRunner {
    pub fn new(notifier: Box<dyn Notifier + Send>, interval: Duration) -> Self {
        Self { tasks: Vec::new(), notifier, interval }
    }

    pub fn add(&mut self, task: Box<dyn LiveTask + Send>) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        for task in self.tasks.iter_mut() {
            match task.poll() {
                Ok(sent) => {
                    report.succeeded += 1;
                    report.commands += sent;
                }
                Err(e) => {
                    report.failed += 1;
                    error!("{}: {}", task.name(), e);
                    if let Err(ne) = self.notifier.notify(&format!("{}: {}", task.name(), e)) {
                        warn!("notifier failed: {}", ne);
                    }
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::position::Side;
    use crate::engine::strategy::{BarContext, EntryPlan};

    struct VecSource(Vec<Bar>);

    impl KlineSource for VecSource {
        fn closed_bars(&mut self, since: Option<i64>) -> Result<Vec<Bar>, AdapterError> {
            Ok(self.0.iter().copied().filter(|b| since.map_or(true, |t| b.time > t)).collect())
        }
    }

    #[derive(Default)]
    struct Recorder(Vec<OrderCommand>);

    impl OrderGateway for Recorder {
        fn send(&mut self, _symbol: &str, command: &OrderCommand) -> Result<(), AdapterError> {
            self.0.push(*command);
            Ok(())
        }
    }

    /// Goes long on the last bar it sees.
    struct LongOnLast;

    impl Strategy for LongOnLast {
        fn name(&self) -> &str {
            "long_on_last"
        }

        fn entry(&self, ctx: &BarContext<'_>, side: Side) -> Option<EntryPlan> {
            (side == Side::Long && ctx.index + 1 == ctx.bars.len()).then(|| EntryPlan::new(Side::Long))
        }
    }

    fn bar(t: i64) -> Bar {
        Bar { time: t, open: 100.0, high: 101.0, low: 99.0, close: 100.0, volume: 1.0 }
    }

    fn context(source: VecSource) -> LiveContext<LongOnLast, VecSource, Recorder> {
        LiveContext::new("BTCUSDT", LongOnLast, SimulationSettings::default(), source, Recorder::default())
    }

    #[test]
    fn new_bar_dispatches_open() {
        let mut ctx = context(VecSource(vec![bar(0), bar(60_000), bar(120_000)]));

        let sent = ctx.poll().unwrap();
        assert_eq!(ctx.bars().len(), 3);
        assert!(sent >= 1);
        assert!(ctx
            .gateway()
            .0
            .iter()
            .any(|c| matches!(c, OrderCommand::MarketOpen { side: Side::Long, .. })));

        // nothing new: no simulation, no orders
        assert_eq!(ctx.poll().unwrap(), 0);
        assert_eq!(ctx.name(), "long_on_last:BTCUSDT");
    }

    #[test]
    fn stale_bars_are_ignored() {
        let ctx = context(VecSource(Vec::new()));
        let staged = ctx.stage(vec![bar(10), bar(5), bar(10), bar(20)]).unwrap().unwrap();
        assert_eq!(staged.time(), &[10, 20]);
        assert!(ctx.stage(Vec::new()).unwrap().is_none());
    }

    #[test]
    fn window_is_capped() {
        let bars: Vec<Bar> = (0..10).map(|i| bar(i * 60_000)).collect();
        let mut ctx = context(VecSource(bars)).with_history(4);
        ctx.poll().unwrap();
        assert_eq!(ctx.bars().len(), 4);
        assert_eq!(ctx.bars().time()[0], 6 * 60_000);
    }

    #[test]
    fn non_finite_kline_is_not_committed() {
        let mut broken = bar(60_000);
        broken.close = f64::NAN;
        let mut ctx = context(VecSource(vec![bar(0), broken]));

        assert!(matches!(ctx.poll(), Err(AdapterError::Malformed(_))));
        assert!(ctx.bars().is_empty());
        assert!(ctx.gateway().0.is_empty());

        // the source corrects the bar
        ctx.source.0[1].close = 100.0;
        assert!(ctx.poll().unwrap() >= 1);
        assert_eq!(ctx.bars().len(), 2);
    }
}
