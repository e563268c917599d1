mod common;

#[cfg(feature = "live")]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tradesim::engine::{Bar, OrderCommand, Side, SimulationSettings};
use tradesim::live::{AdapterError, KlineSource, LiveContext, LiveRunner, LiveTask, Notifier, OrderGateway};

use common::Scripted;

#[derive(Clone, Default)]
struct Inbox(Arc<Mutex<Vec<String>>>);

impl Notifier for Inbox {
    fn notify(&self, message: &str) -> Result<(), AdapterError> {
        self.0.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

struct DownNotifier;

impl Notifier for DownNotifier {
    fn notify(&self, _message: &str) -> Result<(), AdapterError> {
        Err(AdapterError::Request("notifier offline".into()))
    }
}

/// Serves a growing list of bars; `push` simulates a new closed kline.
#[derive(Clone, Default)]
struct Feed(Arc<Mutex<Vec<Bar>>>);

impl Feed {
    fn push(&self, bar: Bar) {
        self.0.lock().unwrap().push(bar);
    }
}

impl KlineSource for Feed {
    fn closed_bars(&mut self, since: Option<i64>) -> Result<Vec<Bar>, AdapterError> {
        let bars = self.0.lock().unwrap();
        Ok(bars.iter().copied().filter(|b| since.map_or(true, |t| b.time > t)).collect())
    }
}

struct BrokenFeed;

impl KlineSource for BrokenFeed {
    fn closed_bars(&mut self, _since: Option<i64>) -> Result<Vec<Bar>, AdapterError> {
        Err(AdapterError::Malformed("kline payload".into()))
    }
}

#[derive(Clone, Default)]
struct Sent(Arc<Mutex<Vec<OrderCommand>>>);

impl OrderGateway for Sent {
    fn send(&mut self, _symbol: &str, command: &OrderCommand) -> Result<(), AdapterError> {
        self.0.lock().unwrap().push(*command);
        Ok(())
    }
}

fn healthy(feed: Feed, sent: Sent) -> LiveContext<Scripted, Feed, Sent> {
    let strategy = Scripted::once(1, Side::Long, 90.0, 120.0);
    LiveContext::new("ETHUSDT", strategy, SimulationSettings::default(), feed, sent)
}

fn broken() -> LiveContext<Scripted, BrokenFeed, Sent> {
    let strategy = Scripted::once(0, Side::Long, f64::NAN, f64::NAN);
    LiveContext::new("BTCUSDT", strategy, SimulationSettings::default(), BrokenFeed, Sent::default())
}

#[test]
fn failing_context_does_not_stop_the_others() {
    common::init_logging();
    let feed = Feed::default();
    let sent = Sent::default();
    let inbox = Inbox::default();

    let mut runner = LiveRunner::new(Box::new(inbox.clone()), Duration::from_millis(1));
    runner.add(Box::new(broken()));
    runner.add(Box::new(healthy(feed.clone(), sent.clone())));
    assert_eq!(runner.len(), 2);

    // first closed bar: nothing to do yet
    feed.push(common::bar(0, 100.0, 101.0, 99.0, 100.0));
    let report = runner.run_cycle();
    assert_eq!((report.succeeded, report.failed), (1, 1));
    assert_eq!(report.commands, 0);

    // second bar opens the scripted long
    feed.push(common::bar(1, 100.0, 101.0, 99.0, 100.0));
    let report = runner.run_cycle();
    assert_eq!((report.succeeded, report.failed), (1, 1));
    assert!(report.commands >= 1);

    let orders = sent.0.lock().unwrap().clone();
    assert!(matches!(orders[0], OrderCommand::MarketOpen { side: Side::Long, .. }));
    assert!(orders.iter().any(|c| matches!(c, OrderCommand::StopClose { price, .. } if *price == 90.0)));
    assert!(orders.iter().any(|c| matches!(c, OrderCommand::LimitClose { price, .. } if *price == 120.0)));

    let messages = inbox.0.lock().unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.starts_with("scripted:BTCUSDT")));
}

#[test]
fn notifier_failure_is_swallowed() {
    let mut runner = LiveRunner::new(Box::new(DownNotifier), Duration::from_millis(1));
    runner.add(Box::new(broken()));
    let report = runner.run_cycle();
    assert_eq!(report.failed, 1);
}

/// Refuses the first `failures` commands, then records like `Sent`.
struct Flaky {
    failures: usize,
    sent:     Sent,
}

impl OrderGateway for Flaky {
    fn send(&mut self, symbol: &str, command: &OrderCommand) -> Result<(), AdapterError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(AdapterError::Request("timeout".into()));
        }
        self.sent.send(symbol, command)
    }
}

#[test]
fn refused_commands_go_out_on_the_next_poll() {
    common::init_logging();
    let feed = Feed::default();
    feed.push(common::bar(0, 100.0, 101.0, 99.0, 100.0));
    feed.push(common::bar(1, 100.0, 101.0, 99.0, 100.0));
    let sent = Sent::default();
    let gateway = Flaky { failures: 1, sent: sent.clone() };
    let strategy = Scripted::once(1, Side::Long, 90.0, 120.0);
    let mut ctx = LiveContext::new("ETHUSDT", strategy, SimulationSettings::default(), feed, gateway);

    assert!(matches!(ctx.poll(), Err(AdapterError::Request(_))));
    assert!(sent.0.lock().unwrap().is_empty());
    let queued = ctx.pending();
    assert!(queued >= 3);
    assert_eq!(ctx.bars().len(), 2);

    // no new bar, but the queue is drained
    assert_eq!(ctx.poll().unwrap(), queued);
    assert_eq!(ctx.pending(), 0);
    let orders = sent.0.lock().unwrap();
    assert_eq!(orders.len(), queued);
    assert!(matches!(orders[0], OrderCommand::MarketOpen { side: Side::Long, .. }));
}

#[cfg(feature = "live")]
struct Counter(Arc<AtomicUsize>);

#[cfg(feature = "live")]
impl LiveTask for Counter {
    fn name(&self) -> &str {
        "counter"
    }

    fn poll(&mut self) -> Result<usize, AdapterError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }
}

#[cfg(feature = "live")]
#[tokio::test]
async fn spawned_runner_polls_until_stopped() {
    common::init_logging();
    let polls = Arc::new(AtomicUsize::new(0));
    let mut runner = LiveRunner::new(Box::new(Inbox::default()), Duration::from_millis(5));
    runner.add(Box::new(Counter(polls.clone())));

    let handle = runner.spawn();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let runner = handle.stop().await.unwrap();
    assert_eq!(runner.len(), 1);

    let seen = polls.load(Ordering::SeqCst);
    assert!(seen >= 1);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(polls.load(Ordering::SeqCst), seen);
}
