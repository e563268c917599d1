// src/live/runtime.rs

use log::{debug, info};
use tokio::sync::oneshot;
use tokio::task::{self, JoinError, JoinHandle};
use tokio::time::{self, MissedTickBehavior};

use crate::live::LiveRunner;

/// A runner polling on a spawned tokio task. Dropping the handle stops it
/// as well.
pub struct RunnerHandle {
    shutdown: oneshot::Sender<()>,
    join:     JoinHandle<LiveRunner>,
}

impl RunnerHandle {
    /// Ask the loop to stop after the cycle in flight and hand the runner back.
    pub async fn stop(self) -> Result<LiveRunner, JoinError> {
        let _ = self.shutdown.send(());
        self.join.await
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl LiveRunner {
    /// Poll every `interval` from a background task until stopped. The
    /// adapters are synchronous, so each cycle runs on the blocking pool.
    /// Must be called inside a tokio runtime.
    pub fn spawn(self) -> RunnerHandle {
        let (shutdown, mut stop) = oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            let mut runner = self;
            info!("live runner started with {} tasks, interval {:?}", runner.len(), runner.interval());
            let mut ticker = time::interval(runner.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stop => break,
                    _ = ticker.tick() => {
                        let cycle = task::spawn_blocking(move || {
                            let report = runner.run_cycle();
                            (runner, report)
                        });
                        match cycle.await {
                            Ok((back, report)) => {
                                runner = back;
                                debug!("cycle: {:?}", report);
                            }
                            Err(e) => std::panic::resume_unwind(e.into_panic()),
                        }
                    }
                }
            }
            info!("live runner stopped");
            runner
        });
        RunnerHandle { shutdown, join }
    }
}
