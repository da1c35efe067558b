//! Non-overlapping periodic task.
//!
//! Each tick spawns one run of the task body. If the previous run is still
//! executing when the next tick fires, that tick is skipped (and counted),
//! never queued. Shutdown stops the timer and waits for the run in flight.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

pub type TickFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Body of a periodic task, invoked once per run.
pub type TickFn = Arc<dyn Fn() -> TickFuture + Send + Sync>;

#[derive(Default)]
struct TickStats {
    runs: AtomicU64,
    skipped: AtomicU64,
}

/// A background loop running `tick` every `period`.
pub struct PeriodicTask {
    name: &'static str,
    stats: Arc<TickStats>,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Start the loop; the first run happens one `period` from now.
    pub fn spawn(name: &'static str, period: Duration, tick: TickFn) -> Self {
        let stats = Arc::new(TickStats::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(name, period, tick, stats.clone(), shutdown_rx));

        info!(task = name, ?period, "periodic task started");
        Self {
            name,
            stats,
            shutdown_tx,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Runs started so far.
    pub fn runs(&self) -> u64 {
        self.stats.runs.load(Ordering::SeqCst)
    }

    /// Ticks dropped because the previous run was still executing.
    pub fn skipped(&self) -> u64 {
        self.stats.skipped.load(Ordering::SeqCst)
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            error!(task = self.name, error = %e, "periodic task loop failed");
        }
    }
}

async fn run_loop(
    name: &'static str,
    period: Duration,
    tick: TickFn,
    stats: Arc<TickStats>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut current: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Some(run) = current.take() {
                    if !run.is_finished() {
                        stats.skipped.fetch_add(1, Ordering::SeqCst);
                        debug!(task = name, "previous run still executing, tick skipped");
                        current = Some(run);
                        continue;
                    }
                    report(name, run.await);
                }
                stats.runs.fetch_add(1, Ordering::SeqCst);
                current = Some(tokio::spawn(tick()));
            }
            _ = shutdown.changed() => {
                if let Some(run) = current.take() {
                    report(name, run.await);
                }
                info!(task = name, "periodic task stopped");
                break;
            }
        }
    }
}

fn report(name: &'static str, result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!(task = name, "periodic run panicked");
        } else {
            debug!(task = name, error = %e, "periodic run cancelled");
        }
    }
}
