//! Fixed-interval repetition of the dispatch cycle.
//!
//! The scheduler runs one cycle, waits the inter-cycle delay, and repeats until
//! the shutdown channel flips to `true`. A shutdown observed mid-cycle drops
//! the in-flight cycle; deliveries it already made are re-sent after restart
//! because the record is only written at the end of a cycle.
//!
//! A panic inside a cycle is caught here, logged, and the next cycle runs as
//! usual.

use crate::dispatch::{CycleReport, Dispatcher};
use crate::notifier::Notifier;
use crate::scrapers::FeedFetcher;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, instrument};

pub struct Scheduler {
    inter_cycle_delay: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(inter_cycle_delay: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            inter_cycle_delay,
            shutdown,
        }
    }

    /// Run cycles until shutdown. Returns the number of cycles started.
    #[instrument(level = "info", skip_all, fields(interval = ?self.inter_cycle_delay))]
    pub async fn run<F, N>(mut self, dispatcher: &Dispatcher<F, N>) -> usize
    where
        F: FeedFetcher,
        N: Notifier,
    {
        let mut cycles = 0usize;
        info!("Scheduler started");

        while !*self.shutdown.borrow() {
            cycles += 1;
            tokio::select! {
                _ = run_cycle_guarded(dispatcher) => {}
                _ = wait_for_shutdown(&mut self.shutdown) => {
                    info!(cycle = cycles, "Shutdown requested; abandoning current cycle");
                    break;
                }
            }

            tokio::select! {
                _ = sleep(self.inter_cycle_delay) => {}
                _ = wait_for_shutdown(&mut self.shutdown) => break,
            }
        }

        info!(cycles, "Scheduler stopped");
        cycles
    }
}

/// Run one cycle, converting a panic into a logged error.
pub async fn run_cycle_guarded<F, N>(dispatcher: &Dispatcher<F, N>) -> Option<CycleReport>
where
    F: FeedFetcher,
    N: Notifier,
{
    match AssertUnwindSafe(dispatcher.run_cycle()).catch_unwind().await {
        Ok(report) => Some(report),
        Err(panic) => {
            error!(panic = %panic_message(panic.as_ref()), "Unexpected failure during cycle");
            None
        }
    }
}

/// Resolve once the flag reads `true`; never resolves if the sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
