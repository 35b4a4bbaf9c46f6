//! Periodic driver for the checks
//!
//! Each check gets its own task ticking at the check's interval. The first
//! execution happens one interval after start; a tick missed because an
//! execution ran long is delayed, not bunched up.
//!
//! ```text
//! tick → execute(ctx) → log outcome → tick → ...
//!   ↑
//!   └─── ctx cancelled → stop
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::checks::{CheckOutcome, CheckStrategy, Queue};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to the running check tasks
pub struct CheckScheduler {
    tasks: Vec<JoinHandle<()>>,
}

impl CheckScheduler {
    /// Spawn one task per check; all of them stop once `ctx` is cancelled
    pub fn spawn(checks: Vec<Arc<dyn CheckStrategy>>, ctx: CancellationToken) -> Self {
        let tasks = checks
            .into_iter()
            .map(|check| tokio::spawn(run_check(check, ctx.child_token())))
            .collect::<Vec<_>>();

        info!("scheduled {} checks", tasks.len());
        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every check task to finish
    pub async fn join(self) {
        for res in join_all(self.tasks).await {
            if let Err(e) = res {
                error!("check task failed: {}", e);
            }
        }
    }
}

#[instrument(skip_all, fields(check = %check.name()))]
async fn run_check(check: Arc<dyn CheckStrategy>, ctx: CancellationToken) {
    let period = check.interval().max(MIN_INTERVAL);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!("running every {:?}", period);

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let outcome = check.execute(&ctx).await;
        log_outcome(check.as_ref(), &outcome);

        if matches!(outcome, CheckOutcome::Cancelled) {
            break;
        }
    }

    debug!("check stopped");
}

fn log_outcome(check: &dyn CheckStrategy, outcome: &CheckOutcome) {
    match outcome {
        CheckOutcome::Delivered {
            queue: Queue::Success,
            items,
        } => trace!(check = check.name(), items, "delivered"),
        CheckOutcome::Delivered {
            queue: Queue::Failure,
            items,
        } => warn!(check = check.name(), items, "delivered to failure queue"),
        CheckOutcome::Aborted(err) => error!(check = check.name(), "aborted: {}", err),
        CheckOutcome::Cancelled => debug!(check = check.name(), "cancelled"),
        CheckOutcome::Completed { rows_deleted } => {
            debug!(check = check.name(), rows_deleted, "completed")
        }
    }
}
