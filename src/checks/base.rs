//! Shared check state and the execution contract

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::buffer::{BufferError, CheckBuffer, Queue};
use super::error::CheckError;
use super::types::{CheckType, MetricData};
use crate::storage::MetricStore;

/// Everything a concrete check needs besides its own recipe
#[derive(Clone)]
pub struct CheckArgs {
    pub name: String,
    pub interval: Duration,
    pub buffer: CheckBuffer,
    pub store: Arc<dyn MetricStore>,
}

/// State embedded by every concrete check. Accessors only.
#[derive(Clone)]
pub struct BaseCheck {
    check_type: CheckType,
    name: String,
    interval: Duration,
    buffer: CheckBuffer,
    store: Arc<dyn MetricStore>,
}

impl BaseCheck {
    pub fn new(check_type: CheckType, args: CheckArgs) -> Self {
        Self {
            check_type,
            name: args.name,
            interval: args.interval,
            buffer: args.buffer,
            store: args.store,
        }
    }

    pub fn check_type(&self) -> CheckType {
        self.check_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn buffer(&self) -> &CheckBuffer {
        &self.buffer
    }

    pub fn store(&self) -> &Arc<dyn MetricStore> {
        &self.store
    }

    /// Send `metric` to `queue` and translate the result into an outcome
    pub async fn deliver(&self, ctx: &CancellationToken, queue: Queue, metric: MetricData) -> CheckOutcome {
        let items = metric.data.len();
        match self.buffer.enqueue(ctx, queue, metric).await {
            Ok(()) => CheckOutcome::Delivered { queue, items },
            Err(BufferError::Cancelled) => CheckOutcome::Cancelled,
            Err(BufferError::Closed(queue)) => {
                warn!(check = %self.name, "buffer closed, dropping metric");
                CheckOutcome::Aborted(CheckError::BufferClosed(queue))
            }
        }
    }
}

/// What a single `execute` call did
#[derive(Debug)]
pub enum CheckOutcome {
    /// A metric with `items` records was enqueued on `queue`
    Delivered { queue: Queue, items: usize },

    /// Nothing was enqueued because of `CheckError`
    Aborted(CheckError),

    /// The token was cancelled, nothing was enqueued
    Cancelled,

    /// Housekeeping finished without producing a metric
    Completed { rows_deleted: u64 },
}

impl CheckOutcome {
    /// Fold an error into an outcome, keeping cancellation silent
    pub fn from_error(err: CheckError) -> Self {
        if err.is_cancelled() {
            CheckOutcome::Cancelled
        } else {
            CheckOutcome::Aborted(err)
        }
    }

    pub fn queue(&self) -> Option<Queue> {
        match self {
            CheckOutcome::Delivered { queue, .. } => Some(*queue),
            _ => None,
        }
    }
}

/// Contract the scheduler drives every check through
#[async_trait]
pub trait CheckStrategy: Send + Sync {
    /// Run one cycle of the check
    async fn execute(&self, ctx: &CancellationToken) -> CheckOutcome;

    fn base(&self) -> &BaseCheck;

    fn check_type(&self) -> CheckType {
        self.base().check_type()
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    fn interval(&self) -> Duration {
        self.base().interval()
    }

    fn buffer(&self) -> &CheckBuffer {
        self.base().buffer()
    }

    /// Storage handle the check reads from and writes to
    fn client(&self) -> &Arc<dyn MetricStore> {
        self.base().store()
    }
}
