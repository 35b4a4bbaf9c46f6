//! Success and failure delivery queues shared by all checks
//!
//! Both queues are bounded tokio channels of the same capacity. A full queue
//! blocks the sending check until the uplink catches up; the only way a
//! metric is dropped is cancellation of the sending token.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, trace};

use super::types::MetricData;

/// Which of the two queues a metric went to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Queue {
    Success,
    Failure,
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Queue::Success => f.write_str("success"),
            Queue::Failure => f.write_str("failure"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("send cancelled")]
    Cancelled,

    #[error("{0} queue is closed")]
    Closed(Queue),
}

/// Producer side of the queue pair, cheap to clone
#[derive(Debug, Clone)]
pub struct CheckBuffer {
    success: mpsc::Sender<MetricData>,
    failure: mpsc::Sender<MetricData>,
    capacity: usize,
}

/// Consumer side of the queue pair, handed to the uplink
#[derive(Debug)]
pub struct BufferReceivers {
    pub success: mpsc::Receiver<MetricData>,
    pub failure: mpsc::Receiver<MetricData>,
}

impl CheckBuffer {
    /// Create both queues with `capacity` slots each (at least one)
    pub fn new(capacity: usize) -> (CheckBuffer, BufferReceivers) {
        let capacity = capacity.max(1);
        let (success_tx, success_rx) = mpsc::channel(capacity);
        let (failure_tx, failure_rx) = mpsc::channel(capacity);

        (
            CheckBuffer {
                success: success_tx,
                failure: failure_tx,
                capacity,
            },
            BufferReceivers {
                success: success_rx,
                failure: failure_rx,
            },
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn enqueue_success(
        &self,
        ctx: &CancellationToken,
        metric: MetricData,
    ) -> Result<(), BufferError> {
        self.enqueue(ctx, Queue::Success, metric).await
    }

    pub async fn enqueue_failure(
        &self,
        ctx: &CancellationToken,
        metric: MetricData,
    ) -> Result<(), BufferError> {
        self.enqueue(ctx, Queue::Failure, metric).await
    }

    /// Blocking send, abandoned when `ctx` is cancelled
    #[instrument(skip(self, ctx, metric), fields(check_type = %metric.check_type))]
    pub async fn enqueue(
        &self,
        ctx: &CancellationToken,
        queue: Queue,
        metric: MetricData,
    ) -> Result<(), BufferError> {
        if ctx.is_cancelled() {
            return Err(BufferError::Cancelled);
        }

        let sender = match queue {
            Queue::Success => &self.success,
            Queue::Failure => &self.failure,
        };

        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(BufferError::Cancelled),
            res = sender.send(metric) => {
                res.map_err(|_| BufferError::Closed(queue))?;
                trace!("enqueued metric on {queue} queue");
                Ok(())
            }
        }
    }
}
