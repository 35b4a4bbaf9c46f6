//! Consumer side of the check buffer
//!
//! The uplink drains both queues and hands every metric to a
//! [`MetricSink`]. Delivery errors are logged and the metric is dropped;
//! retrying the network hop is left to the sink.
//!
//! ```text
//! success queue ─┐
//!                ├─→ Uplink → MetricSink (HTTP / log)
//! failure queue ─┘
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace};

use crate::checks::{BufferReceivers, MetricData, Queue};

/// Header carrying the agent secret on every upload
pub const SECRET_HEADER: &str = "X-AGENT-SECRET";

/// Destination of drained metrics
#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn deliver(&self, queue: Queue, metric: &MetricData) -> Result<()>;
}

/// Body of an upload
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub status: Queue,
    pub metric: &'a MetricData,
}

/// POSTs every metric as JSON to a remote endpoint
pub struct HttpSink {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpSink {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
            token,
        })
    }
}

#[async_trait]
impl MetricSink for HttpSink {
    #[instrument(skip(self, metric), fields(check_type = %metric.check_type))]
    async fn deliver(&self, queue: Queue, metric: &MetricData) -> Result<()> {
        let mut request = self.client.post(&self.url).json(&Envelope {
            status: queue,
            metric,
        });

        if let Some(token) = &self.token {
            request = request.header(SECRET_HEADER, token);
        }

        let response = request
            .send()
            .await
            .context("failed to send HTTP request")?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP error: {}", response.status());
        }

        trace!("uploaded metric to {}", self.url);
        Ok(())
    }
}

/// Writes every metric to the log, used when no remote is configured
pub struct LogSink;

#[async_trait]
impl MetricSink for LogSink {
    async fn deliver(&self, queue: Queue, metric: &MetricData) -> Result<()> {
        let body = serde_json::to_string(metric).context("failed to serialize metric")?;
        info!(%queue, "{}", body);
        Ok(())
    }
}

pub struct Uplink<S> {
    receivers: BufferReceivers,
    sink: S,
}

impl<S: MetricSink> Uplink<S> {
    pub fn new(receivers: BufferReceivers, sink: S) -> Self {
        Self { receivers, sink }
    }

    /// Drain both queues until `ctx` is cancelled or every producer is gone
    ///
    /// A pending failure metric is taken right after every success metric,
    /// so a busy success queue cannot starve the failure queue.
    ///
    /// Returns the number of metrics delivered successfully.
    pub async fn run(mut self, ctx: CancellationToken) -> usize {
        debug!("starting uplink");

        let mut delivered = 0;
        let mut success_open = true;
        let mut failure_open = true;
        let mut failure_turn = false;

        while success_open || failure_open {
            if ctx.is_cancelled() {
                break;
            }

            let pending_failure = if failure_turn && failure_open {
                self.receivers.failure.try_recv().ok()
            } else {
                None
            };

            let (queue, metric) = match pending_failure {
                Some(metric) => (Queue::Failure, metric),
                None => tokio::select! {
                    biased;
                    _ = ctx.cancelled() => break,
                    metric = self.receivers.success.recv(), if success_open => match metric {
                        Some(metric) => (Queue::Success, metric),
                        None => {
                            success_open = false;
                            continue;
                        }
                    },
                    metric = self.receivers.failure.recv(), if failure_open => match metric {
                        Some(metric) => (Queue::Failure, metric),
                        None => {
                            failure_open = false;
                            continue;
                        }
                    },
                },
            };
            failure_turn = queue == Queue::Success;

            match self.sink.deliver(queue, &metric).await {
                Ok(()) => delivered += 1,
                Err(e) => error!(
                    %queue,
                    check_type = %metric.check_type,
                    "failed to deliver metric: {:#}",
                    e
                ),
            }
        }

        debug!("uplink stopped after {} deliveries", delivered);
        delivered
    }
}
