//! Raw sampling checks
//!
//! A realtime check takes one host sample, stores it in the family's raw
//! table and hands it to the buffer. Unlike the rollup checks it reports
//! every failure on the failure queue:
//!
//! - sampling failed: empty metric to the failure queue
//! - save failed after retries: sampled metric to the failure queue
//! - otherwise: sampled metric to the success queue

use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use super::base::{BaseCheck, CheckArgs, CheckOutcome, CheckStrategy};
use super::batch::{abort, save_rows};
use super::buffer::Queue;
use super::error::CheckError;
use super::retry::RetryPolicy;
use super::types::{CheckResult, MetricData, MetricFamily};
use crate::collect::{Sampler, sampler_for};

pub struct RealtimeCheck {
    base: BaseCheck,
    family: MetricFamily,
    policy: RetryPolicy,
    sampler: Arc<Mutex<Box<dyn Sampler>>>,
}

impl RealtimeCheck {
    /// Check sampling the host through `sysinfo`
    pub fn new(family: MetricFamily, args: CheckArgs, policy: RetryPolicy) -> Self {
        Self::with_sampler(family, args, policy, sampler_for(family))
    }

    pub fn with_sampler(
        family: MetricFamily,
        args: CheckArgs,
        policy: RetryPolicy,
        sampler: Box<dyn Sampler>,
    ) -> Self {
        Self {
            base: BaseCheck::new(family.raw_type(), args),
            family,
            policy,
            sampler: Arc::new(Mutex::new(sampler)),
        }
    }

    async fn sample(&self) -> Result<Vec<CheckResult>, CheckError> {
        let sampler = Arc::clone(&self.sampler);
        let collect_err = |reason: String| CheckError::Collect {
            check_type: self.family.raw_type(),
            reason,
        };

        tokio::task::spawn_blocking(move || {
            let mut sampler = sampler
                .lock()
                .map_err(|_| anyhow!("sampler lock poisoned"))?;
            sampler.sample()
        })
        .await
        .map_err(|e| collect_err(e.to_string()))?
        .map_err(|e| collect_err(format!("{e:#}")))
    }
}

#[async_trait]
impl CheckStrategy for RealtimeCheck {
    #[instrument(skip_all, fields(check = %self.base.name()))]
    async fn execute(&self, ctx: &CancellationToken) -> CheckOutcome {
        let check_type = self.family.raw_type();

        let sample = tokio::select! {
            biased;
            _ = ctx.cancelled() => return CheckOutcome::Cancelled,
            sample = self.sample() => sample,
        };

        let results = match sample {
            Ok(results) => results,
            Err(err) => {
                warn!(check = self.base.name(), "{}", err);
                return self
                    .base
                    .deliver(ctx, Queue::Failure, MetricData::empty(check_type))
                    .await;
            }
        };

        let queue = match save_rows(
            &self.base,
            ctx,
            &self.policy,
            self.family.raw_table(),
            &results,
        )
        .await
        {
            Ok(_) => Queue::Success,
            Err(err) if err.is_cancelled() => return abort(&self.base, err),
            Err(err) => {
                warn!(check = self.base.name(), "failed to store sample: {}", err);
                Queue::Failure
            }
        };

        self.base
            .deliver(ctx, queue, MetricData::new(check_type, results))
            .await
    }

    fn base(&self) -> &BaseCheck {
        &self.base
    }
}
