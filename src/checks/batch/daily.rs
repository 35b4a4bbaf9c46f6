use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use super::{abort, daily_period, purge_window, read_rollup};
use crate::checks::base::{BaseCheck, CheckArgs, CheckOutcome, CheckStrategy};
use crate::checks::buffer::Queue;
use crate::checks::retry::RetryPolicy;
use crate::checks::types::{MetricData, MetricFamily};

/// Summarises the last 24 hours of per-hour rollups
///
/// The daily record is not stored, it only goes to the buffer. A failed
/// read enqueues nothing. A failed purge after a successful read still
/// delivers the mapped metric, on the failure queue.
pub struct DailyCheck {
    base: BaseCheck,
    family: MetricFamily,
    policy: RetryPolicy,
}

impl DailyCheck {
    pub fn new(family: MetricFamily, args: CheckArgs, policy: RetryPolicy) -> Self {
        Self {
            base: BaseCheck::new(family.daily_type(), args),
            family,
            policy,
        }
    }

    pub fn family(&self) -> MetricFamily {
        self.family
    }
}

#[async_trait]
impl CheckStrategy for DailyCheck {
    #[instrument(skip_all, fields(check = %self.base.name()))]
    async fn execute(&self, ctx: &CancellationToken) -> CheckOutcome {
        let target = self.family.daily_type();
        let source = self.family.hourly_table();
        let period = daily_period();

        let results = match read_rollup(&self.base, ctx, &self.policy, source, target, period).await
        {
            Ok(results) => results,
            Err(err) => return abort(&self.base, err),
        };
        let metric = MetricData::new(target, results);

        let queue = match purge_window(&self.base, ctx, &self.policy, source, period).await {
            Ok(_) => Queue::Success,
            Err(err) if err.is_cancelled() => return abort(&self.base, err),
            Err(err) => {
                warn!(check = self.base.name(), "purge failed, reporting as failure: {}", err);
                Queue::Failure
            }
        };

        self.base.deliver(ctx, queue, metric).await
    }

    fn base(&self) -> &BaseCheck {
        &self.base
    }
}
