use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::{abort, hourly_period, purge_window, read_rollup, save_rows};
use crate::checks::base::{BaseCheck, CheckArgs, CheckOutcome, CheckStrategy};
use crate::checks::buffer::Queue;
use crate::checks::retry::RetryPolicy;
use crate::checks::types::{MetricData, MetricFamily};

/// Rolls the last hour of raw samples into the per-hour table
///
/// Any phase failing after its retries aborts the execution without
/// enqueuing; the window is picked up again by the next run.
pub struct HourlyCheck {
    base: BaseCheck,
    family: MetricFamily,
    policy: RetryPolicy,
}

impl HourlyCheck {
    pub fn new(family: MetricFamily, args: CheckArgs, policy: RetryPolicy) -> Self {
        Self {
            base: BaseCheck::new(family.hourly_type(), args),
            family,
            policy,
        }
    }

    pub fn family(&self) -> MetricFamily {
        self.family
    }
}

#[async_trait]
impl CheckStrategy for HourlyCheck {
    #[instrument(skip_all, fields(check = %self.base.name()))]
    async fn execute(&self, ctx: &CancellationToken) -> CheckOutcome {
        let target = self.family.hourly_type();
        let source = self.family.raw_table();
        let period = hourly_period();

        let results = match read_rollup(&self.base, ctx, &self.policy, source, target, period).await
        {
            Ok(results) => results,
            Err(err) => return abort(&self.base, err),
        };

        if let Err(err) = save_rows(
            &self.base,
            ctx,
            &self.policy,
            self.family.hourly_table(),
            &results,
        )
        .await
        {
            return abort(&self.base, err);
        }

        if let Err(err) = purge_window(&self.base, ctx, &self.policy, source, period).await {
            return abort(&self.base, err);
        }

        self.base
            .deliver(ctx, Queue::Success, MetricData::new(target, results))
            .await
    }

    fn base(&self) -> &BaseCheck {
        &self.base
    }
}
