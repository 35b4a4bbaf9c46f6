//! Retention enforcement
//!
//! Rows that were never rolled up (the agent was down when the hourly or
//! daily check should have run) would otherwise stay forever. The cleanup
//! check deletes everything older than the retention period from every
//! table.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::base::{BaseCheck, CheckArgs, CheckOutcome, CheckStrategy};
use super::batch::abort;
use super::error::{CheckError, Phase};
use super::retry::{RetryPolicy, retry};
use super::types::CheckType;
use crate::storage::Table;

pub const DEFAULT_RETENTION_HOURS: u32 = 48;

pub struct CleanupCheck {
    base: BaseCheck,
    policy: RetryPolicy,
    retention: chrono::Duration,
}

impl CleanupCheck {
    pub fn new(args: CheckArgs, policy: RetryPolicy, retention: chrono::Duration) -> Self {
        Self {
            base: BaseCheck::new(CheckType::Cleanup, args),
            policy,
            retention,
        }
    }

    pub fn retention(&self) -> chrono::Duration {
        self.retention
    }
}

#[async_trait]
impl CheckStrategy for CleanupCheck {
    /// Purge every table, continuing past tables that fail
    ///
    /// Reports the last error if any table could not be purged.
    #[instrument(skip_all, fields(check = %self.base.name()))]
    async fn execute(&self, ctx: &CancellationToken) -> CheckOutcome {
        let before = Utc::now() - self.retention;
        let store = self.base.store();
        let mut rows_deleted = 0;
        let mut last_error: Option<CheckError> = None;

        for table in Table::ALL {
            let res = retry(
                ctx,
                &self.policy,
                self.policy.ceiling(Phase::Delete),
                table.name(),
                || {
                    let store = Arc::clone(store);
                    async move { store.delete_before(table, before).await }
                },
            )
            .await
            .map_err(|e| CheckError::from_retry(Phase::Delete, e));

            match res {
                Ok(deleted) => rows_deleted += deleted,
                Err(err) if err.is_cancelled() => return abort(&self.base, err),
                Err(err) => {
                    warn!(table = table.name(), "failed to enforce retention: {}", err);
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) => abort(&self.base, err),
            None => {
                debug!(rows_deleted, "retention enforced");
                CheckOutcome::Completed { rows_deleted }
            }
        }
    }

    fn base(&self) -> &BaseCheck {
        &self.base
    }
}
