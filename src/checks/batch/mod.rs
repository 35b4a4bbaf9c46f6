//! Aggregate-then-purge rollup checks
//!
//! Both tiers follow the same recipe: read a windowed group aggregate from
//! the source table, map every row into the target check type, optionally
//! persist the mapped rows, and purge the source window once. Each storage
//! phase is wrapped in its own [`retry`] call.
//!
//! - [`HourlyCheck`]: raw table -> per-hour table, persisted
//! - [`DailyCheck`]: per-hour table -> buffer only

mod daily;
mod hourly;

pub use daily::DailyCheck;
pub use hourly::HourlyCheck;

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::base::{BaseCheck, CheckOutcome};
use super::error::{CheckError, Phase};
use super::retry::{RetryPolicy, retry};
use super::types::{CheckResult, CheckType};
use crate::storage::{Table, TimeWindow};

/// Width of the hourly rollup window
pub fn hourly_period() -> chrono::Duration {
    chrono::Duration::hours(1)
}

/// Width of the daily rollup window
pub fn daily_period() -> chrono::Duration {
    chrono::Duration::hours(24)
}

/// Retried aggregate of `source` over the trailing `period`, mapped into
/// records of `target`
pub(crate) async fn read_rollup(
    base: &BaseCheck,
    ctx: &CancellationToken,
    policy: &RetryPolicy,
    source: Table,
    target: CheckType,
    period: chrono::Duration,
) -> Result<Vec<CheckResult>, CheckError> {
    let store = base.store();
    let rows = retry(ctx, policy, policy.ceiling(Phase::Get), base.name(), || {
        let store = Arc::clone(store);
        async move {
            let window = TimeWindow::trailing(period);
            store.aggregate(source, &window).await
        }
    })
    .await
    .map_err(|e| CheckError::from_retry(Phase::Get, e))?;

    let timestamp = Utc::now();
    let results = rows
        .iter()
        .map(|row| CheckResult::from_query_set(target, row, timestamp))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(check = base.name(), rows = results.len(), "mapped aggregate rows");
    Ok(results)
}

/// Retried bulk insert of `rows` into `table`
pub(crate) async fn save_rows(
    base: &BaseCheck,
    ctx: &CancellationToken,
    policy: &RetryPolicy,
    table: Table,
    rows: &[CheckResult],
) -> Result<u64, CheckError> {
    let store = base.store();
    retry(ctx, policy, policy.ceiling(Phase::Save), base.name(), || {
        let store = Arc::clone(store);
        async move { store.insert_results(table, rows).await }
    })
    .await
    .map_err(|e| CheckError::from_retry(Phase::Save, e))
}

/// Retried delete of `table` over the trailing `period`
///
/// Called once per execution, after all rows have been mapped.
pub(crate) async fn purge_window(
    base: &BaseCheck,
    ctx: &CancellationToken,
    policy: &RetryPolicy,
    table: Table,
    period: chrono::Duration,
) -> Result<u64, CheckError> {
    let store = base.store();
    let deleted = retry(ctx, policy, policy.ceiling(Phase::Delete), base.name(), || {
        let store = Arc::clone(store);
        async move {
            let window = TimeWindow::trailing(period);
            store.delete_window(table, &window).await
        }
    })
    .await
    .map_err(|e| CheckError::from_retry(Phase::Delete, e))?;

    debug!(check = base.name(), deleted, "purged {}", table);
    Ok(deleted)
}

/// Log and fold an error that ends an execution with nothing enqueued
pub(crate) fn abort(base: &BaseCheck, err: CheckError) -> CheckOutcome {
    if err.is_cancelled() {
        debug!(check = base.name(), "execution cancelled");
    } else {
        error!(check = base.name(), "execution aborted: {}", err);
    }
    CheckOutcome::from_error(err)
}
