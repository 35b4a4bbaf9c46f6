//! Storage backend trait definition
//!
//! This module defines the `MetricStore` trait the checks are written
//! against. The pipeline needs exactly three query shapes per table:
//! a windowed group aggregate, a windowed bulk delete and a bulk insert.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::error::StorageResult;
use super::schema::{QuerySet, Table};
use crate::checks::types::CheckResult;

/// Inclusive time range `[start, end]` a query or delete operates over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Start of time range (inclusive)
    pub start: DateTime<Utc>,

    /// End of time range (inclusive)
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The window `[now - period, now]`, evaluated at the time of the call
    pub fn trailing(period: Duration) -> Self {
        let end = Utc::now();
        Self {
            start: end - period,
            end,
        }
    }

    pub fn width(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Storage handle shared by all checks
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`: every check holds the same
/// handle and several checks may run against it at once.
///
/// ## Atomicity
///
/// Only `insert_results` is atomic on its own. The pipeline never assumes
/// that an aggregate and the following delete see the same rows.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Insert a batch of records into `table` in one write
    ///
    /// Only the columns owned by the table's check type are read from each
    /// record. An empty batch is a no-op. Returns the number of rows written.
    async fn insert_results(&self, table: Table, rows: &[CheckResult]) -> StorageResult<u64>;

    /// Group aggregate (max and mean) of `table` over `window`
    ///
    /// Returns one row per group key; single-row families return no rows
    /// when the window is empty.
    async fn aggregate(&self, table: Table, window: &TimeWindow) -> StorageResult<Vec<QuerySet>>;

    /// Delete every row of `table` inside `window`
    ///
    /// Returns the number of rows deleted. Deleting an empty window is not
    /// an error.
    async fn delete_window(&self, table: Table, window: &TimeWindow) -> StorageResult<u64>;

    /// Delete every row of `table` older than `before`
    ///
    /// Used for retention enforcement by the cleanup check.
    async fn delete_before(&self, table: Table, before: DateTime<Utc>) -> StorageResult<u64>;

    /// Check backend health
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
