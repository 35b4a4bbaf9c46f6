//! SQLite storage backend implementation
//!
//! This module provides a SQLite-based implementation of the `MetricStore` trait.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Better concurrency for reads during writes
//! - **Connection pooling**: Checks running in parallel share one pool
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! ## Aggregates
//!
//! Every aggregate column is wrapped in `CAST(.. AS REAL)` so that the
//! decoded type does not depend on whether SQLite picked an integer or a
//! real representation for the result.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, MetricStore, TimeWindow};
use super::error::{StorageError, StorageResult};
use super::schema::{
    DiskIoQuerySet, DiskUsageQuerySet, QuerySet, Table, TrafficQuerySet, UsageQuerySet,
};
use crate::checks::types::CheckResult;

/// SQLite storage backend
///
/// Stores raw samples and per-hour rollups in a local SQLite database file.
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run migrations to create the metric tables
    /// 3. Configure SQLite for concurrent readers (WAL mode, etc.)
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use guardia_checks::storage::sqlite::SqliteBackend;
    /// # async fn example() -> anyhow::Result<()> {
    /// let backend = SqliteBackend::new("./metrics.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    /// SQLite has no unsigned 64-bit integer, counters are stored as i64
    fn counter(table: Table, field: &str, value: u64) -> StorageResult<i64> {
        i64::try_from(value).map_err(|_| {
            StorageError::QueryFailed(format!("{table}.{field} out of range: {value}"))
        })
    }

    fn insert_sql(table: Table) -> &'static str {
        match table {
            Table::Cpu => "INSERT INTO cpu (timestamp, usage) VALUES (?, ?)",
            Table::Memory => "INSERT INTO memory (timestamp, usage) VALUES (?, ?)",
            Table::CpuPerHour => {
                "INSERT INTO cpu_per_hour (timestamp, peak_usage, avg_usage) VALUES (?, ?, ?)"
            }
            Table::MemoryPerHour => {
                "INSERT INTO memory_per_hour (timestamp, peak_usage, avg_usage) VALUES (?, ?, ?)"
            }
            Table::DiskUsage => {
                r#"
                INSERT INTO disk_usage (timestamp, device, mount_point, usage, total, free, used)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#
            }
            Table::DiskUsagePerHour => {
                r#"
                INSERT INTO disk_usage_per_hour (timestamp, device, mount_point, peak_usage, avg_usage)
                VALUES (?, ?, ?, ?, ?)
                "#
            }
            Table::DiskIo => {
                "INSERT INTO disk_io (timestamp, device, read_bytes, write_bytes) VALUES (?, ?, ?, ?)"
            }
            Table::DiskIoPerHour => {
                r#"
                INSERT INTO disk_io_per_hour (
                    timestamp, device, peak_read_bytes, peak_write_bytes,
                    avg_read_bytes, avg_write_bytes
                )
                VALUES (?, ?, ?, ?, ?, ?)
                "#
            }
            Table::Traffic => {
                r#"
                INSERT INTO traffic (
                    timestamp, name, input_pkts, input_bytes, output_pkts, output_bytes
                )
                VALUES (?, ?, ?, ?, ?, ?)
                "#
            }
            Table::TrafficPerHour => {
                r#"
                INSERT INTO traffic_per_hour (
                    timestamp, name,
                    peak_input_pkts, peak_input_bytes, peak_output_pkts, peak_output_bytes,
                    avg_input_pkts, avg_input_bytes, avg_output_pkts, avg_output_bytes
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#
            }
        }
    }

    fn aggregate_sql(table: Table) -> &'static str {
        match table {
            Table::Cpu => {
                r#"
                SELECT CAST(MAX(usage) AS REAL) AS max_usage, CAST(AVG(usage) AS REAL) AS avg_usage
                FROM cpu WHERE timestamp >= ? AND timestamp <= ?
                "#
            }
            Table::Memory => {
                r#"
                SELECT CAST(MAX(usage) AS REAL) AS max_usage, CAST(AVG(usage) AS REAL) AS avg_usage
                FROM memory WHERE timestamp >= ? AND timestamp <= ?
                "#
            }
            Table::CpuPerHour => {
                r#"
                SELECT CAST(MAX(peak_usage) AS REAL) AS max_usage,
                       CAST(AVG(avg_usage) AS REAL) AS avg_usage
                FROM cpu_per_hour WHERE timestamp >= ? AND timestamp <= ?
                "#
            }
            Table::MemoryPerHour => {
                r#"
                SELECT CAST(MAX(peak_usage) AS REAL) AS max_usage,
                       CAST(AVG(avg_usage) AS REAL) AS avg_usage
                FROM memory_per_hour WHERE timestamp >= ? AND timestamp <= ?
                "#
            }
            Table::DiskUsage => {
                r#"
                SELECT device, mount_point,
                       CAST(MAX(usage) AS REAL) AS max_usage,
                       CAST(AVG(usage) AS REAL) AS avg_usage
                FROM disk_usage WHERE timestamp >= ? AND timestamp <= ?
                GROUP BY device, mount_point
                "#
            }
            Table::DiskUsagePerHour => {
                r#"
                SELECT device, mount_point,
                       CAST(MAX(peak_usage) AS REAL) AS max_usage,
                       CAST(AVG(avg_usage) AS REAL) AS avg_usage
                FROM disk_usage_per_hour WHERE timestamp >= ? AND timestamp <= ?
                GROUP BY device, mount_point
                "#
            }
            Table::DiskIo => {
                r#"
                SELECT device,
                       CAST(MAX(read_bytes) AS REAL) AS peak_read_bytes,
                       CAST(MAX(write_bytes) AS REAL) AS peak_write_bytes,
                       CAST(AVG(read_bytes) AS REAL) AS avg_read_bytes,
                       CAST(AVG(write_bytes) AS REAL) AS avg_write_bytes
                FROM disk_io WHERE timestamp >= ? AND timestamp <= ?
                GROUP BY device
                "#
            }
            Table::DiskIoPerHour => {
                r#"
                SELECT device,
                       CAST(MAX(peak_read_bytes) AS REAL) AS peak_read_bytes,
                       CAST(MAX(peak_write_bytes) AS REAL) AS peak_write_bytes,
                       CAST(AVG(avg_read_bytes) AS REAL) AS avg_read_bytes,
                       CAST(AVG(avg_write_bytes) AS REAL) AS avg_write_bytes
                FROM disk_io_per_hour WHERE timestamp >= ? AND timestamp <= ?
                GROUP BY device
                "#
            }
            Table::Traffic => {
                r#"
                SELECT name,
                       CAST(MAX(input_pkts) AS REAL) AS peak_input_pkts,
                       CAST(MAX(input_bytes) AS REAL) AS peak_input_bytes,
                       CAST(MAX(output_pkts) AS REAL) AS peak_output_pkts,
                       CAST(MAX(output_bytes) AS REAL) AS peak_output_bytes,
                       CAST(AVG(input_pkts) AS REAL) AS avg_input_pkts,
                       CAST(AVG(input_bytes) AS REAL) AS avg_input_bytes,
                       CAST(AVG(output_pkts) AS REAL) AS avg_output_pkts,
                       CAST(AVG(output_bytes) AS REAL) AS avg_output_bytes
                FROM traffic WHERE timestamp >= ? AND timestamp <= ?
                GROUP BY name
                "#
            }
            Table::TrafficPerHour => {
                r#"
                SELECT name,
                       CAST(MAX(peak_input_pkts) AS REAL) AS peak_input_pkts,
                       CAST(MAX(peak_input_bytes) AS REAL) AS peak_input_bytes,
                       CAST(MAX(peak_output_pkts) AS REAL) AS peak_output_pkts,
                       CAST(MAX(peak_output_bytes) AS REAL) AS peak_output_bytes,
                       CAST(AVG(avg_input_pkts) AS REAL) AS avg_input_pkts,
                       CAST(AVG(avg_input_bytes) AS REAL) AS avg_input_bytes,
                       CAST(AVG(avg_output_pkts) AS REAL) AS avg_output_pkts,
                       CAST(AVG(avg_output_bytes) AS REAL) AS avg_output_bytes
                FROM traffic_per_hour WHERE timestamp >= ? AND timestamp <= ?
                GROUP BY name
                "#
            }
        }
    }

    /// Decode one aggregate row; `None` for the all-NULL row SQLite returns
    /// for an ungrouped aggregate over an empty window
    fn decode_query_set(table: Table, row: &SqliteRow) -> StorageResult<Option<QuerySet>> {
        let decode = |e: sqlx::Error| StorageError::DecodeFailed {
            table: table.name(),
            message: e.to_string(),
        };

        let query_set = match table {
            Table::Cpu | Table::Memory | Table::CpuPerHour | Table::MemoryPerHour => {
                let max: Option<f64> = row.try_get("max_usage").map_err(decode)?;
                let avg: Option<f64> = row.try_get("avg_usage").map_err(decode)?;
                match (max, avg) {
                    (Some(max), Some(avg)) => QuerySet::Usage(UsageQuerySet { max, avg }),
                    _ => return Ok(None),
                }
            }
            Table::DiskUsage | Table::DiskUsagePerHour => QuerySet::DiskUsage(DiskUsageQuerySet {
                device: row.try_get("device").map_err(decode)?,
                mount_point: row.try_get("mount_point").map_err(decode)?,
                max: row.try_get("max_usage").map_err(decode)?,
                avg: row.try_get("avg_usage").map_err(decode)?,
            }),
            Table::DiskIo | Table::DiskIoPerHour => QuerySet::DiskIo(DiskIoQuerySet {
                device: row.try_get("device").map_err(decode)?,
                peak_read_bytes: row.try_get("peak_read_bytes").map_err(decode)?,
                peak_write_bytes: row.try_get("peak_write_bytes").map_err(decode)?,
                avg_read_bytes: row.try_get("avg_read_bytes").map_err(decode)?,
                avg_write_bytes: row.try_get("avg_write_bytes").map_err(decode)?,
            }),
            Table::Traffic | Table::TrafficPerHour => QuerySet::Traffic(TrafficQuerySet {
                name: row.try_get("name").map_err(decode)?,
                peak_input_pkts: row.try_get("peak_input_pkts").map_err(decode)?,
                peak_input_bytes: row.try_get("peak_input_bytes").map_err(decode)?,
                peak_output_pkts: row.try_get("peak_output_pkts").map_err(decode)?,
                peak_output_bytes: row.try_get("peak_output_bytes").map_err(decode)?,
                avg_input_pkts: row.try_get("avg_input_pkts").map_err(decode)?,
                avg_input_bytes: row.try_get("avg_input_bytes").map_err(decode)?,
                avg_output_pkts: row.try_get("avg_output_pkts").map_err(decode)?,
                avg_output_bytes: row.try_get("avg_output_bytes").map_err(decode)?,
            }),
        };

        Ok(Some(query_set))
    }
}

#[async_trait]
impl MetricStore for SqliteBackend {
    #[instrument(skip(self, rows), fields(table = %table, count = rows.len()))]
    async fn insert_results(&self, table: Table, rows: &[CheckResult]) -> StorageResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        debug!("inserting {} rows into {}", rows.len(), table);

        let sql = Self::insert_sql(table);
        let mut tx = self.pool.begin().await?;

        for row in rows {
            let query = sqlx::query(sql).bind(Self::timestamp_to_millis(&row.timestamp));

            let query = match table {
                Table::Cpu | Table::Memory => query.bind(row.usage),
                Table::CpuPerHour | Table::MemoryPerHour => {
                    query.bind(row.peak_usage).bind(row.avg_usage)
                }
                Table::DiskUsage => query
                    .bind(&row.device)
                    .bind(&row.mount_point)
                    .bind(row.usage)
                    .bind(Self::counter(table, "total", row.total)?)
                    .bind(Self::counter(table, "free", row.free)?)
                    .bind(Self::counter(table, "used", row.used)?),
                Table::DiskUsagePerHour => query
                    .bind(&row.device)
                    .bind(&row.mount_point)
                    .bind(row.peak_usage)
                    .bind(row.avg_usage),
                Table::DiskIo => query
                    .bind(&row.device)
                    .bind(Self::counter(table, "read_bytes", row.read_bytes)?)
                    .bind(Self::counter(table, "write_bytes", row.write_bytes)?),
                Table::DiskIoPerHour => query
                    .bind(&row.device)
                    .bind(Self::counter(table, "peak_read_bytes", row.peak_read_bytes)?)
                    .bind(Self::counter(table, "peak_write_bytes", row.peak_write_bytes)?)
                    .bind(Self::counter(table, "avg_read_bytes", row.avg_read_bytes)?)
                    .bind(Self::counter(table, "avg_write_bytes", row.avg_write_bytes)?),
                Table::Traffic => query
                    .bind(&row.name)
                    .bind(Self::counter(table, "input_pkts", row.input_pkts)?)
                    .bind(Self::counter(table, "input_bytes", row.input_bytes)?)
                    .bind(Self::counter(table, "output_pkts", row.output_pkts)?)
                    .bind(Self::counter(table, "output_bytes", row.output_bytes)?),
                Table::TrafficPerHour => query
                    .bind(&row.name)
                    .bind(Self::counter(table, "peak_input_pkts", row.peak_input_pkts)?)
                    .bind(Self::counter(table, "peak_input_bytes", row.peak_input_bytes)?)
                    .bind(Self::counter(table, "peak_output_pkts", row.peak_output_pkts)?)
                    .bind(Self::counter(table, "peak_output_bytes", row.peak_output_bytes)?)
                    .bind(Self::counter(table, "avg_input_pkts", row.avg_input_pkts)?)
                    .bind(Self::counter(table, "avg_input_bytes", row.avg_input_bytes)?)
                    .bind(Self::counter(table, "avg_output_pkts", row.avg_output_pkts)?)
                    .bind(Self::counter(table, "avg_output_bytes", row.avg_output_bytes)?),
            };

            query.execute(&mut *tx).await?;
        }

        tx.commit().await?;

        debug!("batch insert complete");
        Ok(rows.len() as u64)
    }

    #[instrument(skip(self), fields(table = %table))]
    async fn aggregate(&self, table: Table, window: &TimeWindow) -> StorageResult<Vec<QuerySet>> {
        debug!(
            "aggregating {} from {} to {}",
            table, window.start, window.end
        );

        let rows = sqlx::query(Self::aggregate_sql(table))
            .bind(Self::timestamp_to_millis(&window.start))
            .bind(Self::timestamp_to_millis(&window.end))
            .fetch_all(&self.pool)
            .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(query_set) = Self::decode_query_set(table, row)? {
                results.push(query_set);
            }
        }

        debug!("aggregate returned {} groups", results.len());
        Ok(results)
    }

    #[instrument(skip(self), fields(table = %table))]
    async fn delete_window(&self, table: Table, window: &TimeWindow) -> StorageResult<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE timestamp >= ? AND timestamp <= ?",
            table.name()
        );

        let result = sqlx::query(&sql)
            .bind(Self::timestamp_to_millis(&window.start))
            .bind(Self::timestamp_to_millis(&window.end))
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected();
        debug!("deleted {} rows from {}", deleted, table);
        Ok(deleted)
    }

    #[instrument(skip(self), fields(table = %table, before = %before))]
    async fn delete_before(&self, table: Table, before: DateTime<Utc>) -> StorageResult<u64> {
        let sql = format!("DELETE FROM {} WHERE timestamp < ?", table.name());

        let result = sqlx::query(&sql)
            .bind(Self::timestamp_to_millis(&before))
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            info!("deleted {} expired rows from {}", deleted, table);
        }
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
