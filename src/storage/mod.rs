//! Storage layer for raw samples and rollups
//!
//! The checks only ever talk to the [`MetricStore`] trait, which exposes the
//! three query shapes the pipeline needs (windowed aggregate, windowed
//! delete, bulk insert) plus retention and health helpers.
//!
//! ## Backends
//!
//! - **SQLite** (default, `storage-sqlite` feature): embedded database with
//!   WAL journaling and sqlx migrations
//!
//! ## Usage
//!
//! ```no_run
//! use guardia_checks::storage::{MetricStore, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./metrics.db").await?;
//!     let health = backend.health_check().await?;
//!     println!("{}", health.message);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod schema;

#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthStatus, MetricStore, TimeWindow};
pub use error::{StorageError, StorageResult};
pub use schema::{
    DiskIoQuerySet, DiskUsageQuerySet, QuerySet, Table, TrafficQuerySet, UsageQuerySet,
};
