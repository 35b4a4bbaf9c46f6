//! Helper functions for integration tests

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use guardia_checks::checks::{
    BufferReceivers, CheckArgs, CheckBuffer, CheckResult, CheckType, DailyCheck, HourlyCheck,
    MetricFamily, RetryPolicy,
};
use guardia_checks::storage::sqlite::SqliteBackend;
use guardia_checks::storage::{
    HealthStatus, MetricStore, QuerySet, StorageError, StorageResult, Table, TimeWindow,
};
use tempfile::TempDir;

/// Failures injected by default when a phase is told to always fail
pub const ALWAYS: u32 = u32::MAX;

/// Retry policy that keeps the tests fast
pub fn test_policy() -> RetryPolicy {
    RetryPolicy {
        delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        max_retry_time: Duration::from_secs(5),
        jitter: 0.0,
        ..Default::default()
    }
}

/// SQLite store that fails a configurable number of calls per phase
/// and records what the checks asked for
pub struct FlakyStore {
    inner: SqliteBackend,
    fail_get: AtomicU32,
    fail_save: AtomicU32,
    fail_delete: AtomicU32,
    pub get_calls: AtomicU32,
    pub save_calls: AtomicU32,
    pub delete_calls: AtomicU32,
    windows: Mutex<Vec<(Table, TimeWindow)>>,
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
            0 => None,
            ALWAYS => Some(ALWAYS),
            n => Some(n - 1),
        })
        .is_ok()
}

fn injected(phase: &str) -> StorageError {
    StorageError::QueryFailed(format!("injected {phase} failure"))
}

impl FlakyStore {
    pub async fn new() -> (TempDir, Arc<FlakyStore>) {
        let dir = tempfile::tempdir().unwrap();
        let inner = SqliteBackend::new(dir.path().join("metrics.db")).await.unwrap();
        let store = FlakyStore {
            inner,
            fail_get: AtomicU32::new(0),
            fail_save: AtomicU32::new(0),
            fail_delete: AtomicU32::new(0),
            get_calls: AtomicU32::new(0),
            save_calls: AtomicU32::new(0),
            delete_calls: AtomicU32::new(0),
            windows: Mutex::new(Vec::new()),
        };
        (dir, Arc::new(store))
    }

    pub fn fail_gets(&self, n: u32) {
        self.fail_get.store(n, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, n: u32) {
        self.fail_save.store(n, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, n: u32) {
        self.fail_delete.store(n, Ordering::SeqCst);
    }

    pub fn gets(&self) -> u32 {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> u32 {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Windows passed to aggregate and delete calls, in call order
    pub fn windows(&self) -> Vec<(Table, TimeWindow)> {
        self.windows.lock().unwrap().clone()
    }

    /// Write rows straight into the backing database
    pub async fn seed(&self, table: Table, rows: &[CheckResult]) {
        self.inner.insert_results(table, rows).await.unwrap();
    }

    /// Aggregate of `table` over the trailing `hours`, bypassing injection
    pub async fn peek(&self, table: Table, hours: i64) -> Vec<QuerySet> {
        self.inner
            .aggregate(table, &TimeWindow::trailing(chrono::Duration::hours(hours)))
            .await
            .unwrap()
    }
}

#[async_trait]
impl MetricStore for FlakyStore {
    async fn insert_results(&self, table: Table, rows: &[CheckResult]) -> StorageResult<u64> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.fail_save) {
            return Err(injected("save"));
        }
        self.inner.insert_results(table, rows).await
    }

    async fn aggregate(&self, table: Table, window: &TimeWindow) -> StorageResult<Vec<QuerySet>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.windows.lock().unwrap().push((table, *window));
        if take_failure(&self.fail_get) {
            return Err(injected("get"));
        }
        self.inner.aggregate(table, window).await
    }

    async fn delete_window(&self, table: Table, window: &TimeWindow) -> StorageResult<u64> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.windows.lock().unwrap().push((table, *window));
        if take_failure(&self.fail_delete) {
            return Err(injected("delete"));
        }
        self.inner.delete_window(table, window).await
    }

    async fn delete_before(&self, table: Table, before: DateTime<Utc>) -> StorageResult<u64> {
        if take_failure(&self.fail_delete) {
            return Err(injected("delete"));
        }
        self.inner.delete_before(table, before).await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.inner.health_check().await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }
}

/// Store, buffer and receivers wired together for one test
pub struct Harness {
    _dir: TempDir,
    pub store: Arc<FlakyStore>,
    pub buffer: CheckBuffer,
    pub receivers: BufferReceivers,
}

impl Harness {
    pub async fn new() -> Self {
        let (dir, store) = FlakyStore::new().await;
        let (buffer, receivers) = CheckBuffer::new(8);
        Self {
            _dir: dir,
            store,
            buffer,
            receivers,
        }
    }

    pub fn args(&self, check_type: CheckType) -> CheckArgs {
        CheckArgs {
            name: check_type.to_string(),
            interval: Duration::from_secs(60),
            buffer: self.buffer.clone(),
            store: self.store.clone(),
        }
    }

    pub fn hourly(&self, family: MetricFamily) -> HourlyCheck {
        HourlyCheck::new(family, self.args(family.hourly_type()), test_policy())
    }

    pub fn daily(&self, family: MetricFamily) -> DailyCheck {
        DailyCheck::new(family, self.args(family.daily_type()), test_policy())
    }

    pub fn assert_nothing_enqueued(&mut self) {
        assert!(self.receivers.success.try_recv().is_err(), "success queue not empty");
        assert!(self.receivers.failure.try_recv().is_err(), "failure queue not empty");
    }
}

pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::minutes(minutes)
}

pub fn disk_usage_hourly(device: &str, usage: f64, minutes: i64) -> CheckResult {
    CheckResult {
        timestamp: minutes_ago(minutes),
        device: device.to_string(),
        mount_point: "/".to_string(),
        peak_usage: usage,
        avg_usage: usage,
        ..Default::default()
    }
}

pub fn traffic_raw(name: &str, bytes: u64, minutes: i64) -> CheckResult {
    CheckResult {
        timestamp: minutes_ago(minutes),
        name: name.to_string(),
        input_pkts: bytes / 100,
        input_bytes: bytes,
        output_pkts: bytes / 100,
        output_bytes: bytes,
        ..Default::default()
    }
}

pub fn disk_io_hourly(device: &str, bytes: u64, minutes: i64) -> CheckResult {
    CheckResult {
        timestamp: minutes_ago(minutes),
        device: device.to_string(),
        peak_read_bytes: bytes,
        peak_write_bytes: bytes,
        avg_read_bytes: bytes / 2,
        avg_write_bytes: bytes / 2,
        ..Default::default()
    }
}
