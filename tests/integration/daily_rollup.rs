//! Daily rollup checks and their routing

use assert_matches::assert_matches;
use guardia_checks::checks::{
    CheckError, CheckOutcome, CheckStrategy, CheckType, MetricData, MetricFamily, Phase, Queue,
};
use guardia_checks::storage::Table;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use super::helpers::{ALWAYS, Harness, disk_io_hourly, disk_usage_hourly};

#[tokio::test]
async fn test_sda1_daily_disk_usage() {
    let mut h = Harness::new().await;
    h.store
        .seed(
            Table::DiskUsagePerHour,
            &[
                disk_usage_hourly("sda1", 40.0, 60),
                disk_usage_hourly("sda1", 55.0, 120),
                disk_usage_hourly("sda1", 70.0, 180),
            ],
        )
        .await;

    let check = h.daily(MetricFamily::DiskUsage);
    let outcome = check.execute(&CancellationToken::new()).await;
    assert_eq!(outcome.queue(), Some(Queue::Success));

    let metric = h.receivers.success.recv().await.unwrap();
    assert_eq!(metric.check_type, CheckType::DiskUsagePerDay);
    assert_eq!(metric.data.len(), 1);

    let sda1 = &metric.data[0];
    assert_eq!(sda1.device, "sda1");
    assert_eq!(sda1.mount_point, "/");
    assert_eq!(sda1.peak_usage, 70.0);
    assert_eq!(sda1.avg_usage, 55.0);

    assert!(h.store.peek(Table::DiskUsagePerHour, 24).await.is_empty());
    assert_eq!(h.store.deletes(), 1);
    h.assert_nothing_enqueued();
}

#[tokio::test]
async fn test_empty_window_is_a_valid_success() {
    let mut h = Harness::new().await;

    let check = h.daily(MetricFamily::Memory);
    let outcome = check.execute(&CancellationToken::new()).await;

    assert_matches!(
        outcome,
        CheckOutcome::Delivered {
            queue: Queue::Success,
            items: 0
        }
    );
    assert_eq!(
        h.receivers.success.recv().await.unwrap(),
        MetricData::empty(CheckType::MemoryPerDay)
    );
}

#[tokio::test]
async fn test_one_delete_regardless_of_row_count() {
    let mut h = Harness::new().await;
    h.store
        .seed(
            Table::DiskIoPerHour,
            &[
                disk_io_hourly("sda", 1_000, 60),
                disk_io_hourly("sdb", 2_000, 60),
                disk_io_hourly("nvme0n1", 3_000, 60),
                disk_io_hourly("nvme0n1", 5_000, 120),
            ],
        )
        .await;

    let check = h.daily(MetricFamily::DiskIo);
    check.execute(&CancellationToken::new()).await;

    let metric = h.receivers.success.recv().await.unwrap();
    assert_eq!(metric.data.len(), 3);
    assert_eq!(h.store.gets(), 1);
    assert_eq!(h.store.deletes(), 1);

    let nvme = metric
        .data
        .iter()
        .find(|r| r.device == "nvme0n1")
        .unwrap();
    assert_eq!(nvme.peak_read_bytes, 5_000);
    // mean of 1500 and 2500
    assert_eq!(nvme.avg_read_bytes, 2_000);
}

#[tokio::test]
async fn test_daily_windows_are_one_day() {
    let h = Harness::new().await;

    h.daily(MetricFamily::Net)
        .execute(&CancellationToken::new())
        .await;

    let windows = h.store.windows();
    assert_eq!(windows.len(), 2);
    for (table, window) in windows {
        assert_eq!(table, Table::TrafficPerHour);
        assert_eq!(window.width(), chrono::Duration::hours(24));
    }
}

#[tokio::test]
async fn test_read_failure_enqueues_nothing() {
    let mut h = Harness::new().await;
    h.store
        .seed(Table::DiskUsagePerHour, &[disk_usage_hourly("sda1", 40.0, 60)])
        .await;
    h.store.fail_gets(ALWAYS);

    let check = h.daily(MetricFamily::DiskUsage);
    let outcome = check.execute(&CancellationToken::new()).await;

    assert_matches!(
        outcome,
        CheckOutcome::Aborted(CheckError::RetriesExhausted {
            phase: Phase::Get,
            attempts: 4,
            ..
        })
    );
    assert_eq!(h.store.deletes(), 0);
    assert_eq!(h.store.peek(Table::DiskUsagePerHour, 24).await.len(), 1);
    h.assert_nothing_enqueued();
}

#[tokio::test]
async fn test_delete_failure_routes_mapped_metric_to_failure_queue() {
    let mut h = Harness::new().await;
    h.store
        .seed(Table::DiskUsagePerHour, &[disk_usage_hourly("sda1", 40.0, 60)])
        .await;
    h.store.fail_deletes(ALWAYS);

    let check = h.daily(MetricFamily::DiskUsage);
    let outcome = check.execute(&CancellationToken::new()).await;

    assert_matches!(
        outcome,
        CheckOutcome::Delivered {
            queue: Queue::Failure,
            items: 1
        }
    );
    assert_eq!(h.store.deletes(), 3);

    let metric = h.receivers.failure.recv().await.unwrap();
    assert_eq!(metric.check_type, CheckType::DiskUsagePerDay);
    assert_eq!(metric.data[0].peak_usage, 40.0);
    h.assert_nothing_enqueued();
}

#[tokio::test]
async fn test_transient_delete_failure_still_succeeds() {
    let mut h = Harness::new().await;
    h.store
        .seed(Table::DiskUsagePerHour, &[disk_usage_hourly("sda1", 40.0, 60)])
        .await;
    h.store.fail_deletes(1);

    let check = h.daily(MetricFamily::DiskUsage);
    let outcome = check.execute(&CancellationToken::new()).await;

    assert_eq!(outcome.queue(), Some(Queue::Success));
    assert_eq!(h.store.deletes(), 2);
    assert!(h.store.peek(Table::DiskUsagePerHour, 24).await.is_empty());
}

#[tokio::test]
async fn test_second_run_on_emptied_window_is_a_noop() {
    let mut h = Harness::new().await;
    h.store
        .seed(Table::DiskUsagePerHour, &[disk_usage_hourly("sda1", 40.0, 60)])
        .await;

    let check = h.daily(MetricFamily::DiskUsage);
    check.execute(&CancellationToken::new()).await;
    let outcome = check.execute(&CancellationToken::new()).await;

    assert_matches!(
        outcome,
        CheckOutcome::Delivered {
            queue: Queue::Success,
            items: 0
        }
    );
    assert_eq!(h.receivers.success.recv().await.unwrap().data.len(), 1);
    assert!(h.receivers.success.recv().await.unwrap().data.is_empty());
}
