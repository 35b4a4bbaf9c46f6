//! Hourly aggregate-then-purge checks against SQLite

use assert_matches::assert_matches;
use guardia_checks::checks::{CheckError, CheckOutcome, CheckStrategy, CheckType, MetricFamily, Phase, Queue};
use guardia_checks::storage::{QuerySet, Table};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use super::helpers::{ALWAYS, Harness, traffic_raw};

#[tokio::test]
async fn test_traffic_rollup_persists_purges_and_delivers() {
    let mut h = Harness::new().await;
    h.store
        .seed(
            Table::Traffic,
            &[
                traffic_raw("eth0", 1_000, 5),
                traffic_raw("eth0", 3_000, 15),
                traffic_raw("eth0", 2_000, 25),
                traffic_raw("lo", 500, 10),
            ],
        )
        .await;

    let check = h.hourly(MetricFamily::Net);
    let outcome = check.execute(&CancellationToken::new()).await;
    assert_matches!(
        outcome,
        CheckOutcome::Delivered {
            queue: Queue::Success,
            items: 2
        }
    );

    let mut metric = h.receivers.success.recv().await.unwrap();
    assert_eq!(metric.check_type, CheckType::NetPerHour);
    metric.data.sort_by(|a, b| a.name.cmp(&b.name));

    let eth0 = &metric.data[0];
    assert_eq!(eth0.name, "eth0");
    assert_eq!(eth0.peak_input_bytes, 3_000);
    assert_eq!(eth0.avg_input_bytes, 2_000);
    assert_eq!(eth0.peak_input_pkts, 30);
    assert_eq!(eth0.avg_input_pkts, 20);
    assert_eq!(eth0.input_bytes, 0);

    // raw window purged, rollup persisted
    assert!(h.store.peek(Table::Traffic, 1).await.is_empty());
    assert_eq!(h.store.peek(Table::TrafficPerHour, 1).await.len(), 2);
    assert_eq!(h.store.deletes(), 1);
    h.assert_nothing_enqueued();
}

#[tokio::test]
async fn test_rollup_windows_are_one_hour() {
    let h = Harness::new().await;
    let check = h.hourly(MetricFamily::DiskIo);

    check.execute(&CancellationToken::new()).await;

    let windows = h.store.windows();
    assert_eq!(windows.len(), 2);
    for (table, window) in windows {
        assert_eq!(table, Table::DiskIo);
        assert_eq!(window.width(), chrono::Duration::hours(1));
    }
}

#[tokio::test]
async fn test_empty_window_still_delivers() {
    let mut h = Harness::new().await;
    let check = h.hourly(MetricFamily::Cpu);

    let outcome = check.execute(&CancellationToken::new()).await;
    assert_matches!(
        outcome,
        CheckOutcome::Delivered {
            queue: Queue::Success,
            items: 0
        }
    );

    let metric = h.receivers.success.recv().await.unwrap();
    assert_eq!(metric.check_type, CheckType::CpuPerHour);
    assert!(metric.data.is_empty());
}

#[tokio::test]
async fn test_save_failure_enqueues_nothing_and_keeps_raw_rows() {
    let mut h = Harness::new().await;
    h.store
        .seed(Table::Traffic, &[traffic_raw("eth0", 1_000, 5)])
        .await;
    h.store.fail_saves(ALWAYS);

    let check = h.hourly(MetricFamily::Net);
    let outcome = check.execute(&CancellationToken::new()).await;

    assert_matches!(
        outcome,
        CheckOutcome::Aborted(CheckError::RetriesExhausted {
            phase: Phase::Save,
            attempts: 3,
            ..
        })
    );
    assert_eq!(h.store.saves(), 3);
    assert_eq!(h.store.deletes(), 0);
    assert_eq!(h.store.peek(Table::Traffic, 1).await.len(), 1);
    h.assert_nothing_enqueued();
}

#[tokio::test]
async fn test_delete_failure_enqueues_nothing() {
    let mut h = Harness::new().await;
    h.store.fail_deletes(ALWAYS);

    let check = h.hourly(MetricFamily::Memory);
    let outcome = check.execute(&CancellationToken::new()).await;

    assert_matches!(
        outcome,
        CheckOutcome::Aborted(CheckError::RetriesExhausted {
            phase: Phase::Delete,
            ..
        })
    );
    h.assert_nothing_enqueued();
}

#[tokio::test]
async fn test_transient_read_failure_is_absorbed() {
    let mut h = Harness::new().await;
    h.store
        .seed(Table::Traffic, &[traffic_raw("eth0", 1_000, 5)])
        .await;
    h.store.fail_gets(2);

    let check = h.hourly(MetricFamily::Net);
    let outcome = check.execute(&CancellationToken::new()).await;

    assert_eq!(outcome.queue(), Some(Queue::Success));
    assert_eq!(h.store.gets(), 3);

    let metric = h.receivers.success.recv().await.unwrap();
    assert_eq!(metric.data.len(), 1);
}

#[tokio::test]
async fn test_cancelled_context_enqueues_nothing() {
    let mut h = Harness::new().await;
    let ctx = CancellationToken::new();
    ctx.cancel();

    let check = h.hourly(MetricFamily::DiskUsage);
    let outcome = check.execute(&ctx).await;

    assert_matches!(outcome, CheckOutcome::Cancelled);
    assert_eq!(h.store.gets(), 0);
    h.assert_nothing_enqueued();
}

#[tokio::test]
async fn test_rollup_feeds_daily_tier() {
    let mut h = Harness::new().await;
    h.store
        .seed(
            Table::Traffic,
            &[traffic_raw("eth0", 4_000, 5), traffic_raw("eth0", 2_000, 10)],
        )
        .await;

    h.hourly(MetricFamily::Net)
        .execute(&CancellationToken::new())
        .await;
    h.receivers.success.recv().await.unwrap();

    let per_hour = h.store.peek(Table::TrafficPerHour, 24).await;
    assert_matches!(&per_hour[..], [QuerySet::Traffic(row)] if row.peak_input_bytes == 4_000.0);
}
