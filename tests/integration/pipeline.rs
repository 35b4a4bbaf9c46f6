//! Realtime sampling, retention and delivery through the uplink

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use guardia_checks::checks::{
    CheckError, CheckOutcome, CheckResult, CheckStrategy, CheckType, CleanupCheck,
    MetricFamily, Phase, Queue, RealtimeCheck, RetryPolicy,
};
use guardia_checks::collect::Sampler;
use guardia_checks::storage::Table;
use guardia_checks::{HttpSink, Uplink};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::helpers::{ALWAYS, Harness, test_policy, traffic_raw};

struct InterfaceSampler {
    bytes: u64,
}

impl Sampler for InterfaceSampler {
    fn family(&self) -> MetricFamily {
        MetricFamily::Net
    }

    fn sample(&mut self) -> anyhow::Result<Vec<CheckResult>> {
        self.bytes += 1_000;
        Ok(vec![CheckResult {
            timestamp: Utc::now(),
            name: "eth0".to_string(),
            input_bytes: self.bytes,
            input_pkts: self.bytes / 100,
            ..Default::default()
        }])
    }
}

fn realtime(h: &Harness) -> RealtimeCheck {
    RealtimeCheck::with_sampler(
        MetricFamily::Net,
        h.args(CheckType::Net),
        test_policy(),
        Box::new(InterfaceSampler { bytes: 0 }),
    )
}

#[tokio::test]
async fn test_samples_roll_up_into_hour_and_day() {
    let mut h = Harness::new().await;
    let ctx = CancellationToken::new();

    let sampler = realtime(&h);
    for _ in 0..3 {
        assert_eq!(sampler.execute(&ctx).await.queue(), Some(Queue::Success));
    }

    let hourly = h.hourly(MetricFamily::Net);
    assert_eq!(hourly.execute(&ctx).await.queue(), Some(Queue::Success));

    let daily = h.daily(MetricFamily::Net);
    assert_eq!(daily.execute(&ctx).await.queue(), Some(Queue::Success));

    let mut delivered = Vec::new();
    while let Ok(metric) = h.receivers.success.try_recv() {
        delivered.push(metric);
    }
    let types: Vec<_> = delivered.iter().map(|m| m.check_type).collect();
    assert_eq!(
        types,
        vec![
            CheckType::Net,
            CheckType::Net,
            CheckType::Net,
            CheckType::NetPerHour,
            CheckType::NetPerDay,
        ]
    );

    let day = &delivered[4].data[0];
    assert_eq!(day.peak_input_bytes, 3_000);
    assert_eq!(day.avg_input_bytes, 2_000);

    assert!(h.store.peek(Table::Traffic, 1).await.is_empty());
    assert!(h.store.peek(Table::TrafficPerHour, 24).await.is_empty());
}

#[tokio::test]
async fn test_realtime_save_failure_reports_sample() {
    let mut h = Harness::new().await;
    h.store.fail_saves(ALWAYS);

    let outcome = realtime(&h).execute(&CancellationToken::new()).await;
    assert_matches!(
        outcome,
        CheckOutcome::Delivered {
            queue: Queue::Failure,
            items: 1
        }
    );

    let metric = h.receivers.failure.recv().await.unwrap();
    assert_eq!(metric.data[0].input_bytes, 1_000);
    h.assert_nothing_enqueued();
}

#[tokio::test]
async fn test_cleanup_enforces_retention() {
    let mut h = Harness::new().await;
    h.store
        .seed(
            Table::Traffic,
            &[traffic_raw("eth0", 1_000, 5), traffic_raw("eth0", 1_000, 60 * 72)],
        )
        .await;

    let cleanup = CleanupCheck::new(
        h.args(CheckType::Cleanup),
        test_policy(),
        chrono::Duration::hours(48),
    );
    let outcome = cleanup.execute(&CancellationToken::new()).await;

    assert_matches!(outcome, CheckOutcome::Completed { rows_deleted: 1 });
    assert_eq!(h.store.peek(Table::Traffic, 24 * 7).await.len(), 1);
    h.assert_nothing_enqueued();
}

#[tokio::test]
async fn test_cleanup_continues_past_failing_table() {
    let mut h = Harness::new().await;
    h.store
        .seed(Table::TrafficPerHour, &[traffic_raw("eth0", 1_000, 60 * 72)])
        .await;
    h.store.fail_deletes(1);

    let policy = RetryPolicy {
        max_delete_retries: 0,
        ..test_policy()
    };
    let cleanup = CleanupCheck::new(h.args(CheckType::Cleanup), policy, chrono::Duration::hours(48));
    let outcome = cleanup.execute(&CancellationToken::new()).await;

    assert_matches!(
        outcome,
        CheckOutcome::Aborted(CheckError::RetriesExhausted {
            phase: Phase::Delete,
            ..
        })
    );
    // the per-hour tables come after the failing one
    assert!(h.store.peek(Table::TrafficPerHour, 24 * 7).await.is_empty());
    h.assert_nothing_enqueued();
}

#[tokio::test]
async fn test_cancel_during_retry_sleep() {
    let mut h = Harness::new().await;
    h.store.fail_gets(ALWAYS);

    let policy = RetryPolicy {
        delay: Duration::from_secs(30),
        max_delay: Duration::from_secs(30),
        ..test_policy()
    };
    let check = Arc::new(guardia_checks::checks::HourlyCheck::new(
        MetricFamily::Cpu,
        h.args(CheckType::CpuPerHour),
        policy,
    ));

    let trigger = CancellationToken::new();
    let ctx = trigger.child_token();
    let task = tokio::spawn({
        let check = check.clone();
        async move { check.execute(&ctx).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    trigger.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("cancellation should interrupt the backoff")
        .unwrap();
    assert_matches!(outcome, CheckOutcome::Cancelled);
    assert_eq!(h.store.gets(), 1);
    h.assert_nothing_enqueued();
}

#[tokio::test]
async fn test_uplink_ships_both_queues() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({ "status": "success" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({ "status": "failure" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let h = Harness::new().await;
    let ctx = CancellationToken::new();

    realtime(&h).execute(&ctx).await;
    h.store.fail_gets(ALWAYS);
    h.daily(MetricFamily::Net).execute(&ctx).await;
    h.store.fail_gets(0);
    h.store.fail_deletes(ALWAYS);
    h.daily(MetricFamily::Cpu).execute(&ctx).await;

    let Harness {
        buffer, receivers, ..
    } = h;
    drop(buffer);

    let sink = HttpSink::new(mock_server.uri(), Some("token".to_string())).unwrap();
    let delivered = Uplink::new(receivers, sink).run(ctx).await;
    assert_eq!(delivered, 2);
}
