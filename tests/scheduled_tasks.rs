use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use stepline::flows::namespaces;
use stepline::flows::scheduled_tasks::{
    CleanupOldData, DailyReportGenerator, HealthMetrics, MetricsSource, SystemHealthCheck, topics,
};
use stepline::runtime::{EventBusConfig, RuntimeConfig, StepRunner};
use stepline::steps::StepRegistry;
use stepline::store::{MemoryStateStore, StateStore};

struct FixedMetrics(HealthMetrics);

impl MetricsSource for FixedMetrics {
    fn sample(&self) -> HealthMetrics {
        self.0.clone()
    }
}

fn healthy_metrics() -> HealthMetrics {
    HealthMetrics {
        cpu: 20.0,
        memory: 35.0,
        disk_space: 50.0,
        active_connections: 12,
        queue_depth: 3,
        response_time_ms: 80,
    }
}

fn degraded_metrics() -> HealthMetrics {
    HealthMetrics {
        cpu: 95.0,
        memory: 90.0,
        disk_space: 95.0,
        active_connections: 900,
        queue_depth: 48,
        response_time_ms: 450,
    }
}

fn runner_with<M: MetricsSource + 'static>(
    metrics: M,
) -> (StepRunner, Arc<MemoryStateStore>) {
    let mut registry = StepRegistry::new();
    registry
        .register_cron(CleanupOldData)
        .unwrap()
        .register_cron(DailyReportGenerator)
        .unwrap()
        .register_cron(SystemHealthCheck::new(metrics))
        .unwrap();
    let store = Arc::new(MemoryStateStore::new());
    let runner = StepRunner::new(
        registry,
        &RuntimeConfig::new().with_event_bus(EventBusConfig::with_memory_sink()),
    )
    .with_store(store.clone());
    (runner, store)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn cleanup_records_results_and_announces_completion() {
    let (mut runner, store) = runner_with(FixedMetrics(healthy_metrics()));
    runner.start();

    runner.run_cron("CleanupOldData").await.unwrap();
    settle().await;

    let cleanup_id = format!("cleanup-{}", Utc::now().format("%Y-%m-%d"));
    let record = store
        .get(namespaces::CLEANUP_LOGS, &cleanup_id)
        .await
        .unwrap()
        .expect("cleanup log keyed by date");
    assert_eq!(record["pipelinesDeleted"], 127);
    assert_eq!(record["reportsDeleted"], 30);
    assert_eq!(record["storageFreedMB"], 245.7);

    let events = runner.memory_sink().unwrap().for_topic(topics::CLEANUP_COMPLETED);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data()["cleanupId"], cleanup_id.as_str());
    assert_eq!(events[0].data()["results"]["pipelinesDeleted"], 127);

    runner.shutdown().await;
}

#[tokio::test]
async fn daily_report_is_stored_and_published() {
    let (mut runner, store) = runner_with(FixedMetrics(healthy_metrics()));
    runner.start();

    runner.run_cron("DailyReportGenerator").await.unwrap();
    settle().await;

    let report_id = format!("report-{}", Utc::now().format("%Y-%m-%d"));
    let report = store
        .get(namespaces::REPORTS, &report_id)
        .await
        .unwrap()
        .expect("report keyed by date");
    assert_eq!(report["summary"]["totalPipelines"], 42);
    assert_eq!(report["topSources"].as_array().unwrap().len(), 3);

    let events = runner
        .memory_sink()
        .unwrap()
        .for_topic(topics::DAILY_REPORT_GENERATED);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data()["reportId"], report_id.as_str());

    runner.shutdown().await;
}

#[tokio::test]
async fn healthy_metrics_complete_without_alerts() {
    let (mut runner, store) = runner_with(FixedMetrics(healthy_metrics()));
    runner.start();

    runner.run_cron("SystemHealthCheck").await.unwrap();
    settle().await;

    let sink = runner.memory_sink().unwrap();
    let completed = sink.for_topic(topics::HEALTH_CHECK_COMPLETED);
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].data()["status"], "healthy");
    assert_eq!(completed[0].data()["alerts"], json!([]));
    assert!(sink.for_topic(topics::HEALTH_CHECK_ALERT).is_empty());

    let keys = store.keys(namespaces::HEALTH_CHECKS);
    assert_eq!(keys.len(), 1);
    assert!(keys[0].starts_with("check-"));

    runner.shutdown().await;
}

#[tokio::test]
async fn degraded_metrics_raise_a_critical_alert() {
    let (mut runner, store) = runner_with(FixedMetrics(degraded_metrics()));
    runner.start();

    runner.run_cron("SystemHealthCheck").await.unwrap();
    settle().await;

    let sink = runner.memory_sink().unwrap();
    let alerts = sink.for_topic(topics::HEALTH_CHECK_ALERT);
    assert_eq!(alerts.len(), 1);
    let alert = alerts[0].data();
    assert_eq!(alert["status"], "degraded");
    assert_eq!(alert["severity"], "critical");
    assert_eq!(alert["alerts"].as_array().unwrap().len(), 4);
    assert!(sink.for_topic(topics::HEALTH_CHECK_COMPLETED).is_empty());

    let keys = store.keys(namespaces::HEALTH_CHECKS);
    assert_eq!(keys.len(), 1);
    let record = store
        .get(namespaces::HEALTH_CHECKS, &keys[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record["status"], "degraded");

    runner.shutdown().await;
}

#[tokio::test]
async fn two_alerts_rate_only_a_warning() {
    let metrics = HealthMetrics {
        cpu: 85.0,
        memory: 40.0,
        disk_space: 50.0,
        active_connections: 10,
        queue_depth: 1,
        response_time_ms: 350,
    };
    let (mut runner, _store) = runner_with(FixedMetrics(metrics));
    runner.start();

    runner.run_cron("SystemHealthCheck").await.unwrap();
    settle().await;

    let alerts = runner.memory_sink().unwrap().for_topic(topics::HEALTH_CHECK_ALERT);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].data()["severity"], "warning");
    assert_eq!(alerts[0].data()["alerts"].as_array().unwrap().len(), 2);

    runner.shutdown().await;
}

#[tokio::test]
async fn cron_schedules_cover_all_three_jobs() {
    let (runner, _store) = runner_with(FixedMetrics(healthy_metrics()));

    let schedules = runner.cron_schedules();
    assert_eq!(
        schedules,
        vec![
            ("CleanupOldData", "0 2 * * 0"),
            ("DailyReportGenerator", "0 9 * * *"),
            ("SystemHealthCheck", "*/5 * * * *"),
        ]
    );
}
