//! Scheduled maintenance jobs: data cleanup, daily reporting, and system
//! health checks. All three are cron steps fired by an external scheduler
//! through [`StepRunner::run_cron`](crate::runtime::StepRunner::run_cron).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::namespaces;
use crate::steps::{CronStep, StepConfig, StepContext, StepError, Trigger};

pub const FLOW: &str = "scheduled-tasks";

pub mod topics {
    pub const CLEANUP_COMPLETED: &str = "cleanup-completed";
    pub const DAILY_REPORT_GENERATED: &str = "daily-report-generated";
    pub const HEALTH_CHECK_COMPLETED: &str = "health-check-completed";
    pub const HEALTH_CHECK_ALERT: &str = "health-check-alert";
}

/* ---------- cleanup ---------- */

const RETENTION_DAYS: i64 = 30;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResults {
    pub pipelines_deleted: u64,
    pub reports_deleted: u64,
    #[serde(rename = "storageFreedMB")]
    pub storage_freed_mb: f64,
    pub oldest_record_date: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupLogRecord {
    #[serde(flatten)]
    pub results: CleanupResults,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupCompleted {
    pub cleanup_id: String,
    pub results: CleanupResults,
    pub completed_at: DateTime<Utc>,
}

/// Weekly purge of records older than the retention horizon. The deletion
/// itself is simulated; a real backend would sweep its store here.
#[derive(Clone, Copy, Debug, Default)]
pub struct CleanupOldData;

#[async_trait]
impl CronStep for CleanupOldData {
    fn config(&self) -> StepConfig {
        StepConfig {
            name: "CleanupOldData",
            description: "Cleans up pipeline data and reports older than 30 days",
            flow: FLOW,
            emits: &[topics::CLEANUP_COMPLETED],
            trigger: Trigger::Cron {
                schedule: "0 2 * * 0",
            },
        }
    }

    async fn handle(&self, ctx: StepContext) -> Result<(), StepError> {
        let started = Utc::now();
        tracing::info!("starting cleanup job");

        let results = CleanupResults {
            pipelines_deleted: 127,
            reports_deleted: 30,
            storage_freed_mb: 245.7,
            oldest_record_date: started - Duration::days(RETENTION_DAYS),
        };

        let cleanup_id = format!("cleanup-{}", started.format("%Y-%m-%d"));
        let completed_at = Utc::now();
        ctx.set_state(
            namespaces::CLEANUP_LOGS,
            &cleanup_id,
            &CleanupLogRecord {
                results: results.clone(),
                executed_at: started,
                duration_ms: completed_at.signed_duration_since(started).num_milliseconds(),
            },
        )
        .await?;

        tracing::info!(
            cleanup_id,
            pipelines_deleted = results.pipelines_deleted,
            storage_freed_mb = results.storage_freed_mb,
            "cleanup completed"
        );

        ctx.emit(
            topics::CLEANUP_COMPLETED,
            &CleanupCompleted {
                cleanup_id,
                results,
                completed_at,
            },
        )?;
        Ok(())
    }
}

/* ---------- daily report ---------- */

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_pipelines: u64,
    pub successful_pipelines: u64,
    pub failed_pipelines: u64,
    pub total_records_processed: u64,
    pub average_duration_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCount {
    pub source: String,
    pub count: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    pub date: String,
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub top_sources: Vec<SourceCount>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReportGenerated {
    pub report_id: String,
    pub report: DailyReport,
    pub generated_at: DateTime<Utc>,
}

/// Daily summary of pipeline executions. Figures are representative until
/// a metrics backend feeds them.
#[derive(Clone, Copy, Debug, Default)]
pub struct DailyReportGenerator;

#[async_trait]
impl CronStep for DailyReportGenerator {
    fn config(&self) -> StepConfig {
        StepConfig {
            name: "DailyReportGenerator",
            description: "Generates a daily summary report of pipeline executions",
            flow: FLOW,
            emits: &[topics::DAILY_REPORT_GENERATED],
            trigger: Trigger::Cron {
                schedule: "0 9 * * *",
            },
        }
    }

    async fn handle(&self, ctx: StepContext) -> Result<(), StepError> {
        let generated_at = Utc::now();
        let date = generated_at.format("%Y-%m-%d").to_string();
        let report_id = format!("report-{date}");
        tracing::info!(report_id, "starting daily report generation");

        let report = DailyReport {
            date,
            generated_at,
            summary: ReportSummary {
                total_pipelines: 42,
                successful_pipelines: 38,
                failed_pipelines: 4,
                total_records_processed: 15420,
                average_duration_ms: 3450,
            },
            top_sources: vec![
                SourceCount {
                    source: "api.example.com".to_string(),
                    count: 15,
                },
                SourceCount {
                    source: "data.warehouse.com".to_string(),
                    count: 12,
                },
                SourceCount {
                    source: "external.feed.io".to_string(),
                    count: 10,
                },
            ],
        };

        ctx.set_state(namespaces::REPORTS, &report_id, &report).await?;

        tracing::info!(
            report_id,
            total_pipelines = report.summary.total_pipelines,
            "daily report generated"
        );

        ctx.emit(
            topics::DAILY_REPORT_GENERATED,
            &DailyReportGenerated {
                report_id,
                report,
                generated_at,
            },
        )?;
        Ok(())
    }
}

/* ---------- health check ---------- */

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetrics {
    pub cpu: f64,
    pub memory: f64,
    pub disk_space: f64,
    pub active_connections: u64,
    pub queue_depth: u64,
    pub response_time_ms: u64,
}

/// Where the health check samples its metrics from.
pub trait MetricsSource: Send + Sync {
    fn sample(&self) -> HealthMetrics;
}

/// Uniformly random metrics, standing in for a real probe.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimulatedMetrics;

impl MetricsSource for SimulatedMetrics {
    fn sample(&self) -> HealthMetrics {
        let mut rng = rand::rng();
        HealthMetrics {
            cpu: rng.random_range(0.0..100.0),
            memory: rng.random_range(0.0..100.0),
            disk_space: rng.random_range(0.0..100.0),
            active_connections: rng.random_range(0..1000),
            queue_depth: rng.random_range(0..50),
            response_time_ms: rng.random_range(0..500),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: HealthState,
    pub metrics: HealthMetrics,
    pub checked_at: DateTime<Utc>,
    pub alerts: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthAlert {
    #[serde(flatten)]
    pub status: HealthStatus,
    pub severity: AlertSeverity,
}

/// Five-minute health probe. Publishes `health-check-completed` when all
/// metrics are inside their thresholds, `health-check-alert` otherwise.
pub struct SystemHealthCheck<M: MetricsSource> {
    metrics: M,
}

impl<M: MetricsSource> SystemHealthCheck<M> {
    pub fn new(metrics: M) -> Self {
        Self { metrics }
    }
}

impl Default for SystemHealthCheck<SimulatedMetrics> {
    fn default() -> Self {
        Self::new(SimulatedMetrics)
    }
}

#[async_trait]
impl<M: MetricsSource + 'static> CronStep for SystemHealthCheck<M> {
    fn config(&self) -> StepConfig {
        StepConfig {
            name: "SystemHealthCheck",
            description: "Performs system health checks every 5 minutes",
            flow: FLOW,
            emits: &[topics::HEALTH_CHECK_COMPLETED, topics::HEALTH_CHECK_ALERT],
            trigger: Trigger::Cron {
                schedule: "*/5 * * * *",
            },
        }
    }

    async fn handle(&self, ctx: StepContext) -> Result<(), StepError> {
        let checked_at = Utc::now();
        let metrics = self.metrics.sample();

        let mut alerts = Vec::new();
        if metrics.cpu >= 80.0 {
            alerts.push("High CPU usage detected".to_string());
        }
        if metrics.memory >= 85.0 {
            alerts.push("High memory usage detected".to_string());
        }
        if metrics.disk_space >= 90.0 {
            alerts.push("Low disk space".to_string());
        }
        if metrics.response_time_ms >= 300 {
            alerts.push("Slow response times".to_string());
        }

        let status = HealthStatus {
            status: if alerts.is_empty() {
                HealthState::Healthy
            } else {
                HealthState::Degraded
            },
            metrics,
            checked_at,
            alerts,
        };

        let key = format!("check-{}", checked_at.timestamp_millis());
        ctx.set_state(namespaces::HEALTH_CHECKS, &key, &status).await?;

        tracing::info!(
            status = ?status.status,
            alert_count = status.alerts.len(),
            "health check completed"
        );

        if status.alerts.is_empty() {
            ctx.emit(topics::HEALTH_CHECK_COMPLETED, &status)?;
        } else {
            tracing::warn!(alerts = ?status.alerts, "system health degraded");
            let severity = if status.alerts.len() > 2 {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            };
            ctx.emit(topics::HEALTH_CHECK_ALERT, &HealthAlert { status, severity })?;
        }
        Ok(())
    }
}
