//! Four-stage data pipeline: fetch -> transform -> validate -> store.
//!
//! A request to [`FetchData`] starts an instance; each later stage is an
//! event step chained off the previous stage's topic. Every stage replaces
//! the instance's record in the `pipelines` namespace with its own view,
//! so the record always reflects the furthest stage reached.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::namespaces;
use crate::dispatch::dispatcher::round2;
use crate::steps::{ApiStep, EventStep, StepConfig, StepContext, StepError, Trigger};
use crate::utils::workflow_instance_id;

pub const FLOW: &str = "data-processing-pipeline";

pub mod topics {
    pub const DATA_FETCHED: &str = "data-fetched";
    pub const DATA_TRANSFORMED: &str = "data-transformed";
    pub const DATA_VALIDATED: &str = "data-validated";
    pub const DATA_VALIDATION_FAILED: &str = "data-validation-failed";
    pub const PIPELINE_COMPLETED: &str = "pipeline-completed";
}

/* ---------- payload types ---------- */

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecord {
    pub id: u64,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    High,
    Low,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformedRecord {
    pub id: u64,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    /// `value / 100`, rounded to 2 decimals.
    pub normalized_value: f64,
    pub category: Category,
    pub processed_by: String,
    pub transformed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub source: String,
    pub batch_size: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponse {
    pub pipeline_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFetched {
    pub pipeline_id: String,
    pub source: String,
    pub data: Vec<SourceRecord>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTransformed {
    pub pipeline_id: String,
    pub source: String,
    pub data: Vec<TransformedRecord>,
    pub fetched_at: DateTime<Utc>,
    pub transformed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidRecord {
    pub record: TransformedRecord,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStats {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    /// `valid / total * 100`; 0.0 when the batch was empty.
    pub validation_rate: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataValidated {
    pub pipeline_id: String,
    pub source: String,
    pub data: Vec<TransformedRecord>,
    pub invalid_records: Vec<InvalidRecord>,
    pub fetched_at: DateTime<Utc>,
    pub transformed_at: DateTime<Utc>,
    pub validated_at: DateTime<Utc>,
    pub stats: ValidationStats,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailed {
    pub pipeline_id: String,
    pub source: String,
    pub invalid_records: Vec<InvalidRecord>,
    pub reason: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineCompleted {
    pub pipeline_id: String,
    pub source: String,
    pub records_stored: usize,
    pub stats: ValidationStats,
    pub duration_ms: i64,
    pub completed_at: DateTime<Utc>,
}

/* ---------- state records ---------- */

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Fetching,
    Transforming,
    Validating,
    Validated,
    Completed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchingRecord {
    pub status: PipelineStatus,
    pub source: String,
    pub batch_size: usize,
    pub started_at: DateTime<Utc>,
    pub records_fetched: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformingRecord {
    pub status: PipelineStatus,
    pub source: String,
    pub records_fetched: usize,
    pub transform_started_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatingRecord {
    pub status: PipelineStatus,
    pub source: String,
    pub records_to_validate: usize,
    pub validation_started_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedRecord {
    pub status: PipelineStatus,
    pub source: String,
    pub total_records: usize,
    pub valid_records: usize,
    pub invalid_records: usize,
    pub validation_rate: f64,
    pub validated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageMetadata {
    pub source: String,
    pub record_count: usize,
    pub stored_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDataRecord {
    pub data: Vec<TransformedRecord>,
    pub metadata: StorageMetadata,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTimeline {
    pub fetched_at: DateTime<Utc>,
    pub transformed_at: DateTime<Utc>,
    pub validated_at: DateTime<Utc>,
    pub stored_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedRecord {
    pub status: PipelineStatus,
    pub source: String,
    pub stats: ValidationStats,
    pub invalid_records: usize,
    pub storage_key: String,
    pub timeline: PipelineTimeline,
    pub duration_ms: i64,
    pub completed_at: DateTime<Utc>,
}

/* ---------- steps ---------- */

/// Stage 1: accepts a fetch request, synthesizes a batch of source
/// records, and kicks off the instance.
#[derive(Clone, Copy, Debug, Default)]
pub struct FetchData;

#[async_trait]
impl ApiStep for FetchData {
    type Request = FetchRequest;
    type Response = FetchResponse;

    fn config(&self) -> StepConfig {
        StepConfig {
            name: "FetchData",
            description: "Initiates the data pipeline: fetches a batch of source records",
            flow: FLOW,
            emits: &[topics::DATA_FETCHED],
            trigger: Trigger::Api {
                method: "POST",
                path: "/pipeline/fetch",
            },
        }
    }

    async fn handle(
        &self,
        request: FetchRequest,
        ctx: StepContext,
    ) -> Result<FetchResponse, StepError> {
        let pipeline_id = workflow_instance_id("pipeline");
        tracing::info!(
            pipeline_id,
            source = request.source,
            batch_size = request.batch_size,
            "starting data fetch"
        );

        // Scoped so the thread-local rng never lives across an await.
        let data: Vec<SourceRecord> = {
            let mut rng = rand::rng();
            (0..request.batch_size)
                .map(|i| SourceRecord {
                    id: i as u64 + 1,
                    value: rng.random_range(0.0..100.0),
                    timestamp: Utc::now(),
                })
                .collect()
        };

        ctx.set_state(
            namespaces::PIPELINES,
            &pipeline_id,
            &FetchingRecord {
                status: PipelineStatus::Fetching,
                source: request.source.clone(),
                batch_size: request.batch_size,
                started_at: Utc::now(),
                records_fetched: data.len(),
            },
        )
        .await?;

        let record_count = data.len();
        ctx.emit(
            topics::DATA_FETCHED,
            &DataFetched {
                pipeline_id: pipeline_id.clone(),
                source: request.source.clone(),
                data,
                fetched_at: Utc::now(),
            },
        )?;

        tracing::info!(pipeline_id, record_count, "data fetched");
        Ok(FetchResponse {
            message: format!("Fetched {record_count} records from {}", request.source),
            pipeline_id,
            status: "processing".to_string(),
        })
    }
}

/// Stage 2: normalizes values and annotates each record.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransformData;

#[async_trait]
impl EventStep for TransformData {
    type Input = DataFetched;

    fn config(&self) -> StepConfig {
        StepConfig {
            name: "TransformData",
            description: "Normalizes and annotates fetched records",
            flow: FLOW,
            emits: &[topics::DATA_TRANSFORMED],
            trigger: Trigger::Event {
                subscribes: &[topics::DATA_FETCHED],
            },
        }
    }

    async fn handle(&self, input: DataFetched, ctx: StepContext) -> Result<(), StepError> {
        tracing::info!(
            pipeline_id = input.pipeline_id,
            record_count = input.data.len(),
            "starting transformation"
        );

        ctx.set_state(
            namespaces::PIPELINES,
            &input.pipeline_id,
            &TransformingRecord {
                status: PipelineStatus::Transforming,
                source: input.source.clone(),
                records_fetched: input.data.len(),
                transform_started_at: Utc::now(),
            },
        )
        .await?;

        let transformed: Vec<TransformedRecord> = input
            .data
            .into_iter()
            .map(|record| TransformedRecord {
                normalized_value: round2(record.value / 100.0),
                category: if record.value > 50.0 {
                    Category::High
                } else {
                    Category::Low
                },
                processed_by: "TransformData".to_string(),
                transformed_at: Utc::now(),
                id: record.id,
                value: record.value,
                timestamp: record.timestamp,
            })
            .collect();

        ctx.emit(
            topics::DATA_TRANSFORMED,
            &DataTransformed {
                pipeline_id: input.pipeline_id,
                source: input.source,
                data: transformed,
                fetched_at: input.fetched_at,
                transformed_at: Utc::now(),
            },
        )?;
        Ok(())
    }
}

/// Stage 3: splits the batch into valid and invalid records and branches
/// the flow on the outcome.
#[derive(Clone, Copy, Debug, Default)]
pub struct ValidateData;

impl ValidateData {
    fn is_valid(record: &TransformedRecord) -> bool {
        record.id > 0 && record.value >= 0.0
    }
}

#[async_trait]
impl EventStep for ValidateData {
    type Input = DataTransformed;

    fn config(&self) -> StepConfig {
        StepConfig {
            name: "ValidateData",
            description: "Validates transformed records and branches on the outcome",
            flow: FLOW,
            emits: &[topics::DATA_VALIDATED, topics::DATA_VALIDATION_FAILED],
            trigger: Trigger::Event {
                subscribes: &[topics::DATA_TRANSFORMED],
            },
        }
    }

    async fn handle(&self, input: DataTransformed, ctx: StepContext) -> Result<(), StepError> {
        ctx.set_state(
            namespaces::PIPELINES,
            &input.pipeline_id,
            &ValidatingRecord {
                status: PipelineStatus::Validating,
                source: input.source.clone(),
                records_to_validate: input.data.len(),
                validation_started_at: Utc::now(),
            },
        )
        .await?;

        let total = input.data.len();
        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        for record in input.data {
            if Self::is_valid(&record) {
                valid.push(record);
            } else {
                invalid.push(InvalidRecord {
                    record,
                    reason: "Failed validation checks".to_string(),
                });
            }
        }

        let validation_rate = if total == 0 {
            0.0
        } else {
            valid.len() as f64 / total as f64 * 100.0
        };

        tracing::info!(
            pipeline_id = input.pipeline_id,
            total,
            valid = valid.len(),
            invalid = invalid.len(),
            validation_rate,
            "validation complete"
        );

        ctx.set_state(
            namespaces::PIPELINES,
            &input.pipeline_id,
            &ValidatedRecord {
                status: PipelineStatus::Validated,
                source: input.source.clone(),
                total_records: total,
                valid_records: valid.len(),
                invalid_records: invalid.len(),
                validation_rate,
                validated_at: Utc::now(),
            },
        )
        .await?;

        if valid.is_empty() {
            ctx.emit(
                topics::DATA_VALIDATION_FAILED,
                &ValidationFailed {
                    pipeline_id: input.pipeline_id,
                    source: input.source,
                    invalid_records: invalid,
                    reason: "All records failed validation".to_string(),
                },
            )?;
        } else {
            let stats = ValidationStats {
                total,
                valid: valid.len(),
                invalid: invalid.len(),
                validation_rate,
            };
            ctx.emit(
                topics::DATA_VALIDATED,
                &DataValidated {
                    pipeline_id: input.pipeline_id,
                    source: input.source,
                    data: valid,
                    invalid_records: invalid,
                    fetched_at: input.fetched_at,
                    transformed_at: input.transformed_at,
                    validated_at: Utc::now(),
                    stats,
                },
            )?;
        }
        Ok(())
    }
}

/// Stage 4: persists valid records and finalizes the instance.
#[derive(Clone, Copy, Debug, Default)]
pub struct StoreData;

#[async_trait]
impl EventStep for StoreData {
    type Input = DataValidated;

    fn config(&self) -> StepConfig {
        StepConfig {
            name: "StoreData",
            description: "Stores validated records and completes the pipeline",
            flow: FLOW,
            emits: &[topics::PIPELINE_COMPLETED],
            trigger: Trigger::Event {
                subscribes: &[topics::DATA_VALIDATED],
            },
        }
    }

    async fn handle(&self, input: DataValidated, ctx: StepContext) -> Result<(), StepError> {
        let storage_key = format!("stored-data-{}", input.pipeline_id);
        let stored_at = Utc::now();
        let record_count = input.data.len();

        ctx.set_state(
            namespaces::STORAGE,
            &storage_key,
            &StoredDataRecord {
                metadata: StorageMetadata {
                    source: input.source.clone(),
                    record_count,
                    stored_at,
                },
                data: input.data,
            },
        )
        .await?;

        let completed_at = Utc::now();
        let duration_ms = completed_at
            .signed_duration_since(input.fetched_at)
            .num_milliseconds();

        ctx.set_state(
            namespaces::PIPELINES,
            &input.pipeline_id,
            &CompletedRecord {
                status: PipelineStatus::Completed,
                source: input.source.clone(),
                stats: input.stats.clone(),
                invalid_records: input.invalid_records.len(),
                storage_key,
                timeline: PipelineTimeline {
                    fetched_at: input.fetched_at,
                    transformed_at: input.transformed_at,
                    validated_at: input.validated_at,
                    stored_at,
                },
                duration_ms,
                completed_at,
            },
        )
        .await?;

        tracing::info!(
            pipeline_id = input.pipeline_id,
            records_stored = record_count,
            duration_ms,
            "pipeline completed"
        );

        ctx.emit(
            topics::PIPELINE_COMPLETED,
            &PipelineCompleted {
                pipeline_id: input.pipeline_id,
                source: input.source,
                records_stored: record_count,
                stats: input.stats,
                duration_ms,
                completed_at,
            },
        )?;
        Ok(())
    }
}
