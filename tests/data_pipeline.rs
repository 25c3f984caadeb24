use std::time::Duration;

use serde_json::json;
use stepline::flows::data_pipeline::{
    self, FetchData, StoreData, TransformData, ValidateData, topics,
};
use stepline::flows::namespaces;
use stepline::runtime::{EventBusConfig, RuntimeConfig, StepRunner};
use stepline::steps::StepRegistry;
use stepline::store::StateStore;

fn pipeline_runner() -> StepRunner {
    let mut registry = StepRegistry::new();
    registry
        .register_api(FetchData)
        .unwrap()
        .register_event(TransformData)
        .unwrap()
        .register_event(ValidateData)
        .unwrap()
        .register_event(StoreData)
        .unwrap();
    StepRunner::new(
        registry,
        &RuntimeConfig::new().with_event_bus(EventBusConfig::with_memory_sink()),
    )
}

#[tokio::test]
async fn fetch_produces_one_event_with_the_requested_batch() {
    let mut runner = pipeline_runner();
    let mut fetched = runner.subscribe(topics::DATA_FETCHED);
    runner.start();

    let response = runner
        .handle_request(
            "/pipeline/fetch",
            json!({"source": "api.example.com", "batchSize": 3}),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.body()["status"], "processing");
    assert_eq!(
        response.body()["message"],
        "Fetched 3 records from api.example.com"
    );
    let pipeline_id = response.body()["pipelineId"].as_str().unwrap().to_string();
    assert!(pipeline_id.starts_with("pipeline-"));

    let event = fetched.next_timeout(Duration::from_secs(2)).await.unwrap();
    assert_eq!(event.data()["pipelineId"], pipeline_id.as_str());
    let records = event.data()["data"].as_array().unwrap();
    assert_eq!(records.len(), 3);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record["id"], (i + 1) as u64);
        let value = record["value"].as_f64().unwrap();
        assert!((0.0..100.0).contains(&value));
    }
    assert!(
        fetched.next_timeout(Duration::from_millis(50)).await.is_none(),
        "exactly one data-fetched event per request"
    );

    // Initial state record reflects the fetch stage.
    let record = runner
        .store()
        .get(namespaces::PIPELINES, &pipeline_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record["recordsFetched"], 3);
    assert_eq!(record["source"], "api.example.com");

    runner.shutdown().await;
}

#[tokio::test]
async fn malformed_fetch_request_is_rejected_with_400() {
    let mut runner = pipeline_runner();
    runner.start();

    let response = runner
        .handle_request("/pipeline/fetch", json!({"source": "s"}))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(response.body()["error"], "invalid_request");

    runner.shutdown().await;
}

#[tokio::test]
async fn all_valid_records_flow_to_completion() {
    let mut runner = pipeline_runner();
    let mut validated = runner.subscribe(topics::DATA_VALIDATED);
    let mut failed = runner.subscribe(topics::DATA_VALIDATION_FAILED);
    let mut completed = runner.subscribe(topics::PIPELINE_COMPLETED);
    runner.start();

    let response = runner
        .handle_request(
            "/pipeline/fetch",
            json!({"source": "warehouse", "batchSize": 5}),
        )
        .await
        .unwrap();
    let pipeline_id = response.body()["pipelineId"].as_str().unwrap().to_string();

    let validated_event = validated.next_timeout(Duration::from_secs(2)).await.unwrap();
    assert_eq!(
        validated_event.data()["stats"],
        json!({"total": 5, "valid": 5, "invalid": 0, "validationRate": 100.0})
    );

    let completed_event = completed.next_timeout(Duration::from_secs(2)).await.unwrap();
    assert_eq!(completed_event.data()["pipelineId"], pipeline_id.as_str());
    assert_eq!(completed_event.data()["recordsStored"], 5);

    assert!(
        failed.next_timeout(Duration::from_millis(50)).await.is_none(),
        "a fully valid batch never takes the failure branch"
    );

    // Final pipeline record and the stored batch.
    let record = runner
        .store()
        .get(namespaces::PIPELINES, &pipeline_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record["status"], "completed");
    assert_eq!(record["storageKey"], format!("stored-data-{pipeline_id}"));

    let stored = runner
        .store()
        .get(namespaces::STORAGE, &format!("stored-data-{pipeline_id}"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["metadata"]["recordCount"], 5);
    assert_eq!(stored["data"].as_array().unwrap().len(), 5);

    runner.shutdown().await;
}

#[tokio::test]
async fn transformation_annotates_and_normalizes_records() {
    let mut runner = pipeline_runner();
    let mut transformed = runner.subscribe(topics::DATA_TRANSFORMED);
    runner.start();

    runner
        .bus()
        .publish_json(
            topics::DATA_FETCHED,
            json!({
                "pipelineId": "pipeline-1-test",
                "source": "s",
                "data": [
                    {"id": 1, "value": 80.0, "timestamp": "2026-08-27T00:00:00Z"},
                    {"id": 2, "value": 12.5, "timestamp": "2026-08-27T00:00:00Z"}
                ],
                "fetchedAt": "2026-08-27T00:00:00Z"
            }),
        )
        .unwrap();

    let event = transformed.next_timeout(Duration::from_secs(2)).await.unwrap();
    let records = event.data()["data"].as_array().unwrap();
    assert_eq!(records[0]["category"], "high");
    assert_eq!(records[0]["normalizedValue"], 0.8);
    assert_eq!(records[1]["category"], "low");
    assert_eq!(records[1]["normalizedValue"], 0.13);
    assert_eq!(records[0]["processedBy"], "TransformData");

    runner.shutdown().await;
}

#[tokio::test]
async fn wholly_invalid_batch_takes_the_failure_branch() {
    let mut runner = pipeline_runner();
    let mut validated = runner.subscribe(topics::DATA_VALIDATED);
    let mut failed = runner.subscribe(topics::DATA_VALIDATION_FAILED);
    runner.start();

    // Records with id 0 fail validation.
    runner
        .bus()
        .publish_json(
            topics::DATA_TRANSFORMED,
            json!({
                "pipelineId": "pipeline-2-test",
                "source": "s",
                "data": [{
                    "id": 0,
                    "value": 10.0,
                    "timestamp": "2026-08-27T00:00:00Z",
                    "normalizedValue": 0.1,
                    "category": "low",
                    "processedBy": "TransformData",
                    "transformedAt": "2026-08-27T00:00:00Z"
                }],
                "fetchedAt": "2026-08-27T00:00:00Z",
                "transformedAt": "2026-08-27T00:00:00Z"
            }),
        )
        .unwrap();

    let event = failed.next_timeout(Duration::from_secs(2)).await.unwrap();
    assert_eq!(event.data()["reason"], "All records failed validation");
    assert_eq!(event.data()["invalidRecords"].as_array().unwrap().len(), 1);

    assert!(
        validated.next_timeout(Duration::from_millis(50)).await.is_none(),
        "a wholly invalid batch never emits data-validated"
    );

    // The validated-stage record still captures the outcome.
    let record = runner
        .store()
        .get(namespaces::PIPELINES, "pipeline-2-test")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record["status"], "validated");
    assert_eq!(record["validRecords"], 0);
    assert_eq!(record["validationRate"], 0.0);

    runner.shutdown().await;
}

#[tokio::test]
async fn empty_batch_reports_zero_validation_rate() {
    let mut runner = pipeline_runner();
    let mut failed = runner.subscribe(topics::DATA_VALIDATION_FAILED);
    runner.start();

    runner
        .bus()
        .publish_json(
            topics::DATA_TRANSFORMED,
            json!({
                "pipelineId": "pipeline-3-test",
                "source": "s",
                "data": [],
                "fetchedAt": "2026-08-27T00:00:00Z",
                "transformedAt": "2026-08-27T00:00:00Z"
            }),
        )
        .unwrap();

    let event = failed.next_timeout(Duration::from_secs(2)).await.unwrap();
    assert_eq!(event.data()["invalidRecords"].as_array().unwrap().len(), 0);

    let record = runner
        .store()
        .get(namespaces::PIPELINES, "pipeline-3-test")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record["validationRate"], 0.0);

    runner.shutdown().await;
}

#[test]
fn category_split_matches_the_threshold() {
    // Values above 50 are high, the rest low.
    assert_eq!(
        serde_json::to_value(data_pipeline::Category::High).unwrap(),
        json!("high")
    );
    assert_eq!(
        serde_json::to_value(data_pipeline::Category::Low).unwrap(),
        json!("low")
    );
}
