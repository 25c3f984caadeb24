use std::time::Duration;

use futures_util::{StreamExt, pin_mut};
use serde_json::json;
use stepline::event_bus::{ChannelSink, Event, EventBus, EventEmitter, MemorySink};

#[tokio::test]
async fn events_route_to_topic_subscribers_only() {
    let bus = EventBus::with_sink(MemorySink::new());
    let mut fetched = bus.subscribe("data-fetched");
    let mut validated = bus.subscribe("data-validated");
    bus.listen_for_events();

    bus.publish_json("data-fetched", json!({"pipelineId": "p-1"}))
        .unwrap();

    let event = fetched
        .next_timeout(Duration::from_secs(1))
        .await
        .expect("subscriber should receive its topic");
    assert_eq!(event.topic(), "data-fetched");
    assert_eq!(event.data()["pipelineId"], "p-1");

    assert!(
        validated.next_timeout(Duration::from_millis(50)).await.is_none(),
        "other topics must not leak across subscriptions"
    );

    bus.stop_listener().await;
}

#[tokio::test]
async fn publishing_without_subscribers_is_noop_but_reaches_sinks() {
    let sink = MemorySink::new();
    let snapshot = sink.clone();
    let bus = EventBus::with_sink(sink);
    bus.listen_for_events();

    bus.publish_json("pipeline-completed", json!({"ok": true}))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    bus.stop_listener().await;

    let entries = snapshot.snapshot();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].topic(), "pipeline-completed");
}

#[tokio::test]
async fn each_subscriber_gets_its_own_copy() {
    let bus = EventBus::with_sink(MemorySink::new());
    let mut first = bus.subscribe("campaign-scheduled");
    let mut second = bus.subscribe("campaign-scheduled");
    bus.listen_for_events();

    bus.publish_json("campaign-scheduled", json!({"campaignId": "c-1"}))
        .unwrap();

    let a = first.next_timeout(Duration::from_secs(1)).await.unwrap();
    let b = second.next_timeout(Duration::from_secs(1)).await.unwrap();
    assert_eq!(a, b);

    bus.stop_listener().await;
}

#[tokio::test]
async fn slow_subscriber_does_not_block_others() {
    let bus = EventBus::with_sink(MemorySink::new());
    // Deliberately never drained.
    let _slow = bus.subscribe("data-fetched");
    let mut fast = bus.subscribe("data-fetched");
    bus.listen_for_events();

    for i in 0..100 {
        bus.publish_json("data-fetched", json!({"seq": i})).unwrap();
    }

    for i in 0..100 {
        let event = fast
            .next_timeout(Duration::from_secs(1))
            .await
            .expect("fast subscriber should keep receiving");
        assert_eq!(event.data()["seq"], i);
    }

    bus.stop_listener().await;
}

#[tokio::test]
async fn delivery_preserves_publish_order_per_subscription() {
    let bus = EventBus::with_sink(MemorySink::new());
    let mut sub = bus.subscribe("data-transformed");
    bus.listen_for_events();

    for i in 0..10 {
        bus.publish_json("data-transformed", json!({"seq": i}))
            .unwrap();
    }

    for i in 0..10 {
        let event = sub.next_timeout(Duration::from_secs(1)).await.unwrap();
        assert_eq!(event.data()["seq"], i);
    }

    bus.stop_listener().await;
}

#[tokio::test]
async fn emitter_handle_publishes_through_the_bus() {
    let bus = EventBus::with_sink(MemorySink::new());
    let mut sub = bus.subscribe("email-sent");
    bus.listen_for_events();

    let emitter = bus.emitter();
    emitter
        .emit(Event::new("email-sent", json!({"recipient": "a@b.c"})))
        .unwrap();

    let event = sub.next_timeout(Duration::from_secs(1)).await.unwrap();
    assert_eq!(event.data()["recipient"], "a@b.c");

    bus.stop_listener().await;
}

#[tokio::test]
async fn channel_sink_forwards_every_event() {
    let (tx, rx) = flume::unbounded();
    let bus = EventBus::with_sink(ChannelSink::new(tx));
    bus.listen_for_events();

    bus.publish_json("data-fetched", json!({"a": 1})).unwrap();
    bus.publish_json("data-validated", json!({"b": 2})).unwrap();

    let first = rx.recv_async().await.unwrap();
    let second = rx.recv_async().await.unwrap();
    assert_eq!(first.topic(), "data-fetched");
    assert_eq!(second.topic(), "data-validated");

    bus.stop_listener().await;
}

#[tokio::test]
async fn subscription_stream_yields_events() {
    let bus = EventBus::with_sink(MemorySink::new());
    let sub = bus.subscribe("pipeline-completed");
    bus.listen_for_events();

    bus.publish_json("pipeline-completed", json!({"seq": 0}))
        .unwrap();
    bus.publish_json("pipeline-completed", json!({"seq": 1}))
        .unwrap();

    let stream = sub.into_stream();
    pin_mut!(stream);
    assert_eq!(stream.next().await.unwrap().data()["seq"], 0);
    assert_eq!(stream.next().await.unwrap().data()["seq"], 1);

    bus.stop_listener().await;
}

#[tokio::test]
async fn listen_for_events_is_idempotent() {
    let sink = MemorySink::new();
    let snapshot = sink.clone();
    let bus = EventBus::with_sink(sink);
    bus.listen_for_events();
    bus.listen_for_events();

    bus.publish_json("data-fetched", json!({})).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    bus.stop_listener().await;

    assert_eq!(snapshot.snapshot().len(), 1, "no duplicate listener");
}

#[test]
fn serialized_events_use_camel_case_wire_names() {
    let event = Event::new("data-fetched", json!({"pipelineId": "p-1"}));

    let derived = serde_json::to_value(&event).unwrap();
    assert!(derived.get("emittedAt").is_some());
    assert!(derived.get("emitted_at").is_none());

    // Derived serialization and the sink-facing shape agree.
    let rendered = event.to_json_value();
    assert!(rendered.get("emittedAt").is_some());
    assert_eq!(derived["topic"], rendered["topic"]);
    assert_eq!(derived["data"], rendered["data"]);
}

#[tokio::test]
async fn stopping_without_events_is_noop() {
    let bus = EventBus::with_sink(MemorySink::new());
    bus.listen_for_events();
    bus.stop_listener().await;
}
