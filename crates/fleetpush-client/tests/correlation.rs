mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;

use fleetpush_client::testing::MockTransport;
use fleetpush_client::{ClientError, ClientEvent, EventKind};
use fleetpush_protocol::{CorrelationKey, ProtocolError};

use common::{config, connected_client, errors, record, settle};

fn counter() -> (Arc<AtomicUsize>, impl Fn(fleetpush_protocol::TopicMessage) + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    (count, move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    })
}

fn notification(topic: &str, message: &str) -> serde_json::Value {
    json!({"type": "notification", "topic": topic, "from": "x", "fromType": "client", "message": message})
}

#[tokio::test(start_paused = true)]
async fn test_publish_timeout_removes_entry_and_ignores_late_reply() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;
    let messages = record(&client, EventKind::Message);
    transport.mute("publish");

    let err = client.publish("t", json!({})).await.unwrap_err();
    assert_eq!(
        err,
        ClientError::Timeout {
            key: "publish:t".into(),
            timeout: Duration::from_millis(5000)
        }
    );
    assert!(client.pending_requests().is_empty());

    // The late reply matches nothing but still reaches message listeners.
    transport.push_json(json!({"type": "published", "topic": "t", "message": "Message published successfully"}));
    settle().await;
    assert!(client.pending_requests().is_empty());
    assert_eq!(messages.lock().len(), 1);

    transport.unmute("publish");
    client.publish("t", json!({})).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_in_flight_key_is_rejected() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;
    transport.mute("publish");

    let first = tokio::spawn({
        let client = client.clone();
        async move { client.publish("t", json!(1)).await }
    });
    settle().await;

    let err = client.publish("t", json!(2)).await.unwrap_err();
    assert_eq!(
        err,
        ClientError::RequestInFlight {
            key: CorrelationKey::Publish("t".into())
        }
    );
    assert_eq!(transport.count_sent("publish"), 1);

    // A different topic is a different key.
    transport.unmute("publish");
    client.publish("other", json!(3)).await.unwrap();

    transport.push_json(json!({"type": "published", "topic": "t", "message": "Message published successfully"}));
    assert_eq!(first.await.unwrap(), Ok(()));
}

#[tokio::test(start_paused = true)]
async fn test_outstanding_requests_resolve_independently() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;
    transport.mute("status");
    transport.mute("users");

    let status = tokio::spawn({
        let client = client.clone();
        async move { client.status().await }
    });
    let users = tokio::spawn({
        let client = client.clone();
        async move { client.users().await }
    });
    settle().await;
    assert_eq!(
        client.pending_requests(),
        vec![CorrelationKey::Status, CorrelationKey::Users]
    );

    transport.push_json(json!({"type": "users", "users": [{"userId": "b@x.com", "userType": "driver"}]}));
    let users = users.await.unwrap().unwrap();
    assert_eq!(users[0].user_id, "b@x.com");
    assert_eq!(client.pending_requests(), vec![CorrelationKey::Status]);

    transport.push_json(json!({"type": "status", "uptime": 12}));
    assert_eq!(status.await.unwrap().unwrap()["uptime"], 12);
}

#[tokio::test(start_paused = true)]
async fn test_publish_rejected_by_server() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;
    transport.mute("publish");

    let publish = tokio::spawn({
        let client = client.clone();
        async move { client.publish("t", json!({})).await }
    });
    settle().await;
    transport.push_json(json!({"type": "published", "topic": "t", "message": "Topic is read-only"}));

    assert_eq!(
        publish.await.unwrap(),
        Err(ClientError::Rejected {
            key: CorrelationKey::Publish("t".into()),
            reason: "Topic is read-only".into()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_publish_without_confirmation_is_rejected() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;
    transport.mute("publish");

    for reply in [
        json!({"type": "published", "topic": "t"}),
        json!({"type": "published", "topic": "t", "message": 1}),
    ] {
        let publish = tokio::spawn({
            let client = client.clone();
            async move { client.publish("t", json!({})).await }
        });
        settle().await;
        transport.push_json(reply);

        assert_eq!(
            publish.await.unwrap(),
            Err(ClientError::Rejected {
                key: CorrelationKey::Publish("t".into()),
                reason: "missing publish confirmation".into()
            })
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_empty_topic_is_invalid() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;
    transport.clear_sent();

    assert_eq!(client.publish("", json!({})).await, Err(ClientError::InvalidTopic));
    assert_eq!(client.subscribe("", |_| {}).await, Err(ClientError::InvalidTopic));
    assert_eq!(client.unsubscribe("").await, Err(ClientError::InvalidTopic));
    assert!(transport.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_subscription_routes_notifications() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;
    let (count, callback) = counter();
    client.subscribe("orders", callback).await.unwrap();

    transport.push_json(notification("orders", "one"));
    transport.push_json(notification("orders", "two"));
    transport.push_json(notification("elsewhere", "three"));
    settle().await;

    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert_eq!(client.subscriptions(), vec!["orders".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_resubscribe_replaces_callback() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;
    let (first, first_cb) = counter();
    let (second, second_cb) = counter();
    client.subscribe("t", first_cb).await.unwrap();
    client.subscribe("t", second_cb).await.unwrap();

    transport.push_json(notification("t", "x"));
    settle().await;
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_never_subscribed_topic() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;

    client.unsubscribe("never").await.unwrap();
    assert_eq!(
        transport.sent().last().unwrap(),
        &json!({"type": "unsubscribe", "userId": "a@x.com", "topic": "never"})
    );
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_stops_delivery_even_if_round_trip_fails() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;
    let (count, callback) = counter();
    client.subscribe("t", callback).await.unwrap();
    transport.mute("unsubscribe");

    let err = client.unsubscribe("t").await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout { .. }));
    assert!(!client.is_subscribed("t"));

    transport.push_json(notification("t", "late"));
    settle().await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_cancels_in_flight_subscribe_callback() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;
    let (count, callback) = counter();
    transport.mute("subscribe");

    let subscribe = tokio::spawn({
        let client = client.clone();
        async move { client.subscribe("t", callback).await }
    });
    settle().await;
    client.unsubscribe("t").await.unwrap();

    // The subscribe still completes, but its callback stays uninstalled.
    transport.push_json(json!({"type": "subscribed", "topic": "t"}));
    assert_eq!(subscribe.await.unwrap(), Ok(()));
    assert!(!client.is_subscribed("t"));

    transport.push_json(notification("t", "after"));
    settle().await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frames_become_error_events() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;
    let events = record(&client, EventKind::Error);

    transport.push("not json");
    transport.push(r#"{"no":"type"}"#);
    transport.push(r#"{"type":"subscribed"}"#);
    settle().await;

    let errors = errors(&events);
    assert_eq!(errors.len(), 3);
    assert!(matches!(errors[0], ClientError::Protocol(ProtocolError::MalformedFrame(_))));
    assert_eq!(errors[1], ClientError::Protocol(ProtocolError::MissingType));
    assert!(matches!(errors[2], ClientError::Protocol(ProtocolError::InvalidFrame { .. })));

    // Dispatch keeps working
    assert!(client.status().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_server_error_frame_is_an_error_event() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;
    let events = record(&client, EventKind::Error);
    let messages = record(&client, EventKind::Message);

    transport.push_json(json!({"type": "error", "message": "Topic not found"}));
    settle().await;

    assert_eq!(errors(&events), vec![ClientError::Server("Topic not found".into())]);
    assert_eq!(
        *messages.lock(),
        vec![ClientEvent::Message(json!({"type": "error", "message": "Topic not found"}))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_panicking_callbacks_are_isolated() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;

    client.on(EventKind::Message, |_| panic!("listener bug"));
    let messages = record(&client, EventKind::Message);
    client
        .subscribe("bad", |_| panic!("subscriber bug"))
        .await
        .unwrap();
    let (good, good_cb) = counter();
    client.subscribe("good", good_cb).await.unwrap();
    messages.lock().clear();

    transport.push_json(notification("bad", "1"));
    transport.push_json(notification("good", "2"));
    transport.push_json(notification("bad", "3"));
    settle().await;

    assert_eq!(good.load(Ordering::SeqCst), 1);
    assert_eq!(messages.lock().len(), 3);
    assert!(client.status().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_message_listeners_see_frames_after_dispatch() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;
    let order = Arc::new(Mutex::new(Vec::new()));

    let log = order.clone();
    client
        .subscribe("t", move |_| log.lock().push("callback"))
        .await
        .unwrap();
    let log = order.clone();
    client.on(EventKind::Message, move |_| log.lock().push("listener"));

    transport.push_json(notification("t", "x"));
    settle().await;
    assert_eq!(*order.lock(), vec!["callback", "listener"]);
}
