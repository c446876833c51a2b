mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use fleetpush_client::testing::MockTransport;
use fleetpush_client::{
    ClientError, ClientEvent, ConnectionState, EventKind, PubSubClient,
};
use fleetpush_protocol::{UserType, topics};
use fleetpush_transport_traits::Transport;

use common::{config, connected_client, identity, record, settle};

#[tokio::test(start_paused = true)]
async fn test_golden_path() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;
    assert!(client.is_connected());
    assert!(client.is_registered());
    assert_eq!(
        transport.sent()[0],
        json!({"type": "register", "userId": "a@x.com", "userType": "client"})
    );

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let topic = topics::user_notifications("a@x.com");
    client
        .subscribe(&topic, move |msg| sink.lock().push(msg.message))
        .await
        .unwrap();
    assert!(client.is_subscribed(&topic));

    transport.push_json(json!({
        "type": "notification",
        "topic": topic,
        "from": "b@x.com",
        "fromType": "driver",
        "message": "hi",
        "timestamp": "2026-01-01T00:00:00Z",
    }));
    settle().await;

    assert_eq!(*received.lock(), vec![Value::from("hi")]);
}

#[tokio::test(start_paused = true)]
async fn test_connect_events_and_status() {
    let transport = MockTransport::acknowledging();
    let client = PubSubClient::new(
        identity("d-1", UserType::Driver),
        config(),
        transport.clone(),
    )
    .unwrap();
    let connects = record(&client, EventKind::Connect);
    let disconnects = record(&client, EventKind::Disconnect);
    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.connect().await.unwrap();
    assert_eq!(
        *connects.lock(),
        vec![ClientEvent::Connect {
            user_id: "d-1".into(),
            user_type: UserType::Driver
        }]
    );

    let status = client.connection_status();
    assert!(status.is_connected);
    assert!(status.is_registered);
    assert_eq!(status.user_id, "d-1");
    assert_eq!(status.reconnect_attempts, 0);
    assert_eq!(status.state, ConnectionState::Registered);

    assert_eq!(client.status().await.unwrap()["connections"], 1);
    assert!(client.users().await.unwrap().is_empty());

    client.close().await;
    settle().await;
    assert_eq!(
        *disconnects.lock(),
        vec![ClientEvent::Disconnect {
            user_id: "d-1".into(),
            reason: Some("closed by client".into())
        }]
    );
    assert!(!client.is_connected());
    assert!(!client.is_registered());
}

#[tokio::test(start_paused = true)]
async fn test_not_ready_calls_do_not_touch_transport() {
    let transport = MockTransport::acknowledging();
    let client = PubSubClient::new(
        identity("a@x.com", UserType::Client),
        config(),
        transport.clone(),
    )
    .unwrap();

    let err = client.publish("t", json!({})).await.unwrap_err();
    assert_eq!(
        err,
        ClientError::NotReady {
            operation: "publish",
            state: ConnectionState::Disconnected
        }
    );
    assert!(matches!(
        client.subscribe("t", |_| {}).await,
        Err(ClientError::NotReady { operation: "subscribe", .. })
    ));
    assert!(matches!(
        client.unsubscribe("t").await,
        Err(ClientError::NotReady { .. })
    ));
    assert!(matches!(client.status().await, Err(ClientError::NotReady { .. })));
    assert!(matches!(client.users().await, Err(ClientError::NotReady { .. })));

    assert!(transport.sent().is_empty());
    assert!(client.pending_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_open_but_unregistered_allows_queries_only() {
    let transport = MockTransport::acknowledging();
    transport.mute("register");
    let client = PubSubClient::new(
        identity("a@x.com", UserType::Client),
        config(),
        transport.clone(),
    )
    .unwrap();

    transport.open().await.unwrap();
    settle().await;
    assert_eq!(client.state(), ConnectionState::OpenUnregistered);
    assert!(client.is_connected());
    assert!(!client.is_registered());

    assert!(client.status().await.is_ok());
    let err = client.publish("t", json!(1)).await.unwrap_err();
    assert_eq!(
        err,
        ClientError::NotReady {
            operation: "publish",
            state: ConnectionState::OpenUnregistered
        }
    );
    assert_eq!(transport.count_sent("publish"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_connect_fails_when_transport_refuses() {
    let transport = MockTransport::acknowledging();
    transport.refuse_connections(true);
    let client = PubSubClient::new(
        identity("a@x.com", UserType::Client),
        config(),
        transport.clone(),
    )
    .unwrap();

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    client.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_connect_times_out_without_registration() {
    let transport = MockTransport::acknowledging();
    transport.mute("register");
    let client = PubSubClient::new(
        identity("a@x.com", UserType::Client),
        config().with_connect_wait_timeout(Duration::from_secs(2)),
        transport.clone(),
    )
    .unwrap();

    let err = client.connect().await.unwrap_err();
    assert_eq!(
        err,
        ClientError::Timeout {
            key: "connect".into(),
            timeout: Duration::from_secs(2)
        }
    );
    assert_eq!(client.state(), ConnectionState::OpenUnregistered);
}

#[tokio::test(start_paused = true)]
async fn test_auto_connect_registers_in_background() {
    let transport = MockTransport::acknowledging();
    let client = PubSubClient::new(
        identity("w-1", UserType::Warehouse),
        config().with_auto_connect(true),
        transport.clone(),
    )
    .unwrap();
    let mut states = client.watch_state();
    while *states.borrow_and_update() != ConnectionState::Registered {
        states.changed().await.unwrap();
    }
    assert_eq!(transport.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_rejects_pending_requests() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;
    transport.mute("status");

    let waiting = tokio::spawn({
        let client = client.clone();
        async move { client.status().await }
    });
    settle().await;
    assert_eq!(client.pending_requests().len(), 1);

    client.close().await;
    assert_eq!(waiting.await.unwrap(), Err(ClientError::ClientClosed));
    assert!(client.pending_requests().is_empty());

    // No reconnect after an explicit close
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.opens(), 1);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_connect_after_close() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;
    client.close().await;
    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.connect().await.unwrap();
    assert!(client.is_registered());
    assert_eq!(transport.count_sent("register"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_listeners_can_be_removed() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(&transport, config()).await;
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    let id = client.on(EventKind::Message, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    transport.push_json(json!({"type": "pong"}));
    settle().await;
    assert!(client.off(EventKind::Message, id));
    transport.push_json(json!({"type": "pong"}));
    settle().await;

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(!client.off(EventKind::Message, id));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_client_stops_background_tasks() {
    let transport = MockTransport::acknowledging();
    let client = connected_client(
        &transport,
        config().with_heartbeat_interval(Duration::from_secs(1)),
    )
    .await;
    drop(client);
    settle().await;
    transport.clear_sent();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(transport.sent().is_empty());
}
