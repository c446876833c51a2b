use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use fleetpush_cli::{CliError, CommandExecutor, Commands, NotificationArgs, OutputFormat};
use fleetpush_client::testing::MockTransport;
use fleetpush_client::{ClientConfig, ClientError};
use fleetpush_protocol::{Identity, NotificationKind, UserType};

fn executor(transport: &Arc<MockTransport>) -> CommandExecutor {
    CommandExecutor::new(
        Identity::new("w-1", UserType::Warehouse),
        ClientConfig::default(),
        OutputFormat::Compact,
    )
    .with_transport(transport.clone())
}

fn notification(title: &str, data: Option<&str>) -> NotificationArgs {
    NotificationArgs {
        title: title.into(),
        message: "Pick up at dock 3".into(),
        kind: NotificationKind::Success,
        data: data.map(str::to_string),
    }
}

#[tokio::test(start_paused = true)]
async fn test_status_and_users_round_trip() {
    let transport = MockTransport::acknowledging();
    executor(&transport).execute(Commands::Status).await.unwrap();
    assert_eq!(transport.sent_types(), vec!["register", "status"]);
    assert_eq!(transport.opens(), 1);

    let transport = MockTransport::acknowledging();
    executor(&transport).execute(Commands::Users).await.unwrap();
    assert_eq!(transport.sent_types(), vec!["register", "users"]);
}

#[tokio::test(start_paused = true)]
async fn test_send_publishes_to_personal_topic() {
    let transport = MockTransport::acknowledging();
    executor(&transport)
        .execute(Commands::Send {
            target: "a@x.com".into(),
            notification: notification("Order ready", Some(r#"{"orderId":42}"#)),
        })
        .await
        .unwrap();

    let published = transport.sent().last().cloned().unwrap();
    assert_eq!(published["type"], "publish");
    assert_eq!(published["userId"], "w-1");
    assert_eq!(published["topic"], "notifications:a@x.com");
    assert_eq!(published["data"]["title"], "Order ready");
    assert_eq!(published["data"]["type"], "success");
    assert_eq!(published["data"]["from"], "w-1");
    assert_eq!(published["data"]["fromType"], "warehouse");
    assert_eq!(published["data"]["data"], json!({"orderId": 42}));
}

#[tokio::test(start_paused = true)]
async fn test_broadcast_targets_role_topic() {
    let transport = MockTransport::acknowledging();
    executor(&transport)
        .execute(Commands::Broadcast {
            role: UserType::Driver,
            notification: notification("Shift", None),
        })
        .await
        .unwrap();

    assert_eq!(transport.sent().last().unwrap()["topic"], "broadcast:driver");
}

#[tokio::test(start_paused = true)]
async fn test_publish_raw_json() {
    let transport = MockTransport::acknowledging();
    let executor = executor(&transport);

    executor
        .execute(Commands::Publish {
            topic: "order-status:9".into(),
            data: r#"{"state":"picked"}"#.into(),
        })
        .await
        .unwrap();
    assert_eq!(
        transport.sent().last().unwrap()["data"],
        json!({"state": "picked"})
    );

    transport.clear_sent();
    let err = executor
        .execute(Commands::Publish {
            topic: "order-status:9".into(),
            data: "{not json".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Json(_)));

    let err = executor
        .execute(Commands::Publish {
            topic: String::new(),
            data: "1".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Client(ClientError::InvalidTopic)));
    assert!(transport.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_invalid_data_is_rejected_before_connecting() {
    let transport = MockTransport::acknowledging();
    let err = executor(&transport)
        .execute(Commands::Send {
            target: "a@x.com".into(),
            notification: notification("Oops", Some("[1,2]")),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::InvalidArguments(_)));
    assert_eq!(transport.opens(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_server() {
    let transport = MockTransport::acknowledging();
    transport.refuse_connections(true);
    let err = executor(&transport)
        .execute(Commands::Status)
        .await
        .unwrap_err();
    assert!(!err.suggestions().is_empty());
    assert!(matches!(err, CliError::Client(ClientError::Transport(_))));
}

#[tokio::test(start_paused = true)]
async fn test_listen_stops_after_count() {
    let transport = MockTransport::acknowledging();
    let executor = CommandExecutor::new(
        Identity::new("d-1", UserType::Driver),
        ClientConfig::default(),
        OutputFormat::Compact,
    )
    .with_transport(transport.clone());

    let listening = tokio::spawn(async move {
        executor
            .execute(Commands::Listen {
                topics: vec!["announcements".into()],
                count: Some(2),
            })
            .await
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(
        transport.sent_types(),
        vec!["register", "subscribe", "subscribe", "subscribe"]
    );

    transport.push_json(json!({"type": "notification", "topic": "notifications:d-1", "message": "one"}));
    transport.push_json(json!({"type": "notification", "topic": "announcements", "message": "two"}));

    listening.await.unwrap().unwrap();
    assert_eq!(transport.count_sent("unsubscribe"), 0);
}
