#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use fleetpush_client::testing::MockTransport;
use fleetpush_client::{ClientConfig, ClientError, ClientEvent, EventKind, PubSubClient};
use fleetpush_protocol::{Identity, UserType};

pub fn identity(user_id: &str, user_type: UserType) -> Identity {
    Identity::new(user_id, user_type)
}

pub fn config() -> ClientConfig {
    ClientConfig::default().with_auto_connect(false)
}

/// Let every spawned task run until idle. Relies on a paused clock.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub async fn connected_client(transport: &Arc<MockTransport>, config: ClientConfig) -> PubSubClient {
    let client = PubSubClient::new(
        identity("a@x.com", UserType::Client),
        config,
        transport.clone(),
    )
    .unwrap();
    client.connect().await.unwrap();
    client
}

pub fn record(client: &PubSubClient, kind: EventKind) -> Arc<Mutex<Vec<ClientEvent>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    client.on(kind, move |event| sink.lock().push(event.clone()));
    log
}

pub fn errors(log: &Arc<Mutex<Vec<ClientEvent>>>) -> Vec<ClientError> {
    log.lock()
        .iter()
        .filter_map(|event| match event {
            ClientEvent::Error(e) => Some(e.clone()),
            _ => None,
        })
        .collect()
}
