//! Command execution using fleetpush-client

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use fleetpush_client::transport::Transport;
use fleetpush_client::{
    ClientConfig, ClientError, ClientEvent, EventKind, NotificationCenter, PubSubClient,
};
use fleetpush_protocol::{Identity, Notification, NotificationPayload, topics};

use crate::cli::{Cli, Commands, NotificationArgs, OutputFormat};
use crate::error::{CliError, CliResult};
use crate::output::Formatter;

/// Notifications kept in memory by `listen`
const LISTEN_FEED_CAPACITY: usize = 100;

enum Feed {
    Notification(Notification),
    Fatal(ClientError),
}

/// Execute CLI commands
#[derive(Debug)]
pub struct CommandExecutor {
    formatter: Formatter,
    identity: Identity,
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl CommandExecutor {
    /// Executor for `identity`. Connections are made on demand, one per command.
    #[must_use]
    pub fn new(identity: Identity, config: ClientConfig, format: OutputFormat) -> Self {
        Self {
            formatter: Formatter::new(format),
            identity,
            config: config.with_auto_connect(false),
            transport: None,
        }
    }

    /// Build from parsed arguments: config file, then environment, then flags.
    ///
    /// # Errors
    ///
    /// Returns a config error if the file cannot be loaded or the merged
    /// settings are invalid.
    pub fn from_cli(cli: &Cli) -> CliResult<Self> {
        let mut config = ClientConfig::load(cli.config.as_deref())?;
        if let Some(url) = &cli.server_url {
            config = config.with_server_url(url.clone());
            config.validate()?;
        }
        let identity = Identity::new(cli.user_id.clone(), cli.user_type);
        Ok(Self::new(identity, config, cli.format))
    }

    /// Use `transport` instead of opening a WebSocket.
    ///
    /// A transport hands its events to a single client, so it serves one
    /// command.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// The effective client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Display an error with suggestions
    pub fn display_error(&self, error: &CliError) {
        self.formatter.display_error(error);
    }

    /// Execute a command
    ///
    /// # Errors
    ///
    /// Returns the error of the first step that fails.
    pub async fn execute(&self, command: Commands) -> CliResult<()> {
        match command {
            Commands::Listen { topics, count } => self.execute_listen(&topics, count).await,
            Commands::Send {
                target,
                notification,
            } => {
                self.execute_notify(&topics::user_notifications(&target), notification)
                    .await
            }
            Commands::Broadcast { role, notification } => {
                self.execute_notify(&topics::broadcast(role), notification)
                    .await
            }
            Commands::Publish { topic, data } => self.execute_publish(&topic, &data).await,
            Commands::Status => self.execute_status().await,
            Commands::Users => self.execute_users().await,
        }
    }

    async fn execute_listen(&self, extra_topics: &[String], count: Option<usize>) -> CliResult<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let feed_tx = tx.clone();
        let mut builder = NotificationCenter::builder(self.identity.clone())
            .config(self.config.clone())
            .max_notifications(LISTEN_FEED_CAPACITY)
            .on_notification(move |n| {
                let _ = feed_tx.send(Feed::Notification(n.clone()));
            });
        if let Some(transport) = &self.transport {
            builder = builder.transport(transport.clone());
        }
        let center = builder.start().await?;
        watch_connection(center.client(), tx.clone());

        for topic in extra_topics {
            let topic_tx = tx.clone();
            let title = topic.clone();
            center
                .subscribe(topic, move |msg| {
                    let n = Notification::from_topic_message(&msg, &title);
                    let _ = topic_tx.send(Feed::Notification(n));
                })
                .await?;
        }
        drop(tx);

        info!(
            user_id = %self.identity.user_id,
            topics = ?center.client().subscriptions(),
            "Listening for notifications"
        );

        let mut received = 0usize;
        let outcome = loop {
            if count.is_some_and(|max| received >= max) {
                break Ok(());
            }
            tokio::select! {
                item = rx.recv() => match item {
                    Some(Feed::Notification(n)) => {
                        received += 1;
                        if let Err(e) = self.formatter.display_notification(&n) {
                            break Err(e);
                        }
                    }
                    Some(Feed::Fatal(e)) => break Err(e.into()),
                    None => break Ok(()),
                },
                signal = tokio::signal::ctrl_c() => {
                    debug!("Interrupted");
                    break signal.map_err(CliError::from);
                }
            }
        };

        center.close().await;
        outcome
    }

    async fn execute_notify(&self, topic: &str, args: NotificationArgs) -> CliResult<()> {
        let data = parse_data(args.data.as_deref())?;
        let payload = NotificationPayload::new(args.title, args.message, args.kind, data)
            .from_identity(&self.identity)
            .to_value()?;
        self.execute_publish_value(topic, payload).await
    }

    async fn execute_publish(&self, topic: &str, data: &str) -> CliResult<()> {
        let value: Value = serde_json::from_str(data)?;
        self.execute_publish_value(topic, value).await
    }

    async fn execute_publish_value(&self, topic: &str, value: Value) -> CliResult<()> {
        if topic.is_empty() {
            return Err(ClientError::InvalidTopic.into());
        }
        let client = self.connect().await?;
        let result = client.publish(topic, value).await;
        client.close().await;
        result?;
        self.formatter.display_done("Published", topic)
    }

    async fn execute_status(&self) -> CliResult<()> {
        let client = self.connect().await?;
        let status = client.status().await;
        client.close().await;
        self.formatter.display(&status?)
    }

    async fn execute_users(&self) -> CliResult<()> {
        let client = self.connect().await?;
        let users = client.users().await;
        client.close().await;
        self.formatter.display_users(&users?)
    }

    async fn connect(&self) -> CliResult<PubSubClient> {
        let client = match &self.transport {
            Some(transport) => {
                PubSubClient::new(self.identity.clone(), self.config.clone(), transport.clone())?
            }
            None => PubSubClient::websocket(self.identity.clone(), self.config.clone())?,
        };
        if let Err(e) = client.connect().await {
            client.close().await;
            return Err(e.into());
        }
        Ok(client)
    }
}

/// Report dropped connections, and stop listening once reconnection gives up.
fn watch_connection(client: &PubSubClient, tx: mpsc::UnboundedSender<Feed>) {
    client.on(EventKind::Disconnect, |event| {
        if let ClientEvent::Disconnect { reason, .. } = event {
            warn!(reason = reason.as_deref().unwrap_or("unknown"), "Connection lost");
        }
    });
    client.on(EventKind::Error, move |event| {
        if let ClientEvent::Error(e @ ClientError::MaxReconnectAttemptsExceeded { .. }) = event {
            let _ = tx.send(Feed::Fatal(e.clone()));
        }
    });
}

/// `--data` must be a JSON object.
fn parse_data(raw: Option<&str>) -> CliResult<Option<Map<String, Value>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_str(raw)? {
        Value::Object(map) => Ok(Some(map)),
        other => Err(CliError::InvalidArguments(format!(
            "--data must be a JSON object, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_data() {
        assert_eq!(parse_data(None).unwrap(), None);
        let map = parse_data(Some(r#"{"orderId": 42}"#)).unwrap().unwrap();
        assert_eq!(map["orderId"], json!(42));

        assert!(matches!(
            parse_data(Some("[1, 2]")),
            Err(CliError::InvalidArguments(_))
        ));
        assert!(matches!(parse_data(Some("{")), Err(CliError::Json(_))));
    }
}
