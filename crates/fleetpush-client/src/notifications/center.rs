//! Notification center
//!
//! Wraps a [`PubSubClient`], subscribes to the user's personal and role
//! broadcast topics, and turns every delivered message into a [`Notification`]
//! in a shared feed.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, info};

use fleetpush_protocol::{
    Identity, Notification, NotificationKind, NotificationPayload, TopicMessage, UserType, topics,
};
use fleetpush_transport_traits::Transport;
use fleetpush_websocket::WebSocketTransport;

use crate::client::PubSubClient;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::call_isolated;
use crate::state::ConnectionState;

use super::feed::NotificationFeed;
use super::platform::{HeadlessPlatform, NotificationPlatform, Permission};

/// Callback invoked for every notification added to the feed.
pub type NotificationCallback = Arc<dyn Fn(&Notification) + Send + Sync>;

const PERSONAL_TITLE: &str = "Notification";
const BROADCAST_TITLE: &str = "Broadcast";

/// Builder for [`NotificationCenter`]
pub struct NotificationCenterBuilder {
    identity: Identity,
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    platform: Arc<dyn NotificationPlatform>,
    on_notification: Option<NotificationCallback>,
    max_notifications: Option<usize>,
}

impl fmt::Debug for NotificationCenterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationCenterBuilder")
            .field("identity", &self.identity)
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("platform", &self.platform)
            .field("has_on_notification", &self.on_notification.is_some())
            .field("max_notifications", &self.max_notifications)
            .finish()
    }
}

impl NotificationCenterBuilder {
    /// Set the client configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the server endpoint
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = url.into();
        self
    }

    /// Use `transport` instead of a WebSocket to `server_url`
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Host notification capability (headless by default)
    pub fn platform(mut self, platform: Arc<dyn NotificationPlatform>) -> Self {
        self.platform = platform;
        self
    }

    /// Called for every notification, after it is added to the feed
    pub fn on_notification<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.on_notification = Some(Arc::new(callback));
        self
    }

    /// Keep at most `max` notifications (unbounded by default)
    pub fn max_notifications(mut self, max: usize) -> Self {
        self.max_notifications = Some(max);
        self
    }

    /// Connect, register and subscribe to the personal and broadcast topics.
    ///
    /// # Errors
    ///
    /// Any error from connecting or subscribing; the connection is closed first.
    pub async fn start(self) -> ClientResult<NotificationCenter> {
        let config = self.config.with_auto_connect(false);
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(WebSocketTransport::new(config.websocket_config())?),
        };
        let client = PubSubClient::new(self.identity, config, transport)?;
        let center = NotificationCenter {
            client,
            feed: Arc::new(Mutex::new(NotificationFeed::new(self.max_notifications))),
            platform: self.platform,
            on_notification: self.on_notification,
        };

        if let Err(e) = center.subscribe_feeds().await {
            center.client.close().await;
            return Err(e);
        }
        Ok(center)
    }
}

/// Application-facing notification facade.
///
/// Cloning is cheap; clones share the client and the feed.
#[derive(Clone)]
pub struct NotificationCenter {
    client: PubSubClient,
    feed: Arc<Mutex<NotificationFeed>>,
    platform: Arc<dyn NotificationPlatform>,
    on_notification: Option<NotificationCallback>,
}

impl fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("client", &self.client)
            .field("notifications", &self.feed.lock().len())
            .field("platform", &self.platform)
            .finish()
    }
}

impl NotificationCenter {
    /// Start building a center for `identity`.
    pub fn builder(identity: Identity) -> NotificationCenterBuilder {
        NotificationCenterBuilder {
            identity,
            config: ClientConfig::default(),
            transport: None,
            platform: Arc::new(HeadlessPlatform),
            on_notification: None,
            max_notifications: None,
        }
    }

    async fn subscribe_feeds(&self) -> ClientResult<()> {
        self.client.connect().await?;
        let identity = self.client.identity();

        let personal = topics::user_notifications(&identity.user_id);
        self.client
            .subscribe(&personal, self.feed_handler(PERSONAL_TITLE, true))
            .await?;
        let broadcast = topics::broadcast(identity.user_type);
        self.client
            .subscribe(&broadcast, self.feed_handler(BROADCAST_TITLE, false))
            .await?;

        info!(user = %identity, personal = %personal, broadcast = %broadcast, "Notification center started");
        Ok(())
    }

    /// Feed update first, then the application callback, then native display.
    fn feed_handler(
        &self,
        default_title: &'static str,
        display: bool,
    ) -> impl Fn(TopicMessage) + Send + Sync + 'static {
        let feed = self.feed.clone();
        let platform = self.platform.clone();
        let on_notification = self.on_notification.clone();
        move |message: TopicMessage| {
            let notification = Notification::from_topic_message(&message, default_title);
            debug!(topic = %message.topic, id = %notification.id, "Notification received");
            feed.lock().push(notification.clone());

            if let Some(callback) = &on_notification {
                call_isolated("on_notification callback", || callback(&notification));
            }
            if display && platform.permission() == Permission::Granted {
                platform.display(&notification);
            }
        }
    }

    /// The underlying client.
    pub fn client(&self) -> &PubSubClient {
        &self.client
    }

    /// Transport open.
    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Registered with the server.
    pub fn is_registered(&self) -> bool {
        self.client.is_registered()
    }

    /// Exact connection state.
    pub fn state(&self) -> ConnectionState {
        self.client.state()
    }

    /// Feed entries, newest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.feed.lock().to_vec()
    }

    /// Remove one entry. Returns `false` for an unknown id.
    pub fn remove_notification(&self, id: &str) -> bool {
        self.feed.lock().remove(id)
    }

    /// Empty the feed.
    pub fn clear_notifications(&self) {
        self.feed.lock().clear();
    }

    /// Ask the host for permission. Returns `true` when granted.
    pub async fn request_permission(&self) -> bool {
        if !self.platform.is_supported() {
            debug!("Native notifications are not supported on this host");
            return false;
        }
        self.platform.request_permission().await == Permission::Granted
    }

    /// Publish a notification to one user's personal topic.
    pub async fn send_notification(
        &self,
        target_user_id: &str,
        title: &str,
        message: &str,
        kind: NotificationKind,
        data: Option<Map<String, Value>>,
    ) -> ClientResult<()> {
        let topic = topics::user_notifications(target_user_id);
        self.publish_payload(&topic, title, message, kind, data).await
    }

    /// Publish a notification to every user of one role.
    pub async fn broadcast_notification(
        &self,
        target_user_type: UserType,
        title: &str,
        message: &str,
        kind: NotificationKind,
        data: Option<Map<String, Value>>,
    ) -> ClientResult<()> {
        let topic = topics::broadcast(target_user_type);
        self.publish_payload(&topic, title, message, kind, data).await
    }

    async fn publish_payload(
        &self,
        topic: &str,
        title: &str,
        message: &str,
        kind: NotificationKind,
        data: Option<Map<String, Value>>,
    ) -> ClientResult<()> {
        let payload = NotificationPayload::new(title, message, kind, data)
            .from_identity(self.client.identity())
            .to_value()?;
        self.client.publish(topic, payload).await
    }

    /// Subscribe to an extra topic.
    ///
    /// # Errors
    ///
    /// [`ClientError::ReservedTopic`] for the personal or broadcast topic this
    /// center already feeds from, otherwise as [`PubSubClient::subscribe`].
    pub async fn subscribe<F>(&self, topic: &str, callback: F) -> ClientResult<()>
    where
        F: Fn(TopicMessage) + Send + Sync + 'static,
    {
        self.check_not_feed_topic(topic)?;
        self.client.subscribe(topic, callback).await
    }

    /// Unsubscribe from an extra topic.
    ///
    /// # Errors
    ///
    /// As [`subscribe`](Self::subscribe).
    pub async fn unsubscribe(&self, topic: &str) -> ClientResult<()> {
        self.check_not_feed_topic(topic)?;
        self.client.unsubscribe(topic).await
    }

    fn check_not_feed_topic(&self, topic: &str) -> ClientResult<()> {
        let identity = self.client.identity();
        if topic == topics::user_notifications(&identity.user_id)
            || topic == topics::broadcast(identity.user_type)
        {
            return Err(ClientError::ReservedTopic(topic.to_string()));
        }
        Ok(())
    }

    /// `send_notification` with [`NotificationKind::Success`]
    pub async fn notify_success(
        &self,
        target_user_id: &str,
        title: &str,
        message: &str,
        data: Option<Map<String, Value>>,
    ) -> ClientResult<()> {
        self.send_notification(target_user_id, title, message, NotificationKind::Success, data)
            .await
    }

    /// `send_notification` with [`NotificationKind::Error`]
    pub async fn notify_error(
        &self,
        target_user_id: &str,
        title: &str,
        message: &str,
        data: Option<Map<String, Value>>,
    ) -> ClientResult<()> {
        self.send_notification(target_user_id, title, message, NotificationKind::Error, data)
            .await
    }

    /// `send_notification` with [`NotificationKind::Warning`]
    pub async fn notify_warning(
        &self,
        target_user_id: &str,
        title: &str,
        message: &str,
        data: Option<Map<String, Value>>,
    ) -> ClientResult<()> {
        self.send_notification(target_user_id, title, message, NotificationKind::Warning, data)
            .await
    }

    /// `send_notification` with [`NotificationKind::Info`]
    pub async fn notify_info(
        &self,
        target_user_id: &str,
        title: &str,
        message: &str,
        data: Option<Map<String, Value>>,
    ) -> ClientResult<()> {
        self.send_notification(target_user_id, title, message, NotificationKind::Info, data)
            .await
    }

    /// `broadcast_notification` with [`NotificationKind::Success`]
    pub async fn broadcast_success(
        &self,
        target_user_type: UserType,
        title: &str,
        message: &str,
        data: Option<Map<String, Value>>,
    ) -> ClientResult<()> {
        self.broadcast_notification(target_user_type, title, message, NotificationKind::Success, data)
            .await
    }

    /// `broadcast_notification` with [`NotificationKind::Error`]
    pub async fn broadcast_error(
        &self,
        target_user_type: UserType,
        title: &str,
        message: &str,
        data: Option<Map<String, Value>>,
    ) -> ClientResult<()> {
        self.broadcast_notification(target_user_type, title, message, NotificationKind::Error, data)
            .await
    }

    /// `broadcast_notification` with [`NotificationKind::Warning`]
    pub async fn broadcast_warning(
        &self,
        target_user_type: UserType,
        title: &str,
        message: &str,
        data: Option<Map<String, Value>>,
    ) -> ClientResult<()> {
        self.broadcast_notification(target_user_type, title, message, NotificationKind::Warning, data)
            .await
    }

    /// `broadcast_notification` with [`NotificationKind::Info`]
    pub async fn broadcast_info(
        &self,
        target_user_type: UserType,
        title: &str,
        message: &str,
        data: Option<Map<String, Value>>,
    ) -> ClientResult<()> {
        self.broadcast_notification(target_user_type, title, message, NotificationKind::Info, data)
            .await
    }

    /// Close the connection. The feed is kept.
    pub async fn close(&self) {
        self.client.close().await;
    }
}
