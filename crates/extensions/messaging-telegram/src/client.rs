//! [`MessagingClient`] over the Telegram Bot API.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use ratewatch_protocols::{
    ConnectionEvent, GroupInfo, MessagingClient, MessagingError, NotifyTarget,
};
use serde_json::json;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{BotApi, ChatMember, Update, User, groups_from_updates};
use crate::credentials::CredentialStore;
use crate::error::ApiError;

/// Client settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot API base URL.
    pub api_base: String,
    /// Chat id of the operator; used as the fallback recipient.
    pub owner_chat_id: Option<String>,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// How often the connection is probed with `getMe`.
    pub health_check_interval: Duration,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            owner_chat_id: None,
            request_timeout: Duration::from_secs(10),
            health_check_interval: Duration::from_secs(30),
        }
    }
}

struct Inner {
    api: BotApi,
    store: CredentialStore,
    token: RwLock<Option<String>>,
    me: RwLock<Option<User>>,
    groups: Mutex<BTreeMap<i64, GroupInfo>>,
    next_update: Mutex<i64>,
    events: broadcast::Sender<ConnectionEvent>,
    /// Last event sent on `events`, whoever sent it.
    last_event: Mutex<Option<ConnectionEvent>>,
}

impl Inner {
    fn token(&self) -> Result<String, MessagingError> {
        self.token.read().clone().ok_or(MessagingError::NotConnected)
    }

    fn emit(&self, event: ConnectionEvent) {
        let mut last = self.last_event.lock();
        *last = Some(event);
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Emit `event` unless it was the last one sent. Returns whether it was sent.
    fn emit_change(&self, event: ConnectionEvent) -> bool {
        let mut last = self.last_event.lock();
        if *last == Some(event) {
            return false;
        }
        *last = Some(event);
        let _ = self.events.send(event);
        true
    }

    /// Verify `token` with `getMe` and adopt it.
    async fn authenticate(&self, token: String) -> Result<User, ApiError> {
        let me: User = self.api.call(&token, "getMe", &json!({})).await?;
        *self.token.write() = Some(token);
        *self.me.write() = Some(me.clone());
        Ok(me)
    }

    fn load_token(&self) -> Result<String, MessagingError> {
        self.store
            .load()?
            .map(|c| c.bot_token)
            .ok_or_else(|| {
                MessagingError::CredentialStore(format!(
                    "{}: no bot token stored",
                    self.store.path().display()
                ))
            })
    }
}

struct HealthTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Telegram bot client.
pub struct TelegramClient {
    inner: Arc<Inner>,
    config: TelegramConfig,
    health: Mutex<Option<HealthTask>>,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig, store: CredentialStore) -> Result<Self, MessagingError> {
        let api = BotApi::new(&config.api_base, config.request_timeout)
            .map_err(ApiError::into_connection_error)?;
        let (events, _) = broadcast::channel(16);

        Ok(Self {
            inner: Arc::new(Inner {
                api,
                store,
                token: RwLock::new(None),
                me: RwLock::new(None),
                groups: Mutex::new(BTreeMap::new()),
                next_update: Mutex::new(0),
                events,
                last_event: Mutex::new(None),
            }),
            config,
            health: Mutex::new(None),
        })
    }

    /// The bot account, once connected.
    pub fn bot_user(&self) -> Option<User> {
        self.inner.me.read().clone()
    }

    fn ensure_health_task(&self) {
        let mut health = self.health.lock();
        if health.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(health_loop(
            self.inner.clone(),
            self.config.health_check_interval,
            cancel.clone(),
        ));
        *health = Some(HealthTask { cancel, handle });
    }

    async fn fetch_updates(&self, token: &str) -> Result<(), ApiError> {
        let offset = *self.inner.next_update.lock();
        let updates: Vec<Update> = self
            .inner
            .api
            .call(
                token,
                "getUpdates",
                &json!({
                    "offset": offset,
                    "timeout": 0,
                    "allowed_updates": ["message", "my_chat_member"],
                }),
            )
            .await?;

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            *self.inner.next_update.lock() = last + 1;
        }
        groups_from_updates(&mut self.inner.groups.lock(), &updates);
        debug!("Processed {} updates", updates.len());
        Ok(())
    }

    /// Group creator, if the bot may read the admin list.
    async fn group_owner(&self, token: &str, chat_id: &str) -> Option<String> {
        let admins: Vec<ChatMember> = self
            .inner
            .api
            .call(token, "getChatAdministrators", &json!({ "chat_id": chat_id }))
            .await
            .map_err(|e| debug!("No admin list for {}: {}", chat_id, e))
            .ok()?;
        admins
            .into_iter()
            .find(|m| m.status == "creator")
            .map(|m| m.user.id.to_string())
    }
}

#[async_trait]
impl MessagingClient for TelegramClient {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn connect(&self) -> Result<(), MessagingError> {
        let token = self.inner.load_token()?;
        let me = match self.inner.authenticate(token).await {
            Ok(me) => me,
            Err(e) => {
                let err = e.into_connection_error();
                if matches!(err, MessagingError::LoggedOut(_)) {
                    self.inner.emit(ConnectionEvent::LoggedOut);
                }
                return Err(err);
            }
        };

        info!(
            "Connected to Telegram as @{}",
            me.username.as_deref().unwrap_or(&me.first_name)
        );
        self.inner.emit(ConnectionEvent::Connected);
        self.ensure_health_task();
        Ok(())
    }

    async fn send_message(
        &self,
        recipient: &NotifyTarget,
        text: &str,
    ) -> Result<(), MessagingError> {
        let token = self.inner.token()?;
        let result: Result<serde_json::Value, ApiError> = self
            .inner
            .api
            .call(
                &token,
                "sendMessage",
                &json!({
                    "chat_id": recipient.id(),
                    "text": text,
                }),
            )
            .await;

        match result {
            Ok(_) => {
                debug!("Message delivered to {}", recipient);
                Ok(())
            }
            Err(e) => {
                if e.is_unauthorized() {
                    self.inner.emit(ConnectionEvent::LoggedOut);
                }
                Err(e.into_send_error())
            }
        }
    }

    async fn list_groups(&self) -> Result<Vec<GroupInfo>, MessagingError> {
        let token = self.inner.token()?;
        if let Err(e) = self.fetch_updates(&token).await {
            if e.is_unauthorized() {
                self.inner.emit(ConnectionEvent::LoggedOut);
            }
            return Err(e.into_lookup_error());
        }

        let mut groups: Vec<GroupInfo> = self.inner.groups.lock().values().cloned().collect();
        for group in groups.iter_mut().filter(|g| g.owner_id.is_none()) {
            if let Some(owner) = self.group_owner(&token, &group.id).await {
                group.owner_id = Some(owner);
            }
        }

        // Keep discovered owners for the next listing.
        let mut known = self.inner.groups.lock();
        for group in &groups {
            let Ok(id) = group.id.parse::<i64>() else {
                continue;
            };
            if let Some(entry) = known.get_mut(&id) {
                entry.owner_id.clone_from(&group.owner_id);
            }
        }
        Ok(groups)
    }

    fn own_id(&self) -> Option<String> {
        self.config.owner_chat_id.clone()
    }

    async fn reauthenticate(&self) -> Result<(), MessagingError> {
        let token = self.inner.load_token()?;
        match self.inner.authenticate(token).await {
            Ok(me) => {
                info!("Re-authenticated as bot {}", me.id);
                self.inner.emit(ConnectionEvent::Connected);
                self.ensure_health_task();
                Ok(())
            }
            Err(e) => Err(e.into_connection_error()),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }

    async fn disconnect(&self) {
        let task = self.health.lock().take();
        if let Some(task) = task {
            task.cancel.cancel();
            let _ = task.handle.await;
        }
        debug!("Telegram client stopped");
    }
}

/// Probe `getMe` periodically and report changes against the last event sent.
async fn health_loop(inner: Arc<Inner>, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let body = json!({});

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let Ok(token) = inner.token() else {
            continue;
        };
        let probe: Result<User, ApiError> = tokio::select! {
            _ = cancel.cancelled() => return,
            r = inner.api.call(&token, "getMe", &body) => r,
        };

        let observed = match probe {
            Ok(_) => ConnectionEvent::Connected,
            Err(e) if e.is_unauthorized() => ConnectionEvent::LoggedOut,
            Err(e) => {
                debug!("Health probe failed: {}", e);
                ConnectionEvent::Disconnected
            }
        };

        if inner.emit_change(observed) {
            match observed {
                ConnectionEvent::Connected => info!("Telegram connection restored"),
                ConnectionEvent::Disconnected => warn!("Telegram connection lost"),
                ConnectionEvent::LoggedOut => warn!("Telegram bot token rejected"),
            }
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
