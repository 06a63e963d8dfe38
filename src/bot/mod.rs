//! The bot: login lifecycle, sync loop and the user-facing API.

mod intake;
mod login;
mod options;
mod sync;

pub use options::{ErrorAction, LoginHook, LoginOption};

use crate::api::{MediaKind, WebApi};
use crate::config::BotConfig;
use crate::contact::{ContactCache, SelfUser};
use crate::error::{default_sync_error_handler, Error, StoreError, SyncErrorHandler};
use crate::events::{dispatch, Event, EventHandler};
use crate::store::{HotReloadData, Storage};
use crate::transport::{HttpTransport, Transport};
use crate::types::{Credentials, Message, SentMessage, SyncKey, User};
use crate::Result;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Lifecycle of one bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    Uninit,
    /// Scan login in progress.
    AwaitingQr,
    /// Hot or push login in progress.
    Resuming,
    /// Web init and status notify.
    Initializing,
    Running,
    /// Terminal; see [`Bot::crash_reason`].
    Stopped,
}

/// Logged-in session record.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub creds: Credentials,
    pub self_user: User,
    /// Written only by the sync loop after login.
    pub sync_key: SyncKey,
}

pub(crate) struct BotInner {
    pub(crate) api: WebApi,
    state: parking_lot::RwLock<BotState>,
    pub(crate) session: tokio::sync::RwLock<Option<Session>>,
    pub(crate) contacts: parking_lot::RwLock<ContactCache>,
    handlers: tokio::sync::RwLock<Vec<EventHandler>>,
    storage: parking_lot::RwLock<Option<Storage>>,
    sync_error_handler: parking_lot::RwLock<SyncErrorHandler>,
    crash_reason: parking_lot::RwLock<Option<Arc<Error>>>,
    stopping: AtomicBool,
    pub(crate) token: CancellationToken,
}

/// Client for the web gateway. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct Bot {
    pub(crate) inner: Arc<BotInner>,
}

impl Bot {
    /// Bot over the default HTTP transport.
    pub fn new(config: BotConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Bot with the desktop login patch enabled.
    pub fn desktop() -> Result<Self> {
        Self::new(BotConfig::desktop())
    }

    pub fn with_transport(config: BotConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(BotInner {
                api: WebApi::new(transport, config),
                state: parking_lot::RwLock::new(BotState::Uninit),
                session: tokio::sync::RwLock::new(None),
                contacts: parking_lot::RwLock::new(ContactCache::new()),
                handlers: tokio::sync::RwLock::new(Vec::new()),
                storage: parking_lot::RwLock::new(None),
                sync_error_handler: parking_lot::RwLock::new(
                    Arc::new(default_sync_error_handler) as SyncErrorHandler,
                ),
                crash_reason: parking_lot::RwLock::new(None),
                stopping: AtomicBool::new(false),
                token: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &BotConfig {
        self.inner.api.config()
    }

    /// Add an event handler (called for every event).
    pub async fn add_event_handler<F>(&self, f: F)
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.inner.handlers.write().await.push(Box::new(f));
    }

    /// Add a handler that only sees normalized inbound messages.
    pub async fn on_message<F>(&self, f: F)
    where
        F: Fn(Arc<Message>) + Send + Sync + 'static,
    {
        self.add_event_handler(move |evt| {
            if let Event::Message(msg) = evt {
                f(msg);
            }
        })
        .await;
    }

    /// Storage that successful logins dump to.
    pub fn set_storage(&self, storage: Storage) {
        *self.inner.storage.write() = Some(storage);
    }

    pub fn storage(&self) -> Option<Storage> {
        self.inner.storage.read().clone()
    }

    /// Replace the policy deciding which sync errors stop the session.
    pub fn set_sync_error_handler<F>(&self, f: F)
    where
        F: Fn(Error) -> Option<Error> + Send + Sync + 'static,
    {
        *self.inner.sync_error_handler.write() = Arc::new(f);
    }

    pub(crate) fn sync_error_handler(&self) -> SyncErrorHandler {
        self.inner.sync_error_handler.read().clone()
    }

    pub fn state(&self) -> BotState {
        *self.inner.state.read()
    }

    pub(crate) fn set_state(&self, state: BotState) {
        let mut current = self.inner.state.write();
        if *current != BotState::Stopped {
            tracing::debug!(from = ?*current, to = ?state, "bot state");
            *current = state;
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == BotState::Running && !self.inner.token.is_cancelled()
    }

    /// Error that terminated the session, if it crashed.
    pub fn crash_reason(&self) -> Option<Arc<Error>> {
        self.inner.crash_reason.read().clone()
    }

    /// Wait until the session ends and [`Event::LoggedOut`] has been
    /// delivered. Returns the terminating error, wrapped in
    /// [`Error::Exited`], when it crashed.
    pub async fn block(&self) -> Result<()> {
        if self.state() == BotState::Uninit && !self.inner.token.is_cancelled() {
            return Err(Error::NotLoggedIn);
        }
        self.inner.token.cancelled().await;
        match self.crash_reason() {
            Some(err) => Err(Error::Exited(err)),
            None => Ok(()),
        }
    }

    /// Log out on the server and stop the session.
    pub async fn logout(&self) -> Result<()> {
        let creds = self.credentials().await?;
        let result = self.inner.api.logout(&creds).await;
        self.stop(None).await;
        result
    }

    /// Stop locally without telling the server.
    pub async fn exit(&self) {
        self.stop(None).await;
    }

    pub(crate) async fn stop(&self, reason: Option<Error>) {
        if self.inner.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        let reason = reason.map(Arc::new);
        match &reason {
            Some(err) => {
                tracing::error!(error = %err, "session stopped");
                *self.inner.crash_reason.write() = Some(Arc::clone(err));
            }
            None => tracing::info!("session closed"),
        }
        self.set_state(BotState::Stopped);
        self.emit(Event::LoggedOut { reason }).await;
        self.inner.token.cancel();
    }

    pub(crate) async fn emit(&self, event: Event) {
        let handlers = self.inner.handlers.read().await;
        dispatch(&handlers, &event);
    }

    pub(crate) fn ensure_running(&self) -> Result<()> {
        if self.inner.stopping.load(Ordering::SeqCst) || self.inner.token.is_cancelled() {
            return Err(Error::SessionClosed);
        }
        if self.state() != BotState::Running {
            return Err(Error::NotLoggedIn);
        }
        Ok(())
    }

    /// Snapshot of the current credentials.
    pub(crate) async fn credentials(&self) -> Result<Credentials> {
        Ok(self.identity().await?.0)
    }

    /// Credentials plus the logged-in user.
    pub(crate) async fn identity(&self) -> Result<(Credentials, User)> {
        self.ensure_running()?;
        let session = self.inner.session.read().await;
        let session = session.as_ref().ok_or(Error::NotLoggedIn)?;
        Ok((session.creds.clone(), session.self_user.clone()))
    }

    /// Handle to the logged-in user and the contact cache.
    pub async fn self_user(&self) -> Result<SelfUser> {
        let (_, user) = self.identity().await?;
        Ok(SelfUser::new(self.clone(), user))
    }

    /// Write the current session to the attached storage.
    pub async fn dump_hot_reload_storage(&self) -> Result<()> {
        let storage = self
            .storage()
            .ok_or_else(|| StoreError::Save("no storage attached".into()))?;
        let creds = self.credentials().await?;
        self.dump_to(&storage, &creds).await
    }

    pub(crate) async fn dump_to(&self, storage: &Storage, creds: &Credentials) -> Result<()> {
        let data = HotReloadData {
            cookies: self.inner.api.transport().cookies(),
            login_info: creds.login_info.clone(),
            base_request: creds.base_request.clone(),
            domain: creds.domain.base_host.clone(),
        };
        storage.save(&data).await
    }

    pub(crate) fn spawn_reload_dumper(&self, every: Duration) {
        let Some(storage) = self.storage() else {
            tracing::warn!("periodic dump requested without storage");
            return;
        };
        let bot = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = bot.inner.token.cancelled() => break,
                    _ = tokio::time::sleep(every) => {}
                }
                let creds = match bot.credentials().await {
                    Ok(creds) => creds,
                    Err(_) => continue,
                };
                if let Err(e) = bot.dump_to(&storage, &creds).await {
                    tracing::warn!(error = %e, "periodic dump failed");
                }
            }
        });
    }

    pub async fn send_text(&self, to: &str, text: &str) -> Result<SentMessage> {
        let (creds, me) = self.identity().await?;
        self.inner.api.send_text(&creds, &me.user_name, to, text).await
    }

    /// Reply in the conversation `msg` came from.
    pub async fn reply_text(&self, msg: &Message, text: &str) -> Result<SentMessage> {
        self.send_text(msg.chat_user_name(), text).await
    }

    pub async fn send_image(
        &self,
        to: &str,
        file_name: &str,
        data: impl Into<Bytes>,
    ) -> Result<SentMessage> {
        let (creds, me) = self.identity().await?;
        let media = self
            .inner
            .api
            .upload_media(&creds, &me.user_name, to, file_name, data.into())
            .await?;
        self.inner
            .api
            .send_image(&creds, &me.user_name, to, &media.media_id)
            .await
    }

    pub async fn send_video(
        &self,
        to: &str,
        file_name: &str,
        data: impl Into<Bytes>,
    ) -> Result<SentMessage> {
        let (creds, me) = self.identity().await?;
        let media = self
            .inner
            .api
            .upload_media(&creds, &me.user_name, to, file_name, data.into())
            .await?;
        self.inner
            .api
            .send_video(&creds, &me.user_name, to, &media.media_id)
            .await
    }

    /// Upload and send; images and videos go out as such, anything else as
    /// an attachment.
    pub async fn send_file(
        &self,
        to: &str,
        file_name: &str,
        data: impl Into<Bytes>,
    ) -> Result<SentMessage> {
        let (creds, me) = self.identity().await?;
        let api = &self.inner.api;
        let media = api
            .upload_media(&creds, &me.user_name, to, file_name, data.into())
            .await?;
        match media.kind {
            MediaKind::Image => api.send_image(&creds, &me.user_name, to, &media.media_id).await,
            MediaKind::Video => api.send_video(&creds, &me.user_name, to, &media.media_id).await,
            MediaKind::File => api.send_file(&creds, &me.user_name, to, &media).await,
        }
    }

    /// Send a raw `<appmsg>` document.
    pub async fn send_structured(&self, to: &str, content: &str) -> Result<SentMessage> {
        let (creds, me) = self.identity().await?;
        self.inner
            .api
            .send_structured(&creds, &me.user_name, to, content)
            .await
    }

    pub async fn revoke(&self, sent: &SentMessage) -> Result<()> {
        let creds = self.credentials().await?;
        self.inner.api.revoke_message(&creds, sent).await
    }

    /// Download the image, voice, video or attachment of `msg`.
    pub async fn fetch_media(&self, msg: &Message) -> Result<Bytes> {
        let creds = self.credentials().await?;
        self.inner.api.fetch_media(&creds, msg).await
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("state", &self.state())
            .field("mode", &self.config().mode)
            .finish()
    }
}
