use super::options::{run_on_success, run_prepare, ErrorAction, LoginHook, LoginOption};
use super::{Bot, BotState, Session};
use crate::error::{Error, LoginError, StoreError};
use crate::events::Event;
use crate::protocol::{qrcode_url, LoginStatus};
use crate::store::{HotReloadData, Storage};
use crate::types::{BaseRequest, Credentials};
use crate::Result;

/// Status-notify code announcing this endpoint after login.
const NOTIFY_LOGIN: i32 = 3;

impl Bot {
    /// Scan login: publishes [`Event::Uuid`] and waits for confirmation.
    pub async fn login(&self) -> Result<()> {
        self.login_with(&[]).await
    }

    pub async fn login_with(&self, options: &[LoginOption]) -> Result<()> {
        self.begin_login()?;
        run_prepare(options, self);
        let result = self.scan_login(options).await;
        self.finish_login(result, options, false).await
    }

    /// Resume a dumped session without scanning.
    pub async fn hot_login(&self, storage: Storage, options: &[LoginOption]) -> Result<()> {
        self.begin_login()?;
        self.set_storage(storage.clone());
        run_prepare(options, self);
        self.set_state(BotState::Resuming);
        let result = self.resume(&storage, options).await;
        self.finish_login(result, options, true).await
    }

    /// Ask the phone of the dumped account to confirm; no QR involved.
    pub async fn push_login(&self, storage: Storage, options: &[LoginOption]) -> Result<()> {
        self.begin_login()?;
        self.set_storage(storage.clone());
        run_prepare(options, self);
        self.set_state(BotState::Resuming);
        let result = self.push(&storage, options).await;
        self.finish_login(result, options, true).await
    }

    fn begin_login(&self) -> Result<()> {
        if self.inner.token.is_cancelled() {
            return Err(Error::SessionClosed);
        }
        match self.state() {
            BotState::Uninit => Ok(()),
            state => Err(anyhow::anyhow!("login already attempted or running (state {:?})", state).into()),
        }
    }

    async fn finish_login(
        &self,
        result: Result<()>,
        options: &[LoginOption],
        allow_retry: bool,
    ) -> Result<()> {
        let outcome = match result {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::warn!(error = %err, "login attempt failed");
                self.handle_login_error(err, options, allow_retry).await
            }
        };
        if !self.is_running() {
            self.set_state(BotState::Uninit);
        }
        outcome
    }

    /// Walk the options in order; the first that takes the error decides.
    /// A failed scan fallback is walked again, without a further retry.
    async fn handle_login_error(
        &self,
        mut err: Error,
        options: &[LoginOption],
        mut allow_retry: bool,
    ) -> Result<()> {
        'walk: loop {
            for option in options {
                match option {
                    LoginOption::RetryWithScan
                        if allow_retry && LoginOption::retry_applies(&err) =>
                    {
                        tracing::info!(error = %err, "falling back to scan login");
                        match self.scan_login(options).await {
                            Ok(()) => return Ok(()),
                            Err(e) => {
                                tracing::warn!(error = %e, "scan fallback failed");
                                err = e;
                                allow_retry = false;
                                continue 'walk;
                            }
                        }
                    }
                    LoginOption::Hook(LoginHook {
                        on_error: Some(f), ..
                    }) => match f(&err) {
                        ErrorAction::Pass => {}
                        ErrorAction::Swallow => return Ok(()),
                        ErrorAction::Replace(other) => return Err(other),
                    },
                    _ => {}
                }
            }
            return Err(err);
        }
    }

    async fn scan_login(&self, options: &[LoginOption]) -> Result<()> {
        self.set_state(BotState::AwaitingQr);
        let uuid = self.inner.api.get_uuid().await?;
        tracing::info!(uuid = %uuid, "login uuid acquired");
        self.emit(Event::Uuid {
            qr_url: qrcode_url(&uuid),
            uuid: uuid.clone(),
        })
        .await;
        let redirect_uri = self.wait_for_confirmation(&uuid, 0).await?;
        self.complete_login(&redirect_uri, options).await
    }

    async fn resume(&self, storage: &Storage, options: &[LoginOption]) -> Result<()> {
        let data = self.load_dump(storage).await?;
        let creds = Credentials {
            domain: data.domain_group(),
            login_info: data.login_info,
            base_request: data.base_request,
        };
        tracing::info!(host = %creds.domain.base_host, "resuming stored session");
        self.converge(creds, options).await
    }

    async fn push(&self, storage: &Storage, options: &[LoginOption]) -> Result<()> {
        let data = self.load_dump(storage).await?;
        let domain = data.domain_group();
        let uuid = self
            .inner
            .api
            .push_login(&domain, data.login_info.wx_uin)
            .await?;
        tracing::info!(uuid = %uuid, "push login sent to phone");
        let redirect_uri = self.wait_for_confirmation(&uuid, 1).await?;
        self.complete_login(&redirect_uri, options).await
    }

    async fn load_dump(&self, storage: &Storage) -> Result<HotReloadData> {
        let data = storage
            .load()
            .await?
            .filter(HotReloadData::is_usable)
            .ok_or(StoreError::Empty)?;
        self.inner.api.transport().load_cookies(&data.cookies)?;
        Ok(data)
    }

    /// Poll check-login until confirmed. `first_tip` is sent once, then 0.
    async fn wait_for_confirmation(&self, uuid: &str, first_tip: u8) -> Result<String> {
        let mut tip = first_tip;
        loop {
            let status = tokio::select! {
                _ = self.inner.token.cancelled() => return Err(LoginError::Cancelled.into()),
                status = self.inner.api.check_login(uuid, tip) => status?,
            };
            tip = 0;
            match status {
                LoginStatus::Waiting => tracing::trace!("still waiting for scan"),
                LoginStatus::Scanned { avatar } => {
                    tracing::info!("qr scanned, waiting for confirmation");
                    self.emit(Event::Scanned { avatar }).await;
                }
                LoginStatus::Confirmed { redirect_uri } => return Ok(redirect_uri),
                LoginStatus::Expired => return Err(LoginError::Timeout.into()),
                LoginStatus::Other(code) => return Err(LoginError::UnexpectedCode(code).into()),
            }
        }
    }

    async fn complete_login(&self, redirect_uri: &str, options: &[LoginOption]) -> Result<()> {
        let (info, domain) = self.inner.api.fetch_login_info(redirect_uri).await?;
        let creds = Credentials {
            base_request: BaseRequest::from_login_info(&info),
            login_info: info,
            domain,
        };
        self.converge(creds, options).await
    }

    /// Shared tail of every login path: init, notify, dump, start syncing.
    async fn converge(&self, mut creds: Credentials, options: &[LoginOption]) -> Result<()> {
        self.set_state(BotState::Initializing);
        let api = &self.inner.api;
        let init = api.web_init(&creds).await?;
        if !init.skey.is_empty() {
            creds.base_request.skey = init.skey.clone();
        }
        let me = init.user.clone();
        self.inner
            .contacts
            .write()
            .replace_all(init.contact_list, false);
        *self.inner.session.write().await = Some(Session {
            creds: creds.clone(),
            self_user: me.clone(),
            sync_key: init.sync_key,
        });

        api.status_notify(&creds, &me.user_name, &me.user_name, NOTIFY_LOGIN)
            .await?;

        if let Some(storage) = self.storage() {
            if let Err(e) = self.dump_to(&storage, &creds).await {
                tracing::warn!(error = %e, "session dump failed");
            }
        }
        run_on_success(options, self);
        self.set_state(BotState::Running);
        self.spawn_sync();
        tracing::info!(user = %me.nick_name, host = %creds.domain.base_host, "logged in");
        self.emit(Event::LoggedIn { user: me }).await;
        Ok(())
    }
}
