use super::Bot;
use crate::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// What a hook's `on_error` does with a login error.
#[derive(Debug)]
pub enum ErrorAction {
    /// Let the next option see the error.
    Pass,
    /// Treat the login call as successful.
    Swallow,
    /// Fail the login with a different error.
    Replace(Error),
}

type BotCallback = Arc<dyn Fn(&Bot) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&Error) -> ErrorAction + Send + Sync>;

/// Caller closures around a login attempt.
#[derive(Clone, Default)]
pub struct LoginHook {
    pub(crate) prepare: Option<BotCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
    pub(crate) on_success: Option<BotCallback>,
}

impl LoginHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs before the first request of the attempt.
    pub fn prepare(mut self, f: impl Fn(&Bot) + Send + Sync + 'static) -> Self {
        self.prepare = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&Error) -> ErrorAction + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Runs after web init and status notify, before the sync loop starts.
    pub fn on_success(mut self, f: impl Fn(&Bot) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for LoginHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginHook")
            .field("prepare", &self.prepare.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_success", &self.on_success.is_some())
            .finish()
    }
}

/// Options for the login entry points, evaluated in order.
#[derive(Clone, Debug)]
pub enum LoginOption {
    /// Fall back to a scan login when a hot or push login fails with an
    /// invalid session or finds nothing stored.
    RetryWithScan,
    /// Dump the session to storage at this interval while running.
    SyncReloadData(Duration),
    Hook(LoginHook),
}

impl LoginOption {
    pub fn hook(hook: LoginHook) -> Self {
        Self::Hook(hook)
    }

    /// Whether `err` is one the scan fallback should take over.
    pub(crate) fn retry_applies(err: &Error) -> bool {
        err.is_login_invalid()
            || matches!(err, Error::Store(crate::error::StoreError::Empty))
            || matches!(err, Error::Login(crate::error::LoginError::PushRejected(_)))
    }
}

pub(crate) fn run_prepare(options: &[LoginOption], bot: &Bot) {
    for option in options {
        if let LoginOption::Hook(LoginHook {
            prepare: Some(f), ..
        }) = option
        {
            f(bot);
        }
    }
}

pub(crate) fn run_on_success(options: &[LoginOption], bot: &Bot) {
    for option in options {
        match option {
            LoginOption::Hook(LoginHook {
                on_success: Some(f),
                ..
            }) => f(bot),
            LoginOption::SyncReloadData(every) => bot.spawn_reload_dumper(*every),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LoginError, Ret, StoreError};

    #[test]
    fn retry_applies_to_invalid_or_missing_sessions() {
        assert!(LoginOption::retry_applies(&Error::Ret(Ret::CookieInvalid)));
        assert!(LoginOption::retry_applies(&Error::Ret(Ret::TicketError)));
        assert!(LoginOption::retry_applies(&Error::Store(StoreError::Empty)));
        assert!(LoginOption::retry_applies(&Error::Login(LoginError::PushRejected(
            "x".into()
        ))));
        assert!(!LoginOption::retry_applies(&Error::Network("reset".into())));
        assert!(!LoginOption::retry_applies(&Error::LoginForbidden));
    }

    #[test]
    fn hook_debug_shows_installed_callbacks() {
        let hook = LoginHook::new().on_error(|_| ErrorAction::Pass);
        let text = format!("{:?}", hook);
        assert!(text.contains("on_error: true"));
        assert!(text.contains("prepare: false"));
    }
}
