use std::sync::Arc;
use thiserror::Error;

/// Library result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the web gateway.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure (connect, TLS, timeout, body read).
    #[error("network: {0}")]
    Network(String),

    /// The gateway answered with a non-zero ret code.
    #[error("ret: {0}")]
    Ret(#[from] Ret),

    #[error("login: {0}")]
    Login(#[from] LoginError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("send: {0}")]
    Send(#[from] SendError),

    /// The account is not allowed to use the web gateway.
    #[error("login forbidden: this account cannot log in to the web client")]
    LoginForbidden,

    /// A response did not have the expected shape.
    #[error("decode: {0}")]
    Decode(String),

    #[error("not logged in")]
    NotLoggedIn,

    #[error("session closed")]
    SessionClosed,

    /// The session terminated with the wrapped error.
    #[error("session exited: {0}")]
    Exited(Arc<Error>),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Ret code carried by this error, looking through [`Error::Exited`].
    pub fn ret(&self) -> Option<Ret> {
        match self {
            Self::Ret(ret) => Some(*ret),
            Self::Exited(inner) => inner.ret(),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Exited(inner) => inner.is_network(),
            _ => false,
        }
    }

    /// Whether the server considers the stored session dead (re-login needed).
    pub fn is_login_invalid(&self) -> bool {
        self.ret().is_some_and(|r| r.is_login_invalid())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Ret codes carried by `BaseResponse.Ret` and the sync-check `retcode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ret {
    TicketError,
    LogicError,
    SysError,
    ParamError,
    FailedLoginWarn,
    FailedLoginCheck,
    CookieInvalid,
    LoginEnvError,
    OptTooOften,
    Other(i32),
}

impl Ret {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => None,
            -14 => Some(Self::TicketError),
            -2 => Some(Self::LogicError),
            -1 => Some(Self::SysError),
            1 => Some(Self::ParamError),
            1100 => Some(Self::FailedLoginWarn),
            1101 => Some(Self::FailedLoginCheck),
            1102 => Some(Self::CookieInvalid),
            1203 => Some(Self::LoginEnvError),
            1205 => Some(Self::OptTooOften),
            other => Some(Self::Other(other)),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::TicketError => -14,
            Self::LogicError => -2,
            Self::SysError => -1,
            Self::ParamError => 1,
            Self::FailedLoginWarn => 1100,
            Self::FailedLoginCheck => 1101,
            Self::CookieInvalid => 1102,
            Self::LoginEnvError => 1203,
            Self::OptTooOften => 1205,
            Self::Other(code) => *code,
        }
    }

    /// Codes after which the session cannot continue.
    pub fn is_session_ended(&self) -> bool {
        matches!(
            self,
            Self::FailedLoginWarn | Self::FailedLoginCheck | Self::CookieInvalid
        )
    }

    pub fn is_login_invalid(&self) -> bool {
        self.is_session_ended() || matches!(self, Self::TicketError)
    }

    /// Worth retrying after a pause.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SysError | Self::OptTooOften)
    }
}

impl std::fmt::Display for Ret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::TicketError => "ticket error",
            Self::LogicError => "logic error",
            Self::SysError => "system error",
            Self::ParamError => "param error",
            Self::FailedLoginWarn => "failed login warn",
            Self::FailedLoginCheck => "failed login check",
            Self::CookieInvalid => "cookie invalid",
            Self::LoginEnvError => "login environmental error",
            Self::OptTooOften => "operate too often",
            Self::Other(_) => "unknown ret",
        };
        write!(f, "{} (ret {})", msg, self.code())
    }
}

impl std::error::Error for Ret {}

/// Turn a raw ret code into `Ok(())` or the matching [`Ret`] error.
pub fn check_ret(code: i32) -> Result<()> {
    match Ret::from_code(code) {
        None => Ok(()),
        Some(ret) => Err(Error::Ret(ret)),
    }
}

/// Login-flow errors.
#[derive(Error, Debug)]
pub enum LoginError {
    #[error("qr code expired before confirmation")]
    Timeout,

    #[error("unexpected check-login code {0}")]
    UnexpectedCode(String),

    #[error("push login rejected: {0}")]
    PushRejected(String),

    #[error("login cancelled")]
    Cancelled,

    #[error("protocol: {0}")]
    Protocol(String),
}

/// Reload-storage errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("save failed: {0}")]
    Save(String),

    #[error("load failed: {0}")]
    Load(String),

    #[error("storage is empty")]
    Empty,
}

/// Send/contact operation errors.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("empty media payload")]
    EmptyMedia,

    #[error("message has no downloadable media")]
    NoMedia,

    #[error("contact not found: {0}")]
    ContactNotFound(String),

    #[error("operation not supported for {0}")]
    Unsupported(&'static str),
}

/// Handler deciding what a sync-loop error does: `Some(err)` stops the
/// session with `err`, `None` swallows it and keeps syncing.
pub type SyncErrorHandler = Arc<dyn Fn(Error) -> Option<Error> + Send + Sync>;

/// Default sync-loop policy: only session-ending ret codes stop the bot.
pub fn default_sync_error_handler(err: Error) -> Option<Error> {
    match err.ret() {
        Some(ret) if ret.is_session_ended() => Some(err),
        _ => {
            tracing::warn!(error = %err, "sync error suppressed");
            None
        }
    }
}

/// Wrap `handler` so network errors are swallowed before it sees them.
pub fn ignore_network_error<F>(handler: F) -> impl Fn(Error) -> Option<Error> + Send + Sync
where
    F: Fn(Error) -> Option<Error> + Send + Sync,
{
    move |err: Error| {
        if err.is_network() {
            tracing::debug!(error = %err, "network error ignored");
            None
        } else {
            handler(err)
        }
    }
}
