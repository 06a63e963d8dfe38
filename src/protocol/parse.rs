use crate::error::{check_ret, Error, LoginError, Ret};
use crate::types::{BaseResponse, LoginInfo, SyncCheckResponse};
use crate::Result;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

static UUID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"uuid = "(.*?)";"#).expect("uuid regex"));
static CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"window\.code\s*=\s*(\d+);").expect("code regex"));
static REDIRECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"window\.redirect_uri\s*=\s*"(.*?)""#).expect("redirect regex"));
static AVATAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"window\.userAvatar\s*=\s*'(.*?)'").expect("avatar regex"));
static RETCODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"retcode\s*:\s*"(\d+)""#).expect("retcode regex"));
static SELECTOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"selector\s*:\s*"(\d+)""#).expect("selector regex"));

fn capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn decode_error(what: &str, body: &str) -> Error {
    let preview: String = body.chars().take(120).collect();
    Error::Decode(format!("{} not found in {:?}", what, preview))
}

/// Extract the login UUID from the `jslogin` script.
pub fn parse_uuid(body: &str) -> Result<String> {
    match capture(&UUID_RE, body) {
        Some(uuid) if !uuid.is_empty() => Ok(uuid.to_string()),
        _ => Err(decode_error("uuid", body)),
    }
}

/// State reported by one check-login poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStatus {
    /// 408: nothing happened before the long poll expired.
    Waiting,
    /// 201: scanned, waiting for confirmation on the phone.
    Scanned { avatar: Option<Vec<u8>> },
    /// 200: confirmed; follow `redirect_uri` for credentials.
    Confirmed { redirect_uri: String },
    /// 400: the QR code expired.
    Expired,
    Other(String),
}

/// Parse the check-login script (`window.code=...;`).
pub fn parse_check_login(body: &str) -> Result<LoginStatus> {
    let code = capture(&CODE_RE, body).ok_or_else(|| decode_error("window.code", body))?;
    let status = match code {
        "408" => LoginStatus::Waiting,
        "201" => LoginStatus::Scanned {
            avatar: capture(&AVATAR_RE, body).and_then(decode_avatar),
        },
        "200" => {
            let redirect_uri = capture(&REDIRECT_RE, body)
                .filter(|uri| !uri.is_empty())
                .ok_or_else(|| {
                    Error::Login(LoginError::Protocol("code 200 without redirect_uri".into()))
                })?;
            LoginStatus::Confirmed {
                redirect_uri: redirect_uri.to_string(),
            }
        }
        "400" => LoginStatus::Expired,
        other => LoginStatus::Other(other.to_string()),
    };
    Ok(status)
}

/// Avatar arrives as a data URL; keep the decoded image bytes.
fn decode_avatar(raw: &str) -> Option<Vec<u8>> {
    let payload = match raw.find("base64,") {
        Some(pos) => &raw[pos + "base64,".len()..],
        None => raw,
    };
    if payload.is_empty() {
        return None;
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .ok()
}

/// Parse the XML returned by the post-confirmation redirect.
pub fn parse_login_info(body: &str) -> Result<LoginInfo> {
    let info: LoginInfo = quick_xml::de::from_str(body.trim())
        .map_err(|e| Error::Decode(format!("login xml: {}", e)))?;
    if info.ret == Ret::LoginEnvError.code() {
        return Err(Error::LoginForbidden);
    }
    check_ret(info.ret)?;
    if !info.has_credentials() {
        return Err(Error::LoginForbidden);
    }
    Ok(info)
}

/// Parse `window.synccheck={retcode:"0",selector:"2"}`.
pub fn parse_sync_check(body: &str) -> Result<SyncCheckResponse> {
    let retcode = capture(&RETCODE_RE, body).ok_or_else(|| decode_error("retcode", body))?;
    let selector = capture(&SELECTOR_RE, body).unwrap_or("0");
    Ok(SyncCheckResponse {
        retcode: retcode.to_string(),
        selector: selector.to_string(),
    })
}

/// Check the `BaseResponse` of any JSON envelope. A body without one is a
/// decode error.
pub fn check_base_response(body: &serde_json::Value) -> Result<()> {
    let base = body
        .get("BaseResponse")
        .ok_or_else(|| Error::Decode("missing BaseResponse".into()))?;
    let base: BaseResponse = serde_json::from_value(base.clone())?;
    base.check()
}
