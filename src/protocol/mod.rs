//! Wire protocol of the web gateway: endpoints, hosts, envelope parsing and
//! content normalization. Everything here is pure; network calls live in
//! [`crate::api`].

mod domain;
mod parse;
mod text;

pub use domain::{DomainGroup, Mode, KNOWN_DOMAINS};
pub use parse::{
    check_base_response, parse_check_login, parse_login_info, parse_sync_check, parse_uuid,
    LoginStatus,
};
pub use text::{format_emoji, normalize_content, unescape_html};

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Application id of the web client.
pub const APP_ID: &str = "wx782c26e4c19acffb";

/// UUID acquisition endpoint.
pub const JS_LOGIN_URL: &str = "https://login.wx.qq.com/jslogin";
/// QR image endpoint; the UUID is appended.
pub const QRCODE_URL: &str = "https://login.weixin.qq.com/qrcode/";
/// Long-poll check-login endpoint.
pub const CHECK_LOGIN_URL: &str = "https://login.wx.qq.com/cgi-bin/mmwebwx-bin/login";
/// Redirect target embedded in the UUID request.
pub const LOGIN_REDIRECT_URL: &str = "https://wx.qq.com/cgi-bin/mmwebwx-bin/webwxnewloginpage";

/// `client-version` header value sent in desktop mode.
pub const DESKTOP_CLIENT_VERSION: &str = "2.0.0";

/// Opaque `extspam` header value sent in desktop mode. Must be sent byte-exact.
pub const DESKTOP_EXTSPAM: &str = "Go8FCIkFEokFCggwMDAwMDAwMRAGGvAESySibk50w5Wb3uTl2c2h64jVVrV7gNs06GFlWplHQbY/5FfiO++1yH4ykCyNPWKXmco+wfQzK5R98D3so7rJ5LmGFvBLjGceleySrc3SOf2Pc1gVehzJgODeS0lDL3/I/0S2SSE98YgKleq6Uqx6ndTy9yaL9qFxJL7eiA/R3SEfTaW1SBoSITIu+EEkXff+Pv8NHOk7N57rcGk1w0ZzRrQDkXTOXFN2iHYIzAAZPIOY45Lsh+A4slpgnDiaOvRtlQYCt97nmPLuTipOJ8Qc5pM7ZsOsAPPrCQL7nK0I7aPrFDF0q4ziUUKettzW8MrAaiVfmbD1/VkmLNVqqZVvBCtRblXb5FHmtS8FxnqCzYP4WFvz3T0TcrOqwLX1M/DQvcHaGGw0B0y4bZMs7lVScGBFxMj3vbFi2SRKbKhaitxHfYHAOAa0X7/MSS0RNAjdwoyGHeOepXOKY+h3iHeqCvgOH6LOifdHf/1aaZNwSkGotYnYScW8Yx63LnSwba7+hESrtPa/huRmB9KWvMCKbDThL/nne14hnL277EDCSocPu3rOSYjuB9gKSOdVmWsj9Dxb/iZIe+S6AiG29Esm+/eUacSba0k8wn5HhHg9d4tIcixrxveflc8vi2/wNQGVFNsGO6tB5WF0xf/plngOvQ1/ivGV/C1Qpdhzznh0ExAVJ6dwzNg7qIEBaw+BzTJTUuRcPk92Sn6QDn2Pu3mpONaEumacjW4w6ipPnPw+g2TfywJjeEcpSZaP4Q3YV5HG8D6UjWA4GSkBKculWpdCMadx0usMomsSS/74QgpYqcPkmamB4nVv1JxczYITIqItIKjD35IGKAUwAA==";

/// Path prefix shared by every gateway endpoint.
pub const CGI_PATH: &str = "/cgi-bin/mmwebwx-bin";

/// The server rejects batch-detail requests with more handles than this.
pub const MAX_BATCH_CONTACTS: usize = 50;

/// Gateway endpoint names (last path segment).
pub mod endpoint {
    pub const WEB_INIT: &str = "webwxinit";
    pub const STATUS_NOTIFY: &str = "webwxstatusnotify";
    pub const SYNC_CHECK: &str = "synccheck";
    pub const SYNC: &str = "webwxsync";
    pub const GET_CONTACT: &str = "webwxgetcontact";
    pub const BATCH_GET_CONTACT: &str = "webwxbatchgetcontact";
    pub const SEND_MSG: &str = "webwxsendmsg";
    pub const SEND_MSG_IMG: &str = "webwxsendmsgimg";
    pub const SEND_APP_MSG: &str = "webwxsendappmsg";
    pub const SEND_VIDEO_MSG: &str = "webwxsendvideomsg";
    pub const REVOKE_MSG: &str = "webwxrevokemsg";
    pub const UPLOAD_MEDIA: &str = "webwxuploadmedia";
    pub const GET_MSG_IMG: &str = "webwxgetmsgimg";
    pub const GET_VOICE: &str = "webwxgetvoice";
    pub const GET_VIDEO: &str = "webwxgetvideo";
    pub const GET_MEDIA: &str = "webwxgetmedia";
    pub const OPLOG: &str = "webwxoplog";
    pub const VERIFY_USER: &str = "webwxverifyuser";
    pub const CREATE_CHATROOM: &str = "webwxcreatechatroom";
    pub const UPDATE_CHATROOM: &str = "webwxupdatechatroom";
    pub const PUSH_LOGIN: &str = "webwxpushloginurl";
    pub const LOGOUT: &str = "webwxlogout";
}

/// QR image URL for a login UUID.
pub fn qrcode_url(uuid: &str) -> String {
    format!("{}{}", QRCODE_URL, uuid)
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Client device id: `e` followed by 15 random decimal digits.
pub fn generate_device_id() -> String {
    let mut rng = rand::thread_rng();
    let digits: String = (0..15)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect();
    format!("e{}", digits)
}

/// Client-side message id (`LocalID`/`ClientMsgId`): timestamp plus four random digits.
pub fn generate_client_msg_id() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
    format!("{}{:04}", now_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn device_id_shape() {
        let re = Regex::new(r"^e[0-9]{15}$").unwrap();
        for _ in 0..100 {
            let id = generate_device_id();
            assert!(re.is_match(&id), "bad device id {id}");
        }
    }

    #[test]
    fn client_msg_id_is_numeric() {
        let id = generate_client_msg_id();
        assert!(id.len() >= 17);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn qrcode_url_appends_uuid() {
        assert_eq!(
            qrcode_url("4ZcMGGn_ZQ=="),
            "https://login.weixin.qq.com/qrcode/4ZcMGGn_ZQ=="
        );
    }
}
