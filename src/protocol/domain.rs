use super::{CGI_PATH, LOGIN_REDIRECT_URL};
use crate::error::{Error, LoginError};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Login mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Normal,
    /// Desktop-patched web login, accepted for accounts the plain web client rejects.
    Desktop,
}

impl Mode {
    /// `redirect_uri` value sent with the UUID request.
    pub fn redirect_uri(&self) -> String {
        match self {
            Self::Normal => LOGIN_REDIRECT_URL.to_string(),
            Self::Desktop => format!("{}?mod=desktop", LOGIN_REDIRECT_URL),
        }
    }

    pub fn is_desktop(&self) -> bool {
        matches!(self, Self::Desktop)
    }
}

/// Known `(base, file, sync)` host triples. The redirect host after login picks one.
pub const KNOWN_DOMAINS: &[(&str, &str, &str)] = &[
    ("wx.qq.com", "file.wx.qq.com", "webpush.wx.qq.com"),
    ("wx2.qq.com", "file.wx2.qq.com", "webpush.wx2.qq.com"),
    ("wx8.qq.com", "file.wx8.qq.com", "webpush.wx8.qq.com"),
    ("web2.wechat.com", "file.web2.wechat.com", "webpush.web2.wechat.com"),
    ("wechat.com", "file.web.wechat.com", "webpush.web.wechat.com"),
];

/// Host group used for the whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainGroup {
    pub base_host: String,
    pub file_host: String,
    pub sync_host: String,
}

impl Default for DomainGroup {
    fn default() -> Self {
        Self::from_host(KNOWN_DOMAINS[0].0)
    }
}

impl DomainGroup {
    /// Group for `host`; unknown hosts derive `file.` and `webpush.` siblings.
    pub fn from_host(host: &str) -> Self {
        let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
        if let Some((base, file, sync)) = KNOWN_DOMAINS.iter().find(|(base, ..)| *base == host) {
            return Self {
                base_host: base.to_string(),
                file_host: file.to_string(),
                sync_host: sync.to_string(),
            };
        }
        Self {
            file_host: format!("file.{}", host),
            sync_host: format!("webpush.{}", host),
            base_host: host,
        }
    }

    /// Group chosen from the host of a login redirect URL.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| Error::Login(LoginError::Protocol(format!("bad redirect url: {}", e))))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::Login(LoginError::Protocol("redirect url has no host".into())))?;
        Ok(Self::from_host(host))
    }

    /// `https://{base}/cgi-bin/mmwebwx-bin/{endpoint}`
    pub fn base_url(&self, endpoint: &str) -> String {
        format!("https://{}{}/{}", self.base_host, CGI_PATH, endpoint)
    }

    pub fn file_url(&self, endpoint: &str) -> String {
        format!("https://{}{}/{}", self.file_host, CGI_PATH, endpoint)
    }

    pub fn sync_url(&self, endpoint: &str) -> String {
        format!("https://{}{}/{}", self.sync_host, CGI_PATH, endpoint)
    }

    /// Origins whose cookies belong to this session.
    pub fn origins(&self) -> [String; 3] {
        [
            format!("https://{}/", self.base_host),
            format!("https://{}/", self.file_host),
            format!("https://{}/", self.sync_host),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desktop_mode_marks_redirect() {
        assert!(!Mode::Normal.redirect_uri().contains("mod=desktop"));
        assert!(Mode::Desktop.redirect_uri().ends_with("?mod=desktop"));
    }

    #[test]
    fn known_host_selects_group() {
        let group = DomainGroup::from_url(
            "https://wx2.qq.com/cgi-bin/mmwebwx-bin/webwxnewloginpage?ticket=abc&uuid=x",
        )
        .unwrap();
        assert_eq!(group.base_host, "wx2.qq.com");
        assert_eq!(group.file_host, "file.wx2.qq.com");
        assert_eq!(group.sync_host, "webpush.wx2.qq.com");
        assert_eq!(
            group.sync_url("synccheck"),
            "https://webpush.wx2.qq.com/cgi-bin/mmwebwx-bin/synccheck"
        );
    }

    #[test]
    fn wechat_com_uses_web_siblings() {
        let group = DomainGroup::from_host("wechat.com");
        assert_eq!(group.file_host, "file.web.wechat.com");
        assert_eq!(DomainGroup::from_host("web2.wechat.com").base_host, "web2.wechat.com");
    }

    #[test]
    fn unknown_host_derives_siblings() {
        let group = DomainGroup::from_host("wx9.qq.com");
        assert_eq!(group.file_host, "file.wx9.qq.com");
        assert_eq!(group.sync_host, "webpush.wx9.qq.com");
    }

    #[test]
    fn mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Desktop).unwrap(), "\"desktop\"");
    }
}
