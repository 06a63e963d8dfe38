//! Hot-reload storage: where a logged-in session is dumped so the next
//! run can resume without scanning.

mod file;
mod memory;

pub use file::JsonFileStorage;
pub use memory::MemoryStorage;

use crate::protocol::DomainGroup;
use crate::transport::CookieMap;
use crate::types::{BaseRequest, LoginInfo};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Dumped session: cookies by origin plus the login identifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HotReloadData {
    pub cookies: CookieMap,
    pub login_info: LoginInfo,
    pub base_request: BaseRequest,
    /// Base host the session was bound to; empty in older dumps.
    pub domain: String,
}

impl HotReloadData {
    /// Whether the dump can plausibly resume a session.
    pub fn is_usable(&self) -> bool {
        self.login_info.has_credentials() && !self.base_request.sid.is_empty()
    }

    /// Domain group recorded in the dump, else the one derived from cookie origins.
    pub fn domain_group(&self) -> DomainGroup {
        if !self.domain.is_empty() {
            return DomainGroup::from_host(&self.domain);
        }
        self.cookies
            .origins()
            .filter_map(|origin| reqwest::Url::parse(origin).ok())
            .filter_map(|url| url.host_str().map(str::to_string))
            .find(|host| !host.starts_with("file.") && !host.starts_with("webpush.") && !host.starts_with("login."))
            .map(|host| DomainGroup::from_host(&host))
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Persistence for [`HotReloadData`].
#[async_trait]
pub trait ReloadStorage: Send + Sync {
    /// Load the last dump. `Ok(None)` when nothing was saved yet.
    async fn load(&self) -> crate::Result<Option<HotReloadData>>;

    /// Replace the stored dump.
    async fn save(&self, data: &HotReloadData) -> crate::Result<()>;
}

/// Shared storage handle.
pub type Storage = Arc<dyn ReloadStorage>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StoredCookie;

    #[test]
    fn dump_uses_camel_case_keys() {
        let data = HotReloadData {
            domain: "wx2.qq.com".into(),
            ..Default::default()
        };
        let v: serde_json::Value = serde_json::from_slice(&data.to_json().unwrap()).unwrap();
        assert!(v.get("loginInfo").is_some());
        assert!(v.get("baseRequest").is_some());
        assert!(v.get("cookies").is_some());
    }

    #[test]
    fn domain_falls_back_to_cookie_origin() {
        let mut data = HotReloadData::default();
        data.cookies.insert(
            "https://file.wx8.qq.com/",
            StoredCookie::parse("a=1").unwrap(),
        );
        data.cookies.insert("https://wx8.qq.com/", StoredCookie::parse("b=2").unwrap());
        assert_eq!(data.domain_group().base_host, "wx8.qq.com");
        data.domain = "wx2.qq.com".into();
        assert_eq!(data.domain_group().base_host, "wx2.qq.com");
    }

    #[test]
    fn usable_requires_credentials() {
        let mut data = HotReloadData::default();
        assert!(!data.is_usable());
        data.login_info = LoginInfo {
            wx_uin: 1,
            wx_sid: "s".into(),
            skey: "k".into(),
            ..Default::default()
        };
        data.base_request = BaseRequest::from_login_info(&data.login_info);
        assert!(data.is_usable());
    }
}
