use crate::protocol::{generate_device_id, DomainGroup};
use serde::{Deserialize, Serialize};

/// Server-assigned session identifiers, parsed from the login XML
/// (`<error><ret/><wxuin/><wxsid/><skey/><pass_ticket/></error>`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginInfo {
    pub ret: i32,
    pub message: String,
    #[serde(rename = "wxuin")]
    pub wx_uin: i64,
    #[serde(rename = "wxsid")]
    pub wx_sid: String,
    pub skey: String,
    pub pass_ticket: String,
    #[serde(rename = "isgrayscale")]
    pub is_gray_scale: i32,
}

impl LoginInfo {
    /// True when the XML carried a usable credential set.
    pub fn has_credentials(&self) -> bool {
        !self.wx_sid.is_empty() && !self.skey.is_empty() && self.wx_uin != 0
    }
}

/// Envelope echoed in every authenticated POST body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BaseRequest {
    pub uin: i64,
    pub sid: String,
    pub skey: String,
    #[serde(rename = "DeviceID")]
    pub device_id: String,
}

impl BaseRequest {
    /// Build from login identifiers with a fresh device id.
    pub fn from_login_info(info: &LoginInfo) -> Self {
        Self {
            uin: info.wx_uin,
            sid: info.wx_sid.clone(),
            skey: info.skey.clone(),
            device_id: generate_device_id(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SyncKeyPair {
    pub key: i64,
    pub val: i64,
}

/// Opaque server-side sync cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SyncKey {
    pub count: i32,
    pub list: Vec<SyncKeyPair>,
}

impl SyncKey {
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Flattened form used by sync-check: `k1_v1|k2_v2|...`.
    pub fn flatten(&self) -> String {
        self.list
            .iter()
            .map(|p| format!("{}_{}", p.key, p.val))
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl std::fmt::Display for SyncKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.flatten())
    }
}

/// Snapshot of everything an authenticated call needs; cloned out of the
/// session so no lock is held across a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub domain: DomainGroup,
    pub login_info: LoginInfo,
    pub base_request: BaseRequest,
}

impl Credentials {
    pub fn skey(&self) -> &str {
        &self.base_request.skey
    }

    pub fn pass_ticket(&self) -> &str {
        &self.login_info.pass_ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_key_flattens_in_order() {
        let key = SyncKey {
            count: 2,
            list: vec![
                SyncKeyPair { key: 1, val: 100 },
                SyncKeyPair { key: 2, val: 200 },
            ],
        };
        assert_eq!(key.flatten(), "1_100|2_200");
        assert_eq!(SyncKey::default().flatten(), "");
    }

    #[test]
    fn base_request_wire_names() {
        let req = BaseRequest {
            uin: 123,
            sid: "SID".into(),
            skey: "SKEY".into(),
            device_id: "e123456789012345".into(),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["Uin"], 123);
        assert_eq!(v["Sid"], "SID");
        assert_eq!(v["Skey"], "SKEY");
        assert_eq!(v["DeviceID"], "e123456789012345");
    }

    #[test]
    fn base_request_from_login_info() {
        let info = LoginInfo {
            wx_uin: 9,
            wx_sid: "s".into(),
            skey: "k".into(),
            ..Default::default()
        };
        let req = BaseRequest::from_login_info(&info);
        assert_eq!(req.uin, 9);
        assert!(req.device_id.starts_with('e'));
        assert!(info.has_credentials());
    }
}
