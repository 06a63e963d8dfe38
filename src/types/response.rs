use super::session::SyncKey;
use super::user::User;
use crate::error::check_ret;
use crate::Result;
use serde::{Deserialize, Serialize};

/// `{ Ret, ErrMsg }` carried by every JSON envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BaseResponse {
    pub ret: i32,
    pub err_msg: String,
}

impl BaseResponse {
    pub fn ok(&self) -> bool {
        self.ret == 0
    }

    pub fn check(&self) -> Result<()> {
        check_ret(self.ret)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WebInitResponse {
    pub base_response: BaseResponse,
    pub count: i32,
    pub contact_list: Vec<User>,
    pub sync_key: SyncKey,
    pub user: User,
    pub chat_set: String,
    #[serde(rename = "SKey")]
    pub skey: String,
    pub client_version: i64,
    pub system_time: i64,
    pub gray_scale: i32,
    #[serde(rename = "MPSubscribeMsgCount")]
    pub mp_subscribe_msg_count: i32,
}

/// Known sync-check selectors. Any non-zero selector means "pull".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Normal,
    NewMsg,
    ModContact,
    AddOrDelContact,
    EnterOrLeaveChat,
    Other(u32),
}

impl Selector {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Normal,
            2 => Self::NewMsg,
            4 => Self::ModContact,
            6 => Self::AddOrDelContact,
            7 => Self::EnterOrLeaveChat,
            other => Self::Other(other),
        }
    }

    pub fn has_news(&self) -> bool {
        !matches!(self, Self::Normal)
    }
}

/// Parsed `window.synccheck={retcode:"..",selector:".."}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCheckResponse {
    pub retcode: String,
    pub selector: String,
}

impl SyncCheckResponse {
    pub fn retcode(&self) -> i32 {
        self.retcode.parse().unwrap_or(-1)
    }

    pub fn success(&self) -> bool {
        self.retcode == "0"
    }

    pub fn selector(&self) -> Selector {
        Selector::from_code(self.selector.parse().unwrap_or(0))
    }

    pub fn check(&self) -> Result<()> {
        check_ret(self.retcode())
    }
}

/// `webwxsync` reply. Messages stay raw JSON so intake can snapshot them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SyncResponse {
    pub base_response: BaseResponse,
    pub add_msg_count: i32,
    pub add_msg_list: Vec<serde_json::Value>,
    pub mod_contact_count: i32,
    pub mod_contact_list: Vec<User>,
    pub del_contact_count: i32,
    pub del_contact_list: Vec<User>,
    pub mod_chat_room_member_count: i32,
    pub mod_chat_room_member_list: Vec<User>,
    pub continue_flag: i32,
    pub sync_key: SyncKey,
    pub sync_check_key: SyncKey,
    #[serde(rename = "SKey")]
    pub skey: String,
}

impl SyncResponse {
    /// Cursor to adopt after this pull, if the server sent one.
    pub fn next_sync_key(&self) -> Option<&SyncKey> {
        if !self.sync_key.is_empty() {
            Some(&self.sync_key)
        } else if !self.sync_check_key.is_empty() {
            Some(&self.sync_check_key)
        } else {
            None
        }
    }
}

/// `webwxgetcontact` page; `seq != 0` means more pages follow.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContactListResponse {
    pub base_response: BaseResponse,
    pub member_count: i32,
    pub member_list: Vec<User>,
    pub seq: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BatchContactResponse {
    pub base_response: BaseResponse,
    pub count: i32,
    pub contact_list: Vec<User>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SendMessageResponse {
    pub base_response: BaseResponse,
    #[serde(rename = "MsgID")]
    pub msg_id: String,
    #[serde(rename = "LocalID")]
    pub local_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UploadMediaResponse {
    pub base_response: BaseResponse,
    pub media_id: String,
    pub start_pos: i64,
    #[serde(rename = "CDNThumbImgHeight")]
    pub cdn_thumb_img_height: i32,
    #[serde(rename = "CDNThumbImgWidth")]
    pub cdn_thumb_img_width: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateChatRoomResponse {
    pub base_response: BaseResponse,
    pub chat_room_name: String,
    pub topic: String,
    pub member_count: i32,
    pub member_list: Vec<User>,
}

/// `webwxpushloginurl` reply: `{"ret":"0","msg":"all ok","uuid":"..."}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PushLoginResponse {
    pub ret: String,
    pub msg: String,
    pub uuid: String,
}

impl PushLoginResponse {
    pub fn ok(&self) -> bool {
        self.ret == "0" && !self.uuid.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Ret;

    #[test]
    fn base_response_check() {
        let ok: BaseResponse = serde_json::from_str(r#"{"Ret":0,"ErrMsg":""}"#).unwrap();
        assert!(ok.check().is_ok());
        let bad: BaseResponse = serde_json::from_str(r#"{"Ret":1205,"ErrMsg":"slow down"}"#).unwrap();
        assert_eq!(bad.check().unwrap_err().ret(), Some(Ret::OptTooOften));
    }

    #[test]
    fn selector_semantics() {
        assert!(!Selector::from_code(0).has_news());
        assert_eq!(Selector::from_code(2), Selector::NewMsg);
        assert!(Selector::from_code(3).has_news());
    }

    #[test]
    fn sync_response_prefers_sync_key() {
        let resp: SyncResponse = serde_json::from_str(
            r#"{"BaseResponse":{"Ret":0},"AddMsgList":[],
                "SyncKey":{"Count":1,"List":[{"Key":1,"Val":7}]},
                "SyncCheckKey":{"Count":1,"List":[{"Key":1,"Val":8}]}}"#,
        )
        .unwrap();
        assert_eq!(resp.next_sync_key().unwrap().flatten(), "1_7");
    }

    #[test]
    fn sync_response_falls_back_to_check_key() {
        let resp: SyncResponse = serde_json::from_str(
            r#"{"BaseResponse":{"Ret":0},"SyncCheckKey":{"Count":1,"List":[{"Key":3,"Val":9}]}}"#,
        )
        .unwrap();
        assert_eq!(resp.next_sync_key().unwrap().flatten(), "3_9");
        let empty: SyncResponse = serde_json::from_str(r#"{"BaseResponse":{"Ret":0}}"#).unwrap();
        assert!(empty.next_sync_key().is_none());
    }

    #[test]
    fn push_login_ok() {
        let resp: PushLoginResponse =
            serde_json::from_str(r#"{"ret":"0","msg":"all ok","uuid":"PUSH-UUID"}"#).unwrap();
        assert!(resp.ok());
        let rejected: PushLoginResponse =
            serde_json::from_str(r#"{"ret":"1","msg":"need scan"}"#).unwrap();
        assert!(!rejected.ok());
    }
}
