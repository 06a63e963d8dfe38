use super::MessageId;
use crate::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Message kind discriminant (`MsgType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    Text,
    Image,
    Voice,
    Verify,
    PossibleFriend,
    ShareCard,
    Video,
    Emoticon,
    Location,
    App,
    VoipMsg,
    StatusNotify,
    VoipNotify,
    VoipInvite,
    MicroVideo,
    SysNotice,
    Sys,
    Recalled,
    Unknown(i32),
}

impl MsgType {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Text,
            3 => Self::Image,
            34 => Self::Voice,
            37 => Self::Verify,
            40 => Self::PossibleFriend,
            42 => Self::ShareCard,
            43 => Self::Video,
            47 => Self::Emoticon,
            48 => Self::Location,
            49 => Self::App,
            50 => Self::VoipMsg,
            51 => Self::StatusNotify,
            52 => Self::VoipNotify,
            53 => Self::VoipInvite,
            62 => Self::MicroVideo,
            9999 => Self::SysNotice,
            10000 => Self::Sys,
            10002 => Self::Recalled,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Text => 1,
            Self::Image => 3,
            Self::Voice => 34,
            Self::Verify => 37,
            Self::PossibleFriend => 40,
            Self::ShareCard => 42,
            Self::Video => 43,
            Self::Emoticon => 47,
            Self::Location => 48,
            Self::App => 49,
            Self::VoipMsg => 50,
            Self::StatusNotify => 51,
            Self::VoipNotify => 52,
            Self::VoipInvite => 53,
            Self::MicroVideo => 62,
            Self::SysNotice => 9999,
            Self::Sys => 10000,
            Self::Recalled => 10002,
            Self::Unknown(code) => *code,
        }
    }
}

/// Sub-kind of an app (`MsgType` 49) message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppMsgType {
    Text,
    Image,
    Audio,
    Video,
    Url,
    Attach,
    Open,
    Emoji,
    MiniProgram,
    Transfers,
    RedEnvelopes,
    Unknown(i32),
}

impl AppMsgType {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Text,
            2 => Self::Image,
            3 => Self::Audio,
            4 => Self::Video,
            5 => Self::Url,
            6 => Self::Attach,
            7 => Self::Open,
            8 => Self::Emoji,
            33 => Self::MiniProgram,
            2000 => Self::Transfers,
            2001 => Self::RedEnvelopes,
            other => Self::Unknown(other),
        }
    }
}

/// Friend-request payload of a verify (37) message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FriendAddInfo {
    pub user_name: String,
    pub nick_name: String,
    #[serde(rename = "QQNum")]
    pub qq_num: i64,
    pub province: String,
    pub city: String,
    pub content: String,
    pub signature: String,
    pub alias: String,
    pub scene: i32,
    pub verify_flag: i32,
    pub attr_status: i64,
    pub sex: i32,
    pub ticket: String,
    pub op_code: i32,
}

/// Per-message key/value map shared along a handler chain.
#[derive(Clone, Default)]
pub struct MessageContext(Arc<RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>>);

impl MessageContext {
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.0.write().insert(key.into(), Arc::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.0.read().get(key).cloned()?;
        value.downcast::<T>().ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.read().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.0.write().remove(key).is_some()
    }
}

impl std::fmt::Debug for MessageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let map = self.0.read();
        f.debug_set().entries(map.keys()).finish()
    }
}

/// Inbound message from `AddMsgList`.
///
/// Wire fields deserialize directly; the fields after `ori_content` are
/// filled by the intake pipeline before the message reaches user code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Message {
    pub msg_id: MessageId,
    pub from_user_name: String,
    pub to_user_name: String,
    #[serde(rename = "MsgType")]
    pub msg_type_code: i32,
    pub content: String,
    pub status: i32,
    pub img_status: i32,
    pub create_time: i64,
    pub voice_length: i64,
    pub play_length: i64,
    pub file_name: String,
    pub file_size: String,
    pub media_id: String,
    pub url: String,
    #[serde(rename = "AppMsgType")]
    pub app_msg_type_code: i32,
    pub status_notify_code: i32,
    pub status_notify_user_name: String,
    pub recommend_info: FriendAddInfo,
    pub forward_flag: i32,
    pub has_product_id: i32,
    pub ticket: String,
    pub img_height: i32,
    pub img_width: i32,
    pub sub_msg_type: i32,
    pub new_msg_id: i64,
    pub ori_content: String,
    pub encry_file_name: String,

    /// Raw JSON exactly as received.
    #[serde(skip)]
    pub raw: serde_json::Value,
    /// Content before normalization.
    #[serde(skip)]
    pub raw_content: String,
    /// Member handle of the sender inside a group.
    #[serde(skip)]
    pub sender_user_name_in_group: String,
    #[serde(skip)]
    pub is_at: bool,
    #[serde(skip)]
    pub is_send_by_self: bool,
    #[serde(skip)]
    pub context: MessageContext,
}

impl Message {
    /// Deserialize a message, keeping the raw value.
    pub fn from_value(raw: serde_json::Value) -> Result<Self> {
        let mut msg: Message = serde_json::from_value(raw.clone())?;
        msg.raw_content = msg.content.clone();
        msg.raw = raw;
        Ok(msg)
    }

    pub fn msg_type(&self) -> MsgType {
        MsgType::from_code(self.msg_type_code)
    }

    pub fn app_msg_type(&self) -> AppMsgType {
        AppMsgType::from_code(self.app_msg_type_code)
    }

    pub fn is_text(&self) -> bool {
        self.msg_type() == MsgType::Text && !self.is_location()
    }

    /// Location shares arrive as text with a map URL.
    pub fn is_location(&self) -> bool {
        self.msg_type() == MsgType::Text && self.content.contains("pictype=location")
            || self.msg_type() == MsgType::Location
    }

    pub fn is_picture(&self) -> bool {
        self.msg_type() == MsgType::Image
    }

    pub fn is_voice(&self) -> bool {
        self.msg_type() == MsgType::Voice
    }

    pub fn is_video(&self) -> bool {
        matches!(self.msg_type(), MsgType::Video | MsgType::MicroVideo)
    }

    pub fn is_card(&self) -> bool {
        self.msg_type() == MsgType::ShareCard
    }

    pub fn is_emoticon(&self) -> bool {
        self.msg_type() == MsgType::Emoticon
    }

    /// App message carrying a document or link.
    pub fn is_media(&self) -> bool {
        self.msg_type() == MsgType::App
    }

    pub fn is_attachment(&self) -> bool {
        self.is_media() && self.app_msg_type() == AppMsgType::Attach
    }

    pub fn is_system(&self) -> bool {
        matches!(self.msg_type(), MsgType::Sys | MsgType::SysNotice)
    }

    pub fn is_recalled(&self) -> bool {
        self.msg_type() == MsgType::Recalled
    }

    pub fn is_friend_add(&self) -> bool {
        self.msg_type() == MsgType::Verify && self.from_user_name == "fmessage"
    }

    pub fn is_status_notify(&self) -> bool {
        self.msg_type() == MsgType::StatusNotify
    }

    pub fn is_send_by_self(&self) -> bool {
        self.is_send_by_self
    }

    /// Message belongs to a group conversation (received or sent).
    pub fn is_send_by_group(&self) -> bool {
        self.from_user_name.starts_with("@@")
            || (self.is_send_by_self && self.to_user_name.starts_with("@@"))
    }

    pub fn is_send_by_friend(&self) -> bool {
        !self.is_send_by_group() && !self.is_send_by_self && self.from_user_name.starts_with('@')
    }

    pub fn is_at(&self) -> bool {
        self.is_at
    }

    /// Handle of the conversation partner (group or user).
    pub fn chat_user_name(&self) -> &str {
        if self.is_send_by_self {
            &self.to_user_name
        } else {
            &self.from_user_name
        }
    }

    /// Store a value in the message context.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.context.set(key, value)
    }

    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.context.get(key)
    }

    /// Contact card of a share-card (42) message.
    pub fn card(&self) -> Result<Card> {
        parse_xml(&self.content)
    }

    /// Recall notice of a recalled (10002) message.
    pub fn revoke(&self) -> Result<RevokeMsg> {
        let doc: SysMsg = parse_xml(&self.content)?;
        doc.revokemsg
            .ok_or_else(|| crate::Error::Decode("sysmsg without revokemsg".into()))
    }

    /// Structured document of an app (49) message.
    pub fn app_message(&self) -> Result<AppMessage> {
        let doc: AppMsgDoc = parse_xml(&self.content)?;
        Ok(doc.appmsg)
    }

    /// Friend-request payload of a verify (37) message.
    pub fn friend_add(&self) -> Option<&FriendAddInfo> {
        if self.is_friend_add() {
            Some(&self.recommend_info)
        } else {
            None
        }
    }
}

fn parse_xml<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T> {
    let trimmed = content.trim_start_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    quick_xml::de::from_str(trimmed).map_err(|e| crate::Error::Decode(format!("xml: {}", e)))
}

/// `<msg username=".." nickname=".." .../>` of a share-card message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Card {
    #[serde(rename = "@username")]
    pub user_name: String,
    #[serde(rename = "@nickname")]
    pub nick_name: String,
    #[serde(rename = "@alias")]
    pub alias: String,
    #[serde(rename = "@province")]
    pub province: String,
    #[serde(rename = "@city")]
    pub city: String,
    #[serde(rename = "@sign")]
    pub sign: String,
    #[serde(rename = "@sex")]
    pub sex: String,
    #[serde(rename = "@certflag")]
    pub cert_flag: String,
    #[serde(rename = "@bigheadimgurl")]
    pub big_head_img_url: String,
    #[serde(rename = "@smallheadimgurl")]
    pub small_head_img_url: String,
}

#[derive(Debug, Deserialize)]
struct SysMsg {
    #[serde(default)]
    revokemsg: Option<RevokeMsg>,
}

/// Body of a recall notice.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RevokeMsg {
    pub session: String,
    #[serde(rename = "oldmsgid")]
    pub old_msg_id: String,
    #[serde(rename = "msgid")]
    pub msg_id: String,
    #[serde(rename = "replacemsg")]
    pub replace_msg: String,
}

#[derive(Debug, Deserialize)]
struct AppMsgDoc {
    appmsg: AppMessage,
}

/// `<appmsg>` document of an app message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppMessage {
    #[serde(rename = "@appid")]
    pub app_id: String,
    pub title: String,
    pub des: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(rename = "appattach")]
    pub attach: AppAttach,
}

impl AppMessage {
    pub fn app_msg_type(&self) -> AppMsgType {
        AppMsgType::from_code(self.kind.trim().parse().unwrap_or(0))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppAttach {
    #[serde(rename = "totallen")]
    pub total_len: String,
    #[serde(rename = "attachid")]
    pub attach_id: String,
    #[serde(rename = "fileext")]
    pub file_ext: String,
}

/// Message sent by this client; enough to recall it later.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentMessage {
    pub msg_id: MessageId,
    pub local_id: String,
    pub to_user_name: String,
    pub msg_type: i32,
    pub content: String,
}
