//! Data model: session records, users, messages and gateway responses.

mod message;
mod response;
mod session;
mod user;

pub use message::{
    AppAttach, AppMessage, AppMsgType, Card, FriendAddInfo, Message, MessageContext, MsgType,
    RevokeMsg, SentMessage,
};
pub use response::{
    BaseResponse, BatchContactResponse, ContactListResponse, CreateChatRoomResponse,
    PushLoginResponse, SendMessageResponse, Selector, SyncCheckResponse, SyncResponse,
    UploadMediaResponse, WebInitResponse,
};
pub use session::{BaseRequest, Credentials, LoginInfo, SyncKey, SyncKeyPair};
pub use user::{ContactKind, User, FILE_HELPER};

/// Message id as issued by the server (decimal string).
pub type MessageId = String;
