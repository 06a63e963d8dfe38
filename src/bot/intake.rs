//! Inbound message normalization. Pure: hydration of unknown group senders
//! happens in the sync loop, which owns the network.

use crate::contact::ContactCache;
use crate::protocol::normalize_content;
use crate::types::{Message, User};
use crate::Result;
use serde_json::Value;

/// Separator between the member handle and the text of a group message.
const GROUP_SENDER_SEPARATOR: &str = ":<br/>";
/// Space the clients put after an `@name` mention.
const MENTION_SPACE: char = '\u{2005}';

/// Turn one `AddMsgList` entry into a [`Message`].
pub(crate) fn normalize(raw: Value, me: &User, contacts: &ContactCache) -> Result<Message> {
    let mut msg = Message::from_value(raw)?;
    msg.is_send_by_self = msg.from_user_name == me.user_name;

    if msg.from_user_name.starts_with("@@") && !msg.is_system() && !msg.is_send_by_self {
        if let Some((sender, content)) = msg.content.split_once(GROUP_SENDER_SEPARATOR) {
            msg.sender_user_name_in_group = sender.to_string();
            msg.content = content.to_string();
        }
    }

    if msg.is_send_by_group() {
        msg.is_at = if msg.is_send_by_self {
            msg.content.contains('@') || msg.content.contains(MENTION_SPACE)
        } else {
            let name = self_name_in_group(&msg.from_user_name, me, contacts);
            mentions(&msg.content, name)
        };
    }

    msg.content = normalize_content(&msg.content);
    Ok(msg)
}

/// How `me` appears inside `group`: group display name, else nick name.
fn self_name_in_group<'a>(group: &str, me: &'a User, contacts: &'a ContactCache) -> &'a str {
    contacts
        .member_by_user_name(group)
        .and_then(|g| g.member_by_user_name(&me.user_name))
        .map(User::display_or_nick)
        .filter(|name| !name.is_empty())
        .unwrap_or(&me.nick_name)
}

/// Whether `content` contains `@name` anywhere.
fn mentions(content: &str, name: &str) -> bool {
    !name.is_empty() && content.contains(&format!("@{}", name))
}

/// Whether a delivered group message names a sender the cache cannot
/// resolve yet. Senders an earlier fetch failed to resolve are not retried.
pub(crate) fn needs_hydration(msg: &Message, contacts: &ContactCache) -> bool {
    if !msg.from_user_name.starts_with("@@") || msg.is_send_by_self {
        return false;
    }
    if contacts.is_unresolved(&msg.from_user_name, &msg.sender_user_name_in_group) {
        return false;
    }
    match contacts.member_by_user_name(&msg.from_user_name) {
        None => true,
        Some(group) => {
            !msg.sender_user_name_in_group.is_empty()
                && group
                    .member_by_user_name(&msg.sender_user_name_in_group)
                    .is_none()
        }
    }
}
