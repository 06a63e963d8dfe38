//! Contact handles over the session cache.
//!
//! [`SelfUser`] is the logged-in account and owns the roster views;
//! [`Contact`] wraps one cached [`User`] with its classification and the
//! operations that classification allows.

mod cache;

pub use cache::ContactCache;

use crate::api::{ChatRoomUpdate, VerifyOp};
use crate::bot::Bot;
use crate::error::{Error, SendError};
use crate::types::{ContactKind, Message, SentMessage, User, FILE_HELPER};
use crate::Result;
use bytes::Bytes;
use std::ops::Deref;

/// Status-notify code marking a conversation as read.
const NOTIFY_READ: i32 = 1;

/// The logged-in user.
#[derive(Debug, Clone)]
pub struct SelfUser {
    bot: Bot,
    user: User,
}

impl SelfUser {
    pub(crate) fn new(bot: Bot, user: User) -> Self {
        Self { bot, user }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn user_name(&self) -> &str {
        &self.user.user_name
    }

    pub fn nick_name(&self) -> &str {
        &self.user.nick_name
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Fetch the full roster unless it is cached already.
    async fn ensure_roster(&self, force: bool) -> Result<()> {
        if !force && self.bot.inner.contacts.read().is_full() {
            return Ok(());
        }
        let creds = self.bot.credentials().await?;
        let members = self.bot.inner.api.get_contacts(&creds).await?;
        tracing::debug!(count = members.len(), "contact roster fetched");
        self.bot.inner.contacts.write().replace_all(members, true);
        Ok(())
    }

    /// Every cached contact. `force` refetches the roster.
    pub async fn members(&self, force: bool) -> Result<Contacts> {
        self.ensure_roster(force).await?;
        let users = self.bot.inner.contacts.read().members().to_vec();
        Ok(Contacts::from_users(&self.bot, users))
    }

    pub async fn friends(&self, force: bool) -> Result<Contacts> {
        self.ensure_roster(force).await?;
        let users = self.bot.inner.contacts.read().friends();
        Ok(Contacts::from_users(&self.bot, users.iter().cloned()))
    }

    pub async fn groups(&self, force: bool) -> Result<Contacts> {
        self.ensure_roster(force).await?;
        let users = self.bot.inner.contacts.read().groups();
        Ok(Contacts::from_users(&self.bot, users.iter().cloned()))
    }

    /// Subscription accounts.
    pub async fn mps(&self, force: bool) -> Result<Contacts> {
        self.ensure_roster(force).await?;
        let users = self.bot.inner.contacts.read().mps();
        Ok(Contacts::from_users(&self.bot, users.iter().cloned()))
    }

    /// Cache lookup; no request is made.
    pub fn member_by_user_name(&self, user_name: &str) -> Option<Contact> {
        let user = self
            .bot
            .inner
            .contacts
            .read()
            .member_by_user_name(user_name)
            .cloned()?;
        Some(Contact::new(self.bot.clone(), user))
    }

    /// Refresh every cached contact through batch detail calls.
    pub async fn update_all_details(&self) -> Result<()> {
        self.ensure_roster(false).await?;
        let users = self.bot.inner.contacts.read().members().to_vec();
        let creds = self.bot.credentials().await?;
        let detailed = self.bot.inner.api.batch_get_contact(&creds, &users).await?;
        tracing::debug!(count = detailed.len(), "contact details refreshed");
        self.bot.inner.contacts.write().replace_all(detailed, true);
        Ok(())
    }

    /// The file transfer assistant.
    pub fn file_helper(&self) -> Contact {
        let user = User {
            user_name: FILE_HELPER.to_string(),
            nick_name: "File Transfer".to_string(),
            ..Default::default()
        };
        Contact::new(self.bot.clone(), user)
    }

    /// Send a friend request.
    pub async fn add_friend(&self, user: &User, verify_content: &str) -> Result<()> {
        let creds = self.bot.credentials().await?;
        self.bot
            .inner
            .api
            .verify_user(&creds, VerifyOp::AddFriend, &user.user_name, "", verify_content)
            .await
    }

    /// Accept the friend request carried by `msg`.
    pub async fn accept_friend(&self, msg: &Message) -> Result<()> {
        let info = msg
            .friend_add()
            .ok_or(SendError::Unsupported("messages without a friend request"))?;
        let creds = self.bot.credentials().await?;
        self.bot
            .inner
            .api
            .verify_user(&creds, VerifyOp::AcceptFriend, &info.user_name, &info.ticket, "")
            .await
    }

    /// Create a group with `friends` and cache it.
    pub async fn create_group(&self, topic: &str, friends: &[Contact]) -> Result<Contact> {
        let names: Vec<String> = friends.iter().map(|c| c.user_name().to_string()).collect();
        let creds = self.bot.credentials().await?;
        let resp = self
            .bot
            .inner
            .api
            .create_chatroom(&creds, topic, &names)
            .await?;
        if resp.chat_room_name.is_empty() {
            return Err(anyhow::anyhow!("create chatroom returned no group name").into());
        }
        let group = User {
            user_name: resp.chat_room_name,
            nick_name: topic.to_string(),
            member_count: resp.member_list.len() as i32,
            member_list: resp.member_list,
            ..Default::default()
        };
        tracing::info!(group = %group.user_name, topic = %topic, "group created");
        self.bot.inner.contacts.write().upsert(group.clone());
        Ok(Contact::new(self.bot.clone(), group))
    }

    /// Mark the conversation of `msg` as read.
    pub async fn mark_as_read(&self, msg: &Message) -> Result<()> {
        let creds = self.bot.credentials().await?;
        self.bot
            .inner
            .api
            .status_notify(&creds, &self.user.user_name, msg.chat_user_name(), NOTIFY_READ)
            .await
    }
}

/// A cached user with its classification. `kind` is `None` for handles
/// outside the three views (the file helper, unknown verify flags).
#[derive(Debug, Clone)]
pub struct Contact {
    bot: Bot,
    user: User,
    kind: Option<ContactKind>,
}

impl Contact {
    pub(crate) fn new(bot: Bot, user: User) -> Self {
        let kind = user.kind();
        Self { bot, user, kind }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn user_name(&self) -> &str {
        &self.user.user_name
    }

    pub fn nick_name(&self) -> &str {
        &self.user.nick_name
    }

    pub fn kind(&self) -> Option<ContactKind> {
        self.kind
    }

    pub fn is_friend(&self) -> bool {
        self.kind == Some(ContactKind::Friend)
    }

    pub fn is_group(&self) -> bool {
        self.kind == Some(ContactKind::Group)
    }

    pub fn is_mp(&self) -> bool {
        self.kind == Some(ContactKind::Mp)
    }

    fn require(&self, kind: ContactKind, what: &'static str) -> Result<()> {
        if self.kind == Some(kind) {
            Ok(())
        } else {
            Err(SendError::Unsupported(what).into())
        }
    }

    pub async fn send_text(&self, text: &str) -> Result<SentMessage> {
        self.bot.send_text(self.user_name(), text).await
    }

    pub async fn send_image(&self, file_name: &str, data: impl Into<Bytes>) -> Result<SentMessage> {
        self.bot.send_image(self.user_name(), file_name, data).await
    }

    pub async fn send_file(&self, file_name: &str, data: impl Into<Bytes>) -> Result<SentMessage> {
        self.bot.send_file(self.user_name(), file_name, data).await
    }

    pub async fn send_structured(&self, content: &str) -> Result<SentMessage> {
        self.bot.send_structured(self.user_name(), content).await
    }

    /// Friends only.
    pub async fn set_remark_name(&mut self, remark_name: &str) -> Result<()> {
        self.require(ContactKind::Friend, "non-friend contacts")?;
        let creds = self.bot.credentials().await?;
        self.bot
            .inner
            .api
            .set_remark_name(&creds, self.user_name(), remark_name)
            .await?;
        self.user.remark_name = remark_name.to_string();
        self.bot.inner.contacts.write().upsert(self.user.clone());
        Ok(())
    }

    /// Group members, fetched through batch detail when not cached yet.
    pub async fn members(&self) -> Result<Contacts> {
        self.require(ContactKind::Group, "non-group contacts")?;
        let cached = self
            .bot
            .inner
            .contacts
            .read()
            .member_by_user_name(self.user_name())
            .map(|g| g.member_list.clone())
            .filter(|members| !members.is_empty());
        let members = match cached {
            Some(members) => members,
            None => {
                let creds = self.bot.credentials().await?;
                let detailed = self
                    .bot
                    .inner
                    .api
                    .batch_get_contact(&creds, std::slice::from_ref(&self.user))
                    .await?;
                let mut contacts = self.bot.inner.contacts.write();
                for group in &detailed {
                    contacts.merge_group(group);
                }
                detailed
                    .into_iter()
                    .find(|g| g.user_name == self.user.user_name)
                    .map(|g| g.member_list)
                    .ok_or_else(|| Error::from(SendError::ContactNotFound(self.user.user_name.clone())))?
            }
        };
        Ok(Contacts::from_users(&self.bot, members))
    }

    pub async fn add_members(&self, members: &[Contact]) -> Result<()> {
        self.require(ContactKind::Group, "non-group contacts")?;
        let update = ChatRoomUpdate::AddMembers(user_names(members));
        self.update_group(&update).await
    }

    /// Sends the removal request. The server acknowledges it, but members
    /// are not necessarily removed.
    pub async fn remove_members(&self, members: &[Contact]) -> Result<()> {
        self.require(ContactKind::Group, "non-group contacts")?;
        let update = ChatRoomUpdate::DelMembers(user_names(members));
        self.update_group(&update).await
    }

    /// Change the group topic.
    pub async fn rename(&mut self, topic: &str) -> Result<()> {
        self.require(ContactKind::Group, "non-group contacts")?;
        self.update_group(&ChatRoomUpdate::ModTopic(topic.to_string()))
            .await?;
        self.user.nick_name = topic.to_string();
        self.bot.inner.contacts.write().upsert(self.user.clone());
        Ok(())
    }

    async fn update_group(&self, update: &ChatRoomUpdate) -> Result<()> {
        let creds = self.bot.credentials().await?;
        self.bot
            .inner
            .api
            .update_chatroom(&creds, self.user_name(), update)
            .await
    }
}

fn user_names(contacts: &[Contact]) -> Vec<String> {
    contacts.iter().map(|c| c.user_name().to_string()).collect()
}

/// A list of contacts with lookup helpers.
#[derive(Debug, Clone, Default)]
pub struct Contacts(Vec<Contact>);

impl Contacts {
    pub(crate) fn from_users(bot: &Bot, users: impl IntoIterator<Item = User>) -> Self {
        Self(
            users
                .into_iter()
                .map(|u| Contact::new(bot.clone(), u))
                .collect(),
        )
    }

    pub fn search(&self, pred: impl Fn(&Contact) -> bool) -> Contacts {
        Contacts(self.0.iter().filter(|c| pred(c)).cloned().collect())
    }

    pub fn by_nick_name(&self, nick_name: &str) -> Contacts {
        self.search(|c| c.user.nick_name == nick_name)
    }

    pub fn by_remark_name(&self, remark_name: &str) -> Contacts {
        self.search(|c| c.user.remark_name == remark_name)
    }

    pub fn by_user_name(&self, user_name: &str) -> Option<&Contact> {
        self.0.iter().find(|c| c.user.user_name == user_name)
    }

    pub fn into_vec(self) -> Vec<Contact> {
        self.0
    }
}

impl Deref for Contacts {
    type Target = [Contact];

    fn deref(&self) -> &[Contact] {
        &self.0
    }
}

impl IntoIterator for Contacts {
    type Item = Contact;
    type IntoIter = std::vec::IntoIter<Contact>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
