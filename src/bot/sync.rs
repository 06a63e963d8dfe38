use super::{intake, Bot};
use crate::error::Error;
use crate::events::Event;
use crate::types::{Credentials, Message, SyncResponse, User};
use crate::Result;
use serde_json::Value;
use std::sync::Arc;

impl Bot {
    /// Start the one sync task of this session. It exits when the token is
    /// cancelled or the sync-error handler reports a fatal error.
    pub(crate) fn spawn_sync(&self) {
        let bot = self.clone();
        tokio::spawn(async move { bot.sync_loop().await });
    }

    async fn sync_loop(&self) {
        tracing::debug!("sync loop started");
        let pause = self.config().sync_error_pause();
        loop {
            let result = tokio::select! {
                _ = self.inner.token.cancelled() => break,
                result = self.sync_once() => result,
            };
            let Err(err) = result else {
                continue;
            };
            let handler = self.sync_error_handler();
            if let Some(fatal) = handler(err) {
                self.stop(Some(fatal)).await;
                break;
            }
            tokio::select! {
                _ = self.inner.token.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
        tracing::debug!("sync loop exited");
    }

    /// One check, and a pull when the check hints at news.
    async fn sync_once(&self) -> Result<()> {
        let (creds, sync_key) = {
            let session = self.inner.session.read().await;
            let session = session.as_ref().ok_or(Error::NotLoggedIn)?;
            (session.creds.clone(), session.sync_key.clone())
        };
        let api = &self.inner.api;

        let check = api.sync_check(&creds, &sync_key).await?;
        tracing::trace!(retcode = %check.retcode, selector = %check.selector, "sync check");
        self.emit(Event::SyncCheck {
            retcode: check.retcode.clone(),
            selector: check.selector.clone(),
        })
        .await;
        check.check()?;
        if !check.selector().has_news() {
            return Ok(());
        }

        let resp = api.sync(&creds, &sync_key).await?;
        let me = self.advance_cursor(&resp).await?;
        self.apply_contact_deltas(&resp);
        tracing::debug!(
            messages = resp.add_msg_list.len(),
            modified = resp.mod_contact_list.len(),
            deleted = resp.del_contact_list.len(),
            "sync pulled"
        );
        for raw in resp.add_msg_list {
            self.deliver(raw, &creds, &me).await;
        }
        Ok(())
    }

    /// Adopt the cursor (and rotated skey) of a successful pull.
    async fn advance_cursor(&self, resp: &SyncResponse) -> Result<User> {
        let mut session = self.inner.session.write().await;
        let session = session.as_mut().ok_or(Error::NotLoggedIn)?;
        if let Some(key) = resp.next_sync_key() {
            session.sync_key = key.clone();
        }
        if !resp.skey.is_empty() {
            session.creds.base_request.skey = resp.skey.clone();
        }
        Ok(session.self_user.clone())
    }

    fn apply_contact_deltas(&self, resp: &SyncResponse) {
        let mut contacts = self.inner.contacts.write();
        for user in &resp.mod_contact_list {
            contacts.upsert(user.clone());
        }
        for user in &resp.del_contact_list {
            contacts.remove(&user.user_name);
        }
        for group in &resp.mod_chat_room_member_list {
            contacts.merge_group(group);
        }
    }

    async fn deliver(&self, raw: Value, creds: &Credentials, me: &User) {
        let msg = match self.normalize(raw, me) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed message");
                return;
            }
        };
        let hydrate = intake::needs_hydration(&msg, &self.inner.contacts.read());
        let msg = if hydrate && self.hydrate_group(creds, &msg.from_user_name).await {
            // Re-run with the group known so mention detection sees the
            // display name.
            let msg = self.normalize(msg.raw.clone(), me).unwrap_or(msg);
            self.note_unresolved(&msg);
            msg
        } else {
            msg
        };
        tracing::debug!(
            msg_id = %msg.msg_id,
            kind = ?msg.msg_type(),
            from = %msg.from_user_name,
            "message received"
        );
        self.emit(Event::Message(Arc::new(msg))).await;
    }

    /// Stop fetching for a sender the group details did not contain.
    fn note_unresolved(&self, msg: &Message) {
        let mut contacts = self.inner.contacts.write();
        if intake::needs_hydration(msg, &contacts) {
            tracing::debug!(
                group = %msg.from_user_name,
                sender = %msg.sender_user_name_in_group,
                "sender still unknown after fetch"
            );
            contacts.mark_unresolved(&msg.from_user_name, &msg.sender_user_name_in_group);
        }
    }

    fn normalize(&self, raw: Value, me: &User) -> Result<Message> {
        let contacts = self.inner.contacts.read();
        intake::normalize(raw, me, &contacts)
    }

    /// Fetch details of `group` and merge them into the cache. False when the
    /// request failed.
    async fn hydrate_group(&self, creds: &Credentials, group: &str) -> bool {
        let target = self
            .inner
            .contacts
            .read()
            .member_by_user_name(group)
            .cloned()
            .unwrap_or_else(|| User {
                user_name: group.to_string(),
                ..Default::default()
            });
        match self.inner.api.batch_get_contact(creds, &[target]).await {
            Ok(users) => {
                let mut contacts = self.inner.contacts.write();
                for user in &users {
                    contacts.merge_group(user);
                }
                tracing::debug!(group = %group, fetched = users.len(), "group hydrated");
                true
            }
            Err(e) => {
                tracing::warn!(group = %group, error = %e, "group hydration failed");
                false
            }
        }
    }
}
