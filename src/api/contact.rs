use super::{with_base_request, WebApi};
use crate::protocol::{endpoint, now_millis, MAX_BATCH_CONTACTS};
use crate::transport::HttpRequest;
use crate::types::{
    BaseResponse, BatchContactResponse, ContactListResponse, CreateChatRoomResponse, Credentials,
    User,
};
use crate::Result;
use serde_json::json;

/// `webwxverifyuser` opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOp {
    AddFriend = 2,
    AcceptFriend = 3,
}

/// `webwxupdatechatroom` operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRoomUpdate {
    AddMembers(Vec<String>),
    DelMembers(Vec<String>),
    ModTopic(String),
}

impl ChatRoomUpdate {
    fn fun(&self) -> &'static str {
        match self {
            Self::AddMembers(_) => "addmember",
            Self::DelMembers(_) => "delmember",
            Self::ModTopic(_) => "modtopic",
        }
    }

    fn fields(&self) -> serde_json::Value {
        match self {
            Self::AddMembers(names) => json!({ "AddMemberList": names.join(",") }),
            Self::DelMembers(names) => json!({ "DelMemberList": names.join(",") }),
            Self::ModTopic(topic) => json!({ "NewTopic": topic }),
        }
    }
}

impl WebApi {
    /// Full roster, following `Seq` until the server reports the last page.
    pub async fn get_contacts(&self, creds: &Credentials) -> Result<Vec<User>> {
        let mut seq = 0i64;
        let mut members = Vec::new();
        loop {
            let req = HttpRequest::get(creds.domain.base_url(endpoint::GET_CONTACT))
                .query("r", now_millis())
                .query("seq", seq)
                .query("skey", creds.skey())
                .query("pass_ticket", creds.pass_ticket());
            let page: ContactListResponse = self.send_checked(req).await?;
            tracing::debug!(seq, count = page.member_list.len(), next = page.seq, "contact page");
            members.extend(page.member_list);
            if page.seq == 0 || page.seq == seq {
                break;
            }
            seq = page.seq;
        }
        Ok(members)
    }

    /// Detail lookup in batches of at most 50 handles. No users, no call.
    pub async fn batch_get_contact(&self, creds: &Credentials, users: &[User]) -> Result<Vec<User>> {
        let mut out = Vec::with_capacity(users.len());
        for chunk in users.chunks(MAX_BATCH_CONTACTS) {
            let list: Vec<_> = chunk
                .iter()
                .map(|u| json!({ "UserName": u.user_name, "EncryChatRoomId": u.encry_chat_room_id }))
                .collect();
            let req = HttpRequest::post(creds.domain.base_url(endpoint::BATCH_GET_CONTACT))
                .query("type", "ex")
                .query("r", now_millis())
                .query("pass_ticket", creds.pass_ticket())
                .json(with_base_request(
                    creds,
                    json!({ "Count": list.len(), "List": list }),
                ));
            let resp: BatchContactResponse = self.send_checked(req).await?;
            out.extend(resp.contact_list);
        }
        Ok(out)
    }

    pub async fn set_remark_name(
        &self,
        creds: &Credentials,
        user_name: &str,
        remark_name: &str,
    ) -> Result<()> {
        let req = HttpRequest::post(creds.domain.base_url(endpoint::OPLOG))
            .query("lang", "zh_CN")
            .query("pass_ticket", creds.pass_ticket())
            .json(with_base_request(
                creds,
                json!({ "CmdId": 2, "RemarkName": remark_name, "UserName": user_name }),
            ));
        let _: BaseResponse = self.send_checked(req).await?;
        Ok(())
    }

    /// Send or accept a friend request.
    pub async fn verify_user(
        &self,
        creds: &Credentials,
        op: VerifyOp,
        user_name: &str,
        ticket: &str,
        verify_content: &str,
    ) -> Result<()> {
        let req = HttpRequest::post(creds.domain.base_url(endpoint::VERIFY_USER))
            .query("r", now_millis())
            .query("pass_ticket", creds.pass_ticket())
            .json(with_base_request(
                creds,
                json!({
                    "Opcode": op as i32,
                    "SceneList": [33],
                    "SceneListCount": 1,
                    "VerifyContent": verify_content,
                    "VerifyUserList": [{ "Value": user_name, "VerifyUserTicket": ticket }],
                    "VerifyUserListSize": 1,
                    "skey": creds.skey(),
                }),
            ));
        let _: BaseResponse = self.send_checked(req).await?;
        Ok(())
    }

    pub async fn create_chatroom(
        &self,
        creds: &Credentials,
        topic: &str,
        members: &[String],
    ) -> Result<CreateChatRoomResponse> {
        let list: Vec<_> = members.iter().map(|m| json!({ "UserName": m })).collect();
        let req = HttpRequest::post(creds.domain.base_url(endpoint::CREATE_CHATROOM))
            .query("r", now_millis())
            .query("pass_ticket", creds.pass_ticket())
            .json(with_base_request(
                creds,
                json!({ "MemberCount": list.len(), "MemberList": list, "Topic": topic }),
            ));
        self.send_checked(req).await
    }

    pub async fn update_chatroom(
        &self,
        creds: &Credentials,
        group: &str,
        update: &ChatRoomUpdate,
    ) -> Result<()> {
        let mut body = with_base_request(creds, json!({ "ChatRoomName": group }));
        if let (Some(map), serde_json::Value::Object(fields)) = (body.as_object_mut(), update.fields()) {
            map.extend(fields);
        }
        let req = HttpRequest::post(creds.domain.base_url(endpoint::UPDATE_CHATROOM))
            .query("fun", update.fun())
            .query("lang", "zh_CN")
            .query("pass_ticket", creds.pass_ticket())
            .json(body);
        let _: BaseResponse = self.send_checked(req).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BotConfig;
    use crate::testing::{ok_envelope, MockTransport};
    use crate::transport::RequestBody;
    use std::sync::Arc;

    fn users(n: usize) -> Vec<User> {
        (0..n)
            .map(|i| User {
                user_name: format!("@u{i}"),
                ..Default::default()
            })
            .collect()
    }

    fn batch_reply() -> String {
        ok_envelope(json!({"Count": 1, "ContactList": [{"UserName": "@u0"}]}))
    }

    #[tokio::test]
    async fn batch_of_zero_makes_no_call() {
        let mock = Arc::new(MockTransport::new());
        let api = WebApi::new(mock.clone(), BotConfig::default());
        let out = api.batch_get_contact(&Credentials::default(), &[]).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(mock.count("webwxbatchgetcontact"), 0);
    }

    #[tokio::test]
    async fn batch_of_fifty_is_one_call() {
        let mock = Arc::new(MockTransport::new());
        mock.repeat("webwxbatchgetcontact", batch_reply());
        let api = WebApi::new(mock.clone(), BotConfig::default());
        api.batch_get_contact(&Credentials::default(), &users(50)).await.unwrap();
        assert_eq!(mock.count("webwxbatchgetcontact"), 1);
    }

    #[tokio::test]
    async fn batch_of_fifty_one_is_two_calls() {
        let mock = Arc::new(MockTransport::new());
        mock.repeat("webwxbatchgetcontact", batch_reply());
        let api = WebApi::new(mock.clone(), BotConfig::default());
        let out = api
            .batch_get_contact(&Credentials::default(), &users(51))
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        let reqs = mock.requests_to("webwxbatchgetcontact");
        assert_eq!(reqs.len(), 2);
        let counts: Vec<_> = reqs
            .iter()
            .map(|r| match &r.body {
                RequestBody::Json(body) => body["Count"].as_u64().unwrap(),
                _ => 0,
            })
            .collect();
        assert_eq!(counts, vec![50, 1]);
    }

    #[tokio::test]
    async fn contacts_follow_seq() {
        let mock = Arc::new(MockTransport::new());
        mock.on(
            "webwxgetcontact",
            ok_envelope(json!({"MemberCount": 1, "MemberList": [{"UserName": "@a"}], "Seq": 77})),
        );
        mock.on(
            "webwxgetcontact",
            ok_envelope(json!({"MemberCount": 1, "MemberList": [{"UserName": "@@b"}], "Seq": 0})),
        );
        let api = WebApi::new(mock.clone(), BotConfig::default());
        let all = api.get_contacts(&Credentials::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        let seqs: Vec<_> = mock
            .requests_to("webwxgetcontact")
            .iter()
            .map(|r| r.query_value("seq").unwrap_or_default().to_string())
            .collect();
        assert_eq!(seqs, vec!["0", "77"]);
    }

    #[tokio::test]
    async fn update_chatroom_fun_and_fields() {
        let mock = Arc::new(MockTransport::new());
        mock.on("webwxupdatechatroom", ok_envelope(json!({})));
        let api = WebApi::new(mock.clone(), BotConfig::default());
        api.update_chatroom(
            &Credentials::default(),
            "@@g",
            &ChatRoomUpdate::AddMembers(vec!["@a".into(), "@b".into()]),
        )
        .await
        .unwrap();
        let req = &mock.requests_to("webwxupdatechatroom")[0];
        assert_eq!(req.query_value("fun"), Some("addmember"));
        match &req.body {
            RequestBody::Json(body) => {
                assert_eq!(body["AddMemberList"], "@a,@b");
                assert_eq!(body["ChatRoomName"], "@@g");
            }
            other => panic!("unexpected body {other:?}"),
        }
    }
}
