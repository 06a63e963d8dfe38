use super::{with_base_request, WebApi};
use crate::protocol::{endpoint, now_millis, parse_sync_check};
use crate::transport::HttpRequest;
use crate::types::{Credentials, SyncCheckResponse, SyncKey, SyncResponse};
use crate::Result;
use serde_json::json;

impl WebApi {
    /// Long-poll sync check on the sync host.
    pub async fn sync_check(
        &self,
        creds: &Credentials,
        sync_key: &SyncKey,
    ) -> Result<SyncCheckResponse> {
        let now = now_millis();
        let req = HttpRequest::get(creds.domain.sync_url(endpoint::SYNC_CHECK))
            .query("r", now)
            .query("skey", creds.skey())
            .query("sid", &creds.base_request.sid)
            .query("uin", creds.base_request.uin)
            .query("deviceid", &creds.base_request.device_id)
            .query("synckey", sync_key.flatten())
            .query("_", now)
            .timeout(self.config.long_poll_timeout());
        let body = self.send(req).await?.text();
        parse_sync_check(&body)
    }

    /// Pull pending changes since `sync_key`.
    pub async fn sync(&self, creds: &Credentials, sync_key: &SyncKey) -> Result<SyncResponse> {
        let req = HttpRequest::post(creds.domain.base_url(endpoint::SYNC))
            .query("sid", &creds.base_request.sid)
            .query("skey", creds.skey())
            .query("pass_ticket", creds.pass_ticket())
            .json(with_base_request(
                creds,
                json!({
                    "SyncKey": sync_key,
                    "rr": !(now_millis() as i32),
                }),
            ));
        self.send_checked(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BotConfig;
    use crate::error::Ret;
    use crate::protocol::DomainGroup;
    use crate::testing::{ok_envelope, ret_envelope, MockTransport};
    use crate::types::{BaseRequest, SyncKeyPair};
    use std::sync::Arc;

    fn creds() -> Credentials {
        Credentials {
            domain: DomainGroup::from_host("wx2.qq.com"),
            base_request: BaseRequest {
                uin: 123,
                sid: "SID".into(),
                skey: "SKEY".into(),
                device_id: "e123456789012345".into(),
            },
            ..Default::default()
        }
    }

    fn key() -> SyncKey {
        SyncKey {
            count: 2,
            list: vec![SyncKeyPair { key: 1, val: 5 }, SyncKeyPair { key: 2, val: 6 }],
        }
    }

    #[tokio::test]
    async fn sync_check_targets_sync_host() {
        let mock = Arc::new(MockTransport::new());
        mock.on("synccheck", r#"window.synccheck={retcode:"0",selector:"2"}"#);
        let api = WebApi::new(mock.clone(), BotConfig::default());
        let resp = api.sync_check(&creds(), &key()).await.unwrap();
        assert_eq!(resp.selector, "2");
        let req = &mock.requests_to("synccheck")[0];
        assert!(req.url.starts_with("https://webpush.wx2.qq.com/"));
        assert_eq!(req.query_value("synckey"), Some("1_5|2_6"));
        assert_eq!(req.query_value("deviceid"), Some("e123456789012345"));
        assert_eq!(req.query_value("uin"), Some("123"));
        assert!(req.timeout.is_some());
    }

    #[tokio::test]
    async fn sync_posts_key_and_checks_ret() {
        let mock = Arc::new(MockTransport::new());
        mock.on(
            "webwxsync",
            ok_envelope(json!({"SyncKey": {"Count": 1, "List": [{"Key": 1, "Val": 6}]}})),
        );
        mock.on("webwxsync", ret_envelope(1101));
        let api = WebApi::new(mock.clone(), BotConfig::default());
        let resp = api.sync(&creds(), &key()).await.unwrap();
        assert_eq!(resp.next_sync_key().unwrap().flatten(), "1_6");
        let req = &mock.requests_to("webwxsync")[0];
        match &req.body {
            crate::transport::RequestBody::Json(body) => {
                assert_eq!(body["SyncKey"]["List"][1]["Val"], 6);
                assert_eq!(body["BaseRequest"]["Uin"], 123);
            }
            other => panic!("unexpected body {other:?}"),
        }
        let err = api.sync(&creds(), &key()).await.unwrap_err();
        assert_eq!(err.ret(), Some(Ret::FailedLoginCheck));
    }
}
