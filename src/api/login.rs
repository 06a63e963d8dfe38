use super::{with_base_request, WebApi};
use crate::error::{Error, LoginError, Ret};
use crate::protocol::{
    endpoint, generate_client_msg_id, now_millis, parse_check_login, parse_login_info,
    parse_uuid, DomainGroup, LoginStatus, APP_ID, CHECK_LOGIN_URL, DESKTOP_CLIENT_VERSION,
    DESKTOP_EXTSPAM, JS_LOGIN_URL,
};
use crate::transport::HttpRequest;
use crate::types::{BaseResponse, Credentials, LoginInfo, PushLoginResponse, WebInitResponse};
use crate::Result;
use reqwest::Url;
use serde_json::json;

impl WebApi {
    /// Fetch a fresh login UUID.
    pub async fn get_uuid(&self) -> Result<String> {
        let req = HttpRequest::get(JS_LOGIN_URL)
            .query("appid", APP_ID)
            .query("redirect_uri", self.config.mode.redirect_uri())
            .query("fun", "new")
            .query("lang", "zh_CN")
            .query("_", now_millis());
        let body = self.send(req).await?.text();
        parse_uuid(&body)
    }

    /// One long-poll round of check-login. `tip` is 1 only on the first
    /// poll of a push login.
    pub async fn check_login(&self, uuid: &str, tip: u8) -> Result<LoginStatus> {
        let now = now_millis();
        let req = HttpRequest::get(CHECK_LOGIN_URL)
            .query("loginicon", "true")
            .query("uuid", uuid)
            .query("tip", tip)
            .query("r", !(now as i32))
            .query("_", now)
            .timeout(self.config.long_poll_timeout());
        let body = self.send(req).await?.text();
        parse_check_login(&body)
    }

    /// Follow the confirmed redirect and parse the credential XML. The
    /// redirect host picks the domain group for the session.
    pub async fn fetch_login_info(&self, redirect_uri: &str) -> Result<(LoginInfo, DomainGroup)> {
        let url = Url::parse(redirect_uri)
            .map_err(|e| LoginError::Protocol(format!("bad redirect uri: {}", e)))?;
        let domain = DomainGroup::from_url(redirect_uri)?;
        let mut req = HttpRequest::get(format!(
            "{}://{}{}",
            url.scheme(),
            url.host_str().unwrap_or_default(),
            url.path()
        ));
        for (key, value) in url.query_pairs() {
            req = req.query(&key, value);
        }
        req = req.query("fun", "new").query("version", "v2");
        if self.config.mode.is_desktop() {
            req = req
                .header("client-version", DESKTOP_CLIENT_VERSION)
                .header("extspam", DESKTOP_EXTSPAM);
        }
        let body = self.send(req).await?.text();
        let info = parse_login_info(&body)?;
        tracing::debug!(uin = info.wx_uin, host = %domain.base_host, "login info received");
        Ok((info, domain))
    }

    /// Ask the phone of `uin` to confirm a login; returns the bound UUID.
    pub async fn push_login(&self, domain: &DomainGroup, uin: i64) -> Result<String> {
        let req = HttpRequest::get(domain.base_url(endpoint::PUSH_LOGIN)).query("uin", uin);
        let resp: PushLoginResponse = self.send(req).await?.json()?;
        if resp.ok() {
            Ok(resp.uuid)
        } else {
            Err(LoginError::PushRejected(format!("ret {}: {}", resp.ret, resp.msg)).into())
        }
    }

    /// `webwxinit`: self user, initial contacts and the first sync key.
    pub async fn web_init(&self, creds: &Credentials) -> Result<WebInitResponse> {
        let req = HttpRequest::post(creds.domain.base_url(endpoint::WEB_INIT))
            .query("r", now_millis() / 1000)
            .query("pass_ticket", creds.pass_ticket())
            .header("mmweb_appid", APP_ID)
            .json(with_base_request(creds, json!({})));
        let resp = self.send(req).await?;
        let body: serde_json::Value = resp.json()?;
        let base: BaseResponse = body
            .get("BaseResponse")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();
        if base.ret == Ret::LoginEnvError.code() {
            return Err(Error::LoginForbidden);
        }
        base.check()?;
        Ok(serde_json::from_value(body)?)
    }

    /// Tell the server which conversation this endpoint is looking at.
    /// Code 3 after login marks the endpoint active; code 1 marks a chat read.
    pub async fn status_notify(
        &self,
        creds: &Credentials,
        from: &str,
        to: &str,
        code: i32,
    ) -> Result<()> {
        let req = HttpRequest::post(creds.domain.base_url(endpoint::STATUS_NOTIFY))
            .query("lang", "zh_CN")
            .query("pass_ticket", creds.pass_ticket())
            .json(with_base_request(
                creds,
                json!({
                    "Code": code,
                    "FromUserName": from,
                    "ToUserName": to,
                    "ClientMsgId": generate_client_msg_id(),
                }),
            ));
        let _: BaseResponse = self.send_checked(req).await?;
        Ok(())
    }

    pub async fn logout(&self, creds: &Credentials) -> Result<()> {
        let req = HttpRequest::post(creds.domain.base_url(endpoint::LOGOUT))
            .query("redirect", 1)
            .query("type", 1)
            .query("skey", creds.skey())
            .form(vec![
                ("sid".to_string(), creds.base_request.sid.clone()),
                ("uin".to_string(), creds.base_request.uin.to_string()),
            ]);
        self.transport.execute(req).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BotConfig;
    use crate::protocol::Mode;
    use crate::testing::{ok_envelope, ret_envelope, MockTransport};
    use std::sync::Arc;

    fn api(mock: &Arc<MockTransport>, config: BotConfig) -> WebApi {
        WebApi::new(mock.clone(), config)
    }

    #[tokio::test]
    async fn uuid_request_carries_mode_redirect() {
        let mock = Arc::new(MockTransport::new());
        mock.on("jslogin", r#"window.QRLogin.code = 200; window.QRLogin.uuid = "U1";"#);
        let api = api(&mock, BotConfig::desktop());
        assert_eq!(api.get_uuid().await.unwrap(), "U1");
        let req = &mock.requests_to("jslogin")[0];
        assert!(req.query_value("redirect_uri").unwrap().ends_with("mod=desktop"));
        assert_eq!(req.query_value("appid"), Some(APP_ID));
    }

    #[tokio::test]
    async fn desktop_headers_only_on_redirect_fetch() {
        let mock = Arc::new(MockTransport::new());
        mock.on(
            "webwxnewloginpage",
            "<error><ret>0</ret><skey>K</skey><wxsid>S</wxsid><wxuin>7</wxuin><pass_ticket>P</pass_ticket></error>",
        );
        let api = api(&mock, BotConfig::default().with_mode(Mode::Desktop));
        let (info, domain) = api
            .fetch_login_info("https://wx8.qq.com/cgi-bin/mmwebwx-bin/webwxnewloginpage?ticket=T&uuid=U&scan=1")
            .await
            .unwrap();
        assert_eq!(info.wx_uin, 7);
        assert_eq!(domain.base_host, "wx8.qq.com");
        let req = &mock.requests_to("webwxnewloginpage")[0];
        assert_eq!(req.query_value("ticket"), Some("T"));
        assert_eq!(req.query_value("fun"), Some("new"));
        let extspam = req.headers.iter().find(|(k, _)| k == "extspam").unwrap();
        assert_eq!(extspam.1, DESKTOP_EXTSPAM);
    }

    #[tokio::test]
    async fn normal_mode_sends_no_desktop_headers() {
        let mock = Arc::new(MockTransport::new());
        mock.on(
            "webwxnewloginpage",
            "<error><ret>0</ret><skey>K</skey><wxsid>S</wxsid><wxuin>7</wxuin><pass_ticket>P</pass_ticket></error>",
        );
        let api = api(&mock, BotConfig::default());
        api.fetch_login_info("https://wx.qq.com/cgi-bin/mmwebwx-bin/webwxnewloginpage?ticket=T")
            .await
            .unwrap();
        let req = &mock.requests_to("webwxnewloginpage")[0];
        assert!(req.headers.iter().all(|(k, _)| k != "extspam" && k != "client-version"));
    }

    #[tokio::test]
    async fn web_init_forbidden_and_ret_errors() {
        let mock = Arc::new(MockTransport::new());
        mock.on("webwxinit", ret_envelope(1203));
        mock.on("webwxinit", ret_envelope(1102));
        let api = api(&mock, BotConfig::default());
        let creds = Credentials::default();
        assert!(matches!(api.web_init(&creds).await, Err(Error::LoginForbidden)));
        assert_eq!(
            api.web_init(&creds).await.unwrap_err().ret(),
            Some(Ret::CookieInvalid)
        );
    }

    #[tokio::test]
    async fn web_init_parses_self() {
        let mock = Arc::new(MockTransport::new());
        mock.on(
            "webwxinit",
            ok_envelope(json!({
                "User": {"UserName": "@self", "NickName": "Me"},
                "SyncKey": {"Count": 1, "List": [{"Key": 1, "Val": 10}]},
                "ContactList": [{"UserName": "@@g"}],
            })),
        );
        let api = api(&mock, BotConfig::default());
        let init = api.web_init(&Credentials::default()).await.unwrap();
        assert_eq!(init.user.nick_name, "Me");
        assert_eq!(init.sync_key.flatten(), "1_10");
        assert_eq!(init.contact_list.len(), 1);
        let req = &mock.requests_to("webwxinit")[0];
        assert!(req.url.starts_with("https://wx.qq.com/"));
    }

    #[tokio::test]
    async fn push_login_rejection() {
        let mock = Arc::new(MockTransport::new());
        mock.on("webwxpushloginurl", r#"{"ret":"1","msg":"no"}"#);
        let api = api(&mock, BotConfig::default());
        let err = api.push_login(&DomainGroup::default(), 9).await.unwrap_err();
        assert!(matches!(err, Error::Login(LoginError::PushRejected(_))));
        assert_eq!(mock.requests()[0].query_value("uin"), Some("9"));
    }
}
