//! Gateway endpoint calls.
//!
//! [`WebApi`] is stateless apart from its transport: every authenticated
//! call takes a [`Credentials`] snapshot, so callers never hold a session
//! lock across a request.

mod contact;
mod login;
mod message;
mod sync;

pub use contact::{ChatRoomUpdate, VerifyOp};
pub use message::{MediaKind, UploadedMedia};

use crate::config::BotConfig;
use crate::protocol::{check_base_response, APP_ID};
use crate::transport::{HttpRequest, HttpResponse, Transport};
use crate::types::Credentials;
use crate::Result;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct WebApi {
    transport: Arc<dyn Transport>,
    config: BotConfig,
}

impl WebApi {
    pub fn new(transport: Arc<dyn Transport>, config: BotConfig) -> Self {
        Self { transport, config }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.transport.execute(request).await?.error_for_status()
    }

    /// Send and decode a JSON envelope, failing on a non-zero `BaseResponse.Ret`.
    async fn send_checked<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        let resp = self.send(request.header("mmweb_appid", APP_ID)).await?;
        let body: Value = resp.json()?;
        check_base_response(&body)?;
        Ok(serde_json::from_value(body)?)
    }

    /// Current value of the upload ticket cookie.
    fn data_ticket(&self) -> String {
        self.transport
            .cookies()
            .cookie_value("webwx_data_ticket")
            .unwrap_or_default()
            .to_string()
    }
}

/// `{"BaseRequest": {...}}` merged with `extra`'s fields.
fn with_base_request(creds: &Credentials, extra: Value) -> Value {
    let mut body = json!({ "BaseRequest": creds.base_request });
    if let (Some(map), Value::Object(extra)) = (body.as_object_mut(), extra) {
        map.extend(extra);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BaseRequest;

    #[test]
    fn body_wraps_base_request() {
        let creds = Credentials {
            base_request: BaseRequest {
                uin: 1,
                sid: "S".into(),
                skey: "K".into(),
                device_id: "e000000000000001".into(),
            },
            ..Default::default()
        };
        let body = with_base_request(&creds, json!({"Code": 3}));
        assert_eq!(body["BaseRequest"]["Sid"], "S");
        assert_eq!(body["BaseRequest"]["DeviceID"], "e000000000000001");
        assert_eq!(body["Code"], 3);
    }
}
