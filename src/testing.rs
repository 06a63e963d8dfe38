//! Scripted transport for unit and end-to-end tests.

use crate::error::Error;
use crate::transport::{CookieMap, HttpRequest, HttpResponse, StoredCookie, Transport};
use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

#[derive(Clone)]
enum Reply {
    Response(u16, String),
    NetworkError(String),
}

/// Answers requests by endpoint (last path segment) from per-route queues.
/// A route with nothing queued and no repeat reply hangs forever, the way an
/// idle long poll does.
#[derive(Default)]
pub(crate) struct MockTransport {
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    repeat: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
    cookies: Mutex<CookieMap>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, endpoint: &str, body: impl Into<String>) -> &Self {
        self.on_status(endpoint, 200, body)
    }

    pub fn on_status(&self, endpoint: &str, status: u16, body: impl Into<String>) -> &Self {
        self.queued
            .lock()
            .entry(endpoint.to_string())
            .or_default()
            .push_back(Reply::Response(status, body.into()));
        self
    }

    pub fn on_network_error(&self, endpoint: &str, msg: &str) -> &Self {
        self.queued
            .lock()
            .entry(endpoint.to_string())
            .or_default()
            .push_back(Reply::NetworkError(msg.to_string()));
        self
    }

    /// Reply used once the queue for `endpoint` is empty.
    pub fn repeat(&self, endpoint: &str, body: impl Into<String>) -> &Self {
        self.repeat
            .lock()
            .insert(endpoint.to_string(), Reply::Response(200, body.into()));
        self
    }

    pub fn set_cookie(&self, origin: &str, set_cookie: &str) -> &Self {
        if let Some(cookie) = StoredCookie::parse(set_cookie) {
            self.cookies.lock().insert(origin, cookie);
        }
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, endpoint: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.endpoint() == endpoint)
            .cloned()
            .collect()
    }

    pub fn count(&self, endpoint: &str) -> usize {
        self.requests_to(endpoint).len()
    }

    /// Poll until `endpoint` has been hit `n` times or `timeout` passes.
    pub async fn wait_for(&self, endpoint: &str, n: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.count(endpoint) >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.count(endpoint) >= n
    }

    fn next_reply(&self, request: &HttpRequest) -> Option<Reply> {
        self.requests.lock().push(request.clone());
        let endpoint = request.endpoint();
        if let Some(reply) = self
            .queued
            .lock()
            .get_mut(endpoint)
            .and_then(|q| q.pop_front())
        {
            return Some(reply);
        }
        self.repeat.lock().get(endpoint).cloned()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let reply = self.next_reply(&request);
        match reply {
            Some(Reply::Response(status, body)) => {
                let mut resp = HttpResponse::new(status, body);
                resp.url = request.url.clone();
                Ok(resp)
            }
            Some(Reply::NetworkError(msg)) => Err(Error::Network(msg)),
            None => std::future::pending().await,
        }
    }

    fn cookies(&self) -> CookieMap {
        self.cookies.lock().clone()
    }

    fn load_cookies(&self, cookies: &CookieMap) -> Result<()> {
        let mut jar = self.cookies.lock();
        for (origin, list) in cookies.iter() {
            for cookie in list {
                jar.insert(origin, cookie.clone());
            }
        }
        Ok(())
    }
}

/// `{"BaseResponse":{"Ret":0,"ErrMsg":""}}` plus extra top-level fields.
pub(crate) fn ok_envelope(extra: serde_json::Value) -> String {
    let mut body = serde_json::json!({"BaseResponse": {"Ret": 0, "ErrMsg": ""}});
    if let (Some(map), serde_json::Value::Object(extra)) = (body.as_object_mut(), extra) {
        map.extend(extra);
    }
    body.to_string()
}

pub(crate) fn ret_envelope(ret: i32) -> String {
    serde_json::json!({"BaseResponse": {"Ret": ret, "ErrMsg": ""}}).to_string()
}

/// Install a test subscriber once; respects `RUST_LOG`.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
