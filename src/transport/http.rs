use super::{CookieMap, HttpRequest, HttpResponse, MultipartField, RecordingJar, RequestBody, Transport};
use crate::config::BotConfig;
use crate::Result;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{redirect, Client};
use std::sync::Arc;
use std::time::Duration;

/// reqwest-backed transport. Redirects are not followed: the login
/// redirect carries the credentials in its own body.
pub struct HttpTransport {
    client: Client,
    jar: Arc<RecordingJar>,
    default_timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &BotConfig) -> Result<Self> {
        let jar = Arc::new(RecordingJar::new());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .redirect(redirect::Policy::none())
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            jar,
            default_timeout: config.request_timeout(),
        })
    }

    fn build_form(fields: Vec<MultipartField>) -> Result<Form> {
        let mut form = Form::new();
        for field in fields {
            form = match field {
                MultipartField::Text { name, value } => form.text(name, value),
                MultipartField::File {
                    name,
                    file_name,
                    mime,
                    data,
                } => {
                    let part = Part::stream(data).file_name(file_name).mime_str(&mime)?;
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.full_url()?;
        tracing::trace!(method = %request.method, endpoint = request.endpoint(), "http request");
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .timeout(request.timeout.unwrap_or(self.default_timeout));
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart(fields) => builder.multipart(Self::build_form(fields)?),
        };
        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let url = resp.url().to_string();
        let body = resp.bytes().await?;
        tracing::trace!(status, len = body.len(), "http response");
        Ok(HttpResponse {
            status,
            headers,
            body,
            url,
        })
    }

    fn cookies(&self) -> CookieMap {
        self.jar.snapshot()
    }

    fn load_cookies(&self, cookies: &CookieMap) -> Result<()> {
        self.jar.load(cookies)
    }
}
