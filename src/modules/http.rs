use std::error::Error;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use derive_more::with_trait::{Display, Error as DeriveError};
use log::{debug, warn};
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::modules::config::ConsoleConfig;
use crate::modules::errors::ConsoleError;
use crate::modules::location::Location;

const JSON: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Method {
    #[display("GET")]
    Get,
    #[display("POST")]
    Post,
    #[display("PUT")]
    Put,
    #[display("DELETE")]
    Delete,
}

/// Percent-encode one path segment (job ids, problem ids, tokens).
pub fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute path, query string included.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ConsoleError> {
        let text = serde_json::to_string(body).map_err(|e| ConsoleError::decode(e.to_string()))?;
        self.body = Some(text);
        Ok(self)
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Path without the query string.
    pub fn route(&self) -> &str {
        self.path.split('?').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ConsoleError> {
        serde_json::from_str(&self.body).map_err(|e| ConsoleError::decode(e.to_string()))
    }

    /// The `detail` member of a problem+json error body, if any.
    pub fn detail(&self) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(&self.body).ok()?;
        value
            .get("detail")
            .and_then(|detail| detail.as_str())
            .map(str::to_string)
    }
}

/// The request never produced a response (connection refused, reset, timeout).
#[derive(Debug, Clone, PartialEq, Display, DeriveError)]
#[display("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait(?Send)]
pub trait Transport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport bound to one backend origin. The cookie store
/// plays the role of same-origin credentials.
pub struct ReqwestTransport {
    base: Url,
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ConsoleConfig) -> Result<Self, Box<dyn Error>> {
        let base = Url::parse(&config.base_url)?;

        let jar = Jar::default();
        if let Some(cookie) = &config.session_cookie {
            jar.add_cookie_str(cookie, &base);
        }

        let client = reqwest::Client::builder()
            .cookie_provider(Arc::new(jar))
            .user_agent(config.http.user_agent.clone())
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .build()?;

        Ok(Self { base, client })
    }
}

#[async_trait(?Send)]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self
            .base
            .join(&request.path)
            .map_err(|e| TransportError::new(format!("invalid url {}: {e}", request.path)))?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, url);
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::new(e.to_string()))?;
            let value =
                HeaderValue::from_str(value).map_err(|e| TransportError::new(e.to_string()))?;
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

/// Request wrapper shared by every panel: JSON by default, login redirect on
/// 401, fixed-delay retry on transport failures.
#[derive(Clone)]
pub struct HttpClient {
    transport: Rc<dyn Transport>,
    location: Rc<dyn Location>,
    login_path: String,
    retries: u32,
    retry_delay: Duration,
}

impl HttpClient {
    pub fn new(
        transport: Rc<dyn Transport>,
        location: Rc<dyn Location>,
        config: &ConsoleConfig,
    ) -> Self {
        Self {
            transport,
            location,
            login_path: config.login_path.clone(),
            retries: config.http.retries,
            retry_delay: config.http.retry_delay(),
        }
    }

    pub async fn request(&self, request: HttpRequest) -> Result<HttpResponse, ConsoleError> {
        self.request_with_retries(request, self.retries).await
    }

    pub async fn request_with_retries(
        &self,
        mut request: HttpRequest,
        retries: u32,
    ) -> Result<HttpResponse, ConsoleError> {
        if request.header_value(CONTENT_TYPE.as_str()).is_none() {
            request.headers.push((CONTENT_TYPE.as_str().to_string(), JSON.to_string()));
        }

        let mut attempt = 0;
        loop {
            debug!("{} {} (attempt {})", request.method, request.path, attempt + 1);
            match self.transport.send(request.clone()).await {
                Ok(response) if response.status == 401 => {
                    warn!("{} {} unauthorized, redirecting to login", request.method, request.path);
                    self.location.assign(&self.login_path);
                    return Err(ConsoleError::Unauthorized);
                }
                Ok(response) => return Ok(response),
                Err(err) if attempt < retries => {
                    attempt += 1;
                    warn!(
                        "{} {} failed: {err}; retry {attempt}/{retries} in {:?}",
                        request.method, request.path, self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => return Err(ConsoleError::network(err.message)),
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConsoleError> {
        let response = self.request(HttpRequest::get(path)).await?;
        expect_success(response)?.json()
    }

    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ConsoleError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = HttpRequest::new(method, path).json(body)?;
        let response = self.request(request).await?;
        expect_success(response)?.json()
    }

    /// Fire a request whose response body is irrelevant.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<(), ConsoleError> {
        let mut request = HttpRequest::new(method, path);
        if let Some(body) = body {
            request = request.json(body)?;
        }
        expect_success(self.request(request).await?)?;
        Ok(())
    }
}

fn expect_success(response: HttpResponse) -> Result<HttpResponse, ConsoleError> {
    if response.is_success() {
        return Ok(response);
    }
    Err(ConsoleError::BackendRejection {
        status: response.status,
        detail: response.detail(),
    })
}
