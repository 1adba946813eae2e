//! Authenticated-request transport boundary
//!
//! Vendor clients never open sockets or configure TLS themselves; they go
//! through [`Transport`]. The provided implementation wraps a reqwest client
//! with a cookie store, so `Set-Cookie` session values ride along
//! automatically once a login has succeeded.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};

use crate::error::{BmcError, Result};

/// Extra request headers, borrowed from the caller
pub type Headers<'a> = &'a [(&'a str, &'a str)];

/// Raw response from the device: status code, headers, body bytes
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// First header with the given name, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Body as lossy UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Deserialize the body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self, context: &str) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|err| BmcError::UnmarshalFailed {
            context: context.to_string(),
            reason: err.to_string(),
        })
    }

    pub fn success(&self) -> bool {
        self.status.is_success()
    }

    /// Map a non-2xx status to [`BmcError::RequestFailed`]
    pub fn require_success(self, context: &str) -> Result<Response> {
        if self.success() {
            Ok(self)
        } else {
            Err(BmcError::RequestFailed {
                context: context.to_string(),
                status: self.status,
                body: self.text(),
            })
        }
    }
}

/// Request executor for one device
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a single request and return the raw response
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Vec<u8>>,
        headers: Headers<'_>,
    ) -> Result<Response>;

    async fn get(&self, endpoint: &str, headers: Headers<'_>) -> Result<Response> {
        self.send(Method::GET, endpoint, None, headers).await
    }

    async fn post(&self, endpoint: &str, body: Vec<u8>, headers: Headers<'_>) -> Result<Response> {
        self.send(Method::POST, endpoint, Some(body), headers).await
    }

    async fn put(&self, endpoint: &str, body: Vec<u8>, headers: Headers<'_>) -> Result<Response> {
        self.send(Method::PUT, endpoint, Some(body), headers).await
    }

    async fn patch(&self, endpoint: &str, body: Vec<u8>, headers: Headers<'_>) -> Result<Response> {
        self.send(Method::PATCH, endpoint, Some(body), headers).await
    }

    async fn delete(&self, endpoint: &str, headers: Headers<'_>) -> Result<Response> {
        self.send(Method::DELETE, endpoint, None, headers).await
    }
}

/// HTTPS transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// BMC hostname or IP
    pub host: String,
    /// HTTPS port (default 443)
    pub port: u16,
    /// Skip TLS verification (BMCs ship self-signed certs)
    pub insecure: bool,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl HttpConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 443,
            insecure: false,
            timeout_secs: 60,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// reqwest-backed [`Transport`]
#[derive(Debug)]
pub struct HttpTransport {
    base_url: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(config.insecure)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: format!("https://{}:{}", config.host, config.port),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Vec<u8>>,
        headers: Headers<'_>,
    ) -> Result<Response> {
        let mut request = self.client.request(method, self.url(endpoint));

        let mut has_content_type = false;
        for (name, value) in headers {
            if name.eq_ignore_ascii_case("content-type") {
                has_content_type = true;
            }
            request = request.header(*name, *value);
        }

        if let Some(body) = body {
            if !has_content_type {
                request = request.header(CONTENT_TYPE, "application/json");
            }
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
