use crate::core::errors::{ClientError, TransportError};
use async_trait::async_trait;
use reqwest::{Client, Method};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{instrument, trace};

/// A fully built request, ready to hand to a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Absolute URL including any query string
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Serialized JSON body for POST/PUT
    pub body: Option<String>,
    /// Canonical payload the signature covers
    pub data_to_sign: String,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn is_signed(&self) -> bool {
        self.headers
            .contains_key(crate::core::kernel::signer::SIGNATURE_HEADER)
    }
}

/// Raw response as seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport trait for sending requests
///
/// The client never touches sockets itself; every request goes through an
/// implementation of this trait. Errors are handed back to the caller as-is.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Result<TransportResponse, TransportError>;
}

/// Configuration for the reqwest transport
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string to include in requests
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TransportConfig {
    /// Set the request timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Production transport backed by reqwest
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
    config: TransportConfig,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ClientError> {
        Self::with_config(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ClientError::Build(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: &Request) -> Result<TransportResponse, TransportError> {
        let mut builder = self.client.request(request.method.clone(), &request.url);

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        trace!("Response body: {}", body);

        Ok(TransportResponse { status, body })
    }
}
