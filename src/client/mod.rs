//! BitPay REST client.
//!
//! A [`BitPayClient`] resolves its connection settings once, optionally
//! derives a signing identity from a private key, and then sends every verb
//! call through the same pipeline:
//!
//! 1. the active [`Facade`] is taken (a one-shot override if one was set);
//! 2. the request is built and, for any facade other than `public`, signed
//!    over its canonical payload;
//! 3. the [`Transport`] sends it;
//! 4. the body is parsed and every returned object wrapped as a [`Resource`].
//!
//! ```rust,no_run
//! use bitpay_client::{BitPayClient, Facade};
//!
//! # async fn example() -> Result<(), bitpay_client::ClientError> {
//! let client = BitPayClient::builder()
//!     .private_key("97811b691dd7ebaeb67977d158e1da2c4d3eaa4ee4e2555150628acade6b344c")
//!     .testnet(true)
//!     .build()?;
//! client.ready().await?;
//!
//! let rates = client.as_facade(Facade::Public).get("rates", None).await?;
//! for rate in &rates {
//!     println!("{}", rate.value());
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod facade;
pub mod request;
pub mod resource;

pub use builder::ClientBuilder;
pub use facade::Facade;
pub use request::Params;
pub use resource::{Resource, Response};

use crate::core::config::{EffectiveConfig, PartialConfig};
use crate::core::errors::ClientError;
use crate::core::guid;
use crate::core::kernel::{ClientIdentity, Request, Signer, Transport, TransportResponse};
use facade::FacadeState;
use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;
use tracing::{debug, instrument};

/// Path of the token listing fetched during bootstrap.
pub const TOKENS_PATH: &str = "tokens";

/// Construction-time behaviour, fixed by whether a private key was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientDefaults {
    pub sign_requests: bool,
    pub get_tokens: bool,
    pub facade: Facade,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReadyState {
    Pending,
    Ready,
    Failed(String),
}

pub(crate) struct ClientInner {
    config: EffectiveConfig,
    defaults: ClientDefaults,
    facade: FacadeState,
    signer: Option<Arc<dyn Signer>>,
    tokens: RwLock<HashMap<Facade, String>>,
    transport: Arc<dyn Transport>,
    ready: watch::Sender<ReadyState>,
}

/// Client for the BitPay REST API. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct BitPayClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for BitPayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitPayClient")
            .field("config", &self.inner.config)
            .field("defaults", &self.inner.defaults)
            .field("facade", &self.facade())
            .field("has_signer", &self.inner.signer.is_some())
            .finish_non_exhaustive()
    }
}

impl BitPayClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Client against the real environment and HTTP transport.
    ///
    /// With a key, token bootstrap starts immediately, so this must be called
    /// from within a Tokio runtime.
    pub fn new(private_key: Option<&str>, config: PartialConfig) -> Result<Self, ClientError> {
        let mut builder = ClientBuilder::new().config(config);
        if let Some(private_key) = private_key {
            builder = builder.private_key(private_key);
        }
        builder.build()
    }

    pub(crate) fn from_inner(inner: ClientInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &EffectiveConfig {
        &self.inner.config
    }

    pub fn defaults(&self) -> ClientDefaults {
        self.inner.defaults
    }

    pub fn identity(&self) -> Option<ClientIdentity> {
        self.inner.signer.as_ref().map(|signer| signer.identity())
    }

    /// Use `facade` for the next request only.
    pub fn as_facade(&self, facade: Facade) -> &Self {
        self.inner.facade.set_override(facade);
        self
    }

    /// Facade the next request will use.
    pub fn facade(&self) -> Facade {
        self.inner.facade.active()
    }

    pub fn tokens(&self) -> HashMap<Facade, String> {
        self.inner
            .tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn token(&self, facade: Facade) -> Option<String> {
        self.inner
            .tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&facade)
            .cloned()
    }

    /// Store a token in memory, e.g. one obtained by pairing.
    pub fn set_token(&self, facade: Facade, token: impl Into<String>) {
        self.inner
            .tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(facade, token.into());
    }

    pub fn create_guid(&self) -> String {
        guid::create_guid()
    }

    /// Wait for construction-time token bootstrap to finish.
    ///
    /// Resolves at once for clients without a key.
    pub async fn ready(&self) -> Result<(), ClientError> {
        let mut ready = self.inner.ready.subscribe();
        let state = ready
            .wait_for(|state| *state != ReadyState::Pending)
            .await
            .map_err(|_| ClientError::Bootstrap("client was dropped".to_string()))?
            .clone();

        match state {
            ReadyState::Failed(message) => Err(ClientError::Bootstrap(message)),
            _ => Ok(()),
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready.borrow() == ReadyState::Ready
    }

    pub async fn get(&self, path: &str, params: Option<Value>) -> Result<Response, ClientError> {
        self.send_request(Method::GET, path, params).await
    }

    pub async fn put(&self, path: &str, params: Option<Value>) -> Result<Response, ClientError> {
        self.send_request(Method::PUT, path, params).await
    }

    pub async fn post(&self, path: &str, params: Option<Value>) -> Result<Response, ClientError> {
        self.send_request(Method::POST, path, params).await
    }

    pub async fn delete(&self, path: &str, params: Option<Value>) -> Result<Response, ClientError> {
        self.send_request(Method::DELETE, path, params).await
    }

    /// Build the request the next call would send, without sending it or
    /// consuming a facade override.
    pub fn prepare(
        &self,
        method: Method,
        path: &str,
        params: Option<Value>,
    ) -> Result<Request, ClientError> {
        let params = request::params_object(params)?;
        self.build_request(method, path, params, self.facade())
    }

    /// Send a request under the active facade.
    ///
    /// A facade override set with [`BitPayClient::as_facade`] is cleared once
    /// this call returns, whether it succeeded or not.
    #[instrument(skip_all, fields(method = %method, path = %path))]
    pub async fn send_request(
        &self,
        method: Method,
        path: &str,
        params: Option<Value>,
    ) -> Result<Response, ClientError> {
        let (facade, _reset) = self.inner.facade.begin_request();
        let params = request::params_object(params)?;
        self.dispatch(method, path, params, facade).await
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        params: Params,
        facade: Facade,
    ) -> Result<Response, ClientError> {
        let request = self.build_request(method, path, params, facade)?;
        debug!(
            facade = %facade,
            signed = request.is_signed(),
            url = %request.url,
            "Dispatching request"
        );

        let response = self.inner.transport.send(&request).await?;
        let data = process_response(response)?;

        Ok(resource::augment(self, path, data))
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        mut params: Params,
        facade: Facade,
    ) -> Result<Request, ClientError> {
        if let Some(token) = self.token(facade) {
            params
                .entry("token")
                .or_insert_with(|| Value::String(token));
        }

        if method == Method::POST {
            params
                .entry("guid")
                .or_insert_with(|| Value::String(guid::create_guid()));
        }

        let signer = if facade.requires_signature() {
            let signer = self.inner.signer.as_deref().ok_or_else(|| {
                ClientError::Signing(format!(
                    "Facade '{}' requires a private key, none was provided",
                    facade
                ))
            })?;
            Some(signer)
        } else {
            None
        };

        request::build_request(&self.inner.config, method, path, &params, signer)
    }

    /// Fetch the tokens this identity holds and store them by facade.
    #[instrument(skip(self))]
    pub(crate) async fn fetch_tokens(&self) -> Result<usize, ClientError> {
        let facade = self.inner.defaults.facade;
        let response = self
            .dispatch(Method::GET, TOKENS_PATH, Params::new(), facade)
            .await?;

        let mut tokens = HashMap::new();
        for resource in &response {
            let Some(entries) = resource.value().as_object() else {
                continue;
            };
            for (name, token) in entries {
                match (name.parse::<Facade>(), token.as_str()) {
                    (Ok(facade), Some(token)) => {
                        tokens.insert(facade, token.to_string());
                    }
                    _ => debug!(facade = %name, "Skipping unrecognised token entry"),
                }
            }
        }

        let count = tokens.len();
        self.inner
            .tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(tokens);

        Ok(count)
    }

    pub(crate) fn mark_ready(&self, state: ReadyState) {
        self.inner.ready.send_replace(state);
    }
}

/// Turn a raw transport response into the payload under `data`.
fn process_response(response: TransportResponse) -> Result<Value, ClientError> {
    let parsed = serde_json::from_str::<Value>(&response.body);

    if !response.is_success() {
        let message = parsed
            .ok()
            .and_then(|body| body.get("error").map(error_message))
            .unwrap_or(response.body);
        return Err(ClientError::Api {
            status: response.status,
            message,
        });
    }

    let body = parsed?;
    if let Some(error) = body.get("error") {
        return Err(ClientError::Api {
            status: response.status,
            message: error_message(error),
        });
    }

    Ok(match body {
        Value::Object(mut envelope) => envelope
            .remove("data")
            .unwrap_or(Value::Object(envelope)),
        other => other,
    })
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        other => other.to_string(),
    }
}
