#![allow(dead_code)]

use async_trait::async_trait;
use bitpay_client::core::config::StaticEnv;
use bitpay_client::{
    BitPayClient, ClientBuilder, Request, Transport, TransportError, TransportResponse,
};
use std::sync::{Arc, Mutex};

pub const PRIVATE_KEY: &str = "97811b691dd7ebaeb67977d158e1da2c4d3eaa4ee4e2555150628acade6b344c";
pub const PUBLIC_KEY: &str = "02326209e52f6f17e987ec27c56a1321acf3d68088b8fb634f232f12ccbc9a4575";

/// Body every request gets unless a test says otherwise.
pub const DEFAULT_BODY: &str = r#"{ "data": [{}] }"#;

type Responder = dyn Fn(&Request) -> Result<TransportResponse, TransportError> + Send + Sync;

/// Transport that records every request and answers from a closure.
#[derive(Clone)]
pub struct MockTransport {
    requests: Arc<Mutex<Vec<Request>>>,
    responder: Arc<Responder>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::with_body(DEFAULT_BODY)
    }

    pub fn with_body(body: &str) -> Self {
        let body = body.to_string();
        Self::with_responder(move |_| Ok(TransportResponse::new(200, body.clone())))
    }

    pub fn with_responder(
        responder: impl Fn(&Request) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(responder),
        }
    }

    /// Answer `tokens` with `tokens_body` and everything else with `body`.
    pub fn with_tokens(tokens_body: &str, body: &str) -> Self {
        let tokens_body = tokens_body.to_string();
        let body = body.to_string();
        Self::with_responder(move |request| {
            let body = if request.url.ends_with("/tokens") {
                tokens_body.clone()
            } else {
                body.clone()
            };
            Ok(TransportResponse::new(200, body))
        })
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Request {
        self.requests().last().cloned().expect("no request was sent")
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &Request) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.responder)(request)
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Builder wired to a fixed, empty environment and the given transport.
pub fn builder(transport: &MockTransport) -> ClientBuilder {
    init_tracing();
    BitPayClient::builder()
        .env(StaticEnv::new())
        .transport(transport.clone())
}

pub async fn keyed_client(transport: &MockTransport) -> BitPayClient {
    let client = builder(transport).private_key(PRIVATE_KEY).build().unwrap();
    client.ready().await.unwrap();
    client
}

pub fn keyless_client(transport: &MockTransport) -> BitPayClient {
    builder(transport).build().unwrap()
}
