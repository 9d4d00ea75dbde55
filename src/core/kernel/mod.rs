//! Transport and authentication kernel
//!
//! The kernel holds everything that is independent of BitPay's endpoints:
//! how a built [`Request`] is put on the wire and how it is authenticated.
//!
//! ## Transport
//! - `Transport`: pluggable send interface, injected into the client
//! - `ReqwestTransport`: production implementation over reqwest
//!
//! ## Authentication
//! - `Signer`: turns a canonical payload into authentication headers
//! - `IdentitySigner`: BitAuth (secp256k1 ECDSA over SHA-256)
//!
//! # Testing with a custom transport
//! ```rust
//! use async_trait::async_trait;
//! use bitpay_client::core::errors::TransportError;
//! use bitpay_client::core::kernel::{Request, Transport, TransportResponse};
//!
//! struct Canned;
//!
//! #[async_trait]
//! impl Transport for Canned {
//!     async fn send(&self, _request: &Request) -> Result<TransportResponse, TransportError> {
//!         Ok(TransportResponse::new(200, r#"{ "data": [] }"#))
//!     }
//! }
//! ```
pub mod signer;
pub mod transport;

// Re-export key types for convenience
pub use signer::{
    sin_from_public_key, verify_signature, ClientIdentity, IdentitySigner, SignatureResult,
    Signer, IDENTITY_HEADER, SIGNATURE_HEADER,
};
pub use transport::{ReqwestTransport, Request, Transport, TransportConfig, TransportResponse};
