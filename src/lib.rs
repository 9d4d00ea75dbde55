pub mod client;
pub mod core;

pub use client::{BitPayClient, ClientBuilder, ClientDefaults, Facade, Resource, Response};
pub use crate::core::{
    config::{EffectiveConfig, PartialConfig},
    errors::{ClientError, TransportError},
    kernel::{IdentitySigner, Request, Transport, TransportResponse},
};
pub use reqwest::Method;
