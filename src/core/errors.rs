use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::core::config::ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to parse response body: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Token bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("Client build failed: {0}")]
    Build(String),
}

/// Errors reported by a [`Transport`](crate::core::kernel::Transport).
///
/// The dispatcher hands these to the caller unchanged.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network error: {0}")]
    Network(String),
}
