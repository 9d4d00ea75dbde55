use super::facade::{Facade, FacadeState};
use super::{BitPayClient, ClientDefaults, ClientInner, ReadyState};
use crate::core::config::{ConfigResolver, Env, PartialConfig, ProcessEnv};
use crate::core::errors::ClientError;
use crate::core::kernel::{IdentitySigner, ReqwestTransport, Signer, Transport};
use secrecy::{ExposeSecret, Secret};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::{info, warn};

/// Builder for creating [`BitPayClient`] instances
pub struct ClientBuilder {
    private_key: Option<Secret<String>>,
    signer: Option<Arc<dyn Signer>>,
    config: PartialConfig,
    testnet: bool,
    env: Option<Arc<dyn Env>>,
    transport: Option<Arc<dyn Transport>>,
    get_tokens: bool,
    #[cfg(feature = "env-file")]
    dotenv_path: Option<String>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            private_key: None,
            signer: None,
            config: PartialConfig::default(),
            testnet: false,
            env: None,
            transport: None,
            get_tokens: true,
            #[cfg(feature = "env-file")]
            dotenv_path: None,
        }
    }

    /// Hex-encoded secp256k1 private key used to sign requests
    pub fn private_key(mut self, private_key: impl Into<String>) -> Self {
        self.private_key = Some(Secret::new(private_key.into()));
        self
    }

    /// Use an existing signer instead of a raw private key
    pub fn signer(mut self, signer: impl Signer + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Explicit connection settings; they beat the environment and the
    /// config file, but not the test network switch.
    pub fn config(mut self, config: PartialConfig) -> Self {
        self.config = config;
        self
    }

    pub fn testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    /// Source for environment variables and the home directory
    pub fn env(mut self, env: impl Env + 'static) -> Self {
        self.env = Some(Arc::new(env));
        self
    }

    /// Load a `.env` file into the process environment before resolving
    /// configuration. Ignored when [`ClientBuilder::env`] supplies the source.
    #[cfg(feature = "env-file")]
    pub fn dotenv(mut self, path: impl Into<String>) -> Self {
        self.dotenv_path = Some(path.into());
        self
    }

    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Whether to fetch tokens at construction when a key is present
    pub fn get_tokens(mut self, get_tokens: bool) -> Self {
        self.get_tokens = get_tokens;
        self
    }

    fn build_signer(&self) -> Result<Option<Arc<dyn Signer>>, ClientError> {
        if let Some(signer) = &self.signer {
            return Ok(Some(Arc::clone(signer)));
        }

        self.private_key
            .as_ref()
            .map(|key| {
                IdentitySigner::from_hex(key.expose_secret())
                    .map(|signer| Arc::new(signer) as Arc<dyn Signer>)
            })
            .transpose()
    }

    #[cfg(feature = "env-file")]
    fn process_env(&self) -> Result<ProcessEnv, ClientError> {
        match &self.dotenv_path {
            Some(path) => Ok(ProcessEnv::with_dotenv_path(path)?),
            None => Ok(ProcessEnv),
        }
    }

    #[cfg(not(feature = "env-file"))]
    fn process_env(&self) -> Result<ProcessEnv, ClientError> {
        Ok(ProcessEnv)
    }

    /// Build the client and, with a key, start token bootstrap.
    ///
    /// Bootstrap is spawned on the current Tokio runtime; building a keyed
    /// client outside of one fails.
    pub fn build(self) -> Result<BitPayClient, ClientError> {
        let signer = self.build_signer()?;
        let has_key = signer.is_some();

        let defaults = ClientDefaults {
            sign_requests: has_key,
            get_tokens: has_key && self.get_tokens,
            facade: if has_key {
                Facade::Merchant
            } else {
                Facade::Public
            },
        };

        let env: Arc<dyn Env> = match &self.env {
            Some(env) => Arc::clone(env),
            None => Arc::new(self.process_env()?),
        };
        let config = ConfigResolver::new(env)
            .with_overrides(self.config)
            .testnet(self.testnet)
            .resolve();

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        let runtime = if defaults.get_tokens {
            Some(tokio::runtime::Handle::try_current().map_err(|e| {
                ClientError::Build(format!("Token bootstrap needs a Tokio runtime: {}", e))
            })?)
        } else {
            None
        };

        let (ready, _) = watch::channel(ReadyState::Pending);
        let client = BitPayClient::from_inner(ClientInner {
            config,
            defaults,
            facade: FacadeState::new(defaults.facade),
            signer,
            tokens: RwLock::new(HashMap::new()),
            transport,
            ready,
        });

        info!(
            host = %client.config().api_host,
            port = client.config().api_port,
            signed = defaults.sign_requests,
            "BitPay client created"
        );

        match runtime {
            Some(runtime) => {
                let bootstrap = client.clone();
                runtime.spawn(async move {
                    let state = match bootstrap.fetch_tokens().await {
                        Ok(count) => {
                            info!(tokens = count, "Token bootstrap complete");
                            ReadyState::Ready
                        }
                        Err(e) => {
                            warn!("Token bootstrap failed: {}", e);
                            ReadyState::Failed(e.to_string())
                        }
                    };
                    bootstrap.mark_ready(state);
                });
            }
            None => client.mark_ready(ReadyState::Ready),
        }

        Ok(client)
    }
}
