use serde::de::Unexpected;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_API_HOST: &str = "bitpay.com";
pub const DEFAULT_API_PORT: u16 = 443;
pub const TESTNET_API_HOST: &str = "test.bitpay.com";
pub const TESTNET_API_PORT: u16 = 443;

pub const ENV_API_HOST: &str = "BITPAY_API_HOST";
pub const ENV_API_PORT: &str = "BITPAY_API_PORT";
pub const ENV_FORCE_SSL: &str = "BITPAY_FORCE_SSL";
pub const ENV_USE_TESTNET: &str = "USE_BITPAY_TESTNET";

/// Directory and file name of the per-user config file, relative to home.
const CONFIG_DIR: &str = ".bitpay";
const CONFIG_FILE: &str = "config.json";

/// Source of process-wide state consumed during configuration.
///
/// Abstracted so resolution can be exercised against fixed values instead of
/// the real process environment.
pub trait Env: Send + Sync + fmt::Debug {
    /// Value of an environment variable, `None` when unset.
    fn var(&self, key: &str) -> Option<String>;

    /// The current user's home directory.
    fn home_dir(&self) -> Option<PathBuf>;
}

/// Reads the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl ProcessEnv {
    /// Load a `.env` file into the process environment, then read from it.
    ///
    /// A missing `.env` file is fine; system environment variables are used.
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn with_dotenv() -> Result<Self, ConfigError> {
        Self::with_dotenv_path(".env")
    }

    /// Same as [`ProcessEnv::with_dotenv`] with a custom file path
    /// (e.g. `.env.development`).
    #[cfg(feature = "env-file")]
    pub fn with_dotenv_path(env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(()) => {
                debug!(path = env_file_path, "Loaded .env file");
            }
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }
        Ok(Self)
    }
}

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }
}

/// Fixed environment, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
    pub home_dir: Option<PathBuf>,
    pub envs: HashMap<String, String>,
}

impl StaticEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    pub fn with_home_dir(mut self, home_dir: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home_dir.into());
        self
    }
}

impl Env for StaticEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.envs.get(key).cloned()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home_dir.clone()
    }
}

/// One tier's contribution to the connection configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_host: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_port",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_port: Option<u16>,
    #[serde(
        rename = "forceSSL",
        default,
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub force_ssl: Option<bool>,
}

impl PartialConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn api_host(mut self, api_host: impl Into<String>) -> Self {
        self.api_host = Some(api_host.into());
        self
    }

    #[must_use]
    pub const fn api_port(mut self, api_port: u16) -> Self {
        self.api_port = Some(api_port);
        self
    }

    #[must_use]
    pub const fn force_ssl(mut self, force_ssl: bool) -> Self {
        self.force_ssl = Some(force_ssl);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.api_host.is_none() && self.api_port.is_none() && self.force_ssl.is_none()
    }

    /// Lay `higher` on top of `self`; every field `higher` sets wins.
    #[must_use]
    pub fn overlay(self, higher: Self) -> Self {
        Self {
            api_host: higher.api_host.or(self.api_host),
            api_port: higher.api_port.or(self.api_port),
            force_ssl: higher.force_ssl.or(self.force_ssl),
        }
    }

    fn defaults() -> Self {
        Self::new()
            .api_host(DEFAULT_API_HOST)
            .api_port(DEFAULT_API_PORT)
            .force_ssl(true)
    }

    fn testnet() -> Self {
        Self::new()
            .api_host(TESTNET_API_HOST)
            .api_port(TESTNET_API_PORT)
            .force_ssl(true)
    }
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => parse_port(&text),
        Value::Number(number) => {
            let port = number.as_u64().and_then(|n| u16::try_from(n).ok());
            if port.is_none() {
                warn!(value = %number, "Ignoring out-of-range API port");
            }
            port
        }
        other => {
            warn!(value = %other, "Ignoring API port of unexpected type");
            None
        }
    })
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::Bool(flag) => Some(flag),
        Value::String(text) => parse_flag(&text),
        Value::Number(number) => match number.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => {
                warn!(value = %number, "Ignoring non-boolean forceSSL");
                None
            }
        },
        other => {
            warn!(value = %other, "Ignoring forceSSL of unexpected type");
            None
        }
    })
}

fn parse_port(value: &str) -> Option<u16> {
    let port = value.trim().parse::<u16>().ok();
    if port.is_none() {
        warn!(value, "Ignoring non-numeric API port");
    }
    port
}

/// Boolean-like parsing for environment and file values.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// The connection settings every request is built against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
    pub api_host: String,
    pub api_port: u16,
    #[serde(rename = "forceSSL")]
    pub force_ssl: bool,
}

impl EffectiveConfig {
    pub const fn scheme(&self) -> &'static str {
        if self.force_ssl {
            "https"
        } else {
            "http"
        }
    }

    /// `scheme://host:port`, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme(), self.api_host, self.api_port)
    }
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            api_host: DEFAULT_API_HOST.to_string(),
            api_port: DEFAULT_API_PORT,
            force_ssl: true,
        }
    }
}

/// Where a configuration tier came from, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigSource {
    Defaults,
    File,
    Environment,
    Explicit,
    Testnet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayer {
    pub source: ConfigSource,
    pub values: PartialConfig,
}

/// Path of the per-user config file, `<home>/.bitpay/config.json`.
pub fn config_file_path(env: &dyn Env) -> Option<PathBuf> {
    env.home_dir()
        .map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Read and parse a config file.
pub fn load_config_file(path: &Path) -> Result<PartialConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let parse_error = |source: serde_json::Error| ConfigError::FileParse {
        path: path.to_path_buf(),
        source,
    };

    match serde_json::from_str::<Value>(&contents).map_err(parse_error)? {
        object @ Value::Object(_) => serde_json::from_value(object).map_err(parse_error),
        other => Err(parse_error(<serde_json::Error as serde::de::Error>::invalid_type(
            unexpected(&other),
            &"a JSON object",
        ))),
    }
}

fn unexpected(value: &Value) -> Unexpected<'_> {
    match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(_) => Unexpected::Other("number"),
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    }
}

/// Merges defaults, the config file, environment variables, explicit
/// overrides and the test-network switch into one [`EffectiveConfig`].
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    env: Arc<dyn Env>,
    overrides: PartialConfig,
    testnet: bool,
}

impl ConfigResolver {
    pub fn new(env: Arc<dyn Env>) -> Self {
        Self {
            env,
            overrides: PartialConfig::default(),
            testnet: false,
        }
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: PartialConfig) -> Self {
        self.overrides = overrides;
        self
    }

    #[must_use]
    pub const fn testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    fn env_var(&self, key: &str) -> Option<String> {
        self.env.var(key).filter(|value| !value.trim().is_empty())
    }

    pub fn testnet_enabled(&self) -> bool {
        self.testnet
            || self
                .env_var(ENV_USE_TESTNET)
                .and_then(|value| parse_flag(&value))
                .unwrap_or(false)
    }

    fn file_layer(&self) -> PartialConfig {
        let Some(path) = config_file_path(self.env.as_ref()) else {
            debug!("No home directory, skipping config file");
            return PartialConfig::default();
        };

        match load_config_file(&path) {
            Ok(values) => {
                debug!(path = %path.display(), "Loaded config file");
                values
            }
            Err(ConfigError::FileRead { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                PartialConfig::default()
            }
            Err(e) => {
                warn!("Ignoring config file: {}", e);
                PartialConfig::default()
            }
        }
    }

    fn env_layer(&self) -> PartialConfig {
        PartialConfig {
            api_host: self.env_var(ENV_API_HOST),
            api_port: self.env_var(ENV_API_PORT).and_then(|v| parse_port(&v)),
            force_ssl: self.env_var(ENV_FORCE_SSL).and_then(|v| parse_flag(&v)),
        }
    }

    /// Every tier that takes part in resolution, lowest precedence first.
    pub fn layers(&self) -> Vec<ConfigLayer> {
        let mut layers = vec![
            ConfigLayer {
                source: ConfigSource::Defaults,
                values: PartialConfig::defaults(),
            },
            ConfigLayer {
                source: ConfigSource::File,
                values: self.file_layer(),
            },
            ConfigLayer {
                source: ConfigSource::Environment,
                values: self.env_layer(),
            },
            ConfigLayer {
                source: ConfigSource::Explicit,
                values: self.overrides.clone(),
            },
        ];

        if self.testnet_enabled() {
            layers.push(ConfigLayer {
                source: ConfigSource::Testnet,
                values: PartialConfig::testnet(),
            });
        }

        layers
    }

    pub fn resolve(&self) -> EffectiveConfig {
        let merged = self
            .layers()
            .into_iter()
            .fold(PartialConfig::default(), |acc, layer| {
                acc.overlay(layer.values)
            });

        let defaults = EffectiveConfig::default();
        EffectiveConfig {
            api_host: merged.api_host.unwrap_or(defaults.api_host),
            api_port: merged.api_port.unwrap_or(defaults.api_port),
            force_ssl: merged.force_ssl.unwrap_or(defaults.force_ssl),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    FileParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
