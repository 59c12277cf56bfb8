//! Configuration for mollom-rs
//!
//! Settings can come from a TOML file, from `MOLLOM_*` environment
//! variables, or both (environment wins).
//!
//! ```toml
//! public_key = "7c5b2f..."
//! private_key = "a3e9d1..."
//! protocol = "xmlrpc"
//! bootstrap_servers = ["http://xmlrpc2.mollom.com"]
//! testing = true
//! failure_policy = "fail-open"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{MollomError, Result};

/// Wire protocol used to talk to the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// XML-RPC calls against `{server}/{api_version}`
    #[default]
    XmlRpc,
    /// Form-encoded REST calls against `{server}/{api_version}/{path}`
    Rest,
}

/// What content checks report when no server can be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Return the communication error to the caller
    #[default]
    Throw,
    /// Treat the content as ham
    FailOpen,
    /// Treat the content as spam
    FailClosed,
}

/// Client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MollomConfig {
    /// Public key identifying the site
    pub public_key: String,
    /// Private key used to sign requests
    pub private_key: String,
    /// Wire protocol
    #[serde(default)]
    pub protocol: Protocol,
    /// API version path segment
    #[serde(default = "default_api_version", deserialize_with = "version_string")]
    pub api_version: String,
    /// Servers used before an authoritative list is known
    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: Vec<String>,
    /// Evaluate every request in sandbox mode
    #[serde(default)]
    pub testing: bool,
    /// Rotate through the server pool on failure
    #[serde(default = "default_load_balancing")]
    pub load_balancing: bool,
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
    /// Server list refreshes allowed within one call
    #[serde(default = "default_max_refreshes")]
    pub max_refreshes: u32,
    /// Attempts against the fixed server when load balancing is off
    #[serde(default = "default_fixed_server_attempts")]
    pub fixed_server_attempts: u32,
    /// Content check result when the service is unreachable
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

pub(crate) const DEFAULT_BOOTSTRAP_SERVERS: [&str; 3] = [
    "http://wdc-api02.mollom.com",
    "http://wdc-api03.mollom.com",
    "http://xmlrpc2.mollom.com",
];

fn default_api_version() -> String {
    "1.0".to_string()
}

/// Accepts `"1.0"` as well as `1.0`, which is what a parsed environment
/// variable turns into.
fn version_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Version {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Version::deserialize(deserializer)? {
        Version::Text(text) => text,
        Version::Int(n) => format!("{}.0", n),
        Version::Float(f) => format!("{:?}", f),
    })
}

fn default_bootstrap_servers() -> Vec<String> {
    DEFAULT_BOOTSTRAP_SERVERS.iter().map(|s| s.to_string()).collect()
}

fn default_load_balancing() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    3_000
}

fn default_read_timeout() -> u64 {
    10_000
}

fn default_max_refreshes() -> u32 {
    2
}

fn default_fixed_server_attempts() -> u32 {
    2
}

impl MollomConfig {
    /// Create a configuration with default settings for the given key pair
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
            protocol: Protocol::default(),
            api_version: default_api_version(),
            bootstrap_servers: default_bootstrap_servers(),
            testing: false,
            load_balancing: default_load_balancing(),
            connect_timeout_ms: default_connect_timeout(),
            read_timeout_ms: default_read_timeout(),
            max_refreshes: default_max_refreshes(),
            fixed_server_attempts: default_fixed_server_attempts(),
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MollomError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| MollomError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `MOLLOM_*` environment variables only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load configuration from an optional TOML file overlaid with the
    /// environment.
    ///
    /// Recognised variables include `MOLLOM_PUBLIC_KEY`, `MOLLOM_PRIVATE_KEY`,
    /// `MOLLOM_PROTOCOL`, `MOLLOM_TESTING`, `MOLLOM_LOAD_BALANCING` and
    /// `MOLLOM_BOOTSTRAP_SERVERS` (comma separated).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder
                .add_source(::config::File::from(path).format(::config::FileFormat::Toml));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("MOLLOM")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("bootstrap_servers"),
        );

        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| MollomError::Config(format!("Failed to load configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.public_key.trim().is_empty() {
            return Err(MollomError::Config("Public key must not be empty".to_string()));
        }
        if self.private_key.trim().is_empty() {
            return Err(MollomError::Config("Private key must not be empty".to_string()));
        }
        if self.bootstrap_servers.is_empty() {
            return Err(MollomError::Config("No bootstrap servers configured".to_string()));
        }

        for server in &self.bootstrap_servers {
            reqwest::Url::parse(server).map_err(|e| {
                MollomError::Config(format!("Invalid bootstrap server URL '{}': {}", server, e))
            })?;
        }

        if self.fixed_server_attempts == 0 {
            return Err(MollomError::Config(
                "fixed_server_attempts must be at least 1".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 || self.read_timeout_ms == 0 {
            return Err(MollomError::Config("Timeouts must be greater than zero".to_string()));
        }

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
