//! Settings structures for the server configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Convert a timeout given in seconds
///
/// Negative and non-finite values are rejected; values above
/// [`crate::MAX_TIMEOUT`] are clamped to it.
pub fn timeout_from_secs(secs: f64) -> std::result::Result<Duration, String> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("{} is not a usable number of seconds", secs));
    }
    let max = Duration::from_secs(crate::MAX_TIMEOUT);
    Ok(Duration::try_from_secs_f64(secs).map_or(max, |timeout| timeout.min(max)))
}

/// Main settings structure, loaded from settings.yml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub selection: SelectionSettings,
    pub outgoing: OutgoingSettings,
    pub engines: EnginesSettings,
    pub cache: CacheSettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        Ok(settings)
    }

    /// Check values that are only interpreted at startup
    ///
    /// Provider settings are checked when each provider is constructed, so a
    /// bad provider value only disables that provider.
    pub fn validate(&self) -> Result<()> {
        self.server.call_timeout()?;
        self.outgoing.request_timeout()?;
        Ok(())
    }

    /// Merge with process environment variables
    pub fn merge_env(&mut self) {
        self.merge_vars(|key| std::env::var(key).ok());
    }

    /// Merge with variables resolved by `lookup`
    ///
    /// Provider keys use the names the providers document (`SERPER_API_KEY`,
    /// `SERPAPI_API_KEY`); everything else uses the `METASEARCH_` prefix.
    pub fn merge_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("SERPER_API_KEY") {
            self.engines.serper.api_key = Some(key);
        }
        if let Some(key) = var("SERPAPI_API_KEY") {
            self.engines.serpapi.api_key = Some(key);
        }
        if let Some(engine) = var("METASEARCH_ENGINE") {
            self.selection.preferred = Some(engine);
        }
        if let Some(val) = var("METASEARCH_TRANSPORT") {
            if let Ok(transport) = val.parse() {
                self.server.transport = transport;
            }
        }
        if let Some(val) = var("METASEARCH_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("METASEARCH_BIND_ADDRESS") {
            self.server.bind_address = val;
        }
    }
}

/// Transport the tool server listens on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// JSON-RPC over stdin/stdout
    #[default]
    Stdio,
    /// JSON-RPC over HTTP POST
    Http,
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "http" => Ok(Transport::Http),
            other => Err(format!("unknown transport `{}` (expected stdio or http)", other)),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Stdio => f.write_str("stdio"),
            Transport::Http => f.write_str("http"),
        }
    }
}

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Name reported to clients during initialization
    pub name: String,
    /// Version reported to clients during initialization
    pub version: String,
    /// Transport to serve on
    pub transport: Transport,
    /// Bind address (http transport)
    pub bind_address: String,
    /// Server port (http transport)
    pub port: u16,
    /// Deadline for a single tool call in seconds
    pub call_timeout: f64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: "multi-search-server".to_string(),
            version: crate::VERSION.to_string(),
            transport: Transport::default(),
            bind_address: "127.0.0.1".to_string(),
            port: 8808,
            call_timeout: crate::DEFAULT_CALL_TIMEOUT as f64,
        }
    }
}

impl ServerSettings {
    /// Per-call deadline; `0` disables it
    pub fn call_timeout(&self) -> Result<Option<Duration>> {
        let timeout = timeout_from_secs(self.call_timeout).map_err(|reason| Error::Config {
            key: "server.call_timeout",
            reason,
        })?;
        Ok((!timeout.is_zero()).then_some(timeout))
    }
}

/// Engine selection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionSettings {
    /// Engine to use when it is available
    pub preferred: Option<String>,
    /// Tie-break order when several engines are available
    pub priority: Vec<String>,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            preferred: None,
            priority: vec!["serper".to_string(), "serpapi".to_string()],
        }
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Default request timeout in seconds
    pub request_timeout: f64,
    /// Pool max size
    pub pool_maxsize: usize,
    /// Verify SSL certificates
    pub verify_ssl: bool,
    /// Proxy settings
    pub proxies: ProxySettings,
    /// Upper bound on outbound requests per second, shared by all engines
    pub rate_limit_per_second: Option<u32>,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: crate::DEFAULT_TIMEOUT as f64,
            pool_maxsize: 20,
            verify_ssl: true,
            proxies: ProxySettings::default(),
            rate_limit_per_second: None,
        }
    }
}

impl OutgoingSettings {
    /// Default per-request timeout
    pub fn request_timeout(&self) -> Result<Duration> {
        match timeout_from_secs(self.request_timeout) {
            Ok(timeout) if !timeout.is_zero() => Ok(timeout),
            Ok(_) => Err(Error::Config {
                key: "outgoing.request_timeout",
                reason: "must be greater than zero".to_string(),
            }),
            Err(reason) => Err(Error::Config {
                key: "outgoing.request_timeout",
                reason,
            }),
        }
    }
}

/// Proxy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub http: Option<String>,
    pub https: Option<String>,
    pub all: Option<String>,
}

/// Per-provider settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnginesSettings {
    pub serper: ProviderSettings,
    pub serpapi: ProviderSettings,
}

/// Settings for a single provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// API key; the provider is not registered without one
    pub api_key: Option<String>,
    /// Override of the provider's API base URL
    pub base_url: Option<String>,
    /// Override of the provider's scrape endpoint, where it has one
    pub scrape_url: Option<String>,
    /// Skip this provider entirely
    pub disabled: bool,
    /// Per-request timeout in seconds, overriding `outgoing.request_timeout`
    pub timeout: Option<f64>,
    /// Upstream parameters sent with every request unless the call overrides them
    pub defaults: BTreeMap<String, String>,
}

impl ProviderSettings {
    /// Per-request timeout override, if one is set
    pub fn request_timeout(&self) -> std::result::Result<Option<Duration>, String> {
        match self.timeout {
            Some(secs) => match timeout_from_secs(secs)? {
                timeout if timeout.is_zero() => Err("timeout must be greater than zero".to_string()),
                timeout => Ok(Some(timeout)),
            },
            None => Ok(None),
        }
    }
}

/// Tool response cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Time to live in seconds
    pub ttl: u64,
    pub max_capacity: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: 300,
            max_capacity: 1000,
        }
    }
}
