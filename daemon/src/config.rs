use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZabbixConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// API token passed as a Bearer header on every call.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost/zabbix/api_jsonrpc.php".to_string()
}
fn default_request_timeout() -> u64 {
    30
}

impl Default for ZabbixConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_fuzzy_limit")]
    pub fuzzy_limit: usize,
    /// Worker cap for the per-name wildcard lookups.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_lookups: usize,
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_secs: u64,
    /// Overall deadline for one resolution batch; names still pending
    /// when it expires are reported as missing.
    #[serde(default = "default_batch_deadline")]
    pub batch_deadline_secs: u64,
}

fn default_fuzzy_limit() -> usize {
    common::FUZZY_LOOKUP_LIMIT
}
fn default_max_concurrent() -> usize {
    5
}
fn default_lookup_timeout() -> u64 {
    10
}
fn default_batch_deadline() -> u64 {
    30
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_limit: default_fuzzy_limit(),
            max_concurrent_lookups: default_max_concurrent(),
            lookup_timeout_secs: default_lookup_timeout(),
            batch_deadline_secs: default_batch_deadline(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(common::DEFAULT_SOCKET_PATH)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file alongside stdout. An unwritable path degrades to
    /// stdout-only at startup.
    #[serde(default = "default_log_output")]
    pub output: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_output() -> Option<PathBuf> {
    Some(PathBuf::from(common::DEFAULT_LOG_FILE))
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            output: default_log_output(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub zabbix: ZabbixConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &PathBuf) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file(path: &PathBuf) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Detect file type by extension and load
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "toml" => Self::from_toml_file(path),
            _ => Err(anyhow::anyhow!(
                "Unsupported config file format. Use .yaml, .yml, or .toml"
            )),
        }
    }
}
