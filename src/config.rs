//! Configuration Module
//!
//! Handles loading and managing cache, probe and host configuration from
//! environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Lower bound for a single reachability check.
pub const MIN_PROBE_TIMEOUT_MS: u64 = 3_000;
/// Upper bound for a single reachability check.
pub const MAX_PROBE_TIMEOUT_MS: u64 = 5_000;

// == Storage Backend ==
/// Storage backend selected once at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageConfig {
    /// Bounded in-process map persisted to a local file
    Local {
        /// Entry count ceiling
        max_capacity: usize,
        /// Persistence file
        path: PathBuf,
    },
    /// Shared REST key-value table, unbounded from our side
    Shared {
        /// REST base URL, e.g. `http://nas.local:54321/rest/v1`
        base_url: String,
        /// Table holding the cache rows
        table: String,
        /// Optional API key
        api_key: Option<String>,
        /// Bound on each operation, taken from the probe timeout
        timeout: Duration,
    },
}

// == Service Endpoint ==
/// One external dependency to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Service name used as the key in probe results
    pub name: String,
    /// URL answered with a 2xx status when the service is up
    pub url: String,
}

impl ServiceEndpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Services probed when `PROBE_SERVICES` is not set.
pub fn default_services() -> Vec<ServiceEndpoint> {
    vec![
        ServiceEndpoint::new("nas_search", "http://localhost:8000/health"),
        ServiceEndpoint::new("local_inference", "http://localhost:11434/api/tags"),
        ServiceEndpoint::new("vector_index", "http://localhost:6333/healthz"),
        ServiceEndpoint::new("internet", "https://1.1.1.1"),
    ]
}

/// Parses `name=url,name=url` into endpoints, skipping malformed items.
pub fn parse_services(raw: &str) -> Vec<ServiceEndpoint> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| match item.split_once('=') {
            Some((name, url)) if !name.trim().is_empty() && !url.trim().is_empty() => {
                Some(ServiceEndpoint::new(name.trim(), url.trim()))
            }
            _ => {
                warn!(item, "Ignoring malformed PROBE_SERVICES entry");
                None
            }
        })
        .collect()
}

/// Process configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache storage backend
    pub storage: StorageConfig,
    /// Services checked by the connectivity prober
    pub probe_services: Vec<ServiceEndpoint>,
    /// Per-check timeout
    pub probe_timeout: Duration,
    /// Probe loop interval in seconds
    pub probe_interval: u64,
    /// Optional HTTP telemetry collector
    pub telemetry_url: Option<String>,
    /// HTTP port of the host binary
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `local` or `shared` (default: local)
    /// - `CACHE_MAX_CAPACITY` - Local entry ceiling (default: 1000)
    /// - `CACHE_FILE` - Local persistence file (default: data/query_cache.json)
    /// - `SHARED_STORE_URL` - REST base URL for the shared backend
    /// - `SHARED_STORE_TABLE` - Table name (default: query_cache)
    /// - `SHARED_STORE_KEY` - API key for the shared backend
    ///   (its requests share the probe timeout below)
    /// - `PROBE_SERVICES` - `name=url` list, comma separated
    /// - `PROBE_TIMEOUT_MS` - Per-check timeout, clamped to 3000..=5000 (default: 4000)
    /// - `PROBE_INTERVAL_SECS` - Probe frequency in seconds (default: 30)
    /// - `TELEMETRY_URL` - Collector URL; events are logged when unset
    /// - `SERVER_PORT` - HTTP server port (default: 8090)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let timeout_ms = env_parse::<u64>("PROBE_TIMEOUT_MS")
            .unwrap_or(4_000)
            .clamp(MIN_PROBE_TIMEOUT_MS, MAX_PROBE_TIMEOUT_MS);
        let probe_timeout = Duration::from_millis(timeout_ms);

        let storage = match env::var("CACHE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "shared" => StorageConfig::Shared {
                base_url: env_string("SHARED_STORE_URL").unwrap_or_default(),
                table: env_string("SHARED_STORE_TABLE")
                    .unwrap_or_else(|| "query_cache".to_string()),
                api_key: env_string("SHARED_STORE_KEY"),
                timeout: probe_timeout,
            },
            other => {
                if other != "local" {
                    warn!(backend = other, "Unknown CACHE_BACKEND, using local");
                }
                StorageConfig::Local {
                    max_capacity: env_parse("CACHE_MAX_CAPACITY").unwrap_or(1000),
                    path: env_string("CACHE_FILE")
                        .map(PathBuf::from)
                        .unwrap_or_else(|| PathBuf::from("data/query_cache.json")),
                }
            }
        };

        let probe_services = match env_string("PROBE_SERVICES") {
            Some(raw) => parse_services(&raw),
            None => defaults.probe_services,
        };

        Self {
            storage,
            probe_services,
            probe_timeout,
            probe_interval: env_parse("PROBE_INTERVAL_SECS").unwrap_or(defaults.probe_interval),
            telemetry_url: env_string("TELEMETRY_URL"),
            server_port: env_parse("SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::Local {
                max_capacity: 1000,
                path: PathBuf::from("data/query_cache.json"),
            },
            probe_services: default_services(),
            probe_timeout: Duration::from_millis(4_000),
            probe_interval: 30,
            telemetry_url: None,
            server_port: 8090,
        }
    }
}
