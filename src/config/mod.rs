//! Configuration management.
//!
//! Settings come from, in increasing priority: built-in defaults, a TOML file
//! and `PDF_HARVEST_*` environment variables (`__` separates nested keys, e.g.
//! `PDF_HARVEST_SEARCH__MAX_RESULTS=4`).

mod file_config;

pub use file_config::{ConfigFile, ConfigFileError, CONFIG_TEMPLATE};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{
    BackendSpec, Credentials, DEFAULT_MAX_RESULTS, GOOGLE_CSE_API_KEY, GOOGLE_CSE_CX, SERPAPI_API_KEY,
};
use crate::pipeline::{CollisionPolicy, DownloadOptions};
use crate::sources::SourceRegistry;
use crate::utils::{HttpSettings, DEFAULT_MAX_FILENAME_LEN};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "PDF_HARVEST";

/// Config file name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "pdf-harvest.toml";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// API keys for paid backends
    #[serde(default)]
    pub api_keys: ApiKeys,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub downloads: DownloadConfig,

    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-backend overrides
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backends: Vec<BackendOverride>,
}

/// API keys for external services
///
/// Unset keys fall back to the environment variable of the same name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serpapi: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_cse_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_cse_cx: Option<String>,
}

/// Search configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Results requested from each backend
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Per-backend timeout
    #[serde(default = "default_backend_timeout")]
    pub backend_timeout_secs: u64,

    /// Backends to query, in order; empty means every compiled-in backend
    #[serde(default)]
    pub backends: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            backend_timeout_secs: default_backend_timeout(),
            backends: Vec::new(),
        }
    }
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

fn default_backend_timeout() -> u64 {
    20
}

/// Download configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Where batches put their files and archive
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Bound on the request phase and each body chunk
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_filename_len")]
    pub max_filename_len: usize,

    #[serde(default)]
    pub collision: CollisionPolicy,

    /// Fixed archive name; timestamped when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_name: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            timeout_secs: default_download_timeout(),
            max_filename_len: default_max_filename_len(),
            collision: CollisionPolicy::default(),
            archive_name: None,
        }
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_download_timeout() -> u64 {
    15
}

fn default_max_filename_len() -> usize {
    DEFAULT_MAX_FILENAME_LEN
}

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests per second across all outbound requests; 0 disables throttling
    #[serde(default = "default_rps")]
    pub requests_per_second: f32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rps(),
        }
    }
}

fn default_rps() -> f32 {
    5.0
}

/// Proxy configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https: Option<String>,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Override for a single backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendOverride {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Credentials for the paid backends, from the file or the environment
    pub fn credentials(&self) -> Credentials {
        let mut credentials = Credentials::new();
        let keys = [
            (SERPAPI_API_KEY, &self.api_keys.serpapi),
            (GOOGLE_CSE_API_KEY, &self.api_keys.google_cse_key),
            (GOOGLE_CSE_CX, &self.api_keys.google_cse_cx),
        ];

        for (name, configured) in keys {
            let value = configured.clone().or_else(|| std::env::var(name).ok());
            if let Some(value) = value {
                credentials.insert(name, value);
            }
        }
        credentials
    }

    /// Settings for the shared HTTP client
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            requests_per_second: Some(self.rate_limits.requests_per_second)
                .filter(|rps| *rps > 0.0),
            http_proxy: self.proxy.http.clone(),
            https_proxy: self.proxy.https.clone(),
            ..Default::default()
        }
    }

    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            timeout: Duration::from_secs(self.downloads.timeout_secs.max(1)),
            max_filename_len: self.downloads.max_filename_len.max(1),
            collision: self.downloads.collision,
        }
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.search.backend_timeout_secs.max(1))
    }

    /// Apply a single timeout to both searches and downloads
    pub fn override_timeout(&mut self, secs: u64) {
        self.search.backend_timeout_secs = secs;
        self.downloads.timeout_secs = secs;
        for backend in &mut self.backends {
            backend.timeout_secs = None;
        }
    }

    /// Backend specs for a search, with overrides applied
    ///
    /// Order is `search.backends` when set, else registry order. Names that
    /// are not registered are kept so the search can report them.
    pub fn backend_specs(&self, registry: &SourceRegistry) -> Vec<BackendSpec> {
        let names: Vec<String> = if self.search.backends.is_empty() {
            registry.ids().map(str::to_string).collect()
        } else {
            self.search.backends.clone()
        };

        names
            .iter()
            .map(|name| {
                let base = registry
                    .get(name)
                    .map(|source| source.backend_spec())
                    .unwrap_or_else(|| BackendSpec::new(name.as_str()))
                    .timeout(self.backend_timeout());

                match self.backends.iter().find(|o| &o.name == name) {
                    Some(o) => {
                        let spec = base.enabled(o.enabled.unwrap_or(true));
                        match o.timeout_secs {
                            Some(secs) => spec.timeout(Duration::from_secs(secs.max(1))),
                            None => spec,
                        }
                    }
                    None => base,
                }
            })
            .collect()
    }
}

/// Look for a config file in the working directory, then the user config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    default_config_path().filter(|p| p.is_file())
}

/// `<config_dir>/pdf-harvest/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pdf-harvest").join("config.toml"))
}

/// Load configuration from a file (if any) layered with environment variables
///
/// With `path = None` the file is looked up with [`find_config_file`]; a
/// missing file then just means defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();

    match path {
        Some(path) => {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        None => {
            if let Some(found) = find_config_file() {
                tracing::debug!(path = %found.display(), "Using config file");
                builder = builder.add_source(config::File::from(found.as_path()).required(false));
            }
        }
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockSource;
    use std::sync::Arc;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search.max_results, 8);
        assert_eq!(config.backend_timeout(), Duration::from_secs(20));
        assert_eq!(config.download_options().timeout, Duration::from_secs(15));
        assert_eq!(config.downloads.max_filename_len, 50);
        assert_eq!(config.downloads.collision, CollisionPolicy::Overwrite);
        assert_eq!(config.rate_limits.requests_per_second, 5.0);
        assert_eq!(config.downloads.work_dir, PathBuf::from("./downloads"));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pdf-harvest.toml");
        std::fs::write(
            &path,
            r#"
[search]
max_results = 4
backends = ["arxiv", "duckduckgo"]

[downloads]
collision = "rename"
timeout_secs = 30

[logging]
format = "json"

[[backends]]
name = "duckduckgo"
enabled = false
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.search.max_results, 4);
        assert_eq!(config.search.backend_timeout_secs, 20);
        assert_eq!(config.downloads.collision, CollisionPolicy::Rename);
        assert_eq!(config.downloads.timeout_secs, 30);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.backends.len(), 1);
    }

    #[test]
    fn test_load_config_missing_file_is_error() {
        assert!(load_config(Some(Path::new("/nonexistent/pdf-harvest.toml"))).is_err());
    }

    #[test]
    fn test_backend_specs_apply_overrides() {
        let mut registry = SourceRegistry::empty();
        registry.register(Arc::new(MockSource::named("a")));
        registry.register(Arc::new(MockSource::named("b").requiring("KEY")));

        let mut config = Config::default();
        config.backends.push(BackendOverride {
            name: "a".to_string(),
            enabled: Some(false),
            timeout_secs: Some(3),
        });

        let specs = config.backend_specs(&registry);
        assert_eq!(specs.len(), 2);
        assert!(!specs[0].enabled);
        assert_eq!(specs[0].timeout, Duration::from_secs(3));
        assert!(specs[1].enabled);
        assert_eq!(specs[1].timeout, Duration::from_secs(20));
        assert!(specs[1].required_credentials.contains("KEY"));

        config.search.backends = vec!["b".to_string(), "ghost".to_string()];
        let specs = config.backend_specs(&registry);
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b", "ghost"]);
    }

    #[test]
    fn test_timeout_override() {
        let mut config = Config::default();
        config.override_timeout(7);
        assert_eq!(config.backend_timeout(), Duration::from_secs(7));
        assert_eq!(config.download_options().timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_configured_keys_become_credentials() {
        let mut config = Config::default();
        config.api_keys.google_cse_cx = Some("engine-id".to_string());
        assert_eq!(config.credentials().get(GOOGLE_CSE_CX), Some("engine-id"));
    }

    #[test]
    fn test_zero_rps_disables_throttling() {
        let mut config = Config::default();
        config.rate_limits.requests_per_second = 0.0;
        assert!(config.http_settings().requests_per_second.is_none());
    }
}
