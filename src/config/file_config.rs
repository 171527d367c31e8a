//! Configuration file support for pdf-harvest.
//!
//! # Configuration File Format
//!
//! ```toml
//! [api_keys]
//! serpapi = "your-serpapi-key"
//! google_cse_key = "your-google-key"
//! google_cse_cx = "your-engine-id"
//!
//! [search]
//! max_results = 8
//! backend_timeout_secs = 20
//! backends = ["duckduckgo", "arxiv", "gutenberg"]
//!
//! [downloads]
//! work_dir = "./downloads"
//! timeout_secs = 15
//! max_filename_len = 50
//! collision = "overwrite"   # overwrite | rename | skip
//!
//! [rate_limits]
//! requests_per_second = 5.0
//!
//! [proxy]
//! http = "http://proxy:8080"
//! https = "http://proxy:8080"
//!
//! [logging]
//! level = "warn"
//! format = "text"           # text | json
//!
//! [[backends]]
//! name = "gutenberg"
//! enabled = false
//!
//! [[backends]]
//! name = "arxiv"
//! timeout_secs = 30
//! ```

use std::path::{Path, PathBuf};

use super::Config;

/// Commented starting point written by `config init`
pub const CONFIG_TEMPLATE: &str = r#"# pdf-harvest configuration
#
# Environment variables override this file: PDF_HARVEST_<SECTION>__<KEY>,
# e.g. PDF_HARVEST_SEARCH__MAX_RESULTS=4

[api_keys]
# Paid backends are skipped unless their keys are set here or in the
# SERPAPI_API_KEY / GOOGLE_CSE_API_KEY / GOOGLE_CSE_CX environment variables.
# serpapi = ""
# google_cse_key = ""
# google_cse_cx = ""

[search]
max_results = 8
backend_timeout_secs = 20
# Empty means every available backend, in their default order
backends = []

[downloads]
work_dir = "./downloads"
timeout_secs = 15
max_filename_len = 50
# overwrite | rename | skip
collision = "overwrite"

[rate_limits]
requests_per_second = 5.0

[proxy]
# http = "http://proxy:8080"
# https = "http://proxy:8080"

[logging]
level = "warn"
# text | json
format = "text"

# [[backends]]
# name = "gutenberg"
# enabled = false
"#;

/// A TOML config file on disk
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load configuration from the TOML file alone, without env overrides
    pub fn load(&self) -> Result<Config, ConfigFileError> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| ConfigFileError::Io(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigFileError::Parse(e.to_string()))
    }

    /// Save configuration to the TOML file, creating parent directories
    pub fn save(&self, config: &Config) -> Result<(), ConfigFileError> {
        let content =
            toml::to_string_pretty(config).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;
        self.write(&content)
    }

    /// Write the commented template
    pub fn write_template(&self) -> Result<(), ConfigFileError> {
        self.write(CONFIG_TEMPLATE)
    }

    fn write(&self, content: &str) -> Result<(), ConfigFileError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
        }
        std::fs::write(&self.path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}
