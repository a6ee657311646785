use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use cadenza_search::HybridWeights;

use crate::gemini::{DEFAULT_EMBED_DIMENSION, DEFAULT_EMBED_MODEL};
use crate::invoke::{
    BackoffPolicy, DEFAULT_FALLBACK_MODELS, DEFAULT_PRIMARY_MODEL, DEFAULT_RETRY_SWEEPS,
};

/// Configuration for cadenza.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (CADENZA_* prefix)
/// 3. Config file (~/.config/cadenza/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Google AI API key used for both generation and embeddings.
    ///
    /// Can be set via:
    /// - ENV: CADENZA_GOOGLE_API_KEY (or GOOGLE_API_KEY)
    /// - Config: google_api_key = "..."
    pub google_api_key: Option<String>,

    /// Path to the index sidecar (songs plus embeddings).
    ///
    /// Can be set via:
    /// - CLI: --index /path/to/songs_metadata.json
    /// - ENV: CADENZA_INDEX_PATH
    /// - Default: ~/.local/share/cadenza/songs_metadata.json
    pub index_path: PathBuf,

    /// Embedding model used for queries; must match the index.
    pub embed_model: String,
    pub embed_dimension: usize,

    /// Generation model tried first.
    pub primary_model: String,
    /// Generation models tried, in order, when the primary fails.
    pub fallback_models: Vec<String>,

    /// Retries of one model on transient failures.
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub backoff_factor: f32,
    /// Extra passes over overloaded models once every model was tried.
    pub retry_sweeps: usize,

    /// Sampling temperature for the selection call.
    pub temperature: f32,

    pub semantic_weight: f32,
    pub keyword_weight: f32,
    /// Number of candidates shown to the model.
    pub top_k: usize,

    /// Ask the model to rephrase the query before searching.
    pub enhance_query: bool,
    /// Query embeddings kept in memory.
    pub cache_capacity: usize,
    /// Queries processed at once in batch mode.
    pub batch_concurrency: usize,

    pub logging: twyg::Opts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            google_api_key: None,
            index_path: default_index_path(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            embed_dimension: DEFAULT_EMBED_DIMENSION,
            primary_model: DEFAULT_PRIMARY_MODEL.to_string(),
            fallback_models: DEFAULT_FALLBACK_MODELS
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
            max_retries: 3,
            base_delay_ms: 1000,
            backoff_factor: 2.0,
            retry_sweeps: DEFAULT_RETRY_SWEEPS,
            temperature: 0.7,
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            top_k: 5,
            enhance_query: false,
            cache_capacity: cadenza_search::cache::DEFAULT_CAPACITY,
            batch_concurrency: 4,
            logging: twyg::Opts::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/cadenza/config.toml
    /// Reads environment variables with CADENZA_ prefix. A bare
    /// `GOOGLE_API_KEY` is honoured when no key is configured otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new()
            .context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path.to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder.add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("cadenza");
        builder.add_env(env_opts)
            .context("Failed to load environment variables")?;

        let mut config: Self = builder.build()
            .context("Failed to build configuration")?;

        if config.google_api_key.is_none() {
            config.google_api_key = std::env::var("GOOGLE_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty());
        }

        Ok(config)
    }

    /// Load configuration with a custom index path.
    ///
    /// This is used when the --index CLI flag is provided.
    pub fn load_with_index_path(index_path: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.index_path = index_path;
        Ok(config)
    }

    /// Backoff policy for model retries and sweeps.
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.max_retries,
            Duration::from_millis(self.base_delay_ms),
            self.backoff_factor,
        )
    }

    pub fn weights(&self) -> HybridWeights {
        HybridWeights::new(self.semantic_weight, self.keyword_weight)
    }

    /// The API key, or an error explaining how to set one.
    pub fn require_api_key(&self) -> Result<&str> {
        self.google_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No Google API key configured. Set CADENZA_GOOGLE_API_KEY or add \
                     google_api_key to {}",
                    config_file_path().display()
                )
            })
    }
}

/// Get the default index path.
///
/// Returns: ~/.local/share/cadenza/songs_metadata.json (or platform equivalent)
fn default_index_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cadenza")
        .join("songs_metadata.json")
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/cadenza/config.toml
/// - macOS: ~/Library/Application Support/cadenza/config.toml
/// - Windows: %APPDATA%\cadenza\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cadenza")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Cadenza Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (CADENZA_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Google AI API key, used for query embeddings and song selection
#
# Create one at: https://aistudio.google.com/app/apikey
#
# Can also be set via:
# - Environment: CADENZA_GOOGLE_API_KEY=your-key-here
# - Environment: GOOGLE_API_KEY=your-key-here
google_api_key = "your-google-api-key-here"

# Path to the index sidecar holding songs and their embeddings
#
# Can also be set via:
# - CLI: cadenza --index /custom/songs_metadata.json search "..."
# - Environment: CADENZA_INDEX_PATH=/custom/songs_metadata.json
#
# Default: Platform-specific data directory
#index_path = "/path/to/songs_metadata.json"

# Embedding model; must be the model the index was built with
embed_model = "text-embedding-004"
embed_dimension = 768

# Generation models, tried in order when one fails
primary_model = "gemini-2.5-flash"
fallback_models = ["gemini-2.0-flash", "gemini-2.0-flash-lite", "gemini-1.5-flash"]

# Retries on overloaded models: waits base_delay_ms, then grows by backoff_factor
max_retries = 3
base_delay_ms = 1000
backoff_factor = 2.0
retry_sweeps = 2

temperature = 0.7

# Hybrid ranking weights (need not sum to 1)
semantic_weight = 0.7
keyword_weight = 0.3
top_k = 5

# Ask the model to rephrase queries before searching
enhance_query = false

cache_capacity = 1000
batch_concurrency = 4
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config())
        .context("Failed to write config file")?;

    Ok(true)
}
