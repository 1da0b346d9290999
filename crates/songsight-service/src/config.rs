use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::Deserialize;
use std::path::PathBuf;

use songsight_core::{FeatureSet, FeatureSpec, SimilarityConfig};

/// Configuration for songsight.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (SONGSIGHT_* prefix)
/// 3. Config file (~/.config/songsight/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the track catalog (`.json` export or SQLite database).
    ///
    /// Can be set via:
    /// - CLI: --catalog /path/to/catalog.db
    /// - ENV: SONGSIGHT_CATALOG_PATH
    /// - Config: catalog_path = "/path/to/catalog.db"
    /// - Default: ~/.local/share/songsight/catalog.db
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,

    /// Optional TOML file of `[[feature]]` tables overriding the built-in
    /// feature set.
    #[serde(default)]
    pub features_path: Option<PathBuf>,

    /// Inline feature set; takes precedence over `features_path`.
    #[serde(default)]
    pub features: Option<Vec<FeatureSpec>>,

    #[serde(default)]
    pub similarity: SimilarityConfig,

    #[serde(default)]
    pub defaults: QueryDefaults,

    /// Fixed seed for random selections; unset means fresh entropy per call.
    #[serde(default)]
    pub random_seed: Option<u64>,

    /// Spotify client-credentials pair, used to resolve tracks that are not
    /// in the catalog.
    ///
    /// Can be set via:
    /// - ENV: SONGSIGHT_SPOTIFY_CLIENT_ID / SONGSIGHT_SPOTIFY_CLIENT_SECRET
    /// - Config: spotify_client_id = "...", spotify_client_secret = "..."
    #[serde(default)]
    pub spotify_client_id: Option<String>,

    #[serde(default)]
    pub spotify_client_secret: Option<String>,

    #[serde(default)]
    pub logging: twyg::Opts,
}

/// Fallback sizes for queries that do not specify them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryDefaults {
    /// Neighbours returned by a similarity query.
    pub like_k: usize,
    /// Tracks returned by a random query.
    pub random_count: usize,
    /// Size of the top/bottom pool a random query draws from.
    pub random_pool: usize,
    /// Cap on range query results.
    pub range_limit: usize,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            like_k: 10,
            random_count: 10,
            random_pool: 100,
            range_limit: 200,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            features_path: None,
            features: None,
            similarity: SimilarityConfig::default(),
            defaults: QueryDefaults::default(),
            random_seed: None,
            spotify_client_id: None,
            spotify_client_secret: None,
            logging: twyg::Opts::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/songsight/config.toml
    /// Reads environment variables with SONGSIGHT_ prefix.
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

        let env_opts = env::Options::with_top_level("songsight");
        builder.add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build()
            .context("Failed to build configuration")?;

        Ok(config)
    }

    /// Load configuration with a custom catalog path.
    ///
    /// This is used when the --catalog CLI flag is provided.
    pub fn load_with_catalog_path(catalog_path: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.catalog_path = catalog_path;
        Ok(config)
    }

    /// The effective feature set: inline list, then features file, then
    /// the built-in dataset features.
    pub fn feature_set(&self) -> Result<FeatureSet> {
        if let Some(specs) = &self.features {
            return FeatureSet::new(specs.clone()).context("Invalid inline feature set");
        }
        if let Some(path) = &self.features_path {
            return FeatureSet::load(path)
                .with_context(|| format!("Failed to load feature set from {}", path.display()));
        }
        Ok(FeatureSet::default())
    }

    /// Whether Spotify credentials are configured.
    pub fn has_spotify_credentials(&self) -> bool {
        self.spotify_client_id.is_some() && self.spotify_client_secret.is_some()
    }
}

/// Get the default catalog path.
///
/// Returns: ~/.local/share/songsight/catalog.db (or platform equivalent)
fn default_catalog_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("songsight")
        .join("catalog.db")
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/songsight/config.toml
/// - macOS: ~/Library/Application Support/songsight/config.toml
/// - Windows: %APPDATA%\songsight\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("songsight")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Songsight Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (SONGSIGHT_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Track catalog: a JSON array of track records, or a SQLite database with a
# `track` table holding one column per feature.
#
# Can also be set via:
# - CLI: songsight --catalog /custom/catalog.db range tempo --min 120
# - Environment: SONGSIGHT_CATALOG_PATH=/custom/catalog.db
#
# Default: Platform-specific data directory
#catalog_path = "/path/to/catalog.db"

# Optional feature set file of [[feature]] tables (name, min, max).
# Default: the audio features of the Spotify dataset.
#features_path = "/path/to/features.toml"

# Fixed seed for `songsight random`; leave unset for fresh randomness.
#random_seed = 42

# Spotify client credentials, used to look up tracks outside the catalog.
# Register an application at: https://developer.spotify.com/dashboard
#spotify_client_id = "your-client-id"
#spotify_client_secret = "your-client-secret"

[similarity]
# euclidean or manhattan
metric = "euclidean"
# Scale every feature by its range so tempo does not drown out energy.
normalize = true
# Keep the seed track in its own results.
include_seed = false

[similarity.weights]
# Features not listed weigh 1.0.
#popularity = 0.0

[defaults]
like_k = 10
random_count = 10
random_pool = 100
range_limit = 200
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
