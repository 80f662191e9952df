//! Crawler configuration.
//!
//! The configuration system layers bundled defaults (`include_str!` from
//! `defaults.toml`) under an optional user file (`./magpie.toml` or
//! `~/.config/magpie/magpie.toml`), with user values taking precedence. The
//! merged product is the immutable [`CrawlerConfig`] record threaded through
//! every component; nothing re-reads configuration after startup.

use chrono::{DateTime, Utc};
use config::{Config, File, FileFormat};
use magpie_error::{ConfigError, MagpieResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../defaults.toml");

/// The immutable configuration record for one crawler process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Transport and retry options
    pub network: NetworkConfig,
    /// Search paging and filtering options
    pub search: SearchConfig,
    /// Download, quality, and disk options
    pub download: DownloadConfig,
    /// Dataset layout options
    pub storage: StorageConfig,
    /// Orchestrator options
    pub pipeline: PipelineConfig,
}

impl CrawlerConfig {
    /// Load configuration from the default locations.
    ///
    /// Bundled defaults are always present; `./magpie.toml` and
    /// `~/.config/magpie/magpie.toml` override them when they exist.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when a file fails to parse or the merged
    /// record fails validation.
    pub fn load() -> MagpieResult<Self> {
        Self::load_from(None)
    }

    /// Load configuration, optionally from an explicit file.
    ///
    /// When `path` is given it replaces the default user-file locations;
    /// bundled defaults still fill unset options.
    pub fn load_from(path: Option<&Path>) -> MagpieResult<Self> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        match path {
            Some(p) => {
                builder = builder.add_source(File::from(p));
            }
            None => {
                builder = builder.add_source(File::with_name("magpie").required(false));
                if let Some(dir) = dirs::config_dir() {
                    builder = builder
                        .add_source(File::from(dir.join("magpie").join("magpie.toml")).required(false));
                }
            }
        }

        let merged = builder
            .build()
            .map_err(|e| ConfigError::new(format!("failed to load configuration: {}", e)))?;
        let config: CrawlerConfig = merged
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints the type system cannot express.
    pub fn validate(&self) -> MagpieResult<()> {
        if self.network.request_interval <= 0.0 {
            return Err(ConfigError::new("network.request_interval must be positive").into());
        }
        if self.network.retry_base_interval <= 0.0 {
            return Err(ConfigError::new("network.retry_base_interval must be positive").into());
        }
        if self.network.user_agents.is_empty() {
            return Err(ConfigError::new("network.user_agents must not be empty").into());
        }
        if self.search.page_size == 0 {
            return Err(ConfigError::new("search.page_size must be at least 1").into());
        }
        if self.search.page_interval[0] > self.search.page_interval[1] {
            return Err(ConfigError::new("search.page_interval must be [lo, hi] with lo <= hi").into());
        }
        if self.download.concurrent_limit == 0 {
            return Err(ConfigError::new("download.concurrent_limit must be at least 1").into());
        }
        if self.download.chunk_size == 0 {
            return Err(ConfigError::new("download.chunk_size must be positive").into());
        }
        if self.pipeline.metadata_workers == 0 {
            return Err(ConfigError::new("pipeline.metadata_workers must be at least 1").into());
        }
        Ok(())
    }
}

/// Transport and retry options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Minimum seconds between any two outbound requests
    pub request_interval: f64,
    /// Upper bound of the uniform jitter added after each grant, in seconds
    pub random_offset: f64,
    /// Retry attempts after the initial call
    pub max_retries: u32,
    /// Base of the exponential backoff, in seconds
    pub retry_base_interval: f64,
    /// Per-request timeout in seconds
    pub timeout: f64,
    /// User-agent strings to rotate through
    pub user_agents: Vec<String>,
    /// Rotate the user agent after this many seconds
    #[serde(default)]
    pub ua_rotate_interval: Option<u64>,
    /// Rotate the user agent after this many requests
    #[serde(default)]
    pub ua_rotate_requests: Option<u64>,
    /// URLs probed by the network pre-check before any login attempt
    #[serde(default)]
    pub probe_urls: Vec<String>,
}

/// Search paging and filtering options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Items requested per page
    pub page_size: u32,
    /// Hard page cap per keyword
    pub max_pages: u32,
    /// Uniform sleep range between pages, in seconds
    pub page_interval: [f64; 2],
    /// Minimum play count for a candidate
    pub min_view_count: u64,
    /// Earliest accepted publish time
    #[serde(default)]
    pub min_pubdate: Option<DateTime<Utc>>,
    /// Latest accepted publish time
    #[serde(default)]
    pub max_pubdate: Option<DateTime<Utc>>,
    /// Case-insensitive substrings the title must contain (any match)
    #[serde(default)]
    pub keyword_filters: Vec<String>,
    /// Case-insensitive substrings that reject the title (any match)
    #[serde(default)]
    pub keyword_excludes: Vec<String>,
    /// Minimum duration in seconds, closed interval
    pub min_duration: u64,
    /// Maximum duration in seconds, closed interval; 0 means open-ended
    pub max_duration: u64,
    /// Minimum quality score; 0 disables the score filter
    pub quality_threshold: f64,
    /// Weights of the quality score terms
    pub quality_weights: QualityWeights,
}

impl SearchConfig {
    /// The duration ceiling, or `None` when open-ended.
    pub fn max_duration_bound(&self) -> Option<u64> {
        (self.max_duration > 0).then_some(self.max_duration)
    }
}

/// Weights of the optional quality score,
/// `(w_like*like + w_coin*coin + w_fav*favorite) / play_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    /// Weight of the like counter
    pub like: f64,
    /// Weight of the coin counter
    pub coin: f64,
    /// Weight of the favorite counter
    pub favorite: f64,
}

/// Download, quality, and disk options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Highest quality code the downloader will request
    pub default_quality: u32,
    /// Process-wide cap on in-flight downloads
    pub concurrent_limit: usize,
    /// Download retry attempts after the initial transfer
    pub retry_times: u32,
    /// Write buffer size in bytes, also the unit of the disk-space guard
    pub chunk_size: u64,
    /// Cumulative dataset size cap in gibibytes; 0 disables the cap
    pub max_size_gb: f64,
    /// Skip downloads longer than this many seconds; 0 or negative disables
    pub max_duration_on_download: i64,
    /// Muxer executable
    pub ffmpeg_path: String,
    /// Media probe executable used by maintenance
    pub ffprobe_path: String,
}

impl DownloadConfig {
    /// The pre-download duration ceiling, or `None` when the filter is off.
    pub fn duration_ceiling(&self) -> Option<u64> {
        (self.max_duration_on_download > 0).then_some(self.max_duration_on_download as u64)
    }
}

/// Dataset layout options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one metadata file per item
    pub metadata_dir: PathBuf,
    /// Directory holding one muxed media file per item
    pub media_dir: PathBuf,
    /// Path of the index document
    pub index_file: PathBuf,
    /// Path of the credential document
    pub credential_file: PathBuf,
    /// Whether metadata commits update the index inline
    pub update_index_on_save: bool,
    /// Optional projections retained in index entries
    #[serde(default)]
    pub index_fields: Vec<String>,
}

/// Orchestrator options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Workers consuming candidates into metadata commits
    pub metadata_workers: usize,
    /// Skip items that already have a complete pair on disk
    pub resume: bool,
    /// Global cap applied as post-search truncation; 0 means uncapped
    pub max_items: u64,
}
