//! Configuration management for Rotacast

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::accounts::MAX_ACCOUNTS;
use crate::error::{ConfigError, Result};
use crate::history::DedupPolicy;
use crate::media::{CatalogSource, DEFAULT_EXTENSIONS};
use crate::pipeline::annotation_len;
use crate::publishers::mastodon::DEFAULT_CHARACTER_LIMIT;
use crate::retry::{Backoff, RetryPolicy};
use crate::types::AccountId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_history_file")]
    pub history_file: String,
    #[serde(default = "default_media_usage_file")]
    pub media_usage_file: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            history_file: default_history_file(),
            media_usage_file: default_media_usage_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval", with = "human_duration")]
    pub interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DedupKind {
    Permanent,
    #[default]
    Windowed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default)]
    pub policy: DedupKind,
    #[serde(default = "default_dedup_window", with = "human_duration")]
    pub window: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            policy: DedupKind::default(),
            window: default_dedup_window(),
        }
    }
}

impl DedupConfig {
    pub fn to_policy(&self) -> Result<DedupPolicy> {
        match self.policy {
            DedupKind::Permanent => Ok(DedupPolicy::Permanent),
            DedupKind::Windowed => chrono::Duration::from_std(self.window)
                .map(DedupPolicy::Windowed)
                .map_err(|_| ConfigError::Invalid("dedup.window is out of range".to_string()).into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    #[default]
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay", with = "human_duration")]
    pub delay: Duration,
    #[serde(default)]
    pub backoff: BackoffKind,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay: default_retry_delay(),
            backoff: BackoffKind::default(),
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self, attempt_timeout: Duration) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delay: self.delay,
            backoff: match self.backoff {
                BackoffKind::Fixed => Backoff::Fixed,
                BackoffKind::Exponential => Backoff::Exponential,
            },
            attempt_timeout: Some(attempt_timeout),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// JSON feed over HTTP
    Feed {
        url: String,
        #[serde(default = "default_timeout", with = "human_duration")]
        timeout: Duration,
    },
    /// JSON feed from a local file
    File { path: String },
    /// Market snapshot from a CoinGecko-compatible API
    Market {
        #[serde(default = "default_market_url")]
        url: String,
        #[serde(default = "default_vs_currency")]
        vs_currency: String,
        #[serde(default = "default_market_limit")]
        limit: u32,
        #[serde(default = "default_timeout", with = "human_duration")]
        timeout: Duration,
        /// Upper bound on the rendered snapshot; tightened by the publisher limit
        #[serde(default)]
        max_chars: Option<usize>,
    },
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        match self {
            SourceConfig::Feed { timeout, .. } | SourceConfig::Market { timeout, .. } => *timeout,
            SourceConfig::File { .. } => default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaMode {
    /// Attach media to every post when the catalog has any
    #[default]
    Always,
    /// Attach media only to items that carry a media hint. The hinted file
    /// is used when the catalog has it, otherwise the next one in rotation
    Hinted,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default)]
    pub mode: MediaMode,
    /// Directory catalog; takes precedence over `catalog`
    #[serde(default)]
    pub directory: Option<String>,
    /// Static catalog identifiers
    #[serde(default)]
    pub catalog: Vec<String>,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            mode: MediaMode::default(),
            directory: None,
            catalog: Vec::new(),
            extensions: default_extensions(),
        }
    }
}

impl MediaConfig {
    pub fn catalog_source(&self) -> CatalogSource {
        match &self.directory {
            Some(dir) => CatalogSource::Directory {
                path: expand_path(dir),
                extensions: self.extensions.clone(),
            },
            None => CatalogSource::Static(self.catalog.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublisherKind {
    Mastodon,
    /// Dry run: log the payload instead of posting
    #[default]
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub kind: PublisherKind,
    #[serde(default = "default_timeout", with = "human_duration")]
    pub timeout: Duration,
    #[serde(default = "default_true")]
    pub annotate_timestamp: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            kind: PublisherKind::default(),
            timeout: default_timeout(),
            annotate_timestamp: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    /// Instance base URL (Mastodon publisher)
    #[serde(default)]
    pub instance: Option<String>,
    /// File holding the access token (Mastodon publisher)
    #[serde(default)]
    pub token_file: Option<String>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load and validate configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.accounts.is_empty() {
            return Err(ConfigError::MissingField("accounts".to_string()).into());
        }
        if self.accounts.len() > MAX_ACCOUNTS {
            return Err(ConfigError::Invalid(format!(
                "at most {} accounts can rotate within an hour (got {})",
                MAX_ACCOUNTS,
                self.accounts.len()
            ))
            .into());
        }

        let mut seen = HashSet::new();
        for account in &self.accounts {
            if account.name.trim().is_empty() {
                return Err(ConfigError::Invalid("account name cannot be empty".to_string()).into());
            }
            if !seen.insert(account.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate account name '{}'",
                    account.name
                ))
                .into());
            }
            if self.publish.kind == PublisherKind::Mastodon {
                if account.instance.is_none() {
                    return Err(ConfigError::MissingField(format!(
                        "accounts.{}.instance",
                        account.name
                    ))
                    .into());
                }
                if account.token_file.is_none() {
                    return Err(ConfigError::MissingField(format!(
                        "accounts.{}.token_file",
                        account.name
                    ))
                    .into());
                }
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".to_string()).into());
        }

        match &self.source {
            SourceConfig::Feed { url, .. } | SourceConfig::Market { url, .. } if url.trim().is_empty() => {
                return Err(ConfigError::MissingField("source.url".to_string()).into());
            }
            SourceConfig::File { path } if path.trim().is_empty() => {
                return Err(ConfigError::MissingField("source.path".to_string()).into());
            }
            _ => {}
        }

        if self.publish.kind == PublisherKind::Mastodon
            && self.media.mode != MediaMode::Never
            && self.media.directory.is_none()
            && !self.media.catalog.is_empty()
        {
            return Err(ConfigError::Invalid(
                "the mastodon publisher uploads files; set media.directory instead of media.catalog"
                    .to_string(),
            )
            .into());
        }

        if self.schedule.interval.is_zero() {
            return Err(ConfigError::Invalid("schedule.interval must be positive".to_string()).into());
        }

        self.dedup.to_policy()?;
        Ok(())
    }

    /// Account identifiers in rotation order
    pub fn account_ids(&self) -> Vec<AccountId> {
        self.accounts.iter().map(|a| AccountId::new(a.name.clone())).collect()
    }

    /// Characters a source may use for an item body once the publisher
    /// limit and the timestamp annotation are accounted for
    pub fn body_char_limit(&self) -> Option<usize> {
        let publisher_limit = match self.publish.kind {
            PublisherKind::Mastodon => {
                let reserved = if self.publish.annotate_timestamp {
                    annotation_len()
                } else {
                    0
                };
                Some(DEFAULT_CHARACTER_LIMIT.saturating_sub(reserved))
            }
            PublisherKind::Log => None,
        };

        let configured = match &self.source {
            SourceConfig::Market { max_chars, .. } => *max_chars,
            _ => None,
        };

        match (publisher_limit, configured) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn history_path(&self) -> PathBuf {
        expand_path(&self.state.history_file)
    }

    pub fn media_usage_path(&self) -> PathBuf {
        expand_path(&self.state.media_usage_file)
    }
}

/// Expand `~` and environment variables in a configured path
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}

/// Resolve the configuration file path under the XDG config directory
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("ROTACAST_CONFIG") {
        return Ok(expand_path(&path));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("rotacast").join("config.toml"))
}

/// Resolve the data directory path under the XDG data directory
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("rotacast"))
}

fn default_data_file(name: &str) -> String {
    match resolve_data_path() {
        Ok(dir) => dir.join(name).display().to_string(),
        Err(_) => format!("~/.local/share/rotacast/{}", name),
    }
}

fn default_history_file() -> String {
    default_data_file("history.json")
}

fn default_media_usage_file() -> String {
    default_data_file("media_used.json")
}

fn default_interval() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_dedup_window() -> Duration {
    Duration::from_secs(24 * 3600)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_market_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_vs_currency() -> String {
    "usd".to_string()
}

fn default_market_limit() -> u32 {
    10
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_true() -> bool {
    true
}

/// Human-readable durations ("30m", "24h") in config files
mod human_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
