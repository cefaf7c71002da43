//! Configuration management for immowatch
//!
//! This module handles loading and validating configuration from TOML files
//! and environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::SourceKind;

/// Search bounds baked into the default start URLs
const PRICE_MIN: u32 = 300;
const PRICE_MAX: u32 = 800;
const SIZE_MIN: u32 = 20;
const ROOMS: u32 = 1;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Shared HTTP and sweep settings
    pub crawler: CrawlerConfig,

    /// Per-source crawl policies
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Listing store configuration
    pub storage: StorageConfig,

    /// Notification configuration
    pub notifications: NotificationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Crawler-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// User agent string
    pub user_agent: String,

    /// Maximum simultaneous fetches during an availability sweep
    pub sweep_concurrency: usize,

    /// Buffer between the crawl orchestrator and the ingestion pipeline
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer_size: usize,
}

fn default_channel_buffer() -> usize {
    256
}

/// Crawl policy for one source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Which extractor handles this source
    pub kind: SourceKind,

    /// Result pages fetched once per crawl cycle
    pub start_urls: Vec<String>,

    /// Maximum simultaneous requests against this source
    #[serde(default = "default_concurrency_cap")]
    pub concurrency_cap: usize,

    /// Minimum delay between two requests against this source
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Cookies sent with every request to this source
    #[serde(default)]
    pub cookies: HashMap<String, String>,

    /// Extra headers sent with every request to this source
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Bounded retries per start URL (0 = fire once per cycle)
    #[serde(default)]
    pub max_retries: u32,
}

fn default_concurrency_cap() -> usize {
    2
}

fn default_request_delay_ms() -> u64 {
    3000
}

impl SourceConfig {
    /// Policy with the default cap and delay
    pub fn new(kind: SourceKind, start_urls: Vec<String>) -> Self {
        Self {
            kind,
            start_urls,
            concurrency_cap: default_concurrency_cap(),
            request_delay_ms: default_request_delay_ms(),
            cookies: HashMap::new(),
            headers: HashMap::new(),
            max_retries: 0,
        }
    }

    /// Inter-request delay as Duration
    #[must_use]
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Listing store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// ntfy server base URL
    pub ntfy_server: String,

    /// Topic new listings are published to
    pub topic: String,

    /// Optional JSON webhook receiving the same notifications
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Bearer token sent to the webhook
    #[serde(default)]
    pub webhook_auth_token: Option<String>,

    /// Extra headers sent to the webhook
    #[serde(default)]
    pub webhook_headers: HashMap<String, String>,

    /// Notification request timeout in seconds
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,

    /// Pending notifications buffered before new ones are dropped
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

fn default_notify_timeout() -> u64 {
    10
}

fn default_queue_size() -> usize {
    128
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            ntfy_server: String::from("https://ntfy.sh"),
            topic: String::from("default"),
            webhook_url: None,
            webhook_auth_token: None,
            webhook_headers: HashMap::new(),
            timeout_secs: default_notify_timeout(),
            queue_size: default_queue_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Defaults with environment variable overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `IMMOWATCH_*` / `NTFY_*` environment overrides in place
    pub fn apply_env_overrides(&mut self) {
        if let Some(timeout) = env_parse::<u64>("IMMOWATCH_REQUEST_TIMEOUT") {
            self.crawler.request_timeout_secs = timeout;
        }

        if let Ok(user_agent) = std::env::var("IMMOWATCH_USER_AGENT") {
            self.crawler.user_agent = user_agent;
        }

        if let Some(concurrency) = env_parse::<usize>("IMMOWATCH_SWEEP_CONCURRENCY") {
            self.crawler.sweep_concurrency = concurrency;
        }

        if let Ok(path) = std::env::var("IMMOWATCH_SQLITE_PATH") {
            self.storage.sqlite_path = PathBuf::from(path);
        }

        if let Ok(server) = std::env::var("NTFY_SERVER") {
            self.notifications.ntfy_server = server;
        }

        if let Ok(topic) = std::env::var("NTFY_TOPIC") {
            self.notifications.topic = topic;
        }

        if let Ok(url) = std::env::var("IMMOWATCH_WEBHOOK_URL") {
            self.notifications.webhook_url = Some(url);
        }

        if let Ok(token) = std::env::var("IMMOWATCH_WEBHOOK_TOKEN") {
            self.notifications.webhook_auth_token = Some(token);
        }

        if let Ok(level) = std::env::var("IMMOWATCH_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = std::env::var("IMMOWATCH_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.crawler.sweep_concurrency == 0 {
            anyhow::bail!("sweep_concurrency must be greater than 0");
        }

        if self.crawler.channel_buffer_size == 0 {
            anyhow::bail!("channel_buffer_size must be greater than 0");
        }

        for source in &self.sources {
            if source.concurrency_cap == 0 {
                anyhow::bail!("concurrency_cap for {} must be greater than 0", source.kind);
            }

            for url in &source.start_urls {
                if !source.kind.matches_url(url) {
                    anyhow::bail!("start URL {url} does not belong to source {}", source.kind);
                }
            }
        }

        if self.notifications.topic.trim().is_empty() {
            anyhow::bail!("notification topic must not be empty");
        }

        if self.notifications.queue_size == 0 {
            anyhow::bail!("notification queue_size must be greater than 0");
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.crawler.request_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

/// Default result pages: Konstanz on immowelt, Munich on wg-gesucht and kleinanzeigen
fn default_sources() -> Vec<SourceConfig> {
    let mut wg_gesucht = SourceConfig::new(
        SourceKind::WgGesucht,
        vec![format!(
            "https://www.wg-gesucht.de/1-zimmer-wohnungen-und-wohnungen-in-Muenchen.90.1+2.1.0.html\
             ?offer_filter=1&city_id=74&sort_order=0&noDeact=1&categories[]=1&categories[]=2\
             &rent_types[]=0&sMin={SIZE_MIN}&rMax={PRICE_MAX}&exc=2"
        )],
    );
    // wg-gesucht serves the desktop markup only with this client cookie
    wg_gesucht
        .cookies
        .insert("X-Client-Id".to_string(), "wg_desktop_website".to_string());

    vec![
        SourceConfig::new(
            SourceKind::Immowelt,
            vec![format!(
                "https://www.immowelt.de/liste/konstanz-koenigsbau/wohnungen/mieten?ami={SIZE_MIN}&d=true\
                 &lids=462735&lids=462751&lids=462733&lids=462766&lids=462749&lids=462734&lids=462758\
                 &pma={PRICE_MAX}&pmi={PRICE_MIN}&sd=DESC&sf=TIMESTAMP&sp=1"
            )],
        ),
        wg_gesucht,
        SourceConfig::new(
            SourceKind::Kleinanzeigen,
            vec![format!(
                "https://www.kleinanzeigen.de/s-wohnung-mieten/muenchen/anzeige:angebote/\
                 preis:{PRICE_MIN}:{PRICE_MAX}/c203l9386+wohnung_mieten.qm_d:{SIZE_MIN}%2C\
                 +wohnung_mieten.zimmer_d:{ROOMS}%2C"
            )],
        ),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig {
                request_timeout_secs: 30,
                user_agent: String::from(
                    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
                ),
                sweep_concurrency: 8,
                channel_buffer_size: default_channel_buffer(),
            },
            sources: default_sources(),
            storage: StorageConfig {
                sqlite_path: PathBuf::from("data/listings.db"),
            },
            notifications: NotificationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
