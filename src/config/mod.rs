//! Configuration types and loading for the comic DNS server.

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Default config.yaml embedded at compile time
pub const DEFAULT_CONFIG_YAML: &str = include_str!("../../config.yaml");

/// Main configuration struct
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Parent zone every recognised query is nested under
    #[serde(default = "default_zone")]
    pub zone: String,
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            zone: default_zone(),
            dns: DnsConfig::default(),
            upstream: UpstreamConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Zone in canonical form: lowercase, single trailing dot.
    pub fn normalized_zone(&self) -> String {
        normalize_zone(&self.zone)
    }
}

/// Lowercase a zone name and make sure it ends with exactly one dot.
pub fn normalize_zone(zone: &str) -> String {
    let trimmed = zone.trim().trim_end_matches('.').to_ascii_lowercase();
    format!("{}.", trimmed)
}

// ============== DNS Config ==============

#[derive(Debug, Deserialize, Clone)]
pub struct DnsConfig {
    #[serde(default = "default_dns_listen")]
    pub listen: String,
}

impl Default for DnsConfig {
    fn default() -> Self {
        DnsConfig {
            listen: default_dns_listen(),
        }
    }
}

// ============== Upstream Config ==============

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    /// Base URL for numbered comics; the page for id N is `<base>/N/`
    #[serde(default = "default_comic_base_url")]
    pub comic_base_url: String,
    #[serde(default = "default_random_url")]
    pub random_url: String,
    /// Bound on a whole fetch, redirects and body included
    #[serde(default = "default_upstream_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl UpstreamConfig {
    /// URL of the canonical page for a numbered comic
    pub fn comic_url(&self, id: u64) -> String {
        format!("{}/{}/", self.comic_base_url.trim_end_matches('/'), id)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_comic_base_url() -> String {
    "https://xkcd.com".to_string()
}

fn default_random_url() -> String {
    "https://c.xkcd.com/random/comic/".to_string()
}

fn default_upstream_timeout_ms() -> u64 {
    5000
}

fn default_max_redirects() -> u32 {
    5
}

fn default_max_body_bytes() -> u64 {
    1024 * 1024 // 1MB, comic pages are ~10KB
}

fn default_user_agent() -> String {
    concat!("xkcd-dns/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            comic_base_url: default_comic_base_url(),
            random_url: default_random_url(),
            timeout_ms: default_upstream_timeout_ms(),
            max_redirects: default_max_redirects(),
            max_body_bytes: default_max_body_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

// ============== Cache Config ==============

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Entries untouched for longer than this are swept
    #[serde(default = "default_cache_expiry")]
    pub expiry_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl CacheConfig {
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

fn default_cache_expiry() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            expiry_seconds: default_cache_expiry(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

// ============== Logging Config ==============

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_requests")]
    pub log_requests: bool,
    #[serde(default)]
    pub format: LogFormat,
    /// File logging configuration
    #[serde(default)]
    pub file: Option<FileLoggingConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FileLoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
    #[serde(default)]
    pub rotation: LogRotation,
    /// Days to keep old log files (0 = keep forever)
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u64,
    /// Compress rotated log files with gzip
    #[serde(default = "default_compress")]
    pub compress: bool,
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_file_prefix() -> String {
    "xkcd-dns.log".to_string()
}

fn default_max_age_days() -> u64 {
    7
}

fn default_compress() -> bool {
    true
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        FileLoggingConfig {
            log_dir: default_log_dir(),
            file_prefix: default_log_file_prefix(),
            rotation: LogRotation::Daily,
            max_age_days: default_max_age_days(),
            compress: default_compress(),
        }
    }
}

fn default_log_requests() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_requests: true,
            format: LogFormat::Text,
            file: None,
        }
    }
}

// ============== Default Values ==============

pub fn default_zone() -> String {
    "xkcd.".to_string()
}

pub fn default_dns_listen() -> String {
    "0.0.0.0:53".to_string()
}

// ============== Config Loading ==============

/// Get the directory containing the executable
fn exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
}

/// Load configuration from file
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error + Send + Sync>> {
    let config_paths = if let Some(p) = path {
        vec![PathBuf::from(p)]
    } else {
        let mut paths = vec![PathBuf::from("config.yaml")];
        if let Some(dir) = exe_dir() {
            paths.push(dir.join("config.yaml"));
        }
        paths
    };

    for config_path in config_paths {
        if config_path.exists() {
            println!("Loading config from: {}", config_path.display());
            let content = fs::read_to_string(&config_path)?;
            let config: Config = serde_yaml_ng::from_str(&content)?;
            return Ok(config);
        }
    }

    Ok(Config::default())
}

// ============== Unit Tests ==============
