// src/config.rs
//! Configuration file parsing for the listing service
//!
//! Supports TOML configuration files with the following sections:
//! - [server] - Bind address and public base URL
//! - [github] - API token used for release polling and private downloads
//! - [storage] - State directory, cache and registry file names
//! - [scheduler] - Poll intervals, staleness windows, debounce and TTL

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
pub struct ListingConfig {
    /// Server settings
    #[serde(default)]
    pub server: ServerSection,

    /// GitHub API settings
    #[serde(default)]
    pub github: GitHubSection,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageSection,

    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerSection,
}

/// Server configuration section
#[derive(Debug, Deserialize)]
pub struct ServerSection {
    /// Bind address for the HTTP listener
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Public base URL, used to build private plugin download links
    #[serde(default = "default_app_url")]
    pub app_url: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            app_url: default_app_url(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_app_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

/// GitHub API configuration section
#[derive(Debug, Default, Deserialize)]
pub struct GitHubSection {
    /// API token for release polling and private asset downloads
    pub token: Option<String>,
}

/// Storage configuration section
#[derive(Debug, Deserialize)]
pub struct StorageSection {
    /// Directory all state and registry files are resolved against
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Cached repository collection snapshot
    #[serde(default = "default_repositories_file")]
    pub repositories_file: String,

    /// Cached release metadata snapshot
    #[serde(default = "default_releases_file")]
    pub releases_file: String,

    /// Registered origin URLs, one per line
    #[serde(default = "default_origins_file")]
    pub origins_file: String,

    /// Registered internal plugins, one `owner/repo` per line
    #[serde(default = "default_plugins_file")]
    pub plugins_file: String,

    /// HTML listing template
    #[serde(default = "default_template")]
    pub template: String,

    /// Static assets served under /assets
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            repositories_file: default_repositories_file(),
            releases_file: default_releases_file(),
            origins_file: default_origins_file(),
            plugins_file: default_plugins_file(),
            template: default_template(),
            assets_dir: default_assets_dir(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_repositories_file() -> String {
    "cached-repositories.json".to_string()
}

fn default_releases_file() -> String {
    "cached-plugin-releases.json".to_string()
}

fn default_origins_file() -> String {
    "repositories.txt".to_string()
}

fn default_plugins_file() -> String {
    "plugins.txt".to_string()
}

fn default_template() -> String {
    "views/index.html".to_string()
}

fn default_assets_dir() -> String {
    "assets".to_string()
}

/// Scheduler configuration section
///
/// All values are humane duration strings ("5s", "30m", "12h", "3d").
#[derive(Debug, Deserialize)]
pub struct SchedulerSection {
    /// Quiet period before a burst of mutations is flushed to disk
    #[serde(default = "default_quiet_period")]
    pub quiet_period: String,

    /// Lower bound of the jittered origin poll interval
    #[serde(default = "default_origin_interval_min")]
    pub origin_interval_min: String,

    /// Upper bound of the jittered origin poll interval
    #[serde(default = "default_origin_interval_max")]
    pub origin_interval_max: String,

    /// Skip the startup run for origins refreshed within this window
    #[serde(default = "default_origin_staleness")]
    pub origin_staleness: String,

    /// Fixed poll interval for internal plugin releases
    #[serde(default = "default_release_interval")]
    pub release_interval: String,

    /// Skip the startup run for internal plugins refreshed within this window
    #[serde(default = "default_release_staleness")]
    pub release_staleness: String,

    /// How often the expiry sweeper walks the collection
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: String,

    /// Maximum allowed staleness before a record is expired
    #[serde(default = "default_repository_ttl")]
    pub repository_ttl: String,

    /// Hard deadline for draining state on shutdown
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace: String,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            quiet_period: default_quiet_period(),
            origin_interval_min: default_origin_interval_min(),
            origin_interval_max: default_origin_interval_max(),
            origin_staleness: default_origin_staleness(),
            release_interval: default_release_interval(),
            release_staleness: default_release_staleness(),
            sweep_interval: default_sweep_interval(),
            repository_ttl: default_repository_ttl(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

fn default_quiet_period() -> String {
    "5s".to_string()
}

fn default_origin_interval_min() -> String {
    "55m".to_string()
}

fn default_origin_interval_max() -> String {
    "70m".to_string()
}

fn default_origin_staleness() -> String {
    "35m".to_string()
}

fn default_release_interval() -> String {
    "12h".to_string()
}

fn default_release_staleness() -> String {
    "120m".to_string()
}

fn default_sweep_interval() -> String {
    "30m".to_string()
}

fn default_repository_ttl() -> String {
    "3d".to_string()
}

fn default_shutdown_grace() -> String {
    "10s".to_string()
}

/// Resolved scheduler timings, all durations parsed and validated
#[derive(Debug, Clone)]
pub struct SchedulerTimings {
    pub quiet_period: Duration,
    pub origin_interval_min: Duration,
    pub origin_interval_max: Duration,
    pub origin_staleness: Duration,
    pub release_interval: Duration,
    pub release_staleness: Duration,
    pub sweep_interval: Duration,
    pub repository_ttl: Duration,
    pub shutdown_grace: Duration,
}

impl ListingConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ListingConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.server
            .bind
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid server.bind address: {}", self.server.bind))?;

        url::Url::parse(&self.server.app_url)
            .with_context(|| format!("Invalid server.app_url: {}", self.server.app_url))?;

        let timings = self.timings()?;

        if timings.quiet_period.is_zero() {
            anyhow::bail!("scheduler.quiet_period must be greater than zero");
        }
        if timings.origin_interval_min > timings.origin_interval_max {
            anyhow::bail!(
                "scheduler.origin_interval_min must be <= scheduler.origin_interval_max"
            );
        }
        if timings.repository_ttl.is_zero() {
            anyhow::bail!("scheduler.repository_ttl must be greater than zero");
        }

        Ok(())
    }

    /// Bind address for the HTTP listener
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .with_context(|| format!("Invalid server.bind address: {}", self.server.bind))
    }

    /// Public base URL with any trailing slash removed
    pub fn app_url(&self) -> String {
        self.server.app_url.trim().trim_end_matches('/').to_string()
    }

    /// GitHub token, with the GITHUB_TOKEN environment variable taking precedence
    pub fn github_token(&self) -> Option<String> {
        std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.github.token.clone())
    }

    /// Parse all scheduler durations
    pub fn timings(&self) -> Result<SchedulerTimings> {
        Ok(SchedulerTimings {
            quiet_period: parse_duration(&self.scheduler.quiet_period)?,
            origin_interval_min: parse_duration(&self.scheduler.origin_interval_min)?,
            origin_interval_max: parse_duration(&self.scheduler.origin_interval_max)?,
            origin_staleness: parse_duration(&self.scheduler.origin_staleness)?,
            release_interval: parse_duration(&self.scheduler.release_interval)?,
            release_staleness: parse_duration(&self.scheduler.release_staleness)?,
            sweep_interval: parse_duration(&self.scheduler.sweep_interval)?,
            repository_ttl: parse_duration(&self.scheduler.repository_ttl)?,
            shutdown_grace: parse_duration(&self.scheduler.shutdown_grace)?,
        })
    }

    pub fn repositories_path(&self) -> PathBuf {
        self.storage.root.join(&self.storage.repositories_file)
    }

    pub fn releases_path(&self) -> PathBuf {
        self.storage.root.join(&self.storage.releases_file)
    }

    pub fn origins_path(&self) -> PathBuf {
        self.storage.root.join(&self.storage.origins_file)
    }

    pub fn plugins_path(&self) -> PathBuf {
        self.storage.root.join(&self.storage.plugins_file)
    }

    pub fn template_path(&self) -> PathBuf {
        self.storage.root.join(&self.storage.template)
    }

    pub fn assets_path(&self) -> PathBuf {
        self.storage.root.join(&self.storage.assets_dir)
    }
}

/// Parse a human-readable duration string (e.g., "30s", "15m", "12h", "3d")
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if s.ends_with('d') {
        (&s[..s.len() - 1], 24 * 60 * 60)
    } else if s.ends_with('h') {
        (&s[..s.len() - 1], 60 * 60)
    } else if s.ends_with('m') {
        (&s[..s.len() - 1], 60)
    } else if s.ends_with('s') {
        (&s[..s.len() - 1], 1)
    } else {
        // Assume seconds
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration number: {}", num_str))?;

    Ok(Duration::from_secs(num * multiplier))
}
