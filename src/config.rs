//! Configuration management for articlepulse.
//!
//! Settings resolve in layers: built-in defaults, then an optional
//! `config.toml` in the data directory. The data directory itself comes
//! from the CLI flag or `ARTICLEPULSE_DATA_DIR`.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Environment variable naming the data directory.
pub const DATA_DIR_ENV: &str = "ARTICLEPULSE_DATA_DIR";

/// Feed API and polling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Feed API endpoint returning one page per request.
    pub endpoint: String,
    /// Content type filter sent with every page request.
    pub content_type: String,
    /// Tag the tracked articles are published under.
    pub tag_name: String,
    /// Public site prefix article URLs are synthesized from.
    pub article_base_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Courtesy pause between successive page requests, in milliseconds.
    pub request_delay_ms: u64,
    /// Pause between retries of a failed page request, in milliseconds.
    pub retry_delay_ms: u64,
    /// Attempts per page before the cycle gives up.
    pub max_retries: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.builder.example.com/cs/content/tag".to_string(),
            content_type: "ARTICLE".to_string(),
            tag_name: "aideas-2025".to_string(),
            article_base_url: "https://builder.example.com".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36"
                .to_string(),
            request_timeout_secs: 30,
            request_delay_ms: 1000,
            retry_delay_ms: 5000,
            max_retries: 3,
        }
    }
}

impl FeedConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Engagement scoring weights.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub like_weight: f64,
    pub comment_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            like_weight: 1.0,
            comment_weight: 1.0,
        }
    }
}

/// HTTP server bind address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Leaderboard defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    /// Author excluded from rankings unless a request overrides it
    /// (e.g. the event host).
    pub exclude_author: Option<String>,
}

/// Full on-disk configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub scoring: ScoringConfig,
    pub server: ServerConfig,
    pub leaderboard: LeaderboardConfig,
}

/// Resolved settings for one process.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub config: Config,
}

impl Settings {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("articlepulse.db")
    }

    pub fn database_url(&self) -> String {
        self.database_path().display().to_string()
    }

    /// Browser-exported session cookies for the feed API.
    pub fn cookie_path(&self) -> PathBuf {
        self.data_dir.join("cookies.json")
    }
}

/// Default data directory when neither flag nor environment names one.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::data_local_dir()
        .map(|d| d.join("articlepulse"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Load settings for the given data directory (or the default one).
pub fn load_settings(data_dir: Option<PathBuf>) -> anyhow::Result<Settings> {
    let data_dir = data_dir.unwrap_or_else(default_data_dir);
    let config_path = data_dir.join("config.toml");

    let config = if config_path.exists() {
        let raw = fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing {}", config_path.display()))?
    } else {
        Config::default()
    };

    Ok(Settings { data_dir, config })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_partial_config() {
        let config: Config = toml::from_str(
            r#"
            [scoring]
            like_weight = 2.5

            [feed]
            tag_name = "rustconf-2026"
            "#,
        )
        .unwrap();

        assert_eq!(config.scoring.like_weight, 2.5);
        assert_eq!(config.scoring.comment_weight, 1.0);
        assert_eq!(config.feed.tag_name, "rustconf-2026");
        assert_eq!(config.feed.max_retries, 3);
        assert_eq!(config.server.port, 8000);
        assert!(config.leaderboard.exclude_author.is_none());
    }

    #[test]
    fn settings_paths_are_under_data_dir() {
        let settings = Settings {
            data_dir: PathBuf::from("/tmp/pulse-data"),
            config: Config::default(),
        };
        assert_eq!(
            settings.database_path(),
            PathBuf::from("/tmp/pulse-data/articlepulse.db")
        );
        assert_eq!(
            settings.cookie_path(),
            PathBuf::from("/tmp/pulse-data/cookies.json")
        );
    }
}
