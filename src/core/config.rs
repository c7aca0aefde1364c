//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::workspace::Workspace;

/// Staleness window applied to cached queries when nothing is configured
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Garage Desk configuration with layered hierarchy
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Shop selected by default (id or name)
    pub shop: Option<String>,

    /// Staff identity used for attribution
    pub user: Option<String>,

    /// Default output format
    pub default_format: Option<String>,

    /// Seconds before a cached query is considered stale
    pub cache_ttl_secs: Option<u64>,

    /// Currency label used in reports
    pub currency: Option<String>,

    /// Emit low-stock notifications when stock drops to the minimum
    pub low_stock_notifications: Option<bool>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load(workspace: Option<&Workspace>) -> Self {
        Self::load_from(
            Self::global_config_path().as_deref(),
            workspace.map(|ws| ws.config_path()).as_deref(),
        )
    }

    /// Load using explicit file locations (used by `load` and tests)
    pub fn load_from(global_path: Option<&Path>, workspace_path: Option<&Path>) -> Self {
        // 1. Built-in defaults (already in Default impl)
        let mut config = Config::default();

        // 2. Global user config (~/.config/garage/config.yaml)
        if let Some(global) = global_path.and_then(Self::read_file) {
            config.merge(global);
        }

        // 3. Workspace config (.garage/config.yaml)
        if let Some(local) = workspace_path.and_then(Self::read_file) {
            config.merge(local);
        }

        // 4. Environment variables
        if let Ok(shop) = std::env::var("GARAGE_SHOP") {
            config.shop = Some(shop);
        }
        if let Ok(user) = std::env::var("GARAGE_USER") {
            config.user = Some(user);
        }
        if let Some(ttl) = std::env::var("GARAGE_CACHE_TTL")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.cache_ttl_secs = Some(ttl);
        }

        config
    }

    fn read_file(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Option<Config>>(&contents) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
                None
            }
        }
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "garage")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.shop.is_some() {
            self.shop = other.shop;
        }
        if other.user.is_some() {
            self.user = other.user;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
        if other.cache_ttl_secs.is_some() {
            self.cache_ttl_secs = other.cache_ttl_secs;
        }
        if other.currency.is_some() {
            self.currency = other.currency;
        }
        if other.low_stock_notifications.is_some() {
            self.low_stock_notifications = other.low_stock_notifications;
        }
    }

    /// Get the acting user, falling back to the OS username
    pub fn user(&self) -> String {
        if let Some(ref user) = self.user {
            return user.clone();
        }

        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string())
    }

    /// Staleness window for the query cache
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS))
    }

    /// Currency label for reports
    pub fn currency(&self) -> &str {
        self.currency.as_deref().unwrap_or("BRL")
    }

    pub fn low_stock_notifications(&self) -> bool {
        self.low_stock_notifications.unwrap_or(true)
    }

    /// Look up a value by key name, rendered as text
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "shop" => self.shop.clone(),
            "user" => self.user.clone(),
            "default_format" => self.default_format.clone(),
            "cache_ttl_secs" => self.cache_ttl_secs.map(|v| v.to_string()),
            "currency" => self.currency.clone(),
            "low_stock_notifications" => self.low_stock_notifications.map(|v| v.to_string()),
            _ => None,
        }
    }
}

/// Valid configuration keys with descriptions
pub const CONFIG_KEYS: &[(&str, &str)] = &[
    ("shop", "Shop selected by default (id or name)"),
    ("user", "Staff identity recorded in history and notifications"),
    ("default_format", "Default output format (yaml, json, tsv, etc.)"),
    ("cache_ttl_secs", "Seconds a cached query stays fresh"),
    ("currency", "Currency label used in reports"),
    ("low_stock_notifications", "Notify when stock reaches the minimum (true/false)"),
];
