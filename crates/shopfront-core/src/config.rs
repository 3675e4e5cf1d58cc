//! Application configuration management.
//!
//! This module handles loading and saving the shell configuration: the site
//! address the window opens, the asset list the worker pre-caches, and the
//! versioned cache name those assets are stored under.
//!
//! Configuration is stored at `~/.config/shopfront/config.json`. A missing
//! file yields the built-in defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "shopfront";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable that overrides the site address
pub const ADDRESS_ENV: &str = "SHOPFRONT_ADDRESS";

pub const DEFAULT_ADDRESS: &str = "http://localhost:5000";

pub const DEFAULT_CACHE_NAME: &str = "product-cache-v1";

/// Interceptor bind address
pub const DEFAULT_LISTEN: &str = "127.0.0.1:5080";

pub const DEFAULT_ASSETS: &[&str] = &[
    "/",
    "/static/css/style.css",
    "/static/js/app.js",
    "/static/icons/manifest-icon-192.png",
    "/static/icons/manifest-icon-512.png",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 800,
            title: "Shopfront".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Address loaded into the shell window.
    pub address: String,
    /// URLs pre-cached at install time, in order.
    pub assets: Vec<String>,
    /// Version-qualified cache name. Bump it when `assets` change.
    pub cache_name: String,
    pub window: WindowConfig,
    pub listen: String,
    /// Origin the worker fetches from. Falls back to `address`.
    pub upstream: Option<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            assets: DEFAULT_ASSETS.iter().map(|s| s.to_string()).collect(),
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            window: WindowConfig::default(),
            listen: DEFAULT_LISTEN.to_string(),
            upstream: None,
        }
    }
}

impl ShellConfig {
    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(address) = lookup(ADDRESS_ENV).filter(|a| !a.trim().is_empty()) {
            self.address = address.trim().to_string();
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn address_url(&self) -> Result<Url> {
        Url::parse(&self.address).with_context(|| format!("Invalid address: {}", self.address))
    }

    pub fn upstream_url(&self) -> Result<Url> {
        let upstream = self.upstream.as_deref().unwrap_or(&self.address);
        Url::parse(upstream).with_context(|| format!("Invalid upstream: {}", upstream))
    }
}
