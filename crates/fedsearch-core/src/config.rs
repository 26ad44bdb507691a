//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Provides a helper to expand `~` and `${VAR}` in configured paths.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Wrap an already assembled figment, e.g. one built from an inline TOML string.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed settings, validated.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self.figment.extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub cache: CacheSettings,
    pub mediator: MediatorSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub index_dir: String,
    pub name: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { index_dir: "data/index".to_string(), name: "fedsearch".to_string() }
    }
}

impl StorageSettings {
    /// `<index_dir>/<name>`, with `~` and variables expanded.
    pub fn root(&self) -> PathBuf { expand_path(&self.index_dir).join(&self.name) }
    pub fn resources_dir(&self) -> PathBuf { self.root().join("resources") }
    pub fn results_dir(&self) -> PathBuf { self.root().join("results") }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self { Self { capacity: 500, ttl_secs: 3600 } }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration { Duration::from_secs(self.ttl_secs) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediatorSettings {
    pub fetch_timeout_ms: u64,
    pub max_hits: usize,
    pub preview_hits: usize,
}

impl Default for MediatorSettings {
    fn default() -> Self { Self { fetch_timeout_ms: 10_000, max_hits: 20, preview_hits: 10 } }
}

impl MediatorSettings {
    pub fn fetch_timeout(&self) -> Duration { Duration::from_millis(self.fetch_timeout_ms) }
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.cache.capacity == 0 {
            return Err(Error::InvalidConfig("cache.capacity must be > 0".to_string()));
        }
        if self.mediator.fetch_timeout_ms == 0 {
            return Err(Error::InvalidConfig("mediator.fetch_timeout_ms must be > 0".to_string()));
        }
        if self.mediator.max_hits == 0 {
            return Err(Error::InvalidConfig("mediator.max_hits must be > 0".to_string()));
        }
        if self.storage.name.trim().is_empty() {
            return Err(Error::InvalidConfig("storage.name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
