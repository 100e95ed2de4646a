//! Shared configuration for the logtail CLI and TUI.
//!
//! TOML profiles naming log servers, layered with `LOGTAIL_*` environment
//! variables, and translation to `logtail_core::ClientConfig`. Both binaries
//! depend on this crate; the CLI applies its flag overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use logtail_core::{ClientConfig, RetryPolicy};

/// Port the log server listens on unless a profile says otherwise.
pub const DEFAULT_PORT: u16 = 8043;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration shared by CLI and TUI.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named log server profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Reconnect attempts after an unexpected disconnect.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff step in milliseconds; attempt `n` waits `n * step`.
    #[serde(default = "default_retry_step_ms")]
    pub retry_step_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            max_retries: default_max_retries(),
            retry_step_ms: default_retry_step_ms(),
        }
    }
}

fn default_output() -> String {
    "plain".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_max_retries() -> u32 {
    logtail_core::retry::DEFAULT_MAX_RETRIES
}
fn default_retry_step_ms() -> u64 {
    5_000
}

/// A named log server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Server host name or address.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// `wss` (default) or `ws`.
    #[serde(default = "default_scheme")]
    pub scheme: String,

    #[serde(default = "default_path")]
    pub path: String,

    /// Channels to subscribe to on connect.
    #[serde(default)]
    pub channels: Vec<String>,

    /// Override `defaults.max_retries`.
    pub max_retries: Option<u32>,

    /// Override `defaults.retry_step_ms`.
    pub retry_step_ms: Option<u64>,
}

impl Profile {
    /// A profile for `host` with every other field at its default.
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            scheme: default_scheme(),
            path: default_path(),
            channels: Vec::new(),
            max_retries: None,
            retry_step_ms: None,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_scheme() -> String {
    "wss".into()
}
fn default_path() -> String {
    "/".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "logtail", "logtail").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("logtail");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
///
/// Environment keys nest on `__`: `LOGTAIL_DEFAULTS__MAX_RETRIES=5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LOGTAIL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile resolution ──────────────────────────────────────────────

impl Config {
    /// The profile to use: `requested`, else `default_profile`, else "default".
    pub fn active_profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }

    /// Reconnect policy for `profile`, falling back to the global defaults.
    pub fn retry_policy(&self, profile: &Profile) -> RetryPolicy {
        RetryPolicy {
            max_retries: profile.max_retries.unwrap_or(self.defaults.max_retries),
            step: Duration::from_millis(
                profile
                    .retry_step_ms
                    .unwrap_or(self.defaults.retry_step_ms),
            ),
        }
    }
}

/// Build a `ClientConfig` from a profile.
///
/// This is the single boundary where config types cross into core types.
pub fn profile_to_client_config(
    profile: &Profile,
    retry: RetryPolicy,
) -> Result<ClientConfig, ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }
    if retry.step.is_zero() && retry.max_retries > 0 {
        return Err(ConfigError::Validation {
            field: "retry_step_ms".into(),
            reason: "must be greater than zero".into(),
        });
    }

    let url = logtail_core::endpoint_url(
        &profile.scheme,
        &profile.host,
        profile.port,
        &profile.path,
    )
    .map_err(|e| ConfigError::Validation {
        field: "endpoint".into(),
        reason: e.to_string(),
    })?;

    Ok(ClientConfig::new(url)
        .with_channels(profile.channels.iter().cloned())
        .with_retry(retry))
}
