//! Configuration loading from environment variables.

use crate::constants::*;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Size and count caps applied to create requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Limits {
    /// Maximum characters (Unicode scalar values) per snippet.
    pub max_snippet_length: usize,
    pub max_snippet_count: usize,
    /// Maximum bytes per attachment.
    pub max_attachment_bytes: u64,
    pub max_attachment_count: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_snippet_length: DEFAULT_MAX_SNIPPET_LENGTH,
            max_snippet_count: DEFAULT_MAX_SNIPPET_COUNT,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            max_attachment_count: DEFAULT_MAX_ATTACHMENT_COUNT,
        }
    }
}

/// Runtime configuration for PasteShare.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub db_path: String,
    pub blob_dir: String,
    pub port: u16,
    /// Base URL prefixed to signed blob links, without trailing slash.
    pub public_base_url: String,
    /// Secret used to sign blob URLs.
    pub url_signing_key: String,
    pub limits: Limits,
    pub sweep_interval_secs: u64,
    pub sweep_grace_secs: u64,
    pub signed_url_ttl_secs: u64,
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: String) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = resolve_home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path
}

fn resolve_home_dir() -> Option<PathBuf> {
    if let Ok(home) = env::var("HOME") {
        if !home.trim().is_empty() {
            return Some(PathBuf::from(home));
        }
    }

    if let Ok(profile) = env::var("USERPROFILE") {
        if !profile.trim().is_empty() {
            return Some(PathBuf::from(profile));
        }
    }

    std::env::current_dir().ok()
}

fn default_data_dir() -> PathBuf {
    let home = resolve_home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".cache").join("pasteshare")
}

/// Parse a boolean-like environment flag value.
///
/// # Supported Values
/// - Truthy: `1`, `true`, `yes`, `on`
/// - Falsy: `0`, `false`, `no`, `off`, empty string
///
/// Matching is case-insensitive and ignores surrounding whitespace.
///
/// # Returns
/// `Some(bool)` when the value is recognized, otherwise `None`.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean flag from the environment.
///
/// Missing or unrecognized values are treated as `false`.
pub fn env_flag_enabled(name: &str) -> bool {
    env::var(name)
        .ok()
        .and_then(|value| parse_env_flag(&value))
        .unwrap_or(false)
}

/// Parse a strictly positive number, falling back to `default` for missing,
/// malformed, or zero values.
pub fn parse_positive_or<T>(raw: Option<&str>, default: T) -> T
where
    T: FromStr + PartialOrd + Default,
{
    raw.and_then(|value| value.trim().parse::<T>().ok())
        .filter(|value| *value > T::default())
        .unwrap_or(default)
}

fn env_positive_or<T>(name: &str, default: T) -> T
where
    T: FromStr + PartialOrd + Default,
{
    parse_positive_or(env::var(name).ok().as_deref(), default)
}

impl Limits {
    /// Load limits from the environment, replacing non-positive values with defaults.
    pub fn from_env() -> Self {
        Self {
            max_snippet_length: env_positive_or("MAX_SNIPPET_LENGTH", DEFAULT_MAX_SNIPPET_LENGTH),
            max_snippet_count: env_positive_or("MAX_SNIPPET_COUNT", DEFAULT_MAX_SNIPPET_COUNT),
            max_attachment_bytes: env_positive_or(
                "MAX_ATTACHMENT_BYTES",
                DEFAULT_MAX_ATTACHMENT_BYTES,
            ),
            max_attachment_count: env_positive_or(
                "MAX_ATTACHMENT_COUNT",
                DEFAULT_MAX_ATTACHMENT_COUNT,
            ),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Returns
    /// A populated [`Config`] with defaults applied when env vars are missing.
    pub fn from_env() -> Self {
        let port = env_positive_or("PORT", DEFAULT_PORT);
        let url_signing_key = env::var("URL_SIGNING_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| {
                tracing::warn!(
                    "URL_SIGNING_KEY is not set; signed blob URLs will not survive a restart"
                );
                uuid::Uuid::new_v4().simple().to_string()
            });

        Self {
            db_path: env::var("DB_PATH").map(expand_tilde).unwrap_or_else(|_| {
                default_data_dir().join("db").to_string_lossy().to_string()
            }),
            blob_dir: env::var("BLOB_DIR").map(expand_tilde).unwrap_or_else(|_| {
                default_data_dir()
                    .join("uploads")
                    .to_string_lossy()
                    .to_string()
            }),
            port,
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| format!("http://localhost:{}", port)),
            url_signing_key,
            limits: Limits::from_env(),
            sweep_interval_secs: env_positive_or(
                "SWEEP_INTERVAL_SECS",
                DEFAULT_SWEEP_INTERVAL_SECS,
            ),
            sweep_grace_secs: env::var("SWEEP_GRACE_SECS")
                .ok()
                .and_then(|raw| raw.trim().parse().ok())
                .unwrap_or(DEFAULT_SWEEP_GRACE_SECS),
            signed_url_ttl_secs: env_positive_or(
                "SIGNED_URL_TTL_SECS",
                DEFAULT_SIGNED_URL_TTL_SECS,
            ),
        }
    }

    /// Interval between orphan sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Minimum blob age before the sweeper may delete it.
    pub fn sweep_grace(&self) -> Duration {
        Duration::from_secs(self.sweep_grace_secs)
    }

    /// Lifetime of signed blob URLs.
    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }
}
