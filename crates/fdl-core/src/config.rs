use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::segmenter::DEFAULT_CONCURRENCY;

/// Retry budget (optional section in config.toml). Without it fragments are
/// retried forever with no delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per fragment, including the first. 0 retries forever.
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::bounded(8);
        Self {
            max_attempts: policy.max_attempts,
            base_delay_secs: policy.base_delay.as_secs_f64(),
            max_delay_secs: policy.max_delay.as_secs(),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: cfg.max_attempts,
            base_delay: Duration::try_from_secs_f64(cfg.base_delay_secs).unwrap_or(Duration::ZERO),
            max_delay: Duration::from_secs(cfg.max_delay_secs),
        }
    }
}

/// Defaults loaded from `~/.config/fdl/config.toml`. Command-line flags win.
/// Keys left out of the file keep their default values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FdlConfig {
    /// Worker threads per download.
    pub concurrency: usize,
    /// Fragment size in bytes (None = total size / concurrency).
    pub chunk_size: Option<u64>,
    /// Per-request timeout in seconds. Values below 2 become 5.
    pub timeout_secs: u64,
    /// Optional retry budget; if missing, fragments are retried forever.
    pub retry: Option<RetryConfig>,
    /// Headers added to every request.
    pub headers: BTreeMap<String, String>,
}

impl Default for FdlConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            chunk_size: None,
            timeout_secs: 5,
            retry: None,
            headers: BTreeMap::new(),
        }
    }
}

impl FdlConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetryPolicy::from)
            .unwrap_or_default()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FdlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: FdlConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = FdlConfig::default();
        assert_eq!(cfg.concurrency, 24);
        assert_eq!(cfg.chunk_size, None);
        assert_eq!(cfg.timeout_secs, 5);
        assert!(cfg.headers.is_empty());
        assert_eq!(cfg.retry_policy(), RetryPolicy::unbounded());
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut cfg = FdlConfig::default();
        cfg.headers.insert("User-Agent".into(), "fdl/0.1".into());
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: FdlConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.concurrency, cfg.concurrency);
        assert_eq!(parsed.timeout_secs, cfg.timeout_secs);
        assert_eq!(parsed.headers.get("User-Agent").map(String::as_str), Some("fdl/0.1"));
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            concurrency = 8
            chunk_size = 1_048_576
            timeout_secs = 30

            [retry]
            max_attempts = 3
            base_delay_secs = 0.5
            max_delay_secs = 15

            [headers]
            Referer = "https://example.com/"
        "#;
        let cfg: FdlConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.concurrency, 8);
        assert_eq!(cfg.chunk_size, Some(1_048_576));
        assert_eq!(cfg.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.headers["Referer"], "https://example.com/");

        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(15));
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml = r#"
            [headers]
            User-Agent = "fdl"
        "#;
        let cfg: FdlConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.concurrency, 24);
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.chunk_size, None);
        assert!(cfg.retry.is_none());
        assert_eq!(cfg.headers["User-Agent"], "fdl");

        let cfg: FdlConfig = toml::from_str("concurrency = 6").unwrap();
        assert_eq!(cfg.concurrency, 6);
        assert_eq!(cfg.timeout_secs, 5);
    }

    #[test]
    fn retry_section_enables_a_budget() {
        let cfg: FdlConfig = toml::from_str("[retry]\nmax_attempts = 4\nbase_delay_secs = 0.25\nmax_delay_secs = 30\n").unwrap();
        assert_eq!(cfg.retry_policy(), RetryPolicy::bounded(4));
    }

    #[test]
    fn negative_base_delay_becomes_zero() {
        let cfg = RetryConfig {
            max_attempts: 0,
            base_delay_secs: -1.0,
            max_delay_secs: 1,
        };
        let policy = RetryPolicy::from(&cfg);
        assert_eq!(policy.base_delay, Duration::ZERO);
        assert_eq!(policy.max_attempts, 0);
    }
}
