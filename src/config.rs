//! TOML configuration for txnsentinel.
//!
//! Layered lookup: an explicit path, then the `TXNSENTINEL_CONFIG`
//! environment variable, then the standard system location, then
//! compiled-in defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::detect::{MonitoringWindow, PolicyTable};

pub const CONFIG_ENV_VAR: &str = "TXNSENTINEL_CONFIG";
pub const SYSTEM_CONFIG_PATH: &str = "/etc/txnsentinel/txnsentinel.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentinelConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub policy: PolicyTable,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SentinelConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded txnsentinel configuration");
        Ok(config)
    }

    /// Resolve configuration for the CLI. An explicit path must load; the
    /// environment and system locations fall through to defaults on error.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => Ok(Self::load_or_default()),
        }
    }

    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "TXNSENTINEL_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP API listens on.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Monitoring REST backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    /// Sent as a bearer token when present.
    pub api_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000/api".to_string(),
            api_token: None,
            timeout_secs: 10,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub windows: Vec<MonitoringWindow>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            windows: MonitoringWindow::ALL.to_vec(),
        }
    }
}

impl PollingConfig {
    /// Poll interval, never shorter than one second.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = SentinelConfig::default();
        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
        assert_eq!(cfg.source.base_url, "http://127.0.0.1:3000/api");
        assert!(cfg.source.api_token.is_none());
        assert_eq!(cfg.source.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.polling.interval(), Duration::from_secs(60));
        assert_eq!(
            cfg.polling.windows,
            vec![MonitoringWindow::Interval8h, MonitoringWindow::Hourly48h]
        );
        assert_eq!(cfg.policy.pending_multiplier_8h, 7.0);
        assert_eq!(cfg.policy.pending_multiplier_48h, 6.5);
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[server]
bind = "127.0.0.1:9090"

[source]
base_url = "https://gw.example.com/api"
api_token = "secret"
timeout_secs = 3

[polling]
interval_secs = 30
windows = ["hourly48h"]

[policy]
noise_floor = 5.0
pending_multiplier_8h = 6.5
failed_multiplier = 2.2

[logging]
level = "debug"
json = true
"#;

        let cfg: SentinelConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:9090");
        assert_eq!(cfg.source.api_token.as_deref(), Some("secret"));
        assert_eq!(cfg.source.timeout_secs, 3);
        assert_eq!(cfg.polling.interval_secs, 30);
        assert_eq!(cfg.polling.windows, vec![MonitoringWindow::Hourly48h]);
        assert_eq!(cfg.policy.noise_floor, 5.0);
        assert_eq!(cfg.policy.pending_multiplier_8h, 6.5);
        assert_eq!(cfg.policy.pending_multiplier_48h, 6.5);
        assert_eq!(cfg.policy.failed_multiplier, 2.2);
        assert_eq!(cfg.policy.success_multiplier_low_volume, 3.2);
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let cfg: SentinelConfig = toml::from_str("").unwrap();
        let defaults = SentinelConfig::default();
        assert_eq!(cfg.server.bind, defaults.server.bind);
        assert_eq!(cfg.policy, defaults.policy);
        assert_eq!(cfg.polling.windows, defaults.polling.windows);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let cfg: SentinelConfig = toml::from_str("[polling]\ninterval_secs = 0").unwrap();
        assert_eq!(cfg.polling.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let cfg: SentinelConfig = toml::from_str("[source]\ntimeout_secs = 0").unwrap();
        assert_eq!(cfg.source.timeout_secs, 0);
        assert_eq!(cfg.source.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("txnsentinel.toml");
        std::fs::write(&path, "[server]\nbind = \"0.0.0.0:9999\"\n").unwrap();

        let cfg = SentinelConfig::load(&path).unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:9999");
    }

    #[test]
    fn test_explicit_missing_file_errors() {
        let result = SentinelConfig::resolve(Some(Path::new("/nonexistent/txnsentinel.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let cfg = SentinelConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let back: SentinelConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.policy, cfg.policy);
        assert_eq!(back.server.bind, cfg.server.bind);
    }
}
