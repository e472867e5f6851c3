//! TOML configuration for the checksuite daemon -- sectioned defaults with
//! environment variable override for the config file path.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::ExecOptions;

/// Root configuration for the daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub executor: ExecutorConfig,
    pub scheduler: SchedulerConfig,
    pub alerts: AlertConfig,
    pub reports: ReportConfig,
    pub artifacts: ArtifactConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Try to load configuration from, in order:
    /// 1. The path in the `CHECKSUITE_CONFIG` environment variable.
    /// 2. `checksuite.toml` in the working directory.
    /// 3. `/etc/checksuite/checksuite.toml`.
    /// 4. Compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var("CHECKSUITE_CONFIG") {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        "CHECKSUITE_CONFIG set but file could not be loaded, trying fallback: {e}"
                    );
                }
            }
        }

        for candidate in ["checksuite.toml", "/etc/checksuite/checksuite.toml"] {
            let path = Path::new(candidate);
            if path.exists() {
                match Self::load(path) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        warn!(path = %path.display(), "Config file exists but could not be loaded: {e}");
                    }
                }
            }
        }

        debug!("No config file found, using compiled-in defaults");
        Self::default()
    }

    /// Executor knobs in the form the engine consumes.
    pub fn exec_options(&self) -> ExecOptions {
        ExecOptions {
            headless: self.executor.headless,
            page_timeout: Duration::from_secs(self.executor.timeouts.page_load_seconds),
            api_timeout: Duration::from_secs(self.executor.timeouts.api_request_seconds),
        }
    }
}

/// HTTP API listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// SQLite database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/checksuite.db".to_string(),
        }
    }
}

/// Defaults forwarded to check executors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Whether UI checks run without a visible browser window.
    pub headless: bool,
    pub timeouts: TimeoutConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeouts: TimeoutConfig::default(),
        }
    }
}

/// Per-check timeout budget, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub page_load_seconds: u64,
    pub api_request_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            page_load_seconds: 90,
            api_request_seconds: 15,
        }
    }
}

/// Recurring full-catalog run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Six-field cron expression (with seconds). Default fires nightly at
    /// 22:00.
    pub cron: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: "0 0 22 * * *".to_string(),
        }
    }
}

/// Alert delivery configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// When set, alerts are also POSTed to this URL as JSON.
    pub webhook_url: Option<String>,
}

/// Where generated reports land.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir: "test-output/reports".to_string(),
        }
    }
}

/// Where per-case artifacts (request/response captures, page snapshots)
/// land.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub dir: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: "artifacts".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
