//! Configuration loading and management.
//!
//! Loads relay configuration from `./config.toml` (or `$WA_RELAY_CONFIG_PATH`).
//! Environment variables override file values; file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

// ── Top-level config ────────────────────────────────────────────

/// Top-level relay configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// HTTP server settings (`[server]`).
    pub server: ServerConfig,
    /// WhatsApp bridge settings (`[bridge]`).
    pub bridge: BridgeConfig,
    /// Webhook consumer settings (`[webhook]`).
    pub webhook: WebhookConfig,
    /// Logging settings (`[logging]`).
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// Config file path: `$WA_RELAY_CONFIG_PATH` or `./config.toml`.
    /// If the file does not exist, returns defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from TOML file only, no env overrides.
    fn load_from_file() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .with_context(|| format!("invalid config file {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config file {}: {e}",
                path.display()
            )),
        }
    }

    /// Resolve config path using a custom env resolver (for testing).
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env("WA_RELAY_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids unsafe `set_var` in tests).
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        // Server.
        if let Some(v) = env("WA_RELAY_LISTEN") {
            self.server.listen = v;
        }
        if let Some(v) = env("WA_RELAY_MAX_UPLOAD_BYTES") {
            match v.parse() {
                Ok(n) => self.server.max_upload_bytes = n,
                Err(_) => tracing::warn!(
                    var = "WA_RELAY_MAX_UPLOAD_BYTES",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }

        // Bridge.
        if let Some(v) = env("WA_RELAY_BRIDGE_URL") {
            self.bridge.base_url = v;
        }

        // Webhook.
        if let Some(v) = env("WA_RELAY_WEBHOOK_URL") {
            self.webhook.url = v;
        }

        // Logging.
        if let Some(v) = env("WA_RELAY_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = env("WA_RELAY_LOGS_DIR") {
            self.logging.logs_dir = Some(PathBuf::from(v));
        }
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or has wrongly typed values.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: RelayConfig = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }
}

// ── Server config ───────────────────────────────────────────────

/// Default request body limit (64 MiB).
const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the relay sender listens on.
    pub listen: String,
    /// Maximum request body size, bounding uploaded files.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3000".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

// ── Bridge config ───────────────────────────────────────────────

/// WhatsApp bridge settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Bridge base URL.
    pub base_url: String,
    /// Long-poll timeout for the event stream in seconds.
    pub poll_timeout_seconds: u64,
    /// Buffer size of the event channel between listener and dispatch loop.
    pub channel_buffer_size: usize,
}

impl BridgeConfig {
    /// Long-poll timeout, never shorter than one second.
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_seconds.max(1))
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3001".to_string(),
            poll_timeout_seconds: 60,
            channel_buffer_size: 100,
        }
    }
}

// ── Webhook config ──────────────────────────────────────────────

/// Webhook consumer settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// URL every normalized record is POSTed to.
    pub url: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5000/webhook".to_string(),
        }
    }
}

// ── Logging config ──────────────────────────────────────────────

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for rotated JSON log files; console only when unset.
    pub logs_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            logs_dir: None,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────
