//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub bot: BotConfig,
    pub media: MediaConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "bridge.example.com" or "localhost:8080")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the bridge
    ///
    /// # Returns
    /// Full URL like "https://bridge.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Telegram bot configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Bot API token from @BotFather
    pub token: String,
    /// Long-poll timeout in seconds for getUpdates
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
    /// Optional channel every inbound media message is forwarded to
    /// for auditing. Disabled when unset or 0.
    #[serde(default)]
    pub log_channel_id: i64,
    /// Bot API endpoint, overridable for tests
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

/// Capability addressing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Number of URL-safe characters in a capability token.
    ///
    /// Longer tokens resist brute-force enumeration better; this is a
    /// deployment security parameter, not a tuning knob.
    #[serde(default = "default_hash_length")]
    pub hash_length: usize,
}

fn default_hash_length() -> usize {
    8
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (WEBBRIDGE_*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.domain", "localhost:8080")?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "webbridge.db")?
            .set_default("bot.poll_timeout_seconds", 30)?
            .set_default("bot.log_channel_id", 0)?
            .set_default("bot.api_base", "https://api.telegram.org")?
            .set_default("media.hash_length", 8)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (WEBBRIDGE_*)
            .add_source(
                Environment::with_prefix("WEBBRIDGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_HASH_LENGTH: usize = 6;
        // A SHA-256 digest base64-encodes to 43 URL-safe characters.
        const MAX_HASH_LENGTH: usize = 43;

        if self.bot.token.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "bot.token must be set".to_string(),
            ));
        }

        if self.media.hash_length < MIN_HASH_LENGTH {
            return Err(crate::error::AppError::Config(format!(
                "media.hash_length must be at least {} characters",
                MIN_HASH_LENGTH
            )));
        }

        if self.media.hash_length > MAX_HASH_LENGTH {
            return Err(crate::error::AppError::Config(format!(
                "media.hash_length must be at most {} characters",
                MAX_HASH_LENGTH
            )));
        }

        if !is_local_server_domain(&self.server.domain)
            && !self.server.protocol.eq_ignore_ascii_case("https")
        {
            tracing::warn!(
                domain = %self.server.domain,
                "Serving a non-local domain over http; capability URLs will not be protected in transit"
            );
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

/// Whether a host resolves to the local machine (loopback or unspecified).
///
/// Loopback capability URLs are unreachable from a remote browser, so the
/// bridge skips clickable buttons and proxy wrapping for them.
pub fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
