//! Stream Client Configuration
//!
//! Credentials, environment selection, and connection tuning for the
//! streaming clients, loaded from environment variables.

use std::time::Duration;

// =============================================================================
// Environment & Feed
// =============================================================================

/// Trading environment (paper vs live).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Paper trading environment (simulated).
    #[default]
    Paper,
    /// Live trading environment (real money).
    Live,
}

impl Environment {
    /// Parse environment from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "LIVE" => Self::Live,
            _ => Self::Paper,
        }
    }

    /// Check if this is the live environment.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Get the environment name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::Live => "live",
        }
    }
}

/// Market data feed type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataFeed {
    /// SIP (Securities Information Processor) - Full market data.
    #[default]
    Sip,
    /// IEX (Investors Exchange) - Free tier with limited data.
    Iex,
}

impl DataFeed {
    /// Parse feed type from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "iex" => Self::Iex,
            _ => Self::Sip,
        }
    }

    /// Get the feed name for WebSocket URLs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sip => "sip",
            Self::Iex => "iex",
        }
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Opaque marker written over secret material once it is no longer needed.
pub const REDACTED: &str = "<redacted>";

/// Alpaca API credentials.
///
/// The `Debug` implementation redacts the secret so connection state can be
/// logged without leaking key material.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    key: String,
    secret: String,
}

impl Credentials {
    /// Create new credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if either key or secret is empty.
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        let secret = secret.into();

        if key.is_empty() {
            return Err(ConfigError::EmptyValue("key".to_string()));
        }
        if secret.is_empty() {
            return Err(ConfigError::EmptyValue("secret".to_string()));
        }

        Ok(Self { key, secret })
    }

    /// Create credentials from environment variables.
    ///
    /// Reads `ALPACA_KEY` and `ALPACA_SECRET`.
    ///
    /// # Errors
    ///
    /// Returns an error if either variable is unset or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let key = std::env::var("ALPACA_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("ALPACA_KEY".to_string()))?;
        let secret = std::env::var("ALPACA_SECRET")
            .map_err(|_| ConfigError::MissingEnvVar("ALPACA_SECRET".to_string()))?;

        Self::new(key, secret)
    }

    /// Credentials whose key and secret have been overwritten with the
    /// opaque marker. Used to scrub live connection state after a
    /// successful authentication.
    #[must_use]
    pub fn redacted() -> Self {
        Self {
            key: REDACTED.to_string(),
            secret: REDACTED.to_string(),
        }
    }

    /// Check whether this copy has been scrubbed.
    #[must_use]
    pub fn is_redacted(&self) -> bool {
        self.key == REDACTED || self.secret == REDACTED
    }

    /// Get the API key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the API secret.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &REDACTED)
            .finish()
    }
}

impl std::fmt::Display for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credentials(key={})", self.key)
    }
}

// =============================================================================
// Stream Settings
// =============================================================================

/// Connection tuning for a streaming client.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay (before jitter).
    pub reconnect_delay_max: Duration,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// Interval between client ping frames.
    pub ping_interval: Duration,
    /// Maximum silence from the server before the connection is
    /// considered dead.
    pub ping_timeout: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            max_reconnect_attempts: 0, // Unlimited
            ping_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(60),
        }
    }
}

impl StreamSettings {
    /// Load settings from environment variables, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            reconnect_delay_initial: parse_env_duration_millis(
                "ALPACA_STREAM_RECONNECT_DELAY_INITIAL_MS",
                defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "ALPACA_STREAM_RECONNECT_DELAY_MAX_SECS",
                defaults.reconnect_delay_max,
            ),
            max_reconnect_attempts: parse_env_u32(
                "ALPACA_STREAM_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
            ping_interval: parse_env_duration_secs(
                "ALPACA_STREAM_PING_INTERVAL_SECS",
                defaults.ping_interval,
            ),
            ping_timeout: parse_env_duration_secs(
                "ALPACA_STREAM_PING_TIMEOUT_SECS",
                defaults.ping_timeout,
            ),
        }
    }
}

// =============================================================================
// Stream Config
// =============================================================================

/// Complete configuration for a streaming client.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// API credentials (source of truth; connections take copies).
    pub credentials: Credentials,
    /// Trading environment.
    pub environment: Environment,
    /// Market data feed type.
    pub feed: DataFeed,
    /// Connection tuning.
    pub settings: StreamSettings,
    /// Explicit endpoint override (used by tests and proxies).
    pub url_override: Option<String>,
}

impl StreamConfig {
    /// Create a configuration with default settings (paper, SIP feed).
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            environment: Environment::default(),
            feed: DataFeed::default(),
            settings: StreamSettings::default(),
            url_override: None,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Loads a `.env` file if present, then reads `ALPACA_KEY`,
    /// `ALPACA_SECRET`, `ALPACA_ENV`, `ALPACA_FEED` and the
    /// `ALPACA_STREAM_*` tuning variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required credentials are missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is not an error.
        let _ = dotenvy::dotenv();

        let credentials = Credentials::from_env()?;

        let environment = std::env::var("ALPACA_ENV")
            .map(|s| Environment::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let feed = std::env::var("ALPACA_FEED")
            .map(|s| DataFeed::from_str_case_insensitive(&s))
            .unwrap_or_default();

        Ok(Self {
            credentials,
            environment,
            feed,
            settings: StreamSettings::from_env(),
            url_override: None,
        })
    }

    /// Override the WebSocket endpoint.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url_override = Some(url.into());
        self
    }

    /// Replace the connection tuning.
    #[must_use]
    pub fn with_settings(mut self, settings: StreamSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Select the trading environment.
    #[must_use]
    pub const fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Select the market data feed.
    #[must_use]
    pub const fn with_feed(mut self, feed: DataFeed) -> Self {
        self.feed = feed;
        self
    }

    /// Get the market data stream WebSocket URL.
    ///
    /// Market data streams always use production URLs; paper vs live only
    /// affects the trading API.
    #[must_use]
    pub fn market_data_url(&self) -> String {
        self.url_override.clone().unwrap_or_else(|| {
            format!("wss://stream.data.alpaca.markets/v2/{}", self.feed.as_str())
        })
    }

    /// Get the order updates (trade events) WebSocket URL.
    #[must_use]
    pub fn order_updates_url(&self) -> String {
        self.url_override.clone().unwrap_or_else(|| {
            if self.environment.is_live() {
                "wss://api.alpaca.markets/stream".to_string()
            } else {
                "wss://paper-api.alpaca.markets/stream".to_string()
            }
        })
    }
}

// =============================================================================
// Errors & Helpers
// =============================================================================

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Configuration value is empty.
    #[error("configuration value {0} cannot be empty")]
    EmptyValue(String),
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
