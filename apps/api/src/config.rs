//! # API Configuration
//!
//! ## Load Order (later overrides earlier)
//! 1. Default values
//! 2. Config file (`flashmart.toml`, or the path in `FLASHMART_CONFIG`)
//! 3. Environment variables (`FLASHMART_*`)
//!
//! ## Example `flashmart.toml`
//! ```toml
//! [server]
//! bind = "0.0.0.0"
//! port = 5000
//!
//! [database]
//! path = "./flashmart.db"
//!
//! [auth]
//! jwt_secret = "change-me"
//!
//! [mail]
//! mode = "http"
//! relay_url = "http://localhost:8025/send"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Secret used when nothing else is configured. Startup warns when it is in use.
pub const DEV_JWT_SECRET: &str = "flashmart-dev-secret-change-in-production";

/// Top-level API configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(default)]
    pub mail: MailSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Interface to listen on.
    pub bind: String,

    pub port: u16,

    /// Origins allowed by CORS. Empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5000,
            allowed_origins: Vec::new(),
        }
    }
}

impl ServerSettings {
    /// `bind:port`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file path.
    pub path: PathBuf,

    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./flashmart.db"),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HS256 signing secret shared with the identity service.
    pub jwt_secret: String,

    /// Expected `iss` claim, when set.
    pub issuer: Option<String>,

    /// Lifetime of tokens minted by `mint-token`.
    pub token_lifetime_secs: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            issuer: None,
            token_lifetime_secs: 7 * 24 * 3600,
        }
    }
}

/// Which mailer delivers outbox entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailMode {
    /// Write emails to the log only.
    #[default]
    Log,
    /// POST emails to an HTTP relay.
    Http,
}

impl std::str::FromStr for MailMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "log" => Ok(MailMode::Log),
            "http" => Ok(MailMode::Http),
            _ => Err(ConfigError::InvalidValue(format!("mail mode '{}'", s))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub mode: MailMode,

    /// Relay endpoint for [`MailMode::Http`].
    pub relay_url: Option<String>,

    pub from_address: String,

    /// Fallback poll in case a wake-up was missed.
    pub poll_interval_secs: u64,

    pub batch_size: u32,

    /// Entries that failed this many times are abandoned.
    pub max_attempts: u32,

    /// Relay request timeout.
    pub timeout_secs: u64,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            mode: MailMode::Log,
            relay_url: None,
            from_address: "orders@flashmart.local".to_string(),
            poll_interval_secs: 30,
            batch_size: 20,
            max_attempts: 5,
            timeout_secs: 10,
        }
    }
}

impl MailSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ApiConfig {
    /// Loads configuration from file, environment, and defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = config_path
            .or_else(|| std::env::var("FLASHMART_CONFIG").ok().map(PathBuf::from))
            .or_else(Self::default_config_path);

        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.len() < 16 {
            return Err(ConfigError::InvalidValue(
                "jwt_secret must be at least 16 characters".into(),
            ));
        }
        if self.auth.jwt_secret == DEV_JWT_SECRET {
            warn!("Using the development JWT secret; set FLASHMART_JWT_SECRET in production");
        }

        if self.mail.mode == MailMode::Http {
            match self.mail.relay_url.as_deref() {
                None => return Err(ConfigError::MissingRequired("mail.relay_url".into())),
                Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                    return Err(ConfigError::InvalidValue(format!(
                        "mail.relay_url must start with http:// or https://, got: {}",
                        url
                    )));
                }
                Some(_) => {}
            }
        }

        if self.mail.batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "mail.batch_size must be greater than 0".into(),
            ));
        }
        if self.mail.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "mail.max_attempts must be greater than 0".into(),
            ));
        }
        if self.mail.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "mail.poll_interval_secs must be greater than 0".into(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(port) = std::env::var("FLASHMART_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidValue("FLASHMART_PORT".to_string()))?;
            debug!(port = self.server.port, "Overriding port from environment");
        }

        if let Ok(bind) = std::env::var("FLASHMART_BIND") {
            self.server.bind = bind;
        }

        if let Ok(path) = std::env::var("FLASHMART_DATABASE") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(secret) = std::env::var("FLASHMART_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }

        if let Ok(mode) = std::env::var("FLASHMART_MAIL_MODE") {
            self.mail.mode = mode.parse()?;
        }

        if let Ok(url) = std::env::var("FLASHMART_MAIL_RELAY_URL") {
            self.mail.relay_url = Some(url);
        }

        Ok(())
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "flashmart", "flashmart")
            .map(|dirs| dirs.config_dir().join("flashmart.toml"))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ApiConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.mail.mode, MailMode::Log);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ApiConfig = toml::from_str(
            r#"
            [server]
            bind = "127.0.0.1"
            port = 8080

            [mail]
            mode = "http"
            relay_url = "http://localhost:8025/send"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.mail.mode, MailMode::Http);
        assert_eq!(config.mail.max_attempts, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_mail_requires_relay_url() {
        let mut config = ApiConfig::default();
        config.mail.mode = MailMode::Http;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));

        config.mail.relay_url = Some("smtp://relay".into());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        config.mail.relay_url = Some("https://relay.example.com/send".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = ApiConfig::default();
        config.auth.jwt_secret = "short".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mail_mode_parse() {
        assert_eq!("HTTP".parse::<MailMode>().unwrap(), MailMode::Http);
        assert!("smtp".parse::<MailMode>().is_err());
    }
}
