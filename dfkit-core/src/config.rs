//! Configuration management

use crate::error::{DfError, DfResult, ErrorContext};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Environment the application runs in.
///
/// Deserialized through [`FromStr`], so configuration files and environment
/// variables accept the same spellings as the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum AppEnvironment {
    #[default]
    Development,
    Testing,
    Production,
}

impl AppEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, AppEnvironment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppEnvironment::Development => "development",
            AppEnvironment::Testing => "testing",
            AppEnvironment::Production => "production",
        }
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppEnvironment {
    type Err = DfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(AppEnvironment::Development),
            "testing" | "test" => Ok(AppEnvironment::Testing),
            "production" | "prod" => Ok(AppEnvironment::Production),
            other => Err(crate::validation_error!(
                format!("Unknown application environment '{}'", other),
                "environment",
                "config"
            )),
        }
    }
}

impl TryFrom<String> for AppEnvironment {
    type Error = DfError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Session cookie and storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session id
    pub cookie_name: String,
    /// Idle time after which a session expires
    pub ttl_secs: u64,
    /// How often expired sessions are purged
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "dfkit_session".to_string(),
            ttl_secs: 24 * 60 * 60,
            cleanup_interval_secs: 3600,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DfConfig {
    pub environment: AppEnvironment,
    /// Absolute site URL, e.g. `https://example.com`. Derived from the request
    /// host when unset.
    pub base_url: Option<String>,
    /// Treat `X-Forwarded-Proto: https` as a secure request
    pub trust_forwarded_proto: bool,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

impl DfConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> DfResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DfError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> DfResult<Self> {
        let config: DfConfig = toml::from_str(content).map_err(|e| DfError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Render as pretty TOML
    pub fn to_toml(&self) -> DfResult<String> {
        toml::to_string_pretty(self).map_err(|e| DfError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> DfResult<()> {
        let content = self.to_toml()?;

        std::fs::write(path, content).map_err(|e| DfError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> DfResult<()> {
        if let Some(base_url) = &self.base_url {
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                return Err(DfError::Config {
                    message: format!("base_url must be an absolute http(s) URL: {}", base_url),
                    source: None,
                    context: ErrorContext::new("config")
                        .with_operation("validate")
                        .with_suggestion("Set base_url to e.g. \"https://example.com\""),
                });
            }
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(DfError::Config {
                message: "session.cookie_name must not be empty".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set session.cookie_name to a cookie-safe token"),
            });
        }

        if self.session.ttl_secs == 0 {
            return Err(DfError::Config {
                message: "session.ttl_secs must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set session.ttl_secs to a positive value"),
            });
        }

        if self.session.cleanup_interval_secs == 0 {
            return Err(DfError::Config {
                message: "session.cleanup_interval_secs must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config").with_operation("validate"),
            });
        }

        Ok(())
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref().map(|url| url.trim_end_matches('/'))
    }
}
