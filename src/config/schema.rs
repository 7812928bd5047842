use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory under the home directory holding `config.toml`.
pub const CONFIG_DIR: &str = ".reasoner-console";

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Base URL of the console backend.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_backend_url() -> String {
    "http://localhost:3001".into()
}

// ── Transport ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Whole-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

// ── Notifications ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// How long a dismissed notification lingers before it is removed.
    #[serde(default = "default_dismiss_delay_ms")]
    pub dismiss_delay_ms: u64,
}

fn default_dismiss_delay_ms() -> u64 {
    500
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            dismiss_delay_ms: default_dismiss_delay_ms(),
        }
    }
}

impl NotificationConfig {
    pub fn dismiss_delay(&self) -> Duration {
        Duration::from_millis(self.dismiss_delay_ms)
    }
}

// ── Auth ──────────────────────────────────────────────────────────

/// Tokens used to open sessions at the start of a CLI invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub policy_token: Option<String>,
    pub deliberation_token: Option<String>,
}

// ── Observability ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// "error" | "warn" | "info" | "debug" | "trace"
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ── Config impl ──────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());

        Self {
            config_path: home.join(CONFIG_DIR).join("config.toml"),
            backend_url: default_backend_url(),
            transport: TransportConfig::default(),
            notifications: NotificationConfig::default(),
            auth: AuthConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        Self::load_or_init_in(&home.join(CONFIG_DIR))
    }

    /// Load `config.toml` from `dir`, writing defaults there first if it
    /// does not exist yet.
    pub fn load_or_init_in(dir: &Path) -> Result<Self> {
        let config_path = dir.join("config.toml");

        if !dir.exists() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path.clone_from(&config_path);
            config.validate()?;
            Ok(config)
        } else {
            let config = Self {
                config_path,
                ..Self::default()
            };
            config.validate()?;
            config.save()?;
            Ok(config)
        }
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("REASONER_CONSOLE_BACKEND_URL") {
            if !url.is_empty() {
                self.backend_url = url;
            }
        }

        if let Ok(token) = std::env::var("REASONER_CONSOLE_POLICY_TOKEN") {
            if !token.is_empty() {
                self.auth.policy_token = Some(token);
            }
        }

        if let Ok(token) = std::env::var("REASONER_CONSOLE_DELIBERATION_TOKEN") {
            if !token.is_empty() {
                self.auth.deliberation_token = Some(token);
            }
        }

        if let Ok(level) = std::env::var("REASONER_CONSOLE_LOG_LEVEL") {
            if !level.is_empty() {
                self.observability.log_level = level;
            }
        }

        if let Ok(secs) = std::env::var("REASONER_CONSOLE_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                self.transport.timeout_secs = secs;
            }
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let url = url::Url::parse(&self.backend_url).map_err(|err| {
            ConfigError::Validation(format!("backend_url '{}': {err}", self.backend_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "backend_url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.transport.timeout_secs == 0 || self.transport.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "transport timeouts must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Credential configured for `resource`, if any.
    pub fn token_for(&self, resource: crate::session::Resource) -> Option<&str> {
        let token = match resource {
            crate::session::Resource::Policy => self.auth.policy_token.as_deref(),
            crate::session::Resource::Deliberation => self.auth.deliberation_token.as_deref(),
        };
        token.filter(|token| !token.trim().is_empty())
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }
}
