//! Client settings.
//!
//! Layered lowest to highest: built-in defaults, an optional settings file
//! (`gymlog.toml` / `gymlog.json` in the working directory, or an explicit
//! path), then `GYMLOG_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use url::Url;

/// Prefix of the environment variables read by [`ClientSettings::load`].
pub const ENV_PREFIX: &str = "GYMLOG";

const DEFAULT_BASE_URL: &str = "http://localhost:3333";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_USER_AGENT: &str = concat!("Gymlog/", env!("CARGO_PKG_VERSION"));

/// Errors raised while loading settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// A source could not be read or did not match the expected shape.
    #[error("failed to load settings: {0}")]
    Config(#[from] ConfigError),

    /// A value was read but is not usable.
    #[error("invalid setting {key}: {reason}")]
    Invalid {
        /// Setting name.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Everything the client needs to reach the backend and keep a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Backend root; request paths are appended to it.
    pub base_url: Url,
    /// Default deadline for ordinary requests.
    pub request_timeout_ms: u64,
    /// Deadline for the token refresh exchange.
    pub refresh_timeout_ms: u64,
    /// Directory holding `auth_token.json` and `user.json`.
    pub data_dir: PathBuf,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
}

impl ClientSettings {
    /// Loads settings from defaults, the settings file and the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `file` is given but unreadable, or if any source
    /// holds a malformed value.
    pub fn load(file: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_with_env(file, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(file: Option<&Path>, env: Environment) -> Result<Self, SettingsError> {
        let file_source = file.map_or_else(
            || File::with_name("gymlog").required(false),
            |path| File::from(path).required(true),
        );

        let settings: Self = Config::builder()
            .set_default("base_url", DEFAULT_BASE_URL)?
            .set_default("request_timeout_ms", DEFAULT_REQUEST_TIMEOUT_MS)?
            .set_default("refresh_timeout_ms", DEFAULT_REFRESH_TIMEOUT_MS)?
            .set_default("data_dir", default_data_dir().to_string_lossy().into_owned())?
            .set_default("user_agent", DEFAULT_USER_AGENT)?
            .add_source(file_source)
            .add_source(env)
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if !matches!(self.base_url.scheme(), "http" | "https") {
            return Err(SettingsError::Invalid {
                key: "base_url",
                reason: format!("unsupported scheme {}", self.base_url.scheme()),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(SettingsError::Invalid {
                key: "request_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.refresh_timeout_ms == 0 {
            return Err(SettingsError::Invalid {
                key: "refresh_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Default deadline for ordinary requests.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Deadline for the refresh exchange.
    #[must_use]
    pub const fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gymlog")
}
