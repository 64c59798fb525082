//! ---
//! sds_section: "01-core-functionality"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Shared primitives and utilities for the simulator runtime."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;
use url::Url;

use crate::logging::LogFormat;

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_owned()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_user_agent() -> String {
    concat!("sds/", env!("CARGO_PKG_VERSION")).to_owned()
}

fn default_debounce_window() -> Duration {
    Duration::from_millis(1000)
}

fn default_transition_window() -> Duration {
    Duration::from_secs(5)
}

fn default_transition_steps() -> u32 {
    5
}

fn default_announce_stop() -> bool {
    true
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Primary configuration object for the simulator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "SDS_CONFIG";

    /// Load configuration from disk, respecting the `SDS_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Parse and validate a configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.backend.validate()?;
        self.session.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Path pattern selecting the simulated movement of the agent.
///
/// The backend identifies patterns by number, see [`PathPattern::id`].
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PathPattern {
    #[default]
    #[serde(rename = "lateral", alias = "lateral-zigzag")]
    LateralZigzag,
    #[serde(rename = "vertical", alias = "vertical-zigzag")]
    VerticalZigzag,
}

impl PathPattern {
    /// Numeric identifier sent on the wire.
    pub fn id(&self) -> u8 {
        match self {
            PathPattern::LateralZigzag => 1,
            PathPattern::VerticalZigzag => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PathPattern::LateralZigzag => "Lateral zigzag route",
            PathPattern::VerticalZigzag => "Vertical zigzag route",
        }
    }
}

/// Raised when a numeric or textual path pattern is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown path pattern: {0}")]
pub struct UnknownPathPattern(pub String);

impl TryFrom<u8> for PathPattern {
    type Error = UnknownPathPattern;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PathPattern::LateralZigzag),
            2 => Ok(PathPattern::VerticalZigzag),
            other => Err(UnknownPathPattern(other.to_string())),
        }
    }
}

impl std::str::FromStr for PathPattern {
    type Err = UnknownPathPattern;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lateral" | "lateral-zigzag" | "1" => Ok(PathPattern::LateralZigzag),
            "vertical" | "vertical-zigzag" | "2" => Ok(PathPattern::VerticalZigzag),
            other => Err(UnknownPathPattern(other.to_owned())),
        }
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathPattern::LateralZigzag => f.write_str("lateral"),
            PathPattern::VerticalZigzag => f.write_str("vertical"),
        }
    }
}

/// Collaborator backend that receives telemetry.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl BackendConfig {
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("backend base_url '{}' is not a valid URL", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "backend base_url must use http or https, found '{}'",
                url.scheme()
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(anyhow!("backend request_timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// Emission scheduling parameters.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_debounce_window", rename = "debounce_window_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub debounce_window: Duration,
    #[serde(default = "default_transition_window")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub transition_window: Duration,
    #[serde(default = "default_transition_steps")]
    pub transition_steps: u32,
    #[serde(default)]
    pub default_mode: PathPattern,
    #[serde(default = "default_announce_stop")]
    pub announce_stop: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce_window: default_debounce_window(),
            transition_window: default_transition_window(),
            transition_steps: default_transition_steps(),
            default_mode: PathPattern::default(),
            announce_stop: default_announce_stop(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.debounce_window.is_zero() {
            return Err(anyhow!("session debounce_window_ms must be greater than zero"));
        }
        if self.transition_steps == 0 {
            return Err(anyhow!("session transition_steps must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file: bool,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file: false,
            file_prefix: None,
        }
    }
}
