use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration
};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::poll::PollOptions;

/// Environment variable overriding the poll budget in milliseconds
pub const POLL_TIMEOUT_ENV: &str = "ISSUANCE_SYNC_POLL_TIMEOUT_MS";
/// Environment variable overriding the poll cadence in milliseconds
pub const POLL_INTERVAL_ENV: &str = "ISSUANCE_SYNC_POLL_INTERVAL_MS";

/// Poll budget and cadence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub timeout_ms:  u64,
    pub interval_ms: u64
}

impl Default for PollSettings {
    fn default() -> Self {
        Self { timeout_ms: 60_000, interval_ms: 500 }
    }
}

impl PollSettings {
    pub fn options(&self) -> PollOptions {
        PollOptions::new(Duration::from_millis(self.timeout_ms), Duration::from_millis(self.interval_ms))
    }
}

/// Connection details of one party's cloud agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSettings {
    pub base_url:           String,
    #[serde(default)]
    pub api_key:            Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Host under which the agent reaches its own services, e.g. `host.docker.internal`
    /// when it runs in a container while `base_url` points at `localhost`
    #[serde(default)]
    pub internal_host:      Option<String>
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl AgentSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url:           base_url.into(),
            api_key:            None,
            request_timeout_ms: default_request_timeout_ms(),
            internal_host:      None
        }
    }
}

/// Configuration structure for issuance-sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub poll:   PollSettings,
    pub issuer: Option<AgentSettings>,
    pub holder: Option<AgentSettings>
}

/// Get the project directories for cross-platform config path resolution
pub fn get_project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "issuance-sync").context("Failed to determine project directories")
}

/// Get the default config file path
pub fn get_config_file_path() -> Result<PathBuf> {
    Ok(get_project_dirs()?.config_dir().join("config.yaml"))
}

impl AppConfig {
    /// Load configuration from `path`, or from the default location when `None`
    ///
    /// An explicit path must exist. A missing default file yields the defaults.
    /// Environment overrides are applied last, then the result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::read(path)?,
            None => {
                let default_path = get_config_file_path()?;
                if default_path.exists() { Self::read(&default_path)? } else { Self::default() }
            }
        };

        let config = config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply poll overrides read through `lookup`
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>
    {
        if let Some(value) = lookup(POLL_TIMEOUT_ENV) {
            self.poll.timeout_ms =
                value.trim().parse().with_context(|| format!("{} must be a number of milliseconds", POLL_TIMEOUT_ENV))?;
        }
        if let Some(value) = lookup(POLL_INTERVAL_ENV) {
            self.poll.interval_ms =
                value.trim().parse().with_context(|| format!("{} must be a number of milliseconds", POLL_INTERVAL_ENV))?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll.interval_ms == 0 {
            anyhow::bail!("poll interval must be greater than zero");
        }
        if self.poll.interval_ms > self.poll.timeout_ms {
            anyhow::bail!(
                "poll interval ({}ms) must not exceed the poll timeout ({}ms)",
                self.poll.interval_ms,
                self.poll.timeout_ms
            );
        }
        for settings in [&self.issuer, &self.holder].into_iter().flatten() {
            if !settings.base_url.starts_with("http://") && !settings.base_url.starts_with("https://") {
                anyhow::bail!("agent base url must be http(s): {}", settings.base_url);
            }
        }
        Ok(())
    }
}
