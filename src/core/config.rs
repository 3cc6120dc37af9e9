//! Application configuration management
//!
//! Handles loading and saving the user's settings:
//! - Per-provider HTTP credentials
//! - Default remote name
//! - Branch prefix
//!
//! Everything lives in a tool-owned directory: `$SHIPIT_HOME` when set,
//! otherwise `~/.shipit`.

use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::core::remote::Provider;
use crate::error::{Result, ShipitError};

/// Environment variable overriding the tool directory
pub const SHIPIT_HOME_ENV: &str = "SHIPIT_HOME";

const TOOL_DIR_NAME: &str = ".shipit";
const CONFIG_FILE_NAME: &str = "shipit_config.toml";
const CONFIG_HEADER: &str = "# AUTO-GENERATED FILE BY SHIPIT\n# DO NOT EDIT\n";

/// Remote name used when none is configured
pub const DEFAULT_REMOTE: &str = "origin";

/// Username/token pair stored for an HTTP provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub username: String,
    pub token: String,
}

/// Per-provider credential records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<StoredCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitbucket: Option<StoredCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitlab: Option<StoredCredentials>,
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Remote used for pull and push
    #[serde(default)]
    pub default_remote: String,

    /// Prefix prepended to branches created by `shipit run -b`
    #[serde(default)]
    pub branch_prefix: String,

    #[serde(default)]
    pub auth: AuthSection,
}

impl Config {
    /// Stored credentials for a provider, None when not configured
    pub fn provider_auth(&self, provider: Provider) -> Option<&StoredCredentials> {
        match provider {
            Provider::GitHub => self.auth.github.as_ref(),
            Provider::Bitbucket => self.auth.bitbucket.as_ref(),
            Provider::GitLab => self.auth.gitlab.as_ref(),
            Provider::Unknown => None,
        }
    }

    /// Store credentials for a provider
    pub fn set_provider_auth(&mut self, provider: Provider, creds: StoredCredentials) -> Result<()> {
        let slot = match provider {
            Provider::GitHub => &mut self.auth.github,
            Provider::Bitbucket => &mut self.auth.bitbucket,
            Provider::GitLab => &mut self.auth.gitlab,
            Provider::Unknown => {
                return Err(ShipitError::Config(
                    "Cannot store credentials for an unknown provider".into(),
                ))
            }
        };
        *slot = Some(creds);
        Ok(())
    }

    /// Configured remote name, falling back to "origin"
    pub fn remote_name(&self) -> &str {
        if self.default_remote.is_empty() {
            DEFAULT_REMOTE
        } else {
            &self.default_remote
        }
    }

    /// Apply the branch prefix unless the name already carries it
    pub fn prefixed_branch(&self, name: &str) -> String {
        if self.branch_prefix.is_empty() || name.starts_with(&self.branch_prefix) {
            name.to_string()
        } else {
            format!("{}{}", self.branch_prefix, name)
        }
    }
}

/// Get the tool-owned directory
pub fn tool_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(SHIPIT_HOME_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    let base_dirs = BaseDirs::new()
        .ok_or_else(|| ShipitError::Config("Could not determine home directory".into()))?;

    Ok(base_dirs.home_dir().join(TOOL_DIR_NAME))
}

/// Reads and writes the config document in the tool directory
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the default tool directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(tool_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    /// Load the config.
    ///
    /// A missing file is `Ok(None)`; an empty file is the default config; a
    /// malformed file is an error.
    pub fn load(&self) -> Result<Option<Config>> {
        let config_path = self.config_path();

        if !config_path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(Some(config))
    }

    /// Load the config, treating a missing file as the default config
    pub fn load_or_default(&self) -> Result<Config> {
        Ok(self.load()?.unwrap_or_default())
    }

    /// Save configuration to file
    pub fn save(&self, config: &Config) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let contents = toml::to_string_pretty(config)?;
        fs::write(self.config_path(), format!("{}{}", CONFIG_HEADER, contents))?;

        Ok(())
    }
}
