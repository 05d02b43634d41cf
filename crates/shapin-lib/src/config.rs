use std::env;
use std::path::{Path, PathBuf};

use crate::commands::app::AppError;
use crate::infrastructure::{ConfigFile, DEFAULT_API_URL, load_config};

/// Runtime settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Github API token for authenticated requests
    pub github_token: Option<String>,
    /// Base URL of the Github REST API
    pub github_api_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            github_token: None,
            github_api_url: DEFAULT_API_URL.to_owned(),
        }
    }
}

/// All application configuration, loaded once at startup.
#[derive(Debug)]
pub struct Config {
    pub settings: Settings,
    /// Repository root; relative target patterns are resolved against it
    pub root: PathBuf,
    pub file: ConfigFile,
}

impl Settings {
    /// Load settings from environment variables. Empty values count as unset.
    #[must_use]
    pub fn from_env() -> Self {
        let var = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            github_token: var("GITHUB_TOKEN"),
            github_api_url: var("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_owned()),
        }
    }
}

impl Config {
    /// Load all configuration: settings from env, the config file from `root`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ConfigFile`] if the config file cannot be read or parsed.
    pub fn load(root: &Path) -> Result<Self, AppError> {
        Ok(Self {
            settings: Settings::from_env(),
            root: root.to_path_buf(),
            file: load_config(root)?,
        })
    }
}
