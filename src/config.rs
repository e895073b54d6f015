//! Loader configuration. Values come from a JSON file, from defaults, and
//! finally from `SAFER_PATH` / `SAFER_ROOT` environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::loader::FsSource;

pub const DEFAULT_SEARCH_PATH: &str = "?.lua;?/init.lua";
pub const SEARCH_PATH_VAR: &str = "SAFER_PATH";
pub const ROOT_VAR: &str = "SAFER_ROOT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file unreadable: {0}")]
    Io(String),
    #[error("config parse failed: {0}")]
    Parse(String),
    #[error("search path must contain at least one template")]
    EmptySearchPath,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderConfig {
    /// `;`-separated templates with a `?` placeholder for the module path.
    pub search_path: String,
    /// Directory candidate paths are resolved against; the working directory
    /// when unset.
    pub root: Option<PathBuf>,
    /// Log filter for the command-line tool, e.g. `info` or `safer_loader=debug`.
    pub log_level: Option<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            search_path: DEFAULT_SEARCH_PATH.to_string(),
            root: None,
            log_level: None,
        }
    }
}

impl LoaderConfig {
    /// Defaults with `SAFER_PATH` / `SAFER_ROOT` applied, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults with overrides taken from `lookup`, validated.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Replaces file or default values with any override `lookup` returns.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(SEARCH_PATH_VAR) {
            self.search_path = path;
        }
        if let Some(root) = lookup(ROOT_VAR) {
            self.root = Some(PathBuf::from(root));
        }
    }

    /// Rejects a search path with no non-empty template.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search_path.split(';').all(str::is_empty) {
            return Err(ConfigError::EmptySearchPath);
        }
        Ok(())
    }

    /// Filesystem source rooted at `root`.
    pub fn byte_source(&self) -> FsSource {
        FsSource::new(self.root.clone())
    }
}

/// Reads a JSON config file, applies environment overrides and validates.
pub fn load_config(path: impl AsRef<Path>) -> Result<LoaderConfig, ConfigError> {
    load_config_with(path, |name| std::env::var(name).ok())
}

/// Same as [`load_config`], with overrides taken from `lookup`.
pub fn load_config_with(
    path: impl AsRef<Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<LoaderConfig, ConfigError> {
    let raw_json = fs::read_to_string(&path).map_err(|e| ConfigError::Io(format!("{e}")))?;
    let mut config: LoaderConfig =
        serde_json::from_str(&raw_json).map_err(|e| ConfigError::Parse(format!("{e}")))?;
    config.apply_overrides(lookup);
    config.validate()?;
    Ok(config)
}
