use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data_engine::{EngineSettings, StaleResponsePolicy, DEFAULT_NOMINAL_ROW_COUNT};
use crate::view_state::DEFAULT_PAGE_SIZE;

pub const DEFAULT_DATASET_ID: &str = "1hB_LjBT9ezZigXnC-MblT2PXZledkZqBnvV23ssfSuE";
pub const DEFAULT_ENDPOINT_BASE: &str = "https://docs.google.com/spreadsheets/d";
pub const DATASET_ID_ENV: &str = "FMV_DATASET_ID";
const CONFIG_DIR_ENV: &str = "FMV_CONFIG_DIR";
const APP_DIR: &str = "fmv";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewerConfig {
    #[serde(default = "default_dataset_id")]
    pub dataset_id: String,
    #[serde(default = "default_endpoint_base")]
    pub endpoint_base: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_page_size_options")]
    pub page_size_options: Vec<usize>,
    #[serde(default = "default_nominal_row_count")]
    pub nominal_row_count: u64,
    #[serde(default)]
    pub stale_responses: StaleResponsePolicy,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_dataset_id() -> String {
    DEFAULT_DATASET_ID.to_string()
}

fn default_endpoint_base() -> String {
    DEFAULT_ENDPOINT_BASE.to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_page_size_options() -> Vec<usize> {
    vec![10, 25, 50, 100]
}

fn default_nominal_row_count() -> u64 {
    DEFAULT_NOMINAL_ROW_COUNT
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            dataset_id: default_dataset_id(),
            endpoint_base: default_endpoint_base(),
            page_size: default_page_size(),
            page_size_options: default_page_size_options(),
            nominal_row_count: default_nominal_row_count(),
            stale_responses: StaleResponsePolicy::default(),
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config directory is unavailable for this platform")]
    ConfigDirUnavailable,
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to create directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("page size must be greater than 0")]
    ZeroPageSize,
    #[error("dataset id cannot be empty")]
    EmptyDatasetId,
}

impl ViewerConfig {
    pub fn load_default() -> Result<Self, ConfigError> {
        let mut config = Self::load_from_path(default_config_path()?)?;
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dataset_id) = lookup(DATASET_ID_ENV).filter(|value| !value.trim().is_empty())
        {
            self.dataset_id = dataset_id.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size_options.contains(&0) {
            return Err(ConfigError::ZeroPageSize);
        }
        if self.dataset_id.trim().is_empty() {
            return Err(ConfigError::EmptyDatasetId);
        }
        Ok(())
    }

    #[must_use]
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            page_size: self.page_size,
            nominal_row_count: self.nominal_row_count,
            stale_responses: self.stale_responses,
        }
    }

    /// The page-size option after `current`, wrapping to the smallest.
    #[must_use]
    pub fn next_page_size(&self, current: usize) -> usize {
        self.page_size_options
            .iter()
            .copied()
            .find(|size| *size > current)
            .or_else(|| self.page_size_options.first().copied())
            .unwrap_or(current)
    }

    fn normalize(&mut self) {
        if !self.page_size_options.contains(&self.page_size) {
            self.page_size_options.push(self.page_size);
        }
        self.page_size_options.sort_unstable();
        self.page_size_options.dedup();
    }
}

pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = if let Some(custom) = env::var_os(CONFIG_DIR_ENV) {
        PathBuf::from(custom)
    } else if cfg!(target_os = "windows") {
        env::var_os("APPDATA")
            .map(PathBuf::from)
            .ok_or(ConfigError::ConfigDirUnavailable)?
    } else if let Some(xdg_config_home) = env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config_home)
    } else {
        let home = env::var_os("HOME").ok_or(ConfigError::ConfigDirUnavailable)?;
        PathBuf::from(home).join(".config")
    };

    Ok(base_dir.join(APP_DIR))
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(default_config_dir()?.join("viewer.toml"))
}

pub fn default_log_path() -> Result<PathBuf, ConfigError> {
    Ok(default_config_dir()?.join("fmv.log"))
}

pub fn ensure_parent_dir(path: &Path) -> Result<(), ConfigError> {
    let Some(parent_dir) = path.parent() else {
        return Ok(());
    };
    fs::create_dir_all(parent_dir).map_err(|source| ConfigError::CreateDir {
        path: parent_dir.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::{ensure_parent_dir, ConfigError, ViewerConfig, DATASET_ID_ENV, DEFAULT_DATASET_ID};
    use crate::data_engine::StaleResponsePolicy;

    fn temp_config_path(temp_dir: &TempDir) -> PathBuf {
        temp_dir.path().join("viewer.toml")
    }

    #[test]
    fn missing_or_blank_file_loads_defaults() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_config_path(&temp_dir);

        let config = ViewerConfig::load_from_path(&path).expect("missing file should load");
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.dataset_id, DEFAULT_DATASET_ID);

        fs::write(&path, "  \n").expect("failed to write blank config");
        let config = ViewerConfig::load_from_path(&path).expect("blank file should load");
        assert_eq!(config.page_size, 10);
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_config_path(&temp_dir);
        fs::write(
            &path,
            "page_size = 20\nstale_responses = \"apply\"\nrequest_timeout_secs = 15\n",
        )
        .expect("failed to write config");

        let config = ViewerConfig::load_from_path(&path).expect("config should parse");
        assert_eq!(config.page_size, 20);
        assert_eq!(config.page_size_options, vec![10, 20, 25, 50, 100]);
        assert_eq!(config.stale_responses, StaleResponsePolicy::Apply);
        assert_eq!(config.request_timeout_secs, Some(15));
        assert_eq!(config.nominal_row_count, 100_000);
        assert_eq!(config.engine_settings().page_size, 20);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_config_path(&temp_dir);
        fs::write(&path, "page_size = 0\n").expect("failed to write config");

        let error = ViewerConfig::load_from_path(&path).expect_err("zero size must fail");
        assert!(matches!(error, ConfigError::ZeroPageSize));
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_config_path(&temp_dir);
        fs::write(&path, "page_size = \"ten\"\n").expect("failed to write config");

        let error = ViewerConfig::load_from_path(&path).expect_err("bad type must fail");
        assert!(matches!(error, ConfigError::Parse { .. }));
    }

    #[test]
    fn dataset_override_replaces_configured_id() {
        let mut config = ViewerConfig::default();
        config.apply_overrides(|key| (key == DATASET_ID_ENV).then(|| " sheet-42 ".to_string()));
        assert_eq!(config.dataset_id, "sheet-42");

        config.apply_overrides(|_| Some(String::new()));
        assert_eq!(config.dataset_id, "sheet-42");
    }

    #[test]
    fn page_size_cycles_through_options() {
        let config = ViewerConfig::default();
        assert_eq!(config.next_page_size(10), 25);
        assert_eq!(config.next_page_size(50), 100);
        assert_eq!(config.next_page_size(100), 10);
    }

    #[test]
    fn ensure_parent_dir_creates_nested_directories() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("a").join("b").join("fmv.log");

        ensure_parent_dir(&path).expect("directories should be created");
        assert!(path.parent().is_some_and(std::path::Path::is_dir));
    }
}
