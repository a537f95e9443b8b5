// src/config.rs

use crate::enumerator::DEFAULT_PAGE_SIZE;
use crate::limiter::DEFAULT_MAX_CONCURRENT;
use crate::models::MAX_ITEM_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Items launched together before the scheduler waits for all of them.
pub const DEFAULT_BATCH_WIDTH: usize = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Tunables of an archive run. The core never changes these itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Files land in `<download_root>/<collection folder>/`.
    pub download_root: PathBuf,
    pub batch_width: usize,
    pub max_concurrent: usize,
    pub page_size: usize,
    pub max_item_size: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            download_root: PathBuf::from("downloads"),
            batch_width: DEFAULT_BATCH_WIDTH,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            page_size: DEFAULT_PAGE_SIZE,
            max_item_size: MAX_ITEM_SIZE,
        }
    }
}

impl ArchiveConfig {
    pub fn new(download_root: impl Into<PathBuf>) -> Self {
        Self {
            download_root: download_root.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_width == 0 {
            return Err(ConfigError::Zero("batch width"));
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::Zero("max concurrent"));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Zero("page size"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ArchiveConfig::new("/data");
        assert_eq!(config.download_root, PathBuf::from("/data"));
        assert_eq!(config.batch_width, 20);
        assert_eq!(config.max_concurrent, 20);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.max_item_size, 6 * 1024 * 1024 * 1024);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn zero_knobs_are_rejected() {
        let config = ArchiveConfig {
            batch_width: 0,
            ..ArchiveConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::Zero("batch width")));

        let config = ArchiveConfig {
            max_concurrent: 0,
            ..ArchiveConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::Zero("max concurrent")));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ArchiveConfig = serde_json::from_str(r#"{"batch_width": 5}"#).unwrap();
        assert_eq!(config.batch_width, 5);
        assert_eq!(config.max_concurrent, DEFAULT_MAX_CONCURRENT);
    }
}
