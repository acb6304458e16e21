//! Analysis configuration persistence
//!
//! Stored as TOML in `<data_dir>/ltvboard.toml`. Every field has a default,
//! so a partial file only overrides what it names.

use crate::error::CoreError;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "ltvboard.toml";

/// Tunables for one analysis session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Reference "now" for RFM recency
    pub anchor_date: NaiveDate,
    /// Month length used to turn day gaps into recency months
    pub days_per_month: f64,
    /// Orders per customer considered for a golden route
    pub route_depth: usize,
    /// Routes kept after ranking
    pub top_routes: usize,
    /// Ingestion ceiling for one store
    pub max_records: usize,
    /// Separator used when displaying route steps
    pub route_separator: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            anchor_date: NaiveDate::from_ymd_opt(2026, 1, 12).unwrap_or_default(),
            days_per_month: 30.44,
            route_depth: 10,
            top_routes: 15,
            max_records: 100_000,
            route_separator: " → ".to_string(),
        }
    }
}

impl AnalysisConfig {
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE_NAME)
    }

    /// Load `<data_dir>/ltvboard.toml`, falling back to defaults
    ///
    /// A missing file is normal; an unreadable or invalid one is logged.
    pub fn load(data_dir: &Path) -> Self {
        let path = Self::path(data_dir);
        if !path.exists() {
            return Self::default();
        }

        match Self::try_load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                Self::default()
            }
        }
    }

    /// Strict load: I/O, TOML and range errors are returned
    pub fn try_load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| CoreError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Persist to `<data_dir>/ltvboard.toml`
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(data_dir).context("Failed to create data directory")?;
        let path = Self::path(data_dir);
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |message: &str| {
            Err(CoreError::InvalidConfig {
                message: message.to_string(),
            })
        };

        if !(self.days_per_month > 0.0) {
            return invalid("days_per_month must be positive");
        }
        if self.route_depth == 0 {
            return invalid("route_depth must be at least 1");
        }
        if self.top_routes == 0 {
            return invalid("top_routes must be at least 1");
        }
        if self.max_records == 0 {
            return invalid("max_records must be at least 1");
        }
        Ok(())
    }

    pub fn with_anchor_date(mut self, anchor_date: NaiveDate) -> Self {
        self.anchor_date = anchor_date;
        self
    }
}
