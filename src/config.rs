//! Import configuration and batch manifests

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default multiplier applied to the longest text value
pub const DEFAULT_LENGTH_WEIGHT: f64 = 1.2;

/// Default length above which text columns become unbounded
pub const DEFAULT_LENGTH_LIMIT: usize = 1000;

/// Tuning knobs for text column sizing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub length_weight: f64,
    pub length_limit: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            length_weight: DEFAULT_LENGTH_WEIGHT,
            length_limit: DEFAULT_LENGTH_LIMIT,
        }
    }
}

impl SyncConfig {
    /// Build a config from optional overrides
    pub fn with_overrides(length_weight: Option<f64>, length_limit: Option<usize>) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            length_weight: length_weight.unwrap_or(defaults.length_weight),
            length_limit: length_limit.unwrap_or(defaults.length_limit),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.length_weight.is_finite() || self.length_weight <= 0.0 {
            return Err(SyncError::config(format!(
                "length_weight must be a positive number, got {}",
                self.length_weight
            )));
        }
        if self.length_limit == 0 {
            return Err(SyncError::config("length_limit must be greater than 0"));
        }
        Ok(())
    }
}

/// One file to import into one table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportEntry {
    pub table: String,
    pub file: PathBuf,
}

/// A sequence of imports run in order, e.g. a daily drop of several extracts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportManifest {
    /// Target database; the command line `--database` wins when given
    #[serde(default)]
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub length_weight: Option<f64>,
    #[serde(default)]
    pub length_limit: Option<usize>,
    /// Primary key column per table
    #[serde(default)]
    pub primary_keys: HashMap<String, String>,
    pub imports: Vec<ImportEntry>,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl ImportManifest {
    /// Load a manifest from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SyncError::invalid_input(format!(
                "Failed to read manifest '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mut manifest: Self = serde_json::from_str(&content)?;
        manifest.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        manifest.config()?;
        Ok(manifest)
    }

    pub fn config(&self) -> Result<SyncConfig> {
        SyncConfig::with_overrides(self.length_weight, self.length_limit)
    }

    pub fn primary_key(&self, table: &str) -> Option<&str> {
        self.primary_keys.get(table).map(|k| k.as_str())
    }

    /// Resolve an entry's file relative to the manifest location
    pub fn resolve(&self, entry: &ImportEntry) -> PathBuf {
        if entry.file.is_absolute() {
            entry.file.clone()
        } else {
            self.base_dir.join(&entry.file)
        }
    }

    /// Resolve the manifest's database path relative to the manifest location
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database.as_ref().map(|db| {
            if db.is_absolute() {
                db.clone()
            } else {
                self.base_dir.join(db)
            }
        })
    }
}
