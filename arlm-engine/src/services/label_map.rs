//! Classifier label → landmark identifier table
//!
//! Injected into the classification gate and swappable at runtime, so a new
//! model's label set only needs a config change. File format:
//!
//! ```toml
//! [labels]
//! opernhaus = "7506e475-2e94-4e46-a0b3-06fe6d9cc6ab"
//! ```

use arlm_common::config::load_toml;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::info;

#[derive(Debug, Deserialize)]
struct LabelFile {
    #[serde(default)]
    labels: HashMap<String, String>,
}

/// Shared, reloadable label table
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl LabelMap {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Read a `[labels]` table from a TOML file
    pub fn from_file(path: &Path) -> arlm_common::Result<Self> {
        let file: LabelFile = load_toml(path)?;
        Ok(Self::new(file.labels))
    }

    /// Landmark id for an exact classifier label
    pub fn lookup(&self, label: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(label)
            .cloned()
    }

    /// Swap in a new table; every clone of this map sees the change
    pub fn replace(&self, entries: HashMap<String, String>) {
        let count = entries.len();
        *self.entries.write().unwrap_or_else(|e| e.into_inner()) = entries;
        info!(labels = count, "Label map replaced");
    }

    /// Reload from a TOML file, keeping the current table on error
    pub fn reload_from(&self, path: &Path) -> arlm_common::Result<()> {
        let file: LabelFile = load_toml(path)?;
        self.replace(file.labels);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
