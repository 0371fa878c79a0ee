use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::mapper::{DEFAULT_MAX_FOCUS_SCALE, DEFAULT_MIN_SELECTION_SIZE};
use crate::persistence::{DEFAULT_MAX_RETRIES, RetryPolicy};

const CONFIG_ENV: &str = "KPDF_HIGHLIGHTS_CONFIG";
const CONFIG_FILE_NAME: &str = "highlights.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightsConfig {
    pub selection: SelectionConfig,
    pub rehydration: RehydrationConfig,
    pub persistence: PersistenceConfig,
    pub focus: FocusConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub min_width: f32,
    pub min_height: f32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_width: DEFAULT_MIN_SELECTION_SIZE,
            min_height: DEFAULT_MIN_SELECTION_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RehydrationConfig {
    pub schedule_delay_ms: u64,
}

impl Default for RehydrationConfig {
    fn default() -> Self {
        Self {
            schedule_delay_ms: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    pub max_scale: f32,
    /// Viewport padding in pixels.
    pub padding: f32,
    /// Crop padding as a fraction of the page.
    pub crop_padding: f32,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            max_scale: DEFAULT_MAX_FOCUS_SCALE,
            padding: 24.0,
            crop_padding: 0.05,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db_path: Option<PathBuf>,
}

impl HighlightsConfig {
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            crate::debug_log!("[config] no config file, using defaults: {}", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn load_or_default() -> Result<Self> {
        Self::load(&Self::default_path())
    }

    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV)
            && !path.is_empty()
        {
            return PathBuf::from(path);
        }
        crate::logger::state_dir().join(CONFIG_FILE_NAME)
    }

    pub fn schedule_delay(&self) -> Duration {
        Duration::from_millis(self.rehydration.schedule_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.persistence.max_retries,
            delay: Duration::from_millis(self.persistence.retry_delay_ms),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.store
            .db_path
            .clone()
            .unwrap_or_else(crate::store::local_state_db_path)
    }
}
