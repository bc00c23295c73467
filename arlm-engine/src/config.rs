//! Engine configuration
//!
//! TOML bootstrap file plus overrides. Sources, highest priority first:
//! 1. Command-line arguments (applied by the binary)
//! 2. Environment (`ARLM_BACKEND_URL`, `ARLM_API_KEY`)
//! 3. TOML file (`--config`, `ARLM_CONFIG`, or `<config_dir>/arlm/config.toml`)
//! 4. Built-in defaults
//!
//! Every field has a default except the backend credentials.

use crate::coordinator::{
    CoordinatorConfig, DEFAULT_MOVEMENT_THRESHOLD_M, DEFAULT_RECOGNITION_TIMEOUT, DEFAULT_WEATHER_INTERVAL,
};
use crate::api::sensors::{FrameLimits, DEFAULT_MAX_FRAME_HEIGHT, DEFAULT_MAX_FRAME_WIDTH};
use crate::services::classification_gate::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MIN_INTERVAL};
use crate::services::proximity_index::DEFAULT_RADIUS_M;
use crate::services::weather_client::DEFAULT_WEATHER_URL;
use crate::services::RetryPolicy;
use arlm_common::config::{env_non_empty, load_toml, resolve_config_path, LoggingConfig};
use arlm_common::models::OperatingMode;
use arlm_common::{Error, GeoPoint, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const CONFIG_ENV_VAR: &str = "ARLM_CONFIG";
pub const BACKEND_URL_ENV_VAR: &str = "ARLM_BACKEND_URL";
pub const API_KEY_ENV_VAR: &str = "ARLM_API_KEY";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Label shipped with the bundled model
const OPERNHAUS_LABEL: &str = "opernhaus";
const OPERNHAUS_ID: &str = "7506e475-2e94-4e46-a0b3-06fe6d9cc6ab";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub backend: BackendConfig,
    pub retry: RetryPolicy,
    pub session: SessionConfig,
    pub vision: VisionConfig,
    pub geo: GeoConfig,
    pub weather: WeatherConfig,
    pub catalog: CatalogConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub initial_mode: OperatingMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub min_interval_ms: u64,
    pub confidence_threshold: f32,
    pub recognition_timeout_ms: u64,
    /// Classifier label → landmark id
    pub labels: HashMap<String, String>,
    /// Optional `[labels]` TOML file; replaces `labels` when set
    pub labels_file: Option<PathBuf>,
    /// Largest frame `/frame` accepts; also sizes the request body limit
    pub max_frame_width: u32,
    pub max_frame_height: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: DEFAULT_MIN_INTERVAL.as_millis() as u64,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            recognition_timeout_ms: DEFAULT_RECOGNITION_TIMEOUT.as_millis() as u64,
            labels: HashMap::from([(OPERNHAUS_LABEL.to_string(), OPERNHAUS_ID.to_string())]),
            labels_file: None,
            max_frame_width: DEFAULT_MAX_FRAME_WIDTH,
            max_frame_height: DEFAULT_MAX_FRAME_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    pub radius_m: f64,
    pub movement_threshold_m: f64,
    /// Fallback location until the first fix arrives (Zurich city centre)
    pub default_latitude: f64,
    pub default_longitude: f64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            radius_m: DEFAULT_RADIUS_M,
            movement_threshold_m: DEFAULT_MOVEMENT_THRESHOLD_M,
            default_latitude: 47.3769,
            default_longitude: 8.5417,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub enabled: bool,
    pub base_url: String,
    pub refresh_interval_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_WEATHER_URL.to_string(),
            refresh_interval_secs: DEFAULT_WEATHER_INTERVAL.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Periodic refresh while a session runs; 0 disables
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5780".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load the TOML file (if one resolves) and apply environment overrides
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(cli_path, CONFIG_ENV_VAR, CONFIG_FILE_NAME)? {
            Some(path) => load_toml::<EngineConfig>(&path)?,
            None => {
                info!("No config file found, using built-in defaults");
                EngineConfig::default()
            }
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Environment values replace file values
    pub fn apply_env(&mut self) {
        if let Some(url) = env_non_empty(BACKEND_URL_ENV_VAR) {
            self.backend.base_url = Some(url);
        }
        if let Some(key) = env_non_empty(API_KEY_ENV_VAR) {
            self.backend.api_key = Some(key);
        }
    }

    /// Backend URL and key, both non-blank
    pub fn backend_credentials(&self) -> Result<(&str, &str)> {
        let url = self
            .backend
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "Catalog backend URL missing: set [backend] base_url or {}",
                    BACKEND_URL_ENV_VAR
                ))
            })?;
        let key = self
            .backend
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "Catalog API key missing: set [backend] api_key or {}",
                    API_KEY_ENV_VAR
                ))
            })?;
        Ok((url, key))
    }

    pub fn frame_limits(&self) -> FrameLimits {
        FrameLimits {
            max_width: self.vision.max_frame_width,
            max_height: self.vision.max_frame_height,
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.vision.min_interval_ms)
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            initial_mode: self.session.initial_mode,
            radius_m: self.geo.radius_m,
            movement_threshold_m: self.geo.movement_threshold_m,
            recognition_timeout: Duration::from_millis(self.vision.recognition_timeout_ms),
            weather_interval: Duration::from_secs(self.weather.refresh_interval_secs.max(1)),
            catalog_refresh_interval: (self.catalog.refresh_interval_secs > 0)
                .then(|| Duration::from_secs(self.catalog.refresh_interval_secs)),
            default_location: GeoPoint::new(self.geo.default_latitude, self.geo.default_longitude),
        }
    }
}
