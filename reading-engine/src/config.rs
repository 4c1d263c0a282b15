use serde::Deserialize;
use std::{collections::BTreeMap, fs, time::Duration};

use meter_client::domain::ApartmentId;

use crate::{aggregate::Granularity, error::EngineError, validation::SameDayPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Pre-issued bearer token; ignored when `[auth]` credentials are set.
    #[serde(default)]
    pub token: Option<String>,
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionConfig {
    #[serde(default)]
    pub same_day_policy: SameDayPolicy,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfig {
    /// Resolve apartments through `apartments-with-counters` for this user.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub apartment_ids: Vec<ApartmentId>,
    #[serde(default)]
    pub granularity: Granularity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaletteEntryConfig {
    #[serde(default)]
    pub label: Option<String>,
    pub border_color: String,
    pub background_color: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartsConfig {
    /// Overrides keyed by medium type; `default` replaces the fallback entry.
    #[serde(default)]
    pub palette: BTreeMap<String, PaletteEntryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub submission: SubmissionConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub charts: ChartsConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> Result<Self, EngineError> {
        use std::env;

        let path =
            env::var("READING_ENGINE_CONFIG").unwrap_or_else(|_| "reading-engine.toml".to_string());
        let contents = fs::read_to_string(&path)
            .map_err(|e| EngineError::Config(format!("failed to read {path}: {e}")))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        toml::from_str(contents).map_err(|e| EngineError::Config(e.to_string()))
    }
}
