use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use pickup_core::PickupRules;
use pickup_regions::RegionTable;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind: String,
    pub api_key: String,
    pub rules_path: Option<PathBuf>,
    pub regions_path: Option<PathBuf>,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            api_key: "dev-pickup-key".to_string(),
            rules_path: None,
            regions_path: None,
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max: 240,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind: env::var("PICKUP_BIND").unwrap_or(defaults.bind),
            api_key: env::var("PICKUP_API_KEY")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(defaults.api_key),
            rules_path: env_path("PICKUP_RULES_PATH"),
            regions_path: env_path("PICKUP_REGIONS_PATH"),
            rate_limit_window: env::var("PICKUP_RATE_LIMIT_WINDOW_SECONDS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            rate_limit_max: env::var("PICKUP_RATE_LIMIT_MAX")
                .ok()
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(defaults.rate_limit_max),
        }
    }

    pub fn load_rules(&self) -> Result<Arc<PickupRules>> {
        match &self.rules_path {
            Some(path) => PickupRules::from_json_file(path)
                .map(Arc::new)
                .with_context(|| format!("failed loading pickup rules from {}", path.display())),
            None => Ok(PickupRules::shared_default()),
        }
    }

    pub fn load_regions(&self) -> Result<RegionTable> {
        match &self.regions_path {
            Some(path) => RegionTable::from_json_file(path)
                .with_context(|| format!("failed loading region table from {}", path.display())),
            None => Ok(RegionTable::builtin()),
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
