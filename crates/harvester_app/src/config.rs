use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use harvester_core::{FallbackSchedule, Region};
use harvester_engine::{
    AttributePredicate, Backoff, FetchSettings, HarvestSettings, RequestEncoding, RetryPolicy,
};
use serde::{Deserialize, Serialize};

/// Environment variable holding the feed's API key.
pub const API_KEY_VAR: &str = "VWORLD_API_KEY";

/// One harvestable layer: display name, feed type name and identifier field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    pub type_name: String,
    pub id_field: String,
}

impl LayerConfig {
    fn new(name: &str, type_name: &str, id_field: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            id_field: id_field.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub srs_name: String,
    pub encoding: RequestEncoding,
    pub geometry_property: String,
    pub predicates: Vec<AttributePredicate>,
    /// Target region; `None` harvests the whole dataset.
    pub bbox: Option<Region>,
    pub page_size: usize,
    pub max_offset: usize,
    pub fallback_factors: Vec<u32>,
    pub max_retries: u32,
    pub retry_step_secs: u64,
    pub request_timeout_secs: u64,
    pub concurrency: usize,
    pub output_dir: PathBuf,
    pub layers: Vec<LayerConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let fetch = FetchSettings::default();
        Self {
            base_url: fetch.base_url,
            srs_name: fetch.srs_name,
            encoding: fetch.encoding,
            geometry_property: fetch.geometry_property,
            predicates: Vec::new(),
            // Seoul and Gyeonggi in EPSG:5186.
            bbox: Region::new(144693.0, 477383.0, 275745.0, 633107.0).ok(),
            page_size: fetch.page_size,
            max_offset: 1000,
            fallback_factors: vec![1, 9],
            max_retries: 3,
            retry_step_secs: 2,
            request_timeout_secs: 300,
            concurrency: 1,
            output_dir: PathBuf::from("output/WFS"),
            layers: vec![
                LayerConfig::new("시군구", "lt_c_adsigg_info", "sig_cd"),
                LayerConfig::new("읍면동", "lt_c_ademd_info", "emd_cd"),
                LayerConfig::new("리", "lt_c_adri_info", "li_cd"),
            ],
        }
    }
}

impl AppConfig {
    /// Reads a RON config file; missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        ron::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn layer(&self, name: &str) -> Option<&LayerConfig> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    pub fn fetch_settings(&self, layer: &LayerConfig, api_key: Option<String>) -> FetchSettings {
        FetchSettings {
            base_url: self.base_url.clone(),
            api_key,
            type_name: layer.type_name.clone(),
            srs_name: self.srs_name.clone(),
            encoding: self.encoding,
            geometry_property: self.geometry_property.clone(),
            predicates: self.predicates.clone(),
            page_size: self.page_size,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..FetchSettings::default()
        }
    }

    pub fn harvest_settings(&self) -> Result<HarvestSettings> {
        let fallback = FallbackSchedule::new(self.fallback_factors.clone())
            .context("invalid fallback_factors")?;
        Ok(HarvestSettings {
            max_offset: self.max_offset,
            fallback,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                backoff: Backoff::Linear(Duration::from_secs(self.retry_step_secs)),
            },
            // Headroom over the HTTP client's own timeout.
            fetch_timeout: Duration::from_secs(self.request_timeout_secs + 30),
            concurrency: self.concurrency.max(1),
        })
    }
}
