//! Configuration loading and resolution.
//!
//! Precedence is command line, then the YAML file, then built-in defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use comment_harvest::{HarvestConfig, TokenCollisionPolicy};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Load the YAML configuration. A missing or empty file yields defaults.
pub fn load_config(path: &Path) -> Result<HarvestConfig> {
    if !path.exists() {
        tracing::debug!("no config file at {}, using defaults", path.display());
        return Ok(HarvestConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(HarvestConfig::default());
    }
    serde_yaml::from_str(&content)
        .with_context(|| format!("invalid config file {}", path.display()))
}

/// Values given on the command line. `None` leaves the file value alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub output_json: Option<String>,
    pub output_table: Option<String>,
    pub input_json: Option<String>,
    pub max_clicks: Option<u32>,
    pub click_timeout_ms: Option<u64>,
    pub initial_wait_ms: Option<u64>,
    pub headless: Option<bool>,
    pub window_width: Option<u32>,
    pub window_height: Option<u32>,
    pub scroll_min: Option<u32>,
    pub scroll_max: Option<u32>,
    pub scroll_sleep_min: Option<f64>,
    pub scroll_sleep_max: Option<f64>,
    pub token_collision: Option<TokenCollisionPolicy>,
    pub no_timestamp: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut HarvestConfig) {
        fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *slot = v.clone();
            }
        }

        if self.url.is_some() {
            config.comments_page = self.url.clone();
        }
        if self.output_table.is_some() {
            config.output_table = self.output_table.clone();
        }
        if self.input_json.is_some() {
            config.input_json = self.input_json.clone();
        }
        set(&mut config.output_json, &self.output_json);
        set(&mut config.max_clicks, &self.max_clicks);
        set(&mut config.click_timeout_ms, &self.click_timeout_ms);
        set(&mut config.initial_wait_ms, &self.initial_wait_ms);
        set(&mut config.headless, &self.headless);
        set(&mut config.window_width, &self.window_width);
        set(&mut config.window_height, &self.window_height);
        set(&mut config.scroll_min, &self.scroll_min);
        set(&mut config.scroll_max, &self.scroll_max);
        set(&mut config.scroll_sleep_min, &self.scroll_sleep_min);
        set(&mut config.scroll_sleep_max, &self.scroll_sleep_max);
        set(&mut config.token_collision, &self.token_collision);
        if self.no_timestamp {
            config.append_timestamp = false;
        }
    }
}

/// Where a run writes its capture sink and spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub json: PathBuf,
    pub table: PathBuf,
}

/// Resolve output paths from the merged configuration.
pub fn output_paths(config: &HarvestConfig, now: DateTime<Local>) -> OutputPaths {
    let (json, table) = make_output_names(&config.output_json, config.append_timestamp, now);
    OutputPaths {
        json: PathBuf::from(json),
        table: config
            .output_table
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(table)),
    }
}

/// `base.json` becomes `base_<YYYYmmdd_HHMMSS>.json` when stamping; a base
/// without the extension gets it appended. The table name swaps `.json`
/// for `.csv`.
pub fn make_output_names(base: &str, append_timestamp: bool, now: DateTime<Local>) -> (String, String) {
    let stem = base.strip_suffix(".json").unwrap_or(base);
    let json = if append_timestamp {
        format!("{stem}_{}.json", now.format("%Y%m%d_%H%M%S"))
    } else {
        format!("{stem}.json")
    };
    let table = format!("{}.csv", json.strip_suffix(".json").unwrap_or(json.as_str()));
    (json, table)
}

/// Parse-only input: explicit `input_json`, else the configured sink name.
pub fn parse_input(config: &HarvestConfig) -> PathBuf {
    config
        .input_json
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(config.output_json.as_str())
        .into()
}

/// Log the configuration a run will use.
pub fn log_effective(config: &HarvestConfig, paths: &OutputPaths) {
    tracing::info!("=== effective configuration ===");
    tracing::info!("url: {}", config.comments_page.as_deref().unwrap_or("<unset>"));
    tracing::info!("output json: {}", paths.json.display());
    tracing::info!("output table: {}", paths.table.display());
    tracing::info!("max_clicks: {}", config.max_clicks);
    tracing::info!("click_timeout_ms: {}", config.click_timeout_ms);
    tracing::info!("initial_wait_ms: {}", config.initial_wait_ms);
    tracing::info!("headless: {}", config.headless);
    tracing::info!("window: {}x{}", config.window_width, config.window_height);
    tracing::info!("token_collision: {:?}", config.token_collision);
}
