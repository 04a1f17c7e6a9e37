//! Runtime configuration
//! Loaded once in [`#main`] and handed to every component, it is never mutated afterwards
use std::fs::OpenOptions;
use std::path::Path;

use log::debug;
use serde::Deserialize;
use url::Url;

use crate::error::ScoutError;

pub const MIN_MAX_RESULTS: i64 = 5;
pub const MAX_MAX_RESULTS: i64 = 100;

const DEFAULT_MAX_RESULTS: u8 = 100;
const DEFAULT_BUSINESS_UNIT: &str = "futures";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ScoutConfig {
    pub search: SearchConfig,
    pub store: StoreConfig,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Full URL of the recent search endpoint
    pub api_base: Url,
    pub bearer_token: String,
    pub business_unit: String,
    /// Always within [5, 100]
    pub max_results: u8,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: Url,
    pub token: String,
}

/// Shape of the optional JSON config file, every key may be left out
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub twitter_token: Option<String>,
    pub twitter_api_base: Option<String>,
    pub business_unit: Option<String>,
    pub max_results: Option<i64>,
    pub store_url: Option<String>,
    pub store_token: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl ScoutConfig {
    /// Read the config file (when given) and overlay the process environment
    /// * config_file: path of the JSON config file
    /// * required: a missing file is an error only when the user pointed at it explicitly
    pub fn load(config_file: Option<&Path>, required: bool) -> Result<ScoutConfig, ScoutError> {
        let file_config = match config_file {
            Some(path) if path.exists() => load_file_config(path)?,
            Some(path) if required => {
                return Err(ScoutError::config(format!(
                    "config file {} does not exist",
                    path.display()
                )))
            }
            _ => FileConfig::default(),
        };
        ScoutConfig::from_sources(file_config, |key| std::env::var(key).ok())
    }

    /// Merge the file values with the environment lookup, environment wins
    pub fn from_sources(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ScoutConfig, ScoutError> {
        let bearer_token = env("TWITTER_TOKEN")
            .or(file.twitter_token)
            .ok_or_else(|| ScoutError::config("TWITTER_TOKEN is not defined"))?;
        let api_base = env("TWITTER_API_BASE")
            .or(file.twitter_api_base)
            .ok_or_else(|| ScoutError::config("TWITTER_API_BASE is not defined"))?;
        let store_url = env("UPSTASH_REDIS_REST_URL")
            .or(file.store_url)
            .ok_or_else(|| ScoutError::config("UPSTASH_REDIS_REST_URL is not defined"))?;
        let store_token = env("UPSTASH_REDIS_REST_TOKEN")
            .or(file.store_token)
            .ok_or_else(|| ScoutError::config("UPSTASH_REDIS_REST_TOKEN is not defined"))?;

        let max_results = match env("SCRAPER_MAX_RESULTS") {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
                ScoutError::config(format!("SCRAPER_MAX_RESULTS is not a number: {}", raw))
            })?),
            None => file.max_results,
        };
        let max_results = max_results.map_or(DEFAULT_MAX_RESULTS, clamp_max_results);

        let timeout_secs = match env("TWEETSCOUT_HTTP_TIMEOUT") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                ScoutError::config(format!("TWEETSCOUT_HTTP_TIMEOUT is not a number: {}", raw))
            })?,
            None => file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };

        let business_unit = env("SCRAPER_BUSINESS_UNIT")
            .or(file.business_unit)
            .unwrap_or_else(|| DEFAULT_BUSINESS_UNIT.to_string());

        let config = ScoutConfig {
            search: SearchConfig {
                api_base: parse_url("TWITTER_API_BASE", &api_base)?,
                bearer_token,
                business_unit,
                max_results,
            },
            store: StoreConfig {
                url: parse_url("UPSTASH_REDIS_REST_URL", &store_url)?,
                token: store_token,
            },
            timeout_secs,
        };
        debug!(
            "config: search={}, store={}, max_results={}, timeout={}s",
            config.search.api_base, config.store.url, config.search.max_results, timeout_secs
        );
        Ok(config)
    }
}

/// Values outside of the API's accepted range are pulled back into it, never rejected
pub fn clamp_max_results(requested: i64) -> u8 {
    requested.clamp(MIN_MAX_RESULTS, MAX_MAX_RESULTS) as u8
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ScoutError> {
    Url::parse(raw.trim()).map_err(|e| ScoutError::config(format!("{} is not a valid URL: {}", key, e)))
}

fn load_file_config(path: &Path) -> Result<FileConfig, ScoutError> {
    let file = OpenOptions::new().read(true).open(path)?;
    let loaded_config = serde_json::from_reader(file)?;
    Ok(loaded_config)
}
