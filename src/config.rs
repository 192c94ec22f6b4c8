use std::time::Duration;
use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use reqwest::Url;
use crate::models::place::Coordinates;

pub const DEVELOPMENT_API_URL: &str = "http://localhost:8000/api";
/// Baked in by the release build; absent in local builds.
pub const PRODUCTION_API_URL: Option<&str> = option_env!("PARLOR_PRODUCTION_API_URL");

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Parser, Clone, Debug)]
#[clap(name = "parlor-client", about = "Find a pizza place near you")]
pub struct Config {
    #[clap(env, long, value_enum, default_value_t = Environment::Development)]
    pub environment: Environment,

    /// Overrides the API URL the environment selects.
    #[clap(env, long)]
    pub api_base_url: Option<String>,

    /// When set, address suggestions go straight to the maps provider instead of the backend proxy.
    #[clap(env, long)]
    pub maps_api_key: Option<String>,

    #[clap(env, long, allow_hyphen_values = true)]
    pub latitude: Option<f64>,

    #[clap(env, long, allow_hyphen_values = true)]
    pub longitude: Option<f64>,
}

impl Config {
    pub fn api_base_url(&self) -> anyhow::Result<Url> {
        let raw = match (&self.api_base_url, self.environment) {
            (Some(url), _) => url.as_str(),
            (None, Environment::Development) => DEVELOPMENT_API_URL,
            (None, Environment::Production) => PRODUCTION_API_URL
                .ok_or_else(|| anyhow!("This build has no production API URL, pass --api-base-url"))?,
        };
        let url = Url::parse(raw).with_context(|| format!("Invalid API base URL: {}", raw))?;
        if url.cannot_be_a_base() {
            return Err(anyhow!("API base URL {} cannot hold endpoint paths", raw));
        }
        Ok(url)
    }

    pub fn maps_api_key(&self) -> Option<&str> {
        self.maps_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn fixed_position(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
            _ => None,
        }
    }
}

/// Fixed delays of the interaction model.
#[derive(Clone, Copy, Debug)]
pub struct Timings {
    pub autocomplete_debounce: Duration,
    pub blur_grace: Duration,
    pub settle_delay: Duration,
    pub status_interval: Duration,
    pub reroll_safety_net: Duration,
    pub high_accuracy_timeout: Duration,
    pub low_accuracy_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            autocomplete_debounce: Duration::from_millis(300),
            blur_grace: Duration::from_millis(200),
            settle_delay: Duration::from_millis(1500),
            status_interval: Duration::from_millis(1500),
            reroll_safety_net: Duration::from_secs(5),
            high_accuracy_timeout: Duration::from_secs(5),
            low_accuracy_timeout: Duration::from_secs(10),
        }
    }
}
