// Layered configuration: defaults < TOML file < PMFEED__* environment
use std::path::Path;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::{info, warn};

use crate::engine::types::Instrument;

pub const DEFAULT_WS_URL: &str = "wss://ws-subscriptions-clob.polymarket.com/ws/market";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DataClientConfig {
    pub base_url_ws: String,
    pub ws_connection_initial_delay_secs: f64,
    pub ws_connection_delay_secs: f64,
    pub ping_interval_secs: u64,
    pub compute_effective_deltas: bool,
    pub price_precision: u32,
    pub size_precision: u32,
}

impl Default for DataClientConfig {
    fn default() -> Self {
        Self {
            base_url_ws: DEFAULT_WS_URL.to_string(),
            ws_connection_initial_delay_secs: 5.0,
            ws_connection_delay_secs: 0.1,
            ping_interval_secs: 10,
            compute_effective_deltas: true,
            price_precision: 4,
            size_precision: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstrumentConfig {
    pub market: String,
    pub asset: String,
    #[serde(default)]
    pub outcome: Option<String>,
}

impl InstrumentConfig {
    /// Parses the CLI form `market:asset`.
    pub fn parse_pair(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((market, asset)) if !market.is_empty() && !asset.is_empty() => Ok(Self {
                market: market.to_string(),
                asset: asset.to_string(),
                outcome: None,
            }),
            _ => bail!("expected `market:asset`, got `{s}`"),
        }
    }

    pub fn to_instrument(&self) -> Instrument {
        Instrument::new(&self.market, &self.asset, self.outcome.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_filter: String,
    pub metrics_port: u16, // only used with the `metrics-exporter` feature
    pub client: DataClientConfig,
    pub instruments: Vec<InstrumentConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            metrics_port: 9000,
            client: DataClientConfig::default(),
            instruments: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Loads `.env`, then the optional TOML file, then `PMFEED__SECTION__KEY`
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(path) = path {
            if path.exists() {
                info!(path = %path.display(), "Loading config file");
                builder = builder.add_source(File::from(path));
            } else {
                warn!(path = %path.display(), "Config file not found, using defaults");
            }
        }
        builder = builder.add_source(
            Environment::with_prefix("PMFEED")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn instruments(&self) -> Vec<Instrument> {
        self.instruments.iter().map(InstrumentConfig::to_instrument).collect()
    }
}
