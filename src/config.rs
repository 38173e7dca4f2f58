use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::model::interval::Interval;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub binance: BinanceConfig,
    pub feed: FeedConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceConfig {
    pub rest_base_url: String,
    pub ws_base_url: String,
    pub symbol: String,
    pub interval: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub history_limit: usize,
    pub fetch_retry_attempts: u32,
    pub fetch_retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl BinanceConfig {
    pub fn interval(&self) -> Result<Interval> {
        self.interval
            .parse()
            .with_context(|| format!("binance.interval '{}' is invalid", self.interval))
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = Path::new("config/default.toml");
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;

        let mut config: Config =
            toml::from_str(&config_str).context("failed to parse config/default.toml")?;

        if let Ok(symbol) = std::env::var("CHARTFEED_SYMBOL") {
            config.binance.symbol = symbol;
        }
        if let Ok(interval) = std::env::var("CHARTFEED_INTERVAL") {
            config.binance.interval = interval;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.binance.interval().context("binance.interval")?;
        if self.binance.symbol.trim().is_empty() {
            anyhow::bail!("binance.symbol must not be empty");
        }
        if self.feed.history_limit == 0 || self.feed.history_limit > 1000 {
            anyhow::bail!("feed.history_limit must be in 1..=1000");
        }
        if self.feed.fetch_retry_attempts == 0 {
            anyhow::bail!("feed.fetch_retry_attempts must be at least 1");
        }
        Ok(())
    }
}
