use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use screener::data::Market;
use serde::{Deserialize, Serialize};

use crate::source::RetryPolicy;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MarketFilter {
    #[default]
    All,
    Kospi,
    Kosdaq,
}

impl MarketFilter {
    pub fn accepts(&self, market: Market) -> bool {
        match self {
            MarketFilter::All => true,
            MarketFilter::Kospi => market == Market::Kospi,
            MarketFilter::Kosdaq => market == Market::Kosdaq,
        }
    }

    /// Table sections to print, in order.
    pub fn sections(&self) -> Vec<Market> {
        match self {
            MarketFilter::All => vec![Market::Kospi, Market::Kosdaq, Market::Other],
            MarketFilter::Kospi => vec![Market::Kospi],
            MarketFilter::Kosdaq => vec![Market::Kosdaq],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// holds `listing.csv` and one `<ticker>.csv` per instrument
    pub data_dir: PathBuf,
    pub market: MarketFilter,
    /// rows per market section
    pub limit: usize,
    pub retry: RetryPolicy,
    /// pause between two instrument fetches
    pub throttle_ms: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            market: MarketFilter::All,
            limit: 50,
            retry: RetryPolicy::default(),
            throttle_ms: 0,
        }
    }
}

impl BoardConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}
