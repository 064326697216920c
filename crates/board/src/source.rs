use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use derive_builder::Builder;
use screener::{
    data::{
        krx::{self, KrxListing},
        InstrumentSeries,
    },
    errors::ErrorRepr,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source unavailable: {}", .0)]
    Unavailable(String),
    #[error(transparent)]
    Data(#[from] ErrorRepr),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Unavailable(_))
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait BarSource {
    fn listing(&self) -> Result<Vec<KrxListing>, SourceError>;
    fn series(&self, item: &KrxListing) -> Result<InstrumentSeries, SourceError>;
}

/// Daily bar exports on disk: `listing.csv` plus `<ticker>.csv` files.
pub struct CsvDirSource {
    dir: PathBuf,
}

impl CsvDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn open(&self, path: &Path) -> Result<File, SourceError> {
        File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                SourceError::Data(ErrorRepr::Load(format!("{}: {}", path.display(), e)))
            }
            _ => SourceError::Unavailable(format!("{}: {}", path.display(), e)),
        })
    }
}

impl BarSource for CsvDirSource {
    fn listing(&self) -> Result<Vec<KrxListing>, SourceError> {
        let f = self.open(&self.dir.join("listing.csv"))?;
        Ok(krx::read_listing(f)?)
    }

    fn series(&self, item: &KrxListing) -> Result<InstrumentSeries, SourceError> {
        let f = self.open(&self.dir.join(format!("{}.csv", item.ticker)))?;
        Ok(krx::read_series(
            f,
            item.ticker.clone(),
            item.name.clone(),
            item.market,
        )?)
    }
}

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            multiplier: 2.0,
            max_backoff_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure, counting from 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.saturating_sub(1) as i32);
        let ms = (self.initial_backoff_ms as f64 * factor).min(self.max_backoff_ms as f64);
        Duration::from_millis(ms as u64)
    }
}

/// Calls `f` until it succeeds, fails permanently, or runs out of attempts.
pub async fn retry<T, F>(policy: &RetryPolicy, what: &str, mut f: F) -> Result<T, SourceError>
where
    F: FnMut() -> Result<T, SourceError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                log::warn!(
                    "{} failed (attempt {}/{}): {}, retry in {:?}",
                    what,
                    attempt,
                    max_attempts,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Fetches each listed instrument in turn. Failures are logged and skipped.
pub async fn fetch_all<S: BarSource>(
    source: &S,
    listing: &[KrxListing],
    policy: &RetryPolicy,
    throttle: Duration,
) -> Vec<InstrumentSeries> {
    let mut out = Vec::with_capacity(listing.len());
    for (i, item) in listing.iter().enumerate() {
        if i > 0 && !throttle.is_zero() {
            tokio::time::sleep(throttle).await;
        }

        match retry(policy, &item.ticker, || source.series(item)).await {
            Ok(s) if s.is_empty() => log::warn!("empty data: {}.csv", item.ticker),
            Ok(s) => out.push(s),
            Err(err) => log::error!("load {} ({}) fail: {}", item.ticker, item.name, err),
        }
    }
    log::info!("loaded {}/{} instruments", out.len(), listing.len());
    out
}
