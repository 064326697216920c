use itertools::Itertools;
use serde::Serialize;

use crate::{
    data::{InstrumentSeries, Market, Symbol},
    errors::ErrorRepr,
    pattern::{Metric, Pattern},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub sym: Symbol,
    pub name: String,
    pub market: Market,
    pub last_close: f64,
    pub last_pct_change: f64,
    pub metric: Metric,
    pub matched: bool,
}

impl ScanResult {
    pub fn metric_value(&self) -> f64 {
        self.metric.value()
    }
}

/// Runs `pattern` over one instrument.
///
/// Fails with `InsufficientHistory` when the series is shorter than the
/// pattern window and with `MalformedBar` when any bar is unusable.
pub fn evaluate<P>(pattern: &P, series: &InstrumentSeries) -> Result<ScanResult, ErrorRepr>
where
    P: Pattern + ?Sized,
{
    pattern.check()?;
    let window = series.tail(pattern.min_bars().max(1))?;
    series.validate()?;

    let latest = &window[window.len() - 1];
    let (matched, metric) = pattern.inspect(window);

    Ok(ScanResult {
        sym: series.sym.clone(),
        name: series.name.clone(),
        market: series.market,
        last_close: latest.close,
        last_pct_change: latest.pct_change,
        metric,
        matched,
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    /// matched instruments, in input order
    pub results: Vec<ScanResult>,
    pub skipped: Vec<(Symbol, ErrorRepr)>,
}

impl ScanReport {
    pub fn ranked(&self, limit: Option<usize>) -> Vec<ScanResult> {
        rank(self.results.iter().cloned(), limit)
    }

    pub fn by_market(&self, market: Market) -> impl Iterator<Item = &ScanResult> {
        self.results.iter().filter(move |r| r.market == market)
    }
}

/// Evaluates every instrument independently. A bad or short series only drops
/// that instrument; only invalid parameters fail the scan.
pub fn scan<P>(instruments: &[InstrumentSeries], pattern: &P) -> Result<ScanReport, ErrorRepr>
where
    P: Pattern + ?Sized,
{
    pattern.check()?;

    let mut report = ScanReport::default();
    for series in instruments {
        match evaluate(pattern, series) {
            Ok(r) if r.matched => report.results.push(r),
            Ok(_) => {}
            Err(err) => {
                match &err {
                    ErrorRepr::MalformedBar(_) => log::warn!("skip {}: {}", series.sym, err),
                    _ => log::debug!("skip {}: {}", series.sym, err),
                }
                report.skipped.push((series.sym.clone(), err));
            }
        }
    }

    log::info!(
        "scanned {} instruments, {} matched, {} skipped",
        instruments.len(),
        report.results.len(),
        report.skipped.len()
    );
    Ok(report)
}

/// Sorts by `Metric::rank_key` descending, symbol ascending on ties.
pub fn rank(results: impl IntoIterator<Item = ScanResult>, limit: Option<usize>) -> Vec<ScanResult> {
    let sorted = results.into_iter().sorted_by(|a, b| {
        b.metric
            .rank_key()
            .total_cmp(&a.metric.rank_key())
            .then_with(|| a.sym.cmp(&b.sym))
    });

    match limit {
        Some(n) => sorted.take(n).collect(),
        None => sorted.collect(),
    }
}
