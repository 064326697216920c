pub mod krx;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ErrorRepr;

pub type Date = chrono::NaiveDate;
pub type Symbol = String;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Kospi,
    Kosdaq,
    #[default]
    Other,
}

impl Market {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "KOSPI" => Market::Kospi,
            "KOSDAQ" => Market::Kosdaq,
            _ => Market::Other,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Market::Kospi => "KOSPI",
            Market::Kosdaq => "KOSDAQ",
            Market::Other => "OTHER",
        };
        f.write_str(s)
    }
}

/// One trading session of one instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyBar {
    pub date: Date,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    /// traded value in KRW
    pub turnover: f64,
    pub pct_change: f64,
}

impl DailyBar {
    pub fn validate(&self) -> Result<(), ErrorRepr> {
        let fields = [
            ("close", self.close),
            ("high", self.high),
            ("low", self.low),
            ("turnover", self.turnover),
            ("pct_change", self.pct_change),
        ];
        if let Some((name, v)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ErrorRepr::MalformedBar(format!(
                "{}: {} is not a number ({})",
                self.date, name, v
            )));
        }
        if self.close <= 0.0 {
            return Err(ErrorRepr::MalformedBar(format!(
                "{}: close must be positive, got {}",
                self.date, self.close
            )));
        }
        if self.turnover < 0.0 {
            return Err(ErrorRepr::MalformedBar(format!(
                "{}: negative turnover {}",
                self.date, self.turnover
            )));
        }
        Ok(())
    }
}

/// Recent daily bars of one instrument, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstrumentSeries {
    pub sym: Symbol,
    pub name: String,
    pub market: Market,
    bars: Vec<DailyBar>,
}

impl InstrumentSeries {
    /// Accepts bars in any order; they are kept sorted by date ascending.
    pub fn new(
        sym: impl Into<Symbol>,
        name: impl Into<String>,
        market: Market,
        mut bars: Vec<DailyBar>,
    ) -> Self {
        bars.sort_by_key(|b| b.date);
        Self {
            sym: sym.into(),
            name: name.into(),
            market,
            bars,
        }
    }

    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn latest(&self) -> Option<&DailyBar> {
        self.bars.last()
    }

    /// The most recent `n` bars, or `InsufficientHistory` if there are fewer.
    pub fn tail(&self, n: usize) -> Result<&[DailyBar], ErrorRepr> {
        let have = self.bars.len();
        if have < n {
            return Err(ErrorRepr::InsufficientHistory { need: n, have });
        }
        Ok(&self.bars[have - n..])
    }

    pub fn validate(&self) -> Result<(), ErrorRepr> {
        for bar in &self.bars {
            bar.validate()?;
        }
        if let Some(w) = self.bars.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(ErrorRepr::MalformedBar(format!(
                "duplicate session {}",
                w[0].date
            )));
        }
        Ok(())
    }
}
