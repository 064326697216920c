//! Decoding of KRX daily OHLCV exports.
//!
//! The column layout follows what pykrx `get_market_ohlcv` writes out
//! (`날짜,시가,고가,저가,종가,거래량,거래대금,등락률`). English headers are
//! accepted as aliases. Every numeric cell is kept as text until conversion so
//! that a blank or garbled cell marks the instrument as malformed instead of
//! failing the whole file.

use std::{io, path::Path};

use serde::{Deserialize, Deserializer};

use super::{DailyBar, Date, InstrumentSeries, Market, Symbol};
use crate::errors::ErrorRepr;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KrxRecord {
    #[serde(alias = "날짜", alias = "Date")]
    pub date: Option<String>,
    #[serde(alias = "종가", alias = "Close")]
    pub close: Option<String>,
    #[serde(alias = "고가", alias = "High")]
    pub high: Option<String>,
    #[serde(alias = "저가", alias = "Low")]
    pub low: Option<String>,
    #[serde(alias = "거래대금", alias = "amount")]
    pub turnover: Option<String>,
    #[serde(alias = "등락률", alias = "pct_chg")]
    pub pct_change: Option<String>,
}

fn parse_date(s: &str) -> Result<Date, ErrorRepr> {
    let s = s.trim();
    Date::parse_from_str(s, "%Y%m%d")
        .or_else(|_| Date::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|_| ErrorRepr::MalformedBar(format!("bad date {:?}", s)))
}

fn parse_num(field: &'static str, cell: &Option<String>) -> Result<f64, ErrorRepr> {
    let raw = cell
        .as_deref()
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .ok_or_else(|| ErrorRepr::MalformedBar(format!("missing {}", field)))?;

    raw.replace(',', "")
        .parse::<f64>()
        .map_err(|_| ErrorRepr::MalformedBar(format!("{} is not numeric: {:?}", field, raw)))
}

impl TryFrom<KrxRecord> for DailyBar {
    type Error = ErrorRepr;

    fn try_from(r: KrxRecord) -> Result<Self, Self::Error> {
        let date = r
            .date
            .as_deref()
            .ok_or_else(|| ErrorRepr::MalformedBar("missing date".into()))
            .and_then(parse_date)?;

        let bar = DailyBar {
            date,
            close: parse_num("close", &r.close)?,
            high: parse_num("high", &r.high)?,
            low: parse_num("low", &r.low)?,
            turnover: parse_num("turnover", &r.turnover)?,
            pct_change: parse_num("pct_change", &r.pct_change)?,
        };
        Ok(bar)
    }
}

pub fn read_series<R: io::Read>(
    rdr: R,
    sym: impl Into<Symbol>,
    name: impl Into<String>,
    market: Market,
) -> Result<InstrumentSeries, ErrorRepr> {
    let bars = csv::Reader::from_reader(rdr)
        .into_deserialize::<KrxRecord>()
        .map(|rec| {
            rec.map_err(|e| ErrorRepr::MalformedBar(e.to_string()))
                .and_then(DailyBar::try_from)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(InstrumentSeries::new(sym, name, market, bars))
}

pub fn load_series(
    path: impl AsRef<Path>,
    sym: impl Into<Symbol>,
    name: impl Into<String>,
    market: Market,
) -> Result<InstrumentSeries, ErrorRepr> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| ErrorRepr::Load(format!("{}: {}", path.display(), e)))?;
    read_series(file, sym, name, market)
}

fn market_fmt<'de, D>(deserializer: D) -> Result<Market, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(Market::parse(&s))
}

/// One row of the ticker listing (`ticker,name,market`).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct KrxListing {
    #[serde(alias = "티커", alias = "code")]
    pub ticker: Symbol,
    #[serde(alias = "종목명")]
    pub name: String,
    #[serde(alias = "시장", default, deserialize_with = "market_fmt")]
    pub market: Market,
}

pub fn read_listing<R: io::Read>(rdr: R) -> Result<Vec<KrxListing>, ErrorRepr> {
    let rows = csv::Reader::from_reader(rdr)
        .into_deserialize()
        .collect::<Result<Vec<KrxListing>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_krx_csv() {
        let s = load_series("src/data/test/005930.csv", "005930", "삼성전자", Market::Kospi)
            .unwrap();
        assert_eq!(s.len(), 5);
        assert_eq!(s.market, Market::Kospi);

        let first = &s.bars()[0];
        let last = s.latest().unwrap();
        assert_eq!(first.date, Date::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(last.date, Date::from_ymd_opt(2024, 3, 8).unwrap());
        assert_eq!(last.close, 73300.0);
        assert_eq!(last.high, 73700.0);
        assert_eq!(last.low, 72800.0);
        assert_eq!(last.turnover, 1_226_548_791_500.0);
        assert_eq!(last.pct_change, 0.55);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_english_headers_and_dashed_dates() {
        let data = "date,open,high,low,close,volume,turnover,pct_change
2024-03-05,100,110,95,105,1000,105000,5.0
2024-03-04,98,101,97,100,900,90000,-1.2";
        let s = read_series(data.as_bytes(), "A", "a", Market::Other).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.bars()[0].close, 100.0);
        assert_eq!(s.bars()[1].pct_change, 5.0);
    }

    #[test]
    fn test_thousands_separator() {
        let data = "날짜,종가,고가,저가,거래대금,등락률
20240304,\"1,200\",\"1,250\",\"1,100\",\"3,000,000\",1.5";
        let s = read_series(data.as_bytes(), "A", "a", Market::Other).unwrap();
        assert_eq!(s.bars()[0].close, 1200.0);
        assert_eq!(s.bars()[0].turnover, 3_000_000.0);
    }

    #[test]
    fn test_malformed_cells() {
        let missing = "날짜,종가,고가,저가,거래대금,등락률
20240304,100,110,90,,1.5";
        assert!(matches!(
            read_series(missing.as_bytes(), "A", "a", Market::Other),
            Err(ErrorRepr::MalformedBar(_))
        ));

        let garbled = "날짜,종가,고가,저가,거래대금,등락률
20240304,abc,110,90,1000,1.5";
        assert!(matches!(
            read_series(garbled.as_bytes(), "A", "a", Market::Other),
            Err(ErrorRepr::MalformedBar(_))
        ));

        let bad_date = "날짜,종가,고가,저가,거래대금,등락률
2024/03/04,100,110,90,1000,1.5";
        assert!(matches!(
            read_series(bad_date.as_bytes(), "A", "a", Market::Other),
            Err(ErrorRepr::MalformedBar(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_series("src/data/test/nope.csv", "A", "a", Market::Other),
            Err(ErrorRepr::Load(_))
        ));
    }

    #[test]
    fn test_listing() {
        let data = "ticker,name,market
005930,삼성전자,KOSPI
247540,에코프로비엠,kosdaq
123456,어딘가,KONEX";
        let rows = read_listing(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].ticker, "005930");
        assert_eq!(rows[0].market, Market::Kospi);
        assert_eq!(rows[1].market, Market::Kosdaq);
        assert_eq!(rows[2].market, Market::Other);
    }
}
