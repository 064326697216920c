mod config;
mod display;
mod source;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use config::{BoardConfig, MarketFilter};
use log::info;
use screener::{
    data::Market,
    pattern::{
        BreakoutConsolidationBuilder, Direction, InverseHeadAndShouldersBuilder,
        LimitMoveBuilder, Predicate, SustainedTurnoverBuilder, LIMIT_MOVE_THRESHOLD,
    },
    scan::{rank, scan},
};
use display::EOK;
use source::{fetch_all, retry, BarSource, CsvDirSource};

#[derive(Parser, Debug)]
#[command(name = "board", about = "Daily KRX screener: turnover, limit moves and chart patterns")]
struct Cli {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// directory with listing.csv and <ticker>.csv files
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
    #[arg(short, long, value_enum)]
    market: Option<MarketFilter>,
    /// rows per market
    #[arg(short, long)]
    limit: Option<usize>,
    /// print results as JSON
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    scan: ScanCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum ScanCommand {
    /// Rank by the latest session's traded value
    TopTurnover,
    /// Traded value above a floor for N sessions in a row
    SustainedTurnover {
        #[arg(long, default_value_t = 3)]
        days: usize,
        /// floor in 억원
        #[arg(long, default_value_t = 1000.0)]
        min_eok: f64,
    },
    LimitUp {
        #[arg(long, default_value_t = LIMIT_MOVE_THRESHOLD)]
        threshold: f64,
    },
    LimitDown {
        #[arg(long, default_value_t = LIMIT_MOVE_THRESHOLD)]
        threshold: f64,
    },
    /// Big up day followed by flat trading
    Breakout {
        #[arg(long, default_value_t = 4)]
        spike_lookback: usize,
        #[arg(long, default_value_t = 15.0)]
        spike_threshold: f64,
        #[arg(long, default_value_t = 3)]
        window: usize,
        #[arg(long, default_value_t = 5.0)]
        band: f64,
    },
    /// Inverse head and shoulders over the recent closes
    InverseHs {
        #[arg(long, default_value_t = 30)]
        lookback: usize,
        #[arg(long, default_value_t = 1.07)]
        tolerance: f64,
    },
}

impl ScanCommand {
    fn predicate(&self) -> anyhow::Result<Predicate> {
        use ScanCommand::*;

        let p = match *self {
            TopTurnover => Predicate::TopTurnover,
            SustainedTurnover { days, min_eok } => Predicate::SustainedTurnover(
                SustainedTurnoverBuilder::default()
                    .days(days)
                    .min_turnover(min_eok * EOK)
                    .build()?,
            ),
            LimitUp { threshold } => Predicate::LimitMove(
                LimitMoveBuilder::default()
                    .direction(Direction::Up)
                    .threshold(threshold)
                    .build()?,
            ),
            LimitDown { threshold } => Predicate::LimitMove(
                LimitMoveBuilder::default()
                    .direction(Direction::Down)
                    .threshold(threshold)
                    .build()?,
            ),
            Breakout {
                spike_lookback,
                spike_threshold,
                window,
                band,
            } => Predicate::BreakoutConsolidation(
                BreakoutConsolidationBuilder::default()
                    .spike_lookback(spike_lookback)
                    .spike_threshold(spike_threshold)
                    .consolidation_window(window)
                    .consolidation_band(band)
                    .build()?,
            ),
            InverseHs {
                lookback,
                tolerance,
            } => Predicate::InverseHeadAndShoulders(
                InverseHeadAndShouldersBuilder::default()
                    .lookback(lookback)
                    .right_shoulder_tolerance(tolerance)
                    .build()?,
            ),
        };
        Ok(p)
    }
}

fn resolve_config(cli: &Cli) -> anyhow::Result<BoardConfig> {
    let mut config = BoardConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(market) = cli.market {
        config.market = market;
    }
    if let Some(limit) = cli.limit {
        config.limit = limit;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let predicate = cli.scan.predicate()?;
    info!("scan: {:?}, config: {:?}", predicate, config);

    let source = CsvDirSource::new(&config.data_dir);
    let listing = retry(&config.retry, "listing", || source.listing()).await?;
    let listing: Vec<_> = listing
        .into_iter()
        .filter(|x| config.market.accepts(x.market))
        .collect();

    let instruments = fetch_all(&source, &listing, &config.retry, config.throttle()).await;
    let report = scan(&instruments, &predicate)?;

    let sections: Vec<_> = config
        .market
        .sections()
        .into_iter()
        .map(|m| (m, rank(report.by_market(m).cloned(), Some(config.limit))))
        .filter(|(m, rows)| *m != Market::Other || !rows.is_empty())
        .collect();

    if cli.json {
        let rows: Vec<_> = sections.into_iter().flat_map(|(_, rows)| rows).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for (market, rows) in sections {
        let title = format!("{} {}", market, predicate.title());
        println!("{}", display::render_table(&title, &rows));
    }
    if !report.skipped.is_empty() {
        info!("{} instruments skipped", report.skipped.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use screener::pattern::{
        BreakoutConsolidation, InverseHeadAndShoulders, LimitMove, SustainedTurnover,
    };

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("board").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_defaults() {
        let cli = parse(&["top-turnover"]);
        assert_eq!(cli.scan, ScanCommand::TopTurnover);
        assert!(!cli.json);

        let config = resolve_config(&cli).unwrap();
        assert_eq!(config, BoardConfig::default());
    }

    #[test]
    fn test_overrides() {
        let cli = parse(&["-d", "/tmp/krx", "-m", "kosdaq", "-l", "10", "--json", "limit-up"]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/krx"));
        assert_eq!(config.market, MarketFilter::Kosdaq);
        assert_eq!(config.limit, 10);
        assert!(cli.json);
    }

    #[test]
    fn test_predicates() {
        let p = parse(&["sustained-turnover", "--days", "5", "--min-eok", "500"])
            .scan
            .predicate()
            .unwrap();
        assert_eq!(
            p,
            Predicate::SustainedTurnover(SustainedTurnover {
                days: 5,
                min_turnover: 50_000_000_000.0
            })
        );

        let p = parse(&["limit-down"]).scan.predicate().unwrap();
        assert_eq!(p, Predicate::LimitMove(LimitMove::down()));

        let p = parse(&["breakout"]).scan.predicate().unwrap();
        assert_eq!(
            p,
            Predicate::BreakoutConsolidation(BreakoutConsolidation::default())
        );

        let p = parse(&["inverse-hs"]).scan.predicate().unwrap();
        assert_eq!(
            p,
            Predicate::InverseHeadAndShoulders(InverseHeadAndShoulders::default())
        );

        assert!(parse(&["inverse-hs", "--lookback", "20"])
            .scan
            .predicate()
            .is_err());
    }
}
