pub mod data;
pub mod errors;
pub mod pattern;
pub mod scan;

#[cfg(test)]
mod tests {
    use more_asserts::*;

    use crate::{
        data::{
            krx,
            tests::{build_bar, build_series},
            DailyBar, InstrumentSeries, Market,
        },
        errors::ErrorRepr,
        pattern::*,
        scan::scan,
    };

    fn all_predicates() -> Vec<Predicate> {
        vec![
            Predicate::TopTurnover,
            Predicate::SustainedTurnover(SustainedTurnover {
                days: 3,
                min_turnover: 0.0,
            }),
            Predicate::LimitMove(LimitMove::up()),
            Predicate::LimitMove(LimitMove::down()),
            Predicate::BreakoutConsolidation(BreakoutConsolidation::default()),
            Predicate::InverseHeadAndShoulders(InverseHeadAndShoulders::default()),
        ]
    }

    /// Heavy, flat trading shaped like an inverse head and shoulders.
    fn build_everything_series(sym: &str, n: usize) -> InstrumentSeries {
        let bars: Vec<DailyBar> = (0..n)
            .map(|i| {
                let close = match i {
                    i if i < 10 => 100.0,
                    i if i < 20 => 80.0,
                    _ => 95.0,
                };
                build_bar(i as u32, close, 1e12, 0.0)
            })
            .collect();
        build_series(sym, bars)
    }

    #[test]
    fn test_short_series_never_included() {
        for p in all_predicates() {
            let need = p.min_bars();
            let short = build_everything_series("SHORT", need - 1);
            let report = scan(&[short], &p).unwrap();
            assert!(report.results.is_empty(), "{:?}", p);
            assert_eq!(
                report.skipped,
                vec![(
                    "SHORT".to_owned(),
                    ErrorRepr::InsufficientHistory {
                        need,
                        have: need - 1
                    }
                )]
            );
        }
    }

    #[test]
    fn test_idempotent() {
        let instruments: Vec<InstrumentSeries> = (25..=35)
            .map(|n| build_everything_series(&format!("S{}", n), n))
            .collect();

        for p in all_predicates() {
            let a = scan(&instruments, &p).unwrap();
            let b = scan(&instruments, &p).unwrap();
            assert_eq!(a, b);
            assert_eq!(a.ranked(Some(5)), b.ranked(Some(5)));
        }
    }

    #[test]
    fn test_breakout_scan() {
        let p = Predicate::BreakoutConsolidation(BreakoutConsolidation::default());
        let build = |sym: &str, tail: f64| {
            let mut bars = vec![
                build_bar(0, 100.0, 1.0, 2.0),
                build_bar(1, 115.0, 1.0, 15.0),
            ];
            bars.extend((2..6).map(|d| build_bar(d, 115.0, 1.0, tail)));
            build_series(sym, bars)
        };

        let report = scan(&[build("FLAT", 0.0), build("DRIFT", 5.01)], &p).unwrap();
        let syms: Vec<&str> = report.results.iter().map(|r| r.sym.as_str()).collect();
        assert_eq!(syms, vec!["FLAT"]);
    }

    #[test]
    fn test_inverse_head_and_shoulders_scan() {
        let mut closes = vec![100.0; 10];
        closes.extend([80.0; 10]);
        closes.extend([95.0; 9]);
        closes.push(96.0);

        // older bars outside the window do not matter
        let mut bars = vec![build_bar(0, 10.0, 1.0, 0.0)];
        bars.extend(
            closes
                .iter()
                .enumerate()
                .map(|(i, c)| build_bar(i as u32 + 1, *c, 1.0, 0.0)),
        );

        let p = Predicate::InverseHeadAndShoulders(InverseHeadAndShoulders::default());
        let report = scan(&[build_series("IHS", bars)], &p).unwrap();
        assert_eq!(report.results.len(), 1);

        let r = &report.results[0];
        assert_eq!(r.last_close, 96.0);
        assert_lt!((r.metric_value() - 18.75).abs(), 1e-9);
    }

    #[test]
    fn test_sustained_turnover_monotonic_scan() {
        let instruments: Vec<InstrumentSeries> = [50.0, 100.0, 150.0, 200.0]
            .iter()
            .enumerate()
            .map(|(i, t)| {
                build_series(
                    &format!("T{}", i),
                    (0..3).map(|d| build_bar(d, 10.0, *t + d as f64, 0.0)).collect(),
                )
            })
            .collect();

        let mut prev = 0;
        for t in [1000.0, 200.0, 150.0, 100.0, 50.0, 0.0] {
            let p = SustainedTurnover {
                days: 3,
                min_turnover: t,
            };
            let n = scan(&instruments, &p).unwrap().results.len();
            assert_ge!(n, prev);
            prev = n;
        }
        assert_eq!(prev, 4);
    }

    #[test]
    fn test_fixture_scan() {
        let s = krx::load_series("src/data/test/005930.csv", "005930", "삼성전자", Market::Kospi)
            .unwrap();

        let p = Predicate::SustainedTurnover(SustainedTurnover::default());
        let report = scan(&[s], &p).unwrap();
        assert_eq!(report.results.len(), 1);

        let Metric::SustainedTurnover {
            avg_turnover,
            cumulative_return,
        } = report.results[0].metric
        else {
            panic!("unexpected metric");
        };
        let expected_avg = (1_226_548_791_500.0 + 1_421_893_024_900.0 + 1_561_830_412_600.0) / 3.0;
        assert_lt!((avg_turnover - expected_avg).abs(), 1.0);
        assert_lt!(
            (cumulative_return - (73300.0 - 73900.0) / 73900.0 * 100.0).abs(),
            1e-9
        );
    }
}
