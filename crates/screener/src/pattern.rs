use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::{data::DailyBar, errors::ErrorRepr};

/// 1,000억원
pub const DEFAULT_MIN_TURNOVER: f64 = 100_000_000_000.0;
/// KRX daily price limit is 30%, rounded prices rarely print exactly 30.
pub const LIMIT_MOVE_THRESHOLD: f64 = 29.5;

/// Summary numbers a pattern computes for one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Metric {
    Turnover {
        turnover: f64,
    },
    SustainedTurnover {
        avg_turnover: f64,
        /// start-to-end close return over the window, in percent
        cumulative_return: f64,
    },
    LimitMove {
        pct_change: f64,
    },
    Breakout {
        spike_pct_change: f64,
        consolidation_mean: f64,
    },
    InverseHeadAndShoulders {
        left: f64,
        head: f64,
        right: f64,
    },
}

impl Metric {
    pub fn value(&self) -> f64 {
        use Metric::*;

        match *self {
            Turnover { turnover } => turnover,
            SustainedTurnover { avg_turnover, .. } => avg_turnover,
            LimitMove { pct_change } => pct_change,
            Breakout {
                spike_pct_change, ..
            } => spike_pct_change,
            InverseHeadAndShoulders { head, right, .. } => (right - head) / head * 100.0,
        }
    }

    /// Larger is better. Limit-down moves rank by magnitude.
    pub fn rank_key(&self) -> f64 {
        match self {
            Metric::LimitMove { pct_change } => pct_change.abs(),
            _ => self.value(),
        }
    }
}

pub trait Pattern {
    /// Bars of history the pattern needs; shorter series are never inspected.
    fn min_bars(&self) -> usize;

    /// `bars` is exactly the most recent `min_bars()` bars, oldest first.
    fn inspect(&self, bars: &[DailyBar]) -> (bool, Metric);

    fn check(&self) -> Result<(), ErrorRepr> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TopTurnover;

impl Pattern for TopTurnover {
    fn min_bars(&self) -> usize {
        1
    }

    fn inspect(&self, bars: &[DailyBar]) -> (bool, Metric) {
        let turnover = bars.last().map_or(0.0, |b| b.turnover);
        (true, Metric::Turnover { turnover })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default, build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct SustainedTurnover {
    pub days: usize,
    pub min_turnover: f64,
}

impl Default for SustainedTurnover {
    fn default() -> Self {
        Self {
            days: 3,
            min_turnover: DEFAULT_MIN_TURNOVER,
        }
    }
}

impl SustainedTurnoverBuilder {
    fn validate(&self) -> Result<(), String> {
        let d = SustainedTurnover::default();
        SustainedTurnover {
            days: self.days.unwrap_or(d.days),
            min_turnover: self.min_turnover.unwrap_or(d.min_turnover),
        }
        .check()
        .map_err(|e| e.to_string())
    }
}

impl Pattern for SustainedTurnover {
    fn min_bars(&self) -> usize {
        self.days
    }

    fn inspect(&self, bars: &[DailyBar]) -> (bool, Metric) {
        let matched = bars.iter().all(|b| b.turnover >= self.min_turnover);
        let avg_turnover = bars.iter().map(|b| b.turnover).sum::<f64>() / bars.len() as f64;

        let cumulative_return = match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => (last.close - first.close) / first.close * 100.0,
            _ => 0.0,
        };

        (
            matched,
            Metric::SustainedTurnover {
                avg_turnover,
                cumulative_return,
            },
        )
    }

    fn check(&self) -> Result<(), ErrorRepr> {
        if self.days == 0 {
            return Err(ErrorRepr::InvalidParams("days must be positive".into()));
        }
        if !self.min_turnover.is_finite() {
            return Err(ErrorRepr::InvalidParams(format!(
                "min_turnover {}",
                self.min_turnover
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default)]
#[serde(default)]
pub struct LimitMove {
    pub direction: Direction,
    pub threshold: f64,
}

impl Default for LimitMove {
    fn default() -> Self {
        Self {
            direction: Direction::Up,
            threshold: LIMIT_MOVE_THRESHOLD,
        }
    }
}

impl LimitMove {
    pub fn up() -> Self {
        Self::default()
    }

    pub fn down() -> Self {
        Self {
            direction: Direction::Down,
            ..Self::default()
        }
    }
}

impl Pattern for LimitMove {
    fn min_bars(&self) -> usize {
        1
    }

    fn inspect(&self, bars: &[DailyBar]) -> (bool, Metric) {
        let pct_change = bars.last().map_or(0.0, |b| b.pct_change);
        let matched = match self.direction {
            Direction::Up => pct_change >= self.threshold,
            Direction::Down => pct_change <= -self.threshold,
        };
        (matched, Metric::LimitMove { pct_change })
    }

    fn check(&self) -> Result<(), ErrorRepr> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(ErrorRepr::InvalidParams(format!(
                "limit threshold {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// A big up day `spike_lookback` sessions ago, flat trading since.
#[derive(Debug, Clone, Copy, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default, build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct BreakoutConsolidation {
    pub spike_lookback: usize,
    pub spike_threshold: f64,
    pub consolidation_window: usize,
    pub consolidation_band: f64,
}

impl Default for BreakoutConsolidation {
    fn default() -> Self {
        Self {
            spike_lookback: 4,
            spike_threshold: 15.0,
            consolidation_window: 3,
            consolidation_band: 5.0,
        }
    }
}

impl BreakoutConsolidationBuilder {
    fn validate(&self) -> Result<(), String> {
        let d = BreakoutConsolidation::default();
        BreakoutConsolidation {
            spike_lookback: self.spike_lookback.unwrap_or(d.spike_lookback),
            spike_threshold: self.spike_threshold.unwrap_or(d.spike_threshold),
            consolidation_window: self.consolidation_window.unwrap_or(d.consolidation_window),
            consolidation_band: self.consolidation_band.unwrap_or(d.consolidation_band),
        }
        .check()
        .map_err(|e| e.to_string())
    }
}

impl Pattern for BreakoutConsolidation {
    fn min_bars(&self) -> usize {
        (self.spike_lookback + 1).max(self.consolidation_window)
    }

    fn inspect(&self, bars: &[DailyBar]) -> (bool, Metric) {
        let n = bars.len();
        let spike_pct_change = bars[n - 1 - self.spike_lookback].pct_change;

        let recent = &bars[n - self.consolidation_window..];
        let consolidation_mean =
            recent.iter().map(|b| b.pct_change).sum::<f64>() / recent.len() as f64;

        let matched = spike_pct_change >= self.spike_threshold
            && consolidation_mean.abs() <= self.consolidation_band;

        (
            matched,
            Metric::Breakout {
                spike_pct_change,
                consolidation_mean,
            },
        )
    }

    fn check(&self) -> Result<(), ErrorRepr> {
        if self.spike_lookback == 0 || self.consolidation_window == 0 {
            return Err(ErrorRepr::InvalidParams(
                "spike_lookback and consolidation_window must be positive".into(),
            ));
        }
        if self.consolidation_window > self.spike_lookback {
            return Err(ErrorRepr::InvalidParams(format!(
                "consolidation window {} overlaps the spike bar {} sessions back",
                self.consolidation_window, self.spike_lookback
            )));
        }
        if !self.consolidation_band.is_finite() || self.consolidation_band < 0.0 {
            return Err(ErrorRepr::InvalidParams(format!(
                "consolidation band {}",
                self.consolidation_band
            )));
        }
        Ok(())
    }
}

/// Three equal segments of closes: left shoulder, head, right shoulder.
#[derive(Debug, Clone, Copy, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default, build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct InverseHeadAndShoulders {
    pub lookback: usize,
    pub right_shoulder_tolerance: f64,
}

impl Default for InverseHeadAndShoulders {
    fn default() -> Self {
        Self {
            lookback: 30,
            right_shoulder_tolerance: 1.07,
        }
    }
}

impl InverseHeadAndShouldersBuilder {
    fn validate(&self) -> Result<(), String> {
        let d = InverseHeadAndShoulders::default();
        InverseHeadAndShoulders {
            lookback: self.lookback.unwrap_or(d.lookback),
            right_shoulder_tolerance: self
                .right_shoulder_tolerance
                .unwrap_or(d.right_shoulder_tolerance),
        }
        .check()
        .map_err(|e| e.to_string())
    }
}

impl Pattern for InverseHeadAndShoulders {
    fn min_bars(&self) -> usize {
        self.lookback
    }

    fn inspect(&self, bars: &[DailyBar]) -> (bool, Metric) {
        let seg = bars.len() / 3;
        let trough = |i: usize| {
            bars[i * seg..(i + 1) * seg]
                .iter()
                .map(|b| b.close)
                .fold(f64::INFINITY, f64::min)
        };
        let (left, head, right) = (trough(0), trough(1), trough(2));
        let last = bars.last().map_or(0.0, |b| b.close);

        let matched = head < left
            && head < right
            && last >= right
            && last <= right * self.right_shoulder_tolerance;

        (matched, Metric::InverseHeadAndShoulders { left, head, right })
    }

    fn check(&self) -> Result<(), ErrorRepr> {
        if self.lookback == 0 || self.lookback % 3 != 0 {
            return Err(ErrorRepr::InvalidParams(format!(
                "lookback must be a positive multiple of 3, got {}",
                self.lookback
            )));
        }
        if !self.right_shoulder_tolerance.is_finite() || self.right_shoulder_tolerance < 1.0 {
            return Err(ErrorRepr::InvalidParams(format!(
                "right shoulder tolerance {}",
                self.right_shoulder_tolerance
            )));
        }
        Ok(())
    }
}

/// The scans a dashboard can run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    #[default]
    TopTurnover,
    SustainedTurnover(SustainedTurnover),
    LimitMove(LimitMove),
    BreakoutConsolidation(BreakoutConsolidation),
    InverseHeadAndShoulders(InverseHeadAndShoulders),
}

impl Predicate {
    fn as_pattern(&self) -> &dyn Pattern {
        match self {
            Predicate::TopTurnover => &TopTurnover,
            Predicate::SustainedTurnover(p) => p,
            Predicate::LimitMove(p) => p,
            Predicate::BreakoutConsolidation(p) => p,
            Predicate::InverseHeadAndShoulders(p) => p,
        }
    }

    pub fn title(&self) -> String {
        match self {
            Predicate::TopTurnover => "top turnover".into(),
            Predicate::SustainedTurnover(p) => format!("{}-day sustained turnover", p.days),
            Predicate::LimitMove(LimitMove {
                direction: Direction::Up,
                ..
            }) => "limit up".into(),
            Predicate::LimitMove(_) => "limit down".into(),
            Predicate::BreakoutConsolidation(_) => "breakout and consolidation".into(),
            Predicate::InverseHeadAndShoulders(_) => "inverse head and shoulders".into(),
        }
    }
}

impl Pattern for Predicate {
    fn min_bars(&self) -> usize {
        self.as_pattern().min_bars()
    }

    fn inspect(&self, bars: &[DailyBar]) -> (bool, Metric) {
        self.as_pattern().inspect(bars)
    }

    fn check(&self) -> Result<(), ErrorRepr> {
        self.as_pattern().check()
    }
}
