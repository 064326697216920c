use screener::{pattern::Metric, scan::ScanResult};

pub const EOK: f64 = 100_000_000.0;
const EOK_PER_JO: i64 = 10_000;

fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    out
}

/// KRW amount in 조/억 units, e.g. `1조 2,265억`. Below 1억 prints plain 원.
pub fn format_krw(won: f64) -> String {
    let eok = (won / EOK).round() as i64;
    if eok.abs() >= EOK_PER_JO {
        let (jo, rem) = (eok / EOK_PER_JO, (eok % EOK_PER_JO).abs());
        if rem == 0 {
            format!("{}조", thousands(jo))
        } else {
            format!("{}조 {}억", thousands(jo), thousands(rem))
        }
    } else if eok != 0 {
        format!("{}억", thousands(eok))
    } else {
        format!("{}원", thousands(won.round() as i64))
    }
}

pub fn describe(metric: &Metric) -> String {
    match *metric {
        Metric::Turnover { turnover } => format_krw(turnover),
        Metric::SustainedTurnover {
            avg_turnover,
            cumulative_return,
        } => format!("avg {} / {:+.2}%", format_krw(avg_turnover), cumulative_return),
        Metric::LimitMove { pct_change } => format!("{:+.2}%", pct_change),
        Metric::Breakout {
            spike_pct_change,
            consolidation_mean,
        } => format!(
            "spike {:+.2}% / since {:+.2}%",
            spike_pct_change, consolidation_mean
        ),
        Metric::InverseHeadAndShoulders { left, head, right } => format!(
            "L {} / H {} / R {}",
            thousands(left.round() as i64),
            thousands(head.round() as i64),
            thousands(right.round() as i64)
        ),
    }
}

pub fn render_table(title: &str, rows: &[ScanResult]) -> String {
    let mut out = format!("--- {} ({}) ---\n", title, rows.len());
    out += &format!(
        "{:>4}  {:<8} {:<16} {:>12} {:>8}  {}\n",
        "#", "ticker", "name", "close", "chg", "metric"
    );
    for (i, r) in rows.iter().enumerate() {
        out += &format!(
            "{:>4}  {:<8} {:<16} {:>12} {:>7.2}%  {}\n",
            i + 1,
            r.sym,
            r.name,
            thousands(r.last_close.round() as i64),
            r.last_pct_change,
            describe(&r.metric)
        );
    }
    if rows.is_empty() {
        out += "      (no match)\n";
    }
    out
}
