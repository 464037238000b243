//! Monte Carlo report export: a plain-text metrics sheet and equity curves as CSV

use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::montecarlo::MonteCarloResult;

fn pct(v: f64) -> String {
    format!("{:.2}%", v)
}

fn money(v: f64) -> String {
    format!("${:.2}", v)
}

fn opt(v: Option<f64>, f: fn(f64) -> String) -> String {
    v.map(f).unwrap_or_else(|| "n/a".to_string())
}

/// Two-column table of parameters, derived metrics and outcome statistics
pub fn render_text(result: &MonteCarloResult, title: &str, generated: DateTime<Utc>) -> String {
    let p = &result.params;
    let m = &result.metrics;

    let sections: [(&str, Vec<(&str, String)>); 3] = [
        (
            "Parameters",
            vec![
                ("Win rate", pct(p.win_rate * 100.0)),
                ("Average win", format!("{:.2}R", p.avg_win)),
                ("Average loss", format!("{:.2}R", p.avg_loss)),
                ("Risk per trade", pct(p.risk_per_trade * 100.0)),
                ("Initial capital", money(p.initial_capital)),
                ("Trades per run", p.num_trades.to_string()),
                ("Simulations", result.simulations.to_string()),
                ("Seed", result.seed.to_string()),
            ],
        ),
        (
            "Edge",
            vec![
                ("Expectancy", format!("{:.4}R", m.expectancy)),
                ("Profit factor", opt(m.profit_factor, |v| format!("{:.2}", v))),
                ("Payoff ratio", opt(m.payoff_ratio, |v| format!("{:.2}", v))),
                ("Breakeven win rate", opt(m.breakeven_win_rate, |v| pct(v * 100.0))),
                ("Kelly fraction", pct(m.kelly_fraction * 100.0)),
                ("Half Kelly", pct(m.half_kelly * 100.0)),
            ],
        ),
        (
            "Outcomes",
            vec![
                ("Average final capital", money(result.avg_final_capital)),
                ("Median final capital", money(result.median_final_capital)),
                ("5th percentile", money(result.p5_final_capital)),
                ("95th percentile", money(result.p95_final_capital)),
                ("Best run", money(result.max_final_capital)),
                ("Worst run", money(result.min_final_capital)),
                ("Profitable runs", pct(result.profitable_rate)),
                ("Bankruptcy rate", pct(result.bankruptcy_rate)),
                ("Avg max drawdown", pct(result.avg_max_drawdown_pct)),
            ],
        ),
    ];

    let width = sections
        .iter()
        .flat_map(|(_, rows)| rows.iter().map(|(k, _)| k.len()))
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let rule = "=".repeat(title.len().max(40));
    let _ = writeln!(out, "{}\n{}\n{}", rule, title, rule);
    let _ = writeln!(out, "Generated {}", generated.format("%Y-%m-%d %H:%M UTC"));

    for (heading, rows) in sections.iter() {
        let _ = writeln!(out, "\n{}\n{}", heading, "-".repeat(heading.len()));
        for (key, value) in rows {
            let _ = writeln!(out, "  {:<width$}  {:>14}", key, value, width = width);
        }
    }
    out
}

/// One row per trade index, one column per curve. Curves that stopped early
/// (bankruptcy) leave empty cells.
pub fn write_curves_csv<W: Write>(result: &MonteCarloResult, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec!["trade".to_string()];
    header.extend((1..=result.equity_curves.len()).map(|i| format!("curve_{}", i)));
    csv.write_record(&header).context("Failed to write CSV header")?;

    let rows = result.equity_curves.iter().map(Vec::len).max().unwrap_or(0);
    for idx in 0..rows {
        let mut record = Vec::with_capacity(header.len());
        record.push(idx.to_string());
        for curve in &result.equity_curves {
            record.push(curve.get(idx).map(|v| format!("{:.2}", v)).unwrap_or_default());
        }
        csv.write_record(&record)
            .with_context(|| format!("Failed to write CSV row {}", idx))?;
    }

    csv.flush().context("Failed to flush CSV")?;
    Ok(())
}

pub fn export_curves(result: &MonteCarloResult, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    write_curves_csv(result, file)
}

pub fn export_text(result: &MonteCarloResult, title: &str, path: &Path) -> Result<()> {
    std::fs::write(path, render_text(result, title, Utc::now()))
        .with_context(|| format!("Failed to write {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::montecarlo::{simulate, MonteCarloParams};

    fn sample() -> MonteCarloResult {
        let mut params = MonteCarloParams::new(0.55, 2.0, 1.0);
        params.num_trades = 50;
        params.simulations = Some(5);
        params.seed = Some(7);
        simulate(&params, 5).unwrap()
    }

    #[test]
    fn test_text_report_sections() {
        let text = render_text(&sample(), "Karion Monte Carlo Report", Utc::now());
        assert!(text.contains("Karion Monte Carlo Report"));
        assert!(text.contains("Expectancy"));
        assert!(text.contains("0.6500R"));
        assert!(text.contains("Bankruptcy rate"));
        assert!(text.contains("Seed"));
    }

    #[test]
    fn test_csv_shape() {
        let result = sample();
        let mut buf = Vec::new();
        write_curves_csv(&result, &mut buf).unwrap();

        let mut reader = csv::Reader::from_reader(buf.as_slice());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 1 + result.equity_curves.len());
        assert_eq!(&headers[0], "trade");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        // Initial capital plus one point per trade
        assert_eq!(rows.len(), 51);
        assert_eq!(&rows[0][1], "10000.00");
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curves.csv");
        export_curves(&sample(), &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("trade,curve_1"));
    }
}
