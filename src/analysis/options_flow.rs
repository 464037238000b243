//! Synthetic options order flow and its premium summary

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

pub const FLOW_COUNT: usize = 15;
/// Premium above which a print is flagged unusual
pub const UNUSUAL_PREMIUM: u64 = 300_000;

const EXPIRIES: [&str; 4] = ["Weekly", "2W", "Monthly", "Quarterly"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionKind {
    Call,
    Put,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlowSentiment {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionFlow {
    pub id: usize,
    pub time: DateTime<Utc>,
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: OptionKind,
    pub strike: i64,
    pub expiry: String,
    pub premium: u64,
    pub sentiment: FlowSentiment,
    pub size: u32,
    pub unusual: bool,
    pub sweep: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowSummary {
    pub call_premium: u64,
    pub put_premium: u64,
    /// Call over put premium; `None` without put premium
    pub ratio: Option<f64>,
    pub bullish_pct: u32,
    pub bearish_pct: u32,
    pub unusual_count: usize,
    pub net_flow: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowBoard {
    pub symbol: String,
    pub flows: Vec<OptionFlow>,
    pub summary: FlowSummary,
}

/// (center, half-width) of the strike ladder
fn strike_ladder(symbol: &str) -> (i64, i64) {
    match symbol {
        "SPY" => (600, 10),
        "QQQ" => (520, 10),
        "GLD" => (240, 5),
        _ => (100, 0),
    }
}

/// Newest first, five minutes apart
pub fn generate<R: Rng + ?Sized>(symbol: &str, now: DateTime<Utc>, rng: &mut R) -> Vec<OptionFlow> {
    let symbol = symbol.to_ascii_uppercase();
    let (center, width) = strike_ladder(&symbol);

    (0..FLOW_COUNT)
        .map(|i| {
            let kind = if rng.gen_bool(0.55) { OptionKind::Call } else { OptionKind::Put };
            let bullish = match kind {
                OptionKind::Call => rng.gen_bool(0.7),
                OptionKind::Put => rng.gen_bool(0.3),
            };
            let premium = rng.gen_range(50_000..550_000u64);
            let strike = if width > 0 {
                center + rng.gen_range(-width..width)
            } else {
                center
            };

            OptionFlow {
                id: i,
                time: now - Duration::minutes(5 * i as i64),
                symbol: symbol.clone(),
                kind,
                strike,
                expiry: EXPIRIES.choose(rng).copied().unwrap_or("Weekly").to_string(),
                premium,
                sentiment: if bullish { FlowSentiment::Bullish } else { FlowSentiment::Bearish },
                size: rng.gen_range(100..5_100),
                unusual: premium > UNUSUAL_PREMIUM,
                sweep: rng.gen_bool(0.3),
            }
        })
        .collect()
}

pub fn summarize(flows: &[OptionFlow]) -> FlowSummary {
    let premium_of = |kind: OptionKind| {
        flows
            .iter()
            .filter(|f| f.kind == kind)
            .map(|f| f.premium)
            .sum::<u64>()
    };
    let call_premium = premium_of(OptionKind::Call);
    let put_premium = premium_of(OptionKind::Put);

    let pct = |sentiment: FlowSentiment| {
        if flows.is_empty() {
            return 0;
        }
        let n = flows.iter().filter(|f| f.sentiment == sentiment).count();
        ((n as f64 / flows.len() as f64) * 100.0).round() as u32
    };

    FlowSummary {
        call_premium,
        put_premium,
        ratio: if put_premium > 0 {
            Some((call_premium as f64 / put_premium as f64 * 100.0).round() / 100.0)
        } else {
            None
        },
        bullish_pct: pct(FlowSentiment::Bullish),
        bearish_pct: pct(FlowSentiment::Bearish),
        unusual_count: flows.iter().filter(|f| f.unusual).count(),
        net_flow: call_premium as i64 - put_premium as i64,
    }
}

pub fn board<R: Rng + ?Sized>(symbol: &str, now: DateTime<Utc>, rng: &mut R) -> FlowBoard {
    let flows = generate(symbol, now, rng);
    FlowBoard {
        symbol: symbol.to_ascii_uppercase(),
        summary: summarize(&flows),
        flows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_flow_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let now = Utc::now();
        let flows = generate("spy", now, &mut rng);

        assert_eq!(flows.len(), FLOW_COUNT);
        for (i, flow) in flows.iter().enumerate() {
            assert_eq!(flow.symbol, "SPY");
            assert!((590..610).contains(&flow.strike));
            assert!((50_000..550_000).contains(&flow.premium));
            assert_eq!(flow.unusual, flow.premium > UNUSUAL_PREMIUM);
            assert_eq!(flow.time, now - Duration::minutes(5 * i as i64));
        }
    }

    #[test]
    fn test_unknown_symbol_flat_strike() {
        let mut rng = StdRng::seed_from_u64(2);
        assert!(generate("IWM", Utc::now(), &mut rng).iter().all(|f| f.strike == 100));
    }

    #[test]
    fn test_summary() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut flows = generate("QQQ", Utc::now(), &mut rng);
        for (i, f) in flows.iter_mut().enumerate() {
            f.kind = if i < 10 { OptionKind::Call } else { OptionKind::Put };
            f.sentiment = if i < 12 { FlowSentiment::Bullish } else { FlowSentiment::Bearish };
            f.premium = 100_000;
            f.unusual = false;
        }

        let s = summarize(&flows);
        assert_eq!(s.call_premium, 1_000_000);
        assert_eq!(s.put_premium, 500_000);
        assert_eq!(s.ratio, Some(2.0));
        assert_eq!(s.bullish_pct, 80);
        assert_eq!(s.bearish_pct, 20);
        assert_eq!(s.net_flow, 500_000);
        assert_eq!(s.unusual_count, 0);
    }

    #[test]
    fn test_summary_without_puts() {
        let s = summarize(&[]);
        assert_eq!(s.ratio, None);
        assert_eq!(s.bullish_pct, 0);
    }
}
