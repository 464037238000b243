//! Session risk score
//!
//! Four components of 0-25 points each are summed into a 0-100 score:
//! VIX level, VIX momentum, time to the next high-impact event, and how
//! stretched the tracked assets are toward their two-week extremes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::events::{next_event, NO_EVENT_HOURS};
use crate::market::quotes::{round_to, Extreme, VOLATILITY_INDEX};
use crate::market::{MarketQuote, PriceLevels, VixSnapshot};
use crate::types::Impact;

/// Trading days per year, for the VIX-implied daily move
const TRADING_DAYS: f64 = 252.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskCategory {
    Safe,
    Medium,
    High,
}

impl RiskCategory {
    pub fn from_score(score: u32) -> Self {
        if score >= 67 {
            RiskCategory::High
        } else if score >= 34 {
            RiskCategory::Medium
        } else {
            RiskCategory::Safe
        }
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskCategory::Safe => write!(f, "SAFE"),
            RiskCategory::Medium => write!(f, "MEDIUM"),
            RiskCategory::High => write!(f, "HIGH"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskComponents {
    pub vix_level: u32,
    pub vix_momentum: u32,
    pub event_risk: u32,
    pub market_stretch: u32,
}

impl RiskComponents {
    pub fn total(&self) -> u32 {
        self.vix_level + self.vix_momentum + self.event_risk + self.market_stretch
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReason {
    pub name: String,
    pub value: u32,
    pub desc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetStretch {
    pub current: f64,
    pub two_week_high: f64,
    pub two_week_low: f64,
    pub nearest_extreme: Extreme,
    pub distance_to_extreme: f64,
    pub change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedMove {
    /// One-sigma daily move in percent
    pub percent: f64,
    pub spx_points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetTilt {
    pub tilt: String,
    pub text: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextEvent {
    pub time: String,
    pub event: String,
    pub impact: Impact,
    pub hours_away: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAnalysis {
    pub risk_score: u32,
    pub risk_category: RiskCategory,
    pub vix: VixSnapshot,
    pub components: RiskComponents,
    pub reasons: Vec<RiskReason>,
    pub assets: BTreeMap<String, AssetStretch>,
    pub expected_move: ExpectedMove,
    pub next_event: Option<NextEvent>,
    pub asset_tilts: BTreeMap<String, AssetTilt>,
    pub timestamp: DateTime<Utc>,
}

pub fn vix_level_points(vix: f64) -> u32 {
    match vix {
        v if v >= 30.0 => 25,
        v if v >= 25.0 => 22,
        v if v >= 22.0 => 18,
        v if v >= 18.0 => 12,
        v if v >= 14.0 => 6,
        _ => 3,
    }
}

/// `change` is the VIX day change in percent
pub fn vix_momentum_points(change: f64) -> u32 {
    match change {
        c if c > 10.0 => 25,
        c if c > 6.0 => 22,
        c if c > 3.0 => 16,
        c if c >= -3.0 => 8,
        c if c >= -6.0 => 4,
        _ => 2,
    }
}

pub fn event_points(hours_to_event: u32) -> u32 {
    match hours_to_event {
        0..=1 => 25,
        2 => 22,
        3..=4 => 16,
        5..=8 => 10,
        9..=12 => 6,
        _ => 3,
    }
}

/// `distance` is the smallest percent distance of any asset to an extreme
pub fn stretch_points(distance: f64) -> u32 {
    match distance {
        d if d <= 0.25 => 25,
        d if d <= 0.5 => 20,
        d if d <= 0.75 => 15,
        d if d <= 1.0 => 10,
        d if d <= 1.5 => 6,
        _ => 3,
    }
}

fn tilt(tilt: &str, text: &str, color: &str) -> AssetTilt {
    AssetTilt {
        tilt: tilt.to_string(),
        text: text.to_string(),
        color: color.to_string(),
    }
}

/// Regime tilt for one tracked asset
pub fn asset_tilt(symbol: &str, vix_rising: bool) -> AssetTilt {
    match (symbol, vix_rising) {
        ("SPX" | "NDX", true) => tilt(
            "breakout-risk",
            "Rising VIX raises flush/breakout risk. Reduce contrarian aggression.",
            "red",
        ),
        ("SPX" | "NDX", false) => tilt(
            "mean-reversion",
            "Falling VIX favors rotation back toward the intraday center.",
            "green",
        ),
        ("XAU", true) => tilt("safe-haven", "Risk-off can support gold as a safe haven.", "yellow"),
        ("XAU", false) => tilt(
            "range",
            "Risk-on backdrop caps gold upside. Range-bound is more likely.",
            "green",
        ),
        ("DXY", true) => tilt(
            "bullish-bias",
            "Rising VIX means stress. The dollar tends to firm up.",
            "red",
        ),
        ("DXY", false) => tilt(
            "pullback-possible",
            "Falling VIX means risk-on. Dollar pullbacks are more plausible.",
            "green",
        ),
        (_, true) => tilt("defensive", "Volatility rising. Size down.", "yellow"),
        (_, false) => tilt("neutral", "No regime tilt.", "green"),
    }
}

/// Score the session from the latest VIX reading, quotes and levels
pub fn analyze(
    vix: &VixSnapshot,
    quotes: &[MarketQuote],
    levels: &[PriceLevels],
    now: DateTime<Utc>,
) -> RiskAnalysis {
    let upcoming = next_event(now, true);
    let hours_to_event = upcoming.as_ref().map(|e| e.hours_away).unwrap_or(NO_EVENT_HOURS);

    let mut assets = BTreeMap::new();
    let mut min_distance = 100.0f64;
    for quote in quotes.iter().filter(|q| q.symbol != VOLATILITY_INDEX) {
        let Some(lv) = levels.iter().find(|l| l.symbol == quote.symbol) else {
            continue;
        };
        let (extreme, distance) = lv.nearest_extreme(quote.price);
        min_distance = min_distance.min(distance);
        assets.insert(
            quote.symbol.clone(),
            AssetStretch {
                current: quote.price,
                two_week_high: round_to(lv.two_week_high, 2),
                two_week_low: round_to(lv.two_week_low, 2),
                nearest_extreme: extreme,
                distance_to_extreme: round_to(distance, 2),
                change: quote.change_pct,
            },
        );
    }

    let components = RiskComponents {
        vix_level: vix_level_points(vix.current),
        vix_momentum: vix_momentum_points(vix.change),
        event_risk: event_points(hours_to_event),
        market_stretch: stretch_points(min_distance),
    };
    let risk_score = components.total();

    let sign = if vix.change > 0.0 { "+" } else { "" };
    let mut ranked = vec![
        RiskReason {
            name: "VIX Level".to_string(),
            value: components.vix_level,
            desc: format!("VIX at {}", vix.current),
        },
        RiskReason {
            name: "VIX Momentum".to_string(),
            value: components.vix_momentum,
            desc: format!("VIX {}{:.1}%", sign, vix.change),
        },
        RiskReason {
            name: "Event Risk".to_string(),
            value: components.event_risk,
            desc: if hours_to_event <= 12 {
                format!("High-impact event in {}h", hours_to_event)
            } else {
                "No imminent events".to_string()
            },
        },
        RiskReason {
            name: "Market Stretch".to_string(),
            value: components.market_stretch,
            desc: format!("Asset {:.2}% from a 2W extreme", min_distance),
        },
    ];
    ranked.sort_by(|a, b| b.value.cmp(&a.value));
    let mut reasons: Vec<RiskReason> = ranked.iter().take(1).cloned().collect();
    if ranked[1].value >= 12 {
        reasons.push(ranked[1].clone());
    }

    let spx = quotes
        .iter()
        .find(|q| q.symbol == "SPX")
        .map(|q| q.price)
        .unwrap_or(6000.0);
    let daily_vol = vix.current / TRADING_DAYS.sqrt();
    let expected_move = ExpectedMove {
        percent: round_to(daily_vol, 2),
        spx_points: round_to(spx * daily_vol / 100.0, 1),
    };

    let vix_rising = vix.is_rising();
    let asset_tilts = assets
        .keys()
        .map(|symbol| (symbol.clone(), asset_tilt(symbol, vix_rising)))
        .collect();

    RiskAnalysis {
        risk_score,
        risk_category: RiskCategory::from_score(risk_score),
        vix: vix.clone(),
        components,
        reasons,
        assets,
        expected_move,
        next_event: upcoming.map(|e| NextEvent {
            time: e.event.time.to_string(),
            event: e.event.event.to_string(),
            impact: e.event.impact,
            hours_away: e.hours_away,
        }),
        asset_tilts,
        timestamp: now,
    }
}
