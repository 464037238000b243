//! Multi-source directional bias
//!
//! Blends four sources per asset, each scored in [-1, 1]: VIX regime, macro,
//! news flow and COT positioning. Only the VIX source is observed; the other
//! three are sampled inside fixed bands around it. The weighted sum goes
//! through a logistic to give the probability of an up move.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::events::{next_event, UpcomingEvent};
use crate::market::quotes::{round_to, VOLATILITY_INDEX};
use crate::market::{MarketQuote, VixDirection, VixSnapshot};
use crate::types::{Bias, Regime};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceWeights {
    pub vix: f64,
    pub macro_: f64,
    pub news: f64,
    pub cot: f64,
}

/// Gold leans on macro, the dollar on macro and news, indices on the VIX
pub fn weights_for(symbol: &str) -> SourceWeights {
    match symbol {
        "XAU" => SourceWeights { vix: 0.20, macro_: 0.35, news: 0.25, cot: 0.20 },
        "DXY" => SourceWeights { vix: 0.15, macro_: 0.35, news: 0.30, cot: 0.20 },
        _ => SourceWeights { vix: 0.35, macro_: 0.30, news: 0.20, cot: 0.15 },
    }
}

/// VIX level band score with a momentum adjustment
pub fn vix_component(level: f64, change: f64) -> f64 {
    let base = if level < 14.0 {
        0.8
    } else if level < 18.0 {
        0.5
    } else if level < 22.0 {
        0.1
    } else if level < 28.0 {
        -0.4
    } else {
        -0.8
    };

    let momentum = if change > 8.0 {
        -0.4
    } else if change > 4.0 {
        -0.2
    } else if change < -8.0 {
        0.4
    } else if change < -4.0 {
        0.2
    } else {
        0.0
    };

    base + momentum
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceScores {
    pub vix: f64,
    #[serde(rename = "macro")]
    pub macro_: f64,
    pub news: f64,
    pub cot: f64,
}

impl SourceScores {
    /// Sample the unobserved sources around a known VIX score
    pub fn sample<R: Rng + ?Sized>(symbol: &str, vix: f64, rng: &mut R) -> Self {
        let macro_ = match symbol {
            // Gold benefits from risk-off
            "XAU" => -vix * 0.5 + rng.gen_range(-0.1..0.1),
            "DXY" => rng.gen_range(-0.2..0.2),
            _ => vix * 0.3 + rng.gen_range(-0.1..0.1),
        };

        Self {
            vix,
            macro_,
            news: rng.gen_range(-0.15..0.15),
            cot: rng.gen_range(-0.2..0.2),
        }
    }

    pub fn combine(&self, w: &SourceWeights) -> f64 {
        w.vix * self.vix + w.macro_ * self.macro_ + w.news * self.news + w.cot * self.cot
    }
}

/// floor(100 / (1 + e^(-4s)))
pub fn p_up(score: f64) -> u8 {
    (100.0 / (1.0 + (-4.0 * score).exp())).floor() as u8
}

/// Falls by 15 (floor 30) when the VIX moved more than 5%
pub fn confidence(score: f64, vix_change: f64) -> u8 {
    let mut c = (50.0 + score.abs() * 45.0).floor().min(95.0) as u8;
    if vix_change.abs() > 5.0 {
        c = c.saturating_sub(15).max(30);
    }
    c
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketDirection {
    Up,
    Down,
    Neutral,
}

impl MarketDirection {
    pub fn from_p_up(p: u8) -> Self {
        if p >= 58 {
            MarketDirection::Up
        } else if p <= 42 {
            MarketDirection::Down
        } else {
            MarketDirection::Neutral
        }
    }

    pub fn bias(self) -> Bias {
        match self {
            MarketDirection::Up => Bias::Bullish,
            MarketDirection::Down => Bias::Bearish,
            MarketDirection::Neutral => Bias::Neutral,
        }
    }
}

/// How the score moved since the previous evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Impulse {
    Continues,
    Fading,
    Reversing,
}

pub fn impulse(score: f64, prev: f64) -> Impulse {
    let delta = score - prev;
    if delta.abs() < 0.03 {
        Impulse::Continues
    } else if (score > 0.0 && delta < -0.05) || (score < 0.0 && delta > 0.05) {
        Impulse::Fading
    } else if delta.abs() > 0.1 && score * prev < 0.0 {
        Impulse::Reversing
    } else {
        Impulse::Continues
    }
}

/// Regime label as the bias panel shows it
pub fn bias_regime(vix: f64, change: f64) -> Regime {
    if vix < 18.0 && change < 2.0 {
        Regime::RiskOn
    } else if vix > 22.0 || change > 5.0 {
        Regime::RiskOff
    } else {
        Regime::Neutral
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub name: String,
    /// "bullish" or "bearish"
    pub impact: String,
    pub detail: String,
}

fn driver(name: &str, score: f64, detail: String) -> Driver {
    Driver {
        name: name.to_string(),
        impact: if score > 0.0 { "bullish" } else { "bearish" }.to_string(),
        detail,
    }
}

fn direction_label(direction: VixDirection) -> &'static str {
    match direction {
        VixDirection::Rising => "rising",
        VixDirection::Falling => "falling",
        VixDirection::Stable => "stable",
    }
}

/// Up to three sources that moved the score the most
pub fn drivers(scores: &SourceScores, w: &SourceWeights, vix: &VixSnapshot) -> Vec<Driver> {
    let mut out = Vec::new();
    if (w.vix * scores.vix).abs() > 0.08 {
        out.push(driver(
            "VIX/Regime",
            scores.vix,
            format!("VIX {:.1} ({})", vix.current, direction_label(vix.direction)),
        ));
    }
    if (w.macro_ * scores.macro_).abs() > 0.05 {
        out.push(driver("Macro", scores.macro_, "Rates/Yields".to_string()));
    }
    if (w.news * scores.news).abs() > 0.03 {
        out.push(driver("News Flow", scores.news, "Recent sentiment".to_string()));
    }
    if out.len() < 2 {
        out.push(driver("COT Positioning", scores.cot, "Weekly bias".to_string()));
    }
    out.truncate(3);
    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetAnalysis {
    pub symbol: String,
    pub price: f64,
    pub direction: MarketDirection,
    pub bias: Bias,
    pub p_up: u8,
    pub confidence: u8,
    pub impulse: Impulse,
    pub drivers: Vec<Driver>,
    pub invalidation: String,
    pub regime: Regime,
    pub trade_ready: bool,
    pub total_score: f64,
    pub scores: SourceScores,
    pub last_update: DateTime<Utc>,
}

/// Full multi-source panel
#[derive(Debug, Clone, Serialize)]
pub struct MultiSourceReport {
    pub analyses: BTreeMap<String, AssetAnalysis>,
    pub vix: VixSnapshot,
    pub regime: Regime,
    pub next_event: Option<UpcomingEvent>,
    pub timestamp: DateTime<Utc>,
}

/// Remembers the previous score per asset to label the impulse
#[derive(Debug, Default)]
pub struct BiasEngine {
    prev_scores: HashMap<String, f64>,
}

impl BiasEngine {
    pub fn previous_score(&self, symbol: &str) -> Option<f64> {
        self.prev_scores.get(symbol).copied()
    }

    pub fn analyze<R: Rng + ?Sized>(
        &mut self,
        quote: &MarketQuote,
        vix: &VixSnapshot,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> AssetAnalysis {
        let weights = weights_for(&quote.symbol);
        let scores = SourceScores::sample(&quote.symbol, vix_component(vix.current, vix.change), rng);
        let total = scores.combine(&weights);

        let p = p_up(total);
        let conf = confidence(total, vix.change);
        let direction = MarketDirection::from_p_up(p);

        let prev = self.prev_scores.insert(quote.symbol.clone(), total).unwrap_or(total);
        let impulse = impulse(total, prev);

        let invalidation = match direction {
            MarketDirection::Up => format!("Below {:.2}", quote.price * 0.995),
            MarketDirection::Down => format!("Above {:.2}", quote.price * 1.005),
            MarketDirection::Neutral => "Wait for a directional breakout".to_string(),
        };

        AssetAnalysis {
            symbol: quote.symbol.clone(),
            price: quote.price,
            direction,
            bias: direction.bias(),
            p_up: p,
            confidence: conf,
            impulse,
            drivers: drivers(&scores, &weights, vix),
            invalidation,
            regime: bias_regime(vix.current, vix.change),
            trade_ready: (p >= 60 || p <= 40) && conf >= 65 && impulse != Impulse::Reversing,
            total_score: round_to(total, 4),
            scores,
            last_update: now,
        }
    }

    /// Analyze every tradable quote
    pub fn report<R: Rng + ?Sized>(
        &mut self,
        quotes: &[MarketQuote],
        vix: &VixSnapshot,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> MultiSourceReport {
        let analyses = quotes
            .iter()
            .filter(|q| q.symbol != VOLATILITY_INDEX)
            .map(|q| (q.symbol.clone(), self.analyze(q, vix, now, rng)))
            .collect();

        MultiSourceReport {
            analyses,
            vix: vix.clone(),
            regime: vix.regime,
            next_event: next_event(now, false),
            timestamp: now,
        }
    }
}
