//! Mean-reversion setup generator
//!
//! Fires when price sits within a small distance of its two-week extreme and
//! proposes a trade back toward the range. The probability score is a base
//! value moved by fixed bonuses and penalties, then clamped.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::market::quotes::{round_to, Extreme, PriceLevels};
use crate::types::{Direction, Regime};

/// Holding horizon; each one is persisted under its own key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Horizon {
    Intraday,
    Short,
    Medium,
    Long,
}

impl Horizon {
    pub const ALL: [Horizon; 4] = [Horizon::Intraday, Horizon::Short, Horizon::Medium, Horizon::Long];

    /// File stem the horizon is persisted under
    pub fn storage_key(self) -> &'static str {
        match self {
            Horizon::Intraday => "karion_daily_signals",
            Horizon::Short => "karion_short_signals",
            Horizon::Medium => "karion_medium_signals",
            Horizon::Long => "karion_long_signals",
        }
    }

    fn probability_adjustment(self) -> i32 {
        match self {
            Horizon::Intraday => 0,
            Horizon::Short => 2,
            Horizon::Medium => 3,
            Horizon::Long => -4,
        }
    }

    /// Fraction of the way from entry to the range midpoint (long: to the far extreme)
    fn target_reach(self) -> f64 {
        match self {
            Horizon::Intraday => 0.5,
            Horizon::Short | Horizon::Medium => 1.0,
            Horizon::Long => 2.0,
        }
    }
}

impl std::str::FromStr for Horizon {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "intraday" | "daily" => Ok(Horizon::Intraday),
            "short" => Ok(Horizon::Short),
            "medium" => Ok(Horizon::Medium),
            "long" => Ok(Horizon::Long),
            other => Err(anyhow::anyhow!("unknown horizon: {}", other)),
        }
    }
}

/// A synthetic trade idea
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub asset: String,
    pub direction: Direction,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
    /// Always within the generator's clamp band
    pub probability: u8,
    pub motivation: Vec<String>,
    pub horizon: Horizon,
    pub day: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SignalConfig {
    /// Max distance to the extreme, percent
    pub proximity_pct: f64,
    /// Inside this distance the proximity bonus is larger
    pub strong_proximity_pct: f64,
    pub base_probability: i32,
    pub min_probability: u8,
    pub max_probability: u8,
    /// Stop distance beyond the extreme, percent
    pub stop_buffer_pct: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            proximity_pct: 0.5,
            strong_proximity_pct: 0.25,
            base_probability: 55,
            min_probability: 35,
            max_probability: 85,
            stop_buffer_pct: 0.3,
        }
    }
}

/// Inputs for one asset evaluation
#[derive(Debug, Clone)]
pub struct SignalInput<'a> {
    pub asset: &'a str,
    pub price: f64,
    pub levels: &'a PriceLevels,
    pub regime: Regime,
}

pub struct SignalGenerator {
    config: SignalConfig,
}

impl Default for SignalGenerator {
    fn default() -> Self {
        Self::new(SignalConfig::default())
    }
}

impl SignalGenerator {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Raw score before clamping
    pub fn raw_score(&self, direction: Direction, regime: Regime, distance_pct: f64, horizon: Horizon) -> i32 {
        let regime_adj = match (regime, direction) {
            (Regime::RiskOn, Direction::Long) => 8,
            (Regime::RiskOn, Direction::Short) => -5,
            (Regime::RiskOff, Direction::Short) => 8,
            (Regime::RiskOff, Direction::Long) => -10,
            (Regime::Neutral, _) => 0,
        };
        let proximity_adj = if distance_pct <= self.config.strong_proximity_pct { 7 } else { 2 };

        self.config.base_probability + regime_adj + proximity_adj + horizon.probability_adjustment()
    }

    pub fn clamp_probability(&self, raw: i32) -> u8 {
        raw.clamp(self.config.min_probability as i32, self.config.max_probability as i32) as u8
    }

    /// Evaluate one asset; `None` when price is away from both extremes
    pub fn evaluate(&self, input: &SignalInput<'_>, horizon: Horizon, now: DateTime<Utc>) -> Option<Signal> {
        let levels = input.levels;
        if input.price <= 0.0 || levels.two_week_high <= levels.two_week_low {
            return None;
        }

        let (extreme, distance) = levels.nearest_extreme(input.price);
        if distance > self.config.proximity_pct {
            return None;
        }

        // Fade the extreme
        let (direction, extreme_price) = match extreme {
            Extreme::High => (Direction::Short, levels.two_week_high),
            Extreme::Low => (Direction::Long, levels.two_week_low),
        };

        let buffer = extreme_price * self.config.stop_buffer_pct / 100.0;
        let stop = match direction {
            Direction::Short => extreme_price + buffer,
            Direction::Long => extreme_price - buffer,
        };
        let target = input.price + (levels.midpoint() - input.price) * horizon.target_reach();

        let raw = self.raw_score(direction, input.regime, distance, horizon);
        let probability = self.clamp_probability(raw);

        let extreme_label = match extreme {
            Extreme::High => "high",
            Extreme::Low => "low",
        };
        let motivation = vec![
            format!(
                "Price {:.2}% from 2W {} {:.2}",
                distance, extreme_label, extreme_price
            ),
            format!("VIX regime {} ({} setup)", input.regime, direction),
            format!("Mean reversion toward range midpoint {:.2}", levels.midpoint()),
        ];

        Some(Signal {
            id: Uuid::new_v4(),
            asset: input.asset.to_string(),
            direction,
            entry: round_to(input.price, 5),
            stop: round_to(stop, 5),
            target: round_to(target, 5),
            probability,
            motivation,
            horizon,
            day: now.date_naive(),
            created_at: now,
        })
    }
}
