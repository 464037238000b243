//! VIX regime and direction classification

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::quotes::{round_to, PriceLevels};
use super::MarketQuote;
use crate::types::Regime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VixDirection {
    Rising,
    Falling,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VixSnapshot {
    pub current: f64,
    pub yesterday: f64,
    /// Day-over-day change in percent
    pub change: f64,
    pub direction: VixDirection,
    pub regime: Regime,
    pub high_5d: f64,
    pub low_5d: f64,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

/// Below 18 is risk-on, above 25 risk-off
pub fn classify_regime(level: f64) -> Regime {
    if level < 18.0 {
        Regime::RiskOn
    } else if level > 25.0 {
        Regime::RiskOff
    } else {
        Regime::Neutral
    }
}

/// A move of more than 2% either way is directional
pub fn classify_direction(change_pct: f64) -> VixDirection {
    if change_pct > 2.0 {
        VixDirection::Rising
    } else if change_pct < -2.0 {
        VixDirection::Falling
    } else {
        VixDirection::Stable
    }
}

impl VixSnapshot {
    /// Build from the simulated VIX quote and its rolling band
    pub fn from_quote(quote: &MarketQuote, levels: Option<&PriceLevels>, now: DateTime<Utc>) -> Self {
        let current = quote.price;
        let yesterday = if (100.0 + quote.change_pct).abs() > f64::EPSILON {
            current / (1.0 + quote.change_pct / 100.0)
        } else {
            current
        };
        let (high, low) = levels
            .map(|l| (l.two_week_high, l.two_week_low))
            .unwrap_or((current, current));

        Self {
            current: round_to(current, 2),
            yesterday: round_to(yesterday, 2),
            change: round_to(quote.change_pct, 2),
            direction: classify_direction(quote.change_pct),
            regime: classify_regime(current),
            high_5d: round_to(high, 2),
            low_5d: round_to(low, 2),
            timestamp: now,
            source: "simulated".to_string(),
        }
    }

    /// VIX rising faster than 2% tilts assets toward breakout risk
    pub fn is_rising(&self) -> bool {
        self.change > 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regime_bands() {
        assert_eq!(classify_regime(12.0), Regime::RiskOn);
        assert_eq!(classify_regime(18.0), Regime::Neutral);
        assert_eq!(classify_regime(25.0), Regime::Neutral);
        assert_eq!(classify_regime(25.1), Regime::RiskOff);
    }

    #[test]
    fn test_direction_bands() {
        assert_eq!(classify_direction(2.5), VixDirection::Rising);
        assert_eq!(classify_direction(-2.5), VixDirection::Falling);
        assert_eq!(classify_direction(1.9), VixDirection::Stable);
    }

    #[test]
    fn test_from_quote() {
        let quote = MarketQuote {
            symbol: "VIX".to_string(),
            name: "Volatility".to_string(),
            price: 22.0,
            change_pct: 10.0,
            volume: None,
            market_cap: None,
        };
        let snap = VixSnapshot::from_quote(&quote, None, Utc::now());
        assert_eq!(snap.yesterday, 20.0);
        assert_eq!(snap.direction, VixDirection::Rising);
        assert_eq!(snap.regime, Regime::Neutral);
        assert!(snap.is_rising());
    }
}
