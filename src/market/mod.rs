//! Market data layer
//!
//! - [`quotes`] - random-walk index cache mutated on the market tick
//! - [`vix`] - volatility regime classification
//! - [`coingecko`] - crypto quotes with a short in-memory cache

pub mod coingecko;
pub mod quotes;
pub mod vix;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::risk::RiskAnalysis;
use crate::coach::CoachInsight;
use crate::news::NewsItem;

pub use coingecko::{CoinGeckoClient, CryptoBoard, CryptoQuote};
pub use quotes::{PriceCache, PriceLevels};
pub use vix::{VixDirection, VixSnapshot};

/// Display quote for an index or coin. Identity is the symbol string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    /// 24h change in percent
    pub change_pct: f64,
    pub volume: Option<f64>,
    pub market_cap: Option<f64>,
}

/// Versioned view of everything the polling loops maintain.
///
/// Loops write through `watch::Sender::send_modify`; every write bumps `version`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub version: u64,
    pub quotes: Vec<MarketQuote>,
    pub levels: Vec<PriceLevels>,
    pub vix: Option<VixSnapshot>,
    pub crypto: CryptoBoard,
    pub news: Vec<NewsItem>,
    pub pulse: Option<CoachInsight>,
    pub risk: Option<RiskAnalysis>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MarketSnapshot {
    pub fn quote(&self, symbol: &str) -> Option<&MarketQuote> {
        self.quotes.iter().find(|q| q.symbol == symbol)
    }

    pub fn levels_for(&self, symbol: &str) -> Option<&PriceLevels> {
        self.levels.iter().find(|l| l.symbol == symbol)
    }

    /// Mark a write; called inside every `send_modify`
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = Some(now);
    }
}
