//! Random-walk index cache
//!
//! Holds the last synthetic price for a fixed set of indices. Every market
//! tick adds a bounded random delta, so the dashboard always has moving
//! numbers without a paid data feed.

use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Instant;

use super::MarketQuote;

pub const VOLATILITY_INDEX: &str = "VIX";

/// (symbol, name, seed price, seed change %)
pub const TRACKED_INDICES: [(&str, &str, f64, f64); 5] = [
    ("SPX", "S&P 500", 6050.25, 0.45),
    ("NDX", "NASDAQ 100", 21450.80, 0.82),
    ("XAU", "Gold", 2750.10, 0.15),
    ("VIX", "Volatility", 15.40, -2.10),
    ("DXY", "Dollar Index", 104.20, 0.05),
];

/// Half-width of the seeded two-week band, percent of the seed price
pub const DEFAULT_BAND_PCT: f64 = 1.0;

/// Daily change is damped once it leaves this band
const MAX_CHANGE_PCT: f64 = 5.0;

/// Span of the rolling high/low window
pub const LEVEL_WINDOW_SECS: f64 = 14.0 * 24.0 * 3600.0;

/// Observations are folded into buckets of this width
pub const LEVEL_BUCKET_SECS: f64 = 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extreme {
    High,
    Low,
}

/// Rolling two-week extremes for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevels {
    pub symbol: String,
    pub two_week_high: f64,
    pub two_week_low: f64,
}

impl PriceLevels {
    pub fn around(symbol: &str, price: f64, band_pct: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            two_week_high: price * (1.0 + band_pct / 100.0),
            two_week_low: price * (1.0 - band_pct / 100.0),
        }
    }

    pub fn midpoint(&self) -> f64 {
        (self.two_week_high + self.two_week_low) / 2.0
    }

    pub fn distance_to_high_pct(&self, price: f64) -> f64 {
        if self.two_week_high == 0.0 {
            return f64::INFINITY;
        }
        ((self.two_week_high - price) / self.two_week_high * 100.0).abs()
    }

    pub fn distance_to_low_pct(&self, price: f64) -> f64 {
        if self.two_week_low == 0.0 {
            return f64::INFINITY;
        }
        ((price - self.two_week_low) / self.two_week_low * 100.0).abs()
    }

    /// Closest extreme and its distance in percent
    pub fn nearest_extreme(&self, price: f64) -> (Extreme, f64) {
        let to_high = self.distance_to_high_pct(price);
        let to_low = self.distance_to_low_pct(price);
        if to_high < to_low {
            (Extreme::High, to_high)
        } else {
            (Extreme::Low, to_low)
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    start: f64,
    high: f64,
    low: f64,
}

/// High/low over the trailing [`LEVEL_WINDOW_SECS`], kept as hourly buckets.
/// Times are seconds on the cache's own clock.
#[derive(Debug, Clone, Default)]
pub struct LevelWindow {
    buckets: VecDeque<Bucket>,
}

impl LevelWindow {
    /// Window holding the seeded band at time zero
    pub fn seeded(high: f64, low: f64) -> Self {
        let mut window = Self::default();
        window.buckets.push_back(Bucket { start: 0.0, high, low });
        window
    }

    /// Record a price at `at` and drop buckets that left the window
    pub fn record(&mut self, at: f64, price: f64) {
        let start = (at / LEVEL_BUCKET_SECS).floor() * LEVEL_BUCKET_SECS;
        match self.buckets.back_mut() {
            Some(last) if last.start >= start => {
                last.high = last.high.max(price);
                last.low = last.low.min(price);
            }
            _ => self.buckets.push_back(Bucket { start, high: price, low: price }),
        }

        while self.buckets.len() > 1 {
            match self.buckets.front() {
                Some(first) if first.start + LEVEL_BUCKET_SECS <= at - LEVEL_WINDOW_SECS => {
                    self.buckets.pop_front();
                }
                _ => break,
            }
        }
    }

    /// (high, low) across the window
    pub fn extremes(&self) -> Option<(f64, f64)> {
        let first = self.buckets.front()?;
        Some(self.buckets.iter().fold((first.high, first.low), |(hi, lo), b| {
            (hi.max(b.high), lo.min(b.low))
        }))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Per-symbol (volatility, drift) of the walk
pub fn walk_params(symbol: &str) -> (f64, f64) {
    let volatility = match symbol {
        "VIX" => 0.05,
        "NDX" => 0.02,
        _ => 0.01,
    };
    let drift = if symbol == "VIX" { -0.01 } else { 0.005 };
    (volatility, drift)
}

/// Percent delta for one step given a uniform draw `u` in [0, 1)
pub fn walk_delta(symbol: &str, u: f64, elapsed_secs: f64) -> f64 {
    let (volatility, drift) = walk_params(symbol);
    (u - 0.5 + drift) * volatility * elapsed_secs.max(1.0)
}

/// Next simulated daily change; damped when it runs past the band
pub fn next_change(current: f64, delta: f64) -> f64 {
    let mut next = current + delta * 10.0;
    if next.abs() > MAX_CHANGE_PCT {
        next *= 0.9;
    }
    round_to(next, 2)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[derive(Debug, Clone)]
struct IndexState {
    quote: MarketQuote,
    levels: PriceLevels,
    window: LevelWindow,
}

impl IndexState {
    fn observe(&mut self, at: f64, price: f64) {
        self.window.record(at, price);
        if let Some((high, low)) = self.window.extremes() {
            self.levels.two_week_high = high;
            self.levels.two_week_low = low;
        }
    }
}

/// Last-known synthetic prices for the tracked indices
#[derive(Debug, Clone)]
pub struct PriceCache {
    entries: Vec<IndexState>,
    last_update: Option<Instant>,
    /// Seconds of simulated time since seeding
    clock_secs: f64,
}

impl PriceCache {
    /// Cache seeded with the default indices and band
    pub fn seeded() -> Self {
        Self::with_band(DEFAULT_BAND_PCT)
    }

    pub fn with_band(band_pct: f64) -> Self {
        let entries = TRACKED_INDICES
            .iter()
            .map(|&(symbol, name, price, change)| {
                let levels = PriceLevels::around(symbol, price, band_pct);
                IndexState {
                    quote: MarketQuote {
                        symbol: symbol.to_string(),
                        name: name.to_string(),
                        price,
                        change_pct: change,
                        volume: None,
                        market_cap: None,
                    },
                    window: LevelWindow::seeded(levels.two_week_high, levels.two_week_low),
                    levels,
                }
            })
            .collect();

        Self {
            entries,
            last_update: None,
            clock_secs: 0.0,
        }
    }

    /// Advance every index by one step of `elapsed_secs`
    pub fn apply_tick<R: Rng + ?Sized>(&mut self, elapsed_secs: f64, rng: &mut R) {
        let unit = Uniform::new(0.0f64, 1.0f64);
        self.clock_secs += elapsed_secs.max(0.0);

        for entry in &mut self.entries {
            let delta = walk_delta(&entry.quote.symbol, unit.sample(rng), elapsed_secs);
            let price = round_to(entry.quote.price * (1.0 + delta / 100.0), 2);

            entry.quote.price = price;
            entry.quote.change_pct = next_change(entry.quote.change_pct, delta);
            entry.observe(self.clock_secs, price);
        }
    }

    /// Advance using wall-clock time since the previous tick
    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let now = Instant::now();
        let elapsed = self
            .last_update
            .map(|t| now.duration_since(t).as_secs_f64())
            .unwrap_or(1.0);
        self.apply_tick(elapsed, rng);
        self.last_update = Some(now);
    }

    pub fn quotes(&self) -> Vec<MarketQuote> {
        self.entries.iter().map(|e| e.quote.clone()).collect()
    }

    pub fn levels(&self) -> Vec<PriceLevels> {
        self.entries.iter().map(|e| e.levels.clone()).collect()
    }

    pub fn get(&self, symbol: &str) -> Option<&MarketQuote> {
        self.entries
            .iter()
            .find(|e| e.quote.symbol == symbol)
            .map(|e| &e.quote)
    }

    pub fn levels_for(&self, symbol: &str) -> Option<&PriceLevels> {
        self.entries
            .iter()
            .find(|e| e.quote.symbol == symbol)
            .map(|e| &e.levels)
    }

    /// Symbols that can carry trade setups (everything but the VIX)
    pub fn tradable_symbols(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.quote.symbol.clone())
            .filter(|s| s != VOLATILITY_INDEX)
            .collect()
    }

    /// Override a price; returns false for unknown symbols
    pub fn set_price(&mut self, symbol: &str, price: f64) -> bool {
        match self.entries.iter_mut().find(|e| e.quote.symbol == symbol) {
            Some(entry) => {
                entry.quote.price = price;
                entry.observe(self.clock_secs, price);
                true
            }
            None => false,
        }
    }
}
