//! Rolling market news feed
//!
//! Headlines come from a fixed pool. The pulse loop rolls a die every tick
//! and prepends a fresh item when it lands; the feed keeps the newest 50.

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use crate::types::Impact;

pub const NEWS_CAPACITY: usize = 50;
/// Chance a pulse tick produces a headline
pub const PUSH_PROBABILITY: f64 = 0.6;
/// Items seeded at startup, five minutes apart
pub const SEED_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Bullish,
    Bearish,
}

const HEADLINES: [(&str, Impact, Sentiment, &str); 10] = [
    ("Fed Speaker Daly: Rates might stay higher", Impact::High, Sentiment::Bearish, "USD"),
    ("Tech Sector Rally extends into close", Impact::Medium, Sentiment::Bullish, "USD"),
    ("Oil prices drop on inventory buildup", Impact::Medium, Sentiment::Bearish, "USD"),
    ("Gold breaks resistance at 2750", Impact::High, Sentiment::Bullish, "USD"),
    ("ECB warns on sticky services inflation", Impact::Low, Sentiment::Bearish, "EUR"),
    ("NVIDIA announces new AI chip partnership", Impact::High, Sentiment::Bullish, "USD"),
    ("JPMorgan sees S&P 500 reaching 6200", Impact::Medium, Sentiment::Bullish, "USD"),
    ("US Treasury Yields tick higher", Impact::Medium, Sentiment::Bearish, "USD"),
    ("Bitcoin reclaims $95k support level", Impact::High, Sentiment::Bullish, "USD"),
    ("Apple services revenue beats expectations", Impact::Medium, Sentiment::Bullish, "USD"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: Uuid,
    pub title: String,
    pub impact: Impact,
    pub sentiment: Sentiment,
    pub currency: String,
    pub time: DateTime<Utc>,
}

impl NewsItem {
    /// Random headline from the pool stamped at `time`
    pub fn random<R: Rng + ?Sized>(time: DateTime<Utc>, rng: &mut R) -> Self {
        let &(title, impact, sentiment, currency) = HEADLINES.choose(rng).unwrap_or(&HEADLINES[0]);
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            impact,
            sentiment,
            currency: currency.to_string(),
            time,
        }
    }
}

/// Newest-first bounded feed
#[derive(Debug, Clone, Default)]
pub struct NewsFeed {
    items: VecDeque<NewsItem>,
}

impl NewsFeed {
    /// Feed pre-filled with a few items in the recent past
    pub fn seeded<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> Self {
        let mut feed = Self::default();
        for i in (0..SEED_COUNT).rev() {
            feed.push(NewsItem::random(now - Duration::minutes(5 * i as i64), rng));
        }
        feed
    }

    pub fn push(&mut self, item: NewsItem) {
        self.items.push_front(item);
        self.items.truncate(NEWS_CAPACITY);
    }

    /// Roll for a new headline; returns it when one was added
    pub fn maybe_push<R: Rng + ?Sized>(&mut self, now: DateTime<Utc>, rng: &mut R) -> Option<NewsItem> {
        if !rng.gen_bool(PUSH_PROBABILITY) {
            return None;
        }
        let item = NewsItem::random(now, rng);
        self.push(item.clone());
        Some(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> Vec<NewsItem> {
        self.items.iter().cloned().collect()
    }
}
