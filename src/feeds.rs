//! Background polling loops
//!
//! Each loop owns its source state, writes the shared snapshot through
//! `watch::Sender::send_modify` and forwards updates to websocket clients.
//! Failures are logged and the previous data is kept.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::analysis::risk;
use crate::coach::PULSE_PROBABILITY;
use crate::market::quotes::VOLATILITY_INDEX;
use crate::market::{CoinGeckoClient, PriceCache, VixSnapshot};
use crate::news::NewsFeed;
use crate::signals::{Horizon, SignalGenerator, SignalInput};
use crate::types::{AppState, WsMessage};

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Spawn all loops; handles are returned so callers may abort them
pub fn spawn_all(state: Arc<AppState>) -> Vec<JoinHandle<()>> {
    let mut handles = vec![
        tokio::spawn(run_market(state.clone())),
        tokio::spawn(run_pulse(state.clone())),
        tokio::spawn(run_risk(state.clone())),
    ];
    if state.config.crypto_enabled {
        handles.push(tokio::spawn(run_crypto(state)));
    } else {
        info!("Crypto feed disabled");
    }
    handles
}

/// One market step: advance prices, refresh the VIX view and record new setups.
/// Returns how many signals were stored.
pub async fn market_step<R: Rng + ?Sized>(
    state: &AppState,
    prices: &mut PriceCache,
    generator: &SignalGenerator,
    rng: &mut R,
    now: DateTime<Utc>,
) -> usize {
    prices.tick(rng);
    let quotes = prices.quotes();
    let levels = prices.levels();
    let vix = prices
        .get(VOLATILITY_INDEX)
        .map(|q| VixSnapshot::from_quote(q, prices.levels_for(VOLATILITY_INDEX), now));

    let mut version = 0;
    state.snapshot.send_modify(|snap| {
        snap.quotes = quotes.clone();
        snap.levels = levels;
        snap.vix = vix.clone();
        snap.touch(now);
        version = snap.version;
    });
    state.publish(WsMessage::Quotes { version, quotes });

    let today = now.date_naive();
    let mut book = state.signals.lock().await;
    book.roll_to(today);

    let Some(vix) = vix else {
        return 0;
    };

    let mut stored = 0;
    for symbol in prices.tradable_symbols() {
        let (Some(quote), Some(lv)) = (prices.get(&symbol), prices.levels_for(&symbol)) else {
            continue;
        };
        let input = SignalInput {
            asset: &symbol,
            price: quote.price,
            levels: lv,
            regime: vix.regime,
        };

        for horizon in Horizon::ALL {
            if !book.has_room(horizon, &symbol, today) {
                continue;
            }
            let Some(signal) = generator.evaluate(&input, horizon, now) else {
                continue;
            };
            match book.record(signal.clone()) {
                Ok(true) => {
                    info!(
                        "New {} {} signal on {} @ {:.2} ({}%)",
                        horizon.storage_key(),
                        signal.direction,
                        symbol,
                        signal.entry,
                        signal.probability
                    );
                    stored += 1;
                    state.publish(WsMessage::Signal(signal));
                }
                Ok(false) => {}
                Err(e) => warn!("Failed to persist signal for {}: {:#}", symbol, e),
            }
        }
    }
    stored
}

async fn run_market(state: Arc<AppState>) {
    let mut prices = PriceCache::seeded();
    let generator = SignalGenerator::default();
    let mut rng = StdRng::from_entropy();
    let mut ticker = ticker(state.config.market_tick());

    info!("Market feed started ({:?} tick)", state.config.market_tick());
    loop {
        ticker.tick().await;
        market_step(&state, &mut prices, &generator, &mut rng, Utc::now()).await;
    }
}

/// News and coach commentary
pub async fn pulse_step<R: Rng + ?Sized>(
    state: &AppState,
    news: &mut NewsFeed,
    rng: &mut R,
    now: DateTime<Utc>,
) {
    if let Some(item) = news.maybe_push(now, rng) {
        debug!("News: {}", item.title);
        let items = news.items();
        state.snapshot.send_modify(|snap| {
            snap.news = items;
            snap.touch(now);
        });
        state.publish(WsMessage::News(item));
    }

    if rng.gen_bool(PULSE_PROBABILITY) {
        let snapshot = state.snapshot();
        let insight = state.coach.market_pulse(&snapshot, now).await;
        state.snapshot.send_modify(|snap| {
            snap.pulse = Some(insight.clone());
            snap.touch(now);
        });
        state.publish(WsMessage::Pulse(insight));
    }
}

async fn run_pulse(state: Arc<AppState>) {
    let mut rng = StdRng::from_entropy();
    let now = Utc::now();
    let mut news = NewsFeed::seeded(now, &mut rng);
    let items = news.items();
    state.snapshot.send_modify(|snap| {
        snap.news = items;
        snap.touch(now);
    });

    let mut ticker = ticker(state.config.pulse_interval());
    // First tick fires immediately; the seed already covers it
    ticker.tick().await;
    loop {
        ticker.tick().await;
        pulse_step(&state, &mut news, &mut rng, Utc::now()).await;
    }
}

async fn run_crypto(state: Arc<AppState>) {
    let mut client = match CoinGeckoClient::new(&state.config.coingecko_url, state.config.crypto_interval()) {
        Ok(c) => c,
        Err(e) => {
            error!("Crypto feed not started: {:#}", e);
            return;
        }
    };

    let mut ticker = ticker(state.config.crypto_interval());
    loop {
        ticker.tick().await;
        let board = client.refresh().await;
        if board.is_empty() {
            continue;
        }
        let now = Utc::now();
        state.snapshot.send_modify(|snap| {
            snap.crypto = board;
            snap.touch(now);
        });
    }
}

/// Recompute the session risk score from the latest snapshot.
/// `None` until the market loop has published a VIX reading.
pub fn risk_step(state: &AppState, now: DateTime<Utc>) -> Option<u32> {
    let snapshot = state.snapshot();
    let vix = snapshot.vix.as_ref()?;
    let analysis = risk::analyze(vix, &snapshot.quotes, &snapshot.levels, now);

    let score = analysis.risk_score;
    let category = analysis.risk_category.to_string();
    state.snapshot.send_modify(|snap| {
        snap.risk = Some(analysis);
        snap.touch(now);
    });
    state.publish(WsMessage::Risk {
        risk_score: score,
        risk_category: category,
    });
    Some(score)
}

async fn run_risk(state: Arc<AppState>) {
    let mut ticker = ticker(state.config.risk_interval());
    // Give the market loop one tick to publish a VIX reading
    tokio::time::sleep(state.config.market_tick()).await;
    loop {
        ticker.tick().await;
        match risk_step(&state, Utc::now()) {
            Some(score) => debug!("Risk score {}", score),
            None => debug!("Risk refresh skipped, no VIX yet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coach::Coach;
    use crate::config::ServiceConfig;
    use crate::signals::SignalBook;

    fn state(dir: &std::path::Path) -> AppState {
        let now = Utc::now();
        let book = SignalBook::open(dir, now.date_naive()).unwrap();
        AppState::new(ServiceConfig::default(), book, Coach::offline())
    }

    #[tokio::test]
    async fn test_market_step_publishes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let mut rx = state.tx.subscribe();
        let mut prices = PriceCache::seeded();
        let mut rng = StdRng::seed_from_u64(1);

        market_step(&state, &mut prices, &SignalGenerator::default(), &mut rng, Utc::now()).await;

        let snap = state.snapshot();
        assert_eq!(snap.version, 1);
        assert_eq!(snap.quotes.len(), prices.quotes().len());
        assert!(snap.vix.is_some());
        assert!(matches!(rx.recv().await.unwrap(), WsMessage::Quotes { version: 1, .. }));
    }

    #[tokio::test]
    async fn test_signals_capped_across_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let mut prices = PriceCache::seeded();
        let mut rng = StdRng::seed_from_u64(2);
        let now = Utc::now();

        // Pin SPX onto its two-week high so every tick qualifies
        for _ in 0..5 {
            prices.tick(&mut rng);
            let high = prices.levels_for("SPX").unwrap().two_week_high;
            prices.set_price("SPX", high);
            market_step(&state, &mut prices, &SignalGenerator::default(), &mut rng, now).await;
        }

        let book = state.signals.lock().await;
        for horizon in Horizon::ALL {
            let count = book
                .signals(Some(horizon))
                .iter()
                .filter(|s| s.asset == "SPX")
                .count();
            assert!(count <= 2, "{:?} has {} SPX signals", horizon, count);
        }
    }

    #[tokio::test]
    async fn test_new_day_drops_yesterdays_signals() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let mut prices = PriceCache::seeded();
        let mut rng = StdRng::seed_from_u64(5);
        let now = Utc::now();

        prices.tick(&mut rng);
        let high = prices.levels_for("SPX").unwrap().two_week_high;
        prices.set_price("SPX", high);
        let stored = market_step(&state, &mut prices, &SignalGenerator::default(), &mut rng, now).await;
        assert!(stored > 0);

        let tomorrow = now + chrono::Duration::days(1);
        market_step(&state, &mut prices, &SignalGenerator::default(), &mut rng, tomorrow).await;

        let listed = state.signals.lock().await.signals(None);
        assert!(listed.iter().all(|s| s.day == tomorrow.date_naive()));
    }

    #[tokio::test]
    async fn test_risk_step_needs_vix() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        assert!(risk_step(&state, Utc::now()).is_none());

        let mut prices = PriceCache::seeded();
        let mut rng = StdRng::seed_from_u64(3);
        market_step(&state, &mut prices, &SignalGenerator::default(), &mut rng, Utc::now()).await;

        let score = risk_step(&state, Utc::now()).unwrap();
        assert!(score <= 100);
        assert_eq!(state.snapshot().risk.unwrap().risk_score, score);
    }

    #[tokio::test]
    async fn test_pulse_step_keeps_news_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());
        let mut rng = StdRng::seed_from_u64(4);
        let mut news = NewsFeed::seeded(Utc::now(), &mut rng);

        for _ in 0..200 {
            pulse_step(&state, &mut news, &mut rng, Utc::now()).await;
        }
        assert!(state.snapshot().news.len() <= crate::news::NEWS_CAPACITY);
    }
}
