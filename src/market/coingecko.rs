//! CoinGecko public API client
//!
//! Polls `/simple/price` for the crypto watchlist. Responses are cached in
//! memory; a failed fetch returns the stale cache instead of an error.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::MarketQuote;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Coin ids on the Karion watchlist
pub const WATCHLIST: [&str; 5] = ["bitcoin", "ethereum", "solana", "ripple", "cardano"];

/// One coin as returned by `/simple/price`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoQuote {
    pub usd: f64,
    #[serde(default)]
    pub usd_24h_change: Option<f64>,
    #[serde(default)]
    pub usd_24h_vol: Option<f64>,
    #[serde(default)]
    pub usd_market_cap: Option<f64>,
}

impl CryptoQuote {
    pub fn to_market_quote(&self, id: &str) -> MarketQuote {
        MarketQuote {
            symbol: ticker_for(id).to_string(),
            name: id.to_string(),
            price: self.usd,
            change_pct: self.usd_24h_change.unwrap_or(0.0),
            volume: self.usd_24h_vol,
            market_cap: self.usd_market_cap,
        }
    }
}

/// Coin id -> quote
pub type CryptoBoard = BTreeMap<String, CryptoQuote>;

pub fn ticker_for(id: &str) -> &str {
    match id {
        "bitcoin" => "BTC",
        "ethereum" => "ETH",
        "solana" => "SOL",
        "ripple" => "XRP",
        "cardano" => "ADA",
        other => other,
    }
}

/// Cached CoinGecko client
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    ttl: Duration,
    cache: CryptoBoard,
    fetched_at: Option<Instant>,
}

impl CoinGeckoClient {
    pub fn new(base_url: &str, ttl: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            ttl,
            cache: CryptoBoard::new(),
            fetched_at: None,
        })
    }

    /// True while the cache is non-empty and younger than the TTL
    pub fn is_fresh(&self) -> bool {
        match self.fetched_at {
            Some(at) => !self.cache.is_empty() && at.elapsed() < self.ttl,
            None => false,
        }
    }

    pub fn cached(&self) -> &CryptoBoard {
        &self.cache
    }

    /// Fetch the watchlist without touching the cache
    pub async fn fetch(&self) -> Result<CryptoBoard> {
        let url = format!("{}/simple/price", self.base_url);
        let ids = WATCHLIST.join(",");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("ids", ids.as_str()),
                ("vs_currencies", "usd"),
                ("include_24hr_change", "true"),
                ("include_24hr_vol", "true"),
                ("include_market_cap", "true"),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("CoinGecko request failed ({}): {}", status, body));
        }

        response
            .json::<CryptoBoard>()
            .await
            .context("Failed to parse CoinGecko response")
    }

    /// Cached prices, refreshed when stale; errors keep the stale cache
    pub async fn prices(&mut self) -> CryptoBoard {
        if self.is_fresh() {
            return self.cache.clone();
        }
        self.refresh().await
    }

    /// Fetch regardless of cache age; errors keep the stale cache.
    /// The cache age counts from when the request was sent.
    pub async fn refresh(&mut self) -> CryptoBoard {
        let started = Instant::now();
        match self.fetch().await {
            Ok(board) => {
                debug!("CoinGecko returned {} coins", board.len());
                self.cache = board;
                self.fetched_at = Some(started);
            }
            Err(e) => warn!("CoinGecko fetch failed, keeping stale cache: {:#}", e),
        }

        self.cache.clone()
    }

    #[cfg(test)]
    fn prime(&mut self, board: CryptoBoard) {
        self.cache = board;
        self.fetched_at = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, routing::get, Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const SAMPLE: &str = r#"{
        "bitcoin": {"usd": 95123.5, "usd_24h_change": -3.4, "usd_24h_vol": 3.1e10, "usd_market_cap": 1.8e12},
        "solana": {"usd": 210.2}
    }"#;

    #[test]
    fn test_parse_simple_price() {
        let board: CryptoBoard = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board["bitcoin"].usd_24h_change, Some(-3.4));
        assert_eq!(board["solana"].usd_24h_change, None);

        let quote = board["bitcoin"].to_market_quote("bitcoin");
        assert_eq!(quote.symbol, "BTC");
        assert_eq!(quote.change_pct, -3.4);
        assert_eq!(quote.market_cap, Some(1.8e12));
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_network() {
        // Unroutable base URL: any request would fail and log, not return data
        let mut client = CoinGeckoClient::new("http://127.0.0.1:9", Duration::from_secs(60)).unwrap();
        assert!(!client.is_fresh());

        let board: CryptoBoard = serde_json::from_str(SAMPLE).unwrap();
        client.prime(board.clone());
        assert!(client.is_fresh());
        assert_eq!(client.prices().await, board);
    }

    #[tokio::test]
    async fn test_failed_fetch_returns_stale_cache() {
        let mut client = CoinGeckoClient::new("http://127.0.0.1:9", Duration::from_millis(0)).unwrap();
        let board: CryptoBoard = serde_json::from_str(SAMPLE).unwrap();
        client.prime(board.clone());
        assert!(!client.is_fresh());
        assert_eq!(client.prices().await, board);
    }

    /// Local `/simple/price` that answers after `latency` and counts hits
    async fn mock_server(latency: Duration) -> (String, Arc<AtomicUsize>) {
        async fn simple_price(
            State((hits, latency)): State<(Arc<AtomicUsize>, Duration)>,
        ) -> Json<serde_json::Value> {
            hits.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(latency).await;
            Json(serde_json::from_str(SAMPLE).unwrap())
        }

        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/simple/price", get(simple_price))
            .with_state((hits.clone(), latency));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), hits)
    }

    #[tokio::test]
    async fn test_refresh_fetches_every_tick() {
        let period = Duration::from_millis(300);
        let (url, hits) = mock_server(Duration::from_millis(20)).await;
        let mut client = CoinGeckoClient::new(&url, period).unwrap();

        let mut ticker = tokio::time::interval(period);
        for _ in 0..4 {
            ticker.tick().await;
            let board = client.refresh().await;
            assert_eq!(board.len(), 2);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_cache_age_counts_from_request_start() {
        let (url, hits) = mock_server(Duration::from_millis(200)).await;
        let mut client = CoinGeckoClient::new(&url, Duration::from_millis(150)).unwrap();

        client.prices().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        // The slow response already used up the TTL
        assert!(!client.is_fresh());
        client.prices().await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
