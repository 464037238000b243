use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, Mutex};

use crate::analysis::bias::BiasEngine;
use crate::coach::{Coach, CoachInsight};
use crate::config::ServiceConfig;
use crate::journal::JournalStore;
use crate::market::{MarketQuote, MarketSnapshot};
use crate::news::NewsItem;
use crate::signals::{Signal, SignalBook};

/// Trade direction of a setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Volatility regime derived from the VIX level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Regime {
    RiskOn,
    Neutral,
    RiskOff,
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Regime::RiskOn => write!(f, "risk-on"),
            Regime::Neutral => write!(f, "neutral"),
            Regime::RiskOff => write!(f, "risk-off"),
        }
    }
}

/// Qualitative label shown on bias panels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

/// Event impact rating used by news and the macro calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    Quotes { version: u64, quotes: Vec<MarketQuote> },
    News(NewsItem),
    Signal(Signal),
    Pulse(CoachInsight),
    Risk { risk_score: u32, risk_category: String },
    Connected { symbols: Vec<String> },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    pub action: String,
}

/// Shared application state
pub struct AppState {
    pub tx: broadcast::Sender<WsMessage>,
    pub snapshot: watch::Sender<MarketSnapshot>,
    pub signals: Mutex<SignalBook>,
    pub journal: JournalStore,
    pub bias: Mutex<BiasEngine>,
    pub coach: Coach,
    pub config: ServiceConfig,
}

impl AppState {
    pub fn new(config: ServiceConfig, signals: SignalBook, coach: Coach) -> Self {
        let (tx, _rx) = broadcast::channel(1000);
        let (snapshot, _) = watch::channel(MarketSnapshot::default());
        Self {
            tx,
            snapshot,
            signals: Mutex::new(signals),
            journal: JournalStore::default(),
            bias: Mutex::new(BiasEngine::default()),
            coach,
            config,
        }
    }

    /// Clone of the latest published market snapshot
    pub fn snapshot(&self) -> MarketSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Broadcast to websocket clients; no receivers is fine
    pub fn publish(&self, msg: WsMessage) {
        let _ = self.tx.send(msg);
    }
}
