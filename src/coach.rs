//! Trading coach
//!
//! Market commentary, contextual chat and journal/strategy suggestions. With
//! an OpenAI key the coach asks the chat completions endpoint; without one,
//! or whenever the request fails, it answers from fixed rules.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::market::{CryptoBoard, MarketSnapshot};

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
pub const SIMULATION_SOURCE: &str = "Karion Simulation Engine";
/// Chance a pulse tick refreshes the coach insight
pub const PULSE_PROBABILITY: f64 = 0.2;

const PERSONA: &str = "You are Karion AI, a direct and experienced trading coach. \
Speak professionally but concisely, using technical terms (RR, liquidity, bias, delta, GEX, COT). \
Read the market data you are given and state a clear bias: BULLISH, BEARISH or NEUTRAL. \
Always give one key support and one key resistance level. \
Do not give financial advice, only analytical opinions.";

const JOURNAL_FALLBACK: [&str; 3] = [
    "Review your trading plan",
    "Keep your discipline",
    "Manage your emotions",
];

const STRATEGY_FALLBACK: [&str; 3] = [
    "Define entries and exits clearly",
    "Set a stop loss on every trade",
    "Test on historical data",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachInsight {
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

impl CoachInsight {
    fn simulated(text: &str, now: DateTime<Utc>) -> Self {
        Self {
            text: text.to_string(),
            timestamp: now,
            source: SIMULATION_SOURCE.to_string(),
        }
    }
}

/// Commentary from the BTC 24h change
pub fn crypto_commentary(btc_change: f64) -> &'static str {
    if btc_change < -3.0 {
        "Aggressive correction. BTC is losing momentum. Focus on HTF support levels. \
Don't hunt the bottom, wait for a structural reversal. Cash is a position."
    } else if btc_change > 3.0 {
        "Bullish momentum confirmed. BTC is leading. Look for pullbacks into H1/H4 demand \
for entries. Don't short strength!"
    } else {
        "Market consolidating. Chop zone. Avoid overtrading and wait for the daily range \
to break. Focus on alts with specific catalysts."
    }
}

/// Commentary from the SPX and VIX day changes
pub fn macro_commentary(spx_change: f64, vix_change: f64) -> &'static str {
    if spx_change < -1.0 && vix_change > 5.0 {
        "Aggressive risk-off. VIX is exploding and SPX is losing key levels. Protect longs \
or look for shorts on weak bounces. Gold may act as a hedge."
    } else if spx_change > 0.5 && vix_change < -2.0 {
        "Solid risk-on. Volatility compressing and equities pushing. Uptrend intact, \
look for entries on dips. Tech (NDX) leading."
    } else {
        "Mixed, sideways market. VIX stable. Sector rotation under way, avoid heavy index \
positions and look for specific names."
    }
}

/// Conversation topic; picks the system prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatContext {
    General,
    Risk,
    Psychology,
    Analysis,
    MonteCarlo,
    Performance,
    Mt5,
}

impl ChatContext {
    /// Unknown names fall back to general
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "risk" => ChatContext::Risk,
            "psychology" => ChatContext::Psychology,
            "analysis" => ChatContext::Analysis,
            "montecarlo" => ChatContext::MonteCarlo,
            "performance" => ChatContext::Performance,
            "mt5" => ChatContext::Mt5,
            _ => ChatContext::General,
        }
    }

    pub fn system_prompt(self) -> &'static str {
        match self {
            ChatContext::General => "You are an expert trading coach. Answer concisely and practically.",
            ChatContext::Risk => "You are a trading risk management expert. Compute position size and risk.",
            ChatContext::Psychology => "You are a trading psychologist. Help the trader manage emotions.",
            ChatContext::Analysis => "You are an expert technical analyst. Analyze setups and patterns.",
            ChatContext::MonteCarlo => "You are a trading statistics expert. Explain Monte Carlo simulations.",
            ChatContext::Performance => {
                "You are a trading performance coach. Analyze statistics and suggest improvements."
            }
            ChatContext::Mt5 => "You are a MetaTrader 5 expert. Analyze reports and statistics.",
        }
    }

    /// Rule-based answer used without a model
    pub fn fallback_reply(self, snapshot: &MarketSnapshot) -> String {
        let change = |symbol: &str| snapshot.quote(symbol).map(|q| q.change_pct).unwrap_or(0.0);
        match self {
            ChatContext::General | ChatContext::Analysis => {
                let mut text = macro_commentary(change("SPX"), change("VIX")).to_string();
                if let (Some(quote), Some(levels)) = (snapshot.quote("SPX"), snapshot.levels_for("SPX")) {
                    text.push_str(&format!(
                        " SPX {:.2}, 2W range {:.2} - {:.2}.",
                        quote.price, levels.two_week_low, levels.two_week_high
                    ));
                }
                text
            }
            ChatContext::Risk => "Risk a fixed 0.5-1% of equity per trade. Size = risk amount / \
(stop distance x pip value). Cut size in half when the session risk score is HIGH."
                .to_string(),
            ChatContext::Psychology => "Pause after two consecutive losses. Breathe, re-read your plan, \
and only take the next trade if it matches a written setup."
                .to_string(),
            ChatContext::MonteCarlo => "Monte Carlo reshuffles your win rate and payoff into thousands of \
equity paths. Watch the bankruptcy rate and the 5th percentile, not the average."
                .to_string(),
            ChatContext::Performance => "Track expectancy in R, not PnL. A positive expectancy with a \
drawdown you can sit through beats a high win rate with large losers."
                .to_string(),
            ChatContext::Mt5 => "In the MT5 report check profit factor, max drawdown and the average \
win/loss ratio first. Then look for the hours and symbols that lose the most."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

fn default_context() -> String {
    "general".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_context")]
    pub context: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub source: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

/// Minimal chat completions client
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: 0.7,
            max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Completion failed with status {}: {}", status, body));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| anyhow!("Completion returned no content"))
    }
}

/// Non-empty trimmed lines, at most `limit`
fn bullet_lines(text: &str, limit: usize) -> Vec<String> {
    text.lines()
        .map(|l| l.trim().trim_start_matches(['-', '*']).trim())
        .filter(|l| !l.is_empty())
        .take(limit)
        .map(str::to_string)
        .collect()
}

fn fallback_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub struct Coach {
    openai: Option<OpenAiClient>,
}

impl Coach {
    /// Rule-based coach only
    pub fn offline() -> Self {
        Self { openai: None }
    }

    pub fn with_client(client: OpenAiClient) -> Self {
        Self { openai: Some(client) }
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        if !config.has_openai() {
            return Ok(Self::offline());
        }
        let key = config.openai_api_key.as_deref().unwrap_or_default();
        let client = OpenAiClient::new(&config.openai_url, key.trim(), &config.openai_model)?;
        Ok(Self::with_client(client))
    }

    pub fn is_live(&self) -> bool {
        self.openai.is_some()
    }

    /// Ask the model; `None` when offline or on failure
    async fn ask(&self, system: &str, user: &str, max_tokens: u32) -> Option<String> {
        let client = self.openai.as_ref()?;
        match client.complete(system, user, max_tokens).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Coach completion failed, using rules: {:#}", e);
                None
            }
        }
    }

    fn live_insight(&self, text: String, now: DateTime<Utc>) -> CoachInsight {
        let model = self.openai.as_ref().map(|c| c.model()).unwrap_or("openai");
        CoachInsight {
            text,
            timestamp: now,
            source: format!("OpenAI {}", model),
        }
    }

    /// Macro and indices commentary
    pub async fn market_pulse(&self, snapshot: &MarketSnapshot, now: DateTime<Utc>) -> CoachInsight {
        let line = |symbol: &str, label: &str| {
            snapshot
                .quote(symbol)
                .map(|q| format!("{}: {} ({}%)\n", label, q.price, q.change_pct))
                .unwrap_or_default()
        };
        let prompt = format!(
            "Analyze the current macro data:\n{}{}{}{}\nGive a two-sentence comment on risk-on/risk-off sentiment and one key SPX level.",
            line("SPX", "S&P 500"),
            line("NDX", "NASDAQ"),
            line("XAU", "GOLD"),
            line("VIX", "VIX"),
        );

        if let Some(text) = self.ask(PERSONA, &prompt, 150).await {
            return self.live_insight(text, now);
        }

        let change = |symbol: &str| snapshot.quote(symbol).map(|q| q.change_pct).unwrap_or(0.0);
        CoachInsight::simulated(macro_commentary(change("SPX"), change("VIX")), now)
    }

    /// Crypto watchlist commentary
    pub async fn crypto_insight(&self, board: &CryptoBoard, now: DateTime<Utc>) -> CoachInsight {
        let coin = |id: &str| board.get(id).map(|c| (c.usd, c.usd_24h_change.unwrap_or(0.0)));
        let mut prompt = String::from("Analyze the current crypto data:\n");
        for (id, label) in [("bitcoin", "BTC"), ("ethereum", "ETH"), ("solana", "SOL")] {
            let (price, change) = coin(id).unwrap_or((0.0, 0.0));
            prompt.push_str(&format!("{}: ${} ({:.2}%)\n", label, price, change));
        }
        prompt.push_str("Give a two-sentence comment on overall sentiment and one generic operational recommendation.");

        if let Some(text) = self.ask(PERSONA, &prompt, 150).await {
            return self.live_insight(text, now);
        }

        let btc_change = coin("bitcoin").map(|(_, c)| c).unwrap_or(0.0);
        CoachInsight::simulated(crypto_commentary(btc_change), now)
    }

    /// Answer the last message of a conversation
    pub async fn chat(&self, request: &ChatRequest, snapshot: &MarketSnapshot) -> ChatReply {
        let context = ChatContext::parse(&request.context);
        let last = request
            .messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        if !last.trim().is_empty() {
            if let Some(text) = self.ask(context.system_prompt(), last, 600).await {
                return ChatReply {
                    response: text,
                    source: "openai".to_string(),
                };
            }
        }

        debug!("Rule-based chat reply for {:?}", context);
        ChatReply {
            response: context.fallback_reply(snapshot),
            source: SIMULATION_SOURCE.to_string(),
        }
    }

    /// Up to three tips from the day's errors; empty when there are none
    pub async fn journal_suggestions(&self, errors: &str, lessons: &str) -> Vec<String> {
        if errors.trim().is_empty() {
            return Vec::new();
        }
        let prompt = format!("Today's errors: {}\nLessons learned: {}", errors, lessons);
        let system = "You are an expert trading coach. Analyze the trader's errors and give 3 short practical tips.";

        match self.ask(system, &prompt, 300).await {
            Some(text) => bullet_lines(&text, 3),
            None => fallback_list(&JOURNAL_FALLBACK),
        }
    }

    /// Three to five concrete improvements for a written strategy
    pub async fn strategy_optimizations(&self, content: &str) -> Vec<String> {
        let system = "You are a trading expert. Analyze this strategy and suggest 3-5 concrete optimizations.";
        let prompt = format!("Strategy: {}", content);

        match self.ask(system, &prompt, 400).await {
            Some(text) => bullet_lines(&text, 5),
            None => fallback_list(&STRATEGY_FALLBACK),
        }
    }
}
