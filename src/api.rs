//! HTTP and websocket surface
//!
//! JSON handlers live under `/api`; `/ws` streams [`WsMessage`] frames.
//! Failures come back as `{"error": "..."}` with 400 for bad input, 404 for
//! unknown ids and 503 while a feed has not produced data yet.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::{cot, options_flow};
use crate::calculator::{self, PositionRequest};
use crate::coach::ChatRequest;
use crate::journal::{
    self, CheckinCreate, EodCreate, JournalEntryCreate, Language, PostCreate, RuleCreate,
    StrategyCreate, Theme, TradeCreate,
};
use crate::montecarlo::{self, DerivedMetrics, MonteCarloParams};
use crate::signals::{Horizon, Signal};
use crate::types::{AppState, ClientMessage, WsMessage};

type ApiResponse = (StatusCode, Json<serde_json::Value>);

fn reply<T: Serialize>(status: StatusCode, body: T) -> ApiResponse {
    (status, Json(serde_json::json!(body)))
}

fn error(status: StatusCode, message: impl std::fmt::Display) -> ApiResponse {
    (status, Json(serde_json::json!({"error": message.to_string()})))
}

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/", get(get_status))
        // market
        .route("/market/prices", get(get_prices))
        .route("/market/vix", get(get_vix))
        .route("/market/crypto", get(get_crypto))
        .route("/news", get(get_news))
        .route("/signals", get(get_signals))
        // analysis
        .route("/risk/analysis", get(get_risk))
        .route("/analysis/multi-source", get(get_multi_source))
        .route("/cot/data", get(get_cot_board))
        .route("/cot/{symbol}", get(get_cot_symbol))
        .route("/options/flow/{symbol}", get(get_options_flow))
        .route("/montecarlo/simulate", post(post_simulate))
        .route("/montecarlo/metrics", post(post_metrics))
        .route("/calculator/position", post(post_position))
        // coach
        .route("/ai/chat", post(post_chat))
        .route("/ai/pulse", get(get_pulse))
        .route("/ai/crypto-insight", get(get_crypto_insight))
        // journal
        .route("/psychology/checkin", post(post_checkin))
        .route("/psychology/checkins", get(get_checkins))
        .route("/psychology/stats", get(get_psychology_stats))
        .route("/psychology/eod", post(post_eod).get(get_eod))
        .route("/journal/entry", post(post_journal_entry))
        .route("/journal/entries", get(get_journal_entries))
        .route("/strategy", post(post_strategy))
        .route("/strategies", get(get_strategies))
        .route("/strategy/{id}/optimize", post(post_optimize_strategy))
        .route("/trades", post(post_trade).get(get_trades))
        .route("/trades/stats", get(get_trade_stats))
        .route("/rules", post(post_rule).get(get_rules))
        .route("/rules/{id}", delete(delete_rule))
        .route("/community/posts", post(post_community).get(get_community))
        .route("/community/posts/{id}/like", post(post_like))
        .route("/philosophy/quote", get(get_quote))
        .route("/ascension/status", get(get_ascension))
        .route("/settings", get(get_settings))
        .route("/settings/theme", put(put_theme))
        .route("/settings/language", put(put_language));

    Router::new()
        .nest("/api", api)
        .route("/ws", get(ws_handler))
        .with_state(state)
}

// ---- market ----

/// GET /api/ - Service status
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let version = state.snapshot.borrow().version;
    reply(
        StatusCode::OK,
        serde_json::json!({
            "message": "Karion API",
            "status": "online",
            "version": env!("CARGO_PKG_VERSION"),
            "ai": state.coach.is_live(),
            "snapshot_version": version,
        }),
    )
}

/// GET /api/market/prices - Index quotes from the latest tick
pub async fn get_prices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.snapshot();
    reply(
        StatusCode::OK,
        serde_json::json!({
            "quotes": snapshot.quotes,
            "levels": snapshot.levels,
            "version": snapshot.version,
            "timestamp": snapshot.updated_at,
        }),
    )
}

/// GET /api/market/vix - Volatility regime
pub async fn get_vix(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.snapshot().vix {
        Some(vix) => reply(StatusCode::OK, vix),
        None => error(StatusCode::SERVICE_UNAVAILABLE, "VIX not available yet"),
    }
}

/// GET /api/market/crypto - Last CoinGecko board
pub async fn get_crypto(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let board = state.snapshot().crypto;
    if board.is_empty() {
        return error(StatusCode::SERVICE_UNAVAILABLE, "Crypto prices not available yet");
    }
    let quotes: Vec<_> = board.iter().map(|(id, q)| q.to_market_quote(id)).collect();
    reply(StatusCode::OK, serde_json::json!({ "coins": board, "quotes": quotes }))
}

/// GET /api/news - Rolling headline feed
pub async fn get_news(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    reply(StatusCode::OK, serde_json::json!({ "news": state.snapshot().news }))
}

#[derive(Debug, Deserialize)]
pub struct SignalsQuery {
    pub horizon: Option<String>,
}

#[derive(Serialize)]
pub struct SignalsResponse {
    pub signals: Vec<Signal>,
    pub total: usize,
    pub horizon: Option<Horizon>,
}

/// GET /api/signals?horizon= - Today's stored setups
pub async fn get_signals(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SignalsQuery>,
) -> impl IntoResponse {
    let horizon = match params.horizon.as_deref().map(str::parse::<Horizon>).transpose() {
        Ok(h) => h,
        Err(e) => return error(StatusCode::BAD_REQUEST, e),
    };

    let signals = state.signals.lock().await.signals(horizon);
    reply(
        StatusCode::OK,
        SignalsResponse {
            total: signals.len(),
            signals,
            horizon,
        },
    )
}

// ---- analysis ----

/// GET /api/risk/analysis - Latest risk score, computed on demand before the first refresh
pub async fn get_risk(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.snapshot();
    if let Some(risk) = snapshot.risk {
        return reply(StatusCode::OK, risk);
    }
    match snapshot.vix.as_ref() {
        Some(vix) => {
            let analysis = crate::analysis::risk::analyze(vix, &snapshot.quotes, &snapshot.levels, Utc::now());
            reply(StatusCode::OK, analysis)
        }
        None => error(StatusCode::SERVICE_UNAVAILABLE, "Market data not available yet"),
    }
}

/// GET /api/analysis/multi-source - Weighted bias per asset
pub async fn get_multi_source(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.snapshot();
    let Some(vix) = snapshot.vix.as_ref() else {
        return error(StatusCode::SERVICE_UNAVAILABLE, "Market data not available yet");
    };

    let mut engine = state.bias.lock().await;
    let mut rng = StdRng::from_entropy();
    let report = engine.report(&snapshot.quotes, vix, Utc::now(), &mut rng);
    reply(StatusCode::OK, report)
}

/// GET /api/cot/data - Positioning for every covered market
pub async fn get_cot_board() -> impl IntoResponse {
    let mut rng = StdRng::from_entropy();
    match cot::board(Utc::now(), &mut rng) {
        Ok(board) => reply(StatusCode::OK, board),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)),
    }
}

/// GET /api/cot/{symbol}
pub async fn get_cot_symbol(Path(symbol): Path<String>) -> impl IntoResponse {
    let mut rng = StdRng::from_entropy();
    match cot::generate(&symbol, Utc::now(), &mut rng) {
        Ok(report) => reply(StatusCode::OK, report),
        Err(e) => error(StatusCode::BAD_REQUEST, e),
    }
}

/// GET /api/options/flow/{symbol}
pub async fn get_options_flow(Path(symbol): Path<String>) -> impl IntoResponse {
    let mut rng = StdRng::from_entropy();
    reply(StatusCode::OK, options_flow::board(&symbol, Utc::now(), &mut rng))
}

/// POST /api/montecarlo/simulate - Runs on the blocking pool
pub async fn post_simulate(
    State(state): State<Arc<AppState>>,
    Json(params): Json<MonteCarloParams>,
) -> impl IntoResponse {
    let default_sims = state.config.simulations;
    let started = std::time::Instant::now();

    match tokio::task::spawn_blocking(move || montecarlo::simulate(&params, default_sims)).await {
        Ok(Ok(result)) => {
            info!(
                "Monte Carlo: {} runs x {} trades in {:?}",
                result.simulations,
                result.params.num_trades,
                started.elapsed()
            );
            reply(StatusCode::OK, result)
        }
        Ok(Err(e)) => error(StatusCode::BAD_REQUEST, format!("{:#}", e)),
        Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, format!("Simulation task failed: {}", e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct MetricsRequest {
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
}

/// POST /api/montecarlo/metrics - Closed-form metrics without simulating
pub async fn post_metrics(Json(req): Json<MetricsRequest>) -> impl IntoResponse {
    match MonteCarloParams::new(req.win_rate, req.avg_win, req.avg_loss).normalized() {
        Ok(p) => reply(StatusCode::OK, DerivedMetrics::compute(p.win_rate, p.avg_win, p.avg_loss)),
        Err(e) => error(StatusCode::BAD_REQUEST, e),
    }
}

/// POST /api/calculator/position
pub async fn post_position(Json(req): Json<PositionRequest>) -> impl IntoResponse {
    match calculator::calculate(&req) {
        Ok(result) => reply(StatusCode::OK, result),
        Err(e) => error(StatusCode::BAD_REQUEST, e),
    }
}

// ---- coach ----

/// POST /api/ai/chat
pub async fn post_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let snapshot = state.snapshot();
    reply(StatusCode::OK, state.coach.chat(&req, &snapshot).await)
}

/// GET /api/ai/pulse - Latest pulse, generated when none was published yet
pub async fn get_pulse(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.snapshot();
    match snapshot.pulse {
        Some(pulse) => reply(StatusCode::OK, pulse),
        None => reply(StatusCode::OK, state.coach.market_pulse(&snapshot, Utc::now()).await),
    }
}

/// GET /api/ai/crypto-insight
pub async fn get_crypto_insight(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.snapshot();
    reply(StatusCode::OK, state.coach.crypto_insight(&snapshot.crypto, Utc::now()).await)
}

// ---- psychology & journal ----

/// POST /api/psychology/checkin
pub async fn post_checkin(
    State(state): State<Arc<AppState>>,
    Json(data): Json<CheckinCreate>,
) -> impl IntoResponse {
    match state.journal.add_checkin(data, Utc::now()).await {
        Ok(checkin) => reply(StatusCode::OK, checkin),
        Err(e) => error(StatusCode::BAD_REQUEST, e),
    }
}

pub async fn get_checkins(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    reply(StatusCode::OK, state.journal.checkins().await)
}

pub async fn get_psychology_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    reply(StatusCode::OK, state.journal.psychology_stats().await)
}

/// POST /api/psychology/eod - Scored end-of-day review
pub async fn post_eod(
    State(state): State<Arc<AppState>>,
    Json(data): Json<EodCreate>,
) -> impl IntoResponse {
    match state.journal.add_eod(data, Utc::now()).await {
        Ok(entry) => reply(StatusCode::OK, entry),
        Err(e) => error(StatusCode::BAD_REQUEST, e),
    }
}

pub async fn get_eod(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    reply(StatusCode::OK, state.journal.eod_entries().await)
}

/// POST /api/journal/entry - Stores the entry with coach suggestions for the day's errors
pub async fn post_journal_entry(
    State(state): State<Arc<AppState>>,
    Json(data): Json<JournalEntryCreate>,
) -> impl IntoResponse {
    let suggestions = state
        .coach
        .journal_suggestions(&data.errors_today, &data.lessons_learned)
        .await;
    let entry = state.journal.add_journal_entry(data, suggestions, Utc::now()).await;
    reply(StatusCode::OK, entry)
}

pub async fn get_journal_entries(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    reply(StatusCode::OK, state.journal.journal_entries().await)
}

pub async fn post_strategy(
    State(state): State<Arc<AppState>>,
    Json(data): Json<StrategyCreate>,
) -> impl IntoResponse {
    reply(StatusCode::OK, state.journal.add_strategy(data, Utc::now()).await)
}

pub async fn get_strategies(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    reply(StatusCode::OK, state.journal.strategies().await)
}

/// POST /api/strategy/{id}/optimize
pub async fn post_optimize_strategy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let Some(strategy) = state.journal.strategy(id).await else {
        return error(StatusCode::NOT_FOUND, "Strategy not found");
    };

    let optimizations = state.coach.strategy_optimizations(&strategy.content).await;
    match state.journal.set_optimizations(id, optimizations, Utc::now()).await {
        Some(updated) => reply(
            StatusCode::OK,
            serde_json::json!({ "optimizations": updated.ai_optimizations }),
        ),
        None => error(StatusCode::NOT_FOUND, "Strategy not found"),
    }
}

pub async fn post_trade(
    State(state): State<Arc<AppState>>,
    Json(data): Json<TradeCreate>,
) -> impl IntoResponse {
    reply(StatusCode::OK, state.journal.add_trade(data, Utc::now()).await)
}

pub async fn get_trades(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    reply(StatusCode::OK, state.journal.trades().await)
}

pub async fn get_trade_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    reply(StatusCode::OK, state.journal.trade_stats().await)
}

pub async fn post_rule(
    State(state): State<Arc<AppState>>,
    Json(data): Json<RuleCreate>,
) -> impl IntoResponse {
    if data.rule.trim().is_empty() {
        return error(StatusCode::BAD_REQUEST, "Rule text is empty");
    }
    reply(StatusCode::OK, state.journal.add_rule(data, Utc::now()).await)
}

pub async fn get_rules(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    reply(StatusCode::OK, state.journal.rules().await)
}

/// DELETE /api/rules/{id}
pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    if state.journal.delete_rule(id).await {
        reply(StatusCode::OK, serde_json::json!({ "status": "deleted" }))
    } else {
        error(StatusCode::NOT_FOUND, "Rule not found")
    }
}

pub async fn post_community(
    State(state): State<Arc<AppState>>,
    Json(data): Json<PostCreate>,
) -> impl IntoResponse {
    reply(StatusCode::OK, state.journal.add_post(data, Utc::now()).await)
}

pub async fn get_community(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    reply(StatusCode::OK, state.journal.posts().await)
}

/// POST /api/community/posts/{id}/like
pub async fn post_like(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.journal.like_post(id).await {
        Some(likes) => reply(StatusCode::OK, serde_json::json!({ "status": "liked", "likes": likes })),
        None => error(StatusCode::NOT_FOUND, "Post not found"),
    }
}

pub async fn get_quote() -> impl IntoResponse {
    reply(StatusCode::OK, journal::random_quote())
}

pub async fn get_ascension(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    reply(StatusCode::OK, state.journal.ascension().await)
}

// ---- settings ----

#[derive(Debug, Deserialize)]
pub struct ThemeQuery {
    pub theme: String,
}

#[derive(Debug, Deserialize)]
pub struct LanguageQuery {
    pub language: String,
}

pub async fn get_settings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    reply(StatusCode::OK, state.journal.settings().await)
}

/// PUT /api/settings/theme?theme=
pub async fn put_theme(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ThemeQuery>,
) -> impl IntoResponse {
    match q.theme.parse::<Theme>() {
        Ok(theme) => {
            state.journal.set_theme(theme).await;
            reply(StatusCode::OK, serde_json::json!({ "status": "updated", "theme": theme }))
        }
        Err(e) => error(StatusCode::BAD_REQUEST, e),
    }
}

/// PUT /api/settings/language?language=
pub async fn put_language(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LanguageQuery>,
) -> impl IntoResponse {
    match q.language.parse::<Language>() {
        Ok(language) => {
            state.journal.set_language(language).await;
            reply(
                StatusCode::OK,
                serde_json::json!({ "status": "updated", "language": language }),
            )
        }
        Err(e) => error(StatusCode::BAD_REQUEST, e),
    }
}

// ---- websocket ----

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Answer a client frame; the reply goes to that client only
pub fn client_reply(state: &AppState, text: &str) -> Option<WsMessage> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_msg) => match client_msg.action.as_str() {
            "snapshot" => {
                let snap = state.snapshot();
                Some(WsMessage::Quotes {
                    version: snap.version,
                    quotes: snap.quotes,
                })
            }
            other => {
                debug!("Ignoring websocket action: {}", other);
                None
            }
        },
        Err(e) => {
            debug!("Bad websocket message: {}", e);
            None
        }
    }
}

pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.tx.subscribe();
    let (reply_tx, mut reply_rx) = tokio::sync::mpsc::channel::<WsMessage>(16);

    // Greet with the symbols on the board
    let symbols: Vec<String> = state.snapshot().quotes.into_iter().map(|q| q.symbol).collect();
    let welcome = WsMessage::Connected { symbols };
    if let Ok(json) = serde_json::to_string(&welcome) {
        let _ = sender.send(Message::Text(json.into())).await;
    }

    let send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                broadcast = rx.recv() => match broadcast {
                    Ok(msg) => msg,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket client lagged, skipped {} messages", n);
                        continue;
                    }
                    Err(_) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(msg) => msg,
                    None => break,
                },
            };
            if let Ok(json) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    let state_clone = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Some(reply) = client_reply(&state_clone, &text) {
                    if reply_tx.send(reply).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coach::Coach;
    use crate::config::ServiceConfig;
    use crate::signals::SignalBook;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(dir: &std::path::Path) -> (Router, Arc<AppState>) {
        let book = SignalBook::open(dir, Utc::now().date_naive()).unwrap();
        let state = Arc::new(AppState::new(ServiceConfig::default(), book, Coach::offline()));
        (router(state.clone()), state)
    }

    async fn call(app: Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_status() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(dir.path());
        let (status, body) = call(app, "GET", "/api", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "online");
        assert_eq!(body["ai"], false);
    }

    #[tokio::test]
    async fn test_signals_bad_horizon() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(dir.path());
        let (status, body) = call(app.clone(), "GET", "/api/signals?horizon=weekly", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = call(app, "GET", "/api/signals?horizon=short", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn test_vix_unavailable_before_first_tick() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(dir.path());
        let (status, _) = call(app.clone(), "GET", "/api/market/vix", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (status, _) = call(app, "GET", "/api/analysis/multi-source", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_metrics_example() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(dir.path());
        let payload = serde_json::json!({"win_rate": 55, "avg_win": 2.0, "avg_loss": 1.0});
        let (status, body) = call(app, "POST", "/api/montecarlo/metrics", Some(payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert!((body["expectancy"].as_f64().unwrap() - 0.65).abs() < 1e-9);
        assert!((body["profit_factor"].as_f64().unwrap() - 2.444).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_simulate_small_batch() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(dir.path());
        let payload = serde_json::json!({
            "win_rate": 0.5, "avg_win": 1.5, "avg_loss": 1.0,
            "num_trades": 100, "simulations": 30, "seed": 9
        });
        let (status, body) = call(app.clone(), "POST", "/api/montecarlo/simulate", Some(payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["simulations"], 30);
        assert_eq!(body["seed"], 9);
        assert_eq!(body["equity_curves"].as_array().unwrap().len(), 20);

        let bad = serde_json::json!({"win_rate": -1.0, "avg_win": 1.0, "avg_loss": 1.0});
        let (status, _) = call(app, "POST", "/api/montecarlo/simulate", Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cot_unsupported_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(dir.path());
        let (status, _) = call(app.clone(), "GET", "/api/cot/DOGE", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = call(app, "GET", "/api/cot/SPX", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "SPX");
    }

    #[tokio::test]
    async fn test_rules_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(dir.path());
        let (status, rule) = call(
            app.clone(),
            "POST",
            "/api/rules",
            Some(serde_json::json!({"rule": "Max 3 trades a day"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let missing = format!("/api/rules/{}", Uuid::new_v4());
        let (status, _) = call(app.clone(), "DELETE", &missing, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = format!("/api/rules/{}", rule["id"].as_str().unwrap());
        let (status, _) = call(app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_journal_entry_awards_xp() {
        let dir = tempfile::tempdir().unwrap();
        let (app, state) = app(dir.path());
        let payload = serde_json::json!({
            "plan_respected": false,
            "emotions": "frustrated",
            "lucid_state": false,
            "errors_today": "Moved my stop twice"
        });
        let (status, body) = call(app.clone(), "POST", "/api/journal/entry", Some(payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ai_suggestions"].as_array().unwrap().len(), 3);
        assert_eq!(state.journal.xp().await, 15);

        let (_, status_body) = call(app, "GET", "/api/ascension/status", None).await;
        assert_eq!(status_body["xp"], 15);
    }

    #[tokio::test]
    async fn test_optimize_unknown_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(dir.path());
        let uri = format!("/api/strategy/{}/optimize", Uuid::new_v4());
        let (status, _) = call(app, "POST", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_settings_validation() {
        let dir = tempfile::tempdir().unwrap();
        let (app, state) = app(dir.path());
        let (status, _) = call(app.clone(), "PUT", "/api/settings/theme?theme=blue", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = call(app, "PUT", "/api/settings/language?language=en", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["language"], "en");
        assert_eq!(state.journal.settings().await.language, Language::En);
    }

    #[tokio::test]
    async fn test_position_calculator() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = app(dir.path());
        let payload = serde_json::json!({
            "broker": "ftmo", "asset": "EURUSD",
            "account_size": 10000.0, "risk_percent": 1.0, "stop_loss_pips": 20.0
        });
        let (status, body) = call(app, "POST", "/api/calculator/position", Some(payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lots"], 0.5);
        assert_eq!(body["prop"]["trades_before_daily_dd"], 4);
    }

    #[tokio::test]
    async fn test_snapshot_request_answers_only_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let (_, state) = app(dir.path());
        let mut other_client = state.tx.subscribe();

        let reply = client_reply(&state, r#"{"action":"snapshot"}"#);
        assert!(matches!(reply, Some(WsMessage::Quotes { version: 0, .. })));
        assert!(matches!(
            other_client.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));

        assert!(client_reply(&state, r#"{"action":"dance"}"#).is_none());
        assert!(client_reply(&state, "not json").is_none());
    }
}
