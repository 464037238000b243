use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::{info, warn};

use karion::{
    api, coach::Coach, config::ServiceConfig, feeds, market::coingecko, signals::SignalBook,
    types::AppState,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Port to run the web server on
    #[arg(short, long, env = "PORT", default_value = "8001")]
    port: u16,

    /// Address to bind
    #[arg(long, env = "KARION_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Directory for the persisted daily signal files
    #[arg(short, long, env = "KARION_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Static frontend directory served at /
    #[arg(long, env = "KARION_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// OpenAI API key; without it the coach answers from rules
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Chat completion model
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-3.5-turbo")]
    openai_model: String,

    /// OpenAI-compatible base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = karion::coach::DEFAULT_OPENAI_URL)]
    openai_url: String,

    /// CoinGecko base URL
    #[arg(long, env = "COINGECKO_URL", default_value = coingecko::DEFAULT_BASE_URL)]
    coingecko_url: String,

    /// Skip the outbound crypto feed
    #[arg(long)]
    no_crypto: bool,

    /// Market tick period in seconds
    #[arg(long, default_value = "3")]
    market_tick: u64,

    /// News and coach pulse period in seconds
    #[arg(long, default_value = "15")]
    pulse_secs: u64,

    /// Crypto refresh period in seconds
    #[arg(long, default_value = "60")]
    crypto_secs: u64,

    /// Risk refresh period in seconds
    #[arg(long, default_value = "120")]
    risk_secs: u64,

    /// Default Monte Carlo simulation count
    #[arg(long, env = "KARION_SIMULATIONS", default_value = "1000")]
    simulations: usize,
}

impl Args {
    fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            data_dir: self.data_dir.clone(),
            market_tick_secs: self.market_tick,
            pulse_secs: self.pulse_secs,
            crypto_secs: self.crypto_secs,
            risk_secs: self.risk_secs,
            coingecko_url: self.coingecko_url.clone(),
            crypto_enabled: !self.no_crypto,
            openai_api_key: self.openai_api_key.clone(),
            openai_model: self.openai_model.clone(),
            openai_url: self.openai_url.clone(),
            simulations: self.simulations,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("karion=info".parse()?)
                .add_directive("tower_http=warn".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = args.service_config();

    info!("Starting Karion server");
    info!("Data dir: {}", config.data_dir.display());
    info!(
        "Intervals: market {}s, pulse {}s, crypto {}s, risk {}s",
        config.market_tick_secs, config.pulse_secs, config.crypto_secs, config.risk_secs
    );

    let signals = SignalBook::open(&config.data_dir, Utc::now().date_naive())
        .context("Failed to open signal store")?;
    let coach = Coach::from_config(&config).context("Failed to build coach")?;
    if coach.is_live() {
        info!("Coach: OpenAI {}", config.openai_model);
    } else {
        warn!("OPENAI_API_KEY not set, coach runs on rules only");
    }

    let state = Arc::new(AppState::new(config, signals, coach));
    let feeds = feeds::spawn_all(state.clone());
    info!("Spawned {} feed loops", feeds.len());

    let mut app = api::router(state);
    if let Some(dir) = &args.static_dir {
        info!("Serving frontend from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }
    let app = app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", args.host, args.port))?;
    info!("Server running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    for handle in feeds {
        handle.abort();
    }
    Ok(())
}
