// Library crate - market simulation, analytics and the trader journal behind the Karion API

pub mod analysis;
pub mod api;
pub mod calculator;
pub mod coach;
pub mod config;
pub mod feeds;
pub mod journal;
pub mod market;
pub mod montecarlo;
pub mod news;
pub mod report;
pub mod signals;
pub mod types;

// Re-export commonly used types
pub use config::ServiceConfig;
pub use market::{MarketQuote, MarketSnapshot};
pub use montecarlo::{MonteCarloParams, MonteCarloResult};
pub use types::*;
