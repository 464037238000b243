//! Trade setup generation and per-day persistence

pub mod generator;
pub mod store;

pub use generator::{Horizon, Signal, SignalConfig, SignalGenerator, SignalInput};
pub use store::{SignalBook, SignalStore, MAX_SIGNALS_PER_ASSET};
