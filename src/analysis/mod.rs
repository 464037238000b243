//! Market analysis panels built on top of the price snapshot
//!
//! - [`risk`] - 0-100 session risk score
//! - [`bias`] - multi-source directional bias per asset
//! - [`cot`] - weekly positioning reports
//! - [`events`] - intraday macro calendar
//! - [`options_flow`] - synthetic options prints

pub mod bias;
pub mod cot;
pub mod events;
pub mod options_flow;
pub mod risk;

pub use bias::{AssetAnalysis, BiasEngine, MultiSourceReport};
pub use cot::{CotBoard, CotReport};
pub use events::{MacroEvent, UpcomingEvent, MACRO_EVENTS};
pub use options_flow::{FlowBoard, OptionFlow};
pub use risk::{RiskAnalysis, RiskCategory};
