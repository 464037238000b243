//! Position sizing for retail brokers and prop firms

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::market::quotes::round_to;

/// Units in one standard lot
pub const LOT_UNITS: f64 = 100_000.0;
/// Reward multiple used for the profit projection
pub const PROJECTION_RR: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Personal,
    Prop,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PropRules {
    pub profit_split: f64,
    pub max_dd_pct: f64,
    pub daily_dd_pct: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Broker {
    pub id: &'static str,
    pub name: &'static str,
    pub leverage: u32,
    /// Per lot, per side
    pub commission: f64,
    /// Pips
    pub spread: f64,
    pub prop: Option<PropRules>,
}

const fn retail(id: &'static str, name: &'static str, leverage: u32, commission: f64, spread: f64) -> Broker {
    Broker { id, name, leverage, commission, spread, prop: None }
}

const fn prop_firm(
    id: &'static str,
    name: &'static str,
    spread: f64,
    profit_split: f64,
    max_dd_pct: f64,
    daily_dd_pct: f64,
) -> Broker {
    Broker {
        id,
        name,
        leverage: 100,
        commission: 0.0,
        spread,
        prop: Some(PropRules { profit_split, max_dd_pct, daily_dd_pct }),
    }
}

pub static BROKERS: [Broker; 10] = [
    retail("ic_markets", "IC Markets", 500, 3.5, 0.1),
    retail("pepperstone", "Pepperstone", 500, 3.5, 0.1),
    retail("xm", "XM", 888, 0.0, 1.6),
    retail("exness", "Exness", 2000, 3.5, 0.1),
    retail("fxpro", "FxPro", 500, 4.5, 0.3),
    prop_firm("ftmo", "FTMO", 0.2, 80.0, 10.0, 5.0),
    prop_firm("funded_next", "FundedNext", 0.3, 90.0, 10.0, 5.0),
    prop_firm("the5ers", "The5ers", 0.5, 80.0, 6.0, 4.0),
    prop_firm("mff", "MyForexFunds", 0.3, 85.0, 12.0, 5.0),
    prop_firm("e8", "E8 Funding", 0.2, 80.0, 8.0, 4.0),
];

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AssetSpec {
    pub symbol: &'static str,
    pub name: &'static str,
    /// Account currency per pip per lot
    pub pip_value: f64,
    pub pip_size: f64,
}

pub static ASSETS: [AssetSpec; 6] = [
    AssetSpec { symbol: "EURUSD", name: "EUR/USD", pip_value: 10.0, pip_size: 0.0001 },
    AssetSpec { symbol: "GBPUSD", name: "GBP/USD", pip_value: 10.0, pip_size: 0.0001 },
    AssetSpec { symbol: "USDJPY", name: "USD/JPY", pip_value: 9.1, pip_size: 0.01 },
    AssetSpec { symbol: "XAUUSD", name: "Gold", pip_value: 1.0, pip_size: 0.01 },
    AssetSpec { symbol: "NAS100", name: "NASDAQ", pip_value: 1.0, pip_size: 0.01 },
    AssetSpec { symbol: "US30", name: "Dow Jones", pip_value: 1.0, pip_size: 1.0 },
];

pub fn broker(id: &str) -> Option<&'static Broker> {
    BROKERS.iter().find(|b| b.id == id)
}

pub fn asset(symbol: &str) -> Option<&'static AssetSpec> {
    ASSETS.iter().find(|a| a.symbol.eq_ignore_ascii_case(symbol))
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionRequest {
    pub broker: String,
    pub asset: String,
    pub account_size: f64,
    /// Percent of the account
    pub risk_percent: f64,
    pub stop_loss_pips: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropLimits {
    pub max_dd_amount: f64,
    pub daily_dd_amount: f64,
    pub trades_before_daily_dd: u32,
    pub profit_split: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionResult {
    pub broker: String,
    pub account_type: AccountType,
    pub asset: String,
    pub lots: f64,
    pub risk_amount: f64,
    pub commission: f64,
    pub spread_cost: f64,
    pub total_cost: f64,
    pub effective_risk: f64,
    pub effective_risk_percent: f64,
    pub potential_profit: f64,
    pub net_profit: f64,
    pub leverage: u32,
    pub margin_required: f64,
    pub prop: Option<PropLimits>,
}

pub fn calculate(req: &PositionRequest) -> Result<PositionResult> {
    let broker = broker(&req.broker).with_context(|| format!("Unknown broker: {}", req.broker))?;
    let asset = asset(&req.asset).with_context(|| format!("Unknown asset: {}", req.asset))?;

    if !req.account_size.is_finite() || req.account_size <= 0.0 {
        bail!("account_size must be positive");
    }
    if !(0.0..=100.0).contains(&req.risk_percent) || req.risk_percent == 0.0 {
        bail!("risk_percent must be in (0, 100]");
    }
    if !req.stop_loss_pips.is_finite() || req.stop_loss_pips <= 0.0 {
        bail!("stop_loss_pips must be positive");
    }

    let risk_amount = req.account_size * req.risk_percent / 100.0;
    let raw_lots = risk_amount / (req.stop_loss_pips * asset.pip_value);
    // Down to the 0.01 lot step
    let lots = (raw_lots * 100.0).floor() / 100.0;

    let commission = broker.commission * 2.0 * lots;
    let spread_cost = broker.spread * asset.pip_value * lots;
    let total_cost = commission + spread_cost;
    let effective_risk = risk_amount + total_cost;
    let potential_profit = risk_amount * PROJECTION_RR;

    let prop = broker.prop.map(|rules| {
        let daily_dd_amount = req.account_size * rules.daily_dd_pct / 100.0;
        PropLimits {
            max_dd_amount: round_to(req.account_size * rules.max_dd_pct / 100.0, 2),
            daily_dd_amount: round_to(daily_dd_amount, 2),
            trades_before_daily_dd: (daily_dd_amount / effective_risk).floor() as u32,
            profit_split: rules.profit_split,
        }
    });
    let net_profit = match broker.prop {
        Some(rules) => potential_profit * rules.profit_split / 100.0 - total_cost,
        None => potential_profit - total_cost,
    };

    Ok(PositionResult {
        broker: broker.name.to_string(),
        account_type: if broker.prop.is_some() { AccountType::Prop } else { AccountType::Personal },
        asset: asset.symbol.to_string(),
        lots,
        risk_amount: round_to(risk_amount, 2),
        commission: round_to(commission, 2),
        spread_cost: round_to(spread_cost, 2),
        total_cost: round_to(total_cost, 2),
        effective_risk: round_to(effective_risk, 2),
        effective_risk_percent: round_to(effective_risk / req.account_size * 100.0, 2),
        potential_profit: round_to(potential_profit, 2),
        net_profit: round_to(net_profit, 2),
        leverage: broker.leverage,
        margin_required: round_to(lots * LOT_UNITS / broker.leverage as f64, 2),
        prop,
    })
}
