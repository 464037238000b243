//! Journal records and their create payloads

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::psychology::MentalState;

fn check_scale(name: &str, value: u8) -> Result<()> {
    if !(1..=10).contains(&value) {
        bail!("{} must be between 1 and 10, got {}", name, value);
    }
    Ok(())
}

fn default_scale() -> u8 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckinCreate {
    pub confidence: u8,
    pub discipline: u8,
    pub emotional_state: String,
    pub sleep_hours: f64,
    pub sleep_quality: u8,
    #[serde(default)]
    pub notes: String,
}

impl CheckinCreate {
    pub fn validate(&self) -> Result<()> {
        check_scale("confidence", self.confidence)?;
        check_scale("discipline", self.discipline)?;
        check_scale("sleep_quality", self.sleep_quality)?;
        if !(0.0..=24.0).contains(&self.sleep_hours) {
            bail!("sleep_hours must be between 0 and 24");
        }
        Ok(())
    }
}

/// Pre-session psychology check-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsychologyCheckin {
    pub id: Uuid,
    pub date: NaiveDate,
    pub confidence: u8,
    pub discipline: u8,
    pub emotional_state: String,
    pub sleep_hours: f64,
    pub sleep_quality: u8,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl PsychologyCheckin {
    pub fn from_create(data: CheckinCreate, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            date: now.date_naive(),
            confidence: data.confidence,
            discipline: data.discipline,
            emotional_state: data.emotional_state,
            sleep_hours: data.sleep_hours,
            sleep_quality: data.sleep_quality,
            notes: data.notes,
            created_at: now,
        }
    }
}

/// End-of-day self assessment as submitted
#[derive(Debug, Clone, Deserialize)]
pub struct EodCreate {
    #[serde(default = "default_scale")]
    pub stress: u8,
    #[serde(default = "default_scale")]
    pub focus: u8,
    #[serde(default = "default_scale")]
    pub energy: u8,
    #[serde(default)]
    pub followed_plan: bool,
    #[serde(default)]
    pub overtraded: bool,
    #[serde(default)]
    pub revenge_trade: bool,
    #[serde(default)]
    pub moved_stop: bool,
    #[serde(default)]
    pub notes: String,
}

impl Default for EodCreate {
    fn default() -> Self {
        Self {
            stress: 5,
            focus: 5,
            energy: 5,
            followed_plan: false,
            overtraded: false,
            revenge_trade: false,
            moved_stop: false,
            notes: String::new(),
        }
    }
}

impl EodCreate {
    pub fn validate(&self) -> Result<()> {
        check_scale("stress", self.stress)?;
        check_scale("focus", self.focus)?;
        check_scale("energy", self.energy)?;
        Ok(())
    }
}

/// Scored end-of-day entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsychologyEodEntry {
    pub id: Uuid,
    pub date: NaiveDate,
    pub stress: u8,
    pub focus: u8,
    pub energy: u8,
    pub followed_plan: bool,
    pub overtraded: bool,
    pub revenge_trade: bool,
    pub moved_stop: bool,
    pub notes: String,
    pub score: u8,
    pub state: MentalState,
    pub suggestions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalEntryCreate {
    pub plan_respected: bool,
    pub emotions: String,
    pub lucid_state: bool,
    #[serde(default)]
    pub optimization_notes: String,
    #[serde(default)]
    pub errors_today: String,
    #[serde(default)]
    pub lessons_learned: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub date: NaiveDate,
    pub plan_respected: bool,
    pub emotions: String,
    pub lucid_state: bool,
    pub optimization_notes: String,
    pub errors_today: String,
    pub lessons_learned: String,
    pub ai_suggestions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn from_create(data: JournalEntryCreate, ai_suggestions: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            date: now.date_naive(),
            plan_respected: data.plan_respected,
            emotions: data.emotions,
            lucid_state: data.lucid_state,
            optimization_notes: data.optimization_notes,
            errors_today: data.errors_today,
            lessons_learned: data.lessons_learned,
            ai_suggestions,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyCreate {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub id: Uuid,
    pub name: String,
    pub content: String,
    pub ai_optimizations: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeCreate {
    pub symbol: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub profit_loss: f64,
    pub profit_loss_r: f64,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub rules_followed: Vec<String>,
    #[serde(default)]
    pub rules_violated: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub symbol: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub profit_loss: f64,
    pub profit_loss_r: f64,
    pub date: NaiveDate,
    pub notes: String,
    pub rules_followed: Vec<String>,
    pub rules_violated: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl TradeRecord {
    pub fn from_create(data: TradeCreate, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: data.symbol.to_ascii_uppercase(),
            entry_price: data.entry_price,
            exit_price: data.exit_price,
            profit_loss: data.profit_loss,
            profit_loss_r: data.profit_loss_r,
            date: data.date,
            notes: data.notes,
            rules_followed: data.rules_followed,
            rules_violated: data.rules_violated,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeStats {
    pub total_trades: usize,
    /// Percent, one decimal
    pub win_rate: f64,
    pub avg_r: f64,
    pub total_pnl: f64,
    pub wins: usize,
    pub losses: usize,
    /// Deepest peak-to-trough drop of cumulative PnL
    pub max_drawdown: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleCreate {
    pub rule: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisciplineRule {
    pub id: Uuid,
    pub rule: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostCreate {
    #[serde(default)]
    pub image_url: String,
    pub caption: String,
    #[serde(default)]
    pub profit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostComment {
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityPost {
    pub id: Uuid,
    pub user_name: String,
    pub image_url: String,
    pub caption: String,
    pub profit: f64,
    pub likes: u32,
    pub comments: Vec<PostComment>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
}

impl std::str::FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => bail!("Invalid theme: {}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    It,
    En,
    Fr,
}

impl std::str::FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "it" => Ok(Language::It),
            "en" => Ok(Language::En),
            "fr" => Ok(Language::Fr),
            other => bail!("Invalid language: {}", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub theme: Theme,
    pub language: Language,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            language: Language::It,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eod_defaults() {
        let eod: EodCreate = serde_json::from_str(r#"{"stress": 3}"#).unwrap();
        assert_eq!(eod.stress, 3);
        assert_eq!(eod.focus, 5);
        assert_eq!(eod.energy, 5);
        assert!(!eod.moved_stop);
        assert!(eod.validate().is_ok());
    }

    #[test]
    fn test_scale_validation() {
        let eod = EodCreate { focus: 11, ..Default::default() };
        assert!(eod.validate().is_err());

        let checkin = CheckinCreate {
            confidence: 0,
            discipline: 5,
            emotional_state: "calm".to_string(),
            sleep_hours: 7.0,
            sleep_quality: 6,
            notes: String::new(),
        };
        assert!(checkin.validate().is_err());
    }

    #[test]
    fn test_settings_parse() {
        assert_eq!("light".parse::<Theme>().unwrap(), Theme::Light);
        assert!("blue".parse::<Theme>().is_err());
        assert_eq!("fr".parse::<Language>().unwrap(), Language::Fr);
        assert!("de".parse::<Language>().is_err());
    }
}
