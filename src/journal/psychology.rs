//! End-of-day scoring and check-in statistics

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::models::{EodCreate, PsychologyCheckin, PsychologyEodEntry};
use crate::market::quotes::round_to;

/// Check-ins shown in the trend chart
pub const TREND_LEN: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentalState {
    Lucid,
    Stable,
    Strained,
    Tilt,
}

impl MentalState {
    pub fn from_score(score: u8) -> Self {
        match score {
            75.. => MentalState::Lucid,
            50..=74 => MentalState::Stable,
            30..=49 => MentalState::Strained,
            _ => MentalState::Tilt,
        }
    }
}

/// Base from focus, energy and (inverted) stress, then behavior flags
pub fn eod_score(eod: &EodCreate) -> u8 {
    let base = (eod.focus as i32 * 4 + eod.energy as i32 * 3 + (11 - eod.stress as i32) * 3).min(100);

    let mut score = base;
    if eod.overtraded {
        score -= 15;
    }
    if eod.revenge_trade {
        score -= 20;
    }
    if eod.moved_stop {
        score -= 15;
    }
    if eod.followed_plan {
        score += 10;
    }
    score.clamp(0, 100) as u8
}

pub fn eod_suggestions(eod: &EodCreate) -> Vec<String> {
    let mut out = Vec::new();
    if eod.overtraded {
        out.push("Set a hard cap on trades per session.".to_string());
    }
    if eod.revenge_trade {
        out.push("After a loss, step away for 15 minutes before the next entry.".to_string());
    }
    if eod.moved_stop {
        out.push("Place the stop before entry and never widen it.".to_string());
    }
    if !eod.followed_plan {
        out.push("Write down exactly where you deviated from the plan.".to_string());
    }
    if eod.stress >= 7 {
        out.push("High stress: trade reduced size tomorrow.".to_string());
    }
    if eod.focus <= 4 {
        out.push("Low focus: only take A+ setups.".to_string());
    }
    if eod.energy <= 3 {
        out.push("Low energy: protect your sleep tonight.".to_string());
    }
    if out.is_empty() {
        out.push("Plan respected. Repeat the same process tomorrow.".to_string());
    }
    out
}

pub fn score_eod(eod: EodCreate, now: DateTime<Utc>) -> PsychologyEodEntry {
    let score = eod_score(&eod);
    let suggestions = eod_suggestions(&eod);
    PsychologyEodEntry {
        id: Uuid::new_v4(),
        date: now.date_naive(),
        stress: eod.stress,
        focus: eod.focus,
        energy: eod.energy,
        followed_plan: eod.followed_plan,
        overtraded: eod.overtraded,
        revenge_trade: eod.revenge_trade,
        moved_stop: eod.moved_stop,
        notes: eod.notes,
        score,
        state: MentalState::from_score(score),
        suggestions,
        created_at: now,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub confidence: u8,
    pub discipline: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsychologyStats {
    pub avg_confidence: f64,
    pub avg_discipline: f64,
    pub avg_sleep_hours: f64,
    pub avg_sleep_quality: f64,
    pub total_entries: usize,
    /// Newest first
    pub trend: Vec<TrendPoint>,
}

pub fn psychology_stats(checkins: &[PsychologyCheckin]) -> PsychologyStats {
    let total = checkins.len();
    if total == 0 {
        return PsychologyStats {
            avg_confidence: 0.0,
            avg_discipline: 0.0,
            avg_sleep_hours: 0.0,
            avg_sleep_quality: 0.0,
            total_entries: 0,
            trend: Vec::new(),
        };
    }

    let n = total as f64;
    let avg = |f: fn(&PsychologyCheckin) -> f64| round_to(checkins.iter().map(f).sum::<f64>() / n, 1);

    let mut recent: Vec<&PsychologyCheckin> = checkins.iter().collect();
    recent.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));

    PsychologyStats {
        avg_confidence: avg(|c| c.confidence as f64),
        avg_discipline: avg(|c| c.discipline as f64),
        avg_sleep_hours: avg(|c| c.sleep_hours),
        avg_sleep_quality: avg(|c| c.sleep_quality as f64),
        total_entries: total,
        trend: recent
            .into_iter()
            .take(TREND_LEN)
            .map(|c| TrendPoint {
                date: c.date,
                confidence: c.confidence,
                discipline: c.discipline,
            })
            .collect(),
    }
}
