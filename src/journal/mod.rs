//! Trader journal, psychology and gamification
//!
//! Everything lives in memory behind one lock and belongs to the single
//! local trader profile. Writes that earn XP bump the profile counter in the
//! same critical section.

pub mod ascension;
pub mod models;
pub mod psychology;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::market::quotes::round_to;

pub use ascension::{AscensionStatus, Level, LEVELS};
pub use models::*;
pub use psychology::{MentalState, PsychologyStats};

/// Check-ins, EOD reviews and journal entries kept and returned per listing.
/// Older records are dropped once a list is full.
pub const LIST_LIMIT: usize = 100;
pub const STRATEGY_LIMIT: usize = 50;
pub const RULE_LIMIT: usize = 50;
pub const POST_LIMIT: usize = 50;
pub const TRADE_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub author: &'static str,
    pub quote: &'static str,
}

const PHILOSOPHY_QUOTES: [Quote; 10] = [
    Quote { author: "Marcus Aurelius", quote: "It is not death that a man should fear, but never beginning to live." },
    Quote { author: "Seneca", quote: "Luck is what happens when preparation meets opportunity." },
    Quote { author: "Sun Tzu", quote: "Know the enemy and know yourself; in a hundred battles you will never be in peril." },
    Quote { author: "Aristotle", quote: "We are what we repeatedly do. Excellence, then, is not an act, but a habit." },
    Quote { author: "Epictetus", quote: "Men are disturbed not by things, but by the opinions they form of things." },
    Quote { author: "Lao Tzu", quote: "A journey of a thousand miles begins with a single step." },
    Quote { author: "Musashi", quote: "Perceive that which cannot be seen with the eye." },
    Quote { author: "Buddha", quote: "The mind is everything. What you think, you become." },
    Quote { author: "Confucius", quote: "Our greatest glory is not in never falling, but in rising every time we fall." },
    Quote { author: "Plato", quote: "Courage is knowing what not to fear." },
];

pub fn random_quote() -> Quote {
    *PHILOSOPHY_QUOTES
        .choose(&mut rand::thread_rng())
        .unwrap_or(&PHILOSOPHY_QUOTES[0])
}

#[derive(Debug)]
struct Profile {
    name: String,
    xp: u32,
    settings: Settings,
}

#[derive(Debug)]
struct JournalData {
    profile: Profile,
    checkins: Vec<PsychologyCheckin>,
    eod_entries: Vec<PsychologyEodEntry>,
    entries: Vec<JournalEntry>,
    strategies: Vec<Strategy>,
    trades: Vec<TradeRecord>,
    rules: Vec<DisciplineRule>,
    posts: Vec<CommunityPost>,
}

impl JournalData {
    fn award(&mut self, xp: u32, reason: &str) {
        self.profile.xp = self.profile.xp.saturating_add(xp);
        info!("+{} XP for {} (total {})", xp, reason, self.profile.xp);
    }
}

/// Newest first, at most `limit`
fn newest<T: Clone>(items: &[T], limit: usize) -> Vec<T> {
    items.iter().rev().take(limit).cloned().collect()
}

/// Append, dropping the oldest items beyond `cap`
fn push_bounded<T>(items: &mut Vec<T>, item: T, cap: usize) {
    items.push(item);
    if items.len() > cap {
        let excess = items.len() - cap;
        items.drain(..excess);
    }
}

pub struct JournalStore {
    data: RwLock<JournalData>,
}

impl Default for JournalStore {
    fn default() -> Self {
        Self::new("Trader")
    }
}

impl JournalStore {
    pub fn new(profile_name: &str) -> Self {
        Self {
            data: RwLock::new(JournalData {
                profile: Profile {
                    name: profile_name.to_string(),
                    xp: 0,
                    settings: Settings::default(),
                },
                checkins: Vec::new(),
                eod_entries: Vec::new(),
                entries: Vec::new(),
                strategies: Vec::new(),
                trades: Vec::new(),
                rules: Vec::new(),
                posts: Vec::new(),
            }),
        }
    }

    pub async fn xp(&self) -> u32 {
        self.data.read().await.profile.xp
    }

    pub async fn ascension(&self) -> AscensionStatus {
        ascension::status(self.xp().await)
    }

    // ---- psychology ----

    pub async fn add_checkin(&self, data: CheckinCreate, now: DateTime<Utc>) -> Result<PsychologyCheckin> {
        data.validate()?;
        let checkin = PsychologyCheckin::from_create(data, now);
        let mut guard = self.data.write().await;
        push_bounded(&mut guard.checkins, checkin.clone(), LIST_LIMIT);
        guard.award(ascension::XP_CHECKIN, "check-in");
        Ok(checkin)
    }

    pub async fn checkins(&self) -> Vec<PsychologyCheckin> {
        newest(&self.data.read().await.checkins, LIST_LIMIT)
    }

    pub async fn psychology_stats(&self) -> PsychologyStats {
        psychology::psychology_stats(&self.data.read().await.checkins)
    }

    pub async fn add_eod(&self, data: EodCreate, now: DateTime<Utc>) -> Result<PsychologyEodEntry> {
        data.validate()?;
        let entry = psychology::score_eod(data, now);
        let mut guard = self.data.write().await;
        push_bounded(&mut guard.eod_entries, entry.clone(), LIST_LIMIT);
        guard.award(ascension::XP_EOD, "end-of-day review");
        Ok(entry)
    }

    pub async fn eod_entries(&self) -> Vec<PsychologyEodEntry> {
        newest(&self.data.read().await.eod_entries, LIST_LIMIT)
    }

    // ---- journal ----

    pub async fn add_journal_entry(
        &self,
        data: JournalEntryCreate,
        ai_suggestions: Vec<String>,
        now: DateTime<Utc>,
    ) -> JournalEntry {
        let entry = JournalEntry::from_create(data, ai_suggestions, now);
        let mut guard = self.data.write().await;
        push_bounded(&mut guard.entries, entry.clone(), LIST_LIMIT);
        guard.award(ascension::XP_JOURNAL, "journal entry");
        entry
    }

    pub async fn journal_entries(&self) -> Vec<JournalEntry> {
        newest(&self.data.read().await.entries, LIST_LIMIT)
    }

    // ---- strategies ----

    pub async fn add_strategy(&self, data: StrategyCreate, now: DateTime<Utc>) -> Strategy {
        let strategy = Strategy {
            id: Uuid::new_v4(),
            name: data.name,
            content: data.content,
            ai_optimizations: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.data.write().await.strategies.push(strategy.clone());
        strategy
    }

    pub async fn strategy(&self, id: Uuid) -> Option<Strategy> {
        self.data
            .read()
            .await
            .strategies
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    /// Most recently updated first
    pub async fn strategies(&self) -> Vec<Strategy> {
        let mut list = self.data.read().await.strategies.clone();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        list.truncate(STRATEGY_LIMIT);
        list
    }

    /// Store optimizations; `None` for an unknown id
    pub async fn set_optimizations(
        &self,
        id: Uuid,
        optimizations: Vec<String>,
        now: DateTime<Utc>,
    ) -> Option<Strategy> {
        let mut guard = self.data.write().await;
        let strategy = guard.strategies.iter_mut().find(|s| s.id == id)?;
        strategy.ai_optimizations = optimizations;
        strategy.updated_at = now;
        Some(strategy.clone())
    }

    // ---- trades ----

    pub async fn add_trade(&self, data: TradeCreate, now: DateTime<Utc>) -> TradeRecord {
        let trade = TradeRecord::from_create(data, now);
        let mut guard = self.data.write().await;
        push_bounded(&mut guard.trades, trade.clone(), TRADE_LIMIT);
        guard.award(ascension::XP_TRADE, "trade log");
        trade
    }

    pub async fn trades(&self) -> Vec<TradeRecord> {
        newest(&self.data.read().await.trades, TRADE_LIMIT)
    }

    pub async fn trade_stats(&self) -> TradeStats {
        trade_stats(&self.data.read().await.trades)
    }

    // ---- rules ----

    pub async fn add_rule(&self, data: RuleCreate, now: DateTime<Utc>) -> DisciplineRule {
        let rule = DisciplineRule {
            id: Uuid::new_v4(),
            rule: data.rule,
            active: true,
            created_at: now,
        };
        self.data.write().await.rules.push(rule.clone());
        rule
    }

    pub async fn rules(&self) -> Vec<DisciplineRule> {
        self.data.read().await.rules.iter().take(RULE_LIMIT).cloned().collect()
    }

    /// Whether a rule was removed
    pub async fn delete_rule(&self, id: Uuid) -> bool {
        let mut guard = self.data.write().await;
        let before = guard.rules.len();
        guard.rules.retain(|r| r.id != id);
        guard.rules.len() != before
    }

    // ---- community ----

    pub async fn add_post(&self, data: PostCreate, now: DateTime<Utc>) -> CommunityPost {
        let mut guard = self.data.write().await;
        let post = CommunityPost {
            id: Uuid::new_v4(),
            user_name: guard.profile.name.clone(),
            image_url: data.image_url,
            caption: data.caption,
            profit: data.profit,
            likes: 0,
            comments: Vec::new(),
            created_at: now,
        };
        push_bounded(&mut guard.posts, post.clone(), POST_LIMIT);
        post
    }

    pub async fn posts(&self) -> Vec<CommunityPost> {
        newest(&self.data.read().await.posts, POST_LIMIT)
    }

    /// New like count; `None` for an unknown post
    pub async fn like_post(&self, id: Uuid) -> Option<u32> {
        let mut guard = self.data.write().await;
        let post = guard.posts.iter_mut().find(|p| p.id == id)?;
        post.likes += 1;
        Some(post.likes)
    }

    // ---- settings ----

    pub async fn settings(&self) -> Settings {
        self.data.read().await.profile.settings.clone()
    }

    pub async fn set_theme(&self, theme: Theme) -> Settings {
        let mut guard = self.data.write().await;
        guard.profile.settings.theme = theme;
        guard.profile.settings.clone()
    }

    pub async fn set_language(&self, language: Language) -> Settings {
        let mut guard = self.data.write().await;
        guard.profile.settings.language = language;
        guard.profile.settings.clone()
    }
}

pub fn trade_stats(trades: &[TradeRecord]) -> TradeStats {
    let total = trades.len();
    if total == 0 {
        return TradeStats {
            total_trades: 0,
            win_rate: 0.0,
            avg_r: 0.0,
            total_pnl: 0.0,
            wins: 0,
            losses: 0,
            max_drawdown: 0.0,
        };
    }

    let wins = trades.iter().filter(|t| t.profit_loss > 0.0).count();
    let total_pnl: f64 = trades.iter().map(|t| t.profit_loss).sum();
    let avg_r = trades.iter().map(|t| t.profit_loss_r).sum::<f64>() / total as f64;

    let mut ordered: Vec<&TradeRecord> = trades.iter().collect();
    ordered.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));
    let (mut equity, mut peak, mut max_dd) = (0.0f64, 0.0f64, 0.0f64);
    for trade in ordered {
        equity += trade.profit_loss;
        peak = peak.max(equity);
        max_dd = max_dd.max(peak - equity);
    }

    TradeStats {
        total_trades: total,
        win_rate: round_to(wins as f64 / total as f64 * 100.0, 1),
        avg_r: round_to(avg_r, 2),
        total_pnl: round_to(total_pnl, 2),
        wins,
        losses: total - wins,
        max_drawdown: round_to(max_dd, 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn trade(pnl: f64, r: f64, day: u32) -> TradeCreate {
        TradeCreate {
            symbol: "spx".to_string(),
            entry_price: 6000.0,
            exit_price: 6000.0 + pnl,
            profit_loss: pnl,
            profit_loss_r: r,
            date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            notes: String::new(),
            rules_followed: vec![],
            rules_violated: vec![],
        }
    }

    #[tokio::test]
    async fn test_xp_awards() {
        let store = JournalStore::default();
        let now = Utc::now();

        store
            .add_checkin(
                CheckinCreate {
                    confidence: 7,
                    discipline: 8,
                    emotional_state: "calm".to_string(),
                    sleep_hours: 7.0,
                    sleep_quality: 7,
                    notes: String::new(),
                },
                now,
            )
            .await
            .unwrap();
        store
            .add_journal_entry(
                JournalEntryCreate {
                    plan_respected: true,
                    emotions: "focused".to_string(),
                    lucid_state: true,
                    optimization_notes: String::new(),
                    errors_today: String::new(),
                    lessons_learned: String::new(),
                },
                vec![],
                now,
            )
            .await;
        store.add_trade(trade(50.0, 1.0, 2), now).await;
        store.add_eod(EodCreate::default(), now).await.unwrap();

        assert_eq!(store.xp().await, 10 + 15 + 5 + 10);
        assert_eq!(store.ascension().await.current_level.name, "Novice");
    }

    #[tokio::test]
    async fn test_invalid_checkin_earns_nothing() {
        let store = JournalStore::default();
        let bad = CheckinCreate {
            confidence: 12,
            discipline: 5,
            emotional_state: "anxious".to_string(),
            sleep_hours: 5.0,
            sleep_quality: 4,
            notes: String::new(),
        };
        assert!(store.add_checkin(bad, Utc::now()).await.is_err());
        assert_eq!(store.xp().await, 0);
        assert!(store.checkins().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_rule() {
        let store = JournalStore::default();
        let rule = store
            .add_rule(RuleCreate { rule: "No trades before 9:45".to_string() }, Utc::now())
            .await;
        assert!(!store.delete_rule(Uuid::new_v4()).await);
        assert!(store.delete_rule(rule.id).await);
        assert!(store.rules().await.is_empty());
    }

    #[tokio::test]
    async fn test_strategy_optimizations_update() {
        let store = JournalStore::default();
        let now = Utc::now();
        let s = store
            .add_strategy(
                StrategyCreate {
                    name: "ORB".to_string(),
                    content: "Opening range breakout".to_string(),
                },
                now,
            )
            .await;

        assert!(store.set_optimizations(Uuid::new_v4(), vec![], now).await.is_none());
        let updated = store
            .set_optimizations(s.id, vec!["Tighter stop".to_string()], now)
            .await
            .unwrap();
        assert_eq!(updated.ai_optimizations, vec!["Tighter stop"]);
    }

    #[tokio::test]
    async fn test_posts_and_likes() {
        let store = JournalStore::new("Ada");
        let post = store
            .add_post(
                PostCreate {
                    image_url: String::new(),
                    caption: "Green day".to_string(),
                    profit: 120.0,
                },
                Utc::now(),
            )
            .await;
        assert_eq!(post.user_name, "Ada");
        assert_eq!(store.like_post(post.id).await, Some(1));
        assert_eq!(store.like_post(post.id).await, Some(2));
        assert_eq!(store.like_post(Uuid::new_v4()).await, None);
    }

    #[test]
    fn test_trade_stats() {
        let now = Utc::now();
        let trades: Vec<TradeRecord> = [(100.0, 2.0, 2), (-50.0, -1.0, 3), (-30.0, -0.6, 4), (80.0, 1.6, 5)]
            .into_iter()
            .map(|(pnl, r, d)| TradeRecord::from_create(trade(pnl, r, d), now))
            .collect();

        let stats = trade_stats(&trades);
        assert_eq!(stats.total_trades, 4);
        assert_eq!(stats.wins, 2);
        assert_eq!(stats.losses, 2);
        assert_eq!(stats.win_rate, 50.0);
        assert_eq!(stats.avg_r, 0.5);
        assert_eq!(stats.total_pnl, 100.0);
        assert_eq!(stats.max_drawdown, 80.0);
        assert_eq!(trades[0].symbol, "SPX");
    }

    #[tokio::test]
    async fn test_settings() {
        let store = JournalStore::default();
        assert_eq!(store.settings().await.theme, Theme::Dark);
        let s = store.set_language(Language::En).await;
        assert_eq!(s.language, Language::En);
        assert_eq!(store.set_theme(Theme::Light).await.theme, Theme::Light);
    }

    #[test]
    fn test_push_bounded_drops_oldest() {
        let mut items = vec![1, 2, 3];
        push_bounded(&mut items, 4, 3);
        assert_eq!(items, vec![2, 3, 4]);
        push_bounded(&mut items, 5, 10);
        assert_eq!(items.len(), 4);
    }

    #[tokio::test]
    async fn test_trade_history_is_capped() {
        let store = JournalStore::default();
        let now = Utc::now();
        for i in 0..TRADE_LIMIT + 10 {
            store.add_trade(trade(i as f64, 0.1, 2), now).await;
        }

        let trades = store.trades().await;
        assert_eq!(trades.len(), TRADE_LIMIT);
        assert_eq!(trades[0].profit_loss, (TRADE_LIMIT + 9) as f64);
        assert_eq!(store.trade_stats().await.total_trades, TRADE_LIMIT);
        // XP still counts every log
        assert_eq!(store.xp().await, (TRADE_LIMIT as u32 + 10) * ascension::XP_TRADE);
    }
}
