//! Per-day signal persistence
//!
//! Each horizon is a JSON file under the data directory holding the day it
//! belongs to and the signals accepted so far. A new calendar day starts an
//! empty file, so repeated ticks within a day see the same signals.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::generator::{Horizon, Signal};

/// Max persisted signals per asset per calendar day, counted per horizon
pub const MAX_SIGNALS_PER_ASSET: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DayFile {
    day: NaiveDate,
    signals: Vec<Signal>,
}

/// Signals of one horizon for the current day
#[derive(Debug)]
pub struct SignalStore {
    path: PathBuf,
    day: NaiveDate,
    signals: Vec<Signal>,
}

impl SignalStore {
    /// Open the file at `path`; content from another day is discarded
    pub fn open(path: &Path, today: NaiveDate) -> Result<Self> {
        let mut store = Self {
            path: path.to_path_buf(),
            day: today,
            signals: Vec::new(),
        };

        if !path.exists() {
            return Ok(store);
        }

        let raw = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        match serde_json::from_slice::<DayFile>(&raw) {
            Ok(file) if file.day == today => {
                debug!("Loaded {} signals from {}", file.signals.len(), path.display());
                store.signals = file.signals;
            }
            Ok(file) => {
                info!("Discarding signals from {} in {}", file.day, path.display());
            }
            Err(e) => {
                warn!("Ignoring unreadable signal file {}: {}", path.display(), e);
            }
        }

        Ok(store)
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn count_for(&self, asset: &str) -> usize {
        self.signals.iter().filter(|s| s.asset == asset).count()
    }

    /// Whether another signal for `asset` would be accepted on `day`
    pub fn has_room(&self, asset: &str, day: NaiveDate) -> bool {
        day > self.day || self.count_for(asset) < MAX_SIGNALS_PER_ASSET
    }

    /// Accept the signal unless its asset already hit today's cap or it
    /// belongs to an earlier day. Returns whether it was stored.
    pub fn try_add(&mut self, signal: Signal) -> Result<bool> {
        if signal.day < self.day {
            debug!("Dropping {} signal from past day {}", signal.asset, signal.day);
            return Ok(false);
        }
        self.roll_to(signal.day);

        if self.count_for(&signal.asset) >= MAX_SIGNALS_PER_ASSET {
            return Ok(false);
        }

        self.signals.push(signal);
        if let Err(e) = self.persist() {
            self.signals.pop();
            return Err(e);
        }
        Ok(true)
    }

    /// Start a fresh (empty) day; earlier days are ignored
    pub fn roll_to(&mut self, day: NaiveDate) {
        if day > self.day {
            info!("Signal day rolled {} -> {} ({})", self.day, day, self.path.display());
            self.day = day;
            self.signals.clear();
        }
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = DayFile {
            day: self.day,
            signals: self.signals.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)?;

        // Write-then-rename
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

/// One store per horizon
#[derive(Debug)]
pub struct SignalBook {
    stores: HashMap<Horizon, SignalStore>,
}

impl SignalBook {
    pub fn open(dir: &Path, today: NaiveDate) -> Result<Self> {
        let mut stores = HashMap::new();
        for horizon in Horizon::ALL {
            let path = dir.join(format!("{}.json", horizon.storage_key()));
            stores.insert(horizon, SignalStore::open(&path, today)?);
        }
        Ok(Self { stores })
    }

    pub fn store(&self, horizon: Horizon) -> Option<&SignalStore> {
        self.stores.get(&horizon)
    }

    pub fn has_room(&self, horizon: Horizon, asset: &str, day: NaiveDate) -> bool {
        self.stores
            .get(&horizon)
            .map(|s| s.has_room(asset, day))
            .unwrap_or(false)
    }

    /// Move every horizon to `today`, dropping earlier signals
    pub fn roll_to(&mut self, today: NaiveDate) {
        for store in self.stores.values_mut() {
            store.roll_to(today);
        }
    }

    /// Store under the signal's own horizon
    pub fn record(&mut self, signal: Signal) -> Result<bool> {
        match self.stores.get_mut(&signal.horizon) {
            Some(store) => store.try_add(signal),
            None => Ok(false),
        }
    }

    /// Today's signals, optionally for a single horizon
    pub fn signals(&self, horizon: Option<Horizon>) -> Vec<Signal> {
        let mut out: Vec<Signal> = Horizon::ALL
            .iter()
            .filter(|h| horizon.map(|want| want == **h).unwrap_or(true))
            .filter_map(|h| self.stores.get(h))
            .flat_map(|s| s.signals().iter().cloned())
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn signal(asset: &str, day: NaiveDate, horizon: Horizon) -> Signal {
        let created_at = Utc.from_utc_datetime(&day.and_hms_opt(14, 0, 0).unwrap());
        Signal {
            id: Uuid::new_v4(),
            asset: asset.to_string(),
            direction: Direction::Long,
            entry: 100.0,
            stop: 99.0,
            target: 102.0,
            probability: 60,
            motivation: vec!["test".to_string()],
            horizon,
            day,
            created_at,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_cap_per_asset_per_day() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("karion_daily_signals.json");
        let mut store = SignalStore::open(&path, day(2)).unwrap();

        assert!(store.try_add(signal("SPX", day(2), Horizon::Intraday)).unwrap());
        assert!(store.try_add(signal("SPX", day(2), Horizon::Intraday)).unwrap());
        assert!(!store.try_add(signal("SPX", day(2), Horizon::Intraday)).unwrap());
        assert!(store.try_add(signal("NDX", day(2), Horizon::Intraday)).unwrap());

        assert_eq!(store.count_for("SPX"), 2);
        assert_eq!(store.signals().len(), 3);
        assert!(!store.has_room("SPX", day(2)));
        assert!(store.has_room("SPX", day(3)));
    }

    #[test]
    fn test_reload_same_day_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("karion_short_signals.json");

        let first = signal("XAU", day(2), Horizon::Short);
        {
            let mut store = SignalStore::open(&path, day(2)).unwrap();
            store.try_add(first.clone()).unwrap();
        }

        let reopened = SignalStore::open(&path, day(2)).unwrap();
        assert_eq!(reopened.signals(), &[first]);

        // Next day starts empty
        let tomorrow = SignalStore::open(&path, day(3)).unwrap();
        assert!(tomorrow.signals().is_empty());
    }

    #[test]
    fn test_new_day_resets_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("karion_long_signals.json");
        let mut store = SignalStore::open(&path, day(2)).unwrap();

        store.try_add(signal("SPX", day(2), Horizon::Long)).unwrap();
        store.try_add(signal("SPX", day(2), Horizon::Long)).unwrap();
        assert!(store.try_add(signal("SPX", day(3), Horizon::Long)).unwrap());
        assert_eq!(store.day(), day(3));
        assert_eq!(store.count_for("SPX"), 1);
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("karion_medium_signals.json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = SignalStore::open(&path, day(2)).unwrap();
        assert!(store.signals().is_empty());
    }

    #[test]
    fn test_book_routes_by_horizon() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = SignalBook::open(dir.path(), day(2)).unwrap();

        assert!(book.record(signal("SPX", day(2), Horizon::Short)).unwrap());
        assert!(book.record(signal("SPX", day(2), Horizon::Long)).unwrap());

        assert_eq!(book.signals(None).len(), 2);
        assert_eq!(book.signals(Some(Horizon::Short)).len(), 1);
        assert!(dir.path().join("karion_short_signals.json").exists());
        assert!(!dir.path().join("karion_daily_signals.json").exists());
    }

    #[test]
    fn test_past_day_signal_keeps_today() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("karion_daily_signals.json");
        let mut store = SignalStore::open(&path, day(3)).unwrap();

        assert!(store.try_add(signal("SPX", day(3), Horizon::Intraday)).unwrap());
        assert!(!store.try_add(signal("SPX", day(2), Horizon::Intraday)).unwrap());
        assert_eq!(store.day(), day(3));
        assert_eq!(store.signals().len(), 1);
    }

    #[test]
    fn test_failed_write_is_not_counted() {
        let dir = tempfile::tempdir().unwrap();
        // Parent is a regular file, so the day file cannot be written
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let mut store = SignalStore::open(&blocker.join("karion_daily_signals.json"), day(2)).unwrap();

        assert!(store.try_add(signal("SPX", day(2), Horizon::Intraday)).is_err());
        assert!(store.signals().is_empty());
        assert!(store.has_room("SPX", day(2)));
    }

    #[test]
    fn test_book_roll_clears_previous_day() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = SignalBook::open(dir.path(), day(2)).unwrap();
        book.record(signal("SPX", day(2), Horizon::Intraday)).unwrap();
        book.record(signal("NDX", day(2), Horizon::Medium)).unwrap();

        book.roll_to(day(2));
        assert_eq!(book.signals(None).len(), 2);

        book.roll_to(day(3));
        assert!(book.signals(None).is_empty());
        assert_eq!(book.store(Horizon::Medium).unwrap().day(), day(3));
    }

    #[test]
    fn test_cap_counts_each_horizon_separately() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = SignalBook::open(dir.path(), day(2)).unwrap();

        for horizon in Horizon::ALL {
            for _ in 0..MAX_SIGNALS_PER_ASSET {
                assert!(book.record(signal("XAU", day(2), horizon)).unwrap());
            }
            assert!(!book.record(signal("XAU", day(2), horizon)).unwrap());
            assert!(!book.has_room(horizon, "XAU", day(2)));
        }

        let per_day = MAX_SIGNALS_PER_ASSET * Horizon::ALL.len();
        assert_eq!(book.signals(None).len(), per_day);
    }
}
