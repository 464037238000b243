//! Commitments of Traders positioning
//!
//! Reports are synthetic: category nets and 52-week percentiles are drawn
//! from fixed ranges, then bias, crowding and squeeze risk are derived from
//! the lead category the same way a real report would be read. Indices and
//! the dollar use the TFF layout, gold the Disaggregated one.
//!
//! The CFTC snapshot is taken Tuesday and published Friday 15:30 New York time.

use anyhow::{bail, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::America::New_York;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;

pub const COT_SYMBOLS: [&str; 4] = ["NDX", "SPX", "XAU", "DXY"];

const RELEASE_TIME_ET: &str = "15:30 ET";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportType {
    #[serde(rename = "TFF")]
    Tff,
    Disaggregated,
}

pub fn report_type_for(symbol: &str) -> Option<ReportType> {
    match symbol {
        "NDX" | "SPX" | "DXY" => Some(ReportType::Tff),
        "XAU" => Some(ReportType::Disaggregated),
        _ => None,
    }
}

/// Map common CFD names onto tracked symbols
pub fn canonical_symbol(symbol: &str) -> String {
    let upper = symbol.to_ascii_uppercase();
    match upper.as_str() {
        "NAS100" | "US100" => "NDX".to_string(),
        "SP500" | "US500" => "SPX".to_string(),
        "XAUUSD" | "GOLD" => "XAU".to_string(),
        _ => upper,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CotBias {
    Bull,
    Bear,
    Neutral,
}

pub fn cot_bias(percentile: u8) -> CotBias {
    if percentile > 70 {
        CotBias::Bull
    } else if percentile < 30 {
        CotBias::Bear
    } else {
        CotBias::Neutral
    }
}

/// Distance of the percentile from the middle, scaled to 0-100
pub fn crowding(percentile: u8) -> u8 {
    ((percentile as i32 - 50).abs() * 2).min(100) as u8
}

#[derive(Debug, Clone, Serialize)]
pub struct CotCategory {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<i64>,
    pub net: i64,
    pub net_change: i64,
    pub percentile_52w: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreading: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CotReport {
    pub symbol: String,
    pub report_type: ReportType,
    pub as_of_date: NaiveDate,
    pub release_date: NaiveDate,
    pub release_time_et: String,
    pub categories: BTreeMap<String, CotCategory>,
    pub bias: CotBias,
    pub confidence: u8,
    pub crowding: u8,
    pub squeeze_risk: u8,
    pub driver_text: String,
    pub open_interest: i64,
    pub oi_change: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextRelease {
    pub date: NaiveDate,
    pub at: DateTime<Utc>,
    pub time_et: String,
    pub countdown: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CotBoard {
    pub data: BTreeMap<String, CotReport>,
    pub next_release: NextRelease,
    pub timestamp: DateTime<Utc>,
}

/// Most recent Tuesday on or before `today`
pub fn as_of_date(today: NaiveDate) -> NaiveDate {
    let back = (today.weekday().num_days_from_monday() + 6) % 7;
    today - Duration::days(back as i64)
}

/// Friday 15:30 New York time on `date`, as UTC
pub fn release_instant(date: NaiveDate) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::from_hms_opt(15, 30, 0).unwrap_or_default());
    New_York
        .from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        // EST offset if the zone lookup ever fails
        .unwrap_or_else(|| Utc.from_utc_datetime(&(local + Duration::hours(5))))
}

/// First Friday release strictly after `now`
pub fn next_release(now: DateTime<Utc>) -> NextRelease {
    let today = now.with_timezone(&New_York).date_naive();
    let ahead = (4 + 7 - today.weekday().num_days_from_monday()) % 7;
    let mut date = today + Duration::days(ahead as i64);
    let mut at = release_instant(date);
    if at <= now {
        date = date + Duration::days(7);
        at = release_instant(date);
    }

    let hours = (at - now).num_hours();
    let countdown = if hours >= 24 {
        format!("{}d {}h", hours / 24, hours % 24)
    } else {
        format!("{}h", hours)
    };

    NextRelease {
        date,
        at,
        time_et: RELEASE_TIME_ET.to_string(),
        countdown,
    }
}

fn category(name: &str, long: Option<i64>, short: Option<i64>, net: i64, net_change: i64, percentile: u8) -> CotCategory {
    CotCategory {
        name: name.to_string(),
        long,
        short,
        net,
        net_change,
        percentile_52w: percentile,
        spreading: None,
    }
}

/// Derived reading of the lead category
struct Positioning {
    categories: BTreeMap<String, CotCategory>,
    bias: CotBias,
    confidence: u8,
    crowding: u8,
    squeeze_risk: u8,
    driver_text: String,
}

fn tff<R: Rng + ?Sized>(rng: &mut R) -> Positioning {
    let am_net = rng.gen_range(-50_000..=80_000i64);
    let lev_net = rng.gen_range(-40_000..=40_000i64);
    let dealer_net = rng.gen_range(-30_000..=30_000i64);
    let other_net = rng.gen_range(-20_000..=20_000i64);
    let am_pct = rng.gen_range(10..=90u8);
    let lev_pct = rng.gen_range(10..=90u8);

    let mut categories = BTreeMap::new();
    categories.insert(
        "asset_manager".to_string(),
        category(
            "Asset Manager/Institutional",
            Some((am_net + rng.gen_range(10_000..=30_000)).max(0)),
            Some((-am_net).max(0) + rng.gen_range(5_000..=20_000)),
            am_net,
            rng.gen_range(-5_000..=5_000),
            am_pct,
        ),
    );
    categories.insert(
        "leveraged".to_string(),
        category(
            "Leveraged Funds",
            Some((lev_net + rng.gen_range(5_000..=20_000)).max(0)),
            Some((-lev_net).max(0) + rng.gen_range(5_000..=15_000)),
            lev_net,
            rng.gen_range(-3_000..=3_000),
            lev_pct,
        ),
    );
    categories.insert(
        "dealer".to_string(),
        category(
            "Dealer/Intermediary",
            Some((dealer_net + rng.gen_range(10_000..=25_000)).max(0)),
            Some((-dealer_net).max(0) + rng.gen_range(10_000..=25_000)),
            dealer_net,
            rng.gen_range(-2_000..=2_000),
            rng.gen_range(20..=80),
        ),
    );
    categories.insert(
        "other".to_string(),
        category(
            "Other Reportables",
            None,
            None,
            other_net,
            rng.gen_range(-1_000..=1_000),
            rng.gen_range(20..=80),
        ),
    );

    let bias = cot_bias(am_pct);
    let mut driver_text = match bias {
        CotBias::Bull => format!("Asset managers net long at the {}th 52w percentile. Institutions accumulating.", am_pct),
        CotBias::Bear => format!("Asset managers net short/reduced at the {}th percentile. Institutions distributing.", am_pct),
        CotBias::Neutral => format!("Asset managers in the neutral zone ({}th percentile). No strong bias.", am_pct),
    };

    let squeeze_risk = if !(15..=85).contains(&lev_pct) {
        driver_text.push_str(&format!(
            " Caution: leveraged funds at the {}th percentile, elevated squeeze risk.",
            lev_pct
        ));
        75 + rng.gen_range(0..=20)
    } else if !(30..=70).contains(&lev_pct) {
        40 + rng.gen_range(0..=20)
    } else {
        rng.gen_range(10..=30)
    };

    let confidence = (50 + (am_pct as i32 - 50).unsigned_abs() as u8).min(90);
    Positioning {
        categories,
        bias,
        confidence,
        crowding: crowding(lev_pct),
        squeeze_risk,
        driver_text,
    }
}

fn disaggregated<R: Rng + ?Sized>(rng: &mut R) -> Positioning {
    let mm_net = rng.gen_range(-20_000..=60_000i64);
    let swap_net = rng.gen_range(-30_000..=30_000i64);
    // Producers hedge, so usually net short
    let producer_net = rng.gen_range(-50_000..=-10_000i64);
    let mm_pct = rng.gen_range(15..=85u8);

    let mut categories = BTreeMap::new();
    let mut managed = category(
        "Managed Money",
        Some((mm_net + rng.gen_range(20_000..=50_000)).max(0)),
        Some(rng.gen_range(10_000..=30_000)),
        mm_net,
        rng.gen_range(-4_000..=4_000),
        mm_pct,
    );
    managed.spreading = Some(rng.gen_range(5_000..=15_000));
    categories.insert("managed_money".to_string(), managed);
    categories.insert(
        "swap_dealers".to_string(),
        category(
            "Swap Dealers",
            Some((swap_net + rng.gen_range(15_000..=35_000)).max(0)),
            Some((-swap_net + rng.gen_range(15_000..=35_000)).max(0)),
            swap_net,
            rng.gen_range(-2_000..=2_000),
            rng.gen_range(25..=75),
        ),
    );
    categories.insert(
        "producer".to_string(),
        category(
            "Producer/Merchant",
            Some(rng.gen_range(5_000..=15_000)),
            Some(producer_net.abs() + rng.gen_range(5_000..=15_000)),
            producer_net,
            rng.gen_range(-1_500..=1_500),
            rng.gen_range(30..=70),
        ),
    );

    let bias = cot_bias(mm_pct);
    let mut driver_text = match bias {
        CotBias::Bull => format!("Managed money net long at the {}th percentile. Speculators bullish on gold.", mm_pct),
        CotBias::Bear => format!("Managed money reduced at the {}th percentile. Speculative interest fading.", mm_pct),
        CotBias::Neutral => format!("Managed money in the neutral zone ({}th percentile).", mm_pct),
    };

    let squeeze_risk = if !(20..=80).contains(&mm_pct) {
        driver_text.push_str(" Overcrowding detected, reversal risk.");
        70 + rng.gen_range(0..=25)
    } else {
        rng.gen_range(15..=40)
    };

    let confidence = (45 + (mm_pct as i32 - 50).unsigned_abs() as u8).min(85);
    Positioning {
        categories,
        bias,
        confidence,
        crowding: crowding(mm_pct),
        squeeze_risk,
        driver_text,
    }
}

/// Generate one report; unsupported symbols are an error
pub fn generate<R: Rng + ?Sized>(symbol: &str, now: DateTime<Utc>, rng: &mut R) -> Result<CotReport> {
    let symbol = canonical_symbol(symbol);
    let Some(report_type) = report_type_for(&symbol) else {
        bail!("Symbol not supported for COT analysis: {}", symbol);
    };

    let as_of = as_of_date(now.with_timezone(&New_York).date_naive());
    let reading = match report_type {
        ReportType::Tff => tff(rng),
        ReportType::Disaggregated => disaggregated(rng),
    };

    Ok(CotReport {
        symbol,
        report_type,
        as_of_date: as_of,
        release_date: as_of + Duration::days(3),
        release_time_et: RELEASE_TIME_ET.to_string(),
        categories: reading.categories,
        bias: reading.bias,
        confidence: reading.confidence,
        crowding: reading.crowding,
        squeeze_risk: reading.squeeze_risk,
        driver_text: reading.driver_text,
        open_interest: rng.gen_range(200_000..=500_000),
        oi_change: rng.gen_range(-5_000..=5_000),
    })
}

/// Reports for every tracked symbol plus the release countdown
pub fn board<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> Result<CotBoard> {
    let mut data = BTreeMap::new();
    for symbol in COT_SYMBOLS {
        data.insert(symbol.to_string(), generate(symbol, now, rng)?);
    }
    Ok(CotBoard {
        data,
        next_release: next_release(now),
        timestamp: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_as_of_is_latest_tuesday() {
        // 2026-03-04 is a Wednesday
        let wed = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        assert_eq!(as_of_date(wed), NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
        let tue = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        assert_eq!(as_of_date(tue), tue);
        let mon = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(as_of_date(mon).weekday(), Weekday::Tue);
        assert_eq!(as_of_date(mon), tue);
    }

    #[test]
    fn test_release_follows_daylight_saving() {
        // EST in January, EDT in July
        let winter = release_instant(NaiveDate::from_ymd_opt(2026, 1, 9).unwrap());
        assert_eq!(winter, Utc.with_ymd_and_hms(2026, 1, 9, 20, 30, 0).unwrap());
        let summer = release_instant(NaiveDate::from_ymd_opt(2026, 7, 10).unwrap());
        assert_eq!(summer, Utc.with_ymd_and_hms(2026, 7, 10, 19, 30, 0).unwrap());
    }

    #[test]
    fn test_next_release_rolls_after_publication() {
        // Friday before the release
        let before = Utc.with_ymd_and_hms(2026, 1, 9, 12, 0, 0).unwrap();
        let next = next_release(before);
        assert_eq!(next.date, NaiveDate::from_ymd_opt(2026, 1, 9).unwrap());
        assert_eq!(next.countdown, "8h");

        let after = Utc.with_ymd_and_hms(2026, 1, 9, 21, 0, 0).unwrap();
        let next = next_release(after);
        assert_eq!(next.date, NaiveDate::from_ymd_opt(2026, 1, 16).unwrap());
        assert!(next.countdown.starts_with("6d"));
    }

    #[test]
    fn test_bias_and_crowding() {
        assert_eq!(cot_bias(71), CotBias::Bull);
        assert_eq!(cot_bias(70), CotBias::Neutral);
        assert_eq!(cot_bias(29), CotBias::Bear);
        assert_eq!(crowding(50), 0);
        assert_eq!(crowding(90), 80);
        assert_eq!(crowding(10), 80);
    }

    #[test]
    fn test_report_layout_per_symbol() {
        let mut rng = StdRng::seed_from_u64(5);
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();

        let gold = generate("xauusd", now, &mut rng).unwrap();
        assert_eq!(gold.symbol, "XAU");
        assert_eq!(gold.report_type, ReportType::Disaggregated);
        assert!(gold.categories.contains_key("managed_money"));
        assert!(gold.categories["producer"].net < 0);
        assert_eq!(gold.release_date.weekday(), Weekday::Fri);

        let spx = generate("SPX", now, &mut rng).unwrap();
        assert_eq!(spx.report_type, ReportType::Tff);
        assert_eq!(spx.categories.len(), 4);
        assert!(spx.confidence <= 90);
        assert_eq!(spx.crowding, crowding(spx.categories["leveraged"].percentile_52w));

        assert!(generate("BTC", now, &mut rng).is_err());
    }

    #[test]
    fn test_board_covers_all_symbols() {
        let mut rng = StdRng::seed_from_u64(9);
        let board = board(Utc::now(), &mut rng).unwrap();
        assert_eq!(board.data.len(), COT_SYMBOLS.len());
        assert!(board.next_release.at > board.timestamp);
    }
}
