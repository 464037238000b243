//! Fixed intraday macro calendar

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;

use crate::types::Impact;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroEvent {
    /// "HH:MM", UTC
    pub time: &'static str,
    pub event: &'static str,
    pub impact: Impact,
    pub consensus: &'static str,
    pub previous: &'static str,
}

impl MacroEvent {
    pub fn hour(&self) -> u32 {
        self.time
            .split(':')
            .next()
            .and_then(|h| h.parse().ok())
            .unwrap_or(0)
    }
}

pub const MACRO_EVENTS: [MacroEvent; 4] = [
    MacroEvent {
        time: "14:30",
        event: "US Core CPI m/m",
        impact: Impact::High,
        consensus: "0.3%",
        previous: "0.3%",
    },
    MacroEvent {
        time: "15:00",
        event: "ECB President Lagarde Speech",
        impact: Impact::Medium,
        consensus: "-",
        previous: "-",
    },
    MacroEvent {
        time: "20:00",
        event: "FOMC Member Speech",
        impact: Impact::High,
        consensus: "-",
        previous: "-",
    },
    MacroEvent {
        time: "22:00",
        event: "US Crude Oil Inventories",
        impact: Impact::Medium,
        consensus: "-1.2M",
        previous: "-2.5M",
    },
];

/// An event later today and the whole hours until it starts
#[derive(Debug, Clone, Serialize)]
pub struct UpcomingEvent {
    #[serde(flatten)]
    pub event: MacroEvent,
    pub hours_away: u32,
    pub countdown: String,
}

/// Hours assumed when nothing is scheduled for the rest of the day
pub const NO_EVENT_HOURS: u32 = 24;

/// First event whose hour is after the current hour. With `high_only`,
/// medium-impact events are skipped.
pub fn next_event(now: DateTime<Utc>, high_only: bool) -> Option<UpcomingEvent> {
    let hour = now.hour();
    MACRO_EVENTS
        .iter()
        .filter(|e| !high_only || e.impact == Impact::High)
        .find(|e| e.hour() > hour)
        .map(|e| {
            let hours_away = e.hour() - hour;
            UpcomingEvent {
                event: e.clone(),
                hours_away,
                countdown: format!("{}h", hours_away),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, hour, 10, 0).unwrap()
    }

    #[test]
    fn test_next_high_impact_event() {
        let next = next_event(at(9), true).unwrap();
        assert_eq!(next.event.event, "US Core CPI m/m");
        assert_eq!(next.hours_away, 5);

        // 14:10 is inside the CPI hour, so FOMC is next
        let next = next_event(at(14), true).unwrap();
        assert_eq!(next.event.hour(), 20);
        assert_eq!(next.countdown, "6h");
    }

    #[test]
    fn test_any_impact_includes_medium() {
        let next = next_event(at(14), false).unwrap();
        assert_eq!(next.event.impact, Impact::Medium);
        assert_eq!(next.hours_away, 1);
    }

    #[test]
    fn test_nothing_after_last_event() {
        assert!(next_event(at(21), true).is_none());
        assert!(next_event(at(23), false).is_none());
    }
}
