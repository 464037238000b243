//! XP levels

use serde::Serialize;

use crate::market::quotes::round_to;

pub const XP_CHECKIN: u32 = 10;
pub const XP_JOURNAL: u32 = 15;
pub const XP_TRADE: u32 = 5;
pub const XP_EOD: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Level {
    pub name: &'static str,
    pub min_xp: u32,
    pub icon: &'static str,
}

pub static LEVELS: [Level; 7] = [
    Level { name: "Novice", min_xp: 0, icon: "seedling" },
    Level { name: "Apprentice", min_xp: 100, icon: "leaf" },
    Level { name: "Practitioner", min_xp: 300, icon: "tree" },
    Level { name: "Expert", min_xp: 600, icon: "mountain" },
    Level { name: "Master", min_xp: 1000, icon: "sun" },
    Level { name: "Zen Master", min_xp: 2000, icon: "moon" },
    Level { name: "Market God", min_xp: 5000, icon: "crown" },
];

#[derive(Debug, Clone, Serialize)]
pub struct AscensionStatus {
    pub xp: u32,
    pub current_level: Level,
    pub next_level: Option<Level>,
    /// Percent of the way to the next level; 100 at the top
    pub progress: f64,
    pub all_levels: &'static [Level],
}

pub fn level_for(xp: u32) -> usize {
    LEVELS.iter().rposition(|l| xp >= l.min_xp).unwrap_or(0)
}

pub fn status(xp: u32) -> AscensionStatus {
    let idx = level_for(xp);
    let current = LEVELS[idx];
    let next = LEVELS.get(idx + 1).copied();

    let progress = match next {
        Some(next) => {
            let span = (next.min_xp - current.min_xp) as f64;
            round_to((xp - current.min_xp) as f64 / span * 100.0, 1)
        }
        None => 100.0,
    };

    AscensionStatus {
        xp,
        current_level: current,
        next_level: next,
        progress,
        all_levels: &LEVELS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_boundaries() {
        assert_eq!(status(0).current_level.name, "Novice");
        assert_eq!(status(99).current_level.name, "Novice");
        assert_eq!(status(100).current_level.name, "Apprentice");
        assert_eq!(status(4999).current_level.name, "Zen Master");
        assert_eq!(status(5000).current_level.name, "Market God");
    }

    #[test]
    fn test_progress() {
        // 150 of the 100..300 span
        assert_eq!(status(150).progress, 25.0);
        let top = status(9000);
        assert!(top.next_level.is_none());
        assert_eq!(top.progress, 100.0);
    }
}
