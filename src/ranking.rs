//! Star counts, mission rosters, the leaderboard and the home-screen
//! player order. Everything here is recomputed from scratch on each call.

use std::cmp::Ordering;

use spacetimedb::Timestamp;
use unicode_normalization::UnicodeNormalization;

use crate::progress::MissionStatus;
use crate::snapshot::Snapshot;
use crate::{Achievement, Player, StarType};

/// Grade labels in school-year order. Index is the sort ordinal.
const GRADE_ORDER: &[&str] = &[
    "年少", "年中", "年長",
    "小1", "小2", "小3", "小4", "小5", "小6",
    "中1", "中2", "中3",
    "高1", "高2", "高3",
    "大人",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StarCounts {
    pub gold: u32,
    pub silver: u32,
    pub bronze: u32,
}

impl StarCounts {
    pub fn total(&self) -> u32 {
        self.gold + self.silver + self.bronze
    }

    fn add(&mut self, tier: StarType) {
        match tier {
            StarType::Gold => self.gold += 1,
            StarType::Silver => self.silver += 1,
            StarType::Bronze => self.bronze += 1,
        }
    }
}

/// Count a player's records per tier across every mission
pub fn star_counts(achievements: &[Achievement], player_code: &str) -> StarCounts {
    let mut counts = StarCounts::default();
    for a in achievements.iter().filter(|a| a.player_code == player_code) {
        counts.add(a.star_type);
    }
    counts
}

/// Tier presence for one pair
pub fn mission_status(achievements: &[Achievement], player_code: &str, mission_code: &str) -> MissionStatus {
    MissionStatus::for_pair(achievements, player_code, mission_code)
}

/// One line on the mission screen
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub achievement_id: u64,
    pub player_code: String,
    pub display_name: String,
    pub achieved_at: Timestamp,
}

/// A mission's records split by tier
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissionRoster {
    pub gold: Vec<RosterEntry>,
    pub silver: Vec<RosterEntry>,
    pub bronze: Vec<RosterEntry>,
}

impl MissionRoster {
    /// Tiers from gold down, the order the mission screen lists them
    pub fn by_tier(&self) -> [(StarType, &Vec<RosterEntry>); 3] {
        [
            (StarType::Gold, &self.gold),
            (StarType::Silver, &self.silver),
            (StarType::Bronze, &self.bronze),
        ]
    }
}

pub fn mission_roster(mission_code: &str, snapshot: &Snapshot) -> MissionRoster {
    let mut roster = MissionRoster::default();
    for a in snapshot.achievements.iter().filter(|a| a.mission_code == mission_code) {
        let entry = RosterEntry {
            achievement_id: a.id,
            player_code: a.player_code.clone(),
            display_name: snapshot.display_name(&a.player_code).to_string(),
            achieved_at: a.achieved_at,
        };
        match a.star_type {
            StarType::Gold => roster.gold.push(entry),
            StarType::Silver => roster.silver.push(entry),
            StarType::Bronze => roster.bronze.push(entry),
        }
    }
    roster
}

#[derive(Debug, Clone)]
pub struct LeaderboardRow<'a> {
    /// 1-based index after sorting; tied players still get distinct positions
    pub position: u32,
    pub player: &'a Player,
    pub counts: StarCounts,
}

/// Active players sorted by total stars, highest first.
/// Equal totals fall back to player code ascending.
pub fn leaderboard<'a>(players: &'a [Player], achievements: &[Achievement]) -> Vec<LeaderboardRow<'a>> {
    let mut rows: Vec<(&Player, StarCounts)> = players
        .iter()
        .filter(|p| !p.is_deleted)
        .map(|p| (p, star_counts(achievements, &p.player_code)))
        .collect();

    rows.sort_by(|a, b| {
        b.1.total()
            .cmp(&a.1.total())
            .then_with(|| a.0.player_code.cmp(&b.0.player_code))
    });

    rows.into_iter()
        .enumerate()
        .map(|(i, (player, counts))| LeaderboardRow {
            position: (i + 1) as u32,
            player,
            counts,
        })
        .collect()
}

/// Ordinal of a grade label, or None if it isn't one we know.
/// Full-width digits (中２) are treated like ASCII ones.
pub fn grade_rank(grade: &str) -> Option<usize> {
    let normalized: String = grade
        .trim()
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            _ => c,
        })
        .collect();
    GRADE_ORDER.iter().position(|g| *g == normalized)
}

/// Sort key for Japanese display names: NFKC (half-width kana, full-width
/// latin), katakana folded onto hiragana, then lowercase. アキ and あき
/// share a key and both sort before かず.
pub fn name_collation_key(name: &str) -> String {
    name.trim()
        .nfkc()
        .map(|c| match c {
            'ァ'..='ヶ' => char::from_u32(c as u32 - 0x60).unwrap_or(c),
            _ => c,
        })
        .collect::<String>()
        .to_lowercase()
}

fn compare_roster(a: &Player, b: &Player) -> Ordering {
    let rank_a = grade_rank(&a.grade).unwrap_or(usize::MAX);
    let rank_b = grade_rank(&b.grade).unwrap_or(usize::MAX);
    rank_a
        .cmp(&rank_b)
        .then_with(|| name_collation_key(&a.player_name).cmp(&name_collation_key(&b.player_name)))
        .then_with(|| a.player_name.cmp(&b.player_name))
        .then_with(|| a.player_code.cmp(&b.player_code))
}

/// Home screen player list: active players by grade, then name.
/// Unknown grade labels go last.
pub fn roster_order(players: &[Player]) -> Vec<&Player> {
    let mut active: Vec<&Player> = players.iter().filter(|p| !p.is_deleted).collect();
    active.sort_by(|a, b| compare_roster(a, b));
    active
}

/// UTC date label for an award, e.g. "2025-06-01"
pub fn format_achieved_on(achieved_at: Timestamp) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_micros(achieved_at.to_micros_since_unix_epoch())
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}
