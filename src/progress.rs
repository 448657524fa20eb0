//! Star progression for a single (player, mission) pair.
//!
//! Tiers are cumulative: a pair holding gold also holds silver and bronze.
//! Advancing awards the lowest missing tier, and once all three are held the
//! next advance wipes the pair back to empty.

use std::collections::HashMap;

use crate::snapshot::Snapshot;
use crate::{Achievement, StarType};

/// Which tiers a pair currently holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MissionStatus {
    pub has_bronze: bool,
    pub has_silver: bool,
    pub has_gold: bool,
}

/// Display state of a pair, ordered by tier rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProgressState {
    Empty,
    Bronze,
    Silver,
    Gold,
}

/// What an advance does to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceAction {
    /// Insert one record with this tier
    Award(StarType),
    /// Delete every record for the pair
    Reset,
}

impl MissionStatus {
    /// Status from a set of tiers. Only presence matters, not order or repeats.
    pub fn from_tiers<I: IntoIterator<Item = StarType>>(tiers: I) -> Self {
        tiers.into_iter().fold(Self::default(), |status, tier| status.with(tier))
    }

    pub fn for_pair(achievements: &[Achievement], player_code: &str, mission_code: &str) -> Self {
        Self::from_tiers(
            achievements
                .iter()
                .filter(|a| a.player_code == player_code && a.mission_code == mission_code)
                .map(|a| a.star_type),
        )
    }

    pub fn with(mut self, tier: StarType) -> Self {
        match tier {
            StarType::Bronze => self.has_bronze = true,
            StarType::Silver => self.has_silver = true,
            StarType::Gold => self.has_gold = true,
        }
        self
    }

    pub fn has(&self, tier: StarType) -> bool {
        match tier {
            StarType::Bronze => self.has_bronze,
            StarType::Silver => self.has_silver,
            StarType::Gold => self.has_gold,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.has_bronze && self.has_silver && self.has_gold
    }

    /// Highest held tier, which is what the home screen lights up
    pub fn current_tier(&self) -> Option<StarType> {
        StarType::ALL.iter().rev().copied().find(|t| self.has(*t))
    }

    pub fn state(&self) -> ProgressState {
        match self.current_tier() {
            None => ProgressState::Empty,
            Some(StarType::Bronze) => ProgressState::Bronze,
            Some(StarType::Silver) => ProgressState::Silver,
            Some(StarType::Gold) => ProgressState::Gold,
        }
    }
}

/// Decide the advance for a pair. Rules are checked in order:
/// complete -> reset, then first missing of bronze, silver, gold.
pub fn next_action(status: MissionStatus) -> AdvanceAction {
    if status.is_complete() {
        AdvanceAction::Reset
    } else if !status.has_bronze {
        AdvanceAction::Award(StarType::Bronze)
    } else if !status.has_silver {
        AdvanceAction::Award(StarType::Silver)
    } else {
        AdvanceAction::Award(StarType::Gold)
    }
}

/// Validate an advance request against a snapshot and decide what it does.
///
/// The player must exist and not be soft-deleted, the mission must exist,
/// and a reset is refused unless `confirm_reset` is set.
pub fn plan_advance(
    snapshot: &Snapshot,
    player_code: &str,
    mission_code: &str,
    confirm_reset: bool,
) -> Result<AdvanceAction, String> {
    if snapshot.active_player(player_code).is_none() {
        return Err(format!("advance_star: player {} not found", player_code));
    }
    if snapshot.mission(mission_code).is_none() {
        return Err(format!("advance_star: mission {} not found", mission_code));
    }

    let status = MissionStatus::for_pair(&snapshot.achievements, player_code, mission_code);
    match next_action(status) {
        AdvanceAction::Reset if !confirm_reset => Err(format!(
            "advance_star: resetting {} / {} requires confirmation",
            player_code, mission_code
        )),
        action => Ok(action),
    }
}

/// Status after applying one advance
pub fn advance(status: MissionStatus) -> MissionStatus {
    match next_action(status) {
        AdvanceAction::Reset => MissionStatus::default(),
        AdvanceAction::Award(tier) => status.with(tier),
    }
}

/// Ids of records repeating an earlier (player, mission, tier).
/// The most recent record of each group survives; equal timestamps keep the higher id.
pub fn duplicate_achievement_ids(achievements: &[Achievement]) -> Vec<u64> {
    let mut groups: HashMap<(&str, &str, StarType), Vec<&Achievement>> = HashMap::new();
    for a in achievements {
        groups
            .entry((a.player_code.as_str(), a.mission_code.as_str(), a.star_type))
            .or_default()
            .push(a);
    }

    let mut ids: Vec<u64> = groups
        .into_values()
        .filter(|group| group.len() > 1)
        .flat_map(|mut group| {
            group.sort_by(|a, b| b.achieved_at.cmp(&a.achieved_at).then(b.id.cmp(&a.id)));
            group.into_iter().skip(1).map(|a| a.id).collect::<Vec<_>>()
        })
        .collect();
    ids.sort_unstable();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacetimedb::Timestamp;

    fn record(id: u64, player: &str, mission: &str, tier: StarType, micros: i64) -> Achievement {
        Achievement {
            id,
            player_code: player.to_string(),
            mission_code: mission.to_string(),
            star_type: tier,
            achieved_at: Timestamp::from_micros_since_unix_epoch(micros),
        }
    }

    fn status(b: bool, s: bool, g: bool) -> MissionStatus {
        MissionStatus {
            has_bronze: b,
            has_silver: s,
            has_gold: g,
        }
    }

    #[test]
    fn test_next_action_cases() {
        // (status, expected action, description)
        let cases = vec![
            (status(false, false, false), AdvanceAction::Award(StarType::Bronze), "empty -> bronze"),
            (status(true, false, false), AdvanceAction::Award(StarType::Silver), "bronze -> silver"),
            (status(true, true, false), AdvanceAction::Award(StarType::Gold), "silver -> gold"),
            (status(true, true, true), AdvanceAction::Reset, "gold -> reset"),
            // Gaps left by older single-tier data fill from the bottom
            (status(false, true, false), AdvanceAction::Award(StarType::Bronze), "silver only -> bronze"),
            (status(false, false, true), AdvanceAction::Award(StarType::Bronze), "gold only -> bronze"),
            (status(true, false, true), AdvanceAction::Award(StarType::Silver), "bronze+gold -> silver"),
            (status(false, true, true), AdvanceAction::Award(StarType::Bronze), "silver+gold -> bronze"),
        ];

        for (st, expected, description) in cases {
            assert_eq!(next_action(st), expected, "{}", description);
        }
    }

    #[test]
    fn test_four_advances_return_to_empty() {
        let mut st = MissionStatus::default();
        let mut states = vec![st.state()];
        for _ in 0..4 {
            st = advance(st);
            states.push(st.state());
        }
        assert_eq!(
            states,
            vec![
                ProgressState::Empty,
                ProgressState::Bronze,
                ProgressState::Silver,
                ProgressState::Gold,
                ProgressState::Empty,
            ]
        );
        assert_eq!(st, MissionStatus::default());
    }

    #[test]
    fn test_advance_adds_lowest_missing_or_clears() {
        for bits in 0u8..8 {
            let before = status(bits & 1 != 0, bits & 2 != 0, bits & 4 != 0);
            let after = advance(before);

            if before.is_complete() {
                assert_eq!(after, MissionStatus::default());
                continue;
            }

            let lowest_missing = StarType::ALL.iter().copied().find(|t| !before.has(*t)).unwrap();
            for tier in StarType::ALL {
                let expected = before.has(tier) || tier == lowest_missing;
                assert_eq!(after.has(tier), expected, "bits {:03b} tier {}", bits, tier);
            }
        }
    }

    #[test]
    fn test_status_ignores_order_and_repeats() {
        let a = MissionStatus::from_tiers([StarType::Gold, StarType::Bronze]);
        let b = MissionStatus::from_tiers([StarType::Bronze, StarType::Gold, StarType::Gold]);
        assert_eq!(a, b);
        assert_eq!(a.current_tier(), Some(StarType::Gold));
        assert!(!a.has_silver);
    }

    #[test]
    fn test_status_for_pair_filters_other_pairs() {
        let achievements = vec![
            record(1, "P001", "M001", StarType::Bronze, 10),
            record(2, "P001", "M002", StarType::Silver, 20),
            record(3, "P002", "M001", StarType::Gold, 30),
        ];

        assert_eq!(MissionStatus::for_pair(&achievements, "P001", "M001"), status(true, false, false));
        assert_eq!(MissionStatus::for_pair(&achievements, "P001", "M003"), MissionStatus::default());
        assert_eq!(MissionStatus::for_pair(&achievements, "P001", "M003").state(), ProgressState::Empty);
    }

    fn planning_snapshot() -> Snapshot {
        use crate::{Mission, Player};

        let player = |code: &str, deleted: bool| Player {
            player_code: code.to_string(),
            player_name: format!("Player {}", code),
            grade: "中1".to_string(),
            comment: String::new(),
            photo_url: "https://example.com/photo.jpg".to_string(),
            is_deleted: deleted,
        };
        let missions = vec![Mission {
            mission_code: "M001".to_string(),
            mission_name: "インサイド".to_string(),
            content: String::new(),
        }];
        let achievements = vec![
            record(1, "P001", "M001", StarType::Bronze, 10),
            record(2, "P001", "M001", StarType::Silver, 20),
            record(3, "P001", "M001", StarType::Gold, 30),
            record(4, "P002", "M001", StarType::Bronze, 40),
        ];
        Snapshot::new(
            vec![player("P001", false), player("P002", false), player("P003", true)],
            missions,
            achievements,
        )
    }

    #[test]
    fn test_plan_advance_cases() {
        let snapshot = planning_snapshot();

        // (player, mission, confirm_reset, expected, description)
        let cases = vec![
            ("P002", "M001", false, Ok(AdvanceAction::Award(StarType::Silver)), "bronze held -> silver"),
            ("P002", "M001", true, Ok(AdvanceAction::Award(StarType::Silver)), "confirm flag ignored when not resetting"),
            ("P001", "M001", true, Ok(AdvanceAction::Reset), "complete pair resets when confirmed"),
            (
                "P001", "M001", false,
                Err("advance_star: resetting P001 / M001 requires confirmation".to_string()),
                "complete pair needs confirmation",
            ),
            ("P404", "M001", true, Err("advance_star: player P404 not found".to_string()), "unknown player"),
            ("P003", "M001", true, Err("advance_star: player P003 not found".to_string()), "soft-deleted player"),
            ("P002", "M404", true, Err("advance_star: mission M404 not found".to_string()), "unknown mission"),
        ];

        for (player, mission, confirm, expected, description) in cases {
            assert_eq!(plan_advance(&snapshot, player, mission, confirm), expected, "{}", description);
        }
    }

    #[test]
    fn test_duplicate_achievement_ids_keeps_latest() {
        let achievements = vec![
            record(1, "P001", "M001", StarType::Bronze, 100),
            record(2, "P001", "M001", StarType::Bronze, 300),
            record(3, "P001", "M001", StarType::Bronze, 200),
            record(4, "P001", "M001", StarType::Silver, 400),
            record(5, "P002", "M001", StarType::Bronze, 100),
            record(6, "P002", "M001", StarType::Bronze, 100),
        ];

        assert_eq!(duplicate_achievement_ids(&achievements), vec![1, 3, 5]);
        assert!(duplicate_achievement_ids(&achievements[3..5]).is_empty());
    }
}
