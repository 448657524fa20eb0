//! Immutable working set of the three collections.
//!
//! Reducers load one of these, run the pure state machine and aggregation
//! functions against it, then write through `ctx.db`.

use spacetimedb::{ReducerContext, Table};

use crate::{achievement, mission, player};
use crate::{Achievement, Mission, Player};

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub players: Vec<Player>,
    pub missions: Vec<Mission>,
    pub achievements: Vec<Achievement>,
}

impl Snapshot {
    pub fn new(players: Vec<Player>, missions: Vec<Mission>, achievements: Vec<Achievement>) -> Self {
        Self {
            players,
            missions,
            achievements,
        }
    }

    /// Read every row of the player, mission and achievement tables
    pub fn load(ctx: &ReducerContext) -> Self {
        Self {
            players: ctx.db.player().iter().collect(),
            missions: ctx.db.mission().iter().collect(),
            achievements: ctx.db.achievement().iter().collect(),
        }
    }

    /// Player lookup that treats soft-deleted players as absent
    pub fn active_player(&self, player_code: &str) -> Option<&Player> {
        self.players
            .iter()
            .find(|p| p.player_code == player_code && !p.is_deleted)
    }

    pub fn mission(&self, mission_code: &str) -> Option<&Mission> {
        self.missions.iter().find(|m| m.mission_code == mission_code)
    }

    /// Name to show for a player code; falls back to the code itself
    /// when the player is missing or soft-deleted.
    pub fn display_name<'a>(&'a self, player_code: &'a str) -> &'a str {
        self.active_player(player_code)
            .map(|p| p.player_name.as_str())
            .unwrap_or(player_code)
    }

    /// Records belonging to one (player, mission) pair
    pub fn pair_records<'a>(
        &'a self,
        player_code: &'a str,
        mission_code: &'a str,
    ) -> impl Iterator<Item = &'a Achievement> + 'a {
        self.achievements
            .iter()
            .filter(move |a| a.player_code == player_code && a.mission_code == mission_code)
    }
}
