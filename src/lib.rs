use std::fmt;
use std::str::FromStr;

use spacetimedb::{reducer, table, Identity, ReducerContext, SpacetimeType, Table, Timestamp};

pub mod catalog;
pub mod progress;
pub mod ranking;
pub mod snapshot;

mod restore;

use catalog::DEFAULT_MISSIONS;
use progress::{plan_advance, AdvanceAction};
use snapshot::Snapshot;

// ==================== CONSTANTS ====================

/// Player codes look like P001, P002, ...
pub const PLAYER_CODE_PREFIX: &str = "P";

/// Zero-padded width of the numeric part of a player code
pub const PLAYER_CODE_WIDTH: usize = 3;

/// Placeholder photo used when a player's picture is cleared by an admin
pub const DEFAULT_NO_IMAGE_URL: &str = "/asaren-starrank/noimage.png";

// ==================== HELPER FUNCTIONS ====================

/// Check whether the caller may run maintenance reducers
fn is_authorized(ctx: &ReducerContext) -> bool {
    ctx.db.authorized_worker().identity().find(&ctx.sender).is_some()
}

/// Registration needs a name and a photo; nothing is written otherwise
pub fn validate_registration(player_name: &str, photo_url: &str) -> Result<(), String> {
    if player_name.trim().is_empty() {
        return Err("register_player: player name is required".to_string());
    }
    if photo_url.trim().is_empty() {
        return Err("register_player: photo is required".to_string());
    }
    Ok(())
}

/// Next free player code: highest numeric code so far + 1.
/// Soft-deleted players still hold their code, so codes are never reused.
/// Only prefix + ASCII digits counts as a numeric code.
pub fn next_player_code(players: &[Player]) -> Result<String, String> {
    let highest = players
        .iter()
        .filter_map(|p| p.player_code.strip_prefix(PLAYER_CODE_PREFIX))
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|digits| digits.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    let next = highest
        .checked_add(1)
        .ok_or_else(|| "register_player: player codes exhausted".to_string())?;
    Ok(format!(
        "{}{:0width$}",
        PLAYER_CODE_PREFIX,
        next,
        width = PLAYER_CODE_WIDTH
    ))
}

/// Rebuild player_summary and mission_star_entry from the current tables.
/// Collections hold tens of rows, so a full rebuild after each write is fine.
fn refresh_derived_tables(ctx: &ReducerContext) {
    let snapshot = Snapshot::load(ctx);
    refresh_player_summaries(ctx, &snapshot);
    refresh_mission_entries(ctx, &snapshot);
}

fn refresh_player_summaries(ctx: &ReducerContext, snapshot: &Snapshot) {
    let stale: Vec<_> = ctx.db.player_summary().iter().map(|s| s.player_code).collect();
    for code in stale {
        ctx.db.player_summary().player_code().delete(&code);
    }

    let roster = ranking::roster_order(&snapshot.players);
    let board = ranking::leaderboard(&snapshot.players, &snapshot.achievements);

    for row in &board {
        let roster_position = roster
            .iter()
            .position(|p| p.player_code == row.player.player_code)
            .map(|i| (i + 1) as u32)
            .unwrap_or(0);

        ctx.db.player_summary().insert(PlayerSummary {
            player_code: row.player.player_code.clone(),
            player_name: row.player.player_name.clone(),
            grade: row.player.grade.clone(),
            gold: row.counts.gold,
            silver: row.counts.silver,
            bronze: row.counts.bronze,
            total: row.counts.total(),
            roster_position,
            leaderboard_position: row.position,
        });
    }

    log::debug!("[SUMMARY] refreshed players:{}", board.len());
}

fn refresh_mission_entries(ctx: &ReducerContext, snapshot: &Snapshot) {
    let stale: Vec<_> = ctx.db.mission_star_entry().iter().map(|e| e.id).collect();
    for id in stale {
        ctx.db.mission_star_entry().id().delete(&id);
    }

    let mut count = 0;
    for mission in &snapshot.missions {
        let roster = ranking::mission_roster(&mission.mission_code, snapshot);
        for (star_type, entries) in roster.by_tier() {
            for entry in entries {
                ctx.db.mission_star_entry().insert(MissionStarEntry {
                    id: entry.achievement_id,
                    mission_code: mission.mission_code.clone(),
                    star_type,
                    player_code: entry.player_code.clone(),
                    display_name: entry.display_name.clone(),
                    achieved_on: ranking::format_achieved_on(entry.achieved_at),
                });
                count += 1;
            }
        }
    }

    log::debug!("[SUMMARY] refreshed mission entries:{}", count);
}

// ==================== TABLES ====================

/// Star tier, ranked bronze < silver < gold
#[derive(SpacetimeType, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StarType {
    Bronze,
    Silver,
    Gold,
}

impl StarType {
    /// All tiers in ascending rank
    pub const ALL: [StarType; 3] = [StarType::Bronze, StarType::Silver, StarType::Gold];

    pub fn as_str(&self) -> &'static str {
        match self {
            StarType::Bronze => "bronze",
            StarType::Silver => "silver",
            StarType::Gold => "gold",
        }
    }
}

impl fmt::Display for StarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StarType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bronze" => Ok(StarType::Bronze),
            "silver" => Ok(StarType::Silver),
            "gold" => Ok(StarType::Gold),
            other => Err(format!("unknown star type '{}'", other)),
        }
    }
}

/// Registered player
#[table(name = player, public)]
#[derive(Clone, Debug)]
pub struct Player {
    /// Human-assigned code (P001, ...), stable for the player's lifetime
    #[primary_key]
    pub player_code: String,

    pub player_name: String,

    /// Grade/level label as typed at registration (e.g. "中2")
    pub grade: String,

    pub comment: String,

    /// External URL or inlined data URL, opaque to the module
    pub photo_url: String,

    /// Soft delete: hidden from rosters, achievements stay attributable
    pub is_deleted: bool,
}

/// Skill mission from the fixed catalog
#[table(name = mission, public)]
#[derive(Clone, Debug)]
pub struct Mission {
    #[primary_key]
    pub mission_code: String,

    pub mission_name: String,

    /// Free-text bronze/silver/gold thresholds (descriptive only)
    pub content: String,
}

/// One star awarded to a player for a mission.
/// Each tier appears at most once per (player, mission) pair.
#[table(name = achievement, public)]
#[derive(Clone, Debug)]
pub struct Achievement {
    #[primary_key]
    #[auto_inc]
    pub id: u64,

    #[index(btree)]
    pub player_code: String,

    #[index(btree)]
    pub mission_code: String,

    pub star_type: StarType,

    pub achieved_at: Timestamp,
}

/// Derived: star totals and list positions for each active player
#[table(name = player_summary, public)]
pub struct PlayerSummary {
    #[primary_key]
    pub player_code: String,

    pub player_name: String,
    pub grade: String,

    pub gold: u32,
    pub silver: u32,
    pub bronze: u32,
    pub total: u32,

    /// Position on the home screen player list (1-based)
    pub roster_position: u32,

    /// Position on the leaderboard (1-based, ties not merged)
    pub leaderboard_position: u32,
}

/// Derived: one achievement with its player's display name resolved
#[table(name = mission_star_entry, public)]
pub struct MissionStarEntry {
    /// Same id as the source achievement row
    #[primary_key]
    pub id: u64,

    #[index(btree)]
    pub mission_code: String,

    pub star_type: StarType,
    pub player_code: String,

    /// Player name, or the raw code if the player is gone
    pub display_name: String,

    /// UTC date label, YYYY-MM-DD
    pub achieved_on: String,
}

/// Identities allowed to run maintenance and restore reducers
#[table(name = authorized_worker)]
pub struct AuthorizedWorker {
    #[primary_key]
    pub identity: Identity,
}

// ==================== REDUCERS ====================

/// Register a new player. The code is assigned here, not by the caller.
#[reducer]
pub fn register_player(
    ctx: &ReducerContext,
    player_name: String,
    grade: String,
    comment: String,
    photo_url: String,
) -> Result<(), String> {
    validate_registration(&player_name, &photo_url)?;

    let players: Vec<Player> = ctx.db.player().iter().collect();
    let player_code = next_player_code(&players)?;

    ctx.db.player().insert(Player {
        player_code: player_code.clone(),
        player_name: player_name.trim().to_string(),
        grade: grade.trim().to_string(),
        comment,
        photo_url,
        is_deleted: false,
    });

    log::info!("[PLAYER] registered code:{} name:{}", player_code, player_name.trim());
    refresh_derived_tables(ctx);
    Ok(())
}

/// Replace a player's mutable fields in place.
/// An empty photo keeps the current one.
#[reducer]
pub fn update_player(
    ctx: &ReducerContext,
    player_code: String,
    player_name: String,
    grade: String,
    comment: String,
    photo_url: String,
) -> Result<(), String> {
    let mut player = ctx
        .db
        .player()
        .player_code()
        .find(&player_code)
        .filter(|p| !p.is_deleted)
        .ok_or_else(|| format!("update_player: player {} not found", player_code))?;

    if player_name.trim().is_empty() {
        return Err("update_player: player name is required".to_string());
    }

    player.player_name = player_name.trim().to_string();
    player.grade = grade.trim().to_string();
    player.comment = comment;
    if !photo_url.trim().is_empty() {
        player.photo_url = photo_url;
    }

    ctx.db.player().player_code().update(player);

    log::info!("[PLAYER] updated code:{}", player_code);
    refresh_derived_tables(ctx);
    Ok(())
}

/// Soft-delete a player. Their achievements stay in place.
#[reducer]
pub fn delete_player(ctx: &ReducerContext, player_code: String) -> Result<(), String> {
    let mut player = ctx
        .db
        .player()
        .player_code()
        .find(&player_code)
        .ok_or_else(|| format!("delete_player: player {} not found", player_code))?;

    if player.is_deleted {
        log::debug!("[PLAYER] delete ignored, already deleted code:{}", player_code);
        return Ok(());
    }

    player.is_deleted = true;
    ctx.db.player().player_code().update(player);

    log::info!("[PLAYER] soft-deleted code:{}", player_code);
    refresh_derived_tables(ctx);
    Ok(())
}

#[reducer]
pub fn add_mission(
    ctx: &ReducerContext,
    mission_code: String,
    mission_name: String,
    content: String,
) -> Result<(), String> {
    let mission_code = mission_code.trim().to_string();
    if mission_code.is_empty() || mission_name.trim().is_empty() {
        return Err("add_mission: mission code and name are required".to_string());
    }
    if ctx.db.mission().mission_code().find(&mission_code).is_some() {
        return Err(format!("add_mission: mission {} already exists", mission_code));
    }

    ctx.db.mission().insert(Mission {
        mission_code: mission_code.clone(),
        mission_name: mission_name.trim().to_string(),
        content,
    });

    log::info!("[MISSION] added code:{}", mission_code);
    refresh_derived_tables(ctx);
    Ok(())
}

#[reducer]
pub fn update_mission(
    ctx: &ReducerContext,
    mission_code: String,
    mission_name: String,
    content: String,
) -> Result<(), String> {
    let mut mission = ctx
        .db
        .mission()
        .mission_code()
        .find(&mission_code)
        .ok_or_else(|| format!("update_mission: mission {} not found", mission_code))?;

    if mission_name.trim().is_empty() {
        return Err("update_mission: mission name is required".to_string());
    }

    mission.mission_name = mission_name.trim().to_string();
    mission.content = content;
    ctx.db.mission().mission_code().update(mission);

    log::info!("[MISSION] updated code:{}", mission_code);
    Ok(())
}

/// Advance a (player, mission) pair to its next star.
///
/// Awards the lowest missing tier. Once bronze, silver and gold are all
/// held, the next advance wipes the pair instead; that path only runs
/// with `confirm_reset` set, otherwise the call fails and nothing changes.
#[reducer]
pub fn advance_star(
    ctx: &ReducerContext,
    player_code: String,
    mission_code: String,
    confirm_reset: bool,
) -> Result<(), String> {
    let snapshot = Snapshot::load(ctx);

    match plan_advance(&snapshot, &player_code, &mission_code, confirm_reset)? {
        AdvanceAction::Reset => {
            let ids: Vec<u64> = snapshot
                .pair_records(&player_code, &mission_code)
                .map(|a| a.id)
                .collect();
            for id in &ids {
                ctx.db.achievement().id().delete(id);
            }

            log::info!(
                "[STAR] reset player:{} mission:{} removed:{}",
                player_code, mission_code, ids.len()
            );
        }
        AdvanceAction::Award(star_type) => {
            let row = ctx.db.achievement().insert(Achievement {
                id: 0, // auto_inc
                player_code: player_code.clone(),
                mission_code: mission_code.clone(),
                star_type,
                achieved_at: ctx.timestamp,
            });

            log::info!(
                "[STAR] awarded player:{} mission:{} tier:{} id:{}",
                player_code, mission_code, star_type, row.id
            );
        }
    }

    refresh_derived_tables(ctx);
    Ok(())
}

/// Admin: replace the mission catalog with the default one.
/// Achievements are left alone; codes that no longer exist simply stop showing.
#[reducer]
pub fn admin_seed_missions(ctx: &ReducerContext) -> Result<(), String> {
    if !is_authorized(ctx) {
        log::warn!("Unauthorized admin_seed_missions attempt by {}", ctx.sender);
        return Err("Unauthorized".to_string());
    }

    let existing: Vec<_> = ctx.db.mission().iter().map(|m| m.mission_code).collect();
    let removed = existing.len();
    for code in existing {
        ctx.db.mission().mission_code().delete(&code);
    }

    for (code, name, content) in DEFAULT_MISSIONS {
        ctx.db.mission().insert(Mission {
            mission_code: code.to_string(),
            mission_name: name.to_string(),
            content: content.to_string(),
        });
    }

    log::info!("[ADMIN] seeded missions removed:{} added:{}", removed, DEFAULT_MISSIONS.len());
    refresh_derived_tables(ctx);
    Ok(())
}

/// Admin: drop repeated (player, mission, tier) records, keeping the latest
#[reducer]
pub fn admin_dedupe_achievements(ctx: &ReducerContext) -> Result<(), String> {
    if !is_authorized(ctx) {
        log::warn!("Unauthorized admin_dedupe_achievements attempt by {}", ctx.sender);
        return Err("Unauthorized".to_string());
    }

    let achievements: Vec<Achievement> = ctx.db.achievement().iter().collect();
    let duplicates = progress::duplicate_achievement_ids(&achievements);
    for id in &duplicates {
        ctx.db.achievement().id().delete(id);
    }

    log::info!("[ADMIN] dedupe achievements removed:{}", duplicates.len());
    refresh_derived_tables(ctx);
    Ok(())
}

/// Admin: point every player's photo at the placeholder image
#[reducer]
pub fn admin_reset_player_photos(ctx: &ReducerContext) -> Result<(), String> {
    if !is_authorized(ctx) {
        log::warn!("Unauthorized admin_reset_player_photos attempt by {}", ctx.sender);
        return Err("Unauthorized".to_string());
    }

    let players: Vec<Player> = ctx.db.player().iter().collect();
    let count = players.len();
    for mut player in players {
        player.photo_url = DEFAULT_NO_IMAGE_URL.to_string();
        ctx.db.player().player_code().update(player);
    }

    log::info!("[ADMIN] reset photos players:{}", count);
    Ok(())
}

/// Initialize module
#[reducer(init)]
pub fn init(ctx: &ReducerContext) {
    // In init, ctx.sender is the module owner identity
    if !is_authorized(ctx) {
        ctx.db.authorized_worker().insert(AuthorizedWorker {
            identity: ctx.sender,
        });
    }

    log::info!("StarRank module initialized successfully");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(code: &str, deleted: bool) -> Player {
        Player {
            player_code: code.to_string(),
            player_name: format!("Player {}", code),
            grade: "中1".to_string(),
            comment: String::new(),
            photo_url: "https://example.com/photo.jpg".to_string(),
            is_deleted: deleted,
        }
    }

    #[test]
    fn test_star_type_parse_and_display() {
        assert_eq!("gold".parse::<StarType>(), Ok(StarType::Gold));
        assert_eq!(" Silver ".parse::<StarType>(), Ok(StarType::Silver));
        assert_eq!("bronze".parse::<StarType>(), Ok(StarType::Bronze));
        assert!("platinum".parse::<StarType>().is_err());

        assert_eq!(StarType::Gold.to_string(), "gold");
        assert!(StarType::Bronze < StarType::Silver);
        assert!(StarType::Silver < StarType::Gold);
    }

    #[test]
    fn test_next_player_code() {
        // (existing codes, expected next code, description)
        let cases: Vec<(Vec<Player>, Result<String, String>, &str)> = vec![
            (vec![], Ok("P001".to_string()), "first player"),
            (
                vec![player("P001", false), player("P007", false), player("P003", false)],
                Ok("P008".to_string()),
                "highest code wins, not the count",
            ),
            (
                vec![player("P001", false), player("P002", true)],
                Ok("P003".to_string()),
                "deleted players keep their code",
            ),
            (
                vec![player("COACH", false), player("P004", false)],
                Ok("P005".to_string()),
                "hand-entered codes are ignored",
            ),
            (vec![player("P999", false)], Ok("P1000".to_string()), "width grows past 999"),
            (
                vec![player("P+050", false), player("P002", false)],
                Ok("P003".to_string()),
                "sign characters are not digits",
            ),
            (
                vec![player("P", false), player("P-01", false)],
                Ok("P001".to_string()),
                "empty and negative suffixes are ignored",
            ),
            (
                vec![player("P4294967295", false)],
                Err("register_player: player codes exhausted".to_string()),
                "numeric space exhausted",
            ),
        ];

        for (players, expected, description) in cases {
            assert_eq!(next_player_code(&players), expected, "{}", description);
        }
    }

    #[test]
    fn test_validate_registration() {
        assert!(validate_registration("TAKU", "data:image/jpeg;base64,AAAA").is_ok());
        assert_eq!(
            validate_registration("TAKU", ""),
            Err("register_player: photo is required".to_string())
        );
        assert_eq!(
            validate_registration("  ", "https://example.com/p.jpg"),
            Err("register_player: player name is required".to_string())
        );
    }
}
