// Bulk restore reducers for disaster recovery
// Accept JSON arrays exported from the admin tool (camelCase field names)

use spacetimedb::{reducer, ReducerContext, Timestamp, log, Table};
use crate::{Player, Mission, Achievement, StarType, authorized_worker};
use crate::{player, mission, achievement};
use serde_json::Value;
use std::collections::HashSet;

/// Parse Timestamp from either SDK JSON {"__timestamp_micros_since_unix_epoch__": "123456"}
/// or an RFC 3339 string as written by the old document store export
fn parse_timestamp_json(val: &Value) -> Result<Timestamp, String> {
    if let Some(text) = val.as_str() {
        let parsed = chrono::DateTime::parse_from_rfc3339(text)
            .map_err(|e| format!("Invalid RFC 3339 timestamp '{}': {}", text, e))?;
        return Ok(Timestamp::from_micros_since_unix_epoch(parsed.timestamp_micros()));
    }

    let micros_str = val.get("__timestamp_micros_since_unix_epoch__")
        .and_then(|v| v.as_str())
        .ok_or("Missing or invalid timestamp field")?;

    let micros: i64 = micros_str.parse()
        .map_err(|e| format!("Invalid timestamp micros: {}", e))?;

    Ok(Timestamp::from_micros_since_unix_epoch(micros))
}

fn parse_array<'a>(data: &'a Value, what: &str) -> Result<&'a Vec<Value>, String> {
    data.as_array()
        .ok_or_else(|| format!("Expected JSON array of {} records", what))
}

fn required_str(row: &Value, field: &str, label: &str, i: usize) -> Result<String, String> {
    row.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| format!("{} {}: missing {}", label, i, field))
}

fn optional_str(row: &Value, field: &str) -> String {
    row.get(field).and_then(|v| v.as_str()).unwrap_or_default().to_string()
}

pub(crate) fn parse_players(json_data: &str) -> Result<Vec<Player>, String> {
    let data: Value = serde_json::from_str(json_data)
        .map_err(|e| format!("Invalid JSON: {}", e))?;

    parse_array(&data, "player")?
        .iter()
        .enumerate()
        .map(|(i, p)| -> Result<Player, String> {
            Ok(Player {
                player_code: required_str(p, "playerCode", "Player", i)?,
                player_name: required_str(p, "playerName", "Player", i)?,
                grade: optional_str(p, "grade"),
                comment: optional_str(p, "comment"),
                photo_url: optional_str(p, "photoUrl"),
                // Older exports predate soft delete
                is_deleted: p.get("isDeleted").and_then(|v| v.as_bool()).unwrap_or(false),
            })
        })
        .collect()
}

pub(crate) fn parse_missions(json_data: &str) -> Result<Vec<Mission>, String> {
    let data: Value = serde_json::from_str(json_data)
        .map_err(|e| format!("Invalid JSON: {}", e))?;

    parse_array(&data, "mission")?
        .iter()
        .enumerate()
        .map(|(i, m)| -> Result<Mission, String> {
            Ok(Mission {
                mission_code: required_str(m, "missionCode", "Mission", i)?,
                mission_name: required_str(m, "missionName", "Mission", i)?,
                content: optional_str(m, "content"),
            })
        })
        .collect()
}

pub(crate) fn parse_achievements(json_data: &str) -> Result<Vec<Achievement>, String> {
    let data: Value = serde_json::from_str(json_data)
        .map_err(|e| format!("Invalid JSON: {}", e))?;

    parse_array(&data, "achievement")?
        .iter()
        .enumerate()
        .map(|(i, a)| -> Result<Achievement, String> {
            let star_type: StarType = required_str(a, "starType", "Achievement", i)?
                .parse()
                .map_err(|e| format!("Achievement {}: {}", i, e))?;
            let achieved_at = parse_timestamp_json(
                a.get("achievedAt").ok_or(format!("Achievement {}: missing achievedAt", i))?,
            )
            .map_err(|e| format!("Achievement {}: {}", i, e))?;

            Ok(Achievement {
                id: 0, // auto_inc
                player_code: required_str(a, "playerCode", "Achievement", i)?,
                mission_code: required_str(a, "missionCode", "Achievement", i)?,
                star_type,
                achieved_at,
            })
        })
        .collect()
}

/// Drop incoming rows whose (player, mission, tier) is already stored or
/// already appeared earlier in the same payload
pub(crate) fn skip_existing_tiers(existing: &[Achievement], incoming: Vec<Achievement>) -> Vec<Achievement> {
    let mut seen: HashSet<(String, String, StarType)> = existing
        .iter()
        .map(|a| (a.player_code.clone(), a.mission_code.clone(), a.star_type))
        .collect();

    incoming
        .into_iter()
        .filter(|a| seen.insert((a.player_code.clone(), a.mission_code.clone(), a.star_type)))
        .collect()
}

fn check_authorized(ctx: &ReducerContext, reducer_name: &str) -> Result<(), String> {
    if ctx.db.authorized_worker().identity().find(&ctx.sender).is_none() {
        log::warn!("Unauthorized {} attempt by {}", reducer_name, ctx.sender);
        return Err("Unauthorized".to_string());
    }
    Ok(())
}

/// Bulk restore player table from JSON array. Existing codes are overwritten.
#[reducer]
pub fn bulk_restore_player(ctx: &ReducerContext, json_data: String) -> Result<(), String> {
    check_authorized(ctx, "bulk_restore_player")?;

    let players = parse_players(&json_data)?;
    let count = players.len();
    for player in players {
        if ctx.db.player().player_code().find(&player.player_code).is_some() {
            ctx.db.player().player_code().update(player);
        } else {
            ctx.db.player().insert(player);
        }
    }

    log::info!("[RESTORE] players:{}", count);
    crate::refresh_derived_tables(ctx);
    Ok(())
}

/// Bulk restore mission table from JSON array. Existing codes are overwritten.
#[reducer]
pub fn bulk_restore_mission(ctx: &ReducerContext, json_data: String) -> Result<(), String> {
    check_authorized(ctx, "bulk_restore_mission")?;

    let missions = parse_missions(&json_data)?;
    let count = missions.len();
    for mission in missions {
        if ctx.db.mission().mission_code().find(&mission.mission_code).is_some() {
            ctx.db.mission().mission_code().update(mission);
        } else {
            ctx.db.mission().insert(mission);
        }
    }

    log::info!("[RESTORE] missions:{}", count);
    crate::refresh_derived_tables(ctx);
    Ok(())
}

/// Bulk restore achievement table from JSON array. Rows get fresh ids.
/// Tiers a pair already holds are skipped, so restoring twice is harmless.
#[reducer]
pub fn bulk_restore_achievement(ctx: &ReducerContext, json_data: String) -> Result<(), String> {
    check_authorized(ctx, "bulk_restore_achievement")?;

    let parsed = parse_achievements(&json_data)?;
    let received = parsed.len();
    let existing: Vec<Achievement> = ctx.db.achievement().iter().collect();
    let achievements = skip_existing_tiers(&existing, parsed);
    let count = achievements.len();
    for achievement in achievements {
        ctx.db.achievement().insert(achievement);
    }

    log::info!("[RESTORE] achievements:{} skipped:{}", count, received - count);
    crate::refresh_derived_tables(ctx);
    Ok(())
}
