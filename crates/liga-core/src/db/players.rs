// Player rows: ownership, lineup flags, listings, value.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{LigaError, Result};
use crate::model::player::{Listing, Player, Position};
use crate::model::{from_epoch, to_epoch};

const PLAYER_COLUMNS: &str = "id, name, club_id, position, value, total_points, team_id, starter,
     listed_at, listed_until, asking_price, chased";

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<Player> {
    let listed_at: Option<i64> = row.get(8)?;
    let listed_until: Option<i64> = row.get(9)?;
    let listing = match (listed_at, listed_until) {
        (Some(at), Some(until)) => Some(Listing {
            listed_at: from_epoch(at),
            listed_until: from_epoch(until),
            asking_price: row.get(10)?,
            chased: row.get(11)?,
        }),
        _ => None,
    };
    Ok(Player {
        id: row.get(0)?,
        name: row.get(1)?,
        club_id: row.get(2)?,
        position: row.get(3)?,
        value: row.get(4)?,
        total_points: row.get(5)?,
        team_id: row.get(6)?,
        starter: row.get(7)?,
        listing,
    })
}

fn query_players<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Player>> {
    let mut stmt = conn.prepare(sql)?;
    let players = stmt
        .query_map(params, player_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(players)
}

/// Insert a player or refresh position and value if a `(name, club)` row
/// already exists. Ownership and points are left alone.
pub fn upsert(conn: &Connection, name: &str, club_id: i64, position: Position, value: i64) -> Result<i64> {
    let id: i64 = conn.query_row(
        "INSERT INTO players (name, club_id, position, value)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(name, club_id) DO UPDATE SET
            position = excluded.position,
            value    = excluded.value
         RETURNING id",
        params![name.trim(), club_id, position, value],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub fn get(conn: &Connection, id: i64) -> Result<Player> {
    conn.query_row(
        &format!("SELECT {PLAYER_COLUMNS} FROM players WHERE id = ?1"),
        params![id],
        player_from_row,
    )
    .optional()?
    .ok_or_else(|| LigaError::not_found("player", id))
}

pub fn find(conn: &Connection, name: &str, club_id: i64) -> Result<Option<Player>> {
    Ok(conn
        .query_row(
            &format!("SELECT {PLAYER_COLUMNS} FROM players WHERE name = ?1 AND club_id = ?2"),
            params![name.trim(), club_id],
            player_from_row,
        )
        .optional()?)
}

/// A team's players, starters first, then by position and name.
pub fn list_by_team(conn: &Connection, team_id: i64) -> Result<Vec<Player>> {
    query_players(
        conn,
        &format!(
            "SELECT {PLAYER_COLUMNS} FROM players WHERE team_id = ?1
             ORDER BY starter DESC,
                      CASE position WHEN 'GK' THEN 0 WHEN 'DEF' THEN 1 WHEN 'MID' THEN 2 ELSE 3 END,
                      name"
        ),
        params![team_id],
    )
}

pub fn starters(conn: &Connection, team_id: i64) -> Result<Vec<Player>> {
    query_players(
        conn,
        &format!("SELECT {PLAYER_COLUMNS} FROM players WHERE team_id = ?1 AND starter = 1 ORDER BY id"),
        params![team_id],
    )
}

pub fn count_by_team(conn: &Connection, team_id: i64) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM players WHERE team_id = ?1",
        params![team_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// How many of a team's players are on the market, not counting `except_player`.
pub fn listed_count_by_team(conn: &Connection, team_id: i64, except_player: Option<i64>) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM players
         WHERE team_id = ?1 AND listed_until IS NOT NULL AND id != ?2",
        params![team_id, except_player.unwrap_or(-1)],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Free agents not currently on the market, optionally of one position.
pub fn unlisted_free_agents(conn: &Connection, position: Option<Position>) -> Result<Vec<Player>> {
    match position {
        Some(pos) => query_players(
            conn,
            &format!(
                "SELECT {PLAYER_COLUMNS} FROM players
                 WHERE team_id IS NULL AND listed_until IS NULL AND position = ?1 ORDER BY id"
            ),
            params![pos],
        ),
        None => query_players(
            conn,
            &format!(
                "SELECT {PLAYER_COLUMNS} FROM players
                 WHERE team_id IS NULL AND listed_until IS NULL ORDER BY id"
            ),
            [],
        ),
    }
}

/// Every listed player, soonest-closing first.
pub fn market(conn: &Connection) -> Result<Vec<Player>> {
    query_players(
        conn,
        &format!(
            "SELECT {PLAYER_COLUMNS} FROM players
             WHERE listed_until IS NOT NULL ORDER BY listed_until, id"
        ),
        [],
    )
}

/// Listings whose window closed at or before `now`.
pub fn expired_listings(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<Player>> {
    query_players(
        conn,
        &format!(
            "SELECT {PLAYER_COLUMNS} FROM players
             WHERE listed_until IS NOT NULL AND listed_until <= ?1 ORDER BY listed_until, id"
        ),
        params![to_epoch(now)],
    )
}

/// System listings still open at `now`.
pub fn active_system_listings(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM players
         WHERE team_id IS NULL AND listed_until IS NOT NULL AND listed_until > ?1",
        params![to_epoch(now)],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Move the player to `team_id` (`None` = free agent pool). The player
/// lands on the bench with no listing.
pub fn set_owner(conn: &Connection, player_id: i64, team_id: Option<i64>) -> Result<()> {
    let updated = conn.execute(
        "UPDATE players SET team_id = ?2, starter = 0,
            listed_at = NULL, listed_until = NULL, asking_price = NULL, chased = 0
         WHERE id = ?1",
        params![player_id, team_id],
    )?;
    if updated == 0 {
        return Err(LigaError::not_found("player", player_id));
    }
    Ok(())
}

pub fn set_starter(conn: &Connection, player_id: i64, starter: bool) -> Result<()> {
    conn.execute(
        "UPDATE players SET starter = ?2 WHERE id = ?1",
        params![player_id, starter],
    )?;
    Ok(())
}

pub fn set_listing(conn: &Connection, player_id: i64, listing: &Listing) -> Result<()> {
    conn.execute(
        "UPDATE players SET listed_at = ?2, listed_until = ?3, asking_price = ?4, chased = ?5
         WHERE id = ?1",
        params![
            player_id,
            to_epoch(listing.listed_at),
            to_epoch(listing.listed_until),
            listing.asking_price,
            listing.chased,
        ],
    )?;
    Ok(())
}

pub fn clear_listing(conn: &Connection, player_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE players SET listed_at = NULL, listed_until = NULL, asking_price = NULL, chased = 0
         WHERE id = ?1",
        params![player_id],
    )?;
    Ok(())
}

/// Fold one matchday score into the player's season total and market value.
pub fn apply_score(
    conn: &Connection,
    player_id: i64,
    points: i64,
    value_per_point: i64,
    min_value: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE players SET total_points = total_points + ?2,
                            value = MAX(?4, value + ?2 * ?3)
         WHERE id = ?1",
        params![player_id, points, value_per_point, min_value],
    )?;
    Ok(())
}
