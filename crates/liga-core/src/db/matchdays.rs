// Matchday, match, score, snapshot and result rows.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{LigaError, Result};
use crate::model::matchday::{Match, Matchday, MatchdayResult, MatchdayStatus, SnapshotEntry};
use crate::model::player::Position;
use crate::model::{from_epoch, to_epoch};

// ---------------------------------------------------------------------------
// Matchdays
// ---------------------------------------------------------------------------

const MATCHDAY_COLUMNS: &str = "id, number, starts_at, ends_at, status";

fn matchday_from_row(row: &Row<'_>) -> rusqlite::Result<Matchday> {
    Ok(Matchday {
        id: row.get(0)?,
        number: row.get(1)?,
        starts_at: from_epoch(row.get(2)?),
        ends_at: from_epoch(row.get(3)?),
        status: row.get(4)?,
    })
}

fn query_matchdays<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Matchday>> {
    let mut stmt = conn.prepare(sql)?;
    let matchdays = stmt
        .query_map(params, matchday_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(matchdays)
}

pub fn insert_matchday(
    conn: &Connection,
    number: u32,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> Result<i64> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO matchdays (number, starts_at, ends_at, status)
         VALUES (?1, ?2, ?3, ?4)",
        params![number, to_epoch(starts_at), to_epoch(ends_at), MatchdayStatus::Upcoming],
    )?;
    if inserted == 0 {
        return Err(LigaError::AlreadyExists {
            entity: "matchday",
            detail: format!("number {number}"),
        });
    }
    Ok(conn.last_insert_rowid())
}

pub fn get_matchday(conn: &Connection, id: i64) -> Result<Matchday> {
    conn.query_row(
        &format!("SELECT {MATCHDAY_COLUMNS} FROM matchdays WHERE id = ?1"),
        params![id],
        matchday_from_row,
    )
    .optional()?
    .ok_or_else(|| LigaError::not_found("matchday", id))
}

pub fn find_by_number(conn: &Connection, number: u32) -> Result<Option<Matchday>> {
    Ok(conn
        .query_row(
            &format!("SELECT {MATCHDAY_COLUMNS} FROM matchdays WHERE number = ?1"),
            params![number],
            matchday_from_row,
        )
        .optional()?)
}

pub fn list_matchdays(conn: &Connection) -> Result<Vec<Matchday>> {
    query_matchdays(
        conn,
        &format!("SELECT {MATCHDAY_COLUMNS} FROM matchdays ORDER BY number"),
        [],
    )
}

/// Upcoming matchdays whose kickoff is at or before `now`.
pub fn due_for_freeze(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<Matchday>> {
    query_matchdays(
        conn,
        &format!(
            "SELECT {MATCHDAY_COLUMNS} FROM matchdays
             WHERE status = 'upcoming' AND starts_at <= ?1 ORDER BY number"
        ),
        params![to_epoch(now)],
    )
}

/// Frozen matchdays whose last match ended at or before `now`.
pub fn due_for_payout(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<Matchday>> {
    query_matchdays(
        conn,
        &format!(
            "SELECT {MATCHDAY_COLUMNS} FROM matchdays
             WHERE status = 'frozen' AND ends_at <= ?1 ORDER BY number"
        ),
        params![to_epoch(now)],
    )
}

pub fn set_status(conn: &Connection, matchday_id: i64, status: MatchdayStatus) -> Result<()> {
    conn.execute(
        "UPDATE matchdays SET status = ?2 WHERE id = ?1",
        params![matchday_id, status],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Matches
// ---------------------------------------------------------------------------

/// Insert a fixture, or update its result if the pairing already exists.
pub fn upsert_match(
    conn: &Connection,
    matchday_id: i64,
    home_club_id: i64,
    away_club_id: i64,
    home_goals: Option<u32>,
    away_goals: Option<u32>,
) -> Result<i64> {
    let id: i64 = conn.query_row(
        "INSERT INTO matches (matchday_id, home_club_id, away_club_id, home_goals, away_goals)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(matchday_id, home_club_id, away_club_id) DO UPDATE SET
            home_goals = excluded.home_goals,
            away_goals = excluded.away_goals
         RETURNING id",
        params![matchday_id, home_club_id, away_club_id, home_goals, away_goals],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub fn matches_for(conn: &Connection, matchday_id: i64) -> Result<Vec<Match>> {
    let mut stmt = conn.prepare(
        "SELECT id, matchday_id, home_club_id, away_club_id, home_goals, away_goals
         FROM matches WHERE matchday_id = ?1 ORDER BY id",
    )?;
    let matches = stmt
        .query_map(params![matchday_id], |row| {
            Ok(Match {
                id: row.get(0)?,
                matchday_id: row.get(1)?,
                home_club_id: row.get(2)?,
                away_club_id: row.get(3)?,
                home_goals: row.get(4)?,
                away_goals: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(matches)
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

pub fn upsert_score(conn: &Connection, matchday_id: i64, player_id: i64, points: i64) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO scores (matchday_id, player_id, points) VALUES (?1, ?2, ?3)",
        params![matchday_id, player_id, points],
    )?;
    Ok(())
}

/// Every score recorded for a matchday, keyed by player id.
pub fn scores_for(conn: &Connection, matchday_id: i64) -> Result<HashMap<i64, i64>> {
    let mut stmt = conn.prepare("SELECT player_id, points FROM scores WHERE matchday_id = ?1")?;
    let scores = stmt
        .query_map(params![matchday_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<HashMap<i64, i64>>>()?;
    Ok(scores)
}

// ---------------------------------------------------------------------------
// Lineup snapshots and results
// ---------------------------------------------------------------------------

pub fn insert_snapshot(
    conn: &Connection,
    matchday_id: i64,
    team_id: i64,
    entries: &[SnapshotEntry],
) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO lineup_snapshots (matchday_id, team_id, player_id, position)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for entry in entries {
        stmt.execute(params![matchday_id, team_id, entry.player_id, entry.position])?;
    }
    Ok(())
}

pub fn snapshot_for(conn: &Connection, matchday_id: i64, team_id: i64) -> Result<Vec<SnapshotEntry>> {
    let mut stmt = conn.prepare(
        "SELECT player_id, position FROM lineup_snapshots
         WHERE matchday_id = ?1 AND team_id = ?2 ORDER BY player_id",
    )?;
    let entries = stmt
        .query_map(params![matchday_id, team_id], |row| {
            Ok(SnapshotEntry {
                player_id: row.get(0)?,
                position: row.get::<_, Position>(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

pub fn insert_result(conn: &Connection, result: &MatchdayResult) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO matchday_results
            (matchday_id, team_id, complete, missing, formation, points, payout)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            result.matchday_id,
            result.team_id,
            result.complete,
            result.missing as i64,
            result.formation,
            result.points,
            result.payout,
        ],
    )?;
    Ok(())
}

pub fn results_for(conn: &Connection, matchday_id: i64) -> Result<Vec<MatchdayResult>> {
    let mut stmt = conn.prepare(
        "SELECT matchday_id, team_id, complete, missing, formation, points, payout
         FROM matchday_results WHERE matchday_id = ?1 ORDER BY team_id",
    )?;
    let results = stmt
        .query_map(params![matchday_id], |row| {
            let missing: i64 = row.get(3)?;
            Ok(MatchdayResult {
                matchday_id: row.get(0)?,
                team_id: row.get(1)?,
                complete: row.get(2)?,
                missing: missing as usize,
                formation: row.get(4)?,
                points: row.get(5)?,
                payout: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(results)
}
