// League and club rows.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{LigaError, Result};
use crate::model::league::{Club, League};
use crate::model::{from_epoch, to_epoch};

fn league_from_row(row: &Row<'_>) -> rusqlite::Result<League> {
    Ok(League {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: from_epoch(row.get(2)?),
    })
}

pub fn insert_league(conn: &Connection, name: &str, now: DateTime<Utc>) -> Result<i64> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO leagues (name, created_at) VALUES (?1, ?2)",
        params![name, to_epoch(now)],
    )?;
    if inserted == 0 {
        return Err(LigaError::AlreadyExists {
            entity: "league",
            detail: name.to_string(),
        });
    }
    Ok(conn.last_insert_rowid())
}

pub fn get_league(conn: &Connection, id: i64) -> Result<League> {
    conn.query_row(
        "SELECT id, name, created_at FROM leagues WHERE id = ?1",
        params![id],
        league_from_row,
    )
    .optional()?
    .ok_or_else(|| LigaError::not_found("league", id))
}

pub fn find_league(conn: &Connection, name: &str) -> Result<Option<League>> {
    Ok(conn
        .query_row(
            "SELECT id, name, created_at FROM leagues WHERE name = ?1",
            params![name],
            league_from_row,
        )
        .optional()?)
}

pub fn list_leagues(conn: &Connection) -> Result<Vec<League>> {
    let mut stmt = conn.prepare("SELECT id, name, created_at FROM leagues ORDER BY id")?;
    let leagues = stmt
        .query_map([], league_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(leagues)
}

/// Return the id of the club named `name`, creating it if needed.
pub fn upsert_club(conn: &Connection, name: &str) -> Result<i64> {
    let id: i64 = conn.query_row(
        "INSERT INTO clubs (name) VALUES (?1)
         ON CONFLICT(name) DO UPDATE SET name = excluded.name
         RETURNING id",
        params![name.trim()],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub fn find_club(conn: &Connection, name: &str) -> Result<Option<Club>> {
    Ok(conn
        .query_row(
            "SELECT id, name FROM clubs WHERE name = ?1",
            params![name.trim()],
            |row| {
                Ok(Club {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?)
}
