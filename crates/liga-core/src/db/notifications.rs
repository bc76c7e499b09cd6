// Notification rows.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::error::{LigaError, Result};
use crate::model::notification::{Notification, NotificationKind};
use crate::model::{from_epoch, to_epoch};

const NOTIFICATION_COLUMNS: &str = "id, team_id, kind, message, created_at, read";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        team_id: row.get(1)?,
        kind: row.get(2)?,
        message: row.get(3)?,
        created_at: from_epoch(row.get(4)?),
        read: row.get(5)?,
    })
}

pub fn insert(
    conn: &Connection,
    team_id: i64,
    kind: NotificationKind,
    message: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO notifications (team_id, kind, message, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![team_id, kind, message, to_epoch(now)],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Newest first. `unread_only` filters out notifications already read.
pub fn list(conn: &Connection, team_id: i64, unread_only: bool, limit: usize) -> Result<Vec<Notification>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
         WHERE team_id = ?1 AND (?2 = 0 OR read = 0)
         ORDER BY created_at DESC, id DESC LIMIT ?3"
    ))?;
    let notifications = stmt
        .query_map(params![team_id, unread_only, limit as i64], notification_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(notifications)
}

pub fn mark_read(conn: &Connection, team_id: i64, id: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE notifications SET read = 1 WHERE id = ?1 AND team_id = ?2",
        params![id, team_id],
    )?;
    if updated == 0 {
        return Err(LigaError::not_found("notification", id));
    }
    Ok(())
}

pub fn mark_all_read(conn: &Connection, team_id: i64) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE notifications SET read = 1 WHERE team_id = ?1 AND read = 0",
        params![team_id],
    )?)
}
