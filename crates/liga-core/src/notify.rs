// Team notifications: written as a side effect of market and matchday
// operations, read back by the team's owner.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;

use crate::db::{notifications, Database};
use crate::error::Result;
use crate::model::notification::{Notification, NotificationKind};

/// Upper bound for `unread`; older unread notifications stay in the table.
const UNREAD_LIMIT: usize = 200;

/// Record a notification for `team_id` on the caller's connection, so it
/// commits or rolls back with the operation that caused it.
pub fn notify(
    conn: &Connection,
    team_id: i64,
    kind: NotificationKind,
    message: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    notifications::insert(conn, team_id, kind, message, now)?;
    debug!(team_id, %kind, "notification: {}", message);
    Ok(())
}

pub fn unread(db: &Database, team_id: i64) -> Result<Vec<Notification>> {
    db.read(|conn| notifications::list(conn, team_id, true, UNREAD_LIMIT))
}

pub fn recent(db: &Database, team_id: i64, limit: usize) -> Result<Vec<Notification>> {
    db.read(|conn| notifications::list(conn, team_id, false, limit))
}

pub fn mark_read(db: &Database, team_id: i64, notification_id: i64) -> Result<()> {
    db.read(|conn| notifications::mark_read(conn, team_id, notification_id))
}

/// Returns how many notifications were marked.
pub fn mark_all_read(db: &Database, team_id: i64) -> Result<usize> {
    db.read(|conn| notifications::mark_all_read(conn, team_id))
}
