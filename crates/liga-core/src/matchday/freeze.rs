// Lineup freeze job: snapshots every team's starters at kickoff.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{matchdays, players, teams, Database};
use crate::error::Result;
use crate::model::lineup::{LineupCheck, PositionCounts};
use crate::model::matchday::{Matchday, MatchdayResult, MatchdayStatus, SnapshotEntry};
use crate::model::notification::NotificationKind;
use crate::notify::notify;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FreezeReport {
    pub matchdays_frozen: usize,
    pub teams_snapshotted: usize,
    pub incomplete_lineups: usize,
    pub failures: usize,
}

/// Freeze every upcoming matchday that has kicked off by `now`.
///
/// Running it again is a no-op: frozen matchdays are no longer upcoming.
pub fn freeze_lineups(db: &Database, config: &Config, now: DateTime<Utc>) -> Result<FreezeReport> {
    let mut report = FreezeReport::default();

    for matchday in db.read(|conn| matchdays::due_for_freeze(conn, now))? {
        match db.transaction(|conn| freeze_matchday(conn, config, &matchday, now)) {
            Ok((team_count, incomplete)) => {
                report.matchdays_frozen += 1;
                report.teams_snapshotted += team_count;
                report.incomplete_lineups += incomplete;
                info!(
                    number = matchday.number,
                    teams = team_count,
                    incomplete,
                    "Matchday lineups frozen"
                );
            }
            Err(e) => {
                warn!(number = matchday.number, "Failed to freeze matchday: {}", e);
                report.failures += 1;
            }
        }
    }
    Ok(report)
}

fn freeze_matchday(
    conn: &Connection,
    config: &Config,
    matchday: &Matchday,
    now: DateTime<Utc>,
) -> Result<(usize, usize)> {
    let allowed = config.lineup.allowed_formations();
    let all_teams = teams::list_all(conn)?;
    let mut incomplete = 0;

    for team in &all_teams {
        let entries: Vec<SnapshotEntry> = players::starters(conn, team.id)?
            .into_iter()
            .map(|p| SnapshotEntry {
                player_id: p.id,
                position: p.position,
            })
            .collect();
        let check = LineupCheck::evaluate(
            PositionCounts::from_positions(entries.iter().map(|e| e.position)),
            &allowed,
        );

        matchdays::insert_snapshot(conn, matchday.id, team.id, &entries)?;
        matchdays::insert_result(
            conn,
            &MatchdayResult {
                matchday_id: matchday.id,
                team_id: team.id,
                complete: check.is_complete(),
                missing: check.missing,
                formation: check.formation.map(|f| f.to_string()),
                points: None,
                payout: None,
            },
        )?;

        if !check.is_complete() {
            incomplete += 1;
            notify(
                conn,
                team.id,
                NotificationKind::LineupIncomplete,
                &format!(
                    "Matchday {} started with {} empty lineup slot(s); each costs {} points",
                    matchday.number, check.missing, config.lineup.missing_player_penalty
                ),
                now,
            )?;
        }
    }

    matchdays::set_status(conn, matchday.id, MatchdayStatus::Frozen)?;
    Ok((all_teams.len(), incomplete))
}
