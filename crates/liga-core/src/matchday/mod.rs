// Matchdays: fixtures, player scores, and the freeze/payout jobs.

pub mod freeze;
pub mod payout;

pub use freeze::{freeze_lineups, FreezeReport};
pub use payout::{settle_matchdays, PayoutReport};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::db::{matchdays, players, Database};
use crate::error::{LigaError, Result};
use crate::model::matchday::{Match, Matchday, MatchdayResult, MatchdayStatus};

pub fn create_matchday(
    db: &Database,
    number: u32,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> Result<Matchday> {
    if ends_at <= starts_at {
        return Err(LigaError::InvalidState(format!(
            "matchday {number} must end after it starts"
        )));
    }
    let matchday = db.transaction(|conn| {
        let id = matchdays::insert_matchday(conn, number, starts_at, ends_at)?;
        matchdays::get_matchday(conn, id)
    })?;
    info!(number, %starts_at, %ends_at, "Matchday created");
    Ok(matchday)
}

/// Record a fixture, or its final score when the goals are known.
pub fn record_match(
    db: &Database,
    matchday_id: i64,
    home_club_id: i64,
    away_club_id: i64,
    goals: Option<(u32, u32)>,
) -> Result<i64> {
    if home_club_id == away_club_id {
        return Err(LigaError::InvalidState("a club cannot play itself".into()));
    }
    db.transaction(|conn| {
        matchdays::get_matchday(conn, matchday_id)?;
        matchdays::upsert_match(
            conn,
            matchday_id,
            home_club_id,
            away_club_id,
            goals.map(|(home, _)| home),
            goals.map(|(_, away)| away),
        )
    })
}

/// Record (or correct) a player's points for a matchday. Refused once the
/// matchday has been paid out.
pub fn record_score(db: &Database, matchday_id: i64, player_id: i64, points: i64) -> Result<()> {
    db.transaction(|conn| {
        let matchday = matchdays::get_matchday(conn, matchday_id)?;
        if matchday.status == MatchdayStatus::Scored {
            return Err(LigaError::InvalidState(format!(
                "matchday {} is already scored",
                matchday.number
            )));
        }
        players::get(conn, player_id)?;
        matchdays::upsert_score(conn, matchday_id, player_id, points)
    })
}

pub fn all_matchdays(db: &Database) -> Result<Vec<Matchday>> {
    db.read(matchdays::list_matchdays)
}

pub fn find_matchday(db: &Database, number: u32) -> Result<Option<Matchday>> {
    db.read(|conn| matchdays::find_by_number(conn, number))
}

pub fn fixtures(db: &Database, matchday_id: i64) -> Result<Vec<Match>> {
    db.read(|conn| matchdays::matches_for(conn, matchday_id))
}

pub fn results(db: &Database, matchday_id: i64) -> Result<Vec<MatchdayResult>> {
    db.read(|conn| matchdays::results_for(conn, matchday_id))
}
