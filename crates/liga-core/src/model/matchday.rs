// Matchdays, real-world matches and per-team matchday results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::player::Position;
use super::text_enum;

text_enum! {
    pub enum MatchdayStatus {
        Upcoming => "upcoming",
        /// Lineups snapshotted at kickoff; waiting for the final whistle.
        Frozen => "frozen",
        Scored => "scored",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matchday {
    pub id: i64,
    pub number: u32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: MatchdayStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: i64,
    pub matchday_id: i64,
    pub home_club_id: i64,
    pub away_club_id: i64,
    pub home_goals: Option<u32>,
    pub away_goals: Option<u32>,
}

/// A frozen starter of one team for one matchday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub player_id: i64,
    pub position: Position,
}

/// How a team's frozen lineup fared in a matchday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchdayResult {
    pub matchday_id: i64,
    pub team_id: i64,
    pub complete: bool,
    pub missing: usize,
    pub formation: Option<String>,
    /// Filled in by the payout job.
    pub points: Option<i64>,
    pub payout: Option<i64>,
}
