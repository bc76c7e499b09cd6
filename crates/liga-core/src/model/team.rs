use serde::{Deserialize, Serialize};

/// A user's roster in one league.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub league_id: i64,
    /// Username of the owning account.
    pub owner: String,
    pub name: String,
    pub budget: i64,
    /// Points accumulated over all scored matchdays.
    pub points: i64,
}

/// One row of a league table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub rank: usize,
    pub team_id: i64,
    pub team_name: String,
    pub owner: String,
    pub points: i64,
    pub budget: i64,
}
