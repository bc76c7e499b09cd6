// Error types shared by every rule-enforcing operation in the crate.

use thiserror::Error;

/// Every way a league operation can be refused or fail.
///
/// Rule violations carry enough context to be shown to the user as-is;
/// storage failures wrap the underlying SQLite / JSON error.
#[derive(Debug, Error)]
pub enum LigaError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{entity} already exists: {detail}")]
    AlreadyExists { entity: &'static str, detail: String },

    #[error("insufficient budget: need {needed}, available {available}")]
    InsufficientBudget { needed: i64, available: i64 },

    #[error("roster full: {max} players maximum")]
    RosterFull { max: usize },

    #[error("roster would drop below {min} players")]
    RosterTooSmall { min: usize },

    #[error("team {team_id} does not own player {player_id}")]
    NotOwner { team_id: i64, player_id: i64 },

    #[error("player {player_id} is not available: {reason}")]
    PlayerUnavailable { player_id: i64, reason: String },

    #[error("bid of {amount} is below the minimum of {minimum}")]
    BidTooLow { amount: i64, minimum: i64 },

    #[error("invalid lineup: {0}")]
    InvalidLineup(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LigaError>;

impl LigaError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        LigaError::NotFound { entity, id }
    }

    pub(crate) fn unavailable(player_id: i64, reason: impl Into<String>) -> Self {
        LigaError::PlayerUnavailable {
            player_id,
            reason: reason.into(),
        }
    }
}
