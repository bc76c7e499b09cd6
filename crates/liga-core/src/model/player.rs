// Player records, playing positions and the derived market state.

use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Football positions used for lineup shape checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl Position {
    pub const ALL: [Position; 4] = [
        Position::Goalkeeper,
        Position::Defender,
        Position::Midfielder,
        Position::Forward,
    ];

    /// Parse a position code.
    ///
    /// Accepts the English codes (`GK`, `DEF`, `MID`, `FWD`) and the Spanish
    /// ones used by most data feeds (`POR`, `DEF`, `MED`, `DEL`), case-insensitive.
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "GK" | "POR" | "PORTERO" => Some(Position::Goalkeeper),
            "DEF" | "DF" | "DEFENSA" => Some(Position::Defender),
            "MID" | "MED" | "MF" | "CENTROCAMPISTA" => Some(Position::Midfielder),
            "FWD" | "DEL" | "FW" | "DELANTERO" => Some(Position::Forward),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "GK",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Forward => "FWD",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

impl ToSql for Position {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.display_str()))
    }
}

impl FromSql for Position {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Position::from_str_pos(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown position `{s}`").into()))
    }
}

/// An active sale window on a player.
///
/// System listings (free agents put up by market rotation) have no owner and
/// no asking price. Owner listings carry the seller's asking price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub listed_at: DateTime<Utc>,
    pub listed_until: DateTime<Utc>,
    pub asking_price: Option<i64>,
    /// Whether the bank already answered this stale listing with an offer.
    pub chased: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub club_id: i64,
    pub position: Position,
    /// Market value; the price of a free agent and the base of bank offers.
    pub value: i64,
    pub total_points: i64,
    /// Owning team, `None` for free agents.
    pub team_id: Option<i64>,
    pub starter: bool,
    pub listing: Option<Listing>,
}

impl Player {
    pub fn is_free_agent(&self) -> bool {
        self.team_id.is_none()
    }

    pub fn is_listed(&self) -> bool {
        self.listing.is_some()
    }

    /// Whether the listing window has closed at `now`.
    pub fn listing_expired(&self, now: DateTime<Utc>) -> bool {
        self.listing
            .as_ref()
            .is_some_and(|l| l.listed_until <= now)
    }
}

/// Where a player stands in the market lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    FreeAgent,
    OnMarket,
    UnderBid,
    UnderOffer,
    Owned,
}

impl PlayerState {
    /// Derive the state from the player row and its pending bid/offer counts.
    ///
    /// A listing outranks offers: a listed player is under bid or on the
    /// market even while an offer (such as the bank's) is waiting.
    pub fn derive(player: &Player, pending_bids: usize, pending_offers: usize) -> Self {
        match (player.is_listed(), player.team_id) {
            (true, _) if pending_bids > 0 => PlayerState::UnderBid,
            (true, _) => PlayerState::OnMarket,
            (false, Some(_)) if pending_offers > 0 => PlayerState::UnderOffer,
            (false, None) => PlayerState::FreeAgent,
            (false, Some(_)) => PlayerState::Owned,
        }
    }
}
