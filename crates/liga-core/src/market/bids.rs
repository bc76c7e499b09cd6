// Sealed bids on listed players.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::Config;
use crate::db::{market, players, teams, Database};
use crate::error::{LigaError, Result};
use crate::model::market::{Bid, BidStatus};

/// Place a bid, or raise/lower the team's existing bid on the same player.
///
/// Free-agent listings need at least the player's value; owner listings take
/// any positive amount (settlement compares it with the asking price). The
/// bid plus everything else the team has committed must fit its budget.
pub fn place_bid(
    db: &Database,
    config: &Config,
    team_id: i64,
    player_id: i64,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<Bid> {
    if amount <= 0 {
        return Err(LigaError::InvalidAmount(amount));
    }

    db.transaction(|conn| {
        let player = players::get(conn, player_id)?;
        if player.listing.is_none() {
            return Err(LigaError::unavailable(player_id, "not on the market"));
        }
        if player.listing_expired(now) {
            return Err(LigaError::unavailable(player_id, "listing already closed"));
        }
        if player.team_id == Some(team_id) {
            return Err(LigaError::unavailable(player_id, "already on your roster"));
        }
        if player.is_free_agent() && amount < player.value {
            return Err(LigaError::BidTooLow {
                amount,
                minimum: player.value,
            });
        }

        let available = teams::available_funds(conn, team_id, Some(player_id))?;
        if amount > available {
            return Err(LigaError::InsufficientBudget {
                needed: amount,
                available,
            });
        }
        if players::count_by_team(conn, team_id)? >= config.roster.max_players {
            return Err(LigaError::RosterFull {
                max: config.roster.max_players,
            });
        }

        let bid_id = match market::find_pending_bid(conn, player_id, team_id)? {
            Some(existing) => {
                market::replace_bid(conn, existing.id, amount, now)?;
                existing.id
            }
            None => market::insert_bid(conn, player_id, team_id, amount, now)?,
        };

        info!(team_id, player_id, amount, "Bid placed on {}", player.name);
        market::get_bid(conn, bid_id)
    })
}

pub fn cancel_bid(db: &Database, team_id: i64, bid_id: i64) -> Result<()> {
    db.transaction(|conn| {
        let bid = market::get_bid(conn, bid_id)?;
        if bid.team_id != team_id {
            return Err(LigaError::not_found("bid", bid_id));
        }
        if bid.status != BidStatus::Pending {
            return Err(LigaError::InvalidState(format!(
                "bid {bid_id} is already {}",
                bid.status
            )));
        }
        market::set_bid_status(conn, bid_id, BidStatus::Cancelled)?;
        info!(team_id, bid_id, "Bid cancelled");
        Ok(())
    })
}

pub fn pending_bids(db: &Database, team_id: i64) -> Result<Vec<Bid>> {
    db.read(|conn| market::pending_bids_for_team(conn, team_id))
}
