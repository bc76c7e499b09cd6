// Player market: rotation, bids, offers, settlement and the transfer
// primitive they all end in.

pub mod bids;
pub mod offers;
pub mod rotation;
pub mod settlement;
pub mod transfer;

pub use bids::{cancel_bid, pending_bids, place_bid};
pub use offers::{accept_offer, counter_offer, make_offer, offers_for, reject_offer, withdraw_offer};
pub use rotation::{rotate_market, rotate_market_if_due};
pub use settlement::{settle_market, SettlementReport};

use crate::db::{market, players, Database};
use crate::error::Result;
use crate::model::market::Transfer;
use crate::model::player::{Player, PlayerState};

/// Current market state of a player, derived from ownership, listing and
/// pending bids/offers.
pub fn player_state(db: &Database, player_id: i64) -> Result<PlayerState> {
    db.read(|conn| {
        let player = players::get(conn, player_id)?;
        let bids = market::count_pending_bids(conn, player_id)?;
        let offers = market::count_pending_offers(conn, player_id)?;
        Ok(PlayerState::derive(&player, bids, offers))
    })
}

/// Every player currently on sale, soonest-closing first.
pub fn listings(db: &Database) -> Result<Vec<Player>> {
    db.read(players::market)
}

pub fn recent_transfers(db: &Database, limit: usize) -> Result<Vec<Transfer>> {
    db.read(|conn| market::recent_transfers(conn, limit))
}
