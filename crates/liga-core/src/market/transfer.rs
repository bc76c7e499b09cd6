// The one place a player changes hands.
//
// Every sale path (market purchase, auction win, accepted offer, sale to the
// bank) ends here, always on a connection that is inside a transaction.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::info;

use crate::config::Config;
use crate::db::{market, players, teams};
use crate::error::{LigaError, Result};
use crate::model::market::{BidStatus, OfferStatus, Transfer, TransferKind};
use crate::model::notification::NotificationKind;
use crate::notify::notify;

/// A sale about to happen. `None` on either side is the bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deal {
    pub player_id: i64,
    pub seller: Option<i64>,
    pub buyer: Option<i64>,
    pub amount: i64,
    pub kind: TransferKind,
}

/// Selling `player_id` must leave `team_id` with at least `min_players`,
/// counting its other listed players as already gone.
pub(crate) fn ensure_keeps_minimum(
    conn: &Connection,
    config: &Config,
    team_id: i64,
    player_id: i64,
) -> Result<()> {
    let count = players::count_by_team(conn, team_id)?;
    let listed = players::listed_count_by_team(conn, team_id, Some(player_id))?;
    if count.saturating_sub(listed) <= config.roster.min_players {
        return Err(LigaError::RosterTooSmall {
            min: config.roster.min_players,
        });
    }
    Ok(())
}

/// Move the player and the money for `deal`.
///
/// Re-checks that the seller still owns the player and that the buyer can
/// pay and has a free roster slot. The player lands on the buyer's bench
/// with no listing; every bid or offer on it still pending is cancelled and
/// its team notified.
pub fn transfer(conn: &Connection, config: &Config, deal: &Deal, now: DateTime<Utc>) -> Result<Transfer> {
    let player = players::get(conn, deal.player_id)?;

    if player.team_id != deal.seller {
        return Err(match deal.seller {
            Some(team_id) => LigaError::NotOwner {
                team_id,
                player_id: player.id,
            },
            None => LigaError::unavailable(player.id, "already owned by a team"),
        });
    }
    if deal.buyer.is_some() && deal.buyer == deal.seller {
        return Err(LigaError::InvalidState(format!(
            "team cannot buy its own player {}",
            player.id
        )));
    }
    if deal.amount < 0 {
        return Err(LigaError::InvalidAmount(deal.amount));
    }

    if let Some(buyer_id) = deal.buyer {
        let buyer = teams::get(conn, buyer_id)?;
        if buyer.budget < deal.amount {
            return Err(LigaError::InsufficientBudget {
                needed: deal.amount,
                available: buyer.budget,
            });
        }
        if players::count_by_team(conn, buyer_id)? >= config.roster.max_players {
            return Err(LigaError::RosterFull {
                max: config.roster.max_players,
            });
        }
        teams::adjust_budget(conn, buyer_id, -deal.amount)?;
    }
    if let Some(seller_id) = deal.seller {
        teams::adjust_budget(conn, seller_id, deal.amount)?;
    }

    players::set_owner(conn, player.id, deal.buyer)?;

    for bid in market::pending_bids_for_player(conn, player.id)? {
        market::set_bid_status(conn, bid.id, BidStatus::Cancelled)?;
        notify(
            conn,
            bid.team_id,
            NotificationKind::BidLost,
            &format!("{} was transferred; your bid of {} was cancelled", player.name, bid.amount),
            now,
        )?;
    }
    for offer in market::pending_offers_for_player(conn, player.id)? {
        market::set_offer_status(conn, offer.id, OfferStatus::Cancelled)?;
        for team_id in [offer.buyer_team_id, Some(offer.seller_team_id)]
            .into_iter()
            .flatten()
            .filter(|t| Some(*t) != deal.seller && Some(*t) != deal.buyer)
        {
            notify(
                conn,
                team_id,
                NotificationKind::OfferCancelled,
                &format!("{} was transferred; the offer of {} is void", player.name, offer.amount),
                now,
            )?;
        }
    }

    let record = market::insert_transfer(
        conn,
        player.id,
        deal.seller,
        deal.buyer,
        deal.amount,
        deal.kind,
        now,
    )?;

    if let Some(buyer_id) = deal.buyer {
        notify(
            conn,
            buyer_id,
            NotificationKind::PlayerBought,
            &format!("You signed {} for {}", player.name, deal.amount),
            now,
        )?;
    }
    if let Some(seller_id) = deal.seller {
        notify(
            conn,
            seller_id,
            NotificationKind::PlayerSold,
            &format!("You sold {} for {}", player.name, deal.amount),
            now,
        )?;
    }

    info!(
        player_id = player.id,
        seller = ?deal.seller,
        buyer = ?deal.buyer,
        amount = deal.amount,
        kind = %deal.kind,
        "Transfer completed: {}",
        player.name
    );
    Ok(record)
}
