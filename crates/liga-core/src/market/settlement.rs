// Market settlement job: resolves closed listings and stale offers.
//
// Each closed listing settles in its own transaction, so one bad listing is
// logged and skipped without undoing the others.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{market, players, teams, Database};
use crate::error::Result;
use crate::market::transfer::{transfer, Deal};
use crate::model::market::{Awaiting, Bid, BidStatus, OfferOrigin, OfferStatus, TransferKind};
use crate::model::notification::NotificationKind;
use crate::model::player::{Listing, Player};
use crate::notify::notify;

/// What happened to one closed listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingOutcome {
    /// A bid won and the player moved.
    Sold,
    /// The best bid was under the asking price and became an offer.
    Escalated,
    /// No bids on an owner listing; the bank made an offer.
    SystemOffer,
    /// No resolution; the listing was taken down.
    Reverted,
    /// Already settled or reopened by the time we got to it.
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettlementReport {
    pub listings_settled: usize,
    pub transfers: usize,
    pub escalations: usize,
    pub system_offers: usize,
    pub reverted: usize,
    pub bids_lost: usize,
    pub offers_expired: usize,
    pub failures: usize,
}

impl SettlementReport {
    fn record(&mut self, outcome: ListingOutcome, bids_lost: usize) {
        self.bids_lost += bids_lost;
        match outcome {
            ListingOutcome::Sold => self.transfers += 1,
            ListingOutcome::Escalated => self.escalations += 1,
            ListingOutcome::SystemOffer => self.system_offers += 1,
            ListingOutcome::Reverted => self.reverted += 1,
            ListingOutcome::Skipped => return,
        }
        self.listings_settled += 1;
    }
}

/// Settle every listing closed at `now`, then expire stale offers.
pub fn settle_market(db: &Database, config: &Config, now: DateTime<Utc>) -> Result<SettlementReport> {
    let mut report = SettlementReport::default();

    let closed = db.read(|conn| players::expired_listings(conn, now))?;
    for player in closed {
        match db.transaction(|conn| settle_listing(conn, config, player.id, now)) {
            Ok((outcome, lost)) => report.record(outcome, lost),
            Err(e) => {
                warn!(player_id = player.id, "Failed to settle listing for {}: {}", player.name, e);
                report.failures += 1;
            }
        }
    }

    report.offers_expired = db.transaction(|conn| expire_offers(conn, now))?;

    info!(
        settled = report.listings_settled,
        transfers = report.transfers,
        escalations = report.escalations,
        system_offers = report.system_offers,
        reverted = report.reverted,
        offers_expired = report.offers_expired,
        failures = report.failures,
        "Market settlement finished"
    );
    Ok(report)
}

/// Resolve one closed listing. Returns the outcome and how many bids lost.
pub fn settle_listing(
    conn: &Connection,
    config: &Config,
    player_id: i64,
    now: DateTime<Utc>,
) -> Result<(ListingOutcome, usize)> {
    let player = players::get(conn, player_id)?;
    let listing = match &player.listing {
        Some(listing) if listing.listed_until <= now => listing.clone(),
        _ => return Ok((ListingOutcome::Skipped, 0)),
    };

    let bids = market::pending_bids_for_player(conn, player.id)?;
    let mut lost = 0;

    if let Some(seller_id) = player.team_id {
        if players::count_by_team(conn, seller_id)? <= config.roster.min_players {
            for bid in &bids {
                lose_bid(conn, &player, bid, "was void: the owner cannot spare the player", now)?;
                lost += 1;
            }
            revert_owner_listing(
                conn,
                &player,
                seller_id,
                &format!(
                    "{} was taken off the market: selling would leave fewer than {} players",
                    player.name, config.roster.min_players
                ),
                now,
            )?;
            return Ok((ListingOutcome::Reverted, lost));
        }
    }

    for (i, bid) in bids.iter().enumerate() {
        let bidder = teams::get(conn, bid.team_id)?;
        let roster = players::count_by_team(conn, bid.team_id)?;
        if bidder.budget < bid.amount || roster >= config.roster.max_players {
            lose_bid(conn, &player, bid, "could not be honoured", now)?;
            lost += 1;
            continue;
        }

        let meets_asking = match (player.team_id, listing.asking_price) {
            (None, _) | (Some(_), None) => true,
            (Some(_), Some(asking)) => bid.amount >= asking,
        };

        market::set_bid_status(
            conn,
            bid.id,
            if meets_asking { BidStatus::Won } else { BidStatus::Escalated },
        )?;
        for other in &bids[i + 1..] {
            lose_bid(conn, &player, other, "was outbid", now)?;
            lost += 1;
        }

        if meets_asking {
            transfer(
                conn,
                config,
                &Deal {
                    player_id: player.id,
                    seller: player.team_id,
                    buyer: Some(bid.team_id),
                    amount: bid.amount,
                    kind: TransferKind::AuctionWin,
                },
                now,
            )?;
            notify(
                conn,
                bid.team_id,
                NotificationKind::BidWon,
                &format!("Your bid of {} won {}", bid.amount, player.name),
                now,
            )?;
            return Ok((ListingOutcome::Sold, lost));
        }

        escalate(conn, config, &player, bid, now)?;
        return Ok((ListingOutcome::Escalated, lost));
    }

    let outcome = match player.team_id {
        None => {
            players::clear_listing(conn, player.id)?;
            ListingOutcome::Reverted
        }
        Some(seller_id) if !listing.chased => {
            chase_with_system_offer(conn, config, &player, seller_id, &listing, now)?;
            ListingOutcome::SystemOffer
        }
        Some(seller_id) => {
            revert_owner_listing(
                conn,
                &player,
                seller_id,
                &format!("{} did not sell and was taken off the market", player.name),
                now,
            )?;
            ListingOutcome::Reverted
        }
    };
    Ok((outcome, lost))
}

/// Expire every pending offer past its deadline. Returns how many expired.
pub fn expire_offers(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
    let stale = market::expired_offers(conn, now)?;
    for offer in &stale {
        market::set_offer_status(conn, offer.id, OfferStatus::Expired)?;
        for team_id in [offer.buyer_team_id, Some(offer.seller_team_id)].into_iter().flatten() {
            notify(
                conn,
                team_id,
                NotificationKind::OfferExpired,
                &format!("The offer of {} expired unanswered", offer.amount),
                now,
            )?;
        }
    }
    Ok(stale.len())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn lose_bid(conn: &Connection, player: &Player, bid: &Bid, why: &str, now: DateTime<Utc>) -> Result<()> {
    market::set_bid_status(conn, bid.id, BidStatus::Lost)?;
    notify(
        conn,
        bid.team_id,
        NotificationKind::BidLost,
        &format!("Your bid of {} for {} {}", bid.amount, player.name, why),
        now,
    )
}

/// Take an owner listing off the market; the bank's offer on it expires.
fn revert_owner_listing(
    conn: &Connection,
    player: &Player,
    seller_id: i64,
    message: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    players::clear_listing(conn, player.id)?;
    for offer in market::pending_offers_for_player(conn, player.id)? {
        if offer.origin == OfferOrigin::System {
            market::set_offer_status(conn, offer.id, OfferStatus::Expired)?;
        }
    }
    notify(conn, seller_id, NotificationKind::ListingExpired, message, now)
}

/// Turn an under-asking bid into an offer the seller has to answer.
fn escalate(
    conn: &Connection,
    config: &Config,
    player: &Player,
    bid: &Bid,
    now: DateTime<Utc>,
) -> Result<()> {
    let seller_id = match player.team_id {
        Some(id) => id,
        None => return Ok(()),
    };
    players::clear_listing(conn, player.id)?;
    market::insert_offer(
        conn,
        &market::NewOffer {
            player_id: player.id,
            buyer_team_id: Some(bid.team_id),
            seller_team_id: seller_id,
            amount: bid.amount,
            origin: OfferOrigin::FromBid,
            awaiting: Awaiting::Seller,
            parent_id: None,
            created_at: now,
            expires_at: now + Duration::hours(config.market.offer_expiry_hours),
        },
    )?;
    notify(
        conn,
        seller_id,
        NotificationKind::OfferReceived,
        &format!("Best bid for {} was {}, under your asking price", player.name, bid.amount),
        now,
    )?;
    notify(
        conn,
        bid.team_id,
        NotificationKind::BidEscalated,
        &format!("Your bid of {} for {} was sent to the owner as an offer", bid.amount, player.name),
        now,
    )?;
    info!(player_id = player.id, amount = bid.amount, "Bid escalated to offer");
    Ok(())
}

/// Unsold owner listing: the bank offers a share of the player's value and
/// the listing gets one more window.
fn chase_with_system_offer(
    conn: &Connection,
    config: &Config,
    player: &Player,
    seller_id: i64,
    listing: &Listing,
    now: DateTime<Utc>,
) -> Result<()> {
    let amount = system_offer_amount(player.value, config.market.system_offer_ratio);
    let listed_until = now + Duration::hours(config.market.listing_hours);

    players::set_listing(
        conn,
        player.id,
        &Listing {
            listed_at: listing.listed_at,
            listed_until,
            asking_price: listing.asking_price,
            chased: true,
        },
    )?;
    market::insert_offer(
        conn,
        &market::NewOffer {
            player_id: player.id,
            buyer_team_id: None,
            seller_team_id: seller_id,
            amount,
            origin: OfferOrigin::System,
            awaiting: Awaiting::Seller,
            parent_id: None,
            created_at: now,
            expires_at: listed_until,
        },
    )?;
    notify(
        conn,
        seller_id,
        NotificationKind::SystemOffer,
        &format!("No bids for {}; the league offers {}", player.name, amount),
        now,
    )?;
    info!(player_id = player.id, amount, "System offer made");
    Ok(())
}

pub fn system_offer_amount(value: i64, ratio: f64) -> i64 {
    (value as f64 * ratio).round() as i64
}
