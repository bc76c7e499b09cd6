// Direct offers between teams, counter-offers, and the bank's offers.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use tracing::info;

use crate::config::Config;
use crate::db::{market, players, teams, Database};
use crate::error::{LigaError, Result};
use crate::market::transfer::{ensure_keeps_minimum, transfer, Deal};
use crate::model::market::{Awaiting, Offer, OfferOrigin, OfferStatus, Transfer, TransferKind};
use crate::model::notification::NotificationKind;
use crate::notify::notify;

/// Offer to buy a player another team owns. The seller has to answer.
pub fn make_offer(
    db: &Database,
    config: &Config,
    buyer_id: i64,
    player_id: i64,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<Offer> {
    if amount <= 0 {
        return Err(LigaError::InvalidAmount(amount));
    }

    db.transaction(|conn| {
        let player = players::get(conn, player_id)?;
        let seller_id = player
            .team_id
            .ok_or_else(|| LigaError::unavailable(player_id, "not owned by a team"))?;
        if seller_id == buyer_id {
            return Err(LigaError::unavailable(player_id, "already on your roster"));
        }
        let already_offered = market::pending_offers_for_player(conn, player_id)?
            .iter()
            .any(|o| o.buyer_team_id == Some(buyer_id));
        if already_offered {
            return Err(LigaError::AlreadyExists {
                entity: "offer",
                detail: format!("pending offer by team {buyer_id} for player {player_id}"),
            });
        }
        ensure_buyer_can_commit(conn, config, buyer_id, player_id, amount)?;

        let offer = market::insert_offer(
            conn,
            &market::NewOffer {
                player_id,
                buyer_team_id: Some(buyer_id),
                seller_team_id: seller_id,
                amount,
                origin: OfferOrigin::Direct,
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
            &format!("Offer of {} received for {}", amount, player.name),
            now,
        )?;
        info!(buyer_id, seller_id, player_id, amount, "Offer made for {}", player.name);
        Ok(offer)
    })
}

/// Accept a pending offer awaiting `team_id`'s answer and transfer the player.
///
/// Fails and leaves the offer pending when the buyer can no longer pay or
/// has no roster slot, when the seller no longer owns the player, or when the
/// sale would leave the seller short of players.
pub fn accept_offer(
    db: &Database,
    config: &Config,
    team_id: i64,
    offer_id: i64,
    now: DateTime<Utc>,
) -> Result<Transfer> {
    db.transaction(|conn| {
        let offer = awaiting_offer(conn, team_id, offer_id, now)?;
        let player = players::get(conn, offer.player_id)?;
        ensure_keeps_minimum(conn, config, offer.seller_team_id, offer.player_id)?;

        market::set_offer_status(conn, offer.id, OfferStatus::Accepted)?;
        let kind = match offer.buyer_team_id {
            Some(_) => TransferKind::OfferAccepted,
            None => TransferKind::SystemBuyout,
        };
        let record = transfer(
            conn,
            config,
            &Deal {
                player_id: offer.player_id,
                seller: Some(offer.seller_team_id),
                buyer: offer.buyer_team_id,
                amount: offer.amount,
                kind,
            },
            now,
        )?;

        if let Some(proposer) = offer.proposing_team() {
            notify(
                conn,
                proposer,
                NotificationKind::OfferAccepted,
                &format!("Your offer of {} for {} was accepted", offer.amount, player.name),
                now,
            )?;
        }
        Ok(record)
    })
}

pub fn reject_offer(db: &Database, team_id: i64, offer_id: i64, now: DateTime<Utc>) -> Result<()> {
    db.transaction(|conn| {
        let offer = awaiting_offer(conn, team_id, offer_id, now)?;
        market::set_offer_status(conn, offer.id, OfferStatus::Rejected)?;
        if let Some(proposer) = offer.proposing_team() {
            notify(
                conn,
                proposer,
                NotificationKind::OfferRejected,
                &format!("Your offer of {} was rejected", offer.amount),
                now,
            )?;
        }
        info!(team_id, offer_id, "Offer rejected");
        Ok(())
    })
}

/// Answer a pending offer with a new amount. The original is marked
/// countered and the new offer waits on the other side.
pub fn counter_offer(
    db: &Database,
    config: &Config,
    team_id: i64,
    offer_id: i64,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<Offer> {
    if amount <= 0 {
        return Err(LigaError::InvalidAmount(amount));
    }

    db.transaction(|conn| {
        let offer = awaiting_offer(conn, team_id, offer_id, now)?;
        let buyer_id = offer
            .buyer_team_id
            .ok_or_else(|| LigaError::InvalidState("offers from the bank cannot be countered".into()))?;

        market::set_offer_status(conn, offer.id, OfferStatus::Countered)?;
        if offer.awaiting == Awaiting::Buyer {
            ensure_buyer_can_commit(conn, config, buyer_id, offer.player_id, amount)?;
        }

        let counter = market::insert_offer(
            conn,
            &market::NewOffer {
                player_id: offer.player_id,
                buyer_team_id: Some(buyer_id),
                seller_team_id: offer.seller_team_id,
                amount,
                origin: OfferOrigin::Counter,
                awaiting: offer.awaiting.flipped(),
                parent_id: Some(offer.id),
                created_at: now,
                expires_at: now + Duration::hours(config.market.offer_expiry_hours),
            },
        )?;
        if let Some(other) = counter.awaiting_team() {
            notify(
                conn,
                other,
                NotificationKind::OfferCountered,
                &format!("Offer of {} countered with {}", offer.amount, amount),
                now,
            )?;
        }
        info!(team_id, offer_id, amount, counter_id = counter.id, "Offer countered");
        Ok(counter)
    })
}

/// Withdraw a pending offer the team itself proposed.
pub fn withdraw_offer(db: &Database, team_id: i64, offer_id: i64, now: DateTime<Utc>) -> Result<()> {
    db.transaction(|conn| {
        let offer = market::get_offer(conn, offer_id)?;
        if offer.proposing_team() != Some(team_id) {
            return Err(LigaError::not_found("offer", offer_id));
        }
        if offer.status != OfferStatus::Pending {
            return Err(LigaError::InvalidState(format!(
                "offer {offer_id} is already {}",
                offer.status
            )));
        }
        market::set_offer_status(conn, offer.id, OfferStatus::Withdrawn)?;
        if let Some(other) = offer.awaiting_team() {
            notify(
                conn,
                other,
                NotificationKind::OfferWithdrawn,
                &format!("The offer of {} was withdrawn", offer.amount),
                now,
            )?;
        }
        info!(team_id, offer_id, "Offer withdrawn");
        Ok(())
    })
}

/// Pending offers the team is part of, as buyer or seller.
pub fn offers_for(db: &Database, team_id: i64) -> Result<Vec<Offer>> {
    db.read(|conn| market::pending_offers_for_team(conn, team_id))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load an offer that is pending, unexpired and waiting on `team_id`.
fn awaiting_offer(conn: &Connection, team_id: i64, offer_id: i64, now: DateTime<Utc>) -> Result<Offer> {
    let offer = market::get_offer(conn, offer_id)?;
    if offer.awaiting_team() != Some(team_id) {
        return Err(LigaError::not_found("offer", offer_id));
    }
    if offer.status != OfferStatus::Pending {
        return Err(LigaError::InvalidState(format!(
            "offer {offer_id} is already {}",
            offer.status
        )));
    }
    if offer.expires_at <= now {
        return Err(LigaError::InvalidState(format!("offer {offer_id} has expired")));
    }
    Ok(offer)
}

fn ensure_buyer_can_commit(
    conn: &Connection,
    config: &Config,
    buyer_id: i64,
    player_id: i64,
    amount: i64,
) -> Result<()> {
    let available = teams::available_funds(conn, buyer_id, Some(player_id))?;
    if amount > available {
        return Err(LigaError::InsufficientBudget {
            needed: amount,
            available,
        });
    }
    if players::count_by_team(conn, buyer_id)? >= config.roster.max_players {
        return Err(LigaError::RosterFull {
            max: config.roster.max_players,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::db::test_support::*;
    use crate::model::player::Position;

    struct Fixture {
        db: Database,
        config: Config,
        buyer: i64,
        seller: i64,
        player: i64,
    }

    fn fixture() -> Fixture {
        let db = test_db();
        let (buyer, seller, player) = db
            .transaction(|conn| {
                let league = seed_league(conn);
                let buyer = seed_team(conn, league, "ana", 500);
                let seller = seed_team(conn, league, "ben", 100);
                let player = seed_owned(conn, seller, "Pedri", Position::Midfielder, 80, true);
                seed_owned(conn, seller, "Ferran", Position::Forward, 80, false);
                seed_owned(conn, seller, "Araujo", Position::Defender, 80, false);
                Ok((buyer, seller, player))
            })
            .unwrap();
        Fixture {
            db,
            config: test_config(),
            buyer,
            seller,
            player,
        }
    }

    #[test]
    fn accept_transfers_player_and_money() {
        let f = fixture();
        let offer = make_offer(&f.db, &f.config, f.buyer, f.player, 200, t0()).unwrap();
        assert_eq!(offer.awaiting_team(), Some(f.seller));

        let record = accept_offer(&f.db, &f.config, f.seller, offer.id, t0()).unwrap();
        assert_eq!(record.kind, TransferKind::OfferAccepted);

        f.db.read(|conn| {
            assert_eq!(players::get(conn, f.player)?.team_id, Some(f.buyer));
            assert_eq!(teams::get(conn, f.buyer)?.budget, 300);
            assert_eq!(teams::get(conn, f.seller)?.budget, 300);
            assert_eq!(market::get_offer(conn, offer.id)?.status, OfferStatus::Accepted);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn only_awaiting_side_can_answer() {
        let f = fixture();
        let offer = make_offer(&f.db, &f.config, f.buyer, f.player, 200, t0()).unwrap();
        let err = accept_offer(&f.db, &f.config, f.buyer, offer.id, t0()).unwrap_err();
        assert!(matches!(err, LigaError::NotFound { entity: "offer", .. }));
    }

    #[test]
    fn cannot_offer_for_own_or_free_player() {
        let f = fixture();
        let own = make_offer(&f.db, &f.config, f.seller, f.player, 10, t0()).unwrap_err();
        assert!(matches!(own, LigaError::PlayerUnavailable { .. }));

        let free = f
            .db
            .transaction(|conn| Ok(seed_player(conn, "Loose", Position::Forward, 10)))
            .unwrap();
        let err = make_offer(&f.db, &f.config, f.buyer, free, 10, t0()).unwrap_err();
        assert!(matches!(err, LigaError::PlayerUnavailable { .. }));
    }

    #[test]
    fn second_offer_from_same_buyer_is_rejected() {
        let f = fixture();
        make_offer(&f.db, &f.config, f.buyer, f.player, 100, t0()).unwrap();
        let err = make_offer(&f.db, &f.config, f.buyer, f.player, 150, t0()).unwrap_err();
        assert!(matches!(err, LigaError::AlreadyExists { entity: "offer", .. }));
    }

    #[test]
    fn counter_flips_awaiting_side_and_links_parent() {
        let f = fixture();
        let offer = make_offer(&f.db, &f.config, f.buyer, f.player, 100, t0()).unwrap();
        let counter = counter_offer(&f.db, &f.config, f.seller, offer.id, 180, t0()).unwrap();

        assert_eq!(counter.parent_id, Some(offer.id));
        assert_eq!(counter.origin, OfferOrigin::Counter);
        assert_eq!(counter.awaiting_team(), Some(f.buyer));

        let record = accept_offer(&f.db, &f.config, f.buyer, counter.id, t0()).unwrap();
        assert_eq!(record.amount, 180);
        let parent_status = f.db.read(|conn| market::get_offer(conn, offer.id)).unwrap().status;
        assert_eq!(parent_status, OfferStatus::Countered);
    }

    #[test]
    fn accept_fails_and_stays_pending_when_buyer_is_broke() {
        let f = fixture();
        let offer = make_offer(&f.db, &f.config, f.buyer, f.player, 400, t0()).unwrap();
        f.db.read(|conn| teams::adjust_budget(conn, f.buyer, -200)).unwrap();

        let err = accept_offer(&f.db, &f.config, f.seller, offer.id, t0()).unwrap_err();
        assert!(matches!(err, LigaError::InsufficientBudget { .. }));
        let status = f.db.read(|conn| market::get_offer(conn, offer.id)).unwrap().status;
        assert_eq!(status, OfferStatus::Pending);
    }

    #[test]
    fn accept_refused_when_seller_would_drop_below_minimum() {
        let mut f = fixture();
        f.config.roster.min_players = 3;
        let offer = make_offer(&f.db, &f.config, f.buyer, f.player, 100, t0()).unwrap();
        let err = accept_offer(&f.db, &f.config, f.seller, offer.id, t0()).unwrap_err();
        assert!(matches!(err, LigaError::RosterTooSmall { min: 3 }));
    }

    #[test]
    fn accept_counts_the_sellers_other_listings() {
        let f = fixture();
        // ben: three players, min_players = 2, and Ferran already listed.
        let ferran = f
            .db
            .transaction(|conn| {
                let club = crate::db::leagues::find_club(conn, "Club Test")?.unwrap();
                let ferran = players::find(conn, "Ferran", club.id)?.unwrap().id;
                Ok(ferran)
            })
            .unwrap();
        crate::roster::list_player(&f.db, &f.config, f.seller, ferran, 150, t0()).unwrap();

        let offer = make_offer(&f.db, &f.config, f.buyer, f.player, 100, t0()).unwrap();
        let err = accept_offer(&f.db, &f.config, f.seller, offer.id, t0()).unwrap_err();
        assert!(matches!(err, LigaError::RosterTooSmall { min: 2 }));
        let status = f.db.read(|conn| market::get_offer(conn, offer.id)).unwrap().status;
        assert_eq!(status, OfferStatus::Pending);

        // An offer for the listed player itself can still be taken.
        let for_listed = make_offer(&f.db, &f.config, f.buyer, ferran, 120, t0()).unwrap();
        accept_offer(&f.db, &f.config, f.seller, for_listed.id, t0()).unwrap();
    }

    #[test]
    fn bank_offers_cannot_be_countered() {
        let f = fixture();
        let bank = f
            .db
            .transaction(|conn| {
                market::insert_offer(
                    conn,
                    &market::NewOffer {
                        player_id: f.player,
                        buyer_team_id: None,
                        seller_team_id: f.seller,
                        amount: 40,
                        origin: OfferOrigin::System,
                        awaiting: Awaiting::Seller,
                        parent_id: None,
                        created_at: t0(),
                        expires_at: t0() + Duration::hours(24),
                    },
                )
            })
            .unwrap();

        let err = counter_offer(&f.db, &f.config, f.seller, bank.id, 90, t0()).unwrap_err();
        assert!(matches!(err, LigaError::InvalidState(_)));
        let status = f.db.read(|conn| market::get_offer(conn, bank.id)).unwrap().status;
        assert_eq!(status, OfferStatus::Pending);
    }

    #[test]
    fn expired_offer_cannot_be_accepted() {
        let f = fixture();
        let offer = make_offer(&f.db, &f.config, f.buyer, f.player, 100, t0()).unwrap();
        let late = t0() + Duration::hours(f.config.market.offer_expiry_hours);
        let err = accept_offer(&f.db, &f.config, f.seller, offer.id, late).unwrap_err();
        assert!(matches!(err, LigaError::InvalidState(_)));
    }

    #[test]
    fn reject_and_withdraw_notify_the_other_side() {
        let f = fixture();
        let first = make_offer(&f.db, &f.config, f.buyer, f.player, 100, t0()).unwrap();
        reject_offer(&f.db, f.seller, first.id, t0()).unwrap();

        let second = make_offer(&f.db, &f.config, f.buyer, f.player, 120, t0()).unwrap();
        assert!(matches!(
            withdraw_offer(&f.db, f.seller, second.id, t0()).unwrap_err(),
            LigaError::NotFound { .. }
        ));
        withdraw_offer(&f.db, f.buyer, second.id, t0()).unwrap();

        assert!(offers_for(&f.db, f.buyer).unwrap().is_empty());
        let buyer_inbox = crate::notify::unread(&f.db, f.buyer).unwrap();
        assert_eq!(buyer_inbox[0].kind, NotificationKind::OfferRejected);
        let seller_inbox = crate::notify::unread(&f.db, f.seller).unwrap();
        assert!(seller_inbox.iter().any(|n| n.kind == NotificationKind::OfferWithdrawn));
    }
}
