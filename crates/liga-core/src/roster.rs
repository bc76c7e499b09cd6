// Roster mutations: team creation, buy-now, sale to the bank, listings and
// lineup edits.

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{leagues, market, players, teams, Database};
use crate::error::{LigaError, Result};
use crate::market::transfer::{ensure_keeps_minimum, transfer, Deal};
use crate::model::lineup::{Formation, LineupCheck, PositionCounts, STARTERS};
use crate::model::market::{OfferOrigin, OfferStatus, Transfer, TransferKind};
use crate::model::player::{Listing, Player, Position};
use crate::model::team::Team;

// ---------------------------------------------------------------------------
// Team creation
// ---------------------------------------------------------------------------

/// Create a team for `owner` with the configured budget and deal it a random
/// starting squad from the free agents not on the market.
pub fn create_team<R: Rng + ?Sized>(
    db: &Database,
    config: &Config,
    league_id: i64,
    owner: &str,
    name: &str,
    rng: &mut R,
) -> Result<Team> {
    let team = db.transaction(|conn| {
        leagues::get_league(conn, league_id)?;
        let team_id = teams::insert(conn, league_id, owner, name, config.league.initial_budget)?;
        let squad = deal_squad(conn, config, team_id, rng)?;

        let allowed = config.lineup.allowed_formations();
        match pick_starting_eleven(&squad, &allowed) {
            Some(eleven) => {
                for id in eleven {
                    players::set_starter(conn, id, true)?;
                }
            }
            None => warn!(team_id, "Dealt squad cannot field a full eleven; no starters set"),
        }
        teams::get(conn, team_id)
    })?;

    info!(team_id = team.id, league_id, owner, "Team created: {}", team.name);
    Ok(team)
}

fn deal_squad<R: Rng + ?Sized>(
    conn: &Connection,
    config: &Config,
    team_id: i64,
    rng: &mut R,
) -> Result<Vec<Player>> {
    let squad_config = &config.roster.starting_squad;
    let wanted = [
        (Position::Goalkeeper, squad_config.goalkeepers),
        (Position::Defender, squad_config.defenders),
        (Position::Midfielder, squad_config.midfielders),
        (Position::Forward, squad_config.forwards),
    ];

    let mut squad = Vec::new();
    for (position, count) in wanted {
        let mut pool = players::unlisted_free_agents(conn, Some(position))?;
        if pool.len() < count {
            warn!(
                team_id,
                %position,
                wanted = count,
                available = pool.len(),
                "Player pool too short for starting squad"
            );
        }
        pool.shuffle(rng);
        for player in pool.into_iter().take(count) {
            players::set_owner(conn, player.id, Some(team_id))?;
            squad.push(player);
        }
    }
    Ok(squad)
}

/// First allowed formation the squad can field, as the ids of its eleven.
fn pick_starting_eleven(squad: &[Player], allowed: &[Formation]) -> Option<Vec<i64>> {
    let by_position = |pos: Position| -> Vec<i64> {
        squad.iter().filter(|p| p.position == pos).map(|p| p.id).collect()
    };
    let goalkeepers = by_position(Position::Goalkeeper);
    let defenders = by_position(Position::Defender);
    let midfielders = by_position(Position::Midfielder);
    let forwards = by_position(Position::Forward);

    let formation = allowed.iter().find(|f| {
        !goalkeepers.is_empty()
            && defenders.len() >= f.defenders
            && midfielders.len() >= f.midfielders
            && forwards.len() >= f.forwards
    })?;

    let mut eleven = vec![goalkeepers[0]];
    eleven.extend(&defenders[..formation.defenders]);
    eleven.extend(&midfielders[..formation.midfielders]);
    eleven.extend(&forwards[..formation.forwards]);
    Some(eleven)
}

// ---------------------------------------------------------------------------
// Buying and selling
// ---------------------------------------------------------------------------

/// Buy a free agent on the system market outright at its value.
pub fn sign_player(
    db: &Database,
    config: &Config,
    team_id: i64,
    player_id: i64,
    now: DateTime<Utc>,
) -> Result<Transfer> {
    db.transaction(|conn| {
        let player = players::get(conn, player_id)?;
        if !player.is_free_agent() || !player.is_listed() || player.listing_expired(now) {
            return Err(LigaError::unavailable(player_id, "not a free agent on the market"));
        }
        if market::count_pending_bids(conn, player_id)? > 0 {
            return Err(LigaError::unavailable(player_id, "has pending bids"));
        }
        let available = teams::available_funds(conn, team_id, Some(player_id))?;
        if player.value > available {
            return Err(LigaError::InsufficientBudget {
                needed: player.value,
                available,
            });
        }
        transfer(
            conn,
            config,
            &Deal {
                player_id,
                seller: None,
                buyer: Some(team_id),
                amount: player.value,
                kind: TransferKind::MarketPurchase,
            },
            now,
        )
    })
}

/// Sell a player straight to the bank at its value.
pub fn sell_player(
    db: &Database,
    config: &Config,
    team_id: i64,
    player_id: i64,
    now: DateTime<Utc>,
) -> Result<Transfer> {
    db.transaction(|conn| {
        let player = owned_player(conn, team_id, player_id)?;
        ensure_keeps_minimum(conn, config, team_id, player_id)?;
        if market::count_pending_bids(conn, player_id)? > 0 {
            return Err(LigaError::unavailable(player_id, "has pending bids"));
        }
        transfer(
            conn,
            config,
            &Deal {
                player_id,
                seller: Some(team_id),
                buyer: None,
                amount: player.value,
                kind: TransferKind::SaleToBank,
            },
            now,
        )
    })
}

/// Put an owned player on the market for `listing_hours` at `asking_price`.
/// A listed starter keeps playing until it is sold.
pub fn list_player(
    db: &Database,
    config: &Config,
    team_id: i64,
    player_id: i64,
    asking_price: i64,
    now: DateTime<Utc>,
) -> Result<Player> {
    if asking_price <= 0 {
        return Err(LigaError::InvalidAmount(asking_price));
    }

    db.transaction(|conn| {
        let player = owned_player(conn, team_id, player_id)?;
        if player.is_listed() {
            return Err(LigaError::unavailable(player_id, "already listed"));
        }
        ensure_keeps_minimum(conn, config, team_id, player_id)?;

        players::set_listing(
            conn,
            player_id,
            &Listing {
                listed_at: now,
                listed_until: now + Duration::hours(config.market.listing_hours),
                asking_price: Some(asking_price),
                chased: false,
            },
        )?;
        info!(team_id, player_id, asking_price, "Player listed: {}", player.name);
        players::get(conn, player_id)
    })
}

/// Take a player off the market. Not possible once someone has bid.
pub fn withdraw_listing(db: &Database, team_id: i64, player_id: i64) -> Result<()> {
    db.transaction(|conn| {
        let player = owned_player(conn, team_id, player_id)?;
        if !player.is_listed() {
            return Err(LigaError::InvalidState(format!("player {player_id} is not listed")));
        }
        if market::count_pending_bids(conn, player_id)? > 0 {
            return Err(LigaError::unavailable(player_id, "has pending bids"));
        }
        players::clear_listing(conn, player_id)?;
        for offer in market::pending_offers_for_player(conn, player_id)? {
            if offer.origin == OfferOrigin::System {
                market::set_offer_status(conn, offer.id, OfferStatus::Cancelled)?;
            }
        }
        info!(team_id, player_id, "Listing withdrawn: {}", player.name);
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Lineup
// ---------------------------------------------------------------------------

pub fn bench_player(db: &Database, config: &Config, team_id: i64, player_id: i64) -> Result<()> {
    edit_lineup(db, config, team_id, Some(player_id), None)
}

pub fn start_player(db: &Database, config: &Config, team_id: i64, player_id: i64) -> Result<()> {
    edit_lineup(db, config, team_id, None, Some(player_id))
}

/// Replace starter `out_id` with bench player `in_id` in one move.
pub fn swap_players(
    db: &Database,
    config: &Config,
    team_id: i64,
    out_id: i64,
    in_id: i64,
) -> Result<()> {
    edit_lineup(db, config, team_id, Some(out_id), Some(in_id))
}

/// The team's players, starters first.
pub fn roster(db: &Database, team_id: i64) -> Result<Vec<Player>> {
    db.read(|conn| {
        teams::get(conn, team_id)?;
        players::list_by_team(conn, team_id)
    })
}

/// Shape of the team's current starters.
pub fn lineup(db: &Database, config: &Config, team_id: i64) -> Result<LineupCheck> {
    let starters = db.read(|conn| players::starters(conn, team_id))?;
    let counts = PositionCounts::from_positions(starters.iter().map(|p| p.position));
    Ok(LineupCheck::evaluate(counts, &config.lineup.allowed_formations()))
}

fn edit_lineup(
    db: &Database,
    config: &Config,
    team_id: i64,
    out_id: Option<i64>,
    in_id: Option<i64>,
) -> Result<()> {
    db.transaction(|conn| {
        let mut starters = players::starters(conn, team_id)?;

        if let Some(out_id) = out_id {
            let player = owned_player(conn, team_id, out_id)?;
            if !player.starter {
                return Err(LigaError::InvalidLineup(format!("{} is not a starter", player.name)));
            }
            starters.retain(|p| p.id != out_id);
            players::set_starter(conn, out_id, false)?;
        }
        if let Some(in_id) = in_id {
            let player = owned_player(conn, team_id, in_id)?;
            if player.starter {
                return Err(LigaError::InvalidLineup(format!("{} already starts", player.name)));
            }
            players::set_starter(conn, in_id, true)?;
            starters.push(player);
        }

        let counts = PositionCounts::from_positions(starters.iter().map(|p| p.position));
        if counts.total() > STARTERS {
            return Err(LigaError::InvalidLineup(format!("at most {STARTERS} starters")));
        }
        let allowed = config.lineup.allowed_formations();
        if !LineupCheck::evaluate(counts, &allowed).is_extendable(&allowed) {
            return Err(LigaError::InvalidLineup(format!(
                "{} GK, {} DEF, {} MID, {} FWD fits no allowed formation",
                counts.goalkeepers, counts.defenders, counts.midfielders, counts.forwards
            )));
        }
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn owned_player(conn: &Connection, team_id: i64, player_id: i64) -> Result<Player> {
    let player = players::get(conn, player_id)?;
    if player.team_id != Some(team_id) {
        return Err(LigaError::NotOwner { team_id, player_id });
    }
    Ok(player)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::db::test_support::*;
    use crate::market::bids::place_bid;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Pool large enough for two test squads (1/4/4/2 each).
    fn seeded_pool(db: &Database) -> i64 {
        db.transaction(|conn| {
            let league = seed_league(conn);
            let counts = [
                (Position::Goalkeeper, 3),
                (Position::Defender, 9),
                (Position::Midfielder, 9),
                (Position::Forward, 5),
            ];
            for (pos, n) in counts {
                for i in 0..n {
                    seed_player(conn, &format!("{pos} {i}"), pos, 20);
                }
            }
            Ok(league)
        })
        .unwrap()
    }

    #[test]
    fn create_team_deals_squad_and_valid_eleven() {
        let db = test_db();
        let config = test_config();
        let league = seeded_pool(&db);
        let mut rng = StdRng::seed_from_u64(11);

        let team = create_team(&db, &config, league, "ana", "Ana FC", &mut rng).unwrap();
        assert_eq!(team.budget, config.league.initial_budget);

        let squad = roster(&db, team.id).unwrap();
        assert_eq!(squad.len(), config.roster.starting_squad.total());

        let check = lineup(&db, &config, team.id).unwrap();
        assert!(check.is_complete());
        assert_eq!(check.counts.total(), STARTERS);
    }

    #[test]
    fn create_team_rejects_duplicate_owner() {
        let db = test_db();
        let config = test_config();
        let league = seeded_pool(&db);
        let mut rng = StdRng::seed_from_u64(11);
        create_team(&db, &config, league, "ana", "Ana FC", &mut rng).unwrap();
        let err = create_team(&db, &config, league, "ana", "Again", &mut rng).unwrap_err();
        assert!(matches!(err, LigaError::AlreadyExists { entity: "team", .. }));
    }

    #[test]
    fn short_pool_deals_what_exists_without_starters() {
        let db = test_db();
        let config = test_config();
        let league = db
            .transaction(|conn| {
                let league = seed_league(conn);
                seed_player(conn, "Lonely", Position::Goalkeeper, 20);
                Ok(league)
            })
            .unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let team = create_team(&db, &config, league, "ana", "Ana FC", &mut rng).unwrap();
        let squad = roster(&db, team.id).unwrap();
        assert_eq!(squad.len(), 1);
        assert!(!squad[0].starter);
    }

    #[test]
    fn pick_starting_eleven_uses_first_fitting_formation() {
        let mk = |id: i64, position: Position| Player {
            id,
            name: format!("p{id}"),
            club_id: 1,
            position,
            value: 1,
            total_points: 0,
            team_id: Some(1),
            starter: false,
            listing: None,
        };
        let mut squad = vec![mk(1, Position::Goalkeeper)];
        squad.extend((2..7).map(|i| mk(i, Position::Defender)));
        squad.extend((7..11).map(|i| mk(i, Position::Midfielder)));
        squad.push(mk(11, Position::Forward));
        let allowed: Vec<Formation> = ["4-4-2", "5-4-1"].iter().filter_map(|s| Formation::parse(s)).collect();

        let eleven = pick_starting_eleven(&squad, &allowed).unwrap();
        assert_eq!(eleven.len(), STARTERS);
        assert!(pick_starting_eleven(&squad[1..], &allowed).is_none());
    }

    struct Owned {
        db: Database,
        config: Config,
        team: i64,
        gk: i64,
        gk2: i64,
        def: i64,
        fwd: i64,
    }

    fn owned_fixture() -> Owned {
        let db = test_db();
        let (team, gk, gk2, def, fwd) = db
            .transaction(|conn| {
                let league = seed_league(conn);
                let team = seed_team(conn, league, "ana", 100);
                let gk = seed_owned(conn, team, "Keeper", Position::Goalkeeper, 40, true);
                let gk2 = seed_owned(conn, team, "Backup", Position::Goalkeeper, 30, false);
                let def = seed_owned(conn, team, "Back", Position::Defender, 50, true);
                let fwd = seed_owned(conn, team, "Striker", Position::Forward, 60, false);
                Ok((team, gk, gk2, def, fwd))
            })
            .unwrap();
        Owned {
            db,
            config: test_config(),
            team,
            gk,
            gk2,
            def,
            fwd,
        }
    }

    #[test]
    fn second_goalkeeper_cannot_start() {
        let o = owned_fixture();
        let err = start_player(&o.db, &o.config, o.team, o.gk2).unwrap_err();
        assert!(matches!(err, LigaError::InvalidLineup(_)));
        // Nothing changed.
        assert!(!o.db.read(|conn| players::get(conn, o.gk2)).unwrap().starter);
    }

    #[test]
    fn swap_goalkeepers_is_allowed() {
        let o = owned_fixture();
        swap_players(&o.db, &o.config, o.team, o.gk, o.gk2).unwrap();
        let starters: Vec<i64> = o
            .db
            .read(|conn| players::starters(conn, o.team))
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert!(starters.contains(&o.gk2));
        assert!(!starters.contains(&o.gk));
    }

    #[test]
    fn bench_and_start_round_trip() {
        let o = owned_fixture();
        start_player(&o.db, &o.config, o.team, o.fwd).unwrap();
        bench_player(&o.db, &o.config, o.team, o.def).unwrap();
        assert!(matches!(
            bench_player(&o.db, &o.config, o.team, o.def).unwrap_err(),
            LigaError::InvalidLineup(_)
        ));
        let check = lineup(&o.db, &o.config, o.team).unwrap();
        assert_eq!(check.counts.total(), 2);
        assert_eq!(check.missing, 9);
    }

    #[test]
    fn sell_player_credits_value_and_respects_minimum() {
        let mut o = owned_fixture();
        let record = sell_player(&o.db, &o.config, o.team, o.fwd, t0()).unwrap();
        assert_eq!(record.amount, 60);
        let budget = o.db.read(|conn| teams::get(conn, o.team)).unwrap().budget;
        assert_eq!(budget, 160);

        o.config.roster.min_players = 3;
        let err = sell_player(&o.db, &o.config, o.team, o.def, t0()).unwrap_err();
        assert!(matches!(err, LigaError::RosterTooSmall { min: 3 }));
    }

    #[test]
    fn sell_someone_elses_player_is_refused() {
        let o = owned_fixture();
        let err = sell_player(&o.db, &o.config, o.team + 1, o.fwd, t0()).unwrap_err();
        assert!(matches!(err, LigaError::NotOwner { .. }));
    }

    #[test]
    fn sign_player_buys_system_listing_at_value() {
        let o = owned_fixture();
        let p = o
            .db
            .transaction(|conn| {
                let p = seed_player(conn, "Market", Position::Midfielder, 70);
                players::set_listing(
                    conn,
                    p,
                    &Listing {
                        listed_at: t0(),
                        listed_until: t0() + Duration::hours(24),
                        asking_price: None,
                        chased: false,
                    },
                )?;
                Ok(p)
            })
            .unwrap();

        let record = sign_player(&o.db, &o.config, o.team, p, t0()).unwrap();
        assert_eq!(record.kind, TransferKind::MarketPurchase);
        o.db.read(|conn| {
            assert_eq!(teams::get(conn, o.team)?.budget, 30);
            assert_eq!(players::get(conn, p)?.team_id, Some(o.team));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn sign_unlisted_free_agent_is_refused() {
        let o = owned_fixture();
        let p = o
            .db
            .transaction(|conn| Ok(seed_player(conn, "Hidden", Position::Midfielder, 10)))
            .unwrap();
        let err = sign_player(&o.db, &o.config, o.team, p, t0()).unwrap_err();
        assert!(matches!(err, LigaError::PlayerUnavailable { .. }));
    }

    #[test]
    fn list_and_withdraw() {
        let o = owned_fixture();
        let listed = list_player(&o.db, &o.config, o.team, o.def, 90, t0()).unwrap();
        let listing = listed.listing.clone().unwrap();
        assert_eq!(listing.asking_price, Some(90));
        assert!(listed.starter, "listed starter keeps its place");

        assert!(matches!(
            list_player(&o.db, &o.config, o.team, o.def, 90, t0()).unwrap_err(),
            LigaError::PlayerUnavailable { .. }
        ));

        withdraw_listing(&o.db, o.team, o.def).unwrap();
        assert!(o.db.read(|conn| players::get(conn, o.def)).unwrap().listing.is_none());
        assert!(matches!(
            withdraw_listing(&o.db, o.team, o.def).unwrap_err(),
            LigaError::InvalidState(_)
        ));
    }

    #[test]
    fn listings_count_against_minimum_roster() {
        let o = owned_fixture();
        // Four players, min_players = 2: two may be on the market at once.
        list_player(&o.db, &o.config, o.team, o.def, 90, t0()).unwrap();
        list_player(&o.db, &o.config, o.team, o.fwd, 90, t0()).unwrap();

        let err = list_player(&o.db, &o.config, o.team, o.gk2, 90, t0()).unwrap_err();
        assert!(matches!(err, LigaError::RosterTooSmall { min: 2 }));
        let err = sell_player(&o.db, &o.config, o.team, o.gk, t0()).unwrap_err();
        assert!(matches!(err, LigaError::RosterTooSmall { min: 2 }));

        // Selling one of the listed players is still fine.
        sell_player(&o.db, &o.config, o.team, o.fwd, t0()).unwrap();
    }

    fn rival(o: &Owned) -> i64 {
        o.db
            .transaction(|conn| {
                let league = teams::get(conn, o.team)?.league_id;
                Ok(seed_team(conn, league, "ben", 500))
            })
            .unwrap()
    }

    #[test]
    fn pending_bids_block_sale_and_withdrawal() {
        let o = owned_fixture();
        let ben = rival(&o);
        list_player(&o.db, &o.config, o.team, o.fwd, 90, t0()).unwrap();
        place_bid(&o.db, &o.config, ben, o.fwd, 70, t0()).unwrap();

        let err = sell_player(&o.db, &o.config, o.team, o.fwd, t0()).unwrap_err();
        assert!(matches!(err, LigaError::PlayerUnavailable { .. }));
        let err = withdraw_listing(&o.db, o.team, o.fwd).unwrap_err();
        assert!(matches!(err, LigaError::PlayerUnavailable { .. }));

        let player = o.db.read(|conn| players::get(conn, o.fwd)).unwrap();
        assert_eq!(player.team_id, Some(o.team));
        assert!(player.is_listed());
    }

    #[test]
    fn sign_player_refused_once_someone_bid() {
        let o = owned_fixture();
        let ben = rival(&o);
        let p = o
            .db
            .transaction(|conn| {
                let p = seed_player(conn, "Contested", Position::Midfielder, 40);
                players::set_listing(
                    conn,
                    p,
                    &Listing {
                        listed_at: t0(),
                        listed_until: t0() + Duration::hours(24),
                        asking_price: None,
                        chased: false,
                    },
                )?;
                Ok(p)
            })
            .unwrap();
        place_bid(&o.db, &o.config, ben, p, 40, t0()).unwrap();

        let err = sign_player(&o.db, &o.config, o.team, p, t0()).unwrap_err();
        assert!(matches!(err, LigaError::PlayerUnavailable { .. }));
        assert!(o.db.read(|conn| players::get(conn, p)).unwrap().is_free_agent());
    }
}
