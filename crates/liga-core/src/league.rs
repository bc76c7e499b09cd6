// Leagues and their standings table.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::db::{leagues, teams, Database};
use crate::error::Result;
use crate::model::league::League;
use crate::model::team::{Standing, Team};

pub fn create_league(db: &Database, name: &str, now: DateTime<Utc>) -> Result<League> {
    let league = db.transaction(|conn| {
        let id = leagues::insert_league(conn, name, now)?;
        leagues::get_league(conn, id)
    })?;
    info!(league_id = league.id, "League created: {}", league.name);
    Ok(league)
}

pub fn find_league(db: &Database, name: &str) -> Result<Option<League>> {
    db.read(|conn| leagues::find_league(conn, name))
}

pub fn teams(db: &Database, league_id: i64) -> Result<Vec<Team>> {
    db.read(|conn| {
        leagues::get_league(conn, league_id)?;
        teams::list_by_league(conn, league_id)
    })
}

pub fn find_team(db: &Database, league_id: i64, owner: &str) -> Result<Option<Team>> {
    db.read(|conn| teams::find_by_owner(conn, league_id, owner))
}

/// League table: points, then budget, then team name.
pub fn standings(db: &Database, league_id: i64) -> Result<Vec<Standing>> {
    Ok(rank(teams(db, league_id)?))
}

fn rank(mut teams: Vec<Team>) -> Vec<Standing> {
    teams.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(b.budget.cmp(&a.budget))
            .then_with(|| a.name.cmp(&b.name))
    });
    teams
        .into_iter()
        .enumerate()
        .map(|(i, t)| Standing {
            rank: i + 1,
            team_id: t.id,
            team_name: t.name,
            owner: t.owner,
            points: t.points,
            budget: t.budget,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::*;
    use crate::error::LigaError;

    #[test]
    fn standings_order_points_budget_name() {
        let db = test_db();
        let league = create_league(&db, "Amigos", t0()).unwrap();
        db.transaction(|conn| {
            let a = teams::insert(conn, league.id, "a", "Zeta", 100)?;
            let b = teams::insert(conn, league.id, "b", "Alfa", 100)?;
            let c = teams::insert(conn, league.id, "c", "Beta", 300)?;
            let d = teams::insert(conn, league.id, "d", "Gamma", 0)?;
            teams::add_points(conn, a, 10)?;
            teams::add_points(conn, b, 10)?;
            teams::add_points(conn, c, 10)?;
            teams::add_points(conn, d, 25)?;
            Ok(())
        })
        .unwrap();

        let table: Vec<(usize, String)> = standings(&db, league.id)
            .unwrap()
            .into_iter()
            .map(|s| (s.rank, s.team_name))
            .collect();
        assert_eq!(
            table,
            vec![
                (1, "Gamma".to_string()),
                (2, "Beta".to_string()),
                (3, "Alfa".to_string()),
                (4, "Zeta".to_string()),
            ]
        );
    }

    #[test]
    fn teams_of_unknown_league_is_not_found() {
        let db = test_db();
        assert!(matches!(
            teams(&db, 7).unwrap_err(),
            LigaError::NotFound { entity: "league", id: 7 }
        ));
    }

    #[test]
    fn find_league_and_team_by_name() {
        let db = test_db();
        let league = create_league(&db, "Amigos", t0()).unwrap();
        db.read(|conn| teams::insert(conn, league.id, "ana", "Ana FC", 10)).unwrap();
        assert_eq!(find_league(&db, "Amigos").unwrap(), Some(league.clone()));
        assert!(find_team(&db, league.id, "ana").unwrap().is_some());
        assert!(find_team(&db, league.id, "ben").unwrap().is_none());
    }
}
