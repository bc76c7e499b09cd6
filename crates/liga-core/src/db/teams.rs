// Team rows: budgets, points, committed funds.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{LigaError, Result};
use crate::model::team::Team;

const TEAM_COLUMNS: &str = "id, league_id, owner, name, budget, points";

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        league_id: row.get(1)?,
        owner: row.get(2)?,
        name: row.get(3)?,
        budget: row.get(4)?,
        points: row.get(5)?,
    })
}

/// Insert a team. An owner can hold only one team per league.
pub fn insert(conn: &Connection, league_id: i64, owner: &str, name: &str, budget: i64) -> Result<i64> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO teams (league_id, owner, name, budget) VALUES (?1, ?2, ?3, ?4)",
        params![league_id, owner, name, budget],
    )?;
    if inserted == 0 {
        return Err(LigaError::AlreadyExists {
            entity: "team",
            detail: format!("{owner} already has a team in league {league_id}"),
        });
    }
    Ok(conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> Result<Team> {
    conn.query_row(
        &format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = ?1"),
        params![id],
        team_from_row,
    )
    .optional()?
    .ok_or_else(|| LigaError::not_found("team", id))
}

pub fn find_by_owner(conn: &Connection, league_id: i64, owner: &str) -> Result<Option<Team>> {
    Ok(conn
        .query_row(
            &format!("SELECT {TEAM_COLUMNS} FROM teams WHERE league_id = ?1 AND owner = ?2"),
            params![league_id, owner],
            team_from_row,
        )
        .optional()?)
}

pub fn list_by_league(conn: &Connection, league_id: i64) -> Result<Vec<Team>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TEAM_COLUMNS} FROM teams WHERE league_id = ?1 ORDER BY id"
    ))?;
    let teams = stmt
        .query_map(params![league_id], team_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(teams)
}

pub fn list_all(conn: &Connection) -> Result<Vec<Team>> {
    let mut stmt = conn.prepare(&format!("SELECT {TEAM_COLUMNS} FROM teams ORDER BY id"))?;
    let teams = stmt
        .query_map([], team_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(teams)
}

/// Add `delta` to the budget. The schema's CHECK rejects a negative result.
pub fn adjust_budget(conn: &Connection, team_id: i64, delta: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE teams SET budget = budget + ?2 WHERE id = ?1",
        params![team_id, delta],
    )?;
    if updated == 0 {
        return Err(LigaError::not_found("team", team_id));
    }
    Ok(())
}

pub fn add_points(conn: &Connection, team_id: i64, points: i64) -> Result<()> {
    conn.execute(
        "UPDATE teams SET points = points + ?2 WHERE id = ?1",
        params![team_id, points],
    )?;
    Ok(())
}

/// Money the team has promised in pending bids and pending offers it made as
/// buyer, ignoring anything on `except_player`.
pub fn committed_funds(conn: &Connection, team_id: i64, except_player: Option<i64>) -> Result<i64> {
    let except = except_player.unwrap_or(-1);
    let bids: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM bids
         WHERE team_id = ?1 AND status = 'pending' AND player_id != ?2",
        params![team_id, except],
        |row| row.get(0),
    )?;
    let offers: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM offers
         WHERE buyer_team_id = ?1 AND status = 'pending' AND player_id != ?2",
        params![team_id, except],
        |row| row.get(0),
    )?;
    Ok(bids + offers)
}

/// Budget minus committed funds.
pub fn available_funds(conn: &Connection, team_id: i64, except_player: Option<i64>) -> Result<i64> {
    let team = get(conn, team_id)?;
    Ok(team.budget - committed_funds(conn, team_id, except_player)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::*;

    #[test]
    fn one_team_per_owner_per_league() {
        let db = test_db();
        let err = db
            .transaction(|conn| {
                let league = seed_league(conn);
                insert(conn, league, "ana", "Ana FC", 100)?;
                insert(conn, league, "ana", "Ana United", 100)
            })
            .unwrap_err();
        assert!(matches!(err, LigaError::AlreadyExists { entity: "team", .. }));
    }

    #[test]
    fn same_owner_in_two_leagues_is_fine() {
        let db = test_db();
        db.transaction(|conn| {
            let a = seed_league(conn);
            let b = crate::db::leagues::insert_league(conn, "Other", t0())?;
            insert(conn, a, "ana", "Ana FC", 100)?;
            insert(conn, b, "ana", "Ana FC", 100)?;
            assert!(find_by_owner(conn, b, "ana")?.is_some());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn adjust_budget_and_points() {
        let db = test_db();
        db.transaction(|conn| {
            let league = seed_league(conn);
            let id = seed_team(conn, league, "ana", 100);
            adjust_budget(conn, id, -40)?;
            adjust_budget(conn, id, 15)?;
            add_points(conn, id, 7)?;
            let team = get(conn, id)?;
            assert_eq!(team.budget, 75);
            assert_eq!(team.points, 7);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn committed_funds_sums_pending_bids_and_offers() {
        let db = test_db();
        db.transaction(|conn| {
            let league = seed_league(conn);
            let ana = seed_team(conn, league, "ana", 1000);
            let ben = seed_team(conn, league, "ben", 1000);
            let p1 = seed_player(conn, "Uno", crate::model::player::Position::Forward, 10);
            let p2 = seed_player(conn, "Dos", crate::model::player::Position::Forward, 10);
            let p3 = seed_owned(conn, ben, "Tres", crate::model::player::Position::Forward, 10, false);
            conn.execute(
                "INSERT INTO bids (player_id, team_id, amount, status, created_at)
                 VALUES (?1, ?2, 100, 'pending', 0), (?3, ?2, 50, 'pending', 0),
                        (?3, ?2, 999, 'lost', 0)",
                params![p1, ana, p2],
            )?;
            conn.execute(
                "INSERT INTO offers (player_id, buyer_team_id, seller_team_id, amount, origin,
                                     awaiting, status, created_at, expires_at)
                 VALUES (?1, ?2, ?3, 30, 'direct', 'seller', 'pending', 0, 0)",
                params![p3, ana, ben],
            )?;
            assert_eq!(committed_funds(conn, ana, None)?, 180);
            assert_eq!(committed_funds(conn, ana, Some(p1))?, 80);
            assert_eq!(available_funds(conn, ana, Some(p3))?, 850);
            Ok(())
        })
        .unwrap();
    }
}
