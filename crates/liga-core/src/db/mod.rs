// SQLite persistence layer.
//
// `Database` owns the connection and the schema. The submodules hold the
// row-level queries as free functions over `&Connection`, so the same query
// runs either on its own or inside a caller's transaction.

pub mod leagues;
pub mod market;
pub mod matchdays;
pub mod notifications;
pub mod players;
pub mod teams;

use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::Result;

/// SQLite-backed store for every league record plus a key/value table for
/// job bookkeeping.
pub struct Database {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS leagues (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        name       TEXT NOT NULL UNIQUE,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS clubs (
        id   INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS teams (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        league_id INTEGER NOT NULL REFERENCES leagues(id),
        owner     TEXT NOT NULL,
        name      TEXT NOT NULL,
        budget    INTEGER NOT NULL CHECK (budget >= 0),
        points    INTEGER NOT NULL DEFAULT 0,
        UNIQUE(league_id, owner)
    );

    CREATE TABLE IF NOT EXISTS players (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        name         TEXT NOT NULL,
        club_id      INTEGER NOT NULL REFERENCES clubs(id),
        position     TEXT NOT NULL,
        value        INTEGER NOT NULL,
        total_points INTEGER NOT NULL DEFAULT 0,
        team_id      INTEGER REFERENCES teams(id),
        starter      INTEGER NOT NULL DEFAULT 0,
        listed_at    INTEGER,
        listed_until INTEGER,
        asking_price INTEGER,
        chased       INTEGER NOT NULL DEFAULT 0,
        UNIQUE(name, club_id)
    );

    CREATE TABLE IF NOT EXISTS bids (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        player_id  INTEGER NOT NULL REFERENCES players(id),
        team_id    INTEGER NOT NULL REFERENCES teams(id),
        amount     INTEGER NOT NULL,
        status     TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS offers (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        player_id      INTEGER NOT NULL REFERENCES players(id),
        buyer_team_id  INTEGER REFERENCES teams(id),
        seller_team_id INTEGER NOT NULL REFERENCES teams(id),
        amount         INTEGER NOT NULL,
        origin         TEXT NOT NULL,
        awaiting       TEXT NOT NULL,
        status         TEXT NOT NULL,
        parent_id      INTEGER REFERENCES offers(id),
        created_at     INTEGER NOT NULL,
        expires_at     INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS transfers (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        player_id    INTEGER NOT NULL REFERENCES players(id),
        from_team_id INTEGER REFERENCES teams(id),
        to_team_id   INTEGER REFERENCES teams(id),
        amount       INTEGER NOT NULL,
        kind         TEXT NOT NULL,
        at           INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS matchdays (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        number    INTEGER NOT NULL UNIQUE,
        starts_at INTEGER NOT NULL,
        ends_at   INTEGER NOT NULL,
        status    TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS matches (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        matchday_id  INTEGER NOT NULL REFERENCES matchdays(id),
        home_club_id INTEGER NOT NULL REFERENCES clubs(id),
        away_club_id INTEGER NOT NULL REFERENCES clubs(id),
        home_goals   INTEGER,
        away_goals   INTEGER,
        UNIQUE(matchday_id, home_club_id, away_club_id)
    );

    CREATE TABLE IF NOT EXISTS scores (
        matchday_id INTEGER NOT NULL REFERENCES matchdays(id),
        player_id   INTEGER NOT NULL REFERENCES players(id),
        points      INTEGER NOT NULL,
        PRIMARY KEY (matchday_id, player_id)
    );

    CREATE TABLE IF NOT EXISTS lineup_snapshots (
        matchday_id INTEGER NOT NULL REFERENCES matchdays(id),
        team_id     INTEGER NOT NULL REFERENCES teams(id),
        player_id   INTEGER NOT NULL REFERENCES players(id),
        position    TEXT NOT NULL,
        PRIMARY KEY (matchday_id, team_id, player_id)
    );

    CREATE TABLE IF NOT EXISTS matchday_results (
        matchday_id INTEGER NOT NULL REFERENCES matchdays(id),
        team_id     INTEGER NOT NULL REFERENCES teams(id),
        complete    INTEGER NOT NULL,
        missing     INTEGER NOT NULL,
        formation   TEXT,
        points      INTEGER,
        payout      INTEGER,
        PRIMARY KEY (matchday_id, team_id)
    );

    CREATE TABLE IF NOT EXISTS notifications (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        team_id    INTEGER NOT NULL REFERENCES teams(id),
        kind       TEXT NOT NULL,
        message    TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        read       INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS app_state (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_players_team ON players(team_id);
    CREATE INDEX IF NOT EXISTS idx_players_listed ON players(listed_until);
    CREATE INDEX IF NOT EXISTS idx_bids_player ON bids(player_id, status);
    CREATE INDEX IF NOT EXISTS idx_offers_player ON offers(player_id, status);
    CREATE INDEX IF NOT EXISTS idx_notifications_team ON notifications(team_id, read);
";

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )?;
        conn.execute_batch(SCHEMA)?;
        debug!("Database schema ready at {}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Run `f` against the connection without opening a transaction.
    pub fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn();
        f(&conn)
    }

    /// Run `f` inside a transaction. Commits when `f` returns `Ok`; any error
    /// rolls back every statement `f` executed.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Persist an arbitrary JSON value under `key`. Uses INSERT OR REPLACE so
    /// repeated saves overwrite the previous value.
    pub fn save_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let json_str = serde_json::to_string(value)?;
        self.conn().execute(
            "INSERT OR REPLACE INTO app_state (key, value) VALUES (?1, ?2)",
            params![key, json_str],
        )?;
        Ok(())
    }

    /// Load a previously saved JSON value by `key`. Returns `None` if the key
    /// does not exist.
    pub fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let json_str: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM app_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match json_str {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Seeding helpers shared by the unit tests of every module.

    use chrono::{DateTime, TimeZone, Utc};
    use rusqlite::Connection;

    use super::{leagues, players, teams, Database};
    use crate::model::player::Position;

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap()
    }

    pub fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    pub fn seed_league(conn: &Connection) -> i64 {
        leagues::insert_league(conn, "Test League", t0()).unwrap()
    }

    pub fn seed_team(conn: &Connection, league_id: i64, owner: &str, budget: i64) -> i64 {
        teams::insert(conn, league_id, owner, &format!("{owner} FC"), budget).unwrap()
    }

    pub fn seed_player(conn: &Connection, name: &str, position: Position, value: i64) -> i64 {
        let club_id = leagues::upsert_club(conn, "Club Test").unwrap();
        players::upsert(conn, name, club_id, position, value).unwrap()
    }

    /// Seed a player already owned by `team_id`.
    pub fn seed_owned(
        conn: &Connection,
        team_id: i64,
        name: &str,
        position: Position,
        value: i64,
        starter: bool,
    ) -> i64 {
        let id = seed_player(conn, name, position, value);
        players::set_owner(conn, id, Some(team_id)).unwrap();
        players::set_starter(conn, id, starter).unwrap();
        id
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::error::LigaError;
    use serde_json::json;

    #[test]
    fn open_creates_tables() {
        let db = test_db();
        let tables: Vec<String> = db
            .read(|conn| {
                let mut stmt = conn
                    .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(names)
            })
            .unwrap();

        for expected in [
            "leagues",
            "clubs",
            "teams",
            "players",
            "bids",
            "offers",
            "transfers",
            "matchdays",
            "matches",
            "scores",
            "lineup_snapshots",
            "matchday_results",
            "notifications",
            "app_state",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing table {expected}");
        }
    }

    #[test]
    fn save_and_load_state_round_trip() {
        let db = test_db();
        let value = json!({"last_rotation": 1_788_000_000});
        db.save_state("market", &value).unwrap();
        assert_eq!(db.load_state("market").unwrap(), Some(value));
    }

    #[test]
    fn load_state_returns_none_for_missing_key() {
        let db = test_db();
        assert!(db.load_state("nonexistent").unwrap().is_none());
    }

    #[test]
    fn save_state_overwrites_previous_value() {
        let db = test_db();
        db.save_state("key", &json!(1)).unwrap();
        db.save_state("key", &json!(2)).unwrap();
        assert_eq!(db.load_state("key").unwrap(), Some(json!(2)));
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let db = test_db();
        let league_id = db.transaction(|conn| Ok(seed_league(conn))).unwrap();

        let result: Result<()> = db.transaction(|conn| {
            seed_team(conn, league_id, "ana", 100);
            Err(LigaError::InvalidState("boom".into()))
        });
        assert!(result.is_err());

        let count = db
            .read(|conn| teams::list_by_league(conn, league_id).map(|t| t.len()))
            .unwrap();
        assert_eq!(count, 0, "team insert must be rolled back");
    }

    #[test]
    fn budget_check_constraint_rejects_negative() {
        let db = test_db();
        let err = db
            .transaction(|conn| {
                let league_id = seed_league(conn);
                let team_id = seed_team(conn, league_id, "ana", 10);
                teams::adjust_budget(conn, team_id, -11)?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, LigaError::Db(_)));
    }
}
