// One-shot management commands.

use std::path::Path;

use anyhow::{bail, Context};
use chrono::Utc;
use liga_core::config::{self, Config};
use liga_core::db::Database;
use liga_core::{import, league, market, matchday, roster};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::cli::{parse_time, Command};

/// Load (creating from defaults if needed) the config under `base_dir`.
pub fn load_config(base_dir: &Path) -> anyhow::Result<Config> {
    config::load_config(base_dir).context("failed to load configuration")
}

/// Open the database named in the config. Relative paths resolve against
/// `base_dir`.
pub fn open_database(base_dir: &Path, config: &Config) -> anyhow::Result<Database> {
    let path = if config.database.path == ":memory:" || Path::new(&config.database.path).is_absolute() {
        config.database.path.clone()
    } else {
        base_dir.join(&config.database.path).display().to_string()
    };
    let db = Database::open(&path).with_context(|| format!("failed to open database at {path}"))?;
    info!("Database opened at {}", path);
    Ok(db)
}

/// Execute a one-shot command. `Run` is handled by the caller. Returns the
/// text to print.
pub fn execute(command: &Command, db: &Database, config: &Config) -> anyhow::Result<String> {
    let now = Utc::now();

    let output = match command {
        Command::Init => "Configuration and database ready".to_string(),

        Command::CreateLeague { name } => {
            let created = league::create_league(db, name, now)?;
            format!("League #{} created: {}", created.id, created.name)
        }

        Command::CreateTeam {
            league: league_name,
            owner,
            name,
        } => {
            let found = league::find_league(db, league_name)?
                .with_context(|| format!("no league named `{league_name}`"))?;
            let mut rng = StdRng::from_os_rng();
            let team = roster::create_team(db, config, found.id, owner, name, &mut rng)?;
            let squad = roster::roster(db, team.id)?;
            format!(
                "Team #{} created for {}: {} players, budget {}",
                team.id,
                team.owner,
                squad.len(),
                team.budget
            )
        }

        Command::ImportPlayers { path } => {
            let summary = import::import_players(db, path)?;
            format!(
                "Imported {} players ({} skipped)",
                summary.imported, summary.skipped
            )
        }

        Command::ImportScores {
            matchday: number,
            path,
        } => {
            let found = matchday::find_matchday(db, *number)?
                .with_context(|| format!("no matchday number {number}"))?;
            let summary = import::import_scores(db, found.id, path)?;
            format!(
                "Imported {} scores for matchday {} ({} skipped)",
                summary.imported, number, summary.skipped
            )
        }

        Command::CreateMatchday {
            number,
            starts,
            ends,
        } => {
            let created = matchday::create_matchday(db, *number, parse_time(starts)?, parse_time(ends)?)?;
            format!(
                "Matchday {} created: {} to {}",
                created.number, created.starts_at, created.ends_at
            )
        }

        Command::RotateMarket { force } => {
            let mut rng = StdRng::from_os_rng();
            let listed = if *force {
                Some(market::rotate_market(db, config, now, &mut rng)?)
            } else {
                market::rotate_market_if_due(db, config, now, &mut rng)?
            };
            match listed {
                Some(n) => format!("{n} players listed"),
                None => "Market rotation not due yet".to_string(),
            }
        }

        Command::SettleMarket => {
            let r = market::settle_market(db, config, now)?;
            format!(
                "Settled {} listings: {} transfers, {} escalated, {} system offers, {} reverted; {} offers expired; {} failures",
                r.listings_settled, r.transfers, r.escalations, r.system_offers, r.reverted, r.offers_expired, r.failures
            )
        }

        Command::FreezeLineups => {
            let r = matchday::freeze_lineups(db, config, now)?;
            format!(
                "Froze {} matchdays: {} lineups, {} incomplete; {} failures",
                r.matchdays_frozen, r.teams_snapshotted, r.incomplete_lineups, r.failures
            )
        }

        Command::SettleMatchdays => {
            let r = matchday::settle_matchdays(db, config, now)?;
            format!(
                "Scored {} matchdays: {} teams paid {} in total; {} failures",
                r.matchdays_scored, r.teams_paid, r.total_payout, r.failures
            )
        }

        Command::Standings { league: league_name } => {
            let found = league::find_league(db, league_name)?
                .with_context(|| format!("no league named `{league_name}`"))?;
            render_standings(&league::standings(db, found.id)?)
        }

        Command::Run => bail!("`run` is not a one-shot command"),
    };
    Ok(output)
}

fn render_standings(table: &[liga_core::model::team::Standing]) -> String {
    let mut out = format!("{:>3}  {:<24} {:<16} {:>7} {:>12}\n", "#", "Team", "Owner", "Points", "Budget");
    for row in table {
        out.push_str(&format!(
            "{:>3}  {:<24} {:<16} {:>7} {:>12}\n",
            row.rank, row.team_name, row.owner, row.points, row.budget
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use liga_core::config::test_config;

    fn setup() -> (Database, Config) {
        (
            Database::open(":memory:").expect("in-memory database should open"),
            test_config(),
        )
    }

    #[test]
    fn create_league_then_standings() {
        let (db, config) = setup();
        let out = execute(
            &Command::CreateLeague {
                name: "Amigos".into(),
            },
            &db,
            &config,
        )
        .unwrap();
        assert!(out.contains("Amigos"));

        let table = execute(
            &Command::Standings {
                league: "Amigos".into(),
            },
            &db,
            &config,
        )
        .unwrap();
        assert!(table.starts_with("  #"));
    }

    #[test]
    fn unknown_league_is_reported() {
        let (db, config) = setup();
        let err = execute(
            &Command::Standings {
                league: "Nope".into(),
            },
            &db,
            &config,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Nope"));
    }

    #[test]
    fn create_matchday_parses_times() {
        let (db, config) = setup();
        let out = execute(
            &Command::CreateMatchday {
                number: 4,
                starts: "2026-09-12T16:00:00Z".into(),
                ends: "2026-09-14T22:00:00Z".into(),
            },
            &db,
            &config,
        )
        .unwrap();
        assert!(out.starts_with("Matchday 4 created"));
        assert!(matchday::find_matchday(&db, 4).unwrap().is_some());
    }

    #[test]
    fn forced_rotation_on_empty_pool_lists_nothing() {
        let (db, config) = setup();
        let out = execute(&Command::RotateMarket { force: true }, &db, &config).unwrap();
        assert_eq!(out, "0 players listed");
    }

    #[test]
    fn run_is_not_one_shot() {
        let (db, config) = setup();
        assert!(execute(&Command::Run, &db, &config).is_err());
    }

    #[test]
    fn relative_database_path_resolves_against_base_dir() {
        let mut config = test_config();
        config.database.path = "liga-test.db".into();
        let dir = std::env::temp_dir().join(format!("liga-open-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        open_database(&dir, &config).unwrap();
        assert!(dir.join("liga-test.db").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
