// CSV import of the player pool and of per-matchday player scores.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::db::{leagues, matchdays, players, Database};
use crate::error::LigaError;
use crate::model::matchday::MatchdayStatus;
use crate::model::player::Position;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Liga(#[from] LigaError),
}

/// Rows written and rows skipped by one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PlayerRow {
    name: String,
    club: String,
    position: String,
    value: i64,
}

/// Load `name,club,position,value` rows, creating clubs as needed. Existing
/// players keep their owner and points; position and value are refreshed.
pub fn import_players_from_reader<R: Read>(db: &Database, rdr: R) -> Result<ImportSummary, ImportError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut rows = Vec::new();
    let mut summary = ImportSummary::default();

    for result in reader.deserialize() {
        let row: PlayerRow = result?;
        match Position::from_str_pos(&row.position) {
            Some(position) if row.value >= 0 && !row.name.trim().is_empty() => {
                rows.push((row, position))
            }
            _ => {
                warn!(name = %row.name, position = %row.position, value = row.value, "Skipping player row");
                summary.skipped += 1;
            }
        }
    }

    db.transaction(|conn| {
        for (row, position) in &rows {
            let club_id = leagues::upsert_club(conn, &row.club)?;
            players::upsert(conn, &row.name, club_id, *position, row.value)?;
        }
        Ok(())
    })?;
    summary.imported = rows.len();

    info!(imported = summary.imported, skipped = summary.skipped, "Players imported");
    Ok(summary)
}

pub fn import_players(db: &Database, path: &Path) -> Result<ImportSummary, ImportError> {
    let file = open(path)?;
    import_players_from_reader(db, file)
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ScoreRow {
    name: String,
    club: String,
    points: i64,
}

/// Load `name,club,points` rows as the scores of one matchday. Rows naming
/// an unknown club or player are skipped.
pub fn import_scores_from_reader<R: Read>(
    db: &Database,
    matchday_id: i64,
    rdr: R,
) -> Result<ImportSummary, ImportError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<ScoreRow>, csv::Error>>()?;

    let summary = db.transaction(|conn| {
        let matchday = matchdays::get_matchday(conn, matchday_id)?;
        if matchday.status == MatchdayStatus::Scored {
            return Err(LigaError::InvalidState(format!(
                "matchday {} is already scored",
                matchday.number
            )));
        }

        let mut summary = ImportSummary::default();
        for row in &rows {
            let player = match leagues::find_club(conn, &row.club)? {
                Some(club) => players::find(conn, &row.name, club.id)?,
                None => None,
            };
            match player {
                Some(player) => {
                    matchdays::upsert_score(conn, matchday_id, player.id, row.points)?;
                    summary.imported += 1;
                }
                None => {
                    warn!(name = %row.name, club = %row.club, "Skipping score for unknown player");
                    summary.skipped += 1;
                }
            }
        }
        Ok(summary)
    })?;

    info!(
        matchday_id,
        imported = summary.imported,
        skipped = summary.skipped,
        "Scores imported"
    );
    Ok(summary)
}

pub fn import_scores(db: &Database, matchday_id: i64, path: &Path) -> Result<ImportSummary, ImportError> {
    let file = open(path)?;
    import_scores_from_reader(db, matchday_id, file)
}

fn open(path: &Path) -> Result<std::fs::File, ImportError> {
    std::fs::File::open(path).map_err(|e| ImportError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::*;
    use crate::matchday::create_matchday;
    use chrono::Duration;

    const PLAYERS_CSV: &str = "\
name,club,position,value
Unai Simon,Athletic,POR,150
Vivian,Athletic,DEF,120
Nico Williams,Athletic,DEL,300
Mystery,Athletic,XX,10
Oyarzabal,Real Sociedad,FWD,280
";

    #[test]
    fn imports_players_and_skips_unknown_positions() {
        let db = test_db();
        let summary = import_players_from_reader(&db, PLAYERS_CSV.as_bytes()).unwrap();
        assert_eq!(summary, ImportSummary { imported: 4, skipped: 1 });

        db.read(|conn| {
            let athletic = leagues::find_club(conn, "Athletic")?.unwrap();
            let nico = players::find(conn, "Nico Williams", athletic.id)?.unwrap();
            assert_eq!(nico.position, Position::Forward);
            assert_eq!(nico.value, 300);
            assert!(leagues::find_club(conn, "Real Sociedad")?.is_some());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn reimport_updates_values_in_place() {
        let db = test_db();
        import_players_from_reader(&db, PLAYERS_CSV.as_bytes()).unwrap();
        let update = "name,club,position,value\nVivian,Athletic,DEF,175\n";
        import_players_from_reader(&db, update.as_bytes()).unwrap();

        let count: i64 = db
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(count, 4);
        let vivian = db
            .read(|conn| {
                let club = leagues::find_club(conn, "Athletic")?.unwrap();
                Ok(players::find(conn, "Vivian", club.id)?.unwrap())
            })
            .unwrap();
        assert_eq!(vivian.value, 175);
    }

    #[test]
    fn malformed_value_is_a_csv_error() {
        let db = test_db();
        let bad = "name,club,position,value\nX,Y,DEF,lots\n";
        assert!(matches!(
            import_players_from_reader(&db, bad.as_bytes()).unwrap_err(),
            ImportError::Csv(_)
        ));
    }

    #[test]
    fn imports_scores_for_known_players() {
        let db = test_db();
        import_players_from_reader(&db, PLAYERS_CSV.as_bytes()).unwrap();
        let md = create_matchday(&db, 1, t0(), t0() + Duration::hours(3)).unwrap();

        let scores = "name,club,points\nVivian,Athletic,6\nNobody,Athletic,3\nX,Nowhere,1\n";
        let summary = import_scores_from_reader(&db, md.id, scores.as_bytes()).unwrap();
        assert_eq!(summary, ImportSummary { imported: 1, skipped: 2 });

        let stored = db.read(|conn| matchdays::scores_for(conn, md.id)).unwrap();
        assert_eq!(stored.values().copied().collect::<Vec<_>>(), vec![6]);
    }

    #[test]
    fn scores_for_scored_matchday_are_refused() {
        let db = test_db();
        let md = create_matchday(&db, 1, t0(), t0() + Duration::hours(3)).unwrap();
        db.read(|conn| matchdays::set_status(conn, md.id, MatchdayStatus::Scored))
            .unwrap();
        let err = import_scores_from_reader(&db, md.id, "name,club,points\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ImportError::Liga(LigaError::InvalidState(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let db = test_db();
        let err = import_players(&db, Path::new("/nonexistent/players.csv")).unwrap_err();
        assert!(matches!(err, ImportError::Io { .. }));
    }
}
