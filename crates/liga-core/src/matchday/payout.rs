// Matchday payout job: scores frozen lineups, pays teams, revalues players.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{matchdays, players, teams, Database};
use crate::error::Result;
use crate::model::matchday::{Matchday, MatchdayResult, MatchdayStatus};
use crate::model::notification::NotificationKind;
use crate::notify::notify;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PayoutReport {
    pub matchdays_scored: usize,
    pub teams_paid: usize,
    pub total_payout: i64,
    pub failures: usize,
}

/// Team points for a frozen lineup: the starters' scores minus the penalty
/// for every empty slot. Unscored starters count zero.
pub fn lineup_points(scores: impl IntoIterator<Item = i64>, missing: usize, penalty: i64) -> i64 {
    scores.into_iter().sum::<i64>() - missing as i64 * penalty
}

/// Money for a matchday: negative points pay nothing.
pub fn payout_for(points: i64, per_point: i64) -> i64 {
    points.max(0) * per_point
}

/// Pay out every frozen matchday whose last match ended by `now`.
pub fn settle_matchdays(db: &Database, config: &Config, now: DateTime<Utc>) -> Result<PayoutReport> {
    let mut report = PayoutReport::default();

    for matchday in db.read(|conn| matchdays::due_for_payout(conn, now))? {
        match db.transaction(|conn| pay_matchday(conn, config, &matchday, now)) {
            Ok((paid, total)) => {
                report.matchdays_scored += 1;
                report.teams_paid += paid;
                report.total_payout += total;
                info!(number = matchday.number, teams = paid, total, "Matchday paid out");
            }
            Err(e) => {
                warn!(number = matchday.number, "Failed to pay out matchday: {}", e);
                report.failures += 1;
            }
        }
    }
    Ok(report)
}

fn pay_matchday(
    conn: &Connection,
    config: &Config,
    matchday: &Matchday,
    now: DateTime<Utc>,
) -> Result<(usize, i64)> {
    let scores = matchdays::scores_for(conn, matchday.id)?;
    let frozen = matchdays::results_for(conn, matchday.id)?;
    let mut total = 0;

    for result in &frozen {
        let snapshot = matchdays::snapshot_for(conn, matchday.id, result.team_id)?;
        let points = lineup_points(
            snapshot
                .iter()
                .map(|e| scores.get(&e.player_id).copied().unwrap_or(0)),
            result.missing,
            config.lineup.missing_player_penalty,
        );
        let payout = payout_for(points, config.payout.per_point);

        teams::adjust_budget(conn, result.team_id, payout)?;
        teams::add_points(conn, result.team_id, points)?;
        matchdays::insert_result(
            conn,
            &MatchdayResult {
                points: Some(points),
                payout: Some(payout),
                ..result.clone()
            },
        )?;
        notify(
            conn,
            result.team_id,
            NotificationKind::Payout,
            &format!(
                "Matchday {}: {} points, {} paid to your budget",
                matchday.number, points, payout
            ),
            now,
        )?;
        total += payout;
    }

    for (player_id, points) in &scores {
        players::apply_score(
            conn,
            *player_id,
            *points,
            config.payout.value_per_point,
            config.payout.min_player_value,
        )?;
    }

    matchdays::set_status(conn, matchday.id, MatchdayStatus::Scored)?;
    Ok((frozen.len(), total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::db::test_support::*;
    use crate::matchday::{create_matchday, freeze_lineups, record_score};
    use crate::model::player::Position;
    use chrono::Duration;

    #[test]
    fn lineup_points_apply_missing_penalty() {
        assert_eq!(lineup_points([5, 3, -1], 0, 4), 7);
        assert_eq!(lineup_points([5, 3], 9, 4), -28);
        assert_eq!(lineup_points(Vec::new(), 11, 4), -44);
    }

    #[test]
    fn negative_points_pay_nothing() {
        assert_eq!(payout_for(-3, 10), 0);
        assert_eq!(payout_for(12, 10), 120);
    }

    #[test]
    fn pays_teams_and_revalues_players() {
        let db = test_db();
        let config = test_config();
        let (team, gk, def, bench) = db
            .transaction(|conn| {
                let league = seed_league(conn);
                let team = seed_team(conn, league, "ana", 100);
                let gk = seed_owned(conn, team, "Remiro", Position::Goalkeeper, 50, true);
                let def = seed_owned(conn, team, "Laporte", Position::Defender, 50, true);
                let bench = seed_owned(conn, team, "Reserve", Position::Forward, 50, false);
                Ok((team, gk, def, bench))
            })
            .unwrap();
        let md = create_matchday(&db, 1, t0(), t0() + Duration::hours(3)).unwrap();
        freeze_lineups(&db, &config, t0()).unwrap();

        record_score(&db, md.id, gk, 30).unwrap();
        record_score(&db, md.id, def, 20).unwrap();
        record_score(&db, md.id, bench, 15).unwrap();

        let early = settle_matchdays(&db, &config, t0() + Duration::hours(2)).unwrap();
        assert_eq!(early.matchdays_scored, 0);

        let report = settle_matchdays(&db, &config, t0() + Duration::hours(3)).unwrap();
        assert_eq!(report.matchdays_scored, 1);
        // 30 + 20 starters, 9 empty slots at 4 points each.
        let points = 50 - 36;
        assert_eq!(report.total_payout, points * config.payout.per_point);

        db.read(|conn| {
            let t = teams::get(conn, team)?;
            assert_eq!(t.points, points);
            assert_eq!(t.budget, 100 + points * config.payout.per_point);
            // Bench points still move the player's value.
            let reserve = players::get(conn, bench)?;
            assert_eq!(reserve.total_points, 15);
            assert_eq!(reserve.value, 50 + 15 * config.payout.value_per_point);
            let result = &matchdays::results_for(conn, md.id)?[0];
            assert_eq!(result.points, Some(points));
            Ok(())
        })
        .unwrap();

        // Second run finds nothing to do and scores are locked.
        assert_eq!(
            settle_matchdays(&db, &config, t0() + Duration::days(1)).unwrap(),
            PayoutReport::default()
        );
        assert!(record_score(&db, md.id, gk, 99).is_err());
    }

    #[test]
    fn unfrozen_matchday_is_not_paid() {
        let db = test_db();
        let config = test_config();
        create_matchday(&db, 1, t0(), t0() + Duration::hours(3)).unwrap();
        let report = settle_matchdays(&db, &config, t0() + Duration::days(1)).unwrap();
        assert_eq!(report.matchdays_scored, 0);
    }
}
