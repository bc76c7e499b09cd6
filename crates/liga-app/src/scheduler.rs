// Long-running job loop: market rotation and settlement, lineup freeze,
// matchday payout.
//
// Jobs never stop the loop. A failed cycle is logged and retried on the next
// tick.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use liga_core::config::Config;
use liga_core::db::Database;
use liga_core::{market, matchday};
use rand::Rng;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// How many cycles ran before shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub settle_cycles: usize,
    pub freeze_cycles: usize,
    pub failed_jobs: usize,
}

/// Run both job intervals until `shutdown` resolves.
///
/// Both intervals fire immediately on start, so anything that fell due while
/// the process was down is handled first.
pub async fn run<R, F>(db: &Database, config: &Config, mut rng: R, shutdown: F) -> SchedulerStats
where
    R: Rng,
    F: Future<Output = ()>,
{
    let mut stats = SchedulerStats::default();

    let mut settle_interval =
        tokio::time::interval(Duration::from_secs(config.scheduler.settle_interval_secs));
    settle_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut freeze_interval =
        tokio::time::interval(Duration::from_secs(config.scheduler.freeze_interval_secs));
    freeze_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tokio::pin!(shutdown);
    info!(
        settle_secs = config.scheduler.settle_interval_secs,
        freeze_secs = config.scheduler.freeze_interval_secs,
        "Scheduler started"
    );

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping scheduler");
                break;
            }

            _ = settle_interval.tick() => {
                stats.settle_cycles += 1;
                stats.failed_jobs += settle_cycle(db, config, Utc::now(), &mut rng);
            }

            _ = freeze_interval.tick() => {
                stats.freeze_cycles += 1;
                stats.failed_jobs += freeze_cycle(db, config, Utc::now());
            }
        }
    }

    info!(
        settle_cycles = stats.settle_cycles,
        freeze_cycles = stats.freeze_cycles,
        failed_jobs = stats.failed_jobs,
        "Scheduler stopped"
    );
    stats
}

/// Rotation (when due), market settlement, matchday payout. Returns the
/// number of jobs that failed.
pub fn settle_cycle<R: Rng + ?Sized>(db: &Database, config: &Config, now: DateTime<Utc>, rng: &mut R) -> usize {
    let mut failed = 0;

    if let Err(e) = market::rotate_market_if_due(db, config, now, rng) {
        error!("Market rotation failed: {}", e);
        failed += 1;
    }
    match market::settle_market(db, config, now) {
        Ok(report) => failed += report.failures,
        Err(e) => {
            error!("Market settlement failed: {}", e);
            failed += 1;
        }
    }
    match matchday::settle_matchdays(db, config, now) {
        Ok(report) => failed += report.failures,
        Err(e) => {
            error!("Matchday payout failed: {}", e);
            failed += 1;
        }
    }
    failed
}

pub fn freeze_cycle(db: &Database, config: &Config, now: DateTime<Utc>) -> usize {
    match matchday::freeze_lineups(db, config, now) {
        Ok(report) => report.failures,
        Err(e) => {
            error!("Lineup freeze failed: {}", e);
            1
        }
    }
}
