// Free-agent market rotation: keeps a batch of unowned players on sale.

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::db::{players, Database};
use crate::error::Result;
use crate::model::player::Listing;
use crate::model::{from_epoch, to_epoch};

/// `app_state` key holding the last rotation time.
const ROTATION_STATE_KEY: &str = "market_rotation";

#[derive(Debug, Serialize, Deserialize)]
struct RotationState {
    last_rotation: i64,
}

/// Top the system market back up to `batch_size` open listings with random
/// free agents. Returns how many players were listed.
pub fn rotate_market<R: Rng + ?Sized>(
    db: &Database,
    config: &Config,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<usize> {
    db.transaction(|conn| {
        let open = players::active_system_listings(conn, now)?;
        let wanted = config.market.batch_size.saturating_sub(open);
        if wanted == 0 {
            debug!("Market already holds {} listings", open);
            return Ok(0);
        }

        let mut pool = players::unlisted_free_agents(conn, None)?;
        pool.shuffle(rng);
        let listing = Listing {
            listed_at: now,
            listed_until: now + Duration::hours(config.market.listing_hours),
            asking_price: None,
            chased: false,
        };
        let mut listed = 0;
        for player in pool.iter().take(wanted) {
            players::set_listing(conn, player.id, &listing)?;
            listed += 1;
        }

        info!(listed, open, pool = pool.len(), "Market rotated");
        Ok(listed)
    })
}

/// Rotate only when `rotation_interval_hours` passed since the last rotation.
/// Returns `None` when it was not due yet.
pub fn rotate_market_if_due<R: Rng + ?Sized>(
    db: &Database,
    config: &Config,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<Option<usize>> {
    if let Some(last) = last_rotation(db)? {
        if now - last < Duration::hours(config.market.rotation_interval_hours) {
            return Ok(None);
        }
    }

    let listed = rotate_market(db, config, now, rng)?;
    let state = RotationState {
        last_rotation: to_epoch(now),
    };
    db.save_state(ROTATION_STATE_KEY, &serde_json::to_value(&state)?)?;
    Ok(Some(listed))
}

pub fn last_rotation(db: &Database) -> Result<Option<DateTime<Utc>>> {
    match db.load_state(ROTATION_STATE_KEY)? {
        Some(value) => {
            let state: RotationState = serde_json::from_value(value)?;
            Ok(Some(from_epoch(state.last_rotation)))
        }
        None => Ok(None),
    }
}
