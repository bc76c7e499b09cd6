// Configuration loading and parsing (config/liga.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::lineup::Formation;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level Config (mirrors liga.toml)
// ---------------------------------------------------------------------------

/// Longest listing, offer or rotation window accepted (one year).
pub const MAX_WINDOW_HOURS: i64 = 24 * 366;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub league: LeagueConfig,
    pub roster: RosterConfig,
    pub lineup: LineupConfig,
    pub market: MarketConfig,
    pub payout: PayoutConfig,
    pub scheduler: SchedulerConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    pub name: String,
    /// Budget every new team starts with.
    pub initial_budget: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterConfig {
    pub max_players: usize,
    pub min_players: usize,
    pub starting_squad: StartingSquad,
}

/// Players dealt to a freshly created team, per position.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StartingSquad {
    pub goalkeepers: usize,
    pub defenders: usize,
    pub midfielders: usize,
    pub forwards: usize,
}

impl StartingSquad {
    pub fn total(&self) -> usize {
        self.goalkeepers + self.defenders + self.midfielders + self.forwards
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineupConfig {
    /// Allowed formations as "DEF-MID-FWD" strings, e.g. "4-4-2".
    pub formations: Vec<String>,
    /// Points deducted per empty starter slot when a lineup is frozen.
    pub missing_player_penalty: i64,
}

impl LineupConfig {
    /// Parsed formations. Entries that fail to parse are skipped; `validate`
    /// rejects such configs before they get this far.
    pub fn allowed_formations(&self) -> Vec<Formation> {
        self.formations
            .iter()
            .filter_map(|f| Formation::parse(f))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Number of free agents kept on the system market.
    pub batch_size: usize,
    pub listing_hours: i64,
    pub rotation_interval_hours: i64,
    pub offer_expiry_hours: i64,
    /// Fraction of the player's value the bank offers for a stale listing.
    pub system_offer_ratio: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayoutConfig {
    /// Money credited per matchday point.
    pub per_point: i64,
    /// Change in player value per point scored.
    pub value_per_point: i64,
    pub min_player_value: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub settle_interval_secs: u64,
    pub freeze_interval_secs: u64,
    /// Directory for the scheduler log file. Empty means the platform data dir.
    #[serde(default)]
    pub log_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

const CONFIG_FILE: &str = "liga.toml";

/// Load and validate `config/liga.toml` relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does that first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let config = parse_config(&text, &path)?;
    validate(&config)?;
    Ok(config)
}

/// Parse config text without touching the filesystem. `path` is only used
/// for error reporting.
pub fn parse_config(text: &str, path: &Path) -> Result<Config, ConfigError> {
    toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Copy `defaults/liga.toml` into `config/` when no local config exists yet.
/// Returns the path written, or `None` when the local file was kept.
pub fn ensure_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = base_dir.join("config").join(CONFIG_FILE);
    if target.exists() {
        return Ok(None);
    }
    let source = base_dir.join("defaults").join(CONFIG_FILE);
    if !source.exists() {
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "no {CONFIG_FILE} under config/ or defaults/ in {}",
                base_dir.display()
            ),
        });
    }

    let copy_err = |e: std::io::Error| ConfigError::DefaultsCopyError {
        message: format!("failed to copy {}: {e}", source.display()),
    };
    std::fs::create_dir_all(base_dir.join("config")).map_err(copy_err)?;
    std::fs::copy(&source, &target).map_err(copy_err)?;
    Ok(Some(target))
}

/// Loads config relative to `base_dir`, copying defaults first.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_file(base_dir)?;
    load_config_from(base_dir)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.league.initial_budget <= 0 {
        return Err(invalid("league.initial_budget", "must be greater than 0"));
    }

    let roster = &config.roster;
    if roster.max_players == 0 {
        return Err(invalid("roster.max_players", "must be greater than 0"));
    }
    if roster.min_players > roster.max_players {
        return Err(invalid(
            "roster.min_players",
            format!(
                "must not exceed roster.max_players ({} > {})",
                roster.min_players, roster.max_players
            ),
        ));
    }
    if roster.starting_squad.total() > roster.max_players {
        return Err(invalid(
            "roster.starting_squad",
            format!(
                "deals {} players but roster.max_players is {}",
                roster.starting_squad.total(),
                roster.max_players
            ),
        ));
    }

    if config.lineup.formations.is_empty() {
        return Err(invalid("lineup.formations", "at least one formation is required"));
    }
    for f in &config.lineup.formations {
        if Formation::parse(f).is_none() {
            return Err(invalid(
                "lineup.formations",
                format!("`{f}` is not a DEF-MID-FWD formation adding up to 10"),
            ));
        }
    }
    if config.lineup.missing_player_penalty < 0 {
        return Err(invalid("lineup.missing_player_penalty", "must be >= 0"));
    }

    let market = &config.market;
    let market_fields: &[(&str, i64)] = &[
        ("market.batch_size", market.batch_size as i64),
        ("market.listing_hours", market.listing_hours),
        ("market.rotation_interval_hours", market.rotation_interval_hours),
        ("market.offer_expiry_hours", market.offer_expiry_hours),
    ];
    for (name, val) in market_fields {
        if *val <= 0 {
            return Err(invalid(name, "must be > 0"));
        }
        if name.ends_with("_hours") && *val > MAX_WINDOW_HOURS {
            return Err(invalid(name, format!("must be <= {MAX_WINDOW_HOURS}, got {val}")));
        }
    }
    let ratio = market.system_offer_ratio;
    if !(ratio > 0.0 && ratio <= 1.0) {
        return Err(invalid(
            "market.system_offer_ratio",
            format!("must be in (0.0, 1.0], got {ratio}"),
        ));
    }

    let payout = &config.payout;
    let payout_fields: &[(&str, i64)] = &[
        ("payout.per_point", payout.per_point),
        ("payout.value_per_point", payout.value_per_point),
        ("payout.min_player_value", payout.min_player_value),
    ];
    for (name, val) in payout_fields {
        if *val < 0 {
            return Err(invalid(name, format!("must be >= 0, got {val}")));
        }
    }

    if config.scheduler.settle_interval_secs == 0 {
        return Err(invalid("scheduler.settle_interval_secs", "must be > 0"));
    }
    if config.scheduler.freeze_interval_secs == 0 {
        return Err(invalid("scheduler.freeze_interval_secs", "must be > 0"));
    }

    Ok(())
}

/// Config used by unit and integration tests: small squads, in-memory DB.
pub fn test_config() -> Config {
    Config {
        league: LeagueConfig {
            name: "Test League".into(),
            initial_budget: 1_000,
        },
        roster: RosterConfig {
            max_players: 15,
            min_players: 2,
            starting_squad: StartingSquad {
                goalkeepers: 1,
                defenders: 4,
                midfielders: 4,
                forwards: 2,
            },
        },
        lineup: LineupConfig {
            formations: vec![
                "3-4-3".into(),
                "3-5-2".into(),
                "4-3-3".into(),
                "4-4-2".into(),
                "4-5-1".into(),
                "5-3-2".into(),
                "5-4-1".into(),
            ],
            missing_player_penalty: 4,
        },
        market: MarketConfig {
            batch_size: 3,
            listing_hours: 24,
            rotation_interval_hours: 24,
            offer_expiry_hours: 48,
            system_offer_ratio: 0.5,
        },
        payout: PayoutConfig {
            per_point: 10,
            value_per_point: 5,
            min_player_value: 10,
        },
        scheduler: SchedulerConfig {
            settle_interval_secs: 60,
            freeze_interval_secs: 30,
            log_dir: String::new(),
        },
        database: DatabaseConfig {
            path: ":memory:".into(),
        },
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
