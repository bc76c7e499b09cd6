// Command-line surface of the `liga` binary.

use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

/// Fantasy league market and matchday engine.
#[derive(Parser, Debug)]
#[command(name = "liga")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding `config/` (and `defaults/` for first-run copies)
    #[arg(long, default_value = ".")]
    pub base_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Write missing config files from defaults and create the database
    Init,

    /// Create a league
    CreateLeague {
        name: String,
    },

    /// Create a team and deal it a starting squad
    CreateTeam {
        /// League name
        #[arg(long)]
        league: String,

        /// Username of the owner
        #[arg(long)]
        owner: String,

        /// Team name
        #[arg(long)]
        name: String,
    },

    /// Load the player pool from a `name,club,position,value` CSV
    ImportPlayers {
        path: PathBuf,
    },

    /// Load matchday scores from a `name,club,points` CSV
    ImportScores {
        /// Matchday number
        #[arg(long)]
        matchday: u32,

        path: PathBuf,
    },

    /// Create a matchday (times in RFC 3339, e.g. 2026-09-12T16:00:00Z)
    CreateMatchday {
        number: u32,

        #[arg(long)]
        starts: String,

        #[arg(long)]
        ends: String,
    },

    /// List a fresh batch of free agents on the market
    RotateMarket {
        /// Rotate even if the rotation interval has not passed
        #[arg(long)]
        force: bool,
    },

    /// Resolve closed listings and expire stale offers
    SettleMarket,

    /// Snapshot lineups of matchdays that have kicked off
    FreezeLineups,

    /// Pay out matchdays that have finished
    SettleMatchdays,

    /// Print a league table
    Standings {
        league: String,
    },

    /// Run the scheduler until Ctrl+C
    Run,
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_time(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(s.trim())
        .with_context(|| format!("invalid timestamp `{s}` (expected RFC 3339)"))?;
    Ok(parsed.with_timezone(&Utc))
}
