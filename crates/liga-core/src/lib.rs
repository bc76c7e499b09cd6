// Library root: the league engine. Persistence, market and roster rules,
// matchday jobs, and the configuration they run under.

pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod league;
pub mod market;
pub mod matchday;
pub mod model;
pub mod notify;
pub mod roster;

pub use error::{LigaError, Result};
