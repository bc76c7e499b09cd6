// Lineup shape: formations and per-position counts of a starting eleven.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::player::Position;

pub const STARTERS: usize = 11;

/// Outfield shape of a starting eleven ("DEF-MID-FWD"), plus one goalkeeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Formation {
    pub defenders: usize,
    pub midfielders: usize,
    pub forwards: usize,
}

impl Formation {
    /// Parse "4-4-2" style strings. The three lines must add up to ten and
    /// every line needs at least one player.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<usize> = s
            .trim()
            .split('-')
            .map(|p| p.trim().parse::<usize>())
            .collect::<Result<_, _>>()
            .ok()?;
        let [defenders, midfielders, forwards] = parts.as_slice() else {
            return None;
        };
        let formation = Formation {
            defenders: *defenders,
            midfielders: *midfielders,
            forwards: *forwards,
        };
        let lines = [formation.defenders, formation.midfielders, formation.forwards];
        if lines.contains(&0) || lines.iter().sum::<usize>() != STARTERS - 1 {
            return None;
        }
        Some(formation)
    }

    fn slots(&self) -> PositionCounts {
        PositionCounts {
            goalkeepers: 1,
            defenders: self.defenders,
            midfielders: self.midfielders,
            forwards: self.forwards,
        }
    }

    /// Whether `counts` fits inside this formation (could be completed to it).
    pub fn accommodates(&self, counts: &PositionCounts) -> bool {
        let slots = self.slots();
        counts.goalkeepers <= slots.goalkeepers
            && counts.defenders <= slots.defenders
            && counts.midfielders <= slots.midfielders
            && counts.forwards <= slots.forwards
    }

    /// Whether `counts` is exactly this formation.
    pub fn matches(&self, counts: &PositionCounts) -> bool {
        self.slots() == *counts
    }
}

impl fmt::Display for Formation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.defenders, self.midfielders, self.forwards)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionCounts {
    pub goalkeepers: usize,
    pub defenders: usize,
    pub midfielders: usize,
    pub forwards: usize,
}

impl PositionCounts {
    pub fn from_positions<I: IntoIterator<Item = Position>>(positions: I) -> Self {
        let mut counts = PositionCounts::default();
        for pos in positions {
            counts.add(pos);
        }
        counts
    }

    pub fn add(&mut self, pos: Position) {
        match pos {
            Position::Goalkeeper => self.goalkeepers += 1,
            Position::Defender => self.defenders += 1,
            Position::Midfielder => self.midfielders += 1,
            Position::Forward => self.forwards += 1,
        }
    }

    pub fn get(&self, pos: Position) -> usize {
        match pos {
            Position::Goalkeeper => self.goalkeepers,
            Position::Defender => self.defenders,
            Position::Midfielder => self.midfielders,
            Position::Forward => self.forwards,
        }
    }

    pub fn total(&self) -> usize {
        self.goalkeepers + self.defenders + self.midfielders + self.forwards
    }
}

/// Result of checking a set of starters against the allowed formations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineupCheck {
    pub counts: PositionCounts,
    /// The allowed formation the starters match exactly, if any.
    pub formation: Option<Formation>,
    /// Empty starter slots.
    pub missing: usize,
}

impl LineupCheck {
    pub fn evaluate(counts: PositionCounts, allowed: &[Formation]) -> Self {
        let formation = allowed.iter().copied().find(|f| f.matches(&counts));
        LineupCheck {
            counts,
            formation,
            missing: STARTERS.saturating_sub(counts.total()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.formation.is_some()
    }

    /// Whether the starters can still be completed to some allowed formation.
    pub fn is_extendable(&self, allowed: &[Formation]) -> bool {
        self.counts.total() <= STARTERS && allowed.iter().any(|f| f.accommodates(&self.counts))
    }
}
