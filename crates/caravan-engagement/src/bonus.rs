//! Probabilistic bonus engine.
//!
//! A pure function: given a random source, a point table and the
//! first-of-kind flag, produce a bonus award. It never touches ledger state
//! and never reaches for a global RNG. Callers inject the source, so tests
//! can supply deterministic sequences.

use rand::Rng;
use serde::Serialize;

/// Draws below this threshold pay the jackpot bonus.
pub const JACKPOT_BAND: f64 = 0.05;
/// Draws below this threshold (and above the jackpot band) pay the minor bonus.
pub const MINOR_BAND: f64 = 0.20;

/// Point table for one family of bonus-bearing events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BonusSchedule {
    /// Emoji reactions: first 1, jackpot 4, minor 2.
    Reaction,
    /// Photo uploads: first 5, jackpot 10, minor 5.
    Upload,
}

impl BonusSchedule {
    fn first(self) -> u64 {
        match self {
            BonusSchedule::Reaction => 1,
            BonusSchedule::Upload => 5,
        }
    }

    fn jackpot(self) -> u64 {
        match self {
            BonusSchedule::Reaction => 4,
            BonusSchedule::Upload => 10,
        }
    }

    fn minor(self) -> u64 {
        match self {
            BonusSchedule::Reaction => 2,
            BonusSchedule::Upload => 5,
        }
    }

    fn noun(self) -> &'static str {
        match self {
            BonusSchedule::Reaction => "cheer",
            BonusSchedule::Upload => "photo",
        }
    }
}

/// A bonus award. Zero points means the roll won nothing; the label is a
/// user-facing celebration string and not part of any contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Bonus {
    pub points: u64,
    pub label: Option<String>,
}

impl Bonus {
    pub fn none() -> Self {
        Self { points: 0, label: None }
    }

    pub fn won(&self) -> bool {
        self.points > 0
    }
}

/// Compute the bonus for one event.
///
/// First-of-kind always takes precedence over the random bands: the very
/// first qualifying action in a scope pays a fixed bonus and skips the roll.
pub fn compute_bonus<R: Rng + ?Sized>(
    rng: &mut R,
    schedule: BonusSchedule,
    first_of_kind: bool,
) -> Bonus {
    if first_of_kind {
        let points = schedule.first();
        return Bonus {
            points,
            label: Some(format!("First {} here! +{points} bonus", schedule.noun())),
        };
    }

    let roll: f64 = rng.random();
    if roll < JACKPOT_BAND {
        let points = schedule.jackpot();
        Bonus {
            points,
            label: Some(format!("Jackpot! +{points} bonus")),
        }
    } else if roll < MINOR_BAND {
        let points = schedule.minor();
        Bonus {
            points,
            label: Some(format!("Lucky roll! +{points} bonus")),
        }
    } else {
        Bonus::none()
    }
}
