use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use thiserror::Error;

/// A single Rock-Paper-Scissors throw.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

/// Result of comparing two moves, from the first player's perspective.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl Outcome {
    /// The same result seen from the other player's side.
    pub fn reversed(self) -> Outcome {
        match self {
            Outcome::Win => Outcome::Loss,
            Outcome::Loss => Outcome::Win,
            Outcome::Draw => Outcome::Draw,
        }
    }
}

impl Move {
    /// Compare this move against `other` under the fixed cycle:
    /// Rock beats Scissors, Scissors beats Paper, Paper beats Rock.
    pub fn beats(self, other: Move) -> Outcome {
        use Move::*;
        match (self, other) {
            (a, b) if a == b => Outcome::Draw,
            (Rock, Scissors) | (Scissors, Paper) | (Paper, Rock) => Outcome::Win,
            _ => Outcome::Loss,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Move::Rock => 'R',
            Move::Paper => 'P',
            Move::Scissors => 'S',
        }
    }
}

impl Display for Move {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("not a move, expected one of R, P, S")]
pub struct ParseMoveError;

impl FromStr for Move {
    type Err = ParseMoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("R") {
            Ok(Move::Rock)
        } else if s.eq_ignore_ascii_case("P") {
            Ok(Move::Paper)
        } else if s.eq_ignore_ascii_case("S") {
            Ok(Move::Scissors)
        } else {
            Err(ParseMoveError)
        }
    }
}
