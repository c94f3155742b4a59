use derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which line ratio a point is played with: male-matching (`M`) or
/// female-matching (`F`).
#[derive(Derivative, Serialize, Deserialize)]
#[derivative(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum RatioSide {
    #[derivative(Default)]
    M,
    F,
}

impl RatioSide {
    pub fn other(self) -> Self {
        match self {
            Self::M => Self::F,
            Self::F => Self::M,
        }
    }

    /// Ratio for the point at `index`, counting from the start of the game.
    ///
    /// The first point uses the starting side, after which the sides swap in
    /// pairs: `start, other, other, start, start, other, other, ...`. The
    /// result depends only on the starting side and the index, so a log can
    /// be relabeled from scratch after any mutation.
    pub fn at_index(start: Self, index: usize) -> Self {
        if (index + 1) / 2 % 2 == 1 {
            start.other()
        } else {
            start
        }
    }
}

impl core::fmt::Display for RatioSide {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match *self {
            Self::M => write!(f, "M"),
            Self::F => write!(f, "F"),
        }
    }
}

impl FromStr for RatioSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "m" | "M" => Ok(Self::M),
            "f" | "F" => Ok(Self::F),
            other => Err(format!("Unknown ratio side: {other}")),
        }
    }
}
