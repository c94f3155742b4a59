use serde::{Deserialize, Serialize};
use ulti_common::ratio::RatioSide;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Game {
    /// Default match clock duration, used when no saved clock state exists
    /// and when an expired clock is started again.
    pub clock_minutes: u64,
    /// Between-points countdown length.
    pub point_interval_secs: u64,
    pub team_a_name: String,
    pub team_b_name: String,
    pub clock_label: String,
    pub starting_ratio: RatioSide,
    pub autosave_secs: u64,
}

impl Default for Game {
    fn default() -> Self {
        Self {
            clock_minutes: 100,
            point_interval_secs: 90,
            team_a_name: "Team A".to_string(),
            team_b_name: "Team B".to_string(),
            clock_label: "Game".to_string(),
            starting_ratio: RatioSide::M,
            autosave_secs: 15,
        }
    }
}

/// Collaborator endpoints. Both are optional; empty URLs disable the
/// corresponding feature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portal {
    pub roster_url: String,
    pub submit_url: String,
    pub timeout_secs: u64,
}

impl Default for Portal {
    fn default() -> Self {
        Self {
            roster_url: String::new(),
            submit_url: String::new(),
            timeout_secs: 10,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub game: Game,
    pub portal: Portal,
}
