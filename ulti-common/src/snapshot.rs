use crate::{
    ratio::RatioSide,
    side::{Side, SideBundle},
};
use rand::{Rng, SeedableRng, distr::Alphanumeric, rngs::StdRng};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime, macros::format_description};

/// Saved sessions older than this are never offered for restoration and are
/// discarded by the store's remediation pass.
pub const SNAPSHOT_MAX_AGE: Duration = Duration::days(7);

/// Saved sessions within this window trigger the startup restore prompt.
pub const RESTORE_WINDOW: Duration = Duration::hours(24);

const POINT_ID_LEN: usize = 12;

/// The complete persisted match state at a point in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub scores: SideBundle<u32>,
    pub team_names: SideBundle<String>,
    pub rosters: SideBundle<String>,
    pub clock_label: String,
    pub point_log: Vec<PointEntry>,
    pub starting_ratio: RatioSide,
    #[serde(with = "time::serde::rfc3339")]
    pub saved_at: OffsetDateTime,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            scores: Default::default(),
            team_names: SideBundle {
                a: "Team A".to_string(),
                b: "Team B".to_string(),
            },
            rosters: Default::default(),
            clock_label: "Game".to_string(),
            point_log: Vec::new(),
            starting_ratio: RatioSide::default(),
            saved_at: OffsetDateTime::UNIX_EPOCH,
        }
    }
}

impl SessionSnapshot {
    pub fn match_id(&self) -> String {
        format!("{} vs {}", self.team_names.a, self.team_names.b)
    }

    /// Resolves a recorded team name back to a side using the *current*
    /// names. If both teams share a name, side A wins.
    pub fn side_for_team(&self, team: &str) -> Option<Side> {
        self.team_names
            .iter()
            .find(|(_, name)| name.as_str() == team)
            .map(|(side, _)| side)
    }

    pub fn is_stale(&self, now: OffsetDateTime) -> bool {
        now - self.saved_at > SNAPSHOT_MAX_AGE
    }

    pub fn within_restore_window(&self, now: OffsetDateTime) -> bool {
        now - self.saved_at <= RESTORE_WINDOW
    }
}

/// One recorded score. `team` is the resolved team name at creation time; a
/// later rename does not relabel existing entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointEntry {
    pub id: String,
    pub match_id: String,
    pub recorded_at: String,
    pub team: String,
    pub scorer: String,
    pub assist: String,
}

/// Opaque point id, unique within a session to any practical certainty. The
/// caller still checks for collisions against the live log before use.
pub fn new_point_id() -> String {
    StdRng::from_os_rng()
        .sample_iter(Alphanumeric)
        .take(POINT_ID_LEN)
        .map(char::from)
        .collect()
}

pub fn format_recorded_at(now: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    now.format(&format)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

/// Persisted match-clock state, assembled from the three clock keys in the
/// store. At most one of `end_time` and `remaining_ms` is set in any defined
/// state, and `is_running` implies `end_time` is set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_time: Option<OffsetDateTime>,
    pub remaining_ms: Option<u64>,
    pub is_running: bool,
}
