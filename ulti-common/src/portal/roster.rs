use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use skip_error::SkipError;
use std::error::Error;
use time::{Duration, OffsetDateTime};

/// Team name to player names, in source order.
pub type TeamRosters = IndexMap<String, Vec<String>>;

/// Cached rosters expire independently of the session snapshot.
pub const ROSTER_MAX_AGE: Duration = Duration::hours(24);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RosterCache {
    pub teams: TeamRosters,
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
}

impl RosterCache {
    pub fn new(teams: TeamRosters, fetched_at: OffsetDateTime) -> Self {
        Self { teams, fetched_at }
    }

    /// Expiry is checked on read; there is no background sweep.
    pub fn is_fresh(&self, now: OffsetDateTime) -> bool {
        now - self.fetched_at <= ROSTER_MAX_AGE
    }
}

/// Parses a roster source body. The source serves either a JSON object of
/// `{team: [players]}` or a CSV where row 0 holds the team names and each
/// later row holds one player per column, blank cells skipped.
pub fn parse_rosters(body: &str) -> Result<TeamRosters, Box<dyn Error>> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') {
        Ok(serde_json::from_str(trimmed)?)
    } else {
        parse_roster_csv(body)
    }
}

fn parse_roster_csv(body: &str) -> Result<TeamRosters, Box<dyn Error>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut records = reader.records().skip_error();
    let header = records.next().ok_or("Roster source returned no rows")?;
    let columns: Vec<String> = header.iter().map(|cell| cell.trim().to_string()).collect();

    let mut rosters: TeamRosters = columns
        .iter()
        .filter(|team| !team.is_empty())
        .map(|team| (team.clone(), Vec::new()))
        .collect();

    for row in records {
        for (i, cell) in row.iter().enumerate() {
            let player = cell.trim();
            if player.is_empty() {
                continue;
            }
            let Some(team) = columns.get(i) else {
                continue;
            };
            if let Some(players) = rosters.get_mut(team) {
                players.push(player.to_string());
            }
        }
    }

    Ok(rosters)
}
