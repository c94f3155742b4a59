use crate::{
    config::Game as GameConfig,
    store::{KeyValueStore, keys},
};
use log::{info, warn};
use thiserror::Error;
use time::OffsetDateTime;
use ulti_common::{
    ratio::RatioSide,
    side::{Side, SideBundle},
    snapshot::{PointEntry, SessionSnapshot, format_recorded_at, new_point_id},
};

pub mod clock;

/// Owns the canonical in-memory match state and coordinates its persistence.
/// Every mutating call marks the state dirty; `flush` is the only call that
/// clears the flag, and only after the store accepted the write.
pub struct MatchManager {
    defaults: GameConfig,
    snapshot: SessionSnapshot,
    dirty: bool,
    pending_restore: bool,
}

/// Outcome of the startup restore prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreDecision {
    Restore,
    Discard,
}

/// The blocking startup confirmation. Initialization waits on `decide`, so
/// implementations may prompt interactively; they must always produce a
/// decision (the console implementation falls back to `Restore` when no
/// answer can be obtained, never silently dropping data).
pub trait RestorePrompt {
    fn decide(&mut self, snapshot: &SessionSnapshot) -> RestoreDecision;
}

/// A point-log row projection: derived, disposable, recomputed after any
/// mutation. The ratio marker is a pure function of the row's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRowView<'a> {
    pub index: usize,
    pub ratio: RatioSide,
    pub entry: &'a PointEntry,
}

impl MatchManager {
    /// Loads the saved session, synthesizing defaults on a missing, corrupt,
    /// or too-old snapshot. Always succeeds; whether the restore prompt is
    /// needed afterwards is reported by [`Self::needs_restore_prompt`].
    pub fn load(store: &KeyValueStore, defaults: GameConfig, now: OffsetDateTime) -> Self {
        let mut manager = Self {
            snapshot: fresh_snapshot(&defaults),
            defaults,
            dirty: false,
            pending_restore: false,
        };

        if let Some(saved) = store.get_opt::<SessionSnapshot>(keys::SESSION) {
            if saved.is_stale(now) {
                info!(
                    "Ignoring saved session from {}, it is more than a week old",
                    saved.saved_at
                );
            } else if !saved.within_restore_window(now) {
                info!(
                    "Saved session from {} is too old to offer for restoration",
                    saved.saved_at
                );
            } else {
                manager.pending_restore = !saved.point_log.is_empty();
                manager.snapshot = saved;
                manager.rebuild();
            }
        }

        manager
    }

    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn needs_restore_prompt(&self) -> bool {
        self.pending_restore
    }

    /// Applies the startup restore decision. Restoring keeps the loaded
    /// snapshot (already rebuilt); discarding starts a fresh session.
    pub fn resolve_restore(&mut self, decision: RestoreDecision, now: OffsetDateTime) {
        self.pending_restore = false;
        match decision {
            RestoreDecision::Restore => {
                info!(
                    "Restoring previous session {} with {} points",
                    self.snapshot.match_id(),
                    self.snapshot.point_log.len()
                );
                self.mark_dirty();
            }
            RestoreDecision::Discard => {
                info!("Discarding previous session");
                self.reset(now);
            }
        }
    }

    /// Persists the snapshot if it has changed since the last successful
    /// flush. On failure the dirty flag stays set and the in-memory snapshot
    /// remains authoritative; the next flush retries. Flushing a clean
    /// manager performs no write at all.
    pub fn flush(&mut self, store: &mut KeyValueStore, now: OffsetDateTime) -> bool {
        if !self.dirty {
            return true;
        }

        self.snapshot.saved_at = now;
        if store.put(keys::SESSION, &self.snapshot, now) {
            self.dirty = false;
            info!("Session snapshot persisted");
            true
        } else {
            warn!("Session snapshot could not be persisted, keeping it dirty for retry");
            false
        }
    }

    /// Records a point for `side`: O(1) score increment, fresh id, append to
    /// the log. The entry stores the resolved team name, so later renames
    /// leave history untouched.
    pub fn add_point(
        &mut self,
        side: Side,
        scorer: &str,
        assist: &str,
        now: OffsetDateTime,
    ) -> Result<()> {
        let scorer = scorer.trim();
        let assist = assist.trim();
        if scorer.is_empty() {
            return Err(MatchManagerError::MissingScorer);
        }
        if assist.is_empty() {
            return Err(MatchManagerError::MissingAssist);
        }

        let mut id = new_point_id();
        while self.snapshot.point_log.iter().any(|e| e.id == id) {
            id = new_point_id();
        }

        let entry = PointEntry {
            id,
            match_id: self.snapshot.match_id(),
            recorded_at: format_recorded_at(now),
            team: self.snapshot.team_names[side].clone(),
            scorer: scorer.to_string(),
            assist: assist.to_string(),
        };

        self.snapshot.scores[side] += 1;
        info!(
            "{} Point for {} scored by {scorer}, assist by {assist}",
            self.score_string(),
            entry.team
        );
        self.snapshot.point_log.push(entry);
        self.mark_dirty();
        Ok(())
    }

    /// Mutates only `scorer`/`assist` of the entry with `id`. An unknown id
    /// fails without touching anything.
    pub fn edit_point(&mut self, id: &str, scorer: &str, assist: &str) -> Result<()> {
        let scorer = scorer.trim();
        let assist = assist.trim();
        if scorer.is_empty() {
            return Err(MatchManagerError::MissingScorer);
        }
        if assist.is_empty() {
            return Err(MatchManagerError::MissingAssist);
        }

        let entry = self
            .snapshot
            .point_log
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| MatchManagerError::PointNotFound(id.to_string()))?;

        info!("Editing point {id}: scorer {scorer}, assist {assist}");
        entry.scorer = scorer.to_string();
        entry.assist = assist.to_string();
        self.mark_dirty();
        Ok(())
    }

    /// Removes the entry with `id` and rebuilds: totals and ratio markers
    /// are positional, so every later entry's derived values change, not
    /// just the deleted one's.
    pub fn delete_point(&mut self, id: &str) -> Result<PointEntry> {
        let index = self
            .snapshot
            .point_log
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| MatchManagerError::PointNotFound(id.to_string()))?;

        let removed = self.snapshot.point_log.remove(index);
        self.rebuild();
        info!(
            "{} Deleted point {id} ({} by {})",
            self.score_string(),
            removed.team,
            removed.scorer
        );
        self.mark_dirty();
        Ok(removed)
    }

    /// Recomputes both running totals from the log, matching each entry's
    /// recorded team name against the current names. Entries whose team no
    /// longer matches either side stay in the log but count for neither.
    pub fn rebuild(&mut self) {
        let mut scores = SideBundle::default();
        for entry in &self.snapshot.point_log {
            match self.snapshot.side_for_team(&entry.team) {
                Some(side) => scores[side] += 1,
                None => warn!(
                    "Point {} belongs to {}, which is no longer a team in this match",
                    entry.id, entry.team
                ),
            }
        }
        self.snapshot.scores = scores;
    }

    /// Derived table rows in log order, each with its positional ratio
    /// marker.
    pub fn log_rows(&self) -> Vec<LogRowView<'_>> {
        let start = self.snapshot.starting_ratio;
        self.snapshot
            .point_log
            .iter()
            .enumerate()
            .map(|(index, entry)| LogRowView {
                index,
                ratio: RatioSide::at_index(start, index),
                entry,
            })
            .collect()
    }

    /// Replaces the whole session with fresh defaults. Used for an explicit
    /// new match and after a successful export.
    pub fn reset(&mut self, _now: OffsetDateTime) {
        info!("Starting a fresh session");
        self.snapshot = fresh_snapshot(&self.defaults);
        self.mark_dirty();
    }

    pub fn set_team_name(&mut self, side: Side, name: &str) {
        let name = name.trim();
        info!("Team {side} is now {name}");
        self.snapshot.team_names[side] = name.to_string();
        self.rebuild();
        self.mark_dirty();
    }

    pub fn set_roster(&mut self, side: Side, players: &str) {
        self.snapshot.rosters[side] = players.to_string();
        self.mark_dirty();
    }

    pub fn set_starting_ratio(&mut self, ratio: RatioSide) {
        info!("Starting ratio is now {ratio}");
        self.snapshot.starting_ratio = ratio;
        self.mark_dirty();
    }

    pub fn set_clock_label(&mut self, label: &str) {
        self.snapshot.clock_label = label.trim().to_string();
        self.mark_dirty();
    }

    fn score_string(&self) -> String {
        format!(
            "[{} {} - {} {}]",
            self.snapshot.team_names.a,
            self.snapshot.scores.a,
            self.snapshot.scores.b,
            self.snapshot.team_names.b
        )
    }
}

fn fresh_snapshot(defaults: &GameConfig) -> SessionSnapshot {
    SessionSnapshot {
        team_names: SideBundle {
            a: defaults.team_a_name.clone(),
            b: defaults.team_b_name.clone(),
        },
        clock_label: defaults.clock_label.clone(),
        starting_ratio: defaults.starting_ratio,
        ..Default::default()
    }
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum MatchManagerError {
    #[error("A scorer is required to record a point")]
    MissingScorer,
    #[error("An assist is required to record a point")]
    MissingAssist,
    #[error("No point with id {0} exists")]
    PointNotFound(String),
}

pub type Result<T> = std::result::Result<T, MatchManagerError>;
