use log::{info, warn};
use std::time::Duration as StdDuration;
use time::{Duration, OffsetDateTime};
use tokio::sync::watch;
use ulti_common::snapshot::TimerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClockState {
    /// Idle or paused, holding the (non-negative) time left.
    Stopped { time_remaining: StdDuration },
    /// Counting down toward an absolute wall-clock target.
    Running { end_time: OffsetDateTime },
    /// The target has passed while running; the display keeps counting into
    /// negative time until the clock is stopped or reset.
    Expired { end_time: OffsetDateTime },
}

impl ClockState {
    fn is_running(&self) -> bool {
        matches!(self, ClockState::Running { .. })
    }

    /// Signed time remaining; negative once a running clock passes its
    /// target.
    fn time_remaining(&self, now: OffsetDateTime) -> Duration {
        match *self {
            ClockState::Stopped { time_remaining } => {
                Duration::try_from(time_remaining).unwrap_or(Duration::MAX)
            }
            ClockState::Running { end_time } | ClockState::Expired { end_time } => end_time - now,
        }
    }
}

/// The match clock: a resettable, pausable countdown to a wall-clock target.
/// The target is persisted as an absolute timestamp so time spent with the
/// process closed is accounted for on restore. The clock is a countdown
/// *target*, not a strict non-negative counter: a running clock that passes
/// its target keeps displaying into negative time.
pub struct GameClock {
    default_duration: StdDuration,
    state: ClockState,
    start_stop_tx: watch::Sender<bool>,
    start_stop_rx: watch::Receiver<bool>,
}

impl GameClock {
    pub fn new(default_duration: StdDuration) -> Self {
        let (start_stop_tx, start_stop_rx) = watch::channel(false);
        Self {
            default_duration,
            state: ClockState::Stopped {
                time_remaining: default_duration,
            },
            start_stop_tx,
            start_stop_rx,
        }
    }

    pub fn start_stop_rx(&self) -> watch::Receiver<bool> {
        self.start_stop_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn time_remaining(&self, now: OffsetDateTime) -> Duration {
        self.state.time_remaining(now)
    }

    /// True once the clock has passed its target, while still displaying.
    pub fn is_overtime(&self, now: OffsetDateTime) -> bool {
        match self.state {
            ClockState::Stopped { .. } => false,
            ClockState::Running { .. } | ClockState::Expired { .. } => {
                self.time_remaining(now).is_negative()
            }
        }
    }

    /// No-op while running. A stopped clock with nothing left restarts from
    /// the default duration.
    pub fn start(&mut self, now: OffsetDateTime) {
        match self.state {
            ClockState::Stopped { time_remaining } => {
                let time_remaining = if time_remaining.is_zero() {
                    self.default_duration
                } else {
                    time_remaining
                };
                info!("Starting the game clock with {time_remaining:?} remaining");
                self.state = ClockState::Running {
                    end_time: now + time_remaining,
                };
                self.send_clock_running(true);
            }
            ClockState::Running { .. } => {}
            ClockState::Expired { .. } => {
                warn!("Can't start the game clock while it is in overtime; stop or reset it first");
            }
        }
    }

    /// Pauses the clock, clamping the stored remaining time to zero: a
    /// paused clock never holds negative time, even though a running clock
    /// past its target transiently displays negative.
    pub fn stop(&mut self, now: OffsetDateTime) {
        match self.state {
            ClockState::Running { end_time } | ClockState::Expired { end_time } => {
                let time_remaining =
                    StdDuration::try_from(end_time - now).unwrap_or(StdDuration::ZERO);
                info!("Stopping the game clock with {time_remaining:?} remaining");
                self.state = ClockState::Stopped { time_remaining };
                self.send_clock_running(false);
            }
            ClockState::Stopped { .. } => {}
        }
    }

    /// Forces the stopped state with the given duration, superseding any
    /// running countdown.
    pub fn reset(&mut self, duration: StdDuration) {
        info!("Resetting the game clock to {duration:?}");
        let was_running = self.is_running();
        self.state = ClockState::Stopped {
            time_remaining: duration,
        };
        if was_running {
            self.send_clock_running(false);
        }
    }

    /// Periodic recomputation: a running clock whose target has passed
    /// leaves the running state but keeps its target for the overtime
    /// display.
    pub fn update(&mut self, now: OffsetDateTime) {
        if let ClockState::Running { end_time } = self.state {
            if end_time <= now {
                info!("Game clock reached its target, display continuing into overtime");
                self.state = ClockState::Expired { end_time };
                self.send_clock_running(false);
            }
        }
    }

    pub fn persisted(&self) -> TimerState {
        match self.state {
            ClockState::Stopped { time_remaining } => TimerState {
                end_time: None,
                remaining_ms: Some(time_remaining.as_millis() as u64),
                is_running: false,
            },
            ClockState::Running { end_time } => TimerState {
                end_time: Some(end_time),
                remaining_ms: None,
                is_running: true,
            },
            ClockState::Expired { end_time } => TimerState {
                end_time: Some(end_time),
                remaining_ms: None,
                is_running: false,
            },
        }
    }

    /// Reload recovery. A clock that was running resumes toward the same
    /// absolute target (never restarting from the original duration); one
    /// whose target passed while the process was closed comes back in the
    /// overtime display state; a paused one comes back paused; anything else
    /// initializes to the default duration.
    pub fn restore(&mut self, persisted: TimerState, now: OffsetDateTime) {
        self.state = match persisted {
            TimerState {
                is_running: true,
                end_time: Some(end_time),
                ..
            } => {
                if end_time <= now {
                    info!("Restored game clock is already past its target");
                    ClockState::Expired { end_time }
                } else {
                    info!("Resuming game clock, {} remaining", end_time - now);
                    ClockState::Running { end_time }
                }
            }
            TimerState {
                is_running: false,
                remaining_ms: Some(ms),
                ..
            } => ClockState::Stopped {
                time_remaining: StdDuration::from_millis(ms),
            },
            TimerState {
                is_running: false,
                end_time: Some(end_time),
                ..
            } => ClockState::Expired { end_time },
            _ => ClockState::Stopped {
                time_remaining: self.default_duration,
            },
        };
        if self.is_running() {
            self.send_clock_running(true);
        }
    }

    fn send_clock_running(&self, running: bool) {
        // The receiver half lives as long as `self`, so this can't fail
        let _ = self.start_stop_tx.send(running);
    }
}

/// The between-points clock: the same start/stop/reset machine as
/// [`GameClock`] but ephemeral (never persisted, fresh on every startup) and
/// clamping to zero on expiry instead of running over. It models a fixed
/// interval, not a match clock.
pub struct PointClock {
    default_duration: StdDuration,
    state: ClockState,
}

impl PointClock {
    pub fn new(default_duration: StdDuration) -> Self {
        Self {
            default_duration,
            state: ClockState::Stopped {
                time_remaining: default_duration,
            },
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Remaining time, clamped to zero.
    pub fn time_remaining(&self, now: OffsetDateTime) -> StdDuration {
        StdDuration::try_from(self.state.time_remaining(now)).unwrap_or(StdDuration::ZERO)
    }

    pub fn start(&mut self, now: OffsetDateTime) {
        if let ClockState::Stopped { time_remaining } = self.state {
            let time_remaining = if time_remaining.is_zero() {
                self.default_duration
            } else {
                time_remaining
            };
            info!("Starting the point clock with {time_remaining:?} remaining");
            self.state = ClockState::Running {
                end_time: now + time_remaining,
            };
        }
    }

    pub fn stop(&mut self, now: OffsetDateTime) {
        if let ClockState::Running { end_time } = self.state {
            let time_remaining = StdDuration::try_from(end_time - now).unwrap_or(StdDuration::ZERO);
            info!("Stopping the point clock with {time_remaining:?} remaining");
            self.state = ClockState::Stopped { time_remaining };
        }
    }

    pub fn reset(&mut self) {
        info!("Resetting the point clock to {:?}", self.default_duration);
        self.state = ClockState::Stopped {
            time_remaining: self.default_duration,
        };
    }

    /// A point clock that reaches its target stops at zero.
    pub fn update(&mut self, now: OffsetDateTime) {
        if let ClockState::Running { end_time } = self.state {
            if end_time <= now {
                info!("Point clock finished");
                self.state = ClockState::Stopped {
                    time_remaining: StdDuration::ZERO,
                };
            }
        }
    }
}

/// `MM:SS` rendering with a leading sign and no clamping for overtime, e.g.
/// `-02:13` for a clock 133 s past its target.
pub fn time_string(time: Duration) -> String {
    let total_secs = time.whole_seconds();
    let sign = if total_secs < 0 { "-" } else { "" };
    let secs = total_secs.unsigned_abs();
    format!("{sign}{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod test {
    use super::*;
    use more_asserts::assert_ge;
    use time::macros::datetime;

    const START: OffsetDateTime = datetime!(2024-05-04 12:00:00 UTC);

    #[test]
    fn test_clock_start_stop() {
        let mut clock = GameClock::new(StdDuration::from_secs(13));

        assert_eq!(clock.is_running(), false);
        assert_eq!(clock.time_remaining(START), Duration::seconds(13));
        clock.start(START);
        assert_eq!(clock.is_running(), true);
        assert_eq!(clock.time_remaining(START), Duration::seconds(13));

        let next_time = START + Duration::seconds(2);
        assert_eq!(clock.time_remaining(next_time), Duration::seconds(11));
        clock.stop(next_time);
        assert_eq!(clock.is_running(), false);
        assert_eq!(clock.time_remaining(next_time), Duration::seconds(11));

        // A later start resumes from where the clock was paused
        let next_time = next_time + Duration::seconds(60);
        clock.start(next_time);
        assert_eq!(
            clock.time_remaining(next_time + Duration::seconds(1)),
            Duration::seconds(10)
        );
    }

    #[test]
    fn test_start_while_running_is_a_no_op() {
        let mut clock = GameClock::new(StdDuration::from_secs(60));
        clock.start(START);
        clock.start(START + Duration::seconds(10));
        assert_eq!(
            clock.time_remaining(START + Duration::seconds(10)),
            Duration::seconds(50)
        );
    }

    #[test]
    fn test_running_clock_passes_target_and_displays_negative() {
        let mut clock = GameClock::new(StdDuration::from_secs(5));
        clock.start(START);

        let late = START + Duration::seconds(138);
        clock.update(late);
        assert_eq!(clock.is_running(), false);
        assert!(clock.is_overtime(late));
        assert_eq!(clock.time_remaining(late), Duration::seconds(-133));
        assert_eq!(time_string(clock.time_remaining(late)), "-02:13");

        // The display keeps counting further into overtime
        let later = late + Duration::seconds(60);
        assert_eq!(clock.time_remaining(later), Duration::seconds(-193));
    }

    #[test]
    fn test_stop_after_expiry_clamps_to_zero() {
        let mut clock = GameClock::new(StdDuration::from_secs(5));
        clock.start(START);

        // Expired 1000 ms ago but not yet ticked; the pause must store zero
        let now = START + Duration::seconds(6);
        clock.stop(now);
        assert_eq!(clock.is_running(), false);
        assert_eq!(clock.time_remaining(now), Duration::ZERO);
        assert_eq!(clock.persisted().remaining_ms, Some(0));
        assert!(!clock.is_overtime(now));
    }

    #[test]
    fn test_persist_restore_round_trip_while_running() {
        let mut clock = GameClock::new(StdDuration::from_secs(100 * 60));
        clock.start(START);
        let persisted = clock.persisted();
        assert_eq!(persisted.is_running, true);
        assert_eq!(persisted.remaining_ms, None);

        // Simulated process restart 30 s of wall time later
        let mut restored = GameClock::new(StdDuration::from_secs(100 * 60));
        let reload = START + Duration::seconds(30);
        restored.restore(persisted, reload);
        assert_eq!(restored.is_running(), true);
        assert_eq!(
            restored.time_remaining(reload),
            Duration::minutes(99) + Duration::seconds(30)
        );
    }

    #[test]
    fn test_restore_after_target_passed_while_closed() {
        let mut clock = GameClock::new(StdDuration::from_secs(60));
        clock.start(START);
        let persisted = clock.persisted();

        let mut restored = GameClock::new(StdDuration::from_secs(60));
        let reload = START + Duration::seconds(90);
        restored.restore(persisted, reload);
        assert_eq!(restored.is_running(), false);
        assert!(restored.is_overtime(reload));
        assert_eq!(restored.time_remaining(reload), Duration::seconds(-30));
    }

    #[test]
    fn test_restore_paused_and_default_states() {
        let mut clock = GameClock::new(StdDuration::from_secs(600));
        clock.restore(
            TimerState {
                end_time: None,
                remaining_ms: Some(5000),
                is_running: false,
            },
            START,
        );
        assert_eq!(clock.is_running(), false);
        assert_eq!(clock.time_remaining(START), Duration::seconds(5));

        clock.restore(TimerState::default(), START);
        assert_eq!(clock.time_remaining(START), Duration::seconds(600));
    }

    #[test]
    fn test_reset_supersedes_running_state() {
        let mut clock = GameClock::new(StdDuration::from_secs(60));
        clock.start(START);
        clock.reset(StdDuration::from_secs(7 * 60));
        assert_eq!(clock.is_running(), false);
        assert_eq!(clock.time_remaining(START), Duration::minutes(7));

        // A stale tick from before the reset must observe the new state
        clock.update(START + Duration::seconds(120));
        assert_eq!(clock.time_remaining(START + Duration::seconds(120)), Duration::minutes(7));
    }

    #[test]
    fn test_start_stop_signal() {
        let mut clock = GameClock::new(StdDuration::from_secs(60));
        let rx = clock.start_stop_rx();
        assert_eq!(*rx.borrow(), false);
        clock.start(START);
        assert_eq!(*rx.borrow(), true);
        clock.stop(START + Duration::seconds(1));
        assert_eq!(*rx.borrow(), false);
    }

    #[test]
    fn test_point_clock_clamps_and_stops_on_expiry() {
        let mut clock = PointClock::new(StdDuration::from_secs(90));
        clock.start(START);
        assert_eq!(clock.is_running(), true);
        assert_eq!(
            clock.time_remaining(START + Duration::seconds(30)),
            StdDuration::from_secs(60)
        );

        // Past the target the reading clamps to zero even before a tick
        let late = START + Duration::seconds(100);
        assert_eq!(clock.time_remaining(late), StdDuration::ZERO);
        clock.update(late);
        assert_eq!(clock.is_running(), false);
        assert_eq!(clock.time_remaining(late), StdDuration::ZERO);
    }

    #[test]
    fn test_point_clock_reset_restores_default() {
        let mut clock = PointClock::new(StdDuration::from_secs(90));
        clock.start(START);
        clock.stop(START + Duration::seconds(25));
        assert_eq!(
            clock.time_remaining(START + Duration::seconds(25)),
            StdDuration::from_secs(65)
        );
        clock.reset();
        assert_eq!(
            clock.time_remaining(START + Duration::seconds(25)),
            StdDuration::from_secs(90)
        );
    }

    #[test]
    fn test_time_string_rendering() {
        assert_eq!(time_string(Duration::seconds(754)), "12:34");
        assert_eq!(time_string(Duration::ZERO), "00:00");
        assert_eq!(time_string(Duration::seconds(-133)), "-02:13");
        assert_ge!(time_string(Duration::minutes(100)).len(), 6);
    }
}
