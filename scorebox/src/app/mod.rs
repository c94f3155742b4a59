use crate::{
    config::Config,
    match_manager::{
        MatchManager, RestoreDecision, RestorePrompt,
        clock::{GameClock, PointClock, time_string},
    },
    store::{KeyValueStore, keys},
};
use inquire::Confirm;
use log::{info, warn};
use prettytable::{Cell, Row, Table};
use std::{
    io::Write as _,
    time::Duration as StdDuration,
};
use time::{OffsetDateTime, macros::format_description};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
    time::interval,
};
use ulti_common::{
    export::{export_file_name, game_log_csv, submission_payload},
    portal::{
        PortalClient,
        roster::{RosterCache, TeamRosters},
    },
    ratio::RatioSide,
    side::Side,
    snapshot::{SessionSnapshot, TimerState},
};

/// Wall-clock now. Local offset detection can fail once threads exist, in
/// which case UTC timestamps are still monotone enough for every consumer
/// here.
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// One user action. Every line of input parses to exactly one command; the
/// dispatch step mutates state and the render steps project it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Point {
        side: Side,
        scorer: String,
        assist: String,
    },
    Edit {
        id: String,
        scorer: String,
        assist: String,
    },
    Delete {
        id: String,
    },
    TeamName {
        side: Side,
        name: String,
    },
    Assign {
        side: Side,
        team: String,
    },
    Ratio(RatioSide),
    Label(String),
    ClockStart,
    ClockStop,
    ClockReset {
        minutes: Option<u64>,
    },
    IntervalStart,
    IntervalStop,
    IntervalReset,
    Show,
    Log,
    Teams,
    Fetch,
    Usage,
    Export,
    Finish,
    New,
    Wipe,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let (word, rest) = split_word(line.trim());
        match word.to_lowercase().as_str() {
            "point" | "p" => {
                let (side, rest) = parse_side(rest)?;
                let (scorer, assist) = split_players(rest)?;
                Ok(Self::Point {
                    side,
                    scorer,
                    assist,
                })
            }
            "edit" => {
                let (id, rest) = split_word(rest);
                if id.is_empty() {
                    return Err("Expected: edit <id> <scorer> / <assist>".to_string());
                }
                let (scorer, assist) = split_players(rest)?;
                Ok(Self::Edit {
                    id: id.to_string(),
                    scorer,
                    assist,
                })
            }
            "delete" | "del" => {
                if rest.is_empty() {
                    return Err("Expected: delete <id>".to_string());
                }
                Ok(Self::Delete {
                    id: rest.to_string(),
                })
            }
            "team" => {
                let (side, name) = parse_side(rest)?;
                if name.is_empty() {
                    return Err("Expected: team <a|b> <name>".to_string());
                }
                Ok(Self::TeamName {
                    side,
                    name: name.to_string(),
                })
            }
            "assign" => {
                let (side, team) = parse_side(rest)?;
                if team.is_empty() {
                    return Err("Expected: assign <a|b> <team>".to_string());
                }
                Ok(Self::Assign {
                    side,
                    team: team.to_string(),
                })
            }
            "ratio" => Ok(Self::Ratio(rest.parse()?)),
            "label" => Ok(Self::Label(rest.to_string())),
            "clock" => match split_word(rest) {
                ("start", _) => Ok(Self::ClockStart),
                ("stop", _) | ("pause", _) => Ok(Self::ClockStop),
                ("reset", "") => Ok(Self::ClockReset { minutes: None }),
                ("reset", min) => {
                    let minutes = min
                        .parse()
                        .map_err(|_| format!("Not a number of minutes: {min}"))?;
                    Ok(Self::ClockReset {
                        minutes: Some(minutes),
                    })
                }
                _ => Err("Expected: clock <start|stop|reset [minutes]>".to_string()),
            },
            "interval" | "int" => match split_word(rest) {
                ("start", _) => Ok(Self::IntervalStart),
                ("stop", _) | ("pause", _) => Ok(Self::IntervalStop),
                ("reset", _) => Ok(Self::IntervalReset),
                _ => Err("Expected: interval <start|stop|reset>".to_string()),
            },
            "show" => Ok(Self::Show),
            "log" => Ok(Self::Log),
            "teams" => Ok(Self::Teams),
            "fetch" => Ok(Self::Fetch),
            "usage" => Ok(Self::Usage),
            "export" => Ok(Self::Export),
            "finish" => Ok(Self::Finish),
            "new" => Ok(Self::New),
            "wipe" => Ok(Self::Wipe),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(format!("Unknown command: {other} (try 'help')")),
        }
    }
}

fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (s, ""),
    }
}

fn parse_side(s: &str) -> Result<(Side, &str), String> {
    let (side, rest) = split_word(s);
    Ok((side.parse()?, rest))
}

/// Scorer and assist share one argument slot, split on `/` so either may
/// contain spaces or commas.
fn split_players(s: &str) -> Result<(String, String), String> {
    let (scorer, assist) = s
        .split_once('/')
        .ok_or("Expected: <scorer> / <assist>".to_string())?;
    Ok((scorer.trim().to_string(), assist.trim().to_string()))
}

/// Asks the user about a recent saved session before anything else happens.
/// The prompt blocks initialization by design; if it cannot be answered the
/// saved data is kept rather than dropped.
pub struct ConsoleRestorePrompt;

impl RestorePrompt for ConsoleRestorePrompt {
    fn decide(&mut self, snapshot: &SessionSnapshot) -> RestoreDecision {
        let message = format!(
            "Restore the previous session ({}, {} points)?",
            snapshot.match_id(),
            snapshot.point_log.len()
        );
        match Confirm::new(&message).with_default(true).prompt() {
            Ok(true) => RestoreDecision::Restore,
            Ok(false) => RestoreDecision::Discard,
            Err(e) => {
                warn!("Restore prompt was not answered ({e}), keeping the previous session");
                RestoreDecision::Restore
            }
        }
    }
}

pub struct App {
    config: Config,
    store: KeyValueStore,
    manager: MatchManager,
    game_clock: GameClock,
    point_clock: PointClock,
    roster_cache: Option<RosterCache>,
    portal: Option<PortalClient>,
    roster_tx: mpsc::Sender<Result<TeamRosters, String>>,
    roster_rx: Option<mpsc::Receiver<Result<TeamRosters, String>>>,
}

impl App {
    pub fn new(
        config: Config,
        store: KeyValueStore,
        manager: MatchManager,
        portal: Option<PortalClient>,
        now: OffsetDateTime,
    ) -> Self {
        let mut game_clock =
            GameClock::new(StdDuration::from_secs(config.game.clock_minutes * 60));
        let saved_clock = TimerState {
            end_time: store.get_opt(keys::CLOCK_END),
            remaining_ms: store.get_opt(keys::CLOCK_REMAINING),
            is_running: store.get(keys::CLOCK_RUNNING, false),
        };
        game_clock.restore(saved_clock, now);

        let point_clock =
            PointClock::new(StdDuration::from_secs(config.game.point_interval_secs));

        // Expiry is checked here, on read; an expired cache is as good as
        // absent
        let roster_cache = store
            .get_opt::<RosterCache>(keys::ROSTER_CACHE)
            .filter(|cache| cache.is_fresh(now));

        let (roster_tx, roster_rx) = mpsc::channel(1);

        Self {
            config,
            store,
            manager,
            game_clock,
            point_clock,
            roster_cache,
            portal,
            roster_tx,
            roster_rx: Some(roster_rx),
        }
    }

    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.request_roster_refresh(false);
        self.render_status(local_now());
        println!("Type 'help' for the command list.");

        let mut roster_rx = match self.roster_rx.take() {
            Some(rx) => rx,
            None => mpsc::channel(1).1,
        };
        let mut clock_rx = self.game_clock.start_stop_rx();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut game_tick = interval(StdDuration::from_secs(1));
        let mut point_tick = interval(StdDuration::from_millis(200));
        let mut autosave = interval(StdDuration::from_secs(self.config.game.autosave_secs.max(1)));

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let now = local_now();
                    match line? {
                        Some(line) => {
                            if self.dispatch(&line, now) {
                                break;
                            }
                            // A command may have superseded the clocks; make
                            // the pending ticks observe the new state instead
                            // of the old schedule
                            game_tick.reset();
                            point_tick.reset();
                        }
                        None => break,
                    }
                }
                _ = game_tick.tick() => {
                    let now = local_now();
                    self.game_clock.update(now);
                    self.render_clock_line(now);
                }
                _ = point_tick.tick() => {
                    let now = local_now();
                    let was_running = self.point_clock.is_running();
                    self.point_clock.update(now);
                    if was_running {
                        if self.point_clock.is_running() {
                            self.render_clock_line(now);
                        } else {
                            println!();
                            println!("Point interval finished");
                        }
                    }
                }
                _ = autosave.tick() => {
                    self.flush_all(local_now());
                }
                result = roster_rx.recv() => {
                    if let Some(result) = result {
                        self.apply_roster_result(result, local_now());
                    }
                }
                changed = clock_rx.changed() => {
                    let now = local_now();
                    if changed.is_ok()
                        && !*clock_rx.borrow_and_update()
                        && self.game_clock.is_overtime(now)
                    {
                        println!();
                        println!("Game clock has reached its target; now counting overtime");
                        self.persist_clock(now);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, saving before exit");
                    break;
                }
            }
        }

        self.flush_all(local_now());
        Ok(())
    }

    /// Applies one line of input. Returns `true` when the app should exit.
    fn dispatch(&mut self, line: &str, now: OffsetDateTime) -> bool {
        if line.trim().is_empty() {
            return false;
        }
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                return false;
            }
        };

        match command {
            Command::Point {
                side,
                scorer,
                assist,
            } => {
                match self.manager.add_point(side, &scorer, &assist, now) {
                    Ok(()) => {
                        // The interval to the next pull begins as soon as a
                        // point is recorded
                        self.point_clock.reset();
                        self.point_clock.start(now);
                        self.render_status(now);
                    }
                    Err(e) => println!("{e}"),
                }
            }
            Command::Edit { id, scorer, assist } => {
                match self.manager.edit_point(&id, &scorer, &assist) {
                    Ok(()) => self.render_log(),
                    Err(e) => println!("{e}"),
                }
            }
            Command::Delete { id } => match self.manager.delete_point(&id) {
                Ok(removed) => {
                    println!("Deleted point by {} ({})", removed.scorer, removed.team);
                    self.render_status(now);
                }
                Err(e) => println!("{e}"),
            },
            Command::TeamName { side, name } => {
                self.manager.set_team_name(side, &name);
                self.render_status(now);
            }
            Command::Assign { side, team } => self.assign_team(side, &team),
            Command::Ratio(ratio) => self.manager.set_starting_ratio(ratio),
            Command::Label(label) => self.manager.set_clock_label(&label),
            Command::ClockStart => {
                self.game_clock.start(now);
                self.persist_clock(now);
            }
            Command::ClockStop => {
                self.game_clock.stop(now);
                self.persist_clock(now);
                self.render_status(now);
            }
            Command::ClockReset { minutes } => {
                let minutes = minutes.unwrap_or(self.config.game.clock_minutes);
                self.game_clock.reset(StdDuration::from_secs(minutes * 60));
                self.persist_clock(now);
                self.render_status(now);
            }
            Command::IntervalStart => self.point_clock.start(now),
            Command::IntervalStop => self.point_clock.stop(now),
            Command::IntervalReset => self.point_clock.reset(),
            Command::Show => self.render_status(now),
            Command::Log => self.render_log(),
            Command::Teams => self.render_teams(now),
            Command::Fetch => self.request_roster_refresh(true),
            Command::Usage => self.render_usage(),
            Command::Export => match self.export_csv() {
                Ok(file_name) => println!("Exported point log to {file_name}"),
                Err(e) => println!("Export failed: {e}"),
            },
            Command::Finish => self.finish(now),
            Command::New => {
                self.manager.reset(now);
                self.point_clock.reset();
                self.render_status(now);
            }
            Command::Wipe => {
                self.store.clear_all();
                self.roster_cache = None;
                self.manager.reset(now);
                self.game_clock
                    .reset(StdDuration::from_secs(self.config.game.clock_minutes * 60));
                self.point_clock.reset();
                self.render_status(now);
            }
            Command::Help => print_help(),
            Command::Quit => return true,
        }
        false
    }

    /// Both flush paths (periodic and event-driven) funnel through here;
    /// `flush` no-ops when clean, so overlapping calls are safe.
    fn flush_all(&mut self, now: OffsetDateTime) {
        self.manager.flush(&mut self.store, now);
        self.persist_clock(now);
    }

    fn persist_clock(&mut self, now: OffsetDateTime) {
        let state = self.game_clock.persisted();
        match state.end_time {
            Some(end_time) => {
                self.store.put(keys::CLOCK_END, &end_time, now);
            }
            None => self.store.remove(keys::CLOCK_END),
        }
        match state.remaining_ms {
            Some(ms) => {
                self.store.put(keys::CLOCK_REMAINING, &ms, now);
            }
            None => self.store.remove(keys::CLOCK_REMAINING),
        }
        self.store.put(keys::CLOCK_RUNNING, &state.is_running, now);
    }

    /// Kicks off a roster fetch without blocking the input loop; the result
    /// arrives through the roster channel.
    fn request_roster_refresh(&mut self, announce: bool) {
        let Some(portal) = &self.portal else {
            if announce {
                println!("No roster source configured");
            }
            return;
        };
        if !portal.has_roster_source() {
            if announce {
                println!("No roster source configured");
            }
            return;
        }

        let fetch = portal.fetch_teams();
        let tx = self.roster_tx.clone();
        tokio::spawn(async move {
            let result = fetch.await.map_err(|e| e.to_string());
            let _ = tx.send(result).await;
        });
    }

    fn apply_roster_result(
        &mut self,
        result: Result<TeamRosters, String>,
        now: OffsetDateTime,
    ) {
        match result {
            Ok(teams) => {
                println!("Rosters updated ({} teams)", teams.len());
                let cache = RosterCache::new(teams, now);
                self.store.put(keys::ROSTER_CACHE, &cache, now);
                self.roster_cache = Some(cache);
            }
            Err(e) => {
                warn!("Roster fetch failed: {e}");
                match &self.roster_cache {
                    Some(cache) if cache.is_fresh(now) => {
                        println!(
                            "Roster fetch failed; using rosters cached at {}",
                            cache.fetched_at
                        );
                    }
                    _ => {
                        self.roster_cache = None;
                        println!("Roster fetch failed and no cached rosters are available");
                    }
                }
            }
        }
    }

    fn assign_team(&mut self, side: Side, team: &str) {
        let Some(cache) = &self.roster_cache else {
            println!("No rosters available; 'fetch' them first or use 'team' to name sides");
            return;
        };
        let Some((name, players)) = cache.teams.get_key_value(team) else {
            println!("No team named {team} in the fetched rosters (see 'teams')");
            return;
        };
        let players = players.join("\n");
        self.manager.set_team_name(side, name);
        self.manager.set_roster(side, &players);
        println!("Side {side} is now {name}");
    }

    fn export_csv(&self) -> Result<String, Box<dyn std::error::Error>> {
        let snapshot = self.manager.snapshot();
        let csv = game_log_csv(&snapshot.point_log)?;
        let file_name = export_file_name(
            &snapshot.team_names[Side::A],
            &snapshot.team_names[Side::B],
        );
        std::fs::write(&file_name, csv.as_bytes())?;
        info!(
            "Exported {} points to {file_name}",
            snapshot.point_log.len()
        );
        Ok(file_name)
    }

    /// Export, submit, reset. The CSV file is the guaranteed record: a
    /// submission failure is logged but never blocks it, while an export
    /// failure keeps the session untouched.
    fn finish(&mut self, now: OffsetDateTime) {
        match self.export_csv() {
            Ok(file_name) => {
                println!("Exported point log to {file_name}");
                self.submit_game_log(now);
                self.manager.reset(now);
                self.flush_all(now);
                self.render_status(now);
            }
            Err(e) => {
                warn!("Export failed: {e}");
                println!("Export failed ({e}); keeping the current session");
            }
        }
    }

    fn submit_game_log(&self, now: OffsetDateTime) {
        let Some(portal) = &self.portal else {
            return;
        };
        if !portal.has_submit_sink() {
            return;
        }

        let snapshot = self.manager.snapshot();
        let date_format = format_description!("[year]-[month]-[day]");
        let date = now
            .format(&date_format)
            .unwrap_or_else(|_| now.unix_timestamp().to_string());
        let payload = submission_payload(&snapshot.match_id(), &date, &snapshot.point_log);

        let submit = portal.post_game_log(payload);
        tokio::spawn(async move {
            if let Err(e) = submit.await {
                warn!("Game log submission failed: {e}");
            }
        });
    }

    fn render_status(&self, now: OffsetDateTime) {
        let snapshot = self.manager.snapshot();
        println!(
            "{} {} - {} {}   (starting ratio {})",
            snapshot.team_names.a,
            snapshot.scores.a,
            snapshot.scores.b,
            snapshot.team_names.b,
            snapshot.starting_ratio,
        );
        let overtime = if self.game_clock.is_overtime(now) {
            "  [overtime]"
        } else {
            ""
        };
        println!(
            "{}: {}{overtime}   interval: {}",
            snapshot.clock_label,
            time_string(self.game_clock.time_remaining(now)),
            time_string(
                self.point_clock
                    .time_remaining(now)
                    .try_into()
                    .unwrap_or(time::Duration::ZERO)
            ),
        );
    }

    fn render_clock_line(&self, now: OffsetDateTime) {
        if !self.game_clock.is_running()
            && !self.game_clock.is_overtime(now)
            && !self.point_clock.is_running()
        {
            return;
        }
        let snapshot = self.manager.snapshot();
        let overtime = if self.game_clock.is_overtime(now) {
            " [overtime]"
        } else {
            ""
        };
        print!(
            "\r{}: {}{overtime}   interval: {}  ",
            snapshot.clock_label,
            time_string(self.game_clock.time_remaining(now)),
            time_string(
                self.point_clock
                    .time_remaining(now)
                    .try_into()
                    .unwrap_or(time::Duration::ZERO)
            ),
        );
        let _ = std::io::stdout().flush();
    }

    fn render_log(&self) {
        let mut table = Table::new();
        table.add_row(Row::new(vec![
            Cell::new("#"),
            Cell::new("Ratio"),
            Cell::new("Id"),
            Cell::new("Time"),
            Cell::new("Team"),
            Cell::new("Scorer"),
            Cell::new("Assist"),
        ]));
        for row in self.manager.log_rows() {
            table.add_row(Row::new(vec![
                Cell::new(&(row.index + 1).to_string()),
                Cell::new(&row.ratio.to_string()),
                Cell::new(&row.entry.id),
                Cell::new(&row.entry.recorded_at),
                Cell::new(&row.entry.team),
                Cell::new(&row.entry.scorer),
                Cell::new(&row.entry.assist),
            ]));
        }
        table.printstd();
    }

    fn render_teams(&self, now: OffsetDateTime) {
        match &self.roster_cache {
            Some(cache) if cache.is_fresh(now) => {
                let mut table = Table::new();
                table.add_row(Row::new(vec![Cell::new("Team"), Cell::new("Players")]));
                for (team, players) in &cache.teams {
                    table.add_row(Row::new(vec![
                        Cell::new(team),
                        Cell::new(&players.len().to_string()),
                    ]));
                }
                table.printstd();
            }
            _ => println!("No fresh rosters available; use 'fetch' to refresh them"),
        }
    }

    fn render_usage(&self) {
        let usage = self.store.usage_info();
        let last_save = usage
            .last_save
            .map(|t| t.to_string())
            .unwrap_or_else(|| "never".to_string());
        let pending = if self.manager.is_dirty() {
            ", unsaved changes pending"
        } else {
            ""
        };
        println!(
            "{} bytes across {} stored items, last saved {last_save}{pending}",
            usage.total_bytes, usage.item_count
        );
    }
}

fn print_help() {
    println!(
        "\
Commands:
  point <a|b> <scorer> / <assist>   record a point (alias: p)
  edit <id> <scorer> / <assist>     fix a recorded point
  delete <id>                       remove a point and recount
  log                               show the point log
  show                              show scores and clocks
  team <a|b> <name>                 rename a side
  assign <a|b> <team>               take a side's name and roster from the fetched teams
  ratio <m|f>                       set the starting ratio
  label <text>                      rename the match clock
  clock start|stop|reset [minutes]  control the match clock
  interval start|stop|reset         control the between-points clock
  teams / fetch                     list or refresh rosters
  usage                             storage usage
  export                            write the CSV log
  finish                            export, submit, and start fresh
  new                               start fresh without exporting
  wipe                              clear all saved data, rosters included
  quit                              save and exit"
    );
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_point_command() {
        assert_eq!(
            Command::parse("point a Sam Smith / Alex Jones"),
            Ok(Command::Point {
                side: Side::A,
                scorer: "Sam Smith".to_string(),
                assist: "Alex Jones".to_string(),
            })
        );
        assert_eq!(
            Command::parse("p B Jo / Pat"),
            Ok(Command::Point {
                side: Side::B,
                scorer: "Jo".to_string(),
                assist: "Pat".to_string(),
            })
        );
        assert!(Command::parse("point a Sam Alex").is_err());
        assert!(Command::parse("point c Sam / Alex").is_err());
    }

    #[test]
    fn test_parse_preserves_awkward_names() {
        let command = Command::parse("point a Smith, \"Ace\" / O'Neil").unwrap();
        assert_eq!(
            command,
            Command::Point {
                side: Side::A,
                scorer: "Smith, \"Ace\"".to_string(),
                assist: "O'Neil".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_clock_commands() {
        assert_eq!(Command::parse("clock start"), Ok(Command::ClockStart));
        assert_eq!(Command::parse("clock pause"), Ok(Command::ClockStop));
        assert_eq!(
            Command::parse("clock reset"),
            Ok(Command::ClockReset { minutes: None })
        );
        assert_eq!(
            Command::parse("clock reset 45"),
            Ok(Command::ClockReset { minutes: Some(45) })
        );
        assert!(Command::parse("clock reset soon").is_err());
        assert!(Command::parse("clock").is_err());
    }

    #[test]
    fn test_parse_edit_and_delete() {
        assert_eq!(
            Command::parse("edit abc123 Sam / Alex"),
            Ok(Command::Edit {
                id: "abc123".to_string(),
                scorer: "Sam".to_string(),
                assist: "Alex".to_string(),
            })
        );
        assert!(Command::parse("edit").is_err());
        assert_eq!(
            Command::parse("del abc123"),
            Ok(Command::Delete {
                id: "abc123".to_string()
            })
        );
        assert!(Command::parse("delete").is_err());
    }

    #[test]
    fn test_parse_misc_commands() {
        assert_eq!(Command::parse("ratio f"), Ok(Command::Ratio(RatioSide::F)));
        assert_eq!(
            Command::parse("team b Blue Machine"),
            Ok(Command::TeamName {
                side: Side::B,
                name: "Blue Machine".to_string()
            })
        );
        assert_eq!(Command::parse("interval start"), Ok(Command::IntervalStart));
        assert_eq!(Command::parse("QUIT"), Ok(Command::Quit));
        assert!(Command::parse("frobnicate").is_err());
    }

    #[tokio::test]
    async fn test_dispatch_point_and_validation() {
        use crate::{config::Config, match_manager::MatchManager, store::mem::MemBackend};

        let store = KeyValueStore::new(Box::new(MemBackend::new(None)));
        let now = local_now();
        let config = Config::default();
        let manager = MatchManager::load(&store, config.game.clone(), now);
        let mut app = App::new(config, store, manager, None, now);

        assert!(!app.dispatch("point a Sam / Alex", now));
        assert_eq!(app.manager.snapshot().scores.a, 1);
        assert_eq!(app.manager.snapshot().point_log[0].team, "Team A");

        // Validation failure leaves state untouched
        assert!(!app.dispatch("point b  / Alex", now));
        assert_eq!(app.manager.snapshot().scores.b, 0);

        // Quit is the only command that ends the loop
        assert!(app.dispatch("quit", now));
    }

    #[tokio::test]
    async fn test_dispatch_clock_commands_persist_state() {
        use crate::{config::Config, match_manager::MatchManager, store::mem::MemBackend};

        let store = KeyValueStore::new(Box::new(MemBackend::new(None)));
        let now = local_now();
        let config = Config::default();
        let manager = MatchManager::load(&store, config.game.clone(), now);
        let mut app = App::new(config, store, manager, None, now);

        app.dispatch("clock start", now);
        assert!(app.game_clock.is_running());
        assert_eq!(app.store.get(keys::CLOCK_RUNNING, false), true);
        assert!(app.store.get_opt::<OffsetDateTime>(keys::CLOCK_END).is_some());
        assert_eq!(app.store.get_opt::<u64>(keys::CLOCK_REMAINING), None);

        app.dispatch("clock stop", now);
        assert!(!app.game_clock.is_running());
        assert_eq!(app.store.get(keys::CLOCK_RUNNING, true), false);
        assert!(app.store.get_opt::<u64>(keys::CLOCK_REMAINING).is_some());
        assert_eq!(
            app.store.get_opt::<OffsetDateTime>(keys::CLOCK_END),
            None
        );
    }
}
