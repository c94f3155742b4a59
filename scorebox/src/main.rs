use clap::Parser;
use log::*;
#[cfg(debug_assertions)]
use log4rs::append::console::ConsoleAppender;
use log4rs::{
    append::{
        console::Target,
        rolling_file::{
            RollingFileAppender,
            policy::compound::{
                CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
            },
        },
    },
    config::{Appender, Config as LogConfig, Logger, Root},
    encode::pattern::PatternEncoder,
};
use std::{path::PathBuf, time::Duration};

mod app;
mod config;
mod match_manager;
mod store;

use app::{App, ConsoleRestorePrompt, local_now};
use config::Config;
use match_manager::{MatchManager, RestorePrompt};
use store::KeyValueStore;
use ulti_common::portal::PortalClient;

const APP_NAME: &str = "scorebox";

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(long, short, action(clap::ArgAction::Count))]
    /// Increase the log verbosity
    verbose: u8,

    #[clap(long)]
    /// Directory for persisted match state, default is platform dependent
    data_dir: Option<PathBuf>,

    #[clap(long)]
    /// Roster source URL, overriding the config file
    roster_url: Option<String>,

    #[clap(long)]
    /// Score submission URL, overriding the config file
    submit_url: Option<String>,

    #[clap(long)]
    /// Don't require HTTPS for the roster and submission endpoints
    allow_http: bool,

    #[clap(long)]
    /// Directory within which log files will be placed, default is platform dependent
    log_location: Option<PathBuf>,

    #[clap(long, default_value = "5000000")]
    /// Max size in bytes that a log file is allowed to reach before being rolled over
    log_max_file_size: u64,

    #[clap(long, default_value = "3")]
    /// Number of archived logs to keep
    num_old_logs: u32,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let log_level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let log_base_path = args.log_location.unwrap_or_else(|| {
        let mut path = directories::BaseDirs::new()
            .expect("Could not find a directory to store logs")
            .data_local_dir()
            .to_path_buf();
        path.push("scorebox-logs");
        path
    });
    let mut log_path = log_base_path.clone();
    let mut archived_log_path = log_base_path.clone();
    log_path.push(format!("{APP_NAME}-log.txt"));
    archived_log_path.push(format!("{APP_NAME}-log-{{}}.txt.gz"));

    #[cfg(debug_assertions)]
    println!("Log path: {}", log_path.display());

    // Only log to the console in debug mode
    #[cfg(all(debug_assertions, not(target_os = "windows")))]
    let console_target = Target::Stderr;
    #[cfg(all(debug_assertions, target_os = "windows"))]
    let console_target = Target::Stdout; // Windows apps don't get a stderr handle
    #[cfg(debug_assertions)]
    let console = ConsoleAppender::builder()
        .target(console_target)
        .encoder(Box::new(PatternEncoder::new("[{d} {h({l:5})} {M}] {m}{n}")))
        .build();

    // Setup the file log roller
    let roller = FixedWindowRoller::builder().build(
        archived_log_path
            .to_str()
            .ok_or("Invalid log path")?,
        args.num_old_logs,
    )?;
    let file_policy = CompoundPolicy::new(
        Box::new(SizeTrigger::new(args.log_max_file_size)),
        Box::new(roller),
    );
    let file_appender = RollingFileAppender::builder()
        .append(true)
        .encoder(Box::new(PatternEncoder::new("[{d} {l:5} {M}] {m}{n}")))
        .build(log_path, Box::new(file_policy))?;

    // Setup the logging from all locations to use `LevelFilter::Error`
    let root = Root::builder().appender("file_appender");
    #[cfg(debug_assertions)]
    let root = root.appender("console");
    let root = root.build(LevelFilter::Error);

    // Setup the top level logging config
    let log_config = LogConfig::builder()
        .appender(Appender::builder().build("file_appender", Box::new(file_appender)));

    #[cfg(debug_assertions)]
    let log_config = log_config.appender(Appender::builder().build("console", Box::new(console)));

    let log_config = log_config
        .logger(Logger::builder().build(APP_NAME, log_level))
        .logger(Logger::builder().build("ulti_common", log_level))
        .build(root)?;

    log4rs::init_config(log_config)?;
    log_panics::init();

    info!(
        "Reading config file from {:?}",
        confy::get_configuration_file_path(APP_NAME, None)?
    );

    let mut config: Config = match confy::load(APP_NAME, None) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file, overwriting with default. Error: {e}");
            let config = Config::default();
            confy::store(APP_NAME, None, &config)?;
            config
        }
    };

    if let Some(url) = args.roster_url {
        config.portal.roster_url = url;
    }
    if let Some(url) = args.submit_url {
        config.portal.submit_url = url;
    }

    let data_dir = args.data_dir.unwrap_or_else(|| {
        let mut path = directories::BaseDirs::new()
            .expect("Could not find a directory to store match state")
            .data_local_dir()
            .to_path_buf();
        path.push("scorebox-data");
        path
    });
    info!("Persisting match state under {}", data_dir.display());
    let store = KeyValueStore::open(&data_dir)?;

    let now = local_now();
    let mut manager = MatchManager::load(&store, config.game.clone(), now);

    // The restore decision blocks everything else: roster loading and the
    // input loop only start once it is resolved
    if manager.needs_restore_prompt() {
        let decision = ConsoleRestorePrompt.decide(manager.snapshot());
        manager.resolve_restore(decision, local_now());
    }

    let portal = if config.portal.roster_url.is_empty() && config.portal.submit_url.is_empty() {
        info!("No roster source or submission sink configured");
        None
    } else {
        match PortalClient::new(
            &config.portal.roster_url,
            &config.portal.submit_url,
            !args.allow_http,
            Duration::from_secs(config.portal.timeout_secs),
        ) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("Could not build the portal client: {e}");
                None
            }
        }
    };

    info!("Starting scorebox");
    App::new(config, store, manager, portal, local_now())
        .run()
        .await
}
