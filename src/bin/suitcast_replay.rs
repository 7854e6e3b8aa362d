//! Replays raw result messages through the engine.
//!
//! Reads one message per line from a file or stdin, prints every forecast
//! and resolution, and optionally keeps state in a directory between runs.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use suitcast::normalize::{parse_message, MessageState};
use suitcast::storage::persistent::{open_state_dir, FileStateStore};
use suitcast::{Engine, EngineConfig, FnNotifier, RuleNotice, SuitcastResult, SystemClock};

/// Replay result messages through the suitcast engine.
#[derive(Debug, Parser)]
#[command(name = "suitcast-replay", author, version, about = "Replay result messages through the forecasting engine")]
struct Cli {
    /// Message file, one message per line. Reads stdin when omitted.
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// JSON file with engine configuration overrides.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory to load state from and save it to after every round.
    #[arg(long, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    /// Force adaptive mode on before replaying.
    #[arg(long)]
    activate: bool,

    /// Print the status view after the replay.
    #[arg(long)]
    status: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            Ok(EngineConfig::from_json_str(&json)?)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn save(engine: &Engine, store: Option<&FileStateStore>) -> SuitcastResult<()> {
    match store {
        Some(store) => engine.save(store),
        None => Ok(()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    let notifier = Arc::new(FnNotifier(|notice: &RuleNotice| println!("{}", notice.render())));
    let store = cli
        .state_dir
        .as_ref()
        .map(|dir| open_state_dir(dir, None))
        .transpose()?;
    let mut engine = match &store {
        Some(store) => Engine::load(config, store, Arc::new(SystemClock), notifier)?,
        None => Engine::new(config, Arc::new(SystemClock), notifier)?,
    };

    if cli.activate {
        engine.force_activate(None);
    }

    let reader: Box<dyn BufRead> = match &cli.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut rounds = 0usize;
    for line in reader.lines() {
        let line = line?;
        let Some(message) = parse_message(&line) else {
            continue;
        };
        if message.state != MessageState::Finalized {
            info!(round = message.round, state = ?message.state, "skipping unfinished result");
            continue;
        }
        let Some(event) = message.into_event() else {
            continue;
        };

        let outcome = engine.on_finalized_round(event);
        rounds += 1;
        for resolution in &outcome.resolutions {
            println!("{}", resolution.text);
        }
        if let Some(forecast) = &outcome.forecast {
            println!("{}", forecast.display_text());
        }

        // a failed save never undoes the round
        if let Err(err) = save(&engine, store.as_ref()) {
            warn!(error = %err, "failed to persist state");
        }
    }

    info!(rounds, "replay finished");
    if cli.status {
        println!("{}", engine.status_snapshot().render());
    }
    Ok(())
}
