use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod announcer;
mod controller;
mod domain;
mod format;
mod inputter;
mod loader;
mod model;
mod record;
mod table;
mod ui;

use controller::Controller;
use domain::{TableConfig, UTError};
use loader::Source;
use model::{Model, Status};
use ui::TableUI;

/// Browse, sort and filter a list of users in the terminal.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path or http(s) url of the users JSON document
    #[arg(short, long, env = "UTV_SOURCE", default_value = "assets/users.json")]
    source: String,

    /// Milliseconds to wait for terminal events per frame
    #[arg(long, env = "UTV_POLL_MS", default_value_t = 100)]
    poll_ms: u64,

    /// Seconds an announcement stays in the status line
    #[arg(long, env = "UTV_ANNOUNCE_SECS", default_value_t = 3)]
    announce_secs: u64,

    /// Log destination, the terminal itself is used by the UI
    #[arg(long, env = "UTV_LOG_FILE", default_value = "utv.log")]
    log_file: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli.log_file) {
        eprintln!("Error: could not open log file: {e}");
        return ExitCode::FAILURE;
    }

    let result = run(&cli);
    ratatui::restore();
    match result {
        Err(e) => {
            error!("Exiting with error: {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(path: &Path) -> Result<(), UTError> {
    let file = File::create(path)?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("utv=info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(cli: &Cli) -> Result<(), UTError> {
    info!("Starting utv!");

    let source =
        Source::parse(&cli.source).map_err(|e| UTError::InvalidArgument(e.to_string()))?;
    let cfg = TableConfig::new(source)
        .event_poll_time(cli.poll_ms)
        .announcement_duration(Duration::from_secs(cli.announce_secs));

    let mut terminal = ratatui::init();
    let size = terminal.size()?;

    let mut model = Model::init(&cfg, size.width as usize, size.height as usize);
    let ui = TableUI::new(&cfg);
    let controller = Controller::new(&cfg);

    // The view exists from here on, fetch the data it shows
    model.start_loading();

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    info!("Bye!");
    Ok(())
}
