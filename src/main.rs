use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod controller;
mod csv;
mod domain;
mod inputter;
mod insights;
mod model;
mod query;
mod table;
mod ui;
mod worker;

use controller::Controller;
use domain::{DEFAULT_INSIGHTS_ENDPOINT, DEFAULT_INSIGHTS_MODEL, DVConfig, DVError};
use insights::GeminiService;
use model::{Model, Status};
use ui::TableUI;

/// Visualize a CSV file in the terminal: search, sort and generate insights.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// CSV file to open on start
    path: Option<String>,

    /// Event poll interval in milliseconds
    #[arg(long = "poll-ms", default_value_t = 100)]
    poll_ms: u64,

    /// Maximum rendered width of a column
    #[arg(long, default_value_t = 30)]
    max_column_width: usize,

    /// Where to write the log (the terminal is used by the UI)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Base URL of the generative model API
    #[arg(long, default_value = DEFAULT_INSIGHTS_ENDPOINT)]
    insights_endpoint: String,

    /// Model used to generate insights
    #[arg(long, default_value = DEFAULT_INSIGHTS_MODEL)]
    insights_model: String,

    /// Timeout for a single insight request in seconds
    #[arg(long, default_value_t = 120)]
    insights_timeout_secs: u64,

    /// API key for the insight service
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

impl Args {
    fn into_config(self) -> DVConfig {
        let mut cfg = DVConfig::default()
            .with_event_poll_time(self.poll_ms)
            .with_max_column_width(self.max_column_width)
            .with_insights_endpoint(self.insights_endpoint)
            .with_insights_model(self.insights_model)
            .with_insights_timeout_secs(self.insights_timeout_secs);
        if let Some(log_file) = self.log_file {
            cfg = cfg.with_log_file(log_file);
        }
        if let Some(api_key) = self.api_key {
            cfg = cfg.with_api_key(api_key);
        }
        cfg
    }
}

fn init_logging(config: &DVConfig) -> Result<(), DVError> {
    let file = File::create(&config.log_file)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dv=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn main() -> ExitCode {
    let mut args = Args::parse();
    let initial_path = args.path.take();
    let config = args.into_config();

    if let Err(e) = init_logging(&config) {
        eprintln!("Could not open log file {}: {e}", config.log_file.display());
    }

    let result = run(&config, initial_path);
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

fn run(config: &DVConfig, initial_path: Option<String>) -> Result<(), DVError> {
    info!("Starting dv!");
    let service = Arc::new(GeminiService::new(config)?);

    let mut terminal = ratatui::init();
    let size = terminal.size()?;

    let mut model = Model::init(config, service, size.width as usize, size.height as usize)?;
    let mut ui = TableUI::new(config);
    let controller = Controller::new(config);

    if let Some(path) = initial_path {
        model.open_file(Model::expand_path(&path));
    }

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
