use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod controller;
mod domain;
mod fetch;
mod filter;
mod inputter;
mod model;
mod pagination;
mod table;
mod ui;
mod upload;

use api::{ApiClient, FileApi, StaticToken};
use controller::Controller;
use domain::{RtvConfig, RtvError};
use model::{Model, Status};
use ui::TableUI;

/// Browse and upload tabular files on a remote data service.
#[derive(Parser, Debug)]
#[command(name = "rtv", version)]
struct Args {
    /// Server base URL, e.g. http://localhost:8000/api
    server: String,

    /// Bearer token attached to every request
    #[arg(long, env = "RTV_TOKEN", default_value = "", hide_env_values = true)]
    token: String,

    /// Rows per page
    #[arg(long, default_value_t = domain::DEFAULT_PAGE_SIZE)]
    page_size: u32,

    /// Request timeout in seconds
    #[arg(long, default_value_t = domain::DEFAULT_TIMEOUT_SECS)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

/// Log to rtv.log when RUST_LOG is set; the terminal belongs to the
/// TUI.
fn init_tracing() -> Result<(), RtvError> {
    if std::env::var("RUST_LOG").is_err() {
        return Ok(());
    }
    let logfile = Arc::new(std::fs::File::create("rtv.log")?);
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(logfile)
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

async fn run() -> Result<(), RtvError> {
    let args = Args::parse();
    init_tracing()?;

    let cfg = RtvConfig::default()
        .base_url(args.server)
        .token(args.token)
        .page_size(args.page_size)
        .timeout_secs(args.timeout);

    let tokens = Arc::new(StaticToken(cfg.token.clone()));
    let api: Arc<dyn FileApi> = Arc::new(ApiClient::new(
        &cfg.base_url,
        tokens,
        Duration::from_secs(cfg.timeout_secs),
    )?);

    let (events, mut completions) = mpsc::unbounded_channel();
    let mut model = Model::init(&cfg, api, events);
    let ui = TableUI::new();
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();
    info!("Starting rtv against {}", cfg.base_url);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Apply completions posted by network tasks
        while let Ok(message) = completions.try_recv() {
            model.update(message)?;
        }

        // Handle keyboard events and map to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(message)?;
        }
    }

    Ok(())
}
