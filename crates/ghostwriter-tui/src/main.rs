use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use ghostwriter_core::{Config, HuggingFaceClient, WorkersAiClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod handler;
mod tui;
mod ui;

use app::App;

const DEFAULT_LOG_FILTER: &str = "ghostwriter=info,ghostwriter_core=info";

#[derive(Parser)]
#[command(name = "ghostwriter")]
#[command(about = "Generate song lyrics and an album cover in the style of any artist")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Workers AI text model (overrides the config file)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Directory where album covers are saved
    #[arg(long, global = true)]
    covers_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive lyric session (default)
    Tui,
    /// Write one song and its album cover, streaming the lyrics to stdout
    Write {
        /// Musical artist whose style to imitate
        #[arg(short, long)]
        artist: String,
        /// Theme or description for the song
        #[arg(short, long)]
        theme: String,
    },
}

struct Clients {
    lyrics: WorkersAiClient,
    covers: HuggingFaceClient,
}

fn build_clients(config: &Config, model: &str) -> Result<Clients> {
    let creds = config.credentials()?;

    let lyrics = WorkersAiClient::new(&creds.cloudflare_account_id, &creds.cloudflare_api_token)
        .with_base_url(config.cloudflare_api_base())
        .with_model(model);
    let covers = HuggingFaceClient::new(&creds.huggingface_api_token)
        .with_model_url(config.image_model_url());

    Ok(Clients { lyrics, covers })
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into())
}

/// The terminal belongs to ratatui, so the TUI logs to a file instead
fn init_file_logging() -> Result<PathBuf> {
    let log_dir = dirs::cache_dir()
        .map(|d| d.join("ghostwriter"))
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let log_path = log_dir.join("ghostwriter.log");
    let file = File::create(&log_path)
        .with_context(|| format!("Failed to create log file {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Arc::new(file))
        .init();

    Ok(log_path)
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment or config file may be used instead
    dotenvy::dotenv().ok();

    let args = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("{}: {:#}", "Ignoring unreadable config".yellow(), e);
        Config::new()
    });
    if let Some(dir) = args.covers_dir {
        config.covers_dir = Some(dir);
    }
    let model = args
        .model
        .unwrap_or_else(|| config.text_model().to_string());

    match args.command.unwrap_or(Commands::Tui) {
        Commands::Write { artist, theme } => {
            init_stderr_logging();
            let clients = build_clients(&config, &model)?;
            cli::write_song(
                &clients.lyrics,
                &clients.covers,
                &config.covers_dir(),
                &artist,
                &theme,
                std::io::stdout(),
            )
            .await?;
        }
        Commands::Tui => {
            let log_path = init_file_logging()?;
            let clients = build_clients(&config, &model)?;
            info!(model = %model, log = %log_path.display(), "starting session");
            run_tui(clients, &model, config.covers_dir()).await?;
        }
    }

    Ok(())
}

async fn run_tui(clients: Clients, model: &str, covers_dir: PathBuf) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let mut app = App::new(
        Arc::new(clients.lyrics),
        Arc::new(clients.covers),
        model,
        covers_dir,
        events.sender(),
    );

    let result = event_loop(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    info!("session ended");
    result
}

async fn event_loop(
    terminal: &mut tui::Tui,
    app: &mut App,
    events: &mut tui::EventHandler,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}
