//! AutoMarking - live marking from the screen into a spreadsheet
//!
//! Periodically captures a display, reads its text with OCR, and highlights
//! the spreadsheet rows whose identifiers appear on screen.

mod app;
mod capture;
mod config;
mod error;
mod marking;
mod sheets;
mod storage;
mod vision;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::{bounded, select};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::AppConfig;
use crate::marking::{find_cell, MarkingSession, SessionEvent, SessionStatus};
use crate::sheets::SheetStore;

/// AutoMarking - highlight sheet rows whose IDs appear on screen
#[derive(Parser, Debug)]
#[command(name = "auto-marking")]
#[command(about = "OCR a display and mark matching rows in a Google Sheet")]
struct Args {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start live marking until Enter is pressed (default)
    Run {
        /// Display index to capture (0 = primary)
        #[arg(short, long)]
        display: Option<usize>,
    },
    /// List available displays and exit
    ListDisplays,
    /// Look up a single line of text in the sheet
    Find {
        /// Text as OCR would see it
        text: String,
    },
    /// Overwrite a range with raw values, one value per row
    Write {
        /// Range such as "Sheet1!B2:B"
        range: String,
        /// Values to write
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Write the default configuration file if none exists
    InitConfig,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = args.config.as_deref();
    match args.command.unwrap_or(Command::Run { display: None }) {
        Command::Run { display } => run_marking(&load_or_create_config(config_path)?, display),
        Command::ListDisplays => list_displays(&load_or_create_config(config_path)?),
        Command::Find { text } => find_text(&load_or_create_config(config_path)?, &text),
        Command::Write { range, values } => {
            write_values(&load_or_create_config(config_path)?, &range, values)
        }
        Command::InitConfig => init_config(config_path),
    }
}

/// Load configuration from file or fall back to defaults
fn load_or_create_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_path) = storage::default_config_path() {
        if config_path.exists() {
            let config = config::load_config(&config_path)
                .with_context(|| format!("Failed to load configuration from {:?}", config_path))?;
            info!("Loaded configuration from {:?}", config_path);
            return Ok(config);
        }
    }

    info!("Using default configuration");
    Ok(AppConfig::default())
}

fn init_config(explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => storage::default_config_path()?,
    };

    if path.exists() {
        println!("Configuration already exists at {}", path.display());
        return Ok(());
    }

    config::save_config(&AppConfig::default(), &path)
        .with_context(|| format!("Failed to write configuration to {:?}", path))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// Run the poll loop on a background thread; this thread plays the UI role
fn run_marking(config: &AppConfig, display: Option<usize>) -> Result<()> {
    config.validate_for_store()?;

    let poller = app::build_poller(config)?;
    let mut session = MarkingSession::new(config.capture.display_index);
    if let Some(display) = display {
        session.select_display(display);
    }

    let events = session.events();
    session.start(poller)?;

    // The sender stays alive here so EOF on stdin never disconnects `enter`
    let (enter_tx, enter) = bounded::<()>(1);
    let stdin_tx = enter_tx.clone();
    std::thread::spawn(move || {
        let mut line = String::new();
        // EOF means no interactive stdin, keep running until killed
        if let Ok(n) = std::io::stdin().read_line(&mut line) {
            if n > 0 && stdin_tx.send(()).is_err() {
                debug!("Marking already finished when Enter was pressed");
            }
        }
    });

    let status = loop {
        let finished = select! {
            recv(events) -> event => match event {
                Ok(event) => {
                    print_event(&event, session.selected_display());
                    event.is_terminal()
                }
                Err(_) => true,
            },
            recv(enter) -> _ => {
                session.stop()?;
                for event in events.try_iter() {
                    print_event(&event, session.selected_display());
                }
                true
            },
            default(Duration::from_millis(250)) => session.is_finished(),
        };
        if finished {
            break session.wait();
        }
    };
    drop(enter_tx);

    match status {
        SessionStatus::Failed(error) => Err(anyhow!("Marking stopped: {}", error)),
        _ => Ok(()),
    }
}

fn print_event(event: &SessionEvent, display: usize) {
    match event {
        SessionEvent::Started { .. } => {
            println!("Capturing screen {}... Press Enter to stop.", display + 1)
        }
        SessionEvent::Matched { line, location } => {
            println!("Text '{}' found in row {}.", line, location.row + 1)
        }
        SessionEvent::NotFound { line } => println!("Text '{}' not found in the sheet.", line),
        SessionEvent::IterationSkipped { reason } => println!("Skipped capture: {}", reason),
        SessionEvent::Stopped { stats } => println!(
            "Capture stopped after {} iterations ({} lines, {} matches).",
            stats.iterations, stats.lines, stats.matches
        ),
        SessionEvent::Failed { error } => eprintln!("Error during processing: {}", error),
    }
}

fn list_displays(config: &AppConfig) -> Result<()> {
    let capturer = capture::build_capturer(&config.capture)?;
    let displays = capturer.displays()?;

    println!("Available displays:");
    if displays.is_empty() {
        println!("  No displays detected");
    }
    for display in &displays {
        let size = display
            .size
            .map(|(w, h)| format!(" - {}x{}", w, h))
            .unwrap_or_default();
        println!(
            "  [{}] {}{}{}",
            display.index,
            display.name,
            size,
            if display.is_primary { " (primary)" } else { "" }
        );
    }
    Ok(())
}

fn find_text(config: &AppConfig, text: &str) -> Result<()> {
    config.validate_for_store()?;
    let store = app::build_store(config)?;

    let rows = store.read_range(&config.sheet.spreadsheet_id, &config.sheet.range)?;
    match find_cell(&rows, text) {
        Some(location) => println!("Text '{}' found in row {}.", text, location.row + 1),
        None => println!("Text '{}' not found in the sheet.", text),
    }
    Ok(())
}

fn write_values(config: &AppConfig, range: &str, values: Vec<String>) -> Result<()> {
    config.validate_for_store()?;
    let store = app::build_store(config)?;

    let rows: Vec<Vec<String>> = values.into_iter().map(|v| vec![v]).collect();
    store.write_range(&config.sheet.spreadsheet_id, range, &rows)?;
    println!("Wrote {} rows to {}", rows.len(), range);
    Ok(())
}
