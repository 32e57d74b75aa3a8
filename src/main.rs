//! picdeck - check a simulation input deck before handing it to the engine
//!
//! Loads a JSON deck, runs every block through the configuration model and
//! reports all violations at once. On success, prints the warnings and the
//! derived run parameters, and optionally writes the engine input.

use clap::Parser;
use picdeck_config::Deck;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "picdeck")]
#[command(about = "Validate a PIC simulation input deck")]
struct Cli {
    /// Path to the JSON input deck
    deck: PathBuf,

    /// Write the finalized engine input as JSON to this file
    #[arg(long)]
    emit: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "picdeck=info,picdeck_config=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!("Loading deck from: {}", cli.deck.display());

    let config = match Deck::load(&cli.deck).and_then(|deck| deck.build()) {
        Ok(config) => config,
        Err(e) => {
            error!("Deck rejected:\n{}", e);
            return ExitCode::FAILURE;
        }
    };

    for warning in config.warnings() {
        println!("warning: {warning}");
    }
    let derived = config.derived();
    println!(
        "{}: {} species, {} interactions, {} diagnostics, {} timesteps, cells {:?}",
        config.params().geometry,
        config.species().len(),
        config.interactions().len(),
        config.diagnostics().len(),
        derived.n_timesteps,
        derived.cells_per_axis
    );

    if let Some(path) = &cli.emit {
        let written = config
            .to_json()
            .map_err(|e| e.to_string())
            .and_then(|json| fs::write(path, json).map_err(|e| e.to_string()));
        if let Err(e) = written {
            error!("Failed to write {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
        info!("Engine input written to: {}", path.display());
    }
    ExitCode::SUCCESS
}
