//! run-validation - check a finished run's output against stored baselines
//!
//! Exit status is 0 when every case passes or records a new baseline, 1 when
//! any case fails, 2 when the suite cannot be run at all.

use clap::Parser;
use picdeck_core::{DEFAULT_BASELINE_DIR, DEFAULT_CASE_FILE};
use picdeck_storage::BaselineStore;
use picdeck_validate::{BaselinePolicy, Harness, HarnessConfig, load_cases, open_result_store};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "run-validation")]
#[command(about = "Compare a simulation's result store against reference baselines")]
struct Cli {
    /// Result store: a run directory or its results.bin
    store: PathBuf,

    /// JSON list of validation cases [default: <store>/cases.json]
    #[arg(long)]
    case_file: Option<PathBuf>,

    /// Record every value as the new baseline instead of comparing
    #[arg(long)]
    update_baselines: bool,

    /// Baseline file [default: references/<store name>.bin]
    #[arg(long)]
    baseline_file: Option<PathBuf>,
}

/// Directory the store lives in; the store itself when it is a directory
fn store_dir(store: &Path) -> &Path {
    if store.is_dir() {
        store
    } else {
        store.parent().unwrap_or(Path::new("."))
    }
}

fn default_baseline_file(store: &Path) -> PathBuf {
    let name = store_dir(store)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".to_string());
    Path::new(DEFAULT_BASELINE_DIR).join(format!("{name}.bin"))
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "run_validation=info,picdeck_validate=info,picdeck_storage=info".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let store = match open_result_store(&cli.store) {
        Ok(store) => store,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };

    let case_file = cli
        .case_file
        .unwrap_or_else(|| store_dir(&cli.store).join(DEFAULT_CASE_FILE));
    let cases = match load_cases(&case_file) {
        Ok(cases) => cases,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };

    let baseline_file = cli
        .baseline_file
        .unwrap_or_else(|| default_baseline_file(&cli.store));
    info!("Baselines: {}", baseline_file.display());
    let baselines = match BaselineStore::open(&baseline_file) {
        Ok(baselines) => baselines,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };

    let config = HarnessConfig {
        policy: if cli.update_baselines {
            BaselinePolicy::Update
        } else {
            BaselinePolicy::Compare
        },
        ..HarnessConfig::default()
    };
    let mut harness = Harness::new(baselines, config);
    let report = harness.run_suite(&store, &cases);

    println!("{report}");
    ExitCode::from(report.exit_code())
}
