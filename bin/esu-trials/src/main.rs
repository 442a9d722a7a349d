//! ---
//! esu_section: "03-operator-cli"
//! esu_subsection: "binary"
//! esu_type: "source"
//! esu_scope: "code"
//! esu_description: "Binary entrypoint running batches of simulation trials."
//! esu_version: "v0.1.0"
//! esu_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};
use esu_common::config::HarnessConfig;
use esu_common::logging::init_tracing;
use esu_common::version::VersionInfo;
use esu_testharness::RunController;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Run batches of headless ESU AI simulation trials",
    long_about = None
)]
struct Cli {
    #[arg(
        value_name = "ITERATIONS",
        required_unless_present = "version",
        help = "Number of iterations to run one after another"
    )]
    iterations: Option<u32>,

    #[arg(
        value_name = "PROCESSES",
        default_value_t = 1,
        help = "Simulations launched per iteration"
    )]
    processes: u32,

    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "N", help = "Maximum simulations running at once")]
    parallel: Option<usize>,

    #[arg(
        long,
        value_name = "SECS",
        help = "Kill and fail any simulation running longer than this"
    )]
    timeout: Option<u64>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let version = VersionInfo::current();
    if cli.version {
        println!("{version}");
        return Ok(());
    }
    let Some(iterations) = cli.iterations else {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "the number of iterations to run is required",
            )
            .exit()
    };

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        if !path.is_file() {
            bail!("configuration file {} does not exist", path.display());
        }
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from(HarnessConfig::DEFAULT_CONFIG_PATH));

    let loaded = HarnessConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    if let Some(parallel) = cli.parallel {
        config.scheduler.max_parallel = parallel;
    }
    if let Some(secs) = cli.timeout {
        config.scheduler.trial_timeout = Some(Duration::from_secs(secs));
    }
    config.validate().context("invalid command line overrides")?;

    init_tracing("esu-trials", &config.logging)?;
    match &loaded.source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; using built-in defaults"),
    }

    let controller = RunController::from_config(&config);
    controller
        .log()
        .emit(version.banner())
        .context("run log unavailable")?;
    let result = controller
        .run_all(iterations, cli.processes)
        .await
        .with_context(|| format!("run {} aborted", controller.prefix()))?;

    info!(
        prefix = %result.prefix,
        failures = result.total_failures,
        trials = result.total_trials,
        seconds = result.elapsed_secs,
        "run complete"
    );
    Ok(())
}
