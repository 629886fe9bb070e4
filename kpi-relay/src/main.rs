use clap::{Args, Parser};
use relay::errors::ClientBuildError;
use relay::{Relay, RelayError, RunOptions, RunSummary};
use std::path::PathBuf;
use std::process::ExitCode;

mod config;
mod telemetry;

#[derive(Parser)]
#[command(version, about = "Turns the latest matrix request events into a KPI fact")]
enum CliCommand {
    /// Log in, fetch the latest events and submit the derived fact
    Run(RunArgs),
    /// Load and validate the config file, then exit
    ValidateConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to the YAML config file
    #[arg(long, short)]
    config: PathBuf,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Build and log the facts without submitting them
    #[arg(long)]
    dry_run: bool,
}

#[derive(thiserror::Error, Debug)]
enum RunError {
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Client(#[from] ClientBuildError),
    #[error(transparent)]
    Relay(#[from] RelayError),
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();

    match cli {
        CliCommand::Run(args) => run(args),
        CliCommand::ValidateConfig(args) => match config::Config::load(&args.config) {
            Ok(_) => {
                println!("{}: OK", args.config.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {e}", args.config.display());
                ExitCode::FAILURE
            }
        },
    }
}

fn run(args: RunArgs) -> ExitCode {
    let config = match config::Config::load(&args.config.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _telemetry = match telemetry::init(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error initializing telemetry: {e}");
            return ExitCode::FAILURE;
        }
    };

    let options = RunOptions {
        dry_run: args.dry_run,
    };

    match execute(config.relay, options) {
        Ok(summary) => {
            tracing::info!(submitted = summary.submitted, "Done");
            ExitCode::SUCCESS
        }
        Err(RunError::Relay(e)) => {
            tracing::error!(
                step = e.step().as_str(),
                anomaly = e.is_anomaly(),
                error = %e,
                "Relay run failed"
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "Relay could not start");
            ExitCode::FAILURE
        }
    }
}

/// Runs one batch on a single-threaded runtime.
fn execute(config: relay::config::Config, options: RunOptions) -> Result<RunSummary, RunError> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let relay = Relay::new(config)?;

    Ok(rt.block_on(relay.run(options))?)
}
