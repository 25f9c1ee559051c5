//! carelog-etl - stage and normalize a home-care EMR export

use anyhow::Result;
use carelog_common::logging::{init_logging, LogConfig, LogLevel};
use carelog_etl::{
    config::{EtlConfig, SourcePaths},
    staging::StagingLoader,
    Pipeline,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "carelog-etl")]
#[command(author, version, about = "Load caregiver and care-visit extracts into Postgres")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable the terminal progress spinner
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stage both extracts, then rebuild the normalized model (default)
    Run(SourceArgs),

    /// Stage both extracts only
    Stage(SourceArgs),

    /// Rebuild the normalized model from the current staging tables
    Normalize,
}

#[derive(Args, Debug, Default)]
struct SourceArgs {
    /// Caregiver CSV (defaults to the conventional export path)
    caregivers: Option<PathBuf>,

    /// Care-visit CSV (defaults to the conventional export path)
    carelogs: Option<PathBuf>,
}

impl SourceArgs {
    fn into_paths(self) -> SourcePaths {
        SourcePaths::with_overrides(self.caregivers, self.carelogs)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Fails before any file or database I/O when DATABASE_URL is missing.
    // Also loads .env, so LOG_* settings from it apply below.
    let config = EtlConfig::load()?;

    // Environment variables take precedence over the flag
    let mut log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("carelog-etl")
        .filter_directives("sqlx=warn")
        .build()
        .merge_env()?;
    // Stage summaries always reach stdout
    log_config.output = log_config.output.with_console();

    let _log_guard = init_logging(&log_config)?;

    let pool = config.database.connect().await?;
    let loader = StagingLoader::new(pool.clone())
        .with_progress_interval(config.progress_interval)
        .with_spinner(!cli.no_progress);
    let pipeline = Pipeline::new(pool.clone()).with_loader(loader);

    let outcome = execute(&pipeline, cli.command).await;

    // Release connections on success and failure alike
    pool.close().await;

    if let Err(ref e) = outcome {
        error!(error = %e, "carelog-etl failed");
    }
    outcome
}

async fn execute(pipeline: &Pipeline, command: Option<Command>) -> Result<()> {
    pipeline.describe_connection().await?;

    match command.unwrap_or(Command::Run(SourceArgs::default())) {
        Command::Run(sources) => {
            let sources = sources.into_paths();
            info!(
                caregivers = %sources.caregivers.display(),
                carelogs = %sources.carelogs.display(),
                "Running full pipeline"
            );
            let report = pipeline.run(&sources).await?;
            log_stage_report(&report.staging);
            info!(
                model_caregivers = report.normalize.counts.caregivers,
                model_care_visits = report.normalize.counts.care_visits,
                "Model counts"
            );
        },
        Command::Stage(sources) => {
            let report = pipeline.stage(&sources.into_paths()).await?;
            log_stage_report(&report);
        },
        Command::Normalize => {
            let report = pipeline.normalize().await?;
            info!(
                model_caregivers = report.counts.caregivers,
                model_care_visits = report.counts.care_visits,
                "Model counts"
            );
        },
    }

    Ok(())
}

fn log_stage_report(report: &carelog_etl::StageReport) {
    info!(
        inserted_or_updated = report.caregivers.inserted_or_updated,
        skipped = report.caregivers.skipped,
        "caregivers"
    );
    info!(
        inserted_or_updated = report.care_visits.inserted_or_updated,
        skipped = report.care_visits.skipped,
        "carelogs"
    );
    info!(
        stage_caregivers = report.counts.caregivers,
        stage_carelogs = report.counts.carelogs,
        "Final staging counts"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_accepts_zero_one_or_two_paths() {
        let cli = Cli::parse_from(["carelog-etl"]);
        assert!(cli.command.is_none());

        let cli = Cli::parse_from(["carelog-etl", "run", "cg.csv"]);
        match cli.command {
            Some(Command::Run(args)) => {
                let paths = args.into_paths();
                assert_eq!(paths.caregivers, PathBuf::from("cg.csv"));
                assert_eq!(
                    paths.carelogs,
                    PathBuf::from(carelog_etl::config::DEFAULT_CARELOG_CSV)
                );
            },
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::parse_from(["carelog-etl", "stage", "a.csv", "b.csv", "--verbose"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Command::Stage(_))));
    }
}
