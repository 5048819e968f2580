//! CLI entry point for the uploadcare-dump tool.

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{debug, info, warn};
use uploadcare_dump::{ApiClient, Config, FetchEngine, FetchStats, FileClient, dump};

mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let config = Config::load(&args.config)?;
    config.validate()?;

    match args.command.unwrap_or(Command::All) {
        Command::Meta => dump_meta(&config, &args).await,
        Command::Files => dump_files(&config, &args).await,
        Command::All => {
            dump_meta(&config, &args).await?;
            dump_files(&config, &args).await
        }
        Command::Conf => check_conf(&config).await,
    }
}

/// Runs the metadata phase for every configured project.
async fn dump_meta(config: &Config, args: &Args) -> Result<()> {
    for project in &config.projects {
        let api = ApiClient::new(project.clone());
        let count = dump::dump_meta(&api, &args.output)
            .await
            .with_context(|| format!("metadata dump failed for project {:?}", project.name))?;
        info!(project = %project.name, records = count, "metadata dumped");
    }
    Ok(())
}

/// Runs the file phase for every configured project.
///
/// Per-file failures do not abort the run, but a run with any failed
/// files exits non-zero so re-running `files` to pick up stragglers is
/// an obvious next step.
async fn dump_files(config: &Config, args: &Args) -> Result<()> {
    let engine = FetchEngine::new(usize::from(args.concurrency))?;
    let client = FileClient::new();
    let totals = FetchStats::new();

    for project in &config.projects {
        let stats = dump::dump_files(&project.name, &args.output, &engine, &client)
            .await
            .with_context(|| format!("file dump failed for project {:?}", project.name))?;
        totals.merge(&stats);
    }

    info!(
        downloaded = totals.downloaded(),
        skipped = totals.skipped(),
        failed = totals.failed(),
        total = totals.total(),
        "done"
    );

    if totals.failed() > 0 {
        bail!(
            "{} file(s) failed to download; re-run `files` to retry them",
            totals.failed()
        );
    }
    Ok(())
}

/// Verifies each configured credential against the project endpoint.
async fn check_conf(config: &Config) -> Result<()> {
    for project in &config.projects {
        let api = ApiClient::new(project.clone());
        let info = api
            .project_info()
            .await
            .with_context(|| format!("credential check failed for project {:?}", project.name))?;

        println!("[[projects]]");
        println!("name = {:?}", project.name);
        println!("# api response:");
        println!("{}", serde_json::to_string(&info)?);
        if project.name != info.name {
            warn!(
                config_name = %project.name,
                api_name = %info.name,
                "project name in config does not match name from api; config name will be used"
            );
        }
        println!();
    }
    Ok(())
}
