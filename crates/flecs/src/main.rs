mod commands;
mod utils;

use clap::{Parser, Subcommand};
use colored::Colorize;
use flecs_deploy::ResourceKind;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code after Ctrl-C, as a shell would report SIGINT
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "flecs", version)]
#[command(about = "Config-driven deployments to ECS clusters", long_about = None)]
struct Cli {
    /// Config file (defaults to flecs.yaml in the current directory)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Environment whose options override the top-level ones
    #[arg(short, long, global = true, env = "FLECS_ENVIRONMENT")]
    environment: Option<String>,

    /// Image tag for docker steps (defaults to the git HEAD commit)
    #[arg(short, long, global = true, env = "FLECS_TAG")]
    tag: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline
    Deploy,
    /// Remove a service instance or the whole cluster
    #[command(name = "rm")]
    Remove {
        /// service or cluster
        kind: ResourceKind,
        /// Service name; for a cluster, defaults to the configured one
        name: Option<String>,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if matches!(cli.command, Commands::Version) {
        println!("flecs {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    tokio::select! {
        result = run(cli) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!();
            eprintln!("{}", "Interrupted".yellow().bold());
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}

/// Logs go to stderr; stdout carries progress and task output
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Deploy => {
            let tag = cli.tag.or_else(utils::git_head_tag);
            let config = utils::load_config(cli.file.as_deref(), cli.environment, tag)?;
            let deployer = utils::deployer(&config).await?;
            commands::deploy::handle(&deployer, &config).await
        }
        Commands::Remove { kind, name } => {
            let config = utils::load_config(cli.file.as_deref(), cli.environment, cli.tag)?;
            let name = commands::remove::target_name(kind, name)?;
            let deployer = utils::deployer(&config).await?;
            commands::remove::handle(&deployer, &config, kind, &name).await
        }
        Commands::Version => Ok(()),
    }
}
