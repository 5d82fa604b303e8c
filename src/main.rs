use clap::Parser;
use color_eyre::Result;
use tracing::{Level, debug};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Args, Command};

mod auth;
mod azureml;
mod cli;
mod config;
mod deploy;
mod error;
mod hub;
mod naming;
mod report;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let _guard = initialize_logging(args.verbose);

    let config = config::load(args.config.as_deref())?;
    debug!(?config, "Loaded configuration");

    match args.command {
        Command::Deploy(deploy_args) => {
            deploy::run(deploy_args, &config).await?;
        }
    }

    Ok(())
}

fn initialize_logging(verbose: bool) -> WorkerGuard {
    let default_level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stderr());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(false),
        )
        .init();

    guard
}
