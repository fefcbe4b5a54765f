//! Gymlog - Command-line entry point
//!
//! Loads settings, restores the stored session and runs one command against
//! the fitness backend.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use gymlog_application::ApiError;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            match e.downcast_ref::<ApiError>() {
                Some(api) => eprintln!("{}", api.user_message()),
                None => eprintln!("{e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
