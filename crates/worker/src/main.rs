use std::process::ExitCode;

use clap::Parser;
use styler_pipeline::config::PipelineConfig;
use styler_worker::cli::{Cli, Command};
use styler_worker::commands;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "styler_worker=info,styler_pipeline=info,styler_comfyui=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env();

    tracing::debug!(?config, "Configuration loaded");

    let result = match cli.command {
        Command::Predict(args) => commands::predict(args, &config).await,
        Command::Weights(args) => commands::weights(args, &config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if commands::is_user_error(&e) => {
            eprintln!("Invalid input: {e:#}");
            ExitCode::from(commands::EXIT_USER_ERROR)
        }
        Err(e) => {
            tracing::error!(error = ?e, "Command failed");
            eprintln!("Error: {e:#}");
            ExitCode::from(commands::exit_code(&e))
        }
    }
}
