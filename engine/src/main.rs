// Warden plugin host
// Main entry point for the warden binary

use clap::Parser;
use warden_engine::cli::{Cli, Command};
use warden_engine::config::Config;
use warden_engine::handlers::{handle_checksum, handle_load, handle_policy, handle_validate, OutputFormat};
use warden_engine::runtime::RUNTIME_VERSION;
use warden_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // Priority: RUST_LOG > --log > config
    init_telemetry_with_level(cli.log.as_deref().unwrap_or(&config.core.log_level));

    tracing::info!("Warden v{}", RUNTIME_VERSION);

    match cli.command {
        Command::Load { names, once } => {
            tracing::info!("Loading plugins from {:?}", config.core.plugins_dir);
            handle_load(names, once, &config, format).await
        }

        Command::Checksum { name } => handle_checksum(&name, &config, format),

        Command::Validate { file } => {
            tracing::info!("Validating {}", file.display());
            handle_validate(&file, &config, format)
        }

        Command::Policy => handle_policy(format),
    }
}
