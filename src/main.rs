use clap::Parser;
use risk_alloc::cli::{Cli, Commands};
use risk_alloc::config::Config;
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration; the bundled example only stands in for a missing file
    if !Path::new(&cli.config).exists() {
        eprintln!("Warning: {} not found, using bundled example configuration", cli.config);
    }
    let config = Config::load_or(&cli.config, include_str!("../config.toml.example"))?;

    // Initialize telemetry
    let _telemetry = risk_alloc::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Snapshot(args) => {
            tracing::info!(state = %args.state.display(), "Computing risk snapshot");
            args.execute(&config).await?;
        }
        Commands::Evaluate(args) => {
            tracing::info!(state = %args.state.display(), "Evaluating candidates");
            args.execute(&config).await?;
        }
        Commands::Run(args) => {
            tracing::info!("Starting evaluation cycle");
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
