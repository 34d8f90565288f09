//! rate-limit-metrics command-line tool
//!
//! Generates configuration templates and shows the metrics a configuration
//! provisions.

use clap::Parser;
use rate_limit_metrics::{
    cli::{self, Cli, Command},
    config::Config,
    telemetry,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Config { output }) => {
            let template = cli::generate_config_template();
            match output {
                Some(path) => {
                    std::fs::write(&path, template)?;
                    eprintln!("Wrote configuration template to {}", path);
                }
                None => print!("{}", template),
            }
        }
        Some(Command::Inspect) | None => {
            let config = Config::from_file(&cli.config)?;
            telemetry::init(&config.observability.log_level);

            tracing::info!(
                config = %cli.config,
                zones = config.zones.len(),
                "Inspecting rate limit metrics"
            );

            print!("{}", cli::inspect(config)?);
        }
    }

    Ok(())
}
