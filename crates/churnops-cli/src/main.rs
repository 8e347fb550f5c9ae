mod adapters;
mod cli;
mod config;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::ChurnOpsConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries command output such as trigger JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ChurnOpsConfig::load_or_default(&cli.config);
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match cli.command {
        Commands::ShouldRetrain(a) => cli::should_retrain::run(a, config).await?,
        Commands::Decide(a)        => cli::decide::run(a, config).await?,
        Commands::Evaluate(a)      => cli::evaluate::run(a, config).await?,
        Commands::Retrain(a)       => cli::retrain::run(a, config).await?,
        Commands::Registry(cmd)    => cli::registry::run(cmd, config).await?,
        Commands::Log(a)           => cli::log_cmd::run(a, config).await?,
        Commands::Config(cmd)      => cli::config_cmd::run(cmd, &cli.config).await?,
    }
    Ok(())
}
