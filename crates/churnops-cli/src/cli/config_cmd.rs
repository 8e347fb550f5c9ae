use crate::cli::ConfigCommands;
use crate::config::ChurnOpsConfig;
use anyhow::Result;
use std::path::Path;

pub async fn run(cmd: ConfigCommands, config_path: &Path) -> Result<()> {
    match cmd {
        ConfigCommands::Validate => validate(config_path),
        ConfigCommands::Show => show(config_path),
    }
}

fn validate(config_path: &Path) -> Result<()> {
    match ChurnOpsConfig::load(config_path) {
        Ok(config) => {
            let errors = config.validate();
            if errors.is_empty() {
                println!("{} is valid.", config_path.display());
            } else {
                println!("Validation errors in {}:", config_path.display());
                for e in &errors {
                    println!("  - {}", e);
                }
                std::process::exit(1);
            }
        }
        Err(e) => {
            println!("Failed to load {}: {:#}", config_path.display(), e);
            std::process::exit(1);
        }
    }
    Ok(())
}

/// Print the effective configuration, defaults included.
fn show(config_path: &Path) -> Result<()> {
    let config = ChurnOpsConfig::load_or_default(config_path);
    let text = toml::to_string_pretty(&config)
        .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
    println!("{}", text);
    Ok(())
}
