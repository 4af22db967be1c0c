use clap::{Args, Subcommand};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::OutputFormat;
use crate::config::Config;

const DEFAULT_CONFIG: &str = r#"# trvis configuration

# Directory for local project files (default: ~/.local/share/trvis)
# data_dir: ~/.local/share/trvis

repository:
  # local | network
  backend: local

  # Key the local backend stores projects under
  storage_key: trvis-projects

  # Remote project service (network backend only)
  # base_url: http://localhost:3001
  # timeout_ms: 5000
  # retry_attempts: 3
  # retry_delay_ms: 1000
"#;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

impl ConfigCommand {
    pub fn run(
        &self,
        config: &Config,
        config_path: Option<PathBuf>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => print_config(config),
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = config_path.unwrap_or_else(Config::default_config_path);
                if init_config(&config_path)? {
                    println!("Created config file: {}", config_path.display());
                    println!("\nEdit this file to customize your settings.");
                } else {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'trvis config show' to view current configuration.");
                }
                Ok(())
            }
        }
    }
}

fn print_config(config: &Config) {
    println!("Configuration");
    println!("=============\n");

    if let Some(path) = &config.config_file {
        println!("Config file: {}", path.display());
    } else {
        println!(
            "Config file: {} (not found)",
            Config::default_config_path().display()
        );
    }
    println!();

    println!("data_dir: {}", config.data_dir.value.display());
    println!("  source: {}", config.data_dir.source);
    println!();

    let repository = &config.repository;
    println!("repository:");
    println!("  backend: {}", repository.backend);
    println!("  storage_key: {}", repository.storage_key);
    println!(
        "  base_url: {}",
        repository.base_url.as_deref().unwrap_or("(not set)")
    );
    println!("  timeout_ms: {}", repository.timeout_ms);
    println!("  retry_attempts: {}", repository.retry_attempts);
    println!("  retry_delay_ms: {}", repository.retry_delay_ms);
}

/// Writes the default config file. Returns false if one already exists.
fn init_config(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = fs::File::create(path)?;
    file.write_all(DEFAULT_CONFIG.as_bytes())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use trvis_core::RepositoryConfig;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.yaml");

        assert!(init_config(&path).unwrap());
        assert!(!init_config(&path).unwrap());

        let config = Config::load(Some(path.clone())).unwrap();
        assert_eq!(config.config_file, Some(path));
        assert_eq!(config.repository, RepositoryConfig::default());
    }
}
