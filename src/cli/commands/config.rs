use crate::cli::ConfigCommand;
use crate::config::Config;
use crate::error::{OverrideError, Result};
use chrono::Utc;

pub async fn execute(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Init => {
            let path = Config::create_sample()?;
            println!("Created sample config file at: {}", path.display());
            println!("\nSet your SSO start URL to generate SSO profiles:");
            println!("  start_url = \"https://your-org.awsapps.com/start\"");
        }
        ConfigCommand::Path => {
            let config_path = Config::config_file_path()?;
            println!("Config file path: {}", config_path.display());

            if !config_path.exists() {
                println!("Status: File does not exist");
                println!("\nTo create a sample config file, run:");
                println!("  overrides config init");
                return Ok(());
            }

            println!("Status: File exists");
            match Config::load().and_then(|config| config.validate()) {
                Ok(()) => println!("Valid: Yes"),
                Err(e) => {
                    println!("Valid: No");
                    println!("Error: {}", e);
                }
            }
        }
        ConfigCommand::Show => {
            let config = Config::load()?;
            let rendered = toml::to_string_pretty(&config).map_err(|e| {
                OverrideError::ConfigError(format!("Failed to serialize config: {}", e))
            })?;
            print!("{}", rendered);
        }
        ConfigCommand::Set { key, value } => {
            // Environment overrides are not persisted
            let path = Config::config_file_path()?;
            let mut config = Config::load_from(&path)?;
            config.set(&key, &value)?;
            config.save_to(&path)?;
            println!("Set {} in {}", key, path.display());
        }
        ConfigCommand::Reset => {
            let path = Config::config_file_path()?;
            match Config::reset_file(&path, Utc::now())? {
                Some(backup) => println!("Moved {} to {}", path.display(), backup.display()),
                None => println!("No config file at {}; defaults already apply", path.display()),
            }
        }
    }

    Ok(())
}
