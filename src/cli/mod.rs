// CLI interface
pub mod commands;

use crate::config::Config;
use crate::error::Result;
use crate::harvest::FailurePolicy;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "overrides")]
#[command(
    about = "Harvest AWS SSO accounts and roles into AWS CLI profiles",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Harvest tuning shared by `refresh` and `show`; unset flags fall back to the config file
#[derive(Args, Debug, Default, Clone)]
pub struct HarvestArgs {
    /// Number of concurrent credential workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Number of accounts whose roles are listed at once
    #[arg(short, long)]
    pub chunks: Option<usize>,

    /// SSO token cache directory (default: ~/.aws/sso/cache)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// What a failing account does to the run
    #[arg(long, value_enum)]
    pub on_account_error: Option<FailurePolicy>,
}

impl HarvestArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(workers) = self.workers {
            config.harvest.workers = workers;
        }
        if let Some(chunks) = self.chunks {
            config.harvest.chunks = chunks;
        }
        if let Some(cache_dir) = &self.cache_dir {
            config.sso.cache_dir = Some(cache_dir.clone());
        }
        if let Some(policy) = self.on_account_error {
            config.harvest.on_account_error = policy;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Harvest every account and role and write AWS CLI profiles
    ///
    /// By default writes `[profile {account}-{role}]` SSO profiles to ~/.aws/config.
    /// With --use-credentials-file, fetches short-lived credentials for every role
    /// and writes them to ~/.aws/credentials instead.
    Refresh {
        #[command(flatten)]
        harvest: HarvestArgs,

        /// Write static role credentials to ~/.aws/credentials
        #[arg(long)]
        use_credentials_file: bool,
    },

    /// List the profile names a refresh would write
    Show {
        #[command(flatten)]
        harvest: HarvestArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Swap providers.tf for an overrides.tf that uses harvested profiles
    ///
    /// Backs up providers.tf (or provider.tf) as providers.tf.overrides and writes
    /// one aws provider per original block, with its profile taken from the mapping
    /// file. Run `overrides restore` before committing.
    Apply {
        /// Replace the environment segment of every mapped profile
        /// (`<org>-<account>-<env>-<role>`)
        #[arg(long)]
        alias: Option<String>,

        /// Terraform working directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Remove overrides.tf and put the original provider file back
    Restore {
        /// Terraform working directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Check the cached SSO session
    Status {
        /// Output in JSON format for scripting
        #[arg(long)]
        json: bool,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Generate shell completion scripts
    ///
    /// INSTALLATION:
    ///
    /// Bash:
    ///   eval "$(overrides completions bash)"    # Add to ~/.bashrc
    ///
    /// Zsh:
    ///   eval "$(overrides completions zsh)"     # Add to ~/.zshrc
    ///
    /// Fish:
    ///   overrides completions fish > ~/.config/fish/completions/overrides.fish
    ///
    /// PowerShell:
    ///   overrides completions powershell | Out-String | Invoke-Expression
    ///
    /// Elvish:
    ///   eval (overrides completions elvish | slurp)
    Completions {
        /// Shell type to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a sample config file
    Init,
    /// Print the config file location
    Path,
    /// Print the effective configuration (file, environment, defaults)
    Show,
    /// Set a value in the config file, e.g. `harvest.workers 8`
    ///
    /// An empty value clears optional settings.
    Set {
        /// Dotted key such as sso.start_url or harvest.on_account_error
        key: String,
        value: String,
    },
    /// Move the config file aside so the defaults apply again
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

pub async fn execute(args: Cli) -> Result<()> {
    match args.command {
        Commands::Refresh {
            harvest,
            use_credentials_file,
        } => commands::refresh::execute(harvest, use_credentials_file).await,
        Commands::Show { harvest, format } => commands::show::execute(harvest, format).await,
        Commands::Apply { alias, dir } => commands::apply::execute(alias, dir).await,
        Commands::Restore { dir } => commands::restore::execute(dir).await,
        Commands::Status { json } => commands::status::execute(json).await,
        Commands::Config { command } => commands::config::execute(command).await,
        Commands::Completions { shell } => {
            commands::completions::execute(shell);
            Ok(())
        }
    }
}
