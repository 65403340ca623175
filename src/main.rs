// overrides - harvest AWS SSO accounts and roles into AWS CLI profiles

mod auth;
mod aws_config;
mod cli;
mod config;
mod error;
mod harvest;
mod models;
mod sso;
mod terraform;

use clap::Parser;

#[tokio::main]
async fn main() {
    let args = cli::Cli::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // Logs go to stderr so stdout stays scriptable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = cli::execute(args).await {
        tracing::debug!("Failed with {:?} error: {:?}", err.kind(), err);
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
