use super::run_harvest;
use crate::aws_config;
use crate::cli::HarvestArgs;
use crate::config::Config;
use crate::error::Result;
use crate::models::HarvestMode;

pub async fn execute(args: HarvestArgs, use_credentials_file: bool) -> Result<()> {
    let mut config = Config::load()?;
    args.apply(&mut config);
    if use_credentials_file {
        config.output.use_credentials_file = true;
    }

    if config.output.use_credentials_file {
        let snapshot = run_harvest(&config, HarvestMode::FetchCredentials).await?;

        let credentials_path = config.credentials_file()?;
        let written = aws_config::write_credentials_file(&credentials_path, &snapshot)?;
        // Stale SSO profiles with the same name would shadow the static credentials
        let removed = aws_config::remove_sso_profiles(&config.aws_config_file()?, &snapshot)?;

        println!(
            "Wrote {} profiles across {} accounts to {}",
            written,
            snapshot.accounts.len(),
            credentials_path.display()
        );
        if removed > 0 {
            println!("Removed {} superseded SSO profiles", removed);
        }
    } else {
        // Fail on a missing start URL before talking to AWS
        config.profile_settings(None)?;
        let snapshot = run_harvest(&config, HarvestMode::EnumerateOnly).await?;
        let settings = config.profile_settings(snapshot.region.as_deref())?;

        let config_path = config.aws_config_file()?;
        let written = aws_config::write_sso_profiles(&config_path, &snapshot, &settings)?;
        println!(
            "Wrote {} SSO profiles across {} accounts to {}",
            written,
            snapshot.accounts.len(),
            config_path.display()
        );
    }

    Ok(())
}
