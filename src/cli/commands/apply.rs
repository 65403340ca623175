use crate::config::Config;
use crate::error::Result;
use crate::terraform::{OverrideSettings, Workspace};
use std::path::PathBuf;

pub async fn execute(alias: Option<String>, dir: PathBuf) -> Result<()> {
    let config = Config::load()?;
    let settings = OverrideSettings {
        credentials_file: config.credentials_file()?,
        aws_config_file: config.aws_config_file()?,
        alias,
    };

    let applied = Workspace::new(&dir, &config.terraform).apply(&settings)?;

    println!(
        "Wrote {} ({} provider blocks), original kept as {}",
        applied.override_file.display(),
        applied.providers,
        applied.backup.display()
    );
    println!("Run `overrides restore` before committing");
    Ok(())
}
