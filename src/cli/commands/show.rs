use super::run_harvest;
use crate::cli::{HarvestArgs, OutputFormat};
use crate::config::Config;
use crate::error::Result;
use crate::models::{HarvestMode, Snapshot};
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq, Eq)]
struct ProfileEntry<'a> {
    profile: String,
    account_id: &'a str,
    account_name: &'a str,
    role_name: &'a str,
}

fn profile_entries(snapshot: &Snapshot) -> Vec<ProfileEntry<'_>> {
    snapshot
        .roles()
        .map(|(account, role)| ProfileEntry {
            profile: account.profile_name(role),
            account_id: &account.id,
            account_name: &account.name,
            role_name: &role.name,
        })
        .collect()
}

pub async fn execute(args: HarvestArgs, format: OutputFormat) -> Result<()> {
    let mut config = Config::load()?;
    args.apply(&mut config);

    let snapshot = run_harvest(&config, HarvestMode::EnumerateOnly).await?;
    let entries = profile_entries(&snapshot);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            for entry in &entries {
                println!("{}", entry.profile);
            }
        }
    }

    Ok(())
}
