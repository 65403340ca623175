pub mod apply;
pub mod completions;
pub mod config;
pub mod refresh;
pub mod restore;
pub mod show;
pub mod status;

use crate::config::Config;
use crate::error::Result;
use crate::harvest;
use crate::models::{HarvestMode, Snapshot};
use tokio_util::sync::CancellationToken;

/// Run a harvest with the effective config; Ctrl-C cancels it
pub(crate) async fn run_harvest(config: &Config, mode: HarvestMode) -> Result<Snapshot> {
    config.validate()?;
    let options = config.to_harvest_options(mode);
    let cache_dir = config.cache_dir()?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, waiting for in-flight requests to finish");
                cancel.cancel();
            }
        })
    };

    let result = harvest::harvest(&cache_dir, &options, cancel).await;
    interrupt.abort();

    let snapshot = result?;
    if snapshot.is_empty() {
        tracing::warn!("The SSO token grants access to no accounts");
    }
    for skipped in &snapshot.skipped {
        let name = snapshot
            .account(&skipped.account_id)
            .map(|account| account.name.as_str())
            .unwrap_or("unknown");
        tracing::warn!(
            "Skipped account {} ({}): {}",
            name,
            skipped.account_id,
            skipped.reason
        );
    }
    Ok(snapshot)
}
