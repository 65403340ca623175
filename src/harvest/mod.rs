// Account/role/credential harvesting pipeline
mod accounts;
mod roles;

pub use accounts::enumerate_accounts;

use crate::auth;
use crate::error::{OverrideError, Result};
use crate::models::{HarvestMode, RoleFilter, Snapshot, SsoToken};
use crate::sso::{AwsSsoApi, BackoffSchedule, Gateway, SsoApi, DEFAULT_REQUEST_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const DEFAULT_WORKERS: usize = 12;
pub const DEFAULT_CHUNKS: usize = 4;
pub const DEFAULT_REGION: &str = "eu-west-2";

/// What a per-account failure does to the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Any failure aborts the whole harvest
    #[default]
    Abort,
    /// Remote failures leave the affected account (or role) out and are reported
    Skip,
}

#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub mode: HarvestMode,
    /// Number of consumer workers
    pub workers: usize,
    /// Producer launch batch size
    pub chunks: usize,
    pub request_timeout: Duration,
    pub on_account_error: FailurePolicy,
    /// SSO portal region set by config or environment; see [`HarvestOptions::resolve_region`]
    pub region: Option<String>,
    pub role_filter: RoleFilter,
    pub backoff: BackoffSchedule,
}

impl HarvestOptions {
    pub fn new(mode: HarvestMode) -> Self {
        Self {
            mode,
            workers: DEFAULT_WORKERS,
            chunks: DEFAULT_CHUNKS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            on_account_error: FailurePolicy::default(),
            region: None,
            role_filter: RoleFilter::default(),
            backoff: BackoffSchedule::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(OverrideError::ConfigError(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.chunks == 0 {
            return Err(OverrideError::ConfigError(
                "chunks must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(OverrideError::ConfigError(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Portal region: the configured one, else the region `aws sso login`
    /// recorded in the token, else [`DEFAULT_REGION`]
    pub fn resolve_region(&self, token: &SsoToken) -> String {
        [self.region.as_deref(), token.region.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|region| !region.is_empty())
            .unwrap_or(DEFAULT_REGION)
            .to_string()
    }
}

/// Runs the pipeline against any [`SsoApi`]
pub struct Harvester<A> {
    gateway: Arc<Gateway<A>>,
    options: HarvestOptions,
}

impl<A: SsoApi + 'static> Harvester<A> {
    pub fn new(api: A, options: HarvestOptions) -> Self {
        let gateway = Gateway::new(api, options.backoff.clone(), options.request_timeout);
        Self {
            gateway: Arc::new(gateway),
            options,
        }
    }

    #[cfg(test)]
    pub fn gateway(&self) -> &Gateway<A> {
        &self.gateway
    }

    /// Enumerate accounts, then harvest their roles
    ///
    /// Returns the complete snapshot or an error; never a partial snapshot
    /// (accounts skipped under [`FailurePolicy::Skip`] are listed in
    /// [`Snapshot::skipped`]). Once `cancel` fires no new upstream call starts
    /// and the run ends with [`OverrideError::Cancelled`].
    pub async fn run(&self, token: &SsoToken, cancel: CancellationToken) -> Result<Snapshot> {
        self.options.validate()?;
        if token.access_token.trim().is_empty() {
            return Err(OverrideError::MalformedToken(
                "access token is empty".to_string(),
            ));
        }
        let access_token: Arc<str> = Arc::from(token.access_token.as_str());

        // Fires on caller cancellation or on the first fatal error
        let stop = cancel.child_token();

        let result = async {
            let accounts = enumerate_accounts(&*self.gateway, &access_token, &stop).await?;
            roles::harvest_roles(
                Arc::clone(&self.gateway),
                access_token.clone(),
                accounts,
                &self.options,
                stop.clone(),
            )
            .await
        }
        .await;

        match result {
            Ok(_) if cancel.is_cancelled() => Err(OverrideError::Cancelled),
            other => other,
        }
    }
}

/// Load the cached token from `cache_dir` and harvest the estate through AWS SSO
pub async fn harvest(
    cache_dir: &Path,
    options: &HarvestOptions,
    cancel: CancellationToken,
) -> Result<Snapshot> {
    options.validate()?;
    let token = auth::load_token(cache_dir)?;
    let region = options.resolve_region(&token);
    debug!("Using SSO region {}", region);
    let api = AwsSsoApi::new(&region, options.request_timeout).await;
    let mut snapshot = Harvester::new(api, options.clone()).run(&token, cancel).await?;
    snapshot.region = Some(region);
    Ok(snapshot)
}
