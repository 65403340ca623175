use crate::auth;
use crate::aws_config::{self, ProfileStatus};
use crate::config::Config;
use crate::error::{OverrideError, Result};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct SessionStatus {
    active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<String>,
}

impl SessionStatus {
    fn inactive(reason: &'static str, token_file: Option<PathBuf>) -> Self {
        Self {
            active: false,
            reason: Some(reason),
            token_file,
            expires_in_minutes: None,
            start_url: None,
            region: None,
        }
    }

    fn describe(&self) -> String {
        match (self.active, self.reason) {
            (true, _) => match self.expires_in_minutes {
                Some(minutes) => format!("SSO session active (expires in {} minutes)", minutes),
                None => "SSO session active".to_string(),
            },
            (false, Some("no_cache")) => "SSO token cache not found".to_string(),
            (false, Some("expired")) => "SSO session expired".to_string(),
            (false, Some("malformed")) => "SSO token file is unreadable".to_string(),
            (false, _) => "No SSO session found".to_string(),
        }
    }
}

fn session_status(cache_dir: &Path) -> SessionStatus {
    let token_file = match auth::find_token_file(cache_dir) {
        Ok(path) => path,
        Err(OverrideError::MissingCache(_)) => return SessionStatus::inactive("no_cache", None),
        Err(_) => return SessionStatus::inactive("no_session", None),
    };

    match auth::load_token(cache_dir) {
        Ok(token) => SessionStatus {
            active: true,
            reason: None,
            token_file: Some(token_file),
            expires_in_minutes: token.expires_in_minutes(),
            start_url: token.start_url,
            region: token.region,
        },
        Err(OverrideError::SessionExpired(_)) => {
            SessionStatus::inactive("expired", Some(token_file))
        }
        Err(err) => {
            tracing::debug!("Token unusable: {}", err);
            SessionStatus::inactive("malformed", Some(token_file))
        }
    }
}

/// Profiles this tool wrote, i.e. the ones carrying account metadata
fn harvested_profiles(statuses: Vec<ProfileStatus>) -> Vec<ProfileStatus> {
    statuses
        .into_iter()
        .filter(|status| status.account_id.is_some() && status.has_credentials)
        .collect()
}

pub async fn execute(json: bool) -> Result<()> {
    let config = Config::load()?;
    let status = session_status(&config.cache_dir()?);

    if json {
        println!("{}", serde_json::to_string(&status)?);
    } else {
        println!("{}", status.describe());
        if let Some(path) = &status.token_file {
            println!("Token file: {}", path.display());
        }
        if let Some(start_url) = &status.start_url {
            println!("Start URL: {}", start_url);
        }
        if let Some(region) = &status.region {
            println!("Region: {}", region);
        }

        if config.output.use_credentials_file {
            let path = config.credentials_file()?;
            let profiles = harvested_profiles(aws_config::read_profile_statuses(&path)?);
            let now = Utc::now();
            let expired = profiles
                .iter()
                .filter(|p| p.expiration.is_some_and(|at| at <= now))
                .count();
            println!(
                "Credential profiles: {} written, {} expired",
                profiles.len(),
                expired
            );
        }
    }

    std::process::exit(if status.active { 0 } else { 1 });
}
