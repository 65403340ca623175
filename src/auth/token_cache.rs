use crate::error::{OverrideError, Result};
use crate::models::SsoToken;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Token files are a few hundred bytes; anything larger is not a token
pub const MAX_TOKEN_FILE_BYTES: u64 = 8 * 1024;

/// Default location of the AWS CLI v2 SSO token cache (~/.aws/sso/cache)
pub fn default_cache_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".aws").join("sso").join("cache"))
        .ok_or_else(|| OverrideError::ConfigError("Could not determine home directory".to_string()))
}

/// Locate the token file in the SSO cache
///
/// `aws sso login` leaves several `.json` files behind (client registration,
/// botocore artifacts). The first plain `.json` file whose name does not
/// mention botocore, in directory order, holds the access token.
pub fn find_token_file(cache_dir: &Path) -> Result<PathBuf> {
    if !cache_dir.is_dir() {
        return Err(OverrideError::MissingCache(cache_dir.to_path_buf()));
    }

    tracing::debug!("Searching {} for an SSO token", cache_dir.display());

    for entry in fs::read_dir(cache_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        tracing::debug!("Checking {} for token", file_name);

        if file_name.ends_with(".json") && !file_name.contains("botocore") {
            tracing::debug!("Found token file: {}", file_name);
            return Ok(entry.path());
        }
    }

    Err(OverrideError::NoTokenFile(cache_dir.to_path_buf()))
}

/// Load and validate the cached SSO bearer token
pub fn load_token(cache_dir: &Path) -> Result<SsoToken> {
    let path = find_token_file(cache_dir)?;

    let size = fs::metadata(&path)?.len();
    if size > MAX_TOKEN_FILE_BYTES {
        return Err(OverrideError::TokenTooLarge {
            path,
            size,
            limit: MAX_TOKEN_FILE_BYTES,
        });
    }

    // Bounded read in case the file grew after the metadata check
    let mut contents = Vec::new();
    fs::File::open(&path)?
        .take(MAX_TOKEN_FILE_BYTES + 1)
        .read_to_end(&mut contents)?;
    if contents.len() as u64 > MAX_TOKEN_FILE_BYTES {
        return Err(OverrideError::TokenTooLarge {
            path,
            size: contents.len() as u64,
            limit: MAX_TOKEN_FILE_BYTES,
        });
    }

    let token: SsoToken = serde_json::from_slice(&contents).map_err(|e| {
        OverrideError::MalformedToken(format!("{} is not valid JSON: {}", path.display(), e))
    })?;

    if token.access_token.trim().is_empty() {
        return Err(OverrideError::MalformedToken(format!(
            "{} has no accessToken",
            path.display()
        )));
    }

    match (&token.expires_at, token.expiry()) {
        (Some(_), Some(at)) if token.is_expired() => {
            return Err(OverrideError::SessionExpired(at.to_rfc3339()));
        }
        (Some(raw), None) => {
            tracing::debug!("Ignoring unparseable expiresAt value: {}", raw);
        }
        _ => {}
    }

    tracing::debug!("Loaded SSO token from {}", path.display());
    Ok(token)
}
