// AWS credentials and config file writer
use crate::config::ProfileSettings;
use crate::error::{OverrideError, Result};
use crate::models::Snapshot;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

fn read_or_empty(path: &Path) -> Result<String> {
    if !path.exists() {
        return Ok(String::new());
    }
    fs::read_to_string(path).map_err(|e| {
        OverrideError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
    })
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| {
                OverrideError::ConfigError(format!(
                    "Failed to create directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
    }
    fs::write(path, content).map_err(|e| {
        OverrideError::ConfigError(format!("Failed to write {}: {}", path.display(), e))
    })
}

/// Upsert a `[{account}-{role}]` section for every role holding credentials
///
/// Each section carries `# Account:`, `# Role:` and, when known, `# Expiration:`
/// comments. Sections for other profiles are left untouched. Returns the
/// number of profiles written.
pub fn write_credentials_file(path: &Path, snapshot: &Snapshot) -> Result<usize> {
    let mut content = read_or_empty(path)?;
    let mut written = 0;

    for (account, role) in snapshot.roles() {
        let Some(creds) = &role.credentials else {
            continue;
        };

        let mut comments = vec![
            format!("# Account: {}", account.id),
            format!("# Role: {}", role.name),
        ];
        if let Some(expiration) = creds.expiration {
            comments.push(format!("# Expiration: {}", expiration.to_rfc3339()));
        }

        content = update_ini_section_with_comments(
            &content,
            &account.profile_name(role),
            &[
                ("aws_access_key_id", &creds.access_key_id),
                ("aws_secret_access_key", &creds.secret_access_key),
                ("aws_session_token", &creds.session_token),
            ],
            Some(comments.as_slice()),
        );
        written += 1;
    }

    write_file(path, &content)?;
    tracing::info!("Wrote {} credential profiles to {}", written, path.display());
    Ok(written)
}

/// Upsert a `[profile {account}-{role}]` SSO profile for every harvested role
pub fn write_sso_profiles(
    path: &Path,
    snapshot: &Snapshot,
    settings: &ProfileSettings,
) -> Result<usize> {
    let mut content = read_or_empty(path)?;
    let mut written = 0;

    for (account, role) in snapshot.roles() {
        content = update_ini_section(
            &content,
            &format!("profile {}", account.profile_name(role)),
            &[
                ("sso_start_url", &settings.start_url),
                ("sso_region", &settings.sso_region),
                ("sso_account_id", &account.id),
                ("sso_role_name", &role.name),
                ("region", &settings.region),
                ("output", &settings.output),
            ],
        );
        written += 1;
    }

    write_file(path, &content)?;
    tracing::info!("Wrote {} SSO profiles to {}", written, path.display());
    Ok(written)
}

/// Drop the SSO profiles of harvested roles so static credentials take precedence
pub fn remove_sso_profiles(path: &Path, snapshot: &Snapshot) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }

    let original = read_or_empty(path)?;
    let existing: HashSet<String> = section_names(&original).into_iter().collect();
    let mut content = original.clone();
    let mut removed = 0;

    for (account, role) in snapshot.roles() {
        let section = format!("profile {}", account.profile_name(role));
        if existing.contains(&section) {
            content = delete_ini_section(&content, &section);
            removed += 1;
        }
    }

    if removed > 0 {
        write_file(path, &content)?;
        tracing::debug!("Removed {} SSO profiles from {}", removed, path.display());
    }
    Ok(removed)
}

fn section_names(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('[') && line.ends_with(']'))
        .map(|line| line[1..line.len() - 1].to_string())
        .collect()
}

/// Update or add a section in an INI-style file with optional comment metadata
fn update_ini_section_with_comments(
    content: &str,
    section_name: &str,
    key_values: &[(&str, &str)],
    comments: Option<&[String]>,
) -> String {
    let mut result = String::new();
    let mut in_target_section = false;
    let mut section_found = false;
    let mut updated_keys = HashSet::new();

    let push_missing = |result: &mut String, updated: &HashSet<&str>| {
        for (key, value) in key_values {
            if !updated.contains(*key) {
                result.push_str(&format!("{} = {}\n", key, value));
            }
        }
    };

    for line in content.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            if in_target_section {
                push_missing(&mut result, &updated_keys);
                updated_keys.clear();
            }

            let section = &trimmed[1..trimmed.len() - 1];
            in_target_section = section == section_name;
            result.push_str(line);
            result.push('\n');
            if in_target_section {
                section_found = true;
                for comment in comments.unwrap_or_default() {
                    result.push_str(comment);
                    result.push('\n');
                }
            }
            continue;
        }

        if in_target_section {
            // Old metadata is replaced by the comments written above
            if trimmed.starts_with('#') {
                continue;
            }
            if let Some(eq_pos) = trimmed.find('=') {
                let key = trimmed[..eq_pos].trim();
                if let Some((k, new_value)) = key_values.iter().find(|(k, _)| *k == key) {
                    result.push_str(&format!("{} = {}\n", key, new_value));
                    updated_keys.insert(*k);
                    continue;
                }
            }
        }

        result.push_str(line);
        result.push('\n');
    }

    if in_target_section {
        push_missing(&mut result, &updated_keys);
    }

    if !section_found {
        if !result.is_empty() {
            result.push('\n');
        }
        result.push_str(&format!("[{}]\n", section_name));
        for comment in comments.unwrap_or_default() {
            result.push_str(comment);
            result.push('\n');
        }
        for (key, value) in key_values {
            result.push_str(&format!("{} = {}\n", key, value));
        }
    }

    cleanup_empty_lines(&result)
}

fn update_ini_section(content: &str, section_name: &str, key_values: &[(&str, &str)]) -> String {
    update_ini_section_with_comments(content, section_name, key_values, None)
}

/// Delete a section from an INI-style file
fn delete_ini_section(content: &str, section_name: &str) -> String {
    let mut result = String::new();
    let mut in_target_section = false;

    for line in content.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            in_target_section = &trimmed[1..trimmed.len() - 1] == section_name;
        }

        if !in_target_section {
            result.push_str(line);
            result.push('\n');
        }
    }

    cleanup_empty_lines(&result)
}

/// Clean up empty lines in INI files:
/// - Remove leading empty lines
/// - Ensure at most one blank line in a row
/// - Remove trailing empty lines
fn cleanup_empty_lines(content: &str) -> String {
    let mut result = String::new();
    let mut previous_blank = false;
    let mut at_start = true;

    for line in content.lines() {
        let is_blank = line.trim().is_empty();

        if at_start && is_blank {
            continue;
        }
        if !is_blank {
            at_start = false;
        }
        if is_blank && previous_blank {
            continue;
        }

        result.push_str(line);
        result.push('\n');
        previous_blank = is_blank;
    }

    while result.ends_with("\n\n") {
        result.pop();
    }

    result
}

/// A profile found in a credentials file, with the metadata this tool writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileStatus {
    pub profile_name: String,
    pub account_id: Option<String>,
    pub role_name: Option<String>,
    pub has_credentials: bool,
    pub expiration: Option<DateTime<Utc>>,
}

impl ProfileStatus {
    fn new(profile_name: String) -> Self {
        Self {
            profile_name,
            account_id: None,
            role_name: None,
            has_credentials: false,
            expiration: None,
        }
    }
}

const CREDENTIAL_KEYS: [&str; 3] = [
    "aws_access_key_id",
    "aws_secret_access_key",
    "aws_session_token",
];

/// List every profile in a credentials file along with its metadata comments
pub fn read_profile_statuses(path: &Path) -> Result<Vec<ProfileStatus>> {
    let content = read_or_empty(path)?;

    let mut profiles = Vec::new();
    let mut current: Option<ProfileStatus> = None;
    let mut keys: HashMap<String, String> = HashMap::new();

    let finish = |status: Option<ProfileStatus>,
                  keys: &mut HashMap<String, String>,
                  profiles: &mut Vec<ProfileStatus>| {
        if let Some(mut status) = status {
            status.has_credentials = CREDENTIAL_KEYS.iter().all(|key| keys.contains_key(*key));
            profiles.push(status);
        }
        keys.clear();
    };

    for line in content.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            finish(current.take(), &mut keys, &mut profiles);
            current = Some(ProfileStatus::new(trimmed[1..trimmed.len() - 1].to_string()));
            continue;
        }

        let Some(status) = current.as_mut() else {
            continue;
        };
        if let Some(rest) = trimmed.strip_prefix("# Account:") {
            status.account_id = Some(rest.trim().to_string());
        } else if let Some(rest) = trimmed.strip_prefix("# Role:") {
            status.role_name = Some(rest.trim().to_string());
        } else if let Some(rest) = trimmed.strip_prefix("# Expiration:") {
            status.expiration = DateTime::parse_from_rfc3339(rest.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc));
        } else if let Some((key, value)) = trimmed.split_once('=') {
            keys.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    finish(current, &mut keys, &mut profiles);

    Ok(profiles)
}
