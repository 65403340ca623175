// Configuration management
use crate::auth;
use crate::error::{OverrideError, Result};
use crate::harvest::{
    FailurePolicy, HarvestOptions, DEFAULT_CHUNKS, DEFAULT_REGION, DEFAULT_WORKERS,
};
use crate::models::HarvestMode;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "overrides";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub sso: SsoConfig,
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub terraform: TerraformConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SsoConfig {
    pub start_url: Option<String>,
    pub region: Option<String>,
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_chunks")]
    pub chunks: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub on_account_error: FailurePolicy,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_chunks() -> usize {
    DEFAULT_CHUNKS
}

fn default_request_timeout_secs() -> u64 {
    crate::sso::DEFAULT_REQUEST_TIMEOUT.as_secs()
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            chunks: default_chunks(),
            request_timeout_secs: default_request_timeout_secs(),
            on_account_error: FailurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Write static credentials instead of SSO profiles
    #[serde(default = "default_use_credentials_file")]
    pub use_credentials_file: bool,
    pub credentials_file: Option<PathBuf>,
    pub aws_config_file: Option<PathBuf>,
    /// Region written into profiles, falls back to the SSO region
    pub region: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
}

// The AWS CLI on Windows does not pick up SSO profiles reliably
fn default_use_credentials_file() -> bool {
    cfg!(windows)
}

fn default_format() -> String {
    "json".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            use_credentials_file: default_use_credentials_file(),
            credentials_file: None,
            aws_config_file: None,
            region: None,
            format: default_format(),
        }
    }
}

/// Files used by `apply` and `restore` in the terraform working directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerraformConfig {
    #[serde(default = "default_override_file")]
    pub override_file: PathBuf,
    /// Provider alias to profile mappings
    #[serde(default = "default_mapping_file")]
    pub mapping_file: PathBuf,
}

fn default_override_file() -> PathBuf {
    PathBuf::from("overrides.tf")
}

fn default_mapping_file() -> PathBuf {
    PathBuf::from("mappings.hcl")
}

impl Default for TerraformConfig {
    fn default() -> Self {
        Self {
            override_file: default_override_file(),
            mapping_file: default_mapping_file(),
        }
    }
}

/// Keys accepted by `config set`
pub const SETTABLE_KEYS: &[&str] = &[
    "sso.start_url",
    "sso.region",
    "sso.cache_dir",
    "harvest.workers",
    "harvest.chunks",
    "harvest.request_timeout_secs",
    "harvest.on_account_error",
    "output.use_credentials_file",
    "output.credentials_file",
    "output.aws_config_file",
    "output.region",
    "output.format",
    "terraform.override_file",
    "terraform.mapping_file",
];

/// Settings written into every `[profile ...]` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSettings {
    pub start_url: String,
    pub sso_region: String,
    pub region: String,
    pub output: String,
}

impl Config {
    /// Get the config directory path
    ///
    /// Priority:
    /// 1. XDG_CONFIG_HOME/overrides (if env var is set)
    /// 2. ~/.config/overrides (if ~/.config exists)
    /// 3. ~/.overrides (fallback on Unix, doesn't create ~/.config)
    /// 4. Platform default on Windows
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config).join(APP_DIR));
        }

        #[cfg(unix)]
        {
            if let Some(home_dir) = dirs::home_dir() {
                let xdg_config = home_dir.join(".config");
                if xdg_config.exists() {
                    return Ok(xdg_config.join(APP_DIR));
                }
                return Ok(home_dir.join(format!(".{}", APP_DIR)));
            }
        }

        #[cfg(not(unix))]
        {
            if let Some(config_dir) = dirs::config_dir() {
                return Ok(config_dir.join(APP_DIR));
            }
        }

        Err(OverrideError::ConfigError(
            "Could not determine config directory".to_string(),
        ))
    }

    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, environment variables, and defaults
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_file_path()?)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load a config file, falling back to defaults when it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file not found at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        tracing::debug!("Loading config from: {}", path.display());
        let contents = fs::read_to_string(path).map_err(|e| {
            OverrideError::ConfigError(format!("Failed to read config file: {}", e))
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save configuration to `path`, creating its directory
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(config_dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            if !config_dir.exists() {
                fs::create_dir_all(config_dir).map_err(|e| {
                    OverrideError::ConfigError(format!("Failed to create config directory: {}", e))
                })?;
                tracing::info!("Created config directory: {}", config_dir.display());
            }
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            OverrideError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;
        fs::write(path, toml_string).map_err(|e| {
            OverrideError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Set one `section.key` value; an empty value clears optional settings
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let optional = |value: &str| (!value.is_empty()).then(|| value.to_string());
        let optional_path = |value: &str| optional(value).map(PathBuf::from);

        match key {
            "sso.start_url" => self.sso.start_url = optional(value),
            "sso.region" => self.sso.region = optional(value),
            "sso.cache_dir" => self.sso.cache_dir = optional_path(value),
            "harvest.workers" => self.harvest.workers = parse_value(key, value)?,
            "harvest.chunks" => self.harvest.chunks = parse_value(key, value)?,
            "harvest.request_timeout_secs" => {
                self.harvest.request_timeout_secs = parse_value(key, value)?
            }
            "harvest.on_account_error" => {
                self.harvest.on_account_error = FailurePolicy::from_str(value, true)
                    .map_err(|_| invalid_value(key, value, "expected abort or skip"))?
            }
            "output.use_credentials_file" => {
                self.output.use_credentials_file = parse_value(key, value)?
            }
            "output.credentials_file" => self.output.credentials_file = optional_path(value),
            "output.aws_config_file" => self.output.aws_config_file = optional_path(value),
            "output.region" => self.output.region = optional(value),
            "output.format" => self.output.format = required(key, value)?,
            "terraform.override_file" => {
                self.terraform.override_file = required(key, value)?.into()
            }
            "terraform.mapping_file" => self.terraform.mapping_file = required(key, value)?.into(),
            _ => {
                return Err(OverrideError::ConfigError(format!(
                    "Unknown config key '{}'. Valid keys: {}",
                    key,
                    SETTABLE_KEYS.join(", ")
                )))
            }
        }
        self.validate()
    }

    /// Move the config file aside as `<file>-<unix timestamp>` so defaults apply again
    ///
    /// Returns the backup path, or `None` when there was no file to reset.
    pub fn reset_file(path: &Path, now: DateTime<Utc>) -> Result<Option<PathBuf>> {
        if !path.exists() {
            return Ok(None);
        }
        let mut backup = path.as_os_str().to_owned();
        backup.push(format!("-{}", now.timestamp()));
        let backup = PathBuf::from(backup);

        fs::rename(path, &backup)?;
        tracing::info!("Moved {} to {}", path.display(), backup.display());
        Ok(Some(backup))
    }

    /// Apply `AWS_SSO_*` overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(start_url) = lookup("AWS_SSO_START_URL") {
            tracing::debug!("Using AWS_SSO_START_URL from environment: {}", start_url);
            self.sso.start_url = Some(start_url);
        }
        if let Some(region) = lookup("AWS_SSO_REGION") {
            tracing::debug!("Using AWS_SSO_REGION from environment: {}", region);
            self.sso.region = Some(region);
        }
        if let Some(cache_dir) = lookup("AWS_SSO_CACHE_DIR") {
            tracing::debug!("Using AWS_SSO_CACHE_DIR from environment: {}", cache_dir);
            self.sso.cache_dir = Some(PathBuf::from(cache_dir));
        }
    }

    /// Create a sample config file with comments
    pub fn create_sample() -> Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        let config_path = Self::config_file_path()?;

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|e| {
                OverrideError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        // Don't overwrite existing config
        if config_path.exists() {
            return Err(OverrideError::ConfigError(format!(
                "Config file already exists at: {}",
                config_path.display()
            )));
        }

        fs::write(&config_path, SAMPLE_CONFIG).map_err(|e| {
            OverrideError::ConfigError(format!("Failed to write sample config: {}", e))
        })?;
        tracing::info!("Created sample config at: {}", config_path.display());
        Ok(config_path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.harvest.workers == 0 {
            return Err(OverrideError::ConfigError(
                "harvest.workers must be at least 1".to_string(),
            ));
        }
        if self.harvest.chunks == 0 {
            return Err(OverrideError::ConfigError(
                "harvest.chunks must be at least 1".to_string(),
            ));
        }
        if self.harvest.request_timeout_secs == 0 {
            return Err(OverrideError::ConfigError(
                "harvest.request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sso_region(&self) -> &str {
        self.sso.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.sso.cache_dir {
            Some(dir) => Ok(expand_home(dir)),
            None => auth::default_cache_dir(),
        }
    }

    pub fn credentials_file(&self) -> Result<PathBuf> {
        match &self.output.credentials_file {
            Some(path) => Ok(expand_home(path)),
            None => aws_file("credentials"),
        }
    }

    pub fn aws_config_file(&self) -> Result<PathBuf> {
        match &self.output.aws_config_file {
            Some(path) => Ok(expand_home(path)),
            None => aws_file("config"),
        }
    }

    /// Profile settings; SSO profiles cannot be written without a start URL
    ///
    /// `portal_region` is the region a harvest resolved, used when none is configured.
    pub fn profile_settings(&self, portal_region: Option<&str>) -> Result<ProfileSettings> {
        let start_url = self
            .sso
            .start_url
            .clone()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                OverrideError::ConfigError(
                    "SSO start_url not configured. Set it in config file or AWS_SSO_START_URL environment variable".to_string(),
                )
            })?;
        let sso_region = match (&self.sso.region, portal_region) {
            (None, Some(region)) => region.to_string(),
            _ => self.sso_region().to_string(),
        };
        Ok(ProfileSettings {
            start_url,
            region: self.output.region.clone().unwrap_or_else(|| sso_region.clone()),
            sso_region,
            output: self.output.format.clone(),
        })
    }

    /// Only an explicitly configured region is passed on; the harvest falls
    /// back to the token's region before the default
    pub fn to_harvest_options(&self, mode: HarvestMode) -> HarvestOptions {
        HarvestOptions {
            workers: self.harvest.workers,
            chunks: self.harvest.chunks,
            request_timeout: Duration::from_secs(self.harvest.request_timeout_secs),
            on_account_error: self.harvest.on_account_error,
            region: self.sso.region.clone().filter(|region| !region.is_empty()),
            ..HarvestOptions::new(mode)
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid_value(key, value, "wrong type"))
}

fn required(key: &str, value: &str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(invalid_value(key, value, "must not be empty"));
    }
    Ok(value.to_string())
}

fn invalid_value(key: &str, value: &str, reason: &str) -> OverrideError {
    OverrideError::ConfigError(format!("Invalid value '{}' for {}: {}", value, key, reason))
}

fn aws_file(name: &str) -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".aws").join(name))
        .ok_or_else(|| {
            OverrideError::ConfigError("Could not determine home directory".to_string())
        })
}

/// Expand a leading `~` to the home directory
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

const SAMPLE_CONFIG: &str = r#"# overrides configuration
# Location priority:
#   1. $XDG_CONFIG_HOME/overrides/config.toml (if XDG_CONFIG_HOME is set)
#   2. ~/.config/overrides/config.toml (if ~/.config exists)
#   3. ~/.overrides/config.toml (fallback)
#
# Environment variables override the file:
#   AWS_SSO_START_URL
#   AWS_SSO_REGION
#   AWS_SSO_CACHE_DIR

[sso]
# Your AWS SSO start URL, written into generated SSO profiles
# Example: start_url = "https://my-org.awsapps.com/start"
start_url = ""

# Region of the SSO portal (default: the region recorded by `aws sso login`,
# then eu-west-2)
# region = "eu-west-2"

# Token cache populated by `aws sso login` (default: ~/.aws/sso/cache)
# cache_dir = "~/.aws/sso/cache"

[harvest]
# Workers fetching role credentials concurrently
workers = 12

# Accounts whose roles are listed concurrently
chunks = 4

# Upper bound for a single SSO request, in seconds
request_timeout_secs = 30

# What a failing account does to the run: "abort" or "skip"
on_account_error = "abort"

[output]
# Write static credentials to ~/.aws/credentials instead of SSO profiles
# (defaults to true on Windows)
# use_credentials_file = false

# credentials_file = "~/.aws/credentials"
# aws_config_file = "~/.aws/config"

# Region written into profiles (defaults to the SSO region)
# region = "eu-west-2"

# Output format written into profiles
format = "json"

[terraform]
# Provider file written by `overrides apply` in place of providers.tf
override_file = "overrides.tf"

# Maps provider aliases to profiles, e.g.
#   override "default" { profile = "org-account-dev-ReadOnly" }
mapping_file = "mappings.hcl"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.harvest.workers, 12);
        assert_eq!(config.harvest.chunks, 4);
        assert_eq!(config.harvest.request_timeout_secs, 30);
        assert_eq!(config.harvest.on_account_error, FailurePolicy::Abort);
        assert_eq!(config.sso_region(), "eu-west-2");
        assert_eq!(config.output.format, "json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.harvest.workers, DEFAULT_WORKERS);
        assert!(config.sso.start_url.is_none());
    }

    #[test]
    fn test_sample_config_parses() {
        let config: Config = toml::from_str(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.harvest.workers, 12);
        assert_eq!(config.harvest.chunks, 4);
        assert!(config.sso.region.is_none());
        assert_eq!(config.terraform.override_file, PathBuf::from("overrides.tf"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[harvest]\nworkers = 3\non_account_error = \"skip\"\n\n[output]\nuse_credentials_file = true\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.harvest.workers, 3);
        assert_eq!(config.harvest.chunks, 4);
        assert_eq!(config.harvest.on_account_error, FailurePolicy::Skip);
        assert!(config.output.use_credentials_file);
        assert_eq!(config.output.format, "json");
    }

    #[test]
    fn test_invalid_toml_is_a_configuration_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[harvest\nworkers = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("AWS_SSO_START_URL", "https://example.awsapps.com/start"),
            ("AWS_SSO_REGION", "us-east-1"),
            ("AWS_SSO_CACHE_DIR", "/tmp/sso-cache"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.sso.region = Some("eu-west-1".to_string());
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(
            config.sso.start_url.as_deref(),
            Some("https://example.awsapps.com/start")
        );
        assert_eq!(config.sso_region(), "us-east-1");
        assert_eq!(config.cache_dir().unwrap(), PathBuf::from("/tmp/sso-cache"));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let cases: [fn(&mut Config); 3] = [
            |c| c.harvest.workers = 0,
            |c| c.harvest.chunks = 0,
            |c| c.harvest.request_timeout_secs = 0,
        ];
        for mutate in cases {
            let mut config = Config::default();
            mutate(&mut config);
            let err = config.validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }
    }

    #[test]
    fn test_profile_settings_need_start_url() {
        let mut config = Config::default();
        assert!(config.profile_settings(None).is_err());

        config.sso.start_url = Some("https://example.awsapps.com/start".to_string());
        config.sso.region = Some("eu-west-1".to_string());
        let settings = config.profile_settings(None).unwrap();
        assert_eq!(settings.sso_region, "eu-west-1");
        assert_eq!(settings.region, "eu-west-1");
        assert_eq!(settings.output, "json");

        config.output.region = Some("us-west-2".to_string());
        assert_eq!(config.profile_settings(None).unwrap().region, "us-west-2");
    }

    #[test]
    fn test_profile_settings_use_harvested_region_when_unconfigured() {
        let mut config = Config::default();
        config.sso.start_url = Some("https://example.awsapps.com/start".to_string());

        let settings = config.profile_settings(Some("us-east-1")).unwrap();
        assert_eq!(settings.sso_region, "us-east-1");
        assert_eq!(settings.region, "us-east-1");
        assert_eq!(config.profile_settings(None).unwrap().sso_region, DEFAULT_REGION);

        config.sso.region = Some("eu-west-1".to_string());
        let settings = config.profile_settings(Some("us-east-1")).unwrap();
        assert_eq!(settings.sso_region, "eu-west-1");
    }

    #[test]
    fn test_harvest_options_follow_config() {
        let mut config = Config::default();
        config.harvest.workers = 2;
        config.harvest.request_timeout_secs = 5;
        config.harvest.on_account_error = FailurePolicy::Skip;
        config.sso.region = Some("ap-southeast-2".to_string());

        let options = config.to_harvest_options(HarvestMode::FetchCredentials);
        assert_eq!(options.mode, HarvestMode::FetchCredentials);
        assert_eq!(options.workers, 2);
        assert_eq!(options.chunks, 4);
        assert_eq!(options.request_timeout, Duration::from_secs(5));
        assert_eq!(options.on_account_error, FailurePolicy::Skip);
        assert_eq!(options.region.as_deref(), Some("ap-southeast-2"));
    }

    #[test]
    fn test_harvest_options_leave_region_to_the_token() {
        let options = Config::default().to_harvest_options(HarvestMode::EnumerateOnly);
        assert!(options.region.is_none());

        let mut config = Config::default();
        config.apply_env(|name| (name == "AWS_SSO_REGION").then(|| "us-east-1".to_string()));
        let options = config.to_harvest_options(HarvestMode::EnumerateOnly);
        assert_eq!(options.region.as_deref(), Some("us-east-1"));
    }

    #[test]
    fn test_set_updates_typed_values() {
        let mut config = Config::default();
        config.set("harvest.workers", "6").unwrap();
        config.set("harvest.on_account_error", "skip").unwrap();
        config.set("output.use_credentials_file", "true").unwrap();
        config
            .set("sso.start_url", "https://example.awsapps.com/start")
            .unwrap();
        config
            .set("terraform.override_file", "local_override.tf")
            .unwrap();

        assert_eq!(config.harvest.workers, 6);
        assert_eq!(config.harvest.on_account_error, FailurePolicy::Skip);
        assert!(config.output.use_credentials_file);
        assert_eq!(
            config.sso.start_url.as_deref(),
            Some("https://example.awsapps.com/start")
        );
        assert_eq!(config.terraform.override_file, PathBuf::from("local_override.tf"));

        config.set("sso.start_url", "").unwrap();
        assert!(config.sso.start_url.is_none());
    }

    #[test]
    fn test_set_rejects_bad_input() {
        let mut config = Config::default();
        for (key, value) in [
            ("harvest.threads", "4"),
            ("harvest.workers", "many"),
            ("harvest.workers", "0"),
            ("harvest.on_account_error", "ignore"),
            ("output.use_credentials_file", "yes please"),
            ("output.format", ""),
        ] {
            let err = config.set(key, value).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{} = {}", key, value);
        }
    }

    #[test]
    fn test_saved_config_loads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set("harvest.chunks", "9").unwrap();
        config.set("sso.region", "eu-central-1").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.harvest.chunks, 9);
        assert_eq!(loaded.sso.region.as_deref(), Some("eu-central-1"));
        assert_eq!(loaded.terraform.mapping_file, PathBuf::from("mappings.hcl"));
    }

    #[test]
    fn test_reset_moves_file_aside() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let now = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert!(Config::reset_file(&path, now).unwrap().is_none());

        fs::write(&path, "[harvest]\nworkers = 2\n").unwrap();
        let backup = Config::reset_file(&path, now).unwrap().unwrap();

        assert_eq!(backup, dir.path().join("config.toml-1714564800"));
        assert!(!path.exists());
        assert_eq!(Config::load_from(&path).unwrap().harvest.workers, DEFAULT_WORKERS);
        assert!(fs::read_to_string(&backup).unwrap().contains("workers = 2"));
    }

    #[test]
    fn test_expand_home() {
        let expanded = expand_home(Path::new("~/.aws/sso/cache"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join(".aws/sso/cache"));
        }
        assert_eq!(expand_home(Path::new("/abs/path")), PathBuf::from("/abs/path"));
    }
}
