// Provider overrides for local terraform plans
use crate::config::TerraformConfig;
use crate::error::{OverrideError, Result};
use hcl::{Body, Expression, ObjectKey};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Provider file names, in lookup order
const PROVIDER_FILES: &[&str] = &["providers.tf", "provider.tf"];
const BACKUP_SUFFIX: &str = ".overrides";

/// Providers that take no arguments and are copied as empty blocks
const CONFIGLESS_PROVIDERS: &[&str] = &["template", "archive"];

/// Mapping consulted for the provider block without an alias
const UNALIASED: &str = "unaliased";
const DEFAULT_MAPPING: &str = "default";

/// A `provider` block reduced to what an override needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderBlock {
    pub kind: String,
    pub alias: Option<String>,
    pub region: Option<String>,
    pub default_tags: Vec<(String, String)>,
}

/// What goes into every generated aws provider besides its profile
#[derive(Debug, Clone)]
pub struct OverrideSettings {
    pub credentials_file: PathBuf,
    pub aws_config_file: PathBuf,
    /// Environment segment substituted into every mapped profile
    pub alias: Option<String>,
}

/// `override "<provider alias>" { profile = "..." }` entries from the mapping file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mappings {
    profiles: HashMap<String, String>,
}

impl Mappings {
    pub fn parse(source: &str) -> Result<Self> {
        let body = parse_body(source, "mapping file")?;
        let mut profiles = HashMap::new();

        for block in body.blocks().filter(|block| block.identifier() == "override") {
            let Some(label) = block.labels().first() else {
                return Err(OverrideError::Terraform(
                    "override block without a provider alias label".to_string(),
                ));
            };
            let alias = label.as_str().to_string();
            let profile = string_attribute(block.body(), "profile")?.ok_or_else(|| {
                OverrideError::Terraform(format!("override \"{}\" has no profile", alias))
            })?;
            profiles.insert(alias, profile);
        }

        Ok(Self { profiles })
    }

    /// Profile for a provider alias, falling back to the `default` mapping
    ///
    /// With `environment` set, the third `-` separated segment of the profile
    /// (`<org>-<account>-<env>-<role>`) is replaced by it.
    pub fn profile_for(
        &self,
        provider_alias: Option<&str>,
        environment: Option<&str>,
    ) -> Result<String> {
        let key = provider_alias.unwrap_or(UNALIASED);
        let profile = self
            .profiles
            .get(key)
            .or_else(|| self.profiles.get(DEFAULT_MAPPING))
            .ok_or_else(|| {
                OverrideError::Terraform(format!(
                    "no mapping for provider alias \"{}\" and no \"{}\" mapping",
                    key, DEFAULT_MAPPING
                ))
            })?;

        match environment {
            Some(environment) => with_environment(profile, environment),
            None => Ok(profile.clone()),
        }
    }
}

fn with_environment(profile: &str, environment: &str) -> Result<String> {
    let mut segments: Vec<&str> = profile.split('-').collect();
    if segments.len() < 3 {
        return Err(OverrideError::Terraform(format!(
            "profile \"{}\" has no environment segment to replace with \"{}\"",
            profile, environment
        )));
    }
    segments[2] = environment;
    Ok(segments.join("-"))
}

/// Extract the provider blocks of a providers.tf file
///
/// Nothing is evaluated: `region` and `alias` must be string literals, and
/// default tags whose value is an expression are dropped. A `terraform {}`
/// block is refused because moving the file aside would lose it.
pub fn parse_providers(source: &str) -> Result<Vec<ProviderBlock>> {
    let body = parse_body(source, "provider file")?;
    let mut providers = Vec::new();

    for block in body.blocks() {
        match block.identifier() {
            "provider" => {}
            "terraform" => {
                return Err(OverrideError::Terraform(
                    "the provider file has a terraform {} block; move it to versions.tf first"
                        .to_string(),
                ))
            }
            _ => continue,
        }

        let Some(kind) = block.labels().first() else {
            return Err(OverrideError::Terraform(
                "provider block without a name".to_string(),
            ));
        };
        let mut default_tags = Vec::new();
        for tags_block in block.body().blocks() {
            if tags_block.identifier() == "default_tags" {
                default_tags.extend(literal_tags(tags_block.body()));
            }
        }

        providers.push(ProviderBlock {
            kind: kind.as_str().to_string(),
            alias: string_attribute(block.body(), "alias")?,
            region: string_attribute(block.body(), "region")?,
            default_tags,
        });
    }

    Ok(providers)
}

fn parse_body(source: &str, what: &str) -> Result<Body> {
    hcl::parse(source)
        .map_err(|e| OverrideError::Terraform(format!("cannot parse {}: {}", what, e)))
}

fn string_attribute(body: &Body, key: &str) -> Result<Option<String>> {
    let Some(attribute) = body.attributes().find(|attribute| attribute.key() == key) else {
        return Ok(None);
    };
    match attribute.expr() {
        Expression::String(value) => Ok(Some(value.clone())),
        other => Err(OverrideError::Terraform(format!(
            "`{}` must be a string literal, found {:?}",
            key, other
        ))),
    }
}

fn literal_tags(body: &Body) -> Vec<(String, String)> {
    let Some(attribute) = body.attributes().find(|attribute| attribute.key() == "tags") else {
        return Vec::new();
    };
    let Expression::Object(object) = attribute.expr() else {
        debug!("default_tags.tags is not an object literal, dropping it");
        return Vec::new();
    };

    let mut tags = Vec::new();
    for (key, value) in object.iter() {
        let key = match key {
            ObjectKey::Identifier(ident) => ident.as_str().to_string(),
            ObjectKey::Expression(Expression::String(key)) => key.clone(),
            _ => continue,
        };
        match value {
            Expression::String(value) => tags.push((key, value.clone())),
            _ => debug!("Dropping computed default tag {}", key),
        }
    }
    tags
}

/// HCL string literal, escaping quotes, backslashes and interpolation
fn quote(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace("${", "$${");
    format!("\"{}\"", escaped)
}

/// Render the overrides file: one aws provider per original, pointed at a harvested profile
pub fn render_overrides(
    providers: &[ProviderBlock],
    mappings: &Mappings,
    settings: &OverrideSettings,
) -> Result<String> {
    let credentials = quote(&settings.credentials_file.to_string_lossy());
    let aws_config = quote(&settings.aws_config_file.to_string_lossy());
    let mut out = String::from("# Generated by overrides; `overrides restore` removes it\n\n");

    for provider in providers {
        if provider.kind != "aws" {
            if provider.alias.is_none() && CONFIGLESS_PROVIDERS.contains(&provider.kind.as_str()) {
                out.push_str(&format!("provider {} {{}}\n\n", quote(&provider.kind)));
            } else {
                warn!("Leaving provider {} out of the overrides file", provider.kind);
            }
            continue;
        }

        let profile = mappings.profile_for(provider.alias.as_deref(), settings.alias.as_deref())?;
        out.push_str("provider \"aws\" {\n");
        if let Some(region) = &provider.region {
            out.push_str(&format!("  region                   = {}\n", quote(region)));
        }
        if let Some(alias) = &provider.alias {
            out.push_str(&format!("  alias                    = {}\n", quote(alias)));
        }
        out.push_str(&format!("  profile                  = {}\n", quote(&profile)));
        out.push_str(&format!("  shared_credentials_files = [{}]\n", credentials));
        out.push_str(&format!("  shared_config_files      = [{}]\n", aws_config));
        if !provider.default_tags.is_empty() {
            out.push_str("\n  default_tags {\n    tags = {\n");
            for (key, value) in &provider.default_tags {
                out.push_str(&format!("      {} = {}\n", quote(key), quote(value)));
            }
            out.push_str("    }\n  }\n");
        }
        out.push_str("}\n\n");
    }

    Ok(out)
}

/// Result of `Workspace::restore`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restored {
    pub providers: PathBuf,
    pub removed_override: bool,
    pub restored_backup: bool,
}

/// Result of `Workspace::apply`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub backup: PathBuf,
    pub override_file: PathBuf,
    pub providers: usize,
}

struct ProviderFiles {
    providers: PathBuf,
    backup: PathBuf,
}

/// A terraform working directory whose provider file can be swapped for overrides
pub struct Workspace {
    dir: PathBuf,
    override_file: PathBuf,
    mapping_file: PathBuf,
}

impl Workspace {
    pub fn new(dir: &Path, config: &TerraformConfig) -> Self {
        Self {
            dir: dir.to_path_buf(),
            override_file: dir.join(&config.override_file),
            mapping_file: dir.join(&config.mapping_file),
        }
    }

    fn provider_files(&self) -> Result<ProviderFiles> {
        for name in PROVIDER_FILES {
            let providers = self.dir.join(name);
            let backup = self.dir.join(format!("{}{}", name, BACKUP_SUFFIX));
            if providers.exists() || backup.exists() {
                return Ok(ProviderFiles { providers, backup });
            }
        }
        Err(OverrideError::Terraform(format!(
            "no {} or backup found in {}",
            PROVIDER_FILES.join(" or "),
            self.dir.display()
        )))
    }

    /// Remove the overrides file and move the backed up provider file back
    pub fn restore(&self) -> Result<Restored> {
        let files = self.provider_files()?;

        let removed_override = self.override_file.exists();
        if removed_override {
            debug!("Removing {}", self.override_file.display());
            fs::remove_file(&self.override_file)?;
        }

        let restored_backup = files.backup.exists();
        if restored_backup {
            info!(
                "Restoring {} to {}",
                files.backup.display(),
                files.providers.display()
            );
            fs::rename(&files.backup, &files.providers)?;
        }

        Ok(Restored {
            providers: files.providers,
            removed_override,
            restored_backup,
        })
    }

    /// Back up the provider file and write the overrides file in its place
    ///
    /// Starts from a restored directory, so applying twice keeps the original
    /// backup. Everything is parsed and rendered before any file moves.
    pub fn apply(&self, settings: &OverrideSettings) -> Result<Applied> {
        let providers_path = self.restore()?.providers;
        let providers = parse_providers(&read(&providers_path)?)?;
        let mappings = Mappings::parse(&read(&self.mapping_file)?)?;
        let rendered = render_overrides(&providers, &mappings, settings)?;

        let files = self.provider_files()?;
        debug!(
            "Backing up {} as {}",
            files.providers.display(),
            files.backup.display()
        );
        fs::rename(&files.providers, &files.backup)?;
        fs::write(&self.override_file, rendered)?;
        info!("Wrote {}", self.override_file.display());

        Ok(Applied {
            backup: files.backup,
            override_file: self.override_file.clone(),
            providers: providers.len(),
        })
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| OverrideError::Terraform(format!("cannot read {}: {}", path.display(), e)))
}
