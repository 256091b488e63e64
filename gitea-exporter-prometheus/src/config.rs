//! Target configuration for the probe exporter.
//!
//! The target file is a top-level mapping from target name to server settings:
//!
//! ```yaml
//! main:
//!   url: https://git.example.com
//!   tokenEnvName: GITEA_MAIN_TOKEN
//!   excludeOrgs: [archive, sandbox]
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use clap::ValueEnum;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Failed to parse JSON5 config: {0}")]
    Json5(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// One entry of the target file, as written by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    /// Base URL of the Gitea server.
    pub url: String,

    /// Static API token.
    #[serde(default)]
    pub token: String,

    /// Environment variable that overrides `token` when set and non-empty.
    #[serde(default)]
    pub token_env_name: Option<String>,

    /// Organizations to leave out of every probe.
    #[serde(default)]
    pub exclude_orgs: Vec<String>,
}

/// A resolved probe target. Immutable after load.
#[derive(Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub base_url: Url,
    pub token: String,
    pub excluded_orgs: HashSet<String>,
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("base_url", &self.base_url.as_str())
            .field("token", &if self.token.is_empty() { "" } else { "***" })
            .field("excluded_orgs", &self.excluded_orgs)
            .finish()
    }
}

impl Target {
    /// Check whether an organization is excluded from probing.
    pub fn is_excluded(&self, org: &str) -> bool {
        self.excluded_orgs.contains(org)
    }
}

/// Target file syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json5,
}

impl ConfigFormat {
    /// Pick the syntax from a file extension; anything but `.json5`/`.json` is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json5") || ext.eq_ignore_ascii_case("json") => {
                ConfigFormat::Json5
            }
            _ => ConfigFormat::Yaml,
        }
    }
}

/// All configured targets, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    targets: BTreeMap<String, Target>,
}

impl TargetRegistry {
    /// Load targets from a file, resolving token overrides from the process environment.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, ConfigFormat::from_path(path))
    }

    /// Parse targets from a string, resolving token overrides from the process environment.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        Self::parse_with_env(content, format, |name| std::env::var(name).ok())
    }

    /// Parse targets from a string with a custom environment lookup.
    pub fn parse_with_env<F>(content: &str, format: ConfigFormat, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let configs: Option<BTreeMap<String, TargetConfig>> = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json5 => json5::from_str(content)?,
        };

        Self::from_configs(configs.unwrap_or_default(), env)
    }

    /// Resolve and validate raw target entries.
    pub fn from_configs<F>(configs: BTreeMap<String, TargetConfig>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut targets = BTreeMap::new();

        for (name, config) in configs {
            let target = resolve_target(&name, config, &env)?;
            targets.insert(name, target);
        }

        Ok(Self { targets })
    }

    /// Look up a target by name.
    pub fn get(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    /// Names of all configured targets, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

fn resolve_target<F>(name: &str, config: TargetConfig, env: &F) -> Result<Target, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "Target names must not be empty".to_string(),
        ));
    }

    if config.url.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "Target '{}' has no url",
            name
        )));
    }

    let base_url = Url::parse(config.url.trim()).map_err(|e| {
        ConfigError::Validation(format!("Target '{}' has invalid url '{}': {}", name, config.url, e))
    })?;

    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation(format!(
            "Target '{}' url must use http or https: {}",
            name, config.url
        )));
    }

    // The override is read once here, never per request.
    let token = config
        .token_env_name
        .as_deref()
        .filter(|var| !var.is_empty())
        .and_then(|var| env(var))
        .filter(|value| !value.is_empty())
        .unwrap_or(config.token);

    Ok(Target {
        name: name.to_string(),
        base_url,
        token,
        excluded_orgs: config.exclude_orgs.into_iter().collect(),
    })
}

/// Validate the route the probe handler is mounted on.
pub fn validate_probe_path(path: &str) -> Result<(), ConfigError> {
    if !path.starts_with('/') {
        return Err(ConfigError::Validation(
            "Probe path must start with /".to_string(),
        ));
    }

    if path == "/" || path == "/health" {
        return Err(ConfigError::Validation(format!(
            "Probe path {} is reserved",
            path
        )));
    }

    Ok(())
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
