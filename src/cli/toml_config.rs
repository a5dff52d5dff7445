use crate::config::{CheckConfig, RuleSettings, Severity};
use crate::model::RuntimeModel;
use crate::rules::RuleId;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "scriptwise.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("[[rule]] entry: {0}")]
    UnknownRule(String),
    #[error("rule '{rule}': unknown severity '{value}' (expected error, warning or info)")]
    UnknownSeverity { rule: String, value: String },
}

/// Top-level TOML config file structure.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    #[serde(default)]
    pub scriptwise: ScriptwiseSection,
    #[serde(default)]
    pub rule: Vec<TomlRule>,
}

/// The `[scriptwise]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptwiseSection {
    pub extensions: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub timeout_ms: Option<u64>,
    pub jobs: Option<usize>,
    /// `[scriptwise.runtime]`
    pub runtime: Option<RuntimeModel>,
}

/// A single `[[rule]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlRule {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub severity: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl TomlConfig {
    pub fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    /// Explicit path if given, else the default file when it exists, else
    /// built-in defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Convert to the core `CheckConfig`.
    pub fn into_check_config(self) -> Result<CheckConfig, ConfigError> {
        let mut config = CheckConfig::default();
        let section = self.scriptwise;
        if let Some(extensions) = section.extensions {
            config.extensions = extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect();
        }
        config.exclude = section.exclude;
        config.timeout = section.timeout_ms.map(Duration::from_millis);
        config.jobs = section.jobs.unwrap_or(0);
        if let Some(model) = section.runtime {
            config.model = model;
        }

        for entry in self.rule {
            let rule: RuleId = entry.id.parse().map_err(ConfigError::UnknownRule)?;
            let mut settings = RuleSettings::default_for(rule);
            settings.enabled = entry.enabled;
            if let Some(value) = entry.severity {
                settings.severity =
                    Severity::parse(&value).ok_or_else(|| ConfigError::UnknownSeverity {
                        rule: entry.id.clone(),
                        value,
                    })?;
            }
            config.set_rule(rule, settings);
        }

        Ok(config)
    }
}
