use crate::model::RuntimeModel;
use crate::rules::RuleId;
use std::collections::BTreeMap;
use std::time::Duration;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "error" => Some(Severity::Error),
            "warning" | "warn" => Some(Severity::Warning),
            "info" => Some(Severity::Info),
            _ => None,
        }
    }
}

/// Whether a rule runs and how loudly it reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSettings {
    pub enabled: bool,
    pub severity: Severity,
}

impl RuleSettings {
    pub fn default_for(rule: RuleId) -> Self {
        Self {
            enabled: true,
            severity: rule.default_severity(),
        }
    }
}

/// Effective configuration for one run, after merging the config file and
/// command-line flags.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub model: RuntimeModel,
    /// File extensions picked up when walking directories.
    pub extensions: Vec<String>,
    /// Glob patterns (relative to each scanned directory) to skip.
    pub exclude: Vec<String>,
    /// Wall-clock budget for analysing a single file.
    pub timeout: Option<Duration>,
    /// Worker threads; 0 lets the pool decide.
    pub jobs: usize,
    /// Run only this rule, regardless of per-rule settings.
    pub only: Option<RuleId>,
    rules: BTreeMap<RuleId, RuleSettings>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            model: RuntimeModel::default(),
            extensions: vec!["lua".into()],
            exclude: Vec::new(),
            timeout: None,
            jobs: 0,
            only: None,
            rules: BTreeMap::new(),
        }
    }
}

impl CheckConfig {
    pub fn settings(&self, rule: RuleId) -> RuleSettings {
        self.rules
            .get(&rule)
            .copied()
            .unwrap_or_else(|| RuleSettings::default_for(rule))
    }

    pub fn set_rule(&mut self, rule: RuleId, settings: RuleSettings) {
        self.rules.insert(rule, settings);
    }

    pub fn severity(&self, rule: RuleId) -> Severity {
        self.settings(rule).severity
    }

    pub fn is_enabled(&self, rule: RuleId) -> bool {
        self.settings(rule).enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_rule() {
        let config = CheckConfig::default();
        assert!(config.is_enabled(RuleId::TernaryOpportunity));
        assert_eq!(config.severity(RuleId::AssumeAndRefute), Severity::Info);
        assert_eq!(config.extensions, vec!["lua".to_string()]);
    }

    #[test]
    fn overrides_apply() {
        let mut config = CheckConfig::default();
        config.set_rule(
            RuleId::TernaryOpportunity,
            RuleSettings {
                enabled: false,
                severity: Severity::Error,
            },
        );
        assert!(!config.is_enabled(RuleId::TernaryOpportunity));
        assert_eq!(config.severity(RuleId::TernaryOpportunity), Severity::Error);
        assert!(config.is_enabled(RuleId::RedundantBranchToBoolean));
    }

    #[test]
    fn severity_parsing() {
        assert_eq!(Severity::parse("Error"), Some(Severity::Error));
        assert_eq!(Severity::parse("warn"), Some(Severity::Warning));
        assert_eq!(Severity::parse("loud"), None);
    }
}
